use std::net::SocketAddr;
use std::time::SystemTime;

use bytes::Bytes;

/// One ipMIDI datagram exactly as it went over the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPacket {
    bytes: Bytes,
    received_at: SystemTime,
    source: Option<SocketAddr>,
}

impl RawPacket {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        RawPacket {
            bytes: bytes.into(),
            received_at: SystemTime::now(),
            source: None,
        }
    }

    pub(crate) fn received(bytes: Bytes, source: SocketAddr) -> Self {
        RawPacket {
            bytes,
            received_at: SystemTime::now(),
            source: Some(source),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn received_at(&self) -> SystemTime {
        self.received_at
    }

    /// The peer the datagram came from, or `None` for locally built packets.
    pub fn source(&self) -> Option<SocketAddr> {
        self.source
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_received_packet_keeps_source() {
        let src: SocketAddr = "10.0.0.2:21928".parse().unwrap();
        let before = SystemTime::now();
        let packet = RawPacket::received(Bytes::from_static(&[0x90, 60, 100]), src);

        assert_eq!(packet.bytes(), &[0x90, 60, 100]);
        assert_eq!(packet.source(), Some(src));
        assert!(packet.received_at() >= before);
        assert_eq!(packet.len(), 3);
    }

    #[test]
    fn test_local_packet_has_no_source() {
        let packet = RawPacket::new(vec![0xB0, 7]);
        assert_eq!(packet.source(), None);
        assert!(!packet.is_empty());
    }
}
