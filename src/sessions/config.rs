use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

/// The ipMIDI rendezvous group.
pub const DEFAULT_MULTICAST_ADDRESS: Ipv4Addr = Ipv4Addr::new(225, 0, 0, 37);
/// The first ipMIDI port. Further ports (21929, ...) carry additional virtual MIDI cables.
pub const DEFAULT_PORT: u16 = 21928;

/// Where a [`Sender`](super::sender::Sender) or [`Receiver`](super::receiver::Receiver) talks to.
///
/// `group` is normally a multicast address. Any other IPv4 address is accepted as well, in which
/// case senders address it directly and receivers skip the group join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MulticastConfig {
    pub group: Ipv4Addr,
    pub port: u16,
    /// Local interface used to join the group and to send multicast traffic.
    /// `UNSPECIFIED` lets the OS pick.
    pub interface: Ipv4Addr,
    pub ttl: u32,
    /// Whether our own multicast datagrams are looped back to receivers on this host.
    pub multicast_loop: bool,
}

impl Default for MulticastConfig {
    fn default() -> Self {
        MulticastConfig {
            group: DEFAULT_MULTICAST_ADDRESS,
            port: DEFAULT_PORT,
            interface: Ipv4Addr::UNSPECIFIED,
            ttl: 1,
            multicast_loop: true,
        }
    }
}

impl MulticastConfig {
    pub fn new(group: Ipv4Addr, port: u16) -> Self {
        MulticastConfig {
            group,
            port,
            ..Default::default()
        }
    }

    pub fn with_interface(mut self, interface: Ipv4Addr) -> Self {
        self.interface = interface;
        self
    }

    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_multicast_loop(mut self, multicast_loop: bool) -> Self {
        self.multicast_loop = multicast_loop;
        self
    }

    pub fn is_multicast(&self) -> bool {
        self.group.is_multicast()
    }

    pub fn endpoint(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.group, self.port))
    }
}
