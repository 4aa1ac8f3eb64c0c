use std::net::SocketAddr;

use midi_types::MidiMessage;
use tokio::net::UdpSocket;
use tracing::{Level, event, instrument};

use super::config::MulticastConfig;
use super::multicast_socket;
use crate::error::{IpMidiError, Result};
use crate::packets::channel_message::{self, ChannelMessage, encode, encode_batch};

/// Sends MIDI messages to an ipMIDI group.
///
/// The socket is created once in [`Sender::bind`] and reused for every datagram. Every typed
/// send validates its arguments first and sends nothing when one is out of range.
#[derive(Debug)]
pub struct Sender {
    config: MulticastConfig,
    target: SocketAddr,
    socket: UdpSocket,
}

impl Sender {
    pub async fn bind(config: MulticastConfig) -> Result<Self> {
        let socket = multicast_socket::bind_sender(&config)?;
        let target = config.endpoint();
        event!(Level::INFO, target = %target, "ipMIDI sender ready");
        Ok(Sender { config, target, socket })
    }

    pub fn config(&self) -> &MulticastConfig {
        &self.config
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Sends `bytes` as one datagram, unmodified.
    #[instrument(skip_all, fields(len = bytes.len()))]
    pub async fn send_raw(&self, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            return Err(IpMidiError::InvalidArgument {
                parameter: "bytes",
                reason: "MIDI data cannot be empty",
            });
        }
        self.socket.send_to(bytes, self.target).await?;
        event!(Level::TRACE, "Sent {:02X?}", bytes);
        Ok(())
    }

    pub async fn send_message(&self, message: &ChannelMessage) -> Result<()> {
        self.send_raw(&encode(message)).await
    }

    /// Sends a `midi_types` message. Anything but a channel-voice message is rejected with
    /// `InvalidArgument`.
    pub async fn send_midi_message(&self, message: &MidiMessage) -> Result<()> {
        self.send_message(&ChannelMessage::try_from(message)?).await
    }

    /// Packs `messages` into a single datagram.
    pub async fn send_batch(&self, messages: &[ChannelMessage]) -> Result<()> {
        if messages.is_empty() {
            return Err(IpMidiError::InvalidArgument {
                parameter: "messages",
                reason: "batch cannot be empty",
            });
        }
        self.send_raw(&encode_batch(messages)).await
    }

    pub async fn send_note_on(&self, channel: u8, note: u8, velocity: u8) -> Result<()> {
        self.send_message(&channel_message::note_on(channel, note, velocity)?).await
    }

    pub async fn send_note_off(&self, channel: u8, note: u8, velocity: u8) -> Result<()> {
        self.send_message(&channel_message::note_off(channel, note, velocity)?).await
    }

    /// Note Off with a release velocity of 0.
    pub async fn send_note_off_default(&self, channel: u8, note: u8) -> Result<()> {
        self.send_note_off(channel, note, 0).await
    }

    pub async fn send_control_change(&self, channel: u8, controller: u8, value: u8) -> Result<()> {
        self.send_message(&channel_message::control_change(channel, controller, value)?).await
    }

    pub async fn send_program_change(&self, channel: u8, program: u8) -> Result<()> {
        self.send_message(&channel_message::program_change(channel, program)?).await
    }

    /// `value` ranges from -8192 to 8191.
    pub async fn send_pitch_bend(&self, channel: u8, value: i16) -> Result<()> {
        self.send_message(&channel_message::pitch_bend(channel, value)?).await
    }

    /// Channel pressure.
    pub async fn send_aftertouch(&self, channel: u8, pressure: u8) -> Result<()> {
        self.send_message(&channel_message::aftertouch(channel, pressure)?).await
    }

    /// Releases the socket. Taking `self` makes sending afterwards impossible.
    pub fn close(self) {
        event!(Level::DEBUG, target = %self.target, "Closing ipMIDI sender");
    }
}
