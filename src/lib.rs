//! Rust library for sending and receiving MIDI over ipMIDI, where raw MIDI bytes travel in UDP
//! multicast datagrams (by default to `225.0.0.37:21928`).
//!
//! This library is designed to be used with the `tokio` async runtime.
//! A [`Sender`](sessions::sender::Sender) encodes typed channel-voice messages and sends them to the group,
//! and a [`Receiver`](sessions::receiver::Receiver) joins the group, decodes every datagram and notifies listeners
//! registered per message type.
//!
//! # Features
//! - **Async**: Built on top of `tokio`; each receiver runs one background task.
//! - **Batching**: Several messages can share a datagram, and incoming datagrams may carry any number of them.
//! - **Diagnostics**: Every datagram is reported raw, and unparseable ones are reported as unknown messages.
//!
//! ## Unsupported Features
//! - **SysEx and real-time messages**: Only channel-voice messages are encoded or decoded.
//! - **Running status**: Every message must carry its own status byte.
pub mod error;
pub mod packets;
pub mod sessions;
