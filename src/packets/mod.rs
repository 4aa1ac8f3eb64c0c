pub mod channel_message;
pub mod message_iterator;
pub mod raw_packet;
mod util;
