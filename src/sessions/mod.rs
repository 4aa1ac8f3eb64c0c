pub mod config;
pub mod events;
mod multicast_socket;
pub mod receiver;
pub mod sender;

const MAX_UDP_PACKET_SIZE: usize = 65535;
