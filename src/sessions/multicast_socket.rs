use std::net::{Ipv4Addr, SocketAddr};

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tracing::{Level, event, instrument};

use super::config::MulticastConfig;

fn new_udp_socket() -> std::io::Result<Socket> {
    Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
}

fn into_tokio(socket: Socket) -> std::io::Result<UdpSocket> {
    socket.set_nonblocking(true)?;
    UdpSocket::from_std(socket.into())
}

/// An ephemeral-port socket for outbound traffic. Never joins the group.
#[instrument(skip_all, fields(group = %config.group, port = config.port))]
pub(super) fn bind_sender(config: &MulticastConfig) -> std::io::Result<UdpSocket> {
    let socket = new_udp_socket()?;
    if config.is_multicast() {
        socket.set_multicast_ttl_v4(config.ttl)?;
        socket.set_multicast_loop_v4(config.multicast_loop)?;
        if !config.interface.is_unspecified() {
            socket.set_multicast_if_v4(&config.interface)?;
        }
    }
    socket.bind(&SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)).into())?;
    event!(Level::DEBUG, "Bound sender socket");
    into_tokio(socket)
}

/// Binds the wildcard address on the configured port with address reuse enabled, so several
/// receivers on one host can share the port, then joins the group.
#[instrument(skip_all, fields(group = %config.group, port = config.port))]
pub(super) fn bind_receiver(config: &MulticastConfig) -> std::io::Result<UdpSocket> {
    let socket = new_udp_socket()?;
    socket.set_reuse_address(true)?;
    socket.bind(&SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.port)).into())?;
    if config.is_multicast() {
        socket.join_multicast_v4(&config.group, &config.interface)?;
        event!(Level::DEBUG, interface = %config.interface, "Joined multicast group");
    } else {
        event!(Level::DEBUG, "Not a multicast address, receiving directed datagrams only");
    }
    into_tokio(socket)
}

pub(super) fn leave_group(socket: &UdpSocket, config: &MulticastConfig) {
    if !config.is_multicast() {
        return;
    }
    if let Err(e) = socket.leave_multicast_v4(config.group, config.interface) {
        event!(Level::WARN, group = %config.group, "Failed to leave multicast group: {}", e);
    } else {
        event!(Level::DEBUG, group = %config.group, "Left multicast group");
    }
}
