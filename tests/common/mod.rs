use std::net::UdpSocket;

pub fn find_free_port() -> u16 {
    let socket = UdpSocket::bind(("0.0.0.0", 0)).unwrap();
    socket.local_addr().unwrap().port()
}
