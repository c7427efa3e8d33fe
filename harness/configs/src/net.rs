use std::net::TcpListener;

/// Bind an ephemeral loopback port and release it.
///
/// The port may be reclaimed by the OS between this call and the node
/// actually binding it; callers allocate shortly before spawning.
#[must_use]
pub fn get_available_tcp_port() -> Option<u16> {
    TcpListener::bind("127.0.0.1:0")
        .and_then(|listener| listener.local_addr())
        .map(|addr| addr.port())
        .ok()
}
