use std::net::SocketAddr;

use crate::TransportError;

/// Yields inbound datagrams to the dispatch loop.
pub trait PacketSource {
    fn recv(&mut self) -> Result<(Vec<u8>, SocketAddr), TransportError>;
}

/// Emits outbound datagrams.
pub trait PacketSink {
    fn send(&self, datagram: &[u8], peer: SocketAddr) -> Result<(), TransportError>;
}
