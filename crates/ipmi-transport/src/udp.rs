//! UDP datagram transport.

use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

use crate::{BindConfig, PacketSink, PacketSource, TransportError};

/// Largest datagram the listener accepts. RMCP+ packets are far smaller,
/// but oversized garbage should be received (and then dropped by the
/// codec) rather than truncated into something that half-parses.
const MAX_DATAGRAM: usize = 4096;

/// A bound UDP socket serving as both packet source and sink.
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    pub fn bind(config: &BindConfig) -> Result<Self, TransportError> {
        let socket =
            UdpSocket::bind((config.address, config.port)).map_err(TransportError::Bind)?;
        log::debug!("RMCP listener bound on {}:{}", config.address, config.port);
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.socket.local_addr()?)
    }

    /// Bounds how long [`PacketSource::recv`] blocks, so the dispatch loop
    /// can run its inactivity sweep on an idle socket.
    pub fn set_recv_timeout(&self, timeout: Option<Duration>) -> Result<(), TransportError> {
        self.socket.set_read_timeout(timeout)?;
        Ok(())
    }
}

impl PacketSource for UdpTransport {
    fn recv(&mut self) -> Result<(Vec<u8>, SocketAddr), TransportError> {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        match self.socket.recv_from(&mut buf) {
            Ok((n, peer)) => {
                buf.truncate(n);
                log::trace!("{n} bytes from {peer}");
                Ok((buf, peer))
            }
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                Err(TransportError::Timeout)
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl PacketSink for UdpTransport {
    fn send(&self, datagram: &[u8], peer: SocketAddr) -> Result<(), TransportError> {
        self.socket.send_to(datagram, peer)?;
        log::trace!("{} bytes to {peer}", datagram.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn loopback() -> BindConfig {
        BindConfig {
            address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
        }
    }

    #[test]
    fn loopback_round_trip() {
        let mut receiver = UdpTransport::bind(&loopback()).unwrap();
        let sender = UdpTransport::bind(&loopback()).unwrap();
        let dest = receiver.local_addr().unwrap();

        sender.send(&[0x06, 0x00, 0xff, 0x07], dest).unwrap();
        let (data, peer) = receiver.recv().unwrap();
        assert_eq!(data, vec![0x06, 0x00, 0xff, 0x07]);
        assert_eq!(peer.port(), sender.local_addr().unwrap().port());
    }

    #[test]
    fn recv_timeout_surfaces_as_tick() {
        let mut transport = UdpTransport::bind(&loopback()).unwrap();
        transport
            .set_recv_timeout(Some(Duration::from_millis(10)))
            .unwrap();
        assert!(matches!(transport.recv(), Err(TransportError::Timeout)));
    }
}
