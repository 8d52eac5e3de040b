//! UDP transport over a tokio socket.

use std::io;
use std::net::SocketAddr;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;

use super::Transport;
use crate::error::{Error, Result};

/// Create and bind a UDP socket with optional receive buffer size.
///
/// For IPv6 addresses, sets `IPV6_V6ONLY = false` so one socket serves both
/// address families. Must be called from within a tokio runtime.
pub fn bind_udp_socket(addr: SocketAddr, recv_buffer_size: Option<usize>) -> io::Result<UdpSocket> {
    let domain = if addr.is_ipv6() {
        Domain::IPV6
    } else {
        Domain::IPV4
    };

    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;

    if addr.is_ipv6() {
        socket.set_only_v6(false)?;
    }

    // Allow address reuse for quick restarts
    socket.set_reuse_address(true)?;

    if let Some(size) = recv_buffer_size {
        // Kernel caps this at rmem_max; a smaller buffer is not fatal
        let _ = socket.set_recv_buffer_size(size);
    }

    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;

    UdpSocket::from_std(socket.into())
}

/// Non-blocking UDP transport.
///
/// `recv_from` and `send_to` never wait; use [`readable`](Self::readable)
/// to sleep until a datagram arrives.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    local_addr: SocketAddr,
}

impl UdpTransport {
    /// Bind to `addr`. Must be called from within a tokio runtime.
    pub fn bind(addr: SocketAddr) -> Result<Self> {
        Self::bind_with_buffer(addr, None)
    }

    /// Bind with a requested kernel receive buffer size.
    pub fn bind_with_buffer(addr: SocketAddr, recv_buffer_size: Option<usize>) -> Result<Self> {
        let socket = bind_udp_socket(addr, recv_buffer_size).map_err(|e| Error::io(None, e))?;
        let local_addr = socket.local_addr().map_err(|e| Error::io(None, e))?;
        tracing::debug!(
            target: "embedded_snmp::transport",
            { snmp.local_addr = %local_addr },
            "UDP transport bound"
        );
        Ok(Self { socket, local_addr })
    }

    /// Wait until a datagram can be read.
    pub async fn readable(&self) -> Result<()> {
        self.socket.readable().await.map_err(|e| Error::io(None, e))
    }

    /// The underlying socket.
    pub fn socket(&self) -> &UdpSocket {
        &self.socket
    }
}

impl Transport for UdpTransport {
    fn recv_from(&mut self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>> {
        match self.socket.try_recv_from(buf) {
            Ok((len, source)) => Ok(Some((len, source))),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => {
                tracing::warn!(
                    target: "embedded_snmp::transport",
                    { error = %e },
                    "UDP receive failed"
                );
                Err(Error::io(None, e))
            }
        }
    }

    fn send_to(&mut self, data: &[u8], target: SocketAddr) -> Result<()> {
        match self.socket.try_send_to(data, target) {
            Ok(_) => Ok(()),
            Err(e) => {
                tracing::warn!(
                    target: "embedded_snmp::transport",
                    { snmp.target = %target, error = %e },
                    "UDP send failed"
                );
                Err(Error::io(Some(target), e))
            }
        }
    }

    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_udp_socket_ipv4() {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let socket = bind_udp_socket(addr, None).unwrap();
        let local = socket.local_addr().unwrap();
        assert!(local.is_ipv4());
        assert_ne!(local.port(), 0);
    }

    #[tokio::test]
    async fn test_bind_udp_socket_with_buffer_size() {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let socket = bind_udp_socket(addr, Some(1024 * 1024)).unwrap();
        assert_ne!(socket.local_addr().unwrap().port(), 0);
    }

    #[tokio::test]
    async fn test_nothing_waiting_is_none() {
        let mut transport = UdpTransport::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let mut buf = [0u8; 64];
        assert!(transport.recv_from(&mut buf).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_datagram_exchange() {
        let mut a = UdpTransport::bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let mut b = UdpTransport::bind("127.0.0.1:0".parse().unwrap()).unwrap();

        a.send_to(b"ping", b.local_addr()).unwrap();
        b.readable().await.unwrap();

        let mut buf = [0u8; 64];
        let mut received = None;
        for _ in 0..100 {
            if let Some(got) = b.recv_from(&mut buf).unwrap() {
                received = Some(got);
                break;
            }
            b.readable().await.unwrap();
        }
        let (len, from) = received.unwrap();
        assert_eq!(&buf[..len], b"ping");
        assert_eq!(from, a.local_addr());
    }
}
