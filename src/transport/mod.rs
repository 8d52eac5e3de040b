//! Transport layer abstraction.
//!
//! The agent and manager drive I/O from their `poll` calls, so transports
//! are non-blocking: a receive either returns a datagram that is already
//! waiting or `None`.

mod memory;
mod udp;

pub use memory::*;
pub use udp::*;

use crate::error::Result;
use std::net::SocketAddr;

/// Default agent port.
pub const AGENT_PORT: u16 = 161;

/// Default trap/inform receiver port.
pub const TRAP_PORT: u16 = 162;

/// Non-blocking datagram transport.
pub trait Transport {
    /// Receive one waiting datagram into `buf`.
    ///
    /// Returns `Ok(None)` when nothing is waiting. A datagram larger than
    /// `buf` is truncated to `buf.len()` bytes and the returned size is
    /// `buf.len()`.
    fn recv_from(&mut self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>>;

    /// Send one datagram to `target`.
    fn send_to(&mut self, data: &[u8], target: SocketAddr) -> Result<()>;

    /// Local bind address.
    fn local_addr(&self) -> SocketAddr;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn recv_from(&mut self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>> {
        (**self).recv_from(buf)
    }

    fn send_to(&mut self, data: &[u8], target: SocketAddr) -> Result<()> {
        (**self).send_to(data, target)
    }

    fn local_addr(&self) -> SocketAddr {
        (**self).local_addr()
    }
}
