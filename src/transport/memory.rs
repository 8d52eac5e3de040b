//! In-process transport.
//!
//! A [`MemoryNetwork`] routes datagrams between [`MemoryTransport`]
//! endpoints by address. Datagrams to an address with no endpoint are
//! dropped, as UDP would.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use super::Transport;
use crate::error::Result;

type Datagram = (Bytes, SocketAddr);

#[derive(Debug, Default)]
struct NetworkInner {
    inboxes: HashMap<SocketAddr, VecDeque<Datagram>>,
    sent: Vec<(SocketAddr, Datagram)>,
}

/// Shared routing table for memory endpoints. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryNetwork {
    inner: Arc<Mutex<NetworkInner>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an endpoint bound to `addr`.
    pub fn endpoint(&self, addr: SocketAddr) -> MemoryTransport {
        self.inner.lock().inboxes.entry(addr).or_default();
        MemoryTransport {
            network: self.clone(),
            local_addr: addr,
        }
    }

    /// Queue a datagram for `to` as if sent from `from`.
    pub fn inject(&self, data: impl Into<Bytes>, from: SocketAddr, to: SocketAddr) {
        let mut inner = self.inner.lock();
        if let Some(inbox) = inner.inboxes.get_mut(&to) {
            inbox.push_back((data.into(), from));
        }
    }

    /// Every datagram sent so far, as `(from, (data, to))`.
    pub fn sent(&self) -> Vec<(SocketAddr, Datagram)> {
        self.inner.lock().sent.clone()
    }

    /// Datagrams sent to `to`, oldest first, clearing them from the log.
    pub fn take_sent_to(&self, to: SocketAddr) -> Vec<Bytes> {
        let mut inner = self.inner.lock();
        let (taken, kept): (Vec<_>, Vec<_>) = inner
            .sent
            .drain(..)
            .partition(|(_, (_, dest))| *dest == to);
        inner.sent = kept;
        taken.into_iter().map(|(_, (data, _))| data).collect()
    }

    /// Number of datagrams waiting for `addr`.
    pub fn pending(&self, addr: SocketAddr) -> usize {
        let inner = self.inner.lock();
        inner.inboxes.get(&addr).map_or(0, VecDeque::len)
    }
}

/// Endpoint on a [`MemoryNetwork`].
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    network: MemoryNetwork,
    local_addr: SocketAddr,
}

impl MemoryTransport {
    /// The network this endpoint belongs to.
    pub fn network(&self) -> &MemoryNetwork {
        &self.network
    }
}

impl Transport for MemoryTransport {
    fn recv_from(&mut self, buf: &mut [u8]) -> Result<Option<(usize, SocketAddr)>> {
        let mut inner = self.network.inner.lock();
        let Some((data, from)) = inner
            .inboxes
            .get_mut(&self.local_addr)
            .and_then(VecDeque::pop_front)
        else {
            return Ok(None);
        };
        let len = data.len().min(buf.len());
        buf[..len].copy_from_slice(&data[..len]);
        Ok(Some((len, from)))
    }

    fn send_to(&mut self, data: &[u8], target: SocketAddr) -> Result<()> {
        let data = Bytes::copy_from_slice(data);
        let mut inner = self.network.inner.lock();
        inner.sent.push((self.local_addr, (data.clone(), target)));
        if let Some(inbox) = inner.inboxes.get_mut(&target) {
            inbox.push_back((data, self.local_addr));
        }
        Ok(())
    }

    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}
