//! Pending informs awaiting acknowledgement.

use std::net::SocketAddr;

use bytes::Bytes;

use super::TrapId;

/// One sent inform and its retry state.
#[derive(Debug, Clone)]
pub struct InformItem {
    pub request_id: i32,
    pub target: SocketAddr,
    /// Resends left.
    pub retries: u32,
    /// Time to wait for a response before resending.
    pub delay_ms: u64,
    /// Clock time of the last send.
    pub last_sent: u64,
    pub received: bool,
    /// The last wait expired without a response.
    pub missed: bool,
    pub trap_id: TrapId,
    /// Encoded packet, resent unchanged.
    pub packet: Bytes,
}

/// Informs waiting for a GetResponse.
///
/// Owned by the agent that sent them; nothing here is shared between
/// agents.
#[derive(Debug, Default)]
pub struct InformQueue {
    items: Vec<InformItem>,
}

impl InformQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: InformItem) {
        tracing::debug!(
            target: "embedded_snmp::inform",
            {
                snmp.request_id = item.request_id,
                snmp.target = %item.target,
                retries = item.retries,
            },
            "queued inform"
        );
        self.items.push(item);
    }

    /// Drop every pending inform sent for `trap`. Returns their request ids.
    pub fn remove_trap(&mut self, trap: TrapId) -> Vec<i32> {
        let mut removed = Vec::new();
        self.items.retain(|item| {
            if item.trap_id == trap {
                removed.push(item.request_id);
                false
            } else {
                true
            }
        });
        removed
    }

    /// Handle the response to `request_id`.
    ///
    /// Any response, success or error, completes the inform.
    pub fn acknowledge(&mut self, request_id: i32) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.request_id != request_id);
        let found = self.items.len() != before;
        tracing::debug!(
            target: "embedded_snmp::inform",
            { snmp.request_id = request_id, found, pending = self.items.len() },
            "inform acknowledged"
        );
        found
    }

    /// Resend overdue informs and purge finished ones.
    ///
    /// An item whose delay has elapsed is resent if it has retries left,
    /// consuming one; otherwise it is marked missed. Items that were
    /// received, or missed with no retries left, are removed. `send` failures
    /// are logged and count as a send. Returns the request ids removed.
    pub fn sweep<F>(&mut self, now_ms: u64, mut send: F) -> Vec<i32>
    where
        F: FnMut(&Bytes, SocketAddr) -> crate::error::Result<()>,
    {
        for item in &mut self.items {
            if item.received || now_ms.saturating_sub(item.last_sent) <= item.delay_ms {
                continue;
            }
            item.missed = true;
            if item.retries == 0 {
                tracing::debug!(
                    target: "embedded_snmp::inform",
                    { snmp.request_id = item.request_id },
                    "no retries left for inform"
                );
                continue;
            }
            tracing::debug!(
                target: "embedded_snmp::inform",
                {
                    snmp.request_id = item.request_id,
                    waited_ms = now_ms.saturating_sub(item.last_sent),
                },
                "resending inform"
            );
            if let Err(e) = send(&item.packet, item.target) {
                tracing::warn!(
                    target: "embedded_snmp::inform",
                    { snmp.request_id = item.request_id, error = %e },
                    "inform resend failed"
                );
            }
            item.last_sent = now_ms;
            item.missed = false;
            item.retries -= 1;
        }

        let mut purged = Vec::new();
        self.items.retain(|item| {
            let finished = item.received || (item.retries == 0 && item.missed);
            if finished {
                purged.push(item.request_id);
            }
            !finished
        });
        purged
    }

    pub fn get(&self, request_id: i32) -> Option<&InformItem> {
        self.items.iter().find(|item| item.request_id == request_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &InformItem> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
