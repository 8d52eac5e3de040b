//! Polling schedule for one remote value.

use crate::oid::Oid;
use crate::registry::CallbackId;

use super::DeviceId;

/// How long a poll may stay unanswered before it is abandoned.
pub const DEFAULT_POLL_TIMEOUT_MS: u64 = 5000;

/// Handle returned when a poller is added.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PollerId(pub(super) u64);

/// Schedule and in-flight state of a poller.
#[derive(Debug, Clone)]
pub struct PollingInfo {
    pub interval_ms: u64,
    /// A request naming this value is awaiting a response.
    pub on_wire: bool,
    pub last_request_id: i32,
    pub last_sent: u64,
    /// Clock time of the last usable response, `None` before the first.
    pub last_successful_poll: Option<u64>,
}

impl PollingInfo {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            on_wire: false,
            last_request_id: 0,
            last_sent: 0,
            last_successful_poll: None,
        }
    }

    /// Due for a request: nothing in flight and the interval has passed
    /// since the last success. A poller that never succeeded is always due.
    pub fn should_poll(&self, now_ms: u64) -> bool {
        if self.on_wire {
            return false;
        }
        match self.last_successful_poll {
            Some(last) => now_ms.saturating_sub(last) > self.interval_ms,
            None => true,
        }
    }

    pub fn has_timed_out(&self, now_ms: u64, timeout_ms: u64) -> bool {
        self.on_wire && now_ms.saturating_sub(self.last_sent) > timeout_ms
    }

    /// Record that a request carrying this value went out.
    pub fn send(&mut self, request_id: i32, now_ms: u64) {
        self.on_wire = true;
        self.last_request_id = request_id;
        self.last_sent = now_ms;
    }

    /// Clear the in-flight state after a response or timeout.
    ///
    /// A failed poll leaves the last success time alone, so the value is
    /// requested again on the next pass.
    pub fn reset(&mut self, success: bool, now_ms: u64) {
        self.on_wire = false;
        if success {
            self.last_successful_poll = Some(now_ms);
        }
    }
}

/// A remote value copied into a local binding on a schedule.
#[derive(Debug, Clone)]
pub struct Poller {
    pub(super) id: PollerId,
    pub(super) device: DeviceId,
    pub(super) oid: Oid,
    pub(super) callback: CallbackId,
    pub(super) info: PollingInfo,
}

impl Poller {
    pub fn id(&self) -> PollerId {
        self.id
    }

    pub fn device(&self) -> DeviceId {
        self.device
    }

    /// Remote OID polled.
    pub fn oid(&self) -> &Oid {
        &self.oid
    }

    /// Entry in the device's registry that receives the value.
    pub fn callback(&self) -> CallbackId {
        self.callback
    }

    pub fn info(&self) -> &PollingInfo {
        &self.info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_poll_is_due() {
        let info = PollingInfo::new(1000);
        assert!(info.should_poll(0));
    }

    #[test]
    fn test_interval_after_success() {
        let mut info = PollingInfo::new(1000);
        info.send(7, 0);
        assert!(!info.should_poll(5000));
        info.reset(true, 10);
        assert!(!info.should_poll(1010));
        assert!(info.should_poll(1011));
    }

    #[test]
    fn test_failure_keeps_last_success() {
        let mut info = PollingInfo::new(1000);
        info.send(1, 0);
        info.reset(false, 50);
        assert_eq!(info.last_successful_poll, None);
        assert!(info.should_poll(51));
    }

    #[test]
    fn test_timeout() {
        let mut info = PollingInfo::new(1000);
        assert!(!info.has_timed_out(100_000, DEFAULT_POLL_TIMEOUT_MS));
        info.send(1, 100);
        assert!(!info.has_timed_out(5100, DEFAULT_POLL_TIMEOUT_MS));
        assert!(info.has_timed_out(5101, DEFAULT_POLL_TIMEOUT_MS));
    }
}
