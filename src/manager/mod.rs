//! SNMP manager.
//!
//! A [`Manager`] keeps local cells in step with values on remote
//! [`Device`]s. Each poller names one remote OID and a local binding; due
//! pollers for a device are batched into a single GetRequest and the
//! response is written back through the binding.
//!
//! # Example
//!
//! ```rust,no_run
//! use embedded_snmp::clock::SystemClock;
//! use embedded_snmp::manager::{Device, Manager};
//! use embedded_snmp::oid::Oid;
//! use embedded_snmp::registry::shared_i32;
//! use embedded_snmp::transport::UdpTransport;
//! use embedded_snmp::version::Version;
//!
//! # async fn example() -> embedded_snmp::Result<()> {
//! let transport = UdpTransport::bind("0.0.0.0:0".parse().unwrap())?;
//! let mut manager = Manager::builder().build(transport, SystemClock::new());
//!
//! let addr = "192.168.1.20:161".parse().unwrap();
//! let switch = manager.add_device(Device::new(addr, Version::V2c, "public"));
//! let uptime = shared_i32(0);
//! let oid = Oid::parse(".1.3.6.1.4.1.5.1")?;
//! manager.add_integer_poller(switch, oid, uptime.clone(), 10_000)?;
//!
//! loop {
//!     manager.poll();
//!     tokio::time::sleep(std::time::Duration::from_millis(100)).await;
//! }
//! # }
//! ```

mod poller;

pub use poller::*;

use std::net::SocketAddr;

use bytes::Bytes;

use crate::agent::{DEFAULT_MAX_PACKET_SIZE, Dispatcher, HandleOutcome, response_failed};
use crate::ber::{DEFAULT_OCTET_STRING_LIMIT, IntegerForm};
use crate::clock::{Clock, SystemClock};
use crate::error::{Error, Result};
use crate::oid::Oid;
use crate::packet::{RequestIdGen, SnmpPacket};
use crate::pdu::PduType;
use crate::registry::{Binding, Registry, SharedBytes, SharedI32};
use crate::transport::{Transport, UdpTransport};
use crate::version::Version;

/// Most varbinds sent in one polling request.
pub const DEFAULT_BATCH_SIZE: usize = 6;

/// A remote agent, identified by address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub addr: SocketAddr,
    pub version: Version,
    pub community: Bytes,
}

impl Device {
    pub fn new(addr: SocketAddr, version: Version, community: impl Into<Bytes>) -> Self {
        Self {
            addr,
            version,
            community: community.into(),
        }
    }
}

/// Handle returned by [`Manager::add_device`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(usize);

#[derive(Debug)]
struct DeviceEntry {
    device: Device,
    registry: Registry,
}

/// Builder for [`Manager`].
///
/// Defaults:
/// - Max packet size: 1400 bytes
/// - OCTET STRING limit: 500 bytes
/// - Integer form: [`IntegerForm::Fixed4`]
/// - Poll timeout: 5000 ms
/// - Batch size: 6 varbinds
pub struct ManagerBuilder {
    max_packet_size: usize,
    octet_limit: usize,
    integer_form: IntegerForm,
    timeout_ms: u64,
    batch_size: usize,
    request_ids: Option<RequestIdGen>,
}

impl ManagerBuilder {
    pub fn new() -> Self {
        Self {
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
            octet_limit: DEFAULT_OCTET_STRING_LIMIT,
            integer_form: IntegerForm::default(),
            timeout_ms: DEFAULT_POLL_TIMEOUT_MS,
            batch_size: DEFAULT_BATCH_SIZE,
            request_ids: None,
        }
    }

    pub fn max_packet_size(mut self, size: usize) -> Self {
        self.max_packet_size = size;
        self
    }

    /// Largest OCTET STRING or Opaque accepted in a response.
    pub fn octet_limit(mut self, limit: usize) -> Self {
        self.octet_limit = limit;
        self
    }

    pub fn integer_form(mut self, form: IntegerForm) -> Self {
        self.integer_form = form;
        self
    }

    /// How long a poll may go unanswered before it is abandoned.
    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Most varbinds per request. Values below one are raised to one.
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Use a fixed request-id sequence instead of a time-seeded one.
    pub fn request_ids(mut self, ids: RequestIdGen) -> Self {
        self.request_ids = Some(ids);
        self
    }

    pub fn build<T: Transport, C: Clock>(self, transport: T, clock: C) -> Manager<T, C> {
        tracing::debug!(
            target: "embedded_snmp::manager",
            { snmp.local_addr = %transport.local_addr(), timeout_ms = self.timeout_ms },
            "manager ready"
        );
        Manager {
            dispatcher: Dispatcher::responses_only(
                self.max_packet_size,
                self.octet_limit,
                self.integer_form,
            ),
            transport,
            clock,
            devices: Vec::new(),
            pollers: Vec::new(),
            next_poller: 1,
            request_ids: self.request_ids.unwrap_or_default(),
            timeout_ms: self.timeout_ms,
            batch_size: self.batch_size,
            buf: Vec::new(),
        }
    }
}

impl Default for ManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Poller of remote SNMP values over a non-blocking transport.
pub struct Manager<T = UdpTransport, C = SystemClock> {
    dispatcher: Dispatcher,
    transport: T,
    clock: C,
    devices: Vec<DeviceEntry>,
    pollers: Vec<Poller>,
    next_poller: u64,
    request_ids: RequestIdGen,
    timeout_ms: u64,
    batch_size: usize,
    buf: Vec<u8>,
}

impl Manager {
    pub fn builder() -> ManagerBuilder {
        ManagerBuilder::new()
    }
}

impl<T: Transport, C: Clock> Manager<T, C> {
    // ------------------------------------------------------------------
    // Devices and pollers
    // ------------------------------------------------------------------

    /// Register a device. A device already known by address keeps its id
    /// and takes the new version and community.
    pub fn add_device(&mut self, device: Device) -> DeviceId {
        let addr = device.addr;
        if let Some(index) = self.devices.iter().position(|e| e.device.addr == addr) {
            self.devices[index].device = device;
            return DeviceId(index);
        }
        self.devices.push(DeviceEntry {
            device,
            registry: Registry::new(),
        });
        DeviceId(self.devices.len() - 1)
    }

    pub fn device(&self, id: DeviceId) -> Option<&Device> {
        self.devices.get(id.0).map(|e| &e.device)
    }

    /// Bindings fed by responses from a device.
    pub fn device_registry(&self, id: DeviceId) -> Option<&Registry> {
        self.devices.get(id.0).map(|e| &e.registry)
    }

    /// Poll `oid` on `device` every `interval_ms`, writing the value into
    /// `binding`.
    pub fn add_poller(
        &mut self,
        device: DeviceId,
        oid: Oid,
        binding: Binding,
        interval_ms: u64,
    ) -> Result<PollerId> {
        let entry = self
            .devices
            .get_mut(device.0)
            .ok_or(Error::UnknownDevice { index: device.0 })?;
        let callback = entry.registry.add(oid.clone(), binding, false)?;

        let id = PollerId(self.next_poller);
        self.next_poller += 1;
        tracing::debug!(
            target: "embedded_snmp::manager",
            { snmp.target = %entry.device.addr, %oid, interval_ms },
            "added poller"
        );
        self.pollers.push(Poller {
            id,
            device,
            oid,
            callback,
            info: PollingInfo::new(interval_ms),
        });
        Ok(id)
    }

    pub fn add_integer_poller(
        &mut self,
        device: DeviceId,
        oid: Oid,
        cell: SharedI32,
        interval_ms: u64,
    ) -> Result<PollerId> {
        self.add_poller(device, oid, Binding::integer(cell), interval_ms)
    }

    /// Strings longer than `max_len` are not stored.
    pub fn add_string_poller(
        &mut self,
        device: DeviceId,
        oid: Oid,
        cell: SharedBytes,
        max_len: usize,
        interval_ms: u64,
    ) -> Result<PollerId> {
        self.add_poller(device, oid, Binding::string(cell, max_len), interval_ms)
    }

    /// Stop polling. A response already in flight is then ignored.
    pub fn remove_poller(&mut self, id: PollerId) -> bool {
        let Some(index) = self.pollers.iter().position(|p| p.id == id) else {
            return false;
        };
        let poller = self.pollers.remove(index);
        if let Some(entry) = self.devices.get_mut(poller.device.0) {
            entry.registry.remove(poller.callback);
        }
        true
    }

    pub fn poller(&self, id: PollerId) -> Option<&Poller> {
        self.pollers.iter().find(|p| p.id == id)
    }

    pub fn pollers(&self) -> impl Iterator<Item = &Poller> {
        self.pollers.iter()
    }

    // ------------------------------------------------------------------
    // Polling loop
    // ------------------------------------------------------------------

    /// Abandon timed-out polls, send one batch of due polls, then handle
    /// at most one waiting datagram.
    pub fn poll(&mut self) -> HandleOutcome {
        let now = self.clock.now_ms();
        self.teardown_timed_out(now);
        self.send_due(now);
        self.poll_packet(now)
    }

    fn teardown_timed_out(&mut self, now: u64) {
        for poller in &mut self.pollers {
            if poller.info.has_timed_out(now, self.timeout_ms) {
                tracing::debug!(
                    target: "embedded_snmp::manager",
                    { snmp.request_id = poller.info.last_request_id, oid = %poller.oid },
                    "poll timed out"
                );
                self.dispatcher.forget(poller.info.last_request_id);
                poller.info.reset(false, now);
            }
        }
    }

    /// Send one GetRequest covering up to the batch size of due pollers,
    /// all for the device of the first due poller. Returns its request id.
    ///
    /// A failed send is logged and left to time out.
    fn send_due(&mut self, now: u64) -> Option<i32> {
        let device = self
            .pollers
            .iter()
            .find(|p| p.info.should_poll(now))?
            .device;
        let Some(entry) = self.devices.get(device.0) else {
            return None;
        };

        let batch: Vec<usize> = self
            .pollers
            .iter()
            .enumerate()
            .filter(|(_, p)| p.device == device && p.info.should_poll(now))
            .map(|(index, _)| index)
            .take(self.batch_size)
            .collect();
        let oids: Vec<Oid> = batch
            .iter()
            .map(|&index| self.pollers[index].oid.clone())
            .collect();

        let request_id = self.request_ids.next_id();
        let request = SnmpPacket::request(
            entry.device.version,
            entry.device.community.clone(),
            PduType::GetRequest,
            request_id,
            &oids,
        );
        let form = self.dispatcher.integer_form();
        let max = self.dispatcher.max_packet_size();
        let bytes = match request.serialise(form, max) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(
                    target: "embedded_snmp::manager",
                    { snmp.target = %entry.device.addr, error = %e },
                    "failed to build poll request"
                );
                return None;
            }
        };

        tracing::debug!(
            target: "embedded_snmp::manager",
            {
                snmp.target = %entry.device.addr,
                snmp.request_id = request_id,
                varbinds = oids.len(),
            },
            "sending poll"
        );
        if let Err(e) = self.transport.send_to(&bytes, entry.device.addr) {
            tracing::warn!(
                target: "embedded_snmp::manager",
                { snmp.target = %entry.device.addr, error = %e },
                "failed to send poll"
            );
        }

        self.dispatcher.track(request_id, PduType::GetRequest);
        for index in batch {
            self.pollers[index].info.send(request_id, now);
        }
        Some(request_id)
    }

    fn poll_packet(&mut self, now: u64) -> HandleOutcome {
        let max = self.dispatcher.max_packet_size();
        self.buf.resize(max + 1, 0);

        let (len, source) = match self.transport.recv_from(&mut self.buf) {
            Ok(Some(received)) => received,
            Ok(None) => return HandleOutcome::NoPacket,
            Err(e) => {
                tracing::warn!(target: "embedded_snmp::manager", { error = %e }, "receive failed");
                return HandleOutcome::TransportError;
            }
        };
        if len > max {
            tracing::warn!(
                target: "embedded_snmp::manager",
                { snmp.source = %source, max },
                "incoming packet too large"
            );
            return HandleOutcome::RequestTooLarge;
        }

        let device = self.devices.iter().position(|e| e.device.addr == source);
        let unknown = Registry::new();
        let registry = match device {
            Some(index) => &self.devices[index].registry,
            None => {
                tracing::debug!(
                    target: "embedded_snmp::manager",
                    { snmp.source = %source },
                    "packet from unknown device"
                );
                &unknown
            }
        };
        let dispatch = self.dispatcher.handle_packet(&self.buf[..len], registry);

        if dispatch.outcome == HandleOutcome::ResponseReceived
            && let (Some(response), Some(device)) = (&dispatch.request, device)
        {
            self.complete_polls(DeviceId(device), response, now);
        }
        dispatch.outcome
    }

    /// Clear the in-flight state of pollers answered by `response`.
    fn complete_polls(&mut self, device: DeviceId, response: &SnmpPacket, now: u64) {
        let request_id = response.request_id();
        for (position, varbind) in response.varbinds.iter().enumerate() {
            let success = !response_failed(response, position);
            for poller in &mut self.pollers {
                if poller.device == device
                    && poller.info.on_wire
                    && poller.info.last_request_id == request_id
                    && poller.oid == varbind.oid
                {
                    poller.info.reset(success, now);
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }
}
