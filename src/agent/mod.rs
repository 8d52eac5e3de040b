//! SNMP agent.
//!
//! An [`Agent`] answers Get, GetNext, GetBulk and Set requests from its
//! [`Registry`] and originates traps and informs. It does no I/O on its
//! own: each call to [`Agent::poll`] handles at most one waiting datagram
//! and then services the inform retry queue.
//!
//! # Example
//!
//! ```rust,no_run
//! use embedded_snmp::agent::Agent;
//! use embedded_snmp::clock::SystemClock;
//! use embedded_snmp::registry::shared_i32;
//! use embedded_snmp::transport::UdpTransport;
//!
//! # async fn example() -> embedded_snmp::Result<()> {
//! let transport = UdpTransport::bind("0.0.0.0:161".parse().unwrap())?;
//! let mut agent = Agent::builder()
//!     .community("private")
//!     .read_only_community("public")
//!     .oid_prefix(".1.3.6.1.4.1.5")
//!     .build(transport, SystemClock::new())?;
//!
//! let temperature = shared_i32(23);
//! agent.add_integer_handler("1", temperature.clone(), false)?;
//!
//! loop {
//!     agent.transport().readable().await?;
//!     agent.poll();
//! }
//! # }
//! ```

mod dispatch;
mod set_handler;

pub use dispatch::*;

use std::net::SocketAddr;

use bytes::Bytes;

use crate::ber::{DEFAULT_OCTET_STRING_LIMIT, IntegerForm};
use crate::clock::{Clock, SystemClock};
use crate::error::{Error, OidErrorKind, Result};
use crate::notification::{InformItem, InformQueue, Trap, TrapId};
use crate::oid::{DOTTED_PREFIX, Oid};
use crate::packet::RequestIdGen;
use crate::pdu::PduType;
use crate::registry::{
    Binding, CallbackId, Registry, SharedBytes, SharedI32, SharedU32, SharedU64, ValueCallback,
};
use crate::transport::{Transport, UdpTransport};

/// Default maximum datagram size, in and out.
pub const DEFAULT_MAX_PACKET_SIZE: usize = 1400;

/// Default read-write community.
pub const DEFAULT_COMMUNITY: &str = "public";

/// Builder for [`Agent`].
///
/// Defaults:
/// - Read-write community: `public`
/// - No read-only community
/// - Max packet size: 1400 bytes
/// - OCTET STRING limit: 500 bytes
/// - Integer form: [`IntegerForm::Fixed4`]
/// - No OID prefix
pub struct AgentBuilder {
    community: Bytes,
    read_only_community: Option<Bytes>,
    max_packet_size: usize,
    octet_limit: usize,
    integer_form: IntegerForm,
    oid_prefix: Option<String>,
    request_ids: Option<RequestIdGen>,
}

impl AgentBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self {
            community: Bytes::from_static(DEFAULT_COMMUNITY.as_bytes()),
            read_only_community: None,
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
            octet_limit: DEFAULT_OCTET_STRING_LIMIT,
            integer_form: IntegerForm::default(),
            oid_prefix: None,
            request_ids: None,
        }
    }

    /// Community granting read-write access.
    pub fn community(mut self, community: impl Into<Bytes>) -> Self {
        self.community = community.into();
        self
    }

    /// Community granting read-only access.
    pub fn read_only_community(mut self, community: impl Into<Bytes>) -> Self {
        self.read_only_community = Some(community.into());
        self
    }

    /// Largest datagram accepted or sent. Larger requests are dropped.
    pub fn max_packet_size(mut self, size: usize) -> Self {
        self.max_packet_size = size;
        self
    }

    /// Largest OCTET STRING or Opaque accepted in a request.
    pub fn octet_limit(mut self, limit: usize) -> Self {
        self.octet_limit = limit;
        self
    }

    /// Wire form for INTEGER values in responses and traps.
    pub fn integer_form(mut self, form: IntegerForm) -> Self {
        self.integer_form = form;
        self
    }

    /// Prefix prepended to relative OIDs given to the `add_*_handler` methods.
    pub fn oid_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.oid_prefix = Some(prefix.into());
        self
    }

    /// Use a fixed request-id sequence instead of a time-seeded one.
    pub fn request_ids(mut self, ids: RequestIdGen) -> Self {
        self.request_ids = Some(ids);
        self
    }

    /// Build the agent.
    ///
    /// Fails if the OID prefix does not parse.
    pub fn build<T: Transport, C: Clock>(self, transport: T, clock: C) -> Result<Agent<T, C>> {
        let oid_prefix = match self.oid_prefix {
            Some(prefix) => Some(Oid::parse(&prefix)?),
            None => None,
        };
        tracing::debug!(
            target: "embedded_snmp::agent",
            { snmp.local_addr = %transport.local_addr(), max_packet_size = self.max_packet_size },
            "agent ready"
        );
        Ok(Agent {
            dispatcher: Dispatcher::new(
                self.community,
                self.read_only_community,
                self.max_packet_size,
                self.octet_limit,
                self.integer_form,
            ),
            registry: Registry::new(),
            transport,
            clock,
            informs: InformQueue::new(),
            request_ids: self.request_ids.unwrap_or_default(),
            oid_prefix,
            set_occurred: false,
            buf: Vec::new(),
        })
    }
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// SNMP v1/v2c agent over a non-blocking transport.
pub struct Agent<T = UdpTransport, C = SystemClock> {
    dispatcher: Dispatcher,
    registry: Registry,
    transport: T,
    clock: C,
    informs: InformQueue,
    request_ids: RequestIdGen,
    oid_prefix: Option<Oid>,
    set_occurred: bool,
    buf: Vec<u8>,
}

impl Agent {
    /// Create a builder.
    pub fn builder() -> AgentBuilder {
        AgentBuilder::new()
    }
}

impl<T: Transport, C: Clock> Agent<T, C> {
    // ------------------------------------------------------------------
    // Request loop
    // ------------------------------------------------------------------

    /// Handle at most one waiting datagram, then service the inform queue.
    pub fn poll(&mut self) -> HandleOutcome {
        let outcome = self.poll_packet();
        self.sweep_informs();
        outcome
    }

    fn poll_packet(&mut self) -> HandleOutcome {
        let max = self.dispatcher.max_packet_size();
        // one spare byte tells an exactly-full datagram from a truncated one
        self.buf.resize(max + 1, 0);

        let (len, source) = match self.transport.recv_from(&mut self.buf) {
            Ok(Some(received)) => received,
            Ok(None) => return HandleOutcome::NoPacket,
            Err(e) => {
                tracing::warn!(target: "embedded_snmp::agent", { error = %e }, "receive failed");
                return HandleOutcome::TransportError;
            }
        };
        tracing::trace!(
            target: "embedded_snmp::agent",
            { snmp.source = %source, snmp.bytes = len },
            "received packet"
        );

        if len > max {
            tracing::warn!(
                target: "embedded_snmp::agent",
                { snmp.source = %source, max },
                "incoming packet too large"
            );
            return HandleOutcome::RequestTooLarge;
        }

        self.registry.ensure_sorted();
        let data = &self.buf[..len];
        let dispatch = self.dispatcher.handle_packet(data, &self.registry);

        if dispatch.outcome == HandleOutcome::InformResponse
            && let Some(request) = &dispatch.request
        {
            self.informs.acknowledge(request.request_id());
        }

        if let Some(response) = &dispatch.response {
            tracing::debug!(
                target: "embedded_snmp::agent",
                { snmp.source = %source, outcome = %dispatch.outcome },
                "sending response"
            );
            if let Err(e) = self.transport.send_to(response, source) {
                tracing::warn!(
                    target: "embedded_snmp::agent",
                    { snmp.source = %source, error = %e },
                    "failed to send response"
                );
            }
        }

        if dispatch.outcome == HandleOutcome::Set {
            self.set_occurred = true;
        }
        dispatch.outcome
    }

    fn sweep_informs(&mut self) {
        if self.informs.is_empty() {
            return;
        }
        let now = self.clock.now_ms();
        let transport = &mut self.transport;
        let purged = self
            .informs
            .sweep(now, |packet, target| transport.send_to(packet, target));
        for request_id in purged {
            self.dispatcher.forget(request_id);
        }
    }

    // ------------------------------------------------------------------
    // Traps
    // ------------------------------------------------------------------

    /// Build and send `trap` to `target`. Returns the request id used.
    ///
    /// With `replace_queued`, pending informs from earlier sends of the same
    /// trap are dropped first. Informs are queued for up to `retries`
    /// resends, `delay_ms` apart, until acknowledged; a failed first send
    /// is reported but the inform stays queued.
    pub fn send_trap_to(
        &mut self,
        trap: &Trap,
        target: SocketAddr,
        replace_queued: bool,
        retries: u32,
        delay_ms: u64,
    ) -> Result<i32> {
        let request_id = self.request_ids.next_id();
        let packet = trap.build_packet(request_id, self.clock.uptime_ticks());
        let bytes = packet.serialise(
            self.dispatcher.integer_form(),
            self.dispatcher.max_packet_size(),
        )?;

        if replace_queued {
            self.remove_trap(trap.id());
        }

        if trap.is_inform() {
            self.informs.push(InformItem {
                request_id,
                target,
                retries,
                delay_ms,
                last_sent: self.clock.now_ms(),
                received: false,
                missed: false,
                trap_id: trap.id(),
                packet: bytes.clone(),
            });
            self.dispatcher.track(request_id, PduType::InformRequest);
        }

        tracing::debug!(
            target: "embedded_snmp::agent",
            {
                snmp.target = %target,
                snmp.request_id = request_id,
                snmp.pdu_type = %trap.pdu_type(),
            },
            "sending notification"
        );
        self.transport.send_to(&bytes, target)?;
        Ok(request_id)
    }

    /// Stop retrying informs sent for a trap.
    pub fn remove_trap(&mut self, trap: TrapId) {
        for request_id in self.informs.remove_trap(trap) {
            self.dispatcher.forget(request_id);
        }
    }

    pub fn informs(&self) -> &InformQueue {
        &self.informs
    }

    // ------------------------------------------------------------------
    // Registry
    // ------------------------------------------------------------------

    /// Resolve an OID string against the agent's prefix.
    ///
    /// Strings starting with `.1.3.` are absolute. Anything else is
    /// appended to the prefix when one is configured.
    pub fn resolve_oid(&self, oid: &str) -> Result<Oid> {
        match &self.oid_prefix {
            Some(prefix) if !oid.starts_with(DOTTED_PREFIX) => {
                let relative = oid.trim_start_matches('.');
                if relative.is_empty() {
                    return Err(Error::invalid_oid_with_input(OidErrorKind::Empty, oid));
                }
                Oid::parse(&format!("{}.{}", prefix.to_dotted_string(), relative))
            }
            _ => Oid::parse(oid),
        }
    }

    /// Register a binding at an already-resolved OID.
    pub fn add_handler(
        &mut self,
        oid: Oid,
        binding: Binding,
        settable: bool,
    ) -> Result<CallbackId> {
        self.registry.add(oid, binding, settable)
    }

    fn add(&mut self, oid: &str, binding: Binding, settable: bool) -> Result<CallbackId> {
        let oid = self.resolve_oid(oid)?;
        self.registry.add(oid, binding, settable)
    }

    pub fn add_integer_handler(
        &mut self,
        oid: &str,
        cell: SharedI32,
        settable: bool,
    ) -> Result<CallbackId> {
        self.add(oid, Binding::integer(cell), settable)
    }

    /// Integer cell reported divided by `modifier`.
    pub fn add_scaled_integer_handler(
        &mut self,
        oid: &str,
        cell: SharedI32,
        modifier: i32,
        settable: bool,
    ) -> Result<CallbackId> {
        self.add(oid, Binding::Integer { cell, modifier }, settable)
    }

    pub fn add_read_only_integer_handler(&mut self, oid: &str, value: i32) -> Result<CallbackId> {
        self.add(oid, Binding::dynamic_integer(move || Some(value)), false)
    }

    pub fn add_dynamic_integer_handler(
        &mut self,
        oid: &str,
        f: impl Fn() -> Option<i32> + Send + Sync + 'static,
    ) -> Result<CallbackId> {
        self.add(oid, Binding::dynamic_integer(f), false)
    }

    pub fn add_read_write_string_handler(
        &mut self,
        oid: &str,
        cell: SharedBytes,
        max_len: usize,
        settable: bool,
    ) -> Result<CallbackId> {
        self.add(oid, Binding::string(cell, max_len), settable)
    }

    pub fn add_read_only_static_string_handler(
        &mut self,
        oid: &str,
        value: impl Into<Bytes>,
    ) -> Result<CallbackId> {
        self.add(oid, Binding::StaticString(value.into()), false)
    }

    pub fn add_dynamic_read_only_string_handler(
        &mut self,
        oid: &str,
        f: impl Fn() -> Option<Bytes> + Send + Sync + 'static,
    ) -> Result<CallbackId> {
        self.add(oid, Binding::dynamic_string(f), false)
    }

    pub fn add_opaque_handler(
        &mut self,
        oid: &str,
        cell: SharedBytes,
        max_len: usize,
        settable: bool,
    ) -> Result<CallbackId> {
        self.add(oid, Binding::Opaque { cell, max_len }, settable)
    }

    pub fn add_timestamp_handler(
        &mut self,
        oid: &str,
        cell: SharedU32,
        settable: bool,
    ) -> Result<CallbackId> {
        self.add(oid, Binding::TimeTicks(cell), settable)
    }

    pub fn add_dynamic_read_only_timestamp_handler(
        &mut self,
        oid: &str,
        f: impl Fn() -> Option<u32> + Send + Sync + 'static,
    ) -> Result<CallbackId> {
        self.add(oid, Binding::dynamic_timeticks(f), false)
    }

    pub fn add_oid_handler(&mut self, oid: &str, value: Oid) -> Result<CallbackId> {
        self.add(oid, Binding::Oid(value), false)
    }

    pub fn add_counter32_handler(&mut self, oid: &str, cell: SharedU32) -> Result<CallbackId> {
        self.add(oid, Binding::Counter32(cell), false)
    }

    pub fn add_gauge_handler(&mut self, oid: &str, cell: SharedU32) -> Result<CallbackId> {
        self.add(oid, Binding::Gauge32(cell), false)
    }

    pub fn add_counter64_handler(&mut self, oid: &str, cell: SharedU64) -> Result<CallbackId> {
        self.add(oid, Binding::Counter64(cell), false)
    }

    /// Remove a handler. The bound value is left alone.
    pub fn remove_handler(&mut self, id: CallbackId) -> bool {
        self.registry.remove(id)
    }

    /// Sort the registry now rather than on the next request.
    pub fn sort_handlers(&mut self) {
        self.registry.sort();
    }

    pub fn handler(&self, id: CallbackId) -> Option<&std::sync::Arc<ValueCallback>> {
        self.registry.get(id)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    // ------------------------------------------------------------------
    // State
    // ------------------------------------------------------------------

    /// True once a SET has been answered since the last reset.
    pub fn set_occurred(&self) -> bool {
        self.set_occurred
    }

    /// Clear the agent flag and every handler's flag.
    pub fn reset_set_occurred(&mut self) {
        self.set_occurred = false;
        self.registry.reset_set_occurred();
    }

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

impl<T: Transport, C: Clock + Clone + 'static> Agent<T, C> {
    /// Serve the agent's own uptime as TimeTicks at `oid`.
    pub fn add_uptime_handler(&mut self, oid: &str) -> Result<CallbackId> {
        let clock = self.clock.clone();
        let uptime = Binding::dynamic_timeticks(move || Some(clock.uptime_ticks()));
        self.add(oid, uptime, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::packet::SnmpPacket;
    use crate::registry::shared_i32;
    use crate::transport::{MemoryNetwork, MemoryTransport};
    use crate::value::Value;
    use crate::varbind::VarBind;
    use crate::version::Version;

    const AGENT: ([u8; 4], u16) = ([10, 0, 0, 1], 161);
    const MANAGER: ([u8; 4], u16) = ([10, 0, 0, 2], 40000);

    fn setup(prefix: Option<&str>) -> (Agent<MemoryTransport, ManualClock>, MemoryNetwork) {
        let net = MemoryNetwork::new();
        let mut builder = Agent::builder().request_ids(RequestIdGen::starting_at(100));
        if let Some(prefix) = prefix {
            builder = builder.oid_prefix(prefix);
        }
        let agent = builder
            .build(net.endpoint(AGENT.into()), ManualClock::new(0))
            .unwrap();
        net.endpoint(MANAGER.into());
        (agent, net)
    }

    #[test]
    fn test_resolve_oid() {
        let (agent, _) = setup(Some(".1.3.6.1.4.1.5"));
        let resolved = |oid: &str| agent.resolve_oid(oid).unwrap().to_dotted_string().to_owned();
        assert_eq!(resolved("1.2"), ".1.3.6.1.4.1.5.1.2");
        assert_eq!(resolved(".1.2"), ".1.3.6.1.4.1.5.1.2");
        assert_eq!(resolved(".1.3.6.1.2.1"), ".1.3.6.1.2.1");
        assert!(agent.resolve_oid(".").is_err());

        let (plain, _) = setup(None);
        assert!(plain.resolve_oid("1.2").is_err());
    }

    #[test]
    fn test_poll_no_packet() {
        let (mut agent, _) = setup(None);
        assert_eq!(agent.poll(), HandleOutcome::NoPacket);
    }

    #[test]
    fn test_poll_answers_get() {
        let (mut agent, net) = setup(Some(".1.3.6.1.4.1.5"));
        agent
            .add_integer_handler("1", shared_i32(23), false)
            .unwrap();

        let request = SnmpPacket::request(
            Version::V2c,
            "public",
            PduType::GetRequest,
            9,
            &[Oid::from_dotted_string(".1.3.6.1.4.1.5.1")],
        );
        let bytes = request.serialise(IntegerForm::Fixed4, 1400).unwrap();
        net.inject(bytes, MANAGER.into(), AGENT.into());
        assert_eq!(agent.poll(), HandleOutcome::Get);

        let sent = net.take_sent_to(MANAGER.into());
        assert_eq!(sent.len(), 1);
        let response = SnmpPacket::parse(&sent[0]).unwrap();
        assert_eq!(response.request_id(), 9);
        assert_eq!(response.varbinds[0].value, Value::Integer(23));
    }

    #[test]
    fn test_oversized_datagram() {
        let (mut agent, net) = setup(None);
        net.inject(vec![0x30u8; 1401], MANAGER.into(), AGENT.into());
        assert_eq!(agent.poll(), HandleOutcome::RequestTooLarge);
        assert!(net.take_sent_to(MANAGER.into()).is_empty());
    }

    #[test]
    fn test_set_flag() {
        let (mut agent, net) = setup(None);
        let cell = shared_i32(0);
        agent
            .add_integer_handler(".1.3.6.1.4.1.5.1", cell.clone(), true)
            .unwrap();

        let mut request = SnmpPacket::new(Version::V2c, "public", PduType::SetRequest);
        request.set_request_id(3);
        let oid = Oid::from_dotted_string(".1.3.6.1.4.1.5.1");
        let value = Value::Integer(4);
        request.varbinds.push(VarBind::new(oid, value));
        let bytes = request.serialise(IntegerForm::Fixed4, 1400).unwrap();
        net.inject(bytes, MANAGER.into(), AGENT.into());

        assert_eq!(agent.poll(), HandleOutcome::Set);
        assert!(agent.set_occurred());
        assert!(agent.registry().any_set_occurred());
        agent.reset_set_occurred();
        assert!(!agent.set_occurred());
        assert!(!agent.registry().any_set_occurred());
    }

    #[test]
    fn test_uptime_handler() {
        let (mut agent, _) = setup(None);
        let id = agent.add_uptime_handler(".1.3.6.1.2.1.1.3.0").unwrap();
        agent.clock().advance(12_340);
        let uptime = agent.handler(id).unwrap().get_value();
        assert_eq!(uptime, Some(Value::TimeTicks(1234)));
    }
}
