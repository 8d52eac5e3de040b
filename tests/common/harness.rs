//! An agent on an in-memory network with a hand-driven clock.

use embedded_snmp::agent::{Agent, AgentBuilder, HandleOutcome};
use embedded_snmp::ber::IntegerForm;
use embedded_snmp::clock::ManualClock;
use embedded_snmp::packet::{RequestIdGen, SnmpPacket};
use embedded_snmp::pdu::PduType;
use embedded_snmp::registry::{SharedBytes, SharedI32, shared_bytes, shared_i32};
use embedded_snmp::transport::{MemoryNetwork, MemoryTransport};
use embedded_snmp::{Oid, Trap, Version};

use super::fixtures::*;

pub type TestAgent = Agent<MemoryTransport, ManualClock>;

/// What one request produced: the agent's outcome and the parsed reply.
pub type Reply = (HandleOutcome, Option<SnmpPacket>);

pub struct Harness {
    pub net: MemoryNetwork,
    pub clock: ManualClock,
    pub agent: TestAgent,
}

impl Harness {
    /// Agent with `private` read-write, `public` read-only and the
    /// enterprise prefix.
    pub fn new() -> Self {
        Self::with_builder(
            Agent::builder()
                .community(COMMUNITY_RW)
                .read_only_community(COMMUNITY_RO)
                .oid_prefix(ENTERPRISE),
        )
    }

    pub fn with_builder(builder: AgentBuilder) -> Self {
        let net = MemoryNetwork::new();
        let clock = ManualClock::new(0);
        let agent = builder
            .request_ids(RequestIdGen::starting_at(1000))
            .build(net.endpoint(agent_addr()), clock.clone())
            .expect("agent builds");
        net.endpoint(manager_addr());
        net.endpoint(trap_receiver_addr());
        Self { net, clock, agent }
    }

    // =========================================================================
    // Objects
    // =========================================================================

    /// Register an integer cell at `oid`, relative to the enterprise prefix.
    pub fn integer(&mut self, oid: &str, value: i32, settable: bool) -> SharedI32 {
        let cell = shared_i32(value);
        self.agent
            .add_integer_handler(oid, cell.clone(), settable)
            .expect("integer handler registers");
        cell
    }

    /// Register a writable string buffer at `oid`.
    pub fn string(&mut self, oid: &str, value: &[u8], max_len: usize) -> SharedBytes {
        let cell = shared_bytes(value.to_vec());
        self.agent
            .add_read_write_string_handler(oid, cell.clone(), max_len, true)
            .expect("string handler registers");
        cell
    }

    // =========================================================================
    // Requests
    // =========================================================================

    /// Deliver `packet` to the agent from the manager address.
    pub fn send(&self, packet: &SnmpPacket) {
        let bytes = packet
            .serialise(IntegerForm::Fixed4, 65535)
            .expect("request encodes");
        self.net.inject(bytes, manager_addr(), agent_addr());
    }

    /// Deliver raw bytes to the agent from the manager address.
    pub fn send_raw(&self, bytes: &[u8]) {
        let data = bytes.to_vec();
        self.net.inject(data, manager_addr(), agent_addr());
    }

    /// Send `packet`, poll once, and parse whatever came back.
    pub fn exchange(&mut self, packet: &SnmpPacket) -> Reply {
        self.send(packet);
        let outcome = self.agent.poll();
        (outcome, self.take_response())
    }

    /// Build and exchange a request for `oids`.
    pub fn request(
        &mut self,
        version: Version,
        community: &str,
        pdu_type: PduType,
        request_id: i32,
        oids: &[Oid],
    ) -> Reply {
        let community = community.to_string();
        let packet = SnmpPacket::request(version, community, pdu_type, request_id, oids);
        self.exchange(&packet)
    }

    /// A v2c request made with the read-only community.
    pub fn read(&mut self, pdu_type: PduType, oids: &[Oid]) -> Reply {
        self.request(Version::V2c, COMMUNITY_RO, pdu_type, 1, oids)
    }

    /// Send `trap` to the trap receiver and return its request id.
    pub fn send_trap(&mut self, trap: &Trap, replace: bool, retries: u32, delay_ms: u64) -> i32 {
        let target = trap_receiver_addr();
        self.agent
            .send_trap_to(trap, target, replace, retries, delay_ms)
            .expect("trap sends")
    }

    // =========================================================================
    // Replies
    // =========================================================================

    /// Raw bytes of every response sent to the manager, clearing them.
    pub fn take_raw_responses(&self) -> Vec<bytes::Bytes> {
        self.net.take_sent_to(manager_addr())
    }

    /// The single response sent to the manager, if any.
    pub fn take_response(&self) -> Option<SnmpPacket> {
        let mut sent = self.take_raw_responses();
        assert!(sent.len() <= 1, "expected one response, got {}", sent.len());
        let bytes = sent.pop()?;
        Some(SnmpPacket::parse(&bytes).expect("response parses"))
    }

    /// Every notification sent to the trap receiver, clearing them.
    pub fn take_notifications(&self) -> Vec<SnmpPacket> {
        self.net
            .take_sent_to(trap_receiver_addr())
            .iter()
            .map(|bytes| SnmpPacket::parse(bytes).expect("notification parses"))
            .collect()
    }
}
