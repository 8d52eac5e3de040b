//! SNMP message parsing and building.
//!
//! Parsing walks the decoded top-level SEQUENCE field by field:
//! version, community, PDU, request-id, error-status, error-index, the
//! varbind list, then each varbind. Every failure is reported with the
//! [`ParseState`] it happened in, so a malformed community is told apart
//! from a malformed varbind.
//!
//! Building is the inverse. A packet parsed from the wire keeps the decoded
//! version, community and request-id containers and reuses them when it is
//! turned into its response.

use std::sync::atomic::{AtomicI32, Ordering};

use bytes::Bytes;

use crate::ber::{Decoder, IntegerForm, tag};
use crate::error::{
    DecodeErrorKind, Error, ErrorStatus, ParseErrorKind, ParseState, Result,
};
use crate::oid::Oid;
use crate::pdu::PduType;
use crate::value::Value;
use crate::varbind::VarBind;
use crate::version::Version;

/// Leading fields of an SNMPv1 Trap-PDU, which replace request-id and the
/// error fields.
#[derive(Debug, Clone, PartialEq)]
pub struct TrapV1Header {
    /// Enterprise OID (sysObjectID of the sender)
    pub enterprise: Oid,
    /// Agent address
    pub agent_addr: [u8; 4],
    /// Generic trap number
    pub generic_trap: i32,
    /// Specific trap number
    pub specific_trap: i32,
    /// sysUpTime at the time of the trap
    pub timestamp: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Cached {
    version: Option<Value>,
    community: Option<Value>,
    request_id: Option<Value>,
}

/// An SNMP v1/v2c message.
///
/// For GetBulkRequest the error-status and error-index slots carry
/// non-repeaters and max-repetitions; see [`non_repeaters`](Self::non_repeaters)
/// and [`max_repetitions`](Self::max_repetitions).
#[derive(Debug, Clone, PartialEq)]
pub struct SnmpPacket {
    version: Version,
    community: Bytes,
    request_id: i32,
    /// PDU type
    pub pdu_type: PduType,
    /// Raw error-status slot
    pub error_status: i32,
    /// Raw error-index slot
    pub error_index: i32,
    /// Variable bindings
    pub varbinds: Vec<VarBind>,
    /// v1 trap header, present only for [`PduType::TrapV1`]
    pub trap_v1: Option<TrapV1Header>,
    cached: Cached,
}

impl SnmpPacket {
    /// Create an empty packet of the given type.
    pub fn new(version: Version, community: impl Into<Bytes>, pdu_type: PduType) -> Self {
        Self {
            version,
            community: community.into(),
            request_id: 0,
            pdu_type,
            error_status: 0,
            error_index: 0,
            varbinds: Vec::new(),
            trap_v1: None,
            cached: Cached::default(),
        }
    }

    /// Create a request carrying NULL-valued varbinds for each OID.
    pub fn request(
        version: Version,
        community: impl Into<Bytes>,
        pdu_type: PduType,
        request_id: i32,
        oids: &[Oid],
    ) -> Self {
        let mut packet = Self::new(version, community, pdu_type);
        packet.request_id = request_id;
        packet.varbinds = oids.iter().cloned().map(VarBind::null).collect();
        packet
    }

    /// Start the response to this request.
    ///
    /// Keeps version, community and request-id (with their cached
    /// containers); the varbind list and error fields start empty.
    pub fn to_response(&self) -> Self {
        Self {
            version: self.version,
            community: self.community.clone(),
            request_id: self.request_id,
            pdu_type: PduType::GetResponse,
            error_status: 0,
            error_index: 0,
            varbinds: Vec::new(),
            trap_v1: None,
            cached: self.cached.clone(),
        }
    }

    // ------------------------------------------------------------------
    // Accessors and cache-invalidating setters
    // ------------------------------------------------------------------

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn community(&self) -> &[u8] {
        &self.community
    }

    pub fn request_id(&self) -> i32 {
        self.request_id
    }

    pub fn set_version(&mut self, version: Version) {
        self.cached.version = None;
        self.version = version;
    }

    pub fn set_community(&mut self, community: impl Into<Bytes>) {
        self.cached.community = None;
        self.community = community.into();
    }

    pub fn set_request_id(&mut self, request_id: i32) {
        self.cached.request_id = None;
        self.request_id = request_id;
    }

    /// Error status as an enum.
    pub fn error_status(&self) -> ErrorStatus {
        ErrorStatus::from_i32(self.error_status)
    }

    /// GetBulk non-repeaters (shares the error-status slot).
    pub fn non_repeaters(&self) -> i32 {
        self.error_status
    }

    /// GetBulk max-repetitions (shares the error-index slot).
    pub fn max_repetitions(&self) -> i32 {
        self.error_index
    }

    /// Set the GetBulk parameters.
    pub fn set_bulk_params(&mut self, non_repeaters: i32, max_repetitions: i32) {
        self.error_status = non_repeaters;
        self.error_index = max_repetitions;
    }

    // ------------------------------------------------------------------
    // Response assembly
    // ------------------------------------------------------------------

    /// Append a varbind to the response.
    pub fn add_response(&mut self, varbind: VarBind) {
        self.varbinds.push(varbind);
    }

    /// Append a varbind and, if it carries an error, flag the packet.
    ///
    /// The error index is the 1-based position of the varbind. The first
    /// flagged varbind sets the global status; later ones do not override it.
    pub fn add_error_response(&mut self, varbind: VarBind) {
        let index = self.varbinds.len() as i32 + 1;
        let status = varbind.error_status;
        self.varbinds.push(varbind);
        if status.is_error() {
            self.set_global_error(status, index, false);
        }
    }

    /// Set the packet-wide error status and index.
    ///
    /// An existing error is only replaced when `replace` is true.
    pub fn set_global_error(&mut self, status: ErrorStatus, index: i32, replace: bool) {
        if self.error_status == 0 || replace {
            self.error_status = status.as_i32();
            self.error_index = index;
        }
    }

    // ------------------------------------------------------------------
    // Parsing
    // ------------------------------------------------------------------

    /// Parse a message using the default octet string limit.
    pub fn parse(data: &[u8]) -> Result<Self> {
        Self::decode(Decoder::from_slice(data))
    }

    /// Parse a message from a configured decoder.
    ///
    /// The whole datagram must be one SEQUENCE; trailing bytes are rejected.
    pub fn decode(mut decoder: Decoder) -> Result<Self> {
        match decoder.peek_tag() {
            None => return Err(Error::decode(0, DecodeErrorKind::TruncatedData)),
            Some(tag::universal::SEQUENCE) => {}
            Some(actual) => {
                return Err(Error::parse(
                    ParseState::Message,
                    ParseErrorKind::UnexpectedTag {
                        expected: tag::universal::SEQUENCE,
                        actual,
                    },
                ));
            }
        }

        let message = Value::decode(&mut decoder)?;
        if !decoder.is_empty() {
            return Err(Error::decode(
                decoder.offset(),
                DecodeErrorKind::TrailingData {
                    remaining: decoder.remaining(),
                },
            ));
        }
        Self::from_value(&message)
    }

    /// Interpret an already-decoded message tree.
    pub fn from_value(message: &Value) -> Result<Self> {
        let children = message.children().unwrap_or(&[]);
        let mut fields = children.iter();

        let version_field = expect(fields.next(), ParseState::Version, tag::universal::INTEGER)?;
        let raw_version = version_field.as_i32().unwrap_or(-1);
        let version = Version::from_i32(raw_version).ok_or(Error::parse(
            ParseState::Version,
            ParseErrorKind::UnknownVersion(raw_version),
        ))?;

        let community_field = expect(
            fields.next(),
            ParseState::Community,
            tag::universal::OCTET_STRING,
        )?;
        let community = community_field
            .as_bytes()
            .map(Bytes::copy_from_slice)
            .unwrap_or_default();

        let pdu_field = fields
            .next()
            .ok_or(Error::parse(ParseState::Pdu, ParseErrorKind::MissingField))?;
        let pdu_type = PduType::from_tag(pdu_field.tag()).ok_or(Error::parse(
            ParseState::Pdu,
            ParseErrorKind::UnknownPduType(pdu_field.tag()),
        ))?;
        if fields.next().is_some() {
            return Err(Error::parse(ParseState::Done, ParseErrorKind::UnexpectedField));
        }

        let mut packet = Self::new(version, community, pdu_type);
        packet.cached.version = Some(version_field.clone());
        packet.cached.community = Some(community_field.clone());

        let pdu_children = pdu_field.children().unwrap_or(&[]);
        let mut fields = pdu_children.iter();

        if pdu_type == PduType::TrapV1 {
            packet.trap_v1 = Some(parse_trap_v1_header(&mut fields)?);
        } else {
            let integer = tag::universal::INTEGER;
            let request_id = expect(fields.next(), ParseState::RequestId, integer)?;
            packet.request_id = request_id.as_i32().unwrap_or_default();
            packet.cached.request_id = Some(request_id.clone());

            let status = expect(fields.next(), ParseState::ErrorStatus, integer)?;
            packet.error_status = status.as_i32().unwrap_or_default();

            let index = expect(fields.next(), ParseState::ErrorIndex, integer)?;
            packet.error_index = index.as_i32().unwrap_or_default();
        }

        let sequence = tag::universal::SEQUENCE;
        let list = expect(fields.next(), ParseState::VarBinds, sequence)?;
        for item in list.children().unwrap_or(&[]) {
            packet.varbinds.push(VarBind::from_value(item)?);
        }
        if fields.next().is_some() {
            return Err(Error::parse(ParseState::Done, ParseErrorKind::UnexpectedField));
        }

        Ok(packet)
    }

    // ------------------------------------------------------------------
    // Building
    // ------------------------------------------------------------------

    /// Assemble the message tree, reusing cached containers where present.
    pub fn build(&self) -> Value {
        let version = self
            .cached
            .version
            .clone()
            .unwrap_or(Value::Integer(self.version.as_i32()));
        let community = self
            .cached
            .community
            .clone()
            .unwrap_or_else(|| Value::OctetString(self.community.clone()));

        let mut pdu = Vec::with_capacity(6);
        match &self.trap_v1 {
            Some(header) if self.pdu_type == PduType::TrapV1 => {
                pdu.push(Value::ObjectIdentifier(header.enterprise.clone()));
                pdu.push(Value::IpAddress(header.agent_addr));
                pdu.push(Value::Integer(header.generic_trap));
                pdu.push(Value::Integer(header.specific_trap));
                pdu.push(Value::TimeTicks(header.timestamp));
            }
            _ => {
                pdu.push(
                    self.cached
                        .request_id
                        .clone()
                        .unwrap_or(Value::Integer(self.request_id)),
                );
                pdu.push(Value::Integer(self.error_status));
                pdu.push(Value::Integer(self.error_index));
            }
        }
        pdu.push(Value::sequence(self.varbinds.iter().map(VarBind::to_value).collect()));

        Value::sequence(vec![
            version,
            community,
            Value::Structure {
                tag: self.pdu_type.tag(),
                children: pdu,
            },
        ])
    }

    /// Build and encode into at most `max_len` bytes.
    pub fn serialise(&self, form: IntegerForm, max_len: usize) -> Result<Bytes> {
        self.build().serialise(form, max_len)
    }
}

fn expect(field: Option<&Value>, state: ParseState, expected: u8) -> Result<&Value> {
    let Some(value) = field else {
        return Err(Error::parse(state, ParseErrorKind::MissingField));
    };
    if value.tag() != expected {
        return Err(Error::parse(
            state,
            ParseErrorKind::UnexpectedTag {
                expected,
                actual: value.tag(),
            },
        ));
    }
    Ok(value)
}

fn parse_trap_v1_header<'a>(fields: &mut impl Iterator<Item = &'a Value>) -> Result<TrapV1Header> {
    let state = ParseState::Pdu;
    let enterprise = expect(fields.next(), state, tag::universal::OBJECT_IDENTIFIER)?;
    let agent_addr = expect(fields.next(), state, tag::application::IP_ADDRESS)?;
    let generic = expect(fields.next(), state, tag::universal::INTEGER)?;
    let specific = expect(fields.next(), state, tag::universal::INTEGER)?;
    let timestamp = expect(fields.next(), state, tag::application::TIMETICKS)?;

    Ok(TrapV1Header {
        enterprise: enterprise
            .as_oid()
            .cloned()
            .unwrap_or_else(|| Oid::from_dotted_string("")),
        agent_addr: agent_addr.as_ip().map(|ip| ip.octets()).unwrap_or_default(),
        generic_trap: generic.as_i32().unwrap_or_default(),
        specific_trap: specific.as_i32().unwrap_or_default(),
        timestamp: timestamp.as_u32().unwrap_or_default(),
    })
}

/// Request-id source. Never yields 0, which marks "no request".
#[derive(Debug)]
pub struct RequestIdGen {
    next: AtomicI32,
}

impl RequestIdGen {
    /// Start from a time-derived seed so restarts do not reuse ids.
    pub fn new() -> Self {
        let seed = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as i32)
            .unwrap_or(1);
        Self::starting_at(seed.wrapping_abs().max(1))
    }

    /// Start from a fixed id.
    pub fn starting_at(first: i32) -> Self {
        Self {
            next: AtomicI32::new(first),
        }
    }

    /// Next request id.
    pub fn next_id(&self) -> i32 {
        loop {
            let id = self.next.fetch_add(1, Ordering::Relaxed);
            if id != 0 {
                return id;
            }
        }
    }
}

impl Default for RequestIdGen {
    fn default() -> Self {
        Self::new()
    }
}
