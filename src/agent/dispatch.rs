//! Per-PDU request handling.
//!
//! [`Dispatcher`] turns one inbound datagram into an optional response
//! datagram. It owns the community configuration and the table of
//! outstanding requests this node sent (informs, manager polls), and works
//! against a [`Registry`] it borrows for the duration of the call.

use std::collections::HashMap;

use bytes::Bytes;

use crate::ber::{Decoder, IntegerForm};
use crate::error::{EncodeErrorKind, Error, ErrorStatus};
use crate::packet::SnmpPacket;
use crate::pdu::PduType;
use crate::registry::Registry;
use crate::value::Value;
use crate::varbind::VarBind;
use crate::version::Version;

/// Result of handling one inbound datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOutcome {
    /// Nothing was waiting.
    NoPacket,
    /// GetRequest answered.
    Get,
    /// GetNextRequest answered.
    GetNext,
    /// GetBulkRequest answered.
    GetBulk,
    /// SetRequest answered.
    Set,
    /// A whole-packet error response was sent.
    ErrorPacketSent,
    /// A response acknowledged one of our informs.
    InformResponse,
    /// A response to one of our Get/Set requests was applied.
    ResponseReceived,
    /// A response matched no outstanding request.
    UnsolicitedResponse,
    /// The community matched neither configured community. Nothing is sent.
    InvalidCommunity,
    /// The datagram did not parse as an SNMP message.
    RequestInvalid,
    /// The datagram exceeded the maximum packet size.
    RequestTooLarge,
    /// The response could not be encoded.
    FailedSerialisation,
    /// A notification PDU arrived at a node that does not receive them.
    UnknownPdu,
    /// The transport failed to receive or send.
    TransportError,
}

impl HandleOutcome {
    /// True for outcomes that produce a response datagram.
    pub fn sends_response(self) -> bool {
        matches!(
            self,
            Self::Get | Self::GetNext | Self::GetBulk | Self::Set | Self::ErrorPacketSent
        )
    }
}

impl std::fmt::Display for HandleOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::NoPacket => "no packet",
            Self::Get => "get",
            Self::GetNext => "getnext",
            Self::GetBulk => "getbulk",
            Self::Set => "set",
            Self::ErrorPacketSent => "error packet sent",
            Self::InformResponse => "inform response",
            Self::ResponseReceived => "response received",
            Self::UnsolicitedResponse => "unsolicited response",
            Self::InvalidCommunity => "invalid community",
            Self::RequestInvalid => "request invalid",
            Self::RequestTooLarge => "request too large",
            Self::FailedSerialisation => "failed serialisation",
            Self::UnknownPdu => "unknown pdu",
            Self::TransportError => "transport error",
        };
        f.write_str(name)
    }
}

/// Access granted by a request's community string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    None,
    ReadOnly,
    ReadWrite,
}

/// What [`Dispatcher::handle_packet`] produced.
#[derive(Debug)]
pub struct Dispatch {
    pub outcome: HandleOutcome,
    /// Encoded response to send back to the source, if any.
    pub response: Option<Bytes>,
    /// The parsed inbound message, when it parsed.
    pub request: Option<SnmpPacket>,
}

impl Dispatch {
    fn outcome(outcome: HandleOutcome, request: Option<SnmpPacket>) -> Self {
        Self {
            outcome,
            response: None,
            request,
        }
    }
}

/// Per-PDU request handler.
#[derive(Debug)]
pub struct Dispatcher {
    community: Option<Bytes>,
    read_only_community: Option<Bytes>,
    max_packet_size: usize,
    octet_limit: usize,
    integer_form: IntegerForm,
    live_requests: HashMap<i32, PduType>,
}

impl Dispatcher {
    pub fn new(
        community: impl Into<Bytes>,
        read_only_community: Option<Bytes>,
        max_packet_size: usize,
        octet_limit: usize,
        integer_form: IntegerForm,
    ) -> Self {
        Self {
            community: Some(community.into()),
            read_only_community,
            max_packet_size,
            octet_limit,
            integer_form,
            live_requests: HashMap::new(),
        }
    }

    /// A dispatcher that grants no access to requests and only matches
    /// responses to its own outstanding requests.
    pub fn responses_only(
        max_packet_size: usize,
        octet_limit: usize,
        integer_form: IntegerForm,
    ) -> Self {
        Self {
            community: None,
            read_only_community: None,
            max_packet_size,
            octet_limit,
            integer_form,
            live_requests: HashMap::new(),
        }
    }

    pub fn max_packet_size(&self) -> usize {
        self.max_packet_size
    }

    pub fn integer_form(&self) -> IntegerForm {
        self.integer_form
    }

    // ------------------------------------------------------------------
    // Outstanding requests
    // ------------------------------------------------------------------

    /// Remember a request we sent so its response can be matched.
    pub fn track(&mut self, request_id: i32, pdu_type: PduType) {
        self.live_requests.insert(request_id, pdu_type);
    }

    /// Stop waiting for a response.
    pub fn forget(&mut self, request_id: i32) -> Option<PduType> {
        self.live_requests.remove(&request_id)
    }

    pub fn is_live(&self, request_id: i32) -> bool {
        self.live_requests.contains_key(&request_id)
    }

    pub fn live_count(&self) -> usize {
        self.live_requests.len()
    }

    // ------------------------------------------------------------------
    // Permissions
    // ------------------------------------------------------------------

    /// Access granted to `community`.
    ///
    /// The read-only community is checked first, so read-write wins when
    /// both are configured to the same string.
    pub fn permission(&self, community: &[u8]) -> Permission {
        let mut permission = Permission::None;
        if let Some(ro) = &self.read_only_community
            && !ro.is_empty()
            && ro.as_ref() == community
        {
            permission = Permission::ReadOnly;
        }
        if let Some(rw) = &self.community
            && rw.as_ref() == community
        {
            permission = Permission::ReadWrite;
        }
        permission
    }

    // ------------------------------------------------------------------
    // Packet handling
    // ------------------------------------------------------------------

    /// Handle one inbound datagram.
    pub fn handle_packet(&mut self, data: &[u8], registry: &Registry) -> Dispatch {
        if data.len() > self.max_packet_size {
            tracing::debug!(
                target: "embedded_snmp::agent",
                { snmp.bytes = data.len(), max = self.max_packet_size },
                "packet too large"
            );
            return Dispatch::outcome(HandleOutcome::RequestTooLarge, None);
        }

        let decoder = Decoder::from_slice(data).with_octet_limit(self.octet_limit);
        let request = match SnmpPacket::decode(decoder) {
            Ok(packet) => packet,
            Err(e) => {
                tracing::debug!(
                    target: "embedded_snmp::agent",
                    { error = %e },
                    "dropping unparseable packet"
                );
                return Dispatch::outcome(HandleOutcome::RequestInvalid, None);
            }
        };

        if request.pdu_type == PduType::GetResponse {
            let outcome = self.handle_response(&request, registry);
            return Dispatch::outcome(outcome, Some(request));
        }

        let permission = self.permission(request.community());
        if permission == Permission::None {
            tracing::warn!(
                target: "embedded_snmp::agent",
                { snmp.request_id = request.request_id() },
                "invalid community, not responding"
            );
            return Dispatch::outcome(HandleOutcome::InvalidCommunity, Some(request));
        }

        let version = request.version();
        let result = match request.pdu_type {
            PduType::GetRequest => {
                let varbinds = self.handle_get(registry, &request, false);
                Ok((HandleOutcome::Get, varbinds))
            }
            PduType::GetNextRequest => {
                let varbinds = self.handle_get(registry, &request, true);
                Ok((HandleOutcome::GetNext, varbinds))
            }
            PduType::GetBulkRequest if version == Version::V1 => {
                tracing::debug!(target: "embedded_snmp::agent", "GetBulkRequest under SNMPv1");
                Err(ErrorStatus::GenErr)
            }
            PduType::GetBulkRequest => {
                let varbinds = self.handle_get_bulk(registry, &request);
                Ok((HandleOutcome::GetBulk, varbinds))
            }
            PduType::SetRequest if permission != Permission::ReadWrite => {
                tracing::debug!(target: "embedded_snmp::agent", "SET without read-write community");
                Err(ErrorStatus::NoAccess)
            }
            PduType::SetRequest => Ok((HandleOutcome::Set, self.handle_set(registry, &request))),
            PduType::InformRequest => Err(ErrorStatus::GenErr),
            PduType::TrapV1 | PduType::TrapV2 | PduType::GetResponse => {
                tracing::debug!(
                    target: "embedded_snmp::agent",
                    { snmp.pdu_type = %request.pdu_type },
                    "ignoring notification"
                );
                return Dispatch::outcome(HandleOutcome::UnknownPdu, Some(request));
            }
        };

        let mut response = request.to_response();
        let outcome = match result {
            Ok((outcome, varbinds)) => {
                for varbind in varbinds {
                    if varbind.error_status.is_error() {
                        response.add_error_response(varbind);
                    } else {
                        response.add_response(varbind);
                    }
                }
                outcome
            }
            Err(status) => {
                response.varbinds = request.varbinds.clone();
                response.set_global_error(status.for_version(version), 0, true);
                HandleOutcome::ErrorPacketSent
            }
        };

        self.finish(outcome, response, request)
    }

    /// Encode the response, falling back to an empty tooBig response when
    /// the full one does not fit.
    fn finish(
        &self,
        outcome: HandleOutcome,
        mut response: SnmpPacket,
        request: SnmpPacket,
    ) -> Dispatch {
        match response.serialise(self.integer_form, self.max_packet_size) {
            Ok(bytes) => Dispatch {
                outcome,
                response: Some(bytes),
                request: Some(request),
            },
            Err(Error::Encode {
                kind: EncodeErrorKind::BufferTooSmall { needed, .. },
            }) => {
                tracing::debug!(
                    target: "embedded_snmp::agent",
                    { snmp.bytes = needed, max = self.max_packet_size },
                    "response too big"
                );
                response.varbinds.clear();
                response.set_global_error(ErrorStatus::TooBig, 0, true);
                match response.serialise(self.integer_form, self.max_packet_size) {
                    Ok(bytes) => Dispatch {
                        outcome: HandleOutcome::ErrorPacketSent,
                        response: Some(bytes),
                        request: Some(request),
                    },
                    Err(_) => Dispatch::outcome(HandleOutcome::FailedSerialisation, Some(request)),
                }
            }
            Err(e) => {
                tracing::debug!(
                    target: "embedded_snmp::agent",
                    { error = %e },
                    "failed to build response"
                );
                Dispatch::outcome(HandleOutcome::FailedSerialisation, Some(request))
            }
        }
    }

    /// GetRequest and GetNextRequest.
    ///
    /// Each varbind is answered on its own; a missing or failing object
    /// marks only its own slot.
    fn handle_get(&self, registry: &Registry, request: &SnmpPacket, walk: bool) -> Vec<VarBind> {
        let version = request.version();
        let mut out = Vec::with_capacity(request.varbinds.len());
        for requested in &request.varbinds {
            let Some((_, callback)) = registry.find(&requested.oid, walk, 0) else {
                let marker = if walk {
                    Value::EndOfMibView
                } else {
                    Value::NoSuchObject
                };
                out.push(VarBind::new(requested.oid.clone(), marker));
                continue;
            };
            match callback.get_value() {
                Some(value) => out.push(VarBind::new(callback.oid().clone(), value)),
                None => {
                    tracing::debug!(
                        target: "embedded_snmp::agent",
                        { oid = %callback.oid() },
                        "accessor failed"
                    );
                    out.push(VarBind::with_error(
                        callback.oid().clone(),
                        Value::Null,
                        ErrorStatus::GenErr.for_version(version),
                    ));
                }
            }
        }
        out
    }

    /// GetBulkRequest (RFC 3416 section 4.2.3).
    ///
    /// The first `non_repeaters` varbinds get one GetNext each. Every other
    /// varbind is walked up to `max_repetitions` times, each step seeded
    /// with the OID the previous step returned. A walk that runs off the
    /// end of the registry emits one endOfMibView and stops.
    fn handle_get_bulk(&self, registry: &Registry, request: &SnmpPacket) -> Vec<VarBind> {
        let non_repeaters = (request.non_repeaters().max(0) as usize).min(request.varbinds.len());
        let max_repetitions = request.max_repetitions().max(0) as usize;
        let (singles, repeaters) = request.varbinds.split_at(non_repeaters);

        let mut out = Vec::new();
        for requested in singles {
            match registry.find(&requested.oid, true, 0) {
                None => out.push(VarBind::new(requested.oid.clone(), Value::EndOfMibView)),
                Some((_, callback)) => match callback.get_value() {
                    Some(value) => out.push(VarBind::new(callback.oid().clone(), value)),
                    None => out.push(VarBind::with_error(
                        callback.oid().clone(),
                        Value::Null,
                        ErrorStatus::GenErr,
                    )),
                },
            }
        }

        for requested in repeaters {
            let mut seed = requested.oid.clone();
            let mut start_at = 0;
            for _ in 0..max_repetitions {
                let Some((index, callback)) = registry.find(&seed, true, start_at) else {
                    out.push(VarBind::new(seed, Value::EndOfMibView));
                    break;
                };
                let Some(value) = callback.get_value() else {
                    out.push(VarBind::with_error(
                        callback.oid().clone(),
                        Value::Null,
                        ErrorStatus::GenErr,
                    ));
                    break;
                };
                out.push(VarBind::new(callback.oid().clone(), value));
                seed = callback.oid().clone();
                start_at = index;
            }
        }
        out
    }

    /// GetResponse: match against our outstanding requests.
    fn handle_response(&mut self, response: &SnmpPacket, registry: &Registry) -> HandleOutcome {
        let request_id = response.request_id();
        let Some(origin) = self.live_requests.remove(&request_id) else {
            tracing::debug!(
                target: "embedded_snmp::agent",
                { snmp.request_id = request_id },
                "unsolicited response"
            );
            return HandleOutcome::UnsolicitedResponse;
        };

        match origin {
            PduType::GetRequest | PduType::SetRequest => {
                self.apply_response(response, registry);
                HandleOutcome::ResponseReceived
            }
            PduType::InformRequest => {
                tracing::debug!(
                    target: "embedded_snmp::inform",
                    { snmp.request_id = request_id, status = %response.error_status() },
                    "inform acknowledged"
                );
                HandleOutcome::InformResponse
            }
            other => {
                tracing::warn!(
                    target: "embedded_snmp::agent",
                    { snmp.request_id = request_id, snmp.pdu_type = %other },
                    "response to a request type that expects none"
                );
                HandleOutcome::UnsolicitedResponse
            }
        }
    }

    /// Write returned values into the matching local bindings.
    ///
    /// Failed varbinds (see [`response_failed`]) are reported but not
    /// written. The settable flag does not apply here.
    fn apply_response(&self, response: &SnmpPacket, registry: &Registry) {
        for (position, varbind) in response.varbinds.iter().enumerate() {
            let flagged = response_failed(response, position);
            let Some((_, callback)) = registry.find(&varbind.oid, false, 0) else {
                tracing::debug!(
                    target: "embedded_snmp::manager",
                    { oid = %varbind.oid },
                    "response for unknown OID"
                );
                continue;
            };
            if flagged {
                tracing::info!(
                    target: "embedded_snmp::manager",
                    {
                        oid = %varbind.oid,
                        value = %varbind.value,
                        status = %response.error_status(),
                    },
                    "error response"
                );
                continue;
            }
            if let Err(status) = callback.binding().write(&varbind.value) {
                tracing::info!(
                    target: "embedded_snmp::manager",
                    { oid = %varbind.oid, status = %status },
                    "could not record response value"
                );
            }
        }
    }
}

/// True if the varbind at `position` of a response carries no usable value.
///
/// That is an exception or NULL value, the varbind named by error-index, or
/// any varbind of a response whose error applies to the whole packet.
pub fn response_failed(response: &SnmpPacket, position: usize) -> bool {
    let Some(varbind) = response.varbinds.get(position) else {
        return true;
    };
    if varbind.value.is_empty_marker() {
        return true;
    }
    response.error_status != 0
        && (response.error_index == 0 || response.error_index == position as i32 + 1)
}
