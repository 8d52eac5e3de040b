//! Trap and inform construction.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;

use crate::mib;
use crate::oid::Oid;
use crate::packet::{SnmpPacket, TrapV1Header};
use crate::pdu::{GenericTrap, PduType};
use crate::registry::{Binding, Getter};
use crate::value::Value;
use crate::varbind::VarBind;
use crate::version::Version;

/// Identity of a [`Trap`], used to find its pending informs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrapId(u64);

impl TrapId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Clone, Debug)]
enum TrapObject {
    Fixed(Value),
    Bound(Binding),
}

/// A notification definition, rebuilt with current values on every send.
///
/// SNMPv1 traps carry the enterprise OID, agent address, generic and
/// specific trap numbers and a timestamp in the PDU header. SNMPv2c
/// notifications instead start the varbind list with `sysUpTime.0` and
/// `snmpTrapOID.0`. Informs exist only in v2c; setting the inform flag on a
/// v1 trap has no effect.
#[derive(Clone)]
pub struct Trap {
    id: TrapId,
    version: Version,
    community: Bytes,
    trap_oid: Oid,
    agent_addr: Ipv4Addr,
    generic_trap: GenericTrap,
    specific_trap: i32,
    uptime: Option<Getter<u32>>,
    objects: Vec<(Oid, TrapObject)>,
    inform: bool,
}

impl Trap {
    /// A v2c trap identified by `trap_oid`.
    pub fn new(trap_oid: Oid) -> Self {
        Self {
            id: TrapId::next(),
            version: Version::V2c,
            community: Bytes::from_static(b"public"),
            trap_oid,
            agent_addr: Ipv4Addr::UNSPECIFIED,
            generic_trap: GenericTrap::EnterpriseSpecific,
            specific_trap: 1,
            uptime: None,
            objects: Vec::new(),
            inform: false,
        }
    }

    pub fn version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    pub fn community(mut self, community: impl Into<Bytes>) -> Self {
        self.community = community.into();
        self
    }

    /// Agent address carried in v1 trap headers.
    pub fn agent_addr(mut self, addr: Ipv4Addr) -> Self {
        self.agent_addr = addr;
        self
    }

    pub fn generic_trap(mut self, generic: GenericTrap) -> Self {
        self.generic_trap = generic;
        self
    }

    pub fn specific_trap(mut self, specific: i32) -> Self {
        self.specific_trap = specific;
        self
    }

    /// Source for the timestamp. Without one the sender's uptime is used.
    pub fn uptime(mut self, f: impl Fn() -> u32 + Send + Sync + 'static) -> Self {
        self.uptime = Some(Arc::new(move || Some(f())));
        self
    }

    /// Request acknowledgement (v2c InformRequest).
    pub fn inform(mut self, inform: bool) -> Self {
        self.inform = inform;
        self
    }

    /// Append a varbind with a fixed value.
    pub fn varbind(mut self, oid: Oid, value: impl Into<Value>) -> Self {
        self.objects.push((oid, TrapObject::Fixed(value.into())));
        self
    }

    /// Append a varbind read from `binding` each time the trap is built.
    pub fn object(mut self, oid: Oid, binding: Binding) -> Self {
        self.objects.push((oid, TrapObject::Bound(binding)));
        self
    }

    pub fn id(&self) -> TrapId {
        self.id
    }

    pub fn trap_oid(&self) -> &Oid {
        &self.trap_oid
    }

    /// True if this trap is sent as an InformRequest.
    pub fn is_inform(&self) -> bool {
        self.inform && self.version == Version::V2c
    }

    /// PDU type this trap is sent as.
    pub fn pdu_type(&self) -> PduType {
        match self.version {
            Version::V1 => PduType::TrapV1,
            Version::V2c if self.inform => PduType::InformRequest,
            Version::V2c => PduType::TrapV2,
        }
    }

    /// Build the packet with current values.
    ///
    /// `default_uptime` is used when no uptime source was configured. A
    /// bound object whose accessor fails is sent as NULL.
    pub fn build_packet(&self, request_id: i32, default_uptime: u32) -> SnmpPacket {
        let timestamp = self
            .uptime
            .as_ref()
            .and_then(|f| f())
            .unwrap_or(default_uptime);

        let mut packet = SnmpPacket::new(self.version, self.community.clone(), self.pdu_type());
        match self.version {
            Version::V1 => {
                packet.trap_v1 = Some(TrapV1Header {
                    enterprise: self.trap_oid.clone(),
                    agent_addr: self.agent_addr.octets(),
                    generic_trap: self.generic_trap.as_i32(),
                    specific_trap: self.specific_trap,
                    timestamp,
                });
            }
            Version::V2c => {
                packet.set_request_id(request_id);
                let uptime = VarBind::new(mib::sys_uptime(), Value::TimeTicks(timestamp));
                let trap_oid = VarBind::new(mib::snmp_trap_oid(), self.trap_oid.clone().into());
                packet.varbinds.push(uptime);
                packet.varbinds.push(trap_oid);
            }
        }

        for (oid, object) in &self.objects {
            let value = match object {
                TrapObject::Fixed(value) => value.clone(),
                TrapObject::Bound(binding) => binding.read().unwrap_or(Value::Null),
            };
            packet.varbinds.push(VarBind::new(oid.clone(), value));
        }
        packet
    }
}

impl std::fmt::Debug for Trap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trap")
            .field("id", &self.id)
            .field("version", &self.version)
            .field("trap_oid", &self.trap_oid)
            .field("pdu_type", &self.pdu_type())
            .field("objects", &self.objects.len())
            .finish()
    }
}
