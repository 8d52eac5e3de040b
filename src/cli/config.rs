//! JSON configuration for `snmp-agentd`.
//!
//! ```json
//! {
//!   "listen": "0.0.0.0:161",
//!   "community": "private",
//!   "read_only_community": "public",
//!   "oid_prefix": ".1.3.6.1.4.1.5",
//!   "system": { "descr": "rack controller", "name": "rack-4" },
//!   "objects": [
//!     { "oid": "1.1", "type": "integer", "value": 23, "writable": true },
//!     { "oid": "1.2", "type": "string", "value": "fan ok" }
//!   ],
//!   "traps": [
//!     { "target": "192.168.1.10:162", "inform": true, "retries": 3 }
//!   ]
//! }
//! ```

use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::agent::{Agent, AgentBuilder, DEFAULT_COMMUNITY, DEFAULT_MAX_PACKET_SIZE};
use crate::ber::{DEFAULT_OCTET_STRING_LIMIT, IntegerForm};
use crate::clock::Clock;
use crate::mib;
use crate::notification::Trap;
use crate::oid::Oid;
use crate::pdu::GenericTrap;
use crate::registry::{Binding, shared_bytes, shared_i32, shared_u32, shared_u64};
use crate::transport::{AGENT_PORT, Transport};
use crate::version::Version;

/// Longest value a writable string object accepts unless configured.
pub const DEFAULT_STRING_MAX_LEN: usize = 255;

/// Errors loading or applying a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Snmp(#[from] crate::Error),
}

/// Agent daemon configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
    #[serde(default = "default_community")]
    pub community: String,
    #[serde(default)]
    pub read_only_community: Option<String>,
    #[serde(default = "default_max_packet_size")]
    pub max_packet_size: usize,
    #[serde(default = "default_octet_limit")]
    pub octet_limit: usize,
    #[serde(default)]
    pub integer_form: IntegerForm,
    #[serde(default)]
    pub oid_prefix: Option<String>,
    #[serde(default)]
    pub system: SystemConfig,
    #[serde(default)]
    pub objects: Vec<ObjectConfig>,
    #[serde(default)]
    pub traps: Vec<TrapTarget>,
    /// Send a coldStart notification to every trap target on startup.
    #[serde(default = "default_true")]
    pub cold_start_trap: bool,
}

/// Values for the MIB-II system group.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SystemConfig {
    #[serde(default)]
    pub descr: Option<String>,
    #[serde(default)]
    pub object_id: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

/// One managed object served from memory.
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectConfig {
    /// Absolute (`.1.3.…`) or relative to `oid_prefix`.
    pub oid: String,
    #[serde(flatten)]
    pub value: ObjectValue,
    #[serde(default)]
    pub writable: bool,
    /// Longest accepted string when writable.
    #[serde(default)]
    pub max_len: Option<usize>,
}

/// Typed initial value of an object.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ObjectValue {
    Integer(i32),
    String(String),
    Counter32(u32),
    Gauge32(u32),
    TimeTicks(u32),
    Counter64(u64),
    Oid(String),
}

/// Where notifications are sent.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrapTarget {
    pub target: SocketAddr,
    #[serde(default)]
    pub version: Version,
    #[serde(default = "default_trap_community")]
    pub community: String,
    /// Send v2c InformRequests and retry until acknowledged.
    #[serde(default)]
    pub inform: bool,
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

fn default_listen() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, AGENT_PORT))
}

fn default_community() -> String {
    DEFAULT_COMMUNITY.to_string()
}

fn default_trap_community() -> String {
    "public".to_string()
}

fn default_max_packet_size() -> usize {
    DEFAULT_MAX_PACKET_SIZE
}

fn default_octet_limit() -> usize {
    DEFAULT_OCTET_STRING_LIMIT
}

fn default_true() -> bool {
    true
}

fn default_retries() -> u32 {
    3
}

fn default_delay_ms() -> u64 {
    1000
}

impl AgentConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Agent builder carrying the protocol settings.
    pub fn builder(&self) -> AgentBuilder {
        let mut builder = Agent::builder()
            .community(self.community.clone())
            .max_packet_size(self.max_packet_size)
            .octet_limit(self.octet_limit)
            .integer_form(self.integer_form);
        if let Some(ro) = &self.read_only_community {
            builder = builder.read_only_community(ro.clone());
        }
        if let Some(prefix) = &self.oid_prefix {
            builder = builder.oid_prefix(prefix.clone());
        }
        builder
    }

    /// The sysObjectID, also the enterprise of v1 traps.
    pub fn enterprise(&self) -> Result<Oid, ConfigError> {
        match &self.system.object_id {
            Some(oid) => Ok(Oid::parse(oid)?),
            None => Ok(mib::snmp_traps()),
        }
    }

    /// Register the system group and every configured object.
    ///
    /// Returns the number of objects registered.
    pub fn apply<T, C>(&self, agent: &mut Agent<T, C>) -> Result<usize, ConfigError>
    where
        T: Transport,
        C: Clock + Clone + 'static,
    {
        let mut count = 0;
        let system = &self.system;
        if let Some(descr) = &system.descr {
            let descr = Binding::StaticString(descr.clone().into());
            agent.add_handler(mib::sys_descr(), descr, false)?;
            count += 1;
        }
        let object_id = Binding::Oid(self.enterprise()?);
        agent.add_handler(mib::sys_object_id(), object_id, false)?;
        agent.add_uptime_handler(&mib::sys_uptime().to_string())?;
        count += 2;
        for (oid, value) in [
            (mib::sys_contact(), &system.contact),
            (mib::sys_name(), &system.name),
            (mib::sys_location(), &system.location),
        ] {
            if let Some(value) = value {
                let cell = shared_bytes(value.as_bytes());
                agent.add_handler(oid, Binding::string(cell, DEFAULT_STRING_MAX_LEN), true)?;
                count += 1;
            }
        }

        for object in &self.objects {
            let oid = object.oid.as_str();
            let settable = object.writable;
            match &object.value {
                ObjectValue::Integer(v) => {
                    agent.add_integer_handler(oid, shared_i32(*v), settable)?;
                }
                ObjectValue::String(v) if settable => {
                    let max_len = object.max_len.unwrap_or(DEFAULT_STRING_MAX_LEN);
                    let cell = shared_bytes(v.as_bytes());
                    agent.add_read_write_string_handler(oid, cell, max_len, true)?;
                }
                ObjectValue::String(v) => {
                    agent.add_read_only_static_string_handler(oid, v.clone())?;
                }
                ObjectValue::Counter32(v) => {
                    agent.add_counter32_handler(oid, shared_u32(*v))?;
                }
                ObjectValue::Gauge32(v) => {
                    agent.add_gauge_handler(oid, shared_u32(*v))?;
                }
                ObjectValue::TimeTicks(v) => {
                    agent.add_timestamp_handler(oid, shared_u32(*v), settable)?;
                }
                ObjectValue::Counter64(v) => {
                    agent.add_counter64_handler(oid, shared_u64(*v))?;
                }
                ObjectValue::Oid(v) => {
                    agent.add_oid_handler(oid, Oid::parse(v)?)?;
                }
            }
            count += 1;
        }
        agent.sort_handlers();
        Ok(count)
    }
}

impl TrapTarget {
    /// The coldStart notification for this target.
    pub fn cold_start_trap(&self, enterprise: &Oid, agent_addr: Ipv4Addr) -> Trap {
        match self.version {
            Version::V1 => Trap::new(enterprise.clone())
                .version(Version::V1)
                .community(self.community.clone())
                .agent_addr(agent_addr)
                .generic_trap(GenericTrap::ColdStart)
                .specific_trap(0),
            Version::V2c => {
                let trap_oid = mib::generic_trap_oid(GenericTrap::ColdStart.as_i32())
                    .unwrap_or_else(mib::snmp_traps);
                Trap::new(trap_oid)
                    .community(self.community.clone())
                    .inform(self.inform)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::pdu::PduType;
    use crate::transport::MemoryNetwork;
    use crate::value::Value;

    const SAMPLE: &str = r#"{
        "listen": "127.0.0.1:1161",
        "community": "private",
        "read_only_community": "public",
        "oid_prefix": ".1.3.6.1.4.1.5",
        "system": { "descr": "rack controller", "name": "rack-4" },
        "objects": [
            { "oid": "1.1", "type": "integer", "value": 23, "writable": true },
            { "oid": "1.2", "type": "string", "value": "fan ok" },
            { "oid": "1.3", "type": "counter64", "value": 9000000000 },
            { "oid": ".1.3.6.1.4.1.9.1", "type": "oid", "value": ".1.3.6.1.4.1.9" }
        ],
        "traps": [
            { "target": "127.0.0.1:162", "inform": true, "retries": 2 },
            { "target": "127.0.0.1:1162", "version": "v1", "community": "traps" }
        ]
    }"#;

    #[test]
    fn test_parse_sample() {
        let config = AgentConfig::from_json(SAMPLE).unwrap();
        assert_eq!(config.listen.port(), 1161);
        assert_eq!(config.read_only_community.as_deref(), Some("public"));
        assert_eq!(config.integer_form, IntegerForm::Fixed4);
        assert_eq!(config.objects.len(), 4);
        assert_eq!(config.objects[0].value, ObjectValue::Integer(23));
        assert!(config.objects[0].writable);
        assert_eq!(config.traps[0].retries, 2);
        assert_eq!(config.traps[0].version, Version::V2c);
        assert_eq!(config.traps[1].version, Version::V1);
        assert_eq!(config.traps[1].delay_ms, 1000);
        assert!(config.cold_start_trap);
    }

    #[test]
    fn test_defaults() {
        let config = AgentConfig::from_json("{}").unwrap();
        assert_eq!(config.listen, default_listen());
        assert_eq!(config.community, "public");
        assert_eq!(config.max_packet_size, 1400);
        assert_eq!(config.octet_limit, 500);
        assert!(config.objects.is_empty());
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(matches!(
            AgentConfig::from_json(r#"{ "comunity": "x" }"#),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_apply_registers_objects() {
        let config = AgentConfig::from_json(SAMPLE).unwrap();
        let net = MemoryNetwork::new();
        let mut agent = config
            .builder()
            .build(net.endpoint(config.listen), ManualClock::new(0))
            .unwrap();

        // descr, objectID, uptime, name, then four objects
        assert_eq!(config.apply(&mut agent).unwrap(), 8);
        let registry = agent.registry();
        let value = |oid: &str| {
            registry
                .find(&Oid::from_dotted_string(oid), false, 0)
                .and_then(|(_, cb)| cb.get_value())
        };
        assert_eq!(value(".1.3.6.1.4.1.5.1.1"), Some(Value::Integer(23)));
        assert_eq!(
            value(".1.3.6.1.4.1.5.1.3"),
            Some(Value::Counter64(9_000_000_000))
        );
        assert_eq!(value(".1.3.6.1.2.1.1.5.0"), Some(Value::from("rack-4")));
        let enterprise = Value::ObjectIdentifier(mib::snmp_traps());
        assert_eq!(value(".1.3.6.1.2.1.1.2.0"), Some(enterprise));
    }

    #[test]
    fn test_apply_bad_oid() {
        let config = AgentConfig::from_json(
            r#"{ "objects": [ { "oid": "1.1", "type": "integer", "value": 1 } ] }"#,
        )
        .unwrap();
        let net = MemoryNetwork::new();
        let mut agent = config
            .builder()
            .build(net.endpoint(config.listen), ManualClock::new(0))
            .unwrap();
        // relative OID with no prefix configured
        assert!(matches!(config.apply(&mut agent), Err(ConfigError::Snmp(_))));
    }

    #[test]
    fn test_cold_start_traps() {
        let config = AgentConfig::from_json(SAMPLE).unwrap();
        let enterprise = config.enterprise().unwrap();

        let inform = config.traps[0].cold_start_trap(&enterprise, Ipv4Addr::LOCALHOST);
        assert_eq!(inform.pdu_type(), PduType::InformRequest);
        assert_eq!(inform.trap_oid().to_string(), ".1.3.6.1.6.3.1.1.5.1");

        let v1 = config.traps[1].cold_start_trap(&enterprise, Ipv4Addr::LOCALHOST);
        assert_eq!(v1.pdu_type(), PduType::TrapV1);
        let packet = v1.build_packet(1, 0);
        assert_eq!(packet.community(), b"traps");
        assert_eq!(packet.trap_v1.unwrap().generic_trap, 0);
    }
}
