//! SNMP v1/v2c agent, trap and manager stack for small network devices.
//!
//! The crate is built from a few layers:
//!
//! - [`ber`]: bounded BER encoder and decoder.
//! - [`oid`], [`value`], [`varbind`]: the SNMP data model.
//! - [`packet`]: SNMP messages, parsed and built through a state machine.
//! - [`registry`]: managed objects bound to live values in memory.
//! - [`agent`]: request dispatch against a registry, plus trap sending.
//! - [`notification`]: trap construction and the inform retry queue.
//! - [`manager`]: pollers that mirror remote values into local cells.
//!
//! Nothing here spawns tasks or owns a runtime. [`agent::Agent`] and
//! [`manager::Manager`] handle at most one datagram per `poll` call over a
//! [`transport::Transport`], so the caller decides when to poll.
//!
//! # Quick start
//!
//! ```rust
//! use embedded_snmp::agent::{Agent, HandleOutcome};
//! use embedded_snmp::clock::ManualClock;
//! use embedded_snmp::ber::IntegerForm;
//! use embedded_snmp::packet::SnmpPacket;
//! use embedded_snmp::pdu::PduType;
//! use embedded_snmp::registry::shared_i32;
//! use embedded_snmp::transport::MemoryNetwork;
//! use embedded_snmp::{Value, Version, oid};
//!
//! let net = MemoryNetwork::new();
//! let agent_addr = "10.0.0.1:161".parse().unwrap();
//! let manager_addr = "10.0.0.2:40000".parse().unwrap();
//! net.endpoint(manager_addr);
//!
//! let mut agent = Agent::builder()
//!     .build(net.endpoint(agent_addr), ManualClock::new(0))
//!     .unwrap();
//! agent
//!     .add_integer_handler(".1.3.6.1.4.1.5.1", shared_i32(23), false)
//!     .unwrap();
//!
//! let request = SnmpPacket::request(
//!     Version::V2c,
//!     "public",
//!     PduType::GetRequest,
//!     1,
//!     &[oid!(1, 3, 6, 1, 4, 1, 5, 1)],
//! );
//! net.inject(
//!     request.serialise(IntegerForm::Fixed4, 1400).unwrap(),
//!     manager_addr,
//!     agent_addr,
//! );
//! assert_eq!(agent.poll(), HandleOutcome::Get);
//!
//! let reply = SnmpPacket::parse(&net.take_sent_to(manager_addr)[0]).unwrap();
//! assert_eq!(reply.varbinds[0].value, Value::Integer(23));
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod agent;
pub mod ber;
pub mod clock;
pub mod error;
pub mod manager;
pub mod mib;
pub mod notification;
pub mod oid;
pub mod packet;
pub mod pdu;
pub mod prelude;
pub mod registry;
pub mod transport;
pub mod value;
pub mod varbind;
pub mod version;

#[cfg(feature = "cli")]
#[cfg_attr(docsrs, doc(cfg(feature = "cli")))]
pub mod cli;

pub use agent::{Agent, AgentBuilder, HandleOutcome};
pub use error::{Error, ErrorStatus, Result};
pub use manager::{Device, Manager, ManagerBuilder};
pub use notification::Trap;
pub use oid::Oid;
pub use packet::SnmpPacket;
pub use pdu::{GenericTrap, PduType};
pub use registry::{Binding, Registry};
pub use value::Value;
pub use varbind::VarBind;
pub use version::Version;
