//! Prelude module for convenient imports.
//!
//! ```rust,no_run
//! use embedded_snmp::prelude::*;
//! ```
//!
//! This imports:
//! - Nodes: [`Agent`], [`Manager`], [`Device`]
//! - Data model: [`Oid`], [`Value`], [`VarBind`], [`Version`]
//! - Bindings: [`Binding`] and the shared cell constructors
//! - Notifications: [`Trap`], [`GenericTrap`]
//! - Error handling: [`Error`], [`Result`]
//! - The [`oid!`] macro for building OIDs from arcs

pub use crate::agent::{Agent, HandleOutcome};
pub use crate::clock::{Clock, SystemClock};
pub use crate::error::{Error, ErrorStatus, Result};
pub use crate::manager::{Device, Manager};
pub use crate::notification::Trap;
pub use crate::oid::Oid;
pub use crate::pdu::GenericTrap;
pub use crate::registry::{Binding, shared_bytes, shared_i32, shared_u32, shared_u64};
pub use crate::transport::{Transport, UdpTransport};
pub use crate::value::Value;
pub use crate::varbind::VarBind;
pub use crate::version::Version;

#[doc(no_inline)]
pub use crate::oid;
