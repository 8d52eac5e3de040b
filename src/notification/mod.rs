//! Notification origination (traps and informs).
//!
//! A [`Trap`] describes a notification and is rebuilt with current values
//! each time it is sent. Informs are tracked in an [`InformQueue`] until a
//! response arrives or the retries run out.

mod inform;
mod trap;

pub use inform::*;
pub use trap::*;
