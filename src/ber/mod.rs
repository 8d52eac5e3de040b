//! BER (Basic Encoding Rules) codec for SNMP.
//!
//! Encoding uses a reverse buffer so container lengths are always known
//! before they are written. Decoding is bounded: every declared length is
//! checked against the bytes actually available before it is trusted.

mod decode;
mod encode;
mod length;
pub mod tag;

pub use decode::*;
pub use encode::*;
pub use length::*;
pub use tag::*;
