//! Accessors over application-owned values.
//!
//! A [`Binding`] is the capability the registry holds over a value the
//! embedding application owns: a shared cell the application keeps a clone
//! of, a fixed value, or a getter closure. Reads build a [`Value`]; writes
//! check the incoming type before touching the cell.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, AtomicU32, AtomicU64, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;

use crate::ber::tag;
use crate::error::ErrorStatus;
use crate::oid::Oid;
use crate::value::Value;

/// Shared signed integer cell.
pub type SharedI32 = Arc<AtomicI32>;
/// Shared Counter32 / Gauge32 / TimeTicks cell.
pub type SharedU32 = Arc<AtomicU32>;
/// Shared Counter64 cell.
pub type SharedU64 = Arc<AtomicU64>;
/// Shared byte buffer for strings and opaque data.
pub type SharedBytes = Arc<Mutex<Vec<u8>>>;

/// Getter for a dynamic value. `None` reports an accessor failure.
pub type Getter<T> = Arc<dyn Fn() -> Option<T> + Send + Sync>;

/// Create a shared integer cell.
pub fn shared_i32(value: i32) -> SharedI32 {
    Arc::new(AtomicI32::new(value))
}

/// Create a shared unsigned 32-bit cell.
pub fn shared_u32(value: u32) -> SharedU32 {
    Arc::new(AtomicU32::new(value))
}

/// Create a shared unsigned 64-bit cell.
pub fn shared_u64(value: u64) -> SharedU64 {
    Arc::new(AtomicU64::new(value))
}

/// Create a shared byte buffer.
pub fn shared_bytes(value: impl Into<Vec<u8>>) -> SharedBytes {
    Arc::new(Mutex::new(value.into()))
}

/// Typed accessor over an externally owned value.
#[derive(Clone)]
pub enum Binding {
    /// INTEGER cell. A non-zero `modifier` divides the value on read.
    Integer { cell: SharedI32, modifier: i32 },
    /// INTEGER from a getter.
    DynamicInteger(Getter<i32>),
    /// OCTET STRING buffer holding at most `max_len` bytes.
    String { cell: SharedBytes, max_len: usize },
    /// Fixed OCTET STRING.
    StaticString(Bytes),
    /// OCTET STRING from a getter.
    DynamicString(Getter<Bytes>),
    /// Opaque buffer holding at most `max_len` bytes.
    Opaque { cell: SharedBytes, max_len: usize },
    /// TimeTicks cell.
    TimeTicks(SharedU32),
    /// TimeTicks from a getter.
    DynamicTimeTicks(Getter<u32>),
    /// Fixed OBJECT IDENTIFIER.
    Oid(Oid),
    /// Counter32 cell.
    Counter32(SharedU32),
    /// Gauge32 cell.
    Gauge32(SharedU32),
    /// Counter64 cell.
    Counter64(SharedU64),
}

impl Binding {
    /// Integer cell read as-is.
    pub fn integer(cell: SharedI32) -> Self {
        Binding::Integer { cell, modifier: 0 }
    }

    /// String buffer bounded to `max_len` bytes.
    pub fn string(cell: SharedBytes, max_len: usize) -> Self {
        Binding::String { cell, max_len }
    }

    /// Getter-backed integer.
    pub fn dynamic_integer(f: impl Fn() -> Option<i32> + Send + Sync + 'static) -> Self {
        Binding::DynamicInteger(Arc::new(f))
    }

    /// Getter-backed string.
    pub fn dynamic_string(f: impl Fn() -> Option<Bytes> + Send + Sync + 'static) -> Self {
        Binding::DynamicString(Arc::new(f))
    }

    /// Getter-backed timeticks.
    pub fn dynamic_timeticks(f: impl Fn() -> Option<u32> + Send + Sync + 'static) -> Self {
        Binding::DynamicTimeTicks(Arc::new(f))
    }

    /// ASN.1 tag of the values this binding produces and accepts.
    pub fn tag(&self) -> u8 {
        match self {
            Binding::Integer { .. } | Binding::DynamicInteger(_) => tag::universal::INTEGER,
            Binding::String { .. } | Binding::StaticString(_) | Binding::DynamicString(_) => {
                tag::universal::OCTET_STRING
            }
            Binding::Opaque { .. } => tag::application::OPAQUE,
            Binding::TimeTicks(_) | Binding::DynamicTimeTicks(_) => tag::application::TIMETICKS,
            Binding::Oid(_) => tag::universal::OBJECT_IDENTIFIER,
            Binding::Counter32(_) => tag::application::COUNTER32,
            Binding::Gauge32(_) => tag::application::GAUGE32,
            Binding::Counter64(_) => tag::application::COUNTER64,
        }
    }

    /// True if [`write`](Self::write) can ever succeed for this binding.
    pub fn is_writable(&self) -> bool {
        matches!(
            self,
            Binding::Integer { .. }
                | Binding::String { .. }
                | Binding::Opaque { .. }
                | Binding::TimeTicks(_)
                | Binding::Counter32(_)
                | Binding::Gauge32(_)
                | Binding::Counter64(_)
        )
    }

    /// Build the current value. `None` means the accessor failed.
    pub fn read(&self) -> Option<Value> {
        match self {
            Binding::Integer { cell, modifier } => {
                let raw = cell.load(Ordering::Relaxed);
                let value = if *modifier != 0 {
                    raw.checked_div(*modifier)?
                } else {
                    raw
                };
                Some(Value::Integer(value))
            }
            Binding::DynamicInteger(get) => get().map(Value::Integer),
            Binding::String { cell, .. } => {
                Some(Value::OctetString(Bytes::copy_from_slice(&cell.lock())))
            }
            Binding::StaticString(data) => Some(Value::OctetString(data.clone())),
            Binding::DynamicString(get) => get().map(Value::OctetString),
            Binding::Opaque { cell, .. } => {
                Some(Value::Opaque(Bytes::copy_from_slice(&cell.lock())))
            }
            Binding::TimeTicks(cell) => Some(Value::TimeTicks(cell.load(Ordering::Relaxed))),
            Binding::DynamicTimeTicks(get) => get().map(Value::TimeTicks),
            Binding::Oid(oid) if oid.is_valid() => Some(Value::ObjectIdentifier(oid.clone())),
            Binding::Oid(_) => None,
            Binding::Counter32(cell) => Some(Value::Counter32(cell.load(Ordering::Relaxed))),
            Binding::Gauge32(cell) => Some(Value::Gauge32(cell.load(Ordering::Relaxed))),
            Binding::Counter64(cell) => Some(Value::Counter64(cell.load(Ordering::Relaxed))),
        }
    }

    /// Store `value` into the bound cell.
    ///
    /// A value whose tag differs from [`tag`](Self::tag) is refused with
    /// `WrongType` and nothing is written. Over-long strings are refused
    /// with `WrongLength`. Fixed and getter-backed bindings refuse with
    /// `NotWritable`.
    pub fn write(&self, value: &Value) -> Result<(), ErrorStatus> {
        if value.tag() != self.tag() {
            return Err(ErrorStatus::WrongType);
        }
        match (self, value) {
            (Binding::Integer { cell, .. }, Value::Integer(v)) => {
                cell.store(*v, Ordering::Relaxed);
            }
            (Binding::String { cell, max_len }, Value::OctetString(data))
            | (Binding::Opaque { cell, max_len }, Value::Opaque(data)) => {
                if data.len() > *max_len {
                    return Err(ErrorStatus::WrongLength);
                }
                let mut guard = cell.lock();
                guard.clear();
                guard.extend_from_slice(data);
            }
            (Binding::TimeTicks(cell), Value::TimeTicks(v))
            | (Binding::Counter32(cell), Value::Counter32(v))
            | (Binding::Gauge32(cell), Value::Gauge32(v)) => {
                cell.store(*v, Ordering::Relaxed);
            }
            (Binding::Counter64(cell), Value::Counter64(v)) => {
                cell.store(*v, Ordering::Relaxed);
            }
            _ => return Err(ErrorStatus::NotWritable),
        }
        Ok(())
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Integer { cell, modifier } => f
                .debug_struct("Integer")
                .field("value", &cell.load(Ordering::Relaxed))
                .field("modifier", modifier)
                .finish(),
            Binding::DynamicInteger(_) => f.write_str("DynamicInteger"),
            Binding::String { max_len, .. } => {
                f.debug_struct("String").field("max_len", max_len).finish()
            }
            Binding::StaticString(data) => f.debug_tuple("StaticString").field(data).finish(),
            Binding::DynamicString(_) => f.write_str("DynamicString"),
            Binding::Opaque { max_len, .. } => {
                f.debug_struct("Opaque").field("max_len", max_len).finish()
            }
            Binding::TimeTicks(cell) => f.debug_tuple("TimeTicks").field(cell).finish(),
            Binding::DynamicTimeTicks(_) => f.write_str("DynamicTimeTicks"),
            Binding::Oid(oid) => f.debug_tuple("Oid").field(oid).finish(),
            Binding::Counter32(cell) => f.debug_tuple("Counter32").field(cell).finish(),
            Binding::Gauge32(cell) => f.debug_tuple("Gauge32").field(cell).finish(),
            Binding::Counter64(cell) => f.debug_tuple("Counter64").field(cell).finish(),
        }
    }
}
