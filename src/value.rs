//! SNMP value types.
//!
//! [`Value`] is the BER container: a closed tagged union over the primitive
//! SNMP types, the varbind exception markers, and [`Value::Structure`] for
//! SEQUENCE and PDU containers, which own their children.

use std::fmt::Write as _;

use crate::ber::{
    Decoder, EncodeBuf, IntegerForm, integer64_content_len, integer_content_len, length_len, tag,
    unsigned32_content_len,
};
use crate::error::{DecodeErrorKind, EncodeErrorKind, Error, Result};
use crate::oid::Oid;
use bytes::Bytes;

/// Deepest container nesting accepted when decoding.
///
/// A v1 trap or a response nests four levels; anything far past that is hostile.
pub const MAX_NESTING: usize = 16;

/// SNMP value.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Value {
    /// INTEGER (signed 32-bit)
    Integer(i32),

    /// OCTET STRING (arbitrary bytes, bounded by the decoder's octet limit)
    OctetString(Bytes),

    /// NULL
    Null,

    /// OBJECT IDENTIFIER
    ObjectIdentifier(Oid),

    /// IpAddress / NetworkAddress (4 bytes, big-endian)
    IpAddress([u8; 4]),

    /// Counter32 (unsigned 32-bit, wrapping)
    Counter32(u32),

    /// Gauge32 (unsigned 32-bit, non-wrapping)
    Gauge32(u32),

    /// TimeTicks (hundredths of seconds)
    TimeTicks(u32),

    /// Opaque (arbitrary bytes)
    Opaque(Bytes),

    /// Counter64 (unsigned 64-bit). Not valid in SNMPv1.
    Counter64(u64),

    /// noSuchObject exception
    NoSuchObject,

    /// noSuchInstance exception
    NoSuchInstance,

    /// endOfMibView exception
    EndOfMibView,

    /// SEQUENCE or PDU container holding its children in order.
    Structure { tag: u8, children: Vec<Value> },
}

impl Value {
    /// Create an empty SEQUENCE.
    pub fn sequence(children: Vec<Value>) -> Self {
        Value::Structure {
            tag: tag::universal::SEQUENCE,
            children,
        }
    }

    /// BER tag this value encodes with.
    pub fn tag(&self) -> u8 {
        match self {
            Value::Integer(_) => tag::universal::INTEGER,
            Value::OctetString(_) => tag::universal::OCTET_STRING,
            Value::Null => tag::universal::NULL,
            Value::ObjectIdentifier(_) => tag::universal::OBJECT_IDENTIFIER,
            Value::IpAddress(_) => tag::application::IP_ADDRESS,
            Value::Counter32(_) => tag::application::COUNTER32,
            Value::Gauge32(_) => tag::application::GAUGE32,
            Value::TimeTicks(_) => tag::application::TIMETICKS,
            Value::Opaque(_) => tag::application::OPAQUE,
            Value::Counter64(_) => tag::application::COUNTER64,
            Value::NoSuchObject => tag::context::NO_SUCH_OBJECT,
            Value::NoSuchInstance => tag::context::NO_SUCH_INSTANCE,
            Value::EndOfMibView => tag::context::END_OF_MIB_VIEW,
            Value::Structure { tag, .. } => *tag,
        }
    }

    /// Try to get as i32.
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as u32 (Counter32, Gauge32, TimeTicks, or non-negative Integer).
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::Counter32(v) | Value::Gauge32(v) | Value::TimeTicks(v) => Some(*v),
            Value::Integer(v) => u32::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Try to get as u64 (Counter64 or any of the 32-bit unsigned types).
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Counter64(v) => Some(*v),
            other => other.as_u32().map(u64::from),
        }
    }

    /// Raw bytes of an OctetString or Opaque.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::OctetString(data) | Value::Opaque(data) => Some(data),
            _ => None,
        }
    }

    /// OctetString content as UTF-8, if it is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::OctetString(data) => std::str::from_utf8(data).ok(),
            _ => None,
        }
    }

    /// Try to get as OID.
    pub fn as_oid(&self) -> Option<&Oid> {
        match self {
            Value::ObjectIdentifier(oid) => Some(oid),
            _ => None,
        }
    }

    /// Try to get as an IPv4 address.
    pub fn as_ip(&self) -> Option<std::net::Ipv4Addr> {
        match self {
            Value::IpAddress(bytes) => Some(std::net::Ipv4Addr::from(*bytes)),
            _ => None,
        }
    }

    /// Children of a SEQUENCE or PDU container.
    pub fn children(&self) -> Option<&[Value]> {
        match self {
            Value::Structure { children, .. } => Some(children),
            _ => None,
        }
    }

    /// Check if this is an exception value.
    pub fn is_exception(&self) -> bool {
        matches!(
            self,
            Value::NoSuchObject | Value::NoSuchInstance | Value::EndOfMibView
        )
    }

    /// True for NULL and the exception markers, which carry no data to store.
    pub fn is_empty_marker(&self) -> bool {
        matches!(self, Value::Null) || self.is_exception()
    }

    /// Total encoded length (tag + length + content).
    ///
    /// This is the sizing pass of encoding: it fails on an OID that cannot
    /// be encoded, so callers can reject a value before writing anything.
    pub fn encoded_len(&self, form: IntegerForm) -> Result<usize> {
        let content = match self {
            Value::Integer(v) => integer_content_len(*v, form),
            Value::OctetString(data) | Value::Opaque(data) => data.len(),
            Value::Null | Value::NoSuchObject | Value::NoSuchInstance | Value::EndOfMibView => 0,
            Value::ObjectIdentifier(oid) => {
                if !oid.is_valid() {
                    return Err(Error::encode(EncodeErrorKind::InvalidOid));
                }
                oid.as_ber().len()
            }
            Value::IpAddress(_) => 4,
            Value::Counter32(v) | Value::Gauge32(v) | Value::TimeTicks(v) => {
                unsigned32_content_len(*v)
            }
            Value::Counter64(v) => integer64_content_len(*v),
            Value::Structure { children, .. } => {
                let mut total = 0;
                for child in children {
                    total += child.encoded_len(form)?;
                }
                total
            }
        };
        Ok(1 + length_len(content) + content)
    }

    /// Encode to BER.
    pub fn encode(&self, buf: &mut EncodeBuf) {
        match self {
            Value::Integer(v) => buf.push_integer(*v),
            Value::OctetString(data) => buf.push_octet_string(data),
            Value::Null => buf.push_null(),
            Value::ObjectIdentifier(oid) => buf.push_oid(oid),
            Value::IpAddress(addr) => buf.push_ip_address(*addr),
            Value::Counter32(v) => buf.push_unsigned32(tag::application::COUNTER32, *v),
            Value::Gauge32(v) => buf.push_unsigned32(tag::application::GAUGE32, *v),
            Value::TimeTicks(v) => buf.push_unsigned32(tag::application::TIMETICKS, *v),
            Value::Opaque(data) => buf.push_primitive(tag::application::OPAQUE, data),
            Value::Counter64(v) => buf.push_integer64(*v),
            Value::NoSuchObject | Value::NoSuchInstance | Value::EndOfMibView => {
                buf.push_primitive(self.tag(), &[]);
            }
            Value::Structure { tag, children } => {
                buf.push_constructed(*tag, |buf| {
                    // Reverse buffer: last child first
                    for child in children.iter().rev() {
                        child.encode(buf);
                    }
                });
            }
        }
    }

    /// Encode into at most `max_len` bytes.
    ///
    /// Sizes the whole tree first and fails with
    /// [`EncodeErrorKind::BufferTooSmall`] before writing anything if it
    /// would not fit.
    pub fn serialise(&self, form: IntegerForm, max_len: usize) -> Result<Bytes> {
        let needed = self.encoded_len(form)?;
        if needed > max_len {
            return Err(Error::encode(EncodeErrorKind::BufferTooSmall {
                needed,
                max: max_len,
            }));
        }
        let mut buf = EncodeBuf::with_capacity(needed).with_integer_form(form);
        self.encode(&mut buf);
        Ok(buf.finish())
    }

    /// Decode one value from the start of `data`, reading at most `max_len` bytes.
    ///
    /// Returns the value and the number of bytes consumed.
    pub fn deserialise(data: &[u8], max_len: usize) -> Result<(Self, usize)> {
        let bounded = &data[..data.len().min(max_len)];
        let mut decoder = Decoder::from_slice(bounded);
        let value = Self::decode(&mut decoder)?;
        Ok((value, decoder.offset()))
    }

    /// Decode from BER.
    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        Self::decode_nested(decoder, 0)
    }

    fn decode_nested(decoder: &mut Decoder, depth: usize) -> Result<Self> {
        let start = decoder.offset();
        let tag = decoder.read_tag()?;
        let len = decoder.read_length()?;

        match tag {
            tag::universal::INTEGER => Ok(Value::Integer(decoder.read_integer_value(len)?)),
            tag::universal::OCTET_STRING => {
                Ok(Value::OctetString(decoder.read_octets_value(len)?))
            }
            tag::universal::NULL => {
                if len != 0 {
                    return Err(Error::decode(start, DecodeErrorKind::InvalidNull));
                }
                Ok(Value::Null)
            }
            tag::universal::OBJECT_IDENTIFIER => {
                Ok(Value::ObjectIdentifier(decoder.read_oid_value(len)?))
            }
            tag::application::IP_ADDRESS => {
                Ok(Value::IpAddress(decoder.read_ip_address_value(len)?))
            }
            tag::application::COUNTER32 => {
                Ok(Value::Counter32(decoder.read_unsigned32_value(len)?))
            }
            tag::application::GAUGE32 => Ok(Value::Gauge32(decoder.read_unsigned32_value(len)?)),
            tag::application::TIMETICKS => {
                Ok(Value::TimeTicks(decoder.read_unsigned32_value(len)?))
            }
            tag::application::OPAQUE => Ok(Value::Opaque(decoder.read_octets_value(len)?)),
            tag::application::COUNTER64 => {
                Ok(Value::Counter64(decoder.read_integer64_value(len)?))
            }
            tag::context::NO_SUCH_OBJECT
            | tag::context::NO_SUCH_INSTANCE
            | tag::context::END_OF_MIB_VIEW => {
                // Content is meaningless; consume it so the parent stays aligned
                decoder.read_bytes(len)?;
                Ok(match tag {
                    tag::context::NO_SUCH_OBJECT => Value::NoSuchObject,
                    tag::context::NO_SUCH_INSTANCE => Value::NoSuchInstance,
                    _ => Value::EndOfMibView,
                })
            }
            t if tag::is_container(t) => {
                if depth >= MAX_NESTING {
                    return Err(Error::decode(
                        start,
                        DecodeErrorKind::NestingTooDeep { max: MAX_NESTING },
                    ));
                }
                let mut inner = decoder.sub_decoder(len)?;
                let mut children = Vec::new();
                while !inner.is_empty() {
                    children.push(Self::decode_nested(&mut inner, depth + 1)?);
                }
                Ok(Value::Structure { tag: t, children })
            }
            other => {
                tracing::debug!(
                    target: "embedded_snmp::ber",
                    { snmp.offset = start, tag = other },
                    "unknown tag"
                );
                Err(Error::decode(start, DecodeErrorKind::UnknownTag(other)))
            }
        }
    }
}

fn write_hex(f: &mut std::fmt::Formatter<'_>, data: &[u8]) -> std::fmt::Result {
    let mut s = String::with_capacity(data.len() * 2);
    for b in data {
        let _ = write!(s, "{:02x}", b);
    }
    f.write_str(&s)
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{}", v),
            Value::OctetString(data) => match std::str::from_utf8(data) {
                Ok(s) => write!(f, "{}", s),
                Err(_) => {
                    f.write_str("0x")?;
                    write_hex(f, data)
                }
            },
            Value::Null => write!(f, "NULL"),
            Value::ObjectIdentifier(oid) => write!(f, "{}", oid),
            Value::IpAddress(addr) => {
                write!(f, "{}.{}.{}.{}", addr[0], addr[1], addr[2], addr[3])
            }
            Value::Counter32(v) | Value::Gauge32(v) => write!(f, "{}", v),
            Value::TimeTicks(v) => {
                let secs = v / 100;
                let days = secs / 86400;
                let hours = (secs % 86400) / 3600;
                let mins = (secs % 3600) / 60;
                let s = secs % 60;
                write!(f, "{}d {}h {}m {}s", days, hours, mins, s)
            }
            Value::Opaque(data) => {
                f.write_str("Opaque(0x")?;
                write_hex(f, data)?;
                f.write_str(")")
            }
            Value::Counter64(v) => write!(f, "{}", v),
            Value::NoSuchObject => write!(f, "noSuchObject"),
            Value::NoSuchInstance => write!(f, "noSuchInstance"),
            Value::EndOfMibView => write!(f, "endOfMibView"),
            Value::Structure { tag: t, children } => {
                write!(f, "{}[{} items]", tag::tag_name(*t), children.len())
            }
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::OctetString(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::OctetString(Bytes::from(s))
    }
}

impl From<&[u8]> for Value {
    fn from(data: &[u8]) -> Self {
        Value::OctetString(Bytes::copy_from_slice(data))
    }
}

impl From<Bytes> for Value {
    fn from(data: Bytes) -> Self {
        Value::OctetString(data)
    }
}

impl From<Oid> for Value {
    fn from(oid: Oid) -> Self {
        Value::ObjectIdentifier(oid)
    }
}

impl From<std::net::Ipv4Addr> for Value {
    fn from(addr: std::net::Ipv4Addr) -> Self {
        Value::IpAddress(addr.octets())
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Counter64(v)
    }
}
