//! Error types for embedded-snmp.
//!
//! All errors are `#[non_exhaustive]` to allow adding new variants without breaking changes.

use std::net::SocketAddr;

use crate::version::Version;

/// Result type alias using the library's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// BER decode error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeErrorKind {
    /// Fewer bytes than the smallest TLV, or the input ended mid-field.
    TruncatedData,
    /// Declared length runs past the end of the bounded input.
    LengthExceedsBuffer { length: usize, available: usize },
    /// Indefinite length not supported.
    IndefiniteLength,
    /// Length field too long.
    LengthTooLong { octets: usize },
    /// Length exceeds maximum.
    LengthExceedsMax { length: usize, max: usize },
    /// Tag not known to the codec.
    UnknownTag(u8),
    /// Expected different tag.
    UnexpectedTag { expected: u8, actual: u8 },
    /// OCTET STRING longer than the configured limit.
    OctetStringTooLong { length: usize, max: usize },
    /// OID does not begin with the `1.3` prefix octet.
    InvalidOidPrefix,
    /// Truncated or non-minimal sub-identifier.
    InvalidOidEncoding,
    /// Sub-identifier does not fit in 32 bits.
    SubidentifierOverflow,
    /// OID has more sub-identifiers than allowed.
    OidTooLong { count: usize, max: usize },
    /// Zero-length integer.
    ZeroLengthInteger,
    /// Integer wider than its type allows.
    IntegerTooLong { length: usize },
    /// NULL with non-zero length.
    InvalidNull,
    /// Invalid IP address length.
    InvalidIpAddressLength { length: usize },
    /// Containers nested deeper than the decoder allows.
    NestingTooDeep { max: usize },
    /// Bytes left over after the top-level container.
    TrailingData { remaining: usize },
}

impl std::fmt::Display for DecodeErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TruncatedData => write!(f, "unexpected end of data"),
            Self::LengthExceedsBuffer { length, available } => {
                write!(
                    f,
                    "declared length {} exceeds {} available bytes",
                    length, available
                )
            }
            Self::IndefiniteLength => write!(f, "indefinite length encoding not supported"),
            Self::LengthTooLong { octets } => {
                write!(f, "length encoding too long ({} octets)", octets)
            }
            Self::LengthExceedsMax { length, max } => {
                write!(f, "length {} exceeds maximum {}", length, max)
            }
            Self::UnknownTag(t) => write!(f, "unknown tag 0x{:02X}", t),
            Self::UnexpectedTag { expected, actual } => {
                write!(f, "expected tag 0x{:02X}, got 0x{:02X}", expected, actual)
            }
            Self::OctetStringTooLong { length, max } => {
                write!(f, "octet string of {} bytes exceeds limit {}", length, max)
            }
            Self::InvalidOidPrefix => write!(f, "OID does not start with 1.3"),
            Self::InvalidOidEncoding => write!(f, "invalid OID sub-identifier encoding"),
            Self::SubidentifierOverflow => write!(f, "sub-identifier overflow"),
            Self::OidTooLong { count, max } => {
                write!(f, "OID has {count} sub-identifiers, exceeds maximum {max}")
            }
            Self::ZeroLengthInteger => write!(f, "zero-length integer"),
            Self::IntegerTooLong { length } => write!(f, "integer too long: {} bytes", length),
            Self::InvalidNull => write!(f, "NULL with non-zero length"),
            Self::InvalidIpAddressLength { length } => {
                write!(f, "IP address must be 4 bytes, got {}", length)
            }
            Self::NestingTooDeep { max } => write!(f, "containers nested deeper than {}", max),
            Self::TrailingData { remaining } => {
                write!(f, "{} trailing bytes after message", remaining)
            }
        }
    }
}

/// BER encode error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeErrorKind {
    /// Encoded form does not fit in the output bound.
    BufferTooSmall { needed: usize, max: usize },
    /// Attempted to encode an OID that failed validation.
    InvalidOid,
}

impl std::fmt::Display for EncodeErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BufferTooSmall { needed, max } => {
                write!(f, "encoding needs {} bytes but limit is {}", needed, max)
            }
            Self::InvalidOid => write!(f, "cannot encode invalid OID"),
        }
    }
}

/// OID validation error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OidErrorKind {
    /// Empty OID string.
    Empty,
    /// OID string does not start with `.1.3.`.
    MissingPrefix,
    /// Invalid arc value.
    InvalidArc,
    /// OID has too many arcs.
    TooManyArcs { count: usize, max: usize },
}

impl std::fmt::Display for OidErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "empty OID"),
            Self::MissingPrefix => write!(f, "OID must start with .1.3."),
            Self::InvalidArc => write!(f, "invalid arc value"),
            Self::TooManyArcs { count, max } => {
                write!(f, "OID has {} arcs, exceeds maximum {}", count, max)
            }
        }
    }
}

/// Field of an SNMP message being read when parsing failed.
///
/// Parsing walks these states in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParseState {
    Message,
    Version,
    Community,
    Pdu,
    RequestId,
    ErrorStatus,
    ErrorIndex,
    VarBinds,
    VarBind,
    Done,
}

impl ParseState {
    /// Stable negative code for this state, distinct per field.
    pub const fn code(self) -> i32 {
        let index = match self {
            Self::Message => 0,
            Self::Version => 1,
            Self::Community => 2,
            Self::Pdu => 3,
            Self::RequestId => 4,
            Self::ErrorStatus => 5,
            Self::ErrorIndex => 6,
            Self::VarBinds => 7,
            Self::VarBind => 8,
            Self::Done => 9,
        };
        -index - 30
    }
}

impl std::fmt::Display for ParseState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Message => write!(f, "message"),
            Self::Version => write!(f, "version"),
            Self::Community => write!(f, "community"),
            Self::Pdu => write!(f, "pdu"),
            Self::RequestId => write!(f, "request-id"),
            Self::ErrorStatus => write!(f, "error-status"),
            Self::ErrorIndex => write!(f, "error-index"),
            Self::VarBinds => write!(f, "varbind-list"),
            Self::VarBind => write!(f, "varbind"),
            Self::Done => write!(f, "end of message"),
        }
    }
}

/// Structural packet error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Field missing from the container.
    MissingField,
    /// Field carries the wrong BER tag.
    UnexpectedTag { expected: u8, actual: u8 },
    /// Version number outside v1/v2c.
    UnknownVersion(i32),
    /// PDU tag outside GetRequest..SNMPv2-Trap.
    UnknownPduType(u8),
    /// Varbind does not hold exactly an OID and a value.
    VarBindArity { count: usize },
    /// Extra fields after the varbind list.
    UnexpectedField,
}

impl std::fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingField => write!(f, "missing field"),
            Self::UnexpectedTag { expected, actual } => {
                write!(f, "expected tag 0x{:02X}, got 0x{:02X}", expected, actual)
            }
            Self::UnknownVersion(v) => write!(f, "unknown SNMP version: {}", v),
            Self::UnknownPduType(t) => write!(f, "unknown PDU type: 0x{:02X}", t),
            Self::VarBindArity { count } => {
                write!(f, "varbind holds {} elements, expected 2", count)
            }
            Self::UnexpectedField => write!(f, "unexpected trailing field"),
        }
    }
}

/// SNMP error status codes (RFC 3416).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorStatus {
    NoError,
    TooBig,
    NoSuchName,
    BadValue,
    ReadOnly,
    GenErr,
    NoAccess,
    WrongType,
    WrongLength,
    WrongEncoding,
    WrongValue,
    NoCreation,
    InconsistentValue,
    ResourceUnavailable,
    CommitFailed,
    UndoFailed,
    AuthorizationError,
    NotWritable,
    InconsistentName,
    /// Unknown/future error status code.
    Unknown(i32),
}

impl ErrorStatus {
    /// Create from raw status code.
    pub fn from_i32(value: i32) -> Self {
        match value {
            0 => Self::NoError,
            1 => Self::TooBig,
            2 => Self::NoSuchName,
            3 => Self::BadValue,
            4 => Self::ReadOnly,
            5 => Self::GenErr,
            6 => Self::NoAccess,
            7 => Self::WrongType,
            8 => Self::WrongLength,
            9 => Self::WrongEncoding,
            10 => Self::WrongValue,
            11 => Self::NoCreation,
            12 => Self::InconsistentValue,
            13 => Self::ResourceUnavailable,
            14 => Self::CommitFailed,
            15 => Self::UndoFailed,
            16 => Self::AuthorizationError,
            17 => Self::NotWritable,
            18 => Self::InconsistentName,
            other => Self::Unknown(other),
        }
    }

    /// Convert to raw status code.
    pub fn as_i32(&self) -> i32 {
        match self {
            Self::NoError => 0,
            Self::TooBig => 1,
            Self::NoSuchName => 2,
            Self::BadValue => 3,
            Self::ReadOnly => 4,
            Self::GenErr => 5,
            Self::NoAccess => 6,
            Self::WrongType => 7,
            Self::WrongLength => 8,
            Self::WrongEncoding => 9,
            Self::WrongValue => 10,
            Self::NoCreation => 11,
            Self::InconsistentValue => 12,
            Self::ResourceUnavailable => 13,
            Self::CommitFailed => 14,
            Self::UndoFailed => 15,
            Self::AuthorizationError => 16,
            Self::NotWritable => 17,
            Self::InconsistentName => 18,
            Self::Unknown(code) => *code,
        }
    }

    /// True for anything other than `noError`.
    pub fn is_error(&self) -> bool {
        !matches!(self, Self::NoError)
    }

    /// Narrow to the SNMPv1 vocabulary when answering a v1 request.
    ///
    /// Codes above `genErr` do not exist in v1 and become `genErr`.
    pub fn for_version(self, version: Version) -> Self {
        if version == Version::V1 && !(0..=5).contains(&self.as_i32()) {
            Self::GenErr
        } else {
            self
        }
    }

    /// Like [`for_version`](Self::for_version), but v1 requests get
    /// `v1_fallback` instead of the generic narrowing.
    pub fn for_version_or(self, version: Version, v1_fallback: ErrorStatus) -> Self {
        if version == Version::V1 {
            v1_fallback.for_version(version)
        } else {
            self
        }
    }
}

impl std::fmt::Display for ErrorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoError => write!(f, "noError"),
            Self::TooBig => write!(f, "tooBig"),
            Self::NoSuchName => write!(f, "noSuchName"),
            Self::BadValue => write!(f, "badValue"),
            Self::ReadOnly => write!(f, "readOnly"),
            Self::GenErr => write!(f, "genErr"),
            Self::NoAccess => write!(f, "noAccess"),
            Self::WrongType => write!(f, "wrongType"),
            Self::WrongLength => write!(f, "wrongLength"),
            Self::WrongEncoding => write!(f, "wrongEncoding"),
            Self::WrongValue => write!(f, "wrongValue"),
            Self::NoCreation => write!(f, "noCreation"),
            Self::InconsistentValue => write!(f, "inconsistentValue"),
            Self::ResourceUnavailable => write!(f, "resourceUnavailable"),
            Self::CommitFailed => write!(f, "commitFailed"),
            Self::UndoFailed => write!(f, "undoFailed"),
            Self::AuthorizationError => write!(f, "authorizationError"),
            Self::NotWritable => write!(f, "notWritable"),
            Self::InconsistentName => write!(f, "inconsistentName"),
            Self::Unknown(code) => write!(f, "unknown({})", code),
        }
    }
}

/// Library error type.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// I/O error on the datagram socket.
    #[error("I/O error{}: {source}", target.map(|t| format!(" communicating with {}", t)).unwrap_or_default())]
    Io {
        target: Option<SocketAddr>,
        #[source]
        source: std::io::Error,
    },

    /// Invalid OID format.
    #[error("invalid OID: {kind}")]
    InvalidOid {
        kind: OidErrorKind,
        input: Option<Box<str>>, // Only allocated when parsing string input
    },

    /// BER decoding error.
    #[error("decode error at offset {offset}: {kind}")]
    Decode {
        offset: usize,
        kind: DecodeErrorKind,
    },

    /// BER encoding error.
    #[error("encode error: {kind}")]
    Encode { kind: EncodeErrorKind },

    /// Well-formed BER that is not a valid SNMP message.
    #[error("malformed {state}: {kind}")]
    Parse {
        state: ParseState,
        kind: ParseErrorKind,
    },

    /// Datagram exceeds the configured maximum packet size.
    #[error("message too large: {size} bytes exceeds maximum {max}")]
    MessageTooLarge { size: usize, max: usize },

    /// A device handle that does not belong to this manager.
    #[error("unknown device {index}")]
    UnknownDevice { index: usize },
}

impl Error {
    /// Create a decode error.
    pub fn decode(offset: usize, kind: DecodeErrorKind) -> Self {
        Self::Decode { offset, kind }
    }

    /// Create an encode error.
    pub fn encode(kind: EncodeErrorKind) -> Self {
        Self::Encode { kind }
    }

    /// Create a packet structure error.
    pub fn parse(state: ParseState, kind: ParseErrorKind) -> Self {
        Self::Parse { state, kind }
    }

    /// Create an I/O error.
    pub fn io(target: Option<SocketAddr>, source: std::io::Error) -> Self {
        Self::Io { target, source }
    }

    /// Create an invalid OID error from a kind (no input string).
    pub fn invalid_oid(kind: OidErrorKind) -> Self {
        Self::InvalidOid { kind, input: None }
    }

    /// Create an invalid OID error with the input string that failed.
    pub fn invalid_oid_with_input(kind: OidErrorKind, input: impl Into<Box<str>>) -> Self {
        Self::InvalidOid {
            kind,
            input: Some(input.into()),
        }
    }

    /// Get the target address if this error has one.
    pub fn target(&self) -> Option<SocketAddr> {
        match self {
            Self::Io { target, .. } => *target,
            _ => None,
        }
    }
}
