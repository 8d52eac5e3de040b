//! Object Identifier (OID) type.
//!
//! An [`Oid`] keeps its BER content octets as the primary representation, so
//! exact-match lookups are plain byte comparisons and encoding is a copy.
//! The dotted string and the numeric sorting key are derived on first use and
//! memoized.
//!
//! Every OID handled here lives under `1.3` (ISO identified-organization),
//! whose combined first sub-identifier is the single octet `0x2B`.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;

use smallvec::SmallVec;

use crate::error::{DecodeErrorKind, Error, OidErrorKind, Result};

/// Maximum number of arcs (sub-identifiers) allowed in an OID.
///
/// Per RFC 2578 Section 3.5: "there are at most 128 sub-identifiers in a value".
pub const MAX_OID_LEN: usize = 128;

/// First content octet of every valid OID: `40 * 1 + 3`.
pub const PREFIX_OCTET: u8 = 0x2B;

/// Dotted prefix every valid OID string starts with.
pub const DOTTED_PREFIX: &str = ".1.3.";

/// Object Identifier.
///
/// Equality is byte equality of the encoded form. Ordering compares the
/// sub-identifiers numerically, so a parent sorts immediately before its
/// children and `.1.3.6.1.4.1.51.1` sorts before `.1.3.6.1.4.1.510.1`.
#[derive(Clone)]
pub struct Oid {
    ber: SmallVec<[u8; 32]>,
    valid: bool,
    dotted: OnceLock<Box<str>>,
    key: OnceLock<SmallVec<[u32; 16]>>,
}

impl Oid {
    fn from_parts(ber: SmallVec<[u8; 32]>, valid: bool) -> Self {
        Self {
            ber,
            valid,
            dotted: OnceLock::new(),
            key: OnceLock::new(),
        }
    }

    fn invalid(input: &str) -> Self {
        let oid = Self::from_parts(SmallVec::new(), false);
        let _ = oid.dotted.set(input.into());
        oid
    }

    /// Build an OID from a dotted string such as `.1.3.6.1.2.1.1.1.0`.
    ///
    /// Never fails: the result is marked invalid unless the string starts
    /// with `.1.3.` and every remaining token is a non-negative integer.
    /// Invalid OIDs encode to nothing and never match a registry entry.
    pub fn from_dotted_string(s: &str) -> Self {
        Self::try_from_dotted(s).unwrap_or_else(|_| Self::invalid(s))
    }

    fn try_from_dotted(s: &str) -> Result<Self> {
        let Some(rest) = s.strip_prefix(DOTTED_PREFIX) else {
            let kind = if s.is_empty() {
                OidErrorKind::Empty
            } else {
                OidErrorKind::MissingPrefix
            };
            return Err(Error::invalid_oid_with_input(kind, s));
        };

        let mut ber = SmallVec::new();
        ber.push(PREFIX_OCTET);
        let mut count = 2;
        for token in rest.split('.') {
            let arc: u32 = token
                .parse()
                .map_err(|_| Error::invalid_oid_with_input(OidErrorKind::InvalidArc, s))?;
            count += 1;
            if count > MAX_OID_LEN {
                return Err(Error::invalid_oid_with_input(
                    OidErrorKind::TooManyArcs {
                        count,
                        max: MAX_OID_LEN,
                    },
                    s,
                ));
            }
            encode_subidentifier(&mut ber, arc);
        }
        Ok(Self::from_parts(ber, true))
    }

    /// Parse a dotted OID, returning an error if it is not valid.
    ///
    /// Accepts the leading dot as optional: `1.3.6.1` and `.1.3.6.1` are the same.
    pub fn parse(s: &str) -> Result<Self> {
        if s.starts_with('.') {
            Self::try_from_dotted(s)
        } else {
            Self::try_from_dotted(&format!(".{}", s))
        }
    }

    /// Create an OID from arc values, which must start with `1, 3`.
    ///
    /// Used by the [`oid!`](crate::oid!) macro. A slice that does not start
    /// with `1, 3` produces an invalid OID.
    pub fn from_arcs(arcs: &[u32]) -> Self {
        match arcs {
            [1, 3, rest @ ..] if arcs.len() <= MAX_OID_LEN => {
                let mut ber = SmallVec::new();
                ber.push(PREFIX_OCTET);
                for &arc in rest {
                    encode_subidentifier(&mut ber, arc);
                }
                Self::from_parts(ber, true)
            }
            _ => {
                let text: String = arcs.iter().map(|a| format!(".{}", a)).collect();
                Self::invalid(&text)
            }
        }
    }

    /// Decode from BER content octets.
    ///
    /// Rejects a missing `0x2B` prefix octet, truncated or non-minimal
    /// sub-identifiers, sub-identifiers above `u32::MAX`, and OIDs longer
    /// than [`MAX_OID_LEN`].
    pub fn from_ber(data: &[u8]) -> Result<Self> {
        match data.first() {
            Some(&PREFIX_OCTET) => {}
            _ => return Err(Error::decode(0, DecodeErrorKind::InvalidOidPrefix)),
        }

        let mut i = 1;
        let mut count = 2;
        while i < data.len() {
            let decoded = decode_subidentifier(&data[i..]);
            let (_, consumed) = decoded.map_err(|kind| Error::decode(i, kind))?;
            i += consumed;
            count += 1;
            if count > MAX_OID_LEN {
                return Err(Error::decode(
                    i,
                    DecodeErrorKind::OidTooLong {
                        count,
                        max: MAX_OID_LEN,
                    },
                ));
            }
        }

        Ok(Self::from_parts(SmallVec::from_slice(data), true))
    }

    /// Whether this OID may be encoded and matched.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// BER content octets (without tag and length).
    pub fn as_ber(&self) -> &[u8] {
        &self.ber
    }

    /// Dotted form, `.1.3.<arc>...`, computed once.
    pub fn to_dotted_string(&self) -> &str {
        self.dotted.get_or_init(|| {
            let mut s = String::from(".1.3");
            for arc in self.sorting_key() {
                s.push('.');
                s.push_str(&arc.to_string());
            }
            s.into_boxed_str()
        })
    }

    /// Sub-identifiers after the `1.3` prefix, computed once.
    ///
    /// Two OIDs compare as their sorting keys compare.
    pub fn sorting_key(&self) -> &[u32] {
        self.key.get_or_init(|| {
            let mut key = SmallVec::new();
            let mut i = 1;
            while i < self.ber.len() {
                match decode_subidentifier(&self.ber[i..]) {
                    Ok((arc, consumed)) => {
                        key.push(arc);
                        i += consumed;
                    }
                    Err(_) => break,
                }
            }
            key
        })
    }

    /// Number of arcs, counting the leading `1.3`.
    pub fn len(&self) -> usize {
        if self.ber.is_empty() {
            0
        } else {
            self.sorting_key().len() + 2
        }
    }

    /// True for an invalid OID with no encoded form.
    pub fn is_empty(&self) -> bool {
        self.ber.is_empty()
    }

    /// True if `self` lies strictly below `ancestor` in the OID tree.
    ///
    /// `self` must begin with all of `ancestor`'s encoded bytes and be longer.
    pub fn is_subtree_of(&self, ancestor: &Oid) -> bool {
        self.valid
            && ancestor.valid
            && ancestor.ber.len() < self.ber.len()
            && self.ber.starts_with(&ancestor.ber)
    }

    /// True if `self` equals `prefix` or lies below it.
    pub fn starts_with(&self, prefix: &Oid) -> bool {
        self == prefix || self.is_subtree_of(prefix)
    }

    /// Create a child OID by appending an arc.
    pub fn child(&self, arc: u32) -> Oid {
        if !self.valid {
            return self.clone();
        }
        let mut ber = self.ber.clone();
        encode_subidentifier(&mut ber, arc);
        Self::from_parts(ber, true)
    }
}

/// Append a sub-identifier in base-128, most significant group first.
fn encode_subidentifier(out: &mut SmallVec<[u8; 32]>, value: u32) {
    let groups = if value == 0 {
        1
    } else {
        (32 - value.leading_zeros() as usize).div_ceil(7)
    };
    for i in (0..groups).rev() {
        let mut byte = ((value >> (i * 7)) & 0x7F) as u8;
        if i > 0 {
            byte |= 0x80;
        }
        out.push(byte);
    }
}

/// Decode one sub-identifier, returning (value, bytes_consumed).
fn decode_subidentifier(data: &[u8]) -> std::result::Result<(u32, usize), DecodeErrorKind> {
    // 0x80 as a first octet would be a redundant leading zero group
    if data.first() == Some(&0x80) {
        return Err(DecodeErrorKind::InvalidOidEncoding);
    }

    let mut value: u32 = 0;
    for (i, &byte) in data.iter().enumerate() {
        if value > (u32::MAX >> 7) {
            return Err(DecodeErrorKind::SubidentifierOverflow);
        }
        value = (value << 7) | u32::from(byte & 0x7F);
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    Err(DecodeErrorKind::InvalidOidEncoding)
}

impl PartialEq for Oid {
    fn eq(&self, other: &Self) -> bool {
        self.valid == other.valid && self.ber == other.ber
    }
}

impl Eq for Oid {}

impl Hash for Oid {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.valid.hash(state);
        self.ber.hash(state);
    }
}

impl PartialOrd for Oid {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Oid {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sorting_key()
            .cmp(other.sorting_key())
            .then_with(|| self.valid.cmp(&other.valid))
            .then_with(|| self.ber.cmp(&other.ber))
    }
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({})", self.to_dotted_string())
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_dotted_string())
    }
}

impl std::str::FromStr for Oid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl<const N: usize> From<[u32; N]> for Oid {
    fn from(arcs: [u32; N]) -> Self {
        Self::from_arcs(&arcs)
    }
}

/// Create an OID from arc literals.
///
/// ```
/// use embedded_snmp::oid;
///
/// let sys_descr = oid!(1, 3, 6, 1, 2, 1, 1, 1, 0);
/// assert_eq!(sys_descr.to_string(), ".1.3.6.1.2.1.1.1.0");
/// assert!(sys_descr.is_subtree_of(&oid!(1, 3, 6, 1, 2, 1, 1)));
/// ```
#[macro_export]
macro_rules! oid {
    ($($arc:expr),* $(,)?) => {
        $crate::oid::Oid::from_arcs(&[$($arc),*])
    };
}
