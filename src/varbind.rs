//! Variable binding (VarBind) type.
//!
//! A VarBind pairs an OID with a value. Responses additionally carry the
//! error status the agent assigned to that slot.

use crate::ber::{EncodeBuf, IntegerForm, tag};
use crate::error::{ErrorStatus, ParseErrorKind, ParseState, Error, Result};
use crate::oid::Oid;
use crate::value::Value;

/// Variable binding - an OID-value pair.
#[derive(Debug, Clone, PartialEq)]
pub struct VarBind {
    /// The object identifier.
    pub oid: Oid,
    /// The value.
    pub value: Value,
    /// Per-varbind error, `NoError` unless the agent flagged this slot.
    pub error_status: ErrorStatus,
}

impl VarBind {
    /// Create a new VarBind.
    pub fn new(oid: Oid, value: Value) -> Self {
        Self {
            oid,
            value,
            error_status: ErrorStatus::NoError,
        }
    }

    /// Create a VarBind with a NULL value (for GET requests).
    pub fn null(oid: Oid) -> Self {
        Self::new(oid, Value::Null)
    }

    /// Create a VarBind flagged with an error status.
    pub fn with_error(oid: Oid, value: Value, error_status: ErrorStatus) -> Self {
        Self {
            oid,
            value,
            error_status,
        }
    }

    /// The `SEQUENCE { oid, value }` container for this binding.
    pub fn to_value(&self) -> Value {
        Value::sequence(vec![
            Value::ObjectIdentifier(self.oid.clone()),
            self.value.clone(),
        ])
    }

    /// Read a binding from its decoded `SEQUENCE { oid, value }` container.
    ///
    /// The container must hold exactly two elements, the first an OID.
    pub fn from_value(container: &Value) -> Result<Self> {
        let fail = |kind| Err(Error::parse(ParseState::VarBind, kind));
        let Value::Structure { tag: t, children } = container else {
            return fail(ParseErrorKind::UnexpectedTag {
                expected: tag::universal::SEQUENCE,
                actual: container.tag(),
            });
        };
        if *t != tag::universal::SEQUENCE {
            return fail(ParseErrorKind::UnexpectedTag {
                expected: tag::universal::SEQUENCE,
                actual: *t,
            });
        }
        match children.as_slice() {
            [Value::ObjectIdentifier(oid), value] => Ok(Self::new(oid.clone(), value.clone())),
            [other, _] => fail(ParseErrorKind::UnexpectedTag {
                expected: tag::universal::OBJECT_IDENTIFIER,
                actual: other.tag(),
            }),
            _ => fail(ParseErrorKind::VarBindArity {
                count: children.len(),
            }),
        }
    }

    /// Encoded size of the `SEQUENCE { oid, value }`.
    pub fn encoded_len(&self, form: IntegerForm) -> Result<usize> {
        self.to_value().encoded_len(form)
    }

    /// Encode to BER.
    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_sequence(|buf| {
            self.value.encode(buf);
            buf.push_oid(&self.oid);
        });
    }
}

impl std::fmt::Display for VarBind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} = {}", self.oid, self.value)?;
        if self.error_status.is_error() {
            write!(f, " ({})", self.error_status)?;
        }
        Ok(())
    }
}
