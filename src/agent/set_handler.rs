//! SetRequest handling.

use crate::error::ErrorStatus;
use crate::packet::SnmpPacket;
use crate::registry::Registry;
use crate::value::Value;
use crate::varbind::VarBind;
use crate::version::Version;

use super::Dispatcher;

impl Dispatcher {
    /// Apply each varbind of a SET in order.
    ///
    /// Varbinds are independent: one refused write does not undo or skip
    /// the others. Checks run in this order: the OID must be registered,
    /// the value's type must match the binding, the callback must be
    /// settable, then the binding's own length checks apply. A successful
    /// write is answered with the value read back afterwards.
    ///
    /// The read-write permission check happens before this is called.
    pub(super) fn handle_set(&self, registry: &Registry, request: &SnmpPacket) -> Vec<VarBind> {
        let version = request.version();
        let mut out = Vec::with_capacity(request.varbinds.len());

        for requested in &request.varbinds {
            let refuse = |status: ErrorStatus| {
                VarBind::with_error(requested.oid.clone(), Value::Null, status)
            };

            let Some((_, callback)) = registry.find(&requested.oid, false, 0) else {
                tracing::debug!(
                    target: "embedded_snmp::agent",
                    { oid = %requested.oid },
                    "SET on unregistered OID"
                );
                out.push(refuse(write_error_for_version(ErrorStatus::NotWritable, version)));
                continue;
            };

            if callback.binding().tag() != requested.value.tag() {
                tracing::debug!(
                    target: "embedded_snmp::agent",
                    { oid = %requested.oid, value = %requested.value },
                    "SET type mismatch"
                );
                let status = ErrorStatus::WrongType.for_version_or(version, ErrorStatus::BadValue);
                out.push(refuse(status));
                continue;
            }

            if let Err(status) = callback.set_value(&requested.value) {
                tracing::debug!(
                    target: "embedded_snmp::agent",
                    { oid = %requested.oid, status = %status },
                    "SET refused"
                );
                out.push(refuse(write_error_for_version(status, version)));
                continue;
            }

            match callback.get_value() {
                Some(value) => out.push(VarBind::new(callback.oid().clone(), value)),
                None => out.push(refuse(ErrorStatus::GenErr)),
            }
        }
        out
    }
}

/// Narrow a refused write to the nearest code the request's version knows.
fn write_error_for_version(status: ErrorStatus, version: Version) -> ErrorStatus {
    match status {
        ErrorStatus::WrongLength | ErrorStatus::WrongValue | ErrorStatus::WrongEncoding => {
            status.for_version_or(version, ErrorStatus::BadValue)
        }
        ErrorStatus::NotWritable => status.for_version_or(version, ErrorStatus::NoSuchName),
        _ => status.for_version(version),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use bytes::Bytes;

    use super::*;
    use crate::ber::IntegerForm;
    use crate::oid::Oid;
    use crate::pdu::PduType;
    use crate::registry::{Binding, shared_bytes, shared_i32};
    use crate::version::Version;

    const OBJ_1: &str = ".1.3.6.1.4.1.5.1";
    const OBJ_2: &str = ".1.3.6.1.4.1.5.2";

    fn set_request(version: Version, varbinds: Vec<VarBind>) -> SnmpPacket {
        let mut packet = SnmpPacket::new(version, "private", PduType::SetRequest);
        packet.set_request_id(7);
        packet.varbinds = varbinds;
        packet
    }

    fn set(registry: &Registry, version: Version, varbinds: Vec<VarBind>) -> Vec<VarBind> {
        let dispatcher = Dispatcher::new(
            "private",
            Some(Bytes::from_static(b"public")),
            1400,
            500,
            IntegerForm::Fixed4,
        );
        dispatcher.handle_set(registry, &set_request(version, varbinds))
    }

    fn registry_with(entries: Vec<(&str, Binding, bool)>) -> Registry {
        let mut registry = Registry::new();
        for (oid, binding, settable) in entries {
            registry
                .add(Oid::from_dotted_string(oid), binding, settable)
                .unwrap();
        }
        registry
    }

    fn varbind(oid: &str, value: impl Into<Value>) -> VarBind {
        VarBind::new(Oid::from_dotted_string(oid), value.into())
    }

    #[test]
    fn test_set_writes_and_echoes() {
        let cell = shared_i32(1);
        let registry = registry_with(vec![(OBJ_1, Binding::integer(cell.clone()), true)]);

        let out = set(&registry, Version::V2c, vec![varbind(OBJ_1, 99)]);
        assert_eq!(out[0].value, Value::Integer(99));
        assert_eq!(out[0].error_status, ErrorStatus::NoError);
        assert_eq!(cell.load(Ordering::Relaxed), 99);
    }

    #[test]
    fn test_set_type_mismatch_leaves_value() {
        let cell = shared_i32(5);
        let registry = registry_with(vec![(OBJ_1, Binding::integer(cell.clone()), true)]);
        let varbinds = vec![varbind(OBJ_1, "hello")];

        let v2 = set(&registry, Version::V2c, varbinds.clone());
        assert_eq!(v2[0].error_status, ErrorStatus::WrongType);
        let v1 = set(&registry, Version::V1, varbinds);
        assert_eq!(v1[0].error_status, ErrorStatus::BadValue);
        assert_eq!(cell.load(Ordering::Relaxed), 5);
    }

    #[test]
    fn test_set_not_found_and_read_only() {
        let fixed = Binding::integer(shared_i32(0));
        let registry = registry_with(vec![(OBJ_1, fixed, false)]);
        let varbinds = vec![varbind(".1.3.6.1.4.1.5.9", 1), varbind(OBJ_1, 1)];

        let v2 = set(&registry, Version::V2c, varbinds.clone());
        assert_eq!(v2[0].error_status, ErrorStatus::NotWritable);
        assert_eq!(v2[1].error_status, ErrorStatus::ReadOnly);

        let v1 = set(&registry, Version::V1, varbinds);
        assert_eq!(v1[0].error_status, ErrorStatus::NoSuchName);
        assert_eq!(v1[1].error_status, ErrorStatus::ReadOnly);
    }

    #[test]
    fn test_set_string_too_long() {
        let cell = shared_bytes("abc");
        let registry = registry_with(vec![(OBJ_1, Binding::string(cell.clone(), 4), true)]);

        let out = set(&registry, Version::V2c, vec![varbind(OBJ_1, "toolong")]);
        assert_eq!(out[0].error_status, ErrorStatus::WrongLength);
        assert_eq!(cell.lock().as_slice(), b"abc");
    }

    #[test]
    fn test_set_refusals_narrowed_for_v1() {
        let registry = registry_with(vec![
            (OBJ_1, Binding::string(shared_bytes("abc"), 4), true),
            (OBJ_2, Binding::StaticString(Bytes::from_static(b"fixed")), true),
        ]);
        let varbinds = vec![varbind(OBJ_1, "toolong"), varbind(OBJ_2, "x")];

        let v2 = set(&registry, Version::V2c, varbinds.clone());
        assert_eq!(v2[0].error_status, ErrorStatus::WrongLength);
        assert_eq!(v2[1].error_status, ErrorStatus::NotWritable);

        let v1 = set(&registry, Version::V1, varbinds);
        assert_eq!(v1[0].error_status, ErrorStatus::BadValue);
        assert_eq!(v1[1].error_status, ErrorStatus::NoSuchName);
    }

    #[test]
    fn test_write_error_for_version() {
        assert_eq!(
            write_error_for_version(ErrorStatus::WrongValue, Version::V1),
            ErrorStatus::BadValue
        );
        assert_eq!(
            write_error_for_version(ErrorStatus::WrongEncoding, Version::V2c),
            ErrorStatus::WrongEncoding
        );
        assert_eq!(
            write_error_for_version(ErrorStatus::ReadOnly, Version::V1),
            ErrorStatus::ReadOnly
        );
        assert_eq!(
            write_error_for_version(ErrorStatus::CommitFailed, Version::V1),
            ErrorStatus::GenErr
        );
    }
}
