//! Well-known OIDs from RFC 1213 and SNMPv2-MIB.

use crate::oid;
use crate::oid::Oid;

/// `sysDescr.0`
pub fn sys_descr() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)
}

/// `sysObjectID.0`
pub fn sys_object_id() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 2, 0)
}

/// `sysUpTime.0`, first varbind of every v2 notification.
pub fn sys_uptime() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 3, 0)
}

/// `sysContact.0`
pub fn sys_contact() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 4, 0)
}

/// `sysName.0`
pub fn sys_name() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 5, 0)
}

/// `sysLocation.0`
pub fn sys_location() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 6, 0)
}

/// `snmpTrapOID.0`, second varbind of every v2 notification.
pub fn snmp_trap_oid() -> Oid {
    oid!(1, 3, 6, 1, 6, 3, 1, 1, 4, 1, 0)
}

/// `snmpTraps` subtree holding the generic notification OIDs.
pub fn snmp_traps() -> Oid {
    oid!(1, 3, 6, 1, 6, 3, 1, 1, 5)
}

/// v2 notification OID for a v1 generic trap number (RFC 3584 section 3.1).
///
/// `coldStart(0)` maps to `snmpTraps.1` and so on. Enterprise-specific
/// traps have no fixed OID and return `None`.
pub fn generic_trap_oid(generic_trap: i32) -> Option<Oid> {
    match generic_trap {
        0..=5 => Some(snmp_traps().child(generic_trap as u32 + 1)),
        _ => None,
    }
}
