//! Common test fixtures and constants.

use std::net::SocketAddr;

use embedded_snmp::{Oid, oid};

// =============================================================================
// Addresses
// =============================================================================

pub fn agent_addr() -> SocketAddr {
    SocketAddr::from(([10, 0, 0, 1], 161))
}

pub fn manager_addr() -> SocketAddr {
    SocketAddr::from(([10, 0, 0, 2], 40000))
}

pub fn trap_receiver_addr() -> SocketAddr {
    SocketAddr::from(([10, 0, 0, 3], 162))
}

// =============================================================================
// Communities
// =============================================================================

/// Read-only community
pub const COMMUNITY_RO: &str = "public";
/// Read-write community
pub const COMMUNITY_RW: &str = "private";

// =============================================================================
// Test OIDs
// =============================================================================

/// Enterprise subtree the harness agent registers its objects under.
pub const ENTERPRISE: &str = ".1.3.6.1.4.1.5";

pub fn enterprise() -> Oid {
    oid!(1, 3, 6, 1, 4, 1, 5)
}

/// `ENTERPRISE.<arcs>`
pub fn enterprise_oid(arcs: &[u32]) -> Oid {
    let mut all = vec![1, 3, 6, 1, 4, 1, 5];
    all.extend_from_slice(arcs);
    Oid::from_arcs(&all)
}

/// Nonexistent OID for testing NoSuchObject
pub fn nonexistent_oid() -> Oid {
    oid!(1, 3, 6, 1, 99, 99, 99, 0)
}
