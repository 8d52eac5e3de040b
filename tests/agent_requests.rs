//! Agent request handling over the in-memory network.

mod common;

use std::sync::atomic::Ordering;

use common::*;
use embedded_snmp::agent::{Agent, HandleOutcome};
use embedded_snmp::packet::SnmpPacket;
use embedded_snmp::pdu::PduType;
use embedded_snmp::{ErrorStatus, Oid, Value, VarBind, Version};

fn values(response: Option<SnmpPacket>) -> Vec<Value> {
    let varbinds = response.unwrap().varbinds;
    varbinds.into_iter().map(|vb| vb.value).collect()
}

// =============================================================================
// Get
// =============================================================================

#[test]
fn get_returns_bound_integer() {
    let mut h = Harness::new();
    h.integer("1.1", 23, false);

    let (outcome, response) = h.request(
        Version::V2c,
        COMMUNITY_RO,
        PduType::GetRequest,
        42,
        &[enterprise_oid(&[1, 1])],
    );
    assert_eq!(outcome, HandleOutcome::Get);
    let response = response.unwrap();
    assert_eq!(response.pdu_type, PduType::GetResponse);
    assert_eq!(response.request_id(), 42);
    assert_eq!(response.error_status, 0);
    let expected = VarBind::new(enterprise_oid(&[1, 1]), Value::Integer(23));
    assert_eq!(response.varbinds, vec![expected]);
}

#[test]
fn get_reads_current_value() {
    let mut h = Harness::new();
    let cell = h.integer("1.1", 1, false);

    cell.store(77, Ordering::Relaxed);
    let (_, response) = h.read(PduType::GetRequest, &[enterprise_oid(&[1, 1])]);
    assert_eq!(values(response), vec![Value::Integer(77)]);
}

#[test]
fn get_missing_object_is_per_varbind() {
    let mut h = Harness::new();
    h.integer("1.1", 5, false);

    let oids = [nonexistent_oid(), enterprise_oid(&[1, 1])];
    let (_, response) = h.request(Version::V2c, COMMUNITY_RO, PduType::GetRequest, 2, &oids);
    let response = response.unwrap();
    assert_eq!(response.error_status, 0);
    assert_eq!(response.varbinds[0].value, Value::NoSuchObject);
    assert_eq!(response.varbinds[1].value, Value::Integer(5));
}

#[test]
fn get_failing_accessor_flags_only_its_slot() {
    let mut h = Harness::new();
    h.agent.add_dynamic_integer_handler("1.1", || None).unwrap();
    h.integer("1.2", 8, false);

    let oids = [enterprise_oid(&[1, 2]), enterprise_oid(&[1, 1])];
    let (_, response) = h.request(Version::V2c, COMMUNITY_RO, PduType::GetRequest, 3, &oids);
    let response = response.unwrap();
    assert_eq!(response.error_status(), ErrorStatus::GenErr);
    assert_eq!(response.error_index, 2);
    assert_eq!(response.varbinds[0].value, Value::Integer(8));
    assert_eq!(response.varbinds[1].value, Value::Null);
}

// =============================================================================
// GetNext / walk
// =============================================================================

#[test]
fn walk_visits_objects_in_oid_order() {
    let mut h = Harness::new();
    // registered out of order, including 2 < 10 numerically
    h.integer("10", 10, false);
    h.integer("2.1", 21, false);
    h.integer("1", 1, false);
    h.integer("2", 2, false);

    let mut seen = Vec::new();
    let mut cursor = enterprise();
    for id in 0.. {
        let oids = [cursor.clone()];
        let pdu_type = PduType::GetNextRequest;
        let (outcome, response) = h.request(Version::V2c, COMMUNITY_RO, pdu_type, id, &oids);
        assert_eq!(outcome, HandleOutcome::GetNext);
        let varbind = response.unwrap().varbinds.remove(0);
        if varbind.value == Value::EndOfMibView {
            break;
        }
        seen.push(varbind.value.as_i32().unwrap());
        cursor = varbind.oid;
    }
    assert_eq!(seen, vec![1, 2, 21, 10]);
}

#[test]
fn getnext_into_subtree_returns_first_child() {
    let mut h = Harness::new();
    h.integer("3.1.4", 314, false);

    let (_, response) = h.read(PduType::GetNextRequest, &[enterprise_oid(&[3])]);
    let response = response.unwrap();
    assert_eq!(response.varbinds[0].oid, enterprise_oid(&[3, 1, 4]));
    assert_eq!(response.varbinds[0].value, Value::Integer(314));
}

// =============================================================================
// GetBulk
// =============================================================================

fn bulk_request(version: Version, oids: &[Oid]) -> SnmpPacket {
    SnmpPacket::request(version, COMMUNITY_RO, PduType::GetBulkRequest, 9, oids)
}

#[test]
fn bulk_expands_repeaters() {
    let mut h = Harness::new();
    for n in 1..=4 {
        h.integer(&n.to_string(), n as i32 * 100, false);
    }

    let mut request = bulk_request(Version::V2c, &[enterprise()]);
    request.set_bulk_params(0, 2);
    let (outcome, response) = h.exchange(&request);
    assert_eq!(outcome, HandleOutcome::GetBulk);
    let expected = vec![Value::Integer(100), Value::Integer(200)];
    assert_eq!(values(response), expected);
}

#[test]
fn bulk_repeats_each_chain_in_walk_order() {
    let mut h = Harness::new();
    for (table, row) in [(1, 1), (1, 2), (1, 3), (2, 1), (2, 2), (2, 3)] {
        h.integer(&format!("{table}.{row}"), table * 10 + row, false);
    }

    let mut request = bulk_request(Version::V2c, &[enterprise_oid(&[1]), enterprise_oid(&[2])]);
    request.set_bulk_params(0, 2);
    let (outcome, response) = h.exchange(&request);
    assert_eq!(outcome, HandleOutcome::GetBulk);

    let varbinds = response.unwrap().varbinds;
    let oids: Vec<_> = varbinds.iter().map(|vb| vb.oid.clone()).collect();
    let values: Vec<_> = varbinds.into_iter().map(|vb| vb.value).collect();
    assert_eq!(
        oids,
        vec![
            enterprise_oid(&[1, 1]),
            enterprise_oid(&[1, 2]),
            enterprise_oid(&[2, 1]),
            enterprise_oid(&[2, 2]),
        ]
    );
    assert_eq!(
        values,
        vec![
            Value::Integer(11),
            Value::Integer(12),
            Value::Integer(21),
            Value::Integer(22),
        ]
    );
}

#[test]
fn bulk_non_repeaters_and_end_of_view() {
    let mut h = Harness::new();
    h.integer("1", 1, false);
    h.integer("2", 2, false);

    let mut request = bulk_request(Version::V2c, &[enterprise(), enterprise_oid(&[1])]);
    request.set_bulk_params(1, 5);
    let (_, response) = h.exchange(&request);
    let varbinds = response.unwrap().varbinds;

    // non-repeater: one step from the root
    assert_eq!(varbinds[0].oid, enterprise_oid(&[1]));
    // repeater from .1: .2 then the end of the view, no further repetitions
    assert_eq!(varbinds[1].oid, enterprise_oid(&[2]));
    assert_eq!(varbinds[2].value, Value::EndOfMibView);
    assert_eq!(varbinds.len(), 3);
}

#[test]
fn bulk_rejected_under_v1() {
    let mut h = Harness::new();
    h.integer("1", 1, false);

    let mut request = bulk_request(Version::V1, &[enterprise()]);
    request.set_bulk_params(0, 3);
    let (outcome, response) = h.exchange(&request);
    assert_eq!(outcome, HandleOutcome::ErrorPacketSent);
    assert_eq!(response.unwrap().error_status(), ErrorStatus::GenErr);
}

// =============================================================================
// Set
// =============================================================================

fn set_request(community: &str, version: Version, varbinds: Vec<VarBind>) -> SnmpPacket {
    let mut packet = SnmpPacket::new(version, community.to_string(), PduType::SetRequest);
    packet.set_request_id(77);
    packet.varbinds = varbinds;
    packet
}

#[test]
fn set_with_read_only_community_is_no_access() {
    let mut h = Harness::new();
    let cell = h.integer("1", 1, true);

    let (outcome, response) = h.exchange(&set_request(
        COMMUNITY_RO,
        Version::V2c,
        vec![VarBind::new(enterprise_oid(&[1]), Value::Integer(9))],
    ));
    assert_eq!(outcome, HandleOutcome::ErrorPacketSent);
    let response = response.unwrap();
    assert_eq!(response.error_status(), ErrorStatus::NoAccess);
    assert_eq!(response.error_index, 0);
    assert_eq!(cell.load(Ordering::Relaxed), 1);
    assert!(!h.agent.set_occurred());
}

#[test]
fn set_writes_and_echoes_new_value() {
    let mut h = Harness::new();
    let cell = h.integer("1", 1, true);
    let name = h.string("2", b"old", 16);

    let (outcome, response) = h.exchange(&set_request(
        COMMUNITY_RW,
        Version::V2c,
        vec![
            VarBind::new(enterprise_oid(&[1]), Value::Integer(9)),
            VarBind::new(enterprise_oid(&[2]), Value::from("new name")),
        ],
    ));
    assert_eq!(outcome, HandleOutcome::Set);
    let response = response.unwrap();
    assert_eq!(response.error_status, 0);
    assert_eq!(response.varbinds[0].value, Value::Integer(9));
    assert_eq!(response.varbinds[1].value, Value::from("new name"));
    assert_eq!(cell.load(Ordering::Relaxed), 9);
    assert_eq!(name.lock().as_slice(), b"new name");
    assert!(h.agent.set_occurred());
}

#[test]
fn set_type_mismatch_keeps_value() {
    let mut h = Harness::new();
    let cell = h.integer("1", 3, true);
    let varbinds = vec![VarBind::new(enterprise_oid(&[1]), Value::from("three"))];

    let (_, v2) = h.exchange(&set_request(COMMUNITY_RW, Version::V2c, varbinds.clone()));
    let v2 = v2.unwrap();
    assert_eq!(v2.error_status(), ErrorStatus::WrongType);
    assert_eq!(v2.error_index, 1);

    let (_, v1) = h.exchange(&set_request(COMMUNITY_RW, Version::V1, varbinds));
    assert_eq!(v1.unwrap().error_status(), ErrorStatus::BadValue);
    assert_eq!(cell.load(Ordering::Relaxed), 3);
}

#[test]
fn set_partial_failure_keeps_first_error() {
    let mut h = Harness::new();
    let writable = h.integer("1", 0, true);
    h.integer("2", 0, false);

    let (_, response) = h.exchange(&set_request(
        COMMUNITY_RW,
        Version::V2c,
        vec![
            VarBind::new(enterprise_oid(&[9]), Value::Integer(1)),
            VarBind::new(enterprise_oid(&[2]), Value::Integer(1)),
            VarBind::new(enterprise_oid(&[1]), Value::Integer(5)),
        ],
    ));
    let response = response.unwrap();
    assert_eq!(response.error_status(), ErrorStatus::NotWritable);
    assert_eq!(response.error_index, 1);
    assert_eq!(response.varbinds[1].value, Value::Null);
    // independent varbinds are still applied
    assert_eq!(writable.load(Ordering::Relaxed), 5);
    assert_eq!(response.varbinds[2].value, Value::Integer(5));
}

#[test]
fn set_string_too_long() {
    let mut h = Harness::new();
    let name = h.string("1", b"abc", 4);

    let (_, response) = h.exchange(&set_request(
        COMMUNITY_RW,
        Version::V2c,
        vec![VarBind::new(enterprise_oid(&[1]), Value::from("abcde"))],
    ));
    assert_eq!(response.unwrap().error_status(), ErrorStatus::WrongLength);
    assert_eq!(name.lock().as_slice(), b"abc");
}

#[test]
fn set_string_too_long_v1_is_bad_value() {
    let mut h = Harness::new();
    let name = h.string("1", b"abc", 4);

    let (_, response) = h.exchange(&set_request(
        COMMUNITY_RW,
        Version::V1,
        vec![VarBind::new(enterprise_oid(&[1]), Value::from("abcde"))],
    ));
    let response = response.unwrap();
    assert_eq!(response.error_status(), ErrorStatus::BadValue);
    assert_eq!(response.error_index, 1);
    assert_eq!(name.lock().as_slice(), b"abc");
}

// =============================================================================
// Rejections
// =============================================================================

#[test]
fn wrong_community_gets_no_reply() {
    let mut h = Harness::new();
    h.integer("1", 1, false);

    let oids = [enterprise_oid(&[1])];
    let (outcome, response) = h.request(Version::V2c, "guess", PduType::GetRequest, 1, &oids);
    assert_eq!(outcome, HandleOutcome::InvalidCommunity);
    assert!(response.is_none());
}

#[test]
fn garbage_gets_no_reply() {
    let mut h = Harness::new();
    h.send_raw(&[0x30, 0x03, 0x02, 0x01]);
    assert_eq!(h.agent.poll(), HandleOutcome::RequestInvalid);
    assert!(h.take_response().is_none());
}

#[test]
fn errors_are_idempotent() {
    let mut h = Harness::new();
    h.integer("1", 0, false);
    let request = set_request(
        COMMUNITY_RW,
        Version::V2c,
        vec![VarBind::new(enterprise_oid(&[1]), Value::Integer(1))],
    );

    h.send(&request);
    h.agent.poll();
    let first = h.take_raw_responses();
    h.send(&request);
    h.agent.poll();
    let second = h.take_raw_responses();
    assert_eq!(first, second);
    let response = SnmpPacket::parse(&first[0]).unwrap();
    assert_eq!(response.error_status(), ErrorStatus::ReadOnly);
}

#[test]
fn oversized_response_becomes_too_big() {
    let builder = Agent::builder()
        .community(COMMUNITY_RW)
        .max_packet_size(100);
    let mut h = Harness::with_builder(builder);
    let long = "x".repeat(90);
    let oid = ".1.3.6.1.4.1.5.1";
    h.agent
        .add_read_only_static_string_handler(oid, long)
        .unwrap();

    let oids = [enterprise_oid(&[1])];
    let (outcome, response) = h.request(Version::V2c, COMMUNITY_RW, PduType::GetRequest, 5, &oids);
    assert_eq!(outcome, HandleOutcome::ErrorPacketSent);
    let response = response.unwrap();
    assert_eq!(response.error_status(), ErrorStatus::TooBig);
    assert!(response.varbinds.is_empty());
}
