#![no_main]

use libfuzzer_sys::fuzz_target;

use embedded_snmp::agent::Dispatcher;
use embedded_snmp::ber::{Decoder, IntegerForm};
use embedded_snmp::packet::SnmpPacket;
use embedded_snmp::registry::Registry;

fuzz_target!(|data: &[u8]| {
    let _ = SnmpPacket::parse(data);
    let _ = SnmpPacket::decode(Decoder::from_slice(data).with_octet_limit(16));

    // request handling against an empty registry must never panic
    let mut dispatcher = Dispatcher::new("public", None, 1400, 500, IntegerForm::Fixed4);
    let _ = dispatcher.handle_packet(data, &Registry::new());
});
