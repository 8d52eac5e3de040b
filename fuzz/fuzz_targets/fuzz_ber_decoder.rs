#![no_main]

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;

use embedded_snmp::ber::{Decoder, IntegerForm};
use embedded_snmp::value::Value;
use embedded_snmp::varbind::VarBind;

fuzz_target!(|data: &[u8]| {
    let bytes = Bytes::copy_from_slice(data);

    // BER primitives
    let _ = Decoder::new(bytes.clone()).read_integer();
    let _ = Decoder::new(bytes.clone()).read_octet_string();
    let _ = Decoder::new(bytes.clone()).read_null();
    let _ = Decoder::new(bytes.clone()).read_oid();
    let _ = Decoder::new(bytes.clone()).read_sequence();
    let _ = Decoder::new(bytes.clone()).skip_tlv();

    // Whole values, including nested structures
    let mut decoder = Decoder::new(bytes.clone()).with_octet_limit(500);
    if let Ok(value) = Value::decode(&mut decoder) {
        let _ = value.serialise(IntegerForm::Minimal, usize::MAX);
        if let Ok(varbind) = VarBind::from_value(&value) {
            let _ = varbind.encoded_len(IntegerForm::Fixed4);
        }
    }
});
