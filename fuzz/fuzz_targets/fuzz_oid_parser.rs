#![no_main]

use libfuzzer_sys::fuzz_target;

use embedded_snmp::oid::Oid;

fuzz_target!(|data: &[u8]| {
    if let Ok(oid) = Oid::from_ber(data) {
        let _ = oid.to_dotted_string();
    }

    if let Ok(s) = std::str::from_utf8(data) {
        let _ = Oid::parse(s);
        let lenient = Oid::from_dotted_string(s);
        let _ = lenient.is_valid();
    }
});
