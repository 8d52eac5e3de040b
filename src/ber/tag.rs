//! BER tag definitions for SNMP.
//!
//! Tag octet layout (X.690 Section 8.1.2):
//! - Bits 7-6: Class (00=Universal, 01=Application, 10=Context-specific, 11=Private)
//! - Bit 5: Primitive (0) or Constructed (1)
//! - Bits 4-0: Tag number

/// Tag class bits (bits 7-6)
pub mod class {
    pub const UNIVERSAL: u8 = 0x00;
    pub const APPLICATION: u8 = 0x40;
    pub const CONTEXT_SPECIFIC: u8 = 0x80;
}

/// Constructed bit (bit 5)
pub const CONSTRUCTED: u8 = 0x20;

/// Universal tags
pub mod universal {
    pub const INTEGER: u8 = 0x02;
    pub const OCTET_STRING: u8 = 0x04;
    pub const NULL: u8 = 0x05;
    pub const OBJECT_IDENTIFIER: u8 = 0x06;
    pub const SEQUENCE: u8 = 0x30; // Constructed
}

/// Application tags (SNMP SMI types)
pub mod application {
    /// IpAddress, also called NetworkAddress in SNMPv1 traps.
    pub const IP_ADDRESS: u8 = 0x40;
    pub const COUNTER32: u8 = 0x41;
    pub const GAUGE32: u8 = 0x42;
    pub const TIMETICKS: u8 = 0x43;
    pub const OPAQUE: u8 = 0x44;
    pub const COUNTER64: u8 = 0x46;
}

/// Context-specific primitive tags used as varbind exception markers
pub mod context {
    pub const NO_SUCH_OBJECT: u8 = 0x80;
    pub const NO_SUCH_INSTANCE: u8 = 0x81;
    pub const END_OF_MIB_VIEW: u8 = 0x82;
}

/// PDU tags (context-specific, constructed)
pub mod pdu {
    use super::CONSTRUCTED;
    use super::class::CONTEXT_SPECIFIC;

    pub const GET_REQUEST: u8 = CONTEXT_SPECIFIC | CONSTRUCTED; // 0xA0
    pub const GET_NEXT_REQUEST: u8 = CONTEXT_SPECIFIC | CONSTRUCTED | 0x01; // 0xA1
    pub const GET_RESPONSE: u8 = CONTEXT_SPECIFIC | CONSTRUCTED | 0x02; // 0xA2
    pub const SET_REQUEST: u8 = CONTEXT_SPECIFIC | CONSTRUCTED | 0x03; // 0xA3
    pub const TRAP_V1: u8 = CONTEXT_SPECIFIC | CONSTRUCTED | 0x04; // 0xA4
    pub const GET_BULK_REQUEST: u8 = CONTEXT_SPECIFIC | CONSTRUCTED | 0x05; // 0xA5
    pub const INFORM_REQUEST: u8 = CONTEXT_SPECIFIC | CONSTRUCTED | 0x06; // 0xA6
    pub const TRAP_V2: u8 = CONTEXT_SPECIFIC | CONSTRUCTED | 0x07; // 0xA7
}

/// Check if a tag indicates a constructed type
#[inline]
pub const fn is_constructed(tag: u8) -> bool {
    tag & CONSTRUCTED != 0
}

/// Check if a tag may carry child containers when decoding.
///
/// Only SEQUENCE and the SNMP PDU tags are treated as containers.
#[inline]
pub const fn is_container(tag: u8) -> bool {
    tag == universal::SEQUENCE || (tag >= pdu::GET_REQUEST && tag <= pdu::TRAP_V2)
}

/// Short human-readable name for a tag, used in log output.
pub const fn tag_name(tag: u8) -> &'static str {
    match tag {
        universal::INTEGER => "INTEGER",
        universal::OCTET_STRING => "OCTET STRING",
        universal::NULL => "NULL",
        universal::OBJECT_IDENTIFIER => "OBJECT IDENTIFIER",
        universal::SEQUENCE => "SEQUENCE",
        application::IP_ADDRESS => "IpAddress",
        application::COUNTER32 => "Counter32",
        application::GAUGE32 => "Gauge32",
        application::TIMETICKS => "TimeTicks",
        application::OPAQUE => "Opaque",
        application::COUNTER64 => "Counter64",
        context::NO_SUCH_OBJECT => "noSuchObject",
        context::NO_SUCH_INSTANCE => "noSuchInstance",
        context::END_OF_MIB_VIEW => "endOfMibView",
        pdu::GET_REQUEST => "GetRequest",
        pdu::GET_NEXT_REQUEST => "GetNextRequest",
        pdu::GET_RESPONSE => "GetResponse",
        pdu::SET_REQUEST => "SetRequest",
        pdu::TRAP_V1 => "Trap",
        pdu::GET_BULK_REQUEST => "GetBulkRequest",
        pdu::INFORM_REQUEST => "InformRequest",
        pdu::TRAP_V2 => "SNMPv2-Trap",
        _ => "unknown",
    }
}
