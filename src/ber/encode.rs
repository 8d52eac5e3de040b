//! BER encoding.
//!
//! Uses a reverse buffer approach: content is written first and the tag and
//! length are prepended afterwards, so a container never has to move bytes
//! that were already written when its length field turns out to need the
//! long form.

use super::length::encode_length;
use super::tag;
use crate::oid::Oid;
use bytes::Bytes;

/// Wire form for INTEGER payloads.
///
/// `Fixed4` always writes four big-endian octets for non-zero values, which
/// is what deployed agents of this family emit. `Minimal` is strict X.690.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "cli", serde(rename_all = "lowercase"))]
pub enum IntegerForm {
    #[default]
    Fixed4,
    Minimal,
}

/// Buffer for BER encoding that writes backwards.
pub struct EncodeBuf {
    buf: Vec<u8>,
    integer_form: IntegerForm,
}

impl EncodeBuf {
    /// Create a new encode buffer with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(512)
    }

    /// Create a new encode buffer with specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            integer_form: IntegerForm::default(),
        }
    }

    /// Select the INTEGER wire form.
    pub fn with_integer_form(mut self, form: IntegerForm) -> Self {
        self.integer_form = form;
        self
    }

    /// The INTEGER wire form in use.
    pub fn integer_form(&self) -> IntegerForm {
        self.integer_form
    }

    /// Push a single byte (prepends to front).
    pub fn push_byte(&mut self, byte: u8) {
        self.buf.push(byte);
    }

    /// Push multiple bytes (prepends to front, keeping their order).
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend(bytes.iter().rev());
    }

    /// Push a BER length encoding.
    pub fn push_length(&mut self, len: usize) {
        let (bytes, count) = encode_length(len);
        self.buf.extend_from_slice(&bytes[..count]);
    }

    /// Push a BER tag.
    pub fn push_tag(&mut self, tag: u8) {
        self.buf.push(tag);
    }

    /// Get the current length of encoded data.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Check if buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Encode a constructed type (SEQUENCE, PDU, etc).
    ///
    /// Calls the closure to encode contents, then wraps with length and tag.
    pub fn push_constructed<F>(&mut self, tag: u8, f: F)
    where
        F: FnOnce(&mut Self),
    {
        let start_len = self.len();
        f(self);
        let content_len = self.len() - start_len;
        self.push_length(content_len);
        self.push_tag(tag);
    }

    /// Encode a SEQUENCE.
    pub fn push_sequence<F>(&mut self, f: F)
    where
        F: FnOnce(&mut Self),
    {
        self.push_constructed(tag::universal::SEQUENCE, f);
    }

    /// Encode an INTEGER.
    pub fn push_integer(&mut self, value: i32) {
        let (arr, len) = encode_integer_stack(value, self.integer_form);
        self.push_bytes(&arr[4 - len..]);
        self.push_length(len);
        self.push_tag(tag::universal::INTEGER);
    }

    /// Encode a Counter64.
    pub fn push_integer64(&mut self, value: u64) {
        let (arr, len) = encode_integer64_stack(value);
        self.push_bytes(&arr[9 - len..]);
        self.push_length(len);
        self.push_tag(tag::application::COUNTER64);
    }

    /// Encode an unsigned 32-bit integer with a specific tag.
    pub fn push_unsigned32(&mut self, tag: u8, value: u32) {
        let (arr, len) = encode_unsigned32_stack(value);
        self.push_bytes(&arr[5 - len..]);
        self.push_length(len);
        self.push_tag(tag);
    }

    /// Encode raw content under an arbitrary primitive tag.
    pub fn push_primitive(&mut self, tag: u8, data: &[u8]) {
        self.push_bytes(data);
        self.push_length(data.len());
        self.push_tag(tag);
    }

    /// Encode an OCTET STRING.
    pub fn push_octet_string(&mut self, data: &[u8]) {
        self.push_primitive(tag::universal::OCTET_STRING, data);
    }

    /// Encode a NULL.
    pub fn push_null(&mut self) {
        self.push_length(0);
        self.push_tag(tag::universal::NULL);
    }

    /// Encode an OBJECT IDENTIFIER from its stored BER form.
    pub fn push_oid(&mut self, oid: &Oid) {
        self.push_primitive(tag::universal::OBJECT_IDENTIFIER, oid.as_ber());
    }

    /// Encode an IP address.
    pub fn push_ip_address(&mut self, addr: [u8; 4]) {
        self.push_primitive(tag::application::IP_ADDRESS, &addr);
    }

    /// Finalize and return the encoded bytes.
    pub fn finish(mut self) -> Bytes {
        self.buf.reverse();
        Bytes::from(self.buf)
    }

    /// Finalize and return as `Vec<u8>`.
    pub fn finish_vec(mut self) -> Vec<u8> {
        self.buf.reverse();
        self.buf
    }
}

impl Default for EncodeBuf {
    fn default() -> Self {
        Self::new()
    }
}

/// Content length of an INTEGER in the given form.
#[inline]
pub fn integer_content_len(value: i32, form: IntegerForm) -> usize {
    encode_integer_stack(value, form).1
}

/// Content length of an unsigned 32-bit application type.
#[inline]
pub fn unsigned32_content_len(value: u32) -> usize {
    encode_unsigned32_stack(value).1
}

/// Content length of a Counter64.
#[inline]
pub fn integer64_content_len(value: u64) -> usize {
    encode_integer64_stack(value).1
}

/// Encode a signed 32-bit integer.
///
/// Returns a stack-allocated array and the number of valid bytes.
/// The valid bytes are at the END of the array (for reverse-buffer compatibility).
#[inline]
fn encode_integer_stack(value: i32, form: IntegerForm) -> ([u8; 4], usize) {
    let bytes = value.to_be_bytes();

    if value == 0 {
        return (bytes, 1);
    }
    if form == IntegerForm::Fixed4 {
        return (bytes, 4);
    }

    let mut start = 0;
    if value > 0 {
        // Skip leading 0x00 bytes, keeping one if the next byte has its sign bit set
        while start < 3 && bytes[start] == 0 && bytes[start + 1] & 0x80 == 0 {
            start += 1;
        }
    } else {
        while start < 3 && bytes[start] == 0xFF && bytes[start + 1] & 0x80 != 0 {
            start += 1;
        }
    }

    (bytes, 4 - start)
}

/// Encode an unsigned 32-bit integer.
///
/// The valid bytes are at the END of the array.
#[inline]
fn encode_unsigned32_stack(value: u32) -> ([u8; 5], usize) {
    if value == 0 {
        return ([0; 5], 1);
    }

    let bytes = value.to_be_bytes();
    let mut result = [0u8; 5];
    result[1..].copy_from_slice(&bytes);

    let start = bytes.iter().position(|b| *b != 0).unwrap_or(3);
    // A set MSB needs a leading 0x00 so the value is not read as negative
    if bytes[start] & 0x80 != 0 {
        (result, 5 - start)
    } else {
        (result, 4 - start)
    }
}

/// Encode an unsigned 64-bit integer.
///
/// The valid bytes are at the END of the array.
#[inline]
fn encode_integer64_stack(value: u64) -> ([u8; 9], usize) {
    if value == 0 {
        return ([0; 9], 1);
    }

    let bytes = value.to_be_bytes();
    let mut result = [0u8; 9];
    result[1..].copy_from_slice(&bytes);

    let start = bytes.iter().position(|b| *b != 0).unwrap_or(7);
    if bytes[start] & 0x80 != 0 {
        (result, 9 - start)
    } else {
        (result, 8 - start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_integer(value: i32, form: IntegerForm) -> Vec<u8> {
        let (arr, len) = encode_integer_stack(value, form);
        arr[4 - len..].to_vec()
    }

    fn encode_unsigned32(value: u32) -> Vec<u8> {
        let (arr, len) = encode_unsigned32_stack(value);
        arr[5 - len..].to_vec()
    }

    #[test]
    fn test_encode_integer_minimal() {
        let m = IntegerForm::Minimal;
        assert_eq!(encode_integer(0, m), vec![0]);
        assert_eq!(encode_integer(1, m), vec![1]);
        assert_eq!(encode_integer(127, m), vec![127]);
        assert_eq!(encode_integer(128, m), vec![0, 128]);
        assert_eq!(encode_integer(-1, m), vec![0xFF]);
        assert_eq!(encode_integer(-128, m), vec![0x80]);
        assert_eq!(encode_integer(-129, m), vec![0xFF, 0x7F]);
    }

    #[test]
    fn test_encode_integer_fixed() {
        let f = IntegerForm::Fixed4;
        assert_eq!(encode_integer(0, f), vec![0]);
        assert_eq!(encode_integer(23, f), vec![0, 0, 0, 23]);
        assert_eq!(encode_integer(-42, f), vec![0xFF, 0xFF, 0xFF, 0xD6]);
    }

    #[test]
    fn test_encode_unsigned32() {
        assert_eq!(encode_unsigned32(0), vec![0]);
        assert_eq!(encode_unsigned32(127), vec![127]);
        assert_eq!(encode_unsigned32(128), vec![0, 128]);
        assert_eq!(encode_unsigned32(256), vec![1, 0]);
        assert_eq!(encode_unsigned32(u32::MAX), vec![0, 0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_encode_integer64() {
        let (arr, len) = encode_integer64_stack(u64::MAX);
        assert_eq!(len, 9);
        assert_eq!(arr[0], 0);
        assert_eq!(integer64_content_len(0x0100), 2);
    }

    #[test]
    fn test_encode_null() {
        let mut buf = EncodeBuf::new();
        buf.push_null();
        assert_eq!(&buf.finish()[..], &[0x05, 0x00]);
    }

    #[test]
    fn test_encode_integer_value() {
        let mut buf = EncodeBuf::new().with_integer_form(IntegerForm::Minimal);
        buf.push_integer(42);
        assert_eq!(&buf.finish()[..], &[0x02, 0x01, 0x2A]);

        let mut buf = EncodeBuf::new();
        buf.push_integer(42);
        assert_eq!(&buf.finish()[..], &[0x02, 0x04, 0, 0, 0, 0x2A]);
    }

    #[test]
    fn test_encode_sequence() {
        let mut buf = EncodeBuf::new().with_integer_form(IntegerForm::Minimal);
        buf.push_sequence(|buf| {
            // Reverse buffer: push in reverse order for forward output
            buf.push_integer(2);
            buf.push_integer(1);
        });
        assert_eq!(
            &buf.finish()[..],
            &[0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x02]
        );
    }

    #[test]
    fn test_sequence_long_form_keeps_children_intact() {
        let payload = vec![0xAB; 130];
        let mut buf = EncodeBuf::new();
        buf.push_sequence(|buf| buf.push_octet_string(&payload));
        let bytes = buf.finish();
        // 0x30, 0x81, 0x85 | 0x04, 0x81, 0x82 | payload
        assert_eq!(&bytes[..6], &[0x30, 0x81, 0x85, 0x04, 0x81, 0x82]);
        assert_eq!(&bytes[6..], &payload[..]);
    }
}
