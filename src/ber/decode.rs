//! BER decoding.
//!
//! Zero-copy decoding using `Bytes`. Every read is bounded by the data the
//! decoder was given; a declared length is compared against the remaining
//! bytes before anything is sliced.

use super::length::decode_length;
use super::tag;
use crate::error::{DecodeErrorKind, Error, Result};
use crate::oid::Oid;
use bytes::Bytes;

/// Default upper bound on decoded OCTET STRING and Opaque payloads.
pub const DEFAULT_OCTET_STRING_LIMIT: usize = 500;

/// BER decoder that reads from a byte buffer.
#[derive(Debug, Clone)]
pub struct Decoder {
    data: Bytes,
    offset: usize,
    /// Absolute offset of `data[0]` in the outermost buffer, for error reports.
    base: usize,
    octet_limit: usize,
}

impl Decoder {
    /// Create a new decoder from bytes.
    pub fn new(data: Bytes) -> Self {
        Self {
            data,
            offset: 0,
            base: 0,
            octet_limit: DEFAULT_OCTET_STRING_LIMIT,
        }
    }

    /// Create a decoder from a byte slice (copies the data).
    pub fn from_slice(data: &[u8]) -> Self {
        Self::new(Bytes::copy_from_slice(data))
    }

    /// Set the largest OCTET STRING or Opaque payload this decoder accepts.
    pub fn with_octet_limit(mut self, limit: usize) -> Self {
        self.octet_limit = limit;
        self
    }

    /// Current offset relative to the outermost buffer.
    pub fn offset(&self) -> usize {
        self.base + self.offset
    }

    /// Get remaining bytes.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    /// Check if we've reached the end.
    pub fn is_empty(&self) -> bool {
        self.offset >= self.data.len()
    }

    /// Peek at the next byte without consuming it.
    pub fn peek_byte(&self) -> Option<u8> {
        self.data.get(self.offset).copied()
    }

    /// Peek at the next tag without consuming it.
    pub fn peek_tag(&self) -> Option<u8> {
        self.peek_byte()
    }

    fn fail<T>(&self, kind: DecodeErrorKind) -> Result<T> {
        tracing::debug!(
            target: "embedded_snmp::ber",
            { snmp.offset = %self.offset(), kind = %kind },
            "decode failed"
        );
        Err(Error::decode(self.offset(), kind))
    }

    /// Read a single byte.
    pub fn read_byte(&mut self) -> Result<u8> {
        match self.data.get(self.offset) {
            Some(&byte) => {
                self.offset += 1;
                Ok(byte)
            }
            None => self.fail(DecodeErrorKind::TruncatedData),
        }
    }

    /// Read a tag byte.
    pub fn read_tag(&mut self) -> Result<u8> {
        self.read_byte()
    }

    /// Read a length, checking it against the bytes that follow.
    pub fn read_length(&mut self) -> Result<usize> {
        let (len, consumed) = decode_length(&self.data[self.offset..], self.offset())?;
        self.offset += consumed;
        if len > self.remaining() {
            return self.fail(DecodeErrorKind::LengthExceedsBuffer {
                length: len,
                available: self.remaining(),
            });
        }
        Ok(len)
    }

    /// Read raw bytes without copying.
    pub fn read_bytes(&mut self, len: usize) -> Result<Bytes> {
        // saturating_add keeps a huge len from wrapping past the bounds check
        if self.offset.saturating_add(len) > self.data.len() {
            return self.fail(DecodeErrorKind::LengthExceedsBuffer {
                length: len,
                available: self.remaining(),
            });
        }
        let bytes = self.data.slice(self.offset..self.offset + len);
        self.offset += len;
        Ok(bytes)
    }

    /// Read and expect a specific tag, returning the content length.
    pub fn expect_tag(&mut self, expected: u8) -> Result<usize> {
        let tag = self.read_tag()?;
        if tag != expected {
            self.offset -= 1;
            return self.fail(DecodeErrorKind::UnexpectedTag {
                expected,
                actual: tag,
            });
        }
        self.read_length()
    }

    /// Read a BER integer (signed).
    pub fn read_integer(&mut self) -> Result<i32> {
        let len = self.expect_tag(tag::universal::INTEGER)?;
        self.read_integer_value(len)
    }

    /// Read integer content given the length.
    ///
    /// Forms shorter than four bytes are sign-extended.
    pub fn read_integer_value(&mut self, len: usize) -> Result<i32> {
        if len == 0 {
            return self.fail(DecodeErrorKind::ZeroLengthInteger);
        }
        if len > 4 {
            return self.fail(DecodeErrorKind::IntegerTooLong { length: len });
        }

        let bytes = self.read_bytes(len)?;
        let seed: i32 = if bytes[0] & 0x80 != 0 { -1 } else { 0 };
        Ok(bytes
            .iter()
            .fold(seed, |acc, &b| (acc << 8) | i32::from(b)))
    }

    /// Read an unsigned 32-bit integer with specific tag.
    pub fn read_unsigned32(&mut self, expected_tag: u8) -> Result<u32> {
        let len = self.expect_tag(expected_tag)?;
        self.read_unsigned32_value(len)
    }

    /// Read unsigned 32-bit content given the length.
    pub fn read_unsigned32_value(&mut self, len: usize) -> Result<u32> {
        if len == 0 {
            return self.fail(DecodeErrorKind::ZeroLengthInteger);
        }
        // 5 bytes max: 1 leading zero + 4 bytes for u32
        if len > 5 || (len == 5 && self.peek_byte() != Some(0)) {
            return self.fail(DecodeErrorKind::IntegerTooLong { length: len });
        }

        let bytes = self.read_bytes(len)?;
        Ok(bytes.iter().fold(0u32, |acc, &b| (acc << 8) | u32::from(b)))
    }

    /// Read 64-bit unsigned content given the length.
    pub fn read_integer64_value(&mut self, len: usize) -> Result<u64> {
        if len == 0 {
            return self.fail(DecodeErrorKind::ZeroLengthInteger);
        }
        if len > 9 || (len == 9 && self.peek_byte() != Some(0)) {
            return self.fail(DecodeErrorKind::IntegerTooLong { length: len });
        }

        let bytes = self.read_bytes(len)?;
        Ok(bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b)))
    }

    /// Read OCTET STRING or Opaque content, enforcing the octet limit.
    pub fn read_octets_value(&mut self, len: usize) -> Result<Bytes> {
        if len > self.octet_limit {
            return self.fail(DecodeErrorKind::OctetStringTooLong {
                length: len,
                max: self.octet_limit,
            });
        }
        self.read_bytes(len)
    }

    /// Read an OCTET STRING.
    pub fn read_octet_string(&mut self) -> Result<Bytes> {
        let len = self.expect_tag(tag::universal::OCTET_STRING)?;
        self.read_octets_value(len)
    }

    /// Read a NULL.
    pub fn read_null(&mut self) -> Result<()> {
        let len = self.expect_tag(tag::universal::NULL)?;
        if len != 0 {
            return self.fail(DecodeErrorKind::InvalidNull);
        }
        Ok(())
    }

    /// Read an OBJECT IDENTIFIER.
    pub fn read_oid(&mut self) -> Result<Oid> {
        let len = self.expect_tag(tag::universal::OBJECT_IDENTIFIER)?;
        self.read_oid_value(len)
    }

    /// Read an OID given a pre-read length.
    pub fn read_oid_value(&mut self, len: usize) -> Result<Oid> {
        let start = self.offset();
        let bytes = self.read_bytes(len)?;
        Oid::from_ber(&bytes).map_err(|err| match err {
            Error::Decode { offset, kind } => Error::decode(start + offset, kind),
            other => other,
        })
    }

    /// Read IpAddress content given the length.
    pub fn read_ip_address_value(&mut self, len: usize) -> Result<[u8; 4]> {
        if len != 4 {
            return self.fail(DecodeErrorKind::InvalidIpAddressLength { length: len });
        }
        let bytes = self.read_bytes(4)?;
        Ok([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    /// Read a SEQUENCE, returning a decoder for its contents.
    pub fn read_sequence(&mut self) -> Result<Decoder> {
        self.read_constructed(tag::universal::SEQUENCE)
    }

    /// Read a constructed type with a specific tag, returning a decoder for its contents.
    pub fn read_constructed(&mut self, expected_tag: u8) -> Result<Decoder> {
        let len = self.expect_tag(expected_tag)?;
        self.sub_decoder(len)
    }

    /// Create a sub-decoder for the next `len` bytes.
    pub fn sub_decoder(&mut self, len: usize) -> Result<Decoder> {
        let base = self.offset();
        let content = self.read_bytes(len)?;
        Ok(Decoder {
            data: content,
            offset: 0,
            base,
            octet_limit: self.octet_limit,
        })
    }

    /// Skip a TLV without parsing its content.
    pub fn skip_tlv(&mut self) -> Result<()> {
        let _tag = self.read_tag()?;
        let len = self.read_length()?;
        self.read_bytes(len).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_integer() {
        let mut dec = Decoder::from_slice(&[0x02, 0x01, 0x00]);
        assert_eq!(dec.read_integer().unwrap(), 0);

        let mut dec = Decoder::from_slice(&[0x02, 0x01, 0x7F]);
        assert_eq!(dec.read_integer().unwrap(), 127);

        let mut dec = Decoder::from_slice(&[0x02, 0x02, 0x00, 0x80]);
        assert_eq!(dec.read_integer().unwrap(), 128);

        let mut dec = Decoder::from_slice(&[0x02, 0x01, 0xFF]);
        assert_eq!(dec.read_integer().unwrap(), -1);

        let mut dec = Decoder::from_slice(&[0x02, 0x01, 0x80]);
        assert_eq!(dec.read_integer().unwrap(), -128);
    }

    #[test]
    fn test_decode_integer_sign_extension() {
        // 3-byte negative form
        let mut dec = Decoder::from_slice(&[0x02, 0x03, 0xF9, 0x97, 0x60]);
        assert_eq!(dec.read_integer().unwrap(), -420_000);

        // fixed 4-byte form taken as-is
        let mut dec = Decoder::from_slice(&[0x02, 0x04, 0xFF, 0xFF, 0xFF, 0xD6]);
        assert_eq!(dec.read_integer().unwrap(), -42);
    }

    #[test]
    fn test_integer_too_long_rejected() {
        let mut dec = Decoder::from_slice(&[0x02, 0x05, 0x01, 0x02, 0x03, 0x04, 0x05]);
        assert!(matches!(
            dec.read_integer(),
            Err(Error::Decode {
                kind: DecodeErrorKind::IntegerTooLong { length: 5 },
                ..
            })
        ));
    }

    #[test]
    fn test_unsigned32_leading_zero() {
        let mut dec = Decoder::from_slice(&[0x41, 0x05, 0x00, 0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(dec.read_unsigned32(0x41).unwrap(), u32::MAX);

        let mut dec = Decoder::from_slice(&[0x41, 0x05, 0x01, 0xFF, 0xFF, 0xFF, 0xFF]);
        assert!(dec.read_unsigned32(0x41).is_err());
    }

    #[test]
    fn test_decode_null() {
        let mut dec = Decoder::from_slice(&[0x05, 0x00]);
        dec.read_null().unwrap();

        let mut dec = Decoder::from_slice(&[0x05, 0x01, 0x00]);
        assert!(dec.read_null().is_err());
    }

    #[test]
    fn test_decode_octet_string() {
        let mut dec = Decoder::from_slice(&[0x04, 0x05, b'h', b'e', b'l', b'l', b'o']);
        assert_eq!(&dec.read_octet_string().unwrap()[..], b"hello");
    }

    #[test]
    fn test_octet_limit() {
        let mut data = vec![0x04, 0x06];
        data.extend_from_slice(b"abcdef");
        let mut dec = Decoder::from_slice(&data).with_octet_limit(5);
        assert!(matches!(
            dec.read_octet_string(),
            Err(Error::Decode {
                kind: DecodeErrorKind::OctetStringTooLong { length: 6, max: 5 },
                ..
            })
        ));
    }

    #[test]
    fn test_declared_length_past_end() {
        // Claims 10 bytes of content, only 2 present
        let mut dec = Decoder::from_slice(&[0x04, 0x0A, b'a', b'b']);
        let err = dec.read_octet_string().unwrap_err();
        assert!(matches!(
            err,
            Error::Decode {
                offset: 2,
                kind: DecodeErrorKind::LengthExceedsBuffer {
                    length: 10,
                    available: 2
                }
            }
        ));
    }

    #[test]
    fn test_unexpected_tag() {
        let mut dec = Decoder::from_slice(&[0x04, 0x00]);
        assert!(matches!(
            dec.read_integer(),
            Err(Error::Decode {
                offset: 0,
                kind: DecodeErrorKind::UnexpectedTag {
                    expected: 0x02,
                    actual: 0x04
                }
            })
        ));
    }

    #[test]
    fn test_decode_sequence() {
        let mut dec = Decoder::from_slice(&[0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x02]);
        let mut seq = dec.read_sequence().unwrap();
        assert_eq!(seq.read_integer().unwrap(), 1);
        assert_eq!(seq.read_integer().unwrap(), 2);
        assert!(seq.is_empty());
        assert!(dec.is_empty());
    }

    #[test]
    fn test_sub_decoder_reports_absolute_offsets() {
        // SEQUENCE { OCTET STRING with bad length }
        let mut dec = Decoder::from_slice(&[0x30, 0x03, 0x04, 0x05, 0x00]);
        let mut seq = dec.read_sequence().unwrap();
        let err = seq.read_octet_string().unwrap_err();
        assert!(matches!(err, Error::Decode { offset: 4, .. }));
    }

    #[test]
    fn test_skip_tlv() {
        let mut dec = Decoder::from_slice(&[0x04, 0x02, 0xAA, 0xBB, 0x05, 0x00]);
        dec.skip_tlv().unwrap();
        dec.read_null().unwrap();
    }
}
