//! Canonical CBOR decoder.

use crate::document::Document;
use crate::error::{CodecError, CodecResult};
use crate::value::Value;

/// Decode a value from CBOR bytes.
///
/// # Errors
///
/// Returns an error if the bytes are not valid canonical CBOR, contain
/// trailing data, or use constructs the encoder never emits.
pub fn from_cbor(bytes: &[u8]) -> CodecResult<Value> {
    let mut decoder = CanonicalDecoder::new(bytes);
    let value = decoder.decode()?;
    if !decoder.is_empty() {
        return Err(CodecError::invalid_structure("trailing bytes after value"));
    }
    Ok(value)
}

/// A canonical CBOR decoder.
///
/// Validates that input follows the same rules the encoder applies and
/// rejects anything else.
pub struct CanonicalDecoder<'a> {
    data: &'a [u8],
    pos: usize,
}

/// Maximum allowed element count for arrays and maps.
const MAX_CONTAINER_ELEMENTS: u64 = 16 * 1024 * 1024;

/// Maximum allowed string length.
const MAX_BYTES_LENGTH: u64 = 256 * 1024 * 1024;

impl<'a> CanonicalDecoder<'a> {
    /// Create a new decoder for the given bytes.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Decode the next value.
    pub fn decode(&mut self) -> CodecResult<Value> {
        let initial_byte = self.read_byte()?;
        let major_type = initial_byte >> 5;
        let additional_info = initial_byte & 0x1f;

        match major_type {
            0 => {
                let n = self.decode_unsigned(additional_info)?;
                i64::try_from(n)
                    .map(Value::Integer)
                    .map_err(|_| CodecError::decoding_failed("integer out of range"))
            }
            1 => {
                let n = self.decode_unsigned(additional_info)?;
                i64::try_from(n)
                    .map(|n| Value::Integer(-n - 1))
                    .map_err(|_| CodecError::decoding_failed("integer out of range"))
            }
            2 => Err(CodecError::unsupported_type("byte string")),
            3 => self.decode_text(additional_info).map(Value::Text),
            4 => self.decode_array(additional_info),
            5 => self.decode_document(additional_info).map(Value::Document),
            6 => Err(CodecError::unsupported_type("tag")),
            _ => self.decode_simple(additional_info),
        }
    }

    /// Check if all bytes have been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn read_byte(&mut self) -> CodecResult<u8> {
        let byte = *self.data.get(self.pos).ok_or(CodecError::UnexpectedEof)?;
        self.pos += 1;
        Ok(byte)
    }

    fn read_bytes(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        let end = self.pos.checked_add(len).ok_or(CodecError::UnexpectedEof)?;
        let bytes = self
            .data
            .get(self.pos..end)
            .ok_or(CodecError::UnexpectedEof)?;
        self.pos = end;
        Ok(bytes)
    }

    fn read_array<const N: usize>(&mut self) -> CodecResult<[u8; N]> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    fn decode_unsigned(&mut self, additional_info: u8) -> CodecResult<u64> {
        let non_canonical =
            || CodecError::invalid_structure("non-canonical: value could be encoded in fewer bytes");
        match additional_info {
            0..=23 => Ok(u64::from(additional_info)),
            24 => {
                let byte = self.read_byte()?;
                if byte < 24 {
                    return Err(non_canonical());
                }
                Ok(u64::from(byte))
            }
            25 => {
                let value = u16::from_be_bytes(self.read_array()?);
                if u8::try_from(value).is_ok() {
                    return Err(non_canonical());
                }
                Ok(u64::from(value))
            }
            26 => {
                let value = u32::from_be_bytes(self.read_array()?);
                if u16::try_from(value).is_ok() {
                    return Err(non_canonical());
                }
                Ok(u64::from(value))
            }
            27 => {
                let value = u64::from_be_bytes(self.read_array()?);
                if u32::try_from(value).is_ok() {
                    return Err(non_canonical());
                }
                Ok(value)
            }
            31 => Err(CodecError::IndefiniteLengthForbidden),
            _ => Err(CodecError::invalid_structure("reserved additional info")),
        }
    }

    fn decode_length(&mut self, additional_info: u8, max_allowed: u64) -> CodecResult<usize> {
        let claimed = self.decode_unsigned(additional_info)?;
        if claimed > max_allowed {
            return Err(CodecError::SizeLimitExceeded {
                claimed,
                max_allowed,
            });
        }
        usize::try_from(claimed).map_err(|_| CodecError::SizeLimitExceeded {
            claimed,
            max_allowed,
        })
    }

    fn decode_text(&mut self, additional_info: u8) -> CodecResult<String> {
        let len = self.decode_length(additional_info, MAX_BYTES_LENGTH)?;
        let bytes = self.read_bytes(len)?;
        let text = std::str::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)?;
        Ok(text.to_string())
    }

    fn decode_array(&mut self, additional_info: u8) -> CodecResult<Value> {
        let len = self.decode_length(additional_info, MAX_CONTAINER_ELEMENTS)?;
        let mut items = Vec::with_capacity(len.min(1024));
        for _ in 0..len {
            items.push(self.decode()?);
        }
        Ok(Value::Array(items))
    }

    fn decode_document(&mut self, additional_info: u8) -> CodecResult<Document> {
        let len = self.decode_length(additional_info, MAX_CONTAINER_ELEMENTS)?;
        let data = self.data;
        let mut fields = Vec::with_capacity(len.min(1024));
        let mut prev_key_bytes: Option<&[u8]> = None;

        for _ in 0..len {
            let key_start = self.pos;
            let initial = self.read_byte()?;
            if initial >> 5 != 3 {
                return Err(CodecError::invalid_structure("document keys must be text"));
            }
            let key = self.decode_text(initial & 0x1f)?;
            let key_bytes = &data[key_start..self.pos];

            if let Some(prev) = prev_key_bytes {
                if compare_cbor_bytes(prev, key_bytes) != std::cmp::Ordering::Less {
                    return Err(CodecError::invalid_structure(
                        "non-canonical: document keys not in sorted order",
                    ));
                }
            }
            prev_key_bytes = Some(key_bytes);

            let value = self.decode()?;
            fields.push((key, value));
        }

        Ok(fields.into_iter().collect())
    }

    fn decode_simple(&mut self, additional_info: u8) -> CodecResult<Value> {
        match additional_info {
            20 => Ok(Value::Bool(false)),
            21 => Ok(Value::Bool(true)),
            22 => Ok(Value::Null),
            27 => {
                let value = f64::from_bits(u64::from_be_bytes(self.read_array()?));
                if value.is_nan() {
                    return Err(CodecError::NaNForbidden);
                }
                Ok(Value::Float(value))
            }
            25 | 26 => Err(CodecError::invalid_structure(
                "non-canonical: floats must be encoded as doubles",
            )),
            31 => Err(CodecError::invalid_structure("break without indefinite")),
            _ => Err(CodecError::unsupported_type(format!(
                "simple value {additional_info}"
            ))),
        }
    }
}

/// Length-first, then bytewise comparison of encoded keys.
fn compare_cbor_bytes(a: &[u8], b: &[u8]) -> std::cmp::Ordering {
    match a.len().cmp(&b.len()) {
        std::cmp::Ordering::Equal => a.cmp(b),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::to_canonical_cbor;

    #[test]
    fn decode_scalars() {
        assert_eq!(from_cbor(&[0xf6]).unwrap(), Value::Null);
        assert_eq!(from_cbor(&[0xf5]).unwrap(), Value::Bool(true));
        assert_eq!(from_cbor(&[0x18, 255]).unwrap(), Value::Integer(255));
        assert_eq!(from_cbor(&[0x38, 99]).unwrap(), Value::Integer(-100));
    }

    #[test]
    fn reject_non_canonical_integer() {
        let err = from_cbor(&[0x18, 10]).unwrap_err();
        assert!(matches!(err, CodecError::InvalidStructure { .. }));
    }

    #[test]
    fn reject_unsorted_keys() {
        // {"b": 1, "a": 2}
        let err = from_cbor(&[0xa2, 0x61, b'b', 0x01, 0x61, b'a', 0x02]).unwrap_err();
        assert!(matches!(err, CodecError::InvalidStructure { .. }));
    }

    #[test]
    fn reject_trailing_bytes() {
        assert!(from_cbor(&[0x01, 0x02]).is_err());
    }

    #[test]
    fn reject_half_precision_float() {
        assert!(from_cbor(&[0xf9, 0x3c, 0x00]).is_err());
    }

    #[test]
    fn nested_document_survives_encoding() {
        let mut inner = Document::new().with("id", "READY");
        inner.insert("date", "20240101120000");
        let doc = Document::new()
            .with("status", inner)
            .with("samples", Value::from(vec![1i64, 2, 3]))
            .with("score", 0.25);
        let value = Value::Document(doc);
        let bytes = to_canonical_cbor(&value).unwrap();
        assert_eq!(from_cbor(&bytes).unwrap(), value);
    }
}
