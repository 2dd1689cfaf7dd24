//! Canonical CBOR encoder.

use crate::document::Document;
use crate::error::{CodecError, CodecResult};
use crate::value::Value;

/// Encode a value to canonical CBOR bytes.
///
/// Output is deterministic:
/// - Document keys are sorted by their encoded form (length-first, then bytewise)
/// - Integers use the shortest possible encoding
/// - Floats are always written as 64-bit doubles, with `-0.0` written as `0.0`
/// - No indefinite-length encoding
///
/// # Errors
///
/// Returns an error if the value contains NaN.
pub fn to_canonical_cbor(value: &Value) -> CodecResult<Vec<u8>> {
    let mut encoder = CanonicalEncoder::new();
    encoder.encode(value)?;
    Ok(encoder.into_bytes())
}

/// A canonical CBOR encoder.
///
/// Two documents that compare equal always produce identical bytes, which
/// is what the store relies on for before-image hashing.
pub struct CanonicalEncoder {
    buffer: Vec<u8>,
}

impl CanonicalEncoder {
    /// Create a new encoder.
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Encode a value.
    pub fn encode(&mut self, value: &Value) -> CodecResult<()> {
        match value {
            Value::Null => {
                self.buffer.push(0xf6);
                Ok(())
            }
            Value::Bool(b) => {
                self.buffer.push(if *b { 0xf5 } else { 0xf4 });
                Ok(())
            }
            Value::Integer(n) => {
                self.encode_integer(*n);
                Ok(())
            }
            Value::Float(f) => self.encode_float(*f),
            Value::Text(s) => {
                self.encode_text(s);
                Ok(())
            }
            Value::Array(arr) => self.encode_array(arr),
            Value::Document(doc) => self.encode_document(doc),
        }
    }

    /// Consume this encoder and return the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    #[allow(clippy::cast_sign_loss)]
    fn encode_integer(&mut self, n: i64) {
        if n >= 0 {
            self.encode_unsigned(0, n as u64);
        } else {
            // CBOR negative integers encode -(n+1)
            let abs_minus_one = (-(n + 1)) as u64;
            self.encode_unsigned(1, abs_minus_one);
        }
    }

    fn encode_float(&mut self, f: f64) -> CodecResult<()> {
        if f.is_nan() {
            return Err(CodecError::NaNForbidden);
        }
        // -0.0 == 0.0, so both get the positive zero bytes.
        let f = if f == 0.0 { 0.0 } else { f };
        self.buffer.push(0xfb);
        self.buffer.extend_from_slice(&f.to_bits().to_be_bytes());
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation)]
    fn encode_unsigned(&mut self, major_type: u8, value: u64) {
        let mt = major_type << 5;

        if value < 24 {
            self.buffer.push(mt | (value as u8));
        } else if u8::try_from(value).is_ok() {
            self.buffer.push(mt | 24);
            self.buffer.push(value as u8);
        } else if u16::try_from(value).is_ok() {
            self.buffer.push(mt | 25);
            self.buffer.extend_from_slice(&(value as u16).to_be_bytes());
        } else if u32::try_from(value).is_ok() {
            self.buffer.push(mt | 26);
            self.buffer.extend_from_slice(&(value as u32).to_be_bytes());
        } else {
            self.buffer.push(mt | 27);
            self.buffer.extend_from_slice(&value.to_be_bytes());
        }
    }

    fn encode_text(&mut self, text: &str) {
        self.encode_unsigned(3, text.len() as u64);
        self.buffer.extend_from_slice(text.as_bytes());
    }

    fn encode_array(&mut self, arr: &[Value]) -> CodecResult<()> {
        self.encode_unsigned(4, arr.len() as u64);
        for item in arr {
            self.encode(item)?;
        }
        Ok(())
    }

    /// Encode a document as a map. Keys are ordered by encoded length, then
    /// bytewise; a text header grows with its length, so ordering the raw
    /// keys by `(len, bytes)` gives the same order.
    pub fn encode_document(&mut self, doc: &Document) -> CodecResult<()> {
        let mut entries: Vec<(&String, &Value)> = doc.iter().collect();
        entries.sort_by(|(a, _), (b, _)| (a.len(), a.as_bytes()).cmp(&(b.len(), b.as_bytes())));

        self.encode_unsigned(5, entries.len() as u64);
        for (key, value) in entries {
            self.encode_text(key);
            self.encode(value)?;
        }
        Ok(())
    }
}

impl Default for CanonicalEncoder {
    fn default() -> Self {
        Self::new()
    }
}
