//! # CatalogDB Codec
//!
//! Document model and canonical CBOR encoding for CatalogDB.
//!
//! Catalog entities are stored as [`Document`]s: string-keyed maps of
//! dynamic [`Value`]s addressed with dot paths. Documents encode to
//! canonical CBOR so that equal documents always produce identical bytes:
//!
//! - Keys are sorted (length-first, then bytewise)
//! - Integers use shortest encoding
//! - Floats are always 64-bit, NaN is rejected
//! - No indefinite-length items
//!
//! Typed models move in and out of documents through [`to_document`] and
//! [`from_document`].
//!
//! ## Usage
//!
//! ```
//! use catalogdb_codec::{Decode, Document, Encode};
//!
//! let doc = Document::new().with("id", "S1").with("version", 2i64);
//! let bytes = doc.encode().unwrap();
//! assert_eq!(Document::decode(&bytes).unwrap(), doc);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod document;
mod encoder;
mod error;
mod json;
mod value;

pub use decoder::{from_cbor, CanonicalDecoder};
pub use document::Document;
pub use encoder::{to_canonical_cbor, CanonicalEncoder};
pub use error::{CodecError, CodecResult};
pub use json::{from_document, to_document};
pub use value::Value;

/// Trait for types that can be encoded to canonical CBOR.
pub trait Encode {
    /// Encode this value to canonical CBOR bytes.
    fn encode(&self) -> CodecResult<Vec<u8>>;
}

/// Trait for types that can be decoded from CBOR.
pub trait Decode: Sized {
    /// Decode this value from CBOR bytes.
    fn decode(bytes: &[u8]) -> CodecResult<Self>;
}

impl Encode for Value {
    fn encode(&self) -> CodecResult<Vec<u8>> {
        to_canonical_cbor(self)
    }
}

impl Decode for Value {
    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        from_cbor(bytes)
    }
}

impl Encode for Document {
    fn encode(&self) -> CodecResult<Vec<u8>> {
        let mut encoder = CanonicalEncoder::new();
        encoder.encode_document(self)?;
        Ok(encoder.into_bytes())
    }
}

impl Decode for Document {
    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        match from_cbor(bytes)? {
            Value::Document(doc) => Ok(doc),
            other => Err(CodecError::invalid_structure(format!(
                "expected a document, got {}",
                other.type_name()
            ))),
        }
    }
}
