//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while encoding, decoding or converting documents.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Failed to decode CBOR bytes.
    #[error("decoding failed: {message}")]
    DecodingFailed {
        /// Description of the decoding error.
        message: String,
    },

    /// NaN values are forbidden.
    #[error("NaN values are forbidden")]
    NaNForbidden,

    /// Indefinite-length items are forbidden.
    #[error("indefinite-length items are forbidden")]
    IndefiniteLengthForbidden,

    /// Invalid UTF-8 string.
    #[error("invalid UTF-8 string")]
    InvalidUtf8,

    /// Unexpected end of input.
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// Invalid CBOR structure.
    #[error("invalid CBOR structure: {message}")]
    InvalidStructure {
        /// Description of the structural error.
        message: String,
    },

    /// Unsupported CBOR type.
    #[error("unsupported CBOR type: {type_name}")]
    UnsupportedType {
        /// Name of the unsupported type.
        type_name: String,
    },

    /// Declared length exceeds what the decoder accepts.
    #[error("size limit exceeded: claimed {claimed}, max {max_allowed}")]
    SizeLimitExceeded {
        /// Length claimed by the input.
        claimed: u64,
        /// Maximum accepted length.
        max_allowed: u64,
    },

    /// A dot path could not be resolved or written.
    #[error("invalid path '{path}': {message}")]
    InvalidPath {
        /// The offending path.
        path: String,
        /// What went wrong.
        message: String,
    },

    /// Conversion between typed values and documents failed.
    #[error("conversion failed: {message}")]
    Conversion {
        /// Description of the conversion error.
        message: String,
    },
}

impl CodecError {
    /// Create a decoding failed error.
    pub fn decoding_failed(message: impl Into<String>) -> Self {
        Self::DecodingFailed {
            message: message.into(),
        }
    }

    /// Create an invalid structure error.
    pub fn invalid_structure(message: impl Into<String>) -> Self {
        Self::InvalidStructure {
            message: message.into(),
        }
    }

    /// Create an unsupported type error.
    pub fn unsupported_type(type_name: impl Into<String>) -> Self {
        Self::UnsupportedType {
            type_name: type_name.into(),
        }
    }

    /// Create an invalid path error.
    pub fn invalid_path(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a conversion error.
    pub fn conversion(message: impl Into<String>) -> Self {
        Self::Conversion {
            message: message.into(),
        }
    }
}
