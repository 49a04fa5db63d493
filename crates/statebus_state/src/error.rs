//! Error types for the state codec.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while encoding or decoding state values.
#[derive(Error, Debug)]
pub enum CodecError {
    /// The CBOR bytes could not be parsed.
    #[error("invalid CBOR: {0}")]
    InvalidCbor(String),

    /// The value has a structure the state tree does not support.
    #[error("invalid structure: {0}")]
    InvalidStructure(String),

    /// A map key was not a text string.
    #[error("non-text map key")]
    NonTextKey,

    /// An integer was outside the supported i64 range.
    #[error("integer out of range")]
    IntegerOutOfRange,
}

impl CodecError {
    /// Creates an invalid-structure error.
    pub fn invalid_structure(message: impl Into<String>) -> Self {
        Self::InvalidStructure(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = CodecError::NonTextKey;
        assert_eq!(err.to_string(), "non-text map key");

        let err = CodecError::invalid_structure("expected map");
        assert!(err.to_string().contains("expected map"));
    }
}
