//! Error types for the silpipe codec.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while decoding packets or file headers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Input ended before the declared structure was complete.
    #[error("truncated input: {message}")]
    Truncated {
        /// Description of what was being read.
        message: String,
    },

    /// The packet envelope carried an unknown kind tag.
    #[error("unknown packet kind: {kind}")]
    UnknownKind {
        /// The kind tag found on the wire.
        kind: u16,
    },

    /// An enumeration field carried an ordinal outside its closed set.
    #[error("unknown ordinal {value} for {field}")]
    UnknownOrdinal {
        /// Name of the field being decoded.
        field: &'static str,
        /// The ordinal found on the wire.
        value: i32,
    },

    /// A string field was not valid UTF-8.
    #[error("invalid UTF-8 in {field}")]
    InvalidUtf8 {
        /// Name of the field being decoded.
        field: &'static str,
    },

    /// The body length declared in the envelope disagrees with the
    /// bytes actually consumed by the body.
    #[error("body length mismatch: declared {declared}, consumed {consumed}")]
    BodyLengthMismatch {
        /// Length declared in the envelope.
        declared: usize,
        /// Bytes consumed decoding the body.
        consumed: usize,
    },

    /// A log file did not start with a recognized magic.
    #[error("invalid file magic: {found:02x?}")]
    InvalidMagic {
        /// The first four bytes found.
        found: [u8; 4],
    },
}

impl CodecError {
    /// Creates a truncated-input error.
    pub fn truncated(message: impl Into<String>) -> Self {
        Self::Truncated {
            message: message.into(),
        }
    }
}
