//! Error types for the silpipe delivery core.
//!
//! Every failure is captured at the sink boundary and funneled to the
//! hub's error observers; none propagate to the call site of a logging
//! operation. Filter cancellation is not an error and never appears
//! here.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in the delivery core.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A mandatory option for an enabled feature is missing or
    /// unusable. Fatal: raised at connect time, the sink stays
    /// disconnected.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration problem.
        message: String,
    },

    /// Opening a sink's transport failed.
    #[error("connect failed: {message}")]
    Connect {
        /// Description of the failure.
        message: String,
    },

    /// A write through a sink's transport failed.
    #[error("write failed: {message}")]
    Write {
        /// Description of the failure.
        message: String,
    },

    /// The bounded queue of an asynchronous sink stayed full past the
    /// enqueue timeout and the packet was dropped.
    #[error("queue full: {dropped} packet(s) dropped")]
    QueueOverflow {
        /// Number of packets dropped by this overflow.
        dropped: u64,
    },

    /// Packets still queued when the drain timeout elapsed at
    /// shutdown were discarded.
    #[error("{count} queued packet(s) discarded at shutdown")]
    PacketsLost {
        /// Number of packets discarded.
        count: usize,
    },

    /// The sink is not connected.
    #[error("sink is not connected")]
    Disconnected,

    /// No configured sink matches the addressed caption.
    #[error("no sink with caption: {caption}")]
    NoSuchSink {
        /// The caption that failed to match.
        caption: String,
    },

    /// Wire codec error.
    #[error("codec error: {0}")]
    Codec(#[from] silpipe_codec::CodecError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl CoreError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a connect error.
    pub fn connect(message: impl Into<String>) -> Self {
        Self::Connect {
            message: message.into(),
        }
    }

    /// Creates a write error.
    pub fn write(message: impl Into<String>) -> Self {
        Self::Write {
            message: message.into(),
        }
    }
}
