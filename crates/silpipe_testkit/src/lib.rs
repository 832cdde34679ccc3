//! Test utilities for silpipe: a capture transport with failure
//! injection, compact packet builders, and a tracing initializer for
//! test diagnostics. The end-to-end scenario tests live in this
//! crate's `tests/` directory.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod builders;
pub mod capture;

pub use capture::CaptureHandle;

use std::sync::Once;

static TRACING: Once = Once::new();

/// Initializes a tracing subscriber once per test process. The filter
/// comes from `RUST_LOG`, defaulting to `silpipe_core=debug`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("silpipe_core=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}
