//! Delivery core for silpipe: sinks, queues, hub fan-out, sessions.
//!
//! The pipeline is `Session` → [`Hub::send`] → filter chain → fan-out
//! to every configured [`Sink`] → post-delivery observers. Sinks wrap
//! a [`Transport`] (file, memory, TCP) and may deliver asynchronously
//! through a bounded [`DispatchQueue`] with one worker thread each.
//!
//! Failures never reach the logging call site; they are captured at
//! the sink boundary and reported through the hub's error observers.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod context;
pub mod error;
pub mod events;
pub mod hub;
pub mod options;
pub mod queue;
pub mod session;
pub mod sink;
pub mod sinks;

pub use context::{now_micros, HubContext};
pub use error::{CoreError, CoreResult};
pub use events::{EventRegistry, FilterDecision, SinkFailure, SubscriptionId};
pub use hub::{Hub, SinkKind};
pub use options::{RotateMode, SinkOptions};
pub use queue::{DispatchQueue, EnqueueOutcome, QueueConfig};
pub use session::Session;
pub use sink::{ConnectionState, Sink, SinkCommand, Transport};
pub use sinks::{
    EncryptStream, EncryptionKey, FileTransport, FlushTarget, MemoryTransport, TcpTransport,
    FLUSH_TO_WRITER,
};
