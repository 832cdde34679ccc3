//! Sink lifecycle and delivery, shared by every concrete transport.
//!
//! A sink owns a [`Transport`] and drives it through the connection
//! lifecycle. All failures are captured here and handed to the error
//! observers; none propagate to the logging call site. A sink can run
//! synchronously (write on the caller's thread) or asynchronously
//! through a [`DispatchQueue`] worker.

use crate::error::CoreError;
use crate::events::{EventRegistry, SinkFailure};
use crate::options::SinkOptions;
use crate::queue::{DispatchQueue, EnqueueOutcome, QueueConfig};
use parking_lot::Mutex;
use silpipe_codec::{Level, Packet};
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

/// Connection lifecycle state of a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Not connected. Writes are silently skipped.
    #[default]
    Disconnected,
    /// Transport open in progress.
    Connecting,
    /// Connected and accepting packets.
    Connected,
}

/// An out-of-band instruction addressed to a specific sink, carrying
/// an action code and an opaque transport-defined payload.
pub struct SinkCommand {
    /// Transport-defined action code.
    pub action: i32,
    /// Transport-defined payload.
    pub state: Box<dyn Any + Send>,
}

impl SinkCommand {
    /// Creates a command with the given action and payload.
    pub fn new(action: i32, state: Box<dyn Any + Send>) -> Self {
        Self { action, state }
    }
}

/// The transport side of a sink: where packets physically go.
///
/// Implementations are driven under the sink's transport lock and
/// never called concurrently. They return errors; the sink decides
/// how to report them.
pub trait Transport: Send {
    /// Short protocol name used in diagnostics ("file", "tcp", "mem").
    fn protocol(&self) -> &'static str;

    /// Opens the transport. Called once per connect; must be safe to
    /// call again after a `close`.
    fn open(&mut self) -> Result<(), CoreError>;

    /// Writes one packet.
    fn write_packet(&mut self, packet: &Packet) -> Result<(), CoreError>;

    /// Flushes buffered output. Default: nothing buffered.
    fn flush(&mut self) -> Result<(), CoreError> {
        Ok(())
    }

    /// Closes the transport, flushing whatever remains.
    fn close(&mut self) -> Result<(), CoreError>;

    /// Handles a sink-specific command. Default: ignore it.
    fn handle_command(&mut self, command: &SinkCommand) -> Result<(), CoreError> {
        let _ = command;
        Ok(())
    }
}

struct SinkInner {
    state: Mutex<ConnectionState>,
    transport: Mutex<Box<dyn Transport>>,
    last_error: Mutex<Option<CoreError>>,
}

impl SinkInner {
    fn report(&self, caption: &str, error: CoreError, events: &EventRegistry) {
        let failure = SinkFailure::new(caption, error);
        events.report(&failure);
        *self.last_error.lock() = Some(failure.error);
    }
}

/// A configured sink: transport plus lifecycle, threshold and queue.
pub struct Sink {
    caption: String,
    protocol: &'static str,
    level: Level,
    asynchronous: bool,
    queue_config: QueueConfig,
    inner: Arc<SinkInner>,
    queue: Mutex<Option<DispatchQueue>>,
    events: Arc<EventRegistry>,
}

impl Sink {
    /// Builds a sink from resolved options. Building never fails;
    /// option problems surface at `connect`.
    ///
    /// Recognized keys: `caption`, `level`, `async.enabled`,
    /// `async.queue`, `async.enqueue.timeout`, `async.drain.timeout`.
    pub fn build(
        default_caption: &str,
        options: &SinkOptions,
        transport: Box<dyn Transport>,
        events: Arc<EventRegistry>,
    ) -> Self {
        let protocol = transport.protocol();
        let caption = options.get_str("caption", default_caption);
        let level = options.get_level("level", Level::Debug);
        let asynchronous = options.get_bool("async.enabled", false);
        let queue_config = QueueConfig {
            capacity: options.get_int("async.queue", 2048).max(1) as usize,
            enqueue_timeout: Duration::from_millis(options.get_timespan(
                "async.enqueue.timeout",
                1000,
            )),
            drain_timeout: Duration::from_millis(options.get_timespan("async.drain.timeout", 5000)),
        };
        Self {
            caption,
            protocol,
            level,
            asynchronous,
            queue_config,
            inner: Arc::new(SinkInner {
                state: Mutex::new(ConnectionState::Disconnected),
                transport: Mutex::new(transport),
                last_error: Mutex::new(None),
            }),
            queue: Mutex::new(None),
            events,
        }
    }

    /// The sink's caption, used for addressing and error attribution.
    pub fn caption(&self) -> &str {
        &self.caption
    }

    /// The transport's protocol name.
    pub fn protocol(&self) -> &'static str {
        self.protocol
    }

    /// The sink's level threshold. Packets below it are skipped.
    pub fn level(&self) -> Level {
        self.level
    }

    /// Whether this sink delivers through a worker thread.
    pub fn is_asynchronous(&self) -> bool {
        self.asynchronous
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.lock()
    }

    /// The most recent failure captured at this sink, rendered.
    pub fn last_error(&self) -> Option<String> {
        self.inner.last_error.lock().as_ref().map(ToString::to_string)
    }

    fn report(&self, error: CoreError) {
        self.inner.report(&self.caption, error, &self.events);
    }

    /// Connects the transport. Idempotent: connecting a connected
    /// sink does nothing. A failed open is reported and leaves the
    /// sink disconnected.
    pub fn connect(&self) {
        {
            let mut state = self.inner.state.lock();
            if *state != ConnectionState::Disconnected {
                return;
            }
            *state = ConnectionState::Connecting;
        }

        let result = self.inner.transport.lock().open();
        match result {
            Ok(()) => {
                // The queue must exist before Connected is published;
                // a write racing in between would find no queue.
                if self.asynchronous {
                    let inner = Arc::clone(&self.inner);
                    let events = Arc::clone(&self.events);
                    let caption = self.caption.clone();
                    *self.queue.lock() = Some(DispatchQueue::start(
                        self.queue_config,
                        move |packet| {
                            let result = inner.transport.lock().write_packet(&packet);
                            if let Err(error) = result {
                                inner.report(&caption, error, &events);
                            }
                        },
                    ));
                }
                *self.inner.state.lock() = ConnectionState::Connected;
                tracing::debug!(sink = %self.caption, protocol = self.protocol, "connected");
            }
            Err(error) => {
                *self.inner.state.lock() = ConnectionState::Disconnected;
                self.report(error);
            }
        }
    }

    /// Writes one packet through the sink.
    ///
    /// Skipped silently when the sink is disconnected or the packet
    /// is below the level threshold. On the asynchronous path the
    /// packet must already be marked thread-safe; a deep copy is
    /// queued and the caller's packet stays untouched.
    pub fn write(&self, packet: &Packet) {
        if packet.level() < self.level {
            return;
        }
        if *self.inner.state.lock() != ConnectionState::Connected {
            return;
        }

        if self.asynchronous {
            debug_assert!(packet.is_thread_safe());
            let queue = self.queue.lock();
            let Some(queue) = queue.as_ref() else {
                return;
            };
            match queue.enqueue(packet.clone()) {
                EnqueueOutcome::Accepted | EnqueueOutcome::Closed => {}
                EnqueueOutcome::Dropped => {
                    self.report(CoreError::QueueOverflow { dropped: 1 });
                }
            }
        } else if let Err(error) = self.inner.transport.lock().write_packet(packet) {
            self.report(error);
        }
    }

    /// Flushes the transport. Queued packets of an asynchronous sink
    /// are not waited for; only the transport buffer is flushed.
    pub fn flush(&self) {
        if *self.inner.state.lock() != ConnectionState::Connected {
            return;
        }
        if let Err(error) = self.inner.transport.lock().flush() {
            self.report(error);
        }
    }

    /// Forwards a command to the transport.
    pub fn dispatch(&self, command: &SinkCommand) {
        if *self.inner.state.lock() != ConnectionState::Connected {
            return;
        }
        if let Err(error) = self.inner.transport.lock().handle_command(command) {
            self.report(error);
        }
    }

    /// Disconnects the sink. Idempotent. Intake stops first, then the
    /// queue drains within its timeout (discarded packets are reported
    /// as a loss), then the transport closes.
    pub fn disconnect(&self) {
        {
            let mut state = self.inner.state.lock();
            if *state == ConnectionState::Disconnected {
                return;
            }
            *state = ConnectionState::Disconnected;
        }

        if let Some(queue) = self.queue.lock().take() {
            let lost = queue.close();
            if lost > 0 {
                self.report(CoreError::PacketsLost { count: lost });
            }
        }

        if let Err(error) = self.inner.transport.lock().close() {
            self.report(error);
        }
        tracing::debug!(sink = %self.caption, protocol = self.protocol, "disconnected");
    }
}

impl Drop for Sink {
    fn drop(&mut self) {
        self.disconnect();
    }
}
