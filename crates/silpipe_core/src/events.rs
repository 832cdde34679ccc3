//! Observer registries for errors, filters and delivered packets.
//!
//! The hub never raises delivery failures at the logging call site.
//! Instead every failure is wrapped in a [`SinkFailure`] and handed to
//! the registered error observers, in registration order. Filters run
//! before fan-out and can cancel a packet; packet observers run after
//! fan-out completes.

use crate::error::CoreError;
use parking_lot::RwLock;
use silpipe_codec::Packet;
use std::sync::atomic::{AtomicU64, Ordering};

/// A delivery failure attributed to a single sink.
#[derive(Debug)]
pub struct SinkFailure {
    /// Caption of the sink where the failure occurred. Empty when the
    /// failure happened before any sink was involved.
    pub caption: String,
    /// The underlying error.
    pub error: CoreError,
}

impl SinkFailure {
    /// Creates a failure record for the named sink.
    pub fn new(caption: impl Into<String>, error: CoreError) -> Self {
        Self {
            caption: caption.into(),
            error,
        }
    }
}

/// Outcome of running a filter against a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
    /// Continue processing the packet.
    Forward,
    /// Drop the packet silently. Cancellation is not an error.
    Cancel,
}

/// Handle returned by a subscription, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type ErrorObserver = Box<dyn Fn(&SinkFailure) + Send + Sync>;
type PacketObserver = Box<dyn Fn(&Packet) + Send + Sync>;
type PacketFilter = Box<dyn Fn(&Packet) -> FilterDecision + Send + Sync>;

struct Entry<T> {
    id: SubscriptionId,
    callback: T,
}

struct Registry<T> {
    entries: RwLock<Vec<Entry<T>>>,
}

impl<T> Registry<T> {
    fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    fn insert(&self, id: SubscriptionId, callback: T) {
        self.entries.write().push(Entry { id, callback });
    }

    fn remove(&self, id: SubscriptionId) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        entries.len() != before
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }
}

/// The hub's observer registries.
///
/// Observers run synchronously on the calling thread, in registration
/// order. An observer must not log back through the same hub while
/// handling an event; re-entrancy would deadlock on the hub state.
pub struct EventRegistry {
    next_id: AtomicU64,
    errors: Registry<ErrorObserver>,
    packets: Registry<PacketObserver>,
    filters: Registry<PacketFilter>,
}

impl EventRegistry {
    /// Creates an empty registry set.
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            errors: Registry::new(),
            packets: Registry::new(),
            filters: Registry::new(),
        }
    }

    fn fresh_id(&self) -> SubscriptionId {
        SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Subscribes an error observer.
    pub fn on_error<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&SinkFailure) + Send + Sync + 'static,
    {
        let id = self.fresh_id();
        self.errors.insert(id, Box::new(observer));
        id
    }

    /// Subscribes a packet observer, called after fan-out completes.
    pub fn on_packet<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&Packet) + Send + Sync + 'static,
    {
        let id = self.fresh_id();
        self.packets.insert(id, Box::new(observer));
        id
    }

    /// Subscribes a packet filter, called before fan-out.
    pub fn on_filter<F>(&self, filter: F) -> SubscriptionId
    where
        F: Fn(&Packet) -> FilterDecision + Send + Sync + 'static,
    {
        let id = self.fresh_id();
        self.filters.insert(id, Box::new(filter));
        id
    }

    /// Removes a subscription. Returns `false` if the id was unknown
    /// or already removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.errors.remove(id) || self.packets.remove(id) || self.filters.remove(id)
    }

    /// Reports a failure to all error observers.
    ///
    /// With no observers registered the failure is still surfaced via
    /// a `tracing` event so it is never silently lost.
    pub fn report(&self, failure: &SinkFailure) {
        let entries = self.errors.entries.read();
        if entries.is_empty() {
            tracing::warn!(sink = %failure.caption, error = %failure.error, "sink failure");
            return;
        }
        for entry in entries.iter() {
            (entry.callback)(failure);
        }
    }

    /// Notifies packet observers of a delivered packet.
    pub fn emit_packet(&self, packet: &Packet) {
        for entry in self.packets.entries.read().iter() {
            (entry.callback)(packet);
        }
    }

    /// Runs the filter chain. The first `Cancel` wins and short-
    /// circuits the remaining filters.
    pub fn run_filters(&self, packet: &Packet) -> FilterDecision {
        for entry in self.filters.entries.read().iter() {
            if (entry.callback)(packet) == FilterDecision::Cancel {
                return FilterDecision::Cancel;
            }
        }
        FilterDecision::Forward
    }

    /// Returns the number of registered error observers.
    pub fn error_observer_count(&self) -> usize {
        self.errors.len()
    }

    /// Returns the number of registered filters.
    pub fn filter_count(&self) -> usize {
        self.filters.len()
    }
}

impl Default for EventRegistry {
    fn default() -> Self {
        Self::new()
    }
}
