//! The hub: ordered fan-out of packets to every configured sink.
//!
//! The hub owns the sink list, the enabled flag and the observer
//! registries. A `send` never fails from the caller's point of view;
//! per-sink failures are isolated, attributed and reported through the
//! error observers while the fan-out continues.

use crate::context::HubContext;
use crate::error::CoreError;
use crate::events::{EventRegistry, FilterDecision, SinkFailure, SubscriptionId};
use crate::options::SinkOptions;
use crate::sink::{Sink, SinkCommand, Transport};
use crate::sinks::{FileTransport, MemoryTransport, TcpTransport};
use parking_lot::RwLock;
use silpipe_codec::Packet;
use std::sync::Arc;

/// The built-in transport kinds a hub can construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    /// Rotating log file, see [`FileTransport`].
    File,
    /// Bounded in-memory buffer, see [`MemoryTransport`].
    Memory,
    /// TCP console stream, see [`TcpTransport`].
    Tcp,
}

impl SinkKind {
    fn build(self, options: &SinkOptions) -> (&'static str, Box<dyn Transport>) {
        match self {
            SinkKind::File => ("file", Box::new(FileTransport::from_options(options))),
            SinkKind::Memory => ("mem", Box::new(MemoryTransport::from_options(options))),
            SinkKind::Tcp => ("tcp", Box::new(TcpTransport::from_options(options))),
        }
    }
}

struct HubState {
    sinks: Vec<Arc<Sink>>,
    enabled: bool,
}

/// Central delivery pipeline: filters, fan-out, observers.
pub struct Hub {
    context: HubContext,
    state: RwLock<HubState>,
    events: Arc<EventRegistry>,
}

impl Hub {
    /// Creates a hub with no sinks, disabled.
    pub fn new(context: HubContext) -> Self {
        Self {
            context,
            state: RwLock::new(HubState {
                sinks: Vec::new(),
                enabled: false,
            }),
            events: Arc::new(EventRegistry::new()),
        }
    }

    /// The identity context stamped into packets built by sessions.
    pub fn context(&self) -> &HubContext {
        &self.context
    }

    /// Whether the hub currently accepts packets.
    pub fn is_enabled(&self) -> bool {
        self.state.read().enabled
    }

    /// Number of configured sinks.
    pub fn sink_count(&self) -> usize {
        self.state.read().sinks.len()
    }

    /// Adds a sink of a built-in kind. Construction never fails;
    /// option problems surface at `enable`.
    pub fn add_sink(&self, kind: SinkKind, options: &SinkOptions) -> Arc<Sink> {
        let (default_caption, transport) = kind.build(options);
        self.add_transport(default_caption, transport, options)
    }

    /// Adds a sink over a caller-supplied transport.
    pub fn add_transport(
        &self,
        default_caption: &str,
        transport: Box<dyn Transport>,
        options: &SinkOptions,
    ) -> Arc<Sink> {
        let sink = Arc::new(Sink::build(
            default_caption,
            options,
            transport,
            Arc::clone(&self.events),
        ));
        let enabled = {
            let mut state = self.state.write();
            state.sinks.push(Arc::clone(&sink));
            state.enabled
        };
        if enabled {
            sink.connect();
        }
        sink
    }

    /// Builds sinks from (kind, options) pairs, in order.
    pub fn configure(&self, sinks: &[(SinkKind, SinkOptions)]) {
        for (kind, options) in sinks {
            self.add_sink(*kind, options);
        }
    }

    /// Connects every sink in configuration order and starts
    /// accepting packets. A sink that fails to connect is reported
    /// and skipped; the others still come up.
    pub fn enable(&self) {
        let sinks: Vec<Arc<Sink>> = {
            let mut state = self.state.write();
            if state.enabled {
                return;
            }
            state.enabled = true;
            state.sinks.clone()
        };
        for sink in &sinks {
            sink.connect();
        }
    }

    /// Stops accepting packets, then disconnects every sink. Each
    /// asynchronous sink drains within its own timeout.
    pub fn disable(&self) {
        let sinks: Vec<Arc<Sink>> = {
            let mut state = self.state.write();
            if !state.enabled {
                return;
            }
            state.enabled = false;
            state.sinks.clone()
        };
        for sink in &sinks {
            sink.disconnect();
        }
    }

    /// Sends one packet through the pipeline: filter chain, fan-out
    /// to every sink in order, post-delivery observers. Never returns
    /// an error; all failures go to the error observers.
    pub fn send(&self, mut packet: Packet) {
        let sinks: Vec<Arc<Sink>> = {
            let state = self.state.read();
            if !state.enabled {
                return;
            }
            state.sinks.clone()
        };

        if self.events.run_filters(&packet) == FilterDecision::Cancel {
            return;
        }

        if sinks.iter().any(|sink| sink.is_asynchronous()) {
            packet.mark_thread_safe();
        }

        for sink in &sinks {
            sink.write(&packet);
        }

        self.events.emit_packet(&packet);
    }

    /// Routes a command to the sink whose caption matches, ignoring
    /// case. An unmatched caption is reported, not raised.
    pub fn dispatch(&self, caption: &str, command: &SinkCommand) {
        let target = {
            let state = self.state.read();
            state
                .sinks
                .iter()
                .find(|sink| sink.caption().eq_ignore_ascii_case(caption))
                .cloned()
        };
        match target {
            Some(sink) => sink.dispatch(command),
            None => self.events.report(&SinkFailure::new(
                caption,
                CoreError::NoSuchSink {
                    caption: caption.to_owned(),
                },
            )),
        }
    }

    /// Flushes every connected sink's transport buffer.
    pub fn flush(&self) {
        let sinks: Vec<Arc<Sink>> = self.state.read().sinks.clone();
        for sink in &sinks {
            sink.flush();
        }
    }

    /// Subscribes an error observer.
    pub fn on_error<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&SinkFailure) + Send + Sync + 'static,
    {
        self.events.on_error(observer)
    }

    /// Subscribes a pre-send filter.
    pub fn on_filter<F>(&self, filter: F) -> SubscriptionId
    where
        F: Fn(&Packet) -> FilterDecision + Send + Sync + 'static,
    {
        self.events.on_filter(filter)
    }

    /// Subscribes a post-delivery packet observer.
    pub fn on_packet<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&Packet) + Send + Sync + 'static,
    {
        self.events.on_packet(observer)
    }

    /// Removes any kind of subscription.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }
}

impl Drop for Hub {
    fn drop(&mut self) {
        self.disable();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreResult;
    use crate::sinks::{FlushTarget, FLUSH_TO_WRITER};
    use silpipe_codec::{Level, Watch, WatchType};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    fn hub() -> Hub {
        Hub::new(HubContext::with_host("test", "host", 1))
    }

    fn watch_packet(name: &str) -> Packet {
        Packet::watch(
            Level::Message,
            0,
            Watch {
                name: name.to_owned(),
                value: String::new(),
                watch_type: WatchType::String,
            },
        )
    }

    fn memory_contents(hub: &Hub, caption: &str) -> Vec<Packet> {
        let target = FlushTarget::new();
        let command = SinkCommand::new(FLUSH_TO_WRITER, Box::new(target.clone()));
        hub.dispatch(caption, &command);
        let bytes = target.take();
        Packet::decode_all(&bytes[4..]).unwrap()
    }

    struct FailingTransport;

    impl Transport for FailingTransport {
        fn protocol(&self) -> &'static str {
            "bad"
        }
        fn open(&mut self) -> CoreResult<()> {
            Err(CoreError::connect("always refused"))
        }
        fn write_packet(&mut self, _: &Packet) -> CoreResult<()> {
            Err(CoreError::write("always broken"))
        }
        fn close(&mut self) -> CoreResult<()> {
            Ok(())
        }
    }

    #[test]
    fn disabled_hub_drops_packets() {
        let hub = hub();
        hub.add_sink(SinkKind::Memory, &SinkOptions::new());
        hub.send(watch_packet("dropped"));

        hub.enable();
        assert!(memory_contents(&hub, "mem").is_empty());
    }

    #[test]
    fn send_fans_out_to_all_sinks_in_order() {
        let hub = hub();
        hub.add_sink(SinkKind::Memory, &SinkOptions::new().with("caption", "m1"));
        hub.add_sink(SinkKind::Memory, &SinkOptions::new().with("caption", "m2"));
        hub.enable();

        hub.send(watch_packet("a"));
        hub.send(watch_packet("b"));

        for caption in ["m1", "m2"] {
            let packets = memory_contents(&hub, caption);
            assert_eq!(packets, vec![watch_packet("a"), watch_packet("b")]);
        }
    }

    #[test]
    fn failing_sink_does_not_stop_fanout() {
        let hub = hub();
        hub.add_transport("bad", Box::new(FailingTransport), &SinkOptions::new());
        hub.add_sink(SinkKind::Memory, &SinkOptions::new());

        let failures = Arc::new(StdMutex::new(Vec::new()));
        let sink_names = Arc::clone(&failures);
        hub.on_error(move |failure| sink_names.lock().unwrap().push(failure.caption.clone()));

        hub.enable();
        hub.send(watch_packet("through"));

        // Exactly one failure: the connect refusal. The broken sink
        // never reached Connected, so its write is skipped silently.
        assert_eq!(failures.lock().unwrap().as_slice(), &["bad".to_owned()]);
        assert_eq!(memory_contents(&hub, "mem"), vec![watch_packet("through")]);
    }

    #[test]
    fn filter_cancel_suppresses_delivery_and_observers() {
        let hub = hub();
        hub.add_sink(SinkKind::Memory, &SinkOptions::new());
        hub.enable();

        let delivered = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&delivered);
        hub.on_packet(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        hub.on_filter(|packet| match packet.body() {
            silpipe_codec::PacketBody::Watch(watch) if watch.name == "secret" => {
                FilterDecision::Cancel
            }
            _ => FilterDecision::Forward,
        });

        hub.send(watch_packet("secret"));
        hub.send(watch_packet("public"));

        assert_eq!(memory_contents(&hub, "mem"), vec![watch_packet("public")]);
        assert_eq!(delivered.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dispatch_matches_caption_case_insensitively() {
        let hub = hub();
        hub.add_sink(
            SinkKind::Memory,
            &SinkOptions::new().with("caption", "Audit"),
        );
        hub.enable();
        hub.send(watch_packet("x"));

        assert_eq!(memory_contents(&hub, "AUDIT").len(), 1);
    }

    #[test]
    fn dispatch_to_unknown_caption_reports() {
        let hub = hub();
        hub.enable();

        let misses = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&misses);
        hub.on_error(move |failure| {
            assert!(matches!(failure.error, CoreError::NoSuchSink { .. }));
            counter.fetch_add(1, Ordering::SeqCst);
        });

        hub.dispatch("nowhere", &SinkCommand::new(0, Box::new(())));
        assert_eq!(misses.load(Ordering::SeqCst), 1);
    }

    struct RecordingTransport(Arc<StdMutex<Vec<Packet>>>);

    impl Transport for RecordingTransport {
        fn protocol(&self) -> &'static str {
            "rec"
        }
        fn open(&mut self) -> CoreResult<()> {
            Ok(())
        }
        fn write_packet(&mut self, packet: &Packet) -> CoreResult<()> {
            self.0.lock().unwrap().push(packet.clone());
            Ok(())
        }
        fn close(&mut self) -> CoreResult<()> {
            Ok(())
        }
    }

    #[test]
    fn async_sink_preserves_fifo_through_hub() {
        let hub = hub();
        let written = Arc::new(StdMutex::new(Vec::new()));
        hub.add_transport(
            "rec",
            Box::new(RecordingTransport(Arc::clone(&written))),
            &SinkOptions::new().with("async.enabled", "true"),
        );
        hub.enable();

        for i in 0..100 {
            hub.send(watch_packet(&format!("w{i}")));
        }
        hub.disable();

        let written = written.lock().unwrap();
        assert_eq!(written.len(), 100);
        for (i, packet) in written.iter().enumerate() {
            assert_eq!(packet, &watch_packet(&format!("w{i}")));
        }
    }

    #[test]
    fn enable_is_idempotent_and_late_sinks_connect() {
        let hub = hub();
        hub.enable();
        hub.enable();

        let sink = hub.add_sink(SinkKind::Memory, &SinkOptions::new());
        assert_eq!(sink.state(), crate::sink::ConnectionState::Connected);

        hub.send(watch_packet("late"));
        assert_eq!(memory_contents(&hub, "mem"), vec![watch_packet("late")]);
    }
}
