//! Bounded dispatch queue backing asynchronous sinks.
//!
//! One worker thread per queue consumes packets in FIFO order and
//! hands each to the sink's delivery closure. Producers block for a
//! bounded time when the queue is full; the drop policy on timeout is
//! reported to the caller as an overflow count, never as a panic.

use parking_lot::{Condvar, Mutex};
use silpipe_codec::Packet;
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Sizing and timing for a dispatch queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    /// Maximum number of queued packets.
    pub capacity: usize,
    /// How long `enqueue` may block on a full queue before dropping
    /// the packet. Zero means drop immediately.
    pub enqueue_timeout: Duration,
    /// How long `close` waits for the worker to drain the backlog
    /// before discarding what remains.
    pub drain_timeout: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: 2048,
            enqueue_timeout: Duration::from_millis(1000),
            drain_timeout: Duration::from_millis(5000),
        }
    }
}

/// Result of offering a packet to the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// The packet was accepted.
    Accepted,
    /// The queue stayed full past the enqueue timeout.
    Dropped,
    /// The queue is closed.
    Closed,
}

struct State {
    items: VecDeque<Packet>,
    closed: bool,
    // Packet handed to the worker but not yet delivered. Drain must
    // wait for this as well as for the deque to empty.
    in_flight: bool,
}

struct Shared {
    state: Mutex<State>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

/// A bounded FIFO queue with a dedicated consumer thread.
pub struct DispatchQueue {
    shared: Arc<Shared>,
    config: QueueConfig,
    worker: Option<JoinHandle<()>>,
}

impl DispatchQueue {
    /// Starts a queue whose worker delivers each packet through
    /// `deliver`. The closure owns the transport side; it must not
    /// enqueue back into this queue.
    pub fn start<F>(config: QueueConfig, mut deliver: F) -> Self
    where
        F: FnMut(Packet) + Send + 'static,
    {
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                items: VecDeque::with_capacity(config.capacity.min(64)),
                closed: false,
                in_flight: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity: config.capacity.max(1),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("silpipe-dispatch".to_owned())
            .spawn(move || loop {
                let packet = {
                    let mut state = worker_shared.state.lock();
                    loop {
                        if let Some(packet) = state.items.pop_front() {
                            state.in_flight = true;
                            break packet;
                        }
                        if state.closed {
                            return;
                        }
                        worker_shared.not_empty.wait(&mut state);
                    }
                };
                // A producer slot opened up.
                worker_shared.not_full.notify_one();

                deliver(packet);

                let mut state = worker_shared.state.lock();
                state.in_flight = false;
                // close() waits on not_full for the drain to finish.
                worker_shared.not_full.notify_all();
            });

        // Thread spawn only fails on resource exhaustion; treat the
        // queue as closed so enqueue degrades to Closed.
        let worker = match worker {
            Ok(handle) => Some(handle),
            Err(_) => {
                shared.state.lock().closed = true;
                None
            }
        };

        Self {
            shared,
            config,
            worker,
        }
    }

    /// Offers a packet, blocking up to the configured enqueue timeout
    /// when the queue is full.
    pub fn enqueue(&self, packet: Packet) -> EnqueueOutcome {
        let deadline = Instant::now() + self.config.enqueue_timeout;
        let mut state = self.shared.state.lock();
        loop {
            if state.closed {
                return EnqueueOutcome::Closed;
            }
            if state.items.len() < self.shared.capacity {
                state.items.push_back(packet);
                self.shared.not_empty.notify_one();
                return EnqueueOutcome::Accepted;
            }
            if self.config.enqueue_timeout.is_zero()
                || self
                    .shared
                    .not_full
                    .wait_until(&mut state, deadline)
                    .timed_out()
            {
                return EnqueueOutcome::Dropped;
            }
        }
    }

    /// Number of packets currently queued (excluding any in flight).
    pub fn len(&self) -> usize {
        self.shared.state.lock().items.len()
    }

    /// Whether the queue is empty and nothing is in flight.
    pub fn is_empty(&self) -> bool {
        let state = self.shared.state.lock();
        state.items.is_empty() && !state.in_flight
    }

    /// Closes the queue: waits up to the drain timeout for the worker
    /// to deliver the backlog, discards whatever remains, and joins
    /// the worker. Returns the number of packets discarded.
    pub fn close(mut self) -> usize {
        let deadline = Instant::now() + self.config.drain_timeout;
        let lost = {
            let mut state = self.shared.state.lock();
            while (!state.items.is_empty() || state.in_flight)
                && !self
                    .shared
                    .not_full
                    .wait_until(&mut state, deadline)
                    .timed_out()
            {}
            state.closed = true;
            let lost = state.items.len();
            state.items.clear();
            lost
        };
        self.shared.not_empty.notify_all();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        lost
    }
}

impl Drop for DispatchQueue {
    fn drop(&mut self) {
        // close() takes self by value; reaching here means the queue
        // was dropped without a drain. Unblock and detach the worker.
        {
            let mut state = self.shared.state.lock();
            state.closed = true;
            state.items.clear();
        }
        self.shared.not_empty.notify_all();
        self.shared.not_full.notify_all();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
