//! A capture transport: records every packet and injects failures.

use parking_lot::{Condvar, Mutex};
use silpipe_codec::Packet;
use silpipe_core::{CoreError, CoreResult, Transport};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct CaptureShared {
    packets: Mutex<Vec<Packet>>,
    opens: AtomicUsize,
    closes: AtomicUsize,
    writes: AtomicUsize,
    fail_connect: AtomicBool,
    fail_writes_after: Mutex<Option<usize>>,
    held: Mutex<bool>,
    released: Condvar,
}

/// Shared handle to a [`CaptureTransport`], kept by the test for
/// assertions and failure injection.
#[derive(Clone, Default)]
pub struct CaptureHandle {
    shared: Arc<CaptureShared>,
}

impl CaptureHandle {
    /// Creates a fresh handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the transport side of this handle.
    pub fn transport(&self) -> Box<dyn Transport> {
        Box::new(CaptureTransport {
            shared: Arc::clone(&self.shared),
        })
    }

    /// All packets written so far, in write order.
    pub fn packets(&self) -> Vec<Packet> {
        self.shared.packets.lock().clone()
    }

    /// Number of packets written so far.
    pub fn written(&self) -> usize {
        self.shared.packets.lock().len()
    }

    /// Number of `open` calls observed.
    pub fn opens(&self) -> usize {
        self.shared.opens.load(Ordering::SeqCst)
    }

    /// Number of `close` calls observed.
    pub fn closes(&self) -> usize {
        self.shared.closes.load(Ordering::SeqCst)
    }

    /// Makes the next `open` calls fail.
    pub fn fail_connect(&self, fail: bool) {
        self.shared.fail_connect.store(fail, Ordering::SeqCst);
    }

    /// Makes every write after the first `successes` fail.
    pub fn fail_writes_after(&self, successes: usize) {
        *self.shared.fail_writes_after.lock() = Some(successes);
    }

    /// Blocks the writer thread inside `write_packet` until
    /// [`CaptureHandle::release_writes`] is called. Used to fill
    /// dispatch queues deterministically.
    pub fn hold_writes(&self) {
        *self.shared.held.lock() = true;
    }

    /// Releases writers blocked by [`CaptureHandle::hold_writes`].
    pub fn release_writes(&self) {
        *self.shared.held.lock() = false;
        self.shared.released.notify_all();
    }
}

struct CaptureTransport {
    shared: Arc<CaptureShared>,
}

impl Transport for CaptureTransport {
    fn protocol(&self) -> &'static str {
        "capture"
    }

    fn open(&mut self) -> CoreResult<()> {
        self.shared.opens.fetch_add(1, Ordering::SeqCst);
        if self.shared.fail_connect.load(Ordering::SeqCst) {
            return Err(CoreError::connect("capture transport refused"));
        }
        Ok(())
    }

    fn write_packet(&mut self, packet: &Packet) -> CoreResult<()> {
        {
            let mut held = self.shared.held.lock();
            while *held {
                self.shared.released.wait(&mut held);
            }
        }

        let writes = self.shared.writes.fetch_add(1, Ordering::SeqCst);
        if let Some(limit) = *self.shared.fail_writes_after.lock() {
            if writes >= limit {
                return Err(CoreError::write("capture transport failure injected"));
            }
        }

        self.shared.packets.lock().push(packet.clone());
        Ok(())
    }

    fn close(&mut self) -> CoreResult<()> {
        self.shared.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
