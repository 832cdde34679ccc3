//! In-memory transport: a bounded ring of encoded packets.
//!
//! Keeps the most recent telemetry in memory and streams it out on
//! demand, either for post-mortem dumps in production or as the
//! observation point in tests.

use crate::error::{CoreError, CoreResult};
use crate::options::SinkOptions;
use crate::sink::{SinkCommand, Transport};
use parking_lot::Mutex;
use silpipe_codec::{FileHeader, Packet};
use std::collections::VecDeque;
use std::sync::Arc;

/// Command action: stream the buffered content into the writer
/// carried in the command state (a [`FlushTarget`]).
pub const FLUSH_TO_WRITER: i32 = 0;

/// Shared byte buffer handed to [`FLUSH_TO_WRITER`]. The command
/// state must downcast to this type.
#[derive(Clone, Default)]
pub struct FlushTarget(pub Arc<Mutex<Vec<u8>>>);

impl FlushTarget {
    /// Creates an empty target.
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the accumulated bytes, leaving the target empty.
    pub fn take(&self) -> Vec<u8> {
        std::mem::take(&mut self.0.lock())
    }
}

/// A transport buffering encoded packets in memory, evicting oldest
/// whole packets once the configured byte limit is exceeded.
pub struct MemoryTransport {
    maxsize: u64,
    packets: VecDeque<Vec<u8>>,
    buffered: u64,
    open: bool,
}

impl MemoryTransport {
    /// Builds a memory transport. Recognized key: `maxsize`
    /// (default 2 MB).
    pub fn from_options(options: &SinkOptions) -> Self {
        Self {
            maxsize: options.get_size("maxsize", 2 * 1024 * 1024).max(1),
            packets: VecDeque::new(),
            buffered: 0,
            open: false,
        }
    }

    /// Number of packets currently buffered.
    pub fn packet_count(&self) -> usize {
        self.packets.len()
    }

    /// Total encoded bytes currently buffered.
    pub fn buffered_bytes(&self) -> u64 {
        self.buffered
    }

    fn evict_to_fit(&mut self, incoming: u64) {
        while self.buffered + incoming > self.maxsize {
            match self.packets.pop_front() {
                Some(oldest) => self.buffered -= oldest.len() as u64,
                None => break,
            }
        }
    }
}

impl Transport for MemoryTransport {
    fn protocol(&self) -> &'static str {
        "mem"
    }

    fn open(&mut self) -> CoreResult<()> {
        self.open = true;
        Ok(())
    }

    fn write_packet(&mut self, packet: &Packet) -> CoreResult<()> {
        if !self.open {
            return Err(CoreError::Disconnected);
        }
        let encoded = packet.encode();
        self.evict_to_fit(encoded.len() as u64);
        self.buffered += encoded.len() as u64;
        self.packets.push_back(encoded);
        Ok(())
    }

    fn close(&mut self) -> CoreResult<()> {
        self.open = false;
        self.packets.clear();
        self.buffered = 0;
        Ok(())
    }

    fn handle_command(&mut self, command: &SinkCommand) -> CoreResult<()> {
        if command.action != FLUSH_TO_WRITER {
            return Ok(());
        }
        let Some(target) = command.state.downcast_ref::<FlushTarget>() else {
            return Err(CoreError::write(
                "flush command state is not a FlushTarget",
            ));
        };
        let mut out = target.0.lock();
        out.extend_from_slice(&FileHeader::plaintext().encode());
        for encoded in &self.packets {
            out.extend_from_slice(encoded);
        }
        Ok(())
    }
}
