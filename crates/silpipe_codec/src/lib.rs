//! # silpipe codec
//!
//! Packet model and binary wire format for silpipe.
//!
//! This crate provides:
//! - The four packet kinds (log entry, watch, control command,
//!   process flow) and their subtype enumerations
//! - Severity levels
//! - The binary wire format: `size`/`encode`/`decode` with the
//!   guarantee that `size(p) == encode(p).len()`
//! - File-header framing (`SILF` / `SILE` + IV magic)

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod level;
mod packet;
mod wire;

pub use error::{CodecError, CodecResult};
pub use level::Level;
pub use packet::{
    ControlCommand, ControlCommandType, LogEntry, LogEntryType, Packet, PacketBody, PacketKind,
    ProcessFlow, ProcessFlowType, ViewerId, Watch, WatchType,
};
pub use wire::{
    FileHeader, CONTROL_COMMAND_HEADER, ENVELOPE_SIZE, FILE_IV_LEN, FILE_MAGIC_ENCRYPTED,
    FILE_MAGIC_PLAIN, LOG_ENTRY_HEADER, PROCESS_FLOW_HEADER, WATCH_HEADER,
};
