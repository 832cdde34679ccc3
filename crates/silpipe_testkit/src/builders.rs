//! Compact packet constructors for tests.

use silpipe_codec::{
    ControlCommand, ControlCommandType, Level, LogEntry, LogEntryType, Packet, ProcessFlow,
    ProcessFlowType, ViewerId, Watch, WatchType,
};
use silpipe_core::now_micros;

/// A message-level log entry with the given title.
pub fn message(title: &str) -> Packet {
    message_at(Level::Message, LogEntryType::Message, title)
}

/// A log entry at an explicit level and entry type.
pub fn message_at(level: Level, entry_type: LogEntryType, title: &str) -> Packet {
    Packet::log_entry(
        level,
        now_micros(),
        LogEntry {
            entry_type,
            viewer_id: ViewerId::Title,
            app_name: None,
            session_name: None,
            title: Some(title.to_owned()),
            host_name: None,
            correlation_id: 0,
            color: 0,
            data: None,
        },
    )
}

/// A log entry padded with its title to an exact encoded size. Panics
/// if `total` is smaller than the empty entry.
pub fn log_entry_sized(total: usize) -> Packet {
    let base = message_at(Level::Message, LogEntryType::Message, "").size();
    assert!(
        total > base,
        "requested size {total} not above the {base}-byte minimum"
    );
    let packet = message_at(
        Level::Message,
        LogEntryType::Message,
        &"x".repeat(total - base),
    );
    debug_assert_eq!(packet.size(), total);
    packet
}

/// A string watch.
pub fn watch(name: &str, value: &str) -> Packet {
    Packet::watch(
        Level::Message,
        now_micros(),
        Watch {
            name: name.to_owned(),
            value: value.to_owned(),
            watch_type: WatchType::String,
        },
    )
}

/// A process-flow marker.
pub fn flow(flow_type: ProcessFlowType, title: &str) -> Packet {
    Packet::process_flow(
        Level::Debug,
        now_micros(),
        ProcessFlow {
            flow_type,
            title: Some(title.to_owned()),
            host_name: None,
        },
    )
}

/// A control command without payload.
pub fn control(command_type: ControlCommandType) -> Packet {
    Packet::control_command(
        now_micros(),
        ControlCommand {
            command_type,
            data: None,
        },
    )
}

/// The title of a log-entry packet, for order assertions.
pub fn title_of(packet: &Packet) -> Option<&str> {
    match packet.body() {
        silpipe_codec::PacketBody::LogEntry(entry) => entry.title.as_deref(),
        _ => None,
    }
}
