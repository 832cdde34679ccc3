//! Packet model: the four telemetry packet kinds and their subtypes.

use crate::level::Level;

/// Kind tag carried in the packet envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum PacketKind {
    /// A control command for the receiving end.
    ControlCommand = 1,
    /// A log entry.
    LogEntry = 4,
    /// A named variable watch.
    Watch = 5,
    /// A process-flow marker.
    ProcessFlow = 6,
}

impl PacketKind {
    /// Converts a wire tag to a packet kind.
    #[must_use]
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(Self::ControlCommand),
            4 => Some(Self::LogEntry),
            5 => Some(Self::Watch),
            6 => Some(Self::ProcessFlow),
            _ => None,
        }
    }

    /// Converts the kind to its wire tag.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }
}

/// Subtype of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i32)]
pub enum LogEntryType {
    /// A horizontal separator.
    Separator = 0,
    /// Method entry marker.
    EnterMethod = 1,
    /// Method exit marker.
    LeaveMethod = 2,
    /// A regular message.
    #[default]
    Message = 100,
    /// A warning message.
    Warning = 101,
    /// An error message.
    Error = 102,
    /// An internal library error.
    InternalError = 103,
    /// A comment.
    Comment = 104,
    /// A variable value.
    VariableValue = 105,
    /// A named checkpoint.
    Checkpoint = 106,
    /// A debug message.
    Debug = 107,
    /// A verbose message.
    Verbose = 108,
    /// A fatal error message.
    Fatal = 109,
    /// A text attachment.
    Text = 200,
    /// A binary attachment.
    Binary = 201,
    /// System information.
    System = 206,
}

impl LogEntryType {
    /// Converts a wire ordinal to a log entry type.
    #[must_use]
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Separator),
            1 => Some(Self::EnterMethod),
            2 => Some(Self::LeaveMethod),
            100 => Some(Self::Message),
            101 => Some(Self::Warning),
            102 => Some(Self::Error),
            103 => Some(Self::InternalError),
            104 => Some(Self::Comment),
            105 => Some(Self::VariableValue),
            106 => Some(Self::Checkpoint),
            107 => Some(Self::Debug),
            108 => Some(Self::Verbose),
            109 => Some(Self::Fatal),
            200 => Some(Self::Text),
            201 => Some(Self::Binary),
            206 => Some(Self::System),
            _ => None,
        }
    }

    /// Converts the type to its wire ordinal.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }
}

/// Viewer hint telling a reader how to render a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i32)]
pub enum ViewerId {
    /// No viewer; title only.
    #[default]
    NoViewer = -1,
    /// Title viewer.
    Title = 0,
    /// Raw data viewer.
    Data = 1,
    /// Line list viewer.
    List = 2,
    /// Key/value list viewer.
    ValueList = 3,
    /// Object inspector viewer.
    Inspector = 4,
    /// Table viewer.
    Table = 5,
    /// Binary/hex viewer.
    Binary = 200,
}

impl ViewerId {
    /// Converts a wire ordinal to a viewer id.
    #[must_use]
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            -1 => Some(Self::NoViewer),
            0 => Some(Self::Title),
            1 => Some(Self::Data),
            2 => Some(Self::List),
            3 => Some(Self::ValueList),
            4 => Some(Self::Inspector),
            5 => Some(Self::Table),
            200 => Some(Self::Binary),
            _ => None,
        }
    }

    /// Converts the viewer id to its wire ordinal.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }
}

/// Value type tag of a watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i32)]
pub enum WatchType {
    /// A single character.
    Char = 0,
    /// A string value.
    #[default]
    String = 1,
    /// An integer value.
    Integer = 2,
    /// A floating-point value.
    Float = 3,
    /// A boolean value.
    Boolean = 4,
    /// A timestamp value.
    Timestamp = 5,
    /// An arbitrary object rendered as a string.
    Object = 6,
}

impl WatchType {
    /// Converts a wire ordinal to a watch type.
    #[must_use]
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Char),
            1 => Some(Self::String),
            2 => Some(Self::Integer),
            3 => Some(Self::Float),
            4 => Some(Self::Boolean),
            5 => Some(Self::Timestamp),
            6 => Some(Self::Object),
            _ => None,
        }
    }

    /// Converts the type to its wire ordinal.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }
}

/// Subtype of a control command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i32)]
pub enum ControlCommandType {
    /// Clear all log entries on the receiving end.
    #[default]
    ClearLog = 0,
    /// Clear all watches.
    ClearWatches = 1,
    /// Clear auto views.
    ClearAutoViews = 2,
    /// Clear everything.
    ClearAll = 3,
    /// Clear the process-flow display.
    ClearProcessFlow = 4,
}

impl ControlCommandType {
    /// Converts a wire ordinal to a control command type.
    #[must_use]
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::ClearLog),
            1 => Some(Self::ClearWatches),
            2 => Some(Self::ClearAutoViews),
            3 => Some(Self::ClearAll),
            4 => Some(Self::ClearProcessFlow),
            _ => None,
        }
    }

    /// Converts the type to its wire ordinal.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }
}

/// Subtype of a process-flow marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i32)]
pub enum ProcessFlowType {
    /// A method was entered.
    #[default]
    EnterMethod = 0,
    /// A method was left.
    LeaveMethod = 1,
    /// A thread was entered.
    EnterThread = 2,
    /// A thread was left.
    LeaveThread = 3,
    /// A process was entered.
    EnterProcess = 4,
    /// A process was left.
    LeaveProcess = 5,
}

impl ProcessFlowType {
    /// Converts a wire ordinal to a process-flow type.
    #[must_use]
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::EnterMethod),
            1 => Some(Self::LeaveMethod),
            2 => Some(Self::EnterThread),
            3 => Some(Self::LeaveThread),
            4 => Some(Self::EnterProcess),
            5 => Some(Self::LeaveProcess),
            _ => None,
        }
    }

    /// Converts the type to its wire ordinal.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }
}

/// A log entry body.
///
/// Optional strings and the optional payload treat "absent" and "empty"
/// as the same wire state: both encode as zero length, and a zero
/// length decodes to `None`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LogEntry {
    /// Entry subtype.
    pub entry_type: LogEntryType,
    /// Viewer hint.
    pub viewer_id: ViewerId,
    /// Application name.
    pub app_name: Option<String>,
    /// Session name.
    pub session_name: Option<String>,
    /// Entry title.
    pub title: Option<String>,
    /// Originating host name.
    pub host_name: Option<String>,
    /// Correlation id linking related entries.
    pub correlation_id: u32,
    /// Background color, 0xAARRGGBB.
    pub color: u32,
    /// Optional binary payload.
    pub data: Option<Vec<u8>>,
}

/// A variable watch body.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Watch {
    /// Watch name.
    pub name: String,
    /// Stringified value.
    pub value: String,
    /// Value type tag.
    pub watch_type: WatchType,
}

/// A control command body.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ControlCommand {
    /// Command subtype.
    pub command_type: ControlCommandType,
    /// Optional binary payload.
    pub data: Option<Vec<u8>>,
}

/// A process-flow marker body.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessFlow {
    /// Flow subtype.
    pub flow_type: ProcessFlowType,
    /// Marker title, typically the method name.
    pub title: Option<String>,
    /// Originating host name.
    pub host_name: Option<String>,
}

/// Kind-specific packet payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketBody {
    /// A log entry.
    LogEntry(LogEntry),
    /// A variable watch.
    Watch(Watch),
    /// A control command.
    ControlCommand(ControlCommand),
    /// A process-flow marker.
    ProcessFlow(ProcessFlow),
}

impl PacketBody {
    /// Returns the kind tag for this body.
    #[must_use]
    pub fn kind(&self) -> PacketKind {
        match self {
            Self::LogEntry(_) => PacketKind::LogEntry,
            Self::Watch(_) => PacketKind::Watch,
            Self::ControlCommand(_) => PacketKind::ControlCommand,
            Self::ProcessFlow(_) => PacketKind::ProcessFlow,
        }
    }
}

/// One unit of structured telemetry.
///
/// Packets are immutable after construction, except for the
/// `thread_safe` flag which is set once by the hub before a packet
/// crosses into asynchronous delivery and never cleared. The flag is
/// not part of the wire format: the queue clones a marked packet on
/// enqueue, so a background worker only ever reads a frozen copy.
#[derive(Debug, Clone)]
pub struct Packet {
    level: Level,
    timestamp: u64,
    thread_safe: bool,
    body: PacketBody,
}

impl Packet {
    /// Creates a packet with the given level, timestamp and body.
    ///
    /// `timestamp` is microseconds since the Unix epoch, UTC.
    #[must_use]
    pub fn new(level: Level, timestamp: u64, body: PacketBody) -> Self {
        Self {
            level,
            timestamp,
            thread_safe: false,
            body,
        }
    }

    /// Creates a log entry packet.
    #[must_use]
    pub fn log_entry(level: Level, timestamp: u64, entry: LogEntry) -> Self {
        Self::new(level, timestamp, PacketBody::LogEntry(entry))
    }

    /// Creates a watch packet.
    #[must_use]
    pub fn watch(level: Level, timestamp: u64, watch: Watch) -> Self {
        Self::new(level, timestamp, PacketBody::Watch(watch))
    }

    /// Creates a control command packet at [`Level::Control`].
    #[must_use]
    pub fn control_command(timestamp: u64, command: ControlCommand) -> Self {
        Self::new(
            Level::Control,
            timestamp,
            PacketBody::ControlCommand(command),
        )
    }

    /// Creates a process-flow packet.
    #[must_use]
    pub fn process_flow(level: Level, timestamp: u64, flow: ProcessFlow) -> Self {
        Self::new(level, timestamp, PacketBody::ProcessFlow(flow))
    }

    /// Returns the severity level.
    #[must_use]
    pub fn level(&self) -> Level {
        self.level
    }

    /// Returns the timestamp in microseconds since the Unix epoch.
    #[must_use]
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Returns the kind tag.
    #[must_use]
    pub fn kind(&self) -> PacketKind {
        self.body.kind()
    }

    /// Returns the kind-specific body.
    #[must_use]
    pub fn body(&self) -> &PacketBody {
        &self.body
    }

    /// Marks the packet as frozen for concurrent read by a background
    /// worker. Set once; never cleared.
    pub fn mark_thread_safe(&mut self) {
        self.thread_safe = true;
    }

    /// Whether the packet has been marked thread-safe.
    #[must_use]
    pub fn is_thread_safe(&self) -> bool {
        self.thread_safe
    }
}

/// Equality is over the wire-visible fields; the `thread_safe` flag is
/// delivery-state, not payload.
impl PartialEq for Packet {
    fn eq(&self, other: &Self) -> bool {
        self.level == other.level
            && self.timestamp == other.timestamp
            && self.body == other.body
    }
}

impl Eq for Packet {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_tag_roundtrip() {
        for kind in [
            PacketKind::ControlCommand,
            PacketKind::LogEntry,
            PacketKind::Watch,
            PacketKind::ProcessFlow,
        ] {
            assert_eq!(PacketKind::from_u16(kind.as_u16()), Some(kind));
        }
        assert_eq!(PacketKind::from_u16(0), None);
        assert_eq!(PacketKind::from_u16(7), None);
    }

    #[test]
    fn subtype_ordinal_roundtrips() {
        for t in [
            LogEntryType::Separator,
            LogEntryType::EnterMethod,
            LogEntryType::Message,
            LogEntryType::Error,
            LogEntryType::Binary,
            LogEntryType::System,
        ] {
            assert_eq!(LogEntryType::from_i32(t.as_i32()), Some(t));
        }
        assert_eq!(LogEntryType::from_i32(50), None);

        for t in [
            ProcessFlowType::EnterMethod,
            ProcessFlowType::LeaveProcess,
        ] {
            assert_eq!(ProcessFlowType::from_i32(t.as_i32()), Some(t));
        }
        assert_eq!(ProcessFlowType::from_i32(6), None);

        assert_eq!(ViewerId::from_i32(-1), Some(ViewerId::NoViewer));
        assert_eq!(ViewerId::from_i32(6), None);
        assert_eq!(WatchType::from_i32(7), None);
        assert_eq!(ControlCommandType::from_i32(5), None);
    }

    #[test]
    fn thread_safe_flag_set_once() {
        let mut packet = Packet::watch(
            Level::Message,
            1,
            Watch {
                name: "x".into(),
                value: "1".into(),
                watch_type: WatchType::Integer,
            },
        );
        assert!(!packet.is_thread_safe());
        packet.mark_thread_safe();
        assert!(packet.is_thread_safe());
    }

    #[test]
    fn equality_ignores_thread_safe_flag() {
        let packet = Packet::control_command(7, ControlCommand::default());
        let mut marked = packet.clone();
        marked.mark_thread_safe();
        assert_eq!(packet, marked);
    }
}
