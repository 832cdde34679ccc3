//! Session: the application-facing convenience layer.
//!
//! A session is a named channel over a shared hub. It builds packets
//! from the hub's identity context and forwards them to `Hub::send`;
//! all the real work (filtering, fan-out, queues) lives in the hub.

use crate::context::now_micros;
use crate::hub::Hub;
use silpipe_codec::{
    ControlCommand, ControlCommandType, Level, LogEntry, LogEntryType, Packet, ProcessFlow,
    ProcessFlowType, ViewerId, Watch, WatchType,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A named logging channel bound to a hub.
pub struct Session {
    name: String,
    level: Level,
    active: AtomicBool,
    hub: Arc<Hub>,
}

impl Session {
    /// Creates an active session logging everything at `Level::Debug`
    /// and above.
    pub fn new(hub: Arc<Hub>, name: impl Into<String>) -> Self {
        Self::with_level(hub, name, Level::Debug)
    }

    /// Creates an active session with an explicit level threshold.
    pub fn with_level(hub: Arc<Hub>, name: impl Into<String>, level: Level) -> Self {
        Self {
            name: name.into(),
            level,
            active: AtomicBool::new(true),
            hub,
        }
    }

    /// The session name, stamped into every log entry.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The session's level threshold.
    pub fn level(&self) -> Level {
        self.level
    }

    /// Whether the session currently emits packets.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    /// Activates or deactivates the session.
    pub fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Relaxed);
    }

    fn is_on(&self, level: Level) -> bool {
        self.is_active() && level >= self.level
    }

    fn entry(&self, entry_type: LogEntryType, viewer_id: ViewerId) -> LogEntry {
        let context = self.hub.context();
        LogEntry {
            entry_type,
            viewer_id,
            app_name: Some(context.app_name.clone()),
            session_name: Some(self.name.clone()),
            title: None,
            host_name: Some(context.host_name.clone()),
            correlation_id: context.process_id,
            color: 0,
            data: None,
        }
    }

    fn log_entry(&self, level: Level, entry_type: LogEntryType, title: &str) {
        if !self.is_on(level) {
            return;
        }
        let mut entry = self.entry(entry_type, ViewerId::Title);
        entry.title = Some(title.to_owned());
        self.hub.send(Packet::log_entry(level, now_micros(), entry));
    }

    /// Logs a message at `Level::Message`.
    pub fn log_message(&self, title: &str) {
        self.log_entry(Level::Message, LogEntryType::Message, title);
    }

    /// Logs a warning.
    pub fn log_warning(&self, title: &str) {
        self.log_entry(Level::Warning, LogEntryType::Warning, title);
    }

    /// Logs an error.
    pub fn log_error(&self, title: &str) {
        self.log_entry(Level::Error, LogEntryType::Error, title);
    }

    /// Logs a fatal error.
    pub fn log_fatal(&self, title: &str) {
        self.log_entry(Level::Fatal, LogEntryType::Fatal, title);
    }

    /// Logs a debug message.
    pub fn log_debug(&self, title: &str) {
        self.log_entry(Level::Debug, LogEntryType::Debug, title);
    }

    /// Logs a verbose message.
    pub fn log_verbose(&self, title: &str) {
        self.log_entry(Level::Verbose, LogEntryType::Verbose, title);
    }

    /// Logs a horizontal separator.
    pub fn log_separator(&self) {
        if !self.is_on(Level::Message) {
            return;
        }
        let entry = self.entry(LogEntryType::Separator, ViewerId::NoViewer);
        self.hub
            .send(Packet::log_entry(Level::Message, now_micros(), entry));
    }

    /// Logs a binary payload viewable in a hex viewer.
    pub fn log_binary(&self, title: &str, data: &[u8]) {
        if !self.is_on(Level::Message) {
            return;
        }
        let mut entry = self.entry(LogEntryType::Binary, ViewerId::Binary);
        entry.title = Some(title.to_owned());
        entry.data = Some(data.to_vec());
        self.hub
            .send(Packet::log_entry(Level::Message, now_micros(), entry));
    }

    fn process_flow(&self, flow_type: ProcessFlowType, title: &str) {
        if !self.is_on(Level::Debug) {
            return;
        }
        let context = self.hub.context();
        self.hub.send(Packet::process_flow(
            Level::Debug,
            now_micros(),
            ProcessFlow {
                flow_type,
                title: Some(title.to_owned()),
                host_name: Some(context.host_name.clone()),
            },
        ));
    }

    /// Marks entry into a method on the process-flow display.
    pub fn enter_method(&self, name: &str) {
        self.process_flow(ProcessFlowType::EnterMethod, name);
    }

    /// Marks exit from a method on the process-flow display.
    pub fn leave_method(&self, name: &str) {
        self.process_flow(ProcessFlowType::LeaveMethod, name);
    }

    fn watch(&self, name: &str, value: String, watch_type: WatchType) {
        if !self.is_on(Level::Message) {
            return;
        }
        self.hub.send(Packet::watch(
            Level::Message,
            now_micros(),
            Watch {
                name: name.to_owned(),
                value,
                watch_type,
            },
        ));
    }

    /// Reports a string variable.
    pub fn watch_str(&self, name: &str, value: &str) {
        self.watch(name, value.to_owned(), WatchType::String);
    }

    /// Reports a boolean variable.
    pub fn watch_bool(&self, name: &str, value: bool) {
        self.watch(name, value.to_string(), WatchType::Boolean);
    }

    /// Reports an integer variable.
    pub fn watch_int(&self, name: &str, value: i64) {
        self.watch(name, value.to_string(), WatchType::Integer);
    }

    /// Reports a floating-point variable.
    pub fn watch_float(&self, name: &str, value: f64) {
        self.watch(name, value.to_string(), WatchType::Float);
    }

    /// Asks the receiving end to clear its log display.
    pub fn clear_log(&self) {
        self.control(ControlCommandType::ClearLog);
    }

    /// Asks the receiving end to clear everything.
    pub fn clear_all(&self) {
        self.control(ControlCommandType::ClearAll);
    }

    fn control(&self, command_type: ControlCommandType) {
        if !self.is_active() {
            return;
        }
        self.hub.send(Packet::control_command(
            now_micros(),
            ControlCommand {
                command_type,
                data: None,
            },
        ));
    }
}
