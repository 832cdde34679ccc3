//! Severity levels.

/// Severity level of a packet.
///
/// Levels are ordered: a sink configured with a threshold of
/// [`Level::Warning`] delivers `Warning`, `Error`, `Fatal` and
/// `Control` packets and drops the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(i32)]
pub enum Level {
    /// Fine-grained debugging output.
    Debug = 0,
    /// Detailed informational output.
    Verbose = 1,
    /// Regular informational output.
    #[default]
    Message = 2,
    /// Something unexpected but recoverable.
    Warning = 3,
    /// An operation failed.
    Error = 4,
    /// The application cannot continue.
    Fatal = 5,
    /// Control packets; always delivered.
    Control = 6,
}

impl Level {
    /// Converts a wire ordinal to a level.
    #[must_use]
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Debug),
            1 => Some(Self::Verbose),
            2 => Some(Self::Message),
            3 => Some(Self::Warning),
            4 => Some(Self::Error),
            5 => Some(Self::Fatal),
            6 => Some(Self::Control),
            _ => None,
        }
    }

    /// Converts the level to its wire ordinal.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }
}
