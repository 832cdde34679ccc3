//! Resolved sink options and the typed-getter contract.
//!
//! The core never parses connections strings; an external layer hands
//! each sink a resolved option map. Getters are total: a malformed
//! value falls back to the supplied default, unknown keys are ignored.
//! Only a missing mandatory value for an explicitly enabled feature is
//! fatal, and that is enforced at `connect()`, not here.

use silpipe_codec::Level;
use std::collections::HashMap;

/// Time-based rotation mode, anchored to UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RotateMode {
    /// No time-based rotation.
    #[default]
    None,
    /// Rotate on every UTC hour boundary.
    Hourly,
    /// Rotate on every UTC day boundary.
    Daily,
    /// Rotate on every ISO week boundary (Monday, UTC).
    Weekly,
    /// Rotate on every calendar month boundary (UTC).
    Monthly,
}

/// An immutable snapshot of resolved sink options.
#[derive(Debug, Clone, Default)]
pub struct SinkOptions {
    map: HashMap<String, String>,
}

impl SinkOptions {
    /// Creates an empty option set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an option set from a resolved key/value map.
    #[must_use]
    pub fn from_map(map: HashMap<String, String>) -> Self {
        Self { map }
    }

    /// Builder-style setter.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.map.insert(key.into(), value.into());
        self
    }

    /// Whether a key is present.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    /// Returns the raw value of a key, if present and non-empty.
    #[must_use]
    pub fn get_raw(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str).filter(|s| !s.is_empty())
    }

    /// Returns a string option, or `default` if absent.
    #[must_use]
    pub fn get_str(&self, key: &str, default: &str) -> String {
        self.map
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_owned())
    }

    /// Returns a boolean option. Accepts `true`/`false`/`1`/`0`,
    /// case-insensitive; anything else yields `default`.
    #[must_use]
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.map.get(key) {
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                _ => default,
            },
            None => default,
        }
    }

    /// Returns an integer option, or `default` on absence or a
    /// malformed value.
    #[must_use]
    pub fn get_int(&self, key: &str, default: i64) -> i64 {
        self.map
            .get(key)
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .unwrap_or(default)
    }

    /// Returns a size option in bytes. Accepts `KB`/`MB`/`GB`
    /// suffixes (case-insensitive); a bare number is kilobytes.
    /// `default` is in bytes.
    #[must_use]
    pub fn get_size(&self, key: &str, default: u64) -> u64 {
        let Some(raw) = self.map.get(key) else {
            return default;
        };
        let raw = raw.trim().to_ascii_lowercase();
        let (digits, factor) = if let Some(d) = raw.strip_suffix("kb") {
            (d.trim_end(), 1024)
        } else if let Some(d) = raw.strip_suffix("mb") {
            (d.trim_end(), 1024 * 1024)
        } else if let Some(d) = raw.strip_suffix("gb") {
            (d.trim_end(), 1024 * 1024 * 1024)
        } else {
            (raw.as_str(), 1024)
        };
        match digits.parse::<u64>() {
            Ok(value) => value.saturating_mul(factor),
            Err(_) => default,
        }
    }

    /// Returns a timespan option in milliseconds. Accepts `s`/`m`/
    /// `h`/`d` suffixes; a bare number is seconds. `default` is in
    /// milliseconds.
    #[must_use]
    pub fn get_timespan(&self, key: &str, default: u64) -> u64 {
        let Some(raw) = self.map.get(key) else {
            return default;
        };
        let raw = raw.trim().to_ascii_lowercase();
        let (digits, factor) = if let Some(d) = raw.strip_suffix('s') {
            (d.trim_end(), 1_000)
        } else if let Some(d) = raw.strip_suffix('m') {
            (d.trim_end(), 60_000)
        } else if let Some(d) = raw.strip_suffix('h') {
            (d.trim_end(), 3_600_000)
        } else if let Some(d) = raw.strip_suffix('d') {
            (d.trim_end(), 86_400_000)
        } else {
            (raw.as_str(), 1_000)
        };
        match digits.parse::<u64>() {
            Ok(value) => value.saturating_mul(factor),
            Err(_) => default,
        }
    }

    /// Returns a color option as `0xAARRGGBB`. Accepts `#RRGGBB`
    /// (alpha forced to `FF`), `#AARRGGBB` and `0x`-prefixed hex.
    #[must_use]
    pub fn get_color(&self, key: &str, default: u32) -> u32 {
        let Some(raw) = self.map.get(key) else {
            return default;
        };
        let raw = raw.trim();
        let hex = raw
            .strip_prefix('#')
            .or_else(|| raw.strip_prefix("0x"))
            .or_else(|| raw.strip_prefix("0X"))
            .unwrap_or(raw);
        match hex.len() {
            6 => u32::from_str_radix(hex, 16)
                .map(|rgb| 0xFF00_0000 | rgb)
                .unwrap_or(default),
            8 => u32::from_str_radix(hex, 16).unwrap_or(default),
            _ => default,
        }
    }

    /// Returns a rotation-mode option from the closed enumeration
    /// `none`/`hourly`/`daily`/`weekly`/`monthly`.
    #[must_use]
    pub fn get_rotate(&self, key: &str, default: RotateMode) -> RotateMode {
        match self.map.get(key) {
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "none" => RotateMode::None,
                "hourly" => RotateMode::Hourly,
                "daily" => RotateMode::Daily,
                "weekly" => RotateMode::Weekly,
                "monthly" => RotateMode::Monthly,
                _ => default,
            },
            None => default,
        }
    }

    /// Returns a level option from its lowercase name.
    #[must_use]
    pub fn get_level(&self, key: &str, default: Level) -> Level {
        match self.map.get(key) {
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "debug" => Level::Debug,
                "verbose" => Level::Verbose,
                "message" => Level::Message,
                "warning" => Level::Warning,
                "error" => Level::Error,
                "fatal" => Level::Fatal,
                "control" => Level::Control,
                _ => default,
            },
            None => default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(pairs: &[(&str, &str)]) -> SinkOptions {
        let mut opts = SinkOptions::new();
        for (k, v) in pairs {
            opts = opts.with(*k, *v);
        }
        opts
    }

    #[test]
    fn missing_keys_yield_defaults() {
        let opts = SinkOptions::new();
        assert_eq!(opts.get_str("file", "log.sil"), "log.sil");
        assert!(!opts.get_bool("append", false));
        assert_eq!(opts.get_int("maxparts", 3), 3);
        assert_eq!(opts.get_size("maxsize", 0), 0);
        assert_eq!(opts.get_timespan("timeout", 30_000), 30_000);
        assert_eq!(opts.get_rotate("rotate", RotateMode::None), RotateMode::None);
        assert_eq!(opts.get_level("level", Level::Debug), Level::Debug);
    }

    #[test]
    fn bool_parsing() {
        let opts = options(&[("a", "TRUE"), ("b", "0"), ("c", "banana")]);
        assert!(opts.get_bool("a", false));
        assert!(!opts.get_bool("b", true));
        assert!(opts.get_bool("c", true));
    }

    #[test]
    fn size_units() {
        let opts = options(&[
            ("plain", "16"),
            ("kb", "4KB"),
            ("mb", "2mb"),
            ("gb", "1GB"),
            ("bad", "lots"),
        ]);
        // Bare numbers are kilobytes.
        assert_eq!(opts.get_size("plain", 0), 16 * 1024);
        assert_eq!(opts.get_size("kb", 0), 4 * 1024);
        assert_eq!(opts.get_size("mb", 0), 2 * 1024 * 1024);
        assert_eq!(opts.get_size("gb", 0), 1024 * 1024 * 1024);
        assert_eq!(opts.get_size("bad", 77), 77);
    }

    #[test]
    fn timespan_units() {
        let opts = options(&[
            ("plain", "5"),
            ("s", "10s"),
            ("m", "2m"),
            ("h", "1h"),
            ("d", "1d"),
            ("bad", "soon"),
        ]);
        // Bare numbers are seconds; results are milliseconds.
        assert_eq!(opts.get_timespan("plain", 0), 5_000);
        assert_eq!(opts.get_timespan("s", 0), 10_000);
        assert_eq!(opts.get_timespan("m", 0), 120_000);
        assert_eq!(opts.get_timespan("h", 0), 3_600_000);
        assert_eq!(opts.get_timespan("d", 0), 86_400_000);
        assert_eq!(opts.get_timespan("bad", 123), 123);
    }

    #[test]
    fn color_formats() {
        let opts = options(&[
            ("rgb", "#112233"),
            ("argb", "0xAA112233"),
            ("bad", "reddish"),
        ]);
        assert_eq!(opts.get_color("rgb", 0), 0xFF11_2233);
        assert_eq!(opts.get_color("argb", 0), 0xAA11_2233);
        assert_eq!(opts.get_color("bad", 0x42), 0x42);
    }

    #[test]
    fn rotate_and_level_enumerations() {
        let opts = options(&[("rotate", "Daily"), ("level", "warning"), ("bad", "often")]);
        assert_eq!(opts.get_rotate("rotate", RotateMode::None), RotateMode::Daily);
        assert_eq!(
            opts.get_rotate("bad", RotateMode::Hourly),
            RotateMode::Hourly
        );
        assert_eq!(opts.get_level("level", Level::Debug), Level::Warning);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let opts = options(&[("definitely.unknown", "x"), ("file", "a.sil")]);
        assert_eq!(opts.get_str("file", ""), "a.sil");
    }

    #[test]
    fn empty_raw_value_counts_as_missing() {
        let opts = options(&[("key", "")]);
        assert_eq!(opts.get_raw("key"), None);
    }
}
