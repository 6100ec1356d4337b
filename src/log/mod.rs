//! Diagnostics emitted while tests run.
//!
//! Code under test logs through `tracing`. The [`layer::HookLayer`] turns
//! every event into a [`Diagnostic`] and hands it to the [`hooks`] chain,
//! which decides whether to print it, drop it, count it against an
//! expectation, or abort the running test.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use termcolor::Color;

use crate::report::paint;

pub mod hooks;
pub mod layer;

pub use hooks::{HookAction, HookGuard, HookId, LogHook};
pub use layer::{init, HookLayer};

/// Domain used by the engine for its own diagnostics.
pub const ENGINE_DOMAIN: &str = "tapline";

// =============================================================================
// LEVELS
// =============================================================================

/// Severity of a diagnostic, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LogLevel {
    Error,
    Critical,
    Warning,
    Message,
    Info,
    Debug,
}

impl LogLevel {
    pub const ALL: [LogLevel; 6] = [
        LogLevel::Error,
        LogLevel::Critical,
        LogLevel::Warning,
        LogLevel::Message,
        LogLevel::Info,
        LogLevel::Debug,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
            LogLevel::Warning => "WARNING",
            LogLevel::Message => "MESSAGE",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
        }
    }

    /// Maps a `tracing` level onto a diagnostic level. `ERROR` is only an
    /// [`LogLevel::Error`] when the event is also marked fatal.
    pub fn from_tracing(level: tracing::Level, fatal: bool) -> Self {
        match level {
            tracing::Level::ERROR if fatal => LogLevel::Error,
            tracing::Level::ERROR => LogLevel::Critical,
            tracing::Level::WARN => LogLevel::Warning,
            tracing::Level::INFO => LogLevel::Message,
            tracing::Level::DEBUG => LogLevel::Info,
            tracing::Level::TRACE => LogLevel::Debug,
        }
    }

    pub fn mask(self) -> LevelMask {
        LevelMask(1 << self as u8)
    }

    fn color(self) -> Color {
        match self {
            LogLevel::Error => Color::Red,
            LogLevel::Critical => Color::Magenta,
            LogLevel::Warning => Color::Yellow,
            LogLevel::Message => Color::Green,
            LogLevel::Info => Color::Blue,
            LogLevel::Debug => Color::Cyan,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A set of [`LogLevel`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LevelMask(u8);

impl LevelMask {
    pub const NONE: LevelMask = LevelMask(0);
    pub const ERROR: LevelMask = LevelMask(1 << LogLevel::Error as u8);
    pub const CRITICAL: LevelMask = LevelMask(1 << LogLevel::Critical as u8);
    pub const WARNING: LevelMask = LevelMask(1 << LogLevel::Warning as u8);
    pub const MESSAGE: LevelMask = LevelMask(1 << LogLevel::Message as u8);
    pub const INFO: LevelMask = LevelMask(1 << LogLevel::Info as u8);
    pub const DEBUG: LevelMask = LevelMask(1 << LogLevel::Debug as u8);
    pub const ALL: LevelMask = LevelMask(0b11_1111);

    pub fn contains(self, level: LogLevel) -> bool {
        self.0 & level.mask().0 != 0
    }

    pub fn intersects(self, other: LevelMask) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl From<LogLevel> for LevelMask {
    fn from(level: LogLevel) -> Self {
        level.mask()
    }
}

impl BitOr for LevelMask {
    type Output = LevelMask;

    fn bitor(self, rhs: LevelMask) -> LevelMask {
        LevelMask(self.0 | rhs.0)
    }
}

impl BitOrAssign for LevelMask {
    fn bitor_assign(&mut self, rhs: LevelMask) {
        self.0 |= rhs.0;
    }
}

// =============================================================================
// DIAGNOSTIC
// =============================================================================

/// One emitted log record as seen by the hook chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub domain: String,
    pub level: LogLevel,
    pub text: String,
    pub fatal: bool,
}

impl Diagnostic {
    pub fn new(domain: impl Into<String>, level: LogLevel, text: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            level,
            text: text.into(),
            fatal: level == LogLevel::Error,
        }
    }

    pub fn fatal(mut self) -> Self {
        self.fatal = true;
        self
    }

    /// Renders `[FATAL-]LEVEL: (domain) text`.
    pub fn format(&self, colors: bool) -> String {
        let mut out = String::new();
        if self.fatal {
            if colors {
                out.push_str(&paint("FATAL", LogLevel::Error.color(), true));
            } else {
                out.push_str("FATAL");
            }
            out.push('-');
        }
        if colors {
            out.push_str(&paint(self.level.as_str(), self.level.color(), true));
        } else {
            out.push_str(self.level.as_str());
        }
        out.push_str(": ");
        if !self.domain.is_empty() {
            out.push('(');
            out.push_str(&self.domain);
            out.push_str(") ");
        }
        out.push_str(&self.text);
        out
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format(false))
    }
}

/// Sends a diagnostic straight to the hook chain, bypassing `tracing`.
pub fn emit(diagnostic: Diagnostic) {
    hooks::dispatch(&diagnostic);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracing_levels_map_onto_six_levels() {
        use tracing::Level;
        assert_eq!(LogLevel::from_tracing(Level::ERROR, true), LogLevel::Error);
        assert_eq!(LogLevel::from_tracing(Level::ERROR, false), LogLevel::Critical);
        assert_eq!(LogLevel::from_tracing(Level::WARN, false), LogLevel::Warning);
        assert_eq!(LogLevel::from_tracing(Level::INFO, false), LogLevel::Message);
        assert_eq!(LogLevel::from_tracing(Level::DEBUG, false), LogLevel::Info);
        assert_eq!(LogLevel::from_tracing(Level::TRACE, true), LogLevel::Debug);
    }

    #[test]
    fn masks_share_bits_with_their_levels() {
        let mask = LevelMask::CRITICAL | LevelMask::WARNING;
        assert!(mask.contains(LogLevel::Critical));
        assert!(mask.contains(LogLevel::Warning));
        assert!(!mask.contains(LogLevel::Message));
        assert!(LevelMask::ALL.intersects(LogLevel::Debug.into()));
        assert!(LevelMask::NONE.is_empty());
    }

    #[test]
    fn plain_format() {
        let d = Diagnostic::new("net", LogLevel::Warning, "slow peer");
        assert_eq!(d.format(false), "WARNING: (net) slow peer");
        assert_eq!(d.clone().fatal().to_string(), "FATAL-WARNING: (net) slow peer");
        assert_eq!(
            Diagnostic::new("", LogLevel::Message, "hi").to_string(),
            "MESSAGE: hi"
        );
        assert!(Diagnostic::new("x", LogLevel::Error, "e").fatal);
    }

    #[test]
    fn colored_format_wraps_level() {
        let d = Diagnostic::new("net", LogLevel::Critical, "down");
        let colored = d.format(true);
        assert!(colored.contains("\x1b["));
        assert!(colored.contains("CRITICAL"));
        assert!(colored.ends_with(": (net) down"));
    }
}
