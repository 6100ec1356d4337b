//! Run configuration.
//!
//! [`TestMode`] is what a runner is started with: mode flags, verbosity,
//! selection filters and output settings. It is normally produced by the
//! command line (see [`crate::cli`]). [`DebugFlags`] come from the
//! `TAPLINE_DEBUG` environment variable and only affect how hard failures
//! end the process.

use std::fmt;
use std::ops::BitOr;
use std::sync::atomic::{AtomicU8, Ordering};

use once_cell::sync::Lazy;

use crate::path::TestPath;

/// Environment variable holding [`DebugFlags`].
pub const DEBUG_ENV: &str = "TAPLINE_DEBUG";

// =============================================================================
// MODE FLAGS
// =============================================================================

/// Which optional classes of tests are enabled, as queried by the skip
/// helpers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TestModeFlags(u8);

impl TestModeFlags {
    pub const NONE: TestModeFlags = TestModeFlags(0);
    pub const PERF: TestModeFlags = TestModeFlags(1 << 0);
    pub const SLOW: TestModeFlags = TestModeFlags(1 << 1);
    pub const THOROUGH: TestModeFlags = TestModeFlags::SLOW;
    pub const QUICK: TestModeFlags = TestModeFlags(1 << 2);
    pub const UNDEFINED: TestModeFlags = TestModeFlags(1 << 3);
    pub const VERBOSE: TestModeFlags = TestModeFlags(1 << 4);
    pub const QUIET: TestModeFlags = TestModeFlags(1 << 5);

    const NAMES: [(TestModeFlags, &'static str); 6] = [
        (TestModeFlags::PERF, "perf"),
        (TestModeFlags::SLOW, "thorough"),
        (TestModeFlags::QUICK, "quick"),
        (TestModeFlags::UNDEFINED, "undefined"),
        (TestModeFlags::VERBOSE, "verbose"),
        (TestModeFlags::QUIET, "quiet"),
    ];

    /// True if every flag in `other` is set.
    pub fn contains(self, other: TestModeFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn bits(self) -> u8 {
        self.0
    }
}

impl BitOr for TestModeFlags {
    type Output = TestModeFlags;

    fn bitor(self, rhs: TestModeFlags) -> TestModeFlags {
        TestModeFlags(self.0 | rhs.0)
    }
}

impl fmt::Display for TestModeFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = Self::NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        if names.is_empty() {
            f.write_str("none")
        } else {
            f.write_str(&names.join("|"))
        }
    }
}

static ACTIVE_FLAGS: AtomicU8 = AtomicU8::new(TestMode::DEFAULT_FLAGS.0);

/// Flags of the most recently started runner.
pub fn mode_flags() -> TestModeFlags {
    TestModeFlags(ACTIVE_FLAGS.load(Ordering::Acquire))
}

pub(crate) fn publish_flags(flags: TestModeFlags) {
    ACTIVE_FLAGS.store(flags.0, Ordering::Release);
}

// =============================================================================
// TEST MODE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    Quiet,
    #[default]
    Normal,
    Verbose,
}

/// Settings for one run.
#[derive(Debug, Clone)]
pub struct TestMode {
    pub perf: bool,
    /// Thorough (slow) tests; the opposite is quick mode.
    pub thorough: bool,
    pub undefined: bool,
    pub verbosity: Verbosity,
    pub list_only: bool,
    pub fail_fast: bool,
    /// When non-empty, only cases under one of these prefixes run.
    pub include: Vec<TestPath>,
    /// Cases under any of these prefixes are skipped.
    pub exclude: Vec<TestPath>,
    pub use_colors: bool,
}

impl Default for TestMode {
    fn default() -> Self {
        Self {
            perf: false,
            thorough: false,
            undefined: true,
            verbosity: Verbosity::Normal,
            list_only: false,
            fail_fast: false,
            include: Vec::new(),
            exclude: Vec::new(),
            use_colors: atty::is(atty::Stream::Stdout),
        }
    }
}

impl TestMode {
    const DEFAULT_FLAGS: TestModeFlags = TestModeFlags(TestModeFlags::QUICK.0 | TestModeFlags::UNDEFINED.0);

    pub fn flags(&self) -> TestModeFlags {
        let mut flags = if self.thorough {
            TestModeFlags::SLOW
        } else {
            TestModeFlags::QUICK
        };
        if self.perf {
            flags = flags | TestModeFlags::PERF;
        }
        if self.undefined {
            flags = flags | TestModeFlags::UNDEFINED;
        }
        match self.verbosity {
            Verbosity::Quiet => flags = flags | TestModeFlags::QUIET,
            Verbosity::Verbose => flags = flags | TestModeFlags::VERBOSE,
            Verbosity::Normal => {}
        }
        flags
    }

    /// True if the selection filters keep a case at `path` from running.
    pub fn excluded(&self, path: &TestPath) -> bool {
        let allowed = self.include.is_empty() || self.include.iter().any(|p| path.has_prefix(p));
        !allowed || self.exclude.iter().any(|p| path.has_prefix(p))
    }
}

// =============================================================================
// DEBUG FLAGS
// =============================================================================

/// Process-level debugging switches read from `TAPLINE_DEBUG`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DebugFlags {
    /// A failed assertion aborts the process instead of failing the test.
    pub fatal_asserts: bool,
    /// A bail-out caused by a warning aborts instead of exiting.
    pub fatal_warnings: bool,
    /// A bail-out caused by a critical aborts instead of exiting.
    pub fatal_criticals: bool,
}

impl DebugFlags {
    /// Parses a `,`, `:` or space separated list. Unknown names are ignored.
    pub fn parse(list: &str) -> Self {
        let mut flags = DebugFlags::default();
        for name in list.split([',', ':', ' ']).map(str::trim) {
            match name {
                "fatal-asserts" => flags.fatal_asserts = true,
                "fatal-warnings" => flags.fatal_warnings = true,
                "fatal-criticals" => flags.fatal_criticals = true,
                "all" => {
                    flags = DebugFlags {
                        fatal_asserts: true,
                        fatal_warnings: true,
                        fatal_criticals: true,
                    }
                }
                _ => {}
            }
        }
        flags
    }

    pub fn from_env() -> Self {
        std::env::var(DEBUG_ENV)
            .map(|value| Self::parse(&value))
            .unwrap_or_default()
    }
}

static DEBUG_FLAGS: Lazy<DebugFlags> = Lazy::new(DebugFlags::from_env);

pub fn debug_flags() -> DebugFlags {
    *DEBUG_FLAGS
}
