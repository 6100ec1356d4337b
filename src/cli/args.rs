//! Command-line arguments accepted by every tapline test program.
//!
//! Path arguments are parsed into [`TestPath`]s by clap, so a malformed
//! `-p`/`-s` value is a usage error rather than a silent mismatch.

use clap::{Parser, ValueEnum};

use crate::path::TestPath;

/// The arguments of a test program.
#[derive(Debug, Parser)]
#[command(
    name = "tapline",
    version,
    about = "Runs a tapline test suite and reports the results as TAP."
)]
pub struct TaplineArgs {
    /// Only run tests at or below this path. May be repeated.
    #[arg(short = 'p', long = "path", value_name = "PATH")]
    pub include: Vec<TestPath>,

    /// Skip tests at or below this path. May be repeated.
    #[arg(short = 's', long = "skip", value_name = "PATH")]
    pub exclude: Vec<TestPath>,

    /// Enable or disable classes of tests. May be repeated; later values win.
    #[arg(short = 'm', long = "mode", value_enum, value_name = "MODE")]
    pub modes: Vec<ModeArg>,

    /// Print info and debug diagnostics, and suppressed messages.
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Hide message-level diagnostics.
    #[arg(short, long)]
    pub quiet: bool,

    /// List test paths instead of running them.
    #[arg(short, long)]
    pub list: bool,

    /// Stop with a bail-out after the first failing test.
    #[arg(long)]
    pub fail_fast: bool,

    /// When to color diagnostics.
    #[arg(long, value_enum, default_value_t = ColorArg::Auto)]
    pub color: ColorArg,
}

/// A `-m` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Run performance tests.
    Perf,
    /// Run slow, thorough tests.
    Slow,
    /// Same as `slow`.
    Thorough,
    /// Skip slow tests (the default).
    Quick,
    /// Run tests that exercise undefined behaviour (the default).
    Undefined,
    /// Skip tests that exercise undefined behaviour.
    NoUndefined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorArg {
    Auto,
    Always,
    Never,
}
