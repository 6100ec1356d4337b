//! Command-line handling for test programs.
//!
//! Test binaries call [`crate::run`], which parses `std::env::args` through
//! [`parse_mode`]. [`mode_from_args`] is the fallible form used when the
//! arguments come from elsewhere.

use clap::Parser;

use crate::cli::args::{ColorArg, ModeArg, TaplineArgs};
use crate::config::{TestMode, Verbosity};

pub mod args;

/// Parses the process arguments, exiting with usage on error.
pub fn parse_mode() -> TestMode {
    TaplineArgs::parse().into()
}

/// Parses `args`, the first item being the program name.
pub fn mode_from_args<I, T>(args: I) -> Result<TestMode, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    TaplineArgs::try_parse_from(args).map(Into::into)
}

impl From<TaplineArgs> for TestMode {
    fn from(args: TaplineArgs) -> Self {
        let mut mode = TestMode {
            list_only: args.list,
            fail_fast: args.fail_fast,
            include: args.include,
            exclude: args.exclude,
            ..TestMode::default()
        };

        for flag in args.modes {
            match flag {
                ModeArg::Perf => mode.perf = true,
                ModeArg::Slow | ModeArg::Thorough => mode.thorough = true,
                ModeArg::Quick => mode.thorough = false,
                ModeArg::Undefined => mode.undefined = true,
                ModeArg::NoUndefined => mode.undefined = false,
            }
        }

        mode.verbosity = if args.verbose {
            Verbosity::Verbose
        } else if args.quiet {
            Verbosity::Quiet
        } else {
            Verbosity::Normal
        };

        match args.color {
            ColorArg::Always => mode.use_colors = true,
            ColorArg::Never => mode.use_colors = false,
            ColorArg::Auto => {}
        }
        mode
    }
}
