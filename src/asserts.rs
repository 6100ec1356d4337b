//! Assertion and skip primitives for test bodies.
//!
//! Every primitive either returns normally or ends the current test through
//! [`crate::abort::raise`]; the statements after a failed check never run.
//! The macros are exported at the crate root:
//!
//! ```rust,no_run
//! use tapline::{check, check_eq, skip_unless};
//!
//! fn body() {
//!     skip_unless!(std::env::var("HOME").is_ok());
//!     check!(1 + 1 == 2);
//!     check_eq!(2 * 2, 4, "arithmetic is broken");
//! }
//! ```
//!
//! With `TAPLINE_DEBUG=fatal-asserts` a failed check prints its message and
//! aborts the process instead, so a debugger stops at the failing frame.

use std::process;

use crate::abort::raise;
use crate::config::{debug_flags, mode_flags, TestModeFlags};
use crate::tree::TestResult;

// =============================================================================
// RUNTIME ENTRY POINTS
// =============================================================================

/// Fails the current test. Used by the `check*` macros.
#[doc(hidden)]
pub fn fail_at(file: &str, line: u32, message: String) -> ! {
    if debug_flags().fatal_asserts {
        eprintln!("**\nERROR:{file}:{line}: {message}");
        process::abort();
    }
    raise(TestResult::fail(message))
}

/// Skips the current test.
pub fn skip_with(message: impl Into<String>) -> ! {
    raise(TestResult::skip(message))
}

/// Skips unless every flag in `flags` is enabled for this run.
pub fn skip_if_not_flags(flags: TestModeFlags, message: Option<&str>) {
    if !mode_flags().contains(flags) {
        match message {
            Some(message) => skip_with(message),
            None => skip_with(format!("missing prerequisite flags: {flags}")),
        }
    }
}

pub fn skip_if_not_thorough() {
    skip_if_not_flags(TestModeFlags::THOROUGH, Some("thorough tests disabled"));
}

pub fn skip_if_not_perf() {
    skip_if_not_flags(TestModeFlags::PERF, Some("performance tests disabled"));
}

pub fn skip_if_not_undefined() {
    skip_if_not_flags(
        TestModeFlags::UNDEFINED,
        Some("tests invoking undefined behaviour are disabled"),
    );
}

// =============================================================================
// MACROS
// =============================================================================

/// Fails the test unless `cond` holds. The default message is
/// `assertion failed: <cond>`.
#[macro_export]
macro_rules! check {
    ($cond:expr $(,)?) => {
        if !$cond {
            $crate::asserts::fail_at(
                file!(),
                line!(),
                concat!("assertion failed: ", stringify!($cond)).to_string(),
            )
        }
    };
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            $crate::asserts::fail_at(file!(), line!(), format!($($arg)+))
        }
    };
}

#[macro_export]
macro_rules! check_true {
    ($cond:expr $(,)?) => {
        if !$cond {
            $crate::asserts::fail_at(
                file!(),
                line!(),
                concat!("should be true: ", stringify!($cond)).to_string(),
            )
        }
    };
}

#[macro_export]
macro_rules! check_false {
    ($cond:expr $(,)?) => {
        if $cond {
            $crate::asserts::fail_at(
                file!(),
                line!(),
                concat!("should be false: ", stringify!($cond)).to_string(),
            )
        }
    };
}

#[macro_export]
macro_rules! check_some {
    ($value:expr $(,)?) => {
        if $value.is_none() {
            $crate::asserts::fail_at(
                file!(),
                line!(),
                concat!("should be Some: ", stringify!($value)).to_string(),
            )
        }
    };
}

#[macro_export]
macro_rules! check_none {
    ($value:expr $(,)?) => {
        if $value.is_some() {
            $crate::asserts::fail_at(
                file!(),
                line!(),
                concat!("should be None: ", stringify!($value)).to_string(),
            )
        }
    };
}

/// Fails the test unless both sides compare equal.
#[macro_export]
macro_rules! check_eq {
    ($left:expr, $right:expr $(,)?) => {
        match (&$left, &$right) {
            (left, right) => {
                if !(*left == *right) {
                    $crate::asserts::fail_at(
                        file!(),
                        line!(),
                        format!(
                            "assertion failed: `{} == {}` (left: {:?}, right: {:?})",
                            stringify!($left),
                            stringify!($right),
                            left,
                            right
                        ),
                    )
                }
            }
        }
    };
    ($left:expr, $right:expr, $($arg:tt)+) => {
        match (&$left, &$right) {
            (left, right) => {
                if !(*left == *right) {
                    $crate::asserts::fail_at(file!(), line!(), format!($($arg)+))
                }
            }
        }
    };
}

#[macro_export]
macro_rules! check_not_reached {
    () => {
        $crate::asserts::fail_at(file!(), line!(), "code should not be reached".to_string())
    };
}

/// Fails the test unless `handle` saw exactly `expected` matches since it
/// was last read.
#[macro_export]
macro_rules! check_expected {
    ($handle:expr, $expected:expr $(,)?) => {{
        let seen = $handle.count();
        let expected: usize = $expected;
        if seen != expected {
            $crate::asserts::fail_at(
                file!(),
                line!(),
                format!("expected {} matching message(s), saw {}", expected, seen),
            )
        }
    }};
}

/// Skips the test. The default message names the call site.
#[macro_export]
macro_rules! skip {
    () => {
        $crate::asserts::skip_with(format!("check failed at {}:{}", file!(), line!()))
    };
    ($($arg:tt)+) => {
        $crate::asserts::skip_with(format!($($arg)+))
    };
}

/// Skips the test unless `cond` holds.
#[macro_export]
macro_rules! skip_unless {
    ($cond:expr $(,)?) => {
        if !$cond {
            $crate::asserts::skip_with(concat!("pre-test check failed: ", stringify!($cond)))
        }
    };
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            $crate::asserts::skip_with(format!($($arg)+))
        }
    };
}
