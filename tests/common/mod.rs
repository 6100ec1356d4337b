//! Shared helpers for the integration tests.
//!
//! The engine keeps process-wide state (execution context, hook chain,
//! console), so every test that runs a tree holds [`serial`] for its
//! duration.

#![allow(dead_code)]

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use lazy_static::lazy_static;
use parking_lot::{Mutex, MutexGuard};
use tapline::config::{TestMode, Verbosity};
use tapline::report::OutputBuffer;
use tapline::{ContractViolation, ObjectId, RunSummary, Runner, TestTree};

lazy_static! {
    static ref ENGINE: Mutex<()> = Mutex::new(());
}

pub fn serial() -> MutexGuard<'static, ()> {
    ENGINE.lock()
}

/// Default settings without colors, so output can be compared verbatim.
pub fn plain_mode() -> TestMode {
    TestMode {
        use_colors: false,
        ..TestMode::default()
    }
}

pub fn mode_with(verbosity: Verbosity) -> TestMode {
    TestMode {
        verbosity,
        ..plain_mode()
    }
}

/// Runs `root` and captures everything the run printed.
pub fn run_captured(tree: TestTree, root: ObjectId, mode: TestMode) -> (RunSummary, OutputBuffer) {
    let output = OutputBuffer::new();
    let summary = Runner::new(mode, Arc::new(output.clone())).run_suite(tree, root);
    (summary, output)
}

/// Calls `f`, which must end in a contract violation, and returns it.
pub fn expect_contract_violation<F, R>(f: F) -> ContractViolation
where
    F: FnOnce() -> R,
{
    let payload = match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(_) => panic!("expected a contract violation"),
        Err(payload) => payload,
    };
    match payload.downcast::<ContractViolation>() {
        Ok(violation) => *violation,
        Err(other) => panic!(
            "expected a contract violation, got: {}",
            tapline::abort::panic_message(&other)
        ),
    }
}
