//! Tapline: a sequential test execution engine that reports in TAP.
//!
//! Build a [`TestTree`] of suites and cases, then hand it to [`run`]:
//!
//! ```rust,no_run
//! use tapline::{check, TestTree};
//!
//! let mut tree = TestTree::new();
//! let root = tree.suite("math").unwrap();
//! tree.add_case(root, "add", || check!(1 + 1 == 2)).unwrap();
//! std::process::exit(tapline::run(tree, root));
//! ```
//!
//! Diagnostics logged through `tracing` while a case runs are classified by
//! the [`log::hooks`] chain and can fail the case; see [`expect`].

pub use crate::errors::{ContractViolation, PathError, TreeError};
pub use crate::log::{Diagnostic, LevelMask, LogLevel};
pub use crate::path::TestPath;
pub use crate::runner::{run, run_with_mode, RunSummary, Runner};
pub use crate::tree::{ObjectId, ResultKind, TestResult, TestTree};

pub mod abort;
pub mod asserts;
pub mod cli;
pub mod config;
pub mod errors;
pub mod expect;
pub mod log;
pub mod path;
pub mod report;
pub mod runner;
pub mod tree;

#[cfg(test)]
pub(crate) mod test_support {
    use lazy_static::lazy_static;
    use parking_lot::{Mutex, MutexGuard};

    lazy_static! {
        static ref ENGINE_LOCK: Mutex<()> = Mutex::new(());
    }

    /// Serializes unit tests that touch the execution context or hook chain.
    pub fn serial() -> MutexGuard<'static, ()> {
        ENGINE_LOCK.lock()
    }
}
