//! Non-local abort of the running test.
//!
//! A test body runs inside [`execute`], which installs the process-wide
//! execution context and a single `catch_unwind` boundary around the body.
//! Anything that needs to end the test early ([`raise`] from the assertion
//! and skip primitives, or the hook chain deciding a diagnostic is fatal)
//! records the outcome in the context and unwinds with an [`AbortSignal`]
//! payload. Ordinary stack unwinding runs every destructor between the raise
//! site and the boundary, including frames that belong to logging code the
//! engine does not own.
//!
//! `resume_unwind` is used instead of `panic!` so the panic hook does not
//! print a backtrace for what is a normal test outcome.
//!
//! Only one context may be active at a time. Entering a second one, or
//! touching the context when none is active, is a [`ContractViolation`] and
//! ends the process.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, ThreadId};

use lazy_static::lazy_static;
use parking_lot::Mutex;

use crate::errors::ContractViolation;
use crate::tree::TestResult;

#[cfg(panic = "abort")]
compile_error!("tapline aborts tests by unwinding and requires panic = \"unwind\"");

// =============================================================================
// EXECUTION CONTEXT
// =============================================================================

/// Panic payload that carries a test abort to the enclosing [`execute`].
/// The outcome itself lives in the execution context.
#[derive(Debug)]
pub struct AbortSignal;

struct ActiveContext {
    runner: ThreadId,
    pending: Option<TestResult>,
}

lazy_static! {
    static ref CONTEXT: Mutex<Option<ActiveContext>> = Mutex::new(None);
}

/// Reports a programmer error in how the engine is driven and unwinds with a
/// [`ContractViolation`] payload. Never recovered by [`execute`].
#[track_caller]
pub fn contract_violation(message: impl Into<String>) -> ! {
    let message = message.into();
    eprintln!("**\nERROR: contract violation: {message}");
    panic::panic_any(ContractViolation { message })
}

/// True while a test body is executing.
pub fn is_active() -> bool {
    CONTEXT.lock().is_some()
}

fn enter() {
    let mut context = CONTEXT.lock();
    if context.is_some() {
        drop(context);
        contract_violation("an execution context is already active");
    }
    *context = Some(ActiveContext {
        runner: thread::current().id(),
        pending: None,
    });
}

fn leave() -> Option<TestResult> {
    CONTEXT.lock().take().and_then(|context| context.pending)
}

/// Records `result` as the pending outcome of the active test. The first
/// recorded outcome wins. Returns whether the caller is on the thread that
/// runs the body, or `None` if no test is active.
fn record(result: TestResult) -> Option<bool> {
    let mut context = CONTEXT.lock();
    let active = context.as_mut()?;
    if active.pending.is_none() {
        active.pending = Some(result);
    }
    Some(active.runner == thread::current().id())
}

// =============================================================================
// RAISING AND CATCHING
// =============================================================================

/// Runs `body` as the current test and returns its outcome.
///
/// - a normal return yields `Pass`, unless an outcome was recorded from
///   another thread in the meantime;
/// - an abort yields the recorded `Skip` or `Fail`;
/// - any other panic yields `Fail` with the panic message;
/// - a [`ContractViolation`] is re-raised after the context is cleared.
pub fn execute<F: FnOnce()>(body: F) -> TestResult {
    enter();
    let caught = panic::catch_unwind(AssertUnwindSafe(body));
    let pending = leave();

    match caught {
        Ok(()) => pending.unwrap_or_else(TestResult::pass),
        Err(payload) if payload.is::<ContractViolation>() => panic::resume_unwind(payload),
        Err(payload) if payload.is::<AbortSignal>() => {
            pending.unwrap_or_else(|| TestResult::fail("aborted without an outcome"))
        }
        Err(payload) => pending
            .unwrap_or_else(|| TestResult::fail(format!("panicked: {}", panic_message(&payload)))),
    }
}

/// Ends the current test with `result` and never returns.
///
/// Calling it from a destructor while the thread is already unwinding aborts
/// the process, like any nested panic.
pub fn raise(result: TestResult) -> ! {
    if record(result).is_none() {
        contract_violation("test aborted outside of an execution context");
    }
    panic::resume_unwind(Box::new(AbortSignal))
}

/// Requests an abort on behalf of the hook chain.
///
/// On the thread running the body this unwinds like [`raise`]. On any other
/// thread the outcome is recorded and the call returns, so the foreign
/// logging call can complete; the test resolves to the recorded outcome
/// when its body finishes. Returns `false` when no test is active.
pub(crate) fn request(result: TestResult) -> bool {
    match record(result) {
        None => false,
        Some(true) if !thread::panicking() => panic::resume_unwind(Box::new(AbortSignal)),
        Some(_) => true,
    }
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(violation) = payload.downcast_ref::<ContractViolation>() {
        violation.to_string()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::serial;
    use crate::tree::ResultKind;

    #[test]
    fn normal_return_passes() {
        let _guard = serial();
        assert_eq!(execute(|| {}), TestResult::pass());
        assert!(!is_active());
    }

    #[test]
    fn raise_skips_the_rest_of_the_body() {
        let _guard = serial();
        let mut reached = false;
        let result = execute(|| {
            raise(TestResult::skip("not today"));
            #[allow(unreachable_code)]
            {
                reached = true;
            }
        });
        assert!(!reached);
        assert_eq!(result, TestResult::skip("not today"));
    }

    #[test]
    fn foreign_panic_becomes_failure() {
        let _guard = serial();
        let result = execute(|| panic!("boom"));
        assert_eq!(result.kind, ResultKind::Fail);
        assert_eq!(result.message.as_deref(), Some("panicked: boom"));
        assert!(!is_active());
    }

    #[test]
    fn first_recorded_outcome_wins() {
        let _guard = serial();
        let result = execute(|| {
            assert!(record(TestResult::fail("first")).is_some());
            raise(TestResult::skip("second"));
        });
        assert_eq!(result, TestResult::fail("first"));
    }

    #[test]
    fn nested_execute_is_a_contract_violation() {
        let _guard = serial();
        let caught = panic::catch_unwind(|| execute(|| {
            execute(|| {});
        }));
        let payload = caught.unwrap_err();
        assert!(payload.is::<ContractViolation>());
        assert!(!is_active());
    }

    #[test]
    fn request_without_context_reports_inactive() {
        let _guard = serial();
        assert!(!request(TestResult::fail("nobody listening")));
    }
}
