//! Per-test message expectations and fail-if-logged policies.
//!
//! While a case runs, two hooks sit on top of the chain. The expectation
//! hook is pushed last and therefore sees every diagnostic first: a
//! diagnostic matching one of the case's expectations is counted and
//! suppressed, whatever any fail-if-logged policy says. Anything it lets
//! through reaches the fail-if-logged hook, which fails the test on an
//! unexpected warning or critical, or on any diagnostic a policy of the case
//! or one of its ancestors names.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use regex::Regex;

use crate::log::{Diagnostic, HookAction, LevelMask, LogHook, LogLevel};

// =============================================================================
// EXPECTATIONS
// =============================================================================

/// An expected diagnostic: domain, levels, text pattern and a match counter.
#[derive(Debug)]
pub struct Expectation {
    domain: String,
    levels: LevelMask,
    pattern: Regex,
    matched: AtomicUsize,
}

impl Expectation {
    pub fn new(domain: &str, levels: LevelMask, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            domain: domain.to_string(),
            levels,
            pattern: Regex::new(pattern)?,
            matched: AtomicUsize::new(0),
        })
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn matches(&self, diagnostic: &Diagnostic) -> bool {
        diagnostic.domain == self.domain
            && self.levels.contains(diagnostic.level)
            && self.pattern.is_match(&diagnostic.text)
    }

    fn record(&self) {
        self.matched.fetch_add(1, Ordering::SeqCst);
    }
}

/// Shared view of an [`Expectation`] registered on a case.
#[derive(Debug, Clone)]
pub struct ExpectHandle(Arc<Expectation>);

impl ExpectHandle {
    /// Creates an expectation that is not yet attached to a case. Attach it
    /// with [`crate::TestTree::add_expectation`]; the handle can be moved into
    /// the case body to check the count from inside the test.
    pub fn new(domain: &str, levels: LevelMask, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self(Arc::new(Expectation::new(domain, levels, pattern)?)))
    }

    pub(crate) fn expectation(&self) -> &Arc<Expectation> {
        &self.0
    }

    /// Matches seen since the last call; resets the counter to zero.
    pub fn count(&self) -> usize {
        self.0.matched.swap(0, Ordering::SeqCst)
    }

    /// Matches seen so far, without resetting.
    pub fn peek(&self) -> usize {
        self.0.matched.load(Ordering::SeqCst)
    }
}

// =============================================================================
// FAIL-IF-LOGGED
// =============================================================================

/// Turns matching diagnostics into test failures for an object and all of
/// its descendants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailIfLogged {
    domain: String,
    levels: LevelMask,
}

impl FailIfLogged {
    pub fn new(domain: &str, levels: LevelMask) -> Self {
        let levels = if levels.is_empty() {
            LevelMask::CRITICAL | LevelMask::WARNING
        } else {
            levels
        };
        Self {
            domain: domain.to_string(),
            levels,
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn levels(&self) -> LevelMask {
        self.levels
    }

    pub fn matches(&self, diagnostic: &Diagnostic) -> bool {
        diagnostic.domain == self.domain && self.levels.contains(diagnostic.level)
    }
}

// =============================================================================
// HOOKS
// =============================================================================

pub(crate) struct ExpectationHook {
    expectations: Vec<Arc<Expectation>>,
}

impl ExpectationHook {
    pub fn new(expectations: Vec<Arc<Expectation>>) -> Self {
        Self { expectations }
    }
}

impl LogHook for ExpectationHook {
    fn handle(&self, diagnostic: &Diagnostic) -> HookAction {
        match self.expectations.iter().find(|e| e.matches(diagnostic)) {
            Some(expectation) => {
                expectation.record();
                HookAction::Suppress
            }
            None => HookAction::Continue,
        }
    }
}

pub(crate) struct FailIfLoggedHook {
    policies: Vec<FailIfLogged>,
}

impl FailIfLoggedHook {
    /// `policies` are ordered innermost first.
    pub fn new(policies: Vec<FailIfLogged>) -> Self {
        Self { policies }
    }
}

impl LogHook for FailIfLoggedHook {
    fn handle(&self, diagnostic: &Diagnostic) -> HookAction {
        // Fatal diagnostics are escalated by the default hook.
        if diagnostic.fatal {
            return HookAction::Continue;
        }

        let unexpected = self.policies.iter().any(|p| p.matches(diagnostic))
            || matches!(diagnostic.level, LogLevel::Critical | LogLevel::Warning);
        if unexpected {
            HookAction::Abort(format!("Unexpected message: {}", diagnostic.format(false)))
        } else {
            HookAction::Continue
        }
    }
}
