//! Tapline error types.
//!
//! Two kinds of failure exist and they never mix:
//!
//! - [`TreeError`] and [`PathError`] are ordinary `Result` errors returned
//!   while a suite is being assembled. They carry `miette` diagnostics so a
//!   runner binary can render them with context.
//! - [`ContractViolation`] is the panic payload raised when the engine is
//!   driven incorrectly (popping a hook out of order, nesting execution
//!   contexts, circular dependencies, running twice). It passes through every
//!   catch boundary and ends the process.

use std::fmt;

use miette::Diagnostic;
use thiserror::Error;

pub use crate::path::PathError;

// ============================================================================
// TREE CONSTRUCTION ERRORS
// ============================================================================

/// Errors returned while building a test tree.
#[derive(Debug, Error, Diagnostic)]
pub enum TreeError {
    #[error("invalid test name `{name}`")]
    #[diagnostic(
        code(tapline::tree::invalid_name),
        help("names are single path elements: non-empty, without '/' or whitespace")
    )]
    InvalidName { name: String },

    #[error("`{child}` already has a parent")]
    #[diagnostic(
        code(tapline::tree::already_parented),
        help("a test object can be attached exactly once")
    )]
    AlreadyParented { child: String },

    #[error("`{suite}` already contains a child named `{name}`")]
    #[diagnostic(code(tapline::tree::duplicate_name))]
    DuplicateName { suite: String, name: String },

    #[error("`{name}` is not a suite")]
    #[diagnostic(code(tapline::tree::not_a_suite))]
    NotASuite { name: String },

    #[error("`{name}` is not a test case")]
    #[diagnostic(code(tapline::tree::not_a_case))]
    NotACase { name: String },

    #[error("attaching `{child}` to `{suite}` would create a cycle")]
    #[diagnostic(code(tapline::tree::cycle))]
    WouldCycle { suite: String, child: String },

    #[error("complex case `{name}` declares no subunits")]
    #[diagnostic(code(tapline::tree::no_subunits))]
    NoSubunits { name: String },

    #[error("invalid message pattern")]
    #[diagnostic(code(tapline::expect::pattern))]
    InvalidPattern(#[from] regex::Error),
}

// ============================================================================
// CONTRACT VIOLATIONS
// ============================================================================

/// Panic payload for programmer errors in how a suite drives the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractViolation {
    pub message: String,
}

impl fmt::Display for ContractViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "contract violation: {}", self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_errors_carry_codes() {
        let err = TreeError::DuplicateName {
            suite: "/root".into(),
            name: "a".into(),
        };
        assert_eq!(err.to_string(), "`/root` already contains a child named `a`");
        let code = err.code().map(|c| c.to_string());
        assert_eq!(code.as_deref(), Some("tapline::tree::duplicate_name"));
    }

    #[test]
    fn contract_violation_display() {
        let violation = ContractViolation {
            message: "hook popped out of order".into(),
        };
        assert_eq!(
            violation.to_string(),
            "contract violation: hook popped out of order"
        );
    }
}
