//! Test case payloads and results.

use std::fmt;
use std::sync::Arc;

use crate::expect::Expectation;
use crate::tree::ObjectId;

// =============================================================================
// RESULTS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultKind {
    Pass,
    Skip,
    Fail,
}

impl fmt::Display for ResultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResultKind::Pass => "PASS",
            ResultKind::Skip => "SKIP",
            ResultKind::Fail => "FAIL",
        })
    }
}

/// Terminal outcome of a case or subunit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestResult {
    pub kind: ResultKind,
    pub message: Option<String>,
}

impl TestResult {
    pub fn pass() -> Self {
        Self {
            kind: ResultKind::Pass,
            message: None,
        }
    }

    pub fn skip(message: impl Into<String>) -> Self {
        Self {
            kind: ResultKind::Skip,
            message: Some(message.into()),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            kind: ResultKind::Fail,
            message: Some(message.into()),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn is_pass(&self) -> bool {
        self.kind == ResultKind::Pass
    }

    pub fn is_fail(&self) -> bool {
        self.kind == ResultKind::Fail
    }
}

// =============================================================================
// CASE DATA
// =============================================================================

pub(crate) type Teardown = Box<dyn FnOnce()>;

/// The code a case runs. Taken out of the tree when the case resolves, so a
/// body runs at most once.
pub(crate) enum CaseBody {
    Simple(Box<dyn FnOnce()>),
    Complex {
        tags: Vec<&'static str>,
        run: Box<dyn FnMut(usize)>,
    },
}

pub(crate) struct CaseData {
    pub body: Option<CaseBody>,
    pub teardown: Option<Teardown>,
    /// Subunit tags, kept after the body is taken so a skipped complex case
    /// can still report every subunit.
    pub tags: Vec<&'static str>,
    pub dependencies: Vec<ObjectId>,
    pub expectations: Vec<Arc<Expectation>>,
    pub result: Option<TestResult>,
}

impl CaseData {
    pub fn new(body: CaseBody, teardown: Option<Teardown>) -> Self {
        let tags = match &body {
            CaseBody::Simple(_) => Vec::new(),
            CaseBody::Complex { tags, .. } => tags.clone(),
        };
        Self {
            body: Some(body),
            teardown,
            tags,
            dependencies: Vec::new(),
            expectations: Vec::new(),
            result: None,
        }
    }

    pub fn is_complex(&self) -> bool {
        !self.tags.is_empty()
    }

    /// Leaves this case contributes to the plan.
    pub fn leaf_count(&self) -> usize {
        self.tags.len().max(1)
    }
}
