//! Hierarchical, validated identifiers for test units.
//!
//! A [`TestPath`] is a non-empty sequence of elements rendered as `/a/b/c`.
//! Elements are never empty and never contain `/` or whitespace. Parsing
//! reports the byte offset of the first offending character so the error can
//! be rendered with a `miette` label pointing at it.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use miette::{Diagnostic, SourceSpan};
use once_cell::sync::OnceCell;
use thiserror::Error;

use crate::abort::contract_violation;

// =============================================================================
// ERRORS
// =============================================================================

/// A path string that failed to parse.
#[derive(Debug, Clone, Error, Diagnostic, PartialEq, Eq)]
#[error("invalid test path: {reason}")]
#[diagnostic(
    code(tapline::path::invalid),
    help("test paths look like `/suite/case`: a leading '/', no empty elements, no whitespace")
)]
pub struct PathError {
    #[source_code]
    pub input: String,
    #[label("{reason}")]
    pub span: SourceSpan,
    pub reason: &'static str,
}

impl PathError {
    fn at(input: &str, offset: usize, reason: &'static str) -> Self {
        Self {
            input: input.to_string(),
            span: (offset, 1).into(),
            reason,
        }
    }

    /// Byte offset of the first invalid character.
    pub fn offset(&self) -> usize {
        self.span.offset()
    }
}

// =============================================================================
// TEST PATH
// =============================================================================

/// An ordered sequence of path elements with a cached string form.
#[derive(Debug, Clone, Default)]
pub struct TestPath {
    elements: Vec<String>,
    rendered: OnceCell<String>,
}

/// Returns true if `element` can appear between two `/` separators.
pub fn is_valid_element(element: &str) -> bool {
    !element.is_empty() && !element.chars().any(|c| c == '/' || c.is_whitespace())
}

fn require_element(element: &str) {
    if !is_valid_element(element) {
        contract_violation(format!("invalid path element `{element}`"));
    }
}

impl TestPath {
    /// An empty path. It renders as the empty string and is not a valid
    /// identifier until at least one element is added.
    pub fn new() -> Self {
        Self::default()
    }

    /// A single-element path.
    pub fn from_element(element: &str) -> Self {
        let mut path = Self::new();
        path.push(element);
        path
    }

    /// Parses `/a/b/c`.
    pub fn parse(input: &str) -> Result<Self, PathError> {
        if !input.starts_with('/') {
            return Err(PathError::at(input, 0, "path must start with '/'"));
        }

        let mut previous = '\0';
        for (offset, c) in input.char_indices() {
            if c.is_whitespace() {
                return Err(PathError::at(input, offset, "whitespace is not allowed"));
            }
            if c == '/' && previous == '/' {
                return Err(PathError::at(input, offset, "empty path element"));
            }
            previous = c;
        }

        if input.ends_with('/') {
            return Err(PathError::at(input, input.len() - 1, "trailing '/'"));
        }

        Ok(Self {
            elements: input[1..].split('/').map(str::to_string).collect(),
            rendered: OnceCell::new(),
        })
    }

    pub fn elements(&self) -> &[String] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// The last element, if any.
    pub fn name(&self) -> Option<&str> {
        self.elements.last().map(String::as_str)
    }

    /// Appends one element. An invalid element is a contract violation.
    pub fn push(&mut self, element: &str) {
        require_element(element);
        self.elements.push(element.to_string());
        self.rendered = OnceCell::new();
    }

    /// Prepends one element. An invalid element is a contract violation.
    pub fn prepend(&mut self, element: &str) {
        require_element(element);
        self.elements.insert(0, element.to_string());
        self.rendered = OnceCell::new();
    }

    pub fn append_path(&mut self, other: &TestPath) {
        self.elements.extend(other.elements.iter().cloned());
        self.rendered = OnceCell::new();
    }

    pub fn prepend_path(&mut self, other: &TestPath) {
        let mut elements = other.elements.clone();
        elements.append(&mut self.elements);
        self.elements = elements;
        self.rendered = OnceCell::new();
    }

    /// Returns a copy of this path with `element` appended.
    pub fn join(&self, element: &str) -> TestPath {
        let mut path = TestPath {
            elements: self.elements.clone(),
            rendered: OnceCell::new(),
        };
        path.push(element);
        path
    }

    /// Element-wise prefix test. Every path has itself as a prefix; `/a/b`
    /// is not a prefix of `/a/bc`.
    pub fn has_prefix(&self, prefix: &TestPath) -> bool {
        prefix.elements.len() <= self.elements.len()
            && prefix
                .elements
                .iter()
                .zip(&self.elements)
                .all(|(p, e)| p == e)
    }

    pub fn as_str(&self) -> &str {
        self.rendered.get_or_init(|| {
            let mut out = String::new();
            for element in &self.elements {
                out.push('/');
                out.push_str(element);
            }
            out
        })
    }
}

impl PartialEq for TestPath {
    fn eq(&self, other: &Self) -> bool {
        self.elements == other.elements
    }
}

impl Eq for TestPath {}

impl Hash for TestPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.elements.hash(state);
    }
}

impl fmt::Display for TestPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
