//! The test object tree.
//!
//! Suites and cases live in an arena owned by [`TestTree`] and are addressed
//! by [`ObjectId`]. A suite owns its children; the parent link of an object
//! is set exactly once, by [`TestTree::attach`], and never changes. Each
//! object caches its [`TestPath`]; attaching a subtree clears the cache of
//! every object in it, so paths are recomputed from the new root on the
//! next lookup.
//!
//! ```rust
//! use tapline::tree::TestTree;
//!
//! let mut tree = TestTree::new();
//! let root = tree.suite("suite").unwrap();
//! let a = tree.add_case(root, "a", || {}).unwrap();
//! assert_eq!(tree.path(a).as_str(), "/suite/a");
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use once_cell::unsync::OnceCell;

use crate::abort::contract_violation;
use crate::errors::TreeError;
use crate::expect::{ExpectHandle, Expectation, FailIfLogged};
use crate::log::{LevelMask, ENGINE_DOMAIN};
use crate::path::{is_valid_element, TestPath};
use crate::runner::complex::Subunit;

mod case;

pub(crate) use case::{CaseBody, CaseData, Teardown};
pub use case::{ResultKind, TestResult};

// =============================================================================
// NODES
// =============================================================================

/// Handle to an object in a [`TestTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Suite,
    Case,
    ComplexCase,
}

enum NodeKind {
    Suite { children: Vec<ObjectId> },
    Case(CaseData),
}

struct Node {
    name: String,
    parent: Option<ObjectId>,
    path: OnceCell<TestPath>,
    policies: Vec<FailIfLogged>,
    kind: NodeKind,
}

/// Arena of suites and cases.
#[derive(Default)]
pub struct TestTree {
    nodes: Vec<Node>,
}

impl TestTree {
    pub fn new() -> Self {
        Self::default()
    }

    fn node(&self, id: ObjectId) -> &Node {
        self.nodes
            .get(id.0)
            .unwrap_or_else(|| contract_violation(format!("unknown test object {id:?}")))
    }

    fn node_mut(&mut self, id: ObjectId) -> &mut Node {
        self.nodes
            .get_mut(id.0)
            .unwrap_or_else(|| contract_violation(format!("unknown test object {id:?}")))
    }

    fn insert(&mut self, name: &str, kind: NodeKind) -> Result<ObjectId, TreeError> {
        if !is_valid_element(name) {
            return Err(TreeError::InvalidName {
                name: name.to_string(),
            });
        }
        let id = ObjectId(self.nodes.len());
        self.nodes.push(Node {
            name: name.to_string(),
            parent: None,
            path: OnceCell::new(),
            policies: Vec::new(),
            kind,
        });
        Ok(id)
    }

    // =========================================================================
    // CONSTRUCTION
    // =========================================================================

    /// Creates a detached suite.
    pub fn suite(&mut self, name: &str) -> Result<ObjectId, TreeError> {
        self.insert(
            name,
            NodeKind::Suite {
                children: Vec::new(),
            },
        )
    }

    /// Creates a detached case.
    pub fn case<F>(&mut self, name: &str, body: F) -> Result<ObjectId, TreeError>
    where
        F: FnOnce() + 'static,
    {
        let data = CaseData::new(CaseBody::Simple(Box::new(body)), None);
        self.insert(name, NodeKind::Case(data))
    }

    /// Creates a detached case whose `teardown` runs once the case has
    /// resolved, whether or not the body ran.
    pub fn case_with_teardown<F, T>(
        &mut self,
        name: &str,
        body: F,
        teardown: T,
    ) -> Result<ObjectId, TreeError>
    where
        F: FnOnce() + 'static,
        T: FnOnce() + 'static,
    {
        let teardown: Teardown = Box::new(teardown);
        let data = CaseData::new(CaseBody::Simple(Box::new(body)), Some(teardown));
        self.insert(name, NodeKind::Case(data))
    }

    /// Creates a detached complex case running `body` once per subunit of
    /// `S`, in declaration order.
    pub fn complex_case<S, F>(&mut self, name: &str, body: F) -> Result<ObjectId, TreeError>
    where
        S: Subunit,
        F: FnMut(S) + 'static,
    {
        let data = CaseData::new(complex_body(name, body)?, None);
        self.insert(name, NodeKind::Case(data))
    }

    /// Like [`complex_case`](Self::complex_case); `teardown` runs once after
    /// the last subunit, or once the case resolves without running.
    pub fn complex_case_with_teardown<S, F, T>(
        &mut self,
        name: &str,
        body: F,
        teardown: T,
    ) -> Result<ObjectId, TreeError>
    where
        S: Subunit,
        F: FnMut(S) + 'static,
        T: FnOnce() + 'static,
    {
        let teardown: Teardown = Box::new(teardown);
        let data = CaseData::new(complex_body(name, body)?, Some(teardown));
        self.insert(name, NodeKind::Case(data))
    }

    /// Makes `suite` the parent of `child`.
    pub fn attach(&mut self, suite: ObjectId, child: ObjectId) -> Result<ObjectId, TreeError> {
        let child_node = self.node(child);
        if child_node.parent.is_some() {
            return Err(TreeError::AlreadyParented {
                child: child_node.name.clone(),
            });
        }

        let NodeKind::Suite { children } = &self.node(suite).kind else {
            return Err(TreeError::NotASuite {
                name: self.node(suite).name.clone(),
            });
        };

        let mut ancestor = Some(suite);
        while let Some(id) = ancestor {
            if id == child {
                return Err(TreeError::WouldCycle {
                    suite: self.node(suite).name.clone(),
                    child: self.node(child).name.clone(),
                });
            }
            ancestor = self.node(id).parent;
        }

        let name = &self.node(child).name;
        if children.iter().any(|sibling| &self.node(*sibling).name == name) {
            return Err(TreeError::DuplicateName {
                suite: self.path(suite).to_string(),
                name: name.clone(),
            });
        }

        if let NodeKind::Suite { children } = &mut self.node_mut(suite).kind {
            children.push(child);
        }
        self.node_mut(child).parent = Some(suite);
        self.invalidate_paths(child);
        Ok(child)
    }

    fn invalidate_paths(&mut self, id: ObjectId) {
        let node = self.node_mut(id);
        node.path = OnceCell::new();
        let children = match &node.kind {
            NodeKind::Suite { children } => children.clone(),
            NodeKind::Case(_) => return,
        };
        for child in children {
            self.invalidate_paths(child);
        }
    }

    pub fn add_suite(&mut self, parent: ObjectId, name: &str) -> Result<ObjectId, TreeError> {
        let id = self.suite(name)?;
        self.attach(parent, id)
    }

    pub fn add_case<F>(&mut self, parent: ObjectId, name: &str, body: F) -> Result<ObjectId, TreeError>
    where
        F: FnOnce() + 'static,
    {
        let id = self.case(name, body)?;
        self.attach(parent, id)
    }

    pub fn add_complex_case<S, F>(
        &mut self,
        parent: ObjectId,
        name: &str,
        body: F,
    ) -> Result<ObjectId, TreeError>
    where
        S: Subunit,
        F: FnMut(S) + 'static,
    {
        let id = self.complex_case::<S, F>(name, body)?;
        self.attach(parent, id)
    }

    pub fn add_complex_case_with_teardown<S, F, T>(
        &mut self,
        parent: ObjectId,
        name: &str,
        body: F,
        teardown: T,
    ) -> Result<ObjectId, TreeError>
    where
        S: Subunit,
        F: FnMut(S) + 'static,
        T: FnOnce() + 'static,
    {
        let id = self.complex_case_with_teardown::<S, F, T>(name, body, teardown)?;
        self.attach(parent, id)
    }

    /// Declares that `case` must not run unless `dependency` passed.
    /// `dependency` is a case or a suite; a suite passes when every case
    /// under it passed. Both must be siblings by the time the tree runs.
    pub fn add_dependency(&mut self, case: ObjectId, dependency: ObjectId) -> Result<(), TreeError> {
        self.case_mut(case)?.dependencies.push(dependency);
        Ok(())
    }

    /// Expects `case` to log a diagnostic from `domain`, at a level in
    /// `levels`, whose text matches the regular expression `pattern`.
    /// Matching diagnostics are counted and do not fail the test.
    pub fn expect_message(
        &mut self,
        case: ObjectId,
        domain: &str,
        levels: LevelMask,
        pattern: &str,
    ) -> Result<ExpectHandle, TreeError> {
        let handle = ExpectHandle::new(domain, levels, pattern)?;
        self.add_expectation(case, &handle)?;
        Ok(handle)
    }

    /// Attaches an expectation created with [`ExpectHandle::new`] to `case`.
    pub fn add_expectation(&mut self, case: ObjectId, handle: &ExpectHandle) -> Result<(), TreeError> {
        let expectation = handle.expectation();
        if expectation.domain() == ENGINE_DOMAIN {
            contract_violation(format!(
                "messages from the `{ENGINE_DOMAIN}` domain cannot be expected"
            ));
        }
        self.case_mut(case)?
            .expectations
            .push(Arc::clone(expectation));
        Ok(())
    }

    /// Fails any test at or below `object` that logs from `domain` at a level
    /// in `levels`. An empty mask means criticals and warnings.
    pub fn fail_if_logged(&mut self, object: ObjectId, domain: &str, levels: LevelMask) {
        self.node_mut(object)
            .policies
            .push(FailIfLogged::new(domain, levels));
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    pub fn name(&self, id: ObjectId) -> &str {
        &self.node(id).name
    }

    pub fn parent(&self, id: ObjectId) -> Option<ObjectId> {
        self.node(id).parent
    }

    pub fn children(&self, id: ObjectId) -> &[ObjectId] {
        match &self.node(id).kind {
            NodeKind::Suite { children } => children,
            NodeKind::Case(_) => &[],
        }
    }

    pub fn kind(&self, id: ObjectId) -> ObjectKind {
        match &self.node(id).kind {
            NodeKind::Suite { .. } => ObjectKind::Suite,
            NodeKind::Case(data) if data.is_complex() => ObjectKind::ComplexCase,
            NodeKind::Case(_) => ObjectKind::Case,
        }
    }

    /// The object's path, computed from the root and cached.
    pub fn path(&self, id: ObjectId) -> &TestPath {
        let node = self.node(id);
        node.path.get_or_init(|| match node.parent {
            Some(parent) => self.path(parent).join(&node.name),
            None => TestPath::from_element(&node.name),
        })
    }

    /// Cases under `root`, depth first in declaration order.
    pub fn collect_leaves(&self, root: ObjectId) -> Vec<ObjectId> {
        let mut leaves = Vec::new();
        self.collect_into(root, &mut leaves);
        leaves
    }

    fn collect_into(&self, id: ObjectId, leaves: &mut Vec<ObjectId>) {
        match &self.node(id).kind {
            NodeKind::Suite { children } => {
                for child in children {
                    self.collect_into(*child, leaves);
                }
            }
            NodeKind::Case(_) => leaves.push(id),
        }
    }

    /// Lines a case contributes to the plan: one, or one per subunit.
    pub fn leaf_count(&self, id: ObjectId) -> usize {
        match &self.node(id).kind {
            NodeKind::Suite { .. } => 0,
            NodeKind::Case(data) => data.leaf_count(),
        }
    }

    /// Subunit tags of a complex case; empty for anything else.
    pub fn subunit_tags(&self, id: ObjectId) -> &[&'static str] {
        match &self.node(id).kind {
            NodeKind::Case(data) => &data.tags,
            NodeKind::Suite { .. } => &[],
        }
    }

    pub fn dependencies(&self, id: ObjectId) -> &[ObjectId] {
        match &self.node(id).kind {
            NodeKind::Case(data) => &data.dependencies,
            NodeKind::Suite { .. } => &[],
        }
    }

    pub fn result(&self, id: ObjectId) -> Option<&TestResult> {
        match &self.node(id).kind {
            NodeKind::Case(data) => data.result.as_ref(),
            NodeKind::Suite { .. } => None,
        }
    }

    // =========================================================================
    // ENGINE ACCESS
    // =========================================================================

    fn case_mut(&mut self, id: ObjectId) -> Result<&mut CaseData, TreeError> {
        let node = self.node_mut(id);
        match &mut node.kind {
            NodeKind::Case(data) => Ok(data),
            NodeKind::Suite { .. } => Err(TreeError::NotACase {
                name: node.name.clone(),
            }),
        }
    }

    fn case_data_mut(&mut self, id: ObjectId) -> &mut CaseData {
        match self.case_mut(id) {
            Ok(data) => data,
            Err(err) => contract_violation(err.to_string()),
        }
    }

    /// Stores the terminal result. A case resolves once.
    pub(crate) fn set_result(&mut self, id: ObjectId, result: TestResult) {
        let data = self.case_data_mut(id);
        if data.result.is_some() {
            contract_violation("test result assigned twice");
        }
        data.result = Some(result);
    }

    pub(crate) fn take_body(&mut self, id: ObjectId) -> Option<CaseBody> {
        self.case_data_mut(id).body.take()
    }

    pub(crate) fn take_teardown(&mut self, id: ObjectId) -> Option<Teardown> {
        self.case_data_mut(id).teardown.take()
    }

    pub(crate) fn expectations(&mut self, id: ObjectId) -> Vec<Arc<Expectation>> {
        self.case_data_mut(id).expectations.clone()
    }

    /// Fail-if-logged policies that apply to `id`, innermost first.
    pub(crate) fn inherited_policies(&self, id: ObjectId) -> Vec<FailIfLogged> {
        let mut policies = Vec::new();
        let mut current = Some(id);
        while let Some(object) = current {
            let node = self.node(object);
            policies.extend(node.policies.iter().cloned());
            current = node.parent;
        }
        policies
    }
}

/// Checks the subunit tags of `S` and wraps `body` for the runner.
fn complex_body<S, F>(name: &str, mut body: F) -> Result<CaseBody, TreeError>
where
    S: Subunit,
    F: FnMut(S) + 'static,
{
    let units = S::all();
    if units.is_empty() {
        return Err(TreeError::NoSubunits {
            name: name.to_string(),
        });
    }

    let mut tags = Vec::with_capacity(units.len());
    let mut seen = HashSet::new();
    for unit in units {
        let tag = unit.name();
        if !is_valid_element(tag) {
            return Err(TreeError::InvalidName {
                name: tag.to_string(),
            });
        }
        if !seen.insert(tag) {
            return Err(TreeError::DuplicateName {
                suite: name.to_string(),
                name: tag.to_string(),
            });
        }
        tags.push(tag);
    }

    let run = Box::new(move |index: usize| body(units[index]));
    Ok(CaseBody::Complex { tags, run })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_with_suite() -> (TestTree, ObjectId) {
        let mut tree = TestTree::new();
        let root = tree.suite("suite").unwrap();
        (tree, root)
    }

    #[test]
    fn attach_sets_parent_once() {
        let (mut tree, root) = tree_with_suite();
        let other = tree.suite("other").unwrap();
        let a = tree.add_case(root, "a", || {}).unwrap();

        assert_eq!(tree.parent(a), Some(root));
        assert!(matches!(
            tree.attach(other, a),
            Err(TreeError::AlreadyParented { .. })
        ));
        assert_eq!(tree.children(other), &[] as &[ObjectId]);
    }

    #[test]
    fn sibling_names_are_unique() {
        let (mut tree, root) = tree_with_suite();
        tree.add_case(root, "a", || {}).unwrap();
        let err = tree.add_case(root, "a", || {}).unwrap_err();
        assert!(matches!(err, TreeError::DuplicateName { .. }));
        assert_eq!(tree.children(root).len(), 1);
    }

    #[test]
    fn only_suites_take_children() {
        let (mut tree, root) = tree_with_suite();
        let a = tree.add_case(root, "a", || {}).unwrap();
        let b = tree.case("b", || {}).unwrap();
        assert!(matches!(tree.attach(a, b), Err(TreeError::NotASuite { .. })));
    }

    #[test]
    fn cycles_are_rejected() {
        let mut tree = TestTree::new();
        let outer = tree.suite("outer").unwrap();
        let inner = tree.suite("inner").unwrap();
        tree.attach(outer, inner).unwrap();
        assert!(matches!(
            tree.attach(inner, outer),
            Err(TreeError::WouldCycle { .. })
        ));
        assert!(matches!(
            tree.attach(outer, outer),
            Err(TreeError::WouldCycle { .. })
        ));
    }

    #[test]
    fn invalid_names_are_rejected() {
        let mut tree = TestTree::new();
        assert!(matches!(tree.suite("a b"), Err(TreeError::InvalidName { .. })));
        assert!(matches!(tree.case("", || {}), Err(TreeError::InvalidName { .. })));
    }

    #[test]
    fn paths_follow_later_attachment() {
        let mut tree = TestTree::new();
        let inner = tree.suite("inner").unwrap();
        let case = tree.add_case(inner, "case", || {}).unwrap();
        assert_eq!(tree.path(case).as_str(), "/inner/case");

        let outer = tree.suite("outer").unwrap();
        tree.attach(outer, inner).unwrap();
        assert_eq!(tree.path(case).as_str(), "/outer/inner/case");
        assert!(tree.path(case).has_prefix(tree.path(inner)));
    }

    #[test]
    fn leaves_are_depth_first_in_declaration_order() {
        let (mut tree, root) = tree_with_suite();
        let a = tree.add_case(root, "a", || {}).unwrap();
        let nested = tree.add_suite(root, "nested").unwrap();
        let b = tree.add_case(nested, "b", || {}).unwrap();
        let c = tree.add_case(root, "c", || {}).unwrap();
        tree.add_suite(root, "empty").unwrap();

        assert_eq!(tree.collect_leaves(root), vec![a, b, c]);
        assert_eq!(tree.kind(nested), ObjectKind::Suite);
        assert_eq!(tree.kind(a), ObjectKind::Case);
    }

    #[test]
    fn policies_are_collected_innermost_first() {
        let (mut tree, root) = tree_with_suite();
        let nested = tree.add_suite(root, "nested").unwrap();
        let case = tree.add_case(nested, "case", || {}).unwrap();
        tree.fail_if_logged(root, "outer", LevelMask::MESSAGE);
        tree.fail_if_logged(nested, "inner", LevelMask::NONE);

        let domains: Vec<String> = tree
            .inherited_policies(case)
            .iter()
            .map(|p| p.domain().to_string())
            .collect();
        assert_eq!(domains, vec!["inner", "outer"]);
    }

    #[test]
    fn only_cases_declare_dependencies() {
        let (mut tree, root) = tree_with_suite();
        let a = tree.add_case(root, "a", || {}).unwrap();
        let nested = tree.add_suite(root, "nested").unwrap();
        assert!(matches!(
            tree.add_dependency(nested, a),
            Err(TreeError::NotACase { .. })
        ));
        assert!(tree.dependencies(nested).is_empty());
    }

    #[test]
    fn suites_can_be_dependencies() {
        let (mut tree, root) = tree_with_suite();
        let a = tree.add_case(root, "a", || {}).unwrap();
        let setup = tree.add_suite(root, "setup").unwrap();
        tree.add_dependency(a, setup).unwrap();
        assert_eq!(tree.dependencies(a), &[setup]);
    }

    #[test]
    fn invalid_expectation_pattern_is_an_error() {
        let (mut tree, root) = tree_with_suite();
        let a = tree.add_case(root, "a", || {}).unwrap();
        assert!(matches!(
            tree.expect_message(a, "x", LevelMask::ALL, "("),
            Err(TreeError::InvalidPattern(_))
        ));
    }
}
