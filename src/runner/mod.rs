//! The execution scheduler.
//!
//! [`Runner::run_suite`] prints the plan, then resolves every leaf of the
//! tree in declaration order. Resolving a case first resolves its
//! dependencies (which may therefore run, and be reported, earlier than
//! their position in the tree), then either propagates a failed
//! prerequisite, applies the selection filters, or runs the body under
//! [`abort::execute`] with the case's expectation and fail-if-logged hooks
//! installed. Every case resolves exactly once; later lookups return the
//! stored result.

use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::abort::{self, contract_violation};
use crate::cli;
use crate::config::{self, TestMode};
use crate::expect::{ExpectationHook, FailIfLoggedHook};
use crate::log::hooks::{self, Console};
use crate::log::{self as diagnostics, ENGINE_DOMAIN};
use crate::path::TestPath;
use crate::report::{OutputSink, StdoutSink, TapReporter};
use crate::tree::{CaseBody, ObjectId, ObjectKind, ResultKind, TestResult, TestTree};

pub mod complex;

// =============================================================================
// SUMMARY
// =============================================================================

/// What a run produced, in report order.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub passed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub results: Vec<(TestPath, TestResult)>,
    /// Set when the run stopped early with a `Bail out!` line.
    pub bail_out: Option<String>,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.passed + self.skipped + self.failed
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Result reported for `path`, if any.
    pub fn result_for(&self, path: &str) -> Option<&TestResult> {
        self.results
            .iter()
            .find(|(p, _)| p.as_str() == path)
            .map(|(_, r)| r)
    }

    /// 0 if nothing failed, 1 if something failed, 99 after a bail-out.
    pub fn exit_code(&self) -> i32 {
        if self.bail_out.is_some() {
            99
        } else if self.has_failures() {
            1
        } else {
            0
        }
    }
}

// =============================================================================
// RUNNER
// =============================================================================

/// Runs one tree and reports it as TAP.
///
/// Entry point for embedding the engine: each `Runner` reports one tree
/// with its own numbering, and several may run one after another in the
/// same process. Runners share the hook chain and console, so they must not
/// run concurrently. Test programs use [`run`] instead, which allows a
/// single run per process.
pub struct Runner {
    mode: TestMode,
    reporter: TapReporter,
    summary: RunSummary,
    resolving: Vec<ObjectId>,
}

impl Runner {
    /// Creates a runner writing to `sink`. This also routes printed
    /// diagnostics to `sink` and publishes the mode flags used by the skip
    /// helpers.
    pub fn new(mode: TestMode, sink: Arc<dyn OutputSink>) -> Self {
        diagnostics::init();
        hooks::configure(Console {
            sink: Arc::clone(&sink),
            use_colors: mode.use_colors,
            verbosity: mode.verbosity,
        });
        config::publish_flags(mode.flags());

        let reporter = TapReporter::new(sink);
        Self {
            mode,
            reporter,
            summary: RunSummary::default(),
            resolving: Vec::new(),
        }
    }

    /// Runs every case under `root`. The tree is consumed. Not subject to
    /// the once-per-process guard of [`run`].
    pub fn run_suite(mut self, mut tree: TestTree, root: ObjectId) -> RunSummary {
        let leaves = tree.collect_leaves(root);

        if self.mode.list_only {
            for leaf in &leaves {
                self.list(&tree, *leaf);
            }
            return self.summary;
        }

        let plan = leaves.iter().map(|leaf| tree.leaf_count(*leaf)).sum();
        self.reporter.plan(plan);

        for leaf in leaves {
            if self.summary.bail_out.is_some() {
                break;
            }
            self.resolve(&mut tree, leaf);
        }
        self.summary
    }

    fn list(&self, tree: &TestTree, leaf: ObjectId) {
        let path = tree.path(leaf);
        let tags = tree.subunit_tags(leaf);
        if tags.is_empty() {
            self.reporter.raw(path.as_str());
        } else {
            for tag in tags {
                self.reporter.raw(path.join(tag).as_str());
            }
        }
    }

    fn resolve(&mut self, tree: &mut TestTree, id: ObjectId) -> TestResult {
        if let Some(result) = tree.result(id) {
            return result.clone();
        }
        if self.resolving.contains(&id) {
            contract_violation(format!("circular dependency involving {}", tree.path(id)));
        }
        self.resolving.push(id);

        let parent = tree.parent(id);
        let mut blocked = None;
        for dependency in tree.dependencies(id).to_vec() {
            if tree.parent(dependency) != parent {
                contract_violation(format!(
                    "dependencies must be siblings: {} depends on {}",
                    tree.path(id),
                    tree.path(dependency)
                ));
            }

            let result = self.resolve_dependency(tree, dependency);
            if self.summary.bail_out.is_some() {
                self.resolving.pop();
                return result;
            }
            if blocked.is_none() && !result.is_pass() {
                blocked = Some(TestResult {
                    kind: result.kind,
                    message: Some(format!("prerequisite aborted: {}", tree.path(dependency))),
                });
            }
        }

        let path = tree.path(id).clone();
        let result = match blocked {
            Some(result) => {
                self.report_unrun(tree, id, &path, &result);
                result
            }
            None if self.mode.excluded(&path) => {
                let result = TestResult::skip("excluded by selection");
                self.report_unrun(tree, id, &path, &result);
                result
            }
            None => self.execute(tree, id, &path),
        };

        drop(tree.take_body(id));
        if let Some(teardown) = tree.take_teardown(id) {
            teardown();
        }
        tree.set_result(id, result.clone());
        self.resolving.pop();

        if result.is_fail() && self.mode.fail_fast {
            let message = format!("{path} failed");
            self.reporter.bail_out(&message);
            self.summary.bail_out = Some(message);
        }
        result
    }

    /// Resolves a case, or every leaf of a suite. A suite's outcome is its
    /// first non-`Pass` leaf result, or `Pass`.
    fn resolve_dependency(&mut self, tree: &mut TestTree, dependency: ObjectId) -> TestResult {
        if tree.kind(dependency) != ObjectKind::Suite {
            return self.resolve(tree, dependency);
        }

        let mut outcome = TestResult::pass();
        for leaf in tree.collect_leaves(dependency) {
            let result = self.resolve(tree, leaf);
            if self.summary.bail_out.is_some() {
                return result;
            }
            if outcome.is_pass() && !result.is_pass() {
                outcome = result;
            }
        }
        outcome
    }

    fn execute(&mut self, tree: &mut TestTree, id: ObjectId, path: &TestPath) -> TestResult {
        let Some(body) = tree.take_body(id) else {
            contract_violation(format!("body of {path} already consumed"));
        };
        let fail_hook = FailIfLoggedHook::new(tree.inherited_policies(id));
        let expect_hook = ExpectationHook::new(tree.expectations(id));

        tracing::debug!(target: ENGINE_DOMAIN, ">>> {}", path);
        let result = {
            let _fail_guard = hooks::install(fail_hook);
            let _expect_guard = hooks::install(expect_hook);
            match body {
                CaseBody::Simple(body) => {
                    let result = abort::execute(body);
                    self.record(path.clone(), &result);
                    result
                }
                CaseBody::Complex { tags, mut run } => {
                    complex::run_subunits(&tags, &mut *run, path, |p, r| self.record(p, r))
                }
            }
        };
        tracing::debug!(target: ENGINE_DOMAIN, "<<< {}", path);
        result
    }

    /// Reports a case that resolved without running, once per subunit for
    /// complex cases.
    fn report_unrun(&mut self, tree: &TestTree, id: ObjectId, path: &TestPath, result: &TestResult) {
        let tags = tree.subunit_tags(id);
        if tags.is_empty() {
            self.record(path.clone(), result);
        } else {
            for tag in tags {
                self.record(path.join(tag), result);
            }
        }
    }

    fn record(&mut self, path: TestPath, result: &TestResult) {
        self.reporter.result(&path, result);
        match result.kind {
            ResultKind::Pass => self.summary.passed += 1,
            ResultKind::Skip => self.summary.skipped += 1,
            ResultKind::Fail => self.summary.failed += 1,
        }
        self.summary.results.push((path, result.clone()));
    }
}

// =============================================================================
// PROCESS ENTRY POINTS
// =============================================================================

static HAS_RUN: AtomicBool = AtomicBool::new(false);

/// Runs `root` with settings from the command line and returns the process
/// exit status. May be called once per process.
pub fn run(tree: TestTree, root: ObjectId) -> i32 {
    run_with_mode(cli::parse_mode(), tree, root)
}

/// Like [`run`], with explicit settings, writing to stdout.
pub fn run_with_mode(mode: TestMode, tree: TestTree, root: ObjectId) -> i32 {
    if HAS_RUN.swap(true, Ordering::SeqCst) {
        contract_violation("a root suite can only be run once per process");
    }
    Runner::new(mode, Arc::new(StdoutSink))
        .run_suite(tree, root)
        .exit_code()
}

/// Runs `root` and exits the process with the resulting status.
pub fn main(tree: TestTree, root: ObjectId) -> ! {
    process::exit(run(tree, root))
}
