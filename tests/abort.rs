mod common;

use std::cell::RefCell;
use std::rc::Rc;

use common::{expect_contract_violation, plain_mode, run_captured, serial};
use tapline::abort::{self, execute, raise};
use tapline::{check_eq, skip_unless, ResultKind, TestResult, TestTree};

struct Trace {
    log: Rc<RefCell<Vec<&'static str>>>,
    name: &'static str,
}

impl Drop for Trace {
    fn drop(&mut self) {
        self.log.borrow_mut().push(self.name);
    }
}

fn deep_helper(depth: u32, log: &Rc<RefCell<Vec<&'static str>>>) {
    let _frame = Trace {
        log: Rc::clone(log),
        name: "frame",
    };
    if depth == 0 {
        check_eq!(depth, 1, "bottom of the stack");
    } else {
        deep_helper(depth - 1, log);
    }
}

#[test]
fn abort_unwinds_through_nested_frames_running_destructors() {
    let _guard = serial();
    let log = Rc::new(RefCell::new(Vec::new()));
    let inner = Rc::clone(&log);

    let result = execute(move || {
        let _outer = Trace {
            log: Rc::clone(&inner),
            name: "outer",
        };
        deep_helper(2, &inner);
        inner.borrow_mut().push("unreachable");
    });

    assert_eq!(result, TestResult::fail("bottom of the stack"));
    assert_eq!(*log.borrow(), vec!["frame", "frame", "frame", "outer"]);
    assert!(!abort::is_active());
}

#[test]
fn skip_inside_a_run_is_reported_with_its_message() {
    let _guard = serial();
    let mut tree = TestTree::new();
    let root = tree.suite("suite").unwrap();
    tree.add_case(root, "needs_network", || {
        skip_unless!(std::env::var("TAPLINE_NO_SUCH_VARIABLE").is_ok(), "network disabled")
    })
    .unwrap();

    let (summary, output) = run_captured(tree, root, plain_mode());

    assert_eq!(summary.skipped, 1);
    assert!(output
        .contents()
        .contains("ok 1 /suite/needs_network # SKIP network disabled"));
}

#[test]
fn ordinary_panics_fail_only_their_own_case() {
    let _guard = serial();
    let mut tree = TestTree::new();
    let root = tree.suite("suite").unwrap();
    tree.add_case(root, "panics", || {
        let port: u16 = "http".parse().unwrap();
        assert_ne!(port, 0);
    })
    .unwrap();
    tree.add_case(root, "fine", || {}).unwrap();

    let (summary, _) = run_captured(tree, root, plain_mode());

    let failed = summary.result_for("/suite/panics").unwrap();
    assert_eq!(failed.kind, ResultKind::Fail);
    assert!(failed
        .message
        .as_deref()
        .unwrap_or_default()
        .starts_with("panicked: called `Result::unwrap()` on an `Err` value"));
    assert_eq!(summary.result_for("/suite/fine"), Some(&TestResult::pass()));
}

#[test]
fn raise_without_a_running_test_is_a_contract_violation() {
    let _guard = serial();
    let violation = expect_contract_violation(|| raise(TestResult::skip("nowhere")));
    assert!(violation.message.contains("outside of an execution context"));
}

#[test]
fn contract_violations_escape_the_catch_boundary() {
    let _guard = serial();
    let violation = expect_contract_violation(|| {
        execute(|| {
            execute(|| {});
        })
    });
    assert_eq!(violation.message, "an execution context is already active");
    assert!(!abort::is_active());
}
