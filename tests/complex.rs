mod common;

use std::cell::RefCell;
use std::rc::Rc;

use common::{plain_mode, run_captured, serial};
use tapline::config::TestMode;
use tapline::runner::complex::Subunit;
use tapline::tree::ObjectKind;
use tapline::{check, skip, subunits, ResultKind, TestPath, TestResult, TestTree, TreeError};

subunits! {
    enum Stage {
        S1 => "s1",
        S2 => "s2",
        S3 => "s3",
    }
}

subunits! {
    enum BadTag {
        Spaced => "has space",
    }
}

subunits! {
    enum Twice {
        First => "same",
        Second => "same",
    }
}

#[derive(Clone, Copy)]
enum Nothing {}

impl Subunit for Nothing {
    fn all() -> &'static [Self] {
        &[]
    }

    fn name(&self) -> &'static str {
        match *self {}
    }
}

#[test]
fn failing_subunit_stops_the_rest() {
    let _guard = serial();
    let mut tree = TestTree::new();
    let root = tree.suite("suite").unwrap();
    let ran = Rc::new(RefCell::new(Vec::new()));
    let log = Rc::clone(&ran);
    let case = tree
        .add_complex_case(root, "staged", move |stage: Stage| {
            log.borrow_mut().push(stage.name());
            check!(stage != Stage::S2, "stage two broke");
        })
        .unwrap();
    assert_eq!(tree.kind(case), ObjectKind::ComplexCase);
    assert_eq!(tree.leaf_count(case), 3);

    let (summary, output) = run_captured(tree, root, plain_mode());

    assert_eq!(*ran.borrow(), vec!["s1", "s2"]);
    assert_eq!(
        output.lines(),
        vec![
            "1..3",
            "ok 1 /suite/staged/s1",
            "not ok 2 /suite/staged/s2 # FAIL stage two broke",
            "not ok 3 /suite/staged/s3 # FAIL previous subunit failed",
        ]
    );
    assert_eq!(summary.passed, 1);
    assert_eq!(summary.failed, 2);
}

#[test]
fn complex_case_result_feeds_dependents() {
    let _guard = serial();
    let mut tree = TestTree::new();
    let root = tree.suite("suite").unwrap();
    let staged = tree
        .add_complex_case(root, "staged", |stage: Stage| {
            if stage == Stage::S3 {
                check!(false);
            }
        })
        .unwrap();
    let after = tree.add_case(root, "after", || {}).unwrap();
    tree.add_dependency(after, staged).unwrap();

    let (summary, _) = run_captured(tree, root, plain_mode());

    assert_eq!(
        summary.result_for("/suite/after"),
        Some(&TestResult::fail("prerequisite aborted: /suite/staged"))
    );
}

#[test]
fn teardown_runs_once_after_the_last_subunit() {
    let _guard = serial();
    let mut tree = TestTree::new();
    let root = tree.suite("suite").unwrap();
    let events = Rc::new(RefCell::new(Vec::new()));
    let (body_log, teardown_log) = (Rc::clone(&events), Rc::clone(&events));
    tree.add_complex_case_with_teardown(
        root,
        "staged",
        move |stage: Stage| body_log.borrow_mut().push(stage.name()),
        move || teardown_log.borrow_mut().push("teardown"),
    )
    .unwrap();

    let (summary, _) = run_captured(tree, root, plain_mode());

    assert_eq!(*events.borrow(), vec!["s1", "s2", "s3", "teardown"]);
    assert_eq!(summary.passed, 3);
}

#[test]
fn teardown_runs_when_a_prerequisite_blocks_the_case() {
    let _guard = serial();
    let mut tree = TestTree::new();
    let root = tree.suite("suite").unwrap();
    let events = Rc::new(RefCell::new(Vec::new()));
    let (body_log, teardown_log) = (Rc::clone(&events), Rc::clone(&events));
    let first = tree.add_case(root, "first", || check!(false)).unwrap();
    let staged = tree
        .complex_case_with_teardown(
            "staged",
            move |stage: Stage| body_log.borrow_mut().push(stage.name()),
            move || teardown_log.borrow_mut().push("teardown"),
        )
        .unwrap();
    tree.attach(root, staged).unwrap();
    tree.add_dependency(staged, first).unwrap();

    let (summary, output) = run_captured(tree, root, plain_mode());

    assert_eq!(*events.borrow(), vec!["teardown"]);
    assert_eq!(summary.failed, 4);
    assert_eq!(
        output.lines()[2..],
        [
            "not ok 2 /suite/staged/s1 # FAIL prerequisite aborted: /suite/first",
            "not ok 3 /suite/staged/s2 # FAIL prerequisite aborted: /suite/first",
            "not ok 4 /suite/staged/s3 # FAIL prerequisite aborted: /suite/first",
        ]
    );
}

#[test]
fn all_skipped_subunits_skip_the_case() {
    let _guard = serial();
    let mut tree = TestTree::new();
    let root = tree.suite("suite").unwrap();
    let staged = tree
        .add_complex_case(root, "staged", |_: Stage| skip!("not ready"))
        .unwrap();
    let after = tree.add_case(root, "after", || {}).unwrap();
    tree.add_dependency(after, staged).unwrap();

    let (summary, _) = run_captured(tree, root, plain_mode());

    assert_eq!(summary.skipped, 4);
    assert_eq!(
        summary.result_for("/suite/after").map(|r| r.kind),
        Some(ResultKind::Skip)
    );
}

#[test]
fn selection_applies_to_the_whole_case() {
    let _guard = serial();
    let mut tree = TestTree::new();
    let root = tree.suite("suite").unwrap();
    tree.add_complex_case(root, "staged", |_: Stage| check!(false))
        .unwrap();

    // A subunit path cannot select a single subunit.
    let mode = TestMode {
        include: vec![TestPath::parse("/suite/staged/s1").unwrap()],
        ..plain_mode()
    };
    let (summary, output) = run_captured(tree, root, mode);

    assert_eq!(summary.skipped, 3);
    assert_eq!(
        output.lines()[1..],
        [
            "ok 1 /suite/staged/s1 # SKIP excluded by selection",
            "ok 2 /suite/staged/s2 # SKIP excluded by selection",
            "ok 3 /suite/staged/s3 # SKIP excluded by selection",
        ]
    );
}

#[test]
fn subunit_tags_are_validated_at_construction() {
    let mut tree = TestTree::new();
    assert!(matches!(
        tree.complex_case("bad", |_: BadTag| {}),
        Err(TreeError::InvalidName { name }) if name == "has space"
    ));
    assert!(matches!(
        tree.complex_case("twice", |_: Twice| {}),
        Err(TreeError::DuplicateName { .. })
    ));
    assert!(matches!(
        tree.complex_case("nothing", |_: Nothing| {}),
        Err(TreeError::NoSubunits { .. })
    ));
    assert!(matches!(
        tree.complex_case_with_teardown("bad", |_: BadTag| {}, || {}),
        Err(TreeError::InvalidName { .. })
    ));
}
