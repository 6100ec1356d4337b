// Small test program exercising each outcome the engine can report.
// Usage: cargo run --bin tapline_demo -- [-v|-q] [-p PATH] [-s PATH] [-m MODE] [--fail-fast] [--list]

use std::cell::Cell;
use std::rc::Rc;

use tapline::expect::ExpectHandle;
use tapline::{asserts, check, check_expected, check_not_reached, check_some, subunits};
use tapline::{LevelMask, ObjectId, TestTree, TreeError};

subunits! {
    enum Phase {
        Setup => "setup",
        Exercise => "exercise",
        Verify => "verify",
    }
}

/// Stands in for library code that reports problems through `tracing`.
fn noisy_library(mount: &str) {
    tracing::warn!(target: "demo-lib", "disk {} low", mount);
}

fn lookup(key: &str) -> Option<u32> {
    (key == "answer").then_some(42)
}

fn build() -> Result<(TestTree, ObjectId), TreeError> {
    let mut tree = TestTree::new();
    let root = tree.suite("demo")?;

    tree.add_case(root, "assert", || {
        check!(true);
        check!(false);
    })?;

    tree.add_case(root, "not_reached", || check_not_reached!())?;

    tree.add_case(root, "some", || {
        let missing = lookup("question");
        check_some!(missing);
    })?;

    tree.add_case(root, "skip", || {
        asserts::skip_if_not_thorough();
        asserts::skip_if_not_perf();
    })?;

    let value = Rc::new(Cell::new(42));
    let seen = Rc::clone(&value);
    let teardown = tree.case_with_teardown(
        "teardown",
        move || check!(seen.get() == 42),
        move || tracing::info!(target: "demo", "teardown released {}", value.get()),
    )?;
    tree.attach(root, teardown)?;

    let disk_low = ExpectHandle::new("demo-lib", LevelMask::WARNING, "^disk .* low$")?;
    let handle = disk_low.clone();
    let expected = tree.add_case(root, "expected_warning", move || {
        noisy_library("/tmp");
        check_expected!(handle, 1);
    })?;
    tree.add_expectation(expected, &disk_low)?;

    tree.add_case(root, "unexpected_warning", || noisy_library("/var"))?;

    let first = tree.add_case(root, "first", || {
        tracing::info!(target: "demo", "running first");
        check_not_reached!();
    })?;
    let second = tree.add_case(root, "second", || check!(true))?;
    tree.add_dependency(second, first)?;

    tree.add_complex_case(root, "phases", |phase: Phase| match phase {
        Phase::Setup => check!(lookup("answer").is_some()),
        Phase::Exercise => check!(lookup("answer") == Some(41), "answer drifted"),
        Phase::Verify => {}
    })?;

    tree.add_case(root, "passes", || check!(1 + 1 == 2))?;

    Ok((tree, root))
}

fn main() {
    match build() {
        Ok((tree, root)) => tapline::runner::main(tree, root),
        Err(err) => {
            eprintln!("{:?}", miette::Report::new(err));
            std::process::exit(2);
        }
    }
}
