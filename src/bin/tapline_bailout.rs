// Test program whose only case logs a fatal diagnostic from its teardown,
// after the case has resolved, so the run bails out.
// Usage: TAPLINE_BAILOUT_LEVEL=error|critical|warning cargo run --bin tapline_bailout

use tapline::{check, Diagnostic, LogLevel, ObjectId, TestTree, TreeError};

fn release(level: &str) {
    match level {
        "warning" => tracing::warn!(target: "bailout", fatal = true, "cleanup failed"),
        "critical" => tapline::log::emit(Diagnostic::new("bailout", LogLevel::Critical, "cleanup failed").fatal()),
        _ => tracing::error!(target: "bailout", fatal = true, "cleanup failed"),
    }
}

fn build(level: String) -> Result<(TestTree, ObjectId), TreeError> {
    let mut tree = TestTree::new();
    let root = tree.suite("bail")?;
    let cleanup = tree.case_with_teardown("cleanup", || check!(true), move || release(&level))?;
    tree.attach(root, cleanup)?;
    tree.add_case(root, "after", || check!(true))?;
    Ok((tree, root))
}

fn main() {
    let level = std::env::var("TAPLINE_BAILOUT_LEVEL").unwrap_or_default();
    match build(level) {
        Ok((tree, root)) => tapline::runner::main(tree, root),
        Err(err) => {
            eprintln!("{:?}", miette::Report::new(err));
            std::process::exit(2);
        }
    }
}
