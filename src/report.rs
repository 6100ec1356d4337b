//! TAP output.
//!
//! Everything the engine prints goes through an [`OutputSink`]: the plan,
//! one result line per resolved case, `#`-prefixed diagnostic lines, and
//! the `Bail out!` line. [`StdoutSink`] is used by real runs and
//! [`OutputBuffer`] captures output for tests.

use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;
use termcolor::{Buffer, Color, ColorSpec, WriteColor};

use crate::path::TestPath;
use crate::tree::{ResultKind, TestResult};

// ============================================================================
// OUTPUT SINKS
// ============================================================================

/// Receives complete lines of output. Implementations must write each call
/// atomically with respect to other threads.
pub trait OutputSink: Send + Sync {
    fn emit(&self, text: &str);
}

/// Collects output into a shared string. Clones share the same buffer.
#[derive(Clone, Default)]
pub struct OutputBuffer {
    buffer: Arc<Mutex<String>>,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        self.buffer.lock().clone()
    }

    pub fn lines(&self) -> Vec<String> {
        self.buffer.lock().lines().map(str::to_string).collect()
    }
}

impl OutputSink for OutputBuffer {
    fn emit(&self, text: &str) {
        let mut buffer = self.buffer.lock();
        if !buffer.is_empty() {
            buffer.push('\n');
        }
        buffer.push_str(text);
    }
}

/// Writes to stdout.
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn emit(&self, text: &str) {
        println!("{}", text);
    }
}

// ============================================================================
// FORMATTING
// ============================================================================

/// Wraps `text` in ANSI color sequences.
pub fn paint(text: &str, color: Color, bold: bool) -> String {
    let mut buffer = Buffer::ansi();
    let _ = buffer.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(bold));
    let _ = buffer.write_all(text.as_bytes());
    let _ = buffer.reset();
    String::from_utf8_lossy(buffer.as_slice()).into_owned()
}

fn bold(text: &str) -> String {
    let mut buffer = Buffer::ansi();
    let _ = buffer.set_color(ColorSpec::new().set_bold(true));
    let _ = buffer.write_all(text.as_bytes());
    let _ = buffer.reset();
    String::from_utf8_lossy(buffer.as_slice()).into_owned()
}

pub fn format_plan(count: usize) -> String {
    if count == 0 {
        "1..0 # Skipped: no tests to run".to_string()
    } else {
        format!("1..{count}")
    }
}

/// `ok 3 /a/b`, `ok 4 /a/c # SKIP why`, `not ok 5 /a/d # FAIL why`.
pub fn format_result(number: usize, path: &TestPath, result: &TestResult) -> String {
    let status = match result.kind {
        ResultKind::Fail => "not ok",
        ResultKind::Pass | ResultKind::Skip => "ok",
    };
    let mut line = format!("{status} {number} {path}");

    if result.kind == ResultKind::Pass && result.message.is_none() {
        return line;
    }

    line.push_str(" # ");
    line.push_str(match result.kind {
        ResultKind::Pass => "PASS",
        ResultKind::Skip => "SKIP",
        ResultKind::Fail => "FAIL",
    });
    if let Some(message) = &result.message {
        let message = message.strip_suffix('\n').unwrap_or(message);
        line.push(' ');
        line.push_str(&message.replace('\n', "\n#   "));
    }
    line
}

/// Prefixes every line of `text` with `# `, indenting continuation lines.
pub fn format_diagnostic(text: &str, colors: bool) -> String {
    let hash = if colors { bold("#") } else { "#".to_string() };
    let text = text.strip_suffix('\n').unwrap_or(text);
    let mut out = String::new();
    for (index, line) in text.split('\n').enumerate() {
        if index == 0 {
            out.push_str(&format!("{hash} {line}"));
        } else {
            out.push_str(&format!("\n{hash}   {line}"));
        }
    }
    out
}

pub fn format_bail_out(message: Option<&str>) -> String {
    match message {
        Some(message) => format!("Bail out! {message}"),
        None => "Bail out!".to_string(),
    }
}

// ============================================================================
// REPORTER
// ============================================================================

/// Numbers and prints result lines for one run.
pub struct TapReporter {
    sink: Arc<dyn OutputSink>,
    reported: usize,
}

impl TapReporter {
    pub fn new(sink: Arc<dyn OutputSink>) -> Self {
        Self {
            sink,
            reported: 0,
        }
    }

    pub fn plan(&self, count: usize) {
        self.sink.emit(&format_plan(count));
    }

    pub fn result(&mut self, path: &TestPath, result: &TestResult) {
        self.reported += 1;
        self.sink.emit(&format_result(self.reported, path, result));
    }

    pub fn bail_out(&self, message: &str) {
        self.sink.emit(&format_bail_out(Some(message)));
    }

    /// Writes `text` without any TAP decoration (list mode).
    pub fn raw(&self, text: &str) {
        self.sink.emit(text);
    }

    pub fn reported(&self) -> usize {
        self.reported
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> TestPath {
        TestPath::parse(s).unwrap()
    }

    #[test]
    fn result_lines() {
        assert_eq!(format_result(1, &path("/a"), &TestResult::pass()), "ok 1 /a");
        assert_eq!(
            format_result(2, &path("/a/b"), &TestResult::skip("later")),
            "ok 2 /a/b # SKIP later"
        );
        assert_eq!(
            format_result(3, &path("/a/c"), &TestResult::fail("boom")),
            "not ok 3 /a/c # FAIL boom"
        );
        assert_eq!(
            format_result(4, &path("/a/d"), &TestResult::pass().with_message("noted")),
            "ok 4 /a/d # PASS noted"
        );
    }

    #[test]
    fn multi_line_messages_continue_as_comments() {
        assert_eq!(
            format_result(1, &path("/a"), &TestResult::fail("left: 1\nright: 2\n")),
            "not ok 1 /a # FAIL left: 1\n#   right: 2"
        );
    }

    #[test]
    fn plans() {
        assert_eq!(format_plan(0), "1..0 # Skipped: no tests to run");
        assert_eq!(format_plan(7), "1..7");
    }

    #[test]
    fn multi_line_diagnostics_are_indented() {
        assert_eq!(format_diagnostic("one\ntwo\n", false), "# one\n#   two");
        assert!(format_diagnostic("x", true).starts_with("\x1b["));
    }

    #[test]
    fn reporter_numbers_sequentially() {
        let buffer = OutputBuffer::new();
        let mut reporter = TapReporter::new(Arc::new(buffer.clone()));
        reporter.plan(2);
        reporter.result(&path("/a"), &TestResult::pass());
        reporter.result(&path("/b"), &TestResult::fail("no"));
        assert_eq!(buffer.lines(), vec!["1..2", "ok 1 /a", "not ok 2 /b # FAIL no"]);
        assert_eq!(reporter.reported(), 2);
    }
}
