//! The process-wide diagnostic hook chain.
//!
//! Hooks form a stack: the most recently pushed hook sees a diagnostic
//! first and either classifies it or returns [`HookAction::Continue`] to
//! defer to the next one. When every pushed hook defers, the built-in
//! [`DefaultHook`] decides by level.
//!
//! The stack lock is held only while taking a snapshot, never while a hook
//! runs, so hooks may log themselves and may unwind (abort a test) without
//! leaving the chain locked.

use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use lazy_static::lazy_static;
use parking_lot::{Mutex, RwLock};

use super::{Diagnostic, LogLevel, ENGINE_DOMAIN};
use crate::abort::{self, contract_violation};
use crate::config::{debug_flags, Verbosity};
use crate::report::{format_bail_out, format_diagnostic, OutputSink, StdoutSink};
use crate::tree::TestResult;

// =============================================================================
// HOOK TYPES
// =============================================================================

/// What a hook decided about a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookAction {
    /// Defer to the next hook down the stack.
    Continue,
    /// Drop silently.
    Ignore,
    /// Drop, printing a "Suppressed message" line in verbose mode.
    Suppress,
    /// Fail the running test with this message.
    Abort(String),
    /// Print a bail-out line and terminate the process.
    BailOut,
}

/// A diagnostic classifier installed on the hook chain.
pub trait LogHook: Send + Sync {
    fn handle(&self, diagnostic: &Diagnostic) -> HookAction;
}

impl<F> LogHook for F
where
    F: Fn(&Diagnostic) -> HookAction + Send + Sync,
{
    fn handle(&self, diagnostic: &Diagnostic) -> HookAction {
        self(diagnostic)
    }
}

/// Identifies one pushed hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(u64);

struct HookEntry {
    id: HookId,
    hook: Arc<dyn LogHook>,
}

/// Where printed diagnostics go and how chatty the default hook is.
#[derive(Clone)]
pub struct Console {
    pub sink: Arc<dyn OutputSink>,
    pub use_colors: bool,
    pub verbosity: Verbosity,
}

impl Default for Console {
    fn default() -> Self {
        Self {
            sink: Arc::new(StdoutSink),
            use_colors: atty::is(atty::Stream::Stdout),
            verbosity: Verbosity::Normal,
        }
    }
}

impl Console {
    fn print(&self, text: &str) {
        self.sink.emit(&format_diagnostic(text, self.use_colors));
    }
}

lazy_static! {
    static ref HOOKS: Mutex<Vec<HookEntry>> = Mutex::new(Vec::new());
    static ref CONSOLE: RwLock<Console> = RwLock::new(Console::default());
}

static NEXT_HOOK_ID: AtomicU64 = AtomicU64::new(1);

// =============================================================================
// STACK OPERATIONS
// =============================================================================

/// Pushes a hook on top of the chain.
pub fn push<H: LogHook + 'static>(hook: H) -> HookId {
    push_arc(Arc::new(hook))
}

pub fn push_arc(hook: Arc<dyn LogHook>) -> HookId {
    let id = HookId(NEXT_HOOK_ID.fetch_add(1, Ordering::Relaxed));
    HOOKS.lock().push(HookEntry { id, hook });
    id
}

/// Pops the top hook, which must be `id`.
pub fn pop(id: HookId) {
    let mut hooks = HOOKS.lock();
    match hooks.last() {
        Some(top) if top.id == id => {
            hooks.pop();
        }
        Some(_) => {
            drop(hooks);
            contract_violation("log hook popped out of order");
        }
        None => {
            drop(hooks);
            contract_violation("log hook popped with no hooks installed");
        }
    }
}

fn discard(id: HookId) {
    HOOKS.lock().retain(|entry| entry.id != id);
}

/// Number of hooks currently pushed, excluding the default hook.
pub fn depth() -> usize {
    HOOKS.lock().len()
}

/// Pushes `hook` and pops it again when the guard drops.
pub fn install<H: LogHook + 'static>(hook: H) -> HookGuard {
    HookGuard { id: push(hook) }
}

/// Pops its hook on drop. Dropped during unwinding it removes the hook
/// without the ordering check, since a contract violation there would abort.
#[must_use = "the hook is removed as soon as the guard is dropped"]
pub struct HookGuard {
    id: HookId,
}

impl HookGuard {
    pub fn id(&self) -> HookId {
        self.id
    }
}

impl Drop for HookGuard {
    fn drop(&mut self) {
        if thread::panicking() {
            discard(self.id);
        } else {
            pop(self.id);
        }
    }
}

// =============================================================================
// CONSOLE
// =============================================================================

/// Replaces the output settings used by the default hook and bail-outs.
pub fn configure(console: Console) {
    *CONSOLE.write() = console;
}

pub fn console() -> Console {
    CONSOLE.read().clone()
}

// =============================================================================
// DISPATCH
// =============================================================================

/// Lowest-precedence hook: prints by level and escalates fatal diagnostics.
pub struct DefaultHook;

impl DefaultHook {
    fn should_print(level: LogLevel, verbosity: Verbosity) -> bool {
        match level {
            LogLevel::Error | LogLevel::Critical | LogLevel::Warning => true,
            LogLevel::Message => verbosity != Verbosity::Quiet,
            LogLevel::Info | LogLevel::Debug => verbosity == Verbosity::Verbose,
        }
    }
}

impl LogHook for DefaultHook {
    fn handle(&self, diagnostic: &Diagnostic) -> HookAction {
        if diagnostic.fatal {
            return if abort::is_active() {
                HookAction::Abort(diagnostic.format(false))
            } else {
                HookAction::BailOut
            };
        }

        let console = console();
        if Self::should_print(diagnostic.level, console.verbosity) {
            console.print(&diagnostic.format(console.use_colors));
        }
        HookAction::Ignore
    }
}

/// Runs `diagnostic` through the chain and carries out the decision.
pub fn dispatch(diagnostic: &Diagnostic) {
    let snapshot: Vec<Arc<dyn LogHook>> = HOOKS
        .lock()
        .iter()
        .rev()
        .map(|entry| Arc::clone(&entry.hook))
        .collect();

    let mut action = HookAction::Continue;
    for hook in snapshot {
        action = hook.handle(diagnostic);
        if action != HookAction::Continue {
            break;
        }
    }
    if action == HookAction::Continue {
        action = DefaultHook.handle(diagnostic);
    }

    apply(diagnostic, action);
}

fn apply(diagnostic: &Diagnostic, action: HookAction) {
    match action {
        HookAction::Continue | HookAction::Ignore => {}
        HookAction::Suppress => {
            let console = console();
            if console.verbosity == Verbosity::Verbose {
                let note = Diagnostic::new(
                    ENGINE_DOMAIN,
                    LogLevel::Info,
                    format!("Suppressed message: {}", diagnostic.format(console.use_colors)),
                );
                console.print(&note.format(console.use_colors));
            }
        }
        HookAction::Abort(message) => {
            if !abort::request(TestResult::fail(message)) {
                bail_out(Some(diagnostic.level), &diagnostic.format(false));
            }
        }
        HookAction::BailOut => bail_out(Some(diagnostic.level), &diagnostic.format(false)),
    }
}

/// Prints `Bail out! <message>` and terminates with status 99, or aborts
/// when `TAPLINE_DEBUG` makes diagnostics of `level` fatal.
pub fn bail_out(level: Option<LogLevel>, message: &str) -> ! {
    console().sink.emit(&format_bail_out(Some(message)));

    let flags = debug_flags();
    let trap = match level {
        Some(LogLevel::Warning) => flags.fatal_warnings,
        Some(LogLevel::Critical) => flags.fatal_criticals,
        _ => false,
    };
    if trap {
        process::abort();
    }
    process::exit(99)
}
