//! Bridge from `tracing` events to the hook chain.
//!
//! [`HookLayer`] has no per-layer filter, so a hook that unwinds out of
//! `on_event` leaves no filter state half-updated. Whatever emits the diagnostic must tolerate
//! being unwound through at its logging call; `tracing` does, since its
//! dispatch guards restore their state on drop. Sources that cannot be
//! unwound through are not supported.

use std::fmt::{self, Write as _};

use once_cell::sync::OnceCell;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::prelude::*;

use super::{hooks, Diagnostic, LogLevel};
use crate::abort::contract_violation;

/// Forwards every `tracing` event to [`hooks::dispatch`].
///
/// The event target becomes the diagnostic domain. A boolean `fatal` field
/// marks the diagnostic fatal; other fields are appended as `name=value`.
#[derive(Debug, Default, Clone, Copy)]
pub struct HookLayer;

impl<S: Subscriber> Layer<S> for HookLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = DiagnosticVisitor::default();
        event.record(&mut visitor);

        let meta = event.metadata();
        let level = LogLevel::from_tracing(*meta.level(), visitor.fatal);
        let diagnostic = Diagnostic {
            domain: meta.target().to_string(),
            level,
            fatal: visitor.fatal || level == LogLevel::Error,
            text: visitor.finish(),
        };

        hooks::dispatch(&diagnostic);
    }
}

static INSTALLED: OnceCell<bool> = OnceCell::new();

/// Installs a registry with [`HookLayer`] as the global `tracing` subscriber.
///
/// Safe to call repeatedly. A global subscriber installed earlier is
/// accepted only if it already carries [`HookLayer`], as in
/// `tracing_subscriber::registry().with(HookLayer).with(fmt_layer)`;
/// any other one would keep diagnostics away from the hook chain, which is
/// a contract violation.
pub fn init() {
    let intercepting = *INSTALLED.get_or_init(|| {
        tracing::subscriber::set_global_default(tracing_subscriber::registry().with(HookLayer)).is_ok()
            || tracing::dispatcher::get_default(|dispatch| dispatch.is::<HookLayer>())
    });
    if !intercepting {
        contract_violation(
            "a global tracing subscriber without HookLayer is already installed; \
             diagnostics would bypass the hook chain",
        );
    }
}

#[derive(Default)]
struct DiagnosticVisitor {
    message: Option<String>,
    fields: Vec<String>,
    fatal: bool,
}

impl DiagnosticVisitor {
    fn finish(self) -> String {
        let mut text = self.message.unwrap_or_default();
        for field in self.fields {
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(&field);
        }
        text
    }
}

impl Visit for DiagnosticVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{value:?}"));
        } else {
            let mut entry = String::new();
            let _ = write!(entry, "{}={:?}", field.name(), value);
            self.fields.push(entry);
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = Some(value.to_string());
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        if field.name() == "fatal" {
            self.fatal = value;
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }
}
