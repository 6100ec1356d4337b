//! Complex cases: one logical test made of ordered, named subunits.
//!
//! Each subunit runs under its own abort boundary and is reported as
//! `<case>/<tag>`. After the first failure the remaining subunits are not
//! run, but are still reported as failed so the plan count holds.

use crate::abort;
use crate::path::TestPath;
use crate::tree::{ResultKind, TestResult};

/// The closed, ordered set of phases of a complex case.
///
/// Usually declared with [`crate::subunits!`]:
///
/// ```rust
/// tapline::subunits! {
///     pub enum Phase {
///         Setup => "setup",
///         Exercise => "exercise",
///         Verify => "verify",
///     }
/// }
///
/// use tapline::runner::complex::Subunit;
/// assert_eq!(Phase::all().len(), 3);
/// assert_eq!(Phase::Verify.name(), "verify");
/// ```
pub trait Subunit: Copy + 'static {
    /// Every subunit, in execution order.
    fn all() -> &'static [Self];

    /// Path element the subunit is reported under.
    fn name(&self) -> &'static str;
}

/// Declares a fieldless enum and its [`Subunit`] implementation.
#[macro_export]
macro_rules! subunits {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($variant:ident => $tag:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($variant),+
        }

        impl $crate::runner::complex::Subunit for $name {
            fn all() -> &'static [Self] {
                &[$($name::$variant),+]
            }

            fn name(&self) -> &'static str {
                match self {
                    $($name::$variant => $tag),+
                }
            }
        }
    };
}

/// Runs every subunit in order, calling `report` once per subunit, and
/// returns the coalesced result of the case.
pub(crate) fn run_subunits<R>(
    tags: &[&'static str],
    run: &mut dyn FnMut(usize),
    path: &TestPath,
    mut report: R,
) -> TestResult
where
    R: FnMut(TestPath, &TestResult),
{
    let mut failed_at: Option<&'static str> = None;
    let mut all_skipped = true;

    for (index, tag) in tags.iter().enumerate() {
        let result = if failed_at.is_some() {
            TestResult::fail("previous subunit failed")
        } else {
            abort::execute(|| run(index))
        };

        if result.kind != ResultKind::Skip {
            all_skipped = false;
        }
        if result.is_fail() && failed_at.is_none() {
            failed_at = Some(tag);
        }
        report(path.join(tag), &result);
    }

    match failed_at {
        Some(tag) => TestResult::fail(format!("subunit {tag} failed")),
        None if all_skipped => TestResult::skip("all subunits skipped"),
        None => TestResult::pass(),
    }
}
