//! Dependency satisfaction checks.
//!
//! A [`TestExpr`] describes what must be present as an AND of OR-groups;
//! the [`DependencyChecker`] evaluates it against the interpreter (modules)
//! or the system (commands).

mod checker;
mod expr;
mod report;

pub use checker::{DependencyChecker, DependencyError};
pub use expr::TestExpr;
pub use report::DiagnosticReport;
