//! Module and command satisfaction checks.

use super::report::DiagnosticReport;
use super::TestExpr;
use crate::process::CommandRunner;
use regex::Regex;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use thiserror::Error;

/// Default bound for a single import check.
const IMPORT_TIMEOUT: Duration = Duration::from_secs(30);

/// A test expression could not be satisfied.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum DependencyError {
    /// No module of an AND group could be imported.
    #[error("None of the modules [{}] can be imported", group.join(", "))]
    ModulesUnsatisfied {
        /// The exhausted group of alternatives.
        group: Vec<String>,
    },

    /// No command of an AND group could be executed.
    #[error("None of the commands [{}] can be executed", group.join(", "))]
    CommandsUnsatisfied {
        /// The exhausted group of alternatives.
        group: Vec<String>,
    },
}

impl DependencyError {
    /// The group of alternatives that was exhausted.
    pub fn group(&self) -> &[String] {
        match self {
            Self::ModulesUnsatisfied { group } | Self::CommandsUnsatisfied { group } => group,
        }
    }
}

/// Evaluates module and command test expressions.
///
/// Modules are checked by asking the interpreter to import them; commands
/// are checked with [`CommandRunner::probe`]. Within a group, a failing
/// alternative is not fatal until every alternative has failed.
///
/// # Example
///
/// ```rust,no_run
/// use feature_installer::{DependencyChecker, ProcessRunner, TestExpr};
/// use std::sync::Arc;
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let checker = DependencyChecker::new(Arc::new(ProcessRunner::new()), Some("python3".to_string()));
///     let modules = TestExpr::parse_modules("sys|idonotexist123");
///     let commands = TestExpr::parse_commands("");
///     assert!(checker.check(&modules, &commands).await.is_ok());
/// }
/// ```
#[derive(Clone)]
pub struct DependencyChecker {
    runner: Arc<dyn CommandRunner>,
    python: Option<String>,
    timeout: Duration,
}

impl DependencyChecker {
    /// Create a checker that imports modules with the given interpreter.
    ///
    /// Without an interpreter every non-empty module expression fails.
    pub fn new(runner: Arc<dyn CommandRunner>, python: Option<String>) -> Self {
        Self {
            runner,
            python,
            timeout: IMPORT_TIMEOUT,
        }
    }

    /// Override the per-import timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The interpreter used for import checks.
    pub fn python(&self) -> Option<&str> {
        self.python.as_deref()
    }

    /// True when `module` can be imported by the interpreter.
    pub async fn module_available(&self, module: &str) -> bool {
        let Some(python) = &self.python else {
            return false;
        };
        if !is_module_name(module) {
            tracing::warn!(module = %module, "not a valid module name");
            return false;
        }

        let command = format!("{} -c \"import {}\"", shell_words::quote(python), module);
        match self.runner.run(&command, Some(self.timeout)).await {
            Ok(out) => out.success(),
            Err(e) => {
                tracing::debug!(module = %module, error = %e, "import check failed");
                false
            }
        }
    }

    /// True when the leading program of `command` can be spawned.
    pub async fn command_available(&self, command: &str) -> bool {
        self.runner.probe(command).await
    }

    /// Check every group of a module expression.
    pub async fn check_modules(&self, expr: &TestExpr) -> Result<(), DependencyError> {
        for group in expr.groups() {
            let mut satisfied = false;
            for module in group {
                if self.module_available(module).await {
                    satisfied = true;
                    break;
                }
            }
            if !satisfied {
                return Err(DependencyError::ModulesUnsatisfied { group: group.clone() });
            }
        }
        Ok(())
    }

    /// Check every group of a command expression.
    pub async fn check_commands(&self, expr: &TestExpr) -> Result<(), DependencyError> {
        for group in expr.groups() {
            let mut satisfied = false;
            for command in group {
                if self.command_available(command).await {
                    satisfied = true;
                    break;
                }
            }
            if !satisfied {
                return Err(DependencyError::CommandsUnsatisfied { group: group.clone() });
            }
        }
        Ok(())
    }

    /// Check commands, then modules; an empty expression is vacuously satisfied.
    pub async fn check(&self, modules: &TestExpr, commands: &TestExpr) -> Result<(), DependencyError> {
        self.check_commands(commands).await?;
        self.check_modules(modules).await
    }

    /// Like [`check`](Self::check), and on failure also write a diagnostic
    /// report under `report_dir`.
    ///
    /// A report that cannot be written is logged; the dependency error is
    /// still returned.
    pub async fn check_and_report(
        &self,
        modules: &TestExpr,
        commands: &TestExpr,
        report_dir: &Path,
    ) -> Result<(), DependencyError> {
        let result = self.check(modules, commands).await;
        if let Err(e) = &result {
            let report = DiagnosticReport::new(report_dir, "setup").with_interpreter(self.python.clone());
            match report.write(&e.to_string()).await {
                Ok(path) => tracing::info!(path = %path.display(), "dependency report written"),
                Err(io) => tracing::warn!(error = %io, "could not write dependency report"),
            }
        }
        result
    }
}

fn is_module_name(module: &str) -> bool {
    static MODULE_RE: OnceLock<Regex> = OnceLock::new();
    MODULE_RE
        .get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$").expect("Invalid regex pattern"))
        .is_match(module)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fail, ScriptedRunner};
    use tempfile::TempDir;

    fn checker(runner: ScriptedRunner) -> DependencyChecker {
        DependencyChecker::new(Arc::new(runner), Some("python3".to_string()))
    }

    fn scripted() -> ScriptedRunner {
        ScriptedRunner::new()
            .on("import idonotexist123", fail("ModuleNotFoundError"))
            .on("import idonotexist999", fail("ModuleNotFoundError"))
    }

    #[test]
    fn test_module_names() {
        assert!(is_module_name("sys"));
        assert!(is_module_name("xml.etree"));
        assert!(!is_module_name("os; rm -rf /"));
        assert!(!is_module_name("9lives"));
        assert!(!is_module_name(""));
    }

    #[tokio::test]
    async fn test_or_group_satisfied_by_one_alternative() {
        let checker = checker(scripted());
        let expr = TestExpr::parse_modules("sys|idonotexist123");
        assert!(checker.check_modules(&expr).await.is_ok());
    }

    #[tokio::test]
    async fn test_and_group_fails_on_missing_member() {
        let checker = checker(scripted());
        let expr = TestExpr::parse_modules("sys idonotexist999");
        let err = checker.check_modules(&expr).await.unwrap_err();
        assert_eq!(err.group(), &["idonotexist999".to_string()]);
        assert!(matches!(err, DependencyError::ModulesUnsatisfied { .. }));
    }

    #[tokio::test]
    async fn test_empty_expressions_are_satisfied() {
        let checker = DependencyChecker::new(Arc::new(ScriptedRunner::new()), None);
        assert!(checker.check(&TestExpr::default(), &TestExpr::default()).await.is_ok());
    }

    #[tokio::test]
    async fn test_modules_fail_without_interpreter() {
        let checker = DependencyChecker::new(Arc::new(ScriptedRunner::new()), None);
        let expr = TestExpr::parse_modules("sys");
        assert!(checker.check_modules(&expr).await.is_err());
    }

    #[tokio::test]
    async fn test_commands_all_must_succeed() {
        let checker = checker(scripted().missing("julius"));
        let ok = TestExpr::parse_commands("ffmpeg -version");
        assert!(checker.check_commands(&ok).await.is_ok());

        let missing = TestExpr::parse_commands("ffmpeg -version;julius");
        let err = checker.check_commands(&missing).await.unwrap_err();
        assert!(matches!(err, DependencyError::CommandsUnsatisfied { .. }));
        assert_eq!(err.group(), &["julius".to_string()]);
    }

    #[tokio::test]
    async fn test_alternatives_stop_at_first_success() {
        let runner = Arc::new(scripted());
        let checker = DependencyChecker::new(runner.clone(), Some("python3".to_string()));
        let expr = TestExpr::parse_modules("sys|os");
        checker.check_modules(&expr).await.unwrap();
        assert_eq!(runner.count_matching("import"), 1);
    }

    #[tokio::test]
    async fn test_check_and_report_writes_file() {
        let dir = TempDir::new().unwrap();
        let checker = checker(scripted());
        let expr = TestExpr::parse_modules("idonotexist999");
        let result = checker.check_and_report(&expr, &TestExpr::default(), dir.path()).await;
        assert!(result.is_err());

        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
    }
}
