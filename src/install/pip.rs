//! Runtime (Python) package installation through pip.
//!
//! pip reports most failures on stderr while still exiting with status 0,
//! so a step counts as failed as soon as it writes anything to stderr.

use super::InstallError;
use crate::platform::{needs_update, pip_installed_version, VersionRequirement};
use crate::platform::has_output;
use crate::process::{find_executable, CommandOutput, CommandRunner};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Interpreter names tried after the configured one.
const PYTHON_CANDIDATES: &[&str] = &["python3", "python"];

/// Bound for the interpreter version query.
const PYTHON_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Find a Python 3 interpreter the installer can launch.
///
/// `configured` is tried first, then `python3`, then `python`. A candidate
/// is accepted when it prints `3` as its major version.
pub(crate) async fn locate_python(runner: &dyn CommandRunner, configured: Option<&str>) -> Result<String, InstallError> {
    let candidates = configured.into_iter().chain(PYTHON_CANDIDATES.iter().copied());
    for candidate in candidates {
        tracing::info!(python = %candidate, "trying interpreter");
        let command = format!(
            "{} -c \"import sys; print(sys.version_info.major)\"",
            shell_words::quote(candidate)
        );
        match runner.run(&command, Some(PYTHON_QUERY_TIMEOUT)).await {
            Ok(out) if out.stdout.trim() == "3" => return Ok(candidate.to_string()),
            Ok(out) => tracing::debug!(python = %candidate, output = %out.stdout, "not a Python 3 interpreter"),
            Err(e) => tracing::debug!(python = %candidate, error = %e, "interpreter not usable"),
        }
    }

    Err(InstallError::CommandNotFound {
        command: "python3".to_string(),
        fix: "Install Python 3 or set `python` in the installer options".to_string(),
    })
}

/// True when `python` belongs to a virtual environment, where `--user` is
/// rejected by pip.
pub(crate) fn in_virtualenv(python: &str) -> bool {
    if std::env::var_os("VIRTUAL_ENV").is_some() {
        return true;
    }
    let resolved = find_executable(python).unwrap_or_else(|| PathBuf::from(python));
    resolved.to_string_lossy().contains("env")
}

/// Requirement specifier passed to pip for `package` and a descriptor
/// constraint.
///
/// Supported constraints become `name>=X.Y`. Others are handed to pip as
/// written, minus the `;` separator, and pip decides.
pub(crate) fn pip_spec(package: &str, constraint: &str) -> String {
    match VersionRequirement::parse(constraint) {
        Ok(None) => package.to_string(),
        Ok(Some(req)) => format!("{package}>={}.{}", req.minimum().major, req.minimum().minor),
        Err(_) => format!("{package}{}", constraint.replace(';', "")),
    }
}

/// Installs and updates runtime packages with `<python> -m pip`.
pub(crate) struct PipInstaller {
    runner: Arc<dyn CommandRunner>,
    python: String,
    dist_dir: Option<PathBuf>,
    user_scope: bool,
}

impl PipInstaller {
    pub(crate) fn new(runner: Arc<dyn CommandRunner>, python: impl Into<String>) -> Self {
        Self {
            runner,
            python: python.into(),
            dist_dir: None,
            user_scope: false,
        }
    }

    /// Offline directory of wheels used by the second install attempt.
    pub(crate) fn with_dist_dir(mut self, dist_dir: Option<PathBuf>) -> Self {
        self.dist_dir = dist_dir;
        self
    }

    /// Install into the user site (`--user`).
    pub(crate) fn with_user_scope(mut self, user_scope: bool) -> Self {
        self.user_scope = user_scope;
        self
    }

    pub(crate) fn python(&self) -> &str {
        &self.python
    }

    fn pip(&self) -> String {
        format!("{} -m pip", shell_words::quote(&self.python))
    }

    fn find_links(&self) -> Option<String> {
        self.dist_dir
            .as_ref()
            .map(|dir| format!("--find-links {}", shell_words::quote(&dir.to_string_lossy())))
    }

    fn install_line(&self, flags: &[&str], spec: &str, extra: Option<&str>) -> String {
        let quoted = shell_words::quote(spec);
        let mut parts = vec![self.pip(), "install".to_string()];
        parts.extend(flags.iter().filter(|f| !f.trim().is_empty()).map(|f| f.trim().to_string()));
        parts.push(quoted.into_owned());
        parts.extend(extra.map(str::to_string));
        if self.user_scope {
            parts.push("--user".to_string());
        }
        parts.push("--no-warn-script-location".to_string());
        parts.join(" ")
    }

    async fn run(&self, command: &str) -> Result<CommandOutput, InstallError> {
        let out = self.runner.run(command, None).await?;
        if has_output(&out.stdout) {
            tracing::info!("{}", out.stdout);
        }
        Ok(out)
    }

    /// Upgrade pip itself; failures are only logged.
    ///
    /// `--break-system-packages` only exists on recent pip, so both forms
    /// are attempted.
    pub(crate) async fn upgrade_self(&self) {
        tracing::info!("Updating pip, the package installer for Python");
        for suffix in [" --break-system-packages", ""] {
            let command = format!("{} install --upgrade pip{}", self.pip(), suffix);
            match self.runner.run(&command, None).await {
                Ok(out) if !out.success() => {
                    tracing::debug!(command = %command, stderr = %out.stderr, "pip upgrade failed")
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "pip upgrade failed"),
            }
        }
    }

    /// Remove pip's wheel cache so an install fetches fresh files.
    pub(crate) async fn purge_cache(&self) {
        let command = format!("{} cache purge", self.pip());
        match self.runner.run(&command, None).await {
            Ok(out) => tracing::debug!(status = ?out.exit_code, "pip cache purge"),
            Err(e) => tracing::debug!(error = %e, "pip cache purge failed"),
        }
    }

    async fn show(&self, package: &str) -> Result<Option<String>, InstallError> {
        let command = format!("{} show {}", self.pip(), shell_words::quote(package));
        let out = self.runner.run(&command, None).await?;
        if has_output(&out.stderr) || out.stdout.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(out.stdout))
    }

    /// True when pip knows the package.
    pub(crate) async fn is_installed(&self, package: &str) -> Result<bool, InstallError> {
        Ok(self.show(package).await?.is_some())
    }

    /// True when the package is installed at a version meeting `constraint`.
    ///
    /// Any doubt (missing package, unreadable version, unsupported
    /// comparator) answers `false`, so that pip gets a chance to decide.
    pub(crate) async fn is_version_satisfied(&self, package: &str, constraint: &str) -> bool {
        let show = match self.show(package).await {
            Ok(Some(show)) => show,
            Ok(None) => return false,
            Err(e) => {
                tracing::debug!(package = %package, error = %e, "pip show failed");
                return false;
            }
        };
        if constraint.trim().is_empty() {
            return true;
        }
        match pip_installed_version(&show).and_then(|installed| needs_update(&installed, constraint)) {
            Ok(outdated) => !outdated,
            Err(e) => {
                tracing::debug!(package = %package, error = %e, "cannot compare versions");
                false
            }
        }
    }

    /// Install `package`, falling back through pre-release, offline wheels
    /// and source builds.
    ///
    /// Returns residual stderr when the last attempt complained but the
    /// package ended up at a suitable version anyway.
    pub(crate) async fn install(&self, package: &str, constraint: &str, options: &str) -> Result<String, InstallError> {
        self.purge_cache().await;
        let spec = pip_spec(package, constraint);

        tracing::info!(package = %package, "Installing the stable version");
        let mut command = self.install_line(&["--only-binary=:all:", options], &spec, None);
        let mut out = self.run(&command).await?;

        if !out.is_clean() {
            if !options.trim().is_empty() {
                tracing::warn!(package = %package, stderr = %out.stderr, "stable version cannot be installed");
                return self.install_prerelease(package, constraint, options).await;
            }

            tracing::error!(package = %package, stderr = %out.stderr, "installation failed, trying another way");
            self.purge_cache().await;

            if let Some(find_links) = self.find_links() {
                command = self.install_line(&["--only-binary=:all:"], &spec, Some(&find_links));
                out = self.run(&command).await?;
            }

            if !out.is_clean() {
                tracing::error!(package = %package, stderr = %out.stderr, "installation failed, trying a last way");
                command = self.install_line(&[], &spec, None);
                out = self.run(&command).await?;
            }
        }

        self.settle(package, constraint, &command, &out).await
    }

    /// Install a pre-release (`--pre`) of `package`.
    pub(crate) async fn install_prerelease(
        &self,
        package: &str,
        constraint: &str,
        options: &str,
    ) -> Result<String, InstallError> {
        self.purge_cache().await;
        tracing::info!(package = %package, "Installing a pre-release version");
        let spec = pip_spec(package, constraint);
        let command = self.install_line(&["--pre", options], &spec, None);
        let out = self.run(&command).await?;
        self.settle(package, constraint, &command, &out).await
    }

    /// Upgrade `package` to a version meeting `constraint`.
    pub(crate) async fn update(&self, package: &str, constraint: &str) -> Result<String, InstallError> {
        self.purge_cache().await;
        let spec = shell_words::quote(&pip_spec(package, constraint)).into_owned();
        let mut parts = vec![self.pip(), "install".to_string()];
        parts.extend(self.find_links());
        parts.extend(["-U".to_string(), spec, "--no-warn-script-location".to_string()]);
        let command = parts.join(" ");

        let out = self.run(&command).await?;
        self.settle(package, constraint, &command, &out).await
    }

    /// Turn the last attempt into a result: clean is success, noisy is a
    /// warning when the package is usable anyway, otherwise an error.
    async fn settle(
        &self,
        package: &str,
        constraint: &str,
        command: &str,
        out: &CommandOutput,
    ) -> Result<String, InstallError> {
        if out.is_clean() {
            return Ok(String::new());
        }
        tracing::error!(package = %package, stderr = %out.stderr, "pip reported an error");
        if self.is_version_satisfied(package, constraint).await {
            if out.stderr.is_empty() {
                return Ok(format!("'{command}' exited with code {:?}", out.exit_code));
            }
            return Ok(out.stderr.clone());
        }
        Err(InstallError::from_output(command, out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fail, ok, ScriptedRunner};

    const NUMPY_SHOW: &str = "Name: numpy\nVersion: 1.26.4\nSummary: Fundamental package for array computing";

    fn pip(runner: ScriptedRunner, dist: Option<&str>) -> (Arc<ScriptedRunner>, PipInstaller) {
        let runner = Arc::new(runner);
        let pip = PipInstaller::new(runner.clone(), "python3")
            .with_dist_dir(dist.map(PathBuf::from))
            .with_user_scope(true);
        (runner, pip)
    }

    #[test]
    fn test_pip_spec() {
        assert_eq!(pip_spec("numpy", ""), "numpy");
        assert_eq!(pip_spec("numpy", ">;1.2"), "numpy>=1.2");
        assert_eq!(pip_spec("numpy", ">=1.2.3"), "numpy>=1.2");
        assert_eq!(pip_spec("numpy", "<;2.0"), "numpy<2.0");
    }

    #[tokio::test]
    async fn test_locate_python_checks_major_version() {
        let runner = ScriptedRunner::new()
            .on("/opt/py/bin/python", ok("2"))
            .on("python3 -c", ok("3"));
        let python = locate_python(&runner, Some("/opt/py/bin/python")).await.unwrap();
        assert_eq!(python, "python3");
    }

    #[tokio::test]
    async fn test_locate_python_fails_without_python3() {
        let runner = ScriptedRunner::new().missing("python3").missing("python");
        let error = locate_python(&runner, None).await.unwrap_err();
        assert!(matches!(error, InstallError::CommandNotFound { .. }));
    }

    #[tokio::test]
    async fn test_stable_install() {
        let (runner, pip) = pip(ScriptedRunner::new(), None);
        assert_eq!(pip.install("numpy", ">;1.2", "").await.unwrap(), "");
        assert_eq!(
            runner.calls(),
            vec![
                "python3 -m pip cache purge",
                "python3 -m pip install --only-binary=:all: 'numpy>=1.2' --user --no-warn-script-location",
            ]
        );
    }

    #[tokio::test]
    async fn test_falls_back_to_offline_wheels() {
        let (runner, pip) = pip(
            ScriptedRunner::new()
                .on("--only-binary", fail("ERROR: No matching distribution found for numpy"))
                .on("--only-binary", ok("Successfully installed numpy")),
            Some("/opt/dist"),
        );
        assert_eq!(pip.install("numpy", "", "").await.unwrap(), "");
        assert_eq!(runner.count_matching("--find-links /opt/dist"), 1);
        assert_eq!(runner.count_matching("cache purge"), 2);
    }

    #[tokio::test]
    async fn test_last_attempt_without_binary() {
        let (runner, pip) = pip(
            ScriptedRunner::new()
                .on("--only-binary", fail("ERROR: No matching distribution found"))
                .on("install numpy --user", ok("Successfully installed numpy")),
            None,
        );
        assert_eq!(pip.install("numpy", "", "").await.unwrap(), "");
        assert_eq!(
            runner.calls().last().unwrap(),
            "python3 -m pip install numpy --user --no-warn-script-location"
        );
    }

    #[tokio::test]
    async fn test_options_retry_as_prerelease() {
        let (runner, pip) = pip(
            ScriptedRunner::new()
                .on("--only-binary", fail("ERROR: Could not find a version"))
                .on("--pre", ok("Successfully installed whakerpy")),
            None,
        );
        pip.install("whakerpy", "", "--extra-index-url https://example.org")
            .await
            .unwrap();
        assert_eq!(runner.count_matching("--pre --extra-index-url https://example.org whakerpy"), 1);
    }

    #[tokio::test]
    async fn test_residual_error_downgraded_when_satisfied() {
        let (_, pip) = pip(
            ScriptedRunner::new()
                .on("pip install", fail("WARNING: Retrying after connection broken"))
                .on("pip show numpy", ok(NUMPY_SHOW)),
            None,
        );
        let warning = pip.install("numpy", ">;1.2", "").await.unwrap();
        assert!(warning.contains("Retrying"));
    }

    #[tokio::test]
    async fn test_exhausted_fallbacks_fail() {
        let (_, pip) = pip(
            ScriptedRunner::new()
                .on("pip install", fail("ERROR: No matching distribution found for nope"))
                .on("pip show", fail("WARNING: Package(s) not found: nope")),
            Some("/opt/dist"),
        );
        let error = pip.install("nope", "", "").await.unwrap_err();
        assert!(error.to_string().contains("No matching distribution"));
    }

    #[tokio::test]
    async fn test_version_checks() {
        let (_, pip) = pip(
            ScriptedRunner::new()
                .on("pip show numpy", ok(NUMPY_SHOW))
                .on("pip show nope", fail("WARNING: Package(s) not found: nope")),
            None,
        );
        assert!(pip.is_installed("numpy").await.unwrap());
        assert!(!pip.is_installed("nope").await.unwrap());
        assert!(pip.is_version_satisfied("numpy", ">;1.2").await);
        assert!(!pip.is_version_satisfied("numpy", ">=2.0").await);
        assert!(!pip.is_version_satisfied("numpy", "<;2.0").await);
        assert!(!pip.is_version_satisfied("nope", "").await);
    }

    #[tokio::test]
    async fn test_update_uses_offline_wheels() {
        let (runner, pip) = pip(ScriptedRunner::new(), Some("/opt/dist"));
        pip.update("numpy", ">;2.0").await.unwrap();
        assert_eq!(
            runner.calls().last().unwrap(),
            "python3 -m pip install --find-links /opt/dist -U 'numpy>=2.0' --no-warn-script-location"
        );
    }

    #[tokio::test]
    async fn test_upgrade_self_tolerates_failures() {
        let (runner, pip) = pip(ScriptedRunner::new().on("--upgrade pip", fail("no such option")), None);
        pip.upgrade_self().await;
        assert_eq!(runner.count_matching("--upgrade pip"), 2);
    }
}
