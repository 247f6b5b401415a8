//! Installation orchestration.
//!
//! [`FeatureInstaller`] walks the catalog in order and installs every
//! enabled and available feature: system packages through the platform
//! backend, runtime packages through pip, then the post-install command,
//! or a resource archive for the resource kinds. A failing feature never
//! stops the others; its error becomes a string in the result.

use super::download::{install_resource, CurlTransport, HttpTransport, Transport};
use super::outcome::{progress_message, FeatureOutcome, FeatureReport, InstallReport};
use super::pip::{in_virtualenv, locate_python, PipInstaller};
use super::progress::{ProgressReporter, ProgressTracker};
use super::store::{FeatureStore, InstalledFlags, JsonFeatureStore};
use super::{InstallError, SetupError};
use crate::catalog::FeatureCatalog;
use crate::check::DependencyChecker;
use crate::feature::{FeatureKind, PackageSpecs};
use crate::options::InstallerOptions;
use crate::platform::{backend_for, current_platform, has_output, PackageBackend, Platform};
use crate::process::{CommandRunner, ProcessError, ProcessRunner};
use std::sync::Arc;
use std::time::Duration;

/// Installs the features of a catalog on the running machine.
///
/// # Consent Model
///
/// Calling [`install`](Self::install) IS consent to install: it runs the
/// system package manager and pip. The caller's UI is responsible for
/// confirming with the user first.
///
/// # Example
///
/// ```rust,no_run
/// use feature_installer::{ChannelProgress, FeatureInstaller, FeatureKind, InstallerOptions};
/// use std::sync::Arc;
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let mut installer = match FeatureInstaller::new(InstallerOptions::default()).await {
///         Ok(installer) => installer,
///         Err(e) => {
///             eprintln!("{}. Fix: {}", e, e.fix_suggestion());
///             return;
///         }
///     };
///
///     let progress = Arc::new(ChannelProgress::new());
///     installer.set_progress_reporter(progress.clone());
///
///     for id in installer.list_feature_ids(Some(FeatureKind::Language)) {
///         installer.enable(&id, Some(true));
///     }
///
///     let report = installer.install_report(None).await;
///     println!("{}", report.summary());
/// }
/// ```
pub struct FeatureInstaller {
    catalog: FeatureCatalog,
    backend: Box<dyn PackageBackend>,
    runner: Arc<dyn CommandRunner>,
    pip: Option<PipInstaller>,
    checker: DependencyChecker,
    transports: Vec<Arc<dyn Transport>>,
    options: InstallerOptions,
    reporter: Option<Arc<dyn ProgressReporter>>,
    store: Option<Box<dyn FeatureStore>>,
}

impl FeatureInstaller {
    /// Build an installer for the running machine.
    ///
    /// Detects the platform, locates a Python 3 interpreter, optionally
    /// upgrades pip, then loads the descriptor with the platform's keys.
    pub async fn new(options: InstallerOptions) -> Result<Self, SetupError> {
        let runner: Arc<dyn CommandRunner> = Arc::new(ProcessRunner::with_probe_timeout(options.probe_timeout()));

        let platform = current_platform(runner.as_ref())
            .await
            .ok_or_else(|| SetupError::UnsupportedPlatform {
                os: std::env::consts::OS.to_string(),
                fix: "Install apt, dnf or Homebrew, or install the features by hand".to_string(),
            })?;
        tracing::info!(platform = %platform, "platform detected");

        let python = locate_python(runner.as_ref(), options.python.as_deref())
            .await
            .map_err(|source| SetupError::Interpreter { source })?;
        tracing::info!(python = %python, "using interpreter");

        let catalog = FeatureCatalog::load(&options.descriptor, platform.requirements_key(), platform.command_key())?;
        let backend = backend_for(platform, runner.clone());

        let mut installer = Self::from_parts(catalog, backend, runner, Some(python), options);
        if let Some(path) = installer.options.store.clone() {
            installer.store = Some(Box::new(JsonFeatureStore::new(path)));
        }
        if installer.options.upgrade_pip {
            if let Some(pip) = &installer.pip {
                pip.upgrade_self().await;
            }
        }
        Ok(installer)
    }

    /// Assemble an installer from explicit parts.
    ///
    /// Without `python`, runtime packages cannot be installed and module
    /// tests always fail. Downloads use HTTP first, then `curl`.
    pub fn from_parts(
        catalog: FeatureCatalog,
        backend: Box<dyn PackageBackend>,
        runner: Arc<dyn CommandRunner>,
        python: Option<String>,
        options: InstallerOptions,
    ) -> Self {
        let pip = python.as_deref().map(|py| {
            PipInstaller::new(runner.clone(), py)
                .with_dist_dir(options.dist_dir.clone())
                .with_user_scope(!in_virtualenv(py))
        });
        let checker = DependencyChecker::new(runner.clone(), python).with_timeout(options.module_timeout());
        let transports = default_transports(runner.clone(), options.download_timeout());

        Self {
            catalog,
            backend,
            runner,
            pip,
            checker,
            transports,
            options,
            reporter: None,
            store: None,
        }
    }

    /// Replace the download transports, tried in order.
    pub fn with_transports(mut self, transports: Vec<Arc<dyn Transport>>) -> Self {
        self.transports = transports;
        self
    }

    /// Persist installed flags through `store`.
    pub fn with_store(mut self, store: Box<dyn FeatureStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn set_progress_reporter(&mut self, reporter: Arc<dyn ProgressReporter>) {
        self.reporter = Some(reporter);
    }

    pub fn platform(&self) -> Platform {
        self.backend.platform()
    }

    pub fn catalog(&self) -> &FeatureCatalog {
        &self.catalog
    }

    pub fn list_feature_ids(&self, kind: Option<FeatureKind>) -> Vec<String> {
        self.catalog.ids(kind)
    }

    pub fn feature_kind(&self, id: &str) -> Option<FeatureKind> {
        self.catalog.feature_kind(id)
    }

    pub fn brief(&self, id: &str) -> &str {
        self.catalog.brief(id)
    }

    pub fn description(&self, id: &str) -> &str {
        self.catalog.description(id)
    }

    pub fn is_available(&self, id: &str) -> bool {
        self.catalog.is_available(id)
    }

    /// Return whether `id` is enabled, after setting it when `value` is
    /// given. Enabling an unavailable feature has no effect.
    pub fn enable(&mut self, id: &str, value: Option<bool>) -> bool {
        if let Some(value) = value {
            self.catalog.set_enabled(id, value);
        }
        self.catalog.is_enabled(id)
    }

    /// Re-evaluate the module and command tests of dependency features.
    ///
    /// With `test_all`, disabled features are checked too and may become
    /// enabled.
    pub async fn verify_dependencies(&mut self, test_all: bool) {
        self.catalog.verify(&self.checker, test_all).await;
    }

    /// Check the tests of one feature, writing a diagnostic report under
    /// the report directory when they fail.
    ///
    /// A failure is [`InstallError::DependencyUnsatisfied`], whose fix names
    /// the alternatives of the unsatisfied group.
    pub async fn check_feature(&self, id: &str) -> Result<(), InstallError> {
        let modules = self.catalog.module_test(id);
        let commands = self.catalog.command_test(id);
        self.checker
            .check_and_report(&modules, &commands, &self.options.report_dir)
            .await?;
        Ok(())
    }

    /// Install every feature of `kind` (all kinds with `None`) and return
    /// the error and warning strings. Never fails.
    pub async fn install(&mut self, kind: Option<FeatureKind>) -> Vec<String> {
        self.install_report(kind).await.errors
    }

    /// Like [`install`](Self::install), with per-feature outcomes.
    pub async fn install_report(&mut self, kind: Option<FeatureKind>) -> InstallReport {
        let ids = self.catalog.ids(kind);
        let mut installed = self.load_flags();
        let mut tracker = ProgressTracker::new(ids.len());
        let mut report = InstallReport::default();

        for (index, id) in ids.iter().enumerate() {
            let Some(kind) = self.catalog.feature_kind(id) else {
                continue;
            };
            self.header(&progress_message("beginning_feature", id));

            let outcome = if !self.catalog.is_available(id) {
                FeatureOutcome::SkippedUnavailable
            } else if !self.catalog.is_enabled(id) {
                // Keep disabled dependencies visible in the store for manual edits.
                if kind == FeatureKind::Dependency {
                    installed.entry(id.clone()).or_insert(false);
                }
                FeatureOutcome::SkippedDisabled
            } else {
                tracker.begin_feature(self.step_count(id));
                match self.install_feature(id, kind, &mut tracker).await {
                    Ok(notes) => {
                        if !notes.is_empty() {
                            let message = notes.join("\n");
                            tracing::warn!(id = %id, "installation returned information messages: {}", message);
                            report.errors.push(message);
                        }
                        self.catalog.set_enabled(id, true);
                        installed.insert(id.clone(), true);
                        FeatureOutcome::Installed { notes }
                    }
                    Err(error) => {
                        let unavailable = error.makes_unavailable();
                        let message = match &error {
                            InstallError::UnsupportedPlatform { .. } => {
                                format!("Installation of feature {id} is not implemented yet for this os: {error}")
                            }
                            _ => error.to_string(),
                        };
                        tracing::error!(id = %id, fix = %error.fix_suggestion(), "{}", message);

                        if unavailable {
                            self.catalog.set_available(id, false);
                        }
                        self.catalog.set_enabled(id, false);
                        if kind == FeatureKind::Dependency {
                            installed.insert(id.clone(), false);
                        }
                        report.errors.push(message.clone());
                        FeatureOutcome::Failed {
                            error: message,
                            unavailable,
                        }
                    }
                }
            };

            let percent = tracker.complete_feature(index);
            self.update(percent, &progress_message(outcome.message_key(), id));
            report.features.push(FeatureReport {
                id: id.clone(),
                kind,
                outcome,
                enabled: self.catalog.is_enabled(id),
                available: self.catalog.is_available(id),
            });
        }

        let percent = tracker.finish();
        self.update(percent, &progress_message("install_finished", ""));
        self.save_flags(&installed);
        report.installed = installed;
        report
    }

    /// Number of progress sub-steps of a feature.
    fn step_count(&self, id: &str) -> usize {
        match self.catalog.feature_kind(id) {
            Some(FeatureKind::Dependency) => {
                self.catalog.system_packages(id).len()
                    + self.catalog.runtime_packages(id).len()
                    + usize::from(!self.catalog.command(id).trim().is_empty())
            }
            _ => 1,
        }
    }

    async fn install_feature(
        &mut self,
        id: &str,
        kind: FeatureKind,
        tracker: &mut ProgressTracker,
    ) -> Result<Vec<String>, InstallError> {
        match kind {
            FeatureKind::Dependency => self.install_dependency(id, tracker).await,
            FeatureKind::Language => {
                self.text(&format!(
                    "Download, unzip and install linguistic resources for {id} language"
                ));
                let file = format!("{}.zip", self.catalog.bundle(id));
                install_resource(&self.transports, &self.options.lang_url, &file, &self.options.resources_dir).await?;
                tracker.advance();
                Ok(Vec::new())
            }
            FeatureKind::Annotation => {
                self.text(&format!("Download, unzip and install resources for {id} annotation"));
                let file = format!("{}.tar", self.catalog.bundle(id));
                install_resource(&self.transports, &self.options.annot_url, &file, &self.options.resources_dir).await?;
                tracker.advance();
                Ok(Vec::new())
            }
            FeatureKind::SpinOff => {
                self.text(&format!("Download, unzip and install spin-off {id}"));
                let file = format!("{}-{}.zip", self.catalog.bundle(id), self.catalog.spin_version(id));
                let url = self.catalog.spin_url(id).to_string();
                install_resource(&self.transports, &url, &file, &self.options.app_dir).await?;
                tracker.advance();
                Ok(Vec::new())
            }
        }
    }

    async fn install_dependency(&mut self, id: &str, tracker: &mut ProgressTracker) -> Result<Vec<String>, InstallError> {
        let mut notes = Vec::new();

        for (package, constraint) in self.catalog.system_packages(id).iter() {
            tracing::info!(package = %package, "system package");
            self.install_system_package(package, constraint, &mut notes).await?;
            let percent = tracker.advance();
            self.update(percent, &progress_message("install_success", &format!("{package}{constraint}")));
        }

        let runtime = self.catalog.runtime_packages(id);
        if !runtime.is_empty() {
            let mark = tracker.checkpoint();
            match self.install_runtime_packages(id, &runtime, tracker).await {
                Ok(mut more) => notes.append(&mut more),
                Err(error) => {
                    // Try the substitute packages, e.g. PyAudio for simpleaudio.
                    let alternative = self.catalog.alt_runtime_packages(id);
                    let retried = if alternative.is_empty() {
                        Err(InstallError::InstallerFailed {
                            message: "No alternative runtime packages found.".to_string(),
                            exit_code: None,
                            stderr: None,
                            fix: "Install the runtime packages by hand".to_string(),
                        })
                    } else {
                        tracker.rewind(mark, runtime.len(), alternative.len());
                        let retried = self.install_runtime_packages(id, &alternative, tracker).await;
                        tracker.restore_step(mark);
                        retried
                    };
                    match retried {
                        Ok(mut more) => notes.append(&mut more),
                        Err(alt_error) => {
                            tracing::error!(id = %id, error = %alt_error, "alternative packages failed too");
                            return Err(error);
                        }
                    }
                }
            }
        }

        let command = self.catalog.command(id).trim().to_string();
        if !command.is_empty() {
            self.run_post_install(id, &command).await?;
            let percent = tracker.advance();
            self.update(percent, &progress_message("install_success", &command));
        }

        Ok(notes)
    }

    async fn install_system_package(
        &self,
        package: &str,
        constraint: &str,
        notes: &mut Vec<String>,
    ) -> Result<(), InstallError> {
        if !self.backend.search(package).await? {
            tracing::info!(package = %package, "is going to be installed");
            let residual = self.backend.install(package).await?;
            if has_output(&residual) {
                notes.push(residual);
            }
        } else if !self.backend.is_version_satisfied(package, constraint).await? {
            tracing::info!(package = %package, "is going to be updated");
            match self.backend.update(package, constraint).await {
                Ok(residual) if has_output(&residual) => notes.push(residual),
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(package = %package, error = %e, "update failed");
                    notes.push(e.to_string());
                }
            }
        } else {
            tracing::info!(package = %package, "is already installed and up-to-date");
        }
        Ok(())
    }

    async fn install_runtime_packages(
        &self,
        id: &str,
        packages: &PackageSpecs,
        tracker: &mut ProgressTracker,
    ) -> Result<Vec<String>, InstallError> {
        let pip = self.pip.as_ref().ok_or_else(|| InstallError::CommandNotFound {
            command: "python3 -m pip".to_string(),
            fix: "Install Python 3 or set `python` in the installer options".to_string(),
        })?;
        let options = self.catalog.runtime_options(id).to_string();
        let mut notes = Vec::new();

        for (package, constraint) in packages.iter() {
            tracing::info!(package = %package, python = %pip.python(), "runtime package");
            if !pip.is_installed(package).await? {
                match pip.install(package, constraint, &options).await {
                    Ok(residual) if !residual.is_empty() => notes.push(residual),
                    Ok(_) => {}
                    Err(e) if e.to_string().contains("DEPRECATION: ") => {
                        tracing::warn!(package = %package, "installed with a warning: {}", e);
                    }
                    Err(e) => return Err(e),
                }
            } else if !pip.is_version_satisfied(package, constraint).await {
                tracing::info!(package = %package, "is going to be updated");
                if let Err(e) = pip.update(package, constraint).await {
                    tracing::error!(package = %package, error = %e, "update failed");
                    notes.push(e.to_string());
                }
            } else {
                tracing::info!(package = %package, "is already installed and up-to-date");
            }

            self.settle().await;
            let percent = tracker.advance();
            self.update(percent, &progress_message("install_success", &format!("{package}{constraint}")));
        }
        Ok(notes)
    }

    async fn run_post_install(&self, id: &str, command: &str) -> Result<(), InstallError> {
        tracing::info!(id = %id, command = %command, "running post-install command");
        let not_found = || InstallError::CommandNotFound {
            command: command.to_string(),
            fix: format!("Install the program used by '{command}' and make sure it is on PATH"),
        };

        // The line may start with a shell builtin, so only the run decides.
        let out = match self.runner.run(command, None).await {
            Ok(out) => out,
            Err(ProcessError::Spawn { .. }) => return Err(not_found()),
            Err(e) => return Err(e.into()),
        };

        tracing::info!(status = ?out.exit_code, "command returned");
        if has_output(&out.stdout) {
            tracing::info!("{}", out.stdout);
        }
        if out.is_command_not_found() {
            tracing::error!(stderr = %out.stderr, "post-install program not found");
            return Err(not_found());
        }
        if !out.success() {
            return Err(InstallError::from_output(command, &out));
        }
        if !out.stderr.is_empty() {
            tracing::debug!(stderr = %out.stderr, "post-install command wrote to stderr");
        }
        Ok(())
    }

    async fn settle(&self) {
        let delay = self.options.settle_delay();
        if delay > Duration::ZERO {
            tokio::time::sleep(delay).await;
        }
    }

    fn load_flags(&self) -> InstalledFlags {
        match &self.store {
            Some(store) => store.load().unwrap_or_else(|e| {
                tracing::warn!(error = %e, "cannot load installed features");
                InstalledFlags::new()
            }),
            None => InstalledFlags::new(),
        }
    }

    fn save_flags(&self, flags: &InstalledFlags) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save(flags) {
                tracing::warn!(error = %e, "cannot save installed features");
            }
        }
    }

    fn header(&self, header: &str) {
        if let Some(reporter) = &self.reporter {
            reporter.set_header(header);
        }
        tracing::info!("* * * * *   {}   * * * * *", header);
    }

    fn text(&self, text: &str) {
        if let Some(reporter) = &self.reporter {
            reporter.set_text(text);
        }
        tracing::info!("  ==> {}", text);
    }

    fn update(&self, percent: u8, message: &str) {
        if let Some(reporter) = &self.reporter {
            reporter.update(percent, message);
        }
        tracing::info!(percent, "{}", message);
    }
}

/// HTTP first, `curl` as fallback.
fn default_transports(runner: Arc<dyn CommandRunner>, timeout: Duration) -> Vec<Arc<dyn Transport>> {
    let mut transports: Vec<Arc<dyn Transport>> = Vec::new();
    match HttpTransport::new(timeout) {
        Ok(http) => transports.push(Arc::new(http)),
        Err(e) => tracing::warn!(error = %e, "HTTP client unavailable"),
    }
    transports.push(Arc::new(CurlTransport::new(runner, timeout)));
    transports
}
