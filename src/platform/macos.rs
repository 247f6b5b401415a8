//! Homebrew backend.

use super::version::{brew_installed_version, needs_update};
use super::{has_output, PackageBackend, Platform};
use crate::install::InstallError;
use crate::process::CommandRunner;
use async_trait::async_trait;
use std::sync::Arc;

/// Backend for macOS with Homebrew.
///
/// Brew prints many harmless notices on stderr, so a noisy install or
/// upgrade only fails when the package is still missing or outdated
/// afterward.
pub struct MacOsBackend {
    runner: Arc<dyn CommandRunner>,
}

impl MacOsBackend {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl PackageBackend for MacOsBackend {
    fn platform(&self) -> Platform {
        Platform::MacOs
    }

    async fn search(&self, package: &str) -> Result<bool, InstallError> {
        let command = format!("brew list {}", shell_words::quote(package));
        let out = self.runner.run(&command, None).await?;
        Ok(has_output(&out.stdout))
    }

    async fn install(&self, package: &str) -> Result<String, InstallError> {
        let command = format!("brew install {}", shell_words::quote(package));
        let out = self.runner.run(&command, None).await?;
        if has_output(&out.stdout) {
            tracing::info!(package = %package, "{}", out.stdout);
        }
        if has_output(&out.stderr) && !self.search(package).await? {
            return Err(InstallError::from_output(&command, &out));
        }
        Ok(out.stderr)
    }

    async fn is_version_satisfied(&self, package: &str, requirement: &str) -> Result<bool, InstallError> {
        if requirement.trim().is_empty() {
            return Ok(true);
        }
        let command = format!("brew info {}", shell_words::quote(package));
        let out = self.runner.run(&command, None).await?;
        if has_output(&out.stderr) {
            return Err(InstallError::from_output(&command, &out));
        }
        let installed = brew_installed_version(&out.stdout)?;
        Ok(!needs_update(&installed, requirement)?)
    }

    async fn update(&self, package: &str, requirement: &str) -> Result<String, InstallError> {
        let command = format!("brew upgrade {}", shell_words::quote(package));
        let out = self.runner.run(&command, None).await?;
        if has_output(&out.stdout) {
            tracing::info!(package = %package, "{}", out.stdout);
        }
        if has_output(&out.stderr) && !self.is_version_satisfied(package, requirement).await? {
            return Err(InstallError::from_output(&command, &out));
        }
        Ok(out.stderr)
    }
}
