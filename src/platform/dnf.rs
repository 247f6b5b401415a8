//! dnf backend.

use super::{PackageBackend, Platform};
use crate::install::InstallError;
use crate::process::CommandRunner;
use async_trait::async_trait;
use std::sync::Arc;

/// Exit status of `dnf check-update` when an update is available.
const UPDATES_AVAILABLE: i32 = 100;

/// Backend for dnf-based distributions.
///
/// Unlike brew and apt, dnf reports failures through its exit status, so
/// that is what this backend trusts.
pub struct DnfBackend {
    runner: Arc<dyn CommandRunner>,
}

impl DnfBackend {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl PackageBackend for DnfBackend {
    fn platform(&self) -> Platform {
        Platform::Fedora
    }

    async fn search(&self, package: &str) -> Result<bool, InstallError> {
        let command = format!("dnf list --installed {}", shell_words::quote(package));
        let out = self.runner.run(&command, None).await?;
        if !out.success() {
            if out.stderr.contains("No matching") {
                return Ok(false);
            }
            return Err(InstallError::from_output(&command, &out));
        }
        Ok(out.stderr.trim().is_empty())
    }

    async fn install(&self, package: &str) -> Result<String, InstallError> {
        let command = format!("dnf install {} -y", shell_words::quote(package));
        let out = self.runner.run(&command, None).await?;
        if !out.success() {
            return Err(InstallError::from_output(&command, &out));
        }
        Ok(out.stderr)
    }

    async fn is_version_satisfied(&self, package: &str, requirement: &str) -> Result<bool, InstallError> {
        if requirement.trim().is_empty() {
            return Ok(true);
        }
        let command = format!("dnf check-update {}", shell_words::quote(package));
        let out = self.runner.run(&command, None).await?;
        match out.exit_code {
            Some(0) => Ok(true),
            Some(UPDATES_AVAILABLE) => Ok(false),
            _ => Err(InstallError::from_output(&command, &out)),
        }
    }

    async fn update(&self, package: &str, _requirement: &str) -> Result<String, InstallError> {
        let command = format!("dnf upgrade -y {}", shell_words::quote(package));
        let out = self.runner.run(&command, None).await?;
        if !out.success() {
            return Err(InstallError::from_output(&command, &out));
        }
        Ok(out.stderr)
    }
}
