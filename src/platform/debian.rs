//! apt/dpkg backend.

use super::{has_output, PackageBackend, Platform};
use crate::install::InstallError;
use crate::process::CommandRunner;
use async_trait::async_trait;
use std::sync::Arc;

/// Backend for apt-based distributions.
///
/// Presence is checked with `dpkg -s`. Versions are not compared: an
/// installed package is considered recent enough, and updates are left to
/// the system's own upgrade routine.
pub struct DebianBackend {
    runner: Arc<dyn CommandRunner>,
}

impl DebianBackend {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl PackageBackend for DebianBackend {
    fn platform(&self) -> Platform {
        Platform::Debian
    }

    async fn search(&self, package: &str) -> Result<bool, InstallError> {
        let command = format!("dpkg -s {}", shell_words::quote(package));
        let out = self.runner.run(&command, None).await?;
        Ok(!has_output(&out.stderr))
    }

    async fn install(&self, package: &str) -> Result<String, InstallError> {
        let command = format!("apt install {} -y", shell_words::quote(package));
        let out = self.runner.run(&command, None).await?;
        if has_output(&out.stdout) {
            tracing::info!(package = %package, "{}", out.stdout);
        }

        // apt always warns that its CLI is unstable; only other stderr counts.
        if !out.success() || (has_output(&out.stderr) && !out.stderr.contains("WARNING")) {
            return Err(InstallError::from_output(&command, &out));
        }
        Ok(out.stderr)
    }

    async fn is_version_satisfied(&self, _package: &str, _requirement: &str) -> Result<bool, InstallError> {
        Ok(true)
    }

    async fn update(&self, _package: &str, _requirement: &str) -> Result<String, InstallError> {
        Err(InstallError::unsupported(Platform::Debian, "update"))
    }
}
