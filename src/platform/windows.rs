//! Windows backend: no system package manager is driven.

use super::{PackageBackend, Platform};
use crate::install::InstallError;
use async_trait::async_trait;

/// Backend for Windows.
///
/// Dependency features on Windows rely on runtime packages and commands
/// only; any system-package operation is unsupported.
#[derive(Debug, Default)]
pub struct WindowsBackend;

impl WindowsBackend {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PackageBackend for WindowsBackend {
    fn platform(&self) -> Platform {
        Platform::Windows
    }

    async fn search(&self, _package: &str) -> Result<bool, InstallError> {
        Err(InstallError::unsupported(Platform::Windows, "search"))
    }

    async fn install(&self, _package: &str) -> Result<String, InstallError> {
        Err(InstallError::unsupported(Platform::Windows, "install"))
    }

    async fn is_version_satisfied(&self, _package: &str, _requirement: &str) -> Result<bool, InstallError> {
        Ok(true)
    }

    async fn update(&self, _package: &str, _requirement: &str) -> Result<String, InstallError> {
        Err(InstallError::unsupported(Platform::Windows, "update"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_only_version_check_supported() {
        let backend = WindowsBackend::new();
        assert!(backend.is_version_satisfied("anything", "aaaa").await.unwrap());
        assert!(backend.search("flac").await.unwrap_err().makes_unavailable());
        assert!(backend.install("flac").await.unwrap_err().makes_unavailable());
        assert!(backend.update("flac", "").await.unwrap_err().makes_unavailable());
    }
}
