//! Platform detection and package-manager backends.
//!
//! [`detect_platform`] picks the [`Platform`] from the OS identifier, and
//! when that is ambiguous (any Unix other than macOS) probes for known
//! package-manager programs. [`backend_for`] then builds the matching
//! [`PackageBackend`].
//!
//! # Example
//!
//! ```rust,no_run
//! use feature_installer::{backend_for, current_platform, ProcessRunner};
//! use std::sync::Arc;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let runner = Arc::new(ProcessRunner::new());
//!     match current_platform(runner.as_ref()).await {
//!         Some(platform) => {
//!             let backend = backend_for(platform, runner.clone());
//!             println!("{} installed: {:?}", "flac", backend.search("flac").await);
//!         }
//!         None => println!("no supported package manager found"),
//!     }
//! }
//! ```

mod debian;
mod dnf;
mod macos;
mod version;
mod windows;

pub use debian::DebianBackend;
pub use dnf::DnfBackend;
pub use macos::MacOsBackend;
pub use version::{
    brew_installed_version, needs_update, parse_dotted_version, pip_installed_version, VersionError,
    VersionRequirement,
};
pub use windows::WindowsBackend;

use crate::install::InstallError;
use crate::process::CommandRunner;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use strum::IntoEnumIterator;

/// An operating-system family with its own package manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::EnumIter)]
#[non_exhaustive]
pub enum Platform {
    /// Microsoft Windows; no system package manager is driven.
    Windows,
    /// macOS with Homebrew.
    MacOs,
    /// Debian, Ubuntu, Mint and other apt-based distributions.
    Debian,
    /// Fedora and other dnf-based distributions.
    Fedora,
}

impl Platform {
    /// Descriptor key holding system packages for this platform.
    ///
    /// # Example
    ///
    /// ```rust
    /// use feature_installer::Platform;
    ///
    /// assert_eq!(Platform::MacOs.requirements_key(), "req_ios");
    /// assert_eq!(Platform::Fedora.requirements_key(), "req_dnf");
    /// ```
    pub fn requirements_key(&self) -> &'static str {
        match self {
            Self::Windows => "req_win",
            Self::MacOs => "req_ios",
            Self::Debian => "req_deb",
            Self::Fedora => "req_dnf",
        }
    }

    /// Descriptor key holding the post-install command for this platform.
    pub fn command_key(&self) -> &'static str {
        match self {
            Self::Windows => "cmd_win",
            Self::MacOs => "cmd_ios",
            Self::Debian => "cmd_deb",
            Self::Fedora => "cmd_dnf",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Windows => "Windows",
            Self::MacOs => "macOS",
            Self::Debian => "Debian (apt)",
            Self::Fedora => "Fedora (dnf)",
        }
    }

    /// Iterator over all platforms.
    pub fn all() -> impl Iterator<Item = Self> {
        <Self as IntoEnumIterator>::iter()
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Package-manager primitives one platform provides.
///
/// Operations a platform cannot perform return
/// [`InstallError::UnsupportedPlatform`], which makes the feature
/// permanently unavailable.
#[async_trait]
pub trait PackageBackend: Send + Sync {
    /// The platform this backend drives.
    fn platform(&self) -> Platform;

    /// True when `package` is already installed.
    async fn search(&self, package: &str) -> Result<bool, InstallError>;

    /// Install `package`; returns residual diagnostic text, possibly empty.
    async fn install(&self, package: &str) -> Result<String, InstallError>;

    /// True when the installed `package` meets `requirement`.
    async fn is_version_satisfied(&self, package: &str, requirement: &str) -> Result<bool, InstallError>;

    /// Upgrade `package`; returns residual diagnostic text, possibly empty.
    async fn update(&self, package: &str, requirement: &str) -> Result<String, InstallError>;
}

/// Choose the platform from an OS identifier, probing package managers
/// when the identifier alone is ambiguous.
///
/// `os` takes the values of [`std::env::consts::OS`]; `win32` and `darwin`
/// are accepted as aliases. On other systems `dpkg` together with `apt`
/// means Debian, then `brew` means macOS, then `dnf` means Fedora.
pub async fn detect_platform(os: &str, runner: &dyn CommandRunner) -> Option<Platform> {
    match os {
        "windows" | "win32" => return Some(Platform::Windows),
        "macos" | "darwin" => return Some(Platform::MacOs),
        _ => {}
    }

    let probes = ["dpkg", "apt", "brew", "dnf"].map(|program| runner.probe(program));
    let found = futures::future::join_all(probes).await;
    let (dpkg, apt, brew, dnf) = (found[0], found[1], found[2], found[3]);
    tracing::debug!(os = %os, dpkg, apt, brew, dnf, "package manager probes");

    if dpkg && apt {
        Some(Platform::Debian)
    } else if brew {
        Some(Platform::MacOs)
    } else if dnf {
        Some(Platform::Fedora)
    } else {
        None
    }
}

/// Detect the platform of the running system.
pub async fn current_platform(runner: &dyn CommandRunner) -> Option<Platform> {
    detect_platform(std::env::consts::OS, runner).await
}

/// Build the backend for `platform`.
pub fn backend_for(platform: Platform, runner: Arc<dyn CommandRunner>) -> Box<dyn PackageBackend> {
    match platform {
        Platform::Windows => Box::new(WindowsBackend::new()),
        Platform::MacOs => Box::new(MacOsBackend::new(runner)),
        Platform::Debian => Box::new(DebianBackend::new(runner)),
        Platform::Fedora => Box::new(DnfBackend::new(runner)),
    }
}

/// True when a package manager stream carries more than noise.
pub(crate) fn has_output(text: &str) -> bool {
    text.trim().chars().count() > 3
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedRunner;

    #[tokio::test]
    async fn test_os_identifier_decides() {
        let runner = ScriptedRunner::new();
        assert_eq!(detect_platform("windows", &runner).await, Some(Platform::Windows));
        assert_eq!(detect_platform("darwin", &runner).await, Some(Platform::MacOs));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_probe_order() {
        let runner = ScriptedRunner::new();
        assert_eq!(detect_platform("linux", &runner).await, Some(Platform::Debian));

        let runner = ScriptedRunner::new().missing("apt");
        assert_eq!(detect_platform("linux", &runner).await, Some(Platform::MacOs));

        let runner = ScriptedRunner::new().missing("dpkg").missing("brew");
        assert_eq!(detect_platform("freebsd", &runner).await, Some(Platform::Fedora));

        let runner = ScriptedRunner::new()
            .missing("dpkg")
            .missing("apt")
            .missing("brew")
            .missing("dnf");
        assert_eq!(detect_platform("linux", &runner).await, None);
    }

    #[test]
    fn test_keys_are_distinct() {
        let keys: std::collections::HashSet<_> = Platform::all().map(|p| p.requirements_key()).collect();
        assert_eq!(keys.len(), 4);
        assert_eq!(Platform::Debian.command_key(), "cmd_deb");
        assert_eq!(Platform::Windows.command_key(), "cmd_win");
    }

    #[test]
    fn test_backend_platform() {
        let runner: Arc<dyn CommandRunner> = Arc::new(ScriptedRunner::new());
        for platform in Platform::all() {
            assert_eq!(backend_for(platform, runner.clone()).platform(), platform);
        }
    }

    #[test]
    fn test_has_output() {
        assert!(!has_output(""));
        assert!(!has_output("  \n ok "));
        assert!(has_output("Package: flac"));
    }
}
