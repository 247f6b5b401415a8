//! Installer configuration.
//!
//! This module provides the [`InstallerOptions`] struct, which gathers the
//! paths, URLs and timeouts the installer needs. Options can be built in
//! code or read from a TOML file; missing keys take their default value.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors raised while reading options.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum OptionsError {
    #[error("Cannot read options file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid options: {source}")]
    Parse {
        #[source]
        source: toml::de::Error,
    },
}

/// Configuration of a [`FeatureInstaller`](crate::FeatureInstaller).
///
/// # Default Behavior
///
/// Paths are relative to the working directory: the descriptor is
/// `features.toml`, resources are unpacked into `resources/`, reports go to
/// `logs/`. Language resources come from `https://sppas.org/resources/` and
/// annotation resources from SourceForge.
///
/// On Windows each runtime package is followed by a 2 second pause, which
/// gives the system time to register the new files.
///
/// # Example
///
/// ```rust
/// use feature_installer::InstallerOptions;
/// use std::time::Duration;
///
/// let opts = InstallerOptions::from_toml_str(r#"
///     descriptor = "etc/features.toml"
///     python = "/usr/bin/python3"
///     download_timeout_secs = 120
/// "#).unwrap();
///
/// assert_eq!(opts.download_timeout(), Duration::from_secs(120));
/// assert_eq!(opts.probe_timeout(), Duration::from_secs(2));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallerOptions {
    /// Feature descriptor file.
    pub descriptor: PathBuf,

    /// Where language and annotation resources are unpacked.
    pub resources_dir: PathBuf,

    /// Application directory receiving spin-off bundles.
    pub app_dir: PathBuf,

    /// Offline directory of wheels tried when the package index fails.
    pub dist_dir: Option<PathBuf>,

    /// Directory for diagnostic reports.
    pub report_dir: PathBuf,

    /// JSON file holding installed-feature flags. `None` disables persistence.
    pub store: Option<PathBuf>,

    /// Base URL of language resources.
    pub lang_url: String,

    /// Base URL of annotation resources.
    pub annot_url: String,

    /// Python interpreter to use before trying `python3` and `python`.
    pub python: Option<String>,

    /// Upgrade pip once before installing anything.
    pub upgrade_pip: bool,

    pub probe_timeout_secs: u64,
    pub module_timeout_secs: u64,
    pub download_timeout_secs: u64,

    /// Pause after each runtime package, in milliseconds.
    pub settle_delay_ms: u64,
}

impl InstallerOptions {
    /// Read options from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, OptionsError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| OptionsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Parse options from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, OptionsError> {
        toml::from_str(text).map_err(|source| OptionsError::Parse { source })
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn module_timeout(&self) -> Duration {
        Duration::from_secs(self.module_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

impl Default for InstallerOptions {
    fn default() -> Self {
        Self {
            descriptor: PathBuf::from("features.toml"),
            resources_dir: PathBuf::from("resources"),
            app_dir: PathBuf::from("."),
            dist_dir: None,
            report_dir: PathBuf::from("logs"),
            store: None,
            lang_url: "https://sppas.org/resources/".to_string(),
            annot_url: "https://sourceforge.net/projects/sppas/files/".to_string(),
            python: None,
            upgrade_pip: true,
            probe_timeout_secs: 2,
            module_timeout_secs: 30,
            download_timeout_secs: 60,
            settle_delay_ms: if cfg!(windows) { 2000 } else { 0 },
        }
    }
}
