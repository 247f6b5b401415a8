//! Per-feature results of an installation run.

use crate::feature::FeatureKind;
use std::collections::BTreeMap;
use std::fmt;

/// What happened to one feature during [`FeatureInstaller::install_report`].
///
/// [`FeatureInstaller::install_report`]: crate::FeatureInstaller::install_report
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum FeatureOutcome {
    /// Not installable on this machine; nothing was attempted.
    SkippedUnavailable,

    /// Available but not requested.
    SkippedDisabled,

    /// Every step succeeded. `notes` holds warnings worth showing anyway.
    Installed {
        notes: Vec<String>,
    },

    /// A step failed after all fallbacks.
    Failed {
        /// Human-readable failure reason.
        error: String,
        /// True when the feature was also marked unavailable.
        unavailable: bool,
    },
}

impl FeatureOutcome {
    /// Key of the progress message matching this outcome.
    pub fn message_key(&self) -> &'static str {
        match self {
            Self::SkippedUnavailable => "available_false",
            Self::SkippedDisabled => "enable_false",
            Self::Installed { .. } => "install_success",
            Self::Failed { .. } => "install_failed",
        }
    }

    pub fn is_installed(&self) -> bool {
        matches!(self, Self::Installed { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Render the progress message for `key` about feature `id`.
pub(crate) fn progress_message(key: &str, id: &str) -> String {
    match key {
        "beginning_feature" => format!("Beginning the installation of {id}"),
        "available_false" => format!("{id} is not available on this system"),
        "enable_false" => format!("{id} is not enabled"),
        "install_success" => format!("{id} was installed successfully"),
        "install_failed" => format!("Installation of {id} failed"),
        "install_finished" => "Installation finished".to_string(),
        _ => format!("{key}: {id}"),
    }
}

/// Outcome and final flags of one feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureReport {
    pub id: String,
    pub kind: FeatureKind,
    pub outcome: FeatureOutcome,
    pub enabled: bool,
    pub available: bool,
}

/// Result of a whole installation run.
///
/// `errors` is what [`FeatureInstaller::install`] returns; `installed` is
/// the map handed to the feature store.
///
/// [`FeatureInstaller::install`]: crate::FeatureInstaller::install
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub features: Vec<FeatureReport>,
    pub errors: Vec<String>,
    pub installed: BTreeMap<String, bool>,
}

impl InstallReport {
    /// True when no error or warning was recorded.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Report of the feature `id`, if it was part of the run.
    pub fn feature(&self, id: &str) -> Option<&FeatureReport> {
        self.features.iter().find(|f| f.id == id)
    }

    /// Per-feature enabled/disabled summary followed by the errors.
    ///
    /// # Example
    ///
    /// ```rust
    /// use feature_installer::{FeatureKind, FeatureOutcome, FeatureReport, InstallReport};
    ///
    /// let report = InstallReport {
    ///     features: vec![FeatureReport {
    ///         id: "julius".to_string(),
    ///         kind: FeatureKind::Dependency,
    ///         outcome: FeatureOutcome::Installed { notes: vec![] },
    ///         enabled: true,
    ///         available: true,
    ///     }],
    ///     ..Default::default()
    /// };
    /// assert!(report.summary().contains("julius"));
    /// ```
    pub fn summary(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for InstallReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for feature in &self.features {
            let state = if feature.enabled { "enabled" } else { "disabled" };
            let note = match &feature.outcome {
                FeatureOutcome::SkippedUnavailable => " (not available)",
                FeatureOutcome::SkippedDisabled => " (not requested)",
                FeatureOutcome::Installed { .. } => "",
                FeatureOutcome::Failed { .. } => " (failed)",
            };
            writeln!(f, "{:<24} {:<6} {}{}", feature.id, feature.kind, state, note)?;
        }
        if !self.errors.is_empty() {
            writeln!(f)?;
            for error in &self.errors {
                writeln!(f, "- {error}")?;
            }
        }
        Ok(())
    }
}
