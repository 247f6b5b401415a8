//! The record describing one installable feature.

use super::{FeatureKind, PackageSpecs};
use crate::check::TestExpr;
use serde::{Deserialize, Serialize};

/// Minimum length of a caller-supplied identifier.
const MIN_ID_LEN: usize = 2;

/// What a dependency feature needs on the current platform.
///
/// Test expressions are stored already parsed, so they are evaluated many
/// times but parsed only once.
///
/// # Example
///
/// ```rust
/// use feature_installer::{DependencySpec, PackageSpecs, TestExpr};
///
/// let spec = DependencySpec {
///     runtime_packages: PackageSpecs::parse("numpy:>=1.2"),
///     module_test: TestExpr::parse_modules("numpy"),
///     ..Default::default()
/// };
/// assert!(spec.has_artifacts());
/// assert!(!DependencySpec::default().has_artifacts());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencySpec {
    /// Packages installed with the platform's package manager.
    pub system_packages: PackageSpecs,
    /// Interpreter-level packages.
    pub runtime_packages: PackageSpecs,
    /// Substitute interpreter-level packages tried when the primary set fails.
    pub alt_runtime_packages: PackageSpecs,
    /// Extra options passed to the package installer.
    pub runtime_options: String,
    /// A single command run after the packages are installed.
    pub command: String,
    /// Modules that must be importable.
    pub module_test: TestExpr,
    /// Commands that must be executable.
    pub command_test: TestExpr,
}

impl DependencySpec {
    /// True when at least one system package, runtime package or command
    /// is declared.
    pub fn has_artifacts(&self) -> bool {
        !self.system_packages.is_empty() || !self.runtime_packages.is_empty() || !self.command.trim().is_empty()
    }

    /// True when neither test expression imposes a requirement.
    pub fn has_no_tests(&self) -> bool {
        self.module_test.is_empty() && self.command_test.is_empty()
    }
}

/// Variant-specific data of a feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum FeatureDetails {
    /// Packages and commands.
    Dependency(DependencySpec),
    /// Language resource downloaded as `<bundle>.zip`.
    Language {
        /// Archive base name.
        bundle: String,
    },
    /// Annotation resource downloaded as `<bundle>.tar`.
    Annotation {
        /// Archive base name.
        bundle: String,
    },
    /// Add-on downloaded as `<bundle>-<version>.zip` from its own URL.
    SpinOff {
        /// Archive base name.
        bundle: String,
        /// Download base URL.
        url: String,
        /// Version suffix of the archive name.
        version: String,
    },
}

impl FeatureDetails {
    /// The kind these details belong to.
    pub fn kind(&self) -> FeatureKind {
        match self {
            Self::Dependency(_) => FeatureKind::Dependency,
            Self::Language { .. } => FeatureKind::Language,
            Self::Annotation { .. } => FeatureKind::Annotation,
            Self::SpinOff { .. } => FeatureKind::SpinOff,
        }
    }

    /// True when the details declare something that can be installed.
    pub fn is_installable(&self) -> bool {
        match self {
            Self::Dependency(spec) => spec.has_artifacts(),
            Self::Language { bundle } | Self::Annotation { bundle } => !bundle.trim().is_empty(),
            Self::SpinOff { bundle, url, version } => {
                !bundle.trim().is_empty() && !url.trim().is_empty() && !version.trim().is_empty()
            }
        }
    }
}

/// One optional installable capability.
///
/// `enabled` implies `available` at all times: enabling an unavailable
/// feature is refused, and marking a feature unavailable also disables it.
/// A feature whose details declare nothing installable can never become
/// available.
///
/// # Example
///
/// ```rust
/// use feature_installer::{Feature, FeatureKind};
///
/// let mut feature = Feature::language("fra");
/// assert_eq!(feature.kind(), FeatureKind::Language);
/// assert!(!feature.set_enabled(true));
///
/// feature.set_available(true);
/// assert!(feature.set_enabled(true));
///
/// feature.set_available(false);
/// assert!(!feature.is_enabled());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    id: String,
    brief: String,
    description: String,
    enabled: bool,
    available: bool,
    details: FeatureDetails,
}

impl Feature {
    /// Create a disabled, unavailable feature.
    ///
    /// An identifier shorter than two characters or containing anything
    /// other than ASCII letters, digits, `_` and `-` is replaced with a
    /// generated one.
    pub fn new(id: impl ToString, details: FeatureDetails) -> Self {
        Self {
            id: sanitize_id(&id.to_string()),
            brief: String::new(),
            description: String::new(),
            enabled: false,
            available: false,
            details,
        }
    }

    /// Create a dependency feature.
    pub fn dependency(id: impl ToString, spec: DependencySpec) -> Self {
        Self::new(id, FeatureDetails::Dependency(spec))
    }

    /// Create a language resource whose bundle name is its identifier.
    pub fn language(id: impl ToString) -> Self {
        let id = sanitize_id(&id.to_string());
        Self::new(&id, FeatureDetails::Language { bundle: id.clone() })
    }

    /// Create an annotation resource whose bundle name is its identifier.
    pub fn annotation(id: impl ToString) -> Self {
        let id = sanitize_id(&id.to_string());
        Self::new(&id, FeatureDetails::Annotation { bundle: id.clone() })
    }

    /// Create a spin-off whose bundle name is its identifier.
    pub fn spin_off(id: impl ToString, url: impl ToString, version: impl ToString) -> Self {
        let id = sanitize_id(&id.to_string());
        Self::new(
            &id,
            FeatureDetails::SpinOff {
                bundle: id.clone(),
                url: url.to_string().trim().to_string(),
                version: version.to_string().trim().to_string(),
            },
        )
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> FeatureKind {
        self.details.kind()
    }

    pub fn brief(&self) -> &str {
        &self.brief
    }

    pub fn set_brief(&mut self, brief: impl ToString) {
        self.brief = brief.to_string();
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_description(&mut self, description: impl ToString) {
        self.description = description.to_string();
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Request the feature be enabled or disabled.
    ///
    /// Returns the resulting flag, which stays `false` when the feature is
    /// not available.
    pub fn set_enabled(&mut self, value: bool) -> bool {
        if value && !self.available {
            tracing::debug!(id = %self.id, "refusing to enable an unavailable feature");
            self.enabled = false;
        } else {
            self.enabled = value;
        }
        self.enabled
    }

    /// Mark the feature available or not.
    ///
    /// Marking it unavailable also disables it. Returns the resulting flag,
    /// which stays `false` when nothing installable is declared.
    pub fn set_available(&mut self, value: bool) -> bool {
        if value && !self.details.is_installable() {
            tracing::debug!(id = %self.id, "nothing installable declared; feature stays unavailable");
            self.available = false;
        } else {
            self.available = value;
        }
        if !self.available {
            self.enabled = false;
        }
        self.available
    }

    pub fn details(&self) -> &FeatureDetails {
        &self.details
    }

    /// Dependency data, when this is a dependency feature.
    pub fn dependency_spec(&self) -> Option<&DependencySpec> {
        match &self.details {
            FeatureDetails::Dependency(spec) => Some(spec),
            _ => None,
        }
    }

    /// Archive base name, for resource kinds.
    pub fn bundle(&self) -> Option<&str> {
        match &self.details {
            FeatureDetails::Language { bundle }
            | FeatureDetails::Annotation { bundle }
            | FeatureDetails::SpinOff { bundle, .. } => Some(bundle),
            FeatureDetails::Dependency(_) => None,
        }
    }
}

/// Keep a valid identifier or replace it with a generated one.
fn sanitize_id(id: &str) -> String {
    let id = id.trim();
    let valid = id.chars().count() >= MIN_ID_LEN
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        id.to_string()
    } else {
        let generated = uuid::Uuid::new_v4().to_string();
        tracing::warn!(given = %id, generated = %generated, "invalid feature identifier replaced");
        generated
    }
}
