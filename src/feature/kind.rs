//! Feature kind enum identifying the four installable variants.

use serde::{Deserialize, Serialize};
use std::fmt;
use strum::IntoEnumIterator;

/// The kind of an installable feature.
///
/// The kind is fixed when a feature is created and selects which
/// installation procedure the engine runs for it.
///
/// This enum is marked `#[non_exhaustive]`; when matching on it, include a
/// wildcard arm:
///
/// ```rust
/// use feature_installer::FeatureKind;
///
/// fn target(kind: FeatureKind) -> &'static str {
///     match kind {
///         FeatureKind::Dependency => "system",
///         FeatureKind::Language | FeatureKind::Annotation => "resources",
///         FeatureKind::SpinOff => "application",
///         _ => "unknown",
///     }
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::EnumIter)]
#[non_exhaustive]
pub enum FeatureKind {
    /// System packages, runtime packages and/or a command.
    #[serde(rename = "deps")]
    Dependency,
    /// A downloadable language resource bundle.
    #[serde(rename = "lang")]
    Language,
    /// A downloadable annotation resource bundle.
    #[serde(rename = "annot")]
    Annotation,
    /// A third-party add-on bundle.
    #[serde(rename = "spin")]
    SpinOff,
}

impl FeatureKind {
    /// The key used for this kind in descriptor files.
    ///
    /// # Example
    ///
    /// ```rust
    /// use feature_installer::FeatureKind;
    ///
    /// assert_eq!(FeatureKind::Dependency.key(), "deps");
    /// assert_eq!(FeatureKind::SpinOff.key(), "spin");
    /// ```
    pub fn key(&self) -> &'static str {
        match self {
            Self::Dependency => "deps",
            Self::Language => "lang",
            Self::Annotation => "annot",
            Self::SpinOff => "spin",
        }
    }

    /// Parse a descriptor key, returning `None` for unknown keys.
    ///
    /// # Example
    ///
    /// ```rust
    /// use feature_installer::FeatureKind;
    ///
    /// assert_eq!(FeatureKind::from_key("annot"), Some(FeatureKind::Annotation));
    /// assert_eq!(FeatureKind::from_key("plugin"), None);
    /// ```
    pub fn from_key(key: &str) -> Option<Self> {
        Self::all().find(|kind| kind.key() == key.trim())
    }

    /// Human-readable name for the kind.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Dependency => "Dependency",
            Self::Language => "Language resource",
            Self::Annotation => "Annotation resource",
            Self::SpinOff => "Spin-off",
        }
    }

    /// True for the kinds installed by downloading an archive.
    pub fn is_resource(&self) -> bool {
        !matches!(self, Self::Dependency)
    }

    /// Iterator over all feature kinds.
    ///
    /// # Example
    ///
    /// ```rust
    /// use feature_installer::FeatureKind;
    ///
    /// assert_eq!(FeatureKind::all().count(), 4);
    /// ```
    pub fn all() -> impl Iterator<Item = Self> {
        <Self as IntoEnumIterator>::iter()
    }
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.key())
    }
}
