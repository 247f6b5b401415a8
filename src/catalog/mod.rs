//! The ordered catalog of features loaded from a descriptor.
//!
//! Lookups by an unknown identifier never fail: they log an error and
//! return an empty or `false` value, because the descriptor is a
//! human-edited file and front ends query it by name.
//!
//! # Example
//!
//! ```rust
//! use feature_installer::{FeatureCatalog, FeatureKind};
//!
//! let text = r#"
//! [fra]
//! type = "lang"
//! brief = "French resources"
//!
//! [julius]
//! type = "deps"
//! req_deb = "julius"
//! "#;
//!
//! let mut catalog = FeatureCatalog::from_toml_str(text, "req_deb", "cmd_deb").unwrap();
//! assert_eq!(catalog.ids(None), vec!["fra", "julius"]);
//! assert_eq!(catalog.ids(Some(FeatureKind::Language)), vec!["fra"]);
//!
//! catalog.set_enabled("julius", true);
//! assert!(catalog.is_enabled("julius"));
//! assert!(!catalog.is_enabled("unknown"));
//! ```

mod errors;
mod loader;

pub use errors::CatalogError;

use crate::check::{DependencyChecker, TestExpr};
use crate::feature::{DependencySpec, Feature, FeatureDetails, FeatureKind, PackageSpecs};
use std::path::Path;

/// Ordered sequence of features with unique identifiers.
///
/// Entries are never removed; only their `enabled` and `available` flags
/// change after loading.
#[derive(Debug, Clone, Default)]
pub struct FeatureCatalog {
    features: Vec<Feature>,
}

impl FeatureCatalog {
    /// Load a descriptor file, reading OS-specific fields from `req_key`
    /// (system packages) and `cmd_key` (post-install command).
    pub fn load(path: impl AsRef<Path>, req_key: &str, cmd_key: &str) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CatalogError::MissingFile {
                path: path.to_path_buf(),
            });
        }
        let text = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::from_toml_str(&text, req_key, cmd_key)?;
        tracing::info!(path = %path.display(), features = catalog.len(), "feature catalog loaded");
        Ok(catalog)
    }

    /// Build a catalog from descriptor text.
    pub fn from_toml_str(text: &str, req_key: &str, cmd_key: &str) -> Result<Self, CatalogError> {
        let features = loader::parse_descriptor(text, req_key, cmd_key)?;
        Ok(Self::from_features(features))
    }

    /// Build a catalog from ready-made features.
    ///
    /// A feature whose identifier is already present is logged and dropped.
    pub fn from_features(features: impl IntoIterator<Item = Feature>) -> Self {
        let mut catalog = Self::default();
        for feature in features {
            if catalog.contains(feature.id()) {
                tracing::error!(id = %feature.id(), "duplicate feature identifier ignored");
                continue;
            }
            catalog.features.push(feature);
        }
        catalog
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.features.iter().any(|f| f.id() == id)
    }

    /// Features in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }

    /// The feature with identifier `id`, if any.
    pub fn get(&self, id: &str) -> Option<&Feature> {
        self.features.iter().find(|f| f.id() == id)
    }

    fn lookup(&self, id: &str) -> Option<&Feature> {
        let found = self.get(id);
        if found.is_none() {
            tracing::error!(id = %id, "unknown feature");
        }
        found
    }

    fn lookup_mut(&mut self, id: &str) -> Option<&mut Feature> {
        let found = self.features.iter_mut().find(|f| f.id() == id);
        if found.is_none() {
            tracing::error!(id = %id, "unknown feature");
        }
        found
    }

    fn lookup_spec(&self, id: &str) -> Option<&DependencySpec> {
        let feature = self.lookup(id)?;
        let spec = feature.dependency_spec();
        if spec.is_none() {
            tracing::error!(id = %id, kind = %feature.kind(), "not a dependency feature");
        }
        spec
    }

    /// Identifiers in catalog order, optionally restricted to one kind.
    pub fn ids(&self, kind: Option<FeatureKind>) -> Vec<String> {
        self.features
            .iter()
            .filter(|f| kind.map_or(true, |k| f.kind() == k))
            .map(|f| f.id().to_string())
            .collect()
    }

    pub fn feature_kind(&self, id: &str) -> Option<FeatureKind> {
        self.lookup(id).map(Feature::kind)
    }

    pub fn is_enabled(&self, id: &str) -> bool {
        self.lookup(id).is_some_and(Feature::is_enabled)
    }

    /// Enable or disable a feature; returns the resulting flag.
    pub fn set_enabled(&mut self, id: &str, value: bool) -> bool {
        self.lookup_mut(id).is_some_and(|f| f.set_enabled(value))
    }

    pub fn is_available(&self, id: &str) -> bool {
        self.lookup(id).is_some_and(Feature::is_available)
    }

    /// Mark a feature available or not; returns the resulting flag.
    pub fn set_available(&mut self, id: &str, value: bool) -> bool {
        self.lookup_mut(id).is_some_and(|f| f.set_available(value))
    }

    pub fn brief(&self, id: &str) -> &str {
        self.lookup(id).map_or("", Feature::brief)
    }

    pub fn description(&self, id: &str) -> &str {
        self.lookup(id).map_or("", Feature::description)
    }

    /// System packages of a dependency feature.
    pub fn system_packages(&self, id: &str) -> PackageSpecs {
        self.lookup_spec(id).map(|s| s.system_packages.clone()).unwrap_or_default()
    }

    /// Runtime packages of a dependency feature.
    pub fn runtime_packages(&self, id: &str) -> PackageSpecs {
        self.lookup_spec(id).map(|s| s.runtime_packages.clone()).unwrap_or_default()
    }

    /// Alternate runtime packages of a dependency feature.
    pub fn alt_runtime_packages(&self, id: &str) -> PackageSpecs {
        self.lookup_spec(id).map(|s| s.alt_runtime_packages.clone()).unwrap_or_default()
    }

    pub fn runtime_options(&self, id: &str) -> &str {
        self.lookup_spec(id).map_or("", |s| s.runtime_options.as_str())
    }

    /// Post-install command of a dependency feature.
    pub fn command(&self, id: &str) -> &str {
        self.lookup_spec(id).map_or("", |s| s.command.as_str())
    }

    pub fn module_test(&self, id: &str) -> TestExpr {
        self.lookup_spec(id).map(|s| s.module_test.clone()).unwrap_or_default()
    }

    pub fn command_test(&self, id: &str) -> TestExpr {
        self.lookup_spec(id).map(|s| s.command_test.clone()).unwrap_or_default()
    }

    /// Archive base name of a resource feature.
    pub fn bundle(&self, id: &str) -> &str {
        self.lookup(id).and_then(Feature::bundle).unwrap_or("")
    }

    pub fn spin_url(&self, id: &str) -> &str {
        match self.lookup(id).map(Feature::details) {
            Some(FeatureDetails::SpinOff { url, .. }) => url,
            _ => "",
        }
    }

    pub fn spin_version(&self, id: &str) -> &str {
        match self.lookup(id).map(Feature::details) {
            Some(FeatureDetails::SpinOff { version, .. }) => version,
            _ => "",
        }
    }

    /// Withdraw enabled dependency features whose module test fails.
    ///
    /// Features without a module test, or currently disabled, are left
    /// untouched.
    pub async fn verify_modules(&mut self, checker: &DependencyChecker) {
        for feature in self.features.iter_mut().filter(|f| f.is_enabled()) {
            let Some(spec) = feature.dependency_spec() else {
                continue;
            };
            if spec.module_test.is_empty() {
                continue;
            }
            if let Err(e) = checker.check_modules(&spec.module_test).await {
                tracing::error!(id = %feature.id(), error = %e, "feature disabled: missing module");
                feature.set_available(false);
            }
        }
    }

    /// Withdraw enabled dependency features whose command test fails.
    pub async fn verify_commands(&mut self, checker: &DependencyChecker) {
        for feature in self.features.iter_mut().filter(|f| f.is_enabled()) {
            let Some(spec) = feature.dependency_spec() else {
                continue;
            };
            if spec.command_test.is_empty() {
                continue;
            }
            if let Err(e) = checker.check_commands(&spec.command_test).await {
                tracing::error!(id = %feature.id(), error = %e, "feature disabled: missing command");
                feature.set_available(false);
            }
        }
    }

    /// Evaluate both tests of dependency features and set their flags.
    ///
    /// Only enabled features are checked unless `test_all` is set. Success
    /// makes a feature available and enabled; failure makes it neither.
    /// Features without tests are left untouched. Never fails: problems are
    /// logged and the pass moves on.
    pub async fn verify(&mut self, checker: &DependencyChecker, test_all: bool) {
        for feature in self.features.iter_mut() {
            if !test_all && !feature.is_enabled() {
                continue;
            }
            let Some(spec) = feature.dependency_spec() else {
                continue;
            };
            if spec.has_no_tests() {
                continue;
            }

            tracing::debug!(id = %feature.id(), "checking dependencies");
            match checker.check(&spec.module_test, &spec.command_test).await {
                Ok(()) => {
                    if !feature.set_available(true) {
                        tracing::warn!(
                            id = %feature.id(),
                            "dependency tests pass but nothing installable is declared; feature stays unavailable"
                        );
                    }
                    feature.set_enabled(true);
                }
                Err(e) => {
                    tracing::info!(id = %feature.id(), error = %e, "feature disabled");
                    feature.set_available(false);
                }
            }
        }
    }
}
