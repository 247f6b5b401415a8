//! # feature-installer
//!
//! Installs the optional features of a desktop application: system
//! packages, Python packages, post-install commands and downloadable
//! resource bundles, described by a TOML descriptor.
//!
//! ## Features
//!
//! - `FeatureCatalog` loading and querying the descriptor
//! - `DependencyChecker` evaluating module and command tests
//! - `detect_platform()` choosing between apt, dnf, Homebrew and Windows
//! - `FeatureInstaller` installing everything with progress reporting
//!
//! ## Example
//!
//! ```rust,no_run
//! use feature_installer::{FeatureInstaller, FeatureKind, InstallerOptions};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let mut installer = match FeatureInstaller::new(InstallerOptions::default()).await {
//!         Ok(installer) => installer,
//!         Err(e) => {
//!             eprintln!("{e}: {}", e.fix_suggestion());
//!             return;
//!         }
//!     };
//!
//!     // Check what is already there
//!     installer.verify_dependencies(false).await;
//!
//!     for id in installer.list_feature_ids(Some(FeatureKind::Dependency)) {
//!         let brief = installer.brief(&id).to_string();
//!         println!("{id}: {} enabled={}", brief, installer.enable(&id, None));
//!     }
//!
//!     let report = installer.install_report(None).await;
//!     println!("{}", report.summary());
//! }
//! ```

mod catalog;
mod check;
mod feature;
mod install;
mod options;
mod platform;
mod process;

#[cfg(test)]
mod testing;

pub use catalog::{CatalogError, FeatureCatalog};
pub use check::{DependencyChecker, DependencyError, DiagnosticReport, TestExpr};
pub use feature::{DependencySpec, Feature, FeatureDetails, FeatureKind, PackageSpecs};
pub use install::{
    ChannelProgress, CurlTransport, FeatureInstaller, FeatureOutcome, FeatureReport, FeatureStore, HttpTransport,
    InstallError, InstallReport, InstalledFlags, JsonFeatureStore, MemoryFeatureStore, ProgressReporter,
    ProgressSnapshot, SetupError, StoreError, TracingProgress, Transport, TransportError,
};
pub use options::{InstallerOptions, OptionsError};
pub use platform::{
    backend_for, brew_installed_version, current_platform, detect_platform, needs_update, parse_dotted_version,
    pip_installed_version, DebianBackend, DnfBackend, MacOsBackend, PackageBackend, Platform, VersionError,
    VersionRequirement, WindowsBackend,
};
pub use process::{CommandOutput, CommandRunner, ProcessError, ProcessRunner};
