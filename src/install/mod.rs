//! Feature installation.
//!
//! [`FeatureInstaller`] drives the whole process. The pieces it composes
//! are public so front ends can reuse them: progress reporting, the
//! installed-flags store, and download transports.
//!
//! # Example
//!
//! ```rust,no_run
//! use feature_installer::{FeatureInstaller, InstallerOptions, TracingProgress};
//! use std::sync::Arc;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let options = InstallerOptions::from_toml_file("installer.toml").unwrap_or_default();
//!     let Ok(mut installer) = FeatureInstaller::new(options).await else {
//!         return;
//!     };
//!     installer.set_progress_reporter(Arc::new(TracingProgress));
//!
//!     for error in installer.install(None).await {
//!         eprintln!("{error}");
//!     }
//! }
//! ```

mod download;
mod engine;
mod errors;
mod outcome;
mod pip;
mod progress;
mod store;

pub use download::{CurlTransport, HttpTransport, Transport, TransportError};
pub use engine::FeatureInstaller;
pub use errors::{InstallError, SetupError};
pub use outcome::{FeatureOutcome, FeatureReport, InstallReport};
pub use progress::{ChannelProgress, ProgressReporter, ProgressSnapshot, TracingProgress};
pub use store::{FeatureStore, InstalledFlags, JsonFeatureStore, MemoryFeatureStore, StoreError};
