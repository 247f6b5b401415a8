//! Error types for installation operations.
//!
//! Every per-feature failure the engine can meet is an [`InstallError`].
//! Each variant carries an actionable fix suggestion. None of them escapes
//! the installation loop: they become outcomes and error strings.

use crate::catalog::CatalogError;
use crate::check::DependencyError;
use crate::platform::{Platform, VersionError};
use crate::process::{CommandOutput, ProcessError};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while installing one feature.
///
/// # Example
///
/// ```rust
/// use feature_installer::InstallError;
///
/// fn handle_error(error: InstallError) {
///     eprintln!("Installation failed: {}", error);
///     eprintln!("To fix: {}", error.fix_suggestion());
/// }
/// ```
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InstallError {
    /// A required program cannot be found or spawned.
    #[error("Command not found: {command}")]
    CommandNotFound {
        /// The command line whose program is missing.
        command: String,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// A module or command test is not satisfied.
    #[error("Dependency not satisfied: {source}")]
    DependencyUnsatisfied {
        /// The unsatisfied group.
        #[source]
        source: DependencyError,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// A package, command or download step failed after all fallbacks.
    #[error("Installation failed: {message}")]
    InstallerFailed {
        /// Description of the failure.
        message: String,
        /// Exit code of the failing program, if any.
        exit_code: Option<i32>,
        /// Standard error of the failing program, if any.
        stderr: Option<String>,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// The platform backend cannot perform an operation.
    #[error("{operation} is not supported on {platform}")]
    UnsupportedPlatform {
        /// The running platform.
        platform: Platform,
        /// The operation that was requested.
        operation: String,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// A download failed on every transport.
    #[error("Download of {url} failed: {message}")]
    Transport {
        /// The URL that was fetched.
        url: String,
        /// Failure reasons of every transport tried.
        message: String,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// A downloaded archive could not be extracted.
    #[error("Cannot extract {}: {message}", path.display())]
    Archive {
        /// The archive that failed.
        path: PathBuf,
        /// Extraction error.
        message: String,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// A version requirement or version output could not be interpreted.
    #[error("Version check failed: {source}")]
    Version {
        #[source]
        source: VersionError,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// An external command could not run.
    #[error("Process error: {source}")]
    Process {
        #[source]
        source: ProcessError,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// A local file operation failed.
    #[error("I/O error: {message}")]
    Io {
        /// Description of the failure.
        message: String,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },
}

impl InstallError {
    /// Get an actionable suggestion for fixing this error.
    ///
    /// # Example
    ///
    /// ```rust
    /// use feature_installer::InstallError;
    ///
    /// let error = InstallError::CommandNotFound {
    ///     command: "julius".to_string(),
    ///     fix: "Install julius and make sure it is on PATH".to_string(),
    /// };
    /// assert!(error.fix_suggestion().contains("PATH"));
    /// ```
    pub fn fix_suggestion(&self) -> &str {
        match self {
            Self::CommandNotFound { fix, .. } => fix,
            Self::DependencyUnsatisfied { fix, .. } => fix,
            Self::InstallerFailed { fix, .. } => fix,
            Self::UnsupportedPlatform { fix, .. } => fix,
            Self::Transport { fix, .. } => fix,
            Self::Archive { fix, .. } => fix,
            Self::Version { fix, .. } => fix,
            Self::Process { fix, .. } => fix,
            Self::Io { fix, .. } => fix,
        }
    }

    /// True when the feature must be marked unavailable, not just disabled.
    pub fn makes_unavailable(&self) -> bool {
        matches!(self, Self::UnsupportedPlatform { .. } | Self::CommandNotFound { .. })
    }

    /// Build an [`InstallError::InstallerFailed`] from a finished command.
    ///
    /// The message is the command's stderr, or its exit status when stderr
    /// is empty.
    pub fn from_output(command: &str, output: &CommandOutput) -> Self {
        let message = if output.stderr.is_empty() {
            format!("'{command}' exited with code {:?}", output.exit_code)
        } else {
            output.stderr.clone()
        };
        Self::InstallerFailed {
            message,
            exit_code: output.exit_code,
            stderr: (!output.stderr.is_empty()).then(|| output.stderr.clone()),
            fix: format!("Run '{command}' manually to see the full output"),
        }
    }

    /// Build an [`InstallError::UnsupportedPlatform`].
    pub fn unsupported(platform: Platform, operation: &str) -> Self {
        Self::UnsupportedPlatform {
            platform,
            operation: operation.to_string(),
            fix: format!("Install the package manually on {platform}"),
        }
    }
}

impl From<ProcessError> for InstallError {
    fn from(source: ProcessError) -> Self {
        let fix = match &source {
            ProcessError::Timeout { .. } => "Try again with a longer timeout".to_string(),
            ProcessError::EmptyCommand { .. } => "Fix the command in the feature descriptor".to_string(),
            _ => "Check that the program is installed and on PATH".to_string(),
        };
        Self::Process { source, fix }
    }
}

impl From<VersionError> for InstallError {
    fn from(source: VersionError) -> Self {
        let fix = match &source {
            VersionError::VersionNotFound { .. } => "Check the package manager output by hand".to_string(),
            _ => "Write version requirements as '>;X.Y' in the feature descriptor".to_string(),
        };
        Self::Version { source, fix }
    }
}

impl From<DependencyError> for InstallError {
    fn from(source: DependencyError) -> Self {
        Self::DependencyUnsatisfied {
            fix: format!("Install one of: {}", source.group().join(", ")),
            source,
        }
    }
}

/// Errors that prevent an installer from being built.
///
/// Unlike [`InstallError`], these do propagate: without a platform, an
/// interpreter and a catalog, no operation is meaningful.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SetupError {
    /// No supported package manager was found.
    #[error("Unsupported platform: {os}")]
    UnsupportedPlatform {
        /// Operating system identifier.
        os: String,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// No usable Python 3 interpreter.
    #[error("No Python interpreter: {source}")]
    Interpreter {
        #[source]
        source: InstallError,
    },

    /// The feature descriptor cannot be loaded.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl SetupError {
    /// Get an actionable suggestion for fixing this error.
    pub fn fix_suggestion(&self) -> &str {
        match self {
            Self::UnsupportedPlatform { fix, .. } => fix,
            Self::Interpreter { source } => source.fix_suggestion(),
            Self::Catalog(_) => "Check the path and syntax of the feature descriptor",
        }
    }
}
