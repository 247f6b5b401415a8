//! Errors raised while building a catalog.

use std::path::PathBuf;
use thiserror::Error;

/// A catalog could not be built from its descriptor.
///
/// These are the only errors the installer lets escape to its caller:
/// without a catalog no other operation is meaningful.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogError {
    /// The descriptor file does not exist.
    #[error("Feature descriptor not found: {}", path.display())]
    MissingFile {
        /// Path that was looked up.
        path: PathBuf,
    },

    /// The descriptor file exists but could not be read.
    #[error("Cannot read feature descriptor {}: {source}", path.display())]
    Io {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The descriptor is not a valid section-per-feature document.
    #[error("Malformed feature descriptor: {message}")]
    Malformed {
        /// Parser message.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_display() {
        let error = CatalogError::MissingFile {
            path: PathBuf::from("/etc/features.toml"),
        };
        assert_eq!(error.to_string(), "Feature descriptor not found: /etc/features.toml");
    }

    #[test]
    fn test_malformed_display() {
        let error = CatalogError::Malformed {
            message: "expected a table".to_string(),
        };
        assert!(error.to_string().contains("expected a table"));
    }
}
