//! Version requirements and package-manager output parsing.

use regex::Regex;
use semver::Version;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors raised while comparing versions.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum VersionError {
    /// The requirement has no parseable version.
    #[error("Malformed version requirement: {requirement:?}")]
    MalformedRequirement {
        /// The requirement text.
        requirement: String,
    },

    /// The requirement uses a comparator other than "at least".
    #[error("Unsupported version comparator {comparator:?} in {requirement:?}")]
    UnsupportedComparator {
        /// The comparator that was found.
        comparator: String,
        /// The requirement text.
        requirement: String,
    },

    /// Package information did not contain a version.
    #[error("No version found in package information: {output:?}")]
    VersionNotFound {
        /// First line of the inspected output.
        output: String,
    },
}

/// A minimum version a package must reach.
///
/// Requirements are written `op;version` (`>;4.6`) or `opversion`
/// (`>=4.6`). Both `>` and `>=` mean "at least"; any other comparator is
/// rejected rather than silently accepted.
///
/// # Example
///
/// ```rust
/// use feature_installer::VersionRequirement;
/// use semver::Version;
///
/// let req = VersionRequirement::parse(">;4.6").unwrap().unwrap();
/// assert!(req.is_satisfied_by(&Version::new(4, 6, 0)));
/// assert!(!req.is_satisfied_by(&Version::new(4, 5, 0)));
///
/// assert!(VersionRequirement::parse("").unwrap().is_none());
/// assert!(VersionRequirement::parse("<;4.2").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRequirement {
    minimum: Version,
}

impl VersionRequirement {
    /// Parse a requirement; an empty text means "any version" (`None`).
    pub fn parse(text: &str) -> Result<Option<Self>, VersionError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }

        let (comparator, version) = match text.split_once(';') {
            Some((op, version)) => (op.trim(), version.trim()),
            None => {
                let split = text
                    .find(|c: char| !matches!(c, '<' | '>' | '=' | '!' | '~'))
                    .unwrap_or(text.len());
                (text[..split].trim(), text[split..].trim())
            }
        };

        if !matches!(comparator, ">" | ">=") {
            return Err(VersionError::UnsupportedComparator {
                comparator: comparator.to_string(),
                requirement: text.to_string(),
            });
        }

        let minimum = parse_dotted_version(version).ok_or_else(|| VersionError::MalformedRequirement {
            requirement: text.to_string(),
        })?;
        Ok(Some(Self { minimum }))
    }

    pub fn minimum(&self) -> &Version {
        &self.minimum
    }

    pub fn is_satisfied_by(&self, installed: &Version) -> bool {
        installed >= &self.minimum
    }
}

/// Extract the leading `major.minor` of a version string.
///
/// Anything after the second dot is ignored, so `1.3.3` reads as `1.3.0`.
/// Returns `None` when the text holds no number.
pub fn parse_dotted_version(text: &str) -> Option<Version> {
    static DOTTED_RE: OnceLock<Regex> = OnceLock::new();
    let re = DOTTED_RE.get_or_init(|| Regex::new(r"(\d+)(?:\.(\d+))?").expect("Invalid regex pattern"));

    let caps = re.captures(text)?;
    let major = caps.get(1)?.as_str().parse().ok()?;
    let minor = caps.get(2).map_or(Some(0), |m| m.as_str().parse().ok())?;
    Some(Version::new(major, minor, 0))
}

/// Installed version reported by `brew info`.
///
/// The first line reads `name: stable X.Y.Z (bottled) ...`.
pub fn brew_installed_version(info: &str) -> Result<Version, VersionError> {
    let first = info.lines().next().unwrap_or_default();
    first
        .split_once("stable")
        .and_then(|(_, rest)| parse_dotted_version(rest))
        .ok_or_else(|| VersionError::VersionNotFound {
            output: first.to_string(),
        })
}

/// Installed version reported by `pip show`.
pub fn pip_installed_version(show: &str) -> Result<Version, VersionError> {
    show.lines()
        .find_map(|line| line.trim().strip_prefix("Version:"))
        .and_then(parse_dotted_version)
        .ok_or_else(|| VersionError::VersionNotFound {
            output: show.lines().next().unwrap_or_default().to_string(),
        })
}

/// True when `installed` is below `requirement`.
///
/// An empty requirement never needs an update.
pub fn needs_update(installed: &Version, requirement: &str) -> Result<bool, VersionError> {
    Ok(VersionRequirement::parse(requirement)?.is_some_and(|req| !req.is_satisfied_by(installed)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const JULIUS_INFO: &str = "julius: stable 4.5 (bottled) \n\
        Two-pass large vocabulary continuous speech recognition engine\n\
        https://github.com/julius-speech/julius \n\
        /usr/local/Cellar/julius/4.5 (76 files, 3.6MB) * \n";

    const FLAC_INFO: &str = "flac: stable 1.3.3 (bottled), HEAD \n\
        Free lossless audio codec\n\
        https://xiph.org/flac/ \n\
        /usr/local/Cellar/flac/1.3.3 (53 files, 2.4MB) * \n";

    const PIP_SHOW: &str = "Name: numpy\nVersion: 1.26.4\nSummary: Fundamental package for array computing in Python\n";

    #[test]
    fn test_parse_dotted_version() {
        assert_eq!(parse_dotted_version("1.3.3"), Some(Version::new(1, 3, 0)));
        assert_eq!(parse_dotted_version(" 4.5 (bottled)"), Some(Version::new(4, 5, 0)));
        assert_eq!(parse_dotted_version("v12"), Some(Version::new(12, 0, 0)));
        assert_eq!(parse_dotted_version("no digits"), None);
    }

    #[test]
    fn test_brew_versions() {
        assert_eq!(brew_installed_version(JULIUS_INFO).unwrap(), Version::new(4, 5, 0));
        assert_eq!(brew_installed_version(FLAC_INFO).unwrap(), Version::new(1, 3, 0));
        assert!(matches!(
            brew_installed_version("Bonjour"),
            Err(VersionError::VersionNotFound { .. })
        ));
    }

    #[test]
    fn test_brew_needs_update() {
        let julius = brew_installed_version(JULIUS_INFO).unwrap();
        let flac = brew_installed_version(FLAC_INFO).unwrap();

        assert!(needs_update(&julius, ">;4.6").unwrap());
        assert!(!needs_update(&julius, ">;4.0").unwrap());
        assert!(needs_update(&flac, ">;1.4").unwrap());
        assert!(!needs_update(&flac, ">;1.0").unwrap());
        assert!(!needs_update(&julius, ">;0.0").unwrap());
    }

    #[test]
    fn test_unsupported_comparators_fail() {
        let julius = Version::new(4, 5, 0);
        assert!(matches!(
            needs_update(&julius, "<;4.2"),
            Err(VersionError::UnsupportedComparator { .. })
        ));
        assert!(matches!(
            needs_update(&julius, "=;1.2"),
            Err(VersionError::UnsupportedComparator { .. })
        ));
        assert!(needs_update(&julius, "aaaa").is_err());
        assert!(needs_update(&julius, "==2.0").is_err());
    }

    #[test]
    fn test_malformed_requirement() {
        assert!(matches!(
            VersionRequirement::parse(">;abc"),
            Err(VersionError::MalformedRequirement { .. })
        ));
    }

    #[test]
    fn test_pip_style_requirement() {
        let req = VersionRequirement::parse(">=1.2").unwrap().unwrap();
        assert_eq!(req.minimum(), &Version::new(1, 2, 0));
        let installed = pip_installed_version(PIP_SHOW).unwrap();
        assert!(req.is_satisfied_by(&installed));
    }

    #[test]
    fn test_minor_compared_numerically() {
        let req = VersionRequirement::parse(">;4.9").unwrap().unwrap();
        assert!(req.is_satisfied_by(&Version::new(4, 10, 0)));
    }

    #[test]
    fn test_empty_requirement_never_updates() {
        assert!(!needs_update(&Version::new(0, 1, 0), "").unwrap());
    }

    #[test]
    fn test_pip_version_missing() {
        assert!(pip_installed_version("Name: numpy\n").is_err());
    }
}
