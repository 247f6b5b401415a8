//! Package name to version-constraint lists.

use serde::{Deserialize, Serialize};

/// Descriptor values meaning "nothing declared".
const ABSENT_MARKERS: &[&str] = &["nil", "none"];

/// Returns the trimmed value, or `None` if it is empty or an absent marker.
pub(crate) fn declared(value: &str) -> Option<&str> {
    let value = value.trim();
    if value.is_empty() || ABSENT_MARKERS.contains(&value.to_ascii_lowercase().as_str()) {
        None
    } else {
        Some(value)
    }
}

/// Ordered mapping from package name to version constraint.
///
/// Parsed from the descriptor grammar `name1:constraint1 name2 ...`; a bare
/// name has an empty constraint. A later entry for the same name replaces
/// the earlier one but keeps its position.
///
/// # Example
///
/// ```rust
/// use feature_installer::PackageSpecs;
///
/// let specs = PackageSpecs::parse("julius:>;4.6 flac");
/// assert_eq!(specs.len(), 2);
/// assert_eq!(specs.get("julius"), Some(">;4.6"));
/// assert_eq!(specs.get("flac"), Some(""));
/// assert!(PackageSpecs::parse("nil").is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageSpecs {
    entries: Vec<(String, String)>,
}

impl PackageSpecs {
    /// Parse a whitespace-separated list of `name[:constraint]` tokens.
    pub fn parse(text: &str) -> Self {
        let mut specs = Self::default();
        let Some(text) = declared(text) else {
            return specs;
        };
        for token in text.split_whitespace() {
            let (name, constraint) = token.split_once(':').unwrap_or((token, ""));
            specs.insert(name, constraint);
        }
        specs
    }

    /// Add or replace one package; empty names are ignored.
    pub fn insert(&mut self, name: impl Into<String>, constraint: impl Into<String>) {
        let name = name.into();
        if name.trim().is_empty() {
            return;
        }
        let constraint = constraint.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = constraint,
            None => self.entries.push((name, constraint)),
        }
    }

    /// Constraint declared for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, c)| c.as_str())
    }

    /// Iterate `(name, constraint)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, c)| (n.as_str(), c.as_str()))
    }

    /// Package names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N: Into<String>, C: Into<String>> FromIterator<(N, C)> for PackageSpecs {
    fn from_iter<I: IntoIterator<Item = (N, C)>>(iter: I) -> Self {
        let mut specs = Self::default();
        for (name, constraint) in iter {
            specs.insert(name, constraint);
        }
        specs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_markers() {
        assert_eq!(declared("  julius "), Some("julius"));
        assert_eq!(declared("nil"), None);
        assert_eq!(declared("NONE"), None);
        assert_eq!(declared("   "), None);
    }

    #[test]
    fn test_parse_keeps_order() {
        let specs = PackageSpecs::parse("numpy:>=1.2 sox tensorflow:<3");
        let names: Vec<_> = specs.names().collect();
        assert_eq!(names, vec!["numpy", "sox", "tensorflow"]);
        assert_eq!(specs.get("tensorflow"), Some("<3"));
    }

    #[test]
    fn test_constraint_split_on_first_colon() {
        let specs = PackageSpecs::parse("pkg:>;1:2");
        assert_eq!(specs.get("pkg"), Some(">;1:2"));
    }

    #[test]
    fn test_duplicate_overrides_in_place() {
        let specs = PackageSpecs::parse("a:1 b a:2");
        assert_eq!(specs.iter().collect::<Vec<_>>(), vec![("a", "2"), ("b", "")]);
    }

    #[test]
    fn test_empty_names_ignored() {
        let specs = PackageSpecs::parse(":1.0 ok");
        assert_eq!(specs.len(), 1);
        assert_eq!(specs.get("ok"), Some(""));
    }

    #[test]
    fn test_from_iter() {
        let specs: PackageSpecs = [("flac", ">;1.3")].into_iter().collect();
        assert_eq!(specs.get("flac"), Some(">;1.3"));
    }
}
