//! Descriptor document parsing.
//!
//! A descriptor is a TOML document with one table per feature:
//!
//! ```toml
//! [julius]
//! type = "deps"
//! brief = "Speech recognition engine"
//! req_deb = "julius:>;4.6"
//! cmd_test = "julius"
//! enable = false
//! ```

use super::CatalogError;
use crate::check::TestExpr;
use crate::feature::{declared, DependencySpec, Feature, FeatureKind, PackageSpecs};
use toml::{Table, Value};

/// Parse every feature section of a descriptor.
///
/// Sections with a missing or unknown `type` are logged and skipped. A
/// value that is not a section makes the whole document malformed.
pub(crate) fn parse_descriptor(text: &str, req_key: &str, cmd_key: &str) -> Result<Vec<Feature>, CatalogError> {
    let document = text.parse::<Table>().map_err(|e| CatalogError::Malformed {
        message: e.to_string(),
    })?;

    let mut features = Vec::with_capacity(document.len());
    for (id, value) in &document {
        let Some(section) = value.as_table() else {
            return Err(CatalogError::Malformed {
                message: format!("'{id}' is not a feature section"),
            });
        };
        if let Some(feature) = build_feature(id, section, req_key, cmd_key) {
            features.push(feature);
        }
    }
    Ok(features)
}

fn build_feature(id: &str, section: &Table, req_key: &str, cmd_key: &str) -> Option<Feature> {
    let kind = text(section, "type").and_then(|t| FeatureKind::from_key(&t));
    let Some(kind) = kind else {
        tracing::error!(id = %id, "missing or wrong feature type");
        return None;
    };

    let mut feature = match kind {
        FeatureKind::Dependency => Feature::dependency(id, dependency_spec(section, req_key, cmd_key)),
        FeatureKind::Language => Feature::language(id),
        FeatureKind::Annotation => Feature::annotation(id),
        FeatureKind::SpinOff => {
            let url = declared_text(section, "url");
            let version = declared_text(section, "version");
            if url.is_none() || version.is_none() {
                tracing::error!(id = %id, "missing or invalid url or version for spin-off feature");
            }
            Feature::spin_off(id, url.unwrap_or_default(), version.unwrap_or_default())
        }
    };

    // Declaring something installable is what makes a feature available here;
    // verification passes may withdraw it later.
    if feature.set_available(true) {
        tracing::debug!(id = %feature.id(), kind = %kind, "feature available");
    }

    if let Some(brief) = text(section, "brief") {
        feature.set_brief(brief);
    }
    if let Some(desc) = text(section, "desc") {
        feature.set_description(desc);
    }
    match section.get("enable").map(flag) {
        Some(Some(value)) => {
            feature.set_enabled(value);
        }
        Some(None) => tracing::warn!(id = %id, "ignoring non-boolean 'enable' value"),
        None => {}
    }

    Some(feature)
}

fn dependency_spec(section: &Table, req_key: &str, cmd_key: &str) -> DependencySpec {
    let packages = |key: &str| text(section, key).map(|t| PackageSpecs::parse(&t)).unwrap_or_default();

    DependencySpec {
        system_packages: packages(req_key),
        runtime_packages: packages("pip"),
        alt_runtime_packages: packages("pip_alt"),
        runtime_options: declared_text(section, "pip_opt").unwrap_or_default(),
        command: declared_text(section, cmd_key).unwrap_or_default(),
        module_test: declared_text(section, "pip_test")
            .map(|t| TestExpr::parse_modules(&t))
            .unwrap_or_default(),
        command_test: declared_text(section, "cmd_test")
            .map(|t| TestExpr::parse_commands(&t))
            .unwrap_or_default(),
    }
}

/// Read a value as text, whatever its TOML type.
fn text(section: &Table, key: &str) -> Option<String> {
    match section.get(key)? {
        Value::Array(items) => Some(items.iter().filter_map(scalar).collect::<Vec<_>>().join(" ")),
        value => scalar(value),
    }
}

/// Like [`text`], treating empty and `nil`/`none` values as absent.
fn declared_text(section: &Table, key: &str) -> Option<String> {
    text(section, key).and_then(|t| declared(&t).map(String::from))
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Integer(i) => Some(i.to_string()),
        Value::Float(f) => Some(f.to_string()),
        Value::Boolean(b) => Some(b.to_string()),
        Value::Datetime(d) => Some(d.to_string()),
        Value::Array(_) | Value::Table(_) => None,
    }
}

fn flag(value: &Value) -> Option<bool> {
    match value {
        Value::Boolean(b) => Some(*b),
        Value::Integer(i) => Some(*i != 0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESCRIPTOR: &str = r#"
[video]
type = "deps"
brief = "Read and write video files"
desc = "Enables video support"
req_deb = "ffmpeg"
req_ios = "ffmpeg:>;4.2"
pip = "opencv-python:>=4.0 numpy"
pip_alt = "opencv-contrib-python:>=4.0"
pip_opt = "nil"
pip_test = "cv2|cv numpy"
cmd_deb = "none"
cmd_test = "ffmpeg -version"
enable = true

[fra]
type = "lang"
brief = "French"

[alignment]
type = "annot"
enable = "yes"

[whisper-addon]
type = "spin"
url = "https://example.org/addons/"
version = 1.2

[broken]
brief = "no type"

[weird]
type = "plugin"
"#;

    #[test]
    fn test_parse_all_kinds_in_order() {
        let features = parse_descriptor(DESCRIPTOR, "req_deb", "cmd_deb").unwrap();
        let ids: Vec<_> = features.iter().map(Feature::id).collect();
        assert_eq!(ids, vec!["video", "fra", "alignment", "whisper-addon"]);
    }

    #[test]
    fn test_dependency_fields() {
        let features = parse_descriptor(DESCRIPTOR, "req_deb", "cmd_deb").unwrap();
        let video = &features[0];
        let spec = video.dependency_spec().unwrap();

        assert_eq!(spec.system_packages.get("ffmpeg"), Some(""));
        assert_eq!(spec.runtime_packages.len(), 2);
        assert_eq!(spec.alt_runtime_packages.get("opencv-contrib-python"), Some(">=4.0"));
        assert_eq!(spec.runtime_options, "");
        assert_eq!(spec.command, "");
        assert_eq!(spec.module_test.groups().len(), 2);
        assert_eq!(spec.command_test.groups(), &[vec!["ffmpeg -version".to_string()]]);
        assert!(video.is_available());
        assert!(video.is_enabled());
        assert_eq!(video.brief(), "Read and write video files");
        assert_eq!(video.description(), "Enables video support");
    }

    #[test]
    fn test_platform_keys_select_system_packages() {
        let features = parse_descriptor(DESCRIPTOR, "req_ios", "cmd_ios").unwrap();
        let spec = features[0].dependency_spec().unwrap();
        assert_eq!(spec.system_packages.get("ffmpeg"), Some(">;4.2"));

        let features = parse_descriptor(DESCRIPTOR, "req_win", "cmd_win").unwrap();
        assert!(features[0].dependency_spec().unwrap().system_packages.is_empty());
    }

    #[test]
    fn test_resources_available() {
        let features = parse_descriptor(DESCRIPTOR, "req_deb", "cmd_deb").unwrap();
        assert!(features[1].is_available());
        assert!(!features[1].is_enabled());
        assert!(features[2].is_enabled());
        assert_eq!(features[2].bundle(), Some("alignment"));
    }

    #[test]
    fn test_spin_off_version_coerced() {
        let features = parse_descriptor(DESCRIPTOR, "req_deb", "cmd_deb").unwrap();
        match features[3].details() {
            crate::FeatureDetails::SpinOff { url, version, .. } => {
                assert_eq!(url, "https://example.org/addons/");
                assert_eq!(version, "1.2");
            }
            other => panic!("unexpected details {other:?}"),
        }
        assert!(features[3].is_available());
    }

    #[test]
    fn test_spin_off_without_url_unavailable() {
        let text = "[addon]\ntype = \"spin\"\nversion = \"1.0\"\nenable = true\n";
        let features = parse_descriptor(text, "req_deb", "cmd_deb").unwrap();
        assert!(!features[0].is_available());
        assert!(!features[0].is_enabled());
    }

    #[test]
    fn test_dependency_without_artifacts_unavailable() {
        let text = "[ghost]\ntype = \"deps\"\nreq_deb = \"nil\"\nenable = true\n";
        let features = parse_descriptor(text, "req_deb", "cmd_deb").unwrap();
        assert!(!features[0].is_available());
        assert!(!features[0].is_enabled());
    }

    #[test]
    fn test_malformed_document() {
        assert!(matches!(
            parse_descriptor("[video\ntype = ", "req_deb", "cmd_deb"),
            Err(CatalogError::Malformed { .. })
        ));
        assert!(matches!(
            parse_descriptor("type = \"deps\"\n", "req_deb", "cmd_deb"),
            Err(CatalogError::Malformed { .. })
        ));
    }

    #[test]
    fn test_flag_values() {
        assert_eq!(flag(&Value::Boolean(true)), Some(true));
        assert_eq!(flag(&Value::String("No".to_string())), Some(false));
        assert_eq!(flag(&Value::Integer(0)), Some(false));
        assert_eq!(flag(&Value::String("maybe".to_string())), None);
    }

    #[test]
    fn test_array_values_joined() {
        let text = "[video]\ntype = \"deps\"\npip = [\"numpy:>=1.2\", \"scipy\"]\n";
        let features = parse_descriptor(text, "req_deb", "cmd_deb").unwrap();
        assert_eq!(features[0].dependency_spec().unwrap().runtime_packages.len(), 2);
    }
}
