//! KDL schema for config.kdl.
//!
//! This module provides:
//! - The Rust struct representing the KDL schema
//! - Serialization/deserialization to/from KDL format
//! - Validation

use kdl::{KdlDocument, KdlEntry, KdlNode, KdlValue};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Shortest share-link token the config accepts.
pub const MIN_SHARE_TOKEN_LENGTH: u32 = 16;
/// Longest share-link token the config accepts.
pub const MAX_SHARE_TOKEN_LENGTH: u32 = 64;

/// Output format preference for CLI commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// JSON output (default, machine-readable)
    #[default]
    Json,
    /// Human-readable output
    Human,
}

impl OutputFormat {
    /// Parse from string, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(OutputFormat::Json),
            "human" => Some(OutputFormat::Human),
            _ => None,
        }
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Human => "human",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Preferences stored in config.kdl.
///
/// # KDL Schema
///
/// ```kdl
/// title-suffix " - duplicate"
/// output-format "human"  // or "json"
/// log-level "info"
/// share-token-length 40
/// files-dir "/var/lib/keelson/files"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeelsonConfig {
    /// Appended to the title of duplicated projects
    pub title_suffix: Option<String>,

    /// Default output format for CLI commands
    pub output_format: Option<OutputFormat>,

    /// Log filter used when KEELSON_LOG is unset (e.g. "info", "keelson=debug")
    pub log_level: Option<String>,

    /// Length of generated share-link tokens
    pub share_token_length: Option<u32>,

    /// Directory holding binary resources
    pub files_dir: Option<PathBuf>,
}

impl KeelsonConfig {
    /// Create an empty config with no values set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the config values.
    ///
    /// Returns an error message if any value is invalid.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(length) = self.share_token_length {
            if !(MIN_SHARE_TOKEN_LENGTH..=MAX_SHARE_TOKEN_LENGTH).contains(&length) {
                return Err(format!(
                    "share-token-length must be {}-{}, got {}",
                    MIN_SHARE_TOKEN_LENGTH, MAX_SHARE_TOKEN_LENGTH, length
                ));
            }
        }
        if let Some(ref level) = self.log_level {
            if level.trim().is_empty() {
                return Err("log-level cannot be empty".to_string());
            }
        }
        if let Some(ref dir) = self.files_dir {
            if dir.as_os_str().is_empty() {
                return Err("files-dir cannot be empty".to_string());
            }
        }
        Ok(())
    }

    /// Parse config from a KDL document.
    ///
    /// Fails on a value of the wrong type or an unknown output format; range
    /// checks are left to [`KeelsonConfig::validate`].
    pub fn from_kdl(doc: &KdlDocument) -> Result<Self, String> {
        let mut config = Self::new();

        config.title_suffix = string_value(doc, "title-suffix")?;

        if let Some(format) = string_value(doc, "output-format")? {
            config.output_format = Some(
                OutputFormat::parse(&format)
                    .ok_or_else(|| format!("output-format must be json or human, got {}", format))?,
            );
        }

        config.log_level = string_value(doc, "log-level")?;

        if let Some(node) = doc.get("share-token-length") {
            if let Some(entry) = node.entries().first() {
                let length = entry
                    .value()
                    .as_integer()
                    .ok_or_else(|| "share-token-length must be an integer".to_string())?;
                config.share_token_length = Some(
                    u32::try_from(length)
                        .map_err(|_| format!("share-token-length out of range: {}", length))?,
                );
            }
        }

        config.files_dir = string_value(doc, "files-dir")?.map(PathBuf::from);

        Ok(config)
    }

    /// Convert config to a KDL document.
    pub fn to_kdl(&self) -> KdlDocument {
        let mut doc = KdlDocument::new();

        if let Some(ref suffix) = self.title_suffix {
            push_string(&mut doc, "title-suffix", suffix.clone());
        }

        if let Some(format) = self.output_format {
            push_string(&mut doc, "output-format", format.as_str().to_string());
        }

        if let Some(ref level) = self.log_level {
            push_string(&mut doc, "log-level", level.clone());
        }

        if let Some(length) = self.share_token_length {
            let mut node = KdlNode::new("share-token-length");
            node.push(KdlEntry::new(KdlValue::Integer(length as i128)));
            doc.nodes_mut().push(node);
        }

        if let Some(ref dir) = self.files_dir {
            push_string(&mut doc, "files-dir", dir.display().to_string());
        }

        doc
    }

    /// Merge another config into this one.
    /// Values from `other` override values in `self` if they are Some.
    pub fn merge(&mut self, other: &KeelsonConfig) {
        if other.title_suffix.is_some() {
            self.title_suffix = other.title_suffix.clone();
        }
        if other.output_format.is_some() {
            self.output_format = other.output_format;
        }
        if other.log_level.is_some() {
            self.log_level = other.log_level.clone();
        }
        if other.share_token_length.is_some() {
            self.share_token_length = other.share_token_length;
        }
        if other.files_dir.is_some() {
            self.files_dir = other.files_dir.clone();
        }
    }
}

fn string_value(doc: &KdlDocument, name: &str) -> Result<Option<String>, String> {
    let Some(node) = doc.get(name) else {
        return Ok(None);
    };
    match node.entries().first() {
        Some(entry) => entry
            .value()
            .as_string()
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| format!("{} must be a string", name)),
        None => Ok(None),
    }
}

fn push_string(doc: &mut KdlDocument, name: &str, value: String) {
    let mut node = KdlNode::new(name);
    node.push(KdlEntry::new(KdlValue::String(value)));
    doc.nodes_mut().push(node);
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== OutputFormat Tests ====================

    #[test]
    fn test_output_format_from_str() {
        assert_eq!(OutputFormat::parse("json"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::parse("HUMAN"), Some(OutputFormat::Human));
        assert_eq!(OutputFormat::parse("yaml"), None);
    }

    #[test]
    fn test_output_format_display() {
        assert_eq!(format!("{}", OutputFormat::Json), "json");
        assert_eq!(format!("{}", OutputFormat::Human), "human");
    }

    // ==================== KeelsonConfig Tests ====================

    #[test]
    fn test_config_default() {
        let config = KeelsonConfig::default();
        assert_eq!(config.title_suffix, None);
        assert_eq!(config.output_format, None);
        assert_eq!(config.share_token_length, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validate_token_length() {
        let config = KeelsonConfig {
            share_token_length: Some(65),
            ..Default::default()
        };
        let result = config.validate();
        assert!(result.unwrap_err().contains("share-token-length must be 16-64"));

        let config = KeelsonConfig {
            share_token_length: Some(16),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_kdl_full() {
        let kdl = r#"
            title-suffix " (copy)"
            output-format "human"
            log-level "keelson=debug"
            share-token-length 32
            files-dir "/srv/keelson/files"
        "#;
        let doc: KdlDocument = kdl.parse().unwrap();
        let config = KeelsonConfig::from_kdl(&doc).unwrap();

        assert_eq!(config.title_suffix.as_deref(), Some(" (copy)"));
        assert_eq!(config.output_format, Some(OutputFormat::Human));
        assert_eq!(config.log_level.as_deref(), Some("keelson=debug"));
        assert_eq!(config.share_token_length, Some(32));
        assert_eq!(config.files_dir, Some(PathBuf::from("/srv/keelson/files")));
    }

    #[test]
    fn test_config_from_kdl_rejects_unknown_format() {
        let doc: KdlDocument = "output-format \"yaml\"".parse().unwrap();
        assert!(KeelsonConfig::from_kdl(&doc).is_err());
    }

    #[test]
    fn test_config_from_kdl_rejects_wrong_type() {
        let doc: KdlDocument = "share-token-length \"long\"".parse().unwrap();
        assert!(KeelsonConfig::from_kdl(&doc).is_err());

        let doc: KdlDocument = "title-suffix 3".parse().unwrap();
        assert!(KeelsonConfig::from_kdl(&doc).is_err());
    }

    #[test]
    fn test_config_to_kdl_roundtrip() {
        let config = KeelsonConfig {
            title_suffix: Some(" - copy".to_string()),
            output_format: Some(OutputFormat::Json),
            log_level: None,
            share_token_length: Some(48),
            files_dir: Some(PathBuf::from("/tmp/files")),
        };
        let doc = config.to_kdl();
        let reparsed: KdlDocument = doc.to_string().parse().unwrap();
        assert_eq!(KeelsonConfig::from_kdl(&reparsed).unwrap(), config);
    }

    #[test]
    fn test_config_merge() {
        let mut base = KeelsonConfig {
            title_suffix: Some(" - duplicate".to_string()),
            output_format: Some(OutputFormat::Json),
            ..Default::default()
        };
        let overlay = KeelsonConfig {
            output_format: Some(OutputFormat::Human),
            share_token_length: Some(20),
            ..Default::default()
        };
        base.merge(&overlay);

        assert_eq!(base.title_suffix.as_deref(), Some(" - duplicate"));
        assert_eq!(base.output_format, Some(OutputFormat::Human));
        assert_eq!(base.share_token_length, Some(20));
    }
}
