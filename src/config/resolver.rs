//! Precedence resolution for configuration.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. CLI flags (passed at runtime)
//! 2. Session config.kdl (`<data-dir>/config.kdl`)
//! 3. System config.kdl (`~/.config/keelson/config.kdl`)
//! 4. Built-in defaults

use crate::Result;
use crate::config::{KeelsonConfig, OutputFormat};
use crate::duplicate::{DEFAULT_TITLE_SUFFIX, RandomTokens};
use crate::storage::Storage;
use serde::Serialize;
use std::path::PathBuf;

/// Default log filter when neither KEELSON_LOG nor the config sets one.
pub const DEFAULT_LOG_LEVEL: &str = "warn";

/// Tracks where a resolved value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    /// Value from session-level config
    Session,
    /// Value from system-level config
    System,
    /// Value from CLI flag
    CliFlag,
    /// Built-in default value
    Default,
}

impl std::fmt::Display for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueSource::Session => write!(f, "session"),
            ValueSource::System => write!(f, "system"),
            ValueSource::CliFlag => write!(f, "cli"),
            ValueSource::Default => write!(f, "default"),
        }
    }
}

impl Serialize for ValueSource {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A resolved value with its source.
#[derive(Debug, Clone, Serialize)]
pub struct Resolved<T> {
    /// The resolved value
    pub value: T,
    /// Where the value came from
    pub source: ValueSource,
}

impl<T> Resolved<T> {
    /// Create a new resolved value.
    pub fn new(value: T, source: ValueSource) -> Self {
        Self { value, source }
    }
}

/// Fully resolved configuration with source tracking.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    pub title_suffix: Resolved<String>,
    pub output_format: Resolved<OutputFormat>,
    pub log_level: Resolved<String>,
    pub share_token_length: Resolved<u32>,
    pub files_dir: Resolved<PathBuf>,
}

impl ResolvedConfig {
    /// Defaults for a store rooted at `data_dir`.
    pub fn defaults(data_dir: &std::path::Path) -> Self {
        Self {
            title_suffix: Resolved::new(DEFAULT_TITLE_SUFFIX.to_string(), ValueSource::Default),
            output_format: Resolved::new(OutputFormat::Json, ValueSource::Default),
            log_level: Resolved::new(DEFAULT_LOG_LEVEL.to_string(), ValueSource::Default),
            share_token_length: Resolved::new(
                RandomTokens::DEFAULT_LENGTH as u32,
                ValueSource::Default,
            ),
            files_dir: Resolved::new(data_dir.join("files"), ValueSource::Default),
        }
    }

    pub fn title_suffix(&self) -> &str {
        &self.title_suffix.value
    }

    pub fn output_format(&self) -> OutputFormat {
        self.output_format.value
    }

    pub fn log_level(&self) -> &str {
        &self.log_level.value
    }

    pub fn share_token_length(&self) -> u32 {
        self.share_token_length.value
    }

    pub fn files_dir(&self) -> &std::path::Path {
        &self.files_dir.value
    }
}

/// CLI overrides for configuration resolution.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Title suffix override from CLI flag
    pub title_suffix: Option<String>,
    /// Output format override from CLI flag
    pub output_format: Option<OutputFormat>,
}

impl ConfigOverrides {
    /// Create empty overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set title suffix override.
    pub fn with_title_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.title_suffix = Some(suffix.into());
        self
    }

    /// Set output format override.
    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = Some(format);
        self
    }
}

/// Pick the first value set, tagging where it came from.
fn pick<T: Clone>(
    cli: Option<&T>,
    session: Option<&T>,
    system: Option<&T>,
    default: Resolved<T>,
) -> Resolved<T> {
    if let Some(value) = cli {
        Resolved::new(value.clone(), ValueSource::CliFlag)
    } else if let Some(value) = session {
        Resolved::new(value.clone(), ValueSource::Session)
    } else if let Some(value) = system {
        Resolved::new(value.clone(), ValueSource::System)
    } else {
        default
    }
}

/// Resolve already-loaded configs for a store rooted at `data_dir`.
pub fn resolve_from(
    data_dir: &std::path::Path,
    system: &KeelsonConfig,
    session: &KeelsonConfig,
    overrides: &ConfigOverrides,
) -> ResolvedConfig {
    let defaults = ResolvedConfig::defaults(data_dir);

    ResolvedConfig {
        title_suffix: pick(
            overrides.title_suffix.as_ref(),
            session.title_suffix.as_ref(),
            system.title_suffix.as_ref(),
            defaults.title_suffix,
        ),
        output_format: pick(
            overrides.output_format.as_ref(),
            session.output_format.as_ref(),
            system.output_format.as_ref(),
            defaults.output_format,
        ),
        log_level: pick(
            None,
            session.log_level.as_ref(),
            system.log_level.as_ref(),
            defaults.log_level,
        ),
        share_token_length: pick(
            None,
            session.share_token_length.as_ref(),
            system.share_token_length.as_ref(),
            defaults.share_token_length,
        ),
        files_dir: pick(
            None,
            session.files_dir.as_ref(),
            system.files_dir.as_ref(),
            defaults.files_dir,
        ),
    }
}

/// Resolve configuration with full precedence chain.
///
/// Precedence (highest to lowest):
/// 1. CLI flags (from `overrides`)
/// 2. Session config.kdl
/// 3. System config.kdl
/// 4. Built-in defaults
pub fn resolve_config(storage: &Storage, overrides: &ConfigOverrides) -> Result<ResolvedConfig> {
    let system_config = Storage::read_system_keelson_config()?;
    let session_config = storage.read_keelson_config()?;
    Ok(resolve_from(
        storage.root(),
        &system_config,
        &session_config,
        overrides,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_defaults() {
        let resolved = resolve_from(
            Path::new("/data"),
            &KeelsonConfig::default(),
            &KeelsonConfig::default(),
            &ConfigOverrides::new(),
        );

        assert_eq!(resolved.title_suffix(), " - duplicate");
        assert_eq!(resolved.output_format(), OutputFormat::Json);
        assert_eq!(resolved.log_level(), "warn");
        assert_eq!(resolved.share_token_length(), 40);
        assert_eq!(resolved.files_dir(), Path::new("/data/files"));
        assert_eq!(resolved.title_suffix.source, ValueSource::Default);
    }

    #[test]
    fn test_session_overrides_system() {
        let system = KeelsonConfig {
            title_suffix: Some(" (system)".to_string()),
            share_token_length: Some(20),
            ..Default::default()
        };
        let session = KeelsonConfig {
            title_suffix: Some(" (session)".to_string()),
            ..Default::default()
        };

        let resolved = resolve_from(Path::new("/data"), &system, &session, &ConfigOverrides::new());

        assert_eq!(resolved.title_suffix(), " (session)");
        assert_eq!(resolved.title_suffix.source, ValueSource::Session);
        assert_eq!(resolved.share_token_length(), 20);
        assert_eq!(resolved.share_token_length.source, ValueSource::System);
    }

    #[test]
    fn test_cli_overrides_everything() {
        let session = KeelsonConfig {
            title_suffix: Some(" (session)".to_string()),
            output_format: Some(OutputFormat::Json),
            ..Default::default()
        };
        let overrides = ConfigOverrides::new()
            .with_title_suffix(" (cli)")
            .with_output_format(OutputFormat::Human);

        let resolved = resolve_from(
            Path::new("/data"),
            &KeelsonConfig::default(),
            &session,
            &overrides,
        );

        assert_eq!(resolved.title_suffix(), " (cli)");
        assert_eq!(resolved.title_suffix.source, ValueSource::CliFlag);
        assert_eq!(resolved.output_format(), OutputFormat::Human);
    }

    #[test]
    fn test_value_source_display() {
        assert_eq!(ValueSource::CliFlag.to_string(), "cli");
        assert_eq!(ValueSource::Session.to_string(), "session");
        assert_eq!(ValueSource::System.to_string(), "system");
        assert_eq!(ValueSource::Default.to_string(), "default");
    }
}
