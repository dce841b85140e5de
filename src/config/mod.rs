//! Configuration for Keelson.
//!
//! ## config.kdl - User preferences
//!
//! Located at:
//! - System: `~/.config/keelson/config.kdl`
//! - Session: `<data-dir>/config.kdl`
//!
//! Contains:
//! - `title-suffix` - Appended to the title of duplicated projects
//! - `output-format` - "json" or "human"
//! - `log-level` - Log filter used when `KEELSON_LOG` is unset
//! - `share-token-length` - Length of regenerated share-link tokens (16-64)
//! - `files-dir` - Directory holding attachment and background blobs
//!
//! ## Precedence
//!
//! CLI flag > session config > system config > defaults
//!
//! Use the [`resolver`] module for precedence resolution.

pub mod resolver;
pub mod schema;

pub use resolver::{
    ConfigOverrides, DEFAULT_LOG_LEVEL, Resolved, ResolvedConfig, ValueSource, resolve_config,
    resolve_from,
};
pub use schema::{KeelsonConfig, MAX_SHARE_TOKEN_LENGTH, MIN_SHARE_TOKEN_LENGTH, OutputFormat};
