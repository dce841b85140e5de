//! Command implementations for the Keelson CLI.
//!
//! Each command opens the store under the given data directory, does its
//! work and returns a result that can be printed as JSON or for humans.

use crate::access::GrantPolicy;
use crate::config::{ConfigOverrides, ResolvedConfig, resolve_config};
use crate::duplicate::{DuplicateRequest, Duplication, Duplicator, RandomTokens};
use crate::models::{Principal, ProjectDetail};
use crate::storage::{DB_FILE, FileStore, Storage};
use crate::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Command results that can be serialized to JSON or formatted for humans.
pub trait Output {
    /// Serialize to JSON string.
    fn to_json(&self) -> String;

    /// Format for human-readable output.
    fn to_human(&self) -> String;
}

fn json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| format!(r#"{{"error": "{}"}}"#, e))
}

// === System Commands ===

#[derive(Serialize)]
pub struct InitResult {
    pub initialized: bool,
    pub data_dir: PathBuf,
    pub database: PathBuf,
    pub files_dir: PathBuf,
}

impl Output for InitResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        if self.initialized {
            format!("Initialized keelson at {}", self.data_dir.display())
        } else {
            format!("Keelson already initialized at {}", self.data_dir.display())
        }
    }
}

/// Create the data directory, database and files directory.
pub fn system_init(data_dir: &Path) -> Result<InitResult> {
    let existed = Storage::exists_with_data_dir(data_dir)?;
    let storage = Storage::init_with_data_dir(data_dir)?;
    tracing::debug!(data_dir = %data_dir.display(), existed, "storage ready");

    Ok(InitResult {
        initialized: !existed,
        data_dir: storage.root().to_path_buf(),
        database: storage.root().join(DB_FILE),
        files_dir: storage.files_dir(),
    })
}

// === Project Commands ===

#[derive(Serialize)]
#[serde(transparent)]
pub struct ProjectShow {
    pub detail: ProjectDetail,
}

fn format_project(detail: &ProjectDetail) -> String {
    let project = &detail.project;
    let mut lines = vec![format!("[{}] {}", project.id, project.title)];
    if !project.identifier.is_empty() {
        lines.push(format!("  Identifier: {}", project.identifier));
    }
    lines.push(format!("  Owner: {} ({})", detail.owner.username, detail.owner.id));
    if let Some(parent) = project.parent_project_id {
        lines.push(format!("  Parent: {}", parent));
    }
    lines.push(format!("  Tasks: {}", detail.task_count));
    for view in &detail.views {
        lines.push(format!(
            "  View [{}] {} ({})",
            view.view.id, view.view.title, view.view.kind
        ));
        for bucket in &view.buckets {
            lines.push(format!("    Bucket [{}] {}", bucket.id, bucket.title));
        }
    }
    lines.join("\n")
}

impl Output for ProjectShow {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        format_project(&self.detail)
    }
}

/// Load a project with owner, views and buckets.
pub fn project_show(data_dir: &Path, id: i64) -> Result<ProjectShow> {
    let storage = Storage::open_with_data_dir(data_dir)?;
    let detail = storage.records().project_detail(id)?;
    Ok(ProjectShow { detail })
}

#[derive(Serialize)]
#[serde(transparent)]
pub struct DuplicateResult {
    pub duplication: Duplication,
}

impl Output for DuplicateResult {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let report = &self.duplication.report;
        let mut out = format!(
            "Duplicated into project {}\n{}",
            self.duplication.project.project.id,
            format_project(&self.duplication.project)
        );
        if report.total_skipped() > 0 {
            out.push_str("\n  Skipped:");
            for (kind, count) in &report.skipped {
                out.push_str(&format!("\n    {}: {}", kind, count));
            }
        }
        out
    }
}

/// Duplicate a project on behalf of a user.
pub fn project_duplicate(
    data_dir: &Path,
    id: i64,
    as_user: i64,
    parent: i64,
    overrides: &ConfigOverrides,
) -> Result<DuplicateResult> {
    let mut storage = Storage::open_with_data_dir(data_dir)?;
    let config = resolve_config(&storage, overrides)?;
    storage.records().get_user(as_user)?;

    let duplicator = Duplicator::new(
        GrantPolicy,
        FileStore::new(config.files_dir().to_path_buf()),
        RandomTokens::new(config.share_token_length() as usize),
    )
    .with_title_suffix(config.title_suffix());

    let request = DuplicateRequest::new(id).with_parent(parent);
    let duplication =
        duplicator.duplicate_with_report(&mut storage, &request, &Principal::user(as_user))?;
    Ok(DuplicateResult { duplication })
}

// === Config Commands ===

#[derive(Serialize)]
#[serde(transparent)]
pub struct ConfigShow {
    pub config: ResolvedConfig,
}

impl Output for ConfigShow {
    fn to_json(&self) -> String {
        json(self)
    }

    fn to_human(&self) -> String {
        let c = &self.config;
        [
            format!("title-suffix = {:?} ({})", c.title_suffix(), c.title_suffix.source),
            format!("output-format = {} ({})", c.output_format(), c.output_format.source),
            format!("log-level = {} ({})", c.log_level(), c.log_level.source),
            format!(
                "share-token-length = {} ({})",
                c.share_token_length(),
                c.share_token_length.source
            ),
            format!("files-dir = {} ({})", c.files_dir().display(), c.files_dir.source),
        ]
        .join("\n")
    }
}

/// Resolve the configuration for the store under `data_dir`.
pub fn config_show(data_dir: &Path) -> Result<ConfigShow> {
    let storage = Storage::open_with_data_dir(data_dir)?;
    let config = resolve_config(&storage, &ConfigOverrides::new())?;
    Ok(ConfigShow { config })
}

/// Best-effort resolved config for startup decisions (output format, logging).
///
/// Falls back to defaults when the store is missing or a config file is invalid;
/// the command itself reports those errors.
pub fn startup_config(data_dir: &Path) -> ResolvedConfig {
    match Storage::open_with_data_dir(data_dir) {
        Ok(storage) => resolve_config(&storage, &ConfigOverrides::new())
            .unwrap_or_else(|_| ResolvedConfig::defaults(data_dir)),
        Err(_) => ResolvedConfig::defaults(data_dir),
    }
}
