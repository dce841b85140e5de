//! Common test utilities for keelson integration tests.
//!
//! Provides `TestEnv` for isolated test environments that don't pollute
//! the user's `~/.local/share/keelson/` directory.

#![allow(dead_code)]

use assert_cmd::Command;
use chrono::Utc;
use keelson::models::{
    Assignee, Attachment, Bucket, LinkShare, Permission, Project, SharingType, Task, User, View,
    ViewKind,
};
use keelson::storage::{FileStore, ProjectOptions, Storage};
pub use tempfile::TempDir;

/// A test environment with isolated data storage.
///
/// The `keelson()` method returns a `Command` that sets `KEELSON_DATA_DIR`
/// per-invocation, making tests parallel-safe.
pub struct TestEnv {
    pub data_dir: TempDir,
}

impl TestEnv {
    /// Create a new test environment with an isolated data directory.
    pub fn new() -> Self {
        Self {
            data_dir: TempDir::new().unwrap(),
        }
    }

    /// Create a new test environment and initialize keelson through the CLI.
    pub fn init() -> Self {
        let env = Self::new();
        env.keelson().args(["system", "init"]).assert().success();
        env
    }

    /// Get a Command for the keelson binary with isolated data directory.
    pub fn keelson(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_keelson"));
        cmd.env("KEELSON_DATA_DIR", self.data_dir.path());
        cmd.env_remove("KEELSON_LOG");
        cmd
    }

    /// Get the path to the data directory.
    pub fn data_path(&self) -> &std::path::Path {
        self.data_dir.path()
    }

    /// Open (creating if needed) the store in this environment.
    pub fn storage(&self) -> Storage {
        Storage::init_with_data_dir(self.data_path()).unwrap()
    }

    /// The file store used by default for this environment.
    pub fn file_store(&self) -> FileStore {
        FileStore::new(self.data_path().join("files"))
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

// === Seeding helpers ===

pub fn user(storage: &Storage, username: &str) -> i64 {
    storage.records().create_user(&User::new(username)).unwrap().id
}

pub fn project(storage: &Storage, title: &str, owner: i64) -> Project {
    storage
        .records()
        .create_project(&Project::new(title, owner), ProjectOptions::bare())
        .unwrap()
}

pub fn kanban(storage: &Storage, project_id: i64, buckets: &[&str], owner: i64) -> (View, Vec<Bucket>) {
    let records = storage.records();
    let view = records
        .create_view(&View::new(project_id, "Kanban", ViewKind::Kanban))
        .unwrap();
    let buckets: Vec<Bucket> = buckets
        .iter()
        .map(|title| records.create_bucket(&Bucket::new(view.id, *title, owner)).unwrap())
        .collect();
    (view, buckets)
}

pub fn task(storage: &Storage, project_id: i64, title: &str, owner: i64) -> Task {
    storage
        .records()
        .create_task(&Task::new(project_id, title, owner), owner, false)
        .unwrap()
}

pub fn assign(storage: &Storage, task_id: i64, user_id: i64) {
    storage
        .records()
        .add_assignee(&Assignee {
            task_id,
            user_id,
            created_at: Utc::now(),
        })
        .unwrap();
}

/// Store a blob and attach it to a task, returning the attachment.
pub fn attach(
    storage: &Storage,
    files: &FileStore,
    task_id: i64,
    name: &str,
    content: &[u8],
    owner: i64,
) -> Attachment {
    let records = storage.records();
    let file = files
        .put(records.conn(), name, Some("application/octet-stream"), content, owner)
        .unwrap();
    records
        .add_attachment(&Attachment {
            id: 0,
            task_id,
            file_id: file.id,
            created_by: owner,
            created_at: Utc::now(),
        })
        .unwrap()
}

pub fn grant(storage: &Storage, user_id: i64, project_id: i64, permission: Permission) {
    storage
        .records()
        .add_user_grant(user_id, project_id, permission)
        .unwrap();
}

pub fn share(storage: &Storage, project_id: i64, hash: &str, owner: i64) -> LinkShare {
    let now = Utc::now();
    storage
        .records()
        .create_link_share(&LinkShare {
            id: 0,
            hash: hash.to_string(),
            name: None,
            project_id,
            permission: Permission::Read,
            sharing_type: SharingType::WithoutPassword,
            password_hash: None,
            shared_by: owner,
            created_at: now,
            updated_at: now,
        })
        .unwrap()
}

/// Count rows in a table.
pub fn count(storage: &Storage, table: &str) -> i64 {
    storage
        .records()
        .conn()
        .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
        .unwrap()
}
