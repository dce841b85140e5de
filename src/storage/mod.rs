//! Storage layer for Keelson data.
//!
//! Everything lives in one SQLite database (`keelson.db`) under the data
//! directory, next to a `files/` directory holding binary resources and an
//! optional session `config.kdl`.
//!
//! Entity CRUD is implemented on [`Records`], a borrowed view over a
//! connection. [`Storage::records`] hands one out for plain reads and writes;
//! the duplication engine builds one over an open transaction instead so that
//! every write it makes commits or rolls back together.

pub mod files;
pub mod projects;
pub mod sharing;
pub mod tasks;

pub use files::FileStore;
pub use projects::ProjectOptions;

use crate::config::KeelsonConfig;
use crate::{Error, Result};
use kdl::KdlDocument;
use rusqlite::types::Type;
use rusqlite::{Connection, Row, Transaction};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "KEELSON_DATA_DIR";

/// Database file name inside the data directory.
pub const DB_FILE: &str = "keelson.db";

/// Storage manager for one data directory.
pub struct Storage {
    /// Root directory for this store's data
    pub root: PathBuf,
    /// SQLite connection
    conn: Connection,
}

impl Storage {
    /// Open existing storage in the default data directory.
    pub fn open() -> Result<Self> {
        Self::open_with_data_dir(&get_data_dir()?)
    }

    /// Initialize storage in the default data directory.
    pub fn init() -> Result<Self> {
        Self::init_with_data_dir(&get_data_dir()?)
    }

    /// Check if storage exists in the default data directory.
    pub fn exists() -> Result<bool> {
        Self::exists_with_data_dir(&get_data_dir()?)
    }

    /// Open existing storage rooted at `data_dir`.
    pub fn open_with_data_dir(data_dir: &Path) -> Result<Self> {
        let db_path = data_dir.join(DB_FILE);
        if !db_path.exists() {
            return Err(Error::NotInitialized);
        }

        let conn = Self::connect(&db_path)?;
        Self::init_schema(&conn)?;

        Ok(Self {
            root: data_dir.to_path_buf(),
            conn,
        })
    }

    /// Initialize storage rooted at `data_dir`. Safe to call on existing storage.
    pub fn init_with_data_dir(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir)?;
        fs::create_dir_all(data_dir.join("files"))?;

        let conn = Self::connect(&data_dir.join(DB_FILE))?;
        Self::init_schema(&conn)?;

        Ok(Self {
            root: data_dir.to_path_buf(),
            conn,
        })
    }

    /// Check if storage exists at `data_dir`.
    pub fn exists_with_data_dir(data_dir: &Path) -> Result<bool> {
        Ok(data_dir.join(DB_FILE).exists())
    }

    fn connect(db_path: &Path) -> Result<Connection> {
        let conn = Connection::open(db_path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        conn.query_row("PRAGMA journal_mode=WAL", [], |_| Ok(()))?;
        conn.execute("PRAGMA foreign_keys=ON", [])?;
        Ok(conn)
    }

    /// Initialize the SQLite schema.
    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                name TEXT,
                email TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS teams (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                created_by INTEGER NOT NULL REFERENCES users(id),
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS team_members (
                team_id INTEGER NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                PRIMARY KEY (team_id, user_id)
            );

            CREATE TABLE IF NOT EXISTS labels (
                id INTEGER PRIMARY KEY,
                title TEXT NOT NULL,
                hex_color TEXT,
                created_by INTEGER NOT NULL REFERENCES users(id),
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS files (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                mime TEXT,
                size INTEGER NOT NULL,
                checksum TEXT NOT NULL,
                created_by INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS projects (
                id INTEGER PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                identifier TEXT NOT NULL DEFAULT '',
                hex_color TEXT,
                owner_id INTEGER NOT NULL REFERENCES users(id),
                parent_project_id INTEGER REFERENCES projects(id) ON DELETE CASCADE,
                position REAL NOT NULL DEFAULT 0,
                is_archived INTEGER NOT NULL DEFAULT 0,
                is_favorite INTEGER NOT NULL DEFAULT 0,
                background_file_id INTEGER REFERENCES files(id) ON DELETE SET NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_projects_identifier
                ON projects(identifier) WHERE identifier != '';
            CREATE INDEX IF NOT EXISTS idx_projects_parent ON projects(parent_project_id);

            -- project_views and buckets reference each other; SQLite resolves
            -- foreign keys at write time so the forward reference is fine.
            CREATE TABLE IF NOT EXISTS project_views (
                id INTEGER PRIMARY KEY,
                project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                title TEXT NOT NULL,
                kind TEXT NOT NULL,
                position REAL NOT NULL DEFAULT 0,
                filter TEXT,
                bucket_configuration_mode TEXT NOT NULL DEFAULT 'none',
                default_bucket_id INTEGER REFERENCES buckets(id) ON DELETE SET NULL,
                done_bucket_id INTEGER REFERENCES buckets(id) ON DELETE SET NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS buckets (
                id INTEGER PRIMARY KEY,
                view_id INTEGER NOT NULL REFERENCES project_views(id) ON DELETE CASCADE,
                title TEXT NOT NULL,
                task_limit INTEGER NOT NULL DEFAULT 0,
                position REAL NOT NULL DEFAULT 0,
                created_by INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_views_project ON project_views(project_id);
            CREATE INDEX IF NOT EXISTS idx_buckets_view ON buckets(view_id);

            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY,
                project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                done INTEGER NOT NULL DEFAULT 0,
                done_at TEXT,
                due_date TEXT,
                start_date TEXT,
                end_date TEXT,
                priority INTEGER NOT NULL DEFAULT 0,
                percent_done REAL NOT NULL DEFAULT 0,
                hex_color TEXT,
                repeat_after INTEGER NOT NULL DEFAULT 0,
                task_index INTEGER NOT NULL DEFAULT 0,
                uid TEXT NOT NULL UNIQUE,
                bucket_id INTEGER REFERENCES buckets(id) ON DELETE SET NULL,
                cover_image_attachment_id INTEGER REFERENCES task_attachments(id) ON DELETE SET NULL,
                created_by INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_tasks_project ON tasks(project_id);

            CREATE TABLE IF NOT EXISTS task_attachments (
                id INTEGER PRIMARY KEY,
                task_id INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
                file_id INTEGER NOT NULL REFERENCES files(id),
                created_by INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS label_tasks (
                task_id INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
                label_id INTEGER NOT NULL REFERENCES labels(id) ON DELETE CASCADE,
                created_at TEXT NOT NULL,
                PRIMARY KEY (task_id, label_id)
            );

            CREATE TABLE IF NOT EXISTS task_assignees (
                task_id INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at TEXT NOT NULL,
                PRIMARY KEY (task_id, user_id)
            );

            CREATE TABLE IF NOT EXISTS task_comments (
                id INTEGER PRIMARY KEY,
                task_id INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
                author_id INTEGER NOT NULL REFERENCES users(id),
                comment TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS task_reminders (
                id INTEGER PRIMARY KEY,
                task_id INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
                reminder TEXT NOT NULL,
                relative_period INTEGER NOT NULL DEFAULT 0,
                relative_to TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS task_relations (
                id INTEGER PRIMARY KEY,
                task_id INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
                other_task_id INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
                relation_kind TEXT NOT NULL,
                created_by INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE (task_id, other_task_id, relation_kind)
            );

            CREATE TABLE IF NOT EXISTS task_buckets (
                task_id INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
                bucket_id INTEGER NOT NULL REFERENCES buckets(id) ON DELETE CASCADE,
                view_id INTEGER NOT NULL REFERENCES project_views(id) ON DELETE CASCADE,
                PRIMARY KEY (task_id, view_id)
            );

            CREATE TABLE IF NOT EXISTS task_positions (
                task_id INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
                view_id INTEGER NOT NULL REFERENCES project_views(id) ON DELETE CASCADE,
                position REAL NOT NULL,
                PRIMARY KEY (task_id, view_id)
            );

            CREATE INDEX IF NOT EXISTS idx_attachments_task ON task_attachments(task_id);
            CREATE INDEX IF NOT EXISTS idx_comments_task ON task_comments(task_id);
            CREATE INDEX IF NOT EXISTS idx_relations_task ON task_relations(task_id);

            CREATE TABLE IF NOT EXISTS project_users (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                permission INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (user_id, project_id)
            );

            CREATE TABLE IF NOT EXISTS project_teams (
                id INTEGER PRIMARY KEY,
                team_id INTEGER NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
                project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                permission INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (team_id, project_id)
            );

            CREATE TABLE IF NOT EXISTS link_shares (
                id INTEGER PRIMARY KEY,
                hash TEXT NOT NULL UNIQUE,
                name TEXT,
                project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                permission INTEGER NOT NULL DEFAULT 0,
                sharing_type INTEGER NOT NULL DEFAULT 0,
                password_hash TEXT,
                shared_by INTEGER NOT NULL REFERENCES users(id),
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_project_users_project ON project_users(project_id);
            CREATE INDEX IF NOT EXISTS idx_project_teams_project ON project_teams(project_id);
            CREATE INDEX IF NOT EXISTS idx_link_shares_project ON link_shares(project_id);
            "#,
        )?;

        // Run migrations for schema changes
        Self::run_migrations(conn)?;

        Ok(())
    }

    /// Run database migrations for schema changes.
    /// This handles adding new columns to existing databases.
    fn run_migrations(conn: &Connection) -> Result<()> {
        // Migration: add background_blur_hash to projects.
        // SQLite doesn't support IF NOT EXISTS for ALTER TABLE, so we check the schema first
        let has_blur_hash: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM pragma_table_info('projects') WHERE name = 'background_blur_hash'",
            [],
            |row| row.get(0),
        )?;

        if !has_blur_hash {
            conn.execute(
                "ALTER TABLE projects ADD COLUMN background_blur_hash TEXT",
                [],
            )?;
        }

        Ok(())
    }

    /// Entity records on the storage connection.
    pub fn records(&self) -> Records<'_> {
        Records::new(&self.conn)
    }

    /// Begin a transaction on the storage connection.
    ///
    /// Dropping the transaction without committing rolls it back.
    pub fn transaction(&mut self) -> Result<Transaction<'_>> {
        Ok(self.conn.transaction()?)
    }

    /// Get the root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Default directory for binary resources.
    pub fn files_dir(&self) -> PathBuf {
        self.root.join("files")
    }

    // === Config Operations ===

    /// Path of the session config.kdl.
    pub fn config_kdl_path(&self) -> PathBuf {
        self.root.join("config.kdl")
    }

    /// Path of the system config.kdl (`~/.config/keelson/config.kdl`).
    pub fn system_config_kdl_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("keelson").join("config.kdl"))
    }

    /// Read the session config, empty when the file is absent.
    pub fn read_keelson_config(&self) -> Result<KeelsonConfig> {
        read_config_file(&self.config_kdl_path())
    }

    /// Read the system config, empty when the file is absent.
    pub fn read_system_keelson_config() -> Result<KeelsonConfig> {
        match Self::system_config_kdl_path() {
            Some(path) => read_config_file(&path),
            None => Ok(KeelsonConfig::default()),
        }
    }

    /// Write the session config.
    pub fn write_keelson_config(&self, config: &KeelsonConfig) -> Result<()> {
        config.validate().map_err(Error::Config)?;
        fs::write(self.config_kdl_path(), config.to_kdl().to_string())?;
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<KeelsonConfig> {
    if !path.exists() {
        return Ok(KeelsonConfig::default());
    }
    let text = fs::read_to_string(path)?;
    let doc: KdlDocument = text
        .parse()
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
    let config = KeelsonConfig::from_kdl(&doc)
        .and_then(|config| config.validate().map(|()| config))
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
    Ok(config)
}

/// Get the data directory.
///
/// Uses `KEELSON_DATA_DIR` when set, otherwise `~/.local/share/keelson/`.
pub fn get_data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
        if !dir.is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }

    let data_dir = dirs::data_dir()
        .ok_or_else(|| Error::Other("Could not determine data directory".to_string()))?;

    Ok(data_dir.join("keelson"))
}

/// Entity records on a borrowed connection (or transaction).
///
/// The CRUD methods live in the `projects`, `tasks`, `sharing` and `files`
/// submodules.
#[derive(Clone, Copy)]
pub struct Records<'c> {
    conn: &'c Connection,
}

impl<'c> Records<'c> {
    /// Wrap a connection. A `rusqlite::Transaction` derefs to one.
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// The underlying connection.
    pub fn conn(&self) -> &'c Connection {
        self.conn
    }

    /// Run a query bound to a single id and collect every row.
    pub(crate) fn collect<T>(
        &self,
        sql: &str,
        id: i64,
        map: fn(&Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<Vec<T>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map([id], map)?
            .collect::<rusqlite::Result<Vec<T>>>()?;
        Ok(rows)
    }
}

/// Read a TEXT column holding an enum's `Display` form.
pub(crate) fn text_enum<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>().map_err(|e| conversion_error(idx, Type::Text, e))
}

/// Read an optional TEXT column holding an enum's `Display` form.
pub(crate) fn opt_text_enum<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr<Err = String>,
{
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| s.parse::<T>().map_err(|e| conversion_error(idx, Type::Text, e)))
        .transpose()
}

pub(crate) fn conversion_error(idx: usize, ty: Type, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, ty, Box::new(Error::InvalidInput(message)))
}

/// Map a unique-constraint violation to `UniqueConstraintConflict`.
pub(crate) fn unique_violation(err: rusqlite::Error, what: impl FnOnce() -> String) -> Error {
    match &err {
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            Error::UniqueConstraintConflict(what())
        }
        _ => Error::Database(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestEnv;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_storage_init() {
        let env = TestEnv::new();
        let storage = env.init_storage();

        assert!(storage.root.join(DB_FILE).exists());
        assert!(storage.files_dir().exists());
    }

    #[test]
    fn test_storage_exists() {
        let temp_dir = TempDir::new().unwrap();
        assert!(!Storage::exists_with_data_dir(temp_dir.path()).unwrap());

        Storage::init_with_data_dir(temp_dir.path()).unwrap();
        assert!(Storage::exists_with_data_dir(temp_dir.path()).unwrap());
    }

    #[test]
    fn test_open_uninitialized_fails() {
        let temp_dir = TempDir::new().unwrap();
        let result = Storage::open_with_data_dir(temp_dir.path());
        assert!(matches!(result, Err(Error::NotInitialized)));
    }

    #[test]
    fn test_init_is_idempotent() {
        let env = TestEnv::new();
        let storage = env.init_storage();
        crate::test_utils::add_user(&storage, "ana");
        drop(storage);

        let storage = env.init_storage();
        let user = storage.records().get_user(1).unwrap();
        assert_eq!(user.username, "ana");
    }

    #[test]
    fn test_migration_adds_blur_hash_column() {
        let env = TestEnv::new();
        let storage = env.init_storage();

        // Simulate an "old" database by dropping the column
        storage
            .conn
            .execute("ALTER TABLE projects DROP COLUMN background_blur_hash", [])
            .ok(); // older SQLite builds may not support DROP COLUMN, that's fine
        drop(storage);

        let storage = env.open_storage();
        let has_column: bool = storage
            .conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM pragma_table_info('projects') WHERE name = 'background_blur_hash'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!(has_column);
    }

    #[test]
    fn test_dropped_transaction_rolls_back() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        {
            let tx = storage.transaction().unwrap();
            Records::new(&tx)
                .create_user(&crate::models::User::new("ghost"))
                .unwrap();
        }
        assert!(storage.records().get_user(1).is_err());
    }

    #[test]
    #[serial]
    fn test_data_dir_env_override() {
        let temp_dir = TempDir::new().unwrap();
        // SAFETY: serialized with the other env-mutating tests
        unsafe { std::env::set_var(DATA_DIR_ENV, temp_dir.path()) };
        let dir = get_data_dir().unwrap();
        unsafe { std::env::remove_var(DATA_DIR_ENV) };
        assert_eq!(dir, temp_dir.path());
    }

    #[test]
    fn test_session_config_roundtrip() {
        let env = TestEnv::new();
        let storage = env.init_storage();

        let config = KeelsonConfig {
            title_suffix: Some(" (copy)".to_string()),
            share_token_length: Some(32),
            ..Default::default()
        };
        storage.write_keelson_config(&config).unwrap();

        let read = storage.read_keelson_config().unwrap();
        assert_eq!(read, config);
    }

    #[test]
    fn test_invalid_session_config_is_rejected() {
        let env = TestEnv::new();
        let storage = env.init_storage();
        fs::write(storage.config_kdl_path(), "share-token-length 4\n").unwrap();

        assert!(matches!(
            storage.read_keelson_config(),
            Err(Error::Config(_))
        ));
    }
}
