//! Binary resources: a `files` metadata row plus a blob on disk.
//!
//! Blobs are stored flat under the files directory, named by file id.

use super::Records;
use crate::duplicate::{ResourceStore, StoredFile};
use crate::models::FileMeta;
use crate::{Error, Result};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, params};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::warn;

pub(crate) const FILE_COLUMNS: &str = "id, name, mime, size, checksum, created_by, created_at";

pub(crate) fn file_from_row(row: &Row<'_>) -> rusqlite::Result<FileMeta> {
    Ok(FileMeta {
        id: row.get(0)?,
        name: row.get(1)?,
        mime: row.get(2)?,
        size: row.get(3)?,
        checksum: row.get(4)?,
        created_by: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// Hex-encoded SHA-256 of a blob.
pub fn checksum(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

impl<'c> Records<'c> {
    // === File Operations ===

    /// Insert a file metadata row. The blob is written separately.
    pub fn insert_file(&self, meta: &FileMeta) -> Result<FileMeta> {
        if meta.name.is_empty() {
            return Err(Error::InvalidInput("File name cannot be empty".to_string()));
        }
        self.conn.execute(
            r#"
            INSERT INTO files (name, mime, size, checksum, created_by, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                meta.name,
                meta.mime,
                meta.size,
                meta.checksum,
                meta.created_by,
                meta.created_at,
            ],
        )?;
        Ok(FileMeta {
            id: self.conn.last_insert_rowid(),
            ..meta.clone()
        })
    }

    /// Find a file metadata row by id.
    pub fn find_file_meta(&self, id: i64) -> Result<Option<FileMeta>> {
        let sql = format!("SELECT {} FROM files WHERE id = ?1", FILE_COLUMNS);
        Ok(self.conn.query_row(&sql, [id], file_from_row).optional()?)
    }

    /// Get a file metadata row by id.
    pub fn get_file_meta(&self, id: i64) -> Result<FileMeta> {
        self.find_file_meta(id)?
            .ok_or_else(|| Error::NotFound(format!("File not found: {}", id)))
    }
}

/// File-backed resource store.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// A store keeping blobs under `dir`.
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// The directory holding the blobs.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where the blob for `file_id` lives.
    pub fn blob_path(&self, file_id: i64) -> PathBuf {
        self.dir.join(file_id.to_string())
    }

    /// Store new content under `name`, returning the created metadata.
    pub fn put(
        &self,
        conn: &Connection,
        name: &str,
        mime: Option<&str>,
        content: &[u8],
        created_by: i64,
    ) -> Result<FileMeta> {
        let meta = FileMeta {
            id: 0,
            name: name.to_string(),
            mime: mime.map(str::to_string),
            size: 0,
            checksum: String::new(),
            created_by,
            created_at: Utc::now(),
        };
        self.save(conn, &meta, content)
    }
}

impl FileStore {
    /// Content goes to a `.partial` file first and is renamed into place;
    /// the partial file is removed if either step fails.
    fn write_blob(&self, file_id: i64, content: &[u8]) -> Result<()> {
        let partial = self.dir.join(format!(".{}.partial", file_id));
        let written =
            fs::write(&partial, content).and_then(|()| fs::rename(&partial, self.blob_path(file_id)));

        if let Err(e) = written {
            match fs::remove_file(&partial) {
                Ok(()) => {}
                Err(cleanup) if cleanup.kind() == ErrorKind::NotFound => {}
                Err(cleanup) => {
                    warn!(file_id, error = %cleanup, "could not remove partial blob");
                }
            }
            return Err(e.into());
        }
        Ok(())
    }
}

impl ResourceStore for FileStore {
    fn load(&self, conn: &Connection, file_id: i64) -> Result<Option<StoredFile>> {
        let Some(meta) = Records::new(conn).find_file_meta(file_id)? else {
            return Ok(None);
        };
        match fs::read(self.blob_path(file_id)) {
            Ok(content) => Ok(Some(StoredFile { meta, content })),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, conn: &Connection, meta: &FileMeta, content: &[u8]) -> Result<FileMeta> {
        let saved = Records::new(conn).insert_file(&FileMeta {
            size: content.len() as i64,
            checksum: checksum(content),
            ..meta.clone()
        })?;
        fs::create_dir_all(&self.dir)?;
        self.write_blob(saved.id, content)?;
        Ok(saved)
    }

    fn discard(&self, file_id: i64) -> Result<()> {
        match fs::remove_file(self.blob_path(file_id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
