//! Binary resource cloning.

use crate::Result;
use crate::models::FileMeta;
use chrono::Utc;
use rusqlite::Connection;
use tracing::{debug, warn};

/// Content and metadata of a stored resource.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredFile {
    pub meta: FileMeta,
    pub content: Vec<u8>,
}

/// Where attachments and backgrounds live.
///
/// Metadata goes through `conn` so it shares the caller's transaction; the
/// content does not, which is why blobs written during a failed duplication
/// are removed again through [`ResourceStore::discard`].
pub trait ResourceStore {
    /// Load a resource. `None` when its metadata or content is gone.
    fn load(&self, conn: &Connection, file_id: i64) -> Result<Option<StoredFile>>;

    /// Store new content described by `meta` and return the stored metadata.
    /// Size and checksum are computed from `content`.
    fn save(&self, conn: &Connection, meta: &FileMeta, content: &[u8]) -> Result<FileMeta>;

    /// Remove the content of a resource. Absent content is not an error.
    fn discard(&self, file_id: i64) -> Result<()>;
}

/// Copies resources for one duplication and remembers what it wrote.
pub struct ResourceCloner<'s, S: ResourceStore> {
    store: &'s S,
    written: Vec<i64>,
}

impl<'s, S: ResourceStore> ResourceCloner<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self {
            store,
            written: Vec::new(),
        }
    }

    /// Write an independent copy of `file_id` owned by `created_by`.
    ///
    /// Returns `None` when the source resource is missing.
    pub fn clone_resource(
        &mut self,
        conn: &Connection,
        file_id: i64,
        created_by: i64,
    ) -> Result<Option<FileMeta>> {
        let Some(source) = self.store.load(conn, file_id)? else {
            debug!(file_id, "source resource missing");
            return Ok(None);
        };

        let meta = FileMeta {
            id: 0,
            created_by,
            created_at: Utc::now(),
            ..source.meta
        };
        let copy = self.store.save(conn, &meta, &source.content)?;
        self.written.push(copy.id);
        Ok(Some(copy))
    }

    /// Ids of the resources written so far.
    pub fn written(&self) -> &[i64] {
        &self.written
    }

    /// Remove every resource written by this cloner.
    pub fn discard_written(&mut self) {
        for file_id in self.written.drain(..) {
            if let Err(e) = self.store.discard(file_id) {
                warn!(file_id, error = %e, "failed to remove resource of a rolled back duplication");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{TestEnv, add_user};

    #[test]
    fn test_clone_writes_independent_copy() {
        let env = TestEnv::new();
        let storage = env.init_storage();
        let owner = add_user(&storage, "ana");
        let copier = add_user(&storage, "bo");
        let files = env.file_store();
        let conn = storage.records().conn();
        let source = files.put(conn, "plan.pdf", Some("application/pdf"), b"%PDF", owner).unwrap();

        let mut cloner = ResourceCloner::new(&files);
        let copy = cloner.clone_resource(conn, source.id, copier).unwrap().unwrap();

        assert_ne!(copy.id, source.id);
        assert_eq!(copy.name, "plan.pdf");
        assert_eq!(copy.checksum, source.checksum);
        assert_eq!(copy.created_by, copier);
        assert_eq!(cloner.written(), &[copy.id]);
        assert!(files.blob_path(copy.id).exists());
    }

    #[test]
    fn test_clone_missing_resource_skips() {
        let env = TestEnv::new();
        let storage = env.init_storage();
        let files = env.file_store();

        let mut cloner = ResourceCloner::new(&files);
        let copy = cloner.clone_resource(storage.records().conn(), 31, 1).unwrap();

        assert!(copy.is_none());
        assert!(cloner.written().is_empty());
    }

    #[test]
    fn test_discard_written_removes_blobs() {
        let env = TestEnv::new();
        let storage = env.init_storage();
        let owner = add_user(&storage, "ana");
        let files = env.file_store();
        let conn = storage.records().conn();
        let source = files.put(conn, "a.txt", None, b"a", owner).unwrap();

        let mut cloner = ResourceCloner::new(&files);
        let copy = cloner.clone_resource(conn, source.id, owner).unwrap().unwrap();
        cloner.discard_written();

        assert!(!files.blob_path(copy.id).exists());
        assert!(files.blob_path(source.id).exists());
        assert!(cloner.written().is_empty());
    }
}
