//! Whole-project duplication.
//!
//! [`Duplicator::duplicate`] copies a project with its views, buckets, tasks
//! and everything hanging off them into a new project owned by the caller.
//! The copy is built in seven ordered [`Stage`]s inside a single transaction;
//! each stage records old-to-new ids in the [`TranslationTables`] so that
//! later stages can point their rows at the new entities. Children whose
//! required references cannot be translated are skipped, optional references
//! that cannot be translated are cleared, and any other failure rolls the
//! whole copy back.

pub mod gate;
pub mod loader;
pub mod resources;
pub(crate) mod rewrite;
mod stages;
pub mod tokens;
pub mod transaction;
pub mod translate;

pub use gate::AuthorizationGate;
pub use loader::AggregateLoader;
pub use resources::{ResourceCloner, ResourceStore, StoredFile};
pub use tokens::{RandomTokens, TokenSource};
pub use translate::{EntityKind, TranslationTables};

use crate::Result;
use crate::access::{AccessPolicy, GrantPolicy};
use crate::models::{Principal, ProjectDetail};
use crate::storage::{FileStore, Storage};
use serde::Serialize;
use stages::Run;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info, info_span};

/// Suffix appended to the title of a duplicated project by default.
pub const DEFAULT_TITLE_SUFFIX: &str = " - duplicate";

/// The ordered phases of a duplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Root,
    ViewsAndBuckets,
    Tasks,
    TaskChildren,
    BucketsAndPositions,
    Metadata,
    Reload,
}

impl Stage {
    pub const ALL: [Stage; 7] = [
        Stage::Root,
        Stage::ViewsAndBuckets,
        Stage::Tasks,
        Stage::TaskChildren,
        Stage::BucketsAndPositions,
        Stage::Metadata,
        Stage::Reload,
    ];
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Root => "root",
            Stage::ViewsAndBuckets => "views-and-buckets",
            Stage::Tasks => "tasks",
            Stage::TaskChildren => "task-children",
            Stage::BucketsAndPositions => "buckets-and-positions",
            Stage::Metadata => "metadata",
            Stage::Reload => "reload",
        };
        write!(f, "{}", name)
    }
}

/// What to duplicate and where to put it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuplicateRequest {
    pub source_project_id: i64,
    /// Parent of the new project; `0` means top level.
    pub parent_project_id: i64,
}

impl DuplicateRequest {
    pub fn new(source_project_id: i64) -> Self {
        Self {
            source_project_id,
            parent_project_id: 0,
        }
    }

    pub fn with_parent(mut self, parent_project_id: i64) -> Self {
        self.parent_project_id = parent_project_id;
        self
    }

    /// The destination parent, with the `0` sentinel mapped to `None`.
    pub fn parent(&self) -> Option<i64> {
        (self.parent_project_id != 0).then_some(self.parent_project_id)
    }
}

/// Copied and skipped counts per entity kind for one duplication.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DuplicationReport {
    pub copied: BTreeMap<EntityKind, usize>,
    pub skipped: BTreeMap<EntityKind, usize>,
}

impl DuplicationReport {
    pub(crate) fn copied(&mut self, kind: EntityKind) {
        *self.copied.entry(kind).or_default() += 1;
    }

    pub(crate) fn skipped(&mut self, kind: EntityKind, old_id: i64, reason: &str) {
        debug!(%kind, old_id, reason, "skipped");
        *self.skipped.entry(kind).or_default() += 1;
    }

    pub fn copied_count(&self, kind: EntityKind) -> usize {
        self.copied.get(&kind).copied().unwrap_or(0)
    }

    pub fn skipped_count(&self, kind: EntityKind) -> usize {
        self.skipped.get(&kind).copied().unwrap_or(0)
    }

    pub fn total_skipped(&self) -> usize {
        self.skipped.values().sum()
    }
}

/// A finished duplication.
#[derive(Debug, Clone, Serialize)]
pub struct Duplication {
    pub project: ProjectDetail,
    pub report: DuplicationReport,
}

/// The duplication engine with its collaborators.
pub struct Duplicator<P = GrantPolicy, S = FileStore, T = RandomTokens> {
    policy: P,
    files: S,
    tokens: T,
    title_suffix: String,
}

impl<P, S, T> Duplicator<P, S, T>
where
    P: AccessPolicy,
    S: ResourceStore,
    T: TokenSource,
{
    pub fn new(policy: P, files: S, tokens: T) -> Self {
        Self {
            policy,
            files,
            tokens,
            title_suffix: DEFAULT_TITLE_SUFFIX.to_string(),
        }
    }

    pub fn with_title_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.title_suffix = suffix.into();
        self
    }

    /// Duplicate a project and return the new one, fully loaded.
    pub fn duplicate(
        &self,
        storage: &mut Storage,
        request: &DuplicateRequest,
        principal: &Principal,
    ) -> Result<ProjectDetail> {
        Ok(self.duplicate_with_report(storage, request, principal)?.project)
    }

    /// Duplicate a project, also returning what was copied and skipped.
    pub fn duplicate_with_report(
        &self,
        storage: &mut Storage,
        request: &DuplicateRequest,
        principal: &Principal,
    ) -> Result<Duplication> {
        let span = info_span!(
            "duplicate",
            source = request.source_project_id,
            principal = %principal
        );
        let _guard = span.enter();

        let owner = AuthorizationGate::new(&self.policy).authorize(
            storage.records().conn(),
            request.source_project_id,
            request.parent(),
            principal,
        )?;

        let mut cloner = ResourceCloner::new(&self.files);
        let outcome = transaction::atomically(storage, |tx| {
            let mut run = Run {
                conn: tx,
                policy: &self.policy,
                tokens: &self.tokens,
                cloner: &mut cloner,
                title_suffix: &self.title_suffix,
                source_id: request.source_project_id,
                parent_id: request.parent(),
                owner,
                tables: TranslationTables::new(),
                report: DuplicationReport::default(),
            };
            let project = run.execute()?;
            Ok(Duplication {
                project,
                report: run.report,
            })
        });

        match outcome {
            Ok(duplication) => {
                info!(
                    project = duplication.project.project.id,
                    copied = ?duplication.report.copied,
                    skipped = ?duplication.report.skipped,
                    "duplicated"
                );
                Ok(duplication)
            }
            Err(e) => {
                cloner.discard_written();
                Err(e)
            }
        }
    }
}

impl Duplicator {
    /// The built-in collaborators over `storage`'s files directory.
    pub fn for_storage(storage: &Storage) -> Self {
        Self::new(
            GrantPolicy,
            FileStore::new(storage.files_dir()),
            RandomTokens::default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::models::{Bucket, Principal, Task, View, ViewKind};
    use crate::test_utils::{TestEnv, add_project, add_task, add_user};

    fn duplicator(env: &TestEnv) -> Duplicator {
        Duplicator::new(GrantPolicy, env.file_store(), RandomTokens::default())
    }

    #[test]
    fn test_request_parent_sentinel() {
        assert_eq!(DuplicateRequest::new(3).parent(), None);
        assert_eq!(DuplicateRequest::new(3).with_parent(9).parent(), Some(9));
    }

    #[test]
    fn test_stage_order() {
        let names: Vec<String> = Stage::ALL.iter().map(|s| s.to_string()).collect();
        assert_eq!(names.first().map(String::as_str), Some("root"));
        assert_eq!(names.last().map(String::as_str), Some("reload"));
        assert_eq!(names.len(), 7);
    }

    #[test]
    fn test_duplicate_copies_board() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        let owner = add_user(&storage, "ana");
        let source = add_project(&storage, "Roadmap", owner);
        let records = storage.records();
        let view = records
            .create_view(&View::new(source.id, "Board", ViewKind::Kanban))
            .unwrap();
        let todo = records.create_bucket(&Bucket::new(view.id, "Todo", owner)).unwrap();
        let done = records.create_bucket(&Bucket::new(view.id, "Done", owner)).unwrap();
        records
            .set_view_buckets(view.id, Some(todo.id), Some(done.id))
            .unwrap();
        add_task(&storage, source.id, "Write docs", owner);

        let result = duplicator(&env)
            .duplicate_with_report(
                &mut storage,
                &DuplicateRequest::new(source.id),
                &Principal::user(owner),
            )
            .unwrap();

        let copy = &result.project;
        assert_ne!(copy.project.id, source.id);
        assert_eq!(copy.project.title, "Roadmap - duplicate");
        assert_eq!(copy.views.len(), 1);
        assert_eq!(copy.views[0].buckets.len(), 2);
        assert_eq!(copy.task_count, 1);

        let new_view = &copy.views[0];
        let bucket_ids: Vec<i64> = new_view.buckets.iter().map(|b| b.id).collect();
        assert!(bucket_ids.contains(&new_view.view.default_bucket_id.unwrap()));
        assert!(bucket_ids.contains(&new_view.view.done_bucket_id.unwrap()));
        assert!(!bucket_ids.contains(&todo.id));

        assert_eq!(result.report.copied_count(EntityKind::Bucket), 2);
        assert_eq!(result.report.total_skipped(), 0);
    }

    #[test]
    fn test_custom_title_suffix() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        let owner = add_user(&storage, "ana");
        let source = add_project(&storage, "Ops", owner);

        let copy = duplicator(&env)
            .with_title_suffix(" (copy)")
            .duplicate(&mut storage, &DuplicateRequest::new(source.id), &Principal::user(owner))
            .unwrap();
        assert_eq!(copy.project.title, "Ops (copy)");
    }

    #[test]
    fn test_denied_duplicate_writes_nothing() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        let owner = add_user(&storage, "ana");
        let stranger = add_user(&storage, "bo");
        let source = add_project(&storage, "Private", owner);
        let mut task = Task::new(source.id, "Secret", owner);
        task.priority = 2;
        storage.records().create_task(&task, owner, false).unwrap();

        let result = duplicator(&env).duplicate(
            &mut storage,
            &DuplicateRequest::new(source.id),
            &Principal::user(stranger),
        );

        assert!(matches!(result, Err(Error::AccessDenied(_))));
        assert!(storage.records().find_project(source.id + 1).unwrap().is_none());
    }
}
