//! The seven duplication stages, run in order over one transaction.

use super::loader::AggregateLoader;
use super::resources::{ResourceCloner, ResourceStore};
use super::rewrite::{Missing, ReferenceRewriter};
use super::tokens::TokenSource;
use super::translate::{EntityKind, TranslationTables};
use super::{DuplicationReport, Stage};
use crate::access::AccessPolicy;
use crate::models::{Attachment, LinkShare, Principal, Project, ProjectDetail};
use crate::storage::{ProjectOptions, Records};
use crate::{Error, Result};
use chrono::Utc;
use rusqlite::Connection;
use tracing::debug_span;

/// State of one duplication call.
pub(super) struct Run<'a, 's, P, S: ResourceStore, T> {
    pub conn: &'a Connection,
    pub policy: &'a P,
    pub tokens: &'a T,
    pub cloner: &'a mut ResourceCloner<'s, S>,
    pub title_suffix: &'a str,
    pub source_id: i64,
    pub parent_id: Option<i64>,
    /// User who owns the new project
    pub owner: i64,
    pub tables: TranslationTables,
    pub report: DuplicationReport,
}

impl<'a, 's, P, S, T> Run<'a, 's, P, S, T>
where
    P: AccessPolicy,
    S: ResourceStore,
    T: TokenSource,
{
    pub fn execute(&mut self) -> Result<ProjectDetail> {
        let mut source = None;
        let mut detail = None;

        for stage in Stage::ALL {
            let span = debug_span!("stage", stage = %stage);
            let _guard = span.enter();

            match stage {
                Stage::Root => source = Some(self.root()?),
                Stage::ViewsAndBuckets => self.views_and_buckets()?,
                Stage::Tasks => self.tasks()?,
                Stage::TaskChildren => self.task_children()?,
                Stage::BucketsAndPositions => self.buckets_and_positions()?,
                Stage::Metadata => {
                    if let Some(source) = &source {
                        self.metadata(source)?;
                    }
                }
                Stage::Reload => detail = Some(self.records().project_detail(self.new_root()?)?),
            }
        }

        detail.ok_or_else(|| Error::Other("duplication finished without a project".to_string()))
    }

    fn records(&self) -> Records<'a> {
        Records::new(self.conn)
    }

    fn loader(&self) -> AggregateLoader<'a> {
        AggregateLoader::new(self.records())
    }

    fn new_root(&self) -> Result<i64> {
        self.tables
            .lookup(EntityKind::Project, self.source_id)
            .ok_or_else(|| Error::Other("new project was not recorded".to_string()))
    }

    /// Count a copy, or a skip when a required reference was missing.
    fn tally<R>(
        &mut self,
        kind: EntityKind,
        old_id: i64,
        outcome: std::result::Result<R, Missing>,
    ) -> Option<R> {
        match outcome {
            Ok(value) => Some(value),
            Err(missing) => {
                let reason = format!("no copy of {} {}", missing.kind, missing.old_id);
                self.report.skipped(kind, old_id, &reason);
                None
            }
        }
    }

    // === Stage 1: root ===

    fn root(&mut self) -> Result<Project> {
        let source = self.loader().root(self.source_id)?;

        let mut project = Project {
            id: 0,
            title: format!("{}{}", source.title, self.title_suffix),
            owner_id: self.owner,
            parent_project_id: self.parent_id,
            position: 0.0,
            is_archived: false,
            is_favorite: false,
            background_file_id: None,
            background_blur_hash: None,
            ..source.clone()
        };

        let records = self.records();
        let created = match records.create_project(&project, ProjectOptions::bare()) {
            Err(Error::UniqueConstraintConflict(what)) => {
                tracing::debug!(conflict = %what, "identifier taken, retrying without it");
                project.identifier.clear();
                records.create_project(&project, ProjectOptions::bare())?
            }
            other => other?,
        };

        self.tables
            .record(EntityKind::Project, source.id, created.id);
        self.report.copied(EntityKind::Project);
        Ok(source)
    }

    // === Stage 2: views, buckets, then the view bucket pointers ===

    fn views_and_buckets(&mut self) -> Result<()> {
        let records = self.records();
        let views = self.loader().views(self.source_id)?;

        for view in &views {
            let rewritten = ReferenceRewriter::new(&self.tables).view(view);
            let Some(copy) = self.tally(EntityKind::View, view.id, rewritten) else {
                continue;
            };
            let created = records.create_view(&copy)?;
            self.tables.record(EntityKind::View, view.id, created.id);
            self.report.copied(EntityKind::View);
        }

        for bucket in self.loader().buckets(self.source_id)? {
            let rewritten = ReferenceRewriter::new(&self.tables).bucket(&bucket);
            let Some(copy) = self.tally(EntityKind::Bucket, bucket.id, rewritten) else {
                continue;
            };
            let created = records.create_bucket(&copy)?;
            self.tables.record(EntityKind::Bucket, bucket.id, created.id);
            self.report.copied(EntityKind::Bucket);
        }

        for view in &views {
            if view.default_bucket_id.is_none() && view.done_bucket_id.is_none() {
                continue;
            }
            let Some(new_view) = self.tables.lookup(EntityKind::View, view.id) else {
                continue;
            };
            let rewriter = ReferenceRewriter::new(&self.tables);
            let default_bucket = rewriter.optional(EntityKind::Bucket, view.default_bucket_id);
            let done_bucket = rewriter.optional(EntityKind::Bucket, view.done_bucket_id);
            if default_bucket.is_none() != view.default_bucket_id.is_none()
                || done_bucket.is_none() != view.done_bucket_id.is_none()
            {
                tracing::debug!(view = view.id, "cleared unresolved bucket pointer");
            }
            records.set_view_buckets(new_view, default_bucket, done_bucket)?;
        }

        Ok(())
    }

    // === Stage 3: tasks ===

    fn tasks(&mut self) -> Result<()> {
        let records = self.records();
        for task in self.loader().tasks(self.source_id)? {
            let rewritten = ReferenceRewriter::new(&self.tables).task(&task);
            let Some(copy) = self.tally(EntityKind::Task, task.id, rewritten) else {
                continue;
            };
            // Access was settled by the gate; keep the original creator.
            let created = records.create_task(&copy, task.created_by, false)?;
            self.tables.record(EntityKind::Task, task.id, created.id);
            self.report.copied(EntityKind::Task);
        }
        Ok(())
    }

    // === Stage 4: task children ===

    fn task_children(&mut self) -> Result<()> {
        self.attachments()?;
        self.cover_images()?;
        self.label_tasks()?;
        self.assignees()?;
        self.comments()?;
        self.reminders()?;
        self.relations()
    }

    fn attachments(&mut self) -> Result<()> {
        let records = self.records();
        for attachment in self.loader().attachments(self.source_id)? {
            let rewritten = ReferenceRewriter::new(&self.tables).attachment(&attachment);
            let Some(copy) = self.tally(EntityKind::Attachment, attachment.id, rewritten) else {
                continue;
            };
            let Some(file) = self
                .cloner
                .clone_resource(self.conn, attachment.file_id, self.owner)?
            else {
                self.report
                    .skipped(EntityKind::Attachment, attachment.id, "resource missing");
                continue;
            };
            let created = records.add_attachment(&Attachment {
                file_id: file.id,
                created_at: Utc::now(),
                ..copy
            })?;
            self.tables
                .record(EntityKind::Attachment, attachment.id, created.id);
            self.report.copied(EntityKind::Attachment);
        }
        Ok(())
    }

    fn cover_images(&mut self) -> Result<()> {
        let records = self.records();
        for task in self.loader().tasks(self.source_id)? {
            let Some(cover) = task.cover_image_attachment_id else {
                continue;
            };
            let Some(new_task) = self.tables.lookup(EntityKind::Task, task.id) else {
                continue;
            };
            match self.tables.lookup(EntityKind::Attachment, cover) {
                Some(new_cover) => records.set_task_cover_image(new_task, Some(new_cover))?,
                None => tracing::debug!(task = task.id, "cleared unresolved cover image"),
            }
        }
        Ok(())
    }

    fn label_tasks(&mut self) -> Result<()> {
        let records = self.records();
        for label_task in self.loader().label_tasks(self.source_id)? {
            let rewritten = ReferenceRewriter::new(&self.tables).label_task(&label_task);
            if let Some(copy) = self.tally(EntityKind::LabelTask, label_task.task_id, rewritten) {
                records.add_label_task(&copy)?;
                self.report.copied(EntityKind::LabelTask);
            }
        }
        Ok(())
    }

    /// Assignees are kept only if they can read the new project.
    fn assignees(&mut self) -> Result<()> {
        let records = self.records();
        let new_root = self.new_root()?;
        for assignee in self.loader().assignees(self.source_id)? {
            let rewritten = ReferenceRewriter::new(&self.tables).assignee(&assignee);
            let Some(copy) = self.tally(EntityKind::Assignee, assignee.user_id, rewritten) else {
                continue;
            };
            let principal = Principal::user(assignee.user_id);
            if !self.policy.can_read(self.conn, new_root, &principal)? {
                self.report
                    .skipped(EntityKind::Assignee, assignee.user_id, "no access to new project");
                continue;
            }
            records.add_assignee(&copy)?;
            self.report.copied(EntityKind::Assignee);
        }
        Ok(())
    }

    fn comments(&mut self) -> Result<()> {
        let records = self.records();
        for comment in self.loader().comments(self.source_id)? {
            let rewritten = ReferenceRewriter::new(&self.tables).comment(&comment);
            if let Some(copy) = self.tally(EntityKind::Comment, comment.id, rewritten) {
                records.add_comment(&copy)?;
                self.report.copied(EntityKind::Comment);
            }
        }
        Ok(())
    }

    fn reminders(&mut self) -> Result<()> {
        let records = self.records();
        for reminder in self.loader().reminders(self.source_id)? {
            let rewritten = ReferenceRewriter::new(&self.tables).reminder(&reminder);
            if let Some(copy) = self.tally(EntityKind::Reminder, reminder.id, rewritten) {
                records.add_reminder(&copy)?;
                self.report.copied(EntityKind::Reminder);
            }
        }
        Ok(())
    }

    /// Each stored direction is copied on its own; both ends must be in the new project.
    fn relations(&mut self) -> Result<()> {
        let records = self.records();
        for relation in self.loader().relations(self.source_id)? {
            let rewritten = ReferenceRewriter::new(&self.tables).relation(&relation);
            if let Some(copy) = self.tally(EntityKind::Relation, relation.id, rewritten) {
                records.insert_relation(&copy)?;
                self.report.copied(EntityKind::Relation);
            }
        }
        Ok(())
    }

    // === Stage 5: bucket assignments and positions ===

    fn buckets_and_positions(&mut self) -> Result<()> {
        let records = self.records();
        for entry in self.loader().task_buckets(self.source_id)? {
            let rewritten = ReferenceRewriter::new(&self.tables).task_bucket(&entry);
            if let Some(copy) = self.tally(EntityKind::TaskBucket, entry.task_id, rewritten) {
                records.set_task_bucket(&copy)?;
                self.report.copied(EntityKind::TaskBucket);
            }
        }

        for position in self.loader().task_positions(self.source_id)? {
            let rewritten = ReferenceRewriter::new(&self.tables).task_position(&position);
            if let Some(copy) = self.tally(EntityKind::TaskPosition, position.task_id, rewritten) {
                records.set_task_position(&copy)?;
                self.report.copied(EntityKind::TaskPosition);
            }
        }
        Ok(())
    }

    // === Stage 6: background, grants and link shares ===

    fn metadata(&mut self, source: &Project) -> Result<()> {
        let records = self.records();
        let new_root = self.new_root()?;

        if let Some(file_id) = source.background_file_id {
            match self.cloner.clone_resource(self.conn, file_id, self.owner)? {
                Some(file) => {
                    records.set_project_background(
                        new_root,
                        Some(file.id),
                        source.background_blur_hash.as_deref(),
                    )?;
                    self.report.copied(EntityKind::Background);
                }
                None => {
                    records.set_project_background(new_root, None, None)?;
                    self.report
                        .skipped(EntityKind::Background, file_id, "resource missing");
                }
            }
        }

        for grant in self.loader().user_grants(self.source_id)? {
            records.add_user_grant(grant.user_id, new_root, grant.permission)?;
            self.report.copied(EntityKind::UserGrant);
        }

        for grant in self.loader().team_grants(self.source_id)? {
            records.add_team_grant(grant.team_id, new_root, grant.permission)?;
            self.report.copied(EntityKind::TeamGrant);
        }

        for share in self.loader().link_shares(self.source_id)? {
            let now = Utc::now();
            records.create_link_share(&LinkShare {
                id: 0,
                hash: self.tokens.token(),
                project_id: new_root,
                created_at: now,
                updated_at: now,
                ..share
            })?;
            self.report.copied(EntityKind::LinkShare);
        }

        Ok(())
    }
}
