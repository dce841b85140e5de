//! Foreign-key rewriting for copied entities.
//!
//! A required reference that does not resolve drops the whole entity
//! ([`Missing`]); an optional one that does not resolve is cleared. Every
//! rewritten entity comes back with `id` reset so storage assigns a new one.

use super::translate::{EntityKind, TranslationTables};
use crate::models::{
    Assignee, Attachment, Bucket, Comment, LabelTask, Reminder, Task, TaskBucket, TaskPosition,
    TaskRelation, View,
};

/// A required reference with no translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Missing {
    pub kind: EntityKind,
    pub old_id: i64,
}

pub(crate) type Rewritten<T> = std::result::Result<T, Missing>;

/// Resolves references through the translation tables of the current run.
pub(crate) struct ReferenceRewriter<'t> {
    tables: &'t TranslationTables,
}

impl<'t> ReferenceRewriter<'t> {
    pub fn new(tables: &'t TranslationTables) -> Self {
        Self { tables }
    }

    pub fn required(&self, kind: EntityKind, old_id: i64) -> Rewritten<i64> {
        self.tables
            .lookup(kind, old_id)
            .ok_or(Missing { kind, old_id })
    }

    pub fn optional(&self, kind: EntityKind, old_id: Option<i64>) -> Option<i64> {
        old_id.and_then(|id| self.tables.lookup(kind, id))
    }

    /// A view in the new project. Bucket pointers are patched once buckets exist.
    pub fn view(&self, view: &View) -> Rewritten<View> {
        Ok(View {
            id: 0,
            project_id: self.required(EntityKind::Project, view.project_id)?,
            default_bucket_id: None,
            done_bucket_id: None,
            ..view.clone()
        })
    }

    pub fn bucket(&self, bucket: &Bucket) -> Rewritten<Bucket> {
        Ok(Bucket {
            id: 0,
            view_id: self.required(EntityKind::View, bucket.view_id)?,
            ..bucket.clone()
        })
    }

    /// A task ready for the creation path, with volatile fields cleared.
    pub fn task(&self, task: &Task) -> Rewritten<Task> {
        Ok(Task {
            id: 0,
            project_id: self.required(EntityKind::Project, task.project_id)?,
            uid: String::new(),
            bucket_id: None,
            cover_image_attachment_id: None,
            assignees: Vec::new(),
            ..task.clone()
        })
    }

    /// The attachment row; the file reference is replaced by the cloner.
    pub fn attachment(&self, attachment: &Attachment) -> Rewritten<Attachment> {
        Ok(Attachment {
            id: 0,
            task_id: self.required(EntityKind::Task, attachment.task_id)?,
            ..attachment.clone()
        })
    }

    pub fn label_task(&self, label_task: &LabelTask) -> Rewritten<LabelTask> {
        Ok(LabelTask {
            task_id: self.required(EntityKind::Task, label_task.task_id)?,
            ..label_task.clone()
        })
    }

    pub fn assignee(&self, assignee: &Assignee) -> Rewritten<Assignee> {
        Ok(Assignee {
            task_id: self.required(EntityKind::Task, assignee.task_id)?,
            ..assignee.clone()
        })
    }

    pub fn comment(&self, comment: &Comment) -> Rewritten<Comment> {
        Ok(Comment {
            id: 0,
            task_id: self.required(EntityKind::Task, comment.task_id)?,
            ..comment.clone()
        })
    }

    pub fn reminder(&self, reminder: &Reminder) -> Rewritten<Reminder> {
        Ok(Reminder {
            id: 0,
            task_id: self.required(EntityKind::Task, reminder.task_id)?,
            ..reminder.clone()
        })
    }

    /// Both endpoints must be inside the new project.
    pub fn relation(&self, relation: &TaskRelation) -> Rewritten<TaskRelation> {
        Ok(TaskRelation {
            id: 0,
            task_id: self.required(EntityKind::Task, relation.task_id)?,
            other_task_id: self.required(EntityKind::Task, relation.other_task_id)?,
            ..relation.clone()
        })
    }

    pub fn task_bucket(&self, task_bucket: &TaskBucket) -> Rewritten<TaskBucket> {
        Ok(TaskBucket {
            task_id: self.required(EntityKind::Task, task_bucket.task_id)?,
            bucket_id: self.required(EntityKind::Bucket, task_bucket.bucket_id)?,
            view_id: self.required(EntityKind::View, task_bucket.view_id)?,
        })
    }

    pub fn task_position(&self, position: &TaskPosition) -> Rewritten<TaskPosition> {
        Ok(TaskPosition {
            task_id: self.required(EntityKind::Task, position.task_id)?,
            view_id: self.required(EntityKind::View, position.view_id)?,
            position: position.position,
        })
    }
}
