//! Reads the source project one collection at a time.
//!
//! Each stage asks for the collection it is about to copy, filtered by the
//! source project (directly, through its views, or through its tasks). Rows
//! are collected before the stage writes so that new rows landing in the
//! same tables never show up in the source set.

use crate::Result;
use crate::models::{
    Assignee, Attachment, Bucket, Comment, LabelTask, LinkShare, Project, Reminder, Task,
    TaskBucket, TaskPosition, TaskRelation, TeamGrant, UserGrant, View,
};
use crate::storage::Records;
use crate::storage::projects::{BUCKET_COLUMNS, bucket_from_row};
use crate::storage::tasks::{
    ASSIGNEE_COLUMNS, ATTACHMENT_COLUMNS, COMMENT_COLUMNS, LABEL_TASK_COLUMNS, REMINDER_COLUMNS,
    RELATION_COLUMNS, TASK_BUCKET_COLUMNS, TASK_POSITION_COLUMNS, assignee_from_row,
    attachment_from_row, comment_from_row, label_task_from_row, reminder_from_row,
    relation_from_row, task_bucket_from_row, task_position_from_row,
};

/// Rows owned by a task of the project `?1`.
const OF_PROJECT_TASKS: &str = "task_id IN (SELECT id FROM tasks WHERE project_id = ?1)";

pub struct AggregateLoader<'c> {
    records: Records<'c>,
}

impl<'c> AggregateLoader<'c> {
    pub fn new(records: Records<'c>) -> Self {
        Self { records }
    }

    pub fn root(&self, project_id: i64) -> Result<Project> {
        self.records.get_project(project_id)
    }

    pub fn views(&self, project_id: i64) -> Result<Vec<View>> {
        self.records.list_views(project_id)
    }

    pub fn buckets(&self, project_id: i64) -> Result<Vec<Bucket>> {
        let sql = format!(
            "SELECT {} FROM buckets \
             WHERE view_id IN (SELECT id FROM project_views WHERE project_id = ?1) \
             ORDER BY id",
            BUCKET_COLUMNS
        );
        self.records.collect(&sql, project_id, bucket_from_row)
    }

    pub fn tasks(&self, project_id: i64) -> Result<Vec<Task>> {
        self.records.list_tasks(project_id)
    }

    pub fn attachments(&self, project_id: i64) -> Result<Vec<Attachment>> {
        self.task_children("task_attachments", ATTACHMENT_COLUMNS, project_id, attachment_from_row)
    }

    pub fn label_tasks(&self, project_id: i64) -> Result<Vec<LabelTask>> {
        self.task_children("label_tasks", LABEL_TASK_COLUMNS, project_id, label_task_from_row)
    }

    pub fn assignees(&self, project_id: i64) -> Result<Vec<Assignee>> {
        self.task_children("task_assignees", ASSIGNEE_COLUMNS, project_id, assignee_from_row)
    }

    pub fn comments(&self, project_id: i64) -> Result<Vec<Comment>> {
        self.task_children("task_comments", COMMENT_COLUMNS, project_id, comment_from_row)
    }

    pub fn reminders(&self, project_id: i64) -> Result<Vec<Reminder>> {
        self.task_children("task_reminders", REMINDER_COLUMNS, project_id, reminder_from_row)
    }

    /// Relations starting at a task of the project; the other end may be anywhere.
    pub fn relations(&self, project_id: i64) -> Result<Vec<TaskRelation>> {
        self.task_children("task_relations", RELATION_COLUMNS, project_id, relation_from_row)
    }

    pub fn task_buckets(&self, project_id: i64) -> Result<Vec<TaskBucket>> {
        self.task_children("task_buckets", TASK_BUCKET_COLUMNS, project_id, task_bucket_from_row)
    }

    pub fn task_positions(&self, project_id: i64) -> Result<Vec<TaskPosition>> {
        self.task_children(
            "task_positions",
            TASK_POSITION_COLUMNS,
            project_id,
            task_position_from_row,
        )
    }

    pub fn user_grants(&self, project_id: i64) -> Result<Vec<UserGrant>> {
        self.records.list_user_grants(project_id)
    }

    pub fn team_grants(&self, project_id: i64) -> Result<Vec<TeamGrant>> {
        self.records.list_team_grants(project_id)
    }

    pub fn link_shares(&self, project_id: i64) -> Result<Vec<LinkShare>> {
        self.records.list_link_shares(project_id)
    }

    fn task_children<T>(
        &self,
        table: &str,
        columns: &str,
        project_id: i64,
        map: fn(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<Vec<T>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} ORDER BY task_id",
            columns, table, OF_PROJECT_TASKS
        );
        self.records.collect(&sql, project_id, map)
    }
}
