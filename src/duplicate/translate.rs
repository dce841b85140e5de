//! Old-id to new-id maps, one per entity kind, scoped to a single duplication.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Every kind of entity a duplication copies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Project,
    View,
    Bucket,
    Task,
    Attachment,
    LabelTask,
    Assignee,
    Comment,
    Reminder,
    Relation,
    TaskBucket,
    TaskPosition,
    Background,
    UserGrant,
    TeamGrant,
    LinkShare,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Project => "project",
            EntityKind::View => "view",
            EntityKind::Bucket => "bucket",
            EntityKind::Task => "task",
            EntityKind::Attachment => "attachment",
            EntityKind::LabelTask => "label_task",
            EntityKind::Assignee => "assignee",
            EntityKind::Comment => "comment",
            EntityKind::Reminder => "reminder",
            EntityKind::Relation => "relation",
            EntityKind::TaskBucket => "task_bucket",
            EntityKind::TaskPosition => "task_position",
            EntityKind::Background => "background",
            EntityKind::UserGrant => "user_grant",
            EntityKind::TeamGrant => "team_grant",
            EntityKind::LinkShare => "link_share",
        };
        write!(f, "{}", name)
    }
}

/// Translation tables for one duplication call.
///
/// Entries are only ever added; the first mapping recorded for an id wins.
#[derive(Debug, Default)]
pub struct TranslationTables {
    tables: HashMap<EntityKind, HashMap<i64, i64>>,
}

impl TranslationTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `old_id` of `kind` was copied as `new_id`.
    pub fn record(&mut self, kind: EntityKind, old_id: i64, new_id: i64) {
        self.tables
            .entry(kind)
            .or_default()
            .entry(old_id)
            .or_insert(new_id);
    }

    /// The new id for `old_id`, if that entity was copied.
    pub fn lookup(&self, kind: EntityKind, old_id: i64) -> Option<i64> {
        self.tables.get(&kind)?.get(&old_id).copied()
    }
}
