//! Data models for Keelson entities.
//!
//! This module defines the core data structures:
//! - `Project` - The top-level board container, optionally nested under a parent
//! - `View` / `Bucket` - Named arrangements of a project and their columns
//! - `Task` - Work items and their children (attachments, labels, assignees,
//!   comments, reminders, relations, bucket assignments and positions)
//! - `UserGrant` / `TeamGrant` / `LinkShare` - Project-level sharing records
//! - `Principal` - Whoever invokes an operation

pub mod sharing;

pub use sharing::{LinkShare, Permission, Principal, SharingType, TeamGrant, UserGrant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A registered user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Create a new, not yet persisted user.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            id: 0,
            username: username.into(),
            name: None,
            email: None,
            created_at: Utc::now(),
        }
    }
}

/// A named group of users that can be granted access to projects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: i64,
    pub name: String,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
}

/// A label that can be attached to tasks across projects.
///
/// Labels are owned by users, not projects, so duplicating a project
/// only copies the associations, never the labels themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub id: i64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hex_color: Option<String>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
}

/// A project: the aggregate that owns views, buckets, tasks and shares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Unique identifier
    pub id: i64,

    /// Project title
    pub title: String,

    /// Detailed description
    #[serde(default)]
    pub description: String,

    /// Short, store-wide unique identifier used as task prefix (e.g. "OPS").
    /// Empty means unset.
    #[serde(default)]
    pub identifier: String,

    /// Display color (hex, without leading '#')
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hex_color: Option<String>,

    /// User owning the project
    pub owner_id: i64,

    /// Parent project for hierarchical organization
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_project_id: Option<i64>,

    /// Ordering among siblings; 0 means "compute a default"
    #[serde(default)]
    pub position: f64,

    /// Archived projects are read-only
    #[serde(default)]
    pub is_archived: bool,

    /// Favorite flag
    #[serde(default)]
    pub is_favorite: bool,

    /// Background image resource
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_file_id: Option<i64>,

    /// Blur hash shown while the background image loads
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_blur_hash: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// Create a new, not yet persisted project.
    pub fn new(title: impl Into<String>, owner_id: i64) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            title: title.into(),
            description: String::new(),
            identifier: String::new(),
            hex_color: None,
            owner_id,
            parent_project_id: None,
            position: 0.0,
            is_archived: false,
            is_favorite: false,
            background_file_id: None,
            background_blur_hash: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// How a view is rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewKind {
    #[default]
    List,
    Gantt,
    Table,
    Kanban,
}

impl fmt::Display for ViewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ViewKind::List => "list",
            ViewKind::Gantt => "gantt",
            ViewKind::Table => "table",
            ViewKind::Kanban => "kanban",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for ViewKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "list" => Ok(ViewKind::List),
            "gantt" => Ok(ViewKind::Gantt),
            "table" => Ok(ViewKind::Table),
            "kanban" => Ok(ViewKind::Kanban),
            _ => Err(format!("Unknown view kind: {}", s)),
        }
    }
}

/// How the buckets of a kanban view are populated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketConfigurationMode {
    #[default]
    None,
    /// Tasks are moved between buckets by hand
    Manual,
    /// Buckets are defined by filters
    Filter,
}

impl fmt::Display for BucketConfigurationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BucketConfigurationMode::None => "none",
            BucketConfigurationMode::Manual => "manual",
            BucketConfigurationMode::Filter => "filter",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for BucketConfigurationMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(BucketConfigurationMode::None),
            "manual" => Ok(BucketConfigurationMode::Manual),
            "filter" => Ok(BucketConfigurationMode::Filter),
            _ => Err(format!("Unknown bucket configuration mode: {}", s)),
        }
    }
}

/// A named arrangement (list, board, ...) of a project's tasks.
///
/// A view may point at a default bucket (where new tasks land) and a done
/// bucket (moving a task there marks it done). Both buckets belong to the
/// view itself, which makes the view/bucket relation circular.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct View {
    pub id: i64,
    pub project_id: i64,
    pub title: String,
    pub kind: ViewKind,
    #[serde(default)]
    pub position: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(default)]
    pub bucket_configuration_mode: BucketConfigurationMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_bucket_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub done_bucket_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl View {
    /// Create a new, not yet persisted view.
    pub fn new(project_id: i64, title: impl Into<String>, kind: ViewKind) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            project_id,
            title: title.into(),
            kind,
            position: 0.0,
            filter: None,
            bucket_configuration_mode: if kind == ViewKind::Kanban {
                BucketConfigurationMode::Manual
            } else {
                BucketConfigurationMode::None
            },
            default_bucket_id: None,
            done_bucket_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A column of a view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub id: i64,
    pub view_id: i64,
    pub title: String,
    /// Maximum number of tasks; 0 means unlimited
    #[serde(default)]
    pub limit: i64,
    #[serde(default)]
    pub position: f64,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Bucket {
    /// Create a new, not yet persisted bucket.
    pub fn new(view_id: i64, title: impl Into<String>, created_by: i64) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            view_id,
            title: title.into(),
            limit: 0,
            position: 0.0,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A work item tracked in a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier
    pub id: i64,

    /// Owning project
    pub project_id: i64,

    /// Task title
    pub title: String,

    /// Detailed description
    #[serde(default)]
    pub description: String,

    /// Completion flag
    #[serde(default)]
    pub done: bool,

    /// When the task was marked done
    #[serde(skip_serializing_if = "Option::is_none")]
    pub done_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,

    /// Priority level (0 is unset, higher is more urgent)
    #[serde(default)]
    pub priority: i64,

    /// Progress between 0.0 and 1.0
    #[serde(default)]
    pub percent_done: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub hex_color: Option<String>,

    /// Repeat interval in seconds; 0 disables repetition
    #[serde(default)]
    pub repeat_after: i64,

    /// Per-project sequence number; 0 means "assign the next one"
    #[serde(default)]
    pub index: i64,

    /// Store-wide unique external identifier (regenerated when empty)
    #[serde(default)]
    pub uid: String,

    /// Legacy single-bucket assignment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket_id: Option<i64>,

    /// Attachment shown as the task's cover image
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_image_attachment_id: Option<i64>,

    /// Users to assign on creation. Not a column; read back via `task_assignees`.
    #[serde(default)]
    pub assignees: Vec<i64>,

    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Create a new, not yet persisted task.
    pub fn new(project_id: i64, title: impl Into<String>, created_by: i64) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            project_id,
            title: title.into(),
            description: String::new(),
            done: false,
            done_at: None,
            due_date: None,
            start_date: None,
            end_date: None,
            priority: 0,
            percent_done: 0.0,
            hex_color: None,
            repeat_after: 0,
            index: 0,
            uid: String::new(),
            bucket_id: None,
            cover_image_attachment_id: None,
            assignees: Vec::new(),
            created_by,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Metadata of a stored binary resource. The content lives in the resource store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMeta {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime: Option<String>,
    pub size: i64,
    /// Hex-encoded SHA-256 of the content
    pub checksum: String,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
}

/// A file attached to a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: i64,
    pub task_id: i64,
    pub file_id: i64,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
}

/// Association between a task and a label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelTask {
    pub task_id: i64,
    pub label_id: i64,
    pub created_at: DateTime<Utc>,
}

/// A user assigned to a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignee {
    pub task_id: i64,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
}

/// A comment on a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub task_id: i64,
    pub author_id: i64,
    pub comment: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Which task date a relative reminder is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderAnchor {
    DueDate,
    StartDate,
    EndDate,
}

impl fmt::Display for ReminderAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReminderAnchor::DueDate => "due_date",
            ReminderAnchor::StartDate => "start_date",
            ReminderAnchor::EndDate => "end_date",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for ReminderAnchor {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "due_date" => Ok(ReminderAnchor::DueDate),
            "start_date" => Ok(ReminderAnchor::StartDate),
            "end_date" => Ok(ReminderAnchor::EndDate),
            _ => Err(format!("Unknown reminder anchor: {}", s)),
        }
    }
}

/// A reminder on a task, either absolute or relative to one of its dates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: i64,
    pub task_id: i64,
    pub reminder: DateTime<Utc>,
    /// Offset in seconds from `relative_to`; ignored when `relative_to` is None
    #[serde(default)]
    pub relative_period: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relative_to: Option<ReminderAnchor>,
    pub created_at: DateTime<Utc>,
}

/// Type of relationship between two tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    Subtask,
    ParentTask,
    Related,
    DuplicateOf,
    Duplicates,
    Blocking,
    Blocked,
    Precedes,
    Follows,
    CopiedFrom,
    CopiedTo,
}

impl RelationKind {
    /// The kind stored on the other endpoint of a relation.
    pub fn inverse(&self) -> RelationKind {
        match self {
            RelationKind::Subtask => RelationKind::ParentTask,
            RelationKind::ParentTask => RelationKind::Subtask,
            RelationKind::Related => RelationKind::Related,
            RelationKind::DuplicateOf => RelationKind::Duplicates,
            RelationKind::Duplicates => RelationKind::DuplicateOf,
            RelationKind::Blocking => RelationKind::Blocked,
            RelationKind::Blocked => RelationKind::Blocking,
            RelationKind::Precedes => RelationKind::Follows,
            RelationKind::Follows => RelationKind::Precedes,
            RelationKind::CopiedFrom => RelationKind::CopiedTo,
            RelationKind::CopiedTo => RelationKind::CopiedFrom,
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RelationKind::Subtask => "subtask",
            RelationKind::ParentTask => "parenttask",
            RelationKind::Related => "related",
            RelationKind::DuplicateOf => "duplicateof",
            RelationKind::Duplicates => "duplicates",
            RelationKind::Blocking => "blocking",
            RelationKind::Blocked => "blocked",
            RelationKind::Precedes => "precedes",
            RelationKind::Follows => "follows",
            RelationKind::CopiedFrom => "copiedfrom",
            RelationKind::CopiedTo => "copiedto",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for RelationKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "subtask" => Ok(RelationKind::Subtask),
            "parenttask" => Ok(RelationKind::ParentTask),
            "related" => Ok(RelationKind::Related),
            "duplicateof" => Ok(RelationKind::DuplicateOf),
            "duplicates" => Ok(RelationKind::Duplicates),
            "blocking" => Ok(RelationKind::Blocking),
            "blocked" => Ok(RelationKind::Blocked),
            "precedes" => Ok(RelationKind::Precedes),
            "follows" => Ok(RelationKind::Follows),
            "copiedfrom" => Ok(RelationKind::CopiedFrom),
            "copiedto" => Ok(RelationKind::CopiedTo),
            _ => Err(format!("Unknown relation kind: {}", s)),
        }
    }
}

/// A typed edge from one task to another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRelation {
    pub id: i64,
    pub task_id: i64,
    pub other_task_id: i64,
    pub relation_kind: RelationKind,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
}

/// Places a task in a bucket of a view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskBucket {
    pub task_id: i64,
    pub bucket_id: i64,
    pub view_id: i64,
}

/// Ordinal position of a task within a view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskPosition {
    pub task_id: i64,
    pub view_id: i64,
    pub position: f64,
}

/// A view together with its buckets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewDetail {
    #[serde(flatten)]
    pub view: View,
    pub buckets: Vec<Bucket>,
}

/// A project with its associations materialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: Project,
    pub owner: User,
    pub views: Vec<ViewDetail>,
    pub task_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relation_kind_inverse_is_involution() {
        for kind in [
            RelationKind::Subtask,
            RelationKind::Related,
            RelationKind::Blocking,
            RelationKind::Precedes,
            RelationKind::CopiedFrom,
            RelationKind::DuplicateOf,
        ] {
            assert_eq!(kind.inverse().inverse(), kind);
        }
        assert_eq!(RelationKind::Related.inverse(), RelationKind::Related);
    }

    #[test]
    fn test_relation_kind_parse() {
        assert_eq!(
            "parenttask".parse::<RelationKind>().unwrap(),
            RelationKind::ParentTask
        );
        assert_eq!("BLOCKED".parse::<RelationKind>().unwrap(), RelationKind::Blocked);
        assert!("cousin".parse::<RelationKind>().is_err());
    }

    #[test]
    fn test_view_kind_roundtrip_text() {
        for kind in [ViewKind::List, ViewKind::Gantt, ViewKind::Table, ViewKind::Kanban] {
            assert_eq!(kind.to_string().parse::<ViewKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_kanban_view_defaults_to_manual_buckets() {
        let view = View::new(1, "Board", ViewKind::Kanban);
        assert_eq!(view.bucket_configuration_mode, BucketConfigurationMode::Manual);
        let list = View::new(1, "List", ViewKind::List);
        assert_eq!(list.bucket_configuration_mode, BucketConfigurationMode::None);
    }

    #[test]
    fn test_project_detail_flattens_project() {
        let detail = ProjectDetail {
            project: Project::new("Roadmap", 7),
            owner: User::new("ana"),
            views: Vec::new(),
            task_count: 0,
        };
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["title"], "Roadmap");
        assert_eq!(json["owner"]["username"], "ana");
    }
}
