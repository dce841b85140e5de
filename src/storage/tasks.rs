//! Tasks and their children: attachments, labels, assignees, comments,
//! reminders, relations, bucket assignments and positions.

use super::{Records, opt_text_enum, text_enum};
use crate::access::{AccessPolicy, GrantPolicy};
use crate::models::{
    Assignee, Attachment, Comment, LabelTask, Principal, RelationKind, Reminder, Task,
    TaskBucket, TaskPosition, TaskRelation,
};
use crate::{Error, Result};
use chrono::Utc;
use rusqlite::{OptionalExtension, Row, params};

pub(crate) const TASK_COLUMNS: &str = "id, project_id, title, description, done, done_at, \
     due_date, start_date, end_date, priority, percent_done, hex_color, repeat_after, \
     task_index, uid, bucket_id, cover_image_attachment_id, created_by, created_at, updated_at";

pub(crate) const ATTACHMENT_COLUMNS: &str = "id, task_id, file_id, created_by, created_at";
pub(crate) const LABEL_TASK_COLUMNS: &str = "task_id, label_id, created_at";
pub(crate) const ASSIGNEE_COLUMNS: &str = "task_id, user_id, created_at";
pub(crate) const COMMENT_COLUMNS: &str =
    "id, task_id, author_id, comment, created_at, updated_at";
pub(crate) const REMINDER_COLUMNS: &str =
    "id, task_id, reminder, relative_period, relative_to, created_at";
pub(crate) const RELATION_COLUMNS: &str =
    "id, task_id, other_task_id, relation_kind, created_by, created_at";
pub(crate) const TASK_BUCKET_COLUMNS: &str = "task_id, bucket_id, view_id";
pub(crate) const TASK_POSITION_COLUMNS: &str = "task_id, view_id, position";

pub(crate) fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        project_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        done: row.get(4)?,
        done_at: row.get(5)?,
        due_date: row.get(6)?,
        start_date: row.get(7)?,
        end_date: row.get(8)?,
        priority: row.get(9)?,
        percent_done: row.get(10)?,
        hex_color: row.get(11)?,
        repeat_after: row.get(12)?,
        index: row.get(13)?,
        uid: row.get(14)?,
        bucket_id: row.get(15)?,
        cover_image_attachment_id: row.get(16)?,
        assignees: Vec::new(),
        created_by: row.get(17)?,
        created_at: row.get(18)?,
        updated_at: row.get(19)?,
    })
}

pub(crate) fn attachment_from_row(row: &Row<'_>) -> rusqlite::Result<Attachment> {
    Ok(Attachment {
        id: row.get(0)?,
        task_id: row.get(1)?,
        file_id: row.get(2)?,
        created_by: row.get(3)?,
        created_at: row.get(4)?,
    })
}

pub(crate) fn label_task_from_row(row: &Row<'_>) -> rusqlite::Result<LabelTask> {
    Ok(LabelTask {
        task_id: row.get(0)?,
        label_id: row.get(1)?,
        created_at: row.get(2)?,
    })
}

pub(crate) fn assignee_from_row(row: &Row<'_>) -> rusqlite::Result<Assignee> {
    Ok(Assignee {
        task_id: row.get(0)?,
        user_id: row.get(1)?,
        created_at: row.get(2)?,
    })
}

pub(crate) fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        task_id: row.get(1)?,
        author_id: row.get(2)?,
        comment: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

pub(crate) fn reminder_from_row(row: &Row<'_>) -> rusqlite::Result<Reminder> {
    Ok(Reminder {
        id: row.get(0)?,
        task_id: row.get(1)?,
        reminder: row.get(2)?,
        relative_period: row.get(3)?,
        relative_to: opt_text_enum(row, 4)?,
        created_at: row.get(5)?,
    })
}

pub(crate) fn relation_from_row(row: &Row<'_>) -> rusqlite::Result<TaskRelation> {
    Ok(TaskRelation {
        id: row.get(0)?,
        task_id: row.get(1)?,
        other_task_id: row.get(2)?,
        relation_kind: text_enum(row, 3)?,
        created_by: row.get(4)?,
        created_at: row.get(5)?,
    })
}

pub(crate) fn task_bucket_from_row(row: &Row<'_>) -> rusqlite::Result<TaskBucket> {
    Ok(TaskBucket {
        task_id: row.get(0)?,
        bucket_id: row.get(1)?,
        view_id: row.get(2)?,
    })
}

pub(crate) fn task_position_from_row(row: &Row<'_>) -> rusqlite::Result<TaskPosition> {
    Ok(TaskPosition {
        task_id: row.get(0)?,
        view_id: row.get(1)?,
        position: row.get(2)?,
    })
}

impl<'c> Records<'c> {
    // === Task Operations ===

    /// Create a task through the normal creation path.
    ///
    /// With `check_permission` the doer must be able to write to the project.
    /// A zero `index` becomes the next free index of the project, an empty
    /// `uid` is generated, and every user in `assignees` is assigned (each
    /// must be able to read the project).
    pub fn create_task(&self, task: &Task, doer: i64, check_permission: bool) -> Result<Task> {
        if task.title.trim().is_empty() {
            return Err(Error::InvalidInput("Task title cannot be empty".to_string()));
        }
        self.get_project(task.project_id)?;

        if check_permission
            && !GrantPolicy.can_write(self.conn, task.project_id, &Principal::user(doer))?
        {
            return Err(Error::AccessDenied(format!(
                "user {} cannot add tasks to project {}",
                doer, task.project_id
            )));
        }

        let index = if task.index == 0 {
            self.next_task_index(task.project_id)?
        } else {
            task.index
        };
        let uid = if task.uid.is_empty() {
            uuid::Uuid::new_v4().to_string()
        } else {
            task.uid.clone()
        };

        self.conn.execute(
            r#"
            INSERT INTO tasks
            (project_id, title, description, done, done_at, due_date, start_date, end_date,
             priority, percent_done, hex_color, repeat_after, task_index, uid, bucket_id,
             cover_image_attachment_id, created_by, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
            "#,
            params![
                task.project_id,
                task.title,
                task.description,
                task.done,
                task.done_at,
                task.due_date,
                task.start_date,
                task.end_date,
                task.priority,
                task.percent_done,
                task.hex_color,
                task.repeat_after,
                index,
                uid,
                task.bucket_id,
                task.cover_image_attachment_id,
                doer,
                task.created_at,
                Utc::now(),
            ],
        )?;
        let id = self.conn.last_insert_rowid();

        for user_id in &task.assignees {
            if !GrantPolicy.can_read(self.conn, task.project_id, &Principal::user(*user_id))? {
                return Err(Error::AccessDenied(format!(
                    "user {} cannot be assigned: no access to project {}",
                    user_id, task.project_id
                )));
            }
            self.add_assignee(&Assignee {
                task_id: id,
                user_id: *user_id,
                created_at: Utc::now(),
            })?;
        }

        self.get_task(id)
    }

    fn next_task_index(&self, project_id: i64) -> Result<i64> {
        let max: i64 = self.conn.query_row(
            "SELECT COALESCE(MAX(task_index), 0) FROM tasks WHERE project_id = ?1",
            [project_id],
            |row| row.get(0),
        )?;
        Ok(max + 1)
    }

    /// Get a task by ID, with its assignees.
    pub fn get_task(&self, id: i64) -> Result<Task> {
        let sql = format!("SELECT {} FROM tasks WHERE id = ?1", TASK_COLUMNS);
        let mut task = self
            .conn
            .query_row(&sql, [id], task_from_row)
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("Task not found: {}", id)))?;
        task.assignees = self
            .list_assignees(id)?
            .into_iter()
            .map(|a| a.user_id)
            .collect();
        Ok(task)
    }

    /// List the tasks of a project (without assignees).
    pub fn list_tasks(&self, project_id: i64) -> Result<Vec<Task>> {
        let sql = format!(
            "SELECT {} FROM tasks WHERE project_id = ?1 ORDER BY task_index, id",
            TASK_COLUMNS
        );
        self.collect(&sql, project_id, task_from_row)
    }

    /// Count the tasks of a project.
    pub fn count_tasks(&self, project_id: i64) -> Result<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM tasks WHERE project_id = ?1",
            [project_id],
            |row| row.get(0),
        )?)
    }

    /// Set or clear a task's cover image.
    pub fn set_task_cover_image(&self, task_id: i64, attachment_id: Option<i64>) -> Result<()> {
        self.conn.execute(
            "UPDATE tasks SET cover_image_attachment_id = ?1, updated_at = ?2 WHERE id = ?3",
            params![attachment_id, Utc::now(), task_id],
        )?;
        Ok(())
    }

    // === Attachment Operations ===

    /// Attach a stored file to a task.
    pub fn add_attachment(&self, attachment: &Attachment) -> Result<Attachment> {
        self.conn.execute(
            "INSERT INTO task_attachments (task_id, file_id, created_by, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                attachment.task_id,
                attachment.file_id,
                attachment.created_by,
                attachment.created_at
            ],
        )?;
        Ok(Attachment {
            id: self.conn.last_insert_rowid(),
            ..attachment.clone()
        })
    }

    /// List the attachments of a task.
    pub fn list_attachments(&self, task_id: i64) -> Result<Vec<Attachment>> {
        let sql = format!(
            "SELECT {} FROM task_attachments WHERE task_id = ?1 ORDER BY id",
            ATTACHMENT_COLUMNS
        );
        self.collect(&sql, task_id, attachment_from_row)
    }

    // === Label Operations ===

    /// Add a label to a task. Adding it twice is a no-op.
    pub fn add_label_task(&self, label_task: &LabelTask) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO label_tasks (task_id, label_id, created_at) VALUES (?1, ?2, ?3)",
            params![label_task.task_id, label_task.label_id, label_task.created_at],
        )?;
        Ok(())
    }

    /// List the label associations of a task.
    pub fn list_label_tasks(&self, task_id: i64) -> Result<Vec<LabelTask>> {
        let sql = format!(
            "SELECT {} FROM label_tasks WHERE task_id = ?1 ORDER BY label_id",
            LABEL_TASK_COLUMNS
        );
        self.collect(&sql, task_id, label_task_from_row)
    }

    // === Assignee Operations ===

    /// Assign a user to a task without an access check.
    pub fn add_assignee(&self, assignee: &Assignee) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO task_assignees (task_id, user_id, created_at) VALUES (?1, ?2, ?3)",
            params![assignee.task_id, assignee.user_id, assignee.created_at],
        )?;
        Ok(())
    }

    /// List the assignees of a task.
    pub fn list_assignees(&self, task_id: i64) -> Result<Vec<Assignee>> {
        let sql = format!(
            "SELECT {} FROM task_assignees WHERE task_id = ?1 ORDER BY user_id",
            ASSIGNEE_COLUMNS
        );
        self.collect(&sql, task_id, assignee_from_row)
    }

    // === Comment Operations ===

    pub fn add_comment(&self, comment: &Comment) -> Result<Comment> {
        self.conn.execute(
            r#"
            INSERT INTO task_comments (task_id, author_id, comment, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                comment.task_id,
                comment.author_id,
                comment.comment,
                comment.created_at,
                comment.updated_at
            ],
        )?;
        Ok(Comment {
            id: self.conn.last_insert_rowid(),
            ..comment.clone()
        })
    }

    pub fn list_comments(&self, task_id: i64) -> Result<Vec<Comment>> {
        let sql = format!(
            "SELECT {} FROM task_comments WHERE task_id = ?1 ORDER BY id",
            COMMENT_COLUMNS
        );
        self.collect(&sql, task_id, comment_from_row)
    }

    // === Reminder Operations ===

    pub fn add_reminder(&self, reminder: &Reminder) -> Result<Reminder> {
        self.conn.execute(
            r#"
            INSERT INTO task_reminders (task_id, reminder, relative_period, relative_to, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                reminder.task_id,
                reminder.reminder,
                reminder.relative_period,
                reminder.relative_to.map(|r| r.to_string()),
                reminder.created_at
            ],
        )?;
        Ok(Reminder {
            id: self.conn.last_insert_rowid(),
            ..reminder.clone()
        })
    }

    pub fn list_reminders(&self, task_id: i64) -> Result<Vec<Reminder>> {
        let sql = format!(
            "SELECT {} FROM task_reminders WHERE task_id = ?1 ORDER BY reminder, id",
            REMINDER_COLUMNS
        );
        self.collect(&sql, task_id, reminder_from_row)
    }

    // === Relation Operations ===

    /// Relate two tasks, storing the relation in both directions.
    pub fn create_relation(
        &self,
        task_id: i64,
        other_task_id: i64,
        kind: RelationKind,
        doer: i64,
    ) -> Result<TaskRelation> {
        if task_id == other_task_id {
            return Err(Error::InvalidInput(
                "A task cannot be related to itself".to_string(),
            ));
        }
        self.get_task(other_task_id)?;

        let now = Utc::now();
        let relation = self.insert_relation(&TaskRelation {
            id: 0,
            task_id,
            other_task_id,
            relation_kind: kind,
            created_by: doer,
            created_at: now,
        })?;
        self.insert_relation(&TaskRelation {
            id: 0,
            task_id: other_task_id,
            other_task_id: task_id,
            relation_kind: kind.inverse(),
            created_by: doer,
            created_at: now,
        })?;
        Ok(relation)
    }

    /// Store exactly one direction of a relation. An identical relation is kept as is.
    pub fn insert_relation(&self, relation: &TaskRelation) -> Result<TaskRelation> {
        self.conn.execute(
            r#"
            INSERT OR IGNORE INTO task_relations
            (task_id, other_task_id, relation_kind, created_by, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                relation.task_id,
                relation.other_task_id,
                relation.relation_kind.to_string(),
                relation.created_by,
                relation.created_at
            ],
        )?;
        let id: i64 = self.conn.query_row(
            "SELECT id FROM task_relations WHERE task_id = ?1 AND other_task_id = ?2 AND relation_kind = ?3",
            params![
                relation.task_id,
                relation.other_task_id,
                relation.relation_kind.to_string()
            ],
            |row| row.get(0),
        )?;
        Ok(TaskRelation {
            id,
            ..relation.clone()
        })
    }

    /// List the relations starting at a task.
    pub fn list_relations(&self, task_id: i64) -> Result<Vec<TaskRelation>> {
        let sql = format!(
            "SELECT {} FROM task_relations WHERE task_id = ?1 ORDER BY id",
            RELATION_COLUMNS
        );
        self.collect(&sql, task_id, relation_from_row)
    }

    // === Bucket Assignment & Position Operations ===

    /// Put a task into a bucket, replacing its bucket in that view.
    pub fn set_task_bucket(&self, task_bucket: &TaskBucket) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO task_buckets (task_id, bucket_id, view_id) VALUES (?1, ?2, ?3)",
            params![task_bucket.task_id, task_bucket.bucket_id, task_bucket.view_id],
        )?;
        Ok(())
    }

    pub fn list_task_buckets(&self, task_id: i64) -> Result<Vec<TaskBucket>> {
        let sql = format!(
            "SELECT {} FROM task_buckets WHERE task_id = ?1 ORDER BY view_id",
            TASK_BUCKET_COLUMNS
        );
        self.collect(&sql, task_id, task_bucket_from_row)
    }

    /// Set a task's position in a view.
    pub fn set_task_position(&self, position: &TaskPosition) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO task_positions (task_id, view_id, position) VALUES (?1, ?2, ?3)",
            params![position.task_id, position.view_id, position.position],
        )?;
        Ok(())
    }

    pub fn list_task_positions(&self, task_id: i64) -> Result<Vec<TaskPosition>> {
        let sql = format!(
            "SELECT {} FROM task_positions WHERE task_id = ?1 ORDER BY view_id",
            TASK_POSITION_COLUMNS
        );
        self.collect(&sql, task_id, task_position_from_row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Permission, ReminderAnchor, Task};
    use crate::test_utils::{TestEnv, add_label, add_project, add_task, add_user};

    #[test]
    fn test_create_task_assigns_index_and_uid() {
        let env = TestEnv::new();
        let storage = env.init_storage();
        let owner = add_user(&storage, "ana");
        let project = add_project(&storage, "Board", owner);

        let first = add_task(&storage, project.id, "First", owner);
        let second = add_task(&storage, project.id, "Second", owner);

        assert_eq!(first.index, 1);
        assert_eq!(second.index, 2);
        assert!(!first.uid.is_empty());
        assert_ne!(first.uid, second.uid);
        assert_eq!(storage.records().count_tasks(project.id).unwrap(), 2);
    }

    #[test]
    fn test_create_task_keeps_explicit_index() {
        let env = TestEnv::new();
        let storage = env.init_storage();
        let owner = add_user(&storage, "ana");
        let project = add_project(&storage, "Board", owner);

        let mut task = Task::new(project.id, "Indexed", owner);
        task.index = 17;
        let task = storage.records().create_task(&task, owner, false).unwrap();
        assert_eq!(task.index, 17);
    }

    #[test]
    fn test_create_task_permission_check() {
        let env = TestEnv::new();
        let storage = env.init_storage();
        let owner = add_user(&storage, "ana");
        let stranger = add_user(&storage, "bo");
        let project = add_project(&storage, "Board", owner);

        let task = Task::new(project.id, "Sneaky", stranger);
        let result = storage.records().create_task(&task, stranger, true);
        assert!(matches!(result, Err(Error::AccessDenied(_))));

        // The same call without the check goes through
        storage.records().create_task(&task, stranger, false).unwrap();
    }

    #[test]
    fn test_create_task_with_assignees_requires_access() {
        let env = TestEnv::new();
        let storage = env.init_storage();
        let owner = add_user(&storage, "ana");
        let member = add_user(&storage, "bo");
        let stranger = add_user(&storage, "cy");
        let project = add_project(&storage, "Board", owner);
        storage
            .records()
            .add_user_grant(member, project.id, Permission::Read)
            .unwrap();

        let mut task = Task::new(project.id, "Assigned", owner);
        task.assignees = vec![member];
        let created = storage.records().create_task(&task, owner, true).unwrap();
        assert_eq!(created.assignees, vec![member]);

        task.assignees = vec![stranger];
        let result = storage.records().create_task(&task, owner, true);
        assert!(matches!(result, Err(Error::AccessDenied(_))));
    }

    #[test]
    fn test_relation_stored_both_ways() {
        let env = TestEnv::new();
        let storage = env.init_storage();
        let owner = add_user(&storage, "ana");
        let project = add_project(&storage, "Board", owner);
        let a = add_task(&storage, project.id, "A", owner);
        let b = add_task(&storage, project.id, "B", owner);

        storage
            .records()
            .create_relation(a.id, b.id, RelationKind::Blocking, owner)
            .unwrap();

        let from_a = storage.records().list_relations(a.id).unwrap();
        let from_b = storage.records().list_relations(b.id).unwrap();
        assert_eq!(from_a.len(), 1);
        assert_eq!(from_a[0].relation_kind, RelationKind::Blocking);
        assert_eq!(from_b.len(), 1);
        assert_eq!(from_b[0].relation_kind, RelationKind::Blocked);
    }

    #[test]
    fn test_self_relation_rejected() {
        let env = TestEnv::new();
        let storage = env.init_storage();
        let owner = add_user(&storage, "ana");
        let project = add_project(&storage, "Board", owner);
        let a = add_task(&storage, project.id, "A", owner);

        let result = storage
            .records()
            .create_relation(a.id, a.id, RelationKind::Related, owner);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_task_children_roundtrip() {
        let env = TestEnv::new();
        let storage = env.init_storage();
        let owner = add_user(&storage, "ana");
        let project = add_project(&storage, "Board", owner);
        let task = add_task(&storage, project.id, "A", owner);
        let label = add_label(&storage, "urgent", owner);
        let records = storage.records();
        let now = Utc::now();

        records
            .add_label_task(&LabelTask {
                task_id: task.id,
                label_id: label,
                created_at: now,
            })
            .unwrap();
        records
            .add_comment(&Comment {
                id: 0,
                task_id: task.id,
                author_id: owner,
                comment: "looks good".to_string(),
                created_at: now,
                updated_at: now,
            })
            .unwrap();
        records
            .add_reminder(&Reminder {
                id: 0,
                task_id: task.id,
                reminder: now,
                relative_period: -3600,
                relative_to: Some(ReminderAnchor::DueDate),
                created_at: now,
            })
            .unwrap();

        assert_eq!(records.list_label_tasks(task.id).unwrap().len(), 1);
        assert_eq!(records.list_comments(task.id).unwrap()[0].comment, "looks good");
        let reminders = records.list_reminders(task.id).unwrap();
        assert_eq!(reminders[0].relative_to, Some(ReminderAnchor::DueDate));
        assert_eq!(reminders[0].relative_period, -3600);
    }
}
