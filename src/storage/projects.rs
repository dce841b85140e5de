//! Users, teams, labels, projects, views and buckets.

use super::{Records, text_enum, unique_violation};
use crate::models::{
    Bucket, Label, Project, ProjectDetail, Team, User, View, ViewDetail, ViewKind,
};
use crate::{Error, Result};
use chrono::Utc;
use rusqlite::{OptionalExtension, Row, params};

/// Options for the normal project creation path.
#[derive(Debug, Clone, Copy)]
pub struct ProjectOptions {
    /// Create the List/Gantt/Table/Kanban views and a Backlog bucket.
    pub create_default_views: bool,
}

impl ProjectOptions {
    /// Create the project only.
    pub fn bare() -> Self {
        Self {
            create_default_views: false,
        }
    }
}

impl Default for ProjectOptions {
    fn default() -> Self {
        Self {
            create_default_views: true,
        }
    }
}

pub(crate) const PROJECT_COLUMNS: &str = "id, title, description, identifier, hex_color, owner_id, \
     parent_project_id, position, is_archived, is_favorite, background_file_id, \
     background_blur_hash, created_at, updated_at";

pub(crate) const VIEW_COLUMNS: &str = "id, project_id, title, kind, position, filter, \
     bucket_configuration_mode, default_bucket_id, done_bucket_id, created_at, updated_at";

pub(crate) const BUCKET_COLUMNS: &str =
    "id, view_id, title, task_limit, position, created_by, created_at, updated_at";

pub(crate) fn project_from_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        identifier: row.get(3)?,
        hex_color: row.get(4)?,
        owner_id: row.get(5)?,
        parent_project_id: row.get(6)?,
        position: row.get(7)?,
        is_archived: row.get(8)?,
        is_favorite: row.get(9)?,
        background_file_id: row.get(10)?,
        background_blur_hash: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

pub(crate) fn view_from_row(row: &Row<'_>) -> rusqlite::Result<View> {
    Ok(View {
        id: row.get(0)?,
        project_id: row.get(1)?,
        title: row.get(2)?,
        kind: text_enum(row, 3)?,
        position: row.get(4)?,
        filter: row.get(5)?,
        bucket_configuration_mode: text_enum(row, 6)?,
        default_bucket_id: row.get(7)?,
        done_bucket_id: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

pub(crate) fn bucket_from_row(row: &Row<'_>) -> rusqlite::Result<Bucket> {
    Ok(Bucket {
        id: row.get(0)?,
        view_id: row.get(1)?,
        title: row.get(2)?,
        limit: row.get(3)?,
        position: row.get(4)?,
        created_by: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        name: row.get(2)?,
        email: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// Position given to a project created without one.
pub fn default_position(id: i64) -> f64 {
    id as f64 * 65536.0
}

impl<'c> Records<'c> {
    // === User Operations ===

    /// Create a user.
    pub fn create_user(&self, user: &User) -> Result<User> {
        self.conn
            .execute(
                "INSERT INTO users (username, name, email, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![user.username, user.name, user.email, user.created_at],
            )
            .map_err(|e| unique_violation(e, || format!("username {}", user.username)))?;
        self.get_user(self.conn.last_insert_rowid())
    }

    /// Get a user by ID.
    pub fn get_user(&self, id: i64) -> Result<User> {
        self.conn
            .query_row(
                "SELECT id, username, name, email, created_at FROM users WHERE id = ?1",
                [id],
                user_from_row,
            )
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("User not found: {}", id)))
    }

    // === Team Operations ===

    /// Create a team; the creator becomes its first member.
    pub fn create_team(&self, name: &str, created_by: i64) -> Result<Team> {
        let now = Utc::now();
        self.conn.execute(
            "INSERT INTO teams (name, created_by, created_at) VALUES (?1, ?2, ?3)",
            params![name, created_by, now],
        )?;
        let id = self.conn.last_insert_rowid();
        self.add_team_member(id, created_by)?;
        Ok(Team {
            id,
            name: name.to_string(),
            created_by,
            created_at: now,
        })
    }

    /// Add a user to a team. Adding an existing member is a no-op.
    pub fn add_team_member(&self, team_id: i64, user_id: i64) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO team_members (team_id, user_id) VALUES (?1, ?2)",
            params![team_id, user_id],
        )?;
        Ok(())
    }

    // === Label Operations ===

    /// Create a label.
    pub fn create_label(&self, label: &Label) -> Result<Label> {
        self.conn.execute(
            "INSERT INTO labels (title, hex_color, created_by, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![label.title, label.hex_color, label.created_by, label.created_at],
        )?;
        Ok(Label {
            id: self.conn.last_insert_rowid(),
            ..label.clone()
        })
    }

    // === Project Operations ===

    /// Create a project through the normal creation path.
    ///
    /// Fails with `UniqueConstraintConflict` when the identifier is taken and
    /// with `NotFound` when the parent project does not exist. A zero
    /// position is replaced by the default position for the new id.
    pub fn create_project(&self, project: &Project, options: ProjectOptions) -> Result<Project> {
        if project.title.trim().is_empty() {
            return Err(Error::InvalidInput("Project title cannot be empty".to_string()));
        }
        if let Some(parent) = project.parent_project_id {
            self.get_project(parent)?;
        }

        let now = Utc::now();
        self.conn
            .execute(
                r#"
                INSERT INTO projects
                (title, description, identifier, hex_color, owner_id, parent_project_id,
                 position, is_archived, is_favorite, background_file_id, background_blur_hash,
                 created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                "#,
                params![
                    project.title,
                    project.description,
                    project.identifier,
                    project.hex_color,
                    project.owner_id,
                    project.parent_project_id,
                    project.position,
                    project.is_archived,
                    project.is_favorite,
                    project.background_file_id,
                    project.background_blur_hash,
                    now,
                    now,
                ],
            )
            .map_err(|e| {
                unique_violation(e, || format!("project identifier {}", project.identifier))
            })?;
        let id = self.conn.last_insert_rowid();

        if project.position == 0.0 {
            self.conn.execute(
                "UPDATE projects SET position = ?1 WHERE id = ?2",
                params![default_position(id), id],
            )?;
        }

        if options.create_default_views {
            self.create_default_views(id, project.owner_id)?;
        }

        self.get_project(id)
    }

    fn create_default_views(&self, project_id: i64, owner_id: i64) -> Result<()> {
        let kinds = [
            ("List", ViewKind::List),
            ("Gantt", ViewKind::Gantt),
            ("Table", ViewKind::Table),
            ("Kanban", ViewKind::Kanban),
        ];
        for (position, (title, kind)) in kinds.into_iter().enumerate() {
            let mut view = View::new(project_id, title, kind);
            view.position = (position as f64 + 1.0) * 100.0;
            if kind == ViewKind::List {
                view.filter = Some("done = false".to_string());
            }
            let view = self.create_view(&view)?;

            if kind == ViewKind::Kanban {
                let backlog = self.create_bucket(&Bucket::new(view.id, "Backlog", owner_id))?;
                self.set_view_buckets(view.id, Some(backlog.id), None)?;
            }
        }
        Ok(())
    }

    /// Get a project by ID.
    pub fn get_project(&self, id: i64) -> Result<Project> {
        let sql = format!("SELECT {} FROM projects WHERE id = ?1", PROJECT_COLUMNS);
        self.conn
            .query_row(&sql, [id], project_from_row)
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("Project not found: {}", id)))
    }

    /// Get a project by ID, `None` when absent.
    pub fn find_project(&self, id: i64) -> Result<Option<Project>> {
        let sql = format!("SELECT {} FROM projects WHERE id = ?1", PROJECT_COLUMNS);
        Ok(self.conn.query_row(&sql, [id], project_from_row).optional()?)
    }

    /// List the direct children of a project.
    pub fn list_child_projects(&self, parent_id: i64) -> Result<Vec<Project>> {
        let sql = format!(
            "SELECT {} FROM projects WHERE parent_project_id = ?1 ORDER BY position, id",
            PROJECT_COLUMNS
        );
        self.collect(&sql, parent_id, project_from_row)
    }

    /// Set or clear a project's background resource.
    pub fn set_project_background(
        &self,
        project_id: i64,
        file_id: Option<i64>,
        blur_hash: Option<&str>,
    ) -> Result<()> {
        self.conn.execute(
            r#"
            UPDATE projects SET background_file_id = ?1, background_blur_hash = ?2, updated_at = ?3
            WHERE id = ?4
            "#,
            params![file_id, blur_hash, Utc::now(), project_id],
        )?;
        Ok(())
    }

    /// Archive or unarchive a project.
    pub fn set_project_archived(&self, project_id: i64, archived: bool) -> Result<()> {
        self.conn.execute(
            "UPDATE projects SET is_archived = ?1, updated_at = ?2 WHERE id = ?3",
            params![archived, Utc::now(), project_id],
        )?;
        Ok(())
    }

    /// Load a project with its owner, views and buckets.
    pub fn project_detail(&self, id: i64) -> Result<ProjectDetail> {
        let project = self.get_project(id)?;
        let owner = self.get_user(project.owner_id)?;

        let mut views = Vec::new();
        for view in self.list_views(id)? {
            let buckets = self.list_buckets(view.id)?;
            views.push(ViewDetail { view, buckets });
        }

        let task_count = self.count_tasks(id)?;

        Ok(ProjectDetail {
            project,
            owner,
            views,
            task_count,
        })
    }

    // === View Operations ===

    /// Create a view. Bucket references are written as given; use
    /// `set_view_buckets` once the buckets exist.
    pub fn create_view(&self, view: &View) -> Result<View> {
        self.conn.execute(
            r#"
            INSERT INTO project_views
            (project_id, title, kind, position, filter, bucket_configuration_mode,
             default_bucket_id, done_bucket_id, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                view.project_id,
                view.title,
                view.kind.to_string(),
                view.position,
                view.filter,
                view.bucket_configuration_mode.to_string(),
                view.default_bucket_id,
                view.done_bucket_id,
                view.created_at,
                view.updated_at,
            ],
        )?;
        self.get_view(self.conn.last_insert_rowid())
    }

    /// Get a view by ID.
    pub fn get_view(&self, id: i64) -> Result<View> {
        let sql = format!("SELECT {} FROM project_views WHERE id = ?1", VIEW_COLUMNS);
        self.conn
            .query_row(&sql, [id], view_from_row)
            .optional()?
            .ok_or_else(|| Error::NotFound(format!("View not found: {}", id)))
    }

    /// List the views of a project.
    pub fn list_views(&self, project_id: i64) -> Result<Vec<View>> {
        let sql = format!(
            "SELECT {} FROM project_views WHERE project_id = ?1 ORDER BY position, id",
            VIEW_COLUMNS
        );
        self.collect(&sql, project_id, view_from_row)
    }

    /// Point a view at its default and done buckets.
    pub fn set_view_buckets(
        &self,
        view_id: i64,
        default_bucket_id: Option<i64>,
        done_bucket_id: Option<i64>,
    ) -> Result<()> {
        self.conn.execute(
            r#"
            UPDATE project_views SET default_bucket_id = ?1, done_bucket_id = ?2, updated_at = ?3
            WHERE id = ?4
            "#,
            params![default_bucket_id, done_bucket_id, Utc::now(), view_id],
        )?;
        Ok(())
    }

    // === Bucket Operations ===

    /// Create a bucket.
    pub fn create_bucket(&self, bucket: &Bucket) -> Result<Bucket> {
        self.conn.execute(
            r#"
            INSERT INTO buckets (view_id, title, task_limit, position, created_by, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                bucket.view_id,
                bucket.title,
                bucket.limit,
                bucket.position,
                bucket.created_by,
                bucket.created_at,
                bucket.updated_at,
            ],
        )?;
        Ok(Bucket {
            id: self.conn.last_insert_rowid(),
            ..bucket.clone()
        })
    }

    /// List the buckets of a view.
    pub fn list_buckets(&self, view_id: i64) -> Result<Vec<Bucket>> {
        let sql = format!(
            "SELECT {} FROM buckets WHERE view_id = ?1 ORDER BY position, id",
            BUCKET_COLUMNS
        );
        self.collect(&sql, view_id, bucket_from_row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{TestEnv, add_project, add_user};

    #[test]
    fn test_create_and_get_project() {
        let env = TestEnv::new();
        let storage = env.init_storage();
        let owner = add_user(&storage, "ana");

        let project = add_project(&storage, "Roadmap", owner);
        let fetched = storage.records().get_project(project.id).unwrap();

        assert_eq!(fetched.title, "Roadmap");
        assert_eq!(fetched.owner_id, owner);
        assert_eq!(fetched.position, default_position(project.id));
    }

    #[test]
    fn test_get_missing_project() {
        let env = TestEnv::new();
        let storage = env.init_storage();
        let result = storage.records().get_project(42);
        assert!(matches!(result, Err(Error::NotFound(_))));
        assert!(storage.records().find_project(42).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_identifier_conflicts() {
        let env = TestEnv::new();
        let storage = env.init_storage();
        let owner = add_user(&storage, "ana");

        let mut project = Project::new("Ops", owner);
        project.identifier = "OPS".to_string();
        storage
            .records()
            .create_project(&project, ProjectOptions::bare())
            .unwrap();

        let result = storage.records().create_project(&project, ProjectOptions::bare());
        assert!(matches!(result, Err(Error::UniqueConstraintConflict(_))));
    }

    #[test]
    fn test_empty_identifiers_do_not_conflict() {
        let env = TestEnv::new();
        let storage = env.init_storage();
        let owner = add_user(&storage, "ana");

        add_project(&storage, "One", owner);
        add_project(&storage, "Two", owner);
    }

    #[test]
    fn test_missing_parent_is_rejected() {
        let env = TestEnv::new();
        let storage = env.init_storage();
        let owner = add_user(&storage, "ana");

        let mut project = Project::new("Child", owner);
        project.parent_project_id = Some(99);
        let result = storage.records().create_project(&project, ProjectOptions::bare());
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_default_views_created() {
        let env = TestEnv::new();
        let storage = env.init_storage();
        let owner = add_user(&storage, "ana");

        let project = storage
            .records()
            .create_project(&Project::new("Board", owner), ProjectOptions::default())
            .unwrap();
        let detail = storage.records().project_detail(project.id).unwrap();

        let kinds: Vec<ViewKind> = detail.views.iter().map(|v| v.view.kind).collect();
        assert_eq!(
            kinds,
            vec![ViewKind::List, ViewKind::Gantt, ViewKind::Table, ViewKind::Kanban]
        );

        let kanban = &detail.views[3];
        assert_eq!(kanban.buckets.len(), 1);
        assert_eq!(kanban.view.default_bucket_id, Some(kanban.buckets[0].id));
        assert_eq!(detail.owner.username, "ana");
        assert_eq!(detail.task_count, 0);
    }

    #[test]
    fn test_view_bucket_cycle() {
        let env = TestEnv::new();
        let storage = env.init_storage();
        let owner = add_user(&storage, "ana");
        let project = add_project(&storage, "Board", owner);
        let records = storage.records();

        let view = records
            .create_view(&View::new(project.id, "Kanban", ViewKind::Kanban))
            .unwrap();
        let todo = records.create_bucket(&Bucket::new(view.id, "Todo", owner)).unwrap();
        let done = records.create_bucket(&Bucket::new(view.id, "Done", owner)).unwrap();
        records
            .set_view_buckets(view.id, Some(todo.id), Some(done.id))
            .unwrap();

        let view = records.get_view(view.id).unwrap();
        assert_eq!(view.default_bucket_id, Some(todo.id));
        assert_eq!(view.done_bucket_id, Some(done.id));
        assert_eq!(records.list_buckets(view.id).unwrap().len(), 2);
    }
}
