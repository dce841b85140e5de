//! Project access checks.
//!
//! [`AccessPolicy`] is the seam the duplication engine depends on; it is
//! evaluated against whatever connection the caller holds, so checks made in
//! the middle of a duplication see the rows written earlier in the same
//! transaction.
//!
//! [`GrantPolicy`] is the built-in implementation:
//! - the owner of a project has admin access
//! - user grants and team grants (via team membership) give their permission
//! - access to a parent project is inherited by all of its descendants
//! - archived projects (or projects below an archived parent) are read-only
//! - a link share reads its project and the projects below it, and writes
//!   only when shared with write permission

use crate::Result;
use crate::models::{Permission, Principal, Project};
use crate::storage::Records;
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::HashSet;

/// Read/write capability checks on projects.
pub trait AccessPolicy {
    /// Whether `principal` can read `project_id`. An absent project is never readable.
    fn can_read(&self, conn: &Connection, project_id: i64, principal: &Principal) -> Result<bool>;

    /// Whether `principal` can write to `project_id`.
    fn can_write(&self, conn: &Connection, project_id: i64, principal: &Principal)
    -> Result<bool>;
}

/// Access derived from ownership, grants and the project hierarchy.
#[derive(Debug, Clone, Copy, Default)]
pub struct GrantPolicy;

impl GrantPolicy {
    /// The project and its ancestors, nearest first. Empty if the project does not exist.
    fn lineage(&self, conn: &Connection, project_id: i64) -> Result<Vec<Project>> {
        let records = Records::new(conn);
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut next = Some(project_id);

        while let Some(id) = next {
            if !seen.insert(id) {
                break;
            }
            match records.find_project(id)? {
                Some(project) => {
                    next = project.parent_project_id;
                    chain.push(project);
                }
                None => break,
            }
        }

        Ok(chain)
    }

    /// Highest permission a user holds on a single project, ignoring ancestors.
    fn direct_permission(
        &self,
        conn: &Connection,
        project: &Project,
        user_id: i64,
    ) -> Result<Option<Permission>> {
        if project.owner_id == user_id {
            return Ok(Some(Permission::Admin));
        }

        let user_grant: Option<i64> = conn
            .query_row(
                "SELECT permission FROM project_users WHERE project_id = ?1 AND user_id = ?2",
                params![project.id, user_id],
                |row| row.get(0),
            )
            .optional()?;

        let team_grant: Option<i64> = conn.query_row(
            r#"
            SELECT MAX(pt.permission) FROM project_teams pt
            JOIN team_members tm ON tm.team_id = pt.team_id
            WHERE pt.project_id = ?1 AND tm.user_id = ?2
            "#,
            params![project.id, user_id],
            |row| row.get(0),
        )?;

        Ok(user_grant
            .into_iter()
            .chain(team_grant)
            .filter_map(Permission::from_i64)
            .max())
    }

    /// Highest permission a user holds on a project, including inherited access.
    pub fn max_permission(
        &self,
        conn: &Connection,
        project_id: i64,
        user_id: i64,
    ) -> Result<Option<Permission>> {
        let mut best = None;
        for project in self.lineage(conn, project_id)? {
            let direct = self.direct_permission(conn, &project, user_id)?;
            best = best.max(direct);
        }
        Ok(best)
    }
}

impl AccessPolicy for GrantPolicy {
    fn can_read(&self, conn: &Connection, project_id: i64, principal: &Principal) -> Result<bool> {
        match principal {
            Principal::User { id } => Ok(self.max_permission(conn, project_id, *id)?.is_some()),
            Principal::LinkShare {
                project_id: shared, ..
            } => Ok(self
                .lineage(conn, project_id)?
                .iter()
                .any(|p| p.id == *shared)),
        }
    }

    fn can_write(
        &self,
        conn: &Connection,
        project_id: i64,
        principal: &Principal,
    ) -> Result<bool> {
        let lineage = self.lineage(conn, project_id)?;
        if lineage.is_empty() || lineage.iter().any(|p| p.is_archived) {
            return Ok(false);
        }

        match principal {
            Principal::User { id } => Ok(self
                .max_permission(conn, project_id, *id)?
                .is_some_and(|p| p >= Permission::Write)),
            Principal::LinkShare {
                project_id: shared,
                permission,
                ..
            } => Ok(*permission >= Permission::Write && lineage.iter().any(|p| p.id == *shared)),
        }
    }
}
