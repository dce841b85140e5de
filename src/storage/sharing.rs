//! User grants, team grants and public link shares.

use super::{Records, conversion_error, unique_violation};
use crate::models::{LinkShare, Permission, SharingType, TeamGrant, UserGrant};
use crate::{Error, Result};
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{OptionalExtension, Row, params};

pub(crate) const USER_GRANT_COLUMNS: &str =
    "id, user_id, project_id, permission, created_at, updated_at";
pub(crate) const TEAM_GRANT_COLUMNS: &str =
    "id, team_id, project_id, permission, created_at, updated_at";
pub(crate) const LINK_SHARE_COLUMNS: &str = "id, hash, name, project_id, permission, \
     sharing_type, password_hash, shared_by, created_at, updated_at";

fn permission_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Permission> {
    let raw: i64 = row.get(idx)?;
    Permission::from_i64(raw)
        .ok_or_else(|| conversion_error(idx, Type::Integer, format!("Unknown permission: {}", raw)))
}

pub(crate) fn user_grant_from_row(row: &Row<'_>) -> rusqlite::Result<UserGrant> {
    Ok(UserGrant {
        id: row.get(0)?,
        user_id: row.get(1)?,
        project_id: row.get(2)?,
        permission: permission_at(row, 3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

pub(crate) fn team_grant_from_row(row: &Row<'_>) -> rusqlite::Result<TeamGrant> {
    Ok(TeamGrant {
        id: row.get(0)?,
        team_id: row.get(1)?,
        project_id: row.get(2)?,
        permission: permission_at(row, 3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

pub(crate) fn link_share_from_row(row: &Row<'_>) -> rusqlite::Result<LinkShare> {
    let raw_type: i64 = row.get(5)?;
    let sharing_type = SharingType::from_i64(raw_type).ok_or_else(|| {
        conversion_error(5, Type::Integer, format!("Unknown sharing type: {}", raw_type))
    })?;
    Ok(LinkShare {
        id: row.get(0)?,
        hash: row.get(1)?,
        name: row.get(2)?,
        project_id: row.get(3)?,
        permission: permission_at(row, 4)?,
        sharing_type,
        password_hash: row.get(6)?,
        shared_by: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

impl<'c> Records<'c> {
    // === User Grant Operations ===

    /// Grant a user access to a project.
    pub fn add_user_grant(
        &self,
        user_id: i64,
        project_id: i64,
        permission: Permission,
    ) -> Result<UserGrant> {
        let now = Utc::now();
        self.conn
            .execute(
                r#"
                INSERT INTO project_users (user_id, project_id, permission, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![user_id, project_id, permission.as_i64(), now, now],
            )
            .map_err(|e| {
                unique_violation(e, || {
                    format!("user {} already shares project {}", user_id, project_id)
                })
            })?;
        Ok(UserGrant {
            id: self.conn.last_insert_rowid(),
            user_id,
            project_id,
            permission,
            created_at: now,
            updated_at: now,
        })
    }

    /// List the direct user grants of a project.
    pub fn list_user_grants(&self, project_id: i64) -> Result<Vec<UserGrant>> {
        let sql = format!(
            "SELECT {} FROM project_users WHERE project_id = ?1 ORDER BY id",
            USER_GRANT_COLUMNS
        );
        self.collect(&sql, project_id, user_grant_from_row)
    }

    // === Team Grant Operations ===

    /// Grant a team access to a project.
    pub fn add_team_grant(
        &self,
        team_id: i64,
        project_id: i64,
        permission: Permission,
    ) -> Result<TeamGrant> {
        let now = Utc::now();
        self.conn
            .execute(
                r#"
                INSERT INTO project_teams (team_id, project_id, permission, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![team_id, project_id, permission.as_i64(), now, now],
            )
            .map_err(|e| {
                unique_violation(e, || {
                    format!("team {} already shares project {}", team_id, project_id)
                })
            })?;
        Ok(TeamGrant {
            id: self.conn.last_insert_rowid(),
            team_id,
            project_id,
            permission,
            created_at: now,
            updated_at: now,
        })
    }

    /// List the team grants of a project.
    pub fn list_team_grants(&self, project_id: i64) -> Result<Vec<TeamGrant>> {
        let sql = format!(
            "SELECT {} FROM project_teams WHERE project_id = ?1 ORDER BY id",
            TEAM_GRANT_COLUMNS
        );
        self.collect(&sql, project_id, team_grant_from_row)
    }

    // === Link Share Operations ===

    /// Create a link share. The caller provides the secret `hash`.
    pub fn create_link_share(&self, share: &LinkShare) -> Result<LinkShare> {
        if share.hash.is_empty() {
            return Err(Error::InvalidInput(
                "Link share hash cannot be empty".to_string(),
            ));
        }
        self.conn
            .execute(
                r#"
                INSERT INTO link_shares
                (hash, name, project_id, permission, sharing_type, password_hash, shared_by,
                 created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
                params![
                    share.hash,
                    share.name,
                    share.project_id,
                    share.permission.as_i64(),
                    share.sharing_type.as_i64(),
                    share.password_hash,
                    share.shared_by,
                    share.created_at,
                    share.updated_at,
                ],
            )
            .map_err(|e| unique_violation(e, || "link share hash".to_string()))?;
        Ok(LinkShare {
            id: self.conn.last_insert_rowid(),
            ..share.clone()
        })
    }

    /// List the link shares of a project.
    pub fn list_link_shares(&self, project_id: i64) -> Result<Vec<LinkShare>> {
        let sql = format!(
            "SELECT {} FROM link_shares WHERE project_id = ?1 ORDER BY id",
            LINK_SHARE_COLUMNS
        );
        self.collect(&sql, project_id, link_share_from_row)
    }

    /// Find a link share by its secret hash.
    pub fn find_link_share(&self, hash: &str) -> Result<Option<LinkShare>> {
        let sql = format!("SELECT {} FROM link_shares WHERE hash = ?1", LINK_SHARE_COLUMNS);
        Ok(self
            .conn
            .query_row(&sql, [hash], link_share_from_row)
            .optional()?)
    }
}
