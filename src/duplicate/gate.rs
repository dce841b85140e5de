//! Authorization for a duplication, checked before anything is written.

use crate::access::AccessPolicy;
use crate::models::Principal;
use crate::storage::Records;
use crate::{Error, Result};
use rusqlite::Connection;

pub struct AuthorizationGate<'p, P: AccessPolicy> {
    policy: &'p P,
}

impl<'p, P: AccessPolicy> AuthorizationGate<'p, P> {
    pub fn new(policy: &'p P) -> Self {
        Self { policy }
    }

    /// Check that `principal` may duplicate `source_id` under `destination_parent`.
    ///
    /// Requires read on the source and, when a parent is given, write on the
    /// parent. Only users can own the duplicate; the returned id is that user.
    pub fn authorize(
        &self,
        conn: &Connection,
        source_id: i64,
        destination_parent: Option<i64>,
        principal: &Principal,
    ) -> Result<i64> {
        let records = Records::new(conn);
        if records.find_project(source_id)?.is_none() {
            return Err(Error::NotFound(format!("Project not found: {}", source_id)));
        }

        let Some(user_id) = principal.user_id() else {
            return Err(Error::AccessDenied(format!(
                "{} cannot create projects",
                principal
            )));
        };

        if !self.policy.can_read(conn, source_id, principal)? {
            return Err(Error::AccessDenied(format!(
                "{} cannot read project {}",
                principal, source_id
            )));
        }

        if let Some(parent) = destination_parent {
            if records.find_project(parent)?.is_none() {
                return Err(Error::NotFound(format!("Project not found: {}", parent)));
            }
            if !self.policy.can_write(conn, parent, principal)? {
                return Err(Error::AccessDenied(format!(
                    "{} cannot write to project {}",
                    principal, parent
                )));
            }
        }

        Ok(user_id)
    }
}
