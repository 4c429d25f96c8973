//! Identity provider seam.
//!
//! Resolves a request's session token into an [`Actor`]. Session issuance
//! and cookies are handled elsewhere; this module only reads session rows.

use crate::db::NOW_SQL;
use crate::model::actor::{Actor, Role};
use crate::repo::package_repo::{RepoError, RepoResult};
use crate::repo::support::ensure_tables;
use rusqlite::{params, Connection, OptionalExtension};

/// Maps a session token onto the acting identity.
pub trait IdentityProvider {
    /// Unknown, blank or expired tokens resolve to [`Actor::Anonymous`].
    fn resolve_actor(&self, token: &str) -> RepoResult<Actor>;
}

/// Session-table backed identity provider.
pub struct SqliteSessionIdentity<'conn> {
    conn: &'conn Connection,
    ttl_secs: i64,
}

impl<'conn> SqliteSessionIdentity<'conn> {
    pub fn try_new(conn: &'conn Connection, ttl_secs: i64) -> RepoResult<Self> {
        ensure_tables(conn, &["users", "sessions"])?;
        Ok(Self { conn, ttl_secs })
    }
}

impl IdentityProvider for SqliteSessionIdentity<'_> {
    fn resolve_actor(&self, token: &str) -> RepoResult<Actor> {
        let token = token.trim();
        if token.is_empty() {
            return Ok(Actor::Anonymous);
        }

        let found: Option<(i64, i64)> = self
            .conn
            .query_row(
                &format!(
                    "SELECT u.id, u.account_type
                     FROM sessions s
                     INNER JOIN users u ON u.id = s.user_id
                     WHERE s.session_id = ?1
                       AND s.last_update_ts + ?2 >= {NOW_SQL};"
                ),
                params![token, self.ttl_secs],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((id, account_type)) = found else {
            log::debug!("event=resolve_actor module=identity status=anonymous");
            return Ok(Actor::Anonymous);
        };
        let role = Role::from_account_type(account_type).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "user {id} has unknown account type `{account_type}`"
            ))
        })?;
        Ok(Actor::Authenticated { id, role })
    }
}
