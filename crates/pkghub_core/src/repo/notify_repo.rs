//! Comment-notification subscription repository.
//!
//! # Invariants
//! - At most one subscription row exists per `(user, package)`.
//! - Subscribing twice is a no-op; unsubscribing a missing row is a no-op.

use crate::model::{PackageId, UserId};
use crate::repo::package_repo::{PackageName, RepoResult};
use crate::repo::support::{ensure_tables, package_names_in_order};
use rusqlite::{params, Connection, Transaction, TransactionBehavior};
use std::collections::BTreeSet;

/// Repository interface for comment notification subscriptions.
pub trait NotifyRepository {
    /// Subscribes `user` to every existing package in `ids`.
    ///
    /// Returns the names of the processed packages in input order.
    fn subscribe(&self, user: UserId, ids: &[PackageId]) -> RepoResult<Vec<PackageName>>;
    /// Drops the subscriptions of `user` on `ids`.
    fn unsubscribe(&self, user: UserId, ids: &[PackageId]) -> RepoResult<Vec<PackageName>>;
    fn notified_package_ids(&self, user: UserId) -> RepoResult<BTreeSet<PackageId>>;
}

/// SQLite-backed notification repository.
pub struct SqliteNotifyRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNotifyRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_tables(conn, &["packages", "comment_notify"])?;
        Ok(Self { conn })
    }

    fn toggle(&self, sql: &str, user: UserId, ids: &[PackageId]) -> RepoResult<Vec<PackageName>> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let processed = package_names_in_order(&tx, ids)?;
        for package in &processed {
            tx.execute(sql, params![user, package.id])?;
        }
        tx.commit()?;
        Ok(processed)
    }
}

impl NotifyRepository for SqliteNotifyRepository<'_> {
    fn subscribe(&self, user: UserId, ids: &[PackageId]) -> RepoResult<Vec<PackageName>> {
        self.toggle(
            "INSERT OR IGNORE INTO comment_notify (user_id, package_id) VALUES (?1, ?2);",
            user,
            ids,
        )
    }

    fn unsubscribe(&self, user: UserId, ids: &[PackageId]) -> RepoResult<Vec<PackageName>> {
        self.toggle(
            "DELETE FROM comment_notify WHERE user_id = ?1 AND package_id = ?2;",
            user,
            ids,
        )
    }

    fn notified_package_ids(&self, user: UserId) -> RepoResult<BTreeSet<PackageId>> {
        let mut stmt = self
            .conn
            .prepare("SELECT package_id FROM comment_notify WHERE user_id = ?1;")?;
        let mut rows = stmt.query([user])?;
        let mut ids = BTreeSet::new();
        while let Some(row) = rows.next()? {
            ids.insert(row.get(0)?);
        }
        Ok(ids)
    }
}
