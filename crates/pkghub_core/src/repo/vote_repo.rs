//! Vote repository contracts and SQLite implementation.
//!
//! # Invariants
//! - At most one vote row exists per `(user, package)`.
//! - A vote row is inserted or removed in the same transaction as the
//!   matching `num_votes` adjustment.
//! - The "already voted" check runs inside that transaction.

use crate::db::NOW_SQL;
use crate::model::{PackageId, UserId};
use crate::repo::package_repo::RepoResult;
use crate::repo::support::{ensure_tables, existing_package_ids};
use rusqlite::{params, Connection, Transaction, TransactionBehavior};
use std::collections::BTreeSet;

/// Repository interface for the `(user, package)` vote relation.
pub trait VoteRepository {
    /// Votes for every package in `ids` the user has not voted for yet.
    ///
    /// Returns the packages that received a new vote, in input order.
    fn cast_votes(&self, user: UserId, ids: &[PackageId]) -> RepoResult<Vec<PackageId>>;
    /// Removes the user's votes from `ids`; returns packages that lost one.
    fn retract_votes(&self, user: UserId, ids: &[PackageId]) -> RepoResult<Vec<PackageId>>;
    fn voted_package_ids(&self, user: UserId) -> RepoResult<BTreeSet<PackageId>>;
    /// Live vote rows referencing `package`.
    fn live_vote_count(&self, package: PackageId) -> RepoResult<i64>;
}

/// SQLite-backed vote repository.
pub struct SqliteVoteRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteVoteRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_tables(conn, &["users", "packages", "package_votes"])?;
        Ok(Self { conn })
    }
}

impl VoteRepository for SqliteVoteRepository<'_> {
    fn cast_votes(&self, user: UserId, ids: &[PackageId]) -> RepoResult<Vec<PackageId>> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let mut voted = Vec::new();

        for id in existing_package_ids(&tx, ids)? {
            let inserted = tx.execute(
                "INSERT OR IGNORE INTO package_votes (user_id, package_id) VALUES (?1, ?2);",
                params![user, id],
            )?;
            if inserted == 0 {
                continue;
            }
            tx.execute(
                "UPDATE packages SET num_votes = num_votes + 1 WHERE id = ?1;",
                [id],
            )?;
            voted.push(id);
        }

        tx.execute(
            &format!("UPDATE users SET last_voted_ts = {NOW_SQL} WHERE id = ?1;"),
            [user],
        )?;
        tx.commit()?;
        Ok(voted)
    }

    fn retract_votes(&self, user: UserId, ids: &[PackageId]) -> RepoResult<Vec<PackageId>> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let mut retracted = Vec::new();

        for id in existing_package_ids(&tx, ids)? {
            let removed = tx.execute(
                "DELETE FROM package_votes WHERE user_id = ?1 AND package_id = ?2;",
                params![user, id],
            )?;
            if removed == 0 {
                continue;
            }
            tx.execute(
                "UPDATE packages SET num_votes = num_votes - 1 WHERE id = ?1;",
                [id],
            )?;
            retracted.push(id);
        }

        tx.commit()?;
        Ok(retracted)
    }

    fn voted_package_ids(&self, user: UserId) -> RepoResult<BTreeSet<PackageId>> {
        let mut stmt = self
            .conn
            .prepare("SELECT package_id FROM package_votes WHERE user_id = ?1;")?;
        let mut rows = stmt.query([user])?;
        let mut ids = BTreeSet::new();
        while let Some(row) = rows.next()? {
            ids.insert(row.get(0)?);
        }
        Ok(ids)
    }

    fn live_vote_count(&self, package: PackageId) -> RepoResult<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM package_votes WHERE package_id = ?1;",
            [package],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
