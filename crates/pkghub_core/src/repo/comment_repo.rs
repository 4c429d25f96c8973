//! Package comment repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist comment moderation state: deletion, pins and edits.
//! - Serve comment listings for package pages.
//!
//! # Invariants
//! - Comments are never hard-deleted here; deletion sets `deleted_ts`.
//! - Deleting a comment clears its pin.
//! - The pin bound and the caller's permission check run inside the pinning
//!   transaction, so concurrent pin attempts cannot overshoot the bound.

use crate::db::NOW_SQL;
use crate::model::comment::{Comment, CommentAuthor};
use crate::model::{CommentId, PackageId, UserId};
use crate::repo::package_repo::{Eligibility, RepoError, RepoResult};
use crate::repo::support::{ensure_tables, load_ownerships};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};

const COMMENT_SELECT_SQL: &str = "SELECT
    id,
    package_id,
    author_uid,
    body,
    created_ts,
    edited_ts,
    editor_uid,
    deleted_ts,
    deleter_uid,
    pinned_ts
FROM package_comments";

/// Query options for listing comments of one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentListQuery {
    pub package_id: PackageId,
    pub include_deleted: bool,
    /// `None` returns every matching comment.
    pub limit: Option<u32>,
    pub offset: u32,
}

impl CommentListQuery {
    pub fn for_package(package_id: PackageId) -> Self {
        Self {
            package_id,
            include_deleted: false,
            limit: None,
            offset: 0,
        }
    }
}

/// Repository interface for package comments.
pub trait CommentRepository {
    /// Stores a new live comment. Comment submission itself lives outside
    /// the moderation core; this is the storage primitive it uses.
    fn add_comment(
        &self,
        package_id: PackageId,
        author: Option<UserId>,
        body: &str,
    ) -> RepoResult<CommentId>;
    fn get_comment(&self, id: CommentId) -> RepoResult<Option<Comment>>;
    fn comment_author(&self, id: CommentId) -> RepoResult<Option<CommentAuthor>>;
    /// Lists comments newest first.
    fn list_comments(&self, query: &CommentListQuery) -> RepoResult<Vec<Comment>>;
    /// Live pinned comments, most recently pinned first.
    fn list_pinned(&self, package_id: PackageId) -> RepoResult<Vec<Comment>>;
    fn count_comments(&self, package_id: PackageId, include_deleted: bool) -> RepoResult<i64>;
    /// Soft-deletes a comment. Keeps the first deleter on repeated calls.
    fn mark_deleted(&self, id: CommentId, deleter: UserId) -> RepoResult<()>;
    /// Clears deletion state.
    fn restore(&self, id: CommentId) -> RepoResult<()>;
    /// Pins a live comment unless its package already holds `limit` pins.
    /// Returns `false` without changes when `eligible` rejects the package.
    fn pin(&self, id: CommentId, limit: i64, eligible: Eligibility<'_>) -> RepoResult<bool>;
    /// Clears the pin of a live comment; same eligibility contract as `pin`.
    fn unpin(&self, id: CommentId, eligible: Eligibility<'_>) -> RepoResult<bool>;
    /// Replaces the body of a live comment and records the editor.
    fn edit(&self, id: CommentId, editor: UserId, body: &str) -> RepoResult<()>;
}

/// SQLite-backed comment repository.
pub struct SqliteCommentRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCommentRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_tables(conn, &["packages", "package_comments"])?;
        Ok(Self { conn })
    }

    fn update_existing(&self, id: CommentId, sql: &str, extra: Option<Value>) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if !comment_exists(&tx, id)? {
            return Err(RepoError::CommentNotFound(id));
        }
        match extra {
            Some(value) => tx.execute(sql, params![id, value])?,
            None => tx.execute(sql, [id])?,
        };
        tx.commit()?;
        Ok(())
    }
}

impl CommentRepository for SqliteCommentRepository<'_> {
    fn add_comment(
        &self,
        package_id: PackageId,
        author: Option<UserId>,
        body: &str,
    ) -> RepoResult<CommentId> {
        let changed = self.conn.execute(
            "INSERT INTO package_comments (package_id, author_uid, body)
             SELECT id, ?2, ?3 FROM packages WHERE id = ?1;",
            params![package_id, author, body],
        )?;
        if changed == 0 {
            return Err(RepoError::PackageNotFound(package_id));
        }
        Ok(self.conn.last_insert_rowid())
    }

    fn get_comment(&self, id: CommentId) -> RepoResult<Option<Comment>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{COMMENT_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_comment_row(row)?));
        }
        Ok(None)
    }

    fn comment_author(&self, id: CommentId) -> RepoResult<Option<CommentAuthor>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, package_id, author_uid, deleted_ts IS NOT NULL
             FROM package_comments
             WHERE id = ?1;",
        )?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(CommentAuthor {
                comment_id: row.get(0)?,
                package_id: row.get(1)?,
                author: row.get(2)?,
                is_deleted: row.get(3)?,
            }));
        }
        Ok(None)
    }

    fn list_comments(&self, query: &CommentListQuery) -> RepoResult<Vec<Comment>> {
        let mut sql = format!("{COMMENT_SELECT_SQL} WHERE package_id = ?");
        let mut bind_values = vec![Value::Integer(query.package_id)];

        if !query.include_deleted {
            sql.push_str(" AND deleted_ts IS NULL");
        }
        sql.push_str(" ORDER BY created_ts DESC, id DESC");

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if query.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(query.offset)));
            }
        } else if query.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut comments = Vec::new();
        while let Some(row) = rows.next()? {
            comments.push(parse_comment_row(row)?);
        }
        Ok(comments)
    }

    fn list_pinned(&self, package_id: PackageId) -> RepoResult<Vec<Comment>> {
        let mut stmt = self.conn.prepare(&format!(
            "{COMMENT_SELECT_SQL}
             WHERE package_id = ?1
               AND pinned_ts IS NOT NULL
               AND deleted_ts IS NULL
             ORDER BY pinned_ts DESC, id DESC;"
        ))?;
        let mut rows = stmt.query([package_id])?;
        let mut comments = Vec::new();
        while let Some(row) = rows.next()? {
            comments.push(parse_comment_row(row)?);
        }
        Ok(comments)
    }

    fn count_comments(&self, package_id: PackageId, include_deleted: bool) -> RepoResult<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*)
             FROM package_comments
             WHERE package_id = ?1
               AND (?2 = 1 OR deleted_ts IS NULL);",
            params![package_id, include_deleted],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn mark_deleted(&self, id: CommentId, deleter: UserId) -> RepoResult<()> {
        self.update_existing(
            id,
            &format!(
                "UPDATE package_comments
                 SET deleted_ts = {NOW_SQL},
                     deleter_uid = ?2,
                     pinned_ts = NULL
                 WHERE id = ?1
                   AND deleted_ts IS NULL;"
            ),
            Some(Value::Integer(deleter)),
        )
    }

    fn restore(&self, id: CommentId) -> RepoResult<()> {
        self.update_existing(
            id,
            "UPDATE package_comments
             SET deleted_ts = NULL,
                 deleter_uid = NULL
             WHERE id = ?1;",
            None,
        )
    }

    fn pin(&self, id: CommentId, limit: i64, eligible: Eligibility<'_>) -> RepoResult<bool> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let Some(comment) = load_pinnable(&tx, id, eligible)? else {
            return Ok(false);
        };
        if comment.pinned_ts.is_some() {
            return Ok(true);
        }

        let pinned: i64 = tx.query_row(
            "SELECT COUNT(*)
             FROM package_comments
             WHERE package_id = ?1
               AND pinned_ts IS NOT NULL
               AND deleted_ts IS NULL;",
            [comment.package_id],
            |row| row.get(0),
        )?;
        if pinned >= limit {
            return Err(RepoError::PinLimitReached {
                package_id: comment.package_id,
                limit,
            });
        }

        tx.execute(
            &format!("UPDATE package_comments SET pinned_ts = {NOW_SQL} WHERE id = ?1;"),
            [id],
        )?;
        tx.commit()?;
        Ok(true)
    }

    fn unpin(&self, id: CommentId, eligible: Eligibility<'_>) -> RepoResult<bool> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if load_pinnable(&tx, id, eligible)?.is_none() {
            return Ok(false);
        }
        tx.execute(
            "UPDATE package_comments SET pinned_ts = NULL WHERE id = ?1;",
            [id],
        )?;
        tx.commit()?;
        Ok(true)
    }

    fn edit(&self, id: CommentId, editor: UserId, body: &str) -> RepoResult<()> {
        let changed = self.conn.execute(
            &format!(
                "UPDATE package_comments
                 SET body = ?2,
                     edited_ts = {NOW_SQL},
                     editor_uid = ?3
                 WHERE id = ?1
                   AND deleted_ts IS NULL;"
            ),
            params![id, body, editor],
        )?;
        if changed == 0 {
            return Err(RepoError::CommentNotFound(id));
        }
        Ok(())
    }
}

fn comment_exists(conn: &Connection, id: CommentId) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM package_comments WHERE id = ?1);",
        [id],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn load_live_comment(conn: &Connection, id: CommentId) -> RepoResult<Option<Comment>> {
    let mut stmt = conn.prepare(&format!(
        "{COMMENT_SELECT_SQL} WHERE id = ?1 AND deleted_ts IS NULL;"
    ))?;
    let mut rows = stmt.query([id])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_comment_row(row)?));
    }
    Ok(None)
}

/// Live comment whose package `eligible` accepts; `None` when rejected.
fn load_pinnable(
    conn: &Connection,
    id: CommentId,
    eligible: Eligibility<'_>,
) -> RepoResult<Option<Comment>> {
    let Some(comment) = load_live_comment(conn, id)? else {
        return Err(RepoError::CommentNotFound(id));
    };
    let Some(ownership) = load_ownerships(conn, &[comment.package_id])?
        .into_iter()
        .next()
    else {
        return Err(RepoError::PackageNotFound(comment.package_id));
    };
    Ok(eligible(&ownership).then_some(comment))
}

fn parse_comment_row(row: &Row<'_>) -> RepoResult<Comment> {
    let comment = Comment {
        id: row.get("id")?,
        package_id: row.get("package_id")?,
        author: row.get("author_uid")?,
        body: row.get("body")?,
        created_ts: row.get("created_ts")?,
        edited_ts: row.get("edited_ts")?,
        editor: row.get("editor_uid")?,
        deleted_ts: row.get("deleted_ts")?,
        deleter: row.get("deleter_uid")?,
        pinned_ts: row.get("pinned_ts")?,
    };
    if comment.deleted_ts.is_none() && comment.deleter.is_some() {
        return Err(RepoError::InvalidData(format!(
            "comment {} has a deleter but no deletion timestamp",
            comment.id
        )));
    }
    Ok(comment)
}
