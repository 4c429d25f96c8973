//! Package repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Own every batch mutation of package rows: out-of-date flags,
//!   maintainer assignment, category changes and delete/merge.
//! - Keep SQL details inside the package store boundary.
//!
//! # Invariants
//! - Each mutating method runs in one `IMMEDIATE` transaction; callers never
//!   observe a partially applied batch.
//! - Ids that do not name an existing package are skipped, not rejected.
//! - After a merge the target's `num_votes` equals its live vote rows.

use crate::db::{DbError, NOW_SQL};
use crate::model::package::{Category, Package, PackageOwnership, UNCATEGORIZED_ID};
use crate::model::{CategoryId, CommentId, PackageId, UserId};
use crate::repo::support::{
    collect_ids, ensure_tables, existing_package_ids, load_ownerships, package_names_in_order,
    placeholders,
};
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Row, Transaction,
    TransactionBehavior,
};
use std::error::Error;
use std::fmt::{Display, Formatter};

const PACKAGE_SELECT_SQL: &str = "SELECT
    id,
    name,
    version,
    description,
    category_id,
    submitter_uid,
    maintainer_uid,
    steward_uid,
    num_votes,
    out_of_date_ts,
    modified_ts
FROM packages";

const REQUIRED_TABLES: &[&str] = &[
    "users",
    "packages",
    "package_categories",
    "package_votes",
    "package_comments",
    "comment_notify",
    "package_blacklist",
];

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error shared by all package store repositories.
#[derive(Debug)]
pub enum RepoError {
    /// Underlying SQLite/bootstrap failure.
    Db(DbError),
    PackageNotFound(PackageId),
    /// Comment does not exist, or is deleted where a live one is required.
    CommentNotFound(CommentId),
    /// Pinning would exceed the per-package pin bound.
    PinLimitReached {
        package_id: PackageId,
        limit: i64,
    },
    /// Connection has not been migrated.
    MissingRequiredTable(&'static str),
    /// Persisted data cannot be converted into a valid record.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::PackageNotFound(id) => write!(f, "package not found: {id}"),
            Self::CommentNotFound(id) => write!(f, "comment not found: {id}"),
            Self::PinLimitReached { package_id, limit } => write!(
                f,
                "package {package_id} already has {limit} pinned comments"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "package store requires table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Input for inserting a package row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPackage {
    pub name: String,
    pub version: String,
    pub description: String,
    pub category_id: CategoryId,
    pub submitter: UserId,
    pub maintainer: Option<UserId>,
}

impl NewPackage {
    /// Package submitted and maintained by `submitter`, uncategorized.
    pub fn new(name: impl Into<String>, submitter: UserId) -> Self {
        Self {
            name: name.into(),
            version: "1.0-1".to_string(),
            description: String::new(),
            category_id: UNCATEGORIZED_ID,
            submitter,
            maintainer: Some(submitter),
        }
    }
}

/// `(id, name)` pair for user-facing summaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageName {
    pub id: PackageId,
    pub name: String,
}

/// Maintainer to notify about a freshly flagged package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutOfDateRecipient {
    pub package_id: PackageId,
    pub package_name: String,
    pub email: String,
}

/// Result of a flag-on batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagOutcome {
    /// Stamped packages, in input order.
    pub flagged: Vec<PackageId>,
    /// Maintainers other than the flagger, one entry per flagged package.
    pub recipients: Vec<OutOfDateRecipient>,
    /// Username of the flagging account.
    pub flagger_name: String,
}

/// Merge side of a delete batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeSummary {
    pub target: PackageId,
    pub comments_moved: usize,
    pub votes_moved: usize,
    /// Recomputed vote count of the target.
    pub num_votes: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub deleted: Vec<PackageId>,
    pub merge: Option<MergeSummary>,
}

/// Per-row eligibility predicate evaluated inside the mutating transaction.
pub type Eligibility<'a> = &'a dyn Fn(&PackageOwnership) -> bool;

/// Repository interface for package-level state.
pub trait PackageRepository {
    /// Inserts one package and returns its id.
    fn create_package(&self, package: &NewPackage) -> RepoResult<PackageId>;
    fn get_package(&self, id: PackageId) -> RepoResult<Option<Package>>;
    /// Names of existing packages among `ids`, in input order.
    fn package_names(&self, ids: &[PackageId]) -> RepoResult<Vec<PackageName>>;
    /// Selectable categories sorted by name, without the reserved sentinel.
    fn list_categories(&self) -> RepoResult<Vec<Category>>;
    /// Sets the category and bumps the modified timestamp when `eligible`
    /// accepts the stored package. Returns `false` when it does not.
    fn set_category(
        &self,
        id: PackageId,
        category_id: CategoryId,
        eligible: Eligibility<'_>,
    ) -> RepoResult<bool>;
    /// Stamps every existing selected package out-of-date and collects the
    /// maintainers to notify.
    fn flag_out_of_date(&self, flagger: UserId, ids: &[PackageId]) -> RepoResult<FlagOutcome>;
    /// Clears the out-of-date stamp; returns packages that were flagged.
    fn clear_out_of_date(&self, ids: &[PackageId]) -> RepoResult<Vec<PackageId>>;
    /// Assigns `user` as maintainer of eligible packages and subscribes them
    /// to comment notifications for those packages.
    fn adopt(
        &self,
        user: UserId,
        ids: &[PackageId],
        eligible: Eligibility<'_>,
    ) -> RepoResult<Vec<PackageId>>;
    /// Clears the maintainer of eligible packages.
    fn disown(&self, ids: &[PackageId], eligible: Eligibility<'_>)
        -> RepoResult<Vec<PackageId>>;
    /// Deletes packages, optionally merging comments, votes and
    /// subscriptions into `merge_target` first.
    fn delete_packages(
        &self,
        ids: &[PackageId],
        merge_target: Option<PackageId>,
    ) -> RepoResult<DeleteOutcome>;
    fn is_name_restricted(&self, name: &str) -> RepoResult<bool>;
}

/// SQLite-backed package repository.
pub struct SqlitePackageRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePackageRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_tables(conn, REQUIRED_TABLES)?;
        Ok(Self { conn })
    }

    fn begin(&self) -> RepoResult<Transaction<'conn>> {
        Ok(Transaction::new_unchecked(
            self.conn,
            TransactionBehavior::Immediate,
        )?)
    }
}

impl PackageRepository for SqlitePackageRepository<'_> {
    fn create_package(&self, package: &NewPackage) -> RepoResult<PackageId> {
        self.conn.execute(
            "INSERT INTO packages (
                name,
                version,
                description,
                category_id,
                submitter_uid,
                maintainer_uid
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                package.name.as_str(),
                package.version.as_str(),
                package.description.as_str(),
                package.category_id,
                package.submitter,
                package.maintainer,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_package(&self, id: PackageId) -> RepoResult<Option<Package>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PACKAGE_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_package_row(row)?));
        }
        Ok(None)
    }

    fn package_names(&self, ids: &[PackageId]) -> RepoResult<Vec<PackageName>> {
        package_names_in_order(self.conn, ids)
    }

    fn list_categories(&self) -> RepoResult<Vec<Category>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name
             FROM package_categories
             WHERE id != ?1
             ORDER BY name ASC;",
        )?;
        let mut rows = stmt.query([UNCATEGORIZED_ID])?;
        let mut categories = Vec::new();
        while let Some(row) = rows.next()? {
            categories.push(Category {
                id: row.get(0)?,
                name: row.get(1)?,
            });
        }
        Ok(categories)
    }

    fn set_category(
        &self,
        id: PackageId,
        category_id: CategoryId,
        eligible: Eligibility<'_>,
    ) -> RepoResult<bool> {
        let tx = self.begin()?;
        let Some(ownership) = load_ownerships(&tx, &[id])?.into_iter().next() else {
            return Err(RepoError::PackageNotFound(id));
        };
        if !eligible(&ownership) {
            return Ok(false);
        }
        tx.execute(
            &format!(
                "UPDATE packages
                 SET category_id = ?2,
                     modified_ts = {NOW_SQL}
                 WHERE id = ?1;"
            ),
            params![id, category_id],
        )?;
        tx.commit()?;
        Ok(true)
    }

    fn flag_out_of_date(&self, flagger: UserId, ids: &[PackageId]) -> RepoResult<FlagOutcome> {
        let tx = self.begin()?;
        let flagged = existing_package_ids(&tx, ids)?;

        let mut recipients = Vec::new();
        if !flagged.is_empty() {
            tx.execute(
                &format!(
                    "UPDATE packages SET out_of_date_ts = {NOW_SQL} WHERE id IN ({});",
                    placeholders(flagged.len())
                ),
                params_from_iter(flagged.iter()),
            )?;

            let mut bind_values = flagged.clone();
            bind_values.push(flagger);
            let mut stmt = tx.prepare(&format!(
                "SELECT p.id, p.name, u.email
                 FROM packages p
                 INNER JOIN users u ON u.id = p.maintainer_uid
                 WHERE p.id IN ({})
                   AND p.maintainer_uid != ?
                 ORDER BY p.name ASC;",
                placeholders(flagged.len())
            ))?;
            let mut rows = stmt.query(params_from_iter(bind_values.iter()))?;
            while let Some(row) = rows.next()? {
                recipients.push(OutOfDateRecipient {
                    package_id: row.get(0)?,
                    package_name: row.get(1)?,
                    email: row.get(2)?,
                });
            }
        }

        let flagger_name = tx
            .query_row(
                "SELECT username FROM users WHERE id = ?1;",
                [flagger],
                |row| row.get::<_, String>(0),
            )
            .optional()?
            .unwrap_or_default();

        tx.commit()?;
        Ok(FlagOutcome {
            flagged,
            recipients,
            flagger_name,
        })
    }

    fn clear_out_of_date(&self, ids: &[PackageId]) -> RepoResult<Vec<PackageId>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let tx = self.begin()?;
        let flagged = collect_ids(
            &tx,
            &format!(
                "SELECT id FROM packages WHERE id IN ({}) AND out_of_date_ts IS NOT NULL;",
                placeholders(ids.len())
            ),
            ids,
        )?;
        let cleared = ids
            .iter()
            .copied()
            .filter(|id| flagged.contains(id))
            .collect::<Vec<_>>();
        if !cleared.is_empty() {
            tx.execute(
                &format!(
                    "UPDATE packages SET out_of_date_ts = NULL WHERE id IN ({});",
                    placeholders(cleared.len())
                ),
                params_from_iter(cleared.iter()),
            )?;
        }
        tx.commit()?;
        Ok(cleared)
    }

    fn adopt(
        &self,
        user: UserId,
        ids: &[PackageId],
        eligible: Eligibility<'_>,
    ) -> RepoResult<Vec<PackageId>> {
        let tx = self.begin()?;
        let adopted = load_ownerships(&tx, ids)?
            .into_iter()
            .filter(|ownership| eligible(ownership))
            .map(|ownership| ownership.package_id)
            .collect::<Vec<_>>();

        for id in &adopted {
            tx.execute(
                "UPDATE packages SET maintainer_uid = ?1 WHERE id = ?2;",
                params![user, id],
            )?;
            tx.execute(
                "INSERT OR IGNORE INTO comment_notify (user_id, package_id) VALUES (?1, ?2);",
                params![user, id],
            )?;
        }

        tx.commit()?;
        Ok(adopted)
    }

    fn disown(
        &self,
        ids: &[PackageId],
        eligible: Eligibility<'_>,
    ) -> RepoResult<Vec<PackageId>> {
        let tx = self.begin()?;
        let disowned = load_ownerships(&tx, ids)?
            .into_iter()
            .filter(|ownership| ownership.maintainer.is_some() && eligible(ownership))
            .map(|ownership| ownership.package_id)
            .collect::<Vec<_>>();

        if !disowned.is_empty() {
            tx.execute(
                &format!(
                    "UPDATE packages SET maintainer_uid = NULL WHERE id IN ({});",
                    placeholders(disowned.len())
                ),
                params_from_iter(disowned.iter()),
            )?;
        }

        tx.commit()?;
        Ok(disowned)
    }

    fn delete_packages(
        &self,
        ids: &[PackageId],
        merge_target: Option<PackageId>,
    ) -> RepoResult<DeleteOutcome> {
        let selection = ids
            .iter()
            .copied()
            .filter(|id| Some(*id) != merge_target)
            .collect::<Vec<_>>();

        let tx = self.begin()?;
        let deleted = existing_package_ids(&tx, &selection)?;

        let merge = match merge_target {
            Some(target) => {
                let exists: i64 = tx.query_row(
                    "SELECT EXISTS(SELECT 1 FROM packages WHERE id = ?1);",
                    [target],
                    |row| row.get(0),
                )?;
                if exists != 1 {
                    return Err(RepoError::PackageNotFound(target));
                }
                Some(merge_into(&tx, target, &deleted)?)
            }
            None => None,
        };

        if !deleted.is_empty() {
            tx.execute(
                &format!(
                    "DELETE FROM packages WHERE id IN ({});",
                    placeholders(deleted.len())
                ),
                params_from_iter(deleted.iter()),
            )?;
        }

        tx.commit()?;
        Ok(DeleteOutcome { deleted, merge })
    }

    fn is_name_restricted(&self, name: &str) -> RepoResult<bool> {
        let restricted: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM package_blacklist WHERE name = ?1);",
            [name.trim()],
            |row| row.get(0),
        )?;
        Ok(restricted == 1)
    }
}

/// Moves comments, votes and subscriptions of `sources` onto `target`.
///
/// Votes and subscriptions are only moved for users who do not already hold
/// one on the target, so the `(user, package)` uniqueness survives.
fn merge_into(
    tx: &Transaction<'_>,
    target: PackageId,
    sources: &[PackageId],
) -> RepoResult<MergeSummary> {
    let mut comments_moved = 0;
    let mut votes_moved = 0;

    if !sources.is_empty() {
        let mut bind_values = vec![target];
        bind_values.extend_from_slice(sources);
        // Moved pins are dropped so the target stays within its pin bound.
        comments_moved = tx.execute(
            &format!(
                "UPDATE package_comments
                 SET package_id = ?, pinned_ts = NULL
                 WHERE package_id IN ({});",
                placeholders(sources.len())
            ),
            params_from_iter(bind_values.iter()),
        )?;
    }

    for source in sources {
        votes_moved += tx.execute(
            "UPDATE package_votes
             SET package_id = ?1
             WHERE package_id = ?2
               AND user_id NOT IN (
                 SELECT user_id FROM package_votes WHERE package_id = ?1
               );",
            params![target, source],
        )?;
        tx.execute(
            "UPDATE comment_notify
             SET package_id = ?1
             WHERE package_id = ?2
               AND user_id NOT IN (
                 SELECT user_id FROM comment_notify WHERE package_id = ?1
               );",
            params![target, source],
        )?;
    }

    tx.execute(
        "UPDATE packages
         SET num_votes = (SELECT COUNT(*) FROM package_votes WHERE package_id = ?1)
         WHERE id = ?1;",
        [target],
    )?;
    let num_votes = tx.query_row(
        "SELECT num_votes FROM packages WHERE id = ?1;",
        [target],
        |row| row.get(0),
    )?;

    Ok(MergeSummary {
        target,
        comments_moved,
        votes_moved,
        num_votes,
    })
}

fn parse_package_row(row: &Row<'_>) -> RepoResult<Package> {
    let num_votes: i64 = row.get("num_votes")?;
    if num_votes < 0 {
        return Err(RepoError::InvalidData(format!(
            "negative vote count `{num_votes}` in packages.num_votes"
        )));
    }

    Ok(Package {
        id: row.get("id")?,
        name: row.get("name")?,
        version: row.get("version")?,
        description: row.get("description")?,
        category_id: row.get("category_id")?,
        submitter: row.get("submitter_uid")?,
        maintainer: row.get("maintainer_uid")?,
        steward: row.get("steward_uid")?,
        num_votes,
        out_of_date_ts: row.get("out_of_date_ts")?,
        modified_ts: row.get("modified_ts")?,
    })
}
