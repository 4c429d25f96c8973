//! Small SQL helpers shared by the SQLite repositories.

use super::package_repo::{PackageName, RepoError, RepoResult};
use crate::model::package::PackageOwnership;
use crate::model::PackageId;
use rusqlite::{params_from_iter, Connection};
use std::collections::{HashMap, HashSet};

/// Returns `?, ?, ?` with `count` placeholders for an `IN (...)` list.
pub(crate) fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// Filters `ids` down to packages that exist, keeping input order.
pub(crate) fn existing_package_ids(
    conn: &Connection,
    ids: &[PackageId],
) -> RepoResult<Vec<PackageId>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        "SELECT id FROM packages WHERE id IN ({});",
        placeholders(ids.len())
    );
    let found = collect_ids(conn, &sql, ids)?;
    Ok(ids.iter().copied().filter(|id| found.contains(id)).collect())
}

/// Looks up names of existing packages among `ids`, keeping input order.
pub(crate) fn package_names_in_order(
    conn: &Connection,
    ids: &[PackageId],
) -> RepoResult<Vec<PackageName>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut stmt = conn.prepare(&format!(
        "SELECT id, name FROM packages WHERE id IN ({});",
        placeholders(ids.len())
    ))?;
    let mut rows = stmt.query(params_from_iter(ids.iter()))?;
    let mut names: HashMap<PackageId, String> = HashMap::new();
    while let Some(row) = rows.next()? {
        names.insert(row.get(0)?, row.get(1)?);
    }
    Ok(ids
        .iter()
        .filter_map(|id| names.remove(id).map(|name| PackageName { id: *id, name }))
        .collect())
}

/// Ownership rows of existing packages among `ids`, keeping input order.
pub(crate) fn load_ownerships(
    conn: &Connection,
    ids: &[PackageId],
) -> RepoResult<Vec<PackageOwnership>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut stmt = conn.prepare(&format!(
        "SELECT id, submitter_uid, maintainer_uid, steward_uid
         FROM packages
         WHERE id IN ({});",
        placeholders(ids.len())
    ))?;
    let mut rows = stmt.query(params_from_iter(ids.iter()))?;
    let mut by_id = HashMap::new();
    while let Some(row) = rows.next()? {
        let ownership = PackageOwnership {
            package_id: row.get(0)?,
            submitter: row.get(1)?,
            maintainer: row.get(2)?,
            steward: row.get(3)?,
        };
        by_id.insert(ownership.package_id, ownership);
    }
    Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
}

/// Runs an id-returning query bound to `ids` and collects the result.
pub(crate) fn collect_ids(
    conn: &Connection,
    sql: &str,
    ids: &[PackageId],
) -> RepoResult<HashSet<PackageId>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params_from_iter(ids.iter()))?;
    let mut found = HashSet::new();
    while let Some(row) = rows.next()? {
        found.insert(row.get::<_, PackageId>(0)?);
    }
    Ok(found)
}

/// Fails with `MissingRequiredTable` unless every table exists.
pub(crate) fn ensure_tables(conn: &Connection, tables: &[&'static str]) -> RepoResult<()> {
    for &table in tables {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }
    Ok(())
}
