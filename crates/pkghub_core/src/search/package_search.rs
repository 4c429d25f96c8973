//! Package listing search.
//!
//! # Responsibility
//! - Compile a structured filter/sort request into parameterized SQL.
//! - Annotate rows with the actor's vote and notification state.
//!
//! # Invariants
//! - User input is only ever bound as a parameter, never spliced into SQL.
//! - Page size is clamped into the configured bounds; offset is never negative.
//! - Ties are broken by package name ascending.

use super::pagination::{paginate, PageLink};
use crate::config::SearchConfig;
use crate::db::DbError;
use crate::model::actor::Actor;
use crate::model::{CategoryId, PackageId, Timestamp, UserId};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Row, Transaction, TransactionBehavior};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

static LIKE_WILDCARD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[%_\\]").expect("valid LIKE wildcard regex"));

pub type SearchResult<T> = Result<T, SearchError>;

#[derive(Debug)]
pub enum SearchError {
    Db(DbError),
    InvalidData(String),
}

impl Display for SearchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid package row: {message}"),
        }
    }
}

impl Error for SearchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for SearchError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for SearchError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Field the keywords are matched against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SearchBy {
    /// Substring of the name.
    Name,
    /// Substring of the name or description.
    #[default]
    NameDescription,
    ExactName,
    /// Maintainer username.
    Maintainer,
    /// Submitter username.
    Submitter,
}

impl SearchBy {
    /// Parses the single-letter request code (`n`, `x`, `m`, `s`); anything
    /// else selects name-or-description.
    pub fn from_param(value: &str) -> Self {
        match value {
            "n" => Self::Name,
            "x" => Self::ExactName,
            "m" => Self::Maintainer,
            "s" => Self::Submitter,
            _ => Self::NameDescription,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    #[default]
    Name,
    Category,
    Votes,
    Maintainer,
    /// Whether the actor voted. Falls back to name for anonymous actors.
    Voted,
    /// Whether the actor is notified. Falls back to name for anonymous actors.
    Notify,
    LastModified,
}

impl SortKey {
    /// Parses the single-letter request code; unknown codes sort by name.
    pub fn from_param(value: &str) -> Self {
        match value {
            "c" => Self::Category,
            "v" => Self::Votes,
            "m" => Self::Maintainer,
            "w" => Self::Voted,
            "o" => Self::Notify,
            "a" => Self::LastModified,
            _ => Self::Name,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    /// `d` is descending, anything else ascending.
    pub fn from_param(value: &str) -> Self {
        if value == "d" {
            Self::Descending
        } else {
            Self::Ascending
        }
    }

    fn as_sql(self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutOfDateFilter {
    #[default]
    Any,
    /// Flagged packages only.
    Flagged,
    /// Unflagged packages only.
    Current,
}

/// Structured listing request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageSearchQuery {
    /// Blank or `None` matches every package.
    pub keywords: Option<String>,
    pub search_by: SearchBy,
    pub category: Option<CategoryId>,
    pub orphans_only: bool,
    pub out_of_date: OutOfDateFilter,
    pub sort_by: SortKey,
    pub order: SortOrder,
    /// Clamped into the configured page bounds; `None` uses the default.
    pub per_page: Option<i64>,
    /// Negative values are treated as `0`.
    pub offset: Option<i64>,
}

impl PackageSearchQuery {
    pub fn keywords(text: impl Into<String>) -> Self {
        Self {
            keywords: Some(text.into()),
            ..Self::default()
        }
    }
}

/// One row of the package listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageListing {
    pub id: PackageId,
    pub name: String,
    pub version: String,
    pub description: String,
    pub category: String,
    pub maintainer: Option<String>,
    pub num_votes: i64,
    pub out_of_date_ts: Option<Timestamp>,
    pub modified_ts: Timestamp,
    /// `None` for anonymous actors.
    pub voted: Option<bool>,
    /// `None` for anonymous actors.
    pub notified: Option<bool>,
}

/// One page of the package listing plus its pagination index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackagePage {
    pub items: Vec<PackageListing>,
    pub total: i64,
    pub first: i64,
    pub last: i64,
    pub per_page: i64,
    pub offset: i64,
    pub current_page: i64,
    pub pages: i64,
    pub links: Vec<PageLink>,
}

/// Compiled statement pair for one request.
#[derive(Debug, Clone, PartialEq)]
struct QueryPlan {
    count_sql: String,
    count_binds: Vec<Value>,
    page_sql: String,
    page_binds: Vec<Value>,
    per_page: i64,
    offset: i64,
}

/// Runs a listing request and returns the requested page.
///
/// Opens its own read transaction, so `conn` must not be inside one.
pub fn search_packages(
    conn: &Connection,
    actor: &Actor,
    query: &PackageSearchQuery,
    config: &SearchConfig,
) -> SearchResult<PackagePage> {
    let viewer = actor.user_id();
    let plan = compile(query, viewer, config);

    // Count and page read from one snapshot.
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Deferred)?;
    let total: i64 = tx.query_row(
        &plan.count_sql,
        params_from_iter(plan.count_binds.iter()),
        |row| row.get(0),
    )?;

    let mut items = Vec::new();
    {
        let mut stmt = tx.prepare(&plan.page_sql)?;
        let mut rows = stmt.query(params_from_iter(plan.page_binds.iter()))?;
        while let Some(row) = rows.next()? {
            items.push(parse_listing_row(row, viewer.is_some())?);
        }
    }
    tx.commit()?;

    let pagination = paginate(total, plan.per_page, plan.offset, config.page_window);
    log::debug!(
        "event=package_search module=search status=ok total={} returned={} offset={}",
        total,
        items.len(),
        plan.offset
    );

    Ok(PackagePage {
        items,
        total,
        first: pagination.first,
        last: pagination.last,
        per_page: pagination.per_page,
        offset: pagination.offset,
        current_page: pagination.current_page,
        pages: pagination.pages,
        links: pagination.links,
    })
}

fn compile(
    query: &PackageSearchQuery,
    viewer: Option<UserId>,
    config: &SearchConfig,
) -> QueryPlan {
    let per_page = query
        .per_page
        .unwrap_or(config.default_per_page)
        .clamp(config.min_per_page, config.max_per_page);
    let offset = query.offset.unwrap_or(0).max(0);

    let mut from_sql = String::from(
        " FROM packages p
          LEFT JOIN users m ON m.id = p.maintainer_uid
          LEFT JOIN package_categories c ON c.id = p.category_id",
    );
    if query.search_by == SearchBy::Submitter {
        from_sql.push_str(" LEFT JOIN users s ON s.id = p.submitter_uid");
    }

    let mut where_sql = String::from(" WHERE 1 = 1");
    let mut where_binds: Vec<Value> = Vec::new();

    if let Some(category) = query.category.filter(|id| *id > 0) {
        where_sql.push_str(" AND p.category_id = ?");
        where_binds.push(Value::Integer(category));
    }

    if let Some(keywords) = query
        .keywords
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
    {
        match query.search_by {
            SearchBy::Maintainer => {
                where_sql.push_str(" AND m.username = ?");
                where_binds.push(Value::Text(keywords.to_string()));
            }
            SearchBy::Submitter => {
                where_sql.push_str(" AND s.username = ?");
                where_binds.push(Value::Text(keywords.to_string()));
            }
            SearchBy::ExactName => {
                where_sql.push_str(" AND p.name = ?");
                where_binds.push(Value::Text(keywords.to_string()));
            }
            SearchBy::Name => {
                where_sql.push_str(" AND p.name LIKE ? ESCAPE '\\'");
                where_binds.push(Value::Text(like_pattern(keywords)));
            }
            SearchBy::NameDescription => {
                where_sql
                    .push_str(" AND (p.name LIKE ? ESCAPE '\\' OR p.description LIKE ? ESCAPE '\\')");
                let pattern = like_pattern(keywords);
                where_binds.push(Value::Text(pattern.clone()));
                where_binds.push(Value::Text(pattern));
            }
        }
    }

    if query.orphans_only {
        where_sql.push_str(" AND p.maintainer_uid IS NULL");
    }
    match query.out_of_date {
        OutOfDateFilter::Any => {}
        OutOfDateFilter::Flagged => where_sql.push_str(" AND p.out_of_date_ts IS NOT NULL"),
        OutOfDateFilter::Current => where_sql.push_str(" AND p.out_of_date_ts IS NULL"),
    }

    let count_sql = format!("SELECT COUNT(*){from_sql}{where_sql};");

    let mut select_sql = String::from(
        "SELECT
            p.id AS id,
            p.name AS name,
            p.version AS version,
            p.description AS description,
            c.name AS category,
            m.username AS maintainer,
            p.num_votes AS num_votes,
            p.out_of_date_ts AS out_of_date_ts,
            p.modified_ts AS modified_ts",
    );
    let mut page_binds: Vec<Value> = Vec::new();
    let mut viewer_sql = String::new();
    if let Some(uid) = viewer {
        select_sql.push_str(
            ",
            v.user_id IS NOT NULL AS voted,
            n.user_id IS NOT NULL AS notified",
        );
        viewer_sql.push_str(
            " LEFT JOIN package_votes v ON v.package_id = p.id AND v.user_id = ?
              LEFT JOIN comment_notify n ON n.package_id = p.id AND n.user_id = ?",
        );
        page_binds.push(Value::Integer(uid));
        page_binds.push(Value::Integer(uid));
    }
    page_binds.extend(where_binds.iter().cloned());

    let order_sql = order_clause(query.sort_by, query.order, viewer.is_some());
    let page_sql =
        format!("{select_sql}{from_sql}{viewer_sql}{where_sql} ORDER BY {order_sql} LIMIT ? OFFSET ?;");
    page_binds.push(Value::Integer(per_page));
    page_binds.push(Value::Integer(offset));

    QueryPlan {
        count_sql,
        count_binds: where_binds,
        page_sql,
        page_binds,
        per_page,
        offset,
    }
}

fn order_clause(sort_by: SortKey, order: SortOrder, has_viewer: bool) -> String {
    let direction = order.as_sql();
    let column = match sort_by {
        SortKey::Name => None,
        SortKey::Category => Some("p.category_id"),
        SortKey::Votes => Some("p.num_votes"),
        SortKey::Maintainer => Some("maintainer"),
        SortKey::Voted if has_viewer => Some("voted"),
        SortKey::Notify if has_viewer => Some("notified"),
        SortKey::Voted | SortKey::Notify => None,
        SortKey::LastModified => Some("p.modified_ts"),
    };
    match column {
        Some(column) => format!("{column} {direction}, p.name ASC"),
        None => format!("p.name {direction}"),
    }
}

/// `%keywords%` with LIKE wildcards in the keywords escaped.
fn like_pattern(keywords: &str) -> String {
    let escaped = LIKE_WILDCARD_RE.replace_all(keywords, r"\$0");
    format!("%{escaped}%")
}

fn parse_listing_row(row: &Row<'_>, has_viewer: bool) -> SearchResult<PackageListing> {
    let num_votes: i64 = row.get("num_votes")?;
    if num_votes < 0 {
        return Err(SearchError::InvalidData(format!(
            "negative vote count `{num_votes}`"
        )));
    }
    let (voted, notified) = if has_viewer {
        (Some(row.get("voted")?), Some(row.get("notified")?))
    } else {
        (None, None)
    };

    Ok(PackageListing {
        id: row.get("id")?,
        name: row.get("name")?,
        version: row.get("version")?,
        description: row.get("description")?,
        category: row.get::<_, Option<String>>("category")?.unwrap_or_default(),
        maintainer: row.get("maintainer")?,
        num_votes,
        out_of_date_ts: row.get("out_of_date_ts")?,
        modified_ts: row.get("modified_ts")?,
        voted,
        notified,
    })
}

#[cfg(test)]
mod tests {
    use super::{compile, like_pattern, order_clause, PackageSearchQuery, SortKey, SortOrder};
    use crate::config::SearchConfig;
    use rusqlite::types::Value;

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(like_pattern("foo"), "%foo%");
        assert_eq!(like_pattern("100%_a\\b"), r"%100\%\_a\\b%");
    }

    #[test]
    fn page_size_and_offset_are_clamped() {
        let config = SearchConfig::default();
        let mut query = PackageSearchQuery {
            per_page: Some(10),
            offset: Some(-20),
            ..PackageSearchQuery::default()
        };
        let plan = compile(&query, None, &config);
        assert_eq!((plan.per_page, plan.offset), (50, 0));

        query.per_page = Some(1_000);
        assert_eq!(compile(&query, None, &config).per_page, 250);

        query.per_page = None;
        assert_eq!(compile(&query, None, &config).per_page, 50);
    }

    #[test]
    fn keywords_are_bound_not_spliced() {
        let config = SearchConfig::default();
        let query = PackageSearchQuery::keywords("x'; DROP TABLE packages; --");
        let plan = compile(&query, Some(3), &config);
        assert!(!plan.page_sql.contains("DROP TABLE"));
        assert!(!plan.count_sql.contains("DROP TABLE"));
        assert_eq!(plan.count_binds.len(), 2);
        assert_eq!(plan.page_binds[0], Value::Integer(3));
        assert_eq!(plan.page_binds.len(), 2 + 2 + 2);
    }

    #[test]
    fn viewer_sorts_fall_back_to_name_for_anonymous() {
        assert_eq!(
            order_clause(SortKey::Voted, SortOrder::Descending, false),
            "p.name DESC"
        );
        assert_eq!(
            order_clause(SortKey::Voted, SortOrder::Descending, true),
            "voted DESC, p.name ASC"
        );
        assert_eq!(
            order_clause(SortKey::Votes, SortOrder::Ascending, false),
            "p.num_votes ASC, p.name ASC"
        );
    }
}
