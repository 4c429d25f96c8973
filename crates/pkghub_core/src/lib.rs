//! Moderation and voting core of the package hub.
//! This crate is the single source of truth for package moderation invariants.

pub mod config;
pub mod db;
pub mod identity;
pub mod logging;
pub mod mail;
pub mod model;
pub mod policy;
pub mod repo;
pub mod search;
pub mod service;

pub use config::{ConfigError, CoreConfig};
pub use db::{open_db, open_db_in_memory, DbError};
pub use identity::{IdentityProvider, SqliteSessionIdentity};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status, LoggingError};
pub use mail::{MailError, MailMessage, MailSender, NoopMailSender};
pub use model::actor::{Actor, Role};
pub use model::comment::{Comment, CommentState, MAX_PINNED_COMMENTS};
pub use model::package::{Category, Package};
pub use repo::comment_repo::{CommentRepository, SqliteCommentRepository};
pub use repo::notify_repo::{NotifyRepository, SqliteNotifyRepository};
pub use repo::package_repo::{
    NewPackage, PackageRepository, RepoError, RepoResult, SqlitePackageRepository,
};
pub use repo::vote_repo::{SqliteVoteRepository, VoteRepository};
pub use search::package_search::{
    search_packages, PackageListing, PackagePage, PackageSearchQuery, SearchError, SearchResult,
};
pub use search::pagination::PageLink;
pub use service::flag_service::FlagService;
pub use service::merge_service::MergeService;
pub use service::moderation_service::ModerationService;
pub use service::notify_service::NotifyService;
pub use service::vote_service::VoteService;
pub use service::{sanitize_ids, Action, ActionError, ActionResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
