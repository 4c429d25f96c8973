//! Package comment record and its moderation state.
//!
//! # Invariants
//! - A deleted comment is never pinned.
//! - At most [`MAX_PINNED_COMMENTS`] live comments per package are pinned.

use super::{CommentId, PackageId, Timestamp, UserId};
use serde::{Deserialize, Serialize};

/// Upper bound of simultaneously pinned live comments on one package.
pub const MAX_PINNED_COMMENTS: i64 = 5;

/// Moderation state derived from a comment's timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentState {
    Live,
    Pinned,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub package_id: PackageId,
    /// `None` for anonymous comments or removed accounts.
    pub author: Option<UserId>,
    pub body: String,
    pub created_ts: Timestamp,
    pub edited_ts: Option<Timestamp>,
    pub editor: Option<UserId>,
    pub deleted_ts: Option<Timestamp>,
    pub deleter: Option<UserId>,
    pub pinned_ts: Option<Timestamp>,
}

impl Comment {
    pub fn state(&self) -> CommentState {
        if self.deleted_ts.is_some() {
            CommentState::Deleted
        } else if self.pinned_ts.is_some() {
            CommentState::Pinned
        } else {
            CommentState::Live
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.state() == CommentState::Deleted
    }

    pub fn is_edited(&self) -> bool {
        self.edited_ts.is_some()
    }
}

/// Anything that can answer "who wrote this comment".
///
/// Implemented by full [`Comment`] rows and by the narrow
/// [`CommentAuthor`] lookup so both paths share one authorization rule.
pub trait Authored {
    fn author(&self) -> Option<UserId>;
}

/// Narrow comment lookup result used before mutating a comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentAuthor {
    pub comment_id: CommentId,
    pub package_id: PackageId,
    pub author: Option<UserId>,
    pub is_deleted: bool,
}

impl Authored for Comment {
    fn author(&self) -> Option<UserId> {
        self.author
    }
}

impl Authored for CommentAuthor {
    fn author(&self) -> Option<UserId> {
        self.author
    }
}
