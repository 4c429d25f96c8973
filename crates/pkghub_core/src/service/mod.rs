//! Moderation engines.
//!
//! # Responsibility
//! - Turn explicit action input into one policy check plus one repository
//!   mutation.
//! - Emit side effects (mail) only after the mutation committed.
//! - Report every outcome as a short human-readable string.
//!
//! # Invariants
//! - Engines never read ambient request state; all input is passed in.
//! - Every failure is a recoverable [`ActionError`]; storage failures abort
//!   the enclosing transaction before they surface here.

pub mod flag_service;
pub mod merge_service;
pub mod moderation_service;
pub mod notify_service;
pub mod vote_service;

use crate::model::actor::Actor;
use crate::model::{CategoryId, CommentId, PackageId, UserId};
use crate::policy;
use crate::repo::package_repo::{PackageRepository, RepoError};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Outcome message of a successful action, or the reason it failed.
pub type ActionResult = Result<String, ActionError>;

/// User-triggered moderation actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Vote,
    Unvote,
    Flag,
    Unflag,
    Adopt,
    Disown,
    Delete,
    Notify,
    Unnotify,
    DeleteComment,
    UndeleteComment,
    PinComment,
    UnpinComment,
    EditComment,
    ChangeCategory,
    Submit,
}

impl Action {
    fn login_phrase(self) -> &'static str {
        match self {
            Self::Vote => "vote for packages",
            Self::Unvote => "un-vote for packages",
            Self::Flag => "flag packages",
            Self::Unflag => "unflag packages",
            Self::Adopt => "adopt packages",
            Self::Disown => "disown packages",
            Self::Delete => "delete packages",
            Self::Notify | Self::Unnotify => "get notifications on comments",
            Self::Submit => "submit packages",
            Self::DeleteComment
            | Self::UndeleteComment
            | Self::PinComment
            | Self::UnpinComment
            | Self::EditComment
            | Self::ChangeCategory => "edit package information",
        }
    }

    fn selection_phrase(self) -> &'static str {
        match self {
            Self::Vote => "vote for",
            Self::Unvote => "un-vote for",
            Self::Flag => "flag",
            Self::Unflag => "unflag",
            Self::Adopt => "adopt",
            Self::Disown => "disown",
            Self::Delete => "delete",
            Self::Notify => "be notified about",
            Self::Unnotify => "stop being notified about",
            _ => "act on",
        }
    }

    fn forbidden_message(self) -> &'static str {
        match self {
            Self::Delete => "You do not have permission to delete packages.",
            Self::DeleteComment => "You are not allowed to delete this comment.",
            Self::UndeleteComment => "You are not allowed to undelete this comment.",
            Self::PinComment => "You are not allowed to pin this comment.",
            Self::UnpinComment => "You are not allowed to unpin this comment.",
            Self::EditComment => "You are not allowed to edit this comment.",
            Self::ChangeCategory => "You are not allowed to change this package category.",
            Self::Submit => "You are not allowed to submit a package with this name.",
            _ => "You are not allowed to perform this action.",
        }
    }

    /// Message returned when the action succeeds.
    pub fn success_message(self) -> &'static str {
        match self {
            Self::Vote => "Your votes have been cast for the selected packages.",
            Self::Unvote => "Your votes have been removed from the selected packages.",
            Self::Flag => "The selected packages have been flagged out-of-date.",
            Self::Unflag => "The selected packages have been unflagged.",
            Self::Adopt => "The selected packages have been adopted.",
            Self::Disown => "The selected packages have been disowned.",
            Self::Delete => "The selected packages have been deleted.",
            Self::Notify => "You have been added to the comment notification list.",
            Self::Unnotify => "You have been removed from the comment notification list.",
            Self::DeleteComment => "Comment has been deleted.",
            Self::UndeleteComment => "Comment has been undeleted.",
            Self::PinComment => "Comment has been pinned.",
            Self::UnpinComment => "Comment has been unpinned.",
            Self::EditComment => "Comment has been edited.",
            Self::ChangeCategory => "Package category changed.",
            Self::Submit => "The package name is available.",
        }
    }

    /// Stable snake_case name used in log events.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Vote => "vote",
            Self::Unvote => "unvote",
            Self::Flag => "flag",
            Self::Unflag => "unflag",
            Self::Adopt => "adopt",
            Self::Disown => "disown",
            Self::Delete => "delete",
            Self::Notify => "notify",
            Self::Unnotify => "unnotify",
            Self::DeleteComment => "delete_comment",
            Self::UndeleteComment => "undelete_comment",
            Self::PinComment => "pin_comment",
            Self::UnpinComment => "unpin_comment",
            Self::EditComment => "edit_comment",
            Self::ChangeCategory => "change_category",
            Self::Submit => "submit",
        }
    }
}

/// Which id an action was missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    Comment,
    Package,
    Category,
}

/// Entity an action referenced but storage does not hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundTarget {
    Package(PackageId),
    Comment(CommentId),
}

#[derive(Debug)]
pub enum ActionError {
    /// No identity.
    Unauthorized(Action),
    /// Identity present, but insufficient role or ownership.
    Forbidden(Action),
    /// Id selection empty after sanitizing.
    NoSelection(Action),
    MissingId(IdKind),
    InvalidCategory(CategoryId),
    PinLimitExceeded {
        package_id: PackageId,
        limit: i64,
    },
    NotFound(NotFoundTarget),
    EmptyComment,
    /// Opaque storage failure. The transaction was rolled back.
    Storage(RepoError),
}

impl ActionError {
    /// Stable snake_case name of the variant, for logs and routing.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::NoSelection(_) => "no_selection",
            Self::MissingId(_) => "missing_id",
            Self::InvalidCategory(_) => "invalid_category",
            Self::PinLimitExceeded { .. } => "pin_limit_exceeded",
            Self::NotFound(_) => "not_found",
            Self::EmptyComment => "empty_comment",
            Self::Storage(_) => "storage_failure",
        }
    }
}

impl Display for ActionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unauthorized(action) => write!(
                f,
                "You must be logged in before you can {}.",
                action.login_phrase()
            ),
            Self::Forbidden(action) => f.write_str(action.forbidden_message()),
            Self::NoSelection(action) => write!(
                f,
                "You did not select any packages to {}.",
                action.selection_phrase()
            ),
            Self::MissingId(IdKind::Comment) => f.write_str("Missing comment ID."),
            Self::MissingId(IdKind::Package) => f.write_str("Missing package ID."),
            Self::MissingId(IdKind::Category) => f.write_str("Missing category ID."),
            Self::InvalidCategory(_) => f.write_str("Invalid category ID."),
            Self::PinLimitExceeded { limit, .. } => {
                write!(f, "This package already has {limit} pinned comments.")
            }
            Self::NotFound(NotFoundTarget::Package(_)) => f.write_str("Package not found."),
            Self::NotFound(NotFoundTarget::Comment(_)) => f.write_str("Comment not found."),
            Self::EmptyComment => f.write_str("Comment cannot be empty."),
            Self::Storage(_) => {
                f.write_str("The request could not be completed. Please try again.")
            }
        }
    }
}

impl Error for ActionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ActionError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::PackageNotFound(id) => Self::NotFound(NotFoundTarget::Package(id)),
            RepoError::CommentNotFound(id) => Self::NotFound(NotFoundTarget::Comment(id)),
            RepoError::PinLimitReached { package_id, limit } => {
                Self::PinLimitExceeded { package_id, limit }
            }
            other => Self::Storage(other),
        }
    }
}

/// Keeps positive ids, drops repeats, preserves first-occurrence order.
pub fn sanitize_ids(raw: &[i64]) -> Vec<PackageId> {
    let mut seen = HashSet::with_capacity(raw.len());
    raw.iter()
        .copied()
        .filter(|id| *id > 0 && seen.insert(*id))
        .collect()
}

/// Checks whether `actor` may submit a package called `name`.
///
/// Names on the restriction list are reserved to elevated actors.
pub fn check_submission_name<R: PackageRepository>(
    actor: &Actor,
    name: &str,
    repo: &R,
) -> Result<(), ActionError> {
    if !actor.is_authenticated() {
        return Err(ActionError::Unauthorized(Action::Submit));
    }
    if repo.is_name_restricted(name)? && !policy::can_submit_restricted_package(actor) {
        log::info!("event=submit_check module=service status=restricted");
        return Err(ActionError::Forbidden(Action::Submit));
    }
    Ok(())
}

/// Authenticated user id, or `Unauthorized(action)`.
pub(crate) fn require_user(actor: &Actor, action: Action) -> Result<UserId, ActionError> {
    actor.user_id().ok_or(ActionError::Unauthorized(action))
}

/// Sanitized non-empty selection, or `NoSelection(action)`.
pub(crate) fn require_selection(
    raw: &[i64],
    action: Action,
) -> Result<Vec<PackageId>, ActionError> {
    let ids = sanitize_ids(raw);
    if ids.is_empty() {
        return Err(ActionError::NoSelection(action));
    }
    Ok(ids)
}

/// Logs the outcome of `action`; `Ok` carries the number of rows affected.
pub(crate) fn log_outcome(action: Action, result: Result<usize, &ActionError>) {
    match result {
        Ok(affected) => log::info!(
            "event=action module=service action={} status=ok affected={}",
            action.as_str(),
            affected
        ),
        Err(ActionError::Storage(err)) => log::error!(
            "event=action module=service action={} status=error error={}",
            action.as_str(),
            err
        ),
        Err(err) => log::info!(
            "event=action module=service action={} status=rejected reason={}",
            action.as_str(),
            err.kind()
        ),
    }
}
