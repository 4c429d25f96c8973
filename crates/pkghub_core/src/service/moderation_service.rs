//! Comment moderation engine.
//!
//! # Responsibility
//! - Delete, undelete, pin, unpin and edit package comments.
//! - Change package categories.
//! - Serve comment and category listings for package pages.
//!
//! # Invariants
//! - At most [`MAX_PINNED_COMMENTS`] live comments per package are pinned.
//!   The bound is checked inside the pinning transaction.
//! - Pin and category permissions are evaluated against the package row read
//!   in the mutating transaction.
//! - Deleted comments cannot be pinned or edited.
//! - Deleted comments are listed only for elevated actors.

use super::{
    log_outcome, require_user, Action, ActionError, ActionResult, IdKind, NotFoundTarget,
};
use crate::model::actor::Actor;
use crate::model::comment::{Comment, CommentAuthor, MAX_PINNED_COMMENTS};
use crate::model::package::{Category, PackageOwnership};
use crate::model::{CategoryId, CommentId, PackageId, UserId};
use crate::policy;
use crate::repo::comment_repo::{CommentListQuery, CommentRepository};
use crate::repo::package_repo::PackageRepository;

pub struct ModerationService<C: CommentRepository, P: PackageRepository> {
    comments: C,
    packages: P,
}

impl<C: CommentRepository, P: PackageRepository> ModerationService<C, P> {
    pub fn new(comments: C, packages: P) -> Self {
        Self { comments, packages }
    }

    /// Soft-deletes a comment. Allowed for its author and elevated actors.
    pub fn delete_comment(&self, actor: &Actor, comment_id: Option<CommentId>) -> ActionResult {
        self.run(Action::DeleteComment, || {
            let user = require_user(actor, Action::DeleteComment)?;
            let id = require_comment_id(comment_id)?;
            let comment = self.load_author(id)?;
            if !policy::can_delete_comment(actor, &comment) {
                return Err(ActionError::Forbidden(Action::DeleteComment));
            }
            self.comments.mark_deleted(id, user)?;
            Ok(())
        })
    }

    /// Restores a deleted comment. Elevated actors only.
    pub fn undelete_comment(&self, actor: &Actor, comment_id: Option<CommentId>) -> ActionResult {
        self.run(Action::UndeleteComment, || {
            require_user(actor, Action::UndeleteComment)?;
            let id = require_comment_id(comment_id)?;
            if !policy::can_undelete_comment(actor) {
                return Err(ActionError::Forbidden(Action::UndeleteComment));
            }
            self.comments.restore(id)?;
            Ok(())
        })
    }

    /// Pins a live comment, bounded per package.
    pub fn pin_comment(&self, actor: &Actor, comment_id: Option<CommentId>) -> ActionResult {
        self.run(Action::PinComment, || {
            require_user(actor, Action::PinComment)?;
            let id = require_comment_id(comment_id)?;
            let eligible = |package: &PackageOwnership| policy::can_pin_comment(actor, package);
            if !self.comments.pin(id, MAX_PINNED_COMMENTS, &eligible)? {
                return Err(ActionError::Forbidden(Action::PinComment));
            }
            Ok(())
        })
    }

    pub fn unpin_comment(&self, actor: &Actor, comment_id: Option<CommentId>) -> ActionResult {
        self.run(Action::UnpinComment, || {
            require_user(actor, Action::UnpinComment)?;
            let id = require_comment_id(comment_id)?;
            let eligible = |package: &PackageOwnership| policy::can_pin_comment(actor, package);
            if !self.comments.unpin(id, &eligible)? {
                return Err(ActionError::Forbidden(Action::UnpinComment));
            }
            Ok(())
        })
    }

    /// Replaces the body of a live comment and records the editor.
    pub fn edit_comment(
        &self,
        actor: &Actor,
        comment_id: Option<CommentId>,
        body: &str,
    ) -> ActionResult {
        self.run(Action::EditComment, || {
            let user: UserId = require_user(actor, Action::EditComment)?;
            let id = require_comment_id(comment_id)?;
            if body.trim().is_empty() {
                return Err(ActionError::EmptyComment);
            }
            let comment = self.load_live_author(id)?;
            if !policy::can_edit_comment(actor, &comment) {
                return Err(ActionError::Forbidden(Action::EditComment));
            }
            self.comments.edit(id, user, body)?;
            Ok(())
        })
    }

    /// Moves a package to another selectable category.
    pub fn change_category(
        &self,
        actor: &Actor,
        package_id: Option<PackageId>,
        category_id: Option<CategoryId>,
    ) -> ActionResult {
        self.run(Action::ChangeCategory, || {
            require_user(actor, Action::ChangeCategory)?;
            let category_id = category_id
                .filter(|id| *id > 0)
                .ok_or(ActionError::MissingId(IdKind::Category))?;
            let known = self
                .packages
                .list_categories()?
                .iter()
                .any(|category| category.id == category_id);
            if !known {
                return Err(ActionError::InvalidCategory(category_id));
            }
            let package_id = package_id
                .filter(|id| *id > 0)
                .ok_or(ActionError::MissingId(IdKind::Package))?;
            let eligible =
                |package: &PackageOwnership| policy::can_change_category(actor, package);
            if !self.packages.set_category(package_id, category_id, &eligible)? {
                return Err(ActionError::Forbidden(Action::ChangeCategory));
            }
            Ok(())
        })
    }

    /// Comments of a package, newest first.
    ///
    /// `include_deleted` is honored only for elevated actors.
    pub fn list_comments(
        &self,
        actor: &Actor,
        package_id: PackageId,
        include_deleted: bool,
        limit: Option<u32>,
    ) -> Result<Vec<Comment>, ActionError> {
        let query = CommentListQuery {
            include_deleted: include_deleted && actor.is_elevated(),
            limit,
            ..CommentListQuery::for_package(package_id)
        };
        Ok(self.comments.list_comments(&query)?)
    }

    /// Live pinned comments, most recently pinned first.
    pub fn list_pinned_comments(&self, package_id: PackageId) -> Result<Vec<Comment>, ActionError> {
        Ok(self.comments.list_pinned(package_id)?)
    }

    /// Number of live comments on a package.
    pub fn comment_count(&self, package_id: PackageId) -> Result<i64, ActionError> {
        Ok(self.comments.count_comments(package_id, false)?)
    }

    /// Selectable categories, without the "no category" sentinel.
    pub fn categories(&self) -> Result<Vec<Category>, ActionError> {
        Ok(self.packages.list_categories()?)
    }

    fn run(&self, action: Action, op: impl FnOnce() -> Result<(), ActionError>) -> ActionResult {
        let result = op().map(|()| 1);
        log_outcome(action, result.as_ref().copied());
        result.map(|_| action.success_message().to_string())
    }

    fn load_author(&self, id: CommentId) -> Result<CommentAuthor, ActionError> {
        self.comments
            .comment_author(id)?
            .ok_or(ActionError::NotFound(NotFoundTarget::Comment(id)))
    }

    fn load_live_author(&self, id: CommentId) -> Result<CommentAuthor, ActionError> {
        let comment = self.load_author(id)?;
        if comment.is_deleted {
            return Err(ActionError::NotFound(NotFoundTarget::Comment(id)));
        }
        Ok(comment)
    }
}

fn require_comment_id(comment_id: Option<CommentId>) -> Result<CommentId, ActionError> {
    comment_id
        .filter(|id| *id > 0)
        .ok_or(ActionError::MissingId(IdKind::Comment))
}
