//! Delete and merge engine.
//!
//! Deleting with a merge target first moves comments, votes and
//! subscriptions of the deleted packages onto the target. The whole batch is
//! one transaction in the package repository.

use super::{log_outcome, require_selection, require_user, Action, ActionError, ActionResult};
use crate::model::actor::Actor;
use crate::model::PackageId;
use crate::policy;
use crate::repo::package_repo::{DeleteOutcome, PackageRepository};

pub struct MergeService<R: PackageRepository> {
    repo: R,
}

impl<R: PackageRepository> MergeService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Deletes the selected packages, merging them into `merge_target` when set.
    ///
    /// The target itself is never deleted, even when selected; a selection
    /// holding only the target is rejected as empty.
    pub fn delete_packages(
        &self,
        actor: &Actor,
        package_ids: &[i64],
        merge_target: Option<PackageId>,
    ) -> ActionResult {
        let action = Action::Delete;
        let result = self
            .delete_and_merge(actor, package_ids, merge_target)
            .map(|outcome| outcome.deleted.len());
        log_outcome(action, result.as_ref().copied());
        result.map(|_| action.success_message().to_string())
    }

    /// Same as [`Self::delete_packages`], returning what was deleted and moved.
    pub fn delete_and_merge(
        &self,
        actor: &Actor,
        package_ids: &[i64],
        merge_target: Option<PackageId>,
    ) -> Result<DeleteOutcome, ActionError> {
        let action = Action::Delete;
        require_user(actor, action)?;
        if !policy::can_delete_packages(actor) {
            return Err(ActionError::Forbidden(action));
        }
        let ids: Vec<PackageId> = require_selection(package_ids, action)?
            .into_iter()
            .filter(|id| Some(*id) != merge_target)
            .collect();
        if ids.is_empty() {
            return Err(ActionError::NoSelection(action));
        }

        let outcome = self.repo.delete_packages(&ids, merge_target)?;
        if let Some(merge) = &outcome.merge {
            log::info!(
                "event=merge module=service status=ok target={} sources={} comments_moved={} votes_moved={} num_votes={}",
                merge.target,
                outcome.deleted.len(),
                merge.comments_moved,
                merge.votes_moved,
                merge.num_votes
            );
        }
        Ok(outcome)
    }
}
