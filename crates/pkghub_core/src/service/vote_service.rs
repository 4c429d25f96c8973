//! Voting engine.
//!
//! # Invariants
//! - Voting twice for a package has no additional effect.
//! - `num_votes` is adjusted in the same transaction as the vote row.

use super::{log_outcome, require_selection, require_user, Action, ActionError, ActionResult};
use crate::model::actor::Actor;
use crate::model::PackageId;
use crate::repo::vote_repo::VoteRepository;
use std::collections::BTreeSet;

pub struct VoteService<R: VoteRepository> {
    repo: R,
}

impl<R: VoteRepository> VoteService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Casts the actor's vote for every selected package not yet voted for.
    pub fn vote(&self, actor: &Actor, package_ids: &[i64]) -> ActionResult {
        self.apply(actor, package_ids, Action::Vote)
    }

    /// Removes the actor's votes from the selected packages.
    pub fn unvote(&self, actor: &Actor, package_ids: &[i64]) -> ActionResult {
        self.apply(actor, package_ids, Action::Unvote)
    }

    /// Packages the actor voted for. Empty for anonymous actors.
    pub fn voted_package_ids(&self, actor: &Actor) -> Result<BTreeSet<PackageId>, ActionError> {
        match actor.user_id() {
            Some(user) => Ok(self.repo.voted_package_ids(user)?),
            None => Ok(BTreeSet::new()),
        }
    }

    fn apply(&self, actor: &Actor, package_ids: &[i64], action: Action) -> ActionResult {
        let result = self.apply_votes(actor, package_ids, action);
        log_outcome(action, result.as_ref().copied());
        result.map(|_| action.success_message().to_string())
    }

    fn apply_votes(
        &self,
        actor: &Actor,
        package_ids: &[i64],
        action: Action,
    ) -> Result<usize, ActionError> {
        let user = require_user(actor, action)?;
        let ids = require_selection(package_ids, action)?;
        let changed = if action == Action::Vote {
            self.repo.cast_votes(user, &ids)?
        } else {
            self.repo.retract_votes(user, &ids)?
        };
        Ok(changed.len())
    }
}
