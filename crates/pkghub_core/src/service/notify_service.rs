//! Comment notification registry.
//!
//! Anonymous actors have no subscription state, so their requests are
//! accepted and ignored rather than rejected.

use super::{log_outcome, require_selection, Action, ActionError};
use crate::model::actor::Actor;
use crate::model::PackageId;
use crate::repo::notify_repo::NotifyRepository;
use std::collections::BTreeSet;

pub struct NotifyService<R: NotifyRepository> {
    repo: R,
}

impl<R: NotifyRepository> NotifyService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Subscribes to (`subscribe = true`) or unsubscribes from comment
    /// notifications on the selected packages.
    ///
    /// Returns `Ok(None)` for anonymous actors, otherwise a summary naming the
    /// processed packages in input order. A selection naming no existing
    /// package fails with [`ActionError::NoSelection`].
    pub fn set_notify(
        &self,
        actor: &Actor,
        package_ids: &[i64],
        subscribe: bool,
    ) -> Result<Option<String>, ActionError> {
        let action = if subscribe {
            Action::Notify
        } else {
            Action::Unnotify
        };
        let Some(user) = actor.user_id() else {
            log::debug!(
                "event=action module=service action={} status=skipped reason=anonymous",
                action.as_str()
            );
            return Ok(None);
        };

        let result = require_selection(package_ids, action).and_then(|ids| {
            let processed = if subscribe {
                self.repo.subscribe(user, &ids)?
            } else {
                self.repo.unsubscribe(user, &ids)?
            };
            // None of the ids named a package.
            if processed.is_empty() {
                return Err(ActionError::NoSelection(action));
            }
            Ok(processed)
        });
        log_outcome(action, result.as_ref().map(Vec::len));

        let processed = result?;
        let names = processed
            .iter()
            .map(|package| package.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let message = if subscribe {
            format!("You have been added to the comment notification list for {names}.")
        } else {
            format!("You have been removed from the comment notification list for {names}.")
        };
        Ok(Some(message))
    }

    /// Packages the actor is subscribed to. Empty for anonymous actors.
    pub fn notified_package_ids(&self, actor: &Actor) -> Result<BTreeSet<PackageId>, ActionError> {
        match actor.user_id() {
            Some(user) => Ok(self.repo.notified_package_ids(user)?),
            None => Ok(BTreeSet::new()),
        }
    }
}
