//! Flagging and adoption engine.
//!
//! # Responsibility
//! - Set and clear out-of-date flags, notifying maintainers on flag-on.
//! - Move maintainership on adopt and disown within the actor's scope.
//!
//! # Invariants
//! - Notification mail is sent after the flag batch committed. A failed
//!   send is logged and never rolls the flag back.
//! - A maintainer is never mailed about their own flag.

use super::{log_outcome, require_selection, require_user, Action, ActionError, ActionResult};
use crate::config::CoreConfig;
use crate::mail::{out_of_date_notice, MailSender};
use crate::model::actor::Actor;
use crate::model::package::PackageOwnership;
use crate::model::UserId;
use crate::policy;
use crate::repo::package_repo::{FlagOutcome, PackageRepository};

pub struct FlagService<R: PackageRepository, M: MailSender> {
    repo: R,
    mailer: M,
    config: CoreConfig,
}

impl<R: PackageRepository, M: MailSender> FlagService<R, M> {
    pub fn new(repo: R, mailer: M, config: CoreConfig) -> Self {
        Self {
            repo,
            mailer,
            config,
        }
    }

    /// Flags (`flag_on = true`) or unflags the selected packages.
    pub fn flag(&self, actor: &Actor, package_ids: &[i64], flag_on: bool) -> ActionResult {
        let action = if flag_on { Action::Flag } else { Action::Unflag };
        let result = self.apply_flag(actor, package_ids, flag_on, action);
        log_outcome(action, result.as_ref().copied());
        result.map(|_| action.success_message().to_string())
    }

    /// Adopts (`adopting = true`) or disowns the selected packages.
    ///
    /// Regular users adopt only orphans and disown only their own packages;
    /// elevated actors act on every selected package.
    pub fn adopt(&self, actor: &Actor, package_ids: &[i64], adopting: bool) -> ActionResult {
        let action = if adopting {
            Action::Adopt
        } else {
            Action::Disown
        };
        let result = self.apply_adopt(actor, package_ids, adopting, action);
        log_outcome(action, result.as_ref().copied());
        result.map(|_| action.success_message().to_string())
    }

    fn apply_flag(
        &self,
        actor: &Actor,
        package_ids: &[i64],
        flag_on: bool,
        action: Action,
    ) -> Result<usize, ActionError> {
        let user = require_user(actor, action)?;
        let ids = require_selection(package_ids, action)?;

        if !flag_on {
            return Ok(self.repo.clear_out_of_date(&ids)?.len());
        }

        let outcome = self.repo.flag_out_of_date(user, &ids)?;
        self.notify_maintainers(user, &outcome);
        Ok(outcome.flagged.len())
    }

    fn apply_adopt(
        &self,
        actor: &Actor,
        package_ids: &[i64],
        adopting: bool,
        action: Action,
    ) -> Result<usize, ActionError> {
        let user = require_user(actor, action)?;
        let ids = require_selection(package_ids, action)?;

        let changed = if adopting {
            let eligible = |package: &PackageOwnership| policy::can_adopt_package(actor, package);
            self.repo.adopt(user, &ids, &eligible)?
        } else {
            let eligible = |package: &PackageOwnership| policy::can_disown_package(actor, package);
            self.repo.disown(&ids, &eligible)?
        };
        Ok(changed.len())
    }

    fn notify_maintainers(&self, flagger: UserId, outcome: &FlagOutcome) {
        for recipient in &outcome.recipients {
            let message = out_of_date_notice(
                &self.config,
                &recipient.email,
                recipient.package_id,
                &recipient.package_name,
                &outcome.flagger_name,
                flagger,
            );
            match self.mailer.send(&message) {
                Ok(()) => log::debug!(
                    "event=out_of_date_mail module=service status=ok package_id={}",
                    recipient.package_id
                ),
                Err(err) => log::warn!(
                    "event=out_of_date_mail module=service status=error package_id={} error={}",
                    recipient.package_id,
                    err
                ),
            }
        }
    }
}
