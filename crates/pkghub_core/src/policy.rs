//! Authorization policy.
//!
//! Pure predicates over `(actor, target)` pairs. Every mutating engine asks
//! exactly one of these before touching storage; batch repositories apply
//! them per row inside the mutating transaction.
//!
//! # Invariants
//! - Anonymous actors are denied every mutation.
//! - Elevated actors (trusted moderators and privileged admins) are allowed
//!   every moderation action.

use crate::model::actor::Actor;
use crate::model::comment::Authored;
use crate::model::package::PackageOwnership;

/// Author of the comment or any elevated actor.
pub fn can_delete_comment(actor: &Actor, comment: &impl Authored) -> bool {
    is_elevated_or_author(actor, comment)
}

/// Same rule as deletion: the author or any elevated actor.
pub fn can_edit_comment(actor: &Actor, comment: &impl Authored) -> bool {
    is_elevated_or_author(actor, comment)
}

/// Only elevated actors restore deleted comments.
pub fn can_undelete_comment(actor: &Actor) -> bool {
    actor.is_elevated()
}

/// Whether `actor` holds management rights over a package.
///
/// - The elevated maintainer-of-record (steward) always manages.
/// - When no steward is set, the current maintainer and the original
///   submitter manage.
pub fn can_manage_package(actor: &Actor, package: &PackageOwnership) -> bool {
    let Some(uid) = actor.user_id() else {
        return false;
    };

    if package.steward == Some(uid) {
        return true;
    }
    if package.steward.is_some() {
        return false;
    }
    package.maintainer == Some(uid) || package.submitter == uid
}

/// Pinning and unpinning require elevation or management rights.
pub fn can_pin_comment(actor: &Actor, package: &PackageOwnership) -> bool {
    actor.is_elevated() || can_manage_package(actor, package)
}

/// Category changes require elevation or being the current maintainer.
pub fn can_change_category(actor: &Actor, package: &PackageOwnership) -> bool {
    if actor.is_elevated() {
        return true;
    }
    match actor.user_id() {
        Some(uid) => package.maintainer == Some(uid),
        None => false,
    }
}

/// Regular users may only adopt orphans; elevated actors adopt anything.
pub fn can_adopt_package(actor: &Actor, package: &PackageOwnership) -> bool {
    if !actor.is_authenticated() {
        return false;
    }
    actor.is_elevated() || package.maintainer.is_none()
}

/// Regular users may only drop their own maintainership.
pub fn can_disown_package(actor: &Actor, package: &PackageOwnership) -> bool {
    if actor.is_elevated() {
        return true;
    }
    match actor.user_id() {
        Some(uid) => package.maintainer == Some(uid),
        None => false,
    }
}

/// Deleting and merging packages is reserved to elevated actors.
pub fn can_delete_packages(actor: &Actor) -> bool {
    actor.is_elevated()
}

/// Only elevated actors may submit names on the restriction list.
pub fn can_submit_restricted_package(actor: &Actor) -> bool {
    actor.is_elevated()
}

fn is_elevated_or_author(actor: &Actor, comment: &impl Authored) -> bool {
    if actor.is_elevated() {
        return true;
    }
    match (actor.user_id(), comment.author()) {
        (Some(uid), Some(author)) => uid == author,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::comment::{Comment, CommentAuthor};

    const MAINTAINER: i64 = 10;
    const SUBMITTER: i64 = 11;
    const STEWARD: i64 = 12;
    const STRANGER: i64 = 13;

    fn ownership(steward: Option<i64>) -> PackageOwnership {
        PackageOwnership {
            package_id: 1,
            submitter: SUBMITTER,
            maintainer: Some(MAINTAINER),
            steward,
        }
    }

    fn comment_by(author: Option<i64>) -> Comment {
        Comment {
            id: 5,
            package_id: 1,
            author,
            body: "please bump pkgver".to_string(),
            created_ts: 0,
            edited_ts: None,
            editor: None,
            deleted_ts: None,
            deleter: None,
            pinned_ts: None,
        }
    }

    #[test]
    fn comment_deletion_agrees_for_full_rows_and_narrow_lookups() {
        let actors = [
            Actor::Anonymous,
            Actor::user(MAINTAINER),
            Actor::user(STRANGER),
            Actor::trusted_moderator(STEWARD),
            Actor::privileged_admin(STEWARD),
        ];
        for author in [None, Some(MAINTAINER)] {
            let row = comment_by(author);
            let narrow = CommentAuthor {
                comment_id: row.id,
                package_id: row.package_id,
                author,
                is_deleted: false,
            };
            for actor in &actors {
                assert_eq!(
                    can_delete_comment(actor, &row),
                    can_delete_comment(actor, &narrow),
                    "divergent decision for {actor:?} on author {author:?}"
                );
            }
        }
    }

    #[test]
    fn comment_author_and_elevated_may_delete() {
        let row = comment_by(Some(MAINTAINER));
        assert!(can_delete_comment(&Actor::user(MAINTAINER), &row));
        assert!(can_delete_comment(&Actor::trusted_moderator(STRANGER), &row));
        assert!(!can_delete_comment(&Actor::user(STRANGER), &row));
        assert!(!can_delete_comment(&Actor::Anonymous, &row));
    }

    #[test]
    fn anonymous_comment_is_only_deletable_by_elevated() {
        let row = comment_by(None);
        assert!(!can_delete_comment(&Actor::user(STRANGER), &row));
        assert!(can_delete_comment(&Actor::privileged_admin(STRANGER), &row));
    }

    #[test]
    fn maintainer_and_submitter_manage_unstewarded_packages() {
        let package = ownership(None);
        assert!(can_manage_package(&Actor::user(MAINTAINER), &package));
        assert!(can_manage_package(&Actor::user(SUBMITTER), &package));
        assert!(!can_manage_package(&Actor::user(STRANGER), &package));
        assert!(!can_manage_package(&Actor::Anonymous, &package));
    }

    #[test]
    fn steward_takes_over_management() {
        let package = ownership(Some(STEWARD));
        assert!(can_manage_package(&Actor::trusted_moderator(STEWARD), &package));
        assert!(!can_manage_package(&Actor::user(MAINTAINER), &package));
        assert!(!can_manage_package(&Actor::user(SUBMITTER), &package));
    }

    #[test]
    fn pinning_allows_elevated_actors_without_management_rights() {
        let package = ownership(Some(STEWARD));
        assert!(can_pin_comment(&Actor::trusted_moderator(STRANGER), &package));
        assert!(!can_pin_comment(&Actor::user(MAINTAINER), &package));
    }

    #[test]
    fn category_change_is_maintainer_or_elevated() {
        let package = ownership(None);
        assert!(can_change_category(&Actor::user(MAINTAINER), &package));
        assert!(!can_change_category(&Actor::user(SUBMITTER), &package));
        assert!(can_change_category(&Actor::privileged_admin(STRANGER), &package));
        assert!(!can_change_category(&Actor::Anonymous, &package));
    }

    #[test]
    fn adoption_scope_depends_on_role() {
        let maintained = ownership(None);
        let orphan = PackageOwnership {
            maintainer: None,
            ..maintained
        };
        assert!(can_adopt_package(&Actor::user(STRANGER), &orphan));
        assert!(!can_adopt_package(&Actor::user(STRANGER), &maintained));
        assert!(can_adopt_package(&Actor::trusted_moderator(STRANGER), &maintained));
        assert!(!can_adopt_package(&Actor::Anonymous, &orphan));
    }

    #[test]
    fn disown_scope_depends_on_role() {
        let package = ownership(None);
        assert!(can_disown_package(&Actor::user(MAINTAINER), &package));
        assert!(!can_disown_package(&Actor::user(STRANGER), &package));
        assert!(can_disown_package(&Actor::privileged_admin(STRANGER), &package));
    }

    #[test]
    fn restricted_names_and_deletion_require_elevation() {
        assert!(!can_submit_restricted_package(&Actor::user(1)));
        assert!(can_submit_restricted_package(&Actor::trusted_moderator(1)));
        assert!(!can_delete_packages(&Actor::user(1)));
        assert!(!can_delete_packages(&Actor::Anonymous));
        assert!(can_delete_packages(&Actor::privileged_admin(1)));
    }
}
