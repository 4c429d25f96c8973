mod common;

use common::{
    add_comment, add_package_with_id, add_user, add_vote, has_vote, is_subscribed, num_votes,
    vote_rows,
};
use pkghub_core::db::open_db_in_memory;
use pkghub_core::model::actor::{Actor, Role};
use pkghub_core::repo::package_repo::{PackageRepository, SqlitePackageRepository};
use pkghub_core::service::merge_service::MergeService;
use pkghub_core::service::{Action, ActionError, NotFoundTarget};
use rusqlite::Connection;

fn seed(conn: &Connection) {
    add_user(conn, 1, "alice", Role::User);
    add_user(conn, 2, "bob", Role::User);
    add_user(conn, 3, "carol", Role::User);
    add_user(conn, 9, "dev", Role::PrivilegedAdmin);
    add_package_with_id(conn, 10, "foo-git", 1);
    add_package_with_id(conn, 11, "foo-bin", 1);
    add_package_with_id(conn, 12, "foo", 1);
}

fn comment_package(conn: &Connection, comment_id: i64) -> i64 {
    conn.query_row(
        "SELECT package_id FROM package_comments WHERE id = ?1;",
        [comment_id],
        |row| row.get(0),
    )
    .unwrap()
}

#[test]
fn merge_moves_comments_and_deduplicates_votes() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    // alice voted for a source and the target, bob only for sources.
    add_vote(&conn, 1, 10);
    add_vote(&conn, 1, 12);
    add_vote(&conn, 2, 10);
    add_vote(&conn, 2, 11);
    add_vote(&conn, 3, 11);
    let c10 = add_comment(&conn, 10, 1, "first");
    let c11 = add_comment(&conn, 11, 2, "second");

    let service = MergeService::new(SqlitePackageRepository::try_new(&conn).unwrap());
    let message = service
        .delete_packages(&Actor::privileged_admin(9), &[10, 11], Some(12))
        .unwrap();
    assert_eq!(message, "The selected packages have been deleted.");

    let repo = SqlitePackageRepository::try_new(&conn).unwrap();
    assert!(repo.get_package(10).unwrap().is_none());
    assert!(repo.get_package(11).unwrap().is_none());

    assert_eq!(comment_package(&conn, c10), 12);
    assert_eq!(comment_package(&conn, c11), 12);

    assert!(has_vote(&conn, 1, 12));
    assert!(has_vote(&conn, 2, 12));
    assert!(has_vote(&conn, 3, 12));
    assert_eq!(vote_rows(&conn, 12), 3);
    assert_eq!(num_votes(&conn, 12), 3);
}

#[test]
fn merge_reports_what_moved() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    add_vote(&conn, 1, 10);
    add_vote(&conn, 1, 12);
    add_comment(&conn, 10, 1, "hello");

    let service = MergeService::new(SqlitePackageRepository::try_new(&conn).unwrap());
    let outcome = service
        .delete_and_merge(&Actor::trusted_moderator(9), &[10, 12], Some(12))
        .unwrap();

    assert_eq!(outcome.deleted, vec![10]);
    let merge = outcome.merge.unwrap();
    assert_eq!(merge.target, 12);
    assert_eq!(merge.comments_moved, 1);
    assert_eq!(merge.votes_moved, 0);
    assert_eq!(merge.num_votes, 1);
}

#[test]
fn merge_moves_subscriptions_without_duplicates() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    conn.execute_batch(
        "INSERT INTO comment_notify (user_id, package_id) VALUES (1, 10), (1, 12), (2, 11);",
    )
    .unwrap();

    let service = MergeService::new(SqlitePackageRepository::try_new(&conn).unwrap());
    service
        .delete_packages(&Actor::privileged_admin(9), &[10, 11], Some(12))
        .unwrap();

    assert!(is_subscribed(&conn, 1, 12));
    assert!(is_subscribed(&conn, 2, 12));
    let rows: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM comment_notify WHERE package_id = 12;",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(rows, 2);
}

#[test]
fn plain_delete_cascades_votes() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    add_vote(&conn, 1, 10);

    let service = MergeService::new(SqlitePackageRepository::try_new(&conn).unwrap());
    service
        .delete_packages(&Actor::trusted_moderator(9), &[10], None)
        .unwrap();

    assert_eq!(vote_rows(&conn, 10), 0);
    assert_eq!(num_votes(&conn, 12), 0);
}

#[test]
fn only_elevated_actors_delete() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    let service = MergeService::new(SqlitePackageRepository::try_new(&conn).unwrap());

    let err = service
        .delete_packages(&Actor::user(1), &[10], None)
        .unwrap_err();
    assert!(matches!(err, ActionError::Forbidden(Action::Delete)));

    let err = service
        .delete_packages(&Actor::Anonymous, &[10], None)
        .unwrap_err();
    assert!(matches!(err, ActionError::Unauthorized(Action::Delete)));

    let err = service
        .delete_packages(&Actor::privileged_admin(9), &[], None)
        .unwrap_err();
    assert!(matches!(err, ActionError::NoSelection(Action::Delete)));

    let repo = SqlitePackageRepository::try_new(&conn).unwrap();
    assert!(repo.get_package(10).unwrap().is_some());
}

#[test]
fn missing_merge_target_changes_nothing() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    let comment = add_comment(&conn, 10, 1, "stays");

    let service = MergeService::new(SqlitePackageRepository::try_new(&conn).unwrap());
    let err = service
        .delete_packages(&Actor::privileged_admin(9), &[10], Some(999))
        .unwrap_err();
    assert!(matches!(
        err,
        ActionError::NotFound(NotFoundTarget::Package(999))
    ));

    let repo = SqlitePackageRepository::try_new(&conn).unwrap();
    assert!(repo.get_package(10).unwrap().is_some());
    assert_eq!(comment_package(&conn, comment), 10);
}

#[test]
fn selecting_only_the_merge_target_is_an_empty_selection() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    add_vote(&conn, 1, 12);
    let comment = add_comment(&conn, 12, 1, "keep me");

    let service = MergeService::new(SqlitePackageRepository::try_new(&conn).unwrap());
    let err = service
        .delete_packages(&Actor::privileged_admin(9), &[12, 12], Some(12))
        .unwrap_err();
    assert!(matches!(err, ActionError::NoSelection(Action::Delete)));

    let repo = SqlitePackageRepository::try_new(&conn).unwrap();
    assert!(repo.get_package(12).unwrap().is_some());
    assert_eq!(num_votes(&conn, 12), 1);
    assert_eq!(comment_package(&conn, comment), 12);
}
