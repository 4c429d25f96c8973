mod common;

use common::{add_package_with_id, add_user, is_subscribed};
use pkghub_core::db::open_db_in_memory;
use pkghub_core::model::actor::{Actor, Role};
use pkghub_core::repo::notify_repo::SqliteNotifyRepository;
use pkghub_core::service::notify_service::NotifyService;
use pkghub_core::service::{Action, ActionError};
use rusqlite::Connection;

fn seed(conn: &Connection) {
    add_user(conn, 1, "alice", Role::User);
    add_package_with_id(conn, 5, "zsh-git", 1);
    add_package_with_id(conn, 6, "atuin", 1);
}

fn subscription_rows(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM comment_notify;", [], |row| row.get(0))
        .unwrap()
}

#[test]
fn anonymous_requests_are_ignored() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    let service = NotifyService::new(SqliteNotifyRepository::try_new(&conn).unwrap());

    assert_eq!(service.set_notify(&Actor::Anonymous, &[5], true).unwrap(), None);
    assert_eq!(service.set_notify(&Actor::Anonymous, &[], false).unwrap(), None);
    assert_eq!(subscription_rows(&conn), 0);
    assert!(service
        .notified_package_ids(&Actor::Anonymous)
        .unwrap()
        .is_empty());
}

#[test]
fn subscribe_names_packages_in_request_order() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    let service = NotifyService::new(SqliteNotifyRepository::try_new(&conn).unwrap());

    let message = service
        .set_notify(&Actor::user(1), &[6, 404, 5], true)
        .unwrap();
    assert_eq!(
        message.as_deref(),
        Some("You have been added to the comment notification list for atuin, zsh-git.")
    );
    assert!(is_subscribed(&conn, 1, 5));
    assert!(is_subscribed(&conn, 1, 6));
}

#[test]
fn subscribing_twice_keeps_one_row() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    let service = NotifyService::new(SqliteNotifyRepository::try_new(&conn).unwrap());

    service.set_notify(&Actor::user(1), &[5], true).unwrap();
    service.set_notify(&Actor::user(1), &[5, 5], true).unwrap();

    assert_eq!(subscription_rows(&conn), 1);
    let ids = service.notified_package_ids(&Actor::user(1)).unwrap();
    assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec![5]);
}

#[test]
fn unsubscribe_removes_rows() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    let service = NotifyService::new(SqliteNotifyRepository::try_new(&conn).unwrap());
    service.set_notify(&Actor::user(1), &[5, 6], true).unwrap();

    let message = service.set_notify(&Actor::user(1), &[5], false).unwrap();
    assert_eq!(
        message.as_deref(),
        Some("You have been removed from the comment notification list for zsh-git.")
    );
    assert!(!is_subscribed(&conn, 1, 5));
    assert!(is_subscribed(&conn, 1, 6));

    // Removing a missing subscription is not an error.
    service.set_notify(&Actor::user(1), &[5], false).unwrap();
}

#[test]
fn empty_selection_is_rejected_for_users() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    let service = NotifyService::new(SqliteNotifyRepository::try_new(&conn).unwrap());

    let err = service.set_notify(&Actor::user(1), &[], true).unwrap_err();
    assert!(matches!(err, ActionError::NoSelection(Action::Notify)));
}

#[test]
fn selection_of_unknown_packages_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    let service = NotifyService::new(SqliteNotifyRepository::try_new(&conn).unwrap());

    let err = service.set_notify(&Actor::user(1), &[404], true).unwrap_err();
    assert!(matches!(err, ActionError::NoSelection(Action::Notify)));
    let err = service
        .set_notify(&Actor::user(1), &[404, 405], false)
        .unwrap_err();
    assert!(matches!(err, ActionError::NoSelection(Action::Unnotify)));
    assert_eq!(subscription_rows(&conn), 0);
}
