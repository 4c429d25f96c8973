#![allow(dead_code)]

use pkghub_core::mail::{MailError, MailMessage, MailSender};
use pkghub_core::model::actor::Role;
use pkghub_core::repo::package_repo::{NewPackage, PackageRepository, SqlitePackageRepository};
use rusqlite::{params, Connection};
use std::cell::RefCell;

pub fn add_user(conn: &Connection, id: i64, name: &str, role: Role) {
    conn.execute(
        "INSERT INTO users (id, username, email, account_type) VALUES (?1, ?2, ?3, ?4);",
        params![id, name, format!("{name}@example.org"), role.account_type()],
    )
    .unwrap();
}

pub fn add_package(conn: &Connection, name: &str, submitter: i64) -> i64 {
    let repo = SqlitePackageRepository::try_new(conn).unwrap();
    repo.create_package(&NewPackage::new(name, submitter)).unwrap()
}

pub fn add_package_with(conn: &Connection, package: NewPackage) -> i64 {
    let repo = SqlitePackageRepository::try_new(conn).unwrap();
    repo.create_package(&package).unwrap()
}

pub fn add_package_with_id(conn: &Connection, id: i64, name: &str, submitter: i64) -> i64 {
    conn.execute(
        "INSERT INTO packages (id, name, submitter_uid, maintainer_uid) VALUES (?1, ?2, ?3, ?3);",
        params![id, name, submitter],
    )
    .unwrap();
    id
}

pub fn add_comment(conn: &Connection, package_id: i64, author: i64, body: &str) -> i64 {
    conn.execute(
        "INSERT INTO package_comments (package_id, author_uid, body) VALUES (?1, ?2, ?3);",
        params![package_id, author, body],
    )
    .unwrap();
    conn.last_insert_rowid()
}

pub fn add_vote(conn: &Connection, user: i64, package_id: i64) {
    conn.execute(
        "INSERT INTO package_votes (user_id, package_id) VALUES (?1, ?2);",
        params![user, package_id],
    )
    .unwrap();
    conn.execute(
        "UPDATE packages SET num_votes = num_votes + 1 WHERE id = ?1;",
        [package_id],
    )
    .unwrap();
}

pub fn num_votes(conn: &Connection, package_id: i64) -> i64 {
    conn.query_row(
        "SELECT num_votes FROM packages WHERE id = ?1;",
        [package_id],
        |row| row.get(0),
    )
    .unwrap()
}

pub fn vote_rows(conn: &Connection, package_id: i64) -> i64 {
    conn.query_row(
        "SELECT COUNT(*) FROM package_votes WHERE package_id = ?1;",
        [package_id],
        |row| row.get(0),
    )
    .unwrap()
}

pub fn has_vote(conn: &Connection, user: i64, package_id: i64) -> bool {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM package_votes WHERE user_id = ?1 AND package_id = ?2);",
        params![user, package_id],
        |row| row.get(0),
    )
    .unwrap()
}

pub fn maintainer_of(conn: &Connection, package_id: i64) -> Option<i64> {
    conn.query_row(
        "SELECT maintainer_uid FROM packages WHERE id = ?1;",
        [package_id],
        |row| row.get(0),
    )
    .unwrap()
}

pub fn is_subscribed(conn: &Connection, user: i64, package_id: i64) -> bool {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM comment_notify WHERE user_id = ?1 AND package_id = ?2);",
        params![user, package_id],
        |row| row.get(0),
    )
    .unwrap()
}

/// Mail sender that keeps every message, optionally failing each send.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: RefCell<Vec<MailMessage>>,
    pub fail: bool,
}

impl RecordingMailer {
    pub fn failing() -> Self {
        Self {
            sent: RefCell::new(Vec::new()),
            fail: true,
        }
    }
}

impl MailSender for RecordingMailer {
    fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        self.sent.borrow_mut().push(message.clone());
        if self.fail {
            return Err(MailError::new("smtp relay unreachable"));
        }
        Ok(())
    }
}
