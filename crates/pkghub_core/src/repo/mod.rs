//! Repository layer: the package store interface and its SQLite backing.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Keep SQL details out of the engines.
//!
//! # Invariants
//! - Every mutating method is one durable unit: it opens its own
//!   `IMMEDIATE` transaction, runs its guard checks inside it and commits once.
//! - Storage failures surface as `RepoError::Db` and roll the unit back.

pub mod comment_repo;
pub mod notify_repo;
pub mod package_repo;
pub(crate) mod support;
pub mod vote_repo;
