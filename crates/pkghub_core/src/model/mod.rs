//! Domain records shared by the policy, repositories and engines.
//!
//! # Invariants
//! - Every record is identified by a positive integer row id.
//! - A package's `num_votes` mirrors the count of its live vote rows.
//! - Comments are soft-deleted; deletion state is kept for audit.

pub mod actor;
pub mod comment;
pub mod package;

/// Row id of a user account.
pub type UserId = i64;
/// Row id of a package.
pub type PackageId = i64;
/// Row id of a package comment.
pub type CommentId = i64;
/// Row id of a package category.
pub type CategoryId = i64;
/// Unix epoch seconds.
pub type Timestamp = i64;
