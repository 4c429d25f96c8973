//! Search and pagination engine behind the package listing.
//!
//! # Responsibility
//! - Filter, sort and page packages from a structured request.
//! - Build the pagination index shown under the listing.

pub mod package_search;
pub mod pagination;
