//! Package and category records.

use super::{CategoryId, PackageId, Timestamp, UserId};
use serde::{Deserialize, Serialize};

/// Reserved "no category" id. Never offered as a selectable category.
pub const UNCATEGORIZED_ID: CategoryId = 1;

/// Canonical package record as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub id: PackageId,
    /// Unique across all packages.
    pub name: String,
    pub version: String,
    pub description: String,
    pub category_id: CategoryId,
    /// Original submitter. Immutable.
    pub submitter: UserId,
    /// Current maintainer. `None` means orphaned.
    pub maintainer: Option<UserId>,
    /// Elevated maintainer-of-record. When set, the package is under
    /// elevated management and ordinary maintainers lose management rights.
    pub steward: Option<UserId>,
    /// Denormalized count of live votes.
    pub num_votes: i64,
    pub out_of_date_ts: Option<Timestamp>,
    pub modified_ts: Timestamp,
}

impl Package {
    pub fn is_orphan(&self) -> bool {
        self.maintainer.is_none()
    }

    pub fn is_out_of_date(&self) -> bool {
        self.out_of_date_ts.is_some()
    }

    pub fn is_under_elevated_management(&self) -> bool {
        self.steward.is_some()
    }
}

/// Selectable package category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

/// Ownership slice of a package, enough to decide management rights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageOwnership {
    pub package_id: PackageId,
    pub submitter: UserId,
    pub maintainer: Option<UserId>,
    pub steward: Option<UserId>,
}

impl Package {
    pub fn ownership(&self) -> PackageOwnership {
        PackageOwnership {
            package_id: self.id,
            submitter: self.submitter,
            maintainer: self.maintainer,
            steward: self.steward,
        }
    }
}
