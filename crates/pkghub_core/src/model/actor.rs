//! Request actor and role model.
//!
//! # Invariants
//! - An anonymous actor never carries a user id.
//! - Role decisions are made by matching on [`Role`], never on strings.

use super::UserId;
use serde::{Deserialize, Serialize};

/// Role of an authenticated account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Regular registered user.
    User,
    /// Trusted user with moderation rights.
    TrustedModerator,
    /// Developer with full moderation rights.
    PrivilegedAdmin,
}

impl Role {
    /// Trusted moderators and privileged admins are collectively elevated.
    pub fn is_elevated(self) -> bool {
        match self {
            Self::User => false,
            Self::TrustedModerator | Self::PrivilegedAdmin => true,
        }
    }

    /// Maps the stored account type id onto a role.
    ///
    /// `1` user, `2` trusted user, `3` developer, `4` trusted user and
    /// developer.
    pub fn from_account_type(account_type: i64) -> Option<Self> {
        match account_type {
            1 => Some(Self::User),
            2 => Some(Self::TrustedModerator),
            3 | 4 => Some(Self::PrivilegedAdmin),
            _ => None,
        }
    }

    /// Stored account type id for this role.
    pub fn account_type(self) -> i64 {
        match self {
            Self::User => 1,
            Self::TrustedModerator => 2,
            Self::PrivilegedAdmin => 3,
        }
    }
}

/// Per-request identity derived from the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Actor {
    Anonymous,
    Authenticated { id: UserId, role: Role },
}

impl Actor {
    pub fn user(id: UserId) -> Self {
        Self::Authenticated {
            id,
            role: Role::User,
        }
    }

    pub fn trusted_moderator(id: UserId) -> Self {
        Self::Authenticated {
            id,
            role: Role::TrustedModerator,
        }
    }

    pub fn privileged_admin(id: UserId) -> Self {
        Self::Authenticated {
            id,
            role: Role::PrivilegedAdmin,
        }
    }

    /// User id, `None` for anonymous actors.
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Self::Anonymous => None,
            Self::Authenticated { id, .. } => Some(*id),
        }
    }

    /// Role, `None` for anonymous actors.
    pub fn role(&self) -> Option<Role> {
        match self {
            Self::Anonymous => None,
            Self::Authenticated { role, .. } => Some(*role),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }

    pub fn is_elevated(&self) -> bool {
        self.role().is_some_and(Role::is_elevated)
    }
}
