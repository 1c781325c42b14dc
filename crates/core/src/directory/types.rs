use std::fmt;

use crate::library::{Account, Role};

/// A change to one privileged attribute of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivilegedChange {
    Role(Role),
    Disabled(bool),
}

impl PrivilegedChange {
    /// True when `account` already holds the requested value.
    pub fn is_satisfied_by(&self, account: &Account) -> bool {
        match self {
            PrivilegedChange::Role(role) => account.role == *role,
            PrivilegedChange::Disabled(disabled) => account.disabled == *disabled,
        }
    }

    /// The change that would restore `account`'s current value.
    pub fn snapshot_of(&self, account: &Account) -> PrivilegedChange {
        match self {
            PrivilegedChange::Role(_) => PrivilegedChange::Role(account.role),
            PrivilegedChange::Disabled(_) => PrivilegedChange::Disabled(account.disabled),
        }
    }
}

impl fmt::Display for PrivilegedChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrivilegedChange::Role(role) => write!(f, "role={role}"),
            PrivilegedChange::Disabled(true) => f.write_str("status=disabled"),
            PrivilegedChange::Disabled(false) => f.write_str("status=enabled"),
        }
    }
}

/// Result of a successful sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The account already held the value; neither system was written.
    Unchanged(Account),
    /// Both systems now hold the new value.
    Applied(Account),
}

impl SyncOutcome {
    pub fn account(&self) -> &Account {
        match self {
            SyncOutcome::Unchanged(account) | SyncOutcome::Applied(account) => account,
        }
    }

    pub fn was_applied(&self) -> bool {
        matches!(self, SyncOutcome::Applied(_))
    }
}
