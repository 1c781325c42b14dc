use thiserror::Error;

use crate::storage::RepositoryError;

/// Errors reported by an authorization directory.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("directory subject not found: {0}")]
    SubjectNotFound(String),

    #[error("directory unavailable: {0}")]
    Unavailable(String),

    #[error("directory rejected the request: {0}")]
    Rejected(String),
}

/// Errors from a privileged-attribute sync across the store and directory.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Callers may not change their own role or status. Nothing was touched.
    #[error("accounts cannot change their own privileged attributes")]
    SelfModification,

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// The directory step failed and the store was restored.
    #[error("directory update failed and was rolled back: {0}")]
    Directory(#[from] DirectoryError),

    /// The directory step failed and so did compensation. Store and directory
    /// disagree for `subject` until reconciled by hand.
    #[error("store and directory diverged for {subject}: {cause}; compensation failed: {compensation}")]
    Inconsistent {
        subject: String,
        cause: DirectoryError,
        compensation: String,
    },
}

impl SyncError {
    pub fn is_inconsistent(&self) -> bool {
        matches!(self, SyncError::Inconsistent { .. })
    }
}
