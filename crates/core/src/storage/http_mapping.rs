//! Pure functions for mapping repository errors to HTTP status codes.

use super::RepositoryError;

/// Maps a [`RepositoryError`] to an HTTP status code.
///
/// - `NotFound` -> 404 (Not Found)
/// - `AlreadyExists`, `Conflict` -> 409 (Conflict)
/// - `InvalidCursor`, `InvalidInput` -> 400 (Bad Request)
/// - `StoreUnavailable` -> 503 (Service Unavailable)
/// - `InvalidData`, `Serialization` -> 500 (Internal Server Error)
///
/// # Examples
///
/// ```
/// use trackvault_core::storage::{RepositoryError, repository_error_to_status_code};
///
/// let error = RepositoryError::NotFound {
///     entity_type: "Tag",
///     id: "rock".to_string(),
/// };
/// assert_eq!(repository_error_to_status_code(&error), 404);
/// ```
pub fn repository_error_to_status_code(error: &RepositoryError) -> u16 {
    match error {
        RepositoryError::NotFound { .. } => 404,
        RepositoryError::AlreadyExists { .. } | RepositoryError::Conflict { .. } => 409,
        RepositoryError::InvalidCursor(_) | RepositoryError::InvalidInput(_) => 400,
        RepositoryError::StoreUnavailable(_) => 503,
        RepositoryError::InvalidData(_) | RepositoryError::Serialization(_) => 500,
    }
}
