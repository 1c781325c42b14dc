//! Pure functions for mapping sync errors to HTTP status codes.

use crate::storage::repository_error_to_status_code;

use super::SyncError;

/// Maps a [`SyncError`] to an HTTP status code.
///
/// - `SelfModification` -> 403 (Forbidden)
/// - `Repository` -> same as [`repository_error_to_status_code`]
/// - `Directory` -> 502 (Bad Gateway)
/// - `Inconsistent` -> 500 (Internal Server Error)
pub fn sync_error_to_status_code(error: &SyncError) -> u16 {
    match error {
        SyncError::SelfModification => 403,
        SyncError::Repository(err) => repository_error_to_status_code(err),
        SyncError::Directory(_) => 502,
        SyncError::Inconsistent { .. } => 500,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::DirectoryError;
    use crate::storage::RepositoryError;

    #[test]
    fn test_self_modification_maps_to_403() {
        assert_eq!(sync_error_to_status_code(&SyncError::SelfModification), 403);
    }

    #[test]
    fn test_repository_errors_keep_their_status() {
        let err = SyncError::Repository(RepositoryError::Conflict {
            entity_type: "Account",
            id: "acc-1".to_string(),
        });
        assert_eq!(sync_error_to_status_code(&err), 409);
    }

    #[test]
    fn test_directory_failures() {
        let rolled_back = SyncError::Directory(DirectoryError::Unavailable("down".into()));
        let inconsistent = SyncError::Inconsistent {
            subject: "acc-1".to_string(),
            cause: DirectoryError::Unavailable("down".into()),
            compensation: "down too".to_string(),
        };
        assert_eq!(sync_error_to_status_code(&rolled_back), 502);
        assert_eq!(sync_error_to_status_code(&inconsistent), 500);
    }
}
