mod error;
mod http_mapping;
mod traits;
mod types;

pub use error::{DirectoryError, SyncError};
pub use http_mapping::sync_error_to_status_code;
pub use traits::{DirectoryClient, Result};
pub use types::{PrivilegedChange, SyncOutcome};
