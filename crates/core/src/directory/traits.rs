use async_trait::async_trait;

use super::DirectoryError;

/// Result type for directory operations.
pub type Result<T> = std::result::Result<T, DirectoryError>;

/// External authorization directory that mirrors account roles (as group
/// membership) and the enabled flag.
///
/// Subjects are account ids.
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    /// Groups the subject currently belongs to.
    async fn get_groups(&self, subject: &str) -> Result<Vec<String>>;

    async fn add_to_group(&self, subject: &str, group: &str) -> Result<()>;

    async fn remove_from_group(&self, subject: &str, group: &str) -> Result<()>;

    async fn is_enabled(&self, subject: &str) -> Result<bool>;

    async fn enable(&self, subject: &str) -> Result<()>;

    async fn disable(&self, subject: &str) -> Result<()>;
}
