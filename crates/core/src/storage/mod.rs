mod error;
mod http_mapping;
mod traits;
mod types;

pub use error::{RepositoryError, Result};
pub use http_mapping::repository_error_to_status_code;
pub use traits::{
    AccountRepository, CollectionRepository, ContentRepository, CounterRepository,
    CreatorRepository, FollowRepository, ListRepository, TagRepository, TransferRepository,
};
pub use types::{
    CounterTarget, DeleteMode, ListOptions, Page, PageLimits, SortOrder, DEFAULT_PAGE_SIZE,
    MAX_PAGE_SIZE,
};
