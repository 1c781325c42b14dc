mod error;
mod operations;
mod types;

pub use error::ValidationError;
pub use operations::{
    collection_id_for, normalize_tag_name, normalize_tag_names, validate_follow,
    validate_identifier, validate_tag_name, validate_transition, KEY_SEPARATOR, MAX_TAG_NAME_LEN,
};
pub use types::{
    Account, Collection, ContentItem, CreatorProfile, EntityKind, FollowEdge, GlobalAccess,
    ItemTag, ListMembership, NamedList, Role, Tag, TransferJob, TransferOutcome, TransferStatus,
    Visibility,
};
