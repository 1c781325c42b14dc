use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::ValidationError;
use super::operations::normalize_tag_name;

/// The closed set of entity shapes stored in the single table.
///
/// Every stored item carries the discriminator returned by [`EntityKind::as_str`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Account,
    ContentItem,
    Collection,
    NamedList,
    ListMembership,
    Tag,
    ItemTag,
    TransferJob,
    CreatorProfile,
    FollowEdge,
}

impl EntityKind {
    /// All entity kinds, in declaration order.
    pub const ALL: [EntityKind; 10] = [
        EntityKind::Account,
        EntityKind::ContentItem,
        EntityKind::Collection,
        EntityKind::NamedList,
        EntityKind::ListMembership,
        EntityKind::Tag,
        EntityKind::ItemTag,
        EntityKind::TransferJob,
        EntityKind::CreatorProfile,
        EntityKind::FollowEdge,
    ];

    /// Discriminator value written to the `entityType` attribute.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Account => "ACCOUNT",
            EntityKind::ContentItem => "CONTENT_ITEM",
            EntityKind::Collection => "COLLECTION",
            EntityKind::NamedList => "NAMED_LIST",
            EntityKind::ListMembership => "LIST_MEMBERSHIP",
            EntityKind::Tag => "TAG",
            EntityKind::ItemTag => "ITEM_TAG",
            EntityKind::TransferJob => "TRANSFER_JOB",
            EntityKind::CreatorProfile => "CREATOR_PROFILE",
            EntityKind::FollowEdge => "FOLLOW_EDGE",
        }
    }

    /// Human-readable name used in error messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            EntityKind::Account => "Account",
            EntityKind::ContentItem => "ContentItem",
            EntityKind::Collection => "Collection",
            EntityKind::NamedList => "NamedList",
            EntityKind::ListMembership => "ListMembership",
            EntityKind::Tag => "Tag",
            EntityKind::ItemTag => "ItemTag",
            EntityKind::TransferJob => "TransferJob",
            EntityKind::CreatorProfile => "CreatorProfile",
            EntityKind::FollowEdge => "FollowEdge",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownEntityKind(s.to_string()))
    }
}

// ============================================================================
// Roles
// ============================================================================

/// Privileged role of an account, mirrored into the authorization directory
/// as group membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Guest,
    #[default]
    Member,
    Creator,
    Admin,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Guest, Role::Member, Role::Creator, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Guest => "guest",
            Role::Member => "member",
            Role::Creator => "creator",
            Role::Admin => "admin",
        }
    }

    /// Name of the directory group that grants this role.
    pub fn group_name(&self) -> &'static str {
        self.as_str()
    }

    /// Maps a directory group name back to a role, if it is one of ours.
    pub fn from_group_name(group: &str) -> Option<Role> {
        Role::ALL.into_iter().find(|role| role.group_name() == group)
    }

    /// Returns the capability required for cross-owner listings.
    pub fn global_access(&self) -> Option<GlobalAccess> {
        GlobalAccess::for_role(*self)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == lowered)
            .ok_or_else(|| ValidationError::UnknownRole(s.to_string()))
    }
}

/// Proof that the caller may run cross-owner listings, including full scans.
///
/// Only obtainable from a role that carries the global-view permission, so
/// the privileged repository methods cannot be called without one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalAccess {
    _private: (),
}

impl GlobalAccess {
    pub fn for_role(role: Role) -> Option<Self> {
        match role {
            Role::Admin => Some(Self { _private: () }),
            Role::Guest | Role::Member | Role::Creator => None,
        }
    }
}

// ============================================================================
// Accounts
// ============================================================================

/// One profile item per account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub disabled: bool,
    /// Denormalized number of follow edges this account owns.
    pub following_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Creates an enabled member account.
    pub fn new(
        id: impl Into<String>,
        email: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            email: email.into(),
            display_name: display_name.into(),
            role: Role::default(),
            disabled: false,
            following_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }
}

// ============================================================================
// Content items and collections
// ============================================================================

/// Who can see a content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Private,
    Unlisted,
    Public,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Private => "private",
            Visibility::Unlisted => "unlisted",
            Visibility::Public => "public",
        }
    }
}

impl FromStr for Visibility {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "private" => Ok(Visibility::Private),
            "unlisted" => Ok(Visibility::Unlisted),
            "public" => Ok(Visibility::Public),
            _ => Err(ValidationError::UnknownVisibility(s.to_string())),
        }
    }
}

/// An uploaded piece of content (a track) owned by an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    /// Creator credited on the item; indexed for "all items by creator".
    pub creator_name: Option<String>,
    pub collection_id: Option<String>,
    pub duration_secs: u32,
    /// Object-store key of the media file.
    pub object_key: String,
    pub visibility: Visibility,
    /// Denormalized copy of the item's tag associations.
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ContentItem {
    pub fn new(
        owner_id: impl Into<String>,
        title: impl Into<String>,
        object_key: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            title: title.into(),
            creator_name: None,
            collection_id: None,
            duration_secs: 0,
            object_key: object_key.into(),
            visibility: Visibility::default(),
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_creator(mut self, creator_name: impl Into<String>) -> Self {
        self.creator_name = Some(creator_name.into());
        self
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with_duration(mut self, duration_secs: u32) -> Self {
        self.duration_secs = duration_secs;
        self
    }

    /// Sets a specific ID (useful for testing).
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn is_public(&self) -> bool {
        self.visibility == Visibility::Public
    }
}

/// An album-like grouping of content items with denormalized aggregates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub creator_name: Option<String>,
    pub year: Option<i32>,
    pub item_count: i64,
    pub total_duration_secs: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Collection {
    pub fn new(owner_id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            title: title.into(),
            creator_name: None,
            year: None,
            item_count: 0,
            total_duration_secs: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_creator(mut self, creator_name: impl Into<String>) -> Self {
        self.creator_name = Some(creator_name.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

// ============================================================================
// Named lists
// ============================================================================

/// A playlist-like ordered list. Membership lives in separate items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedList {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub description: Option<String>,
    pub is_public: bool,
    pub item_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NamedList {
    pub fn new(owner_id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            name: name.into(),
            description: None,
            is_public: false,
            item_count: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One (list, item) pair at a position. The position is the sort key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListMembership {
    pub list_id: String,
    pub item_id: String,
    pub position: u32,
    pub added_at: DateTime<Utc>,
}

// ============================================================================
// Tags
// ============================================================================

/// A user-defined label. `name` is always stored normalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub owner_id: String,
    pub name: String,
    pub color: Option<String>,
    pub item_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tag {
    /// Creates a tag, normalizing the name.
    pub fn new(owner_id: impl Into<String>, name: &str) -> Self {
        let now = Utc::now();
        Self {
            owner_id: owner_id.into(),
            name: normalize_tag_name(name),
            color: None,
            item_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }
}

/// Association between a content item and a tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemTag {
    pub owner_id: String,
    pub item_id: String,
    pub tag_name: String,
    pub added_at: DateTime<Utc>,
}

// ============================================================================
// Transfer jobs
// ============================================================================

/// Upload/processing state of a transfer job.
///
/// `Pending -> Processing -> Completed | Failed`; a pending job may also fail
/// outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransferStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Pending => "PENDING",
            TransferStatus::Processing => "PROCESSING",
            TransferStatus::Completed => "COMPLETED",
            TransferStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferStatus::Completed | TransferStatus::Failed)
    }

    pub fn can_transition_to(&self, next: TransferStatus) -> bool {
        matches!(
            (self, next),
            (TransferStatus::Pending, TransferStatus::Processing)
                | (TransferStatus::Pending, TransferStatus::Failed)
                | (TransferStatus::Processing, TransferStatus::Completed)
                | (TransferStatus::Processing, TransferStatus::Failed)
        )
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransferStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PENDING" => Ok(TransferStatus::Pending),
            "PROCESSING" => Ok(TransferStatus::Processing),
            "COMPLETED" => Ok(TransferStatus::Completed),
            "FAILED" => Ok(TransferStatus::Failed),
            _ => Err(ValidationError::UnknownTransferStatus(s.to_string())),
        }
    }
}

/// A file transfer (upload) and its processing state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferJob {
    pub id: String,
    pub owner_id: String,
    pub file_name: String,
    pub object_key: String,
    pub status: TransferStatus,
    pub error_message: Option<String>,
    /// Content item produced by a completed transfer.
    pub item_id: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TransferJob {
    pub fn new(
        owner_id: impl Into<String>,
        file_name: impl Into<String>,
        object_key: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            // Time-ordered so key order is creation order.
            id: Uuid::now_v7().to_string(),
            owner_id: owner_id.into(),
            file_name: file_name.into(),
            object_key: object_key.into(),
            status: TransferStatus::Pending,
            error_message: None,
            item_id: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Details recorded alongside a transfer status change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferOutcome {
    pub error_message: Option<String>,
    pub item_id: Option<String>,
}

// ============================================================================
// Creator profiles and follows
// ============================================================================

/// Public profile of an account that publishes content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatorProfile {
    pub account_id: String,
    pub display_name: String,
    pub bio: Option<String>,
    pub genres: Vec<String>,
    pub follower_count: i64,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CreatorProfile {
    pub fn new(account_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            account_id: account_id.into(),
            display_name: display_name.into(),
            bio: None,
            genres: Vec::new(),
            follower_count: 0,
            verified: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Directional edge: `follower_id` follows `followed_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowEdge {
    pub follower_id: String,
    pub followed_id: String,
    pub created_at: DateTime<Utc>,
}

impl FollowEdge {
    pub fn new(follower_id: impl Into<String>, followed_id: impl Into<String>) -> Self {
        Self {
            follower_id: follower_id.into(),
            followed_id: followed_id.into(),
            created_at: Utc::now(),
        }
    }

    pub fn is_self_follow(&self) -> bool {
        self.follower_id == self.followed_id
    }
}
