//! DynamoDB attribute conversion functions.
//!
//! Pure functions for converting between DynamoDB AttributeValue maps and domain types.
//! These are testable in isolation without DynamoDB access.

use std::str::FromStr;

use aws_sdk_dynamodb::types::AttributeValue;
use chrono::{DateTime, Utc};
use trackvault_core::library::{
    validate_identifier, validate_tag_name, Account, Collection, ContentItem, CreatorProfile,
    EntityKind, FollowEdge, ItemTag, ListMembership, NamedList, Role, Tag, TransferJob,
    TransferStatus, ValidationError, Visibility,
};
use trackvault_core::storage::RepositoryError;

use super::keys;
use super::store::{Item, TableKey, ENTITY_TYPE, GSI1PK, GSI1SK, GSI2PK, GSI2SK, PK, SK};

// ============================================================================
// Attribute names
// ============================================================================

pub const ATTR_ROLE: &str = "role";
pub const ATTR_DISABLED: &str = "disabled";
pub const ATTR_STATUS: &str = "status";
pub const ATTR_ERROR_MESSAGE: &str = "errorMessage";
pub const ATTR_ITEM_ID: &str = "itemId";
pub const ATTR_COMPLETED_AT: &str = "completedAt";
pub const ATTR_UPDATED_AT: &str = "updatedAt";
pub const ATTR_ITEM_COUNT: &str = "itemCount";
pub const ATTR_TOTAL_DURATION: &str = "totalDurationSecs";
pub const ATTR_FOLLOWER_COUNT: &str = "followerCount";
pub const ATTR_FOLLOWING_COUNT: &str = "followingCount";

/// An entity with a fixed item shape in the table.
///
/// Every [`EntityKind`] has exactly one implementation.
pub trait StoredEntity: Sized + Send + Sync {
    const KIND: EntityKind;

    /// Attributes written only by targeted updates. Full overwrites leave
    /// them as stored.
    const MANAGED: &'static [&'static str] = &[];

    /// Attributes a marshalled item may omit. Full overwrites remove them
    /// when the new value has none.
    const OPTIONAL: &'static [&'static str] = &[];

    fn key(&self) -> TableKey;

    /// Identity shown in error messages.
    fn identity(&self) -> String;

    /// Checks every identifier that ends up in a key.
    fn validate(&self) -> Result<(), ValidationError>;

    /// Sets creation and update timestamps.
    fn stamp_created(&mut self, now: DateTime<Utc>);

    /// Sets the update timestamp.
    fn stamp_updated(&mut self, now: DateTime<Utc>);

    fn to_item(&self) -> Item;

    fn from_item(item: &Item) -> Result<Self, RepositoryError>;
}

// ============================================================================
// Account conversions
// ============================================================================

/// Convert an Account to DynamoDB item.
pub fn account_to_item(account: &Account) -> Item {
    let mut item = base_item(account_key_of(account), EntityKind::Account);

    item.insert(
        GSI1PK.to_string(),
        AttributeValue::S(keys::email_gsi1_pk(&account.email)),
    );
    item.insert(
        GSI1SK.to_string(),
        AttributeValue::S(keys::account_pk(&account.id)),
    );

    put_s(&mut item, "id", &account.id);
    put_s(&mut item, "email", &account.email);
    put_s(&mut item, "displayName", &account.display_name);
    put_s(&mut item, ATTR_ROLE, account.role.as_str());
    item.insert(ATTR_DISABLED.to_string(), AttributeValue::Bool(account.disabled));
    put_n(&mut item, ATTR_FOLLOWING_COUNT, account.following_count);
    put_timestamps(&mut item, &account.created_at, &account.updated_at);

    item
}

/// Convert a DynamoDB item to an Account.
pub fn item_to_account(item: &Item) -> Result<Account, RepositoryError> {
    expect_kind(item, EntityKind::Account)?;

    Ok(Account {
        id: get_string(item, "id")?,
        email: get_string(item, "email")?,
        display_name: get_string(item, "displayName")?,
        role: get_parsed::<Role>(item, ATTR_ROLE)?,
        disabled: get_bool(item, ATTR_DISABLED)?,
        following_count: get_number(item, ATTR_FOLLOWING_COUNT)?,
        created_at: get_datetime(item, "createdAt")?,
        updated_at: get_datetime(item, ATTR_UPDATED_AT)?,
    })
}

fn account_key_of(account: &Account) -> TableKey {
    keys::account_key(&account.id)
}

impl StoredEntity for Account {
    const KIND: EntityKind = EntityKind::Account;
    const MANAGED: &'static [&'static str] = &[ATTR_ROLE, ATTR_DISABLED, ATTR_FOLLOWING_COUNT];

    fn key(&self) -> TableKey {
        account_key_of(self)
    }

    fn identity(&self) -> String {
        self.id.clone()
    }

    fn validate(&self) -> Result<(), ValidationError> {
        validate_identifier("account_id", &self.id)?;
        if self.email.trim().is_empty() {
            return Err(ValidationError::EmptyIdentifier("email"));
        }
        Ok(())
    }

    fn stamp_created(&mut self, now: DateTime<Utc>) {
        self.created_at = now;
        self.updated_at = now;
    }

    fn stamp_updated(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    fn to_item(&self) -> Item {
        account_to_item(self)
    }

    fn from_item(item: &Item) -> Result<Self, RepositoryError> {
        item_to_account(item)
    }
}

// ============================================================================
// Content item conversions
// ============================================================================

/// A creator name is part of the creator index key, so it must be listable
/// by the same name later.
fn validate_creator(creator_name: Option<&str>) -> Result<(), ValidationError> {
    match creator_name {
        Some(creator) => validate_identifier("creator", creator),
        None => Ok(()),
    }
}

/// Convert a ContentItem to DynamoDB item.
///
/// The creator index keys are written only when a creator is set, and the
/// visibility index keys only for public items.
pub fn content_item_to_item(content: &ContentItem) -> Item {
    let mut item = base_item(
        keys::item_key(&content.owner_id, &content.id),
        EntityKind::ContentItem,
    );

    if let Some(creator) = &content.creator_name {
        item.insert(
            GSI1PK.to_string(),
            AttributeValue::S(keys::creator_gsi1_pk(&content.owner_id, creator)),
        );
        item.insert(
            GSI1SK.to_string(),
            AttributeValue::S(keys::item_sk(&content.id)),
        );
    }
    if content.is_public() {
        item.insert(
            GSI2PK.to_string(),
            AttributeValue::S(keys::PUBLIC_VISIBILITY_PK.to_string()),
        );
        item.insert(
            GSI2SK.to_string(),
            AttributeValue::S(keys::public_gsi2_sk(&content.created_at, &content.id)),
        );
    }

    put_s(&mut item, "id", &content.id);
    put_s(&mut item, "ownerId", &content.owner_id);
    put_s(&mut item, "title", &content.title);
    put_opt_s(&mut item, "creatorName", content.creator_name.as_deref());
    put_opt_s(&mut item, "collectionId", content.collection_id.as_deref());
    put_n(&mut item, "durationSecs", content.duration_secs);
    put_s(&mut item, "objectKey", &content.object_key);
    put_s(&mut item, "visibility", content.visibility.as_str());
    put_list(&mut item, "tags", &content.tags);
    put_timestamps(&mut item, &content.created_at, &content.updated_at);

    item
}

/// Convert a DynamoDB item to a ContentItem.
pub fn item_to_content_item(item: &Item) -> Result<ContentItem, RepositoryError> {
    expect_kind(item, EntityKind::ContentItem)?;

    Ok(ContentItem {
        id: get_string(item, "id")?,
        owner_id: get_string(item, "ownerId")?,
        title: get_string(item, "title")?,
        creator_name: get_optional_string(item, "creatorName"),
        collection_id: get_optional_string(item, "collectionId"),
        duration_secs: get_number(item, "durationSecs")?,
        object_key: get_string(item, "objectKey")?,
        visibility: get_parsed::<Visibility>(item, "visibility")?,
        tags: get_list(item, "tags")?,
        created_at: get_datetime(item, "createdAt")?,
        updated_at: get_datetime(item, ATTR_UPDATED_AT)?,
    })
}

impl StoredEntity for ContentItem {
    const KIND: EntityKind = EntityKind::ContentItem;
    const OPTIONAL: &'static [&'static str] = &[
        "creatorName",
        "collectionId",
        GSI1PK,
        GSI1SK,
        GSI2PK,
        GSI2SK,
    ];

    fn key(&self) -> TableKey {
        keys::item_key(&self.owner_id, &self.id)
    }

    fn identity(&self) -> String {
        self.id.clone()
    }

    fn validate(&self) -> Result<(), ValidationError> {
        validate_identifier("owner_id", &self.owner_id)?;
        validate_identifier("item_id", &self.id)?;
        validate_creator(self.creator_name.as_deref())
    }

    fn stamp_created(&mut self, now: DateTime<Utc>) {
        self.created_at = now;
        self.updated_at = now;
    }

    fn stamp_updated(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    fn to_item(&self) -> Item {
        content_item_to_item(self)
    }

    fn from_item(item: &Item) -> Result<Self, RepositoryError> {
        item_to_content_item(item)
    }
}

// ============================================================================
// Collection conversions
// ============================================================================

/// Convert a Collection to DynamoDB item.
pub fn collection_to_item(collection: &Collection) -> Item {
    let mut item = base_item(
        keys::collection_key(&collection.owner_id, &collection.id),
        EntityKind::Collection,
    );

    if let Some(creator) = &collection.creator_name {
        item.insert(
            GSI1PK.to_string(),
            AttributeValue::S(keys::creator_gsi1_pk(&collection.owner_id, creator)),
        );
        item.insert(
            GSI1SK.to_string(),
            AttributeValue::S(keys::collection_sk(&collection.id)),
        );
    }

    put_s(&mut item, "id", &collection.id);
    put_s(&mut item, "ownerId", &collection.owner_id);
    put_s(&mut item, "title", &collection.title);
    put_opt_s(&mut item, "creatorName", collection.creator_name.as_deref());
    if let Some(year) = collection.year {
        put_n(&mut item, "year", year);
    }
    put_n(&mut item, ATTR_ITEM_COUNT, collection.item_count);
    put_n(&mut item, ATTR_TOTAL_DURATION, collection.total_duration_secs);
    put_timestamps(&mut item, &collection.created_at, &collection.updated_at);

    item
}

/// Convert a DynamoDB item to a Collection.
pub fn item_to_collection(item: &Item) -> Result<Collection, RepositoryError> {
    expect_kind(item, EntityKind::Collection)?;

    Ok(Collection {
        id: get_string(item, "id")?,
        owner_id: get_string(item, "ownerId")?,
        title: get_string(item, "title")?,
        creator_name: get_optional_string(item, "creatorName"),
        year: get_optional_number(item, "year")?,
        item_count: get_number(item, ATTR_ITEM_COUNT)?,
        total_duration_secs: get_number(item, ATTR_TOTAL_DURATION)?,
        created_at: get_datetime(item, "createdAt")?,
        updated_at: get_datetime(item, ATTR_UPDATED_AT)?,
    })
}

impl StoredEntity for Collection {
    const KIND: EntityKind = EntityKind::Collection;
    const MANAGED: &'static [&'static str] = &[ATTR_ITEM_COUNT, ATTR_TOTAL_DURATION];
    const OPTIONAL: &'static [&'static str] = &["creatorName", "year", GSI1PK, GSI1SK];

    fn key(&self) -> TableKey {
        keys::collection_key(&self.owner_id, &self.id)
    }

    fn identity(&self) -> String {
        self.id.clone()
    }

    fn validate(&self) -> Result<(), ValidationError> {
        validate_identifier("owner_id", &self.owner_id)?;
        validate_identifier("collection_id", &self.id)?;
        validate_creator(self.creator_name.as_deref())
    }

    fn stamp_created(&mut self, now: DateTime<Utc>) {
        self.created_at = now;
        self.updated_at = now;
    }

    fn stamp_updated(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    fn to_item(&self) -> Item {
        collection_to_item(self)
    }

    fn from_item(item: &Item) -> Result<Self, RepositoryError> {
        item_to_collection(item)
    }
}

// ============================================================================
// Named list and membership conversions
// ============================================================================

/// Convert a NamedList to DynamoDB item.
pub fn named_list_to_item(list: &NamedList) -> Item {
    let mut item = base_item(
        keys::list_key(&list.owner_id, &list.id),
        EntityKind::NamedList,
    );

    put_s(&mut item, "id", &list.id);
    put_s(&mut item, "ownerId", &list.owner_id);
    put_s(&mut item, "name", &list.name);
    put_opt_s(&mut item, "description", list.description.as_deref());
    item.insert("isPublic".to_string(), AttributeValue::Bool(list.is_public));
    put_n(&mut item, ATTR_ITEM_COUNT, list.item_count);
    put_timestamps(&mut item, &list.created_at, &list.updated_at);

    item
}

/// Convert a DynamoDB item to a NamedList.
pub fn item_to_named_list(item: &Item) -> Result<NamedList, RepositoryError> {
    expect_kind(item, EntityKind::NamedList)?;

    Ok(NamedList {
        id: get_string(item, "id")?,
        owner_id: get_string(item, "ownerId")?,
        name: get_string(item, "name")?,
        description: get_optional_string(item, "description"),
        is_public: get_bool(item, "isPublic")?,
        item_count: get_number(item, ATTR_ITEM_COUNT)?,
        created_at: get_datetime(item, "createdAt")?,
        updated_at: get_datetime(item, ATTR_UPDATED_AT)?,
    })
}

impl StoredEntity for NamedList {
    const KIND: EntityKind = EntityKind::NamedList;
    const MANAGED: &'static [&'static str] = &[ATTR_ITEM_COUNT];
    const OPTIONAL: &'static [&'static str] = &["description"];

    fn key(&self) -> TableKey {
        keys::list_key(&self.owner_id, &self.id)
    }

    fn identity(&self) -> String {
        self.id.clone()
    }

    fn validate(&self) -> Result<(), ValidationError> {
        validate_identifier("owner_id", &self.owner_id)?;
        validate_identifier("list_id", &self.id)
    }

    fn stamp_created(&mut self, now: DateTime<Utc>) {
        self.created_at = now;
        self.updated_at = now;
    }

    fn stamp_updated(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    fn to_item(&self) -> Item {
        named_list_to_item(self)
    }

    fn from_item(item: &Item) -> Result<Self, RepositoryError> {
        item_to_named_list(item)
    }
}

/// Convert a ListMembership to DynamoDB item.
pub fn membership_to_item(membership: &ListMembership) -> Item {
    let mut item = base_item(
        keys::membership_key(&membership.list_id, membership.position),
        EntityKind::ListMembership,
    );

    put_s(&mut item, "listId", &membership.list_id);
    put_s(&mut item, ATTR_ITEM_ID, &membership.item_id);
    put_n(&mut item, "position", membership.position);
    put_s(&mut item, "addedAt", &membership.added_at.to_rfc3339());

    item
}

/// Convert a DynamoDB item to a ListMembership.
///
/// The position is taken from the sort key, which is what orders the list.
pub fn item_to_membership(item: &Item) -> Result<ListMembership, RepositoryError> {
    expect_kind(item, EntityKind::ListMembership)?;

    let sk = get_string(item, SK)?;
    let position = keys::parse_position_sk(&sk)
        .ok_or_else(|| RepositoryError::InvalidData(format!("Invalid position key: {sk}")))?;

    Ok(ListMembership {
        list_id: get_string(item, "listId")?,
        item_id: get_string(item, ATTR_ITEM_ID)?,
        position,
        added_at: get_datetime(item, "addedAt")?,
    })
}

impl StoredEntity for ListMembership {
    const KIND: EntityKind = EntityKind::ListMembership;

    fn key(&self) -> TableKey {
        keys::membership_key(&self.list_id, self.position)
    }

    fn identity(&self) -> String {
        format!("{}@{}", self.list_id, self.position)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        validate_identifier("list_id", &self.list_id)?;
        validate_identifier("item_id", &self.item_id)
    }

    fn stamp_created(&mut self, now: DateTime<Utc>) {
        self.added_at = now;
    }

    fn stamp_updated(&mut self, _now: DateTime<Utc>) {}

    fn to_item(&self) -> Item {
        membership_to_item(self)
    }

    fn from_item(item: &Item) -> Result<Self, RepositoryError> {
        item_to_membership(item)
    }
}

// ============================================================================
// Tag and association conversions
// ============================================================================

/// Convert a Tag to DynamoDB item.
pub fn tag_to_item(tag: &Tag) -> Item {
    let mut item = base_item(keys::tag_key(&tag.owner_id, &tag.name), EntityKind::Tag);

    put_s(&mut item, "ownerId", &tag.owner_id);
    put_s(&mut item, "name", &tag.name);
    put_opt_s(&mut item, "color", tag.color.as_deref());
    put_n(&mut item, ATTR_ITEM_COUNT, tag.item_count);
    put_timestamps(&mut item, &tag.created_at, &tag.updated_at);

    item
}

/// Convert a DynamoDB item to a Tag.
pub fn item_to_tag(item: &Item) -> Result<Tag, RepositoryError> {
    expect_kind(item, EntityKind::Tag)?;

    Ok(Tag {
        owner_id: get_string(item, "ownerId")?,
        name: get_string(item, "name")?,
        color: get_optional_string(item, "color"),
        item_count: get_number(item, ATTR_ITEM_COUNT)?,
        created_at: get_datetime(item, "createdAt")?,
        updated_at: get_datetime(item, ATTR_UPDATED_AT)?,
    })
}

impl StoredEntity for Tag {
    const KIND: EntityKind = EntityKind::Tag;
    const MANAGED: &'static [&'static str] = &[ATTR_ITEM_COUNT];
    const OPTIONAL: &'static [&'static str] = &["color"];

    fn key(&self) -> TableKey {
        keys::tag_key(&self.owner_id, &self.name)
    }

    fn identity(&self) -> String {
        self.name.clone()
    }

    fn validate(&self) -> Result<(), ValidationError> {
        validate_identifier("owner_id", &self.owner_id)?;
        validate_tag_name(&self.name).map(|_| ())
    }

    fn stamp_created(&mut self, now: DateTime<Utc>) {
        self.created_at = now;
        self.updated_at = now;
    }

    fn stamp_updated(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    fn to_item(&self) -> Item {
        tag_to_item(self)
    }

    fn from_item(item: &Item) -> Result<Self, RepositoryError> {
        item_to_tag(item)
    }
}

/// Convert an ItemTag association to DynamoDB item.
///
/// The base key groups associations by item; GSI1 groups them by tag.
pub fn item_tag_to_item(association: &ItemTag) -> Item {
    let mut item = base_item(
        keys::item_tag_key(
            &association.owner_id,
            &association.item_id,
            &association.tag_name,
        ),
        EntityKind::ItemTag,
    );

    item.insert(
        GSI1PK.to_string(),
        AttributeValue::S(keys::tag_items_gsi1_pk(
            &association.owner_id,
            &association.tag_name,
        )),
    );
    item.insert(
        GSI1SK.to_string(),
        AttributeValue::S(keys::item_sk(&association.item_id)),
    );

    put_s(&mut item, "ownerId", &association.owner_id);
    put_s(&mut item, ATTR_ITEM_ID, &association.item_id);
    put_s(&mut item, "tagName", &association.tag_name);
    put_s(&mut item, "addedAt", &association.added_at.to_rfc3339());

    item
}

/// Convert a DynamoDB item to an ItemTag association.
pub fn item_to_item_tag(item: &Item) -> Result<ItemTag, RepositoryError> {
    expect_kind(item, EntityKind::ItemTag)?;

    Ok(ItemTag {
        owner_id: get_string(item, "ownerId")?,
        item_id: get_string(item, ATTR_ITEM_ID)?,
        tag_name: get_string(item, "tagName")?,
        added_at: get_datetime(item, "addedAt")?,
    })
}

impl StoredEntity for ItemTag {
    const KIND: EntityKind = EntityKind::ItemTag;

    fn key(&self) -> TableKey {
        keys::item_tag_key(&self.owner_id, &self.item_id, &self.tag_name)
    }

    fn identity(&self) -> String {
        format!("{}/{}", self.item_id, self.tag_name)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        validate_identifier("owner_id", &self.owner_id)?;
        validate_identifier("item_id", &self.item_id)?;
        validate_tag_name(&self.tag_name).map(|_| ())
    }

    fn stamp_created(&mut self, now: DateTime<Utc>) {
        self.added_at = now;
    }

    fn stamp_updated(&mut self, _now: DateTime<Utc>) {}

    fn to_item(&self) -> Item {
        item_tag_to_item(self)
    }

    fn from_item(item: &Item) -> Result<Self, RepositoryError> {
        item_to_item_tag(item)
    }
}

// ============================================================================
// Transfer job conversions
// ============================================================================

/// Convert a TransferJob to DynamoDB item.
pub fn transfer_to_item(job: &TransferJob) -> Item {
    let mut item = base_item(
        keys::transfer_key(&job.owner_id, &job.id),
        EntityKind::TransferJob,
    );

    item.extend(transfer_status_attributes(job));
    put_s(&mut item, "id", &job.id);
    put_s(&mut item, "ownerId", &job.owner_id);
    put_s(&mut item, "fileName", &job.file_name);
    put_s(&mut item, "objectKey", &job.object_key);
    put_timestamps(&mut item, &job.created_at, &job.updated_at);

    item
}

/// Attributes that change with the job status, including the status index keys.
pub fn transfer_status_attributes(job: &TransferJob) -> Item {
    let mut item = Item::new();
    item.insert(
        GSI1PK.to_string(),
        AttributeValue::S(keys::transfer_status_gsi1_pk(job.status)),
    );
    item.insert(
        GSI1SK.to_string(),
        AttributeValue::S(keys::transfer_status_gsi1_sk(&job.updated_at, &job.id)),
    );
    put_s(&mut item, ATTR_STATUS, job.status.as_str());
    put_opt_s(&mut item, ATTR_ERROR_MESSAGE, job.error_message.as_deref());
    put_opt_s(&mut item, ATTR_ITEM_ID, job.item_id.as_deref());
    if let Some(completed_at) = &job.completed_at {
        put_s(&mut item, ATTR_COMPLETED_AT, &completed_at.to_rfc3339());
    }
    item
}

/// Convert a DynamoDB item to a TransferJob.
pub fn item_to_transfer(item: &Item) -> Result<TransferJob, RepositoryError> {
    expect_kind(item, EntityKind::TransferJob)?;

    Ok(TransferJob {
        id: get_string(item, "id")?,
        owner_id: get_string(item, "ownerId")?,
        file_name: get_string(item, "fileName")?,
        object_key: get_string(item, "objectKey")?,
        status: get_parsed::<TransferStatus>(item, ATTR_STATUS)?,
        error_message: get_optional_string(item, ATTR_ERROR_MESSAGE),
        item_id: get_optional_string(item, ATTR_ITEM_ID),
        completed_at: get_optional_datetime(item, ATTR_COMPLETED_AT)?,
        created_at: get_datetime(item, "createdAt")?,
        updated_at: get_datetime(item, ATTR_UPDATED_AT)?,
    })
}

impl StoredEntity for TransferJob {
    const KIND: EntityKind = EntityKind::TransferJob;
    const MANAGED: &'static [&'static str] = &[
        ATTR_STATUS,
        ATTR_ERROR_MESSAGE,
        ATTR_ITEM_ID,
        ATTR_COMPLETED_AT,
        GSI1PK,
    ];

    fn key(&self) -> TableKey {
        keys::transfer_key(&self.owner_id, &self.id)
    }

    fn identity(&self) -> String {
        self.id.clone()
    }

    fn validate(&self) -> Result<(), ValidationError> {
        validate_identifier("owner_id", &self.owner_id)?;
        validate_identifier("job_id", &self.id)
    }

    fn stamp_created(&mut self, now: DateTime<Utc>) {
        self.created_at = now;
        self.updated_at = now;
    }

    fn stamp_updated(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    fn to_item(&self) -> Item {
        transfer_to_item(self)
    }

    fn from_item(item: &Item) -> Result<Self, RepositoryError> {
        item_to_transfer(item)
    }
}

// ============================================================================
// Creator profile and follow conversions
// ============================================================================

/// Convert a CreatorProfile to DynamoDB item.
pub fn creator_to_item(profile: &CreatorProfile) -> Item {
    let mut item = base_item(
        keys::creator_key(&profile.account_id),
        EntityKind::CreatorProfile,
    );

    item.insert(
        GSI1PK.to_string(),
        AttributeValue::S(keys::CREATOR_DISCOVERY_PK.to_string()),
    );
    item.insert(
        GSI1SK.to_string(),
        AttributeValue::S(keys::account_pk(&profile.account_id)),
    );

    put_s(&mut item, "accountId", &profile.account_id);
    put_s(&mut item, "displayName", &profile.display_name);
    put_opt_s(&mut item, "bio", profile.bio.as_deref());
    put_list(&mut item, "genres", &profile.genres);
    put_n(&mut item, ATTR_FOLLOWER_COUNT, profile.follower_count);
    item.insert("verified".to_string(), AttributeValue::Bool(profile.verified));
    put_timestamps(&mut item, &profile.created_at, &profile.updated_at);

    item
}

/// Convert a DynamoDB item to a CreatorProfile.
pub fn item_to_creator(item: &Item) -> Result<CreatorProfile, RepositoryError> {
    expect_kind(item, EntityKind::CreatorProfile)?;

    Ok(CreatorProfile {
        account_id: get_string(item, "accountId")?,
        display_name: get_string(item, "displayName")?,
        bio: get_optional_string(item, "bio"),
        genres: get_list(item, "genres")?,
        follower_count: get_number(item, ATTR_FOLLOWER_COUNT)?,
        verified: get_bool(item, "verified")?,
        created_at: get_datetime(item, "createdAt")?,
        updated_at: get_datetime(item, ATTR_UPDATED_AT)?,
    })
}

impl StoredEntity for CreatorProfile {
    const KIND: EntityKind = EntityKind::CreatorProfile;
    const MANAGED: &'static [&'static str] = &[ATTR_FOLLOWER_COUNT];
    const OPTIONAL: &'static [&'static str] = &["bio"];

    fn key(&self) -> TableKey {
        keys::creator_key(&self.account_id)
    }

    fn identity(&self) -> String {
        self.account_id.clone()
    }

    fn validate(&self) -> Result<(), ValidationError> {
        validate_identifier("account_id", &self.account_id)
    }

    fn stamp_created(&mut self, now: DateTime<Utc>) {
        self.created_at = now;
        self.updated_at = now;
    }

    fn stamp_updated(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    fn to_item(&self) -> Item {
        creator_to_item(self)
    }

    fn from_item(item: &Item) -> Result<Self, RepositoryError> {
        item_to_creator(item)
    }
}

/// Convert a FollowEdge to DynamoDB item.
///
/// The base key lists who an account follows; GSI1 lists its followers.
pub fn follow_to_item(edge: &FollowEdge) -> Item {
    let mut item = base_item(
        keys::follow_key(&edge.follower_id, &edge.followed_id),
        EntityKind::FollowEdge,
    );

    item.insert(
        GSI1PK.to_string(),
        AttributeValue::S(keys::followers_gsi1_pk(&edge.followed_id)),
    );
    item.insert(
        GSI1SK.to_string(),
        AttributeValue::S(keys::account_pk(&edge.follower_id)),
    );

    put_s(&mut item, "followerId", &edge.follower_id);
    put_s(&mut item, "followedId", &edge.followed_id);
    put_s(&mut item, "createdAt", &edge.created_at.to_rfc3339());

    item
}

/// Convert a DynamoDB item to a FollowEdge.
pub fn item_to_follow(item: &Item) -> Result<FollowEdge, RepositoryError> {
    expect_kind(item, EntityKind::FollowEdge)?;

    Ok(FollowEdge {
        follower_id: get_string(item, "followerId")?,
        followed_id: get_string(item, "followedId")?,
        created_at: get_datetime(item, "createdAt")?,
    })
}

impl StoredEntity for FollowEdge {
    const KIND: EntityKind = EntityKind::FollowEdge;

    fn key(&self) -> TableKey {
        keys::follow_key(&self.follower_id, &self.followed_id)
    }

    fn identity(&self) -> String {
        format!("{}->{}", self.follower_id, self.followed_id)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        trackvault_core::library::validate_follow(&self.follower_id, &self.followed_id)
    }

    fn stamp_created(&mut self, now: DateTime<Utc>) {
        self.created_at = now;
    }

    fn stamp_updated(&mut self, _now: DateTime<Utc>) {}

    fn to_item(&self) -> Item {
        follow_to_item(self)
    }

    fn from_item(item: &Item) -> Result<Self, RepositoryError> {
        item_to_follow(item)
    }
}

// ============================================================================
// Helper functions
// ============================================================================

fn base_item(key: TableKey, kind: EntityKind) -> Item {
    let mut item = Item::new();
    item.insert(PK.to_string(), AttributeValue::S(key.pk));
    item.insert(SK.to_string(), AttributeValue::S(key.sk));
    item.insert(
        ENTITY_TYPE.to_string(),
        AttributeValue::S(kind.as_str().to_string()),
    );
    item
}

/// Reads the discriminator of a stored item.
pub fn entity_kind_of(item: &Item) -> Result<EntityKind, RepositoryError> {
    get_parsed::<EntityKind>(item, ENTITY_TYPE)
}

fn expect_kind(item: &Item, expected: EntityKind) -> Result<(), RepositoryError> {
    let kind = entity_kind_of(item)?;
    if kind != expected {
        return Err(RepositoryError::InvalidData(format!(
            "Expected {} item, found {}",
            expected, kind
        )));
    }
    Ok(())
}

fn put_s(item: &mut Item, key: &str, value: &str) {
    item.insert(key.to_string(), AttributeValue::S(value.to_string()));
}

fn put_opt_s(item: &mut Item, key: &str, value: Option<&str>) {
    if let Some(value) = value {
        put_s(item, key, value);
    }
}

fn put_n(item: &mut Item, key: &str, value: impl ToString) {
    item.insert(key.to_string(), AttributeValue::N(value.to_string()));
}

fn put_list(item: &mut Item, key: &str, values: &[String]) {
    item.insert(
        key.to_string(),
        AttributeValue::L(values.iter().cloned().map(AttributeValue::S).collect()),
    );
}

fn put_timestamps(item: &mut Item, created_at: &DateTime<Utc>, updated_at: &DateTime<Utc>) {
    put_s(item, "createdAt", &created_at.to_rfc3339());
    put_s(item, ATTR_UPDATED_AT, &updated_at.to_rfc3339());
}

fn get_string(item: &Item, key: &str) -> Result<String, RepositoryError> {
    item.get(key)
        .and_then(|v| v.as_s().ok())
        .map(|s| s.to_string())
        .ok_or_else(|| RepositoryError::InvalidData(format!("Missing or invalid field: {}", key)))
}

fn get_optional_string(item: &Item, key: &str) -> Option<String> {
    item.get(key)
        .and_then(|v| v.as_s().ok())
        .map(|s| s.to_string())
}

fn get_parsed<T: FromStr>(item: &Item, key: &str) -> Result<T, RepositoryError> {
    let s = get_string(item, key)?;
    s.parse()
        .map_err(|_| RepositoryError::InvalidData(format!("Invalid {}: {}", key, s)))
}

/// Reads a number attribute.
pub fn get_number<T: FromStr>(item: &Item, key: &str) -> Result<T, RepositoryError> {
    item.get(key)
        .and_then(|v| v.as_n().ok())
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| RepositoryError::InvalidData(format!("Missing or invalid field: {}", key)))
}

fn get_optional_number<T: FromStr>(item: &Item, key: &str) -> Result<Option<T>, RepositoryError> {
    match item.get(key) {
        None | Some(AttributeValue::Null(_)) => Ok(None),
        Some(_) => get_number(item, key).map(Some),
    }
}

fn get_bool(item: &Item, key: &str) -> Result<bool, RepositoryError> {
    item.get(key)
        .and_then(|v| v.as_bool().ok())
        .copied()
        .ok_or_else(|| RepositoryError::InvalidData(format!("Missing or invalid field: {}", key)))
}

fn get_list(item: &Item, key: &str) -> Result<Vec<String>, RepositoryError> {
    match item.get(key) {
        None => Ok(Vec::new()),
        Some(AttributeValue::L(values)) => values
            .iter()
            .map(|v| {
                v.as_s().map(|s| s.to_string()).map_err(|_| {
                    RepositoryError::InvalidData(format!("Invalid list element in {}", key))
                })
            })
            .collect(),
        Some(AttributeValue::Ss(values)) => Ok(values.clone()),
        Some(_) => Err(RepositoryError::InvalidData(format!(
            "Missing or invalid field: {}",
            key
        ))),
    }
}

fn get_datetime(item: &Item, key: &str) -> Result<DateTime<Utc>, RepositoryError> {
    let s = get_string(item, key)?;
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::InvalidData(format!("Invalid datetime {}: {}", key, e)))
}

fn get_optional_datetime(item: &Item, key: &str) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    if item.contains_key(key) {
        get_datetime(item, key).map(Some)
    } else {
        Ok(None)
    }
}
