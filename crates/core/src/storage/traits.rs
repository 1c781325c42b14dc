use async_trait::async_trait;

use crate::library::{
    Account, Collection, ContentItem, CreatorProfile, FollowEdge, GlobalAccess, ItemTag,
    ListMembership, NamedList, Role, Tag, TransferJob, TransferOutcome, TransferStatus,
};

use super::{CounterTarget, DeleteMode, ListOptions, Page, Result};

/// Repository for account profiles and their privileged attributes.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Creates an account. Fails with `AlreadyExists` if the id is taken.
    async fn create_account(&self, account: &Account) -> Result<Account>;

    /// Gets an account by its ID.
    async fn get_account(&self, id: &str) -> Result<Account>;

    /// Gets an account by its email address (case-insensitive).
    async fn get_account_by_email(&self, email: &str) -> Result<Account>;

    /// Overwrites an existing account.
    async fn update_account(&self, account: &Account) -> Result<Account>;

    async fn delete_account(&self, id: &str, mode: DeleteMode) -> Result<()>;

    /// Sets the account role with a targeted update.
    ///
    /// With `expected`, the write only lands if the stored role still equals
    /// it; otherwise it fails with `Conflict`.
    async fn set_role(&self, id: &str, role: Role, expected: Option<Role>) -> Result<Account>;

    /// Sets the disabled flag, with the same `expected` semantics as [`set_role`].
    ///
    /// [`set_role`]: AccountRepository::set_role
    async fn set_disabled(&self, id: &str, disabled: bool, expected: Option<bool>)
        -> Result<Account>;

    /// Lists every account with a full scan.
    async fn scan_accounts(&self, access: GlobalAccess, options: &ListOptions)
        -> Result<Page<Account>>;
}

/// Repository for content items.
#[async_trait]
pub trait ContentRepository: Send + Sync {
    async fn create_item(&self, item: &ContentItem) -> Result<ContentItem>;

    async fn get_item(&self, owner_id: &str, item_id: &str) -> Result<ContentItem>;

    async fn update_item(&self, item: &ContentItem) -> Result<ContentItem>;

    async fn delete_item(&self, owner_id: &str, item_id: &str, mode: DeleteMode) -> Result<()>;

    /// Lists an owner's items, optionally only those credited to `creator`.
    async fn list_items(
        &self,
        owner_id: &str,
        creator: Option<&str>,
        options: &ListOptions,
    ) -> Result<Page<ContentItem>>;

    /// Lists public items across all owners, in creation order.
    async fn list_public_items(&self, options: &ListOptions) -> Result<Page<ContentItem>>;

    /// Lists every content item with a full scan.
    async fn scan_items(
        &self,
        access: GlobalAccess,
        options: &ListOptions,
    ) -> Result<Page<ContentItem>>;
}

/// Repository for collections.
#[async_trait]
pub trait CollectionRepository: Send + Sync {
    async fn create_collection(&self, collection: &Collection) -> Result<Collection>;

    async fn get_collection(&self, owner_id: &str, collection_id: &str) -> Result<Collection>;

    async fn update_collection(&self, collection: &Collection) -> Result<Collection>;

    async fn delete_collection(
        &self,
        owner_id: &str,
        collection_id: &str,
        mode: DeleteMode,
    ) -> Result<()>;

    async fn list_collections(
        &self,
        owner_id: &str,
        creator: Option<&str>,
        options: &ListOptions,
    ) -> Result<Page<Collection>>;

    /// Returns the collection identified by (owner, title, creator), creating
    /// it if needed. Safe to race: the loser fetches the winner's item.
    async fn get_or_create_collection(
        &self,
        owner_id: &str,
        title: &str,
        creator: Option<&str>,
    ) -> Result<Collection>;
}

/// Repository for named lists and their ordered membership.
#[async_trait]
pub trait ListRepository: Send + Sync {
    async fn create_list(&self, list: &NamedList) -> Result<NamedList>;

    async fn get_list(&self, owner_id: &str, list_id: &str) -> Result<NamedList>;

    async fn update_list(&self, list: &NamedList) -> Result<NamedList>;

    /// Deletes a list after deleting all of its memberships.
    async fn delete_list(&self, owner_id: &str, list_id: &str, mode: DeleteMode) -> Result<()>;

    async fn list_lists(&self, owner_id: &str, options: &ListOptions) -> Result<Page<NamedList>>;

    /// Appends items after the current last position.
    ///
    /// Fails with `Conflict` when a concurrent append claims one of the
    /// positions first; nothing from this call is left behind.
    async fn append_to_list(
        &self,
        list_id: &str,
        item_ids: &[String],
    ) -> Result<Vec<ListMembership>>;

    /// Lists memberships in position order.
    async fn list_memberships(
        &self,
        list_id: &str,
        options: &ListOptions,
    ) -> Result<Page<ListMembership>>;

    /// Removes every membership pointing at one of `item_ids`. Returns how
    /// many memberships were removed.
    async fn remove_from_list(&self, list_id: &str, item_ids: &[String]) -> Result<usize>;

    async fn remove_at_position(
        &self,
        list_id: &str,
        position: u32,
        mode: DeleteMode,
    ) -> Result<()>;

    /// Reorders the list to follow `item_ids`.
    ///
    /// Only memberships whose position changes are rewritten. Ids that are
    /// not members are ignored; members missing from `item_ids` keep their
    /// relative order after the listed ones.
    async fn reorder_list(&self, list_id: &str, item_ids: &[String])
        -> Result<Vec<ListMembership>>;
}

/// Repository for tags and item-tag associations.
#[async_trait]
pub trait TagRepository: Send + Sync {
    async fn create_tag(&self, tag: &Tag) -> Result<Tag>;

    /// Gets a tag; `name` is matched case-insensitively.
    async fn get_tag(&self, owner_id: &str, name: &str) -> Result<Tag>;

    async fn update_tag(&self, tag: &Tag) -> Result<Tag>;

    /// Deletes a tag after deleting all of its item associations.
    async fn delete_tag(&self, owner_id: &str, name: &str, mode: DeleteMode) -> Result<()>;

    async fn list_tags(&self, owner_id: &str, options: &ListOptions) -> Result<Page<Tag>>;

    /// Associates tags with an item. Names are normalized and de-duplicated;
    /// returns the normalized names written.
    async fn add_tags_to_item(
        &self,
        owner_id: &str,
        item_id: &str,
        tags: &[String],
    ) -> Result<Vec<String>>;

    async fn remove_tag_from_item(
        &self,
        owner_id: &str,
        item_id: &str,
        tag: &str,
        mode: DeleteMode,
    ) -> Result<()>;

    async fn list_item_tags(&self, owner_id: &str, item_id: &str) -> Result<Vec<ItemTag>>;

    async fn list_items_for_tag(
        &self,
        owner_id: &str,
        tag: &str,
        options: &ListOptions,
    ) -> Result<Page<ItemTag>>;

    /// Resolves a page of associations for `tag` into content items,
    /// skipping associations whose item no longer exists.
    async fn resolve_items_for_tag(
        &self,
        owner_id: &str,
        tag: &str,
        options: &ListOptions,
    ) -> Result<Page<ContentItem>>;
}

/// Repository for transfer jobs.
#[async_trait]
pub trait TransferRepository: Send + Sync {
    async fn create_transfer(&self, job: &TransferJob) -> Result<TransferJob>;

    async fn get_transfer(&self, owner_id: &str, job_id: &str) -> Result<TransferJob>;

    async fn update_transfer(&self, job: &TransferJob) -> Result<TransferJob>;

    async fn delete_transfer(&self, owner_id: &str, job_id: &str, mode: DeleteMode)
        -> Result<()>;

    /// Lists an owner's jobs. Job ids are time-ordered, so `Descending`
    /// lists newest first.
    async fn list_transfers(&self, owner_id: &str, options: &ListOptions)
        -> Result<Page<TransferJob>>;

    /// Lists jobs in `status` across all owners, least recently updated first.
    async fn list_transfers_by_status(
        &self,
        status: TransferStatus,
        options: &ListOptions,
    ) -> Result<Page<TransferJob>>;

    /// Moves a job from `from` to `to`.
    ///
    /// Rejects transitions the state machine forbids with `InvalidInput`;
    /// fails with `Conflict` if the stored status is no longer `from`.
    async fn transition_transfer(
        &self,
        owner_id: &str,
        job_id: &str,
        from: TransferStatus,
        to: TransferStatus,
        outcome: TransferOutcome,
    ) -> Result<TransferJob>;
}

/// Repository for creator profiles.
#[async_trait]
pub trait CreatorRepository: Send + Sync {
    async fn create_creator(&self, profile: &CreatorProfile) -> Result<CreatorProfile>;

    async fn get_creator(&self, account_id: &str) -> Result<CreatorProfile>;

    async fn update_creator(&self, profile: &CreatorProfile) -> Result<CreatorProfile>;

    async fn delete_creator(&self, account_id: &str, mode: DeleteMode) -> Result<()>;

    /// Lists all creator profiles through the discovery index.
    async fn list_creators(&self, options: &ListOptions) -> Result<Page<CreatorProfile>>;
}

/// Repository for follow edges.
#[async_trait]
pub trait FollowRepository: Send + Sync {
    /// Creates an edge. Self-follows are rejected with `InvalidInput`.
    async fn create_follow(&self, edge: &FollowEdge) -> Result<FollowEdge>;

    async fn get_follow(&self, follower_id: &str, followed_id: &str) -> Result<FollowEdge>;

    async fn delete_follow(
        &self,
        follower_id: &str,
        followed_id: &str,
        mode: DeleteMode,
    ) -> Result<()>;

    async fn list_followers(&self, followed_id: &str, options: &ListOptions)
        -> Result<Page<FollowEdge>>;

    async fn list_following(&self, follower_id: &str, options: &ListOptions)
        -> Result<Page<FollowEdge>>;
}

/// Maintains denormalized counters with atomic adds.
#[async_trait]
pub trait CounterRepository: Send + Sync {
    /// Adds `delta` to the counter and returns its new value.
    ///
    /// Fails with `NotFound` if the parent item no longer exists.
    async fn increment(&self, target: &CounterTarget, delta: i64) -> Result<i64>;
}
