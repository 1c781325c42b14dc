use async_trait::async_trait;
use trackvault_core::library::{validate_identifier, ContentItem, EntityKind, GlobalAccess};
use trackvault_core::storage::{ContentRepository, DeleteMode, ListOptions, Page, Result};

use super::super::keys;
use super::super::store::{Index, ItemStore};
use super::{DynamoDbRepository, Listing};

#[async_trait]
impl<S: ItemStore> ContentRepository for DynamoDbRepository<S> {
    async fn create_item(&self, item: &ContentItem) -> Result<ContentItem> {
        self.put_new(item).await
    }

    async fn get_item(&self, owner_id: &str, item_id: &str) -> Result<ContentItem> {
        validate_identifier("owner_id", owner_id)?;
        validate_identifier("item_id", item_id)?;
        self.fetch(&keys::item_key(owner_id, item_id), item_id)
            .await
    }

    async fn update_item(&self, item: &ContentItem) -> Result<ContentItem> {
        self.overwrite(item).await
    }

    async fn delete_item(&self, owner_id: &str, item_id: &str, mode: DeleteMode) -> Result<()> {
        validate_identifier("owner_id", owner_id)?;
        validate_identifier("item_id", item_id)?;
        self.remove(
            &keys::item_key(owner_id, item_id),
            EntityKind::ContentItem,
            item_id,
            mode,
        )
        .await
    }

    async fn list_items(
        &self,
        owner_id: &str,
        creator: Option<&str>,
        options: &ListOptions,
    ) -> Result<Page<ContentItem>> {
        validate_identifier("owner_id", owner_id)?;
        let listing = match creator {
            Some(creator) => {
                validate_identifier("creator", creator.trim())?;
                Listing::index(Index::Gsi1, keys::creator_gsi1_pk(owner_id, creator))
            }
            None => Listing::table(keys::account_pk(owner_id)),
        };
        self.query_page(&listing.with_prefix(keys::ITEM_PREFIX), options)
            .await
    }

    async fn list_public_items(&self, options: &ListOptions) -> Result<Page<ContentItem>> {
        let listing = Listing::index(Index::Gsi2, keys::PUBLIC_VISIBILITY_PK)
            .with_prefix(keys::CREATED_PREFIX);
        self.query_page(&listing, options).await
    }

    async fn scan_items(
        &self,
        _access: GlobalAccess,
        options: &ListOptions,
    ) -> Result<Page<ContentItem>> {
        self.scan_page(keys::ITEM_PREFIX, options).await
    }
}
