use async_trait::async_trait;
use trackvault_core::library::{validate_identifier, CreatorProfile, EntityKind};
use trackvault_core::storage::{CreatorRepository, DeleteMode, ListOptions, Page, Result};

use super::super::keys;
use super::super::store::{Index, ItemStore};
use super::{DynamoDbRepository, Listing};

#[async_trait]
impl<S: ItemStore> CreatorRepository for DynamoDbRepository<S> {
    async fn create_creator(&self, profile: &CreatorProfile) -> Result<CreatorProfile> {
        self.put_new(profile).await
    }

    async fn get_creator(&self, account_id: &str) -> Result<CreatorProfile> {
        validate_identifier("account_id", account_id)?;
        self.fetch(&keys::creator_key(account_id), account_id)
            .await
    }

    async fn update_creator(&self, profile: &CreatorProfile) -> Result<CreatorProfile> {
        self.overwrite(profile).await
    }

    async fn delete_creator(&self, account_id: &str, mode: DeleteMode) -> Result<()> {
        validate_identifier("account_id", account_id)?;
        self.remove(
            &keys::creator_key(account_id),
            EntityKind::CreatorProfile,
            account_id,
            mode,
        )
        .await
    }

    async fn list_creators(&self, options: &ListOptions) -> Result<Page<CreatorProfile>> {
        let listing = Listing::index(Index::Gsi1, keys::CREATOR_DISCOVERY_PK)
            .with_prefix(keys::ACCOUNT_PREFIX);
        self.query_page(&listing, options).await
    }
}
