use async_trait::async_trait;
use trackvault_core::library::{collection_id_for, validate_identifier, Collection, EntityKind};
use trackvault_core::storage::{
    CollectionRepository, DeleteMode, ListOptions, Page, RepositoryError, Result,
};

use super::super::keys;
use super::super::store::{Index, ItemStore};
use super::{DynamoDbRepository, Listing};

#[async_trait]
impl<S: ItemStore> CollectionRepository for DynamoDbRepository<S> {
    async fn create_collection(&self, collection: &Collection) -> Result<Collection> {
        self.put_new(collection).await
    }

    async fn get_collection(&self, owner_id: &str, collection_id: &str) -> Result<Collection> {
        validate_identifier("owner_id", owner_id)?;
        validate_identifier("collection_id", collection_id)?;
        self.fetch(&keys::collection_key(owner_id, collection_id), collection_id)
            .await
    }

    async fn update_collection(&self, collection: &Collection) -> Result<Collection> {
        self.overwrite(collection).await
    }

    async fn delete_collection(
        &self,
        owner_id: &str,
        collection_id: &str,
        mode: DeleteMode,
    ) -> Result<()> {
        validate_identifier("owner_id", owner_id)?;
        validate_identifier("collection_id", collection_id)?;
        self.remove(
            &keys::collection_key(owner_id, collection_id),
            EntityKind::Collection,
            collection_id,
            mode,
        )
        .await
    }

    async fn list_collections(
        &self,
        owner_id: &str,
        creator: Option<&str>,
        options: &ListOptions,
    ) -> Result<Page<Collection>> {
        validate_identifier("owner_id", owner_id)?;
        let listing = match creator {
            Some(creator) => {
                validate_identifier("creator", creator.trim())?;
                Listing::index(Index::Gsi1, keys::creator_gsi1_pk(owner_id, creator))
            }
            None => Listing::table(keys::account_pk(owner_id)),
        };
        self.query_page(&listing.with_prefix(keys::COLLECTION_PREFIX), options)
            .await
    }

    async fn get_or_create_collection(
        &self,
        owner_id: &str,
        title: &str,
        creator: Option<&str>,
    ) -> Result<Collection> {
        validate_identifier("owner_id", owner_id)?;
        if title.trim().is_empty() {
            return Err(RepositoryError::InvalidInput(
                "collection title cannot be empty".to_string(),
            ));
        }

        let id = collection_id_for(owner_id, title, creator);
        let mut collection = Collection::new(owner_id, title.trim()).with_id(id.as_str());
        if let Some(creator) = creator.map(str::trim).filter(|c| !c.is_empty()) {
            collection = collection.with_creator(creator);
        }

        match self.put_new(&collection).await {
            Err(RepositoryError::AlreadyExists { .. }) => {
                tracing::debug!(owner_id = %owner_id, collection_id = %id, "Collection exists, fetching");
                self.get_collection(owner_id, &id).await
            }
            result => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::storage::inmemory::InMemoryStore;
    use trackvault_core::library::ContentItem;
    use trackvault_core::storage::ContentRepository;

    fn repo() -> DynamoDbRepository<InMemoryStore> {
        DynamoDbRepository::new(InMemoryStore::new())
    }

    #[tokio::test]
    async fn test_collection_crud() {
        let repo = repo();
        let created = repo
            .create_collection(&Collection::new("acc-1", "Blue Train").with_id("c1"))
            .await
            .unwrap();
        assert_eq!(created.item_count, 0);

        let mut changed = created.clone();
        changed.year = Some(1958);
        let updated = repo.update_collection(&changed).await.unwrap();
        assert_eq!(updated.year, Some(1958));
        assert_eq!(repo.get_collection("acc-1", "c1").await.unwrap(), updated);

        repo.delete_collection("acc-1", "c1", DeleteMode::MustExist)
            .await
            .unwrap();
        repo.delete_collection("acc-1", "c1", DeleteMode::Idempotent)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_list_collections_by_creator() {
        let repo = repo();
        repo.create_collection(&Collection::new("acc-1", "Kind of Blue").with_creator("Miles Davis"))
            .await
            .unwrap();
        repo.create_collection(&Collection::new("acc-1", "A Love Supreme").with_creator("John Coltrane"))
            .await
            .unwrap();
        repo.create_item(
            &ContentItem::new("acc-1", "So What", "uploads/so-what.flac").with_creator("Miles Davis"),
        )
        .await
        .unwrap();

        let page = repo
            .list_collections("acc-1", Some("MILES DAVIS"), &ListOptions::new())
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].title, "Kind of Blue");

        let all = repo
            .list_collections("acc-1", None, &ListOptions::new())
            .await
            .unwrap();
        assert_eq!(all.items.len(), 2);
    }

    #[tokio::test]
    async fn test_get_or_create_is_stable() {
        let repo = repo();
        let first = repo
            .get_or_create_collection("acc-1", "Giant Steps", Some("John Coltrane"))
            .await
            .unwrap();
        let second = repo
            .get_or_create_collection("acc-1", "giant steps ", Some("john coltrane"))
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(first.creator_name.as_deref(), Some("John Coltrane"));
    }

    #[tokio::test]
    async fn test_concurrent_get_or_create_yields_one_collection() {
        let repo = Arc::new(repo());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let repo = Arc::clone(&repo);
                tokio::spawn(async move {
                    repo.get_or_create_collection("acc-1", "Mingus Ah Um", None)
                        .await
                })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap().id);
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);

        let page = repo
            .list_collections("acc-1", None, &ListOptions::new())
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
    }

    #[tokio::test]
    async fn test_get_or_create_rejects_blank_title() {
        let err = repo()
            .get_or_create_collection("acc-1", "  ", None)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidInput(_)));
    }
}
