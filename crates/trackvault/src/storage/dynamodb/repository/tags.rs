use async_trait::async_trait;
use chrono::Utc;
use futures_util::future::join_all;
use trackvault_core::library::{
    normalize_tag_names, validate_identifier, validate_tag_name, ContentItem, EntityKind, ItemTag,
    Tag,
};
use trackvault_core::storage::{
    ContentRepository, DeleteMode, ListOptions, Page, RepositoryError, Result, SortOrder,
    TagRepository,
};

use super::super::conversions::StoredEntity;
use super::super::keys;
use super::super::store::{Index, ItemStore, TableKey, WriteRequest};
use super::{DynamoDbRepository, Listing};

fn tag_items(owner_id: &str, tag_name: &str) -> Listing {
    Listing::index(Index::Gsi1, keys::tag_items_gsi1_pk(owner_id, tag_name))
        .with_prefix(keys::ITEM_PREFIX)
}

/// A copy of `tag` carrying its normalized name.
fn normalized(tag: &Tag) -> Result<Tag> {
    let mut tag = tag.clone();
    tag.name = validate_tag_name(&tag.name)?;
    Ok(tag)
}

#[async_trait]
impl<S: ItemStore> TagRepository for DynamoDbRepository<S> {
    async fn create_tag(&self, tag: &Tag) -> Result<Tag> {
        self.put_new(&normalized(tag)?).await
    }

    async fn get_tag(&self, owner_id: &str, name: &str) -> Result<Tag> {
        validate_identifier("owner_id", owner_id)?;
        let name = validate_tag_name(name)?;
        self.fetch(&keys::tag_key(owner_id, &name), &name).await
    }

    async fn update_tag(&self, tag: &Tag) -> Result<Tag> {
        self.overwrite(&normalized(tag)?).await
    }

    async fn delete_tag(&self, owner_id: &str, name: &str, mode: DeleteMode) -> Result<()> {
        validate_identifier("owner_id", owner_id)?;
        let name = validate_tag_name(name)?;
        if mode == DeleteMode::MustExist {
            self.get_tag(owner_id, &name).await?;
        }

        let associations: Vec<WriteRequest> = self
            .query_all(tag_items(owner_id, &name).request(SortOrder::Ascending))
            .await?
            .iter()
            .filter_map(TableKey::from_item)
            .map(WriteRequest::Delete)
            .collect();
        let removed = associations.len();
        self.batch_write_all(associations).await?;
        tracing::debug!(owner_id = %owner_id, tag = %name, removed, "Tag associations deleted");

        self.remove(&keys::tag_key(owner_id, &name), EntityKind::Tag, &name, mode)
            .await
    }

    async fn list_tags(&self, owner_id: &str, options: &ListOptions) -> Result<Page<Tag>> {
        validate_identifier("owner_id", owner_id)?;
        let listing = Listing::table(keys::account_pk(owner_id)).with_prefix(keys::TAG_PREFIX);
        self.query_page(&listing, options).await
    }

    async fn add_tags_to_item(
        &self,
        owner_id: &str,
        item_id: &str,
        tags: &[String],
    ) -> Result<Vec<String>> {
        validate_identifier("owner_id", owner_id)?;
        validate_identifier("item_id", item_id)?;
        let names = normalize_tag_names(tags);
        for name in &names {
            validate_tag_name(name)?;
        }

        let added_at = Utc::now();
        let writes = names
            .iter()
            .map(|name| {
                let association = ItemTag {
                    owner_id: owner_id.to_string(),
                    item_id: item_id.to_string(),
                    tag_name: name.clone(),
                    added_at,
                };
                WriteRequest::Put(association.to_item())
            })
            .collect();
        self.batch_write_all(writes).await?;

        Ok(names)
    }

    async fn remove_tag_from_item(
        &self,
        owner_id: &str,
        item_id: &str,
        tag: &str,
        mode: DeleteMode,
    ) -> Result<()> {
        validate_identifier("owner_id", owner_id)?;
        validate_identifier("item_id", item_id)?;
        let tag = validate_tag_name(tag)?;
        self.remove(
            &keys::item_tag_key(owner_id, item_id, &tag),
            EntityKind::ItemTag,
            &format!("{item_id}/{tag}"),
            mode,
        )
        .await
    }

    async fn list_item_tags(&self, owner_id: &str, item_id: &str) -> Result<Vec<ItemTag>> {
        validate_identifier("owner_id", owner_id)?;
        validate_identifier("item_id", item_id)?;
        let listing =
            Listing::table(keys::item_tags_pk(owner_id, item_id)).with_prefix(keys::TAG_PREFIX);
        self.query_all(listing.request(SortOrder::Ascending))
            .await?
            .iter()
            .map(ItemTag::from_item)
            .collect()
    }

    async fn list_items_for_tag(
        &self,
        owner_id: &str,
        tag: &str,
        options: &ListOptions,
    ) -> Result<Page<ItemTag>> {
        validate_identifier("owner_id", owner_id)?;
        let tag = validate_tag_name(tag)?;
        self.query_page(&tag_items(owner_id, &tag), options).await
    }

    async fn resolve_items_for_tag(
        &self,
        owner_id: &str,
        tag: &str,
        options: &ListOptions,
    ) -> Result<Page<ContentItem>> {
        let associations = self.list_items_for_tag(owner_id, tag, options).await?;

        // Fetch concurrently; join_all keeps association order.
        let fetched = join_all(
            associations
                .items
                .iter()
                .map(|association| ContentRepository::get_item(self, owner_id, &association.item_id)),
        )
        .await;

        let mut items = Vec::with_capacity(fetched.len());
        for (association, result) in associations.items.iter().zip(fetched) {
            match result {
                Ok(item) => items.push(item),
                Err(RepositoryError::NotFound { .. }) => {
                    tracing::debug!(item_id = %association.item_id, "Skipping association to deleted item");
                }
                Err(err) => return Err(err),
            }
        }

        Ok(Page::new(items, associations.next_cursor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::inmemory::InMemoryStore;

    fn repo() -> DynamoDbRepository<InMemoryStore> {
        DynamoDbRepository::new(InMemoryStore::new())
    }

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn test_tag_lookup_is_case_insensitive() {
        let repo = repo();
        repo.create_tag(&Tag::new("acc-1", "Rock")).await.unwrap();

        assert_eq!(repo.get_tag("acc-1", "ROCK").await.unwrap().name, "rock");
        assert_eq!(repo.get_tag("acc-1", " rock ").await.unwrap().name, "rock");
    }

    #[tokio::test]
    async fn test_create_tag_normalizes_the_stored_name() {
        let repo = repo();
        let mut tag = Tag::new("acc-1", "jazz");
        tag.name = "  Jazz ".to_string();

        let created = repo.create_tag(&tag).await.unwrap();
        assert_eq!(created.name, "jazz");

        let err = repo.create_tag(&Tag::new("acc-1", "JAZZ")).await.unwrap_err();
        assert!(matches!(err, RepositoryError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_tag_name_with_separator_is_rejected() {
        let err = repo()
            .create_tag(&Tag::new("acc-1", "a#b"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_add_tags_normalizes_and_dedupes() {
        let repo = repo();
        let added = repo
            .add_tags_to_item("acc-1", "t1", &names(&["Rock", "rock ", "Live"]))
            .await
            .unwrap();
        assert_eq!(added, names(&["rock", "live"]));

        let tags: Vec<String> = repo
            .list_item_tags("acc-1", "t1")
            .await
            .unwrap()
            .into_iter()
            .map(|association| association.tag_name)
            .collect();
        assert_eq!(tags, names(&["live", "rock"]));
    }

    #[tokio::test]
    async fn test_list_items_for_tag_across_items() {
        let repo = repo();
        for item in ["t1", "t2", "t3"] {
            repo.add_tags_to_item("acc-1", item, &names(&["rock"]))
                .await
                .unwrap();
        }
        repo.add_tags_to_item("acc-2", "t9", &names(&["rock"]))
            .await
            .unwrap();

        let page = repo
            .list_items_for_tag("acc-1", "Rock", &ListOptions::new())
            .await
            .unwrap();
        let items: Vec<_> = page.items.iter().map(|a| a.item_id.as_str()).collect();
        assert_eq!(items, vec!["t1", "t2", "t3"]);
    }

    #[tokio::test]
    async fn test_remove_tag_from_item_modes() {
        let repo = repo();
        repo.add_tags_to_item("acc-1", "t1", &names(&["rock"]))
            .await
            .unwrap();

        repo.remove_tag_from_item("acc-1", "t1", "ROCK", DeleteMode::MustExist)
            .await
            .unwrap();
        let err = repo
            .remove_tag_from_item("acc-1", "t1", "rock", DeleteMode::MustExist)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
        repo.remove_tag_from_item("acc-1", "t1", "rock", DeleteMode::Idempotent)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_tag_cascades_associations() {
        let repo = repo();
        repo.create_tag(&Tag::new("acc-1", "rock")).await.unwrap();
        repo.add_tags_to_item("acc-1", "t1", &names(&["rock", "live"]))
            .await
            .unwrap();
        repo.add_tags_to_item("acc-1", "t2", &names(&["rock"]))
            .await
            .unwrap();

        repo.delete_tag("acc-1", "Rock", DeleteMode::MustExist)
            .await
            .unwrap();

        assert!(repo
            .list_items_for_tag("acc-1", "rock", &ListOptions::new())
            .await
            .unwrap()
            .items
            .is_empty());
        assert_eq!(repo.list_item_tags("acc-1", "t1").await.unwrap().len(), 1);
        let err = repo.get_tag("acc-1", "rock").await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_resolve_items_for_tag_skips_deleted_items() {
        let repo = repo();
        for id in ["t1", "t2"] {
            repo.create_item(
                &ContentItem::new("acc-1", id, format!("uploads/{id}.flac")).with_id(id),
            )
            .await
            .unwrap();
            repo.add_tags_to_item("acc-1", id, &names(&["rock"]))
                .await
                .unwrap();
        }
        repo.delete_item("acc-1", "t1", DeleteMode::MustExist)
            .await
            .unwrap();

        let page = repo
            .resolve_items_for_tag("acc-1", "rock", &ListOptions::new())
            .await
            .unwrap();
        let ids: Vec<_> = page.items.iter().map(|item| item.id.as_str()).collect();
        assert_eq!(ids, vec!["t2"]);
    }
}
