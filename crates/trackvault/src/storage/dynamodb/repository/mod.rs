//! Access layer implementation.
//!
//! Implements the repository traits from `trackvault_core::storage` over any
//! [`ItemStore`]. Create, get, overwrite, delete and list go through the
//! generic paths below; the per-entity modules add keys, listings and
//! targeted updates.

mod accounts;
mod collections;
mod content;
mod counters;
mod creators;
mod follows;
mod lists;
mod tags;
mod transfers;

use aws_sdk_dynamodb::types::AttributeValue;
use chrono::{DateTime, Utc};
use trackvault_core::library::EntityKind;
use trackvault_core::storage::{
    DeleteMode, ListOptions, Page, PageLimits, RepositoryError, Result, SortOrder,
};

use super::conversions::StoredEntity;
use super::cursor::{self, Cursor, CursorScope};
use super::store::{
    Condition, Index, Item, ItemStore, QueryRequest, ScanRequest, StoreError, TableKey, Update,
    WriteRequest, ENTITY_TYPE, MAX_BATCH_WRITE, PK, SK,
};

/// Repository implementation over a single-table [`ItemStore`].
///
/// Provides async access to every entity type. Cheap to share behind an
/// `Arc`; it holds no state besides the store handle.
#[derive(Debug, Clone)]
pub struct DynamoDbRepository<S> {
    store: S,
    limits: PageLimits,
}

impl<S: ItemStore> DynamoDbRepository<S> {
    /// Creates a new repository with the default page limits.
    pub fn new(store: S) -> Self {
        Self {
            store,
            limits: PageLimits::default(),
        }
    }

    pub fn with_page_limits(mut self, limits: PageLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Get the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn page_limits(&self) -> PageLimits {
        self.limits
    }
}

impl From<StoreError> for RepositoryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Throttled(msg) | StoreError::Unavailable(msg) => {
                RepositoryError::StoreUnavailable(msg)
            }
            StoreError::InvalidRequest(msg) => RepositoryError::InvalidInput(msg),
            // Callers that attach a condition translate this themselves.
            StoreError::ConditionFailed => RepositoryError::Conflict {
                entity_type: "Item",
                id: "condition failed".to_string(),
            },
        }
    }
}

fn not_found(kind: EntityKind, id: impl Into<String>) -> RepositoryError {
    RepositoryError::NotFound {
        entity_type: kind.display_name(),
        id: id.into(),
    }
}

fn conflict(kind: EntityKind, id: impl Into<String>) -> RepositoryError {
    RepositoryError::Conflict {
        entity_type: kind.display_name(),
        id: id.into(),
    }
}

fn timestamp(now: &DateTime<Utc>) -> AttributeValue {
    AttributeValue::S(now.to_rfc3339())
}

/// A key range the access layer pages through.
#[derive(Debug, Clone)]
struct Listing {
    index: Option<Index>,
    partition: String,
    sort_prefix: Option<&'static str>,
}

impl Listing {
    fn table(partition: impl Into<String>) -> Self {
        Self {
            index: None,
            partition: partition.into(),
            sort_prefix: None,
        }
    }

    fn index(index: Index, partition: impl Into<String>) -> Self {
        Self {
            index: Some(index),
            partition: partition.into(),
            sort_prefix: None,
        }
    }

    fn with_prefix(mut self, prefix: &'static str) -> Self {
        self.sort_prefix = Some(prefix);
        self
    }

    fn scope(&self) -> CursorScope<'_> {
        CursorScope {
            index: self.index,
            partition: Some(&self.partition),
            sort_prefix: self.sort_prefix,
        }
    }

    fn request(&self, order: SortOrder) -> QueryRequest {
        let mut request =
            QueryRequest::new(self.partition.clone()).forward(order.is_ascending());
        if let Some(index) = self.index {
            request = request.on_index(index);
        }
        if let Some(prefix) = self.sort_prefix {
            request = request.sort_begins_with(prefix);
        }
        request
    }
}

impl<S: ItemStore> DynamoDbRepository<S> {
    /// Writes a new entity, failing with `AlreadyExists` instead of
    /// overwriting. Returns the entity as stored.
    async fn put_new<T: StoredEntity + Clone>(&self, entity: &T) -> Result<T> {
        entity.validate()?;
        let mut entity = entity.clone();
        entity.stamp_created(Utc::now());

        self.store
            .put_item(entity.to_item(), Some(Condition::NotExists))
            .await
            .map_err(|err| match err {
                StoreError::ConditionFailed => RepositoryError::AlreadyExists {
                    entity_type: T::KIND.display_name(),
                    id: entity.identity(),
                },
                err => err.into(),
            })?;

        Ok(entity)
    }

    /// Replaces every attribute of an existing entity except its key and the
    /// attributes only targeted updates may write.
    async fn overwrite<T: StoredEntity + Clone>(&self, entity: &T) -> Result<T> {
        entity.validate()?;
        let mut entity = entity.clone();
        entity.stamp_updated(Utc::now());

        let key = entity.key();
        let item = entity.to_item();
        let mut updates: Vec<Update> = T::OPTIONAL
            .iter()
            .filter(|name| !item.contains_key(**name))
            .map(|name| Update::Remove(name.to_string()))
            .collect();
        updates.extend(
            item.into_iter()
                .filter(|(name, _)| {
                    name != PK && name != SK && !T::MANAGED.contains(&name.as_str())
                })
                .map(|(name, value)| Update::Set(name, value)),
        );

        let stored = self
            .store
            .update_item(&key, updates, Some(Condition::Exists))
            .await
            .map_err(|err| match err {
                StoreError::ConditionFailed => not_found(T::KIND, entity.identity()),
                err => err.into(),
            })?;

        T::from_item(&stored)
    }

    async fn fetch<T: StoredEntity>(&self, key: &TableKey, id: &str) -> Result<T> {
        match self.store.get_item(key).await? {
            Some(item) => T::from_item(&item),
            None => Err(not_found(T::KIND, id)),
        }
    }

    async fn remove(
        &self,
        key: &TableKey,
        kind: EntityKind,
        id: &str,
        mode: DeleteMode,
    ) -> Result<()> {
        let condition = match mode {
            DeleteMode::MustExist => Some(Condition::Exists),
            DeleteMode::Idempotent => None,
        };

        self.store
            .delete_item(key, condition)
            .await
            .map_err(|err| match err {
                StoreError::ConditionFailed => not_found(kind, id),
                err => err.into(),
            })
    }

    /// Reads one page of a listing.
    ///
    /// Asks the store for `limit + 1` items, following `LastEvaluatedKey`
    /// until it has them or the range ends, so a cursor is only emitted when
    /// something follows.
    async fn query_page<T: StoredEntity>(
        &self,
        listing: &Listing,
        options: &ListOptions,
    ) -> Result<Page<T>> {
        let limit = self.limits.resolve(options.limit)?;
        let mut start_key = match &options.cursor {
            Some(token) => Some(cursor::decode(token, &listing.scope())?.into_start_key()),
            None => None,
        };

        let wanted = limit as usize + 1;
        let mut items: Vec<Item> = Vec::with_capacity(wanted);
        loop {
            let remaining = (wanted - items.len()) as u32;
            let page = self
                .store
                .query(
                    listing
                        .request(options.order)
                        .limit(remaining)
                        .start_after(start_key.take()),
                )
                .await?;
            items.extend(page.items);
            match page.last_evaluated_key {
                Some(key) if items.len() < wanted => start_key = Some(key),
                _ => break,
            }
        }

        into_page(items, limit, listing.index)
    }

    /// Reads one page of a full-table scan restricted to one entity kind.
    ///
    /// The store applies its limit before the entity filter, so this keeps
    /// scanning until the page is full or the table is exhausted. Items come
    /// back in store order; `options.order` does not apply.
    async fn scan_page<T: StoredEntity>(
        &self,
        sort_prefix: &'static str,
        options: &ListOptions,
    ) -> Result<Page<T>> {
        let limit = self.limits.resolve(options.limit)?;
        let scope = CursorScope {
            index: None,
            partition: None,
            sort_prefix: Some(sort_prefix),
        };
        let mut start_key = match &options.cursor {
            Some(token) => Some(cursor::decode(token, &scope)?.into_start_key()),
            None => None,
        };
        let kind = AttributeValue::S(T::KIND.as_str().to_string());

        let wanted = limit as usize + 1;
        let mut items: Vec<Item> = Vec::with_capacity(wanted);
        loop {
            let remaining = (wanted - items.len()) as u32;
            let page = self
                .store
                .scan(
                    ScanRequest::new()
                        .filter_equals(ENTITY_TYPE, kind.clone())
                        .limit(remaining)
                        .start_after(start_key.take()),
                )
                .await?;
            items.extend(page.items);
            match page.last_evaluated_key {
                Some(key) if items.len() < wanted => start_key = Some(key),
                _ => break,
            }
        }

        into_page(items, limit, None)
    }

    /// Reads a whole range, for cascades and positional rewrites.
    async fn query_all(&self, request: QueryRequest) -> Result<Vec<Item>> {
        let mut items = Vec::new();
        let mut start_key = None;
        loop {
            let page = self
                .store
                .query(request.clone().start_after(start_key.take()))
                .await?;
            items.extend(page.items);
            match page.last_evaluated_key {
                Some(key) => start_key = Some(key),
                None => return Ok(items),
            }
        }
    }

    /// Sends writes in chunks of [`MAX_BATCH_WRITE`]. Stops at the first
    /// failed chunk and surfaces its error; earlier chunks stay written.
    async fn batch_write_all(&self, requests: Vec<WriteRequest>) -> Result<()> {
        let chunks = requests.len().div_ceil(MAX_BATCH_WRITE);
        for (index, chunk) in requests.chunks(MAX_BATCH_WRITE).enumerate() {
            if let Err(err) = self.store.batch_write(chunk.to_vec()).await {
                tracing::warn!(chunk = index + 1, chunks, error = %err, "Batch write failed");
                return Err(err.into());
            }
        }
        Ok(())
    }
}

fn into_page<T: StoredEntity>(
    mut items: Vec<Item>,
    limit: u32,
    index: Option<Index>,
) -> Result<Page<T>> {
    let has_more = items.len() > limit as usize;
    items.truncate(limit as usize);

    let next_cursor = match items.last() {
        Some(last) if has_more => {
            let cursor = Cursor::from_item(last, index).ok_or_else(|| {
                RepositoryError::InvalidData("Listed item is missing its key fields".to_string())
            })?;
            Some(cursor::encode(&cursor))
        }
        _ => None,
    };

    let entities = items.iter().map(T::from_item).collect::<Result<Vec<_>>>()?;
    Ok(Page::new(entities, next_cursor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::inmemory::{InMemoryStore, StoreOperation};
    use trackvault_core::library::{Account, Tag};
    use trackvault_core::storage::AccountRepository;

    fn repo() -> DynamoDbRepository<InMemoryStore> {
        DynamoDbRepository::new(InMemoryStore::new())
    }

    #[test]
    fn test_store_errors_map_to_repository_errors() {
        assert_eq!(
            RepositoryError::from(StoreError::Throttled("slow down".into())),
            RepositoryError::StoreUnavailable("slow down".into())
        );
        assert_eq!(
            RepositoryError::from(StoreError::InvalidRequest("bad".into())),
            RepositoryError::InvalidInput("bad".into())
        );
    }

    #[tokio::test]
    async fn test_put_new_stamps_and_guards() {
        let repo = repo();
        let tag = Tag::new("acc-1", "Rock");

        let created = repo.put_new(&tag).await.unwrap();
        assert_eq!(created.created_at, created.updated_at);

        let err = repo.put_new(&tag).await.unwrap_err();
        assert!(matches!(err, RepositoryError::AlreadyExists { entity_type: "Tag", .. }));
    }

    #[tokio::test]
    async fn test_overwrite_keeps_managed_and_removes_absent_optional() {
        let repo = repo();
        let tag = Tag::new("acc-1", "rock").with_color("#ff0000");
        repo.put_new(&tag).await.unwrap();
        repo.store()
            .update_item(
                &tag.key(),
                vec![Update::Add("itemCount".into(), 4)],
                None,
            )
            .await
            .unwrap();

        let mut changed = tag.clone();
        changed.color = None;
        changed.item_count = 0;
        let stored = repo.overwrite(&changed).await.unwrap();

        assert_eq!(stored.item_count, 4);
        assert_eq!(stored.color, None);
    }

    #[tokio::test]
    async fn test_overwrite_missing_is_not_found() {
        let err = repo()
            .overwrite(&Tag::new("acc-1", "jazz"))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_remove_modes() {
        let repo = repo();
        let key = TableKey::new("ACCOUNT#a", "TAG#x");
        repo.remove(&key, EntityKind::Tag, "x", DeleteMode::Idempotent)
            .await
            .unwrap();
        let err = repo
            .remove(&key, EntityKind::Tag, "x", DeleteMode::MustExist)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_batch_write_all_chunks_and_stops_at_first_failure() {
        let repo = repo();
        let requests: Vec<WriteRequest> = (0..60)
            .map(|i| WriteRequest::Delete(TableKey::new("LIST#l", format!("POSITION#{i:08}"))))
            .collect();

        repo.batch_write_all(requests.clone()).await.unwrap();
        assert_eq!(repo.store().call_count(StoreOperation::BatchWrite).await, 3);

        repo.store()
            .fail_next(
                StoreOperation::BatchWrite,
                StoreError::Unavailable("down".into()),
            )
            .await;
        let err = repo.batch_write_all(requests).await.unwrap_err();
        assert!(matches!(err, RepositoryError::StoreUnavailable(_)));
        assert_eq!(repo.store().call_count(StoreOperation::BatchWrite).await, 4);
    }

    #[tokio::test]
    async fn test_limit_out_of_range_is_rejected() {
        let repo = repo();
        let err = repo
            .scan_accounts(
                trackvault_core::library::GlobalAccess::for_role(
                    trackvault_core::library::Role::Admin,
                )
                .unwrap(),
                &ListOptions::new().with_limit(0),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_scan_page_fills_past_filtered_items() {
        let repo = repo();
        for i in 0..5 {
            repo.put_new(&Account::new(format!("acc-{i}"), format!("u{i}@x.io"), "U"))
                .await
                .unwrap();
            repo.put_new(&Tag::new(format!("acc-{i}"), "rock"))
                .await
                .unwrap();
        }

        let page: Page<Account> = repo
            .scan_page(super::super::keys::PROFILE_SK, &ListOptions::new().with_limit(3))
            .await
            .unwrap();
        assert_eq!(page.items.len(), 3);
        assert!(page.has_more());
    }
}
