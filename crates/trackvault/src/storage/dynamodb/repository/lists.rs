use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use trackvault_core::library::{validate_identifier, EntityKind, ListMembership, NamedList};
use trackvault_core::storage::{
    DeleteMode, ListOptions, ListRepository, Page, RepositoryError, Result, SortOrder,
};

use super::super::conversions::StoredEntity;
use super::super::keys;
use super::super::store::{Condition, ItemStore, StoreError, TableKey, WriteRequest};
use super::{conflict, DynamoDbRepository, Listing};

fn memberships(list_id: &str) -> Listing {
    Listing::table(keys::membership_pk(list_id)).with_prefix(keys::POSITION_PREFIX)
}

impl<S: ItemStore> DynamoDbRepository<S> {
    /// Every membership of a list, in position order.
    async fn all_memberships(&self, list_id: &str) -> Result<Vec<ListMembership>> {
        let items = self
            .query_all(memberships(list_id).request(SortOrder::Ascending))
            .await?;
        items.iter().map(ListMembership::from_item).collect()
    }

    async fn next_position(&self, list_id: &str) -> Result<u32> {
        let page = self
            .store
            .query(memberships(list_id).request(SortOrder::Descending).limit(1))
            .await?;
        match page.items.first() {
            Some(item) => {
                let last = ListMembership::from_item(item)?.position;
                last.checked_add(1).ok_or_else(|| {
                    RepositoryError::InvalidInput(format!("list {list_id} is full"))
                })
            }
            None => Ok(0),
        }
    }
}

#[async_trait]
impl<S: ItemStore> ListRepository for DynamoDbRepository<S> {
    async fn create_list(&self, list: &NamedList) -> Result<NamedList> {
        self.put_new(list).await
    }

    async fn get_list(&self, owner_id: &str, list_id: &str) -> Result<NamedList> {
        validate_identifier("owner_id", owner_id)?;
        validate_identifier("list_id", list_id)?;
        self.fetch(&keys::list_key(owner_id, list_id), list_id)
            .await
    }

    async fn update_list(&self, list: &NamedList) -> Result<NamedList> {
        self.overwrite(list).await
    }

    async fn delete_list(&self, owner_id: &str, list_id: &str, mode: DeleteMode) -> Result<()> {
        validate_identifier("owner_id", owner_id)?;
        validate_identifier("list_id", list_id)?;
        if mode == DeleteMode::MustExist {
            self.get_list(owner_id, list_id).await?;
        }

        let keys_to_delete: Vec<WriteRequest> = self
            .query_all(memberships(list_id).request(SortOrder::Ascending))
            .await?
            .iter()
            .filter_map(TableKey::from_item)
            .map(WriteRequest::Delete)
            .collect();
        let removed = keys_to_delete.len();
        self.batch_write_all(keys_to_delete).await?;
        tracing::debug!(list_id = %list_id, removed, "List memberships deleted");

        self.remove(
            &keys::list_key(owner_id, list_id),
            EntityKind::NamedList,
            list_id,
            mode,
        )
        .await
    }

    async fn list_lists(&self, owner_id: &str, options: &ListOptions) -> Result<Page<NamedList>> {
        validate_identifier("owner_id", owner_id)?;
        let listing = Listing::table(keys::account_pk(owner_id)).with_prefix(keys::LIST_PREFIX);
        self.query_page(&listing, options).await
    }

    async fn append_to_list(
        &self,
        list_id: &str,
        item_ids: &[String],
    ) -> Result<Vec<ListMembership>> {
        validate_identifier("list_id", list_id)?;
        for item_id in item_ids {
            validate_identifier("item_id", item_id)?;
        }
        if item_ids.is_empty() {
            return Ok(Vec::new());
        }

        let first = self.next_position(list_id).await?;
        let added_at = Utc::now();
        let appended = item_ids
            .iter()
            .zip(first..)
            .map(|(item_id, position)| ListMembership {
                list_id: list_id.to_string(),
                item_id: item_id.clone(),
                position,
                added_at,
            })
            .collect::<Vec<_>>();

        // Positions are claimed one conditional put at a time. Losing one to a
        // concurrent append undoes this call's earlier claims.
        let mut claimed = Vec::with_capacity(appended.len());
        for membership in &appended {
            match self
                .store
                .put_item(membership.to_item(), Some(Condition::NotExists))
                .await
            {
                Ok(()) => claimed.push(WriteRequest::Delete(membership.key())),
                Err(StoreError::ConditionFailed) => {
                    tracing::warn!(
                        list_id = %list_id,
                        position = membership.position,
                        claimed = claimed.len(),
                        "List position taken by a concurrent append"
                    );
                    self.batch_write_all(claimed).await?;
                    return Err(conflict(
                        EntityKind::ListMembership,
                        format!("{list_id}@{}", membership.position),
                    ));
                }
                Err(err) => return Err(err.into()),
            }
        }

        Ok(appended)
    }

    async fn list_memberships(
        &self,
        list_id: &str,
        options: &ListOptions,
    ) -> Result<Page<ListMembership>> {
        validate_identifier("list_id", list_id)?;
        self.query_page(&memberships(list_id), options).await
    }

    async fn remove_from_list(&self, list_id: &str, item_ids: &[String]) -> Result<usize> {
        validate_identifier("list_id", list_id)?;
        let targets: HashSet<&str> = item_ids.iter().map(String::as_str).collect();

        let deletes: Vec<WriteRequest> = self
            .all_memberships(list_id)
            .await?
            .iter()
            .filter(|membership| targets.contains(membership.item_id.as_str()))
            .map(|membership| WriteRequest::Delete(membership.key()))
            .collect();
        let removed = deletes.len();
        self.batch_write_all(deletes).await?;

        Ok(removed)
    }

    async fn remove_at_position(
        &self,
        list_id: &str,
        position: u32,
        mode: DeleteMode,
    ) -> Result<()> {
        validate_identifier("list_id", list_id)?;
        self.remove(
            &keys::membership_key(list_id, position),
            EntityKind::ListMembership,
            &format!("{list_id}@{position}"),
            mode,
        )
        .await
    }

    async fn reorder_list(
        &self,
        list_id: &str,
        item_ids: &[String],
    ) -> Result<Vec<ListMembership>> {
        validate_identifier("list_id", list_id)?;
        let current = self.all_memberships(list_id).await?;

        // Listed ids first, in the requested order, then everything else in
        // its current order.
        let mut placed = vec![false; current.len()];
        let mut ordered: Vec<&ListMembership> = Vec::with_capacity(current.len());
        let mut requested = HashSet::new();
        for item_id in item_ids {
            if !requested.insert(item_id.as_str()) {
                continue;
            }
            for (slot, membership) in current.iter().enumerate() {
                if !placed[slot] && membership.item_id == *item_id {
                    placed[slot] = true;
                    ordered.push(membership);
                }
            }
        }
        for (slot, membership) in current.iter().enumerate() {
            if !placed[slot] {
                ordered.push(membership);
            }
        }

        let reordered: Vec<ListMembership> = ordered
            .into_iter()
            .zip(0u32..)
            .map(|(membership, position)| ListMembership {
                position,
                ..membership.clone()
            })
            .collect();

        let stored: HashMap<u32, &str> = current
            .iter()
            .map(|membership| (membership.position, membership.item_id.as_str()))
            .collect();
        let mut writes: Vec<WriteRequest> = reordered
            .iter()
            .filter(|membership| {
                stored.get(&membership.position) != Some(&membership.item_id.as_str())
            })
            .map(|membership| WriteRequest::Put(membership.to_item()))
            .collect();
        // Gaps left by earlier removals shift the tail down.
        let len = reordered.len() as u32;
        writes.extend(
            current
                .iter()
                .filter(|membership| membership.position >= len)
                .map(|membership| WriteRequest::Delete(membership.key())),
        );

        let rewritten = writes.len();
        self.batch_write_all(writes).await?;
        tracing::debug!(list_id = %list_id, rewritten, "List reordered");

        Ok(reordered)
    }
}
