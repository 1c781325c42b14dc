//! Aggregate counters.
//!
//! Each counter lives on its parent item and is only ever changed with a
//! single `ADD`, so concurrent increments sum correctly without reads.

use async_trait::async_trait;
use chrono::Utc;
use trackvault_core::library::{validate_identifier, validate_tag_name, EntityKind};
use trackvault_core::storage::{CounterRepository, CounterTarget, Result};

use super::super::conversions::{
    get_number, ATTR_FOLLOWER_COUNT, ATTR_FOLLOWING_COUNT, ATTR_ITEM_COUNT, ATTR_TOTAL_DURATION,
    ATTR_UPDATED_AT,
};
use super::super::keys;
use super::super::store::{Condition, ItemStore, StoreError, TableKey, Update};
use super::{not_found, timestamp, DynamoDbRepository};

/// Where a counter is stored.
struct CounterSlot {
    key: TableKey,
    attribute: &'static str,
    parent: EntityKind,
    parent_id: String,
}

fn slot(target: &CounterTarget) -> Result<CounterSlot> {
    let slot = match target {
        CounterTarget::TagItems { owner_id, tag_name } => {
            validate_identifier("owner_id", owner_id)?;
            let tag_name = validate_tag_name(tag_name)?;
            CounterSlot {
                key: keys::tag_key(owner_id, &tag_name),
                attribute: ATTR_ITEM_COUNT,
                parent: EntityKind::Tag,
                parent_id: tag_name,
            }
        }
        CounterTarget::CollectionItems {
            owner_id,
            collection_id,
        } => {
            validate_identifier("owner_id", owner_id)?;
            validate_identifier("collection_id", collection_id)?;
            CounterSlot {
                key: keys::collection_key(owner_id, collection_id),
                attribute: ATTR_ITEM_COUNT,
                parent: EntityKind::Collection,
                parent_id: collection_id.clone(),
            }
        }
        CounterTarget::CollectionDuration {
            owner_id,
            collection_id,
        } => {
            validate_identifier("owner_id", owner_id)?;
            validate_identifier("collection_id", collection_id)?;
            CounterSlot {
                key: keys::collection_key(owner_id, collection_id),
                attribute: ATTR_TOTAL_DURATION,
                parent: EntityKind::Collection,
                parent_id: collection_id.clone(),
            }
        }
        CounterTarget::CreatorFollowers { account_id } => {
            validate_identifier("account_id", account_id)?;
            CounterSlot {
                key: keys::creator_key(account_id),
                attribute: ATTR_FOLLOWER_COUNT,
                parent: EntityKind::CreatorProfile,
                parent_id: account_id.clone(),
            }
        }
        CounterTarget::AccountFollowing { account_id } => {
            validate_identifier("account_id", account_id)?;
            CounterSlot {
                key: keys::account_key(account_id),
                attribute: ATTR_FOLLOWING_COUNT,
                parent: EntityKind::Account,
                parent_id: account_id.clone(),
            }
        }
        CounterTarget::ListItems { owner_id, list_id } => {
            validate_identifier("owner_id", owner_id)?;
            validate_identifier("list_id", list_id)?;
            CounterSlot {
                key: keys::list_key(owner_id, list_id),
                attribute: ATTR_ITEM_COUNT,
                parent: EntityKind::NamedList,
                parent_id: list_id.clone(),
            }
        }
    };
    Ok(slot)
}

#[async_trait]
impl<S: ItemStore> CounterRepository for DynamoDbRepository<S> {
    async fn increment(&self, target: &CounterTarget, delta: i64) -> Result<i64> {
        let slot = slot(target)?;
        let updates = vec![
            Update::Add(slot.attribute.to_string(), delta),
            Update::set(ATTR_UPDATED_AT, timestamp(&Utc::now())),
        ];

        let item = self
            .store
            .update_item(&slot.key, updates, Some(Condition::Exists))
            .await
            .map_err(|err| match err {
                StoreError::ConditionFailed => not_found(slot.parent, slot.parent_id.as_str()),
                err => err.into(),
            })?;

        let value = get_number::<i64>(&item, slot.attribute)?;
        tracing::debug!(
            pk = %slot.key.pk,
            sk = %slot.key.sk,
            counter = slot.attribute,
            delta,
            value,
            "Counter updated"
        );
        Ok(value)
    }
}
