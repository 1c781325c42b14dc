//! In-memory item store.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use tokio::sync::{Mutex, RwLock};

use crate::storage::dynamodb::store::{
    Condition, Index, Item, ItemPage, ItemStore, QueryRequest, ScanRequest, StoreError,
    StoreResult, TableKey, Update, WriteRequest, MAX_BATCH_WRITE, PK, SK,
};

/// Raw store operations, for failure injection and call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    PutItem,
    GetItem,
    UpdateItem,
    DeleteItem,
    Query,
    Scan,
    BatchWrite,
}

/// In-memory single-table store for testing.
///
/// Items live in a `BTreeMap` ordered by primary key wrapped in
/// `Arc<RwLock<_>>`; clones share the same data. Every operation holds the
/// write lock for its whole duration, which gives the single-item atomicity
/// conditional writes and atomic adds rely on. Secondary indexes are derived
/// from item attributes on every query, so they are never stale.
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    items: Arc<RwLock<BTreeMap<TableKey, Item>>>,
    failures: Arc<Mutex<HashMap<StoreOperation, VecDeque<StoreError>>>>,
    calls: Arc<Mutex<HashMap<StoreOperation, usize>>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self {
            items: Arc::new(RwLock::new(BTreeMap::new())),
            failures: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Makes the next call of `operation` fail with `error`. Queued failures
    /// are consumed in order.
    pub async fn fail_next(&self, operation: StoreOperation, error: StoreError) {
        self.failures
            .lock()
            .await
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// Number of times `operation` was called, including failed calls.
    pub async fn call_count(&self, operation: StoreOperation) -> usize {
        self.calls
            .lock()
            .await
            .get(&operation)
            .copied()
            .unwrap_or(0)
    }

    /// Number of stored items.
    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }

    /// Reads an item without going through the store contract.
    pub async fn raw_item(&self, key: &TableKey) -> Option<Item> {
        self.items.read().await.get(key).cloned()
    }

    /// Writes an item unconditionally, without counting a call.
    pub async fn insert_raw(&self, item: Item) -> StoreResult<()> {
        let key = key_of(&item)?;
        self.items.write().await.insert(key, item);
        Ok(())
    }

    async fn begin(&self, operation: StoreOperation) -> StoreResult<()> {
        *self.calls.lock().await.entry(operation).or_insert(0) += 1;
        let injected = self
            .failures
            .lock()
            .await
            .get_mut(&operation)
            .and_then(VecDeque::pop_front);
        match injected {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ItemStore for InMemoryStore {
    async fn put_item(&self, item: Item, condition: Option<Condition>) -> StoreResult<()> {
        self.begin(StoreOperation::PutItem).await?;
        let key = key_of(&item)?;
        let mut items = self.items.write().await;
        check_condition(items.get(&key), condition.as_ref())?;
        items.insert(key, item);
        Ok(())
    }

    async fn get_item(&self, key: &TableKey) -> StoreResult<Option<Item>> {
        self.begin(StoreOperation::GetItem).await?;
        Ok(self.items.read().await.get(key).cloned())
    }

    async fn update_item(
        &self,
        key: &TableKey,
        updates: Vec<Update>,
        condition: Option<Condition>,
    ) -> StoreResult<Item> {
        self.begin(StoreOperation::UpdateItem).await?;
        let mut items = self.items.write().await;
        let existing = items.get(key);
        check_condition(existing, condition.as_ref())?;

        // Updating a missing item creates it, as DynamoDB does.
        let mut item = existing.cloned().unwrap_or_else(|| key.to_item());
        apply_updates(&mut item, &updates)?;
        items.insert(key.clone(), item.clone());
        Ok(item)
    }

    async fn delete_item(&self, key: &TableKey, condition: Option<Condition>) -> StoreResult<()> {
        self.begin(StoreOperation::DeleteItem).await?;
        let mut items = self.items.write().await;
        check_condition(items.get(key), condition.as_ref())?;
        items.remove(key);
        Ok(())
    }

    async fn query(&self, request: QueryRequest) -> StoreResult<ItemPage> {
        self.begin(StoreOperation::Query).await?;
        let items = self.items.read().await;

        let mut matches: Vec<(String, &TableKey, &Item)> = match request.index {
            None => items
                .range(TableKey::new(request.partition.clone(), String::new())..)
                .take_while(|(key, _)| key.pk == request.partition)
                .map(|(key, item)| (key.sk.clone(), key, item))
                .collect(),
            Some(index) => items
                .iter()
                .filter(|(_, item)| string_attr(item, index.pk_attribute()) == Some(&request.partition))
                .filter_map(|(key, item)| {
                    string_attr(item, index.sk_attribute()).map(|sk| (sk.clone(), key, item))
                })
                .collect(),
        };

        if let Some(condition) = &request.sort {
            matches.retain(|(range_key, _, _)| condition.matches(range_key));
        }
        matches.sort_by(|a, b| (&a.0, a.1).cmp(&(&b.0, b.1)));
        if !request.scan_forward {
            matches.reverse();
        }

        let start = match &request.exclusive_start_key {
            Some(start) => {
                let start_key = key_of(start)?;
                let start_range = match request.index {
                    None => start_key.sk.clone(),
                    Some(index) => string_attr(start, index.sk_attribute())
                        .cloned()
                        .ok_or_else(|| {
                            StoreError::InvalidRequest(format!(
                                "ExclusiveStartKey is missing {}",
                                index.sk_attribute()
                            ))
                        })?,
                };
                let after = if request.scan_forward {
                    Ordering::Greater
                } else {
                    Ordering::Less
                };
                matches
                    .iter()
                    .position(|(range_key, key, _)| {
                        (range_key, *key).cmp(&(&start_range, &start_key)) == after
                    })
                    .unwrap_or(matches.len())
            }
            None => 0,
        };

        let limit = request.limit.map_or(usize::MAX, |limit| limit as usize);
        let page: Vec<Item> = matches
            .iter()
            .skip(start)
            .take(limit)
            .map(|(_, _, item)| (*item).clone())
            .collect();

        let last_evaluated_key = (page.len() == limit)
            .then(|| page.last().map(|item| start_key_of(item, request.index)))
            .flatten();

        Ok(ItemPage {
            items: page,
            last_evaluated_key,
        })
    }

    async fn scan(&self, request: ScanRequest) -> StoreResult<ItemPage> {
        self.begin(StoreOperation::Scan).await?;
        let items = self.items.read().await;

        let evaluated: Vec<(&TableKey, &Item)> = match &request.exclusive_start_key {
            Some(start) => {
                let start_key = key_of(start)?;
                items
                    .range((
                        std::ops::Bound::Excluded(start_key),
                        std::ops::Bound::Unbounded,
                    ))
                    .collect()
            }
            None => items.iter().collect(),
        };

        // The limit bounds items read, not items returned.
        let limit = request.limit.map_or(usize::MAX, |limit| limit as usize);
        let evaluated: Vec<(&TableKey, &Item)> = evaluated.into_iter().take(limit).collect();
        let last_evaluated_key = (evaluated.len() == limit)
            .then(|| evaluated.last().map(|(key, _)| key.to_item()))
            .flatten();

        let page = evaluated
            .into_iter()
            .filter(|(_, item)| match &request.filter {
                Some((attribute, value)) => item.get(attribute) == Some(value),
                None => true,
            })
            .map(|(_, item)| item.clone())
            .collect();

        Ok(ItemPage {
            items: page,
            last_evaluated_key,
        })
    }

    async fn batch_write(&self, requests: Vec<WriteRequest>) -> StoreResult<()> {
        self.begin(StoreOperation::BatchWrite).await?;
        if requests.is_empty() || requests.len() > MAX_BATCH_WRITE {
            return Err(StoreError::InvalidRequest(format!(
                "batch must hold 1 to {} writes, got {}",
                MAX_BATCH_WRITE,
                requests.len()
            )));
        }

        let mut seen = HashSet::new();
        let mut writes = Vec::with_capacity(requests.len());
        for request in requests {
            let key = match &request {
                WriteRequest::Put(item) => key_of(item)?,
                WriteRequest::Delete(key) => key.clone(),
            };
            if !seen.insert(key.clone()) {
                return Err(StoreError::InvalidRequest(format!(
                    "batch holds duplicate key {}/{}",
                    key.pk, key.sk
                )));
            }
            writes.push((key, request));
        }

        let mut items = self.items.write().await;
        for (key, request) in writes {
            match request {
                WriteRequest::Put(item) => {
                    items.insert(key, item);
                }
                WriteRequest::Delete(_) => {
                    items.remove(&key);
                }
            }
        }
        Ok(())
    }
}

fn string_attr<'a>(item: &'a Item, name: &str) -> Option<&'a String> {
    item.get(name).and_then(|value| value.as_s().ok())
}

fn key_of(item: &Item) -> StoreResult<TableKey> {
    TableKey::from_item(item)
        .ok_or_else(|| StoreError::InvalidRequest(format!("item is missing {PK} or {SK}")))
}

fn start_key_of(item: &Item, index: Option<Index>) -> Item {
    let mut key = Item::new();
    let mut names = vec![PK, SK];
    if let Some(index) = index {
        names.push(index.pk_attribute());
        names.push(index.sk_attribute());
    }
    for name in names {
        if let Some(value) = item.get(name) {
            key.insert(name.to_string(), value.clone());
        }
    }
    key
}

fn check_condition(existing: Option<&Item>, condition: Option<&Condition>) -> StoreResult<()> {
    let holds = match condition {
        None => true,
        Some(Condition::Exists) => existing.is_some(),
        Some(Condition::NotExists) => existing.is_none(),
        Some(Condition::Equals { attribute, value }) => {
            existing.and_then(|item| item.get(attribute)) == Some(value)
        }
    };
    if holds {
        Ok(())
    } else {
        Err(StoreError::ConditionFailed)
    }
}

fn apply_updates(item: &mut Item, updates: &[Update]) -> StoreResult<()> {
    for update in updates {
        if update.attribute() == PK || update.attribute() == SK {
            return Err(StoreError::InvalidRequest(
                "key attributes cannot be updated".to_string(),
            ));
        }
        match update {
            Update::Set(name, value) => {
                item.insert(name.clone(), value.clone());
            }
            Update::Add(name, delta) => {
                let current = match item.get(name) {
                    None => 0,
                    Some(AttributeValue::N(n)) => n.parse::<i64>().map_err(|_| {
                        StoreError::InvalidRequest(format!("{name} is not an integer"))
                    })?,
                    Some(_) => {
                        return Err(StoreError::InvalidRequest(format!(
                            "ADD requires a number attribute: {name}"
                        )));
                    }
                };
                item.insert(name.clone(), AttributeValue::N((current + delta).to_string()));
            }
            Update::Remove(name) => {
                item.remove(name);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::dynamodb::store::{GSI1PK, GSI1SK};

    fn item(pk: &str, sk: &str) -> Item {
        TableKey::new(pk, sk).to_item()
    }

    fn indexed(pk: &str, sk: &str, gsi_pk: &str, gsi_sk: &str) -> Item {
        let mut item = item(pk, sk);
        item.insert(GSI1PK.to_string(), AttributeValue::S(gsi_pk.to_string()));
        item.insert(GSI1SK.to_string(), AttributeValue::S(gsi_sk.to_string()));
        item
    }

    fn sort_keys(page: &ItemPage) -> Vec<String> {
        page.items
            .iter()
            .map(|item| TableKey::from_item(item).unwrap().sk)
            .collect()
    }

    #[tokio::test]
    async fn test_conditional_put() {
        let store = InMemoryStore::new();
        store
            .put_item(item("A", "1"), Some(Condition::NotExists))
            .await
            .unwrap();
        assert_eq!(
            store.put_item(item("A", "1"), Some(Condition::NotExists)).await,
            Err(StoreError::ConditionFailed)
        );
        assert_eq!(
            store.put_item(item("A", "2"), Some(Condition::Exists)).await,
            Err(StoreError::ConditionFailed)
        );
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_update_add_and_equals_condition() {
        let store = InMemoryStore::new();
        let key = TableKey::new("A", "1");
        store.put_item(item("A", "1"), None).await.unwrap();

        let updated = store
            .update_item(&key, vec![Update::Add("n".into(), 5)], Some(Condition::Exists))
            .await
            .unwrap();
        assert_eq!(updated.get("n"), Some(&AttributeValue::N("5".into())));

        let updated = store
            .update_item(
                &key,
                vec![Update::Add("n".into(), -2)],
                Some(Condition::equals("n", AttributeValue::N("5".into()))),
            )
            .await
            .unwrap();
        assert_eq!(updated.get("n"), Some(&AttributeValue::N("3".into())));

        let stale = store
            .update_item(
                &key,
                vec![Update::Add("n".into(), 1)],
                Some(Condition::equals("n", AttributeValue::N("5".into()))),
            )
            .await;
        assert_eq!(stale, Err(StoreError::ConditionFailed));
    }

    #[tokio::test]
    async fn test_update_missing_item_with_exists_fails() {
        let store = InMemoryStore::new();
        let result = store
            .update_item(
                &TableKey::new("A", "1"),
                vec![Update::Add("n".into(), 1)],
                Some(Condition::Exists),
            )
            .await;
        assert_eq!(result, Err(StoreError::ConditionFailed));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_query_range_and_pagination() {
        let store = InMemoryStore::new();
        for sk in ["TAG#a", "TAG#b", "TAG#c", "ITEM#1"] {
            store.put_item(item("P", sk), None).await.unwrap();
        }
        store.put_item(item("Q", "TAG#z"), None).await.unwrap();

        let first = store
            .query(QueryRequest::new("P").sort_begins_with("TAG#").limit(2))
            .await
            .unwrap();
        assert_eq!(sort_keys(&first), vec!["TAG#a", "TAG#b"]);
        assert!(first.last_evaluated_key.is_some());

        let rest = store
            .query(
                QueryRequest::new("P")
                    .sort_begins_with("TAG#")
                    .limit(2)
                    .start_after(first.last_evaluated_key),
            )
            .await
            .unwrap();
        assert_eq!(sort_keys(&rest), vec!["TAG#c"]);
        assert!(rest.last_evaluated_key.is_none());
    }

    #[tokio::test]
    async fn test_query_descending() {
        let store = InMemoryStore::new();
        for sk in ["1", "2", "3"] {
            store.put_item(item("P", sk), None).await.unwrap();
        }
        let page = store
            .query(QueryRequest::new("P").forward(false).limit(2))
            .await
            .unwrap();
        assert_eq!(sort_keys(&page), vec!["3", "2"]);

        let next = store
            .query(
                QueryRequest::new("P")
                    .forward(false)
                    .start_after(page.last_evaluated_key),
            )
            .await
            .unwrap();
        assert_eq!(sort_keys(&next), vec!["1"]);
    }

    #[tokio::test]
    async fn test_index_query_is_sparse_and_ordered_by_index_key() {
        let store = InMemoryStore::new();
        store.put_item(indexed("A", "1", "G", "b"), None).await.unwrap();
        store.put_item(indexed("B", "1", "G", "a"), None).await.unwrap();
        store.put_item(indexed("C", "1", "H", "a"), None).await.unwrap();
        store.put_item(item("D", "1"), None).await.unwrap();

        let page = store
            .query(QueryRequest::new("G").on_index(Index::Gsi1).limit(1))
            .await
            .unwrap();
        assert_eq!(TableKey::from_item(&page.items[0]).unwrap().pk, "B");
        let start = page.last_evaluated_key.clone().unwrap();
        assert!(start.contains_key(GSI1SK));

        let next = store
            .query(
                QueryRequest::new("G")
                    .on_index(Index::Gsi1)
                    .start_after(Some(start)),
            )
            .await
            .unwrap();
        assert_eq!(next.items.len(), 1);
        assert_eq!(TableKey::from_item(&next.items[0]).unwrap().pk, "A");
    }

    #[tokio::test]
    async fn test_scan_applies_limit_before_filter() {
        let store = InMemoryStore::new();
        for (pk, kind) in [("A", "X"), ("B", "Y"), ("C", "X"), ("D", "Y")] {
            let mut it = item(pk, "S");
            it.insert("kind".to_string(), AttributeValue::S(kind.to_string()));
            store.put_item(it, None).await.unwrap();
        }

        let page = store
            .scan(
                ScanRequest::new()
                    .filter_equals("kind", AttributeValue::S("Y".into()))
                    .limit(1),
            )
            .await
            .unwrap();
        // Read A, filtered out; the page is empty but not finished.
        assert!(page.items.is_empty());
        assert!(page.last_evaluated_key.is_some());
    }

    #[tokio::test]
    async fn test_batch_write_limits() {
        let store = InMemoryStore::new();
        let too_many = (0..26)
            .map(|i| WriteRequest::Put(item("P", &i.to_string())))
            .collect();
        assert!(matches!(
            store.batch_write(too_many).await,
            Err(StoreError::InvalidRequest(_))
        ));

        let duplicate = vec![
            WriteRequest::Put(item("P", "1")),
            WriteRequest::Delete(TableKey::new("P", "1")),
        ];
        assert!(matches!(
            store.batch_write(duplicate).await,
            Err(StoreError::InvalidRequest(_))
        ));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_injected_failures_are_consumed_in_order() {
        let store = InMemoryStore::new();
        store
            .fail_next(StoreOperation::GetItem, StoreError::Throttled("slow down".into()))
            .await;

        let key = TableKey::new("A", "1");
        assert!(matches!(
            store.get_item(&key).await,
            Err(StoreError::Throttled(_))
        ));
        assert_eq!(store.get_item(&key).await, Ok(None));
        assert_eq!(store.call_count(StoreOperation::GetItem).await, 2);
    }
}
