//! Raw key-value store contract.
//!
//! The access layer talks to the table only through [`ItemStore`]. The AWS SDK
//! adapter implements it against a real table; the in-memory store implements
//! the same semantics for tests and local development.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use thiserror::Error;

/// A stored item: attribute name to value.
pub type Item = HashMap<String, AttributeValue>;

/// Largest number of writes accepted by one [`ItemStore::batch_write`] call.
pub const MAX_BATCH_WRITE: usize = 25;

pub const PK: &str = "PK";
pub const SK: &str = "SK";
pub const GSI1PK: &str = "GSI1PK";
pub const GSI1SK: &str = "GSI1SK";
pub const GSI2PK: &str = "GSI2PK";
pub const GSI2SK: &str = "GSI2SK";
pub const ENTITY_TYPE: &str = "entityType";

/// Primary key of an item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableKey {
    pub pk: String,
    pub sk: String,
}

impl TableKey {
    pub fn new(pk: impl Into<String>, sk: impl Into<String>) -> Self {
        Self {
            pk: pk.into(),
            sk: sk.into(),
        }
    }

    /// Reads the primary key attributes of an item.
    pub fn from_item(item: &Item) -> Option<Self> {
        let pk = item.get(PK)?.as_s().ok()?;
        let sk = item.get(SK)?.as_s().ok()?;
        Some(Self::new(pk.clone(), sk.clone()))
    }

    /// The key as an attribute map, as the SDK expects it.
    pub fn to_item(&self) -> Item {
        HashMap::from([
            (PK.to_string(), AttributeValue::S(self.pk.clone())),
            (SK.to_string(), AttributeValue::S(self.sk.clone())),
        ])
    }
}

/// Secondary indexes of the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Index {
    Gsi1,
    Gsi2,
}

impl Index {
    pub fn name(&self) -> &'static str {
        match self {
            Index::Gsi1 => "GSI1",
            Index::Gsi2 => "GSI2",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "GSI1" => Some(Index::Gsi1),
            "GSI2" => Some(Index::Gsi2),
            _ => None,
        }
    }

    pub fn pk_attribute(&self) -> &'static str {
        match self {
            Index::Gsi1 => GSI1PK,
            Index::Gsi2 => GSI2PK,
        }
    }

    pub fn sk_attribute(&self) -> &'static str {
        match self {
            Index::Gsi1 => GSI1SK,
            Index::Gsi2 => GSI2SK,
        }
    }
}

/// Precondition evaluated atomically with a single-item write.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `attribute_exists(PK)`
    Exists,
    /// `attribute_not_exists(PK)`
    NotExists,
    /// `attribute_exists(PK) AND <attribute> = <value>`
    Equals {
        attribute: String,
        value: AttributeValue,
    },
}

impl Condition {
    pub fn equals(attribute: impl Into<String>, value: AttributeValue) -> Self {
        Condition::Equals {
            attribute: attribute.into(),
            value,
        }
    }
}

/// One clause of an update expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// `SET <attribute> = <value>`
    Set(String, AttributeValue),
    /// `ADD <attribute> <delta>` on a number attribute.
    Add(String, i64),
    /// `REMOVE <attribute>`
    Remove(String),
}

impl Update {
    pub fn set(attribute: impl Into<String>, value: AttributeValue) -> Self {
        Update::Set(attribute.into(), value)
    }

    pub fn attribute(&self) -> &str {
        match self {
            Update::Set(name, _) | Update::Add(name, _) | Update::Remove(name) => name,
        }
    }
}

/// Predicate on the sort key of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortKeyCondition {
    BeginsWith(String),
    Equals(String),
}

impl SortKeyCondition {
    pub fn matches(&self, sort_key: &str) -> bool {
        match self {
            SortKeyCondition::BeginsWith(prefix) => sort_key.starts_with(prefix.as_str()),
            SortKeyCondition::Equals(value) => sort_key == value,
        }
    }
}

/// A key-condition query against the table or one of its indexes.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub index: Option<Index>,
    pub partition: String,
    pub sort: Option<SortKeyCondition>,
    pub limit: Option<u32>,
    pub exclusive_start_key: Option<Item>,
    pub scan_forward: bool,
}

impl QueryRequest {
    pub fn new(partition: impl Into<String>) -> Self {
        Self {
            index: None,
            partition: partition.into(),
            sort: None,
            limit: None,
            exclusive_start_key: None,
            scan_forward: true,
        }
    }

    pub fn on_index(mut self, index: Index) -> Self {
        self.index = Some(index);
        self
    }

    pub fn sort_begins_with(mut self, prefix: impl Into<String>) -> Self {
        self.sort = Some(SortKeyCondition::BeginsWith(prefix.into()));
        self
    }

    pub fn sort_equals(mut self, value: impl Into<String>) -> Self {
        self.sort = Some(SortKeyCondition::Equals(value.into()));
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn start_after(mut self, key: Option<Item>) -> Self {
        self.exclusive_start_key = key;
        self
    }

    pub fn forward(mut self, scan_forward: bool) -> Self {
        self.scan_forward = scan_forward;
        self
    }
}

/// A full-table scan. The filter is applied after `limit` items have been
/// read, so a page may hold fewer matches than the limit.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanRequest {
    /// Only items whose `attribute` equals `value` are returned.
    pub filter: Option<(String, AttributeValue)>,
    pub limit: Option<u32>,
    pub exclusive_start_key: Option<Item>,
}

impl ScanRequest {
    pub fn new() -> Self {
        Self {
            filter: None,
            limit: None,
            exclusive_start_key: None,
        }
    }

    pub fn filter_equals(mut self, attribute: impl Into<String>, value: AttributeValue) -> Self {
        self.filter = Some((attribute.into(), value));
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn start_after(mut self, key: Option<Item>) -> Self {
        self.exclusive_start_key = key;
        self
    }
}

impl Default for ScanRequest {
    fn default() -> Self {
        Self::new()
    }
}

/// One page of raw query or scan results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemPage {
    pub items: Vec<Item>,
    /// Set when the store stopped before exhausting the range.
    pub last_evaluated_key: Option<Item>,
}

/// One entry of a batch write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteRequest {
    Put(Item),
    Delete(TableKey),
}

/// Errors reported by an [`ItemStore`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A write precondition did not hold.
    #[error("conditional check failed")]
    ConditionFailed,
    #[error("throttled: {0}")]
    Throttled(String),
    #[error("unavailable: {0}")]
    Unavailable(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Result type for raw store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Single-table key-value store with conditional writes, atomic adds and
/// secondary indexes.
#[async_trait]
pub trait ItemStore: Send + Sync {
    async fn put_item(&self, item: Item, condition: Option<Condition>) -> StoreResult<()>;

    async fn get_item(&self, key: &TableKey) -> StoreResult<Option<Item>>;

    /// Applies `updates` and returns the item as it is after the write.
    async fn update_item(
        &self,
        key: &TableKey,
        updates: Vec<Update>,
        condition: Option<Condition>,
    ) -> StoreResult<Item>;

    async fn delete_item(&self, key: &TableKey, condition: Option<Condition>) -> StoreResult<()>;

    async fn query(&self, request: QueryRequest) -> StoreResult<ItemPage>;

    async fn scan(&self, request: ScanRequest) -> StoreResult<ItemPage>;

    /// Writes up to [`MAX_BATCH_WRITE`] items. Not atomic; any write left
    /// unprocessed is reported as `Throttled`.
    async fn batch_write(&self, requests: Vec<WriteRequest>) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_key_item_round_trip() {
        let key = TableKey::new("ACCOUNT#a", "PROFILE");
        assert_eq!(TableKey::from_item(&key.to_item()), Some(key));
    }

    #[test]
    fn test_table_key_from_item_requires_both_parts() {
        let mut item = Item::new();
        item.insert(PK.to_string(), AttributeValue::S("ACCOUNT#a".to_string()));
        assert_eq!(TableKey::from_item(&item), None);
    }

    #[test]
    fn test_index_attributes() {
        assert_eq!(Index::Gsi1.pk_attribute(), "GSI1PK");
        assert_eq!(Index::Gsi2.sk_attribute(), "GSI2SK");
        assert_eq!(Index::from_name("GSI2"), Some(Index::Gsi2));
        assert_eq!(Index::from_name("GSI3"), None);
    }

    #[test]
    fn test_sort_key_condition() {
        assert!(SortKeyCondition::BeginsWith("TAG#".into()).matches("TAG#rock"));
        assert!(!SortKeyCondition::BeginsWith("TAG#".into()).matches("ITEM#1"));
        assert!(SortKeyCondition::Equals("PROFILE".into()).matches("PROFILE"));
    }
}
