use serde::{Deserialize, Serialize};

use super::{RepositoryError, Result};

/// Page size used when a listing does not ask for one.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Largest page size a listing may ask for.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Direction of a listing relative to the native sort-key order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn is_ascending(&self) -> bool {
        matches!(self, SortOrder::Ascending)
    }
}

/// Paging parameters shared by every listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    pub limit: Option<u32>,
    pub order: SortOrder,
    /// Opaque token returned as `next_cursor` by the previous page.
    pub cursor: Option<String>,
}

impl ListOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn descending(mut self) -> Self {
        self.order = SortOrder::Descending;
        self
    }

    pub fn with_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }

    /// Options for the page following `page`, or `None` when it was the last.
    pub fn next<T>(&self, page: &Page<T>) -> Option<Self> {
        page.next_cursor.as_ref().map(|cursor| Self {
            limit: self.limit,
            order: self.order,
            cursor: Some(cursor.clone()),
        })
    }
}

/// Bounds applied to requested page sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default: u32,
    pub max: u32,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default: DEFAULT_PAGE_SIZE,
            max: MAX_PAGE_SIZE,
        }
    }
}

impl PageLimits {
    /// Resolves the effective page size for a request.
    ///
    /// Missing limits fall back to the default; limits outside `1..=max` are
    /// rejected rather than clamped.
    pub fn resolve(&self, requested: Option<u32>) -> Result<u32> {
        let limit = requested.unwrap_or(self.default);
        if limit == 0 || limit > self.max {
            return Err(RepositoryError::InvalidInput(format!(
                "limit must be between 1 and {}, got {}",
                self.max, limit
            )));
        }
        Ok(limit)
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Present only when more results remain.
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, next_cursor: Option<String>) -> Self {
        Self { items, next_cursor }
    }

    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            next_cursor: None,
        }
    }

    pub fn has_more(&self) -> bool {
        self.next_cursor.is_some()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            next_cursor: self.next_cursor,
        }
    }
}

/// How a delete treats a missing target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteMode {
    /// Deleting an absent item is `NotFound`.
    MustExist,
    /// Deleting an absent item succeeds.
    Idempotent,
}

/// Denormalized counters maintained by atomic adds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CounterTarget {
    TagItems { owner_id: String, tag_name: String },
    CollectionItems { owner_id: String, collection_id: String },
    CollectionDuration { owner_id: String, collection_id: String },
    CreatorFollowers { account_id: String },
    AccountFollowing { account_id: String },
    ListItems { owner_id: String, list_id: String },
}
