//! In-memory storage backend for testing.
//!
//! [`InMemoryStore`] implements the raw [`ItemStore`] contract with the same
//! semantics the access layer relies on from DynamoDB: conditional writes,
//! atomic adds, sparse secondary indexes, limits with `LastEvaluatedKey`,
//! and scans that apply their filter after the limit. Plugged into
//! [`DynamoDbRepository`], it exercises the real key schema and marshalling
//! without a table.
//!
//! # Example
//!
//! ```rust,ignore
//! use trackvault::storage::{DynamoDbRepository, InMemoryStore};
//!
//! let repo = DynamoDbRepository::new(InMemoryStore::new());
//! ```
//!
//! [`ItemStore`]: crate::storage::dynamodb::store::ItemStore
//! [`DynamoDbRepository`]: crate::storage::DynamoDbRepository

mod store;

pub use store::{InMemoryStore, StoreOperation};
