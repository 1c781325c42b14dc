//! Storage backend implementations.
//!
//! This module implements the repository traits defined in
//! `trackvault_core::storage` over a single DynamoDB table. The raw store is
//! selected at compile time via feature flags.
//!
//! # Feature Flags
//!
//! - `inmemory` (default): in-memory store with DynamoDB semantics, for tests
//!   and local development
//! - `dynamodb`: AWS DynamoDB store using `aws-sdk-dynamodb`
//!
//! Unlike the stores, the key schema, cursor codec and item marshaller are
//! always compiled; the in-memory store runs them unchanged.
//!
//! # Examples
//!
//! Build with DynamoDB:
//! ```bash
//! cargo build -p trackvault --features dynamodb
//! ```

pub mod dynamodb;

#[cfg(any(test, feature = "inmemory"))]
pub mod inmemory;

pub use dynamodb::{DynamoDbRepository, ItemStore, StoreError};

#[cfg(feature = "dynamodb")]
pub use dynamodb::SdkStore;

#[cfg(any(test, feature = "inmemory"))]
pub use inmemory::InMemoryStore;
