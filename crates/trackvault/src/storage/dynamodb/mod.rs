//! Single-table storage on DynamoDB.
//!
//! The access layer ([`DynamoDbRepository`]) is written against the raw
//! [`ItemStore`] contract. With the `dynamodb` feature, [`SdkStore`] backs it
//! with a real table through `aws-sdk-dynamodb`.

pub mod conversions;
pub mod cursor;
pub mod keys;
pub mod store;

mod repository;

#[cfg(feature = "dynamodb")]
mod client;
#[cfg(feature = "dynamodb")]
mod error;

pub use repository::DynamoDbRepository;
pub use store::{ItemStore, StoreError};

#[cfg(feature = "dynamodb")]
pub use client::SdkStore;
