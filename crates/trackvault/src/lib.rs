//! Persistence core for trackvault.
//!
//! - [`storage`]: the single-table access layer and aggregate counters
//! - [`sync`]: keeps the authorization directory in step with the store
//! - [`directory`]: directory adapters
//! - [`config`]: environment configuration

pub mod config;
pub mod directory;
pub mod storage;
pub mod sync;

pub use config::Config;
pub use sync::PrivilegeSynchronizer;
