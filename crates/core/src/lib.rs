//! Domain model and storage contracts for trackvault.
//!
//! Everything here is pure: entity types, validation, repository and
//! directory traits, and error kinds. Store-backed implementations live in
//! the `trackvault` crate.

pub mod directory;
pub mod library;
pub mod storage;
