//! Hashferry - one-shot hash migration between RESP-speaking stores
//!
//! Connects to a source and a destination store, selects a logical database
//! on each, enumerates the source keyspace, and copies every hash key with
//! its fields and expiration to the destination. Keys of other types are
//! logged and left behind.

pub mod client;
pub mod migrate;
pub mod protocol;

pub use client::StoreClient;
pub use migrate::{MigrationReport, Migrator, SkippedKey};
