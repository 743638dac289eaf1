//! # fitchat-store
//!
//! Local persistence for the FitApp chat client.
//!
//! Everything is stored in a string key-value store with a finite capacity
//! ([`KeyValueStore`]): an in-memory map or a SQLite table. On top of it,
//! [`ChatStore`] provides the per-conversation message cache, the offline
//! outbox and the notification preferences, and recovers from
//! quota-exceeded rejections without surfacing them to callers.

pub mod cache;
pub mod database;
pub mod keys;
pub mod kv;
pub mod limits;
pub mod migrations;
pub mod outbox;
pub mod preferences;
pub mod recovery;
pub mod store;

mod error;

pub use database::SqliteStore;
pub use error::{Result, StoreError};
pub use kv::{KeyValueStore, MemoryStore};
pub use limits::StoreLimits;
pub use store::{ChatStore, WriteOutcome};
