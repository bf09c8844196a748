//! Local caching of REST responses.
//!
//! This module provides the storage side of the data-access layer:
//! - Pluggable string key-value backends (SQLite, memory, no-op)
//! - A JSON adapter that degrades to an always-empty cache when storage is unavailable
//! - The record cache: an entity table keyed by type and primary key, and a
//!   query table keyed by request path

mod record_cache;
mod result;
mod storage;
mod store;

pub use record_cache::RecordCache;
pub use result::{CacheResult, CacheSource};
pub use storage::{KeyValueStorage, MemoryStorage, NoopStorage, SqliteStorage};
pub use store::{KeyValueStore, AVAILABILITY_KEY};
