//! Map REST resources onto local records.
//!
//! Records track which declared attributes changed since they were last
//! loaded or saved, derive their paths from primary and parent keys, and run
//! fetch/save/delete against a `Transport`. Resources with caching enabled
//! answer GET requests from a persistent record cache first, then refresh
//! from the network in the background and reconcile the response into the
//! records the caller already holds.
//!
//! ```no_run
//! # async fn demo() -> restmodel::Result<()> {
//! use restmodel::{Client, HttpTransport, MemoryStorage, Parents, RequestOptions, ResourceConfig, Schema};
//!
//! let transport = HttpTransport::new("https://api.example.com")?;
//! let client = Client::with_storage(transport, MemoryStorage::new());
//!
//! let posts = client.resource(
//!   ResourceConfig::new("post", "posts").with_cache(true),
//!   Schema::from_attrs(["title", "tags[]"]),
//! )?;
//!
//! let result = posts.all(&Parents::new(), RequestOptions::default())?.await?;
//! let collection = result.data.clone();
//! result.settled().await;
//! println!("{} posts", collection.len());
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod error;
pub mod key;
pub mod model;
pub mod reconcile;
pub mod resource;
pub mod transport;

#[cfg(test)]
mod testing;

pub use cache::{CacheResult, CacheSource, KeyValueStorage, MemoryStorage, NoopStorage, RecordCache, SqliteStorage};
pub use error::{Error, RequestFailure, Result};
pub use model::{Collection, FieldDef, FieldKind, Record, Schema};
pub use resource::{
  parents, Client, DefaultHooks, Materialized, Parent, Parents, Pending, Persistence, RequestOptions, Resource,
  ResourceConfig, ResourceHooks,
};
pub use transport::{HttpTransport, Method, RequestDescriptor, Transport};
