//! JSON adapter over a `KeyValueStorage` backend.

use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

use super::storage::{KeyValueStorage, NoopStorage};

/// Key written and removed once at construction to check the backend works.
pub const AVAILABILITY_KEY: &str = "_rest-model";

/// Wraps a storage backend with JSON encoding and a no-op fallback.
///
/// If the backend fails the startup check it is replaced by `NoopStorage`,
/// so an environment without storage behaves like an always-empty cache.
/// Failures after the startup check are logged and treated as misses.
#[derive(Clone)]
pub struct KeyValueStore {
  backend: Arc<dyn KeyValueStorage>,
  available: bool,
}

impl KeyValueStore {
  pub fn new(storage: impl KeyValueStorage + 'static) -> Self {
    Self::from_backend(Arc::new(storage))
  }

  pub fn from_backend(backend: Arc<dyn KeyValueStorage>) -> Self {
    let check = backend
      .set_item(AVAILABILITY_KEY, "true")
      .and_then(|_| backend.remove_item(AVAILABILITY_KEY));

    match check {
      Ok(()) => Self {
        backend,
        available: true,
      },
      Err(e) => {
        warn!(error = %e, "persistent storage unavailable, caching disabled");
        Self::disabled()
      }
    }
  }

  /// A store that never holds anything.
  pub fn disabled() -> Self {
    Self {
      backend: Arc::new(NoopStorage),
      available: false,
    }
  }

  /// Whether the backend passed the startup check.
  pub fn is_available(&self) -> bool {
    self.available
  }

  /// Read and decode the value under `key`. Missing, unreadable and
  /// unparseable values are all `None`.
  pub fn get(&self, key: &str) -> Option<Value> {
    let raw = match self.backend.get_item(key) {
      Ok(raw) => raw?,
      Err(e) => {
        warn!(key, error = %e, "cache read failed");
        return None;
      }
    };

    match serde_json::from_str(&raw) {
      Ok(Value::Null) => None,
      Ok(value) => Some(value),
      Err(e) => {
        warn!(key, error = %e, "ignoring corrupt cache entry");
        None
      }
    }
  }

  /// Encode and store `value` under `key`, returning the value.
  pub fn set(&self, key: &str, value: Value) -> Value {
    let encoded = value.to_string();
    if let Err(e) = self.backend.set_item(key, &encoded) {
      warn!(key, error = %e, "cache write failed");
    }
    value
  }

  pub fn remove(&self, key: &str) {
    if let Err(e) = self.backend.remove_item(key) {
      warn!(key, error = %e, "cache remove failed");
    }
  }
}

impl std::fmt::Debug for KeyValueStore {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("KeyValueStore")
      .field("available", &self.available)
      .finish_non_exhaustive()
  }
}
