//! Entity and query tables layered over the key-value store.
//!
//! - Entity table: `"<type_key>: <primary key>"` maps to the JSON snapshot of
//!   one entity's attributes.
//! - Query table: the request path maps to the ordered primary keys of a
//!   collection response, or to the single primary key of an item response.
//!
//! Query lists may reference entities that were since removed; those keys
//! resolve to nothing and are dropped on read.

use serde_json::{Map, Value};
use tracing::debug;

use super::store::KeyValueStore;
use crate::key::{primary_key_of, render_key};

/// Record cache shared by every resource bound to the same client.
#[derive(Debug, Clone)]
pub struct RecordCache {
  store: KeyValueStore,
}

impl RecordCache {
  pub fn new(store: KeyValueStore) -> Self {
    Self { store }
  }

  /// A cache that never stores anything.
  pub fn disabled() -> Self {
    Self::new(KeyValueStore::disabled())
  }

  pub fn store(&self) -> &KeyValueStore {
    &self.store
  }

  /// Cache key of an entity in the entity table.
  pub fn entity_key(type_key: &str, primary_key: &Value) -> String {
    format!("{}: {}", type_key, render_key(primary_key))
  }

  // ==========================================================================
  // Entity table
  // ==========================================================================

  /// Get the cached snapshot of one entity.
  pub fn get_entity(&self, type_key: &str, primary_key: &Value) -> Option<Map<String, Value>> {
    match self.store.get(&Self::entity_key(type_key, primary_key))? {
      Value::Object(snapshot) => Some(snapshot),
      _ => None,
    }
  }

  /// Merge `snapshot` into the cached entity: new fields win, fields the
  /// snapshot does not mention survive.
  pub fn put_entity(&self, type_key: &str, primary_key: &Value, snapshot: &Map<String, Value>) {
    // Re-read at write time; another task may have written since our caller read.
    let mut merged = self.get_entity(type_key, primary_key).unwrap_or_default();
    for (field, value) in snapshot {
      merged.insert(field.clone(), value.clone());
    }
    self
      .store
      .set(&Self::entity_key(type_key, primary_key), Value::Object(merged));
  }

  /// Alias of `put_entity`, named for the targeted-patch use after a save.
  pub fn merge_entity(&self, type_key: &str, primary_key: &Value, snapshot: &Map<String, Value>) {
    self.put_entity(type_key, primary_key, snapshot);
  }

  /// Replace the cached entity with `snapshot`.
  pub fn replace_entity(&self, type_key: &str, primary_key: &Value, snapshot: &Map<String, Value>) {
    self.store.set(
      &Self::entity_key(type_key, primary_key),
      Value::Object(snapshot.clone()),
    );
  }

  /// Remove one entity. Query lists that mention it are left as they are.
  pub fn remove_entity(&self, type_key: &str, primary_key: &Value) {
    self.store.remove(&Self::entity_key(type_key, primary_key));
  }

  // ==========================================================================
  // Query table
  // ==========================================================================

  /// Resolve the cached response for `path`.
  ///
  /// Returns an array of snapshots for a cached collection (entities that no
  /// longer resolve are skipped), a single snapshot for a cached item, and
  /// `None` for a miss.
  pub fn get_query_result(&self, type_key: &str, path: &str) -> Option<Value> {
    match self.store.get(path)? {
      Value::Array(keys) => {
        let snapshots: Vec<Value> = keys
          .iter()
          .filter_map(|key| self.get_entity(type_key, key))
          .map(Value::Object)
          .collect();

        if snapshots.len() < keys.len() {
          debug!(
            path,
            missing = keys.len() - snapshots.len(),
            "dropped unresolvable keys from cached query"
          );
        }

        Some(Value::Array(snapshots))
      }
      key @ (Value::String(_) | Value::Number(_)) => {
        self.get_entity(type_key, &key).map(Value::Object)
      }
      _ => None,
    }
  }

  /// Store a response for `path`.
  ///
  /// Every item is written to the entity table with full overwrite (a query
  /// response is authoritative for the fields it returns) and the ordered
  /// keys are written to the query table. Items without a primary key cannot
  /// be filed and are skipped.
  pub fn put_query_result(&self, type_key: &str, primary_keys: &[String], path: &str, response: &Value) {
    match response {
      Value::Array(items) => {
        let mut keys = Vec::with_capacity(items.len());
        for snapshot in items.iter().filter_map(Value::as_object) {
          match primary_key_of(snapshot, primary_keys) {
            Some(key) => {
              self.replace_entity(type_key, &key, snapshot);
              keys.push(key);
            }
            None => debug!(path, "skipping cached item without primary key"),
          }
        }
        self.store.set(path, Value::Array(keys));
      }
      Value::Object(snapshot) => match primary_key_of(snapshot, primary_keys) {
        Some(key) => {
          self.replace_entity(type_key, &key, snapshot);
          self.store.set(path, key);
        }
        None => debug!(path, "not caching item response without primary key"),
      },
      _ => debug!(path, "not caching non-object response"),
    }
  }

  /// Forget the query-table entry for `path`.
  pub fn clear_query(&self, path: &str) {
    self.store.remove(path);
  }
}
