//! Ordered, identity-preserving lists of records.

use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

use super::record::Record;
use crate::key::values_equal;

type Filter = Arc<dyn Fn(&Record) -> bool + Send + Sync>;

#[derive(Default)]
struct CollectionState {
  records: Vec<Record>,
  filters: Vec<Filter>,
}

impl CollectionState {
  fn accepts(&self, record: &Record) -> bool {
    self.filters.iter().all(|filter| filter(record))
  }
}

struct CollectionInner {
  state: Mutex<CollectionState>,
  revision: watch::Sender<u64>,
}

/// A shared handle to an ordered list of records.
///
/// Like `Record`, clones share state. Reconciliation appends, removes and
/// updates in place so a handle returned from a cached `all` keeps tracking
/// server data.
#[derive(Clone)]
pub struct Collection {
  inner: Arc<CollectionInner>,
}

impl Default for Collection {
  fn default() -> Self {
    Self::new(Vec::new())
  }
}

impl Collection {
  pub fn new(records: Vec<Record>) -> Self {
    let (revision, _) = watch::channel(0);
    Self {
      inner: Arc::new(CollectionInner {
        state: Mutex::new(CollectionState {
          records,
          filters: Vec::new(),
        }),
        revision,
      }),
    }
  }

  fn state(&self) -> MutexGuard<'_, CollectionState> {
    self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  pub fn ptr_eq(a: &Collection, b: &Collection) -> bool {
    Arc::ptr_eq(&a.inner, &b.inner)
  }

  pub fn len(&self) -> usize {
    self.state().records.len()
  }

  pub fn is_empty(&self) -> bool {
    self.state().records.is_empty()
  }

  pub fn get(&self, index: usize) -> Option<Record> {
    self.state().records.get(index).cloned()
  }

  /// Handles to the current records, in order.
  pub fn records(&self) -> Vec<Record> {
    self.state().records.clone()
  }

  /// Primary key of every record, in order.
  pub fn ids(&self) -> Vec<Option<Value>> {
    self.records().iter().map(Record::primary_key).collect()
  }

  /// First record whose primary key equals `key`.
  pub fn find_by_key(&self, key: &Value) -> Option<Record> {
    self
      .records()
      .into_iter()
      .find(|record| record.primary_key().is_some_and(|k| values_equal(&k, key)))
  }

  /// Append a record unless a filter rejects it. Returns whether it was added.
  pub fn push(&self, record: Record) -> bool {
    let added = {
      let mut state = self.state();
      let accepted = state.accepts(&record);
      if accepted {
        state.records.push(record);
      }
      accepted
    };
    if added {
      self.notify();
    }
    added
  }

  /// Append records in order, skipping the ones a filter rejects. Returns the
  /// number added.
  pub fn extend(&self, records: impl IntoIterator<Item = Record>) -> usize {
    let added = {
      let mut state = self.state();
      let before = state.records.len();
      for record in records {
        if state.accepts(&record) {
          state.records.push(record);
        }
      }
      state.records.len() - before
    };
    if added > 0 {
      self.notify();
    }
    added
  }

  /// Remove one record by identity.
  pub fn remove(&self, record: &Record) -> bool {
    self.remove_all(|candidate| Record::ptr_eq(candidate, record)) > 0
  }

  /// Remove every record matching `predicate`, keeping the rest in order.
  pub(crate) fn remove_all(&self, predicate: impl Fn(&Record) -> bool) -> usize {
    let removed = {
      let mut state = self.state();
      let before = state.records.len();
      state.records.retain(|record| !predicate(record));
      before - state.records.len()
    };
    if removed > 0 {
      self.notify();
    }
    removed
  }

  /// Keep only records matching `filter`, now and for every later append.
  pub fn add_filter(&self, filter: impl Fn(&Record) -> bool + Send + Sync + 'static) {
    let filter: Filter = Arc::new(filter);
    let removed = {
      let mut state = self.state();
      let before = state.records.len();
      state.records.retain(|record| filter(record));
      state.filters.push(filter);
      before - state.records.len()
    };
    if removed > 0 {
      self.notify();
    }
  }

  pub fn to_json(&self) -> Value {
    Value::Array(self.records().iter().map(Record::to_json).collect())
  }

  /// Receiver that changes whenever records are added or removed.
  pub fn subscribe(&self) -> watch::Receiver<u64> {
    self.inner.revision.subscribe()
  }

  pub fn revision(&self) -> u64 {
    *self.inner.revision.borrow()
  }

  fn notify(&self) {
    self.inner.revision.send_modify(|revision| *revision += 1);
  }
}

impl fmt::Debug for Collection {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.inner.state.try_lock() {
      Ok(state) => f.debug_list().entries(state.records.iter()).finish(),
      Err(_) => f.write_str("Collection(<locked>)"),
    }
  }
}
