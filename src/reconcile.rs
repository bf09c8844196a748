//! In-place merge of a fresh network response into already returned records.
//!
//! Callers keep handles into what a cached dispatch returned, so nothing here
//! replaces a `Record` or `Collection`. Records with unsaved local edits are
//! left alone.

use serde_json::{Map, Value};
use tracing::debug;

use crate::key::keys_match;
use crate::model::{Collection, Record};

/// What a collection reconciliation changed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Delta {
  pub added: usize,
  pub removed: usize,
  pub updated: usize,
  /// Matched records left untouched because they were dirty
  pub skipped: usize,
}

impl Delta {
  pub fn is_empty(&self) -> bool {
    self.added == 0 && self.removed == 0 && self.updated == 0
  }
}

/// Copy `fresh` onto `materialized` unless it is dirty. Returns whether the
/// record was updated.
pub fn reconcile_record(materialized: &Record, fresh: &Record) -> bool {
  let applied = materialized.absorb_if_clean(&fresh.attributes());
  if !applied {
    debug!(
      type_key = materialized.resource().type_key(),
      "skipped refresh of dirty record"
    );
  }
  applied
}

/// Reconcile `collection` against `fresh`, matching records on any of
/// `primary_keys`.
///
/// New records are appended in their `fresh` order, missing ones removed
/// without reordering the survivors, and matched ones updated unless dirty.
pub fn reconcile_collection(collection: &Collection, fresh: Vec<Record>, primary_keys: &[String]) -> Delta {
  let current: Vec<(Record, _)> = collection
    .records()
    .into_iter()
    .map(|record| {
      let attributes = record.attributes();
      (record, attributes)
    })
    .collect();
  let fresh: Vec<(Record, _)> = fresh
    .into_iter()
    .map(|record| {
      let attributes = record.attributes();
      (record, attributes)
    })
    .collect();

  let matches = |a: &Map<String, Value>, b: &Map<String, Value>| keys_match(primary_keys, a, b);

  let to_add: Vec<Record> = fresh
    .iter()
    .filter(|(_, attrs)| !current.iter().any(|(_, existing)| matches(attrs, existing)))
    .map(|(record, _)| record.clone())
    .collect();

  let to_remove: Vec<Record> = current
    .iter()
    .filter(|(_, attrs)| !fresh.iter().any(|(_, incoming)| matches(attrs, incoming)))
    .map(|(record, _)| record.clone())
    .collect();

  let mut delta = Delta {
    added: collection.extend(to_add),
    removed: collection.remove_all(|record| to_remove.iter().any(|r| Record::ptr_eq(r, record))),
    ..Delta::default()
  };

  for (record, attrs) in &current {
    if to_remove.iter().any(|r| Record::ptr_eq(r, record)) {
      continue;
    }
    let Some((incoming, _)) = fresh.iter().find(|(_, incoming)| matches(attrs, incoming)) else {
      continue;
    };
    if reconcile_record(record, incoming) {
      delta.updated += 1;
    } else {
      delta.skipped += 1;
    }
  }

  debug!(
    added = delta.added,
    removed = delta.removed,
    updated = delta.updated,
    skipped = delta.skipped,
    "reconciled collection"
  );
  delta
}
