//! Path building from a base path template and parent keys.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use super::config::ResourceConfig;
use crate::error::{Error, Result};
use crate::key::render_key;
use crate::model::Record;

/// A parent used to fill a `:name` placeholder: either a raw key or a record.
#[derive(Clone)]
pub enum Parent {
  Key(Value),
  Record(Record),
}

impl Parent {
  /// The key this parent contributes to a path, if it has one yet.
  pub fn primary_key(&self) -> Option<Value> {
    match self {
      Parent::Key(Value::Null) => None,
      Parent::Key(value) => Some(value.clone()),
      Parent::Record(record) => record.primary_key(),
    }
  }
}

impl fmt::Debug for Parent {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Parent::Key(value) => f.debug_tuple("Key").field(value).finish(),
      Parent::Record(record) => f
        .debug_tuple("Record")
        .field(&record.resource().type_key())
        .field(&record.primary_key())
        .finish(),
    }
  }
}

impl From<Value> for Parent {
  fn from(value: Value) -> Self {
    Parent::Key(value)
  }
}

impl From<i64> for Parent {
  fn from(value: i64) -> Self {
    Parent::Key(value.into())
  }
}

impl From<u64> for Parent {
  fn from(value: u64) -> Self {
    Parent::Key(value.into())
  }
}

impl From<i32> for Parent {
  fn from(value: i32) -> Self {
    Parent::Key(value.into())
  }
}

impl From<&str> for Parent {
  fn from(value: &str) -> Self {
    Parent::Key(value.into())
  }
}

impl From<String> for Parent {
  fn from(value: String) -> Self {
    Parent::Key(value.into())
  }
}

impl From<Record> for Parent {
  fn from(record: Record) -> Self {
    Parent::Record(record)
  }
}

impl From<&Record> for Parent {
  fn from(record: &Record) -> Self {
    Parent::Record(record.clone())
  }
}

/// Parents keyed by placeholder name.
pub type Parents = BTreeMap<String, Parent>;

/// Build a `Parents` map from `(name, parent)` pairs.
pub fn parents<I, K, P>(entries: I) -> Parents
where
  I: IntoIterator<Item = (K, P)>,
  K: Into<String>,
  P: Into<Parent>,
{
  entries
    .into_iter()
    .map(|(name, parent)| (name.into(), parent.into()))
    .collect()
}

/// Placeholder names in a base path, in order (`posts/:post_id/comments` -> `["post_id"]`).
pub fn parent_key_names(base_path: &str) -> Vec<String> {
  base_path
    .split('/')
    .filter_map(|segment| segment.strip_prefix(':'))
    .filter(|name| !name.is_empty())
    .map(String::from)
    .collect()
}

/// Build the path for a resource, filling placeholders from `parents` and
/// appending `primary_key` when given.
///
/// Fails with `InvalidState` when a placeholder has no parent or the parent
/// record has no primary key yet.
pub fn build_path(config: &ResourceConfig, parents: &Parents, primary_key: Option<&Value>) -> Result<String> {
  let mut segments = Vec::new();

  for segment in config.base_path.split('/').filter(|s| !s.is_empty()) {
    match segment.strip_prefix(':') {
      Some(name) => {
        let key = parents
          .get(name)
          .and_then(Parent::primary_key)
          .ok_or_else(|| Error::invalid_state(format!("no primary key found for parent \"{}\"", name)))?;
        segments.push(render_key(&key));
      }
      None => segments.push(segment.to_string()),
    }
  }

  if let Some(key) = primary_key.filter(|key| !key.is_null()) {
    segments.push(render_key(key));
  }

  let path = format!("/{}", segments.join("/"));

  match config.namespace.as_deref().map(|ns| ns.trim_matches('/')) {
    Some(ns) if !ns.is_empty() => Ok(format!("/{}{}", ns, path)),
    _ => Ok(path),
  }
}
