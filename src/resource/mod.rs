//! Resource types bound to a client, and the cache-aware dispatcher.

mod config;
mod dispatch;
mod hooks;
mod path;

use futures::future::BoxFuture;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

use crate::cache::{KeyValueStorage, KeyValueStore, RecordCache};
use crate::error::{Error, Result};
use crate::model::{Record, Schema};
use crate::transport::{Method, RequestDescriptor, Transport};

pub use config::{Persistence, RequestOptions, ResourceConfig};
pub use dispatch::Materialized;
pub use hooks::{DefaultHooks, ResourceHooks};
pub use path::{build_path, parent_key_names, parents, Parent, Parents};

/// An asynchronous result whose preconditions were already checked.
///
/// Operations that can fail before any request is made return
/// `Result<Pending<T>>`: the outer `Err` is the immediate `InvalidState`,
/// the future carries transport failures.
pub type Pending<T> = BoxFuture<'static, Result<T>>;

// ============================================================================
// Client
// ============================================================================

/// Shared transport and record cache for a set of resources.
#[derive(Clone)]
pub struct Client {
  transport: Arc<dyn Transport>,
  cache: RecordCache,
}

impl Client {
  pub fn new(transport: impl Transport + 'static, cache: RecordCache) -> Self {
    Self {
      transport: Arc::new(transport),
      cache,
    }
  }

  /// Client whose record cache is backed by `storage`, checked on creation.
  pub fn with_storage(transport: impl Transport + 'static, storage: impl KeyValueStorage + 'static) -> Self {
    Self::new(transport, RecordCache::new(KeyValueStore::new(storage)))
  }

  /// Client that never caches.
  pub fn without_cache(transport: impl Transport + 'static) -> Self {
    Self::new(transport, RecordCache::disabled())
  }

  pub fn cache(&self) -> &RecordCache {
    &self.cache
  }

  pub(crate) fn transport(&self) -> &dyn Transport {
    self.transport.as_ref()
  }

  /// Bind a resource type with the default hooks.
  pub fn resource(&self, config: ResourceConfig, schema: Schema) -> Result<Resource> {
    self.resource_with_hooks(config, schema, DefaultHooks)
  }

  pub fn resource_with_hooks(
    &self,
    config: ResourceConfig,
    schema: Schema,
    hooks: impl ResourceHooks + 'static,
  ) -> Result<Resource> {
    if config.type_key.trim().is_empty() {
      return Err(Error::invalid_state(format!(
        "resource at \"{}\" needs a type key",
        config.base_path
      )));
    }
    if config.primary_keys.is_empty() {
      return Err(Error::invalid_state(format!(
        "resource \"{}\" needs at least one primary key candidate",
        config.type_key
      )));
    }

    let parent_keys = parent_key_names(&config.base_path);

    Ok(Resource {
      inner: Arc::new(ResourceInner {
        config,
        schema,
        hooks: Arc::new(hooks),
        client: self.clone(),
        parent_keys,
      }),
    })
  }
}

impl fmt::Debug for Client {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Client").field("cache", &self.cache).finish()
  }
}

// ============================================================================
// Resource
// ============================================================================

struct ResourceInner {
  config: ResourceConfig,
  schema: Schema,
  hooks: Arc<dyn ResourceHooks>,
  client: Client,
  parent_keys: Vec<String>,
}

/// A resource type: its configuration and schema, bound to a client.
#[derive(Clone)]
pub struct Resource {
  inner: Arc<ResourceInner>,
}

/// How a response body is prepared before it is cached or materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Decoding {
  /// Fetch/save/delete of a single record: only the deserialize hook
  Record,
  /// Dispatched queries: `force_array` first, then deserialize per item
  Query,
}

impl Resource {
  pub fn config(&self) -> &ResourceConfig {
    &self.inner.config
  }

  pub fn schema(&self) -> &Schema {
    &self.inner.schema
  }

  pub fn hooks(&self) -> &dyn ResourceHooks {
    self.inner.hooks.as_ref()
  }

  pub fn client(&self) -> &Client {
    &self.inner.client
  }

  pub fn cache(&self) -> &RecordCache {
    self.inner.client.cache()
  }

  pub fn type_key(&self) -> &str {
    &self.inner.config.type_key
  }

  pub fn primary_keys(&self) -> &[String] {
    &self.inner.config.primary_keys
  }

  /// Placeholder names in the base path, in order.
  pub fn parent_key_names(&self) -> &[String] {
    &self.inner.parent_keys
  }

  /// See `path::build_path`.
  pub fn build_path(&self, parents: &Parents, primary_key: Option<&Value>) -> Result<String> {
    build_path(&self.inner.config, parents, primary_key)
  }

  /// An empty record.
  pub fn new_record(&self) -> Record {
    self.materialize(Map::new(), &Parents::new())
  }

  /// A record with initial attributes. `Value::Null` gives an empty record.
  pub fn create(&self, attributes: Value) -> Result<Record> {
    self.create_with_parents(attributes, Parents::new())
  }

  pub fn create_with_parents(&self, attributes: Value, parents: Parents) -> Result<Record> {
    match attributes {
      Value::Object(attributes) => Ok(self.materialize(attributes, &parents)),
      Value::Null => Ok(self.materialize(Map::new(), &parents)),
      other => Err(Error::Decode(format!(
        "{} attributes must be an object, got {}",
        self.type_key(),
        other
      ))),
    }
  }

  pub(crate) fn materialize(&self, attributes: Map<String, Value>, parents: &Parents) -> Record {
    Record::new(self.clone(), attributes, parents.clone())
  }

  /// Descriptor for a request against `url` with per-call headers applied.
  pub(crate) fn descriptor(
    &self,
    method: Method,
    url: String,
    body: Option<String>,
    options: &RequestOptions,
  ) -> RequestDescriptor {
    let mut descriptor = RequestDescriptor::new(method, url);
    descriptor.body = body;
    descriptor.headers.extend(options.headers.iter().cloned());
    descriptor
  }

  /// Send through the client's transport with the headers hook applied, and
  /// prepare the response body.
  pub(crate) async fn send(&self, mut descriptor: RequestDescriptor, decoding: Decoding) -> Result<Value> {
    let extra = self.hooks().headers(&descriptor);
    descriptor.headers.extend(extra);

    let response = self.client().transport().request(descriptor).await?;
    Ok(self.decode(response, decoding))
  }

  fn decode(&self, response: Value, decoding: Decoding) -> Value {
    let hooks = self.hooks();
    match decoding {
      Decoding::Record => hooks.deserialize(response),
      Decoding::Query => {
        let response = match response {
          Value::Object(object) if self.config().force_array => object_to_array(object),
          other => other,
        };
        match response {
          Value::Array(items) => Value::Array(items.into_iter().map(|item| hooks.deserialize(item)).collect()),
          Value::Null => Value::Null,
          other => hooks.deserialize(other),
        }
      }
    }
  }
}

impl fmt::Debug for Resource {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Resource")
      .field("type_key", &self.type_key())
      .field("base_path", &self.config().base_path)
      .finish()
  }
}

/// `{ "a": 1 }` becomes `[{ "key": "a", "value": 1 }]`.
fn object_to_array(object: Map<String, Value>) -> Value {
  Value::Array(
    object
      .into_iter()
      .map(|(key, value)| {
        let mut item = Map::new();
        item.insert("key".to_string(), Value::String(key));
        item.insert("value".to_string(), value);
        Value::Object(item)
      })
      .collect(),
  )
}
