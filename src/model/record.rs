//! Model records: attribute state, dirty tracking and the request lifecycle.

use serde_json::{Map, Value};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::debug;

use super::schema::{FieldKind, Schema};
use crate::error::{Error, Result};
use crate::key::{primary_key_of, values_equal};
use crate::resource::{Decoding, Parent, Parents, Pending, Persistence, RequestOptions, Resource};
use crate::transport::Method;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
  Fetch,
  Save,
  Delete,
}

/// Outstanding requests per operation kind, plus the total.
#[derive(Debug, Default)]
struct InFlight {
  fetching: u32,
  saving: u32,
  deleting: u32,
  requests: u32,
}

impl InFlight {
  fn counter(&mut self, operation: Operation) -> &mut u32 {
    match operation {
      Operation::Fetch => &mut self.fetching,
      Operation::Save => &mut self.saving,
      Operation::Delete => &mut self.deleting,
    }
  }
}

struct RecordState {
  attributes: Map<String, Value>,
  /// Declared attributes as of construction or the last successful fetch/save
  original: Map<String, Value>,
  parents: Parents,
  errors: Vec<String>,
  in_flight: InFlight,
}

impl RecordState {
  fn dirty_fields(&self, schema: &Schema) -> Vec<String> {
    schema
      .names()
      .filter(|name| {
        let current = self.attributes.get(*name).unwrap_or(&Value::Null);
        let original = self.original.get(*name).unwrap_or(&Value::Null);
        !values_equal(current, original)
      })
      .map(String::from)
      .collect()
  }

  fn take_snapshot(&mut self, schema: &Schema) {
    self.original = schema
      .names()
      .map(|name| {
        let value = self.attributes.get(name).cloned().unwrap_or(Value::Null);
        (name.to_string(), value)
      })
      .collect();
  }

  fn merge(&mut self, attributes: &Map<String, Value>) {
    for (field, value) in attributes {
      self.attributes.insert(field.clone(), value.clone());
    }
  }
}

struct RecordInner {
  resource: Resource,
  state: Mutex<RecordState>,
  revision: watch::Sender<u64>,
}

/// A shared handle to one resource instance.
///
/// Clones refer to the same instance; use `Record::ptr_eq` to compare
/// identity. Reconciliation mutates records in place, so handles held by
/// callers observe refreshed data.
#[derive(Clone)]
pub struct Record {
  inner: Arc<RecordInner>,
}

impl Record {
  pub(crate) fn new(resource: Resource, mut attributes: Map<String, Value>, parents: Parents) -> Self {
    for field in resource.schema().fields() {
      if field.kind == FieldKind::Array && attributes.get(&field.name).map_or(true, Value::is_null) {
        attributes.insert(field.name.clone(), Value::Array(Vec::new()));
      }
    }

    let mut state = RecordState {
      attributes,
      original: Map::new(),
      parents,
      errors: Vec::new(),
      in_flight: InFlight::default(),
    };
    state.take_snapshot(resource.schema());

    let (revision, _) = watch::channel(0);

    Self {
      inner: Arc::new(RecordInner {
        resource,
        state: Mutex::new(state),
        revision,
      }),
    }
  }

  fn state(&self) -> MutexGuard<'_, RecordState> {
    self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn schema(&self) -> &Schema {
    self.inner.resource.schema()
  }

  pub fn resource(&self) -> &Resource {
    &self.inner.resource
  }

  /// Whether two handles refer to the same instance.
  pub fn ptr_eq(a: &Record, b: &Record) -> bool {
    Arc::ptr_eq(&a.inner, &b.inner)
  }

  // ==========================================================================
  // Attributes
  // ==========================================================================

  pub fn get(&self, field: &str) -> Option<Value> {
    self.state().attributes.get(field).cloned()
  }

  pub fn set(&self, field: &str, value: impl Into<Value>) {
    self.state().attributes.insert(field.to_string(), value.into());
  }

  /// Set several attributes at once; fields not mentioned are kept.
  pub fn set_all(&self, attributes: &Map<String, Value>) {
    self.state().merge(attributes);
  }

  /// Append to an array attribute, creating it if missing.
  pub fn push_to(&self, field: &str, value: impl Into<Value>) {
    let value = value.into();
    let mut state = self.state();
    match state.attributes.get_mut(field) {
      Some(Value::Array(items)) => items.push(value),
      _ => {
        state
          .attributes
          .insert(field.to_string(), Value::Array(vec![value]));
      }
    }
  }

  /// All attributes, declared or not.
  pub fn attributes(&self) -> Map<String, Value> {
    self.state().attributes.clone()
  }

  /// The declared attributes that are present.
  pub fn to_object(&self) -> Map<String, Value> {
    let state = self.state();
    self
      .schema()
      .names()
      .filter_map(|name| state.attributes.get(name).map(|v| (name.to_string(), v.clone())))
      .collect()
  }

  pub fn to_json(&self) -> Value {
    Value::Object(self.attributes())
  }

  /// JSON body sent when saving: the configured serializable properties, or
  /// the declared attributes, passed through the resource's serialize hook.
  pub fn serialize(&self) -> String {
    let resource = self.resource();
    let object = match &resource.config().serializable_properties {
      Some(properties) => {
        let state = self.state();
        properties
          .iter()
          .filter_map(|p| state.attributes.get(p).map(|v| (p.clone(), v.clone())))
          .collect()
      }
      None => self.to_object(),
    };

    Value::Object(resource.hooks().serialize(object)).to_string()
  }

  // ==========================================================================
  // Identity
  // ==========================================================================

  /// Value of the first primary-key candidate that is set.
  pub fn primary_key(&self) -> Option<Value> {
    primary_key_of(&self.state().attributes, &self.resource().config().primary_keys)
  }

  pub fn is_new(&self) -> bool {
    self.primary_key().is_none()
  }

  pub fn is_persisted(&self) -> bool {
    match &self.resource().config().persistence {
      Persistence::PrimaryKey => !self.is_new(),
      Persistence::MarkerField(field) => self
        .state()
        .attributes
        .get(field)
        .is_some_and(|v| !v.is_null()),
    }
  }

  /// Explicit parents, falling back to attributes named like the base
  /// path's placeholders (a comment's `post_id` field).
  pub fn parents(&self) -> Parents {
    let state = self.state();
    let mut parents = state.parents.clone();

    for name in self.resource().parent_key_names() {
      if parents.contains_key(name) {
        continue;
      }
      if let Some(value) = state.attributes.get(name).filter(|v| !v.is_null()) {
        parents.insert(name.clone(), Parent::Key(value.clone()));
      }
    }

    parents
  }

  pub fn set_parent(&self, name: impl Into<String>, parent: impl Into<Parent>) {
    self.state().parents.insert(name.into(), parent.into());
  }

  /// Path of this record: the collection path while it is not persisted,
  /// the member path afterwards.
  pub fn path(&self) -> Result<String> {
    let primary_key = if self.is_persisted() {
      self.primary_key()
    } else {
      None
    };
    self
      .resource()
      .build_path(&self.parents(), primary_key.as_ref())
  }

  fn require_primary_key(&self, action: &str) -> Result<Value> {
    self.primary_key().ok_or_else(|| {
      Error::invalid_state(format!(
        "can not {} a {} record with no primary key",
        action,
        self.resource().type_key()
      ))
    })
  }

  // ==========================================================================
  // Dirty tracking
  // ==========================================================================

  /// Declared attributes that differ from the last snapshot.
  pub fn dirty_fields(&self) -> Vec<String> {
    self.state().dirty_fields(self.schema())
  }

  pub fn is_dirty(&self) -> bool {
    !self.dirty_fields().is_empty()
  }

  pub fn is_clean(&self) -> bool {
    !self.is_dirty()
  }

  /// Restore declared attributes to their snapshot values.
  pub fn revert(&self) {
    {
      let mut state = self.state();
      let original = state.original.clone();
      for (field, value) in original {
        if value.is_null() {
          state.attributes.remove(&field);
        } else {
          state.attributes.insert(field, value);
        }
      }
    }
    self.notify();
  }

  /// Merge `attributes` in, mark the record clean and clear its errors.
  pub(crate) fn absorb(&self, attributes: &Map<String, Value>) {
    {
      let mut state = self.state();
      state.merge(attributes);
      state.take_snapshot(self.schema());
      state.errors.clear();
    }
    self.notify();
  }

  /// Like `absorb`, but leaves a dirty record untouched. Returns whether the
  /// attributes were applied.
  pub(crate) fn absorb_if_clean(&self, attributes: &Map<String, Value>) -> bool {
    {
      let mut state = self.state();
      if !state.dirty_fields(self.schema()).is_empty() {
        return false;
      }
      state.merge(attributes);
      state.take_snapshot(self.schema());
    }
    self.notify();
    true
  }

  fn mark_saved(&self) {
    {
      let mut state = self.state();
      state.take_snapshot(self.schema());
      state.errors.clear();
    }
    self.notify();
  }

  // ==========================================================================
  // Request state
  // ==========================================================================

  pub fn errors(&self) -> Vec<String> {
    self.state().errors.clone()
  }

  pub fn is_fetching(&self) -> bool {
    self.state().in_flight.fetching > 0
  }

  pub fn is_saving(&self) -> bool {
    self.state().in_flight.saving > 0
  }

  pub fn is_deleting(&self) -> bool {
    self.state().in_flight.deleting > 0
  }

  /// Whether any request for this record is outstanding.
  pub fn in_flight(&self) -> bool {
    self.state().in_flight.requests > 0
  }

  /// Receiver that changes whenever the attributes are replaced by a fetch,
  /// save or background refresh.
  pub fn subscribe(&self) -> watch::Receiver<u64> {
    self.inner.revision.subscribe()
  }

  pub fn revision(&self) -> u64 {
    *self.inner.revision.borrow()
  }

  fn notify(&self) {
    self.inner.revision.send_modify(|revision| *revision += 1);
  }

  fn capture_errors(&self, err: &Error) {
    if let Error::RequestFailed(failure) = err {
      let errors = self.resource().hooks().assign_errors(failure);
      if !errors.is_empty() {
        self.state().errors = errors;
      }
    }
  }

  // ==========================================================================
  // Lifecycle
  // ==========================================================================

  /// Reload this record from its member path.
  ///
  /// Fails immediately with `InvalidState` when there is no primary key.
  pub fn fetch(&self, options: RequestOptions) -> Result<Pending<Record>> {
    let primary_key = self.require_primary_key("fetch")?;
    let resource = self.resource().clone();
    let url = match &options.url {
      Some(url) => url.clone(),
      None => resource.build_path(&self.parents(), Some(&primary_key))?,
    };
    let descriptor = resource.descriptor(Method::Get, url, None, &options);
    let guard = FlightGuard::begin(self, Operation::Fetch);
    let record = self.clone();

    Ok(Box::pin(async move {
      let _guard = guard;
      let url = descriptor.url.clone();

      match resource.send(descriptor, Decoding::Record).await {
        Ok(Value::Object(attributes)) => {
          record.absorb(&attributes);
          Ok(record)
        }
        Ok(_) => Err(Error::Decode(format!("expected an object from {}", url))),
        Err(err) => {
          record.capture_errors(&err);
          Err(err)
        }
      }
    }))
  }

  /// Create (POST) or update (PATCH) this record, or PUT it when the
  /// resource saves via PUT.
  pub fn save(&self, options: RequestOptions) -> Result<Pending<Record>> {
    let resource = self.resource().clone();
    let method = if resource.config().save_via_put {
      Method::Put
    } else if self.is_persisted() {
      Method::Patch
    } else {
      Method::Post
    };

    let url = match &options.url {
      Some(url) => url.clone(),
      None if method == Method::Put => resource.build_path(&self.parents(), None)?,
      None => self.path()?,
    };
    let descriptor = resource.descriptor(method, url, Some(self.serialize()), &options);
    let guard = FlightGuard::begin(self, Operation::Save);
    let record = self.clone();

    Ok(Box::pin(async move {
      let _guard = guard;

      let response = match resource.send(descriptor, Decoding::Record).await {
        Ok(response) => response,
        Err(err) => {
          record.capture_errors(&err);
          return Err(err);
        }
      };

      match response {
        Value::Object(attributes) => record.absorb(&attributes),
        _ => record.mark_saved(),
      }

      if let Some(primary_key) = record.primary_key() {
        resource
          .cache()
          .merge_entity(resource.type_key(), &primary_key, &record.attributes());
      }

      debug!(type_key = resource.type_key(), %method, "saved record");
      Ok(record)
    }))
  }

  /// Delete this record and drop it from the entity cache.
  ///
  /// Fails immediately with `InvalidState` when there is no primary key.
  pub fn delete(&self, options: RequestOptions) -> Result<Pending<()>> {
    let primary_key = self.require_primary_key("delete")?;
    let resource = self.resource().clone();
    let url = match &options.url {
      Some(url) => url.clone(),
      None => resource.build_path(&self.parents(), Some(&primary_key))?,
    };
    let descriptor = resource.descriptor(Method::Delete, url, None, &options);
    let guard = FlightGuard::begin(self, Operation::Delete);
    let record = self.clone();

    Ok(Box::pin(async move {
      let _guard = guard;

      if let Err(err) = resource.send(descriptor, Decoding::Record).await {
        record.capture_errors(&err);
        return Err(err);
      }

      resource.cache().remove_entity(resource.type_key(), &primary_key);
      Ok(())
    }))
  }
}

/// Marks an operation in flight until dropped.
struct FlightGuard {
  record: Record,
  operation: Operation,
}

impl FlightGuard {
  fn begin(record: &Record, operation: Operation) -> Self {
    {
      let mut state = record.state();
      *state.in_flight.counter(operation) += 1;
      state.in_flight.requests += 1;
    }

    Self {
      record: record.clone(),
      operation,
    }
  }
}

impl Drop for FlightGuard {
  fn drop(&mut self) {
    let mut state = self.record.state();
    let counter = state.in_flight.counter(self.operation);
    *counter = counter.saturating_sub(1);
    state.in_flight.requests = state.in_flight.requests.saturating_sub(1);
  }
}

impl fmt::Debug for Record {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut debug = f.debug_struct("Record");
    debug.field("type_key", &self.resource().type_key());
    match self.inner.state.try_lock() {
      Ok(state) => debug.field("attributes", &state.attributes),
      Err(_) => debug.field("attributes", &"<locked>"),
    };
    debug.finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::RequestFailure;
  use crate::model::Schema;
  use crate::resource::{parents, DefaultHooks, ResourceConfig, ResourceHooks};
  use crate::testing::{memory_client, posts, MockTransport};
  use serde_json::json;

  fn obj(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
  }

  fn setup() -> (MockTransport, Resource) {
    let transport = MockTransport::new();
    let client = memory_client(&transport);
    let resource = posts(&client);
    (transport, resource)
  }

  // --------------------------------------------------------------------------
  // Dirty tracking
  // --------------------------------------------------------------------------

  #[test]
  fn test_new_record_is_clean() {
    let (_, posts) = setup();
    let post = posts.new_record();

    assert!(post.dirty_fields().is_empty());
    assert!(post.is_clean());
    assert!(!post.is_dirty());
    assert_eq!(post.get("tags"), Some(json!([])));
  }

  #[test]
  fn test_scalar_change_marks_dirty() {
    let (_, posts) = setup();
    let post = posts.new_record();

    post.set("name", "new-name");
    assert_eq!(post.dirty_fields(), vec!["name"]);
    assert!(post.is_dirty());
    assert!(!post.is_clean());
  }

  #[test]
  fn test_array_append_marks_dirty_and_revert_restores() {
    let (_, posts) = setup();
    let post = posts.create(json!({ "id": 1, "tags": ["a", "b"] })).unwrap();

    post.push_to("tags", "draft");
    assert_eq!(post.dirty_fields(), vec!["tags"]);

    post.revert();
    assert_eq!(post.get("tags"), Some(json!(["a", "b"])));
    assert!(post.is_clean());
  }

  #[test]
  fn test_reordered_array_is_dirty() {
    let (_, posts) = setup();
    let post = posts.create(json!({ "tags": ["a", "b"] })).unwrap();

    post.set("tags", json!(["b", "a"]));
    assert!(post.is_dirty());
  }

  #[test]
  fn test_revert_removes_fields_that_were_absent() {
    let (_, posts) = setup();
    let post = posts.new_record();

    post.set("name", "draft");
    post.revert();
    assert_eq!(post.get("name"), None);
    assert!(post.is_clean());
  }

  #[test]
  fn test_integer_over_equal_float_is_clean() {
    let (_, posts) = setup();
    let post = posts.create(json!({ "id": 1, "name": 1.0, "tags": [2.0] })).unwrap();

    post.set("name", 1);
    post.set("tags", json!([2]));
    assert!(post.is_clean());

    post.set("name", 1.5);
    assert_eq!(post.dirty_fields(), vec!["name"]);
  }

  #[test]
  fn test_revert_notifies_subscribers() {
    let (_, posts) = setup();
    let post = posts.create(json!({ "id": 1, "name": "a" })).unwrap();
    let mut changes = post.subscribe();

    post.set("name", "b");
    post.revert();
    assert!(changes.has_changed().unwrap());
    assert_eq!(*changes.borrow_and_update(), 1);
    assert_eq!(post.get("name"), Some(json!("a")));
  }

  #[test]
  fn test_undeclared_fields_are_not_tracked() {
    let (_, posts) = setup();
    let post = posts.create(json!({ "id": 1, "name": "a" })).unwrap();

    post.set("content", "foo");
    assert!(post.is_clean());
    assert_eq!(post.to_object(), obj(json!({ "name": "a", "tags": [] })));
  }

  // --------------------------------------------------------------------------
  // Identity and paths
  // --------------------------------------------------------------------------

  #[test]
  fn test_primary_key_first_candidate_wins() {
    let transport = MockTransport::new();
    let client = memory_client(&transport);
    let users = client
      .resource(
        ResourceConfig::new("user", "users").with_primary_keys(["id", "name"]),
        Schema::from_attrs(["name"]),
      )
      .unwrap();

    let user = users.create(json!({ "name": "x" })).unwrap();
    assert_eq!(user.primary_key(), Some(json!("x")));
    assert!(!user.is_new());

    user.set("id", 1);
    assert_eq!(user.primary_key(), Some(json!(1)));
  }

  #[test]
  fn test_is_new_and_persisted() {
    let (_, posts) = setup();
    let post = posts.new_record();
    assert!(post.is_new());
    assert!(!post.is_persisted());

    post.set("id", 1);
    assert!(!post.is_new());
    assert!(post.is_persisted());
  }

  #[test]
  fn test_marker_field_persistence() {
    let transport = MockTransport::new();
    let client = memory_client(&transport);
    let posts = client
      .resource(
        ResourceConfig::new("post", "posts")
          .with_persistence(Persistence::MarkerField("created_at".into())),
        Schema::from_attrs(["name"]),
      )
      .unwrap();

    let post = posts.create(json!({ "id": 1 })).unwrap();
    assert!(!post.is_new());
    assert!(!post.is_persisted());
    assert_eq!(post.path().unwrap(), "/posts");

    post.set("created_at", "2014-01-01");
    assert!(post.is_persisted());
    assert_eq!(post.path().unwrap(), "/posts/1");
  }

  #[test]
  fn test_path_uses_parent_attributes() {
    let transport = MockTransport::new();
    let client = memory_client(&transport);
    let comments = client
      .resource(
        ResourceConfig::new("comment", "posts/:post_id/comments"),
        Schema::from_attrs(["body"]),
      )
      .unwrap();

    let comment = comments.create(json!({ "id": 2, "post_id": 5 })).unwrap();
    assert_eq!(comment.path().unwrap(), "/posts/5/comments/2");

    let orphan = comments.create(json!({ "id": 2 })).unwrap();
    assert!(orphan.path().unwrap_err().is_invalid_state());

    orphan.set_parent("post_id", 9);
    assert_eq!(orphan.path().unwrap(), "/posts/9/comments/2");
  }

  #[test]
  fn test_serialize_declared_attributes() {
    let (_, posts) = setup();
    let post = posts
      .create(json!({ "id": 1, "name": "a", "tags": ["x"], "content": "ignored" }))
      .unwrap();

    let body: Value = serde_json::from_str(&post.serialize()).unwrap();
    assert_eq!(body, json!({ "name": "a", "tags": ["x"] }));
  }

  #[test]
  fn test_serializable_properties_take_precedence() {
    let transport = MockTransport::new();
    let client = memory_client(&transport);
    let posts = client
      .resource(
        ResourceConfig::new("post", "posts").with_serializable_properties(["id", "content"]),
        Schema::from_attrs(["name"]),
      )
      .unwrap();
    let post = posts
      .create(json!({ "id": 1, "name": "a", "content": "body" }))
      .unwrap();

    let body: Value = serde_json::from_str(&post.serialize()).unwrap();
    assert_eq!(body, json!({ "id": 1, "content": "body" }));
  }

  // --------------------------------------------------------------------------
  // Lifecycle
  // --------------------------------------------------------------------------

  #[test]
  fn test_fetch_without_key_fails_synchronously() {
    let (transport, posts) = setup();
    let post = posts.new_record();

    let err = post.fetch(RequestOptions::default()).err().unwrap();
    assert!(err.is_invalid_state());
    assert!(!post.is_fetching());
    assert!(!post.in_flight());
    assert_eq!(transport.request_count(), 0);
  }

  #[test]
  fn test_delete_without_key_fails_synchronously() {
    let (transport, posts) = setup();
    let post = posts.new_record();

    let err = post.delete(RequestOptions::default()).err().unwrap();
    assert!(err.is_invalid_state());
    assert!(!post.in_flight());
    assert_eq!(transport.request_count(), 0);
  }

  #[tokio::test]
  async fn test_fetch_overwrites_attributes() {
    let (transport, posts) = setup();
    transport.respond(Method::Get, "/posts/1", json!({ "id": 1, "name": "fetched" }));

    let post = posts.create(json!({ "id": 1, "name": "stale" })).unwrap();
    post.set("name", "local");

    let fetched = post.fetch(RequestOptions::default()).unwrap().await.unwrap();
    assert!(Record::ptr_eq(&fetched, &post));
    assert_eq!(post.get("name"), Some(json!("fetched")));
    assert!(post.is_clean());
    assert!(!post.is_fetching());
  }

  #[tokio::test]
  async fn test_save_new_record_posts_to_collection() {
    let (transport, posts) = setup();
    transport.respond(Method::Post, "/posts", json!({ "id": 1, "name": "hello" }));

    let post = posts.create(json!({ "name": "hello" })).unwrap();
    post.save(RequestOptions::default()).unwrap().await.unwrap();

    let request = &transport.requests()[0];
    assert_eq!(request.method, Method::Post);
    assert_eq!(request.url, "/posts");
    assert_eq!(
      serde_json::from_str::<Value>(request.body.as_deref().unwrap()).unwrap(),
      json!({ "name": "hello", "tags": [] })
    );

    assert_eq!(post.primary_key(), Some(json!(1)));
    assert!(post.is_clean());
    assert!(!post.is_saving());
  }

  #[tokio::test]
  async fn test_save_persisted_record_patches_member() {
    let (transport, posts) = setup();
    transport.respond(Method::Patch, "/posts/1", json!({ "id": 1, "name": "renamed", "updated_at": "now" }));

    let post = posts.create(json!({ "id": 1, "name": "old" })).unwrap();
    post.set("name", "renamed");
    post.save(RequestOptions::default()).unwrap().await.unwrap();

    assert_eq!(transport.requests()[0].method, Method::Patch);
    assert!(post.is_clean());

    let cached = posts.cache().get_entity("post", &json!(1)).unwrap();
    assert_eq!(cached.get("name"), Some(&json!("renamed")));
    assert_eq!(cached.get("updated_at"), Some(&json!("now")));
  }

  #[tokio::test]
  async fn test_save_merges_into_cached_entity() {
    let (transport, posts) = setup();
    posts
      .cache()
      .put_entity("post", &json!(1), &obj(json!({ "id": 1, "name": "old", "views": 10 })));
    transport.respond(Method::Patch, "/posts/1", Value::Null);

    let post = posts.create(json!({ "id": 1, "name": "new" })).unwrap();
    post.save(RequestOptions::default()).unwrap().await.unwrap();

    let cached = posts.cache().get_entity("post", &json!(1)).unwrap();
    assert_eq!(cached.get("name"), Some(&json!("new")));
    assert_eq!(cached.get("views"), Some(&json!(10)));
  }

  #[tokio::test]
  async fn test_save_via_put_uses_collection_path() {
    let transport = MockTransport::new();
    let client = memory_client(&transport);
    let settings = client
      .resource(
        ResourceConfig::new("setting", "settings").with_save_via_put(true),
        Schema::from_attrs(["value"]),
      )
      .unwrap();
    transport.respond(Method::Put, "/settings", json!({ "id": 3, "value": "on" }));

    let setting = settings.create(json!({ "id": 3, "value": "on" })).unwrap();
    setting.save(RequestOptions::default()).unwrap().await.unwrap();

    let request = &transport.requests()[0];
    assert_eq!(request.method, Method::Put);
    assert_eq!(request.url, "/settings");
  }

  #[tokio::test]
  async fn test_save_url_override() {
    let (transport, posts) = setup();
    transport.respond(Method::Post, "/drafts", json!({ "id": 4 }));

    let post = posts.new_record();
    post
      .save(RequestOptions::default().with_url("/drafts"))
      .unwrap()
      .await
      .unwrap();

    assert_eq!(transport.requests()[0].url, "/drafts");
  }

  #[tokio::test]
  async fn test_failed_save_leaves_attributes_and_clears_flags() {
    let (transport, posts) = setup();
    transport.fail(Method::Patch, "/posts/1", RequestFailure::status(500, None));

    let post = posts.create(json!({ "id": 1, "name": "old" })).unwrap();
    post.set("name", "new");

    let err = post.save(RequestOptions::default()).unwrap().await.unwrap_err();
    assert_eq!(err.request_failure().and_then(|f| f.status), Some(500));
    assert_eq!(post.get("name"), Some(json!("new")));
    assert!(post.is_dirty());
    assert!(!post.is_saving());
    assert!(!post.in_flight());
    assert!(post.errors().is_empty());
  }

  #[tokio::test]
  async fn test_flags_set_while_in_flight() {
    let (transport, posts) = setup();
    let release = transport.respond_gated(Method::Patch, "/posts/1", json!({ "id": 1 }));

    let post = posts.create(json!({ "id": 1 })).unwrap();
    let pending = tokio::spawn(post.save(RequestOptions::default()).unwrap());

    assert!(post.is_saving());
    assert!(post.in_flight());
    assert!(!post.is_fetching());

    release.send(()).unwrap();
    pending.await.unwrap().unwrap();

    assert!(!post.is_saving());
    assert!(!post.in_flight());
  }

  #[tokio::test]
  async fn test_concurrent_saves_share_the_flag() {
    let (transport, posts) = setup();
    transport.respond(Method::Patch, "/posts/1", json!({ "id": 1 }));
    transport.respond(Method::Patch, "/posts/1", json!({ "id": 1 }));

    let post = posts.create(json!({ "id": 1 })).unwrap();
    let first = post.save(RequestOptions::default()).unwrap();
    let second = post.save(RequestOptions::default()).unwrap();

    first.await.unwrap();
    assert!(post.is_saving());

    drop(second);
    assert!(!post.is_saving());
    assert!(!post.in_flight());
  }

  #[tokio::test]
  async fn test_delete_removes_cached_entity() {
    let (transport, posts) = setup();
    posts.cache().put_entity("post", &json!(1), &obj(json!({ "id": 1 })));
    transport.respond(Method::Delete, "/posts/1", Value::Null);

    let post = posts.create(json!({ "id": 1 })).unwrap();
    post.delete(RequestOptions::default()).unwrap().await.unwrap();

    assert_eq!(posts.cache().get_entity("post", &json!(1)), None);
    assert!(!post.is_deleting());
  }

  struct ErrorMapping;

  impl ResourceHooks for ErrorMapping {
    fn assign_errors(&self, failure: &RequestFailure) -> Vec<String> {
      failure
        .body
        .as_ref()
        .and_then(|body| body.get("errors"))
        .and_then(Value::as_array)
        .map(|errors| errors.iter().filter_map(|e| e.as_str().map(String::from)).collect())
        .unwrap_or_default()
    }
  }

  #[tokio::test]
  async fn test_error_hook_populates_and_save_clears_errors() {
    let transport = MockTransport::new();
    let client = memory_client(&transport);
    let posts = client
      .resource_with_hooks(
        ResourceConfig::new("post", "posts"),
        Schema::from_attrs(["name"]),
        ErrorMapping,
      )
      .unwrap();
    transport.fail(
      Method::Post,
      "/posts",
      RequestFailure::status(422, Some(json!({ "errors": ["name is taken"] }))),
    );
    transport.respond(Method::Post, "/posts", json!({ "id": 1, "name": "b" }));

    let post = posts.create(json!({ "name": "a" })).unwrap();
    assert!(post.save(RequestOptions::default()).unwrap().await.is_err());
    assert_eq!(post.errors(), vec!["name is taken"]);

    post.set("name", "b");
    post.save(RequestOptions::default()).unwrap().await.unwrap();
    assert!(post.errors().is_empty());
  }

  #[test]
  fn test_default_hooks_leave_errors_empty() {
    let hooks = DefaultHooks;
    assert!(hooks
      .assign_errors(&RequestFailure::status(422, Some(json!({ "errors": ["x"] }))))
      .is_empty());
  }

  #[tokio::test]
  async fn test_subscribers_see_fetch() {
    let (transport, posts) = setup();
    transport.respond(Method::Get, "/posts/1", json!({ "id": 1, "name": "fetched" }));

    let post = posts.create(json!({ "id": 1 })).unwrap();
    let mut changes = post.subscribe();

    post.fetch(RequestOptions::default()).unwrap().await.unwrap();
    assert!(changes.has_changed().unwrap());
    assert_eq!(*changes.borrow_and_update(), 1);
  }

  #[test]
  fn test_parents_from_constructor() {
    let transport = MockTransport::new();
    let client = memory_client(&transport);
    let comments = client
      .resource(
        ResourceConfig::new("comment", "posts/:post_id/comments"),
        Schema::from_attrs(["body"]),
      )
      .unwrap();

    let comment = comments.create_with_parents(json!({ "id": 3 }), parents([("post_id", 1)])).unwrap();
    assert_eq!(comment.path().unwrap(), "/posts/1/comments/3");
  }
}
