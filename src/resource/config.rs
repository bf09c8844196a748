//! Type-level resource definition and per-call request options.

/// How a record decides whether it has already been persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Persistence {
  /// Persisted once it has a primary key.
  #[default]
  PrimaryKey,
  /// Persisted once the named field (e.g. `created_at`) holds a value.
  MarkerField(String),
}

/// Static configuration of one resource type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceConfig {
  /// Stable identifier used as the entity-cache namespace (e.g. "post")
  pub type_key: String,
  /// Path template relative to the API root, e.g. `posts/:post_id/comments`
  pub base_path: String,
  /// Optional prefix for every path, e.g. `api`
  pub namespace: Option<String>,
  /// Serve GET requests from the record cache and refresh in the background
  pub cache: bool,
  /// Fields checked in order for the primary key
  pub primary_keys: Vec<String>,
  /// Always save with PUT against the collection path
  pub save_via_put: bool,
  /// Fields sent when saving; defaults to the declared attributes
  pub serializable_properties: Option<Vec<String>>,
  /// Turn object responses into `[{ "key": k, "value": v }, ..]` arrays
  pub force_array: bool,
  pub persistence: Persistence,
}

impl ResourceConfig {
  pub fn new(type_key: impl Into<String>, base_path: impl Into<String>) -> Self {
    Self {
      type_key: type_key.into(),
      base_path: base_path.into(),
      namespace: None,
      cache: false,
      primary_keys: vec!["id".to_string()],
      save_via_put: false,
      serializable_properties: None,
      force_array: false,
      persistence: Persistence::default(),
    }
  }

  pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
    self.namespace = Some(namespace.into());
    self
  }

  pub fn with_cache(mut self, cache: bool) -> Self {
    self.cache = cache;
    self
  }

  pub fn with_primary_keys<I, S>(mut self, primary_keys: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.primary_keys = primary_keys.into_iter().map(Into::into).collect();
    self
  }

  pub fn with_save_via_put(mut self, save_via_put: bool) -> Self {
    self.save_via_put = save_via_put;
    self
  }

  pub fn with_serializable_properties<I, S>(mut self, properties: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.serializable_properties = Some(properties.into_iter().map(Into::into).collect());
    self
  }

  pub fn with_force_array(mut self, force_array: bool) -> Self {
    self.force_array = force_array;
    self
  }

  pub fn with_persistence(mut self, persistence: Persistence) -> Self {
    self.persistence = persistence;
    self
  }
}

/// Per-call overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
  /// Literal path used instead of building one from the base path
  pub url: Option<String>,
  /// Extra headers for this call
  pub headers: Vec<(String, String)>,
  /// Override the resource's cache flag for this call
  pub cache: Option<bool>,
}

impl RequestOptions {
  pub fn with_url(mut self, url: impl Into<String>) -> Self {
    self.url = Some(url.into());
    self
  }

  pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.headers.push((name.into(), value.into()));
    self
  }

  pub fn with_cache(mut self, cache: bool) -> Self {
    self.cache = Some(cache);
    self
  }
}
