//! Cache-aware GET dispatch: serve what the record cache has, refresh from
//! the network in a background task and reconcile in place.

use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{Decoding, Parents, Pending, RequestOptions, Resource};
use crate::cache::CacheResult;
use crate::error::{Error, Result};
use crate::model::{Collection, Record};
use crate::reconcile::{reconcile_collection, reconcile_record};
use crate::transport::{Method, RequestDescriptor};

/// Shape of a response dispatched through `Resource::request`.
#[derive(Debug, Clone)]
pub enum Materialized {
  Record(Record),
  Collection(Collection),
  /// The response had no body
  Empty,
}

impl Materialized {
  pub fn as_record(&self) -> Option<&Record> {
    match self {
      Materialized::Record(record) => Some(record),
      _ => None,
    }
  }

  pub fn as_collection(&self) -> Option<&Collection> {
    match self {
      Materialized::Collection(collection) => Some(collection),
      _ => None,
    }
  }

  pub fn to_json(&self) -> Value {
    match self {
      Materialized::Record(record) => record.to_json(),
      Materialized::Collection(collection) => collection.to_json(),
      Materialized::Empty => Value::Null,
    }
  }
}

/// Turns response data into handles, and merges a later response into them.
pub(crate) trait Materialize: Clone + Send + Sync + Sized + 'static {
  fn materialize(resource: &Resource, data: Value, parents: &Parents) -> Result<Self>;

  fn reconcile(&self, resource: &Resource, fresh: Self);
}

fn expect_object(resource: &Resource, data: Value) -> Result<serde_json::Map<String, Value>> {
  match data {
    Value::Object(attributes) => Ok(attributes),
    other => Err(Error::Decode(format!(
      "expected a {} object, got {}",
      resource.type_key(),
      other
    ))),
  }
}

impl Materialize for Record {
  fn materialize(resource: &Resource, data: Value, parents: &Parents) -> Result<Self> {
    Ok(resource.materialize(expect_object(resource, data)?, parents))
  }

  fn reconcile(&self, _resource: &Resource, fresh: Self) {
    reconcile_record(self, &fresh);
  }
}

impl Materialize for Collection {
  fn materialize(resource: &Resource, data: Value, parents: &Parents) -> Result<Self> {
    let items = match data {
      Value::Array(items) => items,
      Value::Null => Vec::new(),
      other => {
        return Err(Error::Decode(format!(
          "expected an array of {}, got {}",
          resource.type_key(),
          other
        )))
      }
    };

    let records = items
      .into_iter()
      .map(|item| Record::materialize(resource, item, parents))
      .collect::<Result<Vec<_>>>()?;
    Ok(Collection::new(records))
  }

  fn reconcile(&self, resource: &Resource, fresh: Self) {
    reconcile_collection(self, fresh.records(), resource.primary_keys());
  }
}

impl Materialize for Materialized {
  fn materialize(resource: &Resource, data: Value, parents: &Parents) -> Result<Self> {
    match data {
      Value::Null => Ok(Materialized::Empty),
      Value::Array(_) => Collection::materialize(resource, data, parents).map(Materialized::Collection),
      _ => Record::materialize(resource, data, parents).map(Materialized::Record),
    }
  }

  fn reconcile(&self, resource: &Resource, fresh: Self) {
    match (self, fresh) {
      (Materialized::Record(current), Materialized::Record(fresh)) => current.reconcile(resource, fresh),
      (Materialized::Collection(current), Materialized::Collection(fresh)) => current.reconcile(resource, fresh),
      (Materialized::Empty, Materialized::Empty) => {}
      _ => warn!(
        type_key = resource.type_key(),
        "refreshed response changed shape, keeping cached data"
      ),
    }
  }
}

impl Resource {
  /// Load the collection at this resource's path.
  ///
  /// Fails immediately with `InvalidState` when a parent placeholder cannot
  /// be filled. With caching on, a cached collection is returned right away
  /// and updated in place when the network responds.
  pub fn all(&self, parents: &Parents, options: RequestOptions) -> Result<Pending<CacheResult<Collection>>> {
    let url = match &options.url {
      Some(url) => url.clone(),
      None => self.build_path(parents, None)?,
    };
    let use_cache = options.cache.unwrap_or(self.config().cache);
    let descriptor = self.descriptor(Method::Get, url, None, &options);

    Ok(self.dispatch(descriptor, parents.clone(), use_cache))
  }

  /// Load one record by primary key, like `all`.
  pub fn find(
    &self,
    parents: &Parents,
    primary_key: impl Into<Value>,
    options: RequestOptions,
  ) -> Result<Pending<CacheResult<Record>>> {
    let primary_key = primary_key.into();
    if primary_key.is_null() {
      return Err(Error::invalid_state(format!(
        "can not find a {} with no primary key",
        self.type_key()
      )));
    }

    let url = match &options.url {
      Some(url) => url.clone(),
      None => self.build_path(parents, Some(&primary_key))?,
    };
    let use_cache = options.cache.unwrap_or(self.config().cache);
    let descriptor = self.descriptor(Method::Get, url, None, &options);

    Ok(self.dispatch(descriptor, parents.clone(), use_cache))
  }

  /// Dispatch a literal request. GET requests go through the cache when the
  /// resource caches; the response shape decides what is materialized.
  pub fn request(&self, descriptor: RequestDescriptor, parents: &Parents) -> Pending<CacheResult<Materialized>> {
    self.dispatch(descriptor, parents.clone(), self.config().cache)
  }

  fn dispatch<T: Materialize>(
    &self,
    descriptor: RequestDescriptor,
    parents: Parents,
    use_cache: bool,
  ) -> Pending<CacheResult<T>> {
    let resource = self.clone();
    let use_cache = use_cache && descriptor.method == Method::Get;

    Box::pin(async move {
      let url = descriptor.url.clone();

      if use_cache {
        if let Some(cached) = resource.cache().get_query_result(resource.type_key(), &url) {
          match T::materialize(&resource, cached, &parents) {
            Ok(data) => {
              debug!(type_key = resource.type_key(), url = %url, "serving cached response");
              let refresh = resource.spawn_refresh(descriptor, parents, data.clone());
              return Ok(CacheResult::from_cache(data, refresh));
            }
            Err(e) => warn!(error = %e, url = %url, "unusable cached response, going to network"),
          }
        }
      }

      let response = resource.send(descriptor, Decoding::Query).await?;
      if use_cache {
        resource
          .cache()
          .put_query_result(resource.type_key(), resource.primary_keys(), &url, &response);
      }

      let data = T::materialize(&resource, response, &parents)?;
      Ok(CacheResult::from_network(data))
    })
  }

  /// Re-issue `descriptor`, store the response and reconcile it into
  /// `materialized`. Failures and empty bodies are logged and the cached
  /// data is kept.
  fn spawn_refresh<T: Materialize>(&self, descriptor: RequestDescriptor, parents: Parents, materialized: T) -> JoinHandle<()> {
    let resource = self.clone();

    tokio::spawn(async move {
      let url = descriptor.url.clone();

      let response = match resource.send(descriptor, Decoding::Query).await {
        Ok(response) => response,
        Err(e) => {
          warn!(error = %e, url = %url, "background refresh failed, keeping cached data");
          return;
        }
      };

      // No body says nothing about the collection; keep cache and handles as they are.
      if response.is_null() {
        debug!(url = %url, "refresh returned no body, keeping cached data");
        return;
      }

      resource
        .cache()
        .put_query_result(resource.type_key(), resource.primary_keys(), &url, &response);

      match T::materialize(&resource, response, &parents) {
        Ok(fresh) => {
          materialized.reconcile(&resource, fresh);
          debug!(type_key = resource.type_key(), url = %url, "reconciled refreshed response");
        }
        Err(e) => warn!(error = %e, url = %url, "could not materialize refreshed response"),
      }
    })
  }
}
