//! Test doubles shared by the unit tests.

use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

use crate::cache::{KeyValueStorage, MemoryStorage, AVAILABILITY_KEY};
use crate::error::{RequestFailure, StorageError};
use crate::model::Schema;
use crate::resource::{Client, Resource, ResourceConfig};
use crate::transport::{Method, RequestDescriptor, Transport};

/// Storage that fails every call, including the startup check.
pub struct FailingStorage;

impl KeyValueStorage for FailingStorage {
  fn get_item(&self, _key: &str) -> Result<Option<String>, StorageError> {
    Err(StorageError::Unavailable("quota exceeded".into()))
  }

  fn set_item(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
    Err(StorageError::Unavailable("quota exceeded".into()))
  }

  fn remove_item(&self, _key: &str) -> Result<(), StorageError> {
    Err(StorageError::Unavailable("quota exceeded".into()))
  }
}

/// Storage that passes the startup check and fails everything afterwards.
pub struct BrokenAfterCheck;

impl KeyValueStorage for BrokenAfterCheck {
  fn get_item(&self, _key: &str) -> Result<Option<String>, StorageError> {
    Err(StorageError::Poisoned)
  }

  fn set_item(&self, key: &str, _value: &str) -> Result<(), StorageError> {
    if key == AVAILABILITY_KEY {
      Ok(())
    } else {
      Err(StorageError::Poisoned)
    }
  }

  fn remove_item(&self, key: &str) -> Result<(), StorageError> {
    if key == AVAILABILITY_KEY {
      Ok(())
    } else {
      Err(StorageError::Poisoned)
    }
  }
}

enum Scripted {
  Respond(Value),
  Fail(RequestFailure),
  /// Respond once the paired sender fires
  Gated(Value, oneshot::Receiver<()>),
}

#[derive(Default)]
struct MockState {
  responses: HashMap<String, VecDeque<Scripted>>,
  requests: Vec<RequestDescriptor>,
}

/// Transport answering from per-route queues of scripted responses.
///
/// Routes are `"<METHOD> <url>"`; each request pops the next response for
/// its route. Unscripted requests fail with a 404.
#[derive(Clone, Default)]
pub struct MockTransport {
  state: Arc<Mutex<MockState>>,
}

impl MockTransport {
  pub fn new() -> Self {
    Self::default()
  }

  fn route(method: Method, url: &str) -> String {
    format!("{} {}", method, url)
  }

  fn script(&self, method: Method, url: &str, scripted: Scripted) {
    self
      .state
      .lock()
      .unwrap()
      .responses
      .entry(Self::route(method, url))
      .or_default()
      .push_back(scripted);
  }

  pub fn respond(&self, method: Method, url: &str, body: Value) {
    self.script(method, url, Scripted::Respond(body));
  }

  pub fn fail(&self, method: Method, url: &str, failure: RequestFailure) {
    self.script(method, url, Scripted::Fail(failure));
  }

  /// Script a response that is held back until the returned sender fires.
  pub fn respond_gated(&self, method: Method, url: &str, body: Value) -> oneshot::Sender<()> {
    let (release, gate) = oneshot::channel();
    self.script(method, url, Scripted::Gated(body, gate));
    release
  }

  /// Every request received so far, in order.
  pub fn requests(&self) -> Vec<RequestDescriptor> {
    self.state.lock().unwrap().requests.clone()
  }

  pub fn request_count(&self) -> usize {
    self.state.lock().unwrap().requests.len()
  }
}

impl Transport for MockTransport {
  fn request(&self, descriptor: RequestDescriptor) -> BoxFuture<'static, Result<Value, RequestFailure>> {
    let scripted = {
      let mut state = self.state.lock().unwrap();
      let route = Self::route(descriptor.method, &descriptor.url);
      state.requests.push(descriptor);
      state.responses.get_mut(&route).and_then(VecDeque::pop_front)
    };

    Box::pin(async move {
      match scripted {
        Some(Scripted::Respond(body)) => Ok(body),
        Some(Scripted::Fail(failure)) => Err(failure),
        Some(Scripted::Gated(body, gate)) => {
          gate
            .await
            .map_err(|_| RequestFailure::network("gate dropped"))?;
          Ok(body)
        }
        None => Err(RequestFailure::status(404, None)),
      }
    })
  }
}

/// A client over `transport` with an in-memory record cache.
pub fn memory_client(transport: &MockTransport) -> Client {
  Client::with_storage(transport.clone(), MemoryStorage::new())
}

/// `post` at `posts` with `name` and an array `tags`.
pub fn posts(client: &Client) -> Resource {
  client
    .resource(
      ResourceConfig::new("post", "posts"),
      Schema::from_attrs(["name", "tags[]"]),
    )
    .unwrap()
}

/// `comment` nested under a post.
pub fn comments(client: &Client) -> Resource {
  client
    .resource(
      ResourceConfig::new("comment", "posts/:post_id/comments"),
      Schema::from_attrs(["body"]),
    )
    .unwrap()
}
