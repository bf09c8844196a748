use serde_json::{Map, Value};

use crate::error::RequestFailure;
use crate::transport::RequestDescriptor;

/// Per-resource customization points.
///
/// Every method has an identity/no-op default, so implementors override only
/// what their API needs.
pub trait ResourceHooks: Send + Sync {
  /// Transform one response object before it is cached or materialized.
  fn deserialize(&self, data: Value) -> Value {
    data
  }

  /// Transform the attributes sent as a save request body.
  fn serialize(&self, attributes: Map<String, Value>) -> Map<String, Value> {
    attributes
  }

  /// Extra headers for an outgoing request.
  fn headers(&self, _descriptor: &RequestDescriptor) -> Vec<(String, String)> {
    Vec::new()
  }

  /// Map a failed fetch/save/delete onto user-facing messages stored on the
  /// record. An empty result leaves the record's errors untouched.
  fn assign_errors(&self, _failure: &RequestFailure) -> Vec<String> {
    Vec::new()
  }
}

/// Hooks that change nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHooks;

impl ResourceHooks for DefaultHooks {}
