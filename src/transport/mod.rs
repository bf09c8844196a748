//! Transport seam between the dispatcher and the network.

mod http;

use futures::future::BoxFuture;
use serde_json::Value;
use std::fmt;

use crate::error::RequestFailure;

pub use http::HttpTransport;

/// HTTP verbs issued by the data-access layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
  Get,
  Post,
  Patch,
  Put,
  Delete,
}

impl Method {
  pub fn as_str(&self) -> &'static str {
    match self {
      Method::Get => "GET",
      Method::Post => "POST",
      Method::Patch => "PATCH",
      Method::Put => "PUT",
      Method::Delete => "DELETE",
    }
  }
}

impl fmt::Display for Method {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A single request handed to the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
  pub url: String,
  pub method: Method,
  /// JSON-encoded request body
  pub body: Option<String>,
  pub headers: Vec<(String, String)>,
}

impl RequestDescriptor {
  pub fn new(method: Method, url: impl Into<String>) -> Self {
    Self {
      url: url.into(),
      method,
      body: None,
      headers: Vec::new(),
    }
  }

  pub fn get(url: impl Into<String>) -> Self {
    Self::new(Method::Get, url)
  }

  pub fn with_body(mut self, body: impl Into<String>) -> Self {
    self.body = Some(body.into());
    self
  }

  pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.headers.push((name.into(), value.into()));
    self
  }
}

/// Something that can execute a request and decode its JSON body.
///
/// Successful responses resolve to the decoded body (`Value::Null` for an
/// empty body). Non-2xx responses and network errors resolve to a
/// `RequestFailure`.
pub trait Transport: Send + Sync {
  fn request(&self, descriptor: RequestDescriptor) -> BoxFuture<'static, Result<Value, RequestFailure>>;
}
