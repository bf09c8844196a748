use futures::future::{BoxFuture, FutureExt};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use url::Url;

use super::{Method, RequestDescriptor, Transport};
use crate::error::{Error, RequestFailure, Result};

/// JSON-over-HTTP transport backed by reqwest.
#[derive(Clone)]
pub struct HttpTransport {
  client: reqwest::Client,
  base_url: Url,
  headers: Vec<(String, String)>,
}

impl HttpTransport {
  /// Create a transport resolving request paths against `base_url`.
  pub fn new(base_url: &str) -> Result<Self> {
    // Without a trailing slash `Url::join` would replace the last segment.
    let normalized = if base_url.ends_with('/') {
      base_url.to_string()
    } else {
      format!("{}/", base_url)
    };

    let base_url = Url::parse(&normalized)
      .map_err(|e| Error::invalid_state(format!("invalid base url {}: {}", base_url, e)))?;

    let client = reqwest::Client::builder()
      .build()
      .map_err(|e| Error::invalid_state(format!("failed to create HTTP client: {}", e)))?;

    Ok(Self {
      client,
      base_url,
      headers: Vec::new(),
    })
  }

  /// Add a header sent with every request.
  pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.headers.push((name.into(), value.into()));
    self
  }

  /// Resolve a request path (or absolute URL) against the base URL.
  pub fn resolve(&self, path: &str) -> Result<Url, RequestFailure> {
    self
      .base_url
      .join(path.trim_start_matches('/'))
      .map_err(|e| RequestFailure::network(format!("invalid request url {}: {}", path, e)))
  }
}

fn reqwest_method(method: Method) -> reqwest::Method {
  match method {
    Method::Get => reqwest::Method::GET,
    Method::Post => reqwest::Method::POST,
    Method::Patch => reqwest::Method::PATCH,
    Method::Put => reqwest::Method::PUT,
    Method::Delete => reqwest::Method::DELETE,
  }
}

impl Transport for HttpTransport {
  fn request(&self, descriptor: RequestDescriptor) -> BoxFuture<'static, Result<Value, RequestFailure>> {
    let client = self.client.clone();
    let url = self.resolve(&descriptor.url);
    let default_headers = self.headers.clone();

    async move {
      let url = url?;

      let mut request = client
        .request(reqwest_method(descriptor.method), url)
        .header(CONTENT_TYPE, "application/json")
        .header(ACCEPT, "application/json");

      for (name, value) in default_headers.iter().chain(descriptor.headers.iter()) {
        request = request.header(name.as_str(), value.as_str());
      }

      if let Some(body) = descriptor.body {
        request = request.body(body);
      }

      let response = request
        .send()
        .await
        .map_err(|e| RequestFailure::network(format!("{} {} failed: {}", descriptor.method, descriptor.url, e)))?;

      let status = response.status();
      let text = response
        .text()
        .await
        .map_err(|e| RequestFailure::network(format!("failed to read response body: {}", e)))?;

      if !status.is_success() {
        let body = serde_json::from_str(&text).ok();
        return Err(RequestFailure::status(status.as_u16(), body));
      }

      if text.trim().is_empty() {
        return Ok(Value::Null);
      }

      serde_json::from_str(&text).map_err(|e| RequestFailure {
        status: Some(status.as_u16()),
        message: format!("response is not valid JSON: {}", e),
        body: None,
      })
    }
    .boxed()
  }
}
