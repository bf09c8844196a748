//! Result of a cache-aware request, including where the data came from.

use tokio::task::JoinHandle;
use tracing::warn;

/// Result from a dispatch, including data and metadata about the source.
#[derive(Debug)]
pub struct CacheResult<T> {
  /// The materialized data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// Background refresh reconciling `data` with the network, when served from cache
  pub refresh: Option<JoinHandle<()>>,
}

impl<T> CacheResult<T> {
  /// Create a new result from fresh network data.
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      refresh: None,
    }
  }

  /// Create a new result from cached data with its pending refresh.
  pub fn from_cache(data: T, refresh: JoinHandle<()>) -> Self {
    Self {
      data,
      source: CacheSource::Cache,
      refresh: Some(refresh),
    }
  }

  pub fn is_cached(&self) -> bool {
    self.source == CacheSource::Cache
  }

  /// Drop the metadata and keep the data. The refresh keeps running.
  pub fn into_data(self) -> T {
    self.data
  }

  /// Wait for the background refresh (if any) to finish, then return the
  /// data, which by then reflects the network response.
  pub async fn settled(self) -> T {
    if let Some(refresh) = self.refresh {
      if let Err(e) = refresh.await {
        warn!(error = %e, "background refresh task did not complete");
      }
    }
    self.data
  }
}

/// Indicates where the data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from network
  Network,
  /// Data from cache; a network refresh was started alongside
  Cache,
}
