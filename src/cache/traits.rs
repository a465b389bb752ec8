//! Result provenance for data served by the repository.

use chrono::{DateTime, Utc};

/// Data returned by the repository, tagged with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: DataSource,
  /// Oldest cache timestamp among the returned rows (offline only)
  pub cached_at: Option<DateTime<Utc>>,
}

impl<T> Fetched<T> {
  /// Fresh data straight from the remote source.
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: DataSource::Network,
      cached_at: None,
    }
  }

  /// Remote unavailable, serving whatever the cache holds.
  pub fn offline(data: T, cached_at: Option<DateTime<Utc>>) -> Self {
    Self {
      data,
      source: DataSource::Offline,
      cached_at,
    }
  }

  pub fn is_offline(&self) -> bool {
    self.source == DataSource::Offline
  }

  pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Fetched<U> {
    Fetched {
      data: f(self.data),
      source: self.source,
      cached_at: self.cached_at,
    }
  }
}

/// Indicates where returned data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
  /// Fresh data from network
  Network,
  /// Network unavailable, serving cached data (possibly stale or partial)
  Offline,
}
