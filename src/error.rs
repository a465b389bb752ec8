//! Error types shared by the remote source, the local store and the repository.
//!
//! Every fallible operation returns one of these through a plain `Result`;
//! nothing is thrown across component boundaries.

use thiserror::Error;

/// Failure talking to the remote source.
///
/// The repository treats every variant the same way: as a reason to fall
/// back to the local cache.
#[derive(Debug, Error)]
pub enum RemoteError {
  /// Connection, TLS, timeout or other transport failure.
  #[error("transport error: {0}")]
  Transport(#[from] reqwest::Error),

  /// The server answered with a non-2xx status.
  #[error("HTTP {status}: {body}")]
  Status { status: u16, body: String },

  /// The response body could not be decoded.
  #[error("failed to decode response: {0}")]
  Decode(#[from] serde_json::Error),

  /// The configured token is not a valid header value.
  #[error("invalid API token")]
  InvalidToken,

  /// Invalid request URL (bad base URL or login).
  #[error("invalid request URL: {0}")]
  Url(#[from] url::ParseError),
}

/// Failure reading from or writing to the local store.
#[derive(Debug, Error)]
pub enum CacheError {
  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("failed to open cache at {path}: {message}")]
  Open { path: String, message: String },

  #[error("cache lock poisoned")]
  LockPoisoned,

  /// Stand-in failure used by instrumented stores.
  #[error("{0}")]
  Other(String),
}

/// Error surfaced to consumers of the repository.
#[derive(Debug, Error)]
pub enum Error {
  /// Only reachable when there is no cache path left to degrade to.
  #[error("remote source failed: {0}")]
  Remote(#[from] RemoteError),

  /// The cache itself failed during fallback.
  #[error("cache failed: {0}")]
  Cache(#[from] CacheError),

  /// Neither the remote nor the cache has the requested user.
  #[error("user {login} not found (remote unavailable and not cached)")]
  NotFound { login: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
