//! Repository that combines the remote source with the local cache.

use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::cache::{Fetched, LocalStore};
use crate::error::{CacheError, Error, Result};
use crate::github::{Cursor, RemoteSource, User, UserDetail};
use crate::task::DetachedWrites;

/// Fetch-cache-fallback engine.
///
/// Every read goes to the remote source first. On success the result is
/// returned immediately and written to the cache in the background; on
/// failure the cache answers instead and the remote error is dropped.
/// The remote always wins when it answers.
pub struct Repository<R, S: ?Sized> {
  remote: R,
  store: Arc<S>,
  writes: DetachedWrites,
}

impl<R, S> Repository<R, S>
where
  R: RemoteSource,
  S: LocalStore + ?Sized + 'static,
{
  pub fn new(remote: R, store: Arc<S>) -> Self {
    Self {
      remote,
      store,
      writes: DetachedWrites::new(),
    }
  }

  /// Up to `page_size` users after `cursor`.
  ///
  /// Offline, the cache is read from `id >= cursor`. An empty cache yields
  /// an empty offline page, not an error; only a failing cache is an error.
  #[instrument(skip(self))]
  pub async fn list(&self, cursor: Cursor, page_size: usize) -> Result<Fetched<Vec<User>>> {
    let since = cursor.unwrap_or(0);

    match self.remote.fetch_users_since(since, page_size).await {
      Ok(mut users) => {
        users.truncate(page_size);
        debug!(count = users.len(), "fetched users from remote");

        if !users.is_empty() {
          let store = Arc::clone(&self.store);
          let batch = users.clone();
          self.writes.spawn("users", move || store.upsert_users(&batch));
        }

        Ok(Fetched::from_network(users))
      }
      Err(e) => {
        if !self.store.is_persistent() {
          return Err(e.into());
        }
        warn!(error = %e, "remote unavailable, serving users from cache");

        let cached = self
          .with_store(move |store| store.query_users_from(since, page_size))
          .await?;
        debug!(count = cached.entities.len(), "read users from cache");
        Ok(Fetched::offline(cached.entities, cached.cached_at))
      }
    }
  }

  /// Profile for `login`, replaced wholesale on every successful fetch.
  #[instrument(skip(self))]
  pub async fn detail(&self, login: &str) -> Result<Fetched<UserDetail>> {
    if login.trim().is_empty() {
      return Err(Error::NotFound {
        login: login.to_string(),
      });
    }

    match self.remote.fetch_user_detail(login).await {
      Ok(detail) => {
        let store = Arc::clone(&self.store);
        let record = detail.clone();
        self
          .writes
          .spawn("user_detail", move || store.upsert_detail(&record));

        Ok(Fetched::from_network(detail))
      }
      Err(e) => {
        if !self.store.is_persistent() {
          return Err(e.into());
        }
        warn!(error = %e, "remote unavailable, serving user detail from cache");

        let key = login.to_string();
        match self.with_store(move |store| store.get_detail(&key)).await? {
          Some(cached) => Ok(Fetched::offline(cached.entity, Some(cached.cached_at))),
          None => Err(Error::NotFound {
            login: login.to_string(),
          }),
        }
      }
    }
  }

  /// Drop everything cached. Pending background writes land first so they
  /// cannot repopulate the cache afterwards.
  pub async fn clear_cache(&self) -> Result<()> {
    self.writes.flush().await;
    self.with_store(|store| store.clear_all()).await?;
    info!("cache cleared");
    Ok(())
  }

  /// Wait for background cache writes. Reads never call this.
  pub async fn flush(&self) {
    self.writes.flush().await;
  }

  pub fn pending_writes(&self) -> usize {
    self.writes.in_flight()
  }

  /// Foreground store access. It shares the connection lock with detached
  /// writes, so it runs on the blocking pool too.
  async fn with_store<T, F>(&self, op: F) -> Result<T>
  where
    F: FnOnce(&S) -> Result<T, CacheError> + Send + 'static,
    T: Send + 'static,
  {
    let store = Arc::clone(&self.store);
    let value = tokio::task::spawn_blocking(move || op(&*store))
      .await
      .map_err(|e| CacheError::Other(format!("cache task failed: {}", e)))??;
    Ok(value)
  }
}
