//! Detached cache writes.
//!
//! A write is handed to the blocking pool and the caller moves on without a
//! join point. If the process dies before the write lands, that batch is
//! simply missing from the cache; the remote source still has it.

use std::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{trace, warn};

use crate::error::CacheError;

/// Tracks fire-and-forget writes so they can optionally be drained at shutdown.
#[derive(Default)]
pub struct DetachedWrites {
  pending: Mutex<Vec<JoinHandle<()>>>,
}

impl DetachedWrites {
  pub fn new() -> Self {
    Self::default()
  }

  /// Run `write` on a blocking worker. Failures are logged and dropped.
  ///
  /// Must be called from within a tokio runtime.
  pub fn spawn<F>(&self, what: &'static str, write: F)
  where
    F: FnOnce() -> Result<(), CacheError> + Send + 'static,
  {
    let handle = tokio::task::spawn_blocking(move || match write() {
      Ok(()) => trace!(what, "cache write done"),
      Err(e) => warn!(what, error = %e, "cache write failed"),
    });

    match self.pending.lock() {
      Ok(mut pending) => {
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
      }
      // Untracked, but still runs to completion.
      Err(_) => warn!(what, "write tracker poisoned, write will not be flushed"),
    }
  }

  /// Wait for every write spawned so far.
  pub async fn flush(&self) {
    let handles: Vec<_> = match self.pending.lock() {
      Ok(mut pending) => pending.drain(..).collect(),
      Err(_) => return,
    };

    for handle in handles {
      if let Err(e) = handle.await {
        warn!(error = %e, "cache write task did not complete");
      }
    }
  }

  /// Number of writes not yet known to be finished.
  pub fn in_flight(&self) -> usize {
    self
      .pending
      .lock()
      .map(|pending| pending.iter().filter(|h| !h.is_finished()).count())
      .unwrap_or(0)
  }
}
