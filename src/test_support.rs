//! In-crate fakes shared by unit tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::cache::{CachedEntity, CachedQueryResult, LocalStore, SqliteStore};
use crate::error::{CacheError, RemoteError};
use crate::github::{RemoteSource, User, UserDetail};

pub fn user(id: u64) -> User {
  User {
    id,
    login: format!("user{}", id),
    avatar_url: format!("https://avatars.example/{}", id),
  }
}

pub fn users(ids: RangeInclusive<u64>) -> Vec<User> {
  ids.map(user).collect()
}

pub fn detail(login: &str) -> UserDetail {
  UserDetail {
    id: 583231,
    avatar_url: "https://avatars.example/583231".into(),
    login: login.into(),
    name: Some("The Octocat".into()),
    location: Some("San Francisco".into()),
    followers: 9000,
    following: 9,
    bio: Some("mascot".into()),
    public_repos: Some(8),
    public_gists: None,
    updated_at: Some("2024-01-22T12:13:21Z".into()),
  }
}

fn unavailable() -> RemoteError {
  RemoteError::Status {
    status: 503,
    body: "service unavailable".into(),
  }
}

/// Finite in-memory remote that can be switched offline.
#[derive(Default)]
pub struct FakeRemote {
  users: Vec<User>,
  details: HashMap<String, UserDetail>,
  failing: AtomicBool,
  hang: AtomicBool,
  calls: AtomicUsize,
}

impl FakeRemote {
  pub fn with_users(count: u64) -> Self {
    Self {
      users: users(1..=count),
      ..Self::default()
    }
  }

  pub fn offline() -> Self {
    let remote = Self::default();
    remote.set_failing(true);
    remote
  }

  pub fn with_detail(mut self, d: UserDetail) -> Self {
    self.details.insert(d.login.clone(), d);
    self
  }

  pub fn set_failing(&self, failing: bool) {
    self.failing.store(failing, Ordering::SeqCst);
  }

  /// Every call stays pending until the caller gives up.
  pub fn set_hanging(&self, hang: bool) {
    self.hang.store(hang, Ordering::SeqCst);
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }

  async fn enter(&self) -> Result<(), RemoteError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    if self.hang.load(Ordering::SeqCst) {
      futures::future::pending::<()>().await;
    }
    if self.failing.load(Ordering::SeqCst) {
      return Err(unavailable());
    }
    Ok(())
  }
}

#[async_trait]
impl RemoteSource for FakeRemote {
  async fn fetch_users_since(&self, since: u64, per_page: usize) -> Result<Vec<User>, RemoteError> {
    self.enter().await?;
    Ok(
      self
        .users
        .iter()
        .filter(|u| u.id > since)
        .take(per_page)
        .cloned()
        .collect(),
    )
  }

  async fn fetch_user_detail(&self, login: &str) -> Result<UserDetail, RemoteError> {
    self.enter().await?;
    self.details.get(login).cloned().ok_or(RemoteError::Status {
      status: 404,
      body: "Not Found".into(),
    })
  }
}

/// Store whose every operation fails.
pub struct FailingStore;

impl LocalStore for FailingStore {
  fn query_users_from(&self, _: u64, _: usize) -> Result<CachedQueryResult<User>, CacheError> {
    Err(CacheError::Other("disk on fire".into()))
  }

  fn upsert_users(&self, _: &[User]) -> Result<(), CacheError> {
    Err(CacheError::Other("disk on fire".into()))
  }

  fn get_detail(&self, _: &str) -> Result<Option<CachedEntity<UserDetail>>, CacheError> {
    Err(CacheError::Other("disk on fire".into()))
  }

  fn upsert_detail(&self, _: &UserDetail) -> Result<(), CacheError> {
    Err(CacheError::Other("disk on fire".into()))
  }

  fn clear_all(&self) -> Result<(), CacheError> {
    Err(CacheError::Other("disk on fire".into()))
  }
}

/// SQLite store whose writes (and optionally reads) block until `release`
/// is called. A gated call gives up with an error after a few seconds.
pub struct GatedStore {
  pub inner: SqliteStore,
  gate_reads: bool,
  released: Mutex<bool>,
  cond: Condvar,
  writes_done: AtomicUsize,
}

impl GatedStore {
  pub fn new() -> Self {
    Self {
      inner: SqliteStore::open_in_memory().unwrap(),
      gate_reads: false,
      released: Mutex::new(false),
      cond: Condvar::new(),
      writes_done: AtomicUsize::new(0),
    }
  }

  pub fn gating_reads() -> Self {
    Self {
      gate_reads: true,
      ..Self::new()
    }
  }

  pub fn release(&self) {
    *self.released.lock().unwrap() = true;
    self.cond.notify_all();
  }

  pub fn writes_done(&self) -> usize {
    self.writes_done.load(Ordering::SeqCst)
  }

  fn wait_for_release(&self) -> Result<(), CacheError> {
    let released = self.released.lock().unwrap();
    let (_released, wait) = self
      .cond
      .wait_timeout_while(released, Duration::from_secs(5), |released| !*released)
      .unwrap();
    if wait.timed_out() {
      return Err(CacheError::Other("gate was never released".into()));
    }
    Ok(())
  }
}

impl LocalStore for GatedStore {
  fn query_users_from(
    &self,
    cursor: u64,
    limit: usize,
  ) -> Result<CachedQueryResult<User>, CacheError> {
    if self.gate_reads {
      self.wait_for_release()?;
    }
    self.inner.query_users_from(cursor, limit)
  }

  fn upsert_users(&self, users: &[User]) -> Result<(), CacheError> {
    self.wait_for_release()?;
    self.inner.upsert_users(users)?;
    self.writes_done.fetch_add(1, Ordering::SeqCst);
    Ok(())
  }

  fn get_detail(&self, login: &str) -> Result<Option<CachedEntity<UserDetail>>, CacheError> {
    self.inner.get_detail(login)
  }

  fn upsert_detail(&self, detail: &UserDetail) -> Result<(), CacheError> {
    self.wait_for_release()?;
    self.inner.upsert_detail(detail)?;
    self.writes_done.fetch_add(1, Ordering::SeqCst);
    Ok(())
  }

  fn clear_all(&self) -> Result<(), CacheError> {
    self.inner.clear_all()
  }
}
