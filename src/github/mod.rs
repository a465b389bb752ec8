//! GitHub users API: domain types and the remote source contract.

pub mod api_types;
pub mod client;
pub mod types;

use async_trait::async_trait;

use crate::error::RemoteError;

pub use client::GithubClient;
pub use types::{Cursor, User, UserDetail};

/// Stateless request/response access to the source of truth.
///
/// Any implementation (HTTP-backed, in-memory fixture) can be handed to
/// [`Repository`](crate::repository::Repository) without changing its logic.
#[async_trait]
pub trait RemoteSource: Send + Sync {
  /// Up to `per_page` users with `id > since`, ascending by id.
  async fn fetch_users_since(&self, since: u64, per_page: usize) -> Result<Vec<User>, RemoteError>;

  /// Profile for `login`.
  async fn fetch_user_detail(&self, login: &str) -> Result<UserDetail, RemoteError>;
}

#[async_trait]
impl<T: RemoteSource + ?Sized> RemoteSource for std::sync::Arc<T> {
  async fn fetch_users_since(&self, since: u64, per_page: usize) -> Result<Vec<User>, RemoteError> {
    (**self).fetch_users_since(since, per_page).await
  }

  async fn fetch_user_detail(&self, login: &str) -> Result<UserDetail, RemoteError> {
    (**self).fetch_user_detail(login).await
  }
}
