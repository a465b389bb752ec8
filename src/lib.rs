//! Browse GitHub users through a cache that keeps working offline.
//!
//! [`Repository`] asks the remote source first and mirrors every answer into
//! a local SQLite cache in the background; when the remote fails, the cache
//! answers instead. [`Pager`] walks the user list page by page on top of it.

pub mod cache;
pub mod config;
pub mod error;
pub mod github;
pub mod logging;
pub mod paging;
pub mod repository;
pub mod task;

#[cfg(test)]
mod test_support;

pub use cache::{DataSource, Fetched, LocalStore, NoopStore, SqliteStore};
pub use error::{CacheError, Error, RemoteError, Result};
pub use github::{Cursor, GithubClient, RemoteSource, User, UserDetail};
pub use paging::{pages, Page, PageSource, Pager, PagerState};
pub use repository::Repository;
