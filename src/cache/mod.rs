//! Local durable cache for users and user details.
//!
//! The cache only ever mirrors what the remote source returned:
//! - rows are written after a successful fetch, never before
//! - writes are upserts (last write wins per primary key)
//! - nothing is deleted except by an explicit `clear_all`

mod storage;
mod traits;

pub use storage::{CachedEntity, CachedQueryResult, LocalStore, NoopStore, SqliteStore};
pub use traits::{DataSource, Fetched};
