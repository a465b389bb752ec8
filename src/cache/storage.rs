//! Local store trait and SQLite implementation.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::error::CacheError;
use crate::github::{User, UserDetail};

/// Result of a cached range query.
#[derive(Debug, Clone)]
pub struct CachedQueryResult<T> {
  /// The cached entities in order
  pub entities: Vec<T>,
  /// Oldest `cached_at` among the entities, `None` when empty
  pub cached_at: Option<DateTime<Utc>>,
}

/// A single cached entity.
#[derive(Debug, Clone)]
pub struct CachedEntity<T> {
  /// The cached entity
  pub entity: T,
  /// When the entity was cached
  pub cached_at: DateTime<Utc>,
}

/// Trait for local store backends.
///
/// Methods are synchronous; the repository moves writes onto blocking
/// worker threads. Every write must be atomic: a batch is stored entirely
/// or not at all.
pub trait LocalStore: Send + Sync {
  /// Users with `id >= cursor`, ascending by id, at most `limit` of them.
  fn query_users_from(&self, cursor: u64, limit: usize)
    -> Result<CachedQueryResult<User>, CacheError>;

  /// Insert or overwrite users by id.
  fn upsert_users(&self, users: &[User]) -> Result<(), CacheError>;

  /// Cached profile for `login` (case-sensitive), if any.
  fn get_detail(&self, login: &str) -> Result<Option<CachedEntity<UserDetail>>, CacheError>;

  /// Insert or overwrite a profile by login.
  fn upsert_detail(&self, detail: &UserDetail) -> Result<(), CacheError>;

  /// Drop every cached row.
  fn clear_all(&self) -> Result<(), CacheError>;

  /// Whether anything written here can be read back later.
  fn is_persistent(&self) -> bool {
    true
  }
}

/// Storage implementation that doesn't cache anything.
/// Used when caching is disabled - all operations are no-ops.
pub struct NoopStore;

impl LocalStore for NoopStore {
  fn query_users_from(
    &self,
    _cursor: u64,
    _limit: usize,
  ) -> Result<CachedQueryResult<User>, CacheError> {
    Ok(CachedQueryResult {
      entities: Vec::new(),
      cached_at: None,
    })
  }

  fn upsert_users(&self, _users: &[User]) -> Result<(), CacheError> {
    Ok(()) // Discard
  }

  fn get_detail(&self, _login: &str) -> Result<Option<CachedEntity<UserDetail>>, CacheError> {
    Ok(None) // Always miss
  }

  fn upsert_detail(&self, _detail: &UserDetail) -> Result<(), CacheError> {
    Ok(()) // Discard
  }

  fn clear_all(&self) -> Result<(), CacheError> {
    Ok(())
  }

  fn is_persistent(&self) -> bool {
    false
  }
}

/// SQLite-based local store.
pub struct SqliteStore {
  conn: Mutex<Connection>,
}

impl SqliteStore {
  /// Open the store at the default location.
  pub fn open() -> Result<Self, CacheError> {
    let path = Self::default_path()?;
    Self::open_at(&path)
  }

  /// Open (or create) the store at `path`.
  pub fn open_at(path: &Path) -> Result<Self, CacheError> {
    let open_err = |message: String| CacheError::Open {
      path: path.display().to_string(),
      message,
    };

    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).map_err(|e| open_err(e.to_string()))?;
    }

    let conn = Connection::open(path).map_err(|e| open_err(e.to_string()))?;
    Self::with_connection(conn)
  }

  /// Throwaway store, used by tests.
  pub fn open_in_memory() -> Result<Self, CacheError> {
    Self::with_connection(Connection::open_in_memory()?)
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf, CacheError> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| CacheError::Open {
        path: "<data dir>".to_string(),
        message: "could not determine data directory".to_string(),
      })?;

    Ok(data_dir.join("ghusers").join("cache.db"))
  }

  fn with_connection(conn: Connection) -> Result<Self, CacheError> {
    conn.execute_batch(CACHE_SCHEMA)?;
    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  fn lock(&self) -> Result<MutexGuard<'_, Connection>, CacheError> {
    self.conn.lock().map_err(|_| CacheError::LockPoisoned)
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY,
    login TEXT NOT NULL,
    avatar_url TEXT NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Keyed by login: that is what lookups use. id is informational.
CREATE TABLE IF NOT EXISTS user_details (
    login TEXT PRIMARY KEY,
    id INTEGER NOT NULL,
    avatar_url TEXT NOT NULL,
    name TEXT,
    location TEXT,
    followers INTEGER NOT NULL,
    following INTEGER NOT NULL,
    bio TEXT,
    public_repos INTEGER,
    public_gists INTEGER,
    updated_at TEXT,
    cached_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

impl LocalStore for SqliteStore {
  fn query_users_from(
    &self,
    cursor: u64,
    limit: usize,
  ) -> Result<CachedQueryResult<User>, CacheError> {
    let conn = self.lock()?;

    let mut stmt = conn.prepare_cached(
      "SELECT id, login, avatar_url, cached_at FROM users
       WHERE id >= ?1
       ORDER BY id ASC
       LIMIT ?2",
    )?;

    let rows = stmt.query_map(params![cursor, limit], |row| {
      let user = User {
        id: row.get(0)?,
        login: row.get(1)?,
        avatar_url: row.get(2)?,
      };
      let cached_at: String = row.get(3)?;
      Ok((user, cached_at))
    })?;

    let mut entities = Vec::new();
    let mut oldest: Option<DateTime<Utc>> = None;
    for row in rows {
      let (user, cached_at) = row?;
      let cached_at = parse_datetime(&cached_at)?;
      oldest = Some(oldest.map_or(cached_at, |o| o.min(cached_at)));
      entities.push(user);
    }

    Ok(CachedQueryResult {
      entities,
      cached_at: oldest,
    })
  }

  fn upsert_users(&self, users: &[User]) -> Result<(), CacheError> {
    let mut conn = self.lock()?;
    let tx = conn.transaction()?;
    {
      let mut stmt = tx.prepare_cached(
        "INSERT OR REPLACE INTO users (id, login, avatar_url, cached_at)
         VALUES (?1, ?2, ?3, datetime('now'))",
      )?;
      for user in users {
        stmt.execute(params![user.id, user.login, user.avatar_url])?;
      }
    }
    tx.commit()?;
    Ok(())
  }

  fn get_detail(&self, login: &str) -> Result<Option<CachedEntity<UserDetail>>, CacheError> {
    let conn = self.lock()?;

    let row = conn
      .query_row(
        "SELECT id, avatar_url, login, name, location, followers, following,
                bio, public_repos, public_gists, updated_at, cached_at
         FROM user_details WHERE login = ?1",
        params![login],
        |row| Ok((detail_from_row(row)?, row.get::<_, String>(11)?)),
      )
      .optional()?;

    match row {
      Some((entity, cached_at)) => Ok(Some(CachedEntity {
        entity,
        cached_at: parse_datetime(&cached_at)?,
      })),
      None => Ok(None),
    }
  }

  fn upsert_detail(&self, d: &UserDetail) -> Result<(), CacheError> {
    let conn = self.lock()?;
    conn.execute(
      "INSERT OR REPLACE INTO user_details
         (login, id, avatar_url, name, location, followers, following,
          bio, public_repos, public_gists, updated_at, cached_at)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, datetime('now'))",
      params![
        d.login,
        d.id,
        d.avatar_url,
        d.name,
        d.location,
        d.followers,
        d.following,
        d.bio,
        d.public_repos,
        d.public_gists,
        d.updated_at,
      ],
    )?;
    Ok(())
  }

  fn clear_all(&self) -> Result<(), CacheError> {
    let conn = self.lock()?;
    conn.execute_batch("DELETE FROM users; DELETE FROM user_details;")?;
    Ok(())
  }
}

fn detail_from_row(row: &Row<'_>) -> rusqlite::Result<UserDetail> {
  Ok(UserDetail {
    id: row.get(0)?,
    avatar_url: row.get(1)?,
    login: row.get(2)?,
    name: row.get(3)?,
    location: row.get(4)?,
    followers: row.get(5)?,
    following: row.get(6)?,
    bio: row.get(7)?,
    public_repos: row.get(8)?,
    public_gists: row.get(9)?,
    updated_at: row.get(10)?,
  })
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, CacheError> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| CacheError::Other(format!("bad cached_at '{}': {}", s, e)))
}
