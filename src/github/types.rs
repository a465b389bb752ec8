use serde::{Deserialize, Serialize};

/// Pagination marker: the id of the last user already seen.
///
/// `None` means "start of the sequence".
pub type Cursor = Option<u64>;

/// Row of the user list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub id: u64,
  pub login: String,
  pub avatar_url: String,
}

/// Full profile for a single user, keyed by `login`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDetail {
  pub id: u64,
  pub avatar_url: String,
  pub login: String,
  pub name: Option<String>,
  pub location: Option<String>,
  pub followers: u32,
  pub following: u32,
  pub bio: Option<String>,
  pub public_repos: Option<u32>,
  pub public_gists: Option<u32>,
  /// ISO-8601 timestamp as reported by the API
  pub updated_at: Option<String>,
}
