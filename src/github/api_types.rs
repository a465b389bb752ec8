//! Serde-deserializable types matching GitHub API responses.
//!
//! These types are separate from domain types so the wire format can drift
//! (extra fields, nulls where the docs promise numbers) without touching the
//! rest of the crate.

use serde::Deserialize;

use super::types::{User, UserDetail};

// ============================================================================
// GET /users
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiUser {
  pub id: u64,
  pub login: String,
  #[serde(default)]
  pub avatar_url: String,
}

// ============================================================================
// GET /users/{login}
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiUserDetail {
  pub id: u64,
  pub login: String,
  #[serde(default)]
  pub avatar_url: String,
  pub name: Option<String>,
  pub location: Option<String>,
  #[serde(default)]
  pub followers: u32,
  #[serde(default)]
  pub following: u32,
  pub bio: Option<String>,
  pub public_repos: Option<u32>,
  pub public_gists: Option<u32>,
  pub updated_at: Option<String>,
}

// ============================================================================
// Conversions to domain types
// ============================================================================

impl From<ApiUser> for User {
  fn from(u: ApiUser) -> Self {
    User {
      id: u.id,
      login: u.login,
      avatar_url: u.avatar_url,
    }
  }
}

impl From<ApiUserDetail> for UserDetail {
  fn from(d: ApiUserDetail) -> Self {
    UserDetail {
      id: d.id,
      avatar_url: d.avatar_url,
      login: d.login,
      name: d.name,
      location: d.location,
      followers: d.followers,
      following: d.following,
      bio: d.bio,
      public_repos: d.public_repos,
      public_gists: d.public_gists,
      updated_at: d.updated_at,
    }
  }
}
