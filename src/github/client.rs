use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use url::Url;

use crate::config::GithubConfig;
use crate::error::RemoteError;

use super::api_types::{ApiUser, ApiUserDetail};
use super::types::{User, UserDetail};
use super::RemoteSource;

/// GitHub REST API client
#[derive(Clone)]
pub struct GithubClient {
  http: reqwest::Client,
  base: Url,
}

impl GithubClient {
  pub fn new(config: &GithubConfig, token: Option<&str>) -> Result<Self, RemoteError> {
    let mut headers = HeaderMap::new();
    headers.insert(
      USER_AGENT,
      HeaderValue::from_static(concat!("ghusers/", env!("CARGO_PKG_VERSION"))),
    );
    headers.insert(
      ACCEPT,
      HeaderValue::from_static("application/vnd.github+json"),
    );
    if let Some(token) = token {
      let mut value =
        HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| RemoteError::InvalidToken)?;
      value.set_sensitive(true);
      headers.insert(AUTHORIZATION, value);
    }

    let timeout = Duration::from_secs(config.timeout_secs);
    let http = reqwest::Client::builder()
      .default_headers(headers)
      .connect_timeout(timeout)
      .timeout(timeout)
      .build()?;

    Ok(Self {
      http,
      base: normalize_base(&config.url)?,
    })
  }

  fn users_url(&self) -> Result<Url, RemoteError> {
    Ok(self.base.join("users")?)
  }

  fn user_url(&self, login: &str) -> Result<Url, RemoteError> {
    let mut url = self.users_url()?;
    url
      .path_segments_mut()
      .map_err(|_| RemoteError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
      .push(login);
    Ok(url)
  }

  async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, RemoteError> {
    let response = self.http.get(url).send().await?;
    let status = response.status();
    let body = response.bytes().await?;

    if !status.is_success() {
      return Err(RemoteError::Status {
        status: status.as_u16(),
        body: String::from_utf8_lossy(&body).into_owned(),
      });
    }

    Ok(serde_json::from_slice(&body)?)
  }
}

#[async_trait]
impl RemoteSource for GithubClient {
  #[instrument(skip(self), fields(base = %self.base))]
  async fn fetch_users_since(&self, since: u64, per_page: usize) -> Result<Vec<User>, RemoteError> {
    let mut url = self.users_url()?;
    url
      .query_pairs_mut()
      .append_pair("since", &since.to_string())
      .append_pair("per_page", &per_page.to_string());
    debug!(%url, "fetching users");

    let users: Vec<ApiUser> = self.get_json(url).await?;
    Ok(users.into_iter().map(User::from).collect())
  }

  #[instrument(skip(self), fields(base = %self.base))]
  async fn fetch_user_detail(&self, login: &str) -> Result<UserDetail, RemoteError> {
    let url = self.user_url(login)?;
    debug!(%url, "fetching user detail");

    let detail: ApiUserDetail = self.get_json(url).await?;
    Ok(detail.into())
  }
}

/// `Url::join` drops the last path segment unless the base ends with `/`.
fn normalize_base(raw: &str) -> Result<Url, RemoteError> {
  if raw.ends_with('/') {
    Ok(Url::parse(raw)?)
  } else {
    Ok(Url::parse(&format!("{}/", raw))?)
  }
}
