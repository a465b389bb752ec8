//! Cursor-based paging over the repository's user list.
//!
//! [`Pager`] turns discrete `list(cursor)` calls into one logical sequence.
//! It never reads ahead: page N is requested only after page N-1 has been
//! handed to the consumer.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, Stream};
use std::sync::Arc;
use tracing::debug;

use crate::cache::{DataSource, Fetched, LocalStore};
use crate::error::{Error, Result};
use crate::github::{Cursor, RemoteSource, User};
use crate::repository::Repository;

/// Anything that can produce one page of users after a cursor.
#[async_trait]
pub trait PageSource: Send + Sync {
  async fn load_page(&self, cursor: Cursor, page_size: usize) -> Result<Fetched<Vec<User>>>;
}

#[async_trait]
impl<R, S> PageSource for Repository<R, S>
where
  R: RemoteSource,
  S: LocalStore + ?Sized + 'static,
{
  async fn load_page(&self, cursor: Cursor, page_size: usize) -> Result<Fetched<Vec<User>>> {
    self.list(cursor, page_size).await
  }
}

#[async_trait]
impl<T: PageSource + ?Sized> PageSource for Arc<T> {
  async fn load_page(&self, cursor: Cursor, page_size: usize) -> Result<Fetched<Vec<User>>> {
    (**self).load_page(cursor, page_size).await
  }
}

/// One loaded batch of users.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
  /// Cursor the page was requested with
  pub cursor: Cursor,
  pub items: Vec<User>,
  /// `None` once the sequence is exhausted
  pub next_cursor: Cursor,
  pub source: DataSource,
  /// Oldest cache timestamp of the items, offline pages only
  pub cached_at: Option<DateTime<Utc>>,
}

impl Page {
  /// A page shorter than requested is the last one. This cannot tell a
  /// drained remote from a cache that simply holds fewer rows, so callers
  /// that care should check `source`.
  ///
  /// The cache range is inclusive of the cursor, so an offline page can
  /// start with the row that ended the previous page. That row is dropped
  /// here. Length and next cursor are taken from the rows as served; a full
  /// offline page that does not get past its own cursor ends the sequence.
  fn new(cursor: Cursor, fetched: Fetched<Vec<User>>, page_size: usize) -> Self {
    let mut items = fetched.data;
    let last_id = items.last().map(|u| u.id);

    let next_cursor = match last_id {
      Some(last) if items.len() >= page_size && cursor.map_or(true, |c| last > c) => Some(last),
      _ => None,
    };

    if fetched.source == DataSource::Offline {
      if let (Some(c), Some(first)) = (cursor, items.first()) {
        if first.id == c {
          items.remove(0);
        }
      }
    }

    Self {
      cursor,
      items,
      next_cursor,
      source: fetched.source,
      cached_at: fetched.cached_at,
    }
  }

  pub fn is_last(&self) -> bool {
    self.next_cursor.is_none()
  }

  pub fn is_offline(&self) -> bool {
    self.source == DataSource::Offline
  }
}

/// Where the pager is in its load cycle.
#[derive(Debug, Clone)]
pub enum PagerState {
  /// Nothing requested yet
  Idle,
  /// A load for `cursor` is in flight (or was abandoned mid-flight)
  Loading { cursor: Cursor },
  /// Last load succeeded; waiting for the consumer to ask for more
  PageReady(Page),
  /// Both remote and cache failed for `cursor`; waiting for `retry`
  Failed { cursor: Cursor, error: Arc<Error> },
}

pub type PageResult = std::result::Result<Page, Arc<Error>>;

/// Refresh-then-append pager.
pub struct Pager<P> {
  source: P,
  page_size: usize,
  state: PagerState,
  /// Items of every page loaded since the last refresh, in order
  loaded: Vec<User>,
}

impl<P: PageSource> Pager<P> {
  pub fn new(source: P, page_size: usize) -> Self {
    Self {
      source,
      page_size,
      state: PagerState::Idle,
      loaded: Vec::new(),
    }
  }

  pub fn state(&self) -> &PagerState {
    &self.state
  }

  pub fn page_size(&self) -> usize {
    self.page_size
  }

  pub fn loaded_items(&self) -> &[User] {
    &self.loaded
  }

  pub fn is_exhausted(&self) -> bool {
    matches!(&self.state, PagerState::PageReady(page) if page.is_last())
  }

  /// Start over from `anchor` (`None` = beginning), forgetting loaded pages.
  pub async fn refresh(&mut self, anchor: Cursor) -> PageResult {
    self.loaded.clear();
    self.load(anchor).await
  }

  /// Load the page after the last one.
  ///
  /// Returns `None` when the sequence is exhausted. A failed pager keeps
  /// returning its error until [`retry`](Self::retry) or
  /// [`refresh`](Self::refresh) is called.
  pub async fn load_next(&mut self) -> Option<PageResult> {
    let cursor = match &self.state {
      PagerState::Idle => None,
      // The previous call was dropped before finishing; reissue it.
      PagerState::Loading { cursor } => *cursor,
      PagerState::PageReady(page) => match page.next_cursor {
        Some(next) => Some(next),
        None => return None,
      },
      PagerState::Failed { error, .. } => return Some(Err(Arc::clone(error))),
    };

    Some(self.load(cursor).await)
  }

  /// Reissue the load that failed. `None` when nothing has failed.
  pub async fn retry(&mut self) -> Option<PageResult> {
    match self.state {
      PagerState::Failed { cursor, .. } => Some(self.load(cursor).await),
      _ => None,
    }
  }

  /// Cursor for re-anchoring after the consumer's view is rebuilt: the id
  /// of the loaded item closest to `anchor_position`.
  ///
  /// `None` (refresh from the start) without an anchor or loaded items.
  pub fn refresh_key(&self, anchor_position: Option<usize>) -> Cursor {
    let position = anchor_position?;
    let last = self.loaded.len().checked_sub(1)?;
    self.loaded.get(position.min(last)).map(|u| u.id)
  }

  async fn load(&mut self, cursor: Cursor) -> PageResult {
    self.state = PagerState::Loading { cursor };

    match self.source.load_page(cursor, self.page_size).await {
      Ok(fetched) => {
        let page = Page::new(cursor, fetched, self.page_size);
        debug!(
          ?cursor,
          count = page.items.len(),
          next = ?page.next_cursor,
          source = ?page.source,
          "page loaded"
        );
        self.loaded.extend(page.items.iter().cloned());
        self.state = PagerState::PageReady(page.clone());
        Ok(page)
      }
      Err(e) => {
        debug!(?cursor, error = %e, "page load failed");
        let error = Arc::new(e);
        self.state = PagerState::Failed {
          cursor,
          error: Arc::clone(&error),
        };
        Err(error)
      }
    }
  }
}

enum Step {
  Start(Cursor),
  Next,
  Done,
}

/// Lazy sequence of pages starting at `start`.
///
/// Ends after the last page or after the first error. Each call starts a
/// fresh sequence; nothing is replayed from an earlier one.
pub fn pages<P: PageSource>(
  source: P,
  page_size: usize,
  start: Cursor,
) -> impl Stream<Item = PageResult> {
  let pager = Pager::new(source, page_size);

  stream::unfold(
    (pager, Step::Start(start)),
    |(mut pager, step)| async move {
      let result = match step {
        Step::Start(anchor) => pager.refresh(anchor).await,
        Step::Next => match pager.load_next().await {
          Some(result) => result,
          None => return None,
        },
        Step::Done => return None,
      };

      let next = match &result {
        Ok(page) if !page.is_last() => Step::Next,
        _ => Step::Done,
      };
      Some((result, (pager, next)))
    },
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::SqliteStore;
  use crate::test_support::{users, FailingStore, FakeRemote};
  use futures::StreamExt;

  fn repo_over(remote: FakeRemote) -> Arc<Repository<FakeRemote, SqliteStore>> {
    Arc::new(Repository::new(
      remote,
      Arc::new(SqliteStore::open_in_memory().unwrap()),
    ))
  }

  async fn first_page<P: PageSource>(source: P, start: Cursor) -> Page {
    Box::pin(pages(source, 50, start))
      .next()
      .await
      .unwrap()
      .unwrap()
  }

  #[tokio::test]
  async fn walks_a_finite_remote_to_the_end() {
    let repo = repo_over(FakeRemote::with_users(237));

    let pages: Vec<Page> = pages(Arc::clone(&repo), 50, None)
      .map(|p| p.unwrap())
      .collect()
      .await;

    let sizes: Vec<usize> = pages.iter().map(|p| p.items.len()).collect();
    assert_eq!(sizes, vec![50, 50, 50, 50, 37]);
    assert!(pages.last().unwrap().is_last());
    assert!(pages[..4].iter().all(|p| !p.is_last()));

    let ids: Vec<u64> = pages.iter().flat_map(|p| p.items.iter().map(|u| u.id)).collect();
    assert_eq!(ids, (1..=237).collect::<Vec<_>>());
  }

  #[tokio::test]
  async fn next_cursor_is_last_id_of_a_full_page() {
    let mut pager = Pager::new(repo_over(FakeRemote::with_users(120)), 50);

    let page = pager.refresh(Some(0)).await.unwrap();
    assert_eq!(page.cursor, Some(0));
    assert_eq!(page.items.first().unwrap().id, 1);
    assert_eq!(page.next_cursor, Some(50));
    assert_eq!(page.source, DataSource::Network);

    let second = pager.load_next().await.unwrap().unwrap();
    assert_eq!(second.cursor, Some(50));
    assert_eq!(second.items.first().unwrap().id, 51);
  }

  #[tokio::test]
  async fn exact_multiple_ends_with_an_empty_page() {
    let mut pager = Pager::new(repo_over(FakeRemote::with_users(100)), 50);

    pager.refresh(None).await.unwrap();
    pager.load_next().await.unwrap().unwrap();
    let last = pager.load_next().await.unwrap().unwrap();
    assert!(last.items.is_empty());
    assert!(last.is_last());
    assert!(pager.is_exhausted());
    assert!(pager.load_next().await.is_none());
  }

  #[tokio::test]
  async fn short_offline_page_ends_the_sequence() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    store.upsert_users(&users(1..=30)).unwrap();
    let repo = Arc::new(Repository::new(FakeRemote::offline(), store));

    let pages: Vec<PageResult> = pages(repo, 50, Some(0)).collect().await;
    assert_eq!(pages.len(), 1);
    let page = pages[0].as_ref().unwrap();
    assert_eq!(page.items.len(), 30);
    assert!(page.is_last());
    assert!(page.is_offline());
  }

  async fn offline_walk(cached: std::ops::RangeInclusive<u64>, page_size: usize) -> Vec<Page> {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    store.upsert_users(&users(cached)).unwrap();
    let repo = Arc::new(Repository::new(FakeRemote::offline(), store));

    let walk = pages(repo, page_size, None).take(500).map(|p| p.unwrap());
    walk.collect().await
  }

  #[tokio::test]
  async fn offline_walk_skips_the_boundary_row() {
    let pages = offline_walk(1..=120, 50).await;

    let sizes: Vec<usize> = pages.iter().map(|p| p.items.len()).collect();
    assert_eq!(sizes, vec![50, 49, 21]);
    assert!(pages.iter().all(|p| p.is_offline()));
    assert!(pages.last().unwrap().is_last());

    let ids: Vec<u64> = pages.iter().flat_map(|p| p.items.iter().map(|u| u.id)).collect();
    assert_eq!(ids, (1..=120).collect::<Vec<_>>());
  }

  #[tokio::test]
  async fn offline_walk_with_single_row_pages_ends() {
    let pages = offline_walk(1..=120, 1).await;

    assert_eq!(pages.len(), 2);
    assert_eq!(pages[0].items, users(1..=1));
    assert_eq!(pages[0].next_cursor, Some(1));
    // The inclusive range can only serve row 1 again, so the walk stops.
    assert!(pages[1].items.is_empty());
    assert!(pages[1].is_last());
  }

  #[tokio::test]
  async fn pager_stops_when_offline_cursor_cannot_advance() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    store.upsert_users(&users(1..=3)).unwrap();
    let repo = Arc::new(Repository::new(FakeRemote::offline(), store));
    let mut pager = Pager::new(repo, 1);

    pager.refresh(None).await.unwrap();
    pager.load_next().await.unwrap().unwrap();
    assert!(pager.is_exhausted());
    assert!(pager.load_next().await.is_none());
    assert_eq!(pager.loaded_items(), users(1..=1).as_slice());
  }

  #[tokio::test]
  async fn failure_is_sticky_until_retry() {
    let remote = Arc::new(FakeRemote::with_users(75));
    let repo = Arc::new(Repository::new(Arc::clone(&remote), Arc::new(FailingStore)));
    let mut pager = Pager::new(repo, 50);

    pager.refresh(None).await.unwrap();
    remote.set_failing(true);

    let err = pager.load_next().await.unwrap().unwrap_err();
    assert!(matches!(*err, Error::Cache(_)));
    assert!(matches!(
      pager.state(),
      PagerState::Failed {
        cursor: Some(50),
        ..
      }
    ));

    // No automatic retry: asking again does not touch the source.
    let calls = remote.calls();
    assert!(pager.load_next().await.unwrap().is_err());
    assert_eq!(remote.calls(), calls);

    remote.set_failing(false);
    let page = pager.retry().await.unwrap().unwrap();
    assert_eq!(page.cursor, Some(50));
    assert_eq!(page.items.len(), 25);
    assert!(page.is_last());
    assert_eq!(pager.loaded_items().len(), 75);
  }

  #[tokio::test]
  async fn retry_without_failure_is_a_no_op() {
    let mut pager = Pager::new(repo_over(FakeRemote::with_users(10)), 50);
    assert!(pager.retry().await.is_none());
    pager.refresh(None).await.unwrap();
    assert!(pager.retry().await.is_none());
  }

  #[tokio::test]
  async fn stream_stops_after_first_error() {
    let repo = Arc::new(Repository::new(FakeRemote::offline(), Arc::new(FailingStore)));

    let results: Vec<PageResult> = pages(repo, 50, None).collect().await;
    assert_eq!(results.len(), 1);
    assert!(results[0].is_err());
  }

  #[tokio::test]
  async fn each_stream_restarts_from_its_anchor() {
    let remote = Arc::new(FakeRemote::with_users(120));
    let repo = Arc::new(Repository::new(
      Arc::clone(&remote),
      Arc::new(SqliteStore::open_in_memory().unwrap()),
    ));

    let first = first_page(Arc::clone(&repo), None).await;
    let again = first_page(Arc::clone(&repo), None).await;
    assert_eq!(first, again);
    assert_eq!(remote.calls(), 2);

    let anchored = first_page(repo, Some(100)).await;
    assert_eq!(anchored.items.first().unwrap().id, 101);
  }

  #[tokio::test]
  async fn refresh_key_follows_the_anchor() {
    let mut pager = Pager::new(repo_over(FakeRemote::with_users(120)), 50);
    assert_eq!(pager.refresh_key(Some(3)), None);

    pager.refresh(None).await.unwrap();
    pager.load_next().await.unwrap().unwrap();

    assert_eq!(pager.refresh_key(None), None);
    assert_eq!(pager.refresh_key(Some(0)), Some(1));
    assert_eq!(pager.refresh_key(Some(74)), Some(75));
    // Past the end clamps to the last loaded item.
    assert_eq!(pager.refresh_key(Some(500)), Some(100));

    let key = pager.refresh_key(Some(74));
    let page = pager.refresh(key).await.unwrap();
    assert_eq!(page.items.first().unwrap().id, 76);
    assert_eq!(pager.loaded_items().len(), 45);
  }

  #[tokio::test]
  async fn abandoned_load_is_reissued() {
    let remote = Arc::new(FakeRemote::with_users(120));
    let repo = Arc::new(Repository::new(
      Arc::clone(&remote),
      Arc::new(SqliteStore::open_in_memory().unwrap()),
    ));
    let mut pager = Pager::new(repo, 50);
    pager.refresh(None).await.unwrap();

    remote.set_hanging(true);
    let abandoned =
      tokio::time::timeout(std::time::Duration::from_millis(20), pager.load_next()).await;
    assert!(abandoned.is_err());
    assert!(matches!(
      pager.state(),
      PagerState::Loading { cursor: Some(50) }
    ));

    remote.set_hanging(false);
    let page = pager.load_next().await.unwrap().unwrap();
    assert_eq!(page.cursor, Some(50));
    assert_eq!(page.items.first().unwrap().id, 51);
  }
}
