//! Bounded pagination over GitLab list endpoints.
//!
//! A walk is exposed as a lazy stream of pages: the consumer pulls the next
//! page only when it wants one, and dropping the stream ends the walk. Any
//! failure ends the stream after logging it; pages already yielded stand.

use futures::stream::{self, Stream};
use serde::de::DeserializeOwned;
use std::future::Future;
use tracing::{debug, warn};

/// Hard cap on pages per walk, so a long outage doesn't turn into an unbounded catch-up.
pub const MAX_PAGES: u32 = 5;

/// Why a page could not be fetched.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
  /// Network, DNS or TLS failure
  #[error("transport error: {0}")]
  Transport(String),
  /// Non-2xx response, including auth failures and rate limiting
  #[error("upstream returned {status}: {body}")]
  Upstream { status: u16, body: String },
  /// Missing pagination header or unexpected payload shape
  #[error("malformed response: {0}")]
  Malformed(String),
}

/// One page of a paginated list.
#[derive(Debug, Clone)]
pub struct Page<T> {
  pub items: Vec<T>,
  pub total_pages: u32,
}

/// Something that can fetch a single page of a paginated resource.
///
/// `endpoint` is relative to the API base, query string included.
pub trait PageSource: Send + Sync + 'static {
  fn fetch_page<T>(&self, endpoint: &str) -> impl Future<Output = Result<Page<T>, FetchError>> + Send
  where
    T: DeserializeOwned + Send + 'static;
}

struct Walk<F> {
  page: Option<u32>,
  build: F,
}

/// Walk a paginated resource starting at page 1.
///
/// `build` turns `(page, per_page)` into an endpoint. The walk advances while
/// `page < min(total_pages, MAX_PAGES)`.
pub fn paginate<'a, S, T, F>(
  source: &'a S,
  per_page: u32,
  build: F,
) -> impl Stream<Item = Vec<T>> + Send + 'a
where
  S: PageSource,
  T: DeserializeOwned + Send + 'static,
  F: Fn(u32, u32) -> String + Send + 'a,
{
  let walk = Walk {
    page: Some(1),
    build,
  };

  stream::unfold(walk, move |walk| async move {
    let Some(page) = walk.page else {
      return None;
    };
    let endpoint = (walk.build)(page, per_page);
    debug!(%endpoint, "GET");

    match source.fetch_page::<T>(&endpoint).await {
      Ok(result) => {
        let last = result.total_pages.min(MAX_PAGES);
        let next = (page < last).then_some(page + 1);
        Some((
          result.items,
          Walk {
            page: next,
            build: walk.build,
          },
        ))
      }
      Err(e) => {
        warn!(%endpoint, error = %e, "Page fetch failed, ending walk");
        None
      }
    }
  })
}
