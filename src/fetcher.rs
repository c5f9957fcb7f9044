//! Paginated retrieval of postponed wall posts with retry.
//!
//! `wall.get(filter=postponed)` caps pages at 100 items, so the full
//! collection is stitched together from increasing offsets. Any transport
//! failure restarts the whole fetch after a fixed pause; partial results
//! never leave this module.

use crate::vk::{VkApi, WallPost};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_retry::strategy::FixedInterval;
use tokio_retry::Retry;
use tracing::{debug, warn};

/// Items requested per page; the `wall.get` maximum.
pub const PAGE_SIZE: usize = 100;

/// Total attempts (first try included) before a fetch is declared fatal.
pub const MAX_FETCH_ATTEMPTS: usize = 5;

/// Pause between attempts.
pub const FETCH_BACKOFF: Duration = Duration::from_secs(2);

/// A fetch that kept failing past the retry ceiling.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("postponed post fetch failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: usize,
        source: crate::vk::VkError,
    },
}

/// Fetches the complete postponed-post collection for one community.
pub struct PagedFetcher {
    api: Arc<dyn VkApi>,
    domain: String,
}

impl PagedFetcher {
    #[must_use]
    pub fn new(api: Arc<dyn VkApi>, domain: impl Into<String>) -> Self {
        Self {
            api,
            domain: domain.into(),
        }
    }

    /// Retrieves every postponed post, in fetch order.
    ///
    /// Pages are concatenated without dedup or sorting; if upstream mutates
    /// mid-fetch the reported total is simply re-read from each response.
    ///
    /// # Errors
    ///
    /// `FetchError::RetriesExhausted` once [`MAX_FETCH_ATTEMPTS`] whole-fetch
    /// attempts have failed. The collection is all-or-nothing.
    pub async fn fetch_all(&self) -> Result<Vec<WallPost>, FetchError> {
        let attempt = AtomicUsize::new(0);
        let strategy = FixedInterval::new(FETCH_BACKOFF).take(MAX_FETCH_ATTEMPTS - 1);

        Retry::spawn(strategy, || async {
            let n = attempt.fetch_add(1, Ordering::Relaxed) + 1;
            self.fetch_once().await.map_err(|e| {
                warn!(
                    attempt = n,
                    max = MAX_FETCH_ATTEMPTS,
                    "postponed post fetch attempt failed: {e}"
                );
                e
            })
        })
        .await
        .map_err(|source| FetchError::RetriesExhausted {
            attempts: MAX_FETCH_ATTEMPTS,
            source,
        })
    }

    /// One complete pass over the paginated endpoint.
    async fn fetch_once(&self) -> Result<Vec<WallPost>, crate::vk::VkError> {
        let mut posts: Vec<WallPost> = Vec::new();
        let mut offset = 0;

        loop {
            let page = self
                .api
                .wall_get_postponed(&self.domain, offset, PAGE_SIZE)
                .await?;
            let total = page.count;
            posts.extend(page.items);

            if offset + PAGE_SIZE >= total {
                break;
            }
            offset += PAGE_SIZE;
        }

        debug!(count = posts.len(), domain = %self.domain, "postponed posts fetched");
        Ok(posts)
    }
}
