//! In-memory postponed-post storage with freshness-driven refresh.
//!
//! Keeping the collection in memory spares VK API quota without hurting the
//! user experience: commands only ever need a recent snapshot, and a stale
//! snapshot beats an empty one when the remote side misbehaves.

use crate::fetcher::{FetchError, PagedFetcher};
use crate::vk::WallPost;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::info;

/// Never-populated marker for the refresh timestamp.
const NEVER: i64 = 0;

struct CacheState {
    posts: Vec<WallPost>,
    refreshed_at: i64,
}

/// Shared post storage. All mutation goes through [`PostStorage::refresh`];
/// `get`/`count` read a snapshot under the read lock.
pub struct PostStorage {
    fetcher: PagedFetcher,
    /// Freshness window in seconds; at and past it the posts are stale.
    keep_alive: i64,
    state: RwLock<CacheState>,
}

/// Inclusive staleness predicate: stale once `now - refreshed_at` reaches
/// the window. `refreshed_at == 0` means never populated, always stale.
fn is_stale(refreshed_at: i64, keep_alive: i64, now: i64) -> bool {
    refreshed_at == NEVER || now - refreshed_at >= keep_alive
}

impl PostStorage {
    #[must_use]
    pub fn new(fetcher: PagedFetcher, keep_alive: i64) -> Self {
        Self {
            fetcher,
            keep_alive,
            state: RwLock::new(CacheState {
                posts: Vec::new(),
                refreshed_at: NEVER,
            }),
        }
    }

    /// Whether the stored posts are due for a refresh.
    pub async fn needs_refresh(&self) -> bool {
        let state = self.state.read().await;
        is_stale(state.refreshed_at, self.keep_alive, Utc::now().timestamp())
    }

    /// Unconditionally re-fetches the collection.
    ///
    /// # Errors
    ///
    /// Propagates [`FetchError`]; on failure the previous posts and
    /// timestamp are retained untouched.
    pub async fn refresh(&self) -> Result<(), FetchError> {
        let mut state = self.state.write().await;
        self.refresh_locked(&mut state).await
    }

    /// Current snapshot without any freshness check.
    pub async fn get(&self) -> Vec<WallPost> {
        self.state.read().await.posts.clone()
    }

    /// Number of currently stored posts.
    pub async fn count(&self) -> usize {
        self.state.read().await.posts.len()
    }

    /// Returns the collection, refreshing it first when stale.
    ///
    /// Double-checked: a cheap read-locked freshness test, then the write
    /// lock with a re-check. Callers racing on a stale cache serialize on
    /// the write lock, so exactly one of them fetches while the rest wait
    /// and reuse the fresh state.
    ///
    /// # Errors
    ///
    /// Propagates [`FetchError`] from the refresh; the stale snapshot stays
    /// in place for later callers.
    pub async fn get_or_refresh(&self) -> Result<Vec<WallPost>, FetchError> {
        {
            let state = self.state.read().await;
            if !is_stale(state.refreshed_at, self.keep_alive, Utc::now().timestamp()) {
                return Ok(state.posts.clone());
            }
        }

        let mut state = self.state.write().await;
        if is_stale(state.refreshed_at, self.keep_alive, Utc::now().timestamp()) {
            self.refresh_locked(&mut state).await?;
        }
        Ok(state.posts.clone())
    }

    async fn refresh_locked(&self, state: &mut CacheState) -> Result<(), FetchError> {
        let posts = self.fetcher.fetch_all().await?;
        info!(
            previous = state.posts.len(),
            current = posts.len(),
            "post storage refreshed"
        );
        state.posts = posts;
        state.refreshed_at = Utc::now().timestamp();
        Ok(())
    }
}
