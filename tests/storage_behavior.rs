//! Concurrency and failure behavior of the post storage.

mod common;

use common::{posts, MockVk};
use otlozhka_bot::fetcher::PagedFetcher;
use otlozhka_bot::storage::PostStorage;
use otlozhka_bot::vk::VkApi;
use std::sync::Arc;

fn storage(mock: &Arc<MockVk>, keep_alive: i64) -> Arc<PostStorage> {
    let api: Arc<dyn VkApi> = mock.clone();
    Arc::new(PostStorage::new(PagedFetcher::new(api, "testclub"), keep_alive))
}

#[tokio::test]
async fn racing_readers_trigger_exactly_one_fetch() {
    let mock = Arc::new(MockVk::new(posts(3)));
    let storage = storage(&mock, 900);

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let storage = Arc::clone(&storage);
            tokio::spawn(async move { storage.get_or_refresh().await })
        })
        .collect();

    for task in tasks {
        let snapshot = task.await.expect("task").expect("refresh");
        assert_eq!(snapshot.len(), 3);
    }
    assert_eq!(mock.wall_calls(), 1);
}

#[tokio::test]
async fn fresh_storage_serves_without_refetching() {
    let mock = Arc::new(MockVk::new(posts(2)));
    let storage = storage(&mock, 900);

    storage.refresh().await.expect("initial refresh");
    let first = storage.get_or_refresh().await.expect("snapshot");
    let second = storage.get_or_refresh().await.expect("snapshot");

    assert_eq!(first.len(), 2);
    assert_eq!(second.len(), 2);
    assert_eq!(mock.wall_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_refresh_keeps_previous_snapshot() {
    let mock = Arc::new(MockVk::new(posts(5)));
    let storage = storage(&mock, 900);

    storage.refresh().await.expect("initial refresh");
    mock.set_posts(posts(8));
    mock.fail_next_fetches(5);

    assert!(storage.refresh().await.is_err());
    assert_eq!(storage.get().await.len(), 5);
    assert_eq!(storage.count().await, 5);
}

#[tokio::test]
async fn refresh_replaces_the_collection() {
    let mock = Arc::new(MockVk::new(posts(5)));
    let storage = storage(&mock, 900);

    storage.refresh().await.expect("initial refresh");
    mock.set_posts(posts(12));
    storage.refresh().await.expect("second refresh");

    assert_eq!(storage.count().await, 12);
}

#[tokio::test]
async fn needs_refresh_tracks_population_and_window() {
    let mock = Arc::new(MockVk::new(posts(1)));

    // Never populated.
    let fresh = storage(&mock, 900);
    assert!(fresh.needs_refresh().await);
    fresh.refresh().await.expect("refresh");
    assert!(!fresh.needs_refresh().await);

    // Zero-width window: stale the instant it is refreshed.
    let expired = storage(&mock, 0);
    expired.refresh().await.expect("refresh");
    assert!(expired.needs_refresh().await);
}
