//! Shared mock VK client and fixtures for integration tests.

use async_trait::async_trait;
use otlozhka_bot::config::Settings;
use otlozhka_bot::vk::{
    Group, GroupMember, OutgoingMessage, VkApi, VkError, WallGetResponse, WallPost,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// In-memory VK API double. Serves a configurable post collection page by
/// page, can simulate transient outages, and records everything sent.
pub struct MockVk {
    posts: Mutex<Vec<WallPost>>,
    fail_next_fetches: AtomicUsize,
    fail_at_offset: Mutex<Option<usize>>,
    pub wall_calls: AtomicUsize,
    pub offsets: Mutex<Vec<usize>>,
    sent: Mutex<Vec<OutgoingMessage>>,
    fail_sends_containing: Mutex<Option<String>>,
}

impl MockVk {
    pub fn new(posts: Vec<WallPost>) -> Self {
        Self {
            posts: Mutex::new(posts),
            fail_next_fetches: AtomicUsize::new(0),
            fail_at_offset: Mutex::new(None),
            wall_calls: AtomicUsize::new(0),
            offsets: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            fail_sends_containing: Mutex::new(None),
        }
    }

    /// Replaces the served collection (e.g. between two refreshes).
    pub fn set_posts(&self, posts: Vec<WallPost>) {
        *self.posts.lock().expect("posts lock") = posts;
    }

    /// Makes the next `n` wall requests fail with a transient error.
    pub fn fail_next_fetches(&self, n: usize) {
        self.fail_next_fetches.store(n, Ordering::SeqCst);
    }

    /// Makes every wall request at exactly `offset` fail, so a paginated
    /// fetch breaks partway through on every attempt.
    pub fn fail_fetches_at_offset(&self, offset: usize) {
        *self.fail_at_offset.lock().expect("offset lock") = Some(offset);
    }

    /// Makes sends whose text contains `needle` fail.
    pub fn fail_sends_containing(&self, needle: &str) {
        *self.fail_sends_containing.lock().expect("fail lock") = Some(needle.to_string());
    }

    pub fn sent_messages(&self) -> Vec<OutgoingMessage> {
        self.sent.lock().expect("sent lock").clone()
    }

    pub fn wall_calls(&self) -> usize {
        self.wall_calls.load(Ordering::SeqCst)
    }

    pub fn recorded_offsets(&self) -> Vec<usize> {
        self.offsets.lock().expect("offsets lock").clone()
    }
}

#[async_trait]
impl VkApi for MockVk {
    async fn wall_get_postponed(
        &self,
        _domain: &str,
        offset: usize,
        count: usize,
    ) -> Result<WallGetResponse, VkError> {
        self.wall_calls.fetch_add(1, Ordering::SeqCst);

        let remaining = self.fail_next_fetches.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_next_fetches.store(remaining - 1, Ordering::SeqCst);
            return Err(VkError::Network("simulated outage".to_string()));
        }
        if *self.fail_at_offset.lock().expect("offset lock") == Some(offset) {
            return Err(VkError::Network("simulated outage".to_string()));
        }

        self.offsets.lock().expect("offsets lock").push(offset);
        let posts = self.posts.lock().expect("posts lock");
        let items = posts.iter().skip(offset).take(count).cloned().collect();
        Ok(WallGetResponse {
            count: posts.len(),
            items,
        })
    }

    async fn group_info(&self) -> Result<Group, VkError> {
        Ok(Group {
            id: 1,
            screen_name: "testclub".to_string(),
        })
    }

    async fn group_managers(&self, _group_id: &str) -> Result<Vec<GroupMember>, VkError> {
        Ok(vec![GroupMember {
            id: 42,
            role: "editor".to_string(),
        }])
    }

    async fn send_message(&self, message: &OutgoingMessage) -> Result<(), VkError> {
        if let Some(needle) = self
            .fail_sends_containing
            .lock()
            .expect("fail lock")
            .as_deref()
        {
            if message.text.contains(needle) {
                return Err(VkError::Network("simulated send failure".to_string()));
            }
        }
        self.sent.lock().expect("sent lock").push(message.clone());
        Ok(())
    }
}

/// A bare post scheduled at `date`, signed by `signer_id`.
pub fn post(id: i64, signer_id: i64, date: i64) -> WallPost {
    WallPost {
        id,
        owner_id: -1,
        signer_id,
        date,
        text: format!("post {id}"),
        attachments: vec![],
    }
}

pub fn posts(n: usize) -> Vec<WallPost> {
    (0..n)
        .map(|i| post(i as i64, 0, 1_704_099_600 + i as i64 * 60))
        .collect()
}

/// Settings with single-phrase lists so replies are deterministic.
pub fn test_settings() -> Settings {
    Settings {
        community_token: "community".to_string(),
        user_token: "user".to_string(),
        storage_keep_alive: 900,
        timezone: "UTC".to_string(),
        time_format: "%d.%m.%Y %H:%M:%S".to_string(),
        post_template: "📅: {date}\n📝: {text}".to_string(),
        postponed_regex: "отложк[ауе]".to_string(),
        update_storage_regex: "обнови".to_string(),
        print_calendar_regex: "календарь".to_string(),
        postponed_found_phrases: vec!["Нашлось:".to_string()],
        no_postponed_found_phrases: vec!["Отложенных постов не найдено.".to_string()],
        storage_updated_phrases: vec!["Отложка обновлена.".to_string()],
        storage_updated_commend_phrases: vec!["Отложка обновлена. Спасибо!".to_string()],
        storage_empty_phrases: vec!["В хранилище пусто.".to_string()],
        error_reply_phrases: vec!["Что-то пошло не так.".to_string()],
    }
}
