//! Command classification and handling for inbound messages.
//!
//! Routing is an ordered table of (pattern, authorization, command)
//! evaluated top to bottom with first-match-wins, so precedence between
//! overlapping patterns stays explicit and testable. One inbound message
//! produces at most one command; nothing persists across messages.

use crate::calendar::format_calendar;
use crate::config::{CommandPatterns, Settings};
use crate::messaging::{pick_phrase, post_message, text_message};
use crate::storage::PostStorage;
use crate::vk::{IncomingMessage, VkApi, WallPost};
use anyhow::Result;
use chrono_tz::Tz;
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info};

/// The community staff group chat. Commands coming from it are service
/// chatter between managers, never requests to the bot.
pub const COMMUNITY_STAFF_CHAT_ID: i64 = 2_000_000_004;

/// Refresh deltas at or above this earn the commendation reply.
pub const COMMEND_DELTA_THRESHOLD: usize = 10;

/// The command classes a message can resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Manager-only: re-fetch the postponed-post storage.
    UpdateStorage,
    /// Manager-only: render the postponed-post calendar.
    PrintCalendar,
    /// Public: find the sender's own postponed posts.
    PostponedLookup,
}

struct Route {
    pattern: Regex,
    managers_only: bool,
    command: Command,
}

/// Ordered first-match-wins command table.
pub struct CommandRouter {
    routes: Vec<Route>,
}

impl CommandRouter {
    /// Builds the route table. Privileged routes come first so that a
    /// manager message matching several patterns fires exactly one action.
    #[must_use]
    pub fn new(patterns: CommandPatterns) -> Self {
        Self {
            routes: vec![
                Route {
                    pattern: patterns.update_storage,
                    managers_only: true,
                    command: Command::UpdateStorage,
                },
                Route {
                    pattern: patterns.print_calendar,
                    managers_only: true,
                    command: Command::PrintCalendar,
                },
                Route {
                    pattern: patterns.postponed,
                    managers_only: false,
                    command: Command::PostponedLookup,
                },
            ],
        }
    }

    /// Classifies one message. Matching is case-insensitive; messages from
    /// the staff chat and messages a sender is not authorized for fall
    /// through to `None`.
    #[must_use]
    pub fn classify(
        &self,
        text: &str,
        peer_id: i64,
        managers: &HashSet<i64>,
    ) -> Option<Command> {
        if peer_id == COMMUNITY_STAFF_CHAT_ID {
            return None;
        }

        let text = text.to_lowercase();
        self.routes
            .iter()
            .filter(|route| !route.managers_only || managers.contains(&peer_id))
            .find(|route| route.pattern.is_match(&text))
            .map(|route| route.command)
    }
}

/// Whether a refresh delta deserves the commendation phrasing.
#[must_use]
pub fn commendable_delta(old_count: usize, new_count: usize) -> bool {
    new_count.saturating_sub(old_count) >= COMMEND_DELTA_THRESHOLD
}

/// Executes classified commands: consults the post storage and answers
/// through the community API.
pub struct MessageHandler {
    community: Arc<dyn VkApi>,
    storage: Arc<PostStorage>,
    router: CommandRouter,
    managers: HashSet<i64>,
    settings: Arc<Settings>,
    tz: Tz,
}

impl MessageHandler {
    #[must_use]
    pub fn new(
        community: Arc<dyn VkApi>,
        storage: Arc<PostStorage>,
        router: CommandRouter,
        managers: HashSet<i64>,
        settings: Arc<Settings>,
        tz: Tz,
    ) -> Self {
        Self {
            community,
            storage,
            router,
            managers,
            settings,
            tz,
        }
    }

    /// Handles one inbound message end to end. Never panics and never
    /// bubbles an error to the event loop: command failures are logged and
    /// answered with an apology phrase so the bot stays responsive.
    pub async fn handle(&self, message: IncomingMessage) {
        let Some(command) = self
            .router
            .classify(&message.text, message.peer_id, &self.managers)
        else {
            return;
        };

        info!(
            peer_id = message.peer_id,
            ?command,
            text = %message.text,
            "incoming command"
        );

        let result = match command {
            Command::UpdateStorage => self.update_storage(message.peer_id).await,
            Command::PrintCalendar => self.print_calendar(message.peer_id).await,
            Command::PostponedLookup => self.postponed_lookup(message.peer_id).await,
        };

        if let Err(e) = result {
            error!(peer_id = message.peer_id, ?command, "command failed: {e:#}");
            self.send_phrase_best_effort(message.peer_id, &self.settings.error_reply_phrases)
                .await;
        }
    }

    /// Public lookup: posts signed by the requesting peer.
    async fn postponed_lookup(&self, peer_id: i64) -> Result<()> {
        let posts = self.storage.get_or_refresh().await?;
        let found: Vec<&WallPost> = posts.iter().filter(|p| p.signer_id == peer_id).collect();

        if found.is_empty() {
            return self.send_phrase(peer_id, &self.settings.no_postponed_found_phrases).await;
        }

        if let Some(phrase) = pick_phrase(&self.settings.postponed_found_phrases) {
            self.community
                .send_message(&text_message(peer_id, phrase))
                .await?;
        }

        // Each post is sent independently; one failed send must not strand
        // the rest of the batch.
        for post in found {
            let message = post_message(
                peer_id,
                post,
                &self.settings.post_template,
                &self.settings.time_format,
                self.tz,
            );
            if let Err(e) = self.community.send_message(&message).await {
                error!(
                    peer_id,
                    post = %post.permalink(),
                    "failed to send postponed post: {e}"
                );
            }
        }
        Ok(())
    }

    /// Manager refresh with the delta-dependent reply.
    async fn update_storage(&self, peer_id: i64) -> Result<()> {
        let old_count = self.storage.count().await;
        self.storage.refresh().await?;
        let new_count = self.storage.count().await;

        let phrases = if commendable_delta(old_count, new_count) {
            &self.settings.storage_updated_commend_phrases
        } else {
            &self.settings.storage_updated_phrases
        };
        self.send_phrase(peer_id, phrases).await
    }

    /// Manager calendar print-out.
    async fn print_calendar(&self, peer_id: i64) -> Result<()> {
        let posts = self.storage.get_or_refresh().await?;
        if posts.is_empty() {
            return self.send_phrase(peer_id, &self.settings.storage_empty_phrases).await;
        }

        let calendar = format_calendar(&posts, &self.settings.timezone)?;
        self.community
            .send_message(&text_message(peer_id, calendar))
            .await?;
        Ok(())
    }

    async fn send_phrase(&self, peer_id: i64, phrases: &[String]) -> Result<()> {
        if let Some(phrase) = pick_phrase(phrases) {
            self.community
                .send_message(&text_message(peer_id, phrase))
                .await?;
        }
        Ok(())
    }

    async fn send_phrase_best_effort(&self, peer_id: i64, phrases: &[String]) {
        if let Err(e) = self.send_phrase(peer_id, phrases).await {
            error!(peer_id, "failed to send error reply: {e:#}");
        }
    }
}
