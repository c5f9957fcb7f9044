//! Outbound message construction.
//!
//! Turns wall posts and configured phrase sets into `messages.send`
//! payloads. Pure string work; the actual sending lives behind [`VkApi`].
//!
//! [`VkApi`]: crate::vk::VkApi

use crate::vk::{OutgoingMessage, WallPost};
use chrono::DateTime;
use chrono_tz::Tz;
use rand::seq::SliceRandom;

/// Picks a uniformly random phrase from a configured list.
///
/// Returns `None` for an empty list; configuration validation rejects empty
/// required lists at startup, so `None` here means the list is optional and
/// the reply should simply be skipped.
#[must_use]
pub fn pick_phrase(phrases: &[String]) -> Option<&str> {
    phrases
        .choose(&mut rand::thread_rng())
        .map(String::as_str)
}

/// A plain text reply to a peer.
#[must_use]
pub fn text_message(peer_id: i64, text: impl Into<String>) -> OutgoingMessage {
    OutgoingMessage {
        peer_id,
        text: text.into(),
        attachment: None,
    }
}

/// Builds the outbound rendition of a wall post: the configured template
/// with the scheduled date and post text filled in, plus every forwardable
/// attachment as a comma-separated descriptor list.
#[must_use]
pub fn post_message(
    peer_id: i64,
    post: &WallPost,
    template: &str,
    time_format: &str,
    tz: Tz,
) -> OutgoingMessage {
    let date = DateTime::from_timestamp(post.date, 0)
        .map(|utc| utc.with_timezone(&tz).format(time_format).to_string())
        .unwrap_or_default();

    let text = template
        .replace("{date}", &date)
        .replace("{text}", &post.text);

    let descriptors: Vec<String> = post
        .attachments
        .iter()
        .filter_map(|a| a.to_descriptor())
        .collect();
    let attachment = if descriptors.is_empty() {
        None
    } else {
        Some(descriptors.join(","))
    };

    OutgoingMessage {
        peer_id,
        text,
        attachment,
    }
}
