//! Serde data model for the VK API objects the bot touches.
//!
//! Only the fields the bot actually reads are modelled; VK responses carry
//! far more, and `serde` ignores the rest.

use serde::{Deserialize, Serialize};

/// A community wall post, postponed or published.
///
/// Identity is `(owner_id, id)`. Instances are immutable once fetched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WallPost {
    pub id: i64,
    pub owner_id: i64,
    /// The user who authored the post on behalf of the community,
    /// if the post is signed. `0` when absent.
    #[serde(default)]
    pub signer_id: i64,
    /// Publish timestamp (unix seconds). For postponed posts this is the
    /// scheduled publication time.
    pub date: i64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl WallPost {
    /// Canonical permalink for the post: `vk.com/wall{owner}_{id}`.
    #[must_use]
    pub fn permalink(&self) -> String {
        format!("vk.com/wall{}_{}", self.owner_id, self.id)
    }

    /// Audio attachments carried by the post, in attachment order.
    pub fn audios(&self) -> impl Iterator<Item = &Audio> {
        self.attachments.iter().filter_map(|a| a.audio.as_ref())
    }
}

/// A wall post attachment in VK's tagged representation:
/// `{ "type": "photo", "photo": { ... } }`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Attachment {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<Media>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<Media>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<Audio>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<Media>,
}

impl Attachment {
    /// Renders the attachment descriptor VK expects in `messages.send`,
    /// e.g. `photo123_456`. Returns `None` for attachment kinds the bot
    /// cannot forward (polls, links, ...).
    #[must_use]
    pub fn to_descriptor(&self) -> Option<String> {
        let (kind, owner_id, id) = match self.kind.as_str() {
            "photo" => self.photo.as_ref().map(|m| ("photo", m.owner_id, m.id))?,
            "video" => self.video.as_ref().map(|m| ("video", m.owner_id, m.id))?,
            "audio" => self.audio.as_ref().map(|a| ("audio", a.owner_id, a.id))?,
            "doc" => self.doc.as_ref().map(|m| ("doc", m.owner_id, m.id))?,
            _ => return None,
        };
        Some(format!("{kind}{owner_id}_{id}"))
    }
}

/// Generic media object: enough identity to rebuild a descriptor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Media {
    pub id: i64,
    pub owner_id: i64,
}

/// Audio attachment; artist/title feed the calendar listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Audio {
    pub id: i64,
    pub owner_id: i64,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub title: String,
}

impl Audio {
    /// `artist - title`, the form used in calendar lines.
    #[must_use]
    pub fn artist_title(&self) -> String {
        format!("{} - {}", self.artist, self.title)
    }
}

/// One page of `wall.get`. `count` is the total reported by the server at
/// the time of the request; it may shift between pages while items are
/// created or published upstream.
#[derive(Debug, Clone, Deserialize)]
pub struct WallGetResponse {
    pub count: usize,
    #[serde(default)]
    pub items: Vec<WallPost>,
}

/// Community info from `groups.getById`.
#[derive(Debug, Clone, Deserialize)]
pub struct Group {
    pub id: i64,
    pub screen_name: String,
}

/// A member row from `groups.getMembers(filter=managers)`.
#[derive(Debug, Clone, Deserialize)]
pub struct GroupMember {
    pub id: i64,
    #[serde(default)]
    pub role: String,
}

impl GroupMember {
    /// Whether the role grants elevated bot commands.
    #[must_use]
    pub fn has_manager_rights(&self) -> bool {
        matches!(self.role.as_str(), "editor" | "administrator" | "creator")
    }
}

/// An inbound `message_new` long-poll event, reduced to what routing needs.
///
/// `peer_id` doubles as sender identity and reply destination: for the
/// private conversations the bot serves they are the same id.
#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    pub peer_id: i64,
    #[serde(default)]
    pub text: String,
}

/// An outbound `messages.send` request.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMessage {
    pub peer_id: i64,
    pub text: String,
    /// Comma-separated attachment descriptors, when forwarding a post.
    pub attachment: Option<String>,
}
