//! VK API collaborator: data model, HTTP client, long-poll listener.

pub mod client;
pub mod longpoll;
pub mod types;

pub use client::{manager_set, VkApi, VkClient, VkError, MESSAGE_RANDOM_ID};
pub use longpoll::LongPollListener;
pub use types::{
    Attachment, Audio, Group, GroupMember, IncomingMessage, Media, OutgoingMessage,
    WallGetResponse, WallPost,
};
