//! otlozhka-bot: a VK community bot that serves postponed wall posts.
//!
//! The bot long-polls the community's message stream, recognizes a small
//! set of regex commands, and answers from an in-memory storage of
//! postponed posts refreshed lazily through the paginated `wall.get`
//! endpoint.

pub mod calendar;
pub mod config;
pub mod fetcher;
pub mod messaging;
pub mod router;
pub mod storage;
pub mod vk;
