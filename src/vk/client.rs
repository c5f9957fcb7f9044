//! Reqwest-backed VK API client and the `VkApi` trait the rest of the bot
//! programs against.
//!
//! Two client instances exist at runtime: a community-token client for
//! sending messages and long-polling, and a user-token client for
//! `wall.get(filter=postponed)`, which community tokens cannot see.

use crate::vk::types::{Group, GroupMember, OutgoingMessage, WallGetResponse};
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// VK API version sent with every request.
pub const API_VERSION: &str = "5.199";

/// Default method endpoint base.
pub const DEFAULT_API_BASE: &str = "https://api.vk.com/method";

/// Request timeout; prevents a hung poll from wedging a handler task.
const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// Client-supplied dedup token for `messages.send`. Kept constant, so a
/// retried send is not deduplicated by the remote side.
pub const MESSAGE_RANDOM_ID: i64 = 0;

/// Errors produced by VK API calls.
#[derive(Debug, Error)]
pub enum VkError {
    /// Connectivity-level failure (DNS, TLS, timeout, ...).
    #[error("VK request failed: {0}")]
    Network(String),
    /// The API answered with its error envelope.
    #[error("VK API error {code}: {message}")]
    Api { code: i64, message: String },
    /// The response body did not match the expected shape.
    #[error("unexpected VK response: {0}")]
    Decode(String),
}

/// The remote VK surface the bot consumes, mockable for tests.
#[async_trait]
pub trait VkApi: Send + Sync {
    /// One page of postponed wall posts for `domain`.
    async fn wall_get_postponed(
        &self,
        domain: &str,
        offset: usize,
        count: usize,
    ) -> Result<WallGetResponse, VkError>;

    /// The community the token belongs to.
    async fn group_info(&self) -> Result<Group, VkError>;

    /// Raw manager rows for the community; role filtering happens upstream.
    async fn group_managers(&self, group_id: &str) -> Result<Vec<GroupMember>, VkError>;

    /// Sends one outbound message.
    async fn send_message(&self, message: &OutgoingMessage) -> Result<(), VkError>;
}

/// Concrete VK client over HTTPS.
pub struct VkClient {
    http: HttpClient,
    base_url: String,
    token: String,
}

impl VkClient {
    /// Creates a client for the given access token against the public API.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_base_url(token, DEFAULT_API_BASE)
    }

    /// Creates a client against a custom endpoint base (used by tests).
    #[must_use]
    pub fn with_base_url(token: impl Into<String>, base_url: impl Into<String>) -> Self {
        let http = HttpClient::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .unwrap_or_else(|_| HttpClient::new());
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    /// Calls a VK method and unwraps the `{ response }` envelope.
    ///
    /// # Errors
    ///
    /// `VkError::Network` on transport failure, `VkError::Api` when the
    /// server returns its error envelope, `VkError::Decode` when the body
    /// has neither.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, String)],
    ) -> Result<T, VkError> {
        let url = format!("{}/{}", self.base_url, method);
        debug!(method, "calling VK API");

        let mut form: Vec<(&str, String)> = params.to_vec();
        form.push(("access_token", self.token.clone()));
        form.push(("v", API_VERSION.to_string()));

        let response = self
            .http
            .post(&url)
            .form(&form)
            .send()
            .await
            .map_err(|e| VkError::Network(e.to_string()))?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| VkError::Network(e.to_string()))?;

        envelope(body, method)
    }

    /// Raw GET against an absolute URL (long-poll servers live outside the
    /// method base and use their own response shape).
    pub(crate) async fn get_raw(&self, url: &str) -> Result<Value, VkError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| VkError::Network(e.to_string()))?;
        response
            .json()
            .await
            .map_err(|e| VkError::Network(e.to_string()))
    }
}

/// Decodes the `{ response } / { error }` envelope into `T`.
fn envelope<T: DeserializeOwned>(body: Value, method: &str) -> Result<T, VkError> {
    if let Some(error) = body.get("error") {
        let code = error.get("error_code").and_then(Value::as_i64).unwrap_or(0);
        let message = error
            .get("error_msg")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        return Err(VkError::Api { code, message });
    }

    let Some(response) = body.get("response") else {
        return Err(VkError::Decode(format!(
            "{method}: body has neither response nor error"
        )));
    };
    serde_json::from_value(response.clone())
        .map_err(|e| VkError::Decode(format!("{method}: {e}")))
}

#[async_trait]
impl VkApi for VkClient {
    async fn wall_get_postponed(
        &self,
        domain: &str,
        offset: usize,
        count: usize,
    ) -> Result<WallGetResponse, VkError> {
        self.call(
            "wall.get",
            &[
                ("domain", domain.to_string()),
                ("offset", offset.to_string()),
                ("count", count.to_string()),
                ("filter", "postponed".to_string()),
            ],
        )
        .await
    }

    async fn group_info(&self) -> Result<Group, VkError> {
        // groups.getById without group_id resolves the token's own community.
        #[derive(serde::Deserialize)]
        struct GroupsById {
            groups: Vec<Group>,
        }

        let decoded: GroupsById = self.call("groups.getById", &[]).await?;
        decoded
            .groups
            .into_iter()
            .next()
            .ok_or_else(|| VkError::Decode("groups.getById: empty group list".to_string()))
    }

    async fn group_managers(&self, group_id: &str) -> Result<Vec<GroupMember>, VkError> {
        #[derive(serde::Deserialize)]
        struct Members {
            #[serde(default)]
            items: Vec<GroupMember>,
        }

        let decoded: Members = self
            .call(
                "groups.getMembers",
                &[
                    ("group_id", group_id.to_string()),
                    ("filter", "managers".to_string()),
                ],
            )
            .await?;
        Ok(decoded.items)
    }

    async fn send_message(&self, message: &OutgoingMessage) -> Result<(), VkError> {
        let mut params = vec![
            ("peer_id", message.peer_id.to_string()),
            ("message", message.text.clone()),
            ("random_id", MESSAGE_RANDOM_ID.to_string()),
        ];
        if let Some(attachment) = &message.attachment {
            params.push(("attachment", attachment.clone()));
        }

        // messages.send returns the new message id; the bot has no use for it.
        let _id: Value = self.call("messages.send", &params).await?;
        Ok(())
    }
}

/// Derives the manager set from raw member rows, keeping only roles with
/// elevated rights.
#[must_use]
pub fn manager_set(members: &[GroupMember]) -> std::collections::HashSet<i64> {
    members
        .iter()
        .filter(|m| m.has_manager_rights())
        .map(|m| m.id)
        .collect()
}
