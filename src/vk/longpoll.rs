//! Bots Long Poll listener.
//!
//! The hosting event source for the bot: obtains a long-poll server for the
//! community and turns `message_new` updates into [`IncomingMessage`]s.
//! Everything command-related happens downstream; this module only keeps
//! the poll cursor alive.

use crate::vk::client::{VkClient, VkError};
use crate::vk::types::IncomingMessage;
use serde_json::Value;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Seconds the server holds the request open before answering empty.
const POLL_WAIT_SECS: u64 = 25;

/// Pause before re-polling after a transport error.
const POLL_RETRY_PAUSE: Duration = Duration::from_secs(3);

struct PollServer {
    server: String,
    key: String,
    ts: String,
}

/// Long-poll listener bound to one community.
pub struct LongPollListener {
    client: VkClient,
    group_id: i64,
    cancel: CancellationToken,
}

impl LongPollListener {
    #[must_use]
    pub fn new(client: VkClient, group_id: i64, cancel: CancellationToken) -> Self {
        Self {
            client,
            group_id,
            cancel,
        }
    }

    /// Runs the poll loop until cancelled, invoking `dispatch` for every
    /// inbound message. `dispatch` is expected to spawn its own task so a
    /// slow handler never blocks the cursor.
    ///
    /// # Errors
    ///
    /// Returns an error only when the long-poll server cannot be (re-)keyed.
    pub async fn run<F>(&self, mut dispatch: F) -> Result<(), VkError>
    where
        F: FnMut(IncomingMessage),
    {
        let mut server = self.key_server().await?;
        info!(group_id = self.group_id, "long poll started");

        loop {
            if self.cancel.is_cancelled() {
                info!("long poll stopped");
                return Ok(());
            }

            let body = tokio::select! {
                () = self.cancel.cancelled() => continue,
                result = self.poll_once(&server) => match result {
                    Ok(body) => body,
                    Err(e) => {
                        warn!("long poll request failed: {e}");
                        tokio::time::sleep(POLL_RETRY_PAUSE).await;
                        continue;
                    }
                },
            };

            // failed=1 means a stale ts (the new one is attached);
            // failed=2/3 require a fresh key from the API.
            if let Some(failed) = body.get("failed").and_then(Value::as_i64) {
                if failed == 1 {
                    if let Some(ts) = body.get("ts") {
                        server.ts = ts_string(ts);
                    }
                } else {
                    warn!(failed, "long poll session expired, re-keying");
                    server = self.key_server().await?;
                }
                continue;
            }

            if let Some(ts) = body.get("ts") {
                server.ts = ts_string(ts);
            }

            for message in extract_messages(&body) {
                dispatch(message);
            }
        }
    }

    async fn key_server(&self) -> Result<PollServer, VkError> {
        #[derive(serde::Deserialize)]
        struct Keyed {
            server: String,
            key: String,
            ts: String,
        }

        let keyed: Keyed = self
            .client
            .call(
                "groups.getLongPollServer",
                &[("group_id", self.group_id.to_string())],
            )
            .await?;
        Ok(PollServer {
            server: keyed.server,
            key: keyed.key,
            ts: keyed.ts,
        })
    }

    async fn poll_once(&self, server: &PollServer) -> Result<Value, VkError> {
        let url = format!(
            "{}?act=a_check&key={}&ts={}&wait={}",
            server.server, server.key, server.ts, POLL_WAIT_SECS
        );
        self.client.get_raw(&url).await
    }
}

/// The poll protocol has historically flipped `ts` between string and
/// number; accept both.
fn ts_string(ts: &Value) -> String {
    match ts {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Pulls `message_new` payloads out of a poll body, skipping anything that
/// does not decode (other update kinds, malformed objects).
fn extract_messages(body: &Value) -> Vec<IncomingMessage> {
    let Some(updates) = body.get("updates").and_then(Value::as_array) else {
        return Vec::new();
    };

    updates
        .iter()
        .filter(|u| u.get("type").and_then(Value::as_str) == Some("message_new"))
        .filter_map(|u| u.pointer("/object/message"))
        .filter_map(|m| serde_json::from_value(m.clone()).ok())
        .collect()
}
