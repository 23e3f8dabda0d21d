use scalyclaw_kv::KvStore;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ChannelError;

/// Fixed TTL on the single-response key written for `complete`/`error`
/// events, used by request/reply callers that poll rather than subscribe
/// (spec.md §4.6).
const RESPONSE_TTL_SECS: i64 = 120;
/// TTL on the per-channel buffer list written when nobody was subscribed at
/// publish time, so a node can drain it on start or periodically.
const BUFFER_TTL_SECS: i64 = 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressEventType {
    Progress,
    Complete,
    Error,
}

/// One event on the `progress:<channelId>` pub/sub channel (spec.md §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub job_id: String,
    #[serde(rename = "type")]
    pub event_type: ProgressEventType,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Publishes progress/complete/error events for a channel id, with
/// single-response caching for request/reply callers and buffering when no
/// one is subscribed at publish time (spec.md §4.6).
#[derive(Clone)]
pub struct ProgressFabric {
    kv: KvStore,
}

impl ProgressFabric {
    pub fn new(kv: KvStore) -> Self {
        Self { kv }
    }

    /// Publish `event` on `progress:<channel_id>`.
    ///
    /// - `complete`/`error` additionally write a single-response key with a
    ///   fixed TTL.
    /// - If nobody was subscribed when we checked, the payload is also
    ///   appended to the channel's buffer list (with a matching TTL) so a
    ///   reconnecting node can drain it.
    pub async fn publish(&self, channel_id: &str, event: &ProgressEvent) -> Result<(), ChannelError> {
        let payload = serde_json::to_string(event)?;

        if matches!(event.event_type, ProgressEventType::Complete | ProgressEventType::Error) {
            let key = scalyclaw_kv::keys::progress_response(&event.job_id);
            self.kv.set_ex(&key, &payload, RESPONSE_TTL_SECS as u64).await?;
        }

        let subscribers = self.kv.num_subscribers(&scalyclaw_kv::keys::progress(channel_id)).await?;
        if subscribers == 0 {
            debug!(channel_id, job_id = %event.job_id, "no progress subscribers, buffering");
            let buffer_key = scalyclaw_kv::keys::progress_buffer(channel_id);
            self.kv.rpush(&buffer_key, &payload).await?;
            self.kv.expire(&buffer_key, BUFFER_TTL_SECS).await?;
        }

        self.kv.publish(&scalyclaw_kv::keys::progress(channel_id), &payload).await?;
        Ok(())
    }

    /// Drain and return any buffered events for `channel_id` (spec.md §4.6
    /// "so the node can drain it on start or periodically"), oldest first.
    pub async fn drain_buffer(&self, channel_id: &str) -> Result<Vec<ProgressEvent>, ChannelError> {
        let key = scalyclaw_kv::keys::progress_buffer(channel_id);
        let raw = self.kv.lrange(&key, 0, -1).await?;
        self.kv.del(&key).await?;
        let mut events = Vec::with_capacity(raw.len());
        for item in raw {
            events.push(serde_json::from_str(&item)?);
        }
        Ok(events)
    }

    /// Open a pattern-subscription on `progress:*` (spec.md §4.6 "Subscriber
    /// uses pattern-subscribe on `progress:*`").
    pub async fn subscribe_all(&self) -> Result<redis::aio::PubSub, ChannelError> {
        let mut pubsub = self.kv.pubsub().await?;
        pubsub.psubscribe(scalyclaw_kv::keys::progress_pattern()).await?;
        Ok(pubsub)
    }
}
