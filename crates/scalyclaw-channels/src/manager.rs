use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

use crate::{
    channel::Channel,
    error::ChannelError,
    types::{ChannelStatus, MessageFormat, OutboundMessage},
};

/// Minimum delay between reconnect attempts (seconds).
const BACKOFF_BASE_SECS: u64 = 5;
/// Maximum delay between reconnect attempts (seconds).
const BACKOFF_MAX_SECS: u64 = 300; // 5 minutes
/// Maximum number of reconnect attempts before giving up.
const MAX_ATTEMPTS: u32 = 10;
/// Jitter fraction applied to each delay (±10 %).
const JITTER_FRACTION: f64 = 0.10;

type SharedChannel = Arc<AsyncMutex<Box<dyn Channel + Send + Sync>>>;

/// Manages a collection of channel adapters.
///
/// Channels are stored by their [`Channel::name`] and can be connected,
/// disconnected, or queried as a group. The manager applies exponential
/// backoff with jitter when a channel connection fails, and drives a
/// per-(channel, recipient) typing loop while a job is in flight (spec.md
/// §4.13).
pub struct ChannelManager {
    channels: HashMap<String, SharedChannel>,
    typing_loops: StdMutex<HashMap<(String, String), JoinHandle<()>>>,
}

impl ChannelManager {
    /// Create an empty manager with no registered channels.
    pub fn new() -> Self {
        Self {
            channels: HashMap::new(),
            typing_loops: StdMutex::new(HashMap::new()),
        }
    }

    /// Register a channel adapter.
    ///
    /// If a channel with the same name is already registered it is replaced
    /// (spec.md §4.13 "on a config change ... the manager replaces the
    /// adapter set while existing sessions complete gracefully").
    pub fn register(&mut self, channel: Box<dyn Channel + Send + Sync>) {
        let name = channel.name().to_string();
        info!(channel = %name, "registering channel adapter");
        self.channels.insert(name, Arc::new(AsyncMutex::new(channel)));
    }

    /// Connect all registered channels.
    ///
    /// Each channel is connected sequentially. On failure, exponential backoff
    /// with jitter is applied up to [`MAX_ATTEMPTS`] times before the error is
    /// logged and the channel is skipped.
    pub async fn connect_all(&self) {
        for (name, channel) in self.channels.iter() {
            info!(channel = %name, "connecting channel");
            let mut guard = channel.lock().await;
            if let Err(e) = connect_with_backoff(name, guard.as_mut()).await {
                error!(channel = %name, error = %e, "failed to connect channel after retries");
            }
        }
    }

    /// Disconnect all registered channels.
    ///
    /// Errors are logged but do not abort disconnection of remaining channels.
    pub async fn disconnect_all(&self) {
        for (name, channel) in self.channels.iter() {
            info!(channel = %name, "disconnecting channel");
            let mut guard = channel.lock().await;
            if let Err(e) = guard.disconnect().await {
                warn!(channel = %name, error = %e, "error while disconnecting channel");
            }
        }
    }

    /// Return the current [`ChannelStatus`] for every registered channel.
    ///
    /// The returned `Vec` is sorted by channel name for deterministic output.
    pub async fn statuses(&self) -> Vec<(String, ChannelStatus)> {
        let mut result = Vec::with_capacity(self.channels.len());
        for (name, channel) in self.channels.iter() {
            let status = channel.lock().await.status();
            result.push((name.clone(), status));
        }
        result.sort_by(|a, b| a.0.cmp(&b.0));
        result
    }

    fn lookup(&self, name: &str) -> Result<SharedChannel, ChannelError> {
        self.channels
            .get(name)
            .cloned()
            .ok_or_else(|| ChannelError::UnknownChannel(name.to_string()))
    }

    /// Deliver a text message through the named channel (spec.md §4.13
    /// `sendToChannel`).
    pub async fn send_to_channel(
        &self,
        channel_name: &str,
        recipient_id: &str,
        content: &str,
        format: MessageFormat,
    ) -> Result<(), ChannelError> {
        let channel = self.lookup(channel_name)?;
        let msg = OutboundMessage {
            channel: channel_name.to_string(),
            recipient_id: recipient_id.to_string(),
            content: content.to_string(),
            format,
        };
        channel.lock().await.send(&msg).await
    }

    /// Deliver a file with an optional caption (spec.md §4.13
    /// `sendFileToChannel`).
    pub async fn send_file_to_channel(
        &self,
        channel_name: &str,
        recipient_id: &str,
        file_path: &str,
        caption: Option<&str>,
    ) -> Result<(), ChannelError> {
        let channel = self.lookup(channel_name)?;
        channel.lock().await.send_file(recipient_id, file_path, caption).await
    }

    /// Send a single typing indicator immediately (spec.md §4.13
    /// `sendTypingToChannel`).
    pub async fn send_typing_to_channel(
        &self,
        channel_name: &str,
        recipient_id: &str,
    ) -> Result<(), ChannelError> {
        let channel = self.lookup(channel_name)?;
        channel.lock().await.send_typing(recipient_id).await
    }

    /// Start ticking `sendTyping` at the adapter's own cadence for
    /// `(channel_name, recipient_id)`. Idempotent — a loop already running
    /// for that pair is left alone. Call [`Self::stop_typing_loop`] once
    /// the job completes.
    pub fn start_typing_loop(&self, channel_name: &str, recipient_id: &str) {
        let key = (channel_name.to_string(), recipient_id.to_string());
        let mut loops = self.typing_loops.lock().expect("typing loop registry poisoned");
        if loops.contains_key(&key) {
            return;
        }
        let Some(channel) = self.channels.get(channel_name).cloned() else {
            warn!(channel = channel_name, "cannot start typing loop for unknown channel");
            return;
        };
        let recipient = recipient_id.to_string();
        let handle = tokio::spawn(async move {
            loop {
                let interval = {
                    let guard = channel.lock().await;
                    if let Err(e) = guard.send_typing(&recipient).await {
                        warn!(recipient = %recipient, error = %e, "typing indicator send failed");
                    }
                    guard.typing_interval()
                };
                sleep(interval).await;
            }
        });
        loops.insert(key, handle);
    }

    /// Stop the typing loop for `(channel_name, recipient_id)`, if running.
    pub fn stop_typing_loop(&self, channel_name: &str, recipient_id: &str) {
        let key = (channel_name.to_string(), recipient_id.to_string());
        if let Some(handle) = self
            .typing_loops
            .lock()
            .expect("typing loop registry poisoned")
            .remove(&key)
        {
            handle.abort();
        }
    }
}

impl Default for ChannelManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ChannelManager {
    fn drop(&mut self) {
        let loops = self.typing_loops.lock().expect("typing loop registry poisoned");
        for handle in loops.values() {
            handle.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Attempt to connect a single channel with exponential backoff and ±10 % jitter.
///
/// Schedule: 5 s → 10 s → 20 s → … → 300 s (cap), up to [`MAX_ATTEMPTS`] tries.
async fn connect_with_backoff(name: &str, channel: &mut dyn Channel) -> Result<(), ChannelError> {
    let mut delay_secs = BACKOFF_BASE_SECS;

    for attempt in 1..=MAX_ATTEMPTS {
        match channel.connect().await {
            Ok(()) => {
                info!(channel = %name, attempt, "channel connected successfully");
                return Ok(());
            }
            Err(e) if attempt == MAX_ATTEMPTS => {
                return Err(e);
            }
            Err(e) => {
                let jitter = jitter_secs(delay_secs);
                let total = delay_secs + jitter;
                warn!(
                    channel = %name,
                    attempt,
                    max = MAX_ATTEMPTS,
                    error = %e,
                    retry_after_secs = total,
                    "channel connect failed, retrying with backoff"
                );
                sleep(Duration::from_secs(total)).await;
                delay_secs = (delay_secs * 2).min(BACKOFF_MAX_SECS);
            }
        }
    }

    // Unreachable — the loop always returns inside the match arms above.
    unreachable!("backoff loop exited without returning")
}

/// Return a jitter offset (0 … `JITTER_FRACTION * base_secs`) as integer seconds.
///
/// Uses a simple deterministic pseudo-random value derived from the current
/// monotonic timestamp, avoiding a rand dependency.
fn jitter_secs(base_secs: u64) -> u64 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);

    let max_jitter = ((base_secs as f64) * JITTER_FRACTION) as u64;
    if max_jitter == 0 {
        return 0;
    }
    (nanos as u64) % max_jitter
}
