use std::time::Duration;

use async_trait::async_trait;

use crate::{
    error::ChannelError,
    types::{ChannelStatus, OutboundMessage},
};

/// Default cadence at which typing indicators are re-sent while a job runs
/// (spec.md §4.13 "ticking send-typing at adapter-defined cadence").
const DEFAULT_TYPING_INTERVAL: Duration = Duration::from_secs(4);

/// Common interface implemented by every channel adapter (Telegram, Discord, WebChat, …).
///
/// Implementations must be `Send + Sync` so they can be stored in a `ChannelManager`
/// and driven from multiple Tokio tasks.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Stable lowercase identifier for this channel (e.g. `"telegram"`).
    ///
    /// The name is used as the key inside [`ChannelManager`](crate::manager::ChannelManager)
    /// and must be unique across all registered adapters.
    fn name(&self) -> &str;

    /// Establish the connection to the external service.
    ///
    /// Implementations should transition their internal state to
    /// [`ChannelStatus::Connected`] on success.
    async fn connect(&mut self) -> Result<(), ChannelError>;

    /// Gracefully close the connection.
    ///
    /// Implementations should transition their internal state to
    /// [`ChannelStatus::Disconnected`] on success.
    async fn disconnect(&mut self) -> Result<(), ChannelError>;

    /// Deliver a single outbound message to the channel.
    ///
    /// This is intentionally `&self` (shared reference) so that a connected
    /// adapter can send concurrently without a mutable borrow.
    async fn send(&self, msg: &OutboundMessage) -> Result<(), ChannelError>;

    /// Deliver a file with an optional caption (spec.md §4.6 "`complete`
    /// with `filePath` → file send").
    async fn send_file(
        &self,
        recipient_id: &str,
        file_path: &str,
        caption: Option<&str>,
    ) -> Result<(), ChannelError>;

    /// Send a single "typing…" indicator to `recipient_id`. Called
    /// repeatedly by the channel manager's typing loop while a job runs.
    async fn send_typing(&self, recipient_id: &str) -> Result<(), ChannelError>;

    /// How often the typing loop should re-send the indicator. Platforms
    /// whose typing indicator expires faster than others override this.
    fn typing_interval(&self) -> Duration {
        DEFAULT_TYPING_INTERVAL
    }

    /// Return the current runtime status without blocking.
    fn status(&self) -> ChannelStatus;
}
