//! `scalyclaw-channels` — the channel manager (spec.md §4.13) and the
//! progress fabric (spec.md §4.6): adapter registration, typing loops, and
//! targeted delivery of progress/complete/error events back to whichever
//! channel a job came from.

pub mod channel;
pub mod error;
pub mod manager;
pub mod progress;
pub mod types;

pub use channel::Channel;
pub use error::ChannelError;
pub use manager::ChannelManager;
pub use progress::{ProgressEvent, ProgressEventType, ProgressFabric};
pub use types::{ChannelStatus, InboundMessage, MessageFormat, OutboundMessage};
