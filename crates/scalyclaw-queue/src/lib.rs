//! `scalyclaw-queue` — the job-queue fabric (spec.md §4.5): named FIFO
//! queues with retries, delays, cron/interval repeats, cancel signals, and
//! request/reply waiting, all backed by `scalyclaw-kv`.

pub mod error;
pub mod fabric;
pub mod types;

pub use error::{QueueError, Result};
pub use fabric::{Processor, QueueFabric};
pub use types::{EnqueueOptions, JobState, QueueJob, RepeatSpec};
