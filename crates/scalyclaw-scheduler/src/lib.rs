//! `scalyclaw-scheduler` — reminders and recurrent tasks (spec.md §4.10).
//!
//! # Overview
//!
//! A [`ScheduledJob`] is persisted as a `scheduled:<id>` hash in
//! `scalyclaw-kv`; [`manager::SchedulerManager`] is the only thing that
//! reads or writes it. Firing precision is delegated entirely to
//! `scalyclaw-queue`'s own delayed/repeatable scheduling on its `internal`
//! queue — this crate pairs every hash with a matching queue job at
//! creation time and removes that pairing on any transition out of
//! `active`, but it runs no polling loop of its own.
//!
//! # Recurrence variants
//!
//! | Variant    | Behaviour                                             |
//! |------------|--------------------------------------------------------|
//! | `Cron`     | Cron expression, evaluated in UTC via the `cron` crate |
//! | `Interval` | Repeat every N milliseconds                           |

pub mod error;
pub mod manager;
pub mod schedule;
pub mod types;

pub use error::{Result, SchedulerError};
pub use manager::SchedulerManager;
pub use types::{Recurrence, ScheduledJob, ScheduledJobState, ScheduledJobType};
