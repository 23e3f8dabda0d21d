use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::error::{Result, SchedulerError};
use crate::types::Recurrence;

/// Compute the next UTC fire time for `recurrence`, starting *after* `from`.
pub fn compute_next_run(recurrence: &Recurrence, from: DateTime<Utc>) -> Result<DateTime<Utc>> {
    match recurrence {
        Recurrence::Interval { interval_ms, .. } => {
            Ok(from + chrono::Duration::milliseconds(*interval_ms as i64))
        }
        Recurrence::Cron { cron, .. } => {
            let schedule = cron::Schedule::from_str(cron)
                .map_err(|e| SchedulerError::InvalidSchedule(e.to_string()))?;
            schedule
                .after(&from)
                .next()
                .ok_or_else(|| SchedulerError::InvalidSchedule("cron schedule has no next fire".into()))
        }
    }
}
