use chrono::Utc;
use scalyclaw_kv::KvStore;
use scalyclaw_queue::{EnqueueOptions, QueueFabric, RepeatSpec};
use serde_json::json;
use tracing::instrument;
use uuid::Uuid;

use crate::error::{Result, SchedulerError};
use crate::schedule::compute_next_run;
use crate::types::{Recurrence, ScheduledJob, ScheduledJobState, ScheduledJobType};

/// Scheduled jobs that transitioned out of `active` keep their hash around
/// for this long so admin surfaces can still show why/when (spec.md §4.10
/// "terminal transitions stamp a seven-day TTL on the hash").
const TERMINAL_RETENTION_SECS: i64 = 7 * 24 * 3600;
const INTERNAL_QUEUE: &str = "internal";

/// The scheduler: CRUD + lifecycle over `scheduled:<id>` KV hashes, paired
/// with delayed/repeatable jobs on the queue fabric's `internal` queue for
/// actual delivery timing (spec.md §4.10).
#[derive(Clone)]
pub struct SchedulerManager {
    kv: KvStore,
    queue: QueueFabric,
}

impl SchedulerManager {
    pub fn new(kv: KvStore, queue: QueueFabric) -> Self {
        Self { kv, queue }
    }

    #[instrument(skip(self, message))]
    pub async fn create_reminder(
        &self,
        channel_id: &str,
        message: &str,
        delay_ms: u64,
    ) -> Result<ScheduledJob> {
        self.create_one_shot(channel_id, message, delay_ms, ScheduledJobType::Reminder)
            .await
    }

    #[instrument(skip(self, description))]
    pub async fn create_task(
        &self,
        channel_id: &str,
        description: &str,
        delay_ms: u64,
    ) -> Result<ScheduledJob> {
        self.create_one_shot(channel_id, description, delay_ms, ScheduledJobType::Task)
            .await
    }

    async fn create_one_shot(
        &self,
        channel_id: &str,
        description: &str,
        delay_ms: u64,
        job_type: ScheduledJobType,
    ) -> Result<ScheduledJob> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let next_run = now + chrono::Duration::milliseconds(delay_ms as i64);

        let job = ScheduledJob {
            id: id.clone(),
            state: ScheduledJobState::Active,
            job_type,
            channel_id: channel_id.to_string(),
            description: description.to_string(),
            cron_pattern: None,
            next_run: Some(next_run),
            timezone: None,
            created_at: now,
        };
        self.save(&job).await?;

        self.queue
            .enqueue(
                INTERNAL_QUEUE,
                job_type.to_string().as_str(),
                json!({ "scheduled_job_id": id, "channel_id": channel_id, "description": description }),
                EnqueueOptions {
                    delay_ms: Some(delay_ms),
                    job_id: Some(id.clone()),
                    channel_id: Some(channel_id.to_string()),
                    ..Default::default()
                },
            )
            .await?;

        Ok(job)
    }

    #[instrument(skip(self, text))]
    pub async fn create_recurrent_reminder(
        &self,
        channel_id: &str,
        text: &str,
        recurrence: Recurrence,
    ) -> Result<ScheduledJob> {
        self.create_recurrent(channel_id, text, recurrence, ScheduledJobType::RecurrentReminder)
            .await
    }

    #[instrument(skip(self, description))]
    pub async fn create_recurrent_task(
        &self,
        channel_id: &str,
        description: &str,
        recurrence: Recurrence,
    ) -> Result<ScheduledJob> {
        self.create_recurrent(channel_id, description, recurrence, ScheduledJobType::RecurrentTask)
            .await
    }

    async fn create_recurrent(
        &self,
        channel_id: &str,
        description: &str,
        recurrence: Recurrence,
        job_type: ScheduledJobType,
    ) -> Result<ScheduledJob> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let next_run = compute_next_run(&recurrence, now)?;

        let (cron_pattern, timezone, repeat) = match &recurrence {
            Recurrence::Cron { cron, timezone } => (
                Some(cron.clone()),
                timezone.clone(),
                RepeatSpec::Cron {
                    pattern: cron.clone(),
                    tz: timezone.clone(),
                },
            ),
            Recurrence::Interval { interval_ms, timezone } => (
                None,
                timezone.clone(),
                RepeatSpec::Every { every_ms: *interval_ms },
            ),
        };

        let job = ScheduledJob {
            id: id.clone(),
            state: ScheduledJobState::Active,
            job_type,
            channel_id: channel_id.to_string(),
            description: description.to_string(),
            cron_pattern,
            next_run: Some(next_run),
            timezone,
            created_at: now,
        };
        self.save(&job).await?;

        self.queue
            .enqueue(
                INTERNAL_QUEUE,
                job_type.to_string().as_str(),
                json!({ "scheduled_job_id": id, "channel_id": channel_id, "description": description }),
                EnqueueOptions {
                    job_id: Some(id.clone()),
                    channel_id: Some(channel_id.to_string()),
                    repeat: Some(repeat),
                    ..Default::default()
                },
            )
            .await?;

        Ok(job)
    }

    /// Type-checked cancel: refuses to cancel a task through the reminder
    /// path or vice versa.
    #[instrument(skip(self))]
    pub async fn cancel_reminder(&self, id: &str, channel_id: &str) -> Result<()> {
        self.cancel_scoped(id, channel_id, |t| t.is_reminder(), "reminder").await
    }

    #[instrument(skip(self))]
    pub async fn cancel_task(&self, id: &str, channel_id: &str) -> Result<()> {
        self.cancel_scoped(id, channel_id, |t| t.is_task(), "task").await
    }

    async fn cancel_scoped(
        &self,
        id: &str,
        channel_id: &str,
        matches_kind: impl Fn(ScheduledJobType) -> bool,
        expected: &'static str,
    ) -> Result<()> {
        let job = self.get(id).await?.ok_or_else(|| SchedulerError::JobNotFound { id: id.to_string() })?;
        if job.channel_id != channel_id {
            return Err(SchedulerError::JobNotFound { id: id.to_string() });
        }
        if !matches_kind(job.job_type) {
            return Err(SchedulerError::WrongKind {
                id: id.to_string(),
                expected,
                actual: job.job_type.to_string(),
            });
        }
        self.terminal_transition(id, ScheduledJobState::Cancelled).await
    }

    #[instrument(skip(self))]
    pub async fn complete_scheduled_job_admin(&self, id: &str) -> Result<()> {
        self.terminal_transition(id, ScheduledJobState::Completed).await
    }

    #[instrument(skip(self))]
    pub async fn cancel_scheduled_job_admin(&self, id: &str) -> Result<()> {
        self.terminal_transition(id, ScheduledJobState::Cancelled).await
    }

    #[instrument(skip(self))]
    pub async fn delete_scheduled_job(&self, id: &str) -> Result<()> {
        self.queue.remove_repeatable(id, INTERNAL_QUEUE).await?;
        self.kv.del(&scalyclaw_kv::keys::scheduled(id)).await?;
        self.kv.srem(scalyclaw_kv::keys::scheduled_index(), id).await?;
        Ok(())
    }

    /// Called by the internal-queue processor once a fired job has been
    /// delivered. One-shot jobs complete; recurrent jobs stay active with
    /// their `next_run` advanced (the queue fabric has already re-scheduled
    /// the next fire itself).
    #[instrument(skip(self))]
    pub async fn handle_fired(&self, id: &str, recurrence: Option<&Recurrence>) -> Result<()> {
        let Some(mut job) = self.get(id).await? else {
            return Ok(());
        };
        match recurrence {
            Some(r) => {
                job.next_run = Some(compute_next_run(r, Utc::now())?);
                self.save(&job).await?;
                Ok(())
            }
            None => self.terminal_transition(id, ScheduledJobState::Completed).await,
        }
    }

    pub async fn get(&self, id: &str) -> Result<Option<ScheduledJob>> {
        let fields = self.kv.hgetall(&scalyclaw_kv::keys::scheduled(id)).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        Ok(Some(hash_to_job(id, &fields)))
    }

    pub async fn list_all_scheduled_jobs(&self) -> Result<Vec<ScheduledJob>> {
        let ids = self.kv.smembers(scalyclaw_kv::keys::scheduled_index()).await?;
        let mut jobs = Vec::with_capacity(ids.len());
        for id in ids {
            let fields = self.kv.hgetall(&scalyclaw_kv::keys::scheduled(&id)).await?;
            if fields.is_empty() {
                // Expired terminal entry — opportunistically drop it from the index.
                self.kv.srem(scalyclaw_kv::keys::scheduled_index(), &id).await?;
                continue;
            }
            jobs.push(hash_to_job(&id, &fields));
        }
        Ok(jobs)
    }

    async fn terminal_transition(&self, id: &str, state: ScheduledJobState) -> Result<()> {
        let key = scalyclaw_kv::keys::scheduled(id);
        self.kv.hset(&key, "state", &state.to_string()).await?;
        self.kv.expire(&key, TERMINAL_RETENTION_SECS).await?;
        self.queue.remove_repeatable(id, INTERNAL_QUEUE).await?;
        Ok(())
    }

    async fn save(&self, job: &ScheduledJob) -> Result<()> {
        let key = scalyclaw_kv::keys::scheduled(&job.id);
        let next_run = job.next_run.map(|d| d.to_rfc3339()).unwrap_or_default();
        let cron_pattern = job.cron_pattern.clone().unwrap_or_default();
        let timezone = job.timezone.clone().unwrap_or_default();
        self.kv
            .hset_multiple(
                &key,
                &[
                    ("state", job.state.to_string().as_str()),
                    ("type", job.job_type.to_string().as_str()),
                    ("channel_id", job.channel_id.as_str()),
                    ("description", job.description.as_str()),
                    ("cron_pattern", cron_pattern.as_str()),
                    ("next_run", next_run.as_str()),
                    ("timezone", timezone.as_str()),
                    ("created_at", job.created_at.to_rfc3339().as_str()),
                ],
            )
            .await?;
        self.kv.sadd(scalyclaw_kv::keys::scheduled_index(), &job.id).await?;
        Ok(())
    }
}

fn hash_to_job(id: &str, fields: &std::collections::HashMap<String, String>) -> ScheduledJob {
    let get = |k: &str| fields.get(k).cloned().unwrap_or_default();
    ScheduledJob {
        id: id.to_string(),
        state: get("state").parse().unwrap_or(ScheduledJobState::Active),
        job_type: get("type").parse().unwrap_or(ScheduledJobType::Reminder),
        channel_id: get("channel_id"),
        description: get("description"),
        cron_pattern: fields.get("cron_pattern").filter(|s| !s.is_empty()).cloned(),
        next_run: fields
            .get("next_run")
            .filter(|s| !s.is_empty())
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
            .map(|d| d.with_timezone(&Utc)),
        timezone: fields.get("timezone").filter(|s| !s.is_empty()).cloned(),
        created_at: fields
            .get("created_at")
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(Utc::now),
    }
}
