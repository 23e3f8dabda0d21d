use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use chrono::Utc;
use scalyclaw_kv::KvStore;
use tokio::sync::watch;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::error::{QueueError, Result};
use crate::types::{EnqueueOptions, JobState, QueueJob, RepeatSpec};

/// Polling cadence for promoting due delayed/repeatable jobs into a queue's
/// waiting list — mirrors the scheduler's own 1s tick.
const PROMOTE_INTERVAL: std::time::Duration = std::time::Duration::from_secs(1);
/// How long a failed job's hash survives after exhausting retries, so the
/// management HTTP surface can still show "why did this fail" briefly.
const FAILED_RETENTION_SECS: i64 = 7 * 24 * 3600;
const DEFAULT_ATTEMPTS: u32 = 3;
const DEFAULT_BACKOFF_MS: u64 = 1_000;
const POLL_IDLE: std::time::Duration = std::time::Duration::from_millis(100);

/// One processor invocation per job. Implemented by each consumer (message
/// pipeline, agent runner, internal scheduler fire, worker tool execution).
#[async_trait]
pub trait Processor: Send + Sync {
    async fn process(&self, job: &QueueJob) -> std::result::Result<serde_json::Value, String>;
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as i64
}

/// Named FIFO queues with retries, delays, cron/interval repeats, cancel
/// signals, and progress-style request/reply (spec.md §4.5).
#[derive(Clone)]
pub struct QueueFabric {
    kv: KvStore,
}

impl QueueFabric {
    pub fn new(kv: KvStore) -> Self {
        Self { kv }
    }

    #[instrument(skip(self, payload, opts))]
    pub async fn enqueue(
        &self,
        queue: &str,
        name: &str,
        payload: serde_json::Value,
        opts: EnqueueOptions,
    ) -> Result<String> {
        let id = opts.job_id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
        let now = Utc::now();

        let job = QueueJob {
            id: id.clone(),
            queue: queue.to_string(),
            name: name.to_string(),
            payload,
            state: JobState::Waiting,
            attempts_made: 0,
            max_attempts: opts.attempts.unwrap_or(DEFAULT_ATTEMPTS),
            backoff_ms: opts.backoff_ms.unwrap_or(DEFAULT_BACKOFF_MS),
            priority: opts.priority.unwrap_or(0),
            repeat: opts.repeat.clone(),
            channel_id: opts.channel_id.clone(),
            cancelled: false,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        };

        let mut job = job;
        self.kv.sadd(&scalyclaw_kv::keys::queue_index(queue), &id).await?;
        if let Some(channel_id) = &opts.channel_id {
            self.kv
                .sadd(&scalyclaw_kv::keys::channel_jobs(channel_id), &id)
                .await?;
        }

        match (opts.delay_ms, &opts.repeat) {
            (Some(delay), _) => {
                job.state = JobState::Delayed;
                self.save_job(&job).await?;
                self.schedule_delayed(queue, &id, now_ms() + delay as i64).await?;
            }
            (None, Some(repeat)) => {
                let due = next_due_ms(repeat, now_ms())?;
                job.state = JobState::Delayed;
                self.save_job(&job).await?;
                self.schedule_delayed(queue, &id, due).await?;
            }
            (None, None) => {
                self.save_job(&job).await?;
                self.push_waiting(queue, &id, job.priority).await?;
            }
        }

        Ok(id)
    }

    async fn schedule_delayed(&self, queue: &str, job_id: &str, due_ms: i64) -> Result<()> {
        self.kv
            .zadd(&scalyclaw_kv::keys::queue_delayed(queue), job_id, due_ms as f64)
            .await?;
        Ok(())
    }

    async fn push_waiting(&self, queue: &str, job_id: &str, priority: i32) -> Result<()> {
        // Known slash-command tokens and other priority-1 work jump the
        // queue by entering at the head instead of the tail (spec.md §6
        // "Known-command tokens receive queue priority 1").
        if priority <= 0 {
            self.kv.rpush(&scalyclaw_kv::keys::queue_waiting(queue), job_id).await?;
        } else {
            self.kv.lpush(&scalyclaw_kv::keys::queue_waiting(queue), job_id).await?;
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn remove_repeatable(&self, job_id: &str, queue: &str) -> Result<()> {
        self.kv.zrem(&scalyclaw_kv::keys::queue_delayed(queue), job_id).await?;
        self.kv.del(&scalyclaw_kv::keys::queue_job(queue, job_id)).await?;
        Ok(())
    }

    /// Publishes a cancel-signal event and marks a cancellation flag;
    /// processors register an abort token under their job id and listen
    /// (spec.md §4.5).
    #[instrument(skip(self))]
    pub async fn cancel_job(&self, queue: &str, job_id: &str) -> Result<()> {
        if let Some(mut job) = self.get_job(queue, job_id).await? {
            job.cancelled = true;
            job.updated_at = Utc::now();
            self.save_job(&job).await?;
        }
        self.kv
            .publish(&scalyclaw_kv::keys::queue_cancel_channel(queue), job_id)
            .await?;
        Ok(())
    }

    /// `/stop`: remove all waiting/prioritised jobs for a channel across the
    /// named queues, plus every tracked tool job id (spec.md §8 property 3).
    pub async fn drain_channel(&self, queues: &[&str], channel_id: &str) -> Result<usize> {
        let tracked = self.kv.smembers(&scalyclaw_kv::keys::channel_jobs(channel_id)).await?;
        let mut removed = 0;
        for queue in queues {
            for job_id in &tracked {
                if let Some(job) = self.get_job(queue, job_id).await? {
                    if job.state == JobState::Waiting || job.state == JobState::Delayed {
                        self.kv
                            .zrem(&scalyclaw_kv::keys::queue_delayed(queue), job_id)
                            .await?;
                        self.kv.del(&scalyclaw_kv::keys::queue_job(queue, job_id)).await?;
                        removed += 1;
                    }
                }
            }
        }
        self.kv.del(&scalyclaw_kv::keys::channel_jobs(channel_id)).await?;
        Ok(removed)
    }

    pub async fn get_job(&self, queue: &str, job_id: &str) -> Result<Option<QueueJob>> {
        Ok(self.kv.get_json(&scalyclaw_kv::keys::queue_job(queue, job_id)).await?)
    }

    /// All jobs ever enqueued on this queue that are still retrievable
    /// (failed jobs expire after `FAILED_RETENTION_SECS`), for the `GET
    /// /api/jobs` admin surface.
    pub async fn list_jobs(&self, queue: &str) -> Result<Vec<QueueJob>> {
        let ids = self.kv.smembers(&scalyclaw_kv::keys::queue_index(queue)).await?;
        let mut jobs = Vec::with_capacity(ids.len());
        for id in ids {
            match self.get_job(queue, &id).await? {
                Some(job) => jobs.push(job),
                None => self.kv.srem(&scalyclaw_kv::keys::queue_index(queue), &id).await?,
            }
        }
        jobs.sort_by_key(|j| j.created_at);
        Ok(jobs)
    }

    /// Counts of jobs in each state for `GET /api/jobs/counts`.
    pub async fn job_counts(&self, queue: &str) -> Result<std::collections::HashMap<String, usize>> {
        let mut counts = std::collections::HashMap::new();
        for job in self.list_jobs(queue).await? {
            *counts.entry(format!("{:?}", job.state).to_lowercase()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    /// Re-queue a failed/completed job for another attempt.
    pub async fn retry_job(&self, queue: &str, job_id: &str) -> Result<()> {
        let mut job = self
            .get_job(queue, job_id)
            .await?
            .ok_or_else(|| QueueError::JobNotFound { id: job_id.to_string() })?;
        job.attempts_made = 0;
        job.cancelled = false;
        job.error = None;
        job.state = JobState::Waiting;
        job.updated_at = Utc::now();
        self.save_job(&job).await?;
        self.push_waiting(queue, job_id, job.priority).await
    }

    /// Force a job straight to `completed` (admin override).
    pub async fn complete_job_admin(&self, queue: &str, job_id: &str) -> Result<()> {
        let mut job = self
            .get_job(queue, job_id)
            .await?
            .ok_or_else(|| QueueError::JobNotFound { id: job_id.to_string() })?;
        job.state = JobState::Completed;
        job.updated_at = Utc::now();
        self.save_job(&job).await
    }

    /// Force a job straight to `failed` (admin override).
    pub async fn fail_job_admin(&self, queue: &str, job_id: &str, reason: &str) -> Result<()> {
        let mut job = self
            .get_job(queue, job_id)
            .await?
            .ok_or_else(|| QueueError::JobNotFound { id: job_id.to_string() })?;
        job.state = JobState::Failed;
        job.error = Some(reason.to_string());
        job.updated_at = Utc::now();
        self.save_job(&job).await?;
        self.kv
            .expire(&scalyclaw_kv::keys::queue_job(queue, job_id), FAILED_RETENTION_SECS)
            .await?;
        Ok(())
    }

    /// Permanently remove a job's hash and index entry.
    pub async fn delete_job(&self, queue: &str, job_id: &str) -> Result<()> {
        self.kv.del(&scalyclaw_kv::keys::queue_job(queue, job_id)).await?;
        self.kv.srem(&scalyclaw_kv::keys::queue_index(queue), job_id).await?;
        self.kv.zrem(&scalyclaw_kv::keys::queue_delayed(queue), job_id).await?;
        Ok(())
    }

    async fn save_job(&self, job: &QueueJob) -> Result<()> {
        self.kv
            .set_json(&scalyclaw_kv::keys::queue_job(&job.queue, &job.id), job)
            .await?;
        Ok(())
    }

    /// Request/reply pattern: poll until the job reaches a terminal state
    /// or `timeout_ms` elapses.
    #[instrument(skip(self))]
    pub async fn wait_until_finished(
        &self,
        queue: &str,
        job_id: &str,
        timeout_ms: u64,
    ) -> Result<serde_json::Value> {
        let deadline = tokio::time::Instant::now() + std::time::Duration::from_millis(timeout_ms);
        loop {
            if let Some(job) = self.get_job(queue, job_id).await? {
                match job.state {
                    JobState::Completed => return Ok(job.result.unwrap_or(serde_json::Value::Null)),
                    JobState::Failed => {
                        return Err(QueueError::JobFailed {
                            id: job_id.to_string(),
                            reason: job.error.unwrap_or_default(),
                        })
                    }
                    _ => {}
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(QueueError::WaitTimeout {
                    id: job_id.to_string(),
                    ms: timeout_ms,
                });
            }
            tokio::time::sleep(POLL_IDLE).await;
        }
    }

    /// Move due delayed/repeatable jobs into the waiting list.
    async fn promote_due(&self, queue: &str) -> Result<()> {
        let due = self
            .kv
            .zrangebyscore(&scalyclaw_kv::keys::queue_delayed(queue), 0.0, now_ms() as f64)
            .await?;
        for job_id in due {
            self.kv.zrem(&scalyclaw_kv::keys::queue_delayed(queue), &job_id).await?;
            if let Some(mut job) = self.get_job(queue, &job_id).await? {
                if job.cancelled {
                    continue;
                }
                job.state = JobState::Waiting;
                job.updated_at = Utc::now();
                self.save_job(&job).await?;
                self.push_waiting(queue, &job_id, job.priority).await?;
            }
        }
        Ok(())
    }

    /// Run one queue's consumer: a promoter task plus `concurrency` worker
    /// tasks, cooperating over `shutdown` (spec.md §5 "a consumer processes
    /// one job at a time from its reserved slot").
    pub async fn run_consumer(
        self: Arc<Self>,
        queue: String,
        concurrency: usize,
        processor: Arc<dyn Processor>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let promoter = {
            let fabric = self.clone();
            let queue = queue.clone();
            let mut shutdown = shutdown.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(PROMOTE_INTERVAL);
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            if let Err(e) = fabric.promote_due(&queue).await {
                                warn!(queue = %queue, error = %e, "failed to promote due jobs");
                            }
                        }
                        _ = shutdown.changed() => {
                            if *shutdown.borrow() { break; }
                        }
                    }
                }
            })
        };

        let mut workers = Vec::with_capacity(concurrency);
        for _ in 0..concurrency {
            let fabric = self.clone();
            let queue = queue.clone();
            let processor = processor.clone();
            let mut shutdown = shutdown.clone();
            workers.push(tokio::spawn(async move {
                loop {
                    if *shutdown.borrow() {
                        break;
                    }
                    match fabric.pop_and_process(&queue, processor.as_ref()).await {
                        Ok(true) => {}
                        Ok(false) => {
                            tokio::select! {
                                _ = tokio::time::sleep(POLL_IDLE) => {}
                                _ = shutdown.changed() => {}
                            }
                        }
                        Err(e) => warn!(queue = %queue, error = %e, "worker iteration failed"),
                    }
                }
            }));
        }

        let _ = shutdown.changed().await;
        promoter.abort();
        for w in workers {
            w.abort();
        }
    }

    /// Pop one job and run it to completion. Returns `Ok(false)` when the
    /// queue was empty (caller should back off before polling again).
    async fn pop_and_process(&self, queue: &str, processor: &dyn Processor) -> Result<bool> {
        let Some(job_id) = self.kv.lpop(&scalyclaw_kv::keys::queue_waiting(queue)).await? else {
            return Ok(false);
        };
        let Some(mut job) = self.get_job(queue, &job_id).await? else {
            return Ok(true);
        };
        if job.cancelled {
            job.state = JobState::Completed;
            self.save_job(&job).await?;
            return Ok(true);
        }

        job.state = JobState::Active;
        job.updated_at = Utc::now();
        self.save_job(&job).await?;

        match processor.process(&job).await {
            Ok(result) => {
                job.state = JobState::Completed;
                job.result = Some(result);
                job.error = None;
            }
            Err(reason) => {
                job.attempts_made += 1;
                if job.attempts_made < job.max_attempts {
                    job.state = JobState::Delayed;
                    let backoff = job.backoff_ms * job.attempts_made as u64;
                    self.schedule_delayed(queue, &job.id, now_ms() + backoff as i64).await?;
                } else {
                    job.state = JobState::Failed;
                    job.error = Some(reason);
                }
            }
        }
        job.updated_at = Utc::now();
        self.save_job(&job).await?;

        if job.state == JobState::Failed {
            self.kv
                .expire(&scalyclaw_kv::keys::queue_job(queue, &job.id), FAILED_RETENTION_SECS)
                .await?;
        }

        if let Some(repeat) = job.repeat.clone() {
            if matches!(job.state, JobState::Completed | JobState::Failed) {
                let due = next_due_ms(&repeat, now_ms())?;
                job.state = JobState::Delayed;
                job.attempts_made = 0;
                self.save_job(&job).await?;
                self.schedule_delayed(queue, &job.id, due).await?;
            }
        }

        Ok(true)
    }
}

fn next_due_ms(repeat: &RepeatSpec, from_ms: i64) -> Result<i64> {
    match repeat {
        RepeatSpec::Every { every_ms } => Ok(from_ms + *every_ms as i64),
        RepeatSpec::Cron { pattern, .. } => {
            use std::str::FromStr;
            let schedule = cron::Schedule::from_str(pattern)
                .map_err(|e| QueueError::InvalidRepeat(e.to_string()))?;
            let from = chrono::DateTime::<Utc>::from_timestamp_millis(from_ms)
                .unwrap_or_else(Utc::now);
            let next = schedule
                .after(&from)
                .next()
                .ok_or_else(|| QueueError::InvalidRepeat("cron schedule has no next fire".into()))?;
            Ok(next.timestamp_millis())
        }
    }
}
