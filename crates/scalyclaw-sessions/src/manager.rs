use std::time::{SystemTime, UNIX_EPOCH};

use redis::Script;
use scalyclaw_kv::KvStore;
use tracing::instrument;
use uuid::Uuid;

use crate::error::Result;
use crate::types::{SessionSnapshot, SessionState};

/// A session may be stolen once its heartbeat is older than this.
const STALE_THRESHOLD_MS: i64 = 60_000;
/// Safety TTL so a crashed owner's session doesn't wedge a channel forever.
const SESSION_TTL_SECS: i64 = 300;
/// N sends per window for the sliding-window rate limiter.
const DEFAULT_RATE_LIMIT_WINDOW_SECS: i64 = 60;
const GLOBAL_CANCEL_TTL_SECS: u64 = 30;

fn now_ms() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_millis() as i64
}

/// Per-channel advisory session, sliding-window rate limiter, and cancel
/// signalling — the session/rate/cancel control plane (spec.md §4.14).
#[derive(Clone)]
pub struct SessionManager {
    kv: KvStore,
    acquire: Script,
    heartbeat: Script,
    request_cancel: Script,
    release: Script,
}

impl SessionManager {
    pub fn new(kv: KvStore) -> Self {
        Self {
            kv,
            acquire: Script::new(crate::scripts::ACQUIRE),
            heartbeat: Script::new(crate::scripts::HEARTBEAT),
            request_cancel: Script::new(crate::scripts::REQUEST_CANCEL),
            release: Script::new(crate::scripts::RELEASE),
        }
    }

    /// Shared KV handle — other managers that need ad-hoc KV access (e.g.
    /// the gateway's agent-profile HTTP surface) reuse this one rather than
    /// opening a second connection.
    pub fn kv(&self) -> &KvStore {
        &self.kv
    }

    /// Attempts to acquire the advisory session for `channel_id`. Returns
    /// an owner token on success, `None` if another (non-stale) owner
    /// already holds it or it is sticky-cancelling.
    #[instrument(skip(self))]
    pub async fn acquire_session(&self, channel_id: &str) -> Result<Option<String>> {
        let owner = Uuid::new_v4().to_string();
        let key = scalyclaw_kv::keys::session(channel_id);
        let acquired: i64 = self
            .kv
            .eval_script(
                &self.acquire,
                &[&key],
                &[
                    &owner,
                    &now_ms().to_string(),
                    &STALE_THRESHOLD_MS.to_string(),
                    &SESSION_TTL_SECS.to_string(),
                ],
            )
            .await?;
        if acquired == 1 {
            self.kv.sadd(scalyclaw_kv::keys::session_index(), channel_id).await?;
            Ok(Some(owner))
        } else {
            Ok(None)
        }
    }

    /// Refresh the heartbeat for an owned session. Returns `false` if the
    /// caller no longer owns it (or never did).
    #[instrument(skip(self, owner))]
    pub async fn heartbeat(&self, channel_id: &str, owner: &str) -> Result<bool> {
        let key = scalyclaw_kv::keys::session(channel_id);
        let ok: i64 = self
            .kv
            .eval_script(
                &self.heartbeat,
                &[&key],
                &[owner, &now_ms().to_string(), &SESSION_TTL_SECS.to_string()],
            )
            .await?;
        Ok(ok == 1)
    }

    /// Flip a channel's session to CANCELLING. Idempotent; a no-op if the
    /// channel has no active session.
    #[instrument(skip(self))]
    pub async fn request_cancel(&self, channel_id: &str) -> Result<bool> {
        let key = scalyclaw_kv::keys::session(channel_id);
        let ok: i64 = self.kv.eval_script(&self.request_cancel, &[&key], &[]).await?;
        Ok(ok == 1)
    }

    /// Release a held session. Idempotent; succeeds even if no session
    /// exists, fails only if another owner holds it.
    #[instrument(skip(self, owner))]
    pub async fn release_session(&self, channel_id: &str, owner: &str) -> Result<bool> {
        let key = scalyclaw_kv::keys::session(channel_id);
        let ok: i64 = self.kv.eval_script(&self.release, &[&key], &[owner]).await?;
        if ok == 1 {
            self.kv.srem(scalyclaw_kv::keys::session_index(), channel_id).await?;
        }
        Ok(ok == 1)
    }

    /// Snapshot every channel that currently has (or recently had) a
    /// session, most-recently-acquired entries still present since
    /// `release_session` prunes the index. Bounded by `limit`.
    pub async fn list_sessions(&self, limit: usize) -> Result<Vec<SessionSnapshot>> {
        let channel_ids = self.kv.smembers(scalyclaw_kv::keys::session_index()).await?;
        let mut snapshots = Vec::new();
        for channel_id in channel_ids.into_iter().take(limit) {
            if let Some(snapshot) = self.snapshot(&channel_id).await? {
                snapshots.push(snapshot);
            } else {
                self.kv.srem(scalyclaw_kv::keys::session_index(), &channel_id).await?;
            }
        }
        Ok(snapshots)
    }

    /// Advance the owned session through `PROCESSING → {TOOL_EXEC,
    /// RESPONDING} → DRAINING` (spec.md §3). Owner-checked like
    /// `heartbeat`; never overwrites a sticky CANCELLING state.
    #[instrument(skip(self, owner))]
    pub async fn set_state(&self, channel_id: &str, owner: &str, state: SessionState) -> Result<bool> {
        let key = scalyclaw_kv::keys::session(channel_id);
        let fields = self.kv.hgetall(&key).await?;
        let Some(current_owner) = fields.get("owner") else {
            return Ok(false);
        };
        if current_owner != owner {
            return Ok(false);
        }
        if fields.get("state").map(String::as_str) == Some("cancelling") {
            return Ok(false);
        }
        self.kv.hset(&key, "state", &state.to_string()).await?;
        Ok(true)
    }

    /// Whether the channel's session is currently sticky-cancelling —
    /// processors poll this cooperatively.
    pub async fn is_cancelling(&self, channel_id: &str) -> Result<bool> {
        let key = scalyclaw_kv::keys::session(channel_id);
        match self.kv.hget(&key, "state").await? {
            Some(state) => Ok(state == "cancelling"),
            None => Ok(false),
        }
    }

    pub async fn snapshot(&self, channel_id: &str) -> Result<Option<SessionSnapshot>> {
        let key = scalyclaw_kv::keys::session(channel_id);
        let fields = self.kv.hgetall(&key).await?;
        if fields.is_empty() {
            return Ok(None);
        }
        let state: SessionState = fields
            .get("state")
            .and_then(|s| s.parse().ok())
            .unwrap_or(SessionState::Processing);
        Ok(Some(SessionSnapshot {
            channel_id: channel_id.to_string(),
            state,
            owner: fields.get("owner").cloned().unwrap_or_default(),
            heartbeat_ms: fields.get("heartbeat").and_then(|s| s.parse().ok()).unwrap_or(0),
            acquired_ms: fields.get("acquired").and_then(|s| s.parse().ok()).unwrap_or(0),
        }))
    }

    // ── Rate limiting ─────────────────────────────────────────────────────

    /// Sliding-window rate check: records this send and returns whether the
    /// channel is still within `limit` sends per `window_secs` (default 60).
    #[instrument(skip(self))]
    pub async fn check_rate_limit(&self, channel_id: &str, limit: i64) -> Result<bool> {
        let key = scalyclaw_kv::keys::rate_limit(channel_id);
        let count = self
            .kv
            .check_rate_limit(&key, now_ms(), DEFAULT_RATE_LIMIT_WINDOW_SECS * 1000)
            .await?;
        Ok(count <= limit)
    }

    // ── Global cancel flag ────────────────────────────────────────────────

    /// Set by `/stop`, `/restart`, `/shutdown` — a short-TTL flag every
    /// consumer polls cooperatively.
    #[instrument(skip(self))]
    pub async fn set_global_cancel(&self) -> Result<()> {
        self.kv
            .set_ex(scalyclaw_kv::keys::cancel_flag(), "1", GLOBAL_CANCEL_TTL_SECS)
            .await?;
        Ok(())
    }

    pub async fn is_globally_cancelled(&self) -> Result<bool> {
        Ok(self.kv.exists(scalyclaw_kv::keys::cancel_flag()).await?)
    }

    // ── Per-channel active job tracking (bulk cancellation) ──────────────

    pub async fn track_active_job(&self, channel_id: &str, job_id: &str) -> Result<()> {
        self.kv.sadd(&scalyclaw_kv::keys::channel_jobs(channel_id), job_id).await?;
        Ok(())
    }

    pub async fn untrack_active_job(&self, channel_id: &str, job_id: &str) -> Result<()> {
        self.kv.srem(&scalyclaw_kv::keys::channel_jobs(channel_id), job_id).await?;
        Ok(())
    }

    pub async fn active_jobs(&self, channel_id: &str) -> Result<Vec<String>> {
        Ok(self.kv.smembers(&scalyclaw_kv::keys::channel_jobs(channel_id)).await?)
    }
}
