use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::instrument;

use crate::error::Result;

/// Sliding-window rate check: adds one entry scored by `now_ms` to the
/// sorted set at KEYS[1], trims entries older than the window, and returns
/// the resulting cardinality. Atomic so concurrent callers can't race past
/// the limit (spec.md §4.1 "a scripted sliding-window rate check operation
/// executed atomically").
const RATE_LIMIT_SCRIPT: &str = r#"
local key = KEYS[1]
local now_ms = tonumber(ARGV[1])
local window_ms = tonumber(ARGV[2])
local member = ARGV[3]
redis.call('ZREMRANGEBYSCORE', key, '-inf', now_ms - window_ms)
redis.call('ZADD', key, now_ms, member)
redis.call('PEXPIRE', key, window_ms)
return redis.call('ZCARD', key)
"#;

/// Thin typed wrapper over a single multiplexed Redis connection, plus the
/// ability to open a dedicated pub/sub connection on demand (spec.md §4.1:
/// "a single connection pool plus a distinct duplicate used only for
/// subscriptions").
#[derive(Clone)]
pub struct KvStore {
    client: Client,
    manager: ConnectionManager,
    rate_limit_script: Script,
}

impl KvStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = Client::open(url)?;
        let manager = ConnectionManager::new(client.clone()).await?;
        Ok(Self {
            client,
            manager,
            rate_limit_script: Script::new(RATE_LIMIT_SCRIPT),
        })
    }

    /// Open a dedicated connection for `SUBSCRIBE`/`PSUBSCRIBE`. Every caller
    /// that wants to listen gets its own — the multiplexed `manager`
    /// connection above is never used for subscriptions.
    pub async fn pubsub(&self) -> Result<redis::aio::PubSub> {
        Ok(self.client.get_async_pubsub().await?)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.manager.clone();
        Ok(conn.get(key).await?)
    }

    #[instrument(skip(self, value))]
    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.manager.clone();
        conn.set(key, value).await?;
        Ok(())
    }

    #[instrument(skip(self, value))]
    pub async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let mut conn = self.manager.clone();
        conn.set_ex(key, value, ttl_secs).await?;
        Ok(())
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key).await? {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }

    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let s = serde_json::to_string(value)?;
        self.set(key, &s).await
    }

    pub async fn del(&self, key: &str) -> Result<()> {
        let mut conn = self.manager.clone();
        let _: i64 = conn.del(key).await?;
        Ok(())
    }

    pub async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.manager.clone();
        Ok(conn.exists(key).await?)
    }

    // ── Hash ops ──────────────────────────────────────────────────────────

    pub async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        let mut conn = self.manager.clone();
        Ok(conn.hget(key, field).await?)
    }

    pub async fn hgetall(&self, key: &str) -> Result<std::collections::HashMap<String, String>> {
        let mut conn = self.manager.clone();
        Ok(conn.hgetall(key).await?)
    }

    pub async fn hset_multiple(&self, key: &str, pairs: &[(&str, &str)]) -> Result<()> {
        let mut conn = self.manager.clone();
        conn.hset_multiple(key, pairs).await?;
        Ok(())
    }

    pub async fn hset(&self, key: &str, field: &str, value: &str) -> Result<()> {
        let mut conn = self.manager.clone();
        conn.hset(key, field, value).await?;
        Ok(())
    }

    pub async fn expire(&self, key: &str, ttl_secs: i64) -> Result<()> {
        let mut conn = self.manager.clone();
        conn.expire(key, ttl_secs).await?;
        Ok(())
    }

    // ── List ops ──────────────────────────────────────────────────────────

    pub async fn rpush(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.manager.clone();
        conn.rpush(key, value).await?;
        Ok(())
    }

    pub async fn lpush(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.manager.clone();
        conn.lpush(key, value).await?;
        Ok(())
    }

    pub async fn lpop(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.manager.clone();
        Ok(conn.lpop(key, None).await?)
    }

    pub async fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>> {
        let mut conn = self.manager.clone();
        Ok(conn.lrange(key, start, stop).await?)
    }

    // ── Sorted-set ops (rate windows, delayed-job schedules) ─────────────

    pub async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<()> {
        let mut conn = self.manager.clone();
        conn.zadd(key, member, score).await?;
        Ok(())
    }

    pub async fn zrangebyscore(&self, key: &str, min: f64, max: f64) -> Result<Vec<String>> {
        let mut conn = self.manager.clone();
        Ok(conn.zrangebyscore(key, min, max).await?)
    }

    pub async fn zrem(&self, key: &str, member: &str) -> Result<()> {
        let mut conn = self.manager.clone();
        let _: i64 = conn.zrem(key, member).await?;
        Ok(())
    }

    pub async fn zcard(&self, key: &str) -> Result<i64> {
        let mut conn = self.manager.clone();
        Ok(conn.zcard(key).await?)
    }

    // ── Set ops ───────────────────────────────────────────────────────────

    pub async fn sadd(&self, key: &str, member: &str) -> Result<()> {
        let mut conn = self.manager.clone();
        conn.sadd(key, member).await?;
        Ok(())
    }

    pub async fn srem(&self, key: &str, member: &str) -> Result<()> {
        let mut conn = self.manager.clone();
        conn.srem(key, member).await?;
        Ok(())
    }

    pub async fn smembers(&self, key: &str) -> Result<Vec<String>> {
        let mut conn = self.manager.clone();
        Ok(conn.smembers(key).await?)
    }

    // ── Pub/sub publish ───────────────────────────────────────────────────

    pub async fn publish(&self, channel: &str, payload: &str) -> Result<()> {
        let mut conn = self.manager.clone();
        let _: i64 = conn.publish(channel, payload).await?;
        Ok(())
    }

    pub async fn num_subscribers(&self, channel: &str) -> Result<i64> {
        let mut conn = self.manager.clone();
        let reply: Vec<(String, i64)> = redis::cmd("PUBSUB")
            .arg("NUMSUB")
            .arg(channel)
            .query_async(&mut conn)
            .await?;
        Ok(reply.into_iter().map(|(_, n)| n).next().unwrap_or(0))
    }

    // ── Scripted atomic ops ───────────────────────────────────────────────

    /// Sliding-window rate check. Returns the number of sends within the
    /// window after recording this one — callers compare against their
    /// configured `N per 60s` limit (spec.md §4.14, §8 property 7).
    #[instrument(skip(self))]
    pub async fn check_rate_limit(
        &self,
        key: &str,
        now_ms: i64,
        window_ms: i64,
    ) -> Result<i64> {
        let member = format!("{now_ms}-{}", uuid::Uuid::new_v4());
        let mut conn = self.manager.clone();
        let count: i64 = self
            .rate_limit_script
            .key(key)
            .arg(now_ms)
            .arg(window_ms)
            .arg(member)
            .invoke_async(&mut conn)
            .await?;
        Ok(count)
    }

    /// Generic escape hatch for crates (sessions, scheduler) that need their
    /// own Lua scripts but share this connection.
    pub async fn eval_script<T: redis::FromRedisValue>(
        &self,
        script: &Script,
        keys: &[&str],
        args: &[&str],
    ) -> Result<T> {
        let mut conn = self.manager.clone();
        let mut invocation = script.prepare_invoke();
        for k in keys {
            invocation.key(*k);
        }
        for a in args {
            invocation.arg(*a);
        }
        Ok(invocation.invoke_async(&mut conn).await?)
    }
}
