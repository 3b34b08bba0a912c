//! The `QueueBroker` trait and its Redis-backed implementation — the single
//! source of coordination every other crate in this workspace speaks through.
//! No component ever calls another directly; everything is a queue hop, a
//! lock, a hash, or a pub/sub emit, mediated here.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pipeline_core::Job;
use redis::aio::ConnectionManager;
use tracing::debug;

use crate::config::QueueConfig;
use crate::error::QueueError;

/// A job popped off an immediate queue, paired with the exact raw bytes it
/// was stored as — needed so `ack`/requeue operations can `LREM`/`ZREM` the
/// precise member back out of Redis rather than a re-serialization of it.
#[derive(Debug, Clone)]
pub struct Delivered {
    pub job: Job,
    pub raw: String,
}

/// A due entry popped from a `:delayed` sorted set, same reasoning as
/// [`Delivered`].
#[derive(Debug, Clone)]
pub struct DelayedEntry {
    pub job: Job,
    pub raw: String,
}

/// Health snapshot for `/api/queue_status` and the supervisor's own checks.
#[derive(Debug, Clone, serde::Serialize)]
pub struct QueueHealth {
    pub connected: bool,
    pub queue_depths: std::collections::BTreeMap<String, u64>,
}

impl fmt::Display for QueueHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QueueHealth {{ connected: {}, depths: {:?} }}", self.connected, self.queue_depths)
    }
}

/// The contract every component speaks to the broker through. A plain struct
/// would do for the one real backend this workspace ships, but a trait lets
/// `pipeline`'s scenario tests substitute an in-memory fake instead of
/// standing up Redis for every test run.
#[async_trait]
pub trait QueueBroker: Send + Sync {
    async fn enqueue(&self, queue: &str, job: &Job) -> Result<(), QueueError>;

    /// Blocking atomic move from `queue` into `worker_list`, waiting up to
    /// `timeout` for a job to become available.
    async fn dequeue(
        &self,
        queue: &str,
        worker_list: &str,
        timeout: Duration,
    ) -> Result<Option<Delivered>, QueueError>;

    /// Remove `delivered` from `worker_list` — the job is no longer in flight.
    async fn ack(&self, worker_list: &str, delivered: &Delivered) -> Result<(), QueueError>;

    async fn enqueue_delayed(&self, queue: &str, job: &Job, at: DateTime<Utc>) -> Result<(), QueueError>;

    /// Entries in `queue`'s delayed set whose score (due time) is `<= now`,
    /// oldest-due first, capped at `max`. Does not remove them.
    async fn due_delayed(
        &self,
        queue: &str,
        now: DateTime<Utc>,
        max: usize,
    ) -> Result<Vec<DelayedEntry>, QueueError>;

    async fn remove_delayed(&self, queue: &str, raw: &str) -> Result<(), QueueError>;

    /// Re-score an existing delayed member to a new due time without removing
    /// and re-adding it (used by the delayed-queue processor's stagger step).
    async fn restage_delayed(&self, queue: &str, raw: &str, at: DateTime<Utc>) -> Result<(), QueueError>;

    async fn queue_len(&self, queue: &str) -> Result<u64, QueueError>;
    async fn delayed_len(&self, queue: &str) -> Result<u64, QueueError>;

    /// `SET key owner NX PX ttl`. Returns `true` iff the lock was acquired.
    async fn acquire_lock(&self, key: &str, owner: &str, ttl: Duration) -> Result<bool, QueueError>;

    /// Release the lock only if still held by `owner` (compare-then-delete).
    async fn release_lock(&self, key: &str, owner: &str) -> Result<(), QueueError>;

    /// `SET key 1 NX EX ttl`. Returns `true` iff the marker was newly set
    /// (i.e. it did not already exist).
    async fn set_marker_if_absent(&self, key: &str, ttl: Duration) -> Result<bool, QueueError>;

    async fn set_processing_meta(&self, hash: &str, job_id: &str, at: DateTime<Utc>) -> Result<(), QueueError>;
    async fn set_processing_payload(&self, hash: &str, job_id: &str, raw: &str) -> Result<(), QueueError>;
    async fn get_processing_payload(&self, hash: &str, job_id: &str) -> Result<Option<String>, QueueError>;

    /// Job ids in `meta_hash` whose recorded timestamp is older than `ttl`
    /// relative to `now` — candidates for the requeue sweeper.
    async fn stale_processing(
        &self,
        meta_hash: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<Vec<String>, QueueError>;

    async fn clear_processing(&self, meta_hash: &str, payload_hash: &str, job_id: &str) -> Result<(), QueueError>;

    /// Atomically increment and return the new retry count for `job_id`.
    async fn incr_retry(&self, hash: &str, job_id: &str) -> Result<u32, QueueError>;
    async fn clear_retry(&self, hash: &str, job_id: &str) -> Result<(), QueueError>;

    async fn publish(&self, channel: &str, payload: &str) -> Result<(), QueueError>;

    async fn health_check(&self, watched_queues: &[&str]) -> Result<QueueHealth, QueueError>;
}

/// Redis-backed [`QueueBroker`]. Connection pooling is `redis`'s own
/// [`ConnectionManager`] — a single multiplexed, auto-reconnecting
/// connection, the same "pooled connection with configurable timeouts"
/// shape this workspace already uses for `sqlx::PgPool` and `aws-config`.
pub struct RedisQueueBroker {
    conn: ConnectionManager,
}

impl RedisQueueBroker {
    pub async fn connect(config: &QueueConfig) -> Result<Self, QueueError> {
        let client = redis::Client::open(config.connection_url())
            .map_err(|e| QueueError::Connection(e.to_string()))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| QueueError::Connection(e.to_string()))?;
        Ok(Self { conn })
    }

    fn namespaced(queue: &str) -> String {
        pipeline_core::job::queue_names::full(queue)
    }

    fn delayed_key(queue: &str) -> String {
        pipeline_core::job::queue_names::delayed(queue)
    }
}

#[async_trait]
impl QueueBroker for RedisQueueBroker {
    async fn enqueue(&self, queue: &str, job: &Job) -> Result<(), QueueError> {
        let raw = serde_json::to_string(job)?;
        let mut conn = self.conn.clone();
        redis::cmd("LPUSH")
            .arg(Self::namespaced(queue))
            .arg(raw)
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn dequeue(
        &self,
        queue: &str,
        worker_list: &str,
        timeout: Duration,
    ) -> Result<Option<Delivered>, QueueError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = redis::cmd("BRPOPLPUSH")
            .arg(Self::namespaced(queue))
            .arg(worker_list)
            .arg(timeout.as_secs().max(1))
            .query_async(&mut conn)
            .await?;

        match raw {
            None => Ok(None),
            Some(raw) => {
                let job: Job = serde_json::from_str(&raw)?;
                Ok(Some(Delivered { job, raw }))
            }
        }
    }

    async fn ack(&self, worker_list: &str, delivered: &Delivered) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        redis::cmd("LREM")
            .arg(worker_list)
            .arg(0)
            .arg(&delivered.raw)
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn enqueue_delayed(&self, queue: &str, job: &Job, at: DateTime<Utc>) -> Result<(), QueueError> {
        let raw = serde_json::to_string(job)?;
        let mut conn = self.conn.clone();
        redis::cmd("ZADD")
            .arg(Self::delayed_key(queue))
            .arg(at.timestamp())
            .arg(raw)
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn due_delayed(
        &self,
        queue: &str,
        now: DateTime<Utc>,
        max: usize,
    ) -> Result<Vec<DelayedEntry>, QueueError> {
        let mut conn = self.conn.clone();
        let members: Vec<String> = redis::cmd("ZRANGEBYSCORE")
            .arg(Self::delayed_key(queue))
            .arg("-inf")
            .arg(now.timestamp())
            .arg("LIMIT")
            .arg(0)
            .arg(max as i64)
            .query_async(&mut conn)
            .await?;

        let mut out = Vec::with_capacity(members.len());
        for raw in members {
            match serde_json::from_str::<Job>(&raw) {
                Ok(job) => out.push(DelayedEntry { job, raw }),
                Err(e) => {
                    debug!(error = %e, "dropping unparseable delayed entry");
                    redis::cmd("ZREM")
                        .arg(Self::delayed_key(queue))
                        .arg(&raw)
                        .query_async::<()>(&mut conn)
                        .await?;
                }
            }
        }
        Ok(out)
    }

    async fn remove_delayed(&self, queue: &str, raw: &str) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        redis::cmd("ZREM")
            .arg(Self::delayed_key(queue))
            .arg(raw)
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn restage_delayed(&self, queue: &str, raw: &str, at: DateTime<Utc>) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        redis::cmd("ZADD")
            .arg(Self::delayed_key(queue))
            .arg("XX")
            .arg("CH")
            .arg(at.timestamp())
            .arg(raw)
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn queue_len(&self, queue: &str) -> Result<u64, QueueError> {
        let mut conn = self.conn.clone();
        let len: u64 = redis::cmd("LLEN")
            .arg(Self::namespaced(queue))
            .query_async(&mut conn)
            .await?;
        Ok(len)
    }

    async fn delayed_len(&self, queue: &str) -> Result<u64, QueueError> {
        let mut conn = self.conn.clone();
        let len: u64 = redis::cmd("ZCARD")
            .arg(Self::delayed_key(queue))
            .query_async(&mut conn)
            .await?;
        Ok(len)
    }

    async fn acquire_lock(&self, key: &str, owner: &str, ttl: Duration) -> Result<bool, QueueError> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(owner)
            .arg("NX")
            .arg("PX")
            .arg(ttl.as_millis() as u64)
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn release_lock(&self, key: &str, owner: &str) -> Result<(), QueueError> {
        // Compare-then-delete via a small Lua script so we never release a
        // lock another worker has since acquired after our TTL expired.
        const SCRIPT: &str = r#"
            if redis.call("GET", KEYS[1]) == ARGV[1] then
                return redis.call("DEL", KEYS[1])
            else
                return 0
            end
        "#;
        let mut conn = self.conn.clone();
        redis::Script::new(SCRIPT)
            .key(key)
            .arg(owner)
            .invoke_async::<i64>(&mut conn)
            .await?;
        Ok(())
    }

    async fn set_marker_if_absent(&self, key: &str, ttl: Duration) -> Result<bool, QueueError> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(1)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn set_processing_meta(&self, hash: &str, job_id: &str, at: DateTime<Utc>) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        redis::cmd("HSET")
            .arg(hash)
            .arg(job_id)
            .arg(at.timestamp())
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn set_processing_payload(&self, hash: &str, job_id: &str, raw: &str) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        redis::cmd("HSET")
            .arg(hash)
            .arg(job_id)
            .arg(raw)
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn get_processing_payload(&self, hash: &str, job_id: &str) -> Result<Option<String>, QueueError> {
        let mut conn = self.conn.clone();
        let v: Option<String> = redis::cmd("HGET")
            .arg(hash)
            .arg(job_id)
            .query_async(&mut conn)
            .await?;
        Ok(v)
    }

    async fn stale_processing(
        &self,
        meta_hash: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<Vec<String>, QueueError> {
        let mut conn = self.conn.clone();
        let all: Vec<(String, i64)> = redis::cmd("HGETALL")
            .arg(meta_hash)
            .query_async::<std::collections::HashMap<String, i64>>(&mut conn)
            .await?
            .into_iter()
            .collect();

        let cutoff = now.timestamp() - ttl.as_secs() as i64;
        Ok(all
            .into_iter()
            .filter(|(_, ts)| *ts < cutoff)
            .map(|(job_id, _)| job_id)
            .collect())
    }

    async fn clear_processing(&self, meta_hash: &str, payload_hash: &str, job_id: &str) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        redis::cmd("HDEL")
            .arg(meta_hash)
            .arg(job_id)
            .query_async::<()>(&mut conn)
            .await?;
        redis::cmd("HDEL")
            .arg(payload_hash)
            .arg(job_id)
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn incr_retry(&self, hash: &str, job_id: &str) -> Result<u32, QueueError> {
        let mut conn = self.conn.clone();
        let n: i64 = redis::cmd("HINCRBY")
            .arg(hash)
            .arg(job_id)
            .arg(1)
            .query_async(&mut conn)
            .await?;
        Ok(n as u32)
    }

    async fn clear_retry(&self, hash: &str, job_id: &str) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        redis::cmd("HDEL")
            .arg(hash)
            .arg(job_id)
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn publish(&self, channel: &str, payload: &str) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        redis::cmd("PUBLISH")
            .arg(channel)
            .arg(payload)
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn health_check(&self, watched_queues: &[&str]) -> Result<QueueHealth, QueueError> {
        let mut conn = self.conn.clone();
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        let connected = pong == "PONG";

        let mut depths = std::collections::BTreeMap::new();
        for q in watched_queues {
            depths.insert(q.to_string(), self.queue_len(q).await.unwrap_or(0));
        }

        Ok(QueueHealth { connected, queue_depths: depths })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespaced_queue_key_matches_well_known_prefix() {
        assert_eq!(
            RedisQueueBroker::namespaced("ai_processing"),
            "backfin:queue:ai_processing"
        );
        assert_eq!(
            RedisQueueBroker::delayed_key("ai_processing"),
            "backfin:queue:ai_processing:delayed"
        );
    }
}
