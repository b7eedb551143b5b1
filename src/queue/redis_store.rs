//! Networked [`SessionQueueStore`] over Redis sorted sets.
//!
//! One sorted set per queue key, scored by the rank score from
//! [`crate::score`]. ZADD gives idempotent insert-or-update, ZREVRANK the
//! 1-based serving position, and a SCAN cursor walk discovers agent queues
//! when a session must be purged from all of them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use tracing::{debug, info, warn};

use crate::config::CacheConfig;
use crate::error::{CacheFaultKind, Result, SupportQueueError};
use crate::queue::store::SessionQueueStore;

/// Redis-backed session queue store
#[derive(Clone)]
pub struct RedisQueueStore {
    connection_manager: ConnectionManager,
    key_prefix: String,
    probe_timeout: Duration,
    unavailable: std::sync::Arc<AtomicBool>,
}

impl RedisQueueStore {
    /// Connect to the cache described by `config`.
    pub async fn connect(config: &CacheConfig) -> Result<Self> {
        info!("🔌 Connecting to queue cache at {}", config.url);

        let client = Client::open(config.url.as_str()).map_err(|e| {
            SupportQueueError::cache(
                CacheFaultKind::Other,
                format!("failed to create cache client: {}", e),
            )
        })?;

        let connection_manager = ConnectionManager::new(client).await.map_err(|e| {
            SupportQueueError::cache(
                classify_cache_error(&e),
                format!("failed to establish cache connection: {}", e),
            )
        })?;

        info!("✅ Queue cache connection established");

        Ok(Self {
            connection_manager,
            key_prefix: config.key_prefix.clone(),
            probe_timeout: config.probe_timeout,
            unavailable: std::sync::Arc::new(AtomicBool::new(false)),
        })
    }

    fn unassigned_key(&self) -> String {
        format!("{}:queue:unassigned", self.key_prefix)
    }

    fn agent_key(&self, agent_id: &str) -> String {
        format!("{}:queue:agent:{}", self.key_prefix, agent_id)
    }

    fn agent_key_pattern(&self) -> String {
        format!("{}:queue:agent:*", self.key_prefix)
    }

    fn queue_key(&self, agent_id: Option<&str>) -> String {
        match agent_id {
            Some(id) => self.agent_key(id),
            None => self.unassigned_key(),
        }
    }

    /// Wrap a client error with its fault classification for telemetry.
    /// Retrying is the executor's job, not the store's.
    fn cache_err(&self, context: &str, err: redis::RedisError) -> SupportQueueError {
        let kind = classify_cache_error(&err);
        debug!("Queue cache fault ({}) during {}: {}", kind, context, err);
        SupportQueueError::cache(kind, format!("{}: {}", context, err))
    }

    /// Collect every agent queue key via a non-blocking SCAN cursor walk.
    async fn scan_agent_keys(&self) -> Result<Vec<String>> {
        let mut conn = self.connection_manager.clone();
        let pattern = self.agent_key_pattern();
        let mut keys = Vec::new();

        let mut iter: redis::AsyncIter<'_, String> = conn
            .scan_match(&pattern)
            .await
            .map_err(|e| self.cache_err("scanning agent queue keys", e))?;

        while let Some(key) = iter.next_item().await {
            keys.push(key);
        }

        Ok(keys)
    }
}

#[async_trait]
impl SessionQueueStore for RedisQueueStore {
    async fn enqueue_unassigned(&self, session_id: &str, score: i64) -> Result<()> {
        let mut conn = self.connection_manager.clone();
        let key = self.unassigned_key();

        let _: () = conn
            .zadd(&key, session_id, score)
            .await
            .map_err(|e| self.cache_err("enqueueing into unassigned pool", e))?;

        debug!("📥 Enqueued session {} into {} (score {})", session_id, key, score);
        Ok(())
    }

    async fn enqueue_for_agent(&self, session_id: &str, agent_id: &str, score: i64) -> Result<()> {
        let mut conn = self.connection_manager.clone();
        let key = self.agent_key(agent_id);

        let _: () = conn
            .zadd(&key, session_id, score)
            .await
            .map_err(|e| self.cache_err("enqueueing into agent queue", e))?;

        debug!("📥 Enqueued session {} into {} (score {})", session_id, key, score);
        Ok(())
    }

    async fn dequeue(&self, session_id: &str, agent_id: Option<&str>) -> Result<()> {
        let mut conn = self.connection_manager.clone();

        let _: i64 = conn
            .zrem(self.unassigned_key(), session_id)
            .await
            .map_err(|e| self.cache_err("removing from unassigned pool", e))?;

        match agent_id {
            Some(id) => {
                let _: i64 = conn
                    .zrem(self.agent_key(id), session_id)
                    .await
                    .map_err(|e| self.cache_err("removing from agent queue", e))?;
            }
            None => {
                // No agent hint: purge the session from every agent queue.
                for key in self.scan_agent_keys().await? {
                    let _: i64 = conn
                        .zrem(&key, session_id)
                        .await
                        .map_err(|e| self.cache_err("removing from scanned agent queue", e))?;
                }
            }
        }

        debug!("📤 Dequeued session {} (agent hint: {:?})", session_id, agent_id);
        Ok(())
    }

    async fn move_to_agent(&self, session_id: &str, agent_id: &str, score: i64) -> Result<()> {
        let mut conn = self.connection_manager.clone();

        // Source removal is best-effort; presence in the destination is what
        // defines success, and the reconciler repairs a torn pair.
        let removed: std::result::Result<i64, redis::RedisError> =
            conn.zrem(self.unassigned_key(), session_id).await;
        if let Err(e) = removed {
            warn!(
                "⚠️ Failed to remove session {} from unassigned pool during move: {}",
                session_id, e
            );
        }

        let _: () = conn
            .zadd(self.agent_key(agent_id), session_id, score)
            .await
            .map_err(|e| self.cache_err("inserting into destination agent queue", e))?;

        debug!("🔀 Moved session {} to agent {} (score {})", session_id, agent_id, score);
        Ok(())
    }

    async fn rank(&self, session_id: &str, agent_id: Option<&str>) -> Result<Option<u64>> {
        let mut conn = self.connection_manager.clone();
        let key = self.queue_key(agent_id);

        let rank: Option<i64> = conn
            .zrevrank(&key, session_id)
            .await
            .map_err(|e| self.cache_err("reading queue rank", e))?;

        Ok(rank.map(|r| r as u64 + 1))
    }

    async fn list(&self, agent_id: Option<&str>, limit: Option<usize>) -> Result<Vec<String>> {
        if limit == Some(0) {
            return Ok(Vec::new());
        }

        let mut conn = self.connection_manager.clone();
        let key = self.queue_key(agent_id);
        let stop: isize = match limit {
            Some(n) => n as isize - 1,
            None => -1,
        };

        let ids: Vec<String> = conn
            .zrevrange(&key, 0, stop)
            .await
            .map_err(|e| self.cache_err("listing queue", e))?;

        Ok(ids)
    }

    async fn len(&self, agent_id: Option<&str>) -> Result<u64> {
        let mut conn = self.connection_manager.clone();
        let key = self.queue_key(agent_id);

        let count: i64 = conn
            .zcard(&key)
            .await
            .map_err(|e| self.cache_err("reading queue length", e))?;

        Ok(count.max(0) as u64)
    }

    async fn is_available(&self) -> bool {
        let mut conn = self.connection_manager.clone();

        let probe = tokio::time::timeout(self.probe_timeout, async {
            let pong: std::result::Result<String, redis::RedisError> =
                redis::cmd("PING").query_async(&mut conn).await;
            pong
        })
        .await;

        let alive = matches!(&probe, Ok(Ok(_)));

        // Log transitions once, not on every probe.
        if alive {
            if self.unavailable.swap(false, Ordering::SeqCst) {
                info!("✅ Queue cache is reachable again");
            }
        } else if !self.unavailable.swap(true, Ordering::SeqCst) {
            match probe {
                Ok(Err(e)) => warn!(
                    "⚠️ Queue cache unavailable ({}): {}; deferring queue work to reconciliation",
                    classify_cache_error(&e),
                    e
                ),
                _ => warn!(
                    "⚠️ Queue cache liveness probe timed out after {:?}; deferring queue work to reconciliation",
                    self.probe_timeout
                ),
            }
        }

        alive
    }
}

/// Map a client error onto the fault taxonomy used for fast-fail decisions.
pub(crate) fn classify_cache_error(err: &redis::RedisError) -> CacheFaultKind {
    if err.is_timeout() {
        CacheFaultKind::Timeout
    } else if err.is_connection_refusal() || err.is_connection_dropped() {
        CacheFaultKind::ConnectionRefused
    } else if err.kind() == redis::ErrorKind::IoError {
        // The managed connection resurfaces I/O errors once its own
        // reconnect budget is spent.
        CacheFaultKind::RetryExhausted
    } else {
        CacheFaultKind::Other
    }
}
