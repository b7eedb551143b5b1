//! # Support Queue Engine
//!
//! The facade collaborating services consume. Session-lifecycle handlers call
//! the enqueue/dequeue/move operations; status reporting reads positions and
//! lengths; rule edits and operator commands trigger recalculation; the
//! reconciler runs on its own schedules underneath.
//!
//! Mutations are routed through the [`RetryingOperationExecutor`]: inserts
//! are load-bearing and surface failure as `false` (deferring repair to the
//! next consistency pass), removals are best-effort and swallow connectivity
//! trouble ("already gone" is an acceptable outcome). Reads degrade to
//! `None`/`0`: the only externally visible effect of a cache outage is a
//! stale or momentarily missing queue position.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::SupportQueueConfig;
use crate::database::DatabaseManager;
use crate::error::Result;
use crate::executor::RetryingOperationExecutor;
use crate::queue::redis_store::RedisQueueStore;
use crate::queue::store::SessionQueueStore;
use crate::reconciler::{ConsistencyReconciler, ReconcilerHandle};
use crate::rules::engine::{RecalculationSummary, UrgencyRuleEngine};
use crate::score::rank_score;

/// Main support queue engine
///
/// Wires the score calculator, queue store, executor, rule engine and
/// reconciler behind one typed interface.
pub struct SupportQueueEngine {
    config: SupportQueueConfig,
    database: Arc<DatabaseManager>,
    store: Arc<dyn SessionQueueStore>,
    executor: Arc<RetryingOperationExecutor>,
    rules: UrgencyRuleEngine,
    reconciler: Arc<ConsistencyReconciler>,
}

impl SupportQueueEngine {
    /// Build an engine over an already-constructed store and database. Tests
    /// use this seam to drive everything against in-process fakes.
    pub fn new(
        config: SupportQueueConfig,
        database: Arc<DatabaseManager>,
        store: Arc<dyn SessionQueueStore>,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(crate::error::SupportQueueError::config)?;

        let executor = Arc::new(RetryingOperationExecutor::new(store.clone(), &config.retry));
        let rules = UrgencyRuleEngine::new(
            database.clone(),
            store.clone(),
            executor.clone(),
            config.retry.max_retries,
        );
        let reconciler = Arc::new(ConsistencyReconciler::new(
            database.clone(),
            store.clone(),
            executor.clone(),
            config.reconciler.clone(),
            config.retry.max_retries,
        ));

        info!("🎯 Support queue engine initialized");

        Ok(Self {
            config,
            database,
            store,
            executor,
            rules,
            reconciler,
        })
    }

    /// Connect to the configured cache and database and build an engine.
    pub async fn connect(config: SupportQueueConfig) -> Result<Self> {
        let database = Arc::new(
            DatabaseManager::new(
                &config.database.database_path,
                config.database.max_connections,
            )
            .await?,
        );
        let store: Arc<dyn SessionQueueStore> =
            Arc::new(RedisQueueStore::connect(&config.cache).await?);

        Self::new(config, database, store)
    }

    /// Engine configuration.
    pub fn config(&self) -> &SupportQueueConfig {
        &self.config
    }

    /// The durable store, for collaborators seeding sessions/tickets/rules.
    pub fn database(&self) -> &Arc<DatabaseManager> {
        &self.database
    }

    /// The reconciler, exposed so hosts (and tests) can run passes directly.
    pub fn reconciler(&self) -> &Arc<ConsistencyReconciler> {
        &self.reconciler
    }

    /// Start the two reconciliation schedules.
    pub fn start_reconciler(&self) -> ReconcilerHandle {
        self.reconciler.clone().spawn()
    }

    /// Place a session in the unassigned pool. Load-bearing: `false` means
    /// the insert did not land and the next consistency pass will repair it.
    pub async fn enqueue_unassigned(
        &self,
        session_id: &str,
        priority_score: i64,
        queued_at: DateTime<Utc>,
    ) -> bool {
        let score = rank_score(priority_score, queued_at);
        let correlation_id = Uuid::new_v4().to_string();
        let store = self.store.clone();
        let id = session_id.to_string();

        self.executor
            .execute(
                "enqueue_unassigned",
                &correlation_id,
                self.config.retry.max_retries,
                false,
                move || {
                    let store = store.clone();
                    let id = id.clone();
                    async move { store.enqueue_unassigned(&id, score).await }
                },
            )
            .await
            .succeeded
    }

    /// Place a session in a specific agent's queue. Load-bearing.
    pub async fn enqueue_for_agent(
        &self,
        session_id: &str,
        agent_id: &str,
        priority_score: i64,
        queued_at: DateTime<Utc>,
    ) -> bool {
        let score = rank_score(priority_score, queued_at);
        let correlation_id = Uuid::new_v4().to_string();
        let store = self.store.clone();
        let id = session_id.to_string();
        let agent = agent_id.to_string();

        self.executor
            .execute(
                "enqueue_for_agent",
                &correlation_id,
                self.config.retry.max_retries,
                false,
                move || {
                    let store = store.clone();
                    let id = id.clone();
                    let agent = agent.clone();
                    async move { store.enqueue_for_agent(&id, &agent, score).await }
                },
            )
            .await
            .succeeded
    }

    /// Remove a session from its queues. Best-effort: connectivity trouble is
    /// swallowed, since a missing entry is indistinguishable from a removed
    /// one and the reconciler owns any leftover.
    pub async fn dequeue(&self, session_id: &str, agent_id: Option<&str>) -> bool {
        let correlation_id = Uuid::new_v4().to_string();
        let store = self.store.clone();
        let id = session_id.to_string();
        let agent = agent_id.map(|a| a.to_string());

        self.executor
            .execute(
                "dequeue",
                &correlation_id,
                self.config.retry.max_retries,
                true,
                move || {
                    let store = store.clone();
                    let id = id.clone();
                    let agent = agent.clone();
                    async move { store.dequeue(&id, agent.as_deref()).await }
                },
            )
            .await
            .succeeded
    }

    /// Hand a session from the unassigned pool to a specific agent.
    /// Load-bearing on the destination insert.
    pub async fn move_to_agent(
        &self,
        session_id: &str,
        agent_id: &str,
        priority_score: i64,
        queued_at: DateTime<Utc>,
    ) -> bool {
        let score = rank_score(priority_score, queued_at);
        let correlation_id = Uuid::new_v4().to_string();
        let store = self.store.clone();
        let id = session_id.to_string();
        let agent = agent_id.to_string();

        self.executor
            .execute(
                "move_to_agent",
                &correlation_id,
                self.config.retry.max_retries,
                false,
                move || {
                    let store = store.clone();
                    let id = id.clone();
                    let agent = agent.clone();
                    async move { store.move_to_agent(&id, &agent, score).await }
                },
            )
            .await
            .succeeded
    }

    /// 1-based wait position of a session (1 = next served), or `None` when
    /// the session is not queued or the cache cannot answer right now.
    pub async fn queue_position(&self, session_id: &str, agent_id: Option<&str>) -> Option<u64> {
        match self.store.rank(session_id, agent_id).await {
            Ok(rank) => rank,
            Err(e) => {
                debug!("Queue position unavailable for {}: {}", session_id, e);
                None
            }
        }
    }

    /// Number of sessions waiting in a queue; `0` when the cache cannot
    /// answer right now.
    pub async fn queue_length(&self, agent_id: Option<&str>) -> u64 {
        match self.store.len(agent_id).await {
            Ok(len) => len,
            Err(e) => {
                debug!("Queue length unavailable: {}", e);
                0
            }
        }
    }

    /// Waiting session ids in serving order, highest priority first.
    pub async fn list_queue(&self, agent_id: Option<&str>, limit: Option<usize>) -> Vec<String> {
        match self.store.list(agent_id, limit).await {
            Ok(ids) => ids,
            Err(e) => {
                debug!("Queue listing unavailable: {}", e);
                Vec::new()
            }
        }
    }

    /// Re-score and reorder the whole queue against the current rule set.
    pub async fn recalculate_queue(&self) -> Result<RecalculationSummary> {
        self.rules.recalculate_queue().await
    }
}
