//! # Consistency Reconciler
//!
//! Two independently scheduled passes keep the durable session records and
//! the queue cache in agreement. Neither pass trusts the cache: the durable
//! `status` column is authoritative, and the cache is repaired toward it.
//!
//! - **Position sync** (fast, ~1 min): copies each waiting session's live
//!   cache rank into the durable `queue_position` column so reported wait
//!   positions stay fresh.
//! - **Consistency pass** (slow, ~5 min): re-inserts any durable QUEUED
//!   session the cache has lost, into its agent's queue when one is
//!   assigned, else the unassigned pool.
//!
//! Each run probes availability first and no-ops entirely when the cache is
//! down, avoiding a burst of doomed operations. A missing durable table
//! (mid-migration) is "nothing to do yet", logged once per outage. Per-session
//! failures are counted into a single end-of-run summary line; a run never
//! propagates an error out of its scheduled task.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant as TokioInstant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ReconcilerConfig;
use crate::database::{is_missing_table, DatabaseManager};
use crate::executor::RetryingOperationExecutor;
use crate::queue::store::SessionQueueStore;
use crate::score::rank_score_millis;

/// Outcome of one position-sync run
#[derive(Debug, Clone, Default)]
pub struct PositionSyncSummary {
    /// Whether the run was skipped outright (cache unavailable)
    pub skipped: bool,
    /// Durable QUEUED sessions scanned
    pub scanned: usize,
    /// Positions written (including clears for sessions with no rank)
    pub updated: usize,
    /// Per-session failures left for the next run
    pub failures: usize,
}

/// Outcome of one consistency-pass run
#[derive(Debug, Clone, Default)]
pub struct RepairSummary {
    /// Whether the run was skipped outright (cache unavailable)
    pub skipped: bool,
    /// Durable QUEUED sessions scanned
    pub scanned: usize,
    /// Sessions found absent from the cache
    pub missing: usize,
    /// Sessions successfully re-inserted
    pub repaired: usize,
    /// Sessions left for the next pass
    pub failures: usize,
}

/// Handle over the two spawned reconciliation schedules.
pub struct ReconcilerHandle {
    position_sync: JoinHandle<()>,
    repair: JoinHandle<()>,
}

impl ReconcilerHandle {
    /// Stop both schedules.
    pub fn shutdown(&self) {
        self.position_sync.abort();
        self.repair.abort();
    }
}

/// Repairs drift between the durable session records and the queue cache.
pub struct ConsistencyReconciler {
    database: Arc<DatabaseManager>,
    store: Arc<dyn SessionQueueStore>,
    executor: Arc<RetryingOperationExecutor>,
    config: ReconcilerConfig,
    max_retries: u32,
    durable_gap_logged: AtomicBool,
}

impl ConsistencyReconciler {
    pub fn new(
        database: Arc<DatabaseManager>,
        store: Arc<dyn SessionQueueStore>,
        executor: Arc<RetryingOperationExecutor>,
        config: ReconcilerConfig,
        max_retries: u32,
    ) -> Self {
        Self {
            database,
            store,
            executor,
            config,
            max_retries,
            durable_gap_logged: AtomicBool::new(false),
        }
    }

    /// Start both schedules. The first run of each fires one full interval
    /// after startup.
    pub fn spawn(self: Arc<Self>) -> ReconcilerHandle {
        info!(
            "🔄 Starting reconciliation schedules: position sync every {:?}, repair every {:?}",
            self.config.position_sync_interval, self.config.repair_interval
        );

        let sync = self.clone();
        let position_sync = tokio::spawn(async move {
            let period = sync.config.position_sync_interval;
            let mut ticker = interval_at(TokioInstant::now() + period, period);
            loop {
                ticker.tick().await;
                sync.run_position_sync().await;
            }
        });

        let slow = self.clone();
        let repair = tokio::spawn(async move {
            let period = slow.config.repair_interval;
            let mut ticker = interval_at(TokioInstant::now() + period, period);
            loop {
                ticker.tick().await;
                slow.run_consistency_pass().await;
            }
        });

        ReconcilerHandle {
            position_sync,
            repair,
        }
    }

    /// Fast pass: copy live cache ranks into durable `queue_position`.
    pub async fn run_position_sync(&self) -> PositionSyncSummary {
        let mut summary = PositionSyncSummary::default();

        if !self.store.is_available().await {
            debug!("⏭️ Position sync skipped: queue cache unavailable");
            summary.skipped = true;
            return summary;
        }

        let sessions = match self.scan_queued_sessions().await {
            Some(sessions) => sessions,
            None => return summary,
        };
        summary.scanned = sessions.len();

        for session in &sessions {
            let rank = match self
                .store
                .rank(&session.session_id, session.assigned_agent_id.as_deref())
                .await
            {
                Ok(rank) => rank,
                Err(e) => {
                    debug!(
                        "Position sync could not read rank for session {}: {}",
                        session.session_id, e
                    );
                    summary.failures += 1;
                    continue;
                }
            };

            let position = rank.map(|r| r as i64);
            if position == session.queue_position {
                continue;
            }

            match self
                .database
                .update_queue_position(&session.session_id, position)
                .await
            {
                Ok(()) => summary.updated += 1,
                Err(_) => summary.failures += 1,
            }
        }

        info!(
            "🔄 Position sync complete: scanned={} updated={} failures={}",
            summary.scanned, summary.updated, summary.failures
        );
        summary
    }

    /// Slow pass: re-insert durable QUEUED sessions the cache has lost.
    pub async fn run_consistency_pass(&self) -> RepairSummary {
        let mut summary = RepairSummary::default();
        let correlation_id = Uuid::new_v4().to_string();

        if !self.store.is_available().await {
            debug!("⏭️ Consistency pass skipped: queue cache unavailable");
            summary.skipped = true;
            return summary;
        }

        let sessions = match self.scan_queued_sessions().await {
            Some(sessions) => sessions,
            None => return summary,
        };
        summary.scanned = sessions.len();

        for session in &sessions {
            let rank = match self
                .store
                .rank(&session.session_id, session.assigned_agent_id.as_deref())
                .await
            {
                Ok(rank) => rank,
                Err(e) => {
                    debug!(
                        "Consistency pass could not read rank for session {}: {}",
                        session.session_id, e
                    );
                    summary.failures += 1;
                    continue;
                }
            };

            if rank.is_some() {
                continue;
            }
            summary.missing += 1;

            let score = rank_score_millis(session.priority_score, session.queued_at_millis);
            let store = self.store.clone();
            let session_id = session.session_id.clone();
            let agent_id = session.assigned_agent_id.clone();

            // Load-bearing insert: a surfaced failure is simply left for the
            // next pass, the system is self-healing by design.
            let outcome = self
                .executor
                .execute(
                    "reconciler_reinsert",
                    &correlation_id,
                    self.max_retries,
                    false,
                    move || {
                        let store = store.clone();
                        let session_id = session_id.clone();
                        let agent_id = agent_id.clone();
                        async move {
                            match agent_id.as_deref() {
                                Some(agent) => {
                                    store.enqueue_for_agent(&session_id, agent, score).await
                                }
                                None => store.enqueue_unassigned(&session_id, score).await,
                            }
                        }
                    },
                )
                .await;

            if outcome.succeeded {
                summary.repaired += 1;
            } else {
                summary.failures += 1;
            }
        }

        info!(
            "🔄 Consistency pass [{}] complete: scanned={} missing={} repaired={} failures={}",
            correlation_id, summary.scanned, summary.missing, summary.repaired, summary.failures
        );
        summary
    }

    /// Scan durable QUEUED sessions, treating a missing table as an empty
    /// scan. Returns `None` when there is nothing to reconcile.
    async fn scan_queued_sessions(&self) -> Option<Vec<crate::database::QueuedSession>> {
        match self.database.queued_sessions().await {
            Ok(sessions) => {
                self.durable_gap_logged.store(false, Ordering::SeqCst);
                Some(sessions)
            }
            Err(e) if is_missing_table(&e) => {
                if !self.durable_gap_logged.swap(true, Ordering::SeqCst) {
                    info!("🗄️ Durable session table not present yet; nothing to reconcile");
                }
                None
            }
            Err(e) => {
                warn!("⚠️ Reconciliation scan failed, will retry next run: {}", e);
                None
            }
        }
    }
}
