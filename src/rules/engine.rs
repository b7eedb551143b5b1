//! Full-queue recalculation: re-score every waiting session against the
//! current rule set, refresh the cache ordering, and stamp consecutive
//! durable queue positions.

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};
use uuid::Uuid;

use crate::database::DatabaseManager;
use crate::error::Result;
use crate::executor::RetryingOperationExecutor;
use crate::queue::store::SessionQueueStore;
use crate::rules::matcher::score_for_ticket;
use crate::rules::TicketAttributes;
use crate::score::rank_score_millis;

/// Outcome of one recalculation pass
#[derive(Debug, Clone, Default)]
pub struct RecalculationSummary {
    /// Enabled, non-deleted rules the pass evaluated against
    pub rules_evaluated: usize,
    /// QUEUED sessions scanned
    pub sessions_scanned: usize,
    /// Priority scores written back to the durable store
    pub scores_written: usize,
    /// Cache entries refreshed with their new rank score
    pub cache_refreshes: usize,
    /// Queue positions assigned (1..N over the reordered set)
    pub positions_assigned: usize,
    /// Per-session failures that were isolated rather than aborting the pass
    pub failures: usize,
    /// Wall-clock duration of the pass
    pub elapsed_ms: u64,
}

/// Evaluates urgency rules and drives full queue reordering.
///
/// Triggered by rule edits or an explicit operator command, never on a tight
/// loop. A rule edited while a pass is running applies to the next pass; the
/// running pass keeps the rule set it loaded at the start.
pub struct UrgencyRuleEngine {
    database: Arc<DatabaseManager>,
    store: Arc<dyn SessionQueueStore>,
    executor: Arc<RetryingOperationExecutor>,
    max_retries: u32,
}

impl UrgencyRuleEngine {
    pub fn new(
        database: Arc<DatabaseManager>,
        store: Arc<dyn SessionQueueStore>,
        executor: Arc<RetryingOperationExecutor>,
        max_retries: u32,
    ) -> Self {
        Self {
            database,
            store,
            executor,
            max_retries,
        }
    }

    /// Recompute every QUEUED session's priority score, refresh the cache
    /// ordering, and persist gap-free queue positions 1..N.
    ///
    /// Per-session failures are isolated and counted; one bad session never
    /// aborts the reorder.
    pub async fn recalculate_queue(&self) -> Result<RecalculationSummary> {
        let started = Instant::now();
        let correlation_id = Uuid::new_v4().to_string();
        let mut summary = RecalculationSummary::default();

        let rules = self.database.load_active_rules().await?;
        summary.rules_evaluated = rules.len();

        let sessions = self.database.queued_sessions().await?;
        summary.sessions_scanned = sessions.len();

        info!(
            "📐 Recalculating queue [{}]: {} sessions against {} rules",
            correlation_id,
            sessions.len(),
            rules.len()
        );

        // Phase 1: recompute and persist scores, refreshing each session's
        // cache entry with the score it will sort by. Cache refreshes are
        // best-effort; the reconciler repairs whatever a cache outage drops.
        for session in &sessions {
            let ticket = match self.database.ticket_attributes(&session.session_id).await {
                Ok(ticket) => ticket,
                Err(e) => {
                    warn!(
                        "⚠️ Skipping session {} during recalculation: {}",
                        session.session_id, e
                    );
                    summary.failures += 1;
                    continue;
                }
            };

            // A session with no ticket yet scores 0 and stays queued.
            let ticket = ticket.unwrap_or_else(|| TicketAttributes {
                session_id: session.session_id.clone(),
                ..Default::default()
            });

            let priority_score = score_for_ticket(&rules, &ticket);

            if let Err(e) = self
                .database
                .update_priority_score(&session.session_id, priority_score)
                .await
            {
                warn!(
                    "⚠️ Failed to persist score for session {}: {}",
                    session.session_id, e
                );
                summary.failures += 1;
                continue;
            }
            summary.scores_written += 1;

            let rank = rank_score_millis(priority_score, session.queued_at_millis);
            let store = self.store.clone();
            let session_id = session.session_id.clone();
            let agent_id = session.assigned_agent_id.clone();
            let outcome = self
                .executor
                .execute(
                    "recalc_cache_refresh",
                    &correlation_id,
                    self.max_retries,
                    true,
                    move || {
                        let store = store.clone();
                        let session_id = session_id.clone();
                        let agent_id = agent_id.clone();
                        async move {
                            match agent_id.as_deref() {
                                Some(agent) => {
                                    store.enqueue_for_agent(&session_id, agent, rank).await
                                }
                                None => store.enqueue_unassigned(&session_id, rank).await,
                            }
                        }
                    },
                )
                .await;

            if outcome.succeeded && outcome.result.is_some() {
                summary.cache_refreshes += 1;
            }
        }

        // Phase 2: stamp consecutive positions over the freshly-scored set.
        let ordered = self.database.queued_sessions_ordered().await?;
        for (index, session) in ordered.iter().enumerate() {
            let position = index as i64 + 1;
            match self
                .database
                .update_queue_position(&session.session_id, Some(position))
                .await
            {
                Ok(()) => summary.positions_assigned += 1,
                Err(e) => {
                    warn!(
                        "⚠️ Failed to persist position {} for session {}: {}",
                        position, session.session_id, e
                    );
                    summary.failures += 1;
                }
            }
        }

        summary.elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            "📐 Recalculation [{}] complete: scanned={} scores={} refreshes={} positions={} failures={} ({}ms)",
            correlation_id,
            summary.sessions_scanned,
            summary.scores_written,
            summary.cache_refreshes,
            summary.positions_assigned,
            summary.failures,
            summary.elapsed_ms
        );

        Ok(summary)
    }
}
