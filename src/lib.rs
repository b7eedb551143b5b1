//! # GameDesk Queue Engine
//!
//! Priority queueing and consistency reconciliation for the GameDesk support
//! platform. This crate routes waiting support sessions to the next available
//! human agent: it maintains a rank-ordered view of waiting sessions in a
//! remote sorted-set cache, keeps that view eventually consistent with the
//! durable session records under cache outages and concurrent mutation, and
//! supports dynamic reprioritization through administrator-defined urgency
//! rules.
//!
//! ## Architecture
//!
//! The crate is organized into several key modules:
//!
//! - [`score`]: pure rank-key calculation (priority beats wait time, FIFO
//!   within a tier)
//! - [`queue`]: the sorted-set store abstraction with a networked Redis
//!   implementation and an in-process one for tests
//! - [`executor`]: availability probing, fault classification and bounded
//!   exponential-backoff retry around every cache mutation
//! - [`rules`]: urgency-rule matching and full queue recalculation
//! - [`reconciler`]: the two scheduled passes that repair cache drift
//! - [`database`]: sqlx access to the durable session and rule records
//! - [`engine`]: the [`SupportQueueEngine`] facade collaborators consume
//!
//! The cache is always best-effort; the durable record is authoritative. An
//! operation that cannot reach the cache either reports failure to its caller
//! or is silently absorbed, and the reconciler heals the difference within
//! one pass either way.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gamedesk_queue_engine::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = SupportQueueConfig::default();
//!     let engine = SupportQueueEngine::connect(config).await?;
//!
//!     // Queue a session and report its position
//!     let queued = engine
//!         .enqueue_unassigned("session-1", 0, Utc::now())
//!         .await;
//!     let position = engine.queue_position("session-1", None).await;
//!     println!("queued={} position={:?}", queued, position);
//!
//!     // Keep cache and durable records aligned in the background
//!     let handle = engine.start_reconciler();
//!     handle.shutdown();
//!     Ok(())
//! }
//! ```

// Core modules
pub mod error;
pub mod config;
pub mod score;

// Queue functionality modules
pub mod queue;
pub mod executor;
pub mod rules;
pub mod reconciler;

// Database integration
pub mod database;

// Engine facade
pub mod engine;

// Re-exports for convenience
pub use config::SupportQueueConfig;
pub use engine::SupportQueueEngine;
pub use error::{Result, SupportQueueError};

/// Prelude module for convenient imports
pub mod prelude {
    // Core types
    pub use crate::{Result, SupportQueueConfig, SupportQueueEngine, SupportQueueError};

    // Configuration sections
    pub use crate::config::{CacheConfig, DatabaseConfig, ReconcilerConfig, RetryConfig};

    // Error taxonomy
    pub use crate::error::CacheFaultKind;

    // Score calculation
    pub use crate::score::{rank_score, rank_score_millis, MAX_QUEUED_AT_MILLIS, PRIORITY_STRIDE};

    // Queue store types
    pub use crate::queue::{InMemoryQueueStore, QueueKey, RedisQueueStore, SessionQueueStore};

    // Executor types
    pub use crate::executor::{ExecutionOutcome, RetryingOperationExecutor};

    // Rule types
    pub use crate::rules::{
        RecalculationSummary, RuleConditions, TicketAttributes, UrgencyRule, UrgencyRuleEngine,
    };

    // Reconciler types
    pub use crate::reconciler::{
        ConsistencyReconciler, PositionSyncSummary, ReconcilerHandle, RepairSummary,
    };

    // Database types
    pub use crate::database::{DatabaseManager, QueuedSession, SessionRecord, SessionStatus};

    // Common external types
    pub use chrono::{DateTime, Utc};
    pub use uuid::Uuid;
}
