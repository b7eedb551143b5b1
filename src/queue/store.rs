use async_trait::async_trait;

use crate::error::Result;

/// Logical identifier of one ordered queue: the shared unassigned pool, or a
/// specific agent's personal queue. A session is never in both classes at once.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueueKey {
    /// The shared pool of sessions waiting for any agent
    Unassigned,
    /// The personal queue of one agent
    Agent(String),
}

impl QueueKey {
    /// Build a key from an optional agent id, the shape most call sites carry.
    pub fn from_agent(agent_id: Option<&str>) -> Self {
        match agent_id {
            Some(id) => QueueKey::Agent(id.to_string()),
            None => QueueKey::Unassigned,
        }
    }
}

impl std::fmt::Display for QueueKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueKey::Unassigned => write!(f, "unassigned"),
            QueueKey::Agent(id) => write!(f, "agent:{}", id),
        }
    }
}

/// Sorted-set view of waiting sessions.
///
/// All operations are a single remote command (or a short cursor walk); the
/// store offers no cross-operation atomicity. `move_to_agent` in particular is
/// a remove-then-add pair whose success is judged by the destination insert
/// alone; a crash between the two steps leaves the session in neither queue
/// until the next reconciliation pass re-inserts it.
#[async_trait]
pub trait SessionQueueStore: Send + Sync {
    /// Insert or update a session in the unassigned pool. Re-enqueueing an
    /// existing session overwrites its score rather than duplicating it.
    async fn enqueue_unassigned(&self, session_id: &str, score: i64) -> Result<()>;

    /// Insert or update a session in a specific agent's queue.
    async fn enqueue_for_agent(&self, session_id: &str, agent_id: &str, score: i64) -> Result<()>;

    /// Remove a session from the unassigned pool, and from the given agent's
    /// queue when an agent id is supplied. With no agent id the session is
    /// removed from every agent queue, discovered by non-blocking cursor
    /// scans, never a blocking full-keyspace listing.
    async fn dequeue(&self, session_id: &str, agent_id: Option<&str>) -> Result<()>;

    /// Best-effort move from the unassigned pool into an agent's queue.
    /// Success is defined by presence in the destination; a failed source
    /// removal is logged and tolerated.
    async fn move_to_agent(&self, session_id: &str, agent_id: &str, score: i64) -> Result<()>;

    /// 1-based position of a session within a queue (1 = next served), or
    /// `None` when the session is not present.
    async fn rank(&self, session_id: &str, agent_id: Option<&str>) -> Result<Option<u64>>;

    /// Session ids in serving order, highest rank score first.
    async fn list(&self, agent_id: Option<&str>, limit: Option<usize>) -> Result<Vec<String>>;

    /// Number of sessions waiting in a queue.
    async fn len(&self, agent_id: Option<&str>) -> Result<u64>;

    /// Short-timeout liveness probe. Implementations log availability
    /// transitions once rather than on every probe.
    async fn is_available(&self) -> bool;
}
