//! # Session Queue Module
//!
//! Rank-ordered views of waiting support sessions, backed by a remote
//! sorted-set cache. One logical queue holds the unassigned pool; every agent
//! with directed work has a queue of their own.
//!
//! The cache is deliberately treated as best-effort: the durable session
//! record always wins, and the [`crate::reconciler`] repairs any drift the
//! cache accumulates during outages. Callers therefore reach the store
//! through the [`crate::executor::RetryingOperationExecutor`] rather than
//! calling it directly.
//!
//! Two implementations of [`SessionQueueStore`] ship with the crate:
//!
//! - [`RedisQueueStore`]: the networked implementation over sorted sets
//! - [`InMemoryQueueStore`]: an in-process ordered map with identical
//!   semantics, used to exercise the executor and reconciler offline

pub mod store;
pub mod redis_store;
pub mod memory;

pub use store::{QueueKey, SessionQueueStore};
pub use redis_store::RedisQueueStore;
pub use memory::InMemoryQueueStore;
