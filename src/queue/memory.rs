//! In-process [`SessionQueueStore`] with the same ordering semantics as the
//! networked store. Backs the offline tests for the executor, rule engine and
//! reconciler, and doubles as a development fallback when no cache is running.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::{CacheFaultKind, Result, SupportQueueError};
use crate::queue::store::{QueueKey, SessionQueueStore};

/// Ordered-map session queue store
pub struct InMemoryQueueStore {
    queues: DashMap<String, HashMap<String, i64>>,
    available: AtomicBool,
}

impl Default for InMemoryQueueStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryQueueStore {
    /// Create an empty, available store.
    pub fn new() -> Self {
        Self {
            queues: DashMap::new(),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate a cache outage (or recovery) for tests and local runs.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SupportQueueError::cache(
                CacheFaultKind::ConnectionRefused,
                "in-memory queue store marked unavailable",
            ))
        }
    }

    /// Members of one queue in serving order: score descending, session id
    /// ascending among exact score ties.
    fn ordered_members(&self, key: &QueueKey) -> Vec<(String, i64)> {
        let mut members: Vec<(String, i64)> = self
            .queues
            .get(&key.to_string())
            .map(|entry| entry.iter().map(|(id, score)| (id.clone(), *score)).collect())
            .unwrap_or_default();

        members.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        members
    }

    fn insert(&self, key: &QueueKey, session_id: &str, score: i64) {
        self.queues
            .entry(key.to_string())
            .or_default()
            .insert(session_id.to_string(), score);
    }

    fn remove(&self, key: &QueueKey, session_id: &str) {
        if let Some(mut entry) = self.queues.get_mut(&key.to_string()) {
            entry.remove(session_id);
        }
    }
}

#[async_trait]
impl SessionQueueStore for InMemoryQueueStore {
    async fn enqueue_unassigned(&self, session_id: &str, score: i64) -> Result<()> {
        self.ensure_available()?;
        self.insert(&QueueKey::Unassigned, session_id, score);
        Ok(())
    }

    async fn enqueue_for_agent(&self, session_id: &str, agent_id: &str, score: i64) -> Result<()> {
        self.ensure_available()?;
        self.insert(&QueueKey::Agent(agent_id.to_string()), session_id, score);
        Ok(())
    }

    async fn dequeue(&self, session_id: &str, agent_id: Option<&str>) -> Result<()> {
        self.ensure_available()?;
        self.remove(&QueueKey::Unassigned, session_id);

        match agent_id {
            Some(id) => self.remove(&QueueKey::Agent(id.to_string()), session_id),
            None => {
                for mut entry in self.queues.iter_mut() {
                    if entry.key() != &QueueKey::Unassigned.to_string() {
                        entry.value_mut().remove(session_id);
                    }
                }
            }
        }

        Ok(())
    }

    async fn move_to_agent(&self, session_id: &str, agent_id: &str, score: i64) -> Result<()> {
        self.ensure_available()?;
        self.remove(&QueueKey::Unassigned, session_id);
        self.insert(&QueueKey::Agent(agent_id.to_string()), session_id, score);
        Ok(())
    }

    async fn rank(&self, session_id: &str, agent_id: Option<&str>) -> Result<Option<u64>> {
        self.ensure_available()?;
        let key = QueueKey::from_agent(agent_id);
        Ok(self
            .ordered_members(&key)
            .iter()
            .position(|(id, _)| id == session_id)
            .map(|idx| idx as u64 + 1))
    }

    async fn list(&self, agent_id: Option<&str>, limit: Option<usize>) -> Result<Vec<String>> {
        self.ensure_available()?;
        let key = QueueKey::from_agent(agent_id);
        let members = self.ordered_members(&key);
        let take = limit.unwrap_or(members.len());
        Ok(members.into_iter().take(take).map(|(id, _)| id).collect())
    }

    async fn len(&self, agent_id: Option<&str>) -> Result<u64> {
        self.ensure_available()?;
        let key = QueueKey::from_agent(agent_id);
        Ok(self
            .queues
            .get(&key.to_string())
            .map(|entry| entry.len() as u64)
            .unwrap_or(0))
    }

    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn re_enqueue_overwrites_instead_of_duplicating() {
        let store = InMemoryQueueStore::new();
        store.enqueue_unassigned("s1", 100).await.unwrap();
        store.enqueue_unassigned("s1", 500).await.unwrap();

        assert_eq!(store.len(None).await.unwrap(), 1);
        assert_eq!(store.rank("s1", None).await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn sole_insertion_ranks_first() {
        let store = InMemoryQueueStore::new();
        store.enqueue_unassigned("s1", 42).await.unwrap();
        assert_eq!(store.rank("s1", None).await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn rank_is_none_after_dequeue() {
        let store = InMemoryQueueStore::new();
        store.enqueue_unassigned("s1", 42).await.unwrap();
        store.dequeue("s1", None).await.unwrap();
        assert_eq!(store.rank("s1", None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn list_orders_by_score_descending() {
        let store = InMemoryQueueStore::new();
        store.enqueue_unassigned("low", 10).await.unwrap();
        store.enqueue_unassigned("high", 30).await.unwrap();
        store.enqueue_unassigned("mid", 20).await.unwrap();

        let ids = store.list(None, None).await.unwrap();
        assert_eq!(ids, vec!["high", "mid", "low"]);

        let top = store.list(None, Some(2)).await.unwrap();
        assert_eq!(top, vec!["high", "mid"]);
    }

    #[tokio::test]
    async fn move_lands_in_destination_only() {
        let store = InMemoryQueueStore::new();
        store.enqueue_unassigned("s1", 42).await.unwrap();
        store.move_to_agent("s1", "agent-7", 42).await.unwrap();

        assert_eq!(store.rank("s1", None).await.unwrap(), None);
        assert_eq!(store.rank("s1", Some("agent-7")).await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn dequeue_without_agent_hint_clears_every_agent_queue() {
        let store = InMemoryQueueStore::new();
        store.enqueue_for_agent("s1", "agent-1", 10).await.unwrap();
        store.enqueue_for_agent("s1", "agent-2", 10).await.unwrap();

        store.dequeue("s1", None).await.unwrap();

        assert_eq!(store.rank("s1", Some("agent-1")).await.unwrap(), None);
        assert_eq!(store.rank("s1", Some("agent-2")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn operations_fail_with_connectivity_fault_when_unavailable() {
        let store = InMemoryQueueStore::new();
        store.set_available(false);

        let err = store.enqueue_unassigned("s1", 1).await.unwrap_err();
        assert!(err.is_connectivity_fault());
        assert!(!store.is_available().await);
    }
}
