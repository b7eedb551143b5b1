//! Durable session queries: the QUEUED scan the reconciler and rule engine
//! iterate, and the two columns this core writes back.

use chrono::{DateTime, Utc};
use sqlx::Row;
use tracing::debug;

use super::DatabaseManager;
use crate::error::{Result, SupportQueueError};

/// Lifecycle state of a support session. Only `Queued` sessions participate
/// in queue ordering; the durable status is always authoritative over any
/// cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Queued,
    Assigned,
    InProgress,
    Closed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Queued => "QUEUED",
            SessionStatus::Assigned => "ASSIGNED",
            SessionStatus::InProgress => "IN_PROGRESS",
            SessionStatus::Closed => "CLOSED",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "QUEUED" => Ok(SessionStatus::Queued),
            "ASSIGNED" => Ok(SessionStatus::Assigned),
            "IN_PROGRESS" => Ok(SessionStatus::InProgress),
            "CLOSED" => Ok(SessionStatus::Closed),
            other => Err(SupportQueueError::internal(format!(
                "unknown session status: {}",
                other
            ))),
        }
    }
}

/// Full durable session row
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub session_id: String,
    pub status: SessionStatus,
    pub assigned_agent_id: Option<String>,
    pub priority_score: i64,
    pub queued_at_millis: i64,
    pub queue_position: Option<i64>,
}

/// Projection of a QUEUED session used by recalculation and reconciliation
#[derive(Debug, Clone)]
pub struct QueuedSession {
    pub session_id: String,
    pub assigned_agent_id: Option<String>,
    pub priority_score: i64,
    pub queued_at_millis: i64,
    pub queue_position: Option<i64>,
}

impl DatabaseManager {
    /// Insert or update a session record.
    pub async fn upsert_session(
        &self,
        session_id: &str,
        status: SessionStatus,
        assigned_agent_id: Option<&str>,
        priority_score: i64,
        queued_at: DateTime<Utc>,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO support_sessions
                (session_id, status, assigned_agent_id, priority_score, queued_at,
                 created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(session_id) DO UPDATE SET
                status = excluded.status,
                assigned_agent_id = excluded.assigned_agent_id,
                priority_score = excluded.priority_score,
                queued_at = excluded.queued_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(session_id)
        .bind(status.as_str())
        .bind(assigned_agent_id)
        .bind(priority_score)
        .bind(queued_at.timestamp_millis())
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        debug!("💾 Upserted session {} ({})", session_id, status.as_str());
        Ok(())
    }

    /// Update a session's lifecycle status and agent assignment.
    pub async fn set_session_status(
        &self,
        session_id: &str,
        status: SessionStatus,
        assigned_agent_id: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE support_sessions
             SET status = ?, assigned_agent_id = ?, updated_at = ?
             WHERE session_id = ?",
        )
        .bind(status.as_str())
        .bind(assigned_agent_id)
        .bind(Utc::now().to_rfc3339())
        .bind(session_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Fetch one session record.
    pub async fn get_session(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        let row = sqlx::query(
            "SELECT session_id, status, assigned_agent_id, priority_score,
                    queued_at, queue_position
             FROM support_sessions
             WHERE session_id = ?",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let status: String = row.try_get("status")?;
                Ok(Some(SessionRecord {
                    session_id: row.try_get("session_id")?,
                    status: SessionStatus::parse(&status)?,
                    assigned_agent_id: row.try_get("assigned_agent_id")?,
                    priority_score: row.try_get("priority_score")?,
                    queued_at_millis: row.try_get("queued_at")?,
                    queue_position: row.try_get("queue_position")?,
                }))
            }
            None => Ok(None),
        }
    }

    /// All sessions currently waiting, in no particular order.
    pub async fn queued_sessions(&self) -> Result<Vec<QueuedSession>> {
        self.fetch_queued("SELECT session_id, assigned_agent_id, priority_score, queued_at, queue_position
                           FROM support_sessions WHERE status = 'QUEUED'")
            .await
    }

    /// All waiting sessions in serving order: priority score descending, then
    /// arrival ascending.
    pub async fn queued_sessions_ordered(&self) -> Result<Vec<QueuedSession>> {
        self.fetch_queued(
            "SELECT session_id, assigned_agent_id, priority_score, queued_at, queue_position
             FROM support_sessions WHERE status = 'QUEUED'
             ORDER BY priority_score DESC, queued_at ASC",
        )
        .await
    }

    async fn fetch_queued(&self, sql: &str) -> Result<Vec<QueuedSession>> {
        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;

        let mut sessions = Vec::with_capacity(rows.len());
        for row in rows {
            sessions.push(QueuedSession {
                session_id: row.try_get("session_id")?,
                assigned_agent_id: row.try_get("assigned_agent_id")?,
                priority_score: row.try_get("priority_score")?,
                queued_at_millis: row.try_get("queued_at")?,
                queue_position: row.try_get("queue_position")?,
            });
        }

        Ok(sessions)
    }

    /// Persist a recalculated priority score.
    pub async fn update_priority_score(&self, session_id: &str, priority_score: i64) -> Result<()> {
        sqlx::query(
            "UPDATE support_sessions
             SET priority_score = ?, updated_at = ?
             WHERE session_id = ?",
        )
        .bind(priority_score)
        .bind(Utc::now().to_rfc3339())
        .bind(session_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Persist the last-known queue position (`None` clears it).
    pub async fn update_queue_position(
        &self,
        session_id: &str,
        queue_position: Option<i64>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE support_sessions
             SET queue_position = ?, updated_at = ?
             WHERE session_id = ?",
        )
        .bind(queue_position)
        .bind(Utc::now().to_rfc3339())
        .bind(session_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[tokio::test]
    async fn upsert_and_fetch_roundtrip() {
        let db = DatabaseManager::new_in_memory().await.unwrap();
        let queued_at = Utc.timestamp_millis_opt(1_000).unwrap();

        db.upsert_session("s1", SessionStatus::Queued, None, 5, queued_at)
            .await
            .unwrap();

        let record = db.get_session("s1").await.unwrap().unwrap();
        assert_eq!(record.status, SessionStatus::Queued);
        assert_eq!(record.priority_score, 5);
        assert_eq!(record.queued_at_millis, 1_000);
        assert_eq!(record.queue_position, None);

        // Upsert again with new data: one row, updated fields.
        db.upsert_session("s1", SessionStatus::Queued, Some("agent-1"), 9, queued_at)
            .await
            .unwrap();
        let record = db.get_session("s1").await.unwrap().unwrap();
        assert_eq!(record.assigned_agent_id.as_deref(), Some("agent-1"));
        assert_eq!(record.priority_score, 9);
    }

    #[tokio::test]
    async fn ordered_scan_sorts_by_score_then_arrival() {
        let db = DatabaseManager::new_in_memory().await.unwrap();
        let at = |ms| Utc.timestamp_millis_opt(ms).unwrap();

        db.upsert_session("old-low", SessionStatus::Queued, None, 1, at(100))
            .await
            .unwrap();
        db.upsert_session("new-low", SessionStatus::Queued, None, 1, at(200))
            .await
            .unwrap();
        db.upsert_session("high", SessionStatus::Queued, None, 50, at(300))
            .await
            .unwrap();
        db.upsert_session("closed", SessionStatus::Closed, None, 99, at(1))
            .await
            .unwrap();

        let ordered = db.queued_sessions_ordered().await.unwrap();
        let ids: Vec<&str> = ordered.iter().map(|s| s.session_id.as_str()).collect();
        assert_eq!(ids, vec!["high", "old-low", "new-low"]);
    }

    #[tokio::test]
    async fn queue_position_clears_to_null() {
        let db = DatabaseManager::new_in_memory().await.unwrap();
        db.upsert_session("s1", SessionStatus::Queued, None, 0, Utc::now())
            .await
            .unwrap();

        db.update_queue_position("s1", Some(3)).await.unwrap();
        assert_eq!(
            db.get_session("s1").await.unwrap().unwrap().queue_position,
            Some(3)
        );

        db.update_queue_position("s1", None).await.unwrap();
        assert_eq!(db.get_session("s1").await.unwrap().unwrap().queue_position, None);
    }
}
