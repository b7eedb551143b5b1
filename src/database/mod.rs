//! # Durable Store Integration
//!
//! sqlx/SQLite access to the externally-owned session and rule records. The
//! queue core owns exactly two columns on the session row, `priority_score`
//! and `queue_position`; everything else is read-only input. Upsert helpers
//! exist so collaborating services (and tests) can seed sessions, tickets and
//! rules through the same typed interface.

pub mod schema;
pub mod sessions;
pub mod rules;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{debug, error, info};

use crate::error::{Result, SupportQueueError};

pub use sessions::{QueuedSession, SessionRecord, SessionStatus};

/// Durable store manager using sqlx
#[derive(Clone)]
pub struct DatabaseManager {
    pool: SqlitePool,
}

impl DatabaseManager {
    /// Open (creating if missing) the database at `database_path`.
    pub async fn new(database_path: &str, max_connections: u32) -> Result<Self> {
        info!("🗄️ Opening support database at {}", database_path);

        let database = if database_path == ":memory:" {
            // A pooled in-memory database must stay on one connection or each
            // checkout would see its own empty database.
            let options = SqliteConnectOptions::new().filename(":memory:");
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .connect_with(options)
                .await?;
            Self { pool }
        } else {
            let options = SqliteConnectOptions::new()
                .filename(database_path)
                .create_if_missing(true);
            let pool = SqlitePoolOptions::new()
                .max_connections(max_connections.max(1))
                .connect_with(options)
                .await?;
            Self { pool }
        };

        database.initialize_schema().await?;

        info!("✅ Support database ready");
        Ok(database)
    }

    /// In-memory database for tests.
    pub async fn new_in_memory() -> Result<Self> {
        Self::new(":memory:", 1).await
    }

    async fn initialize_schema(&self) -> Result<()> {
        debug!("📋 Creating support queue schema");

        schema::create_support_sessions_table(&self.pool).await?;
        schema::create_session_tickets_table(&self.pool).await?;
        schema::create_ticket_issue_types_table(&self.pool).await?;
        schema::create_urgency_rules_table(&self.pool).await?;
        schema::create_rule_issue_types_table(&self.pool).await?;
        schema::create_indexes(&self.pool).await?;

        debug!("✅ Schema ready");
        Ok(())
    }

    /// The underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Execute a health check query
    pub async fn health_check(&self) -> bool {
        match sqlx::query("SELECT 1").fetch_one(&self.pool).await {
            Ok(_) => true,
            Err(e) => {
                error!("❌ Database health check failed: {}", e);
                false
            }
        }
    }
}

/// True when the failure is a missing table (the durable store mid-migration).
/// Scheduled passes treat this as "nothing to do yet" rather than an error.
pub(crate) fn is_missing_table(err: &SupportQueueError) -> bool {
    match err {
        SupportQueueError::Database(sqlx::Error::Database(db_err)) => {
            db_err.message().contains("no such table")
        }
        _ => false,
    }
}
