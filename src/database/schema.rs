//! Database schema definitions for the support queue core.
//!
//! Tables for sessions, their ticket attributes, and administrator-defined
//! urgency rules. Soft deletion is a status column plus timestamp; queries
//! filter on status, never on field absence.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::Result;

/// Create the support_sessions table
pub async fn create_support_sessions_table(pool: &SqlitePool) -> Result<()> {
    debug!("📋 Creating support_sessions table");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS support_sessions (
            session_id TEXT PRIMARY KEY,
            status TEXT NOT NULL DEFAULT 'QUEUED',
            assigned_agent_id TEXT,
            priority_score INTEGER NOT NULL DEFAULT 0,
            queued_at INTEGER NOT NULL,
            queue_position INTEGER,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the session_tickets table
pub async fn create_session_tickets_table(pool: &SqlitePool) -> Result<()> {
    debug!("📋 Creating session_tickets table");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS session_tickets (
            session_id TEXT PRIMARY KEY,
            game_id TEXT,
            server_id TEXT,
            description TEXT,
            detected_intent TEXT,
            identity_status TEXT,
            ticket_priority TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the ticket_issue_types table
pub async fn create_ticket_issue_types_table(pool: &SqlitePool) -> Result<()> {
    debug!("📋 Creating ticket_issue_types table");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ticket_issue_types (
            session_id TEXT NOT NULL,
            issue_type_id INTEGER NOT NULL,
            PRIMARY KEY (session_id, issue_type_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the urgency_rules table
pub async fn create_urgency_rules_table(pool: &SqlitePool) -> Result<()> {
    debug!("📋 Creating urgency_rules table");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS urgency_rules (
            rule_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            enabled BOOLEAN NOT NULL DEFAULT 1,
            priority_weight INTEGER NOT NULL DEFAULT 1,
            keyword TEXT,
            detected_intent TEXT,
            identity_status TEXT,
            game_id TEXT,
            server_id TEXT,
            ticket_priority TEXT,
            status TEXT NOT NULL DEFAULT 'ACTIVE',
            deleted_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the rule_issue_types table
pub async fn create_rule_issue_types_table(pool: &SqlitePool) -> Result<()> {
    debug!("📋 Creating rule_issue_types table");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS rule_issue_types (
            rule_id TEXT NOT NULL,
            issue_type_id INTEGER NOT NULL,
            PRIMARY KEY (rule_id, issue_type_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create indexes for performance
pub async fn create_indexes(pool: &SqlitePool) -> Result<()> {
    debug!("📋 Creating indexes");

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_support_sessions_status
         ON support_sessions(status)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_support_sessions_order
         ON support_sessions(status, priority_score DESC, queued_at ASC)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_urgency_rules_active
         ON urgency_rules(status, enabled)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
