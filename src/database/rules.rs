//! Urgency-rule and ticket-attribute queries against the rule store.

use std::collections::HashMap;

use chrono::Utc;
use sqlx::Row;
use tracing::debug;

use super::DatabaseManager;
use crate::error::Result;
use crate::rules::{RuleConditions, TicketAttributes, UrgencyRule};

impl DatabaseManager {
    /// Insert or update a rule and its issue-type gate list.
    pub async fn upsert_rule(&self, rule: &UrgencyRule) -> Result<()> {
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO urgency_rules
                (rule_id, name, enabled, priority_weight, keyword, detected_intent,
                 identity_status, game_id, server_id, ticket_priority,
                 status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'ACTIVE', ?, ?)
            ON CONFLICT(rule_id) DO UPDATE SET
                name = excluded.name,
                enabled = excluded.enabled,
                priority_weight = excluded.priority_weight,
                keyword = excluded.keyword,
                detected_intent = excluded.detected_intent,
                identity_status = excluded.identity_status,
                game_id = excluded.game_id,
                server_id = excluded.server_id,
                ticket_priority = excluded.ticket_priority,
                status = 'ACTIVE',
                deleted_at = NULL,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&rule.rule_id)
        .bind(&rule.name)
        .bind(rule.enabled)
        .bind(rule.priority_weight)
        .bind(&rule.conditions.keyword)
        .bind(&rule.conditions.detected_intent)
        .bind(&rule.conditions.identity_status)
        .bind(&rule.conditions.game_id)
        .bind(&rule.conditions.server_id)
        .bind(&rule.conditions.ticket_priority)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        sqlx::query("DELETE FROM rule_issue_types WHERE rule_id = ?")
            .bind(&rule.rule_id)
            .execute(&self.pool)
            .await?;

        for issue_type_id in &rule.conditions.issue_type_ids {
            sqlx::query(
                "INSERT OR IGNORE INTO rule_issue_types (rule_id, issue_type_id) VALUES (?, ?)",
            )
            .bind(&rule.rule_id)
            .bind(issue_type_id)
            .execute(&self.pool)
            .await?;
        }

        debug!("💾 Upserted urgency rule {} ({})", rule.rule_id, rule.name);
        Ok(())
    }

    /// Toggle a rule without touching its conditions.
    pub async fn set_rule_enabled(&self, rule_id: &str, enabled: bool) -> Result<()> {
        sqlx::query(
            "UPDATE urgency_rules SET enabled = ?, updated_at = ? WHERE rule_id = ?",
        )
        .bind(enabled)
        .bind(Utc::now().to_rfc3339())
        .bind(rule_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Soft-delete a rule: flips the status enum and stamps the deletion time.
    pub async fn soft_delete_rule(&self, rule_id: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "UPDATE urgency_rules
             SET status = 'DELETED', deleted_at = ?, updated_at = ?
             WHERE rule_id = ?",
        )
        .bind(&now)
        .bind(&now)
        .bind(rule_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// All enabled, non-deleted rules with their issue-type gate lists.
    pub async fn load_active_rules(&self) -> Result<Vec<UrgencyRule>> {
        let rows = sqlx::query(
            "SELECT rule_id, name, enabled, priority_weight, keyword, detected_intent,
                    identity_status, game_id, server_id, ticket_priority
             FROM urgency_rules
             WHERE enabled = 1 AND status = 'ACTIVE'
             ORDER BY rule_id",
        )
        .fetch_all(&self.pool)
        .await?;

        let gate_rows = sqlx::query("SELECT rule_id, issue_type_id FROM rule_issue_types")
            .fetch_all(&self.pool)
            .await?;

        let mut gates: HashMap<String, Vec<i64>> = HashMap::new();
        for row in gate_rows {
            let rule_id: String = row.try_get("rule_id")?;
            let issue_type_id: i64 = row.try_get("issue_type_id")?;
            gates.entry(rule_id).or_default().push(issue_type_id);
        }

        let mut rules = Vec::with_capacity(rows.len());
        for row in rows {
            let rule_id: String = row.try_get("rule_id")?;
            let issue_type_ids = gates.remove(&rule_id).unwrap_or_default();

            rules.push(UrgencyRule {
                name: row.try_get("name")?,
                enabled: row.try_get("enabled")?,
                priority_weight: row.try_get("priority_weight")?,
                conditions: RuleConditions {
                    issue_type_ids,
                    keyword: row.try_get("keyword")?,
                    detected_intent: row.try_get("detected_intent")?,
                    identity_status: row.try_get("identity_status")?,
                    game_id: row.try_get("game_id")?,
                    server_id: row.try_get("server_id")?,
                    ticket_priority: row.try_get("ticket_priority")?,
                },
                rule_id,
            });
        }

        Ok(rules)
    }

    /// Insert or update the ticket attributes rules are evaluated against.
    pub async fn upsert_ticket(&self, attributes: &TicketAttributes) -> Result<()> {
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO session_tickets
                (session_id, game_id, server_id, description, detected_intent,
                 identity_status, ticket_priority, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(session_id) DO UPDATE SET
                game_id = excluded.game_id,
                server_id = excluded.server_id,
                description = excluded.description,
                detected_intent = excluded.detected_intent,
                identity_status = excluded.identity_status,
                ticket_priority = excluded.ticket_priority,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&attributes.session_id)
        .bind(&attributes.game_id)
        .bind(&attributes.server_id)
        .bind(&attributes.description)
        .bind(&attributes.detected_intent)
        .bind(&attributes.identity_status)
        .bind(&attributes.ticket_priority)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        sqlx::query("DELETE FROM ticket_issue_types WHERE session_id = ?")
            .bind(&attributes.session_id)
            .execute(&self.pool)
            .await?;

        for issue_type_id in &attributes.issue_type_ids {
            sqlx::query(
                "INSERT OR IGNORE INTO ticket_issue_types (session_id, issue_type_id) VALUES (?, ?)",
            )
            .bind(&attributes.session_id)
            .bind(issue_type_id)
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }

    /// Ticket attributes for one session, or `None` when no ticket exists yet
    /// (the session then scores 0 against every rule).
    pub async fn ticket_attributes(&self, session_id: &str) -> Result<Option<TicketAttributes>> {
        let row = sqlx::query(
            "SELECT session_id, game_id, server_id, description, detected_intent,
                    identity_status, ticket_priority
             FROM session_tickets
             WHERE session_id = ?",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let issue_rows =
            sqlx::query("SELECT issue_type_id FROM ticket_issue_types WHERE session_id = ?")
                .bind(session_id)
                .fetch_all(&self.pool)
                .await?;

        let mut issue_type_ids = Vec::with_capacity(issue_rows.len());
        for issue_row in issue_rows {
            issue_type_ids.push(issue_row.try_get("issue_type_id")?);
        }

        Ok(Some(TicketAttributes {
            session_id: row.try_get("session_id")?,
            issue_type_ids,
            description: row.try_get("description")?,
            detected_intent: row.try_get("detected_intent")?,
            identity_status: row.try_get("identity_status")?,
            game_id: row.try_get("game_id")?,
            server_id: row.try_get("server_id")?,
            ticket_priority: row.try_get("ticket_priority")?,
        }))
    }
}
