//! # Urgency Rules
//!
//! Administrator-defined rules that raise the priority of waiting sessions.
//! A rule is a conjunction of predicates over a session's ticket attributes,
//! gated on issue-type membership: a rule that names no issue types, or whose
//! issue types don't intersect the ticket's, never matches, no matter what
//! its other predicates say.
//!
//! A session's priority score is the sum of `priority_weight` over every
//! matching enabled rule; a session matching nothing scores 0 and still
//! queues, it just never jumps the line.
//!
//! Rules are read-only to this engine. Edits land through the rule store and
//! take effect on the next full recalculation pass, never mid-pass.

pub mod matcher;
pub mod engine;

pub use engine::{RecalculationSummary, UrgencyRuleEngine};
pub use matcher::{rule_matches, score_for_ticket};

use serde::{Deserialize, Serialize};

/// Bounds on a single rule's priority weight.
pub const MIN_PRIORITY_WEIGHT: i64 = 1;
pub const MAX_PRIORITY_WEIGHT: i64 = 100;

/// Administrator-defined urgency rule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrgencyRule {
    pub rule_id: String,
    pub name: String,
    pub enabled: bool,
    /// Score contribution when the rule matches, clamped to 1–100
    pub priority_weight: i64,
    pub conditions: RuleConditions,
}

impl UrgencyRule {
    /// Weight actually applied to matching sessions.
    pub fn effective_weight(&self) -> i64 {
        self.priority_weight.clamp(MIN_PRIORITY_WEIGHT, MAX_PRIORITY_WEIGHT)
    }
}

/// Conjunction of predicates making up a rule.
///
/// `issue_type_ids` is the mandatory gate; every other field is optional and
/// vacuously true when unset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleConditions {
    /// Mandatory gate: the ticket must share at least one of these
    pub issue_type_ids: Vec<i64>,
    /// Case-insensitive substring of the ticket description
    pub keyword: Option<String>,
    /// Exact match on the AI-detected intent
    pub detected_intent: Option<String>,
    /// Exact match on the identity-verification status
    pub identity_status: Option<String>,
    /// Exact match on the game the session belongs to
    pub game_id: Option<String>,
    /// Exact match on the game server
    pub server_id: Option<String>,
    /// Exact match on the ticket's own priority field
    pub ticket_priority: Option<String>,
}

/// Ticket attributes a rule is evaluated against, as read from the rule store
#[derive(Debug, Clone, Default)]
pub struct TicketAttributes {
    pub session_id: String,
    pub issue_type_ids: Vec<i64>,
    pub description: Option<String>,
    pub detected_intent: Option<String>,
    pub identity_status: Option<String>,
    pub game_id: Option<String>,
    pub server_id: Option<String>,
    pub ticket_priority: Option<String>,
}
