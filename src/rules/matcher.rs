//! Rule predicate evaluation: the issue-type gate first, then the remaining
//! conjunction. Unset predicates hold vacuously.

use super::{RuleConditions, TicketAttributes, UrgencyRule};

/// Evaluate one rule against a ticket.
///
/// The issue-type gate is absolute: an empty rule list never matches, and a
/// list disjoint from the ticket's issue types never matches, regardless of
/// every other predicate.
pub fn rule_matches(rule: &UrgencyRule, ticket: &TicketAttributes) -> bool {
    if !issue_type_gate(&rule.conditions, ticket) {
        return false;
    }

    keyword_matches(&rule.conditions, ticket)
        && equals_if_set(&rule.conditions.detected_intent, &ticket.detected_intent)
        && equals_if_set(&rule.conditions.identity_status, &ticket.identity_status)
        && equals_if_set(&rule.conditions.game_id, &ticket.game_id)
        && equals_if_set(&rule.conditions.server_id, &ticket.server_id)
        && equals_if_set(&rule.conditions.ticket_priority, &ticket.ticket_priority)
}

/// Sum of effective weights over every matching enabled rule. No matches
/// yields 0: the session still queues, at base priority.
pub fn score_for_ticket(rules: &[UrgencyRule], ticket: &TicketAttributes) -> i64 {
    rules
        .iter()
        .filter(|rule| rule.enabled && rule_matches(rule, ticket))
        .map(|rule| rule.effective_weight())
        .sum()
}

fn issue_type_gate(conditions: &RuleConditions, ticket: &TicketAttributes) -> bool {
    !conditions.issue_type_ids.is_empty()
        && conditions
            .issue_type_ids
            .iter()
            .any(|id| ticket.issue_type_ids.contains(id))
}

fn keyword_matches(conditions: &RuleConditions, ticket: &TicketAttributes) -> bool {
    match &conditions.keyword {
        None => true,
        Some(keyword) => match &ticket.description {
            Some(description) => description
                .to_lowercase()
                .contains(&keyword.to_lowercase()),
            None => false,
        },
    }
}

fn equals_if_set(condition: &Option<String>, attribute: &Option<String>) -> bool {
    match condition {
        None => true,
        Some(expected) => attribute.as_deref() == Some(expected.as_str()),
    }
}
