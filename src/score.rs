//! Rank-key calculation for queued sessions.
//!
//! A session's position in a queue is decided by a single integer rank score
//! combining its priority and its arrival time: higher priority always wins,
//! and within one priority tier the longest-waiting session is served first.

use chrono::{DateTime, Utc};

/// Upper clamp for arrival timestamps, in epoch milliseconds.
pub const MAX_QUEUED_AT_MILLIS: i64 = 9_999_999_999_999;

/// Score contribution of one unit of priority.
///
/// Must exceed the full clamped timestamp range so that a single point of
/// priority outranks any possible wait time.
pub const PRIORITY_STRIDE: i64 = MAX_QUEUED_AT_MILLIS + 1;

/// Compute the rank score for a session from its priority weight and the
/// epoch-millisecond timestamp at which it entered the queue.
///
/// `score = weight × PRIORITY_STRIDE + (MAX_QUEUED_AT_MILLIS − queued_at)`,
/// so earlier arrivals yield a larger time term and sort first within a tier.
/// Negative weights clamp to 0; out-of-range timestamps clamp into range.
pub fn rank_score_millis(priority_weight: i64, queued_at_millis: i64) -> i64 {
    let weight = priority_weight.max(0);
    let ts = queued_at_millis.clamp(0, MAX_QUEUED_AT_MILLIS);
    weight * PRIORITY_STRIDE + (MAX_QUEUED_AT_MILLIS - ts)
}

/// Convenience wrapper over [`rank_score_millis`] for `DateTime` call sites.
pub fn rank_score(priority_weight: i64, queued_at: DateTime<Utc>) -> i64 {
    rank_score_millis(priority_weight, queued_at.timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn higher_priority_always_outranks_lower() {
        // Worst case for the higher tier: newest possible arrival vs. the
        // oldest possible arrival one tier down.
        assert!(rank_score_millis(1, MAX_QUEUED_AT_MILLIS) > rank_score_millis(0, 0));
        assert!(rank_score_millis(90, MAX_QUEUED_AT_MILLIS) > rank_score_millis(89, 0));
        assert!(rank_score_millis(100, 1_700_000_000_000) > rank_score_millis(50, 0));
    }

    #[test]
    fn fifo_within_equal_priority() {
        // Smaller queued_at (longer wait) yields the larger score.
        assert!(rank_score_millis(50, 50) > rank_score_millis(50, 100));
        assert!(rank_score_millis(0, 0) > rank_score_millis(0, 1));
    }

    #[test]
    fn negative_priority_clamps_to_zero() {
        assert_eq!(rank_score_millis(-7, 1000), rank_score_millis(0, 1000));
    }

    #[test]
    fn out_of_range_timestamps_clamp() {
        assert_eq!(
            rank_score_millis(5, -42),
            rank_score_millis(5, 0),
            "negative timestamps clamp to zero"
        );
        assert_eq!(
            rank_score_millis(5, MAX_QUEUED_AT_MILLIS + 1),
            rank_score_millis(5, MAX_QUEUED_AT_MILLIS),
            "oversized timestamps clamp to the maximum"
        );
    }

    #[test]
    fn datetime_wrapper_matches_millis_form() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        assert_eq!(rank_score(42, at), rank_score_millis(42, 1_700_000_000_000));
    }
}
