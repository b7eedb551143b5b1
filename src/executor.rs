//! # Retrying Operation Executor
//!
//! Every queue-cache mutation passes through here. The executor separates
//! "the infrastructure is down, fix it later via reconciliation" from "a
//! one-off hiccup worth retrying", and separates cosmetic operations (safe to
//! swallow) from load-bearing ones (must be visible to the caller):
//!
//! 1. Probe availability; when the cache is down, short-circuit without a
//!    single operation attempt.
//! 2. Run the operation; success returns immediately with its result.
//! 3. Connectivity faults fail fast; retrying a dead cache only piles up
//!    doomed work.
//! 4. Any other fault retries with bounded exponential backoff.
//! 5. Exhausted retries fall back to the same silent-vs-surfaced policy as
//!    step 1.
//!
//! "Silent" means the call reports success with no result: the canonical case
//! is a removal where "already gone" is as good as removed. Load-bearing
//! inserts surface the failure as a boolean so callers can defer to the next
//! consistency pass instead of treating it as fatal.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::RetryConfig;
use crate::error::Result;
use crate::queue::store::SessionQueueStore;

/// Outcome of one executed operation.
///
/// `succeeded` with a `None` result marks a silent success: the cache was
/// unreachable and the caller opted into treating the operation as moot.
#[derive(Debug)]
pub struct ExecutionOutcome<T> {
    pub succeeded: bool,
    pub result: Option<T>,
}

impl<T> ExecutionOutcome<T> {
    fn success(result: T) -> Self {
        Self {
            succeeded: true,
            result: Some(result),
        }
    }

    fn silent() -> Self {
        Self {
            succeeded: true,
            result: None,
        }
    }

    fn failure() -> Self {
        Self {
            succeeded: false,
            result: None,
        }
    }
}

/// Executor wrapping queue-store calls with availability probing, fault
/// classification and bounded exponential-backoff retry.
pub struct RetryingOperationExecutor {
    store: Arc<dyn SessionQueueStore>,
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryingOperationExecutor {
    pub fn new(store: Arc<dyn SessionQueueStore>, retry: &RetryConfig) -> Self {
        Self {
            store,
            base_delay: retry.base_delay,
            max_delay: retry.max_delay,
        }
    }

    /// Run `operation` under the retry policy.
    ///
    /// `label` and `correlation_id` tie log lines across attempts;
    /// `max_retries` bounds re-attempts of transient faults;
    /// `silent_on_connectivity` selects the policy applied when the cache is
    /// down or retries are exhausted.
    pub async fn execute<T, F, Fut>(
        &self,
        label: &str,
        correlation_id: &str,
        max_retries: u32,
        silent_on_connectivity: bool,
        operation: F,
    ) -> ExecutionOutcome<T>
    where
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = Result<T>> + Send,
        T: Send,
    {
        if !self.store.is_available().await {
            debug!(
                "⏭️ {} [{}]: cache unavailable at probe, skipping without attempts",
                label, correlation_id
            );
            return Self::policy_outcome(label, correlation_id, silent_on_connectivity);
        }

        let mut attempt: u32 = 0;
        loop {
            match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        debug!(
                            "✅ {} [{}] succeeded on attempt {}",
                            label,
                            correlation_id,
                            attempt + 1
                        );
                    }
                    return ExecutionOutcome::success(result);
                }
                Err(e) if e.is_connectivity_fault() => {
                    warn!(
                        "🔌 {} [{}] hit a connectivity fault, failing fast: {}",
                        label, correlation_id, e
                    );
                    return Self::policy_outcome(label, correlation_id, silent_on_connectivity);
                }
                Err(e) => {
                    if attempt >= max_retries {
                        warn!(
                            "❌ {} [{}] failed after {} attempts: {}",
                            label,
                            correlation_id,
                            attempt + 1,
                            e
                        );
                        return Self::policy_outcome(label, correlation_id, silent_on_connectivity);
                    }

                    let delay = self.backoff_delay(attempt);
                    warn!(
                        "🔁 {} [{}] attempt {} failed ({}), retrying in {:?}",
                        label,
                        correlation_id,
                        attempt + 1,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// `min(base × 2^attempt, cap)`
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.min(16);
        (self.base_delay * factor).min(self.max_delay)
    }

    fn policy_outcome<T>(
        label: &str,
        correlation_id: &str,
        silent_on_connectivity: bool,
    ) -> ExecutionOutcome<T> {
        if silent_on_connectivity {
            debug!(
                "🤫 {} [{}] swallowed: best-effort operation with the cache unreachable",
                label, correlation_id
            );
            ExecutionOutcome::silent()
        } else {
            ExecutionOutcome::failure()
        }
    }
}
