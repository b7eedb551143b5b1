use thiserror::Error;

/// Classification of a queue-cache failure.
///
/// Connectivity-shaped faults (`Timeout`, `ConnectionRefused`, `RetryExhausted`)
/// are fast-failed by the [`crate::executor::RetryingOperationExecutor`] and left
/// for the reconciler to repair; everything else is considered transient and
/// eligible for bounded retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheFaultKind {
    /// The command did not complete within its deadline.
    Timeout,
    /// The cache refused or dropped the connection.
    ConnectionRefused,
    /// The client's own reconnect budget was exhausted.
    RetryExhausted,
    /// Any other single-attempt failure.
    Other,
}

impl std::fmt::Display for CacheFaultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheFaultKind::Timeout => write!(f, "timeout"),
            CacheFaultKind::ConnectionRefused => write!(f, "connection-refused"),
            CacheFaultKind::RetryExhausted => write!(f, "retry-exhausted"),
            CacheFaultKind::Other => write!(f, "other"),
        }
    }
}

/// Support queue engine errors
#[derive(Error, Debug)]
pub enum SupportQueueError {
    /// Queue-cache errors, tagged with a fault classification
    #[error("Queue cache error ({kind}): {message}")]
    Cache {
        kind: CacheFaultKind,
        message: String,
    },

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Urgency-rule errors (malformed rule, bad predicate)
    #[error("Urgency rule error: {0}")]
    Rule(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SupportQueueError {
    /// Create a new Cache error with the given fault classification
    pub fn cache<S: Into<String>>(kind: CacheFaultKind, msg: S) -> Self {
        Self::Cache {
            kind,
            message: msg.into(),
        }
    }

    /// Create a new Rule error
    pub fn rule<S: Into<String>>(msg: S) -> Self {
        Self::Rule(msg.into())
    }

    /// Create a new Config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new NotFound error
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new Internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// True when the error indicates the cache infrastructure itself is down.
    ///
    /// These faults are never retried within a single call; the reconciler
    /// repairs whatever they left behind.
    pub fn is_connectivity_fault(&self) -> bool {
        matches!(
            self,
            Self::Cache {
                kind: CacheFaultKind::Timeout
                    | CacheFaultKind::ConnectionRefused
                    | CacheFaultKind::RetryExhausted,
                ..
            }
        )
    }
}

/// Result type for support queue operations
pub type Result<T> = std::result::Result<T, SupportQueueError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connectivity_classification() {
        assert!(SupportQueueError::cache(CacheFaultKind::Timeout, "t").is_connectivity_fault());
        assert!(
            SupportQueueError::cache(CacheFaultKind::ConnectionRefused, "r")
                .is_connectivity_fault()
        );
        assert!(
            SupportQueueError::cache(CacheFaultKind::RetryExhausted, "x").is_connectivity_fault()
        );
        assert!(!SupportQueueError::cache(CacheFaultKind::Other, "o").is_connectivity_fault());
        assert!(!SupportQueueError::rule("bad predicate").is_connectivity_fault());
    }
}
