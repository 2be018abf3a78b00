//! Bounded polling for asynchronous query completion

use std::future::Future;
use std::time::Duration;

use contracts::{AthenaConfig, ContractError};
use tracing::{debug, trace};

/// Query execution state as reported by the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryStatus {
    Queued,
    Running,
    Succeeded,
    Failed { reason: String },
    Cancelled { reason: String },
}

/// Poll cadence and deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_wait: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_wait: Duration::from_secs(300),
        }
    }
}

impl From<&AthenaConfig> for PollConfig {
    fn from(config: &AthenaConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.poll_interval_secs),
            max_wait: Duration::from_secs(config.max_wait_secs),
        }
    }
}

/// Poll `check` until the query reaches a terminal state.
///
/// Waiting time is counted in poll intervals, so the deadline does not
/// depend on how long each status call takes. Errors from `check` are
/// returned as-is.
pub async fn wait_for_completion<F, Fut>(config: &PollConfig, mut check: F) -> Result<(), ContractError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<QueryStatus, ContractError>>,
{
    let mut waited = Duration::ZERO;

    loop {
        let status = check().await?;
        trace!(?status, waited_ms = waited.as_millis() as u64, "Query status");

        match status {
            QueryStatus::Succeeded => {
                debug!(waited_ms = waited.as_millis() as u64, "Query succeeded");
                return Ok(());
            }
            QueryStatus::Failed { reason } => {
                return Err(ContractError::QueryFailed {
                    state: "failed".to_string(),
                    reason,
                });
            }
            QueryStatus::Cancelled { reason } => {
                return Err(ContractError::QueryFailed {
                    state: "cancelled".to_string(),
                    reason,
                });
            }
            QueryStatus::Queued | QueryStatus::Running => {
                if waited >= config.max_wait {
                    return Err(ContractError::QueryTimeout {
                        waited_secs: config.max_wait.as_secs(),
                    });
                }
                tokio::time::sleep(config.interval).await;
                waited += config.interval;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast() -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(1),
            max_wait: Duration::from_millis(5),
        }
    }

    #[tokio::test]
    async fn test_succeeds_after_running() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let result = wait_for_completion(&fast(), move || async move {
            match calls.fetch_add(1, Ordering::SeqCst) {
                0 => Ok(QueryStatus::Queued),
                1 => Ok(QueryStatus::Running),
                _ => Ok(QueryStatus::Succeeded),
            }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_failed_carries_reason() {
        let err = wait_for_completion(&fast(), || async {
            Ok(QueryStatus::Failed {
                reason: "SYNTAX_ERROR: line 1".into(),
            })
        })
        .await
        .unwrap_err();

        match err {
            ContractError::QueryFailed { state, reason } => {
                assert_eq!(state, "failed");
                assert!(reason.contains("SYNTAX_ERROR"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_cancelled() {
        let err = wait_for_completion(&fast(), || async {
            Ok(QueryStatus::Cancelled {
                reason: "Unknown error".into(),
            })
        })
        .await
        .unwrap_err();
        assert!(matches!(err, ContractError::QueryFailed { ref state, .. } if state == "cancelled"));
    }

    #[tokio::test]
    async fn test_times_out() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let config = PollConfig {
            interval: Duration::from_millis(1),
            max_wait: Duration::from_millis(3),
        };
        let err = wait_for_completion(&config, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(QueryStatus::Running)
        })
        .await
        .unwrap_err();

        assert!(matches!(err, ContractError::QueryTimeout { .. }));
        // one check per interval plus the final one at the deadline
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_status_error_propagates() {
        let err = wait_for_completion(&fast(), || async {
            Err(ContractError::transient("throttled"))
        })
        .await
        .unwrap_err();
        assert!(err.is_retryable());
    }
}
