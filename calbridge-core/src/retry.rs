//! Timeout and bounded retry for remote calls.

use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{info, warn};

use crate::error::{CalBridgeError, CalBridgeResult};

#[derive(Debug, Clone, Copy)]
pub struct RemotePolicy {
    /// Limit for a single attempt
    pub timeout: Duration,
    /// Extra attempts after the first, transient errors only
    pub max_retries: u32,
    /// Backoff before retry n is `base_delay * 2^n`
    pub base_delay: Duration,
}

impl Default for RemotePolicy {
    fn default() -> Self {
        RemotePolicy {
            timeout: Duration::from_secs(30),
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RemotePolicy {
    /// Delay before retry number `attempt`, saturating instead of overflowing.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Run `f`, bounding each attempt by the timeout and retrying transient
    /// failures with exponential backoff.
    pub async fn run<F, Fut, T>(&self, operation: &str, f: F) -> CalBridgeResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = CalBridgeResult<T>>,
    {
        let mut attempt = 0;

        loop {
            let result = match timeout(self.timeout, f()).await {
                Ok(result) => result,
                Err(_) => Err(CalBridgeError::ProviderTimeout(self.timeout.as_secs())),
            };

            match result {
                Ok(value) => {
                    if attempt > 0 {
                        info!(operation, attempt, "operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) if attempt < self.max_retries && err.is_transient() => {
                    let delay = self.backoff(attempt);
                    warn!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> RemotePolicy {
        RemotePolicy {
            timeout: Duration::from_millis(200),
            max_retries: 2,
            base_delay: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_backoff_doubles_and_saturates() {
        let policy = RemotePolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_millis(500));
        assert_eq!(policy.backoff(3), Duration::from_millis(4000));
        assert_eq!(policy.backoff(40), Duration::from_millis(500) * u32::MAX);
        assert_eq!(
            RemotePolicy {
                base_delay: Duration::MAX,
                ..policy
            }
            .backoff(2),
            Duration::MAX
        );
    }

    #[tokio::test]
    async fn test_retries_transient_errors() {
        let calls = AtomicU32::new(0);
        let result = fast_policy()
            .run("flaky", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(CalBridgeError::Transient("503".into()))
                } else {
                    Ok(7)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let result: CalBridgeResult<()> = fast_policy()
            .run("down", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(CalBridgeError::Transient("503".into()))
            })
            .await;

        assert!(result.unwrap_err().is_transient());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: CalBridgeResult<()> = fast_policy()
            .run("bad", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(CalBridgeError::Provider("400".into()))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_slow_attempts_time_out() {
        let policy = RemotePolicy {
            max_retries: 0,
            ..fast_policy()
        };
        let result: CalBridgeResult<()> = policy
            .run("slow", || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(CalBridgeError::ProviderTimeout(_))));
    }
}
