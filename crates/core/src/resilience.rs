use crate::reserve::ReserveSetter;
use crate::time::Sleeper;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

/// Attempts left for one wrapped call. Lives only as long as that call.
#[derive(Debug)]
pub struct RetryBudget {
    attempts_made: u32,
    max_attempts: u32,
    delay: Duration,
}

impl RetryBudget {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            attempts_made: 0,
            max_attempts: policy.max_attempts.max(1),
            delay: policy.delay,
        }
    }

    pub fn attempts_made(&self) -> u32 {
        self.attempts_made
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    fn record_failure(&mut self) {
        self.attempts_made += 1;
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts_made >= self.max_attempts
    }
}

/// Every attempt failed.
#[derive(Debug)]
pub struct Exhausted {
    pub attempts: u32,
    pub last_error: anyhow::Error,
}

/// Runs `op` until it succeeds or the budget runs out, sleeping `delay`
/// between failed attempts.
pub async fn retry<T, F, Fut>(
    label: &str,
    policy: RetryPolicy,
    sleeper: &dyn Sleeper,
    mut op: F,
) -> Result<T, Exhausted>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let mut budget = RetryBudget::new(policy);
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(err) => {
                budget.record_failure();
                tracing::error!(
                    target_name = label,
                    attempt = budget.attempts_made(),
                    max_attempts = budget.max_attempts(),
                    error = %err,
                    "{label} failed"
                );
                if budget.is_exhausted() {
                    return Err(Exhausted {
                        attempts: budget.attempts_made(),
                        last_error: err,
                    });
                }
                sleeper.sleep(budget.delay()).await;
            }
        }
    }
}

/// Runs a single fallible call. On error the failure is logged with
/// `error_msg`, the caller is held back for `delay`, and `None` comes back
/// instead of an error.
pub async fn attempt<T, Fut>(
    fut: Fut,
    error_msg: &str,
    delay: Duration,
    sleeper: &dyn Sleeper,
) -> Option<T>
where
    Fut: Future<Output = anyhow::Result<T>>,
{
    match fut.await {
        Ok(v) => Some(v),
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), ?delay, "{error_msg}");
            sleeper.sleep(delay).await;
            None
        }
    }
}

/// A dependency stayed unavailable after every retry. The reserve has been
/// forced to its maximum; the process must stop.
#[derive(Debug, Clone)]
pub struct FatalError {
    pub dependency: String,
    pub attempts: u32,
    pub detail: String,
}

impl fmt::Display for FatalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} unavailable after {} attempts: {}",
            self.dependency, self.attempts, self.detail
        )
    }
}

impl std::error::Error for FatalError {}

/// Guards a dependency the loop cannot run safely without.
#[derive(Clone)]
pub struct ResilientDataSource {
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    fallback: ReserveSetter,
}

impl ResilientDataSource {
    pub fn new(policy: RetryPolicy, sleeper: Arc<dyn Sleeper>, fallback: ReserveSetter) -> Self {
        Self {
            policy,
            sleeper,
            fallback,
        }
    }

    /// Probes the dependency until it answers. When the budget runs out the
    /// reserve is forced to 100% once and a [`FatalError`] is returned.
    pub async fn ensure_available<F, Fut>(&self, dependency: &str, probe: F) -> Result<(), FatalError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        match retry(dependency, self.policy, self.sleeper.as_ref(), probe).await {
            Ok(()) => {
                tracing::debug!(dependency, "dependency available");
                Ok(())
            }
            Err(exhausted) => {
                // The setter logs its own failure; nothing more can be done here.
                let _ = self.fallback.fail_safe().await;
                tracing::error!(
                    dependency,
                    attempts = exhausted.attempts,
                    "system failure, review other logs; backup reserve manually overridden to 100%"
                );
                Err(FatalError {
                    dependency: dependency.to_string(),
                    attempts: exhausted.attempts,
                    detail: format!("{:#}", exhausted.last_error),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeBattery, RecordingSleeper};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            delay: Duration::from_secs(12),
        }
    }

    #[tokio::test]
    async fn retry_returns_first_success() {
        let sleeper = RecordingSleeper::default();
        let calls = &AtomicU32::new(0);

        let out = retry("probe", policy(5), &sleeper, move || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                anyhow::bail!("down (call {n})");
            }
            Ok(n)
        })
        .await
        .unwrap();

        assert_eq!(out, 3);
        assert_eq!(sleeper.sleeps(), vec![Duration::from_secs(12); 2]);
    }

    #[tokio::test]
    async fn ensure_available_exhausts_then_forces_full_reserve_once() {
        let battery = Arc::new(FakeBattery::new(40));
        let sleeper = Arc::new(RecordingSleeper::default());
        let source = ResilientDataSource::new(
            policy(4),
            sleeper.clone(),
            ReserveSetter::new(battery.clone(), 20),
        );
        let calls = &AtomicU32::new(0);

        let err = source
            .ensure_available("database", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(anyhow::anyhow!("connection refused"))
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(err.attempts, 4);
        assert_eq!(err.dependency, "database");
        assert!(err.detail.contains("connection refused"));
        // Sleeps only between attempts.
        assert_eq!(sleeper.sleeps(), vec![Duration::from_secs(12); 3]);
        assert_eq!(battery.writes(), vec![100]);
    }

    #[tokio::test]
    async fn ensure_available_recovers_without_fallback() {
        let battery = Arc::new(FakeBattery::new(40));
        let sleeper = Arc::new(RecordingSleeper::default());
        let source = ResilientDataSource::new(
            policy(30),
            sleeper.clone(),
            ReserveSetter::new(battery.clone(), 20),
        );
        let calls = &AtomicU32::new(0);

        source
            .ensure_available("database", move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    anyhow::bail!("timeout");
                }
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(sleeper.sleeps().len(), 1);
        assert!(battery.writes().is_empty());
    }

    #[tokio::test]
    async fn attempt_swallows_errors_after_cooldown() {
        let sleeper = RecordingSleeper::default();

        let ok = attempt(async { Ok(7) }, "unused", Duration::from_secs(300), &sleeper).await;
        assert_eq!(ok, Some(7));
        assert!(sleeper.sleeps().is_empty());

        let missing: Option<i32> = attempt(
            async { Err(anyhow::anyhow!("weather API 503")) },
            "error fetching forecast",
            Duration::from_secs(300),
            &sleeper,
        )
        .await;
        assert_eq!(missing, None);
        assert_eq!(sleeper.sleeps(), vec![Duration::from_secs(300)]);
    }
}
