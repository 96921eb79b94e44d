//! Deadline enforcement for outbound operations

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::config::TimeoutConfig;
use super::error::TimeoutError;

/// Bound how long the caller waits for `f`.
///
/// `f`'s future is spawned as a detached task and raced against `timeout` and
/// the cancellation of `parent`. Its own result is returned verbatim when it
/// finishes first. Otherwise a [`TimeoutError`] is returned and the task is
/// left running; its eventual result is discarded. Use
/// [`with_cooperative_timeout`] when the operation should be told to stop.
///
/// A panic inside the operation is resumed on the caller.
pub async fn with_timeout<F, Fut, T, E>(
    parent: &CancellationToken,
    operation: &str,
    timeout: Duration,
    f: F,
) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: From<TimeoutError> + Display + Send + 'static,
{
    debug!(%operation, ?timeout, "Starting operation with timeout");
    let task = tokio::spawn(f());

    tokio::select! {
        joined = task => match joined {
            Ok(Ok(value)) => {
                debug!(%operation, "Operation completed successfully");
                Ok(value)
            }
            Ok(Err(e)) => {
                error!(%operation, error = %e, "Operation failed");
                Err(e)
            }
            Err(join_err) if join_err.is_panic() => std::panic::resume_unwind(join_err.into_panic()),
            Err(_) => {
                warn!(%operation, "Operation task aborted");
                Err(TimeoutError::Cancelled {
                    operation: operation.to_string(),
                    timeout,
                }
                .into())
            }
        },
        _ = tokio::time::sleep(timeout) => {
            error!(%operation, ?timeout, "Operation timed out");
            Err(TimeoutError::Elapsed {
                operation: operation.to_string(),
                timeout,
            }
            .into())
        }
        _ = parent.cancelled() => {
            warn!(%operation, ?timeout, "Operation abandoned: parent cancelled");
            Err(TimeoutError::Cancelled {
                operation: operation.to_string(),
                timeout,
            }
            .into())
        }
    }
}

/// Like [`with_timeout`], but `f` receives a token that is cancelled once the
/// caller stops waiting (deadline, parent cancellation, or completion).
///
/// Operations that observe the token stop promptly instead of running on in
/// the background.
pub async fn with_cooperative_timeout<F, Fut, T, E>(
    parent: &CancellationToken,
    operation: &str,
    timeout: Duration,
    f: F,
) -> Result<T, E>
where
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: From<TimeoutError> + Display + Send + 'static,
{
    let token = parent.child_token();
    let _guard = token.clone().drop_guard();
    with_timeout(parent, operation, timeout, || f(token)).await
}

/// Applies the configured per-class deadlines
#[derive(Debug, Clone, Default)]
pub struct TimeoutEnforcer {
    config: TimeoutConfig,
}

impl TimeoutEnforcer {
    pub fn new(config: TimeoutConfig) -> Self {
        debug!(?config, "TimeoutEnforcer::new: called");
        Self { config }
    }

    pub fn config(&self) -> &TimeoutConfig {
        &self.config
    }

    /// Run `f` under an explicit deadline; see [`with_timeout`]
    pub async fn with_timeout<F, Fut, T, E>(
        &self,
        parent: &CancellationToken,
        operation: &str,
        timeout: Duration,
        f: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: From<TimeoutError> + Display + Send + 'static,
    {
        with_timeout(parent, operation, timeout, f).await
    }

    /// Run a discovery operation under the discovery deadline
    pub async fn with_discovery_timeout<F, Fut, T, E>(&self, parent: &CancellationToken, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: From<TimeoutError> + Display + Send + 'static,
    {
        with_timeout(parent, "discovery", self.config.discovery(), f).await
    }

    /// Run a property read under the property-get deadline
    pub async fn with_property_get_timeout<F, Fut, T, E>(&self, parent: &CancellationToken, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: From<TimeoutError> + Display + Send + 'static,
    {
        with_timeout(parent, "property_get", self.config.property_get(), f).await
    }

    /// Run a property write under the property-set deadline
    pub async fn with_property_set_timeout<F, Fut, T, E>(&self, parent: &CancellationToken, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: From<TimeoutError> + Display + Send + 'static,
    {
        with_timeout(parent, "property_set", self.config.property_set(), f).await
    }

    /// Run a full property refresh under the property-update deadline
    pub async fn with_property_update_timeout<F, Fut, T, E>(&self, parent: &CancellationToken, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: From<TimeoutError> + Display + Send + 'static,
    {
        with_timeout(parent, "property_update", self.config.property_update(), f).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use thiserror::Error;
    use tokio::time::Instant;

    #[derive(Debug, PartialEq, Error)]
    enum DeviceError {
        #[error("device refused request: {0}")]
        Refused(u8),

        #[error(transparent)]
        Timeout(#[from] TimeoutError),
    }

    fn fuse_tripped() -> bool {
        true
    }

    fn short_config() -> TimeoutConfig {
        TimeoutConfig {
            discovery_ms: 100,
            property_get_ms: 100,
            property_set_ms: 100,
            property_update_ms: 100,
        }
    }

    #[tokio::test]
    async fn test_success_returns_value() {
        let parent = CancellationToken::new();
        let result: Result<u32, DeviceError> =
            with_timeout(&parent, "test", Duration::from_secs(1), || async { Ok(42) }).await;
        assert_eq!(result, Ok(42));
    }

    #[tokio::test]
    async fn test_operation_error_propagated_verbatim() {
        let parent = CancellationToken::new();
        let result: Result<(), DeviceError> =
            with_timeout(&parent, "test", Duration::from_secs(1), || async { Err(DeviceError::Refused(0x71)) }).await;
        assert_eq!(result, Err(DeviceError::Refused(0x71)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_bounds_wait() {
        let parent = CancellationToken::new();
        let start = Instant::now();

        let result: Result<(), DeviceError> = with_timeout(&parent, "test", Duration::from_millis(100), || async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(())
        })
        .await;

        let waited = start.elapsed();
        assert!(waited >= Duration::from_millis(100) && waited < Duration::from_millis(150));
        assert_eq!(
            result,
            Err(DeviceError::Timeout(TimeoutError::Elapsed {
                operation: "test".to_string(),
                timeout: Duration::from_millis(100),
            }))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_operation_keeps_running() {
        let parent = CancellationToken::new();
        let finished = Arc::new(AtomicBool::new(false));
        let flag = finished.clone();

        let result: Result<(), DeviceError> = with_timeout(&parent, "slow", Duration::from_millis(50), || async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            flag.store(true, Ordering::SeqCst);
            Ok(())
        })
        .await;

        assert!(result.is_err());
        assert!(!finished.load(Ordering::SeqCst));

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(finished.load(Ordering::SeqCst), "detached operation should run to completion");
    }

    #[tokio::test(start_paused = true)]
    async fn test_parent_cancellation_stops_waiting() {
        let parent = CancellationToken::new();
        let canceller = parent.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let result: Result<(), DeviceError> = with_timeout(&parent, "test", Duration::from_secs(5), || async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        })
        .await;

        match result {
            Err(DeviceError::Timeout(err)) => assert!(!err.is_elapsed()),
            other => panic!("expected cancellation, got {:?}", other),
        }
    }

    #[tokio::test]
    #[should_panic(expected = "probe exploded")]
    async fn test_panic_is_resumed() {
        let parent = CancellationToken::new();
        let _: Result<(), DeviceError> = with_timeout(&parent, "test", Duration::from_secs(1), || async {
            if fuse_tripped() {
                panic!("probe exploded");
            }
            Ok(())
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooperative_token_cancelled_on_deadline() {
        let parent = CancellationToken::new();
        let observed = Arc::new(AtomicBool::new(false));
        let flag = observed.clone();

        let result: Result<(), DeviceError> =
            with_cooperative_timeout(&parent, "coop", Duration::from_millis(50), |token| async move {
                token.cancelled().await;
                flag.store(true, Ordering::SeqCst);
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(DeviceError::Timeout(TimeoutError::Elapsed { .. }))));
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(observed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_eyre_report_downcasts_to_timeout() {
        let enforcer = TimeoutEnforcer::new(short_config());
        let parent = CancellationToken::new();

        let err = enforcer
            .with_property_get_timeout(&parent, || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, eyre::Report>(())
            })
            .await
            .unwrap_err();

        let timeout = err.downcast_ref::<TimeoutError>().expect("timeout error");
        assert_eq!(timeout.operation(), "property_get");
        assert_eq!(timeout.timeout(), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_named_wrappers_use_configured_deadlines() {
        let enforcer = TimeoutEnforcer::new(TimeoutConfig {
            discovery_ms: 10,
            property_get_ms: 20,
            property_set_ms: 30,
            property_update_ms: 40,
        });
        let parent = CancellationToken::new();
        let slow = || async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok::<(), DeviceError>(())
        };

        let errors = [
            enforcer.with_discovery_timeout(&parent, slow).await,
            enforcer.with_property_get_timeout(&parent, slow).await,
            enforcer.with_property_set_timeout(&parent, slow).await,
            enforcer.with_property_update_timeout(&parent, slow).await,
        ];

        let seen: Vec<_> = errors
            .into_iter()
            .map(|r| match r {
                Err(DeviceError::Timeout(e)) => (e.operation().to_string(), e.timeout().as_millis()),
                other => panic!("expected timeout, got {:?}", other),
            })
            .collect();

        assert_eq!(
            seen,
            vec![
                ("discovery".to_string(), 10),
                ("property_get".to_string(), 20),
                ("property_set".to_string(), 30),
                ("property_update".to_string(), 40),
            ]
        );
    }

    #[tokio::test]
    async fn test_discovery_wrapper_runs_operation() {
        let enforcer = TimeoutEnforcer::default();
        let parent = CancellationToken::new();
        let called = Arc::new(AtomicBool::new(false));
        let flag = called.clone();

        let result = enforcer
            .with_discovery_timeout(&parent, || async move {
                flag.store(true, Ordering::SeqCst);
                Ok::<_, DeviceError>(())
            })
            .await;

        assert!(result.is_ok());
        assert!(called.load(Ordering::SeqCst));
    }
}
