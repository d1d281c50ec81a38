//! Poll-until-converged primitives
//!
//! The single generic building block behind every "wait for the cloud to
//! settle" step: instance status, volume status, snapshot status, and
//! attachment read-back confirmation all go through [`wait_for_status`].
//!
//! Failure semantics: a transport error from the fetch aborts immediately
//! (retries belong to the transport decorator in `stratoform-api`); deadline
//! expiry produces a distinct [`ComputeError::Timeout`] carrying the last
//! observed status for diagnostics.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{ComputeError, Result};

/// Deadline shared by every poll within one resource operation
///
/// Multi-step flows (a transition walk, an operation list) create one of
/// these at entry and feed [`OperationDeadline::remaining`] into each wait,
/// so the whole operation is bounded by a single budget instead of each
/// step receiving a fresh timeout.
#[derive(Debug, Clone, Copy)]
pub struct OperationDeadline {
    at: Instant,
}

impl OperationDeadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
        }
    }

    /// Budget left; zero once the deadline has passed
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }
}

/// Repeatedly fetch an object and extract its status until the status lands
/// in `accepted`, returning the last fetched object.
///
/// The sleep between fetches is clamped to the remaining deadline, so a
/// deadline shorter than the interval still expires on time.
pub async fn wait_for_status<T, S, F, Fut, X>(
    waiting_for: &str,
    mut fetch: F,
    status_of: X,
    accepted: &[S],
    interval: Duration,
    timeout: Duration,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = stratoform_api::Result<T>>,
    X: Fn(&T) -> S,
    S: PartialEq + Display,
{
    let deadline = Instant::now() + timeout;
    loop {
        let observed = fetch().await?;
        let status = status_of(&observed);
        if accepted.iter().any(|s| *s == status) {
            return Ok(observed);
        }
        tracing::debug!("{}: status {}, not settled yet", waiting_for, status);

        let now = Instant::now();
        if now >= deadline {
            return Err(ComputeError::Timeout {
                waiting_for: waiting_for.to_string(),
                waited: timeout,
                last_status: Some(status.to_string()),
            });
        }
        tokio::time::sleep(interval.min(deadline - now)).await;
    }
}

/// Poll until the fetch reports not-found, i.e. the resource is gone.
///
/// Used after deletion calls; the resource is considered destroyed only once
/// an existence check comes back 404.
pub async fn wait_for_gone<T, F, Fut>(
    waiting_for: &str,
    mut fetch: F,
    interval: Duration,
    timeout: Duration,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = stratoform_api::Result<T>>,
{
    let deadline = Instant::now() + timeout;
    loop {
        match fetch().await {
            Ok(_) => {}
            Err(err) if err.is_not_found() => return Ok(()),
            Err(err) => return Err(err.into()),
        }
        tracing::debug!("{}: still present", waiting_for);

        let now = Instant::now();
        if now >= deadline {
            return Err(ComputeError::Timeout {
                waiting_for: waiting_for.to_string(),
                waited: timeout,
                last_status: Some("present".to_string()),
            });
        }
        tokio::time::sleep(interval.min(deadline - now)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use stratoform_api::ApiError;

    #[tokio::test]
    async fn test_returns_once_status_accepted() {
        let calls = AtomicU32::new(0);
        let result = wait_for_status(
            "test object",
            || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Ok(if n < 2 { "creating" } else { "available" })
            },
            |s: &&str| s.to_string(),
            &["available".to_string()],
            Duration::from_millis(1),
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        assert_eq!(result, "available");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_transport_error_aborts_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = wait_for_status(
            "test object",
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ApiError::Api {
                    status: 500,
                    message: "boom".to_string(),
                })
            },
            |_: &()| "n/a".to_string(),
            &["done".to_string()],
            Duration::from_millis(1),
            Duration::from_secs(5),
        )
        .await;

        assert!(matches!(result, Err(ComputeError::Api(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_beats_interval() {
        // 2s interval, 1s deadline: the sleep is clamped, so the timeout
        // fires after ~1s rather than after a full interval.
        let started = Instant::now();
        let result = wait_for_status(
            "stuck object",
            || async { Ok("creating") },
            |s: &&str| s.to_string(),
            &["available".to_string()],
            Duration::from_secs(2),
            Duration::from_secs(1),
        )
        .await;

        let waited = started.elapsed();
        match result {
            Err(ComputeError::Timeout { last_status, .. }) => {
                assert_eq!(last_status.as_deref(), Some("creating"));
            }
            other => panic!("expected timeout, got {:?}", other.map(|_| ())),
        }
        assert!(waited >= Duration::from_secs(1));
        assert!(waited < Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_budget_saturates_at_zero() {
        let deadline = OperationDeadline::after(Duration::from_millis(100));
        assert!(deadline.remaining() > Duration::ZERO);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(deadline.remaining(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_wait_for_gone_tolerates_presence_then_404() {
        let calls = AtomicU32::new(0);
        wait_for_gone(
            "instance i-1",
            || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    Ok("still here")
                } else {
                    Err(ApiError::NotFound {
                        resource: "instance",
                        id: "i-1".to_string(),
                    })
                }
            },
            Duration::from_millis(1),
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_wait_for_gone_propagates_other_errors() {
        let result = wait_for_gone(
            "instance i-1",
            || async {
                Err::<(), _>(ApiError::Auth("token expired".to_string()))
            },
            Duration::from_millis(1),
            Duration::from_secs(5),
        )
        .await;

        assert!(matches!(result, Err(ComputeError::Api(ApiError::Auth(_)))));
    }
}
