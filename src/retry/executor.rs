use std::future::Future;
use tokio::time::sleep;
use tracing::debug;

use crate::errors::GatewayError;
use crate::retry::cancel::CancelSignal;
use crate::retry::policy::RetryPolicy;

// -----------------------------------------------------------------------------
// ----- run_with_retry --------------------------------------------------------

/// Drive `operation` (called with the 1-based attempt number) under `policy`.
///
/// - success returns immediately;
/// - an error `is_retryable` rejects is returned as-is, without sleeping;
/// - a retryable error on the last attempt becomes `RetriesExhausted`;
/// - a triggered `cancel` stops before the next attempt, including mid-backoff.
pub async fn run_with_retry<T, F, Fut, P>(
    mut operation: F,
    policy: &RetryPolicy,
    is_retryable: P,
    cancel: Option<&CancelSignal>,
) -> Result<T, GatewayError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, GatewayError>>,
    P: Fn(&GatewayError) -> bool,
{
    let mut attempt = 1;

    loop {
        if cancel.is_some_and(CancelSignal::is_cancelled) {
            return Err(cancelled(attempt));
        }

        let err = match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !is_retryable(&err) {
            return Err(err);
        }

        if attempt >= policy.max_attempts() {
            return Err(GatewayError::retries_exhausted(attempt, err));
        }

        let delay = policy.delay_before(attempt + 1);
        debug!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "retryable failure; backing off"
        );

        match cancel {
            Some(cancel) => {
                tokio::select! {
                    _ = sleep(delay) => {}
                    _ = cancel.cancelled() => return Err(cancelled(attempt + 1)),
                }
            }
            None => sleep(delay).await,
        }

        attempt += 1;
    }
}

fn cancelled(next_attempt: u32) -> GatewayError {
    GatewayError::cancelled(format!(
        "call abandoned before attempt {next_attempt}"
    ))
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use parking_lot::Mutex;
    use std::time::{Duration, Instant};

    fn policy(max_attempts: u32, base_ms: u64) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(base_ms), 2.0).unwrap()
    }

    #[tokio::test]
    async fn transport_errors_exhaust_with_backoff() {
        let calls = Mutex::new(Vec::<Instant>::new());

        let result: Result<(), _> = run_with_retry(
            |_| {
                calls.lock().push(Instant::now());
                async { Err(GatewayError::transport("network unreachable")) }
            },
            &policy(3, 100),
            GatewayError::is_transient,
            None,
        )
        .await;

        let calls = calls.into_inner();
        assert_eq!(calls.len(), 3);
        assert!(calls[1] - calls[0] >= Duration::from_millis(100));
        assert!(calls[2] - calls[1] >= Duration::from_millis(200));

        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RetriesExhausted);
        let GatewayError::RetriesExhausted { attempts, last, .. } = err else {
            unreachable!();
        };
        assert_eq!(attempts, 3);
        assert_eq!(last.kind(), ErrorKind::Transport);
    }

    #[tokio::test]
    async fn fatal_errors_are_not_retried() {
        for fatal in [
            GatewayError::validation("amount must be positive"),
            GatewayError::authentication("not logged in"),
            GatewayError::rate_limited("k", Duration::from_secs(1)),
        ] {
            let mut calls = 0;
            let started = Instant::now();

            let result: Result<(), _> = run_with_retry(
                |_| {
                    calls += 1;
                    let fatal = fatal.clone();
                    async move { Err(fatal) }
                },
                &policy(5, 500),
                GatewayError::is_transient,
                None,
            )
            .await;

            assert_eq!(calls, 1);
            assert!(started.elapsed() < Duration::from_millis(400));
            assert_eq!(result.unwrap_err(), fatal);
        }
    }

    #[tokio::test]
    async fn recovers_after_transient_failure() {
        let result = run_with_retry(
            |attempt| async move {
                if attempt < 2 {
                    Err(GatewayError::remote("canister busy", Some("IC0503".into()), true))
                } else {
                    Ok(attempt)
                }
            },
            &policy(3, 10),
            GatewayError::is_transient,
            None,
        )
        .await;

        assert_eq!(result.unwrap(), 2);
    }

    #[tokio::test]
    async fn single_attempt_policy_exhausts_immediately() {
        let result: Result<(), _> = run_with_retry(
            |_| async { Err(GatewayError::transport("timeout")) },
            &RetryPolicy::no_retry(),
            GatewayError::is_transient,
            None,
        )
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RetriesExhausted);
    }

    #[tokio::test]
    async fn cancel_interrupts_backoff() {
        let signal = CancelSignal::new();
        let trigger = signal.clone();
        let mut calls = 0;

        tokio::spawn(async move {
            sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let result: Result<(), _> = run_with_retry(
            |_| {
                calls += 1;
                async { Err(GatewayError::transport("timeout")) }
            },
            &policy(5, 10_000),
            GatewayError::is_transient,
            Some(&signal),
        )
        .await;

        assert_eq!(calls, 1);
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Cancelled);
    }

    #[tokio::test]
    async fn cancelled_before_start_makes_no_attempt() {
        let signal = CancelSignal::new();
        signal.cancel();
        let mut calls = 0;

        let result: Result<(), _> = run_with_retry(
            |_| {
                calls += 1;
                async { Ok(()) }
            },
            &policy(3, 10),
            GatewayError::is_transient,
            Some(&signal),
        )
        .await;

        assert_eq!(calls, 0);
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Cancelled);
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
