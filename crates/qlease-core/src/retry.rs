//! Failure classification and backoff.

use std::future::Future;
use std::time::Duration;

use crate::error::{Error, ErrorSignal};

/// The queue operation that produced a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Resolve,
    Send,
    Receive,
    Acknowledge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Disposition {
    /// Safe to retry after a backoff.
    Transient,
    /// Surface to the caller immediately.
    Fatal,
}

/// Classifies a broker failure for a given operation.
///
/// Receiving, acknowledging and resolving never change queue contents in a
/// way a repeat could corrupt, so unrecognised failures are retried for them.
/// A repeated send may enqueue a duplicate, so only failures known to be
/// transport-level are transient for sends.
pub fn classify(operation: Operation, signal: &ErrorSignal) -> Disposition {
    match signal {
        ErrorSignal::Timeout | ErrorSignal::Throttled | ErrorSignal::Unavailable => {
            Disposition::Transient
        }
        ErrorSignal::Other => match operation {
            Operation::Send => Disposition::Fatal,
            Operation::Resolve | Operation::Receive | Operation::Acknowledge => {
                Disposition::Transient
            }
        },
        ErrorSignal::QueueNotFound
        | ErrorSignal::PayloadTooLarge
        | ErrorSignal::InvalidHandle
        | ErrorSignal::Unauthorized
        | ErrorSignal::InvalidArgument => Disposition::Fatal,
    }
}

/// Exponential backoff for transient failures.
///
/// Sends are not retried unless `retry_sends` is set, since a send that
/// timed out may still have been stored by the broker.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
    pub retry_sends: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
            retry_sends: false,
        }
    }
}

impl RetryPolicy {
    /// Never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    /// Opt into retrying sends, accepting possible duplicate delivery.
    pub fn retry_sends(mut self, retry_sends: bool) -> Self {
        self.retry_sends = retry_sends;
        self
    }

    /// Delay before attempt number `attempt + 1`, where `attempt` starts at 1.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let delay = self.initial_backoff.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::try_from_secs_f64(delay.clamp(0.0, self.max_backoff.as_secs_f64()))
            .unwrap_or(self.max_backoff)
    }

    fn should_retry(&self, operation: Operation, err: &Error, attempt: u32) -> bool {
        if attempt >= self.max_attempts || !err.is_transient() {
            return false;
        }
        operation != Operation::Send || self.retry_sends
    }

    /// Runs `f` until it succeeds, fails fatally, or attempts run out.
    pub async fn run<T, F, Fut>(&self, operation: Operation, mut f: F) -> Result<T, Error>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let mut attempt = 1;
        loop {
            match f().await {
                Ok(value) => return Ok(value),
                Err(err) if self.should_retry(operation, &err, attempt) => {
                    let delay = self.backoff(attempt);
                    log::warn!(
                        "{operation:?} attempt {attempt}/{} failed, retrying in {delay:?}: {err}",
                        self.max_attempts
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
    use crate::error::BrokerError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn transport_failures_are_transient_everywhere() {
        for op in [
            Operation::Resolve,
            Operation::Send,
            Operation::Receive,
            Operation::Acknowledge,
        ] {
            for signal in [
                ErrorSignal::Timeout,
                ErrorSignal::Throttled,
                ErrorSignal::Unavailable,
            ] {
                assert_eq!(classify(op, &signal), Disposition::Transient);
            }
        }
    }

    #[test]
    fn request_failures_are_fatal() {
        for signal in [
            ErrorSignal::QueueNotFound,
            ErrorSignal::PayloadTooLarge,
            ErrorSignal::Unauthorized,
            ErrorSignal::InvalidArgument,
            ErrorSignal::InvalidHandle,
        ] {
            assert_eq!(classify(Operation::Receive, &signal), Disposition::Fatal);
            assert_eq!(classify(Operation::Send, &signal), Disposition::Fatal);
        }
    }

    #[test]
    fn unknown_failures_depend_on_operation() {
        assert_eq!(
            classify(Operation::Send, &ErrorSignal::Other),
            Disposition::Fatal
        );
        assert_eq!(
            classify(Operation::Receive, &ErrorSignal::Other),
            Disposition::Transient
        );
    }

    #[test]
    fn backoff_grows_and_caps() {
        let policy = RetryPolicy::default()
            .with_backoff(Duration::from_millis(100), Duration::from_millis(500));
        assert_eq!(policy.backoff(1), Duration::from_millis(100));
        assert_eq!(policy.backoff(2), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(400));
        assert_eq!(policy.backoff(4), Duration::from_millis(500));
    }

    #[test]
    fn odd_multipliers_never_panic() {
        let mut policy = RetryPolicy::default()
            .with_backoff(Duration::from_millis(100), Duration::from_millis(500));

        policy.multiplier = -2.0;
        assert_eq!(policy.backoff(2), Duration::ZERO);
        assert_eq!(policy.backoff(3), Duration::from_millis(400));

        policy.multiplier = f64::NAN;
        assert_eq!(policy.backoff(2), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_receive_failures() {
        let calls = &AtomicU32::new(0);
        let result = RetryPolicy::default()
            .run(Operation::Receive, || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(Error::ReceiveFailed(BrokerError::new(
                        ErrorSignal::Throttled,
                        "slow down",
                    )))
                } else {
                    Ok(7)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), Error> = RetryPolicy::default()
            .with_max_attempts(3)
            .run(Operation::Acknowledge, || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::AcknowledgeFailed(BrokerError::new(
                    ErrorSignal::Timeout,
                    "no answer",
                )))
            })
            .await;

        assert!(matches!(result, Err(Error::AcknowledgeFailed(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn sends_are_not_retried_unless_opted_in() {
        let calls = &AtomicU32::new(0);
        let failing = || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(Error::SendFailed(BrokerError::new(
                ErrorSignal::Timeout,
                "no answer",
            )))
        };

        let _ = RetryPolicy::default().run(Operation::Send, failing).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        calls.store(0, Ordering::SeqCst);
        let _ = RetryPolicy::default()
            .with_max_attempts(2)
            .retry_sends(true)
            .run(Operation::Send, failing)
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_errors_return_immediately() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), Error> = RetryPolicy::default()
            .run(Operation::Acknowledge, || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::HandleInvalid("gone".into()))
            })
            .await;

        assert!(result.unwrap_err().is_stale_handle());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
