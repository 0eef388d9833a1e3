//! Error types for queue operations.
//!
//! Every failure reported by a broker is normalised into a [`BrokerError`]
//! carrying an [`ErrorSignal`]. The component operations wrap that cause in
//! the matching [`Error`] variant, and [`Error::disposition`] runs it through
//! the retry classifier.

use std::fmt;

use crate::retry::{classify, Disposition, Operation};

/// Broker-independent description of what went wrong on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorSignal {
    /// The request did not complete in time.
    Timeout,
    /// The broker rejected the request because of rate limits.
    Throttled,
    /// The broker could not be reached or failed internally.
    Unavailable,
    /// The queue does not exist.
    QueueNotFound,
    /// The broker rejected the payload size.
    PayloadTooLarge,
    /// The receipt handle is unknown, stale, or malformed.
    InvalidHandle,
    /// Credentials were rejected.
    Unauthorized,
    /// The request itself was malformed.
    InvalidArgument,
    /// Anything the mapping does not recognise.
    Other,
}

impl fmt::Display for ErrorSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorSignal::Timeout => "timeout",
            ErrorSignal::Throttled => "throttled",
            ErrorSignal::Unavailable => "unavailable",
            ErrorSignal::QueueNotFound => "queue not found",
            ErrorSignal::PayloadTooLarge => "payload too large",
            ErrorSignal::InvalidHandle => "invalid receipt handle",
            ErrorSignal::Unauthorized => "unauthorized",
            ErrorSignal::InvalidArgument => "invalid argument",
            ErrorSignal::Other => "other",
        };
        f.write_str(name)
    }
}

/// A failure reported by a [`Broker`](crate::Broker) implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{signal}: {message}")]
pub struct BrokerError {
    pub signal: ErrorSignal,
    /// Broker-specific error code, when the broker supplied one.
    pub code: Option<String>,
    pub message: String,
}

impl BrokerError {
    pub fn new(signal: ErrorSignal, message: impl Into<String>) -> Self {
        Self {
            signal,
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("queue not found: {0}")]
    QueueNotFound(String),

    /// `limit` is `None` when the broker rejected the payload without
    /// the client knowing the limit it enforces.
    #[error("payload of {size} bytes exceeds {}", describe_limit(.limit))]
    PayloadTooLarge { size: usize, limit: Option<usize> },

    #[error("message body is empty")]
    EmptyBody,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("receipt handle is no longer valid: {0}")]
    HandleInvalid(String),

    #[error("failed to resolve queue")]
    ResolveFailed(#[source] BrokerError),

    #[error("failed to send message")]
    SendFailed(#[source] BrokerError),

    #[error("failed to receive messages")]
    ReceiveFailed(#[source] BrokerError),

    #[error("failed to acknowledge message")]
    AcknowledgeFailed(#[source] BrokerError),

    #[error("failed to encode or decode message body")]
    Codec(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

fn describe_limit(limit: &Option<usize>) -> String {
    match limit {
        Some(limit) => format!("the {limit} byte limit"),
        None => "the broker's limit".to_string(),
    }
}

impl Error {
    /// The broker failure behind this error, if any.
    pub fn cause(&self) -> Option<&BrokerError> {
        match self {
            Error::ResolveFailed(cause)
            | Error::SendFailed(cause)
            | Error::ReceiveFailed(cause)
            | Error::AcknowledgeFailed(cause) => Some(cause),
            _ => None,
        }
    }

    /// Whether retrying the failed operation can succeed.
    ///
    /// Errors detected locally are always fatal: repeating the same call
    /// produces the same answer.
    pub fn disposition(&self) -> Disposition {
        match self {
            Error::ResolveFailed(cause) => classify(Operation::Resolve, &cause.signal),
            Error::SendFailed(cause) => classify(Operation::Send, &cause.signal),
            Error::ReceiveFailed(cause) => classify(Operation::Receive, &cause.signal),
            Error::AcknowledgeFailed(cause) => classify(Operation::Acknowledge, &cause.signal),
            _ => Disposition::Fatal,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.disposition() == Disposition::Transient
    }

    /// True when an acknowledgement failed because its lease is gone.
    ///
    /// A consumption loop treats this as "no longer actionable" and moves on.
    pub fn is_stale_handle(&self) -> bool {
        matches!(self, Error::HandleInvalid(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_errors_are_fatal() {
        assert_eq!(Error::EmptyBody.disposition(), Disposition::Fatal);
        assert_eq!(
            Error::PayloadTooLarge {
                size: 300_000,
                limit: Some(262_144)
            }
            .disposition(),
            Disposition::Fatal
        );
        assert_eq!(
            Error::QueueNotFound("orders".into()).disposition(),
            Disposition::Fatal
        );
    }

    #[test]
    fn wrapped_errors_follow_the_classifier() {
        let throttled = BrokerError::new(ErrorSignal::Throttled, "slow down");
        assert!(Error::ReceiveFailed(throttled.clone()).is_transient());
        assert!(Error::SendFailed(throttled).is_transient());

        let unknown = BrokerError::new(ErrorSignal::Other, "???");
        assert!(Error::AcknowledgeFailed(unknown.clone()).is_transient());
        assert!(!Error::SendFailed(unknown).is_transient());
    }

    #[test]
    fn stale_handle_is_recognised() {
        assert!(Error::HandleInvalid("abc".into()).is_stale_handle());
        assert!(!Error::EmptyBody.is_stale_handle());
    }

    #[test]
    fn broker_error_display_includes_signal() {
        let err = BrokerError::new(ErrorSignal::Timeout, "no answer").with_code("RequestTimeout");
        assert_eq!(err.to_string(), "timeout: no answer");
        assert_eq!(err.code.as_deref(), Some("RequestTimeout"));
    }
}
