//! Lease-based receiving.
//!
//! Every message returned by [`Consumer::receive`] is leased: the broker
//! hides it from other consumers until its visibility deadline. The caller
//! either acknowledges it before then or lets the lease lapse, after which
//! the message is delivered again with a new receipt handle.
//!
//! The consumer keeps no record of what it handed out. Lease state lives in
//! the broker only, so two consumers never disagree about who holds a
//! message.
//!
//! Abandoning a `receive` future (for example on a timeout) is allowed. If
//! the broker had already granted the leases, the caller never sees their
//! handles; those messages stay hidden for one visibility window and then
//! reappear. Nothing is lost.

use std::time::Duration;

use crate::broker::{Broker, ReceiveRequest};
use crate::error::{Error, ErrorSignal};
use crate::message::Message;
use crate::queue::QueueRef;

/// Largest batch a single receive may request.
pub const MAX_BATCH_SIZE: u8 = 10;
/// Longest lease a receive may request (12 hours).
pub const MAX_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(43_200);

#[derive(Debug, Clone)]
pub struct Consumer<B> {
    broker: B,
    default_visibility_timeout: Duration,
    attribute_names: Vec<String>,
}

impl<B: Broker> Consumer<B> {
    pub fn new(
        broker: B,
        default_visibility_timeout: Duration,
        attribute_names: Vec<String>,
    ) -> Self {
        Self {
            broker,
            default_visibility_timeout,
            attribute_names,
        }
    }

    /// Leases up to `max_messages` messages for `visibility_timeout`.
    ///
    /// An empty batch means nothing was visible and is not an error. The
    /// timeout is rounded up to whole seconds.
    pub async fn receive(
        &self,
        queue: &QueueRef,
        max_messages: u8,
        visibility_timeout: Duration,
    ) -> Result<Vec<Message>, Error> {
        if !(1..=MAX_BATCH_SIZE).contains(&max_messages) {
            return Err(Error::InvalidArgument(format!(
                "max messages must be between 1 and {MAX_BATCH_SIZE}, got {max_messages}"
            )));
        }
        if visibility_timeout.is_zero() || visibility_timeout > MAX_VISIBILITY_TIMEOUT {
            return Err(Error::InvalidArgument(format!(
                "visibility timeout must be positive and at most {}s, got {visibility_timeout:?}",
                MAX_VISIBILITY_TIMEOUT.as_secs()
            )));
        }

        let request = ReceiveRequest {
            max_messages,
            visibility_timeout: round_up_to_seconds(visibility_timeout),
            attribute_names: self.attribute_names.clone(),
        };

        let messages = self
            .broker
            .receive(queue.url(), &request)
            .await
            .map_err(|cause| match cause.signal {
                ErrorSignal::QueueNotFound => Error::QueueNotFound(queue.name().to_string()),
                _ => Error::ReceiveFailed(cause),
            })?;

        log::debug!(
            "leased {} message(s) from {queue} for {}s",
            messages.len(),
            request.visibility_timeout.as_secs()
        );
        Ok(messages)
    }

    /// [`receive`](Self::receive) with the configured default lease.
    pub async fn receive_default(
        &self,
        queue: &QueueRef,
        max_messages: u8,
    ) -> Result<Vec<Message>, Error> {
        self.receive(queue, max_messages, self.default_visibility_timeout)
            .await
    }
}

fn round_up_to_seconds(timeout: Duration) -> Duration {
    let secs = timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0);
    Duration::from_secs(secs)
}
