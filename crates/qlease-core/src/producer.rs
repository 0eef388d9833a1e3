use serde::Serialize;

use crate::broker::Broker;
use crate::codec;
use crate::error::{Error, ErrorSignal};
use crate::message::{payload_size, Attributes, MessageId};
use crate::queue::QueueRef;

/// Sends single messages.
///
/// A failed send is never retried here. Wrap calls in a
/// [`RetryPolicy`](crate::RetryPolicy) with `retry_sends` set to accept the
/// duplicates a blind retry can cause.
#[derive(Debug, Clone)]
pub struct Producer<B> {
    broker: B,
    max_payload_bytes: usize,
}

impl<B: Broker> Producer<B> {
    pub fn new(broker: B, max_payload_bytes: usize) -> Self {
        Self {
            broker,
            max_payload_bytes,
        }
    }

    /// Sends an already-encoded body and returns the broker-assigned id.
    pub async fn send(
        &self,
        queue: &QueueRef,
        body: &str,
        attributes: Option<&Attributes>,
    ) -> Result<MessageId, Error> {
        if body.is_empty() {
            return Err(Error::EmptyBody);
        }

        let empty = Attributes::new();
        let attributes = attributes.unwrap_or(&empty);
        let size = payload_size(body, attributes);
        if size > self.max_payload_bytes {
            return Err(Error::PayloadTooLarge {
                size,
                limit: Some(self.max_payload_bytes),
            });
        }

        let id = self
            .broker
            .send(queue.url(), body, attributes)
            .await
            .map_err(|cause| match cause.signal {
                ErrorSignal::QueueNotFound => Error::QueueNotFound(queue.name().to_string()),
                ErrorSignal::PayloadTooLarge => {
                    log::debug!("broker rejected {size} byte payload: {cause}");
                    Error::PayloadTooLarge { size, limit: None }
                }
                _ => Error::SendFailed(cause),
            })?;

        log::debug!("sent message {id} to {queue} ({size} bytes)");
        Ok(id)
    }

    /// Encodes `value` with the JSON codec and sends it.
    pub async fn send_json<T: Serialize + ?Sized>(
        &self,
        queue: &QueueRef,
        value: &T,
        attributes: Option<&Attributes>,
    ) -> Result<MessageId, Error> {
        let body = codec::encode(value)?;
        self.send(queue, &body, attributes).await
    }
}
