use crate::broker::Broker;
use crate::error::{Error, ErrorSignal};
use crate::message::ReceiptHandle;
use crate::queue::QueueRef;

/// Deletes messages by receipt handle.
///
/// Pass the handle from the most recent lease of a message. A handle whose
/// lease lapsed fails with [`Error::HandleInvalid`] (or, on brokers that
/// ignore stale handles, succeeds without effect); either way the newer
/// lease stays intact. Acknowledging the same handle twice is harmless.
#[derive(Debug, Clone)]
pub struct Acknowledger<B> {
    broker: B,
}

impl<B: Broker> Acknowledger<B> {
    pub fn new(broker: B) -> Self {
        Self { broker }
    }

    pub async fn acknowledge(
        &self,
        queue: &QueueRef,
        receipt_handle: &ReceiptHandle,
    ) -> Result<(), Error> {
        self.broker
            .delete(queue.url(), receipt_handle)
            .await
            .map_err(|cause| match cause.signal {
                ErrorSignal::InvalidHandle => Error::HandleInvalid(cause.message),
                ErrorSignal::QueueNotFound => Error::QueueNotFound(queue.name().to_string()),
                _ => Error::AcknowledgeFailed(cause),
            })?;

        log::debug!("acknowledged {receipt_handle} on {queue}");
        Ok(())
    }
}
