//! The wire-protocol seam between the components and a queue service.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::BrokerError;
use crate::message::{Attributes, Message, MessageId, ReceiptHandle};

/// Parameters of one receive round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveRequest {
    pub max_messages: u8,
    pub visibility_timeout: Duration,
    /// Broker attributes to populate on each returned message.
    pub attribute_names: Vec<String>,
}

/// A queue service reachable over some transport.
///
/// Each method is exactly one request/response round trip. Implementations
/// hold no lease state of their own: lease exclusivity, expiry and
/// redelivery are the service's job. Returned messages carry their receipt
/// handle and the deadline of the lease just granted.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Maps a logical queue name to the URL used by the other calls.
    async fn resolve(&self, queue_name: &str) -> Result<String, BrokerError>;

    async fn send(
        &self,
        queue_url: &str,
        body: &str,
        attributes: &Attributes,
    ) -> Result<MessageId, BrokerError>;

    async fn receive(
        &self,
        queue_url: &str,
        request: &ReceiveRequest,
    ) -> Result<Vec<Message>, BrokerError>;

    async fn delete(
        &self,
        queue_url: &str,
        receipt_handle: &ReceiptHandle,
    ) -> Result<(), BrokerError>;
}
