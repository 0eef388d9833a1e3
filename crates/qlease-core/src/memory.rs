//! In-process [`Broker`] with a manual clock.
//!
//! Time only moves when [`MemoryBroker::advance`] is called, which makes
//! lease expiry and redelivery deterministic. Useful for tests of
//! consumption loops and for running the components without a network.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::broker::{Broker, ReceiveRequest};
use crate::config::DEFAULT_MAX_PAYLOAD_BYTES;
use crate::error::{BrokerError, ErrorSignal};
use crate::message::{
    payload_size, AttributeValue, Attributes, Message, MessageId, ReceiptHandle,
    APPROXIMATE_RECEIVE_COUNT, SENT_TIMESTAMP,
};

const URL_PREFIX: &str = "memory://queues/";

/// How many acknowledged handles each queue remembers for repeated acks.
const ACKNOWLEDGED_WINDOW: usize = 1024;

/// Cheap to clone; clones share the same queues and clock.
#[derive(Clone, Debug)]
pub struct MemoryBroker {
    state: Arc<Mutex<State>>,
}

#[derive(Debug)]
struct State {
    now: DateTime<Utc>,
    max_payload_bytes: usize,
    next_id: u64,
    queues: HashMap<String, MemoryQueue>,
}

#[derive(Debug, Default)]
struct MemoryQueue {
    visible: VecDeque<Stored>,
    in_flight: HashMap<String, Lease>,
    /// What happened to handles that are no longer active. Expired handles
    /// live as long as their message; acknowledged ones within
    /// `ACKNOWLEDGED_WINDOW`.
    retired: HashMap<String, Retired>,
    acknowledged: VecDeque<String>,
}

#[derive(Debug, Clone)]
struct Stored {
    id: MessageId,
    body: String,
    attributes: Attributes,
    sent_at: DateTime<Utc>,
    receive_count: u32,
}

#[derive(Debug)]
struct Lease {
    message: Stored,
    deadline: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Retired {
    Acknowledged,
    Expired(MessageId),
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBroker {
    /// A broker whose clock starts at the current wall-clock time.
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    pub fn starting_at(now: DateTime<Utc>) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                now,
                max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
                next_id: 0,
                queues: HashMap::new(),
            })),
        }
    }

    /// Sets the size limit the broker enforces on sends.
    pub async fn set_max_payload_bytes(&self, max_payload_bytes: usize) {
        self.state.lock().await.max_payload_bytes = max_payload_bytes;
    }

    /// Creates `name` if it does not exist and returns its URL.
    pub async fn create_queue(&self, name: &str) -> String {
        let url = format!("{URL_PREFIX}{name}");
        self.state
            .lock()
            .await
            .queues
            .entry(url.clone())
            .or_default();
        url
    }

    pub async fn now(&self) -> DateTime<Utc> {
        self.state.lock().await.now
    }

    /// Moves the clock forward.
    pub async fn advance(&self, by: Duration) {
        let mut state = self.state.lock().await;
        if let Some(next) = chrono::Duration::from_std(by)
            .ok()
            .and_then(|by| state.now.checked_add_signed(by))
        {
            state.now = next;
        }
    }

    /// Messages currently available to a receive, counting lapsed leases.
    pub async fn visible_len(&self, queue_url: &str) -> usize {
        let state = self.state.lock().await;
        state.queues.get(queue_url).map_or(0, |queue| {
            let lapsed = queue
                .in_flight
                .values()
                .filter(|lease| lease.deadline <= state.now)
                .count();
            queue.visible.len() + lapsed
        })
    }

    /// Messages under an active lease.
    pub async fn in_flight_len(&self, queue_url: &str) -> usize {
        let state = self.state.lock().await;
        state.queues.get(queue_url).map_or(0, |queue| {
            queue
                .in_flight
                .values()
                .filter(|lease| lease.deadline > state.now)
                .count()
        })
    }
}

impl MemoryQueue {
    /// Returns lapsed leases to the visible set; their handles turn stale.
    fn expire_leases(&mut self, now: DateTime<Utc>) {
        let lapsed: Vec<String> = self
            .in_flight
            .iter()
            .filter(|(_, lease)| lease.deadline <= now)
            .map(|(handle, _)| handle.clone())
            .collect();

        for handle in lapsed {
            if let Some(lease) = self.in_flight.remove(&handle) {
                self.retired
                    .insert(handle, Retired::Expired(lease.message.id.clone()));
                self.visible.push_back(lease.message);
            }
        }
    }

    /// Forgets the message behind `handle` for good.
    fn acknowledge(&mut self, handle: &str, id: &MessageId) {
        self.retired
            .retain(|_, retired| !matches!(retired, Retired::Expired(expired) if expired == id));

        self.retired.insert(handle.to_string(), Retired::Acknowledged);
        self.acknowledged.push_back(handle.to_string());
        while self.acknowledged.len() > ACKNOWLEDGED_WINDOW {
            if let Some(oldest) = self.acknowledged.pop_front() {
                self.retired.remove(&oldest);
            }
        }
    }
}

fn queue_not_found(queue_url: &str) -> BrokerError {
    BrokerError::new(
        ErrorSignal::QueueNotFound,
        format!("queue `{queue_url}` does not exist"),
    )
    .with_code("AWS.SimpleQueueService.NonExistentQueue")
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn resolve(&self, queue_name: &str) -> Result<String, BrokerError> {
        let url = format!("{URL_PREFIX}{queue_name}");
        if self.state.lock().await.queues.contains_key(&url) {
            Ok(url)
        } else {
            Err(queue_not_found(queue_name))
        }
    }

    async fn send(
        &self,
        queue_url: &str,
        body: &str,
        attributes: &Attributes,
    ) -> Result<MessageId, BrokerError> {
        let mut state = self.state.lock().await;
        let size = payload_size(body, attributes);
        if size > state.max_payload_bytes {
            return Err(BrokerError::new(
                ErrorSignal::PayloadTooLarge,
                format!(
                    "Message must be shorter than {} bytes",
                    state.max_payload_bytes
                ),
            ));
        }

        state.next_id += 1;
        let id = MessageId::new(format!("msg-{:08}", state.next_id));
        let sent_at = state.now;
        let queue = state
            .queues
            .get_mut(queue_url)
            .ok_or_else(|| queue_not_found(queue_url))?;

        queue.visible.push_back(Stored {
            id: id.clone(),
            body: body.to_string(),
            attributes: attributes.clone(),
            sent_at,
            receive_count: 0,
        });
        Ok(id)
    }

    async fn receive(
        &self,
        queue_url: &str,
        request: &ReceiveRequest,
    ) -> Result<Vec<Message>, BrokerError> {
        let mut state = self.state.lock().await;
        let now = state.now;
        let queue = state
            .queues
            .get_mut(queue_url)
            .ok_or_else(|| queue_not_found(queue_url))?;

        queue.expire_leases(now);

        let timeout = chrono::Duration::from_std(request.visibility_timeout)
            .map_err(|e| BrokerError::new(ErrorSignal::InvalidArgument, e.to_string()))?;
        let deadline = now + timeout;
        let take = usize::from(request.max_messages).min(queue.visible.len());

        let mut batch = Vec::with_capacity(take);
        for mut stored in queue.visible.drain(..take).collect::<Vec<_>>() {
            stored.receive_count += 1;
            let handle = uuid::Uuid::new_v4().to_string();

            let mut attributes = stored.attributes.clone();
            for name in &request.attribute_names {
                let value = match name.as_str() {
                    SENT_TIMESTAMP => AttributeValue::number(stored.sent_at.timestamp_millis()),
                    APPROXIMATE_RECEIVE_COUNT => AttributeValue::number(stored.receive_count),
                    _ => continue,
                };
                attributes.insert(name.clone(), value);
            }

            batch.push(Message {
                id: stored.id.clone(),
                body: stored.body.clone(),
                attributes,
                receipt_handle: ReceiptHandle::new(handle.clone()),
                visibility_deadline: deadline,
            });
            queue.in_flight.insert(
                handle,
                Lease {
                    message: stored,
                    deadline,
                },
            );
        }

        Ok(batch)
    }

    async fn delete(
        &self,
        queue_url: &str,
        receipt_handle: &ReceiptHandle,
    ) -> Result<(), BrokerError> {
        let mut state = self.state.lock().await;
        let now = state.now;
        let queue = state
            .queues
            .get_mut(queue_url)
            .ok_or_else(|| queue_not_found(queue_url))?;

        queue.expire_leases(now);

        let handle = receipt_handle.as_str();
        if let Some(lease) = queue.in_flight.remove(handle) {
            queue.acknowledge(handle, &lease.message.id);
            return Ok(());
        }

        match queue.retired.get(handle) {
            Some(Retired::Acknowledged) => Ok(()),
            Some(Retired::Expired(_)) => Err(BrokerError::new(
                ErrorSignal::InvalidHandle,
                "the receipt handle has expired",
            )
            .with_code("ReceiptHandleIsInvalid")),
            None => Err(BrokerError::new(
                ErrorSignal::InvalidHandle,
                format!("unknown receipt handle `{handle}`"),
            )
            .with_code("ReceiptHandleIsInvalid")),
        }
    }
}
