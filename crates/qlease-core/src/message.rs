//! Message types shared by every component.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::de::DeserializeOwned;

use crate::error::Error;

/// Broker attribute carrying the send time in epoch milliseconds.
pub const SENT_TIMESTAMP: &str = "SentTimestamp";
/// Broker attribute carrying the number of times a message was received.
pub const APPROXIMATE_RECEIVE_COUNT: &str = "ApproximateReceiveCount";

/// Broker-assigned message identifier.
///
/// Only meaningful for logging and correlation. Acknowledgement always goes
/// through a [`ReceiptHandle`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque token for one lease of one message.
///
/// A redelivered message comes back with a new handle; the old one is stale.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ReceiptHandle(String);

impl ReceiptHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReceiptHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Message attribute value. Numbers keep the broker's decimal text form.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum AttributeValue {
    String(String),
    Number(String),
}

impl AttributeValue {
    pub fn string(value: impl Into<String>) -> Self {
        AttributeValue::String(value.into())
    }

    pub fn number(value: impl fmt::Display) -> Self {
        AttributeValue::Number(value.to_string())
    }

    /// Wire data type name.
    pub fn data_type(&self) -> &'static str {
        match self {
            AttributeValue::String(_) => "String",
            AttributeValue::Number(_) => "Number",
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            AttributeValue::String(value) | AttributeValue::Number(value) => value,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttributeValue::Number(value) => value.parse().ok(),
            AttributeValue::String(_) => None,
        }
    }
}

pub type Attributes = HashMap<String, AttributeValue>;

/// Size the broker charges for a message: body plus each attribute's name,
/// data type and value.
pub fn payload_size(body: &str, attributes: &Attributes) -> usize {
    body.len()
        + attributes
            .iter()
            .map(|(name, value)| name.len() + value.data_type().len() + value.as_str().len())
            .sum::<usize>()
}

/// A message leased by a receive call.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Message {
    pub id: MessageId,
    pub body: String,
    pub attributes: Attributes,
    pub receipt_handle: ReceiptHandle,
    /// After this instant the message may be delivered again unless
    /// acknowledged.
    pub visibility_deadline: DateTime<Utc>,
}

impl Message {
    /// Decodes the body with the JSON codec.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, Error> {
        crate::codec::decode(&self.body)
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    pub fn sent_timestamp(&self) -> Option<DateTime<Utc>> {
        let millis = self.attribute(SENT_TIMESTAMP)?.as_i64()?;
        Utc.timestamp_millis_opt(millis).single()
    }

    pub fn receive_count(&self) -> Option<u32> {
        self.attribute(APPROXIMATE_RECEIVE_COUNT)?
            .as_i64()
            .and_then(|count| u32::try_from(count).ok())
    }

    /// Whether the lease has lapsed at `now`.
    pub fn lease_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.visibility_deadline
    }
}
