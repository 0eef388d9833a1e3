//! # qlease
//!
//! Lease-based, at-least-once messaging against SQS-style queues.
//!
//! A message is sent, then received under a lease (a visibility timeout)
//! that hides it from other consumers, and finally acknowledged (deleted).
//! A message whose lease lapses before acknowledgement is delivered again
//! with a new receipt handle, so a crash between receive and acknowledge
//! never loses it.
//!
//! ## Components
//!
//! - **[`Producer`]**: sends one message and returns its broker id
//! - **[`Consumer`]**: leases a batch of messages
//! - **[`Acknowledger`]**: deletes a message by receipt handle
//! - **[`retry`]**: classifies failures as transient or fatal, with backoff
//! - **[`Broker`]**: the wire seam, implemented by [`SqsBroker`] and
//!   [`MemoryBroker`]
//!
//! ## Example
//!
//! ```no_run
//! use std::time::Duration;
//! use qlease::{ClientConfig, QueueClient};
//!
//! # async fn example() -> Result<(), qlease::Error> {
//! let config = ClientConfig::default().with_region("us-east-1");
//! let client = QueueClient::connect(config).await?;
//! let queue = client.resolve("orders").await?;
//!
//! let consumer = client.consumer();
//! let acknowledger = client.acknowledger();
//! for message in consumer.receive(&queue, 10, Duration::from_secs(30)).await? {
//!     // process, then acknowledge; on failure just skip and let the lease lapse
//!     acknowledger.acknowledge(&queue, &message.receipt_handle).await?;
//! }
//! # Ok(())
//! # }
//! ```

mod acknowledger;
mod broker;
mod client;
pub mod codec;
mod config;
mod consumer;
mod error;
pub mod memory;
mod message;
mod producer;
mod queue;
pub mod retry;
pub mod sqs;

pub use acknowledger::Acknowledger;
pub use broker::{Broker, ReceiveRequest};
pub use client::QueueClient;
pub use config::{ClientConfig, StaticCredentials, DEFAULT_MAX_PAYLOAD_BYTES};
pub use consumer::{Consumer, MAX_BATCH_SIZE, MAX_VISIBILITY_TIMEOUT};
pub use error::{BrokerError, Error, ErrorSignal};
pub use memory::MemoryBroker;
pub use message::*;
pub use producer::Producer;
pub use queue::QueueRef;
pub use retry::{classify, Disposition, Operation, RetryPolicy};
pub use sqs::SqsBroker;
