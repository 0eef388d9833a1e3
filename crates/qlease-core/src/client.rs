use crate::acknowledger::Acknowledger;
use crate::broker::Broker;
use crate::config::ClientConfig;
use crate::consumer::Consumer;
use crate::error::{Error, ErrorSignal};
use crate::producer::Producer;
use crate::queue::QueueRef;
use crate::sqs::SqsBroker;

/// Entry point: resolves queues and hands out the three components, all
/// sharing one broker connection and one [`ClientConfig`].
///
/// # Example
///
/// ```no_run
/// use qlease::{ClientConfig, QueueClient};
///
/// # async fn example() -> Result<(), qlease::Error> {
/// let client = QueueClient::connect(ClientConfig::local("http://localhost:4566")).await?;
/// let queue = client.resolve("orders").await?;
///
/// client.producer().send(&queue, r#"{"Name":"John Doe"}"#, None).await?;
///
/// for message in client.consumer().receive_default(&queue, 10).await? {
///     println!("{}", message.body);
///     client.acknowledger().acknowledge(&queue, &message.receipt_handle).await?;
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct QueueClient<B> {
    broker: B,
    config: ClientConfig,
}

impl QueueClient<SqsBroker> {
    /// Connects to SQS (or an SQS-compatible endpoint) using `config`.
    pub async fn connect(config: ClientConfig) -> Result<Self, Error> {
        let broker = SqsBroker::connect(&config).await?;
        Ok(Self { broker, config })
    }
}

impl<B: Broker + Clone> QueueClient<B> {
    pub fn with_broker(broker: B, config: ClientConfig) -> Self {
        Self { broker, config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn broker(&self) -> &B {
        &self.broker
    }

    /// Looks up the URL for `queue_name`.
    pub async fn resolve(&self, queue_name: &str) -> Result<QueueRef, Error> {
        if queue_name.trim().is_empty() {
            return Err(Error::InvalidArgument("queue name must not be empty".into()));
        }

        let url = self
            .broker
            .resolve(queue_name)
            .await
            .map_err(|cause| match cause.signal {
                ErrorSignal::QueueNotFound => Error::QueueNotFound(queue_name.to_string()),
                _ => Error::ResolveFailed(cause),
            })?;

        log::debug!("resolved queue {queue_name} to {url}");
        Ok(QueueRef::new(queue_name, url))
    }

    pub fn producer(&self) -> Producer<B> {
        Producer::new(self.broker.clone(), self.config.max_payload_bytes)
    }

    pub fn consumer(&self) -> Consumer<B> {
        Consumer::new(
            self.broker.clone(),
            self.config.default_visibility_timeout,
            self.config.attribute_names.clone(),
        )
    }

    pub fn acknowledger(&self) -> Acknowledger<B> {
        Acknowledger::new(self.broker.clone())
    }
}
