//! [`Broker`] implementation over the AWS SQS API.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::SdkConfig;
use aws_sdk_sqs as sqs;
use chrono::{DateTime, Utc};
use sqs::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use sqs::types::{MessageAttributeValue, MessageSystemAttributeName};

use crate::broker::{Broker, ReceiveRequest};
use crate::config::ClientConfig;
use crate::error::{BrokerError, Error, ErrorSignal};
use crate::message::{AttributeValue, Attributes, Message, MessageId, ReceiptHandle};

/// SQS-backed broker.
///
/// Cheap to clone; clones share the underlying HTTP client.
///
/// SQS itself decides how a stale receipt handle is treated: depending on
/// queue type and timing a delete with an expired handle may succeed
/// without deleting anything, or fail with `ReceiptHandleIsInvalid`. It never
/// deletes a newer lease of the same message.
#[derive(Clone, Debug)]
pub struct SqsBroker {
    /// The AWS SDK configuration used for SQS operations
    pub config: SdkConfig,
    /// The SQS client instance
    pub client: sqs::Client,
}

impl SqsBroker {
    /// Creates a broker from a pre-built AWS SDK config.
    pub fn from_config(config: SdkConfig) -> Self {
        let client = sqs::Client::new(&config);
        Self { config, client }
    }

    /// Builds the SDK configuration from `config` and creates the client.
    ///
    /// Without an explicit region the SDK's provider chain is consulted,
    /// falling back to `us-east-1`.
    pub async fn connect(config: &ClientConfig) -> Result<Self, Error> {
        config.validate()?;

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        loader = match &config.region {
            Some(region) => loader.region(aws_config::Region::new(region.clone())),
            None => loader.region(
                RegionProviderChain::default_provider()
                    .or_else(aws_config::Region::from_static("us-east-1")),
            ),
        };
        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint.clone());
        }
        if let Some(credentials) = &config.credentials {
            loader = loader.credentials_provider(sqs::config::Credentials::new(
                credentials.access_key_id.clone(),
                credentials.secret_access_key.clone(),
                None,
                None,
                "static",
            ));
        }

        let sdk_config = loader.load().await;
        log::debug!(
            "connected to SQS (region: {:?}, endpoint: {:?})",
            sdk_config.region(),
            config.endpoint
        );
        Ok(Self::from_config(sdk_config))
    }
}

#[async_trait]
impl Broker for SqsBroker {
    async fn resolve(&self, queue_name: &str) -> Result<String, BrokerError> {
        let output = self
            .client
            .get_queue_url()
            .queue_name(queue_name)
            .send()
            .await
            .map_err(broker_error)?;

        output.queue_url.ok_or_else(|| {
            BrokerError::new(
                ErrorSignal::QueueNotFound,
                format!("no URL returned for queue `{queue_name}`"),
            )
        })
    }

    async fn send(
        &self,
        queue_url: &str,
        body: &str,
        attributes: &Attributes,
    ) -> Result<MessageId, BrokerError> {
        let output = self
            .client
            .send_message()
            .queue_url(queue_url)
            .message_body(body)
            .set_message_attributes(to_sqs_attributes(attributes)?)
            .send()
            .await
            .map_err(broker_error)?;

        output
            .message_id
            .map(MessageId::new)
            .ok_or_else(|| BrokerError::new(ErrorSignal::Other, "send returned no message id"))
    }

    async fn receive(
        &self,
        queue_url: &str,
        request: &ReceiveRequest,
    ) -> Result<Vec<Message>, BrokerError> {
        let timeout_secs =
            i32::try_from(request.visibility_timeout.as_secs()).unwrap_or(i32::MAX);
        // Taken before the call so the local deadline is never later than
        // the one SQS enforces.
        let deadline = Utc::now() + chrono::Duration::seconds(i64::from(timeout_secs));

        let attribute_names = request
            .attribute_names
            .iter()
            .map(|name| MessageSystemAttributeName::from(name.as_str()))
            .collect();

        let output = self
            .client
            .receive_message()
            .queue_url(queue_url)
            .max_number_of_messages(i32::from(request.max_messages))
            .visibility_timeout(timeout_secs)
            .set_message_system_attribute_names(Some(attribute_names))
            .message_attribute_names("All")
            .send()
            .await
            .map_err(broker_error)?;

        // SQS omits the list entirely when nothing was visible
        let messages = output.messages.unwrap_or_default();
        Ok(messages
            .into_iter()
            .filter_map(|m| from_sqs_message(m, deadline))
            .collect())
    }

    async fn delete(
        &self,
        queue_url: &str,
        receipt_handle: &ReceiptHandle,
    ) -> Result<(), BrokerError> {
        self.client
            .delete_message()
            .queue_url(queue_url)
            .receipt_handle(receipt_handle.as_str())
            .send()
            .await
            .map_err(broker_error)?;
        Ok(())
    }
}

fn to_sqs_attributes(
    attributes: &Attributes,
) -> Result<Option<HashMap<String, MessageAttributeValue>>, BrokerError> {
    if attributes.is_empty() {
        return Ok(None);
    }

    attributes
        .iter()
        .map(|(name, value)| {
            MessageAttributeValue::builder()
                .data_type(value.data_type())
                .string_value(value.as_str())
                .build()
                .map(|built| (name.clone(), built))
                .map_err(|e| BrokerError::new(ErrorSignal::InvalidArgument, e.to_string()))
        })
        .collect::<Result<HashMap<_, _>, _>>()
        .map(Some)
}

/// Converts an SQS message, dropping records that could never be acknowledged.
fn from_sqs_message(message: sqs::types::Message, deadline: DateTime<Utc>) -> Option<Message> {
    let (Some(id), Some(receipt_handle)) = (message.message_id, message.receipt_handle) else {
        log::warn!("skipping SQS message without id or receipt handle; its lease will lapse");
        return None;
    };

    let mut attributes = Attributes::new();
    for (name, value) in message.attributes.unwrap_or_default() {
        let value = if value.parse::<i64>().is_ok() {
            AttributeValue::Number(value)
        } else {
            AttributeValue::String(value)
        };
        attributes.insert(name.as_str().to_string(), value);
    }
    for (name, value) in message.message_attributes.unwrap_or_default() {
        let Some(text) = value.string_value else {
            // binary attributes are not carried
            continue;
        };
        let value = if value.data_type.starts_with("Number") {
            AttributeValue::Number(text)
        } else {
            AttributeValue::String(text)
        };
        attributes.insert(name, value);
    }

    Some(Message {
        id: MessageId::new(id),
        body: message.body.unwrap_or_default(),
        attributes,
        receipt_handle: ReceiptHandle::new(receipt_handle),
        visibility_deadline: deadline,
    })
}

fn broker_error<E, R>(err: SdkError<E, R>) -> BrokerError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug,
{
    let message = DisplayErrorContext(&err).to_string();
    let signal = match &err {
        SdkError::TimeoutError(_) => ErrorSignal::Timeout,
        SdkError::DispatchFailure(failure) if failure.is_timeout() => ErrorSignal::Timeout,
        SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => ErrorSignal::Unavailable,
        SdkError::ConstructionFailure(_) => ErrorSignal::InvalidArgument,
        _ => signal_for(err.code().unwrap_or_default(), err.message().unwrap_or_default()),
    };

    let broker_error = BrokerError::new(signal, message);
    match err.code() {
        Some(code) => broker_error.with_code(code),
        None => broker_error,
    }
}

/// Maps an SQS error code (and, where SQS overloads a code, its message)
/// onto an [`ErrorSignal`].
fn signal_for(code: &str, message: &str) -> ErrorSignal {
    let message = message.to_ascii_lowercase();
    match code {
        "AWS.SimpleQueueService.NonExistentQueue" | "QueueDoesNotExist" => {
            ErrorSignal::QueueNotFound
        }
        "ReceiptHandleIsInvalid" | "InvalidIdFormat" => ErrorSignal::InvalidHandle,
        "InvalidParameterValue" if message.contains("receipt handle") => {
            ErrorSignal::InvalidHandle
        }
        "InvalidParameterValue" if message.contains("must be shorter than") => {
            ErrorSignal::PayloadTooLarge
        }
        "InvalidParameterValue"
        | "MissingParameter"
        | "InvalidAttributeName"
        | "InvalidAttributeValue"
        | "InvalidMessageContents"
        | "InvalidAddress"
        | "UnsupportedOperation" => ErrorSignal::InvalidArgument,
        "ThrottlingException" | "Throttling" | "RequestThrottled" | "OverLimit"
        | "KmsThrottled" => ErrorSignal::Throttled,
        "AccessDenied"
        | "AccessDeniedException"
        | "InvalidClientTokenId"
        | "UnrecognizedClientException"
        | "InvalidSecurity"
        | "SignatureDoesNotMatch"
        | "ExpiredToken"
        | "MissingAuthenticationToken" => ErrorSignal::Unauthorized,
        "RequestTimeout" => ErrorSignal::Timeout,
        "ServiceUnavailable" | "InternalError" | "InternalFailure" => ErrorSignal::Unavailable,
        _ => ErrorSignal::Other,
    }
}
