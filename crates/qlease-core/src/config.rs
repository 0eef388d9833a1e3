//! Client configuration.

use std::time::Duration;

use crate::error::Error;
use crate::message::SENT_TIMESTAMP;

/// Largest message the SQS API accepts, in bytes.
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 262_144;

/// Static credentials, mostly useful against LocalStack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl StaticCredentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
        }
    }
}

/// Everything a [`QueueClient`](crate::QueueClient) needs to talk to a broker.
///
/// Built explicitly by the caller; nothing here is read from the process
/// environment.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use qlease::ClientConfig;
///
/// let config = ClientConfig::default()
///     .with_region("eu-west-1")
///     .with_endpoint("http://localhost:4566")
///     .with_default_visibility_timeout(Duration::from_secs(5));
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Endpoint override, e.g. a LocalStack URL.
    pub endpoint: Option<String>,
    /// Region; when unset the SDK's provider chain decides.
    pub region: Option<String>,
    pub default_visibility_timeout: Duration,
    pub max_payload_bytes: usize,
    /// Broker attributes requested on every receive.
    pub attribute_names: Vec<String>,
    pub credentials: Option<StaticCredentials>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            region: None,
            default_visibility_timeout: Duration::from_secs(30),
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            attribute_names: vec![SENT_TIMESTAMP.to_string()],
            credentials: None,
        }
    }
}

impl ClientConfig {
    /// Configuration for a LocalStack instance at `endpoint`.
    pub fn local(endpoint: impl Into<String>) -> Self {
        Self::default()
            .with_endpoint(endpoint)
            .with_region("us-east-1")
            .with_credentials(StaticCredentials::new("test", "test"))
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_default_visibility_timeout(mut self, timeout: Duration) -> Self {
        self.default_visibility_timeout = timeout;
        self
    }

    pub fn with_max_payload_bytes(mut self, max_payload_bytes: usize) -> Self {
        self.max_payload_bytes = max_payload_bytes;
        self
    }

    pub fn with_attribute_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attribute_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_credentials(mut self, credentials: StaticCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn validate(&self) -> Result<(), Error> {
        if let Some(endpoint) = &self.endpoint {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                return Err(Error::Config(format!(
                    "endpoint `{endpoint}` must start with http:// or https://"
                )));
            }
        }
        if matches!(&self.region, Some(region) if region.trim().is_empty()) {
            return Err(Error::Config("region must not be empty".into()));
        }
        if self.default_visibility_timeout.is_zero() {
            return Err(Error::Config(
                "default visibility timeout must be positive".into(),
            ));
        }
        if self.max_payload_bytes == 0 {
            return Err(Error::Config("max payload size must be positive".into()));
        }
        Ok(())
    }
}
