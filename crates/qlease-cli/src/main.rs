use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use qlease::{ClientConfig, QueueClient, QueueRef, SqsBroker};

mod consume;
mod reader;
mod send;

const LOCALSTACK_ENDPOINT: &str = "http://localhost:4566";

#[tokio::main]
pub async fn main() {
    env_logger::init();

    if let Err(e) = Cli::parse().run().await {
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
}

#[derive(Debug, Parser)]
#[command(name = "qlease")]
#[command(about = "send, lease and acknowledge SQS messages", long_about = None)]
pub struct Cli {
    /// Name of the queue
    #[arg(short, long, env = "SQS_QUEUE_NAME", global = true)]
    queue: Option<String>,

    /// AWS region (defaults to the SDK's region provider chain)
    #[arg(long, env = "SQS_AWS_REGION", global = true)]
    region: Option<String>,

    /// Endpoint override, e.g. a LocalStack URL
    #[arg(long, env = "SQS_ENDPOINT", global = true)]
    endpoint: Option<String>,

    /// Talk to LocalStack with static test credentials
    #[arg(long, global = true)]
    local: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Send BODY, or every non-empty line of stdin when BODY is omitted
    Send { body: Option<String> },
    /// Lease messages and print them as JSON lines without acknowledging
    Receive {
        /// Maximum number of messages (1-10)
        #[arg(short = 'n', long, default_value_t = 10)]
        max: u8,
        /// How long, in seconds, the messages are hidden from others
        #[arg(short = 't', long, default_value_t = 5)]
        timeout: u64,
    },
    /// Lease messages, print each one, then acknowledge it
    Drain {
        /// How long, in seconds, the messages are hidden from others
        #[arg(short = 't', long, default_value_t = 5)]
        timeout: u64,
    },
    /// Acknowledge (delete) a message by receipt handle
    Ack { handle: String },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let queue_name = non_empty(self.queue.as_deref())
            .context("You must supply the name of a queue (--queue or SQS_QUEUE_NAME)")?
            .to_string();

        let client = QueueClient::connect(self.client_config())
            .await
            .context("failed to connect to the queue service")?;
        let queue = client
            .resolve(&queue_name)
            .await
            .with_context(|| format!("failed to resolve queue `{queue_name}`"))?;

        self.command.run(&client, &queue).await
    }

    fn client_config(&self) -> ClientConfig {
        let endpoint = non_empty(self.endpoint.as_deref());
        let mut config = if self.local {
            ClientConfig::local(endpoint.unwrap_or(LOCALSTACK_ENDPOINT))
        } else {
            let config = ClientConfig::default();
            match endpoint {
                Some(endpoint) => config.with_endpoint(endpoint),
                None => config,
            }
        };

        if let Some(region) = non_empty(self.region.as_deref()) {
            config = config.with_region(region);
        }
        config
    }
}

impl Commands {
    async fn run(self, client: &QueueClient<SqsBroker>, queue: &QueueRef) -> anyhow::Result<()> {
        match self {
            Commands::Send { body: Some(body) } => send::one(client, queue, &body).await,
            Commands::Send { body: None } => send::stdin(client, queue).await,
            Commands::Receive { max, timeout } => {
                consume::receive(client, queue, max, Duration::from_secs(timeout)).await
            }
            Commands::Drain { timeout } => {
                consume::drain(client, queue, Duration::from_secs(timeout)).await
            }
            Commands::Ack { handle } => consume::ack(client, queue, &handle).await,
        }
    }
}

/// Empty environment variables count as unset.
fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_flag_defaults_to_localstack() {
        let cli = Cli::parse_from(["qlease", "--local", "--queue", "demo", "ack", "h"]);
        let config = cli.client_config();
        assert_eq!(config.endpoint.as_deref(), Some(LOCALSTACK_ENDPOINT));
        assert!(config.credentials.is_some());
    }

    #[test]
    fn explicit_endpoint_and_region_are_used() {
        let cli = Cli::parse_from([
            "qlease",
            "--endpoint",
            "http://localhost:9324",
            "--region",
            "eu-west-1",
            "receive",
        ]);
        let config = cli.client_config();
        assert_eq!(config.endpoint.as_deref(), Some("http://localhost:9324"));
        assert_eq!(config.region.as_deref(), Some("eu-west-1"));
        assert!(config.credentials.is_none());
    }

    #[test]
    fn drain_timeout_defaults_to_five_seconds() {
        let cli = Cli::parse_from(["qlease", "drain"]);
        assert!(matches!(cli.command, Commands::Drain { timeout: 5 }));
    }

    #[test]
    fn blank_values_count_as_unset() {
        assert_eq!(non_empty(Some("  ")), None);
        assert_eq!(non_empty(Some("q")), Some("q"));
        assert_eq!(non_empty(None), None);
    }
}
