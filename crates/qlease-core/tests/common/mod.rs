#![allow(dead_code)]

use std::time::Duration;

use qlease::{ClientConfig, MemoryBroker, QueueClient, QueueRef};
use testcontainers::ContainerAsync;
use testcontainers_modules::{
    localstack::LocalStack,
    testcontainers::{runners::AsyncRunner, ImageExt, TestcontainersError},
};

pub const VISIBILITY: Duration = Duration::from_secs(5);

/// A client over a fresh in-memory broker with one queue named `name`.
pub async fn memory_client(name: &str) -> (MemoryBroker, QueueClient<MemoryBroker>, QueueRef) {
    let _ = env_logger::builder().is_test(true).try_init();

    let broker = MemoryBroker::new();
    broker.create_queue(name).await;
    let config = ClientConfig::default()
        .with_default_visibility_timeout(VISIBILITY)
        .with_attribute_names(["SentTimestamp", "ApproximateReceiveCount"]);
    let client = QueueClient::with_broker(broker.clone(), config);
    let queue = client.resolve(name).await.unwrap();
    (broker, client, queue)
}

pub async fn localstack() -> Result<(String, ContainerAsync<LocalStack>), TestcontainersError> {
    let request = LocalStack::default()
        .with_tag("latest")
        .with_env_var("SERVICES", "sqs")
        .with_env_var("SKIP_SSL_CERT_DOWNLOAD", "1");
    let container = request.start().await?;

    let host_ip = container.get_host().await?;
    let host_port = container.get_host_port_ipv4(4566).await?;
    let endpoint_url = format!("http://{host_ip}:{host_port}");

    Ok((endpoint_url, container))
}

pub async fn create_test_queue(
    container: &ContainerAsync<LocalStack>,
    name: &str,
) -> Result<(), TestcontainersError> {
    let create_queue_command = testcontainers::core::ExecCommand::new([
        "awslocal",
        "sqs",
        "create-queue",
        "--queue-name",
        name,
    ])
    .with_container_ready_conditions(vec![testcontainers::core::WaitFor::message_on_stdout(
        "AWS sqs.CreateQueue => 200",
    )]);

    container.exec(create_queue_command).await?;
    Ok(())
}

/// Resolves `name`, retrying while LocalStack catches up with the create.
pub async fn resolve_with_retry(
    client: &QueueClient<qlease::SqsBroker>,
    name: &str,
) -> QueueRef {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            match client.resolve(name).await {
                Ok(queue) => return queue,
                Err(_) => tokio::time::sleep(Duration::from_millis(100)).await,
            }
        }
    })
    .await
    .expect("timeout waiting for queue to be available")
}
