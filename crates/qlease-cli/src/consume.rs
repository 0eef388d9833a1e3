use std::time::Duration;

use anyhow::Context;
use qlease::{
    Broker, Operation, QueueClient, QueueRef, ReceiptHandle, RetryPolicy, MAX_BATCH_SIZE,
};

/// Upper bound on receive rounds for a single `drain`.
const MAX_ROUNDS: usize = 10;

/// Leases one batch and prints it. Nothing is acknowledged, so every
/// message printed here becomes visible again once `timeout` passes.
pub async fn receive<B: Broker + Clone>(
    client: &QueueClient<B>,
    queue: &QueueRef,
    max: u8,
    timeout: Duration,
) -> anyhow::Result<()> {
    let consumer = client.consumer();
    let messages = RetryPolicy::default()
        .run(Operation::Receive, || consumer.receive(queue, max, timeout))
        .await
        .context("failed to receive messages")?;

    for message in messages {
        println!("{}", serde_json::to_string(&message)?);
    }
    Ok(())
}

/// Receives until the queue looks empty, acknowledging each message right
/// after it has been printed.
pub async fn drain<B: Broker + Clone>(
    client: &QueueClient<B>,
    queue: &QueueRef,
    timeout: Duration,
) -> anyhow::Result<()> {
    let consumer = client.consumer();
    let acknowledger = client.acknowledger();
    let retry = RetryPolicy::default();

    for _ in 0..MAX_ROUNDS {
        let messages = retry
            .run(Operation::Receive, || consumer.receive(queue, MAX_BATCH_SIZE, timeout))
            .await
            .context("failed to receive messages")?;

        if messages.is_empty() {
            return Ok(());
        }

        for message in messages {
            println!("{}", serde_json::to_string(&message)?);

            let acked = retry
                .run(Operation::Acknowledge, || {
                    acknowledger.acknowledge(queue, &message.receipt_handle)
                })
                .await;
            match acked {
                Ok(()) => println!("[DELETED] Message ID:     {}", message.id),
                Err(e) if e.is_stale_handle() => {
                    log::warn!(
                        "lease for message {} lapsed before it was acknowledged",
                        message.id
                    );
                }
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("failed to delete message {}", message.id));
                }
            }
        }
    }

    Ok(())
}

pub async fn ack<B: Broker + Clone>(
    client: &QueueClient<B>,
    queue: &QueueRef,
    handle: &str,
) -> anyhow::Result<()> {
    let handle = ReceiptHandle::new(handle);
    let acknowledger = client.acknowledger();
    RetryPolicy::default()
        .run(Operation::Acknowledge, || acknowledger.acknowledge(queue, &handle))
        .await
        .context("failed to delete the message")?;

    println!("[DELETED] Receipt handle: {handle}");
    Ok(())
}
