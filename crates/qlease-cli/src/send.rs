use anyhow::Context;
use qlease::{Broker, QueueClient, QueueRef};

use crate::reader::concurrent_lines;

pub async fn one<B: Broker + Clone>(
    client: &QueueClient<B>,
    queue: &QueueRef,
    body: &str,
) -> anyhow::Result<()> {
    let id = client
        .producer()
        .send(queue, body, None)
        .await
        .context("failed to send the message")?;

    println!("Sent message {} to queue {}", id, queue.name());
    Ok(())
}

/// Sends every non-empty stdin line as its own message.
///
/// Lines are sent one at a time and in order. A failed send stops the run;
/// lines already sent stay sent.
pub async fn stdin<B: Broker + Clone>(
    client: &QueueClient<B>,
    queue: &QueueRef,
) -> anyhow::Result<()> {
    let (h_stdin, mut rx_stdin) = concurrent_lines(tokio::io::stdin(), 100);
    let producer = client.producer();

    let mut sent = 0usize;
    while let Some(line) = rx_stdin.recv().await {
        let id = producer
            .send(queue, &line, None)
            .await
            .with_context(|| format!("failed to send line {}", sent + 1))?;
        log::info!("sent message {id}");
        sent += 1;
    }
    h_stdin.await.context("stdin reader task failed")?;

    println!("Sent {} message(s) to queue {}", sent, queue.name());
    Ok(())
}

#[cfg(test)]
mod tests {
    use qlease::{ClientConfig, MemoryBroker};

    use super::*;

    #[tokio::test]
    async fn sends_a_single_body() {
        let broker = MemoryBroker::new();
        broker.create_queue("demo").await;
        let client = QueueClient::with_broker(broker.clone(), ClientConfig::default());
        let queue = client.resolve("demo").await.unwrap();

        one(&client, &queue, r#"{"Name":"John Doe"}"#).await.unwrap();
        assert_eq!(broker.visible_len(queue.url()).await, 1);

        let err = one(&client, &queue, "").await.unwrap_err();
        assert!(format!("{err:#}").contains("message body is empty"));
    }
}
