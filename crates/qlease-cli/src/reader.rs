/// Spawns a task that reads lines from `reader` and forwards the non-empty
/// ones over a bounded channel.
///
/// Trailing `\r` is stripped so CRLF input produces the same message bodies
/// as LF input. Blank lines are skipped because a queue rejects empty
/// bodies.
///
/// # Returns
/// A tuple of:
/// - `JoinHandle<()>`: handle to the reader task. It finishes at EOF, on an
///   I/O error (which is logged), or once the receiver is dropped.
/// - `mpsc::Receiver<String>`: the lines, without line terminators.
pub fn concurrent_lines<R: tokio::io::AsyncRead + Unpin + Send + 'static>(
    reader: R,
    channel_capacity: usize,
) -> (
    tokio::task::JoinHandle<()>,
    tokio::sync::mpsc::Receiver<String>,
) {
    use tokio::io::{AsyncBufReadExt, BufReader};

    let (tx, rx) = tokio::sync::mpsc::channel::<String>(channel_capacity);
    let buffer = BufReader::new(reader);

    let task = tokio::spawn(async move {
        let mut lines = buffer.lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line = line.strip_suffix('\r').unwrap_or(&line);
                    if line.trim().is_empty() {
                        continue;
                    }
                    if tx.send(line.to_string()).await.is_err() {
                        log::debug!("line receiver dropped, stopping reader");
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    log::error!("I/O error while reading lines: {e}. Stopping reader.");
                    break;
                }
            }
        }
    });

    (task, rx)
}
