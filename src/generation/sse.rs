//! Server-sent events parsing
//!
//! Splits a byte stream into SSE event blocks and forwards the joined
//! `data:` payload of each block.

use bytes::Bytes;
use futures::Stream;
use tokio::sync::mpsc;

/// Parse an SSE byte stream and forward complete `data:` payloads
///
/// Intended to run inside a spawned task. Returns when the stream ends,
/// a transport error occurs (forwarded as `Err`), or the receiver is
/// dropped.
///
/// # Arguments
///
/// * `byte_stream` - The raw HTTP response body as a stream of byte chunks.
/// * `data_tx` - Channel receiving each event's data, or the transport error.
pub async fn parse_sse_stream(
    byte_stream: impl Stream<Item = reqwest::Result<Bytes>>,
    data_tx: mpsc::Sender<std::result::Result<String, String>>,
) {
    use futures::StreamExt;

    // Raw text accumulated between `\n\n` boundaries; bytes are kept until
    // they form valid UTF-8 so multi-byte characters split across chunks
    // survive.
    let mut pending: Vec<u8> = Vec::new();
    let mut buffer = String::new();

    tokio::pin!(byte_stream);

    loop {
        // A dropped receiver ends the parse without waiting for more bytes,
        // which drops the response body.
        let chunk_result = tokio::select! {
            biased;
            _ = data_tx.closed() => return,
            next = byte_stream.next() => match next {
                Some(result) => result,
                None => break,
            },
        };
        let chunk = match chunk_result {
            Ok(c) => c,
            Err(e) => {
                let _ = data_tx.send(Err(e.to_string())).await;
                return;
            }
        };

        pending.extend_from_slice(&chunk);
        match std::str::from_utf8(&pending) {
            Ok(text) => {
                buffer.push_str(text);
                pending.clear();
            }
            Err(e) => {
                let valid = e.valid_up_to();
                buffer.push_str(&String::from_utf8_lossy(&pending[..valid]));
                // An incomplete trailing sequence waits for the next chunk;
                // genuinely invalid bytes are dropped.
                let consumed = valid + e.error_len().unwrap_or(0);
                pending.drain(..consumed);
            }
        }

        // Normalize CRLF so block splitting works for both line endings.
        if buffer.contains('\r') {
            buffer = buffer.replace("\r\n", "\n");
        }

        while let Some(pos) = buffer.find("\n\n") {
            let event_block = buffer[..pos].to_string();
            buffer = buffer[pos + 2..].to_string();
            if let Some(data) = event_data(&event_block) {
                if data_tx.send(Ok(data)).await.is_err() {
                    return;
                }
            }
        }
    }

    if let Some(data) = event_data(&buffer) {
        let _ = data_tx.send(Ok(data)).await;
    }
}

/// Extract the joined `data:` lines of one event block
///
/// Comment lines (`:`) and other fields are ignored. Returns `None` for
/// blocks without data.
pub fn event_data(event_block: &str) -> Option<String> {
    let data_lines: Vec<&str> = event_block
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|value| value.strip_prefix(' ').unwrap_or(value))
        .collect();

    if data_lines.is_empty() {
        return None;
    }

    let data = data_lines.join("\n");
    if data.trim().is_empty() {
        None
    } else {
        Some(data)
    }
}
