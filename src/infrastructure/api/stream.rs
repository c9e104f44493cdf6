#[cfg(test)]
#[path = "stream_test.rs"]
mod tests;

use std::sync::Arc;

use futures::stream::TryStreamExt;
use serde_derive::Deserialize;
use serde_derive::Serialize;
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;

use super::TransportClient;
use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::ApiError;
use crate::domain::models::StreamEvent;

fn convert_err(err: reqwest::Error) -> std::io::Error {
    let err_msg = err.to_string();
    return std::io::Error::new(std::io::ErrorKind::Interrupted, err_msg);
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct FragmentPayload {
    content: String,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct SendRequest {
    message: String,
    session_id: String,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct SendResponse {
    content: String,
}

/// Cancels the channel it came from. Safe to call any number of times and
/// after the stream has already finished on its own.
pub struct StreamHandle {
    token: CancellationToken,
}

impl StreamHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }
}

/// Opens one live server-to-client event channel per reply. The server emits
/// default events whose payload is `{"content": "<fragment>"}`, then a named
/// `done` event. No reconnection is attempted on error; a fresh send opens a
/// fresh channel.
pub struct StreamClient {
    base_url: String,
    transport: Arc<TransportClient>,
}

impl StreamClient {
    pub fn from_config(transport: Arc<TransportClient>) -> StreamClient {
        return StreamClient::new(&Config::get(ConfigKey::ApiURL), transport);
    }

    pub fn new(base_url: &str, transport: Arc<TransportClient>) -> StreamClient {
        return StreamClient {
            base_url: base_url.trim_end_matches('/').to_string(),
            transport,
        };
    }

    /// Events are delivered on `tx` in arrival order until `done`, a channel
    /// error, or cancellation, whichever comes first.
    pub fn open(
        &self,
        message: &str,
        session_id: &str,
        tx: mpsc::UnboundedSender<StreamEvent>,
    ) -> StreamHandle {
        let token = CancellationToken::new();
        let task_token = token.clone();
        let url = format!("{base}/chat/stream", base = self.base_url);
        let message = message.to_string();
        let session_id = session_id.to_string();

        tokio::spawn(async move {
            if let Err(err) = run_stream(&url, &message, &session_id, &tx, &task_token).await {
                if !task_token.is_cancelled() {
                    tracing::error!(error = %err, "Stream channel failed");
                    let _ = tx.send(StreamEvent::Failed(err));
                }
            }
        });

        return StreamHandle { token };
    }

    /// Non-streaming path: POST the message and wait for the whole reply in
    /// one acknowledgment.
    pub async fn send_plain(&self, message: &str, session_id: &str) -> Result<String, ApiError> {
        let req = SendRequest {
            message: message.to_string(),
            session_id: session_id.to_string(),
        };

        let res = self
            .transport
            .post_json::<SendRequest, SendResponse>("/chat/send", &req)
            .await?;

        return Ok(res.content);
    }
}

async fn run_stream(
    url: &str,
    message: &str,
    session_id: &str,
    tx: &mpsc::UnboundedSender<StreamEvent>,
    token: &CancellationToken,
) -> Result<(), ApiError> {
    // No request timeout here. The channel stays open for as long as the
    // server keeps producing fragments.
    let res = reqwest::Client::new()
        .get(url)
        .query(&[("message", message), ("session_id", session_id)])
        .send()
        .await
        .map_err(|err| {
            if err.is_timeout() {
                return ApiError::Timeout;
            }
            return ApiError::NetworkUnreachable(err.to_string());
        })?;

    if !res.status().is_success() {
        return Err(ApiError::StreamFailed(format!(
            "channel rejected with status {status}",
            status = res.status().as_u16()
        )));
    }

    let stream = res.bytes_stream().map_err(convert_err);
    let mut lines_reader = StreamReader::new(stream).lines();

    let mut event_name = "".to_string();
    loop {
        let line = tokio::select! {
            _ = token.cancelled() => {
                return Ok(());
            }
            line = lines_reader.next_line() => {
                match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(err) => {
                        return Err(ApiError::StreamFailed(err.to_string()));
                    }
                }
            }
        };

        let trimmed = line.trim().to_string();
        if trimmed.is_empty() {
            // Blank line closes the pending event.
            if event_name == "done" {
                let _ = tx.send(StreamEvent::Done);
                return Ok(());
            }
            event_name = "".to_string();
            continue;
        }

        if let Some(name) = trimmed.strip_prefix("event:") {
            event_name = name.trim().to_string();
            continue;
        }

        if let Some(data) = trimmed.strip_prefix("data:") {
            if event_name == "done" {
                let _ = tx.send(StreamEvent::Done);
                return Ok(());
            }

            let payload = data.trim();
            if payload.is_empty() {
                continue;
            }

            match serde_json::from_str::<FragmentPayload>(payload) {
                Ok(fragment) => {
                    if tx.send(StreamEvent::Fragment(fragment.content)).is_err() {
                        // Receiver went away, the controller was torn down.
                        return Ok(());
                    }
                }
                Err(err) => {
                    tracing::debug!(error = %err, payload = payload, "Skipping undecodable stream payload");
                }
            }
        }
    }

    // A done event flushed right at end of body may arrive without a
    // trailing blank line.
    if event_name == "done" {
        let _ = tx.send(StreamEvent::Done);
        return Ok(());
    }

    // The server always terminates a reply with a named done event. Reaching
    // end of body without one means the channel died mid-reply.
    return Err(ApiError::StreamFailed(
        "stream ended before completion".to_string(),
    ));
}
