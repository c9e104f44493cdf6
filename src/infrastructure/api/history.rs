#[cfg(test)]
#[path = "history_test.rs"]
mod tests;

use std::sync::Arc;

use serde_derive::Deserialize;
use serde_derive::Serialize;

use super::TransportClient;
use crate::domain::models::ApiError;
use crate::domain::models::Author;
use crate::domain::models::Message;
use crate::domain::models::MessageStatus;
use crate::domain::models::SessionSummary;

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct HistoryRecord {
    id: i64,
    message: String,
    is_user: bool,
    timestamp: Option<String>,
}

/// Fetches a session's prior message log and maps it into the client's
/// message model. History is always settled, so every record loads as a
/// `Final` message in server order.
pub struct HistoryLoader {
    transport: Arc<TransportClient>,
}

impl HistoryLoader {
    pub fn new(transport: Arc<TransportClient>) -> HistoryLoader {
        return HistoryLoader { transport };
    }

    pub async fn load(&self, session_id: &str) -> Result<Vec<Message>, ApiError> {
        let records = self
            .transport
            .get_json::<Vec<HistoryRecord>>("/chat/history", &[("session_id", session_id)])
            .await
            .map_err(|err| {
                tracing::error!(error = %err, session_id = session_id, "Failed to fetch history");
                return ApiError::HistoryUnavailable(err.to_string());
            })?;

        let messages = records
            .iter()
            .map(|record| {
                return Message {
                    id: Some(record.id.to_string()),
                    author: Author::from_is_user(record.is_user),
                    content: record.message.to_string(),
                    timestamp: record.timestamp.clone(),
                    status: MessageStatus::Final,
                    local_id: None,
                };
            })
            .collect::<Vec<Message>>();

        return Ok(messages);
    }

    pub async fn sessions(&self) -> Result<Vec<SessionSummary>, ApiError> {
        return self
            .transport
            .get_json::<Vec<SessionSummary>>("/chat/sessions", &[])
            .await;
    }
}
