#[cfg(test)]
#[path = "message_test.rs"]
mod tests;

use chrono::Local;
use chrono::SecondsFormat;
use serde_derive::Deserialize;
use serde_derive::Serialize;

use super::Author;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageStatus {
    Pending,
    Streaming,
    Final,
}

/// A single entry in a session's conversation. Server-persisted messages
/// carry an `id`; a provisional assistant message carries only the
/// correlation token of the stream building it, and receives an id when the
/// stream finishes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub id: Option<String>,
    pub author: Author,
    pub content: String,
    pub timestamp: Option<String>,
    pub status: MessageStatus,
    #[serde(skip)]
    pub local_id: Option<String>,
}

impl Message {
    pub fn user(content: &str) -> Message {
        return Message {
            id: None,
            author: Author::User,
            content: content.to_string(),
            timestamp: Some(now()),
            status: MessageStatus::Final,
            local_id: None,
        };
    }

    pub fn assistant(content: &str) -> Message {
        return Message {
            id: None,
            author: Author::Assistant,
            content: content.to_string(),
            timestamp: Some(now()),
            status: MessageStatus::Final,
            local_id: None,
        };
    }

    pub fn provisional(local_id: &str, content: &str) -> Message {
        return Message {
            id: None,
            author: Author::Assistant,
            content: content.to_string(),
            timestamp: None,
            status: MessageStatus::Streaming,
            local_id: Some(local_id.to_string()),
        };
    }

    pub fn set_content(&mut self, content: &str) {
        self.content = content.to_string();
    }

    /// Marks the message settled under `id`. Once set, no stream will match
    /// this message again.
    pub fn finalize(&mut self, id: &str) {
        self.id = Some(id.to_string());
        self.local_id = None;
        self.status = MessageStatus::Final;
    }

    /// Settles the message without confirming it, keeping whatever content
    /// has accumulated. Used when a stream errors out or is cancelled.
    pub fn release(&mut self) {
        self.local_id = None;
        self.status = MessageStatus::Final;
    }
}

fn now() -> String {
    return Local::now().to_rfc3339_opts(SecondsFormat::Secs, true);
}
