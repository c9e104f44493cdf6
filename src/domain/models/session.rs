use serde_derive::Deserialize;
use serde_derive::Serialize;

#[derive(Default, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub title: String,
    pub timestamp: String,
    pub message_count: i64,
}
