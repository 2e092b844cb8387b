use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Conversation {
    pub id: String,
    pub name: String,
}

/// Message as the server sends it.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteMessage {
    pub id: String,
    pub conversation_id: String,
    #[serde(default)]
    pub sender: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct FetchResponse {
    pub messages: Vec<RemoteMessage>,
}

#[derive(Debug, Deserialize)]
pub struct SendResponse {
    pub message: RemoteMessage,
}

#[derive(Debug, Deserialize)]
pub struct ConversationsResponse {
    pub conversations: Vec<Conversation>,
}
