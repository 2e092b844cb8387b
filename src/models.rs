use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::models::RemoteMessage;

/// Where a message came from and whether the server has acknowledged it.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum MessageOrigin {
    /// Fetched from the server; the server owns it.
    Remote,
    /// Written locally, send not yet acknowledged.
    LocalPending,
    /// Written locally, server has assigned its permanent id.
    LocalConfirmed,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Pending,
    Sent,
    Failed,
    Deleted,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub sender: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub origin: MessageOrigin,
    pub status: MessageStatus,
}

impl Message {
    /// Optimistic entry for a send that has not reached the server yet.
    /// The placeholder id never appears server-side, so it can only be
    /// replaced by the send response, never matched against a fetch.
    pub fn pending(conversation_id: &str, text: &str) -> Self {
        Self {
            id: format!("pending-{}", Uuid::new_v4()),
            conversation_id: conversation_id.to_string(),
            sender: String::new(),
            text: text.to_string(),
            created_at: Utc::now(),
            origin: MessageOrigin::LocalPending,
            status: MessageStatus::Pending,
        }
    }

    /// Entry built from a fetched or pushed server message.
    pub fn from_remote(conversation_id: &str, remote: RemoteMessage) -> Self {
        Self {
            id: remote.id,
            conversation_id: conversation_id.to_string(),
            sender: remote.sender,
            text: remote.text,
            created_at: remote.created_at,
            origin: MessageOrigin::Remote,
            status: MessageStatus::Sent,
        }
    }

    /// Entry built from the server's acknowledgement of a local send.
    /// Same logical message as the placeholder it replaces.
    pub fn confirmed(conversation_id: &str, remote: RemoteMessage) -> Self {
        Self {
            id: remote.id,
            conversation_id: conversation_id.to_string(),
            sender: remote.sender,
            text: remote.text,
            created_at: remote.created_at,
            origin: MessageOrigin::LocalConfirmed,
            status: MessageStatus::Sent,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self.origin, MessageOrigin::LocalPending | MessageOrigin::LocalConfirmed)
    }
}
