pub mod api;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod session;
pub mod storage;

#[cfg(test)]
pub(crate) mod testutil;

pub use api::client::{HttpGateway, MessageGateway};
pub use api::events::{EventStream, IncomingEvent};
pub use api::models::{Conversation, RemoteMessage};
pub use config::ClientConfig;
pub use engine::SyncEngine;
pub use error::ChatError;
pub use models::{Message, MessageOrigin, MessageStatus};
pub use session::{ChatClient, ConversationSession};
pub use storage::{MessageStore, SqliteStore};
