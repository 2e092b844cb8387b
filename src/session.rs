use std::sync::Arc;
use std::time::Duration;

use crate::api::client::{HttpGateway, MessageGateway};
use crate::api::models::Conversation;
use crate::config::{ClientConfig, normalize_url};
use crate::engine::SyncEngine;
use crate::error::ChatError;
use crate::models::Message;
use crate::storage::{MessageStore, SqliteStore};

/// Entry point for callers: owns the engine and hands out per-conversation
/// sessions.
pub struct ChatClient {
    engine: Arc<SyncEngine>,
    gateway: Arc<dyn MessageGateway>,
    store: Arc<dyn MessageStore>,
}

impl ChatClient {
    pub fn new(gateway: Arc<dyn MessageGateway>, store: Arc<dyn MessageStore>) -> Self {
        Self {
            engine: Arc::new(SyncEngine::new(gateway.clone(), store.clone())),
            gateway,
            store,
        }
    }

    pub fn with_page_size(
        gateway: Arc<dyn MessageGateway>,
        store: Arc<dyn MessageStore>,
        page_size: u32,
    ) -> Self {
        Self {
            engine: Arc::new(SyncEngine::with_page_size(gateway.clone(), store.clone(), page_size)),
            gateway,
            store,
        }
    }

    /// Wire up the HTTP gateway and sqlite store described by the config.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ChatError> {
        if config.base_url.trim().is_empty() || config.token.trim().is_empty() {
            return Err(ChatError::Config("base_url and token are required".to_string()));
        }
        let gateway = Arc::new(HttpGateway::new(
            &normalize_url(&config.base_url),
            &config.token,
            Duration::from_secs(config.request_timeout_secs),
        )?);
        let store = Arc::new(SqliteStore::open_default()?);
        Ok(Self::with_page_size(gateway, store, config.page_size))
    }

    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }

    pub fn session(&self, conversation_id: &str) -> ConversationSession {
        ConversationSession {
            engine: self.engine.clone(),
            conversation_id: conversation_id.to_string(),
        }
    }

    /// Fetch the chat list and refresh the local display cache with it. When
    /// the fetch fails, a previously cached list is served instead; with
    /// nothing cached the fetch error stands.
    pub async fn conversations(&self) -> Result<Vec<Conversation>, ChatError> {
        match self.gateway.list_conversations().await {
            Ok(list) => {
                if let Err(e) = self.store.upsert_conversations(&list).await {
                    log::warn!("conversation list not cached: {}", e);
                }
                Ok(list)
            }
            Err(e) => {
                log::warn!("conversation fetch failed, trying cache: {}", e);
                let cached = self.store.get_conversations(None).await.unwrap_or_default();
                if cached.is_empty() { Err(e) } else { Ok(cached) }
            }
        }
    }
}

/// Per-conversation facade. Mutating calls serialize against each other for
/// this conversation; sessions for different conversations are independent.
#[derive(Clone)]
pub struct ConversationSession {
    engine: Arc<SyncEngine>,
    conversation_id: String,
}

impl ConversationSession {
    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub async fn load(&self) -> Result<Vec<Message>, ChatError> {
        self.engine.load_messages(&self.conversation_id).await
    }

    pub async fn send(&self, text: &str) -> Result<Message, ChatError> {
        self.engine.send_message(&self.conversation_id, text).await
    }

    pub async fn delete(&self, message_id: &str) -> Result<(), ChatError> {
        self.engine.delete_message(&self.conversation_id, message_id).await
    }

    pub async fn messages(&self) -> Vec<Message> {
        self.engine.messages(&self.conversation_id).await
    }

    pub async fn current_error(&self) -> Option<ChatError> {
        self.engine.current_error(&self.conversation_id).await
    }

    pub async fn clear_error(&self) {
        self.engine.clear_error(&self.conversation_id).await
    }

    pub async fn is_loading(&self) -> bool {
        self.engine.is_loading(&self.conversation_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageStatus;
    use crate::testutil::{FakeGateway, MemoryStore, remote_message};

    fn client() -> (Arc<FakeGateway>, Arc<MemoryStore>, ChatClient) {
        let gateway = Arc::new(FakeGateway::new());
        let store = Arc::new(MemoryStore::new());
        let client = ChatClient::new(gateway.clone(), store.clone());
        (gateway, store, client)
    }

    fn chat(id: &str, name: &str) -> Conversation {
        Conversation { id: id.to_string(), name: name.to_string() }
    }

    #[tokio::test]
    async fn session_delegates_to_engine() {
        let (gateway, _store, client) = client();
        gateway.push_remote(remote_message("m-1", "c1", 10));
        let session = client.session("c1");

        let loaded = session.load().await.unwrap();
        assert_eq!(loaded.len(), 1);

        let sent = session.send("hi").await.unwrap();
        assert_eq!(sent.status, MessageStatus::Sent);
        assert_eq!(session.messages().await.len(), 2);

        session.delete(&sent.id).await.unwrap();
        assert_eq!(session.messages().await.len(), 1);
    }

    #[tokio::test]
    async fn sessions_do_not_share_errors() {
        let (gateway, _store, client) = client();
        gateway.fail_fetch(true);

        let c1 = client.session("c1");
        let c2 = client.session("c2");
        let _ = c1.load().await;

        assert!(c1.current_error().await.is_some());
        assert!(c2.current_error().await.is_none());

        c1.clear_error().await;
        assert!(c1.current_error().await.is_none());
    }

    #[tokio::test]
    async fn conversations_refresh_the_cache() {
        let (gateway, store, client) = client();
        gateway.set_conversations(vec![chat("c1", "Alice")]);

        let listed = client.conversations().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(store.get_conversations(None).await.unwrap(), listed);
    }

    #[tokio::test]
    async fn conversations_fall_back_to_cache() {
        let (gateway, _store, client) = client();
        gateway.set_conversations(vec![chat("c1", "Alice")]);
        client.conversations().await.unwrap();

        gateway.fail_list(true);
        let listed = client.conversations().await.unwrap();
        assert_eq!(listed, vec![chat("c1", "Alice")]);
    }

    #[tokio::test]
    async fn conversations_error_stands_without_cache() {
        let (gateway, _store, client) = client();
        gateway.fail_list(true);
        assert!(matches!(
            client.conversations().await,
            Err(ChatError::FetchFailed { .. })
        ));
    }

    #[test]
    fn from_config_requires_credentials() {
        let config = ClientConfig::default();
        assert!(matches!(ChatClient::from_config(&config), Err(ChatError::Config(_))));
    }
}
