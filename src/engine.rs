use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::api::client::MessageGateway;
use crate::api::models::RemoteMessage;
use crate::cache::{MessageCache, merge};
use crate::error::ChatError;
use crate::models::{Message, MessageStatus};
use crate::storage::MessageStore;

const DEFAULT_PAGE_SIZE: u32 = 100;

#[derive(Default)]
struct ThreadState {
    cache: MessageCache,
    loading: bool,
    last_error: Option<ChatError>,
}

/// Per-conversation entry. `mutations` serializes load/send/delete for this
/// conversation and is held across all awaited I/O; `state` only guards the
/// in-memory snapshot, so readers stay responsive while a mutation is in
/// flight.
#[derive(Default)]
struct ConversationEntry {
    mutations: Mutex<()>,
    state: RwLock<ThreadState>,
}

/// Owns the in-memory message caches and runs the load/send/delete protocols
/// against an injected gateway and store. Operations on different
/// conversations run concurrently; two mutations on the same conversation
/// never interleave.
pub struct SyncEngine {
    gateway: Arc<dyn MessageGateway>,
    store: Arc<dyn MessageStore>,
    page_size: u32,
    conversations: Mutex<HashMap<String, Arc<ConversationEntry>>>,
}

impl SyncEngine {
    pub fn new(gateway: Arc<dyn MessageGateway>, store: Arc<dyn MessageStore>) -> Self {
        Self::with_page_size(gateway, store, DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(
        gateway: Arc<dyn MessageGateway>,
        store: Arc<dyn MessageStore>,
        page_size: u32,
    ) -> Self {
        Self { gateway, store, page_size, conversations: Mutex::new(HashMap::new()) }
    }

    async fn entry(&self, conversation_id: &str) -> Arc<ConversationEntry> {
        let mut map = self.conversations.lock().await;
        map.entry(conversation_id.to_string()).or_default().clone()
    }

    /// Refresh one conversation from the server and reconcile with what we
    /// hold locally. Fetches the first page only (bounded by `page_size`).
    /// On fetch failure the cache keeps its last-known-good contents.
    pub async fn load_messages(&self, conversation_id: &str) -> Result<Vec<Message>, ChatError> {
        let entry = self.entry(conversation_id).await;
        let _op = entry.mutations.lock().await;

        entry.state.write().await.loading = true;

        let fetched = self.gateway.fetch_messages(conversation_id, self.page_size).await;
        let remote: Vec<Message> = match fetched {
            Ok(remote) => remote
                .into_iter()
                .map(|r| Message::from_remote(conversation_id, r))
                .collect(),
            Err(e) => {
                let mut state = entry.state.write().await;
                state.loading = false;
                state.last_error = Some(e.clone());
                return Err(e);
            }
        };

        // A store that cannot be read means "no persisted messages"; the
        // remote fetch already succeeded, so the load itself still counts.
        let mut local = match self.store.get_conversation_messages(conversation_id).await {
            Ok(list) => list.unwrap_or_default(),
            Err(e) => {
                log::warn!("store read for {} failed, treating as empty: {}", conversation_id, e);
                Vec::new()
            }
        };

        let mut state = entry.state.write().await;
        // Unconfirmed and failed sends exist only in the cache; they are part
        // of the local side of the merge or a refresh would drop them.
        local.extend(state.cache.messages().iter().filter(|m| m.is_local()).cloned());
        let merged = merge(&remote, &local);
        state.cache.replace_all(merged.clone());
        state.loading = false;
        state.last_error = None;
        log::debug!("{}: merged {} remote into {} total", conversation_id, remote.len(), merged.len());
        Ok(merged)
    }

    /// Optimistically insert a pending entry, then confirm it against the
    /// server. The pending entry is visible to `messages()` readers for the
    /// whole round trip; on failure it stays, marked `Failed`, for the caller
    /// to retry or delete.
    pub async fn send_message(
        &self,
        conversation_id: &str,
        text: &str,
    ) -> Result<Message, ChatError> {
        let entry = self.entry(conversation_id).await;
        let _op = entry.mutations.lock().await;

        let placeholder = Message::pending(conversation_id, text);
        entry.state.write().await.cache.upsert(placeholder.clone());

        match self.gateway.send_message(conversation_id, text).await {
            Ok(remote) => {
                let confirmed = Message::confirmed(conversation_id, remote);
                {
                    let mut state = entry.state.write().await;
                    state.cache.remove(&placeholder.id);
                    state.cache.upsert(confirmed.clone());
                    state.last_error = None;
                }
                // Mirror the confirmed form durably. Failure here does not
                // undo the in-memory confirmation; it lands in the error slot.
                if let Err(e) = self.persist_confirmed(conversation_id, &confirmed).await {
                    log::warn!("confirmed message {} not persisted: {}", confirmed.id, e);
                    entry.state.write().await.last_error = Some(e);
                }
                Ok(confirmed)
            }
            Err(e) => {
                let mut state = entry.state.write().await;
                if let Some(msg) = state.cache.get_mut(&placeholder.id) {
                    msg.status = MessageStatus::Failed;
                }
                state.last_error = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Delete on the server first; only a confirmed remote delete touches the
    /// local layers. The store mirror is pruned whenever it holds the id,
    /// regardless of how the cache currently classifies the entry.
    pub async fn delete_message(
        &self,
        conversation_id: &str,
        message_id: &str,
    ) -> Result<(), ChatError> {
        let entry = self.entry(conversation_id).await;
        let _op = entry.mutations.lock().await;

        if let Err(e) = self.gateway.delete_message(message_id).await {
            entry.state.write().await.last_error = Some(e.clone());
            return Err(e);
        }

        {
            let mut state = entry.state.write().await;
            state.cache.remove(message_id);
            state.last_error = None;
        }
        if let Err(e) = self.unpersist(conversation_id, message_id).await {
            log::warn!("deleted message {} not pruned from store: {}", message_id, e);
            entry.state.write().await.last_error = Some(e);
        }
        Ok(())
    }

    /// Fold a pushed server message into the cache. Redelivery is a no-op
    /// thanks to id dedup.
    pub async fn apply_remote_message(&self, conversation_id: &str, remote: RemoteMessage) {
        let entry = self.entry(conversation_id).await;
        let _op = entry.mutations.lock().await;
        let message = Message::from_remote(conversation_id, remote);
        entry.state.write().await.cache.upsert(message);
    }

    /// Fold a pushed server-side delete into the cache and store mirror.
    pub async fn apply_remote_delete(&self, conversation_id: &str, message_id: &str) {
        let entry = self.entry(conversation_id).await;
        let _op = entry.mutations.lock().await;
        let removed = entry.state.write().await.cache.remove(message_id);
        if removed {
            if let Err(e) = self.unpersist(conversation_id, message_id).await {
                log::warn!("pushed delete of {} not pruned from store: {}", message_id, e);
            }
        }
    }

    /// Current cache snapshot. Does not contend with in-flight mutations.
    pub async fn messages(&self, conversation_id: &str) -> Vec<Message> {
        self.entry(conversation_id).await.state.read().await.cache.snapshot()
    }

    pub async fn current_error(&self, conversation_id: &str) -> Option<ChatError> {
        self.entry(conversation_id).await.state.read().await.last_error.clone()
    }

    pub async fn clear_error(&self, conversation_id: &str) {
        self.entry(conversation_id).await.state.write().await.last_error = None;
    }

    pub async fn is_loading(&self, conversation_id: &str) -> bool {
        self.entry(conversation_id).await.state.read().await.loading
    }

    /// Read-merge-write append of a confirmed send. Runs under the caller's
    /// conversation lock; a read failure aborts so an unreadable store is
    /// never overwritten with a one-entry list.
    async fn persist_confirmed(
        &self,
        conversation_id: &str,
        confirmed: &Message,
    ) -> Result<(), ChatError> {
        let mut list = self
            .store
            .get_conversation_messages(conversation_id)
            .await?
            .unwrap_or_default();
        list.retain(|m| m.id != confirmed.id);
        list.push(confirmed.clone());
        self.store.put_conversation_messages(conversation_id, &list).await
    }

    /// Read-merge-write removal; no write if the id was not persisted.
    async fn unpersist(&self, conversation_id: &str, message_id: &str) -> Result<(), ChatError> {
        let Some(mut list) = self.store.get_conversation_messages(conversation_id).await? else {
            return Ok(());
        };
        let before = list.len();
        list.retain(|m| m.id != message_id);
        if list.len() != before {
            self.store.put_conversation_messages(conversation_id, &list).await?;
        }
        Ok(())
    }
}
