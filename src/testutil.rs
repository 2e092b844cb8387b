//! Hand-rolled gateway and store doubles for engine and session tests.

use std::collections::HashMap;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::{Mutex, MutexGuard};

use crate::api::client::MessageGateway;
use crate::api::models::{Conversation, RemoteMessage};
use crate::error::ChatError;
use crate::models::Message;
use crate::storage::MessageStore;

pub(crate) fn remote_message(id: &str, conversation_id: &str, secs: i64) -> RemoteMessage {
    RemoteMessage {
        id: id.to_string(),
        conversation_id: conversation_id.to_string(),
        sender: "alice".to_string(),
        text: format!("text-{}", id),
        created_at: Utc.timestamp_opt(secs, 0).unwrap(),
    }
}

/// In-process stand-in for the message service. Failure toggles and a send
/// gate make the protocols deterministic to test.
pub(crate) struct FakeGateway {
    remote: StdMutex<Vec<RemoteMessage>>,
    conversations: StdMutex<Vec<Conversation>>,
    deleted: StdMutex<Vec<String>>,
    next_send_id: StdMutex<Option<String>>,
    send_counter: AtomicU64,
    fail_fetch_flag: AtomicBool,
    fail_send_flag: AtomicBool,
    fail_delete_flag: AtomicBool,
    fail_list_flag: AtomicBool,
    send_gate: Mutex<()>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self {
            remote: StdMutex::new(Vec::new()),
            conversations: StdMutex::new(Vec::new()),
            deleted: StdMutex::new(Vec::new()),
            next_send_id: StdMutex::new(None),
            send_counter: AtomicU64::new(0),
            fail_fetch_flag: AtomicBool::new(false),
            fail_send_flag: AtomicBool::new(false),
            fail_delete_flag: AtomicBool::new(false),
            fail_list_flag: AtomicBool::new(false),
            send_gate: Mutex::new(()),
        }
    }

    pub fn push_remote(&self, message: RemoteMessage) {
        self.remote.lock().unwrap().push(message);
    }

    pub fn set_conversations(&self, conversations: Vec<Conversation>) {
        *self.conversations.lock().unwrap() = conversations;
    }

    pub fn set_next_send_id(&self, id: &str) {
        *self.next_send_id.lock().unwrap() = Some(id.to_string());
    }

    pub fn fail_fetch(&self, fail: bool) {
        self.fail_fetch_flag.store(fail, Ordering::SeqCst);
    }

    pub fn fail_send(&self, fail: bool) {
        self.fail_send_flag.store(fail, Ordering::SeqCst);
    }

    pub fn fail_delete(&self, fail: bool) {
        self.fail_delete_flag.store(fail, Ordering::SeqCst);
    }

    pub fn fail_list(&self, fail: bool) {
        self.fail_list_flag.store(fail, Ordering::SeqCst);
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    /// Block every send until the returned guard is dropped.
    pub async fn hold_sends(&self) -> MutexGuard<'_, ()> {
        self.send_gate.lock().await
    }
}

#[async_trait]
impl MessageGateway for FakeGateway {
    async fn fetch_messages(
        &self,
        conversation_id: &str,
        _limit: u32,
    ) -> Result<Vec<RemoteMessage>, ChatError> {
        if self.fail_fetch_flag.load(Ordering::SeqCst) {
            return Err(ChatError::fetch(Some(500), "fetch refused"));
        }
        let remote = self.remote.lock().unwrap();
        Ok(remote.iter().filter(|m| m.conversation_id == conversation_id).cloned().collect())
    }

    async fn send_message(
        &self,
        conversation_id: &str,
        text: &str,
    ) -> Result<RemoteMessage, ChatError> {
        let _gate = self.send_gate.lock().await;
        if self.fail_send_flag.load(Ordering::SeqCst) {
            return Err(ChatError::send(Some(500), "send refused"));
        }
        let id = self.next_send_id.lock().unwrap().take().unwrap_or_else(|| {
            format!("m-gen-{}", self.send_counter.fetch_add(1, Ordering::SeqCst))
        });
        let message = RemoteMessage {
            id,
            conversation_id: conversation_id.to_string(),
            sender: "me".to_string(),
            text: text.to_string(),
            created_at: Utc::now(),
        };
        self.remote.lock().unwrap().push(message.clone());
        Ok(message)
    }

    async fn delete_message(&self, message_id: &str) -> Result<(), ChatError> {
        if self.fail_delete_flag.load(Ordering::SeqCst) {
            return Err(ChatError::delete(Some(500), "delete refused"));
        }
        self.deleted.lock().unwrap().push(message_id.to_string());
        self.remote.lock().unwrap().retain(|m| m.id != message_id);
        Ok(())
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>, ChatError> {
        if self.fail_list_flag.load(Ordering::SeqCst) {
            return Err(ChatError::fetch(Some(500), "list refused"));
        }
        Ok(self.conversations.lock().unwrap().clone())
    }
}

/// In-memory store double with read/write failure toggles.
pub(crate) struct MemoryStore {
    messages: StdMutex<HashMap<String, Vec<Message>>>,
    conversations: StdMutex<Vec<Conversation>>,
    fail_reads_flag: AtomicBool,
    fail_writes_flag: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            messages: StdMutex::new(HashMap::new()),
            conversations: StdMutex::new(Vec::new()),
            fail_reads_flag: AtomicBool::new(false),
            fail_writes_flag: AtomicBool::new(false),
        }
    }

    pub async fn seed(&self, conversation_id: &str, messages: Vec<Message>) {
        self.messages.lock().unwrap().insert(conversation_id.to_string(), messages);
    }

    pub async fn contents(&self, conversation_id: &str) -> Option<Vec<Message>> {
        self.messages.lock().unwrap().get(conversation_id).cloned()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads_flag.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes_flag.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn get_conversation_messages(
        &self,
        conversation_id: &str,
    ) -> Result<Option<Vec<Message>>, ChatError> {
        if self.fail_reads_flag.load(Ordering::SeqCst) {
            return Err(ChatError::StorageUnavailable("reads disabled".to_string()));
        }
        Ok(self.messages.lock().unwrap().get(conversation_id).cloned())
    }

    async fn put_conversation_messages(
        &self,
        conversation_id: &str,
        messages: &[Message],
    ) -> Result<(), ChatError> {
        if self.fail_writes_flag.load(Ordering::SeqCst) {
            return Err(ChatError::StorageUnavailable("writes disabled".to_string()));
        }
        self.messages
            .lock()
            .unwrap()
            .insert(conversation_id.to_string(), messages.to_vec());
        Ok(())
    }

    async fn upsert_conversations(&self, conversations: &[Conversation]) -> Result<(), ChatError> {
        if self.fail_writes_flag.load(Ordering::SeqCst) {
            return Err(ChatError::StorageUnavailable("writes disabled".to_string()));
        }
        let mut stored = self.conversations.lock().unwrap();
        for c in conversations {
            match stored.iter_mut().find(|existing| existing.id == c.id) {
                Some(existing) => *existing = c.clone(),
                None => stored.push(c.clone()),
            }
        }
        Ok(())
    }

    async fn get_conversations(&self, limit: Option<usize>) -> Result<Vec<Conversation>, ChatError> {
        if self.fail_reads_flag.load(Ordering::SeqCst) {
            return Err(ChatError::StorageUnavailable("reads disabled".to_string()));
        }
        let stored = self.conversations.lock().unwrap();
        let take = limit.unwrap_or(stored.len());
        Ok(stored.iter().take(take).cloned().collect())
    }
}
