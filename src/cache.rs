use std::collections::HashSet;

use crate::models::Message;

/// Deduplicated union of a remote fetch and the locally held entries,
/// ascending by `created_at`. On an id collision the remote entry wins and
/// the local one is dropped; placeholder ids never appear remotely, so
/// pending entries always survive. Ties keep arrival order (remote first),
/// which the stable sort preserves. Pure: same inputs, same output.
pub fn merge(remote: &[Message], local: &[Message]) -> Vec<Message> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(remote.len() + local.len());
    let mut out: Vec<Message> = Vec::with_capacity(remote.len() + local.len());
    for msg in remote.iter().chain(local) {
        if seen.insert(msg.id.as_str()) {
            out.push(msg.clone());
        }
    }
    out.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    out
}

/// Ordered, id-unique message list for one conversation.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MessageCache {
    messages: Vec<Message>,
}

impl MessageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    /// Replace the whole list with an already merged, ordered one.
    pub fn replace_all(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }

    /// Insert or replace by id, keeping the list ordered. The replace scan is
    /// linear; fine at chat-thread sizes.
    pub fn upsert(&mut self, message: Message) {
        if let Some(pos) = self.messages.iter().position(|m| m.id == message.id) {
            self.messages.remove(pos);
        }
        self.insert_sorted(message);
    }

    pub fn remove(&mut self, id: &str) -> bool {
        match self.messages.iter().position(|m| m.id == id) {
            Some(pos) => {
                self.messages.remove(pos);
                true
            }
            None => false,
        }
    }

    fn insert_sorted(&mut self, message: Message) {
        // Fast paths for the common cases: newest or oldest message.
        if self.messages.is_empty()
            || message.created_at >= self.messages.last().unwrap().created_at
        {
            self.messages.push(message);
        } else if message.created_at <= self.messages.first().unwrap().created_at {
            self.messages.insert(0, message);
        } else {
            let idx = self
                .messages
                .binary_search_by(|m| m.created_at.cmp(&message.created_at))
                .unwrap_or_else(|idx| idx);
            self.messages.insert(idx, message);
        }
    }
}
