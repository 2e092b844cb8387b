use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;

use crate::api::models::{
    Conversation, ConversationsResponse, FetchResponse, RemoteMessage, SendResponse,
};
use crate::error::ChatError;

/// Seam between the engine and the message service. The engine only ever
/// talks to this trait, so tests run against an in-process fake.
#[async_trait]
pub trait MessageGateway: Send + Sync {
    async fn fetch_messages(
        &self,
        conversation_id: &str,
        limit: u32,
    ) -> Result<Vec<RemoteMessage>, ChatError>;

    async fn send_message(
        &self,
        conversation_id: &str,
        text: &str,
    ) -> Result<RemoteMessage, ChatError>;

    async fn delete_message(&self, message_id: &str) -> Result<(), ChatError>;

    async fn list_conversations(&self) -> Result<Vec<Conversation>, ChatError>;
}

/// Gateway backed by the message service's HTTP API. Owns the bearer
/// credential; callers never see it.
pub struct HttpGateway {
    http: HttpClient,
    base_url: String,
    token: String,
}

impl HttpGateway {
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self, ChatError> {
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChatError::Config(e.to_string()))?;
        Ok(Self {
            http,
            base_url: Self::base_api(base_url),
            token: token.to_string(),
        })
    }

    fn base_api(base_url: &str) -> String {
        let trimmed = base_url.trim_end_matches('/');
        if trimmed.ends_with("/api") { trimmed.to_string() } else { format!("{}/api", trimmed) }
    }

    fn with_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("Authorization", format!("Bearer {}", self.token))
    }

    /// Collapse a response into (status, body) when the server answered with
    /// an error code, so each operation can wrap it in its own variant.
    async fn error_parts(resp: reqwest::Response) -> (Option<u16>, String) {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        (Some(status), if body.is_empty() { format!("HTTP {}", status) } else { body })
    }
}

#[async_trait]
impl MessageGateway for HttpGateway {
    async fn fetch_messages(
        &self,
        conversation_id: &str,
        limit: u32,
    ) -> Result<Vec<RemoteMessage>, ChatError> {
        let endpoint = format!(
            "{}/v1/conversation/{}/message?limit={}",
            self.base_url, conversation_id, limit
        );
        let resp = self
            .with_auth(self.http.get(&endpoint))
            .send()
            .await
            .map_err(|e| ChatError::fetch(None, e.to_string()))?;
        if !resp.status().is_success() {
            let (status, body) = Self::error_parts(resp).await;
            return Err(ChatError::fetch(status, body));
        }
        let parsed: FetchResponse = resp
            .json()
            .await
            .map_err(|e| ChatError::fetch(None, e.to_string()))?;
        Ok(parsed.messages)
    }

    async fn send_message(
        &self,
        conversation_id: &str,
        text: &str,
    ) -> Result<RemoteMessage, ChatError> {
        let endpoint = format!("{}/v1/conversation/{}/message", self.base_url, conversation_id);
        let body = serde_json::json!({ "text": text });
        let resp = self
            .with_auth(self.http.post(&endpoint).json(&body))
            .send()
            .await
            .map_err(|e| ChatError::send(None, e.to_string()))?;
        if !resp.status().is_success() {
            let (status, body) = Self::error_parts(resp).await;
            return Err(ChatError::send(status, body));
        }
        let parsed: SendResponse = resp
            .json()
            .await
            .map_err(|e| ChatError::send(None, e.to_string()))?;
        Ok(parsed.message)
    }

    async fn delete_message(&self, message_id: &str) -> Result<(), ChatError> {
        let endpoint = format!("{}/v1/message/{}", self.base_url, message_id);
        let resp = self
            .with_auth(self.http.delete(&endpoint))
            .send()
            .await
            .map_err(|e| ChatError::delete(None, e.to_string()))?;
        if !resp.status().is_success() {
            let (status, body) = Self::error_parts(resp).await;
            return Err(ChatError::delete(status, body));
        }
        Ok(())
    }

    async fn list_conversations(&self) -> Result<Vec<Conversation>, ChatError> {
        let endpoint = format!("{}/v1/conversation", self.base_url);
        let resp = self
            .with_auth(self.http.get(&endpoint))
            .send()
            .await
            .map_err(|e| ChatError::fetch(None, e.to_string()))?;
        if !resp.status().is_success() {
            let (status, body) = Self::error_parts(resp).await;
            return Err(ChatError::fetch(status, body));
        }
        let parsed: ConversationsResponse = resp
            .json()
            .await
            .map_err(|e| ChatError::fetch(None, e.to_string()))?;
        Ok(parsed.conversations)
    }
}
