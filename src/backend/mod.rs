//! Text-generation backend used by every stage of the summarization pipeline.
//!
//! The pipeline treats the backend as an opaque request/response service: it sends a short list
//! of chat messages and receives the complete reply as a string. Streaming is never requested.
//! The Ollama adapter talks to the runtime over HTTP directly, keeping the dependency surface to
//! `reqwest`.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

#[cfg(test)]
pub(crate) mod testing;

/// Sampling temperature used for deterministic pipeline calls.
pub const DEFAULT_TEMPERATURE: f32 = 0.2;

/// Errors surfaced by a text-generation backend.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    /// Backend could not be reached.
    #[error("Generation backend unavailable: {0}")]
    Unavailable(String),
    /// Backend answered with an error status.
    #[error("Generation failed: {0}")]
    GenerationFailed(String),
    /// Backend answered, but the body could not be decoded.
    #[error("Malformed backend response: {0}")]
    InvalidResponse(String),
}

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// Instructions framing the conversation.
    System,
    /// Caller-authored content.
    User,
    /// Model-authored content.
    Assistant,
}

/// Single message in a chat request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author of the message.
    pub role: ChatRole,
    /// Message body.
    pub content: String,
}

impl ChatMessage {
    /// Build a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    /// Build a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// Interface implemented by text-generation backends.
///
/// The model is fixed when the backend is constructed so that concurrent callers cannot switch
/// it in the middle of a run.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Model identifier every call is served by.
    fn model(&self) -> &str;

    /// Send a chat request and return the full reply.
    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, BackendError>;

    /// Send a chat request with an explicit sampling temperature.
    ///
    /// Backends without temperature control fall back to [`ChatBackend::chat`].
    async fn chat_with_temperature(
        &self,
        messages: &[ChatMessage],
        _temperature: f32,
    ) -> Result<String, BackendError> {
        self.chat(messages).await
    }

    /// Lightweight health probe.
    async fn is_available(&self) -> bool;

    /// Produce an embedding vector for `text`.
    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>, BackendError>;
}

/// Ollama-backed implementation of [`ChatBackend`].
pub struct OllamaBackend {
    http: Client,
    base_url: String,
    model: String,
}

impl OllamaBackend {
    /// Build a client for the runtime at `base_url` serving `model`.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let http = Client::builder()
            .user_agent("rusty-digest/backend")
            .build()
            .expect("Failed to construct reqwest::Client for the generation backend");
        Self {
            http,
            base_url: base_url.into(),
            model: model.into(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }

    async fn send_chat(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<String, BackendError> {
        let payload = json!({
            "model": self.model,
            "messages": messages,
            "stream": false,
            "options": {
                "temperature": temperature,
            }
        });

        let response = self
            .http
            .post(self.endpoint("/api/chat"))
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                BackendError::Unavailable(format!(
                    "failed to reach Ollama at {}: {error}",
                    self.base_url
                ))
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Unavailable(format!(
                "Ollama endpoint {} returned 404: {body}",
                self.endpoint("/api/chat")
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::GenerationFailed(format!(
                "Ollama returned {status}: {body}"
            )));
        }

        let body: OllamaChatResponse = response.json().await.map_err(|error| {
            BackendError::InvalidResponse(format!("failed to decode Ollama response: {error}"))
        })?;

        if !body.done {
            return Err(BackendError::InvalidResponse(
                "Ollama response incomplete (streaming not supported)".into(),
            ));
        }

        Ok(body.message.content.trim().to_string())
    }
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ChatMessage,
    done: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

#[async_trait]
impl ChatBackend for OllamaBackend {
    fn model(&self) -> &str {
        &self.model
    }

    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, BackendError> {
        self.send_chat(messages, DEFAULT_TEMPERATURE).await
    }

    async fn chat_with_temperature(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<String, BackendError> {
        self.send_chat(messages, temperature).await
    }

    async fn is_available(&self) -> bool {
        match self.http.get(self.endpoint("/api/tags")).send().await {
            Ok(response) => response.status().is_success(),
            Err(error) => {
                tracing::debug!(error = %error, base_url = %self.base_url, "Ollama health probe failed");
                false
            }
        }
    }

    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>, BackendError> {
        let response = self
            .http
            .post(self.endpoint("/api/embeddings"))
            .json(&json!({ "model": self.model, "prompt": text }))
            .send()
            .await
            .map_err(|error| {
                BackendError::Unavailable(format!(
                    "failed to reach Ollama at {}: {error}",
                    self.base_url
                ))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::GenerationFailed(format!(
                "Ollama returned {status}: {body}"
            )));
        }

        let body: OllamaEmbeddingResponse = response.json().await.map_err(|error| {
            BackendError::InvalidResponse(format!("failed to decode embedding response: {error}"))
        })?;
        if body.embedding.is_empty() {
            return Err(BackendError::InvalidResponse(
                "Ollama returned an empty embedding".into(),
            ));
        }
        Ok(body.embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{
        Method::{GET, POST},
        MockServer,
    };

    fn backend_for(server: &MockServer) -> OllamaBackend {
        OllamaBackend::new(server.base_url(), "llama3.1")
    }

    #[tokio::test]
    async fn ollama_chat_handles_successful_response() {
        let server = MockServer::start_async().await;
        let backend = backend_for(&server);

        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/chat")
                    .json_body_partial(r#"{"model": "llama3.1", "stream": false}"#);
                then.status(200).json_body(json!({
                    "model": "llama3.1",
                    "message": { "role": "assistant", "content": "  Summary text\n" },
                    "done": true
                }));
            })
            .await;

        let reply = backend
            .chat(&[ChatMessage::system("Summarize"), ChatMessage::user("Body")])
            .await
            .expect("reply");

        mock.assert();
        assert_eq!(reply, "Summary text");
    }

    #[tokio::test]
    async fn ollama_chat_forwards_temperature() {
        let server = MockServer::start_async().await;
        let backend = backend_for(&server);

        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/chat")
                    .json_body_partial(r#"{"options": {"temperature": 0.5}}"#);
                then.status(200).json_body(json!({
                    "message": { "role": "assistant", "content": "varied" },
                    "done": true
                }));
            })
            .await;

        let reply = backend
            .chat_with_temperature(&[ChatMessage::user("Again")], 0.5)
            .await
            .expect("reply");

        mock.assert();
        assert_eq!(reply, "varied");
    }

    #[tokio::test]
    async fn ollama_chat_handles_error_status() {
        let server = MockServer::start_async().await;
        let backend = backend_for(&server);

        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/chat");
                then.status(500).body("boom");
            })
            .await;

        let error = backend
            .chat(&[ChatMessage::user("Summarize")])
            .await
            .expect_err("error response");

        assert!(matches!(error, BackendError::GenerationFailed(message) if message.contains("500")));
    }

    #[tokio::test]
    async fn ollama_chat_rejects_incomplete_response() {
        let server = MockServer::start_async().await;
        let backend = backend_for(&server);

        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/chat");
                then.status(200).json_body(json!({
                    "message": { "role": "assistant", "content": "partial" },
                    "done": false
                }));
            })
            .await;

        let error = backend
            .chat(&[ChatMessage::user("Summarize")])
            .await
            .expect_err("incomplete response");
        assert!(matches!(error, BackendError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn ollama_health_probe_reports_availability() {
        let server = MockServer::start_async().await;
        let backend = backend_for(&server);

        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/tags");
                then.status(200).json_body(json!({ "models": [] }));
            })
            .await;

        assert!(backend.is_available().await);

        let unreachable = OllamaBackend::new("http://127.0.0.1:9", "llama3.1");
        assert!(!unreachable.is_available().await);
    }

    #[tokio::test]
    async fn ollama_embedding_returns_vector() {
        let server = MockServer::start_async().await;
        let backend = backend_for(&server);

        server
            .mock_async(|when, then| {
                when.method(POST).path("/api/embeddings");
                then.status(200)
                    .json_body(json!({ "embedding": [0.25, -0.5, 1.0] }));
            })
            .await;

        let vector = backend.generate_embedding("hello").await.expect("embedding");
        assert_eq!(vector, vec![0.25, -0.5, 1.0]);
    }
}
