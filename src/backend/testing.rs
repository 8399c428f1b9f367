use super::{BackendError, ChatBackend, ChatMessage};
use async_trait::async_trait;
use std::sync::Mutex;

type Responder = Box<dyn Fn(&[ChatMessage]) -> Result<String, BackendError> + Send + Sync>;

/// In-process backend that answers with a caller-supplied closure and records every request.
pub(crate) struct ScriptedBackend {
    model: String,
    responder: Responder,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedBackend {
    pub(crate) fn new<F>(responder: F) -> Self
    where
        F: Fn(&[ChatMessage]) -> Result<String, BackendError> + Send + Sync + 'static,
    {
        Self {
            model: "test-model".into(),
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().expect("calls lock").len()
    }

    /// Count requests whose system message contains `needle`.
    pub(crate) fn calls_with_system(&self, needle: &str) -> usize {
        self.calls
            .lock()
            .expect("calls lock")
            .iter()
            .filter(|messages| {
                messages
                    .first()
                    .is_some_and(|message| message.content.contains(needle))
            })
            .count()
    }

    pub(crate) fn last_user_message(&self) -> Option<String> {
        self.calls
            .lock()
            .expect("calls lock")
            .last()
            .and_then(|messages| messages.last())
            .map(|message| message.content.clone())
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    fn model(&self) -> &str {
        &self.model
    }

    async fn chat(&self, messages: &[ChatMessage]) -> Result<String, BackendError> {
        self.calls
            .lock()
            .expect("calls lock")
            .push(messages.to_vec());
        (self.responder)(messages)
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn generate_embedding(&self, _text: &str) -> Result<Vec<f32>, BackendError> {
        Ok(vec![0.0; 4])
    }
}

/// System message of a request, or an empty string.
pub(crate) fn system_of(messages: &[ChatMessage]) -> &str {
    messages
        .first()
        .map(|message| message.content.as_str())
        .unwrap_or("")
}

/// User message of a request, or an empty string.
pub(crate) fn user_of(messages: &[ChatMessage]) -> &str {
    messages
        .last()
        .map(|message| message.content.as_str())
        .unwrap_or("")
}
