use serde::{Deserialize, Serialize};

use super::AssistantError;

/// Role tag on a model message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One role-tagged message in a model request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Language-model chat collaborator.
///
/// Takes the full ordered message sequence and returns a single response
/// text. Implementations must bound their own call time.
pub trait ChatModel: Send + Sync {
    fn invoke(&self, messages: &[ChatMessage]) -> Result<String, AssistantError>;
}

/// Request body for Ollama /api/chat
#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

/// Response body from Ollama /api/chat
#[derive(Deserialize)]
struct OllamaChatResponse {
    message: OllamaChatMessage,
}

#[derive(Deserialize)]
struct OllamaChatMessage {
    content: String,
}

/// Ollama chat client with a fixed model name and bounded timeout.
pub struct OllamaChatClient {
    base_url: String,
    model: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl OllamaChatClient {
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
            timeout_secs,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl ChatModel for OllamaChatClient {
    fn invoke(&self, messages: &[ChatMessage]) -> Result<String, AssistantError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = OllamaChatRequest {
            model: &self.model,
            messages,
            stream: false,
        };

        let response = self.client.post(&url).json(&body).send().map_err(|e| {
            if e.is_connect() {
                AssistantError::ModelUnavailable(format!("cannot reach {}", self.base_url))
            } else if e.is_timeout() {
                AssistantError::ModelUnavailable(format!(
                    "chat call timed out after {}s",
                    self.timeout_secs
                ))
            } else {
                AssistantError::ModelUnavailable(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(AssistantError::ModelUnavailable(format!(
                "Ollama returned {status}: {body}"
            )));
        }

        let parsed: OllamaChatResponse = response
            .json()
            .map_err(|e| AssistantError::ModelUnavailable(e.to_string()))?;

        Ok(parsed.message.content)
    }
}
