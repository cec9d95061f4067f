//! # Testsmith Models
//!
//! LLM provider selection and the text-generation clients every stage
//! talks to. A client receives plain text and returns plain text; all
//! structure is recovered downstream.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::error::LlmError;

/// Supported LLM providers
///
/// - Ollama (local) - no key, `TESTSMITH_BASE_URL` optional
/// - OpenAI-compatible - `OPENAI_API_KEY`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    Ollama,
    #[serde(rename = "openai")]
    OpenAI,
}

impl LlmProvider {
    /// Display name for terminal output
    pub fn display_name(&self) -> &'static str {
        match self {
            LlmProvider::Ollama => "Ollama",
            LlmProvider::OpenAI => "OpenAI",
        }
    }

    /// Base URL used when none is configured
    pub fn default_base_url(&self) -> &'static str {
        match self {
            LlmProvider::Ollama => "http://localhost:11434",
            LlmProvider::OpenAI => "https://api.openai.com",
        }
    }
}

impl std::str::FromStr for LlmProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(LlmProvider::Ollama),
            "openai" => Ok(LlmProvider::OpenAI),
            other => Err(format!("unknown provider '{}' (expected ollama or openai)", other)),
        }
    }
}

/// Configuration for LLM model selection
///
/// ## Example
/// ```rust,ignore
/// use testsmith_core::models::{ModelConfig, LlmProvider};
///
/// // Local Ollama with the default coder model
/// let config = ModelConfig::default();
///
/// // OpenAI-compatible endpoint
/// let config = ModelConfig::with_provider(LlmProvider::OpenAI, "gpt-4o-mini")
///     .with_base_url("http://localhost:8000");
///
/// let client = config.create_client()?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModelConfig {
    /// LLM provider to use
    pub provider: LlmProvider,
    /// Model name (e.g., "qwen2.5-coder:7b", "gpt-4o-mini")
    pub model: String,
    /// Base URL override; the provider default applies when unset
    pub base_url: Option<String>,
    pub temperature: f32,
    /// Per-request timeout enforced by the HTTP client
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Ollama,
            model: "qwen2.5-coder:7b".to_string(),
            base_url: None,
            temperature: 0.7,
            timeout_secs: 120,
        }
    }
}

impl ModelConfig {
    /// Create a new model config with the default provider (Ollama)
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    /// Create config for a specific provider
    pub fn with_provider(provider: LlmProvider, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            ..Self::default()
        }
    }

    /// Set base URL
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Base URL with any trailing slash removed
    pub fn resolved_base_url(&self) -> String {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
            .trim_end_matches('/')
            .to_string()
    }

    /// Create a text-generation client for the configured provider
    pub fn create_client(&self) -> Result<Box<dyn TextGenerator>, LlmError> {
        match self.provider {
            LlmProvider::Ollama => Ok(Box::new(OllamaClient::new(self)?)),
            LlmProvider::OpenAI => {
                let key = std::env::var("OPENAI_API_KEY")
                    .map_err(|_| LlmError::MissingApiKey("OPENAI_API_KEY"))?;
                Ok(Box::new(OpenAiClient::new(self, key)?))
            }
        }
    }
}

/// A text-generation backend
///
/// `role_context` describes who the model should act as; `prompt` is the
/// task. Implementations send the former as the system message.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, role_context: &str) -> Result<String, LlmError>;
}

#[async_trait]
impl TextGenerator for Arc<dyn TextGenerator> {
    async fn generate(&self, prompt: &str, role_context: &str) -> Result<String, LlmError> {
        (**self).generate(prompt, role_context).await
    }
}

#[async_trait]
impl TextGenerator for Box<dyn TextGenerator> {
    async fn generate(&self, prompt: &str, role_context: &str) -> Result<String, LlmError> {
        (**self).generate(prompt, role_context).await
    }
}

fn http_client(timeout_secs: u64) -> Result<reqwest::Client, LlmError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| LlmError::Http(e.to_string()))
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

fn chat_messages(prompt: &str, role_context: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(2);
    if !role_context.trim().is_empty() {
        messages.push(ChatMessage {
            role: "system".to_string(),
            content: role_context.to_string(),
        });
    }
    messages.push(ChatMessage {
        role: "user".to_string(),
        content: prompt.to_string(),
    });
    messages
}

async fn read_success(response: reqwest::Response) -> Result<String, LlmError> {
    let status = response.status();
    let text = response.text().await.map_err(|e| LlmError::Http(e.to_string()))?;
    if !status.is_success() {
        return Err(LlmError::Response(format!("HTTP {}: {}", status, text)));
    }
    Ok(text)
}

/// Client for a local Ollama server (`/api/chat`, non-streaming)
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct OllamaTags {
    #[serde(default)]
    models: Vec<OllamaModel>,
}

#[derive(Debug, Deserialize)]
struct OllamaModel {
    name: String,
}

impl OllamaClient {
    pub fn new(config: &ModelConfig) -> Result<Self, LlmError> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            base_url: config.resolved_base_url(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    /// Names of the models the server has pulled
    pub async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(Duration::from_secs(5))
            .send()
            .await?;
        let text = read_success(response).await?;
        let tags: OllamaTags =
            serde_json::from_str(&text).map_err(|e| LlmError::Serialization(e.to_string()))?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Whether the server answers at all
    pub async fn health(&self) -> bool {
        match self.list_models().await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(error = %e, base_url = %self.base_url, "Ollama health check failed");
                false
            }
        }
    }

    /// Whether the configured model is pulled, ignoring a `:latest` tag
    pub async fn model_available(&self) -> Result<bool, LlmError> {
        let models = self.list_models().await?;
        Ok(model_listed(&models, &self.model))
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

fn model_listed(models: &[String], wanted: &str) -> bool {
    models.iter().any(|name| {
        name == wanted
            || (!wanted.contains(':') && name.split(':').next() == Some(wanted))
    })
}

#[async_trait]
impl TextGenerator for OllamaClient {
    async fn generate(&self, prompt: &str, role_context: &str) -> Result<String, LlmError> {
        let body = OllamaChatRequest {
            model: &self.model,
            messages: chat_messages(prompt, role_context),
            stream: false,
            options: OllamaOptions {
                temperature: self.temperature,
            },
        };

        tracing::debug!(model = %self.model, prompt_chars = prompt.len(), "Ollama request");
        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await?;
        let text = read_success(response).await?;
        let parsed: OllamaChatResponse =
            serde_json::from_str(&text).map_err(|e| LlmError::Serialization(e.to_string()))?;
        Ok(parsed.message.content)
    }
}

/// Client for an OpenAI-compatible `/v1/chat/completions` endpoint
pub struct OpenAiClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct OpenAiChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiClient {
    pub fn new(config: &ModelConfig, api_key: String) -> Result<Self, LlmError> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            endpoint: format!("{}/v1/chat/completions", config.resolved_base_url()),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl TextGenerator for OpenAiClient {
    async fn generate(&self, prompt: &str, role_context: &str) -> Result<String, LlmError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key))
                .map_err(|e| LlmError::Http(e.to_string()))?,
        );

        let body = OpenAiChatRequest {
            model: &self.model,
            messages: chat_messages(prompt, role_context),
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .headers(headers)
            .json(&body)
            .send()
            .await?;
        let text = read_success(response).await?;
        let parsed: OpenAiChatResponse =
            serde_json::from_str(&text).map_err(|e| LlmError::Serialization(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.unwrap_or_default())
            .ok_or_else(|| LlmError::Response("Missing choices".to_string()))
    }
}
