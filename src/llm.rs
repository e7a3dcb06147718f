use crate::config::LlmConfig;
use crate::error::{Error, Result};
use crate::http::{HttpClient, RetryPolicy, Sleeper};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// LLM provider. Determines API format and default endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Any OpenAI-compatible chat-completion API (OpenAI, OpenRouter, local ollama, etc.)
    #[default]
    #[serde(rename = "openai")]
    OpenAi,
    Anthropic,
    Gemini,
}

impl Provider {
    fn default_base_url(&self) -> Option<&'static str> {
        match self {
            Self::OpenAi => None,
            Self::Anthropic => Some("https://api.anthropic.com/v1"),
            Self::Gemini => Some("https://generativelanguage.googleapis.com/v1beta"),
        }
    }

    fn default_api_key_env(&self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::Gemini => "GEMINI_API_KEY",
        }
    }

    fn requires_api_key(&self) -> bool {
        !matches!(self, Self::OpenAi)
    }
}

impl std::str::FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" | "openrouter" | "ollama" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "gemini" | "google" => Ok(Self::Gemini),
            other => Err(Error::config(format!("unknown LLM provider '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Per-request overrides of the client's generation defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl GenerationOptions {
    pub fn validate(&self) -> Result<()> {
        if let Some(t) = self.temperature
            && !(0.0..=2.0).contains(&t)
        {
            return Err(Error::invalid_input(format!(
                "temperature must be between 0 and 2, got {t}"
            )));
        }
        if self.max_tokens == Some(0) {
            return Err(Error::invalid_input("max_tokens must be positive"));
        }
        Ok(())
    }
}

/// The seam the orchestrator talks to: role-tagged turns in, raw completion text out.
#[async_trait]
pub trait Completion: Send + Sync {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &GenerationOptions,
    ) -> Result<String>;
}

pub struct LlmClient {
    provider: Provider,
    api_key: Option<String>,
    model: String,
    temperature: f64,
    max_tokens: u32,
    base_url: String,
    http: HttpClient,
}

// -- OpenAI-compatible format --

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
}

// -- Anthropic format --

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    #[serde(skip_serializing_if = "String::is_empty")]
    system: String,
    messages: Vec<Msg<'a>>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicBlock>,
}

#[derive(Deserialize)]
struct AnthropicBlock {
    text: Option<String>,
}

// -- Gemini format --

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent<'a>>,
    contents: Vec<GeminiContent<'a>>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f64,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiReplyContent>,
}

#[derive(Deserialize)]
struct GeminiReplyContent {
    #[serde(default)]
    parts: Vec<GeminiReplyPart>,
}

#[derive(Deserialize)]
struct GeminiReplyPart {
    text: Option<String>,
}

// -- Shared --

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

impl LlmClient {
    /// Build from config. Missing endpoint or key is a configuration error.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let provider = config.provider;
        let base_url = config
            .base_url
            .clone()
            .filter(|u| !u.trim().is_empty())
            .or_else(|| provider.default_base_url().map(String::from))
            .ok_or_else(|| {
                Error::config("LLM endpoint not configured: set llm.base_url or LLM_API_URL")
            })?;

        let env_var = config
            .api_key_env
            .clone()
            .unwrap_or_else(|| provider.default_api_key_env().into());
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var(&env_var).ok())
            .filter(|k| !k.trim().is_empty());
        if api_key.is_none() && provider.requires_api_key() {
            return Err(Error::config(format!(
                "API key for {provider:?} not configured: set llm.api_key or {env_var}"
            )));
        }

        let policy = RetryPolicy {
            max_attempts: config.max_attempts,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
        };
        let http = HttpClient::new(
            concat!("thinking-models/", env!("CARGO_PKG_VERSION")),
            Duration::from_secs(config.timeout_secs),
            policy,
        )?;

        Ok(Self {
            provider,
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.http = self.http.with_sleeper(sleeper);
        self
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Ping the provider with a trivial prompt.
    pub async fn test_connection(&self) -> bool {
        let messages = [ChatMessage::user(
            "Hello, please respond with 'OK' if you can hear me.",
        )];
        match self.complete(&messages, &GenerationOptions::default()).await {
            Ok(reply) => reply.to_lowercase().contains("ok"),
            Err(e) => {
                warn!("connection test failed: {e}");
                false
            }
        }
    }

    async fn complete_openai(
        &self,
        messages: &[ChatMessage],
        temperature: f64,
        max_tokens: u32,
    ) -> Result<String> {
        let request = OpenAiRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|m| Msg {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            temperature,
            max_tokens,
        };
        let body = serialize(&request)?;

        let bearer = self.api_key.as_ref().map(|k| format!("Bearer {k}"));
        let mut headers = Vec::new();
        if let Some(ref b) = bearer {
            headers.push(("Authorization", b.as_str()));
        }

        let response_text = self
            .http
            .post_json_raw(&openai_endpoint(&self.base_url), &body, &headers)
            .await
            .inspect_err(|e| warn!("LLM API error: {e}"))?;

        let resp: OpenAiResponse = serde_json::from_str(&response_text)
            .map_err(|e| Error::invalid_response(format!("parse LLM response: {e}")))?;

        let text = resp
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        non_empty(text, "LLM")
    }

    async fn complete_anthropic(
        &self,
        messages: &[ChatMessage],
        temperature: f64,
        max_tokens: u32,
    ) -> Result<String> {
        let (system, turns) = split_system(messages);
        let request = AnthropicRequest {
            model: &self.model,
            max_tokens,
            temperature,
            system,
            messages: turns
                .iter()
                .map(|m| Msg {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
        };
        let body = serialize(&request)?;

        let api_key = self.api_key.as_deref().unwrap_or_default();
        let url = format!("{}/messages", self.base_url);
        let response_text = self
            .http
            .post_json_raw(
                &url,
                &body,
                &[("x-api-key", api_key), ("anthropic-version", "2023-06-01")],
            )
            .await
            .inspect_err(|e| warn!("Anthropic API error: {e}"))?;

        let resp: AnthropicResponse = serde_json::from_str(&response_text)
            .map_err(|e| Error::invalid_response(format!("parse Anthropic response: {e}")))?;

        let text = resp
            .content
            .into_iter()
            .filter_map(|b| b.text)
            .collect::<Vec<_>>()
            .join("\n");
        non_empty(text, "Anthropic")
    }

    async fn complete_gemini(
        &self,
        messages: &[ChatMessage],
        temperature: f64,
        max_tokens: u32,
    ) -> Result<String> {
        let (system, turns) = split_system(messages);
        let request = GeminiRequest {
            system_instruction: (!system.is_empty()).then(|| GeminiContent {
                role: None,
                parts: vec![GeminiPart { text: &system }],
            }),
            contents: turns
                .iter()
                .map(|m| GeminiContent {
                    role: Some(match m.role {
                        Role::Assistant => "model",
                        _ => "user",
                    }),
                    parts: vec![GeminiPart { text: &m.content }],
                })
                .collect(),
            generation_config: GeminiGenerationConfig {
                temperature,
                max_output_tokens: max_tokens,
            },
        };
        let body = serialize(&request)?;

        let api_key = self.api_key.as_deref().unwrap_or_default();
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let response_text = self
            .http
            .post_json_raw(&url, &body, &[("x-goog-api-key", api_key)])
            .await
            .inspect_err(|e| warn!("Gemini API error: {e}"))?;

        let resp: GeminiResponse = serde_json::from_str(&response_text)
            .map_err(|e| Error::invalid_response(format!("parse Gemini response: {e}")))?;

        let text = resp
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .ok_or_else(|| Error::invalid_response("Gemini returned no candidates"))?;
        non_empty(text, "Gemini")
    }
}

#[async_trait]
impl Completion for LlmClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &GenerationOptions,
    ) -> Result<String> {
        let temperature = options.temperature.unwrap_or(self.temperature);
        let max_tokens = options.max_tokens.unwrap_or(self.max_tokens);
        debug!(
            provider = ?self.provider,
            model = %self.model,
            turns = messages.len(),
            "sending LLM request"
        );

        match self.provider {
            Provider::OpenAi => self.complete_openai(messages, temperature, max_tokens).await,
            Provider::Anthropic => self.complete_anthropic(messages, temperature, max_tokens).await,
            Provider::Gemini => self.complete_gemini(messages, temperature, max_tokens).await,
        }
    }
}

/// A reply with no text is unusable, whichever provider sent it.
fn non_empty(text: String, provider: &str) -> Result<String> {
    if text.trim().is_empty() {
        return Err(Error::invalid_response(format!("empty response from {provider}")));
    }
    Ok(text)
}

fn serialize<T: Serialize>(request: &T) -> Result<String> {
    serde_json::to_string(request)
        .map_err(|e| Error::invalid_input(format!("serialize request: {e}")))
}

/// `/v1` is appended unless the base URL already names the version.
fn openai_endpoint(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if base.ends_with("/v1") {
        format!("{base}/chat/completions")
    } else {
        format!("{base}/v1/chat/completions")
    }
}

/// Providers with a dedicated system slot get all system turns joined.
fn split_system(messages: &[ChatMessage]) -> (String, Vec<&ChatMessage>) {
    let system = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    let turns = messages.iter().filter(|m| m.role != Role::System).collect();
    (system, turns)
}
