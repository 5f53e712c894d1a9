use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::LlmSettings;

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4-turbo-preview";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Failure of a single completion request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    /// Credentials were refused. Ends the run.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Endpoint, deployment or model does not exist. Ends the run.
    #[error("bad provider configuration: {0}")]
    Config(String),

    /// Worth another attempt: network trouble, throttling, server errors.
    #[error("transient failure: {0}")]
    Transient(String),

    /// The provider refused this particular request; retrying will not help.
    #[error("request rejected: {0}")]
    Rejected(String),
}

/// A chat model that turns a system + user prompt into text.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, LlmError>;
}

/// Where completions are sent, resolved from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provider {
    Azure {
        api_key: String,
        endpoint: String,
        deployment: String,
    },
    OpenAi {
        api_key: String,
        base_url: String,
        model: String,
    },
}

impl Provider {
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Azure wins when all three of its variables are set, as the key alone is not enough.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let (Some(api_key), Some(endpoint), Some(deployment)) = (
            get("AZURE_OPENAI_API_KEY"),
            get("AZURE_OPENAI_ENDPOINT"),
            get("AZURE_OPENAI_DEPLOYMENT"),
        ) {
            return Some(Provider::Azure {
                api_key,
                endpoint,
                deployment,
            });
        }

        get("OPENAI_API_KEY").map(|api_key| Provider::OpenAi {
            api_key,
            base_url: get("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::Azure { .. } => "Azure OpenAI",
            Provider::OpenAi { .. } => "OpenAI",
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Chat-completions client for OpenAI and Azure OpenAI.
pub struct OpenAiClient {
    http: Client,
    provider: Provider,
    settings: LlmSettings,
}

impl OpenAiClient {
    pub fn new(provider: Provider, settings: LlmSettings) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        info!("Using {} for attribute extraction", provider.name());

        Ok(Self {
            http,
            provider,
            settings,
        })
    }

    fn endpoint(&self) -> String {
        match &self.provider {
            Provider::Azure {
                endpoint, deployment, ..
            } => format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                endpoint.trim_end_matches('/'),
                deployment,
                self.settings.azure_api_version
            ),
            Provider::OpenAi { base_url, .. } => {
                format!("{}/chat/completions", base_url.trim_end_matches('/'))
            }
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, LlmError> {
        let model = match &self.provider {
            Provider::OpenAi { model, .. } => Some(model.as_str()),
            Provider::Azure { .. } => None,
        };
        let body = ChatRequest {
            model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
            response_format: ResponseFormat { kind: "json_object" },
        };

        let request = self.http.post(self.endpoint()).json(&body);
        let request = match &self.provider {
            Provider::Azure { api_key, .. } => request.header("api-key", api_key),
            Provider::OpenAi { api_key, .. } => request.bearer_auth(api_key),
        };

        let response = request
            .send()
            .await
            .map_err(|e| LlmError::Transient(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(classify_status(status, detail));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Transient(format!("malformed completion envelope: {}", e)))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| LlmError::Transient("completion had no content".to_string()))?;

        debug!("LLM output: {}", content);
        Ok(content)
    }
}

fn classify_status(status: StatusCode, detail: String) -> LlmError {
    let message = format!("HTTP {}: {}", status, detail.trim());
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LlmError::Auth(message),
        StatusCode::NOT_FOUND => LlmError::Config(message),
        StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT => LlmError::Transient(message),
        s if s.is_server_error() => LlmError::Transient(message),
        _ => LlmError::Rejected(message),
    }
}
