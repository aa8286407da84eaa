use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::{Client, ClientBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::config::ProviderConfig;

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const OPENROUTER_API_BASE: &str = "https://openrouter.ai/api/v1";

// Create a static client to reuse connections
static CLIENT: Lazy<Client> = Lazy::new(|| {
    ClientBuilder::new()
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(10)
        .build()
        .expect("Failed to build HTTP client")
});

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("provider returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("malformed provider response: {0}")]
    MalformedResponse(String),
}

/// A text-generation service that can answer an analysis prompt.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError>;

    fn name(&self) -> &str;
}

pub fn provider_from_config(config: &ProviderConfig) -> Arc<dyn Provider> {
    match config {
        ProviderConfig::Gemini { api_key, model } => {
            Arc::new(GeminiProvider::new(api_key.clone(), model.clone()))
        }
        ProviderConfig::OpenRouter { api_key, model } => {
            Arc::new(OpenRouterProvider::new(api_key.clone(), model.clone()))
        }
    }
}

async fn read_json(res: Response) -> Result<Value, ProviderError> {
    let status = res.status();
    if !status.is_success() {
        let body = res.text().await.unwrap_or_default();
        return Err(ProviderError::Status {
            status: status.as_u16(),
            message: error_message(&body),
        });
    }

    let body = res.text().await?;
    serde_json::from_str(&body).map_err(|e| ProviderError::MalformedResponse(e.to_string()))
}

/// Pulls `error.message` out of an error body when the provider sends one.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

/// Google Generative Language API with Google Search grounding.
pub struct GeminiProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiProvider {
    pub fn new(api_key: String, model: String) -> Self {
        Self::with_base_url(api_key, model, GEMINI_API_BASE.to_string())
    }

    pub fn with_base_url(api_key: String, model: String, base_url: String) -> Self {
        Self {
            client: CLIENT.clone(),
            api_key,
            model,
            base_url,
        }
    }
}

/// Concatenates the text parts of the first candidate.
///
/// Blocked prompts come back without candidates; that is reported as an
/// empty answer rather than a malformed one.
pub fn gemini_text(response: &Value) -> String {
    response["candidates"][0]["content"]["parts"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part["text"].as_str())
                .collect::<String>()
        })
        .unwrap_or_default()
}

#[async_trait]
impl Provider for GeminiProvider {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "tools": [{ "google_search": {} }],
        });

        let res = self
            .client
            .post(format!("{}/models/{}:generateContent", self.base_url, self.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let json = read_json(res).await?;
        Ok(gemini_text(&json))
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
}

/// OpenRouter chat completions. Web search comes from an `:online` model slug.
pub struct OpenRouterProvider {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenRouterProvider {
    pub fn new(api_key: String, model: String) -> Self {
        Self::with_base_url(api_key, model, OPENROUTER_API_BASE.to_string())
    }

    pub fn with_base_url(api_key: String, model: String, base_url: String) -> Self {
        Self {
            client: CLIENT.clone(),
            api_key,
            model,
            base_url,
        }
    }
}

pub fn openrouter_text(response: &Value) -> Result<String, ProviderError> {
    match &response["choices"][0]["message"]["content"] {
        Value::String(text) => Ok(text.clone()),
        Value::Null => Ok(String::new()),
        _ => Err(ProviderError::MalformedResponse(
            "Invalid response format from LLM".to_string(),
        )),
    }
}

#[async_trait]
impl Provider for OpenRouterProvider {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let body = ChatRequest {
            model: self.model.clone(),
            messages: vec![Message {
                role: "user".into(),
                content: prompt.into(),
            }],
        };

        let res = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let json = read_json(res).await?;
        openrouter_text(&json)
    }

    fn name(&self) -> &str {
        "openrouter"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub supported_generation_methods: Vec<String>,
}

#[derive(Deserialize)]
struct ModelList {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

/// Lists the Gemini models a key can use.
pub async fn list_gemini_models(api_key: &str) -> Result<Vec<ModelInfo>, ProviderError> {
    let res = CLIENT
        .get(format!("{GEMINI_API_BASE}/models"))
        .header("x-goog-api-key", api_key)
        .send()
        .await?;

    let json = read_json(res).await?;
    let list: ModelList = serde_json::from_value(json)
        .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;
    Ok(list.models)
}
