//! Ollama client for local LLM inference

use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::InMemoryState;
use governor::state::NotKeyed;
use governor::Quota;
use governor::RateLimiter;
use moka::future::Cache;
use reqwest::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use serde::Serialize;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use tracing::instrument;
use tracing::warn;
use triage_core::config::duration_ms;
use triage_core::error::Error;
use triage_core::error::Result;

use crate::CompletionParams;
use crate::LLMClient;
use crate::Message;

/// Ollama API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    /// Base URL (defaults to http://localhost:11434)
    pub base_url: String,
    /// Model to use
    pub model: String,
    /// HTTP request timeout, in milliseconds
    #[serde(with = "duration_ms")]
    pub timeout: Duration,
    /// Maximum attempts per request
    pub max_retries: u32,
    /// Rate limit (requests per minute)
    pub rate_limit: u32,
    /// Keep model loaded in memory, in milliseconds
    #[serde(with = "duration_ms")]
    pub keep_alive: Duration,
    /// Cache identical completions
    pub cache_responses: bool,
    /// Additional model options
    pub options: OllamaOptions,
}

/// Ollama model options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaOptions {
    /// Temperature for sampling (0.0 to 2.0)
    pub temperature: Option<f32>,
    /// Top-p sampling
    pub top_p: Option<f32>,
    /// Top-k sampling
    pub top_k: Option<u32>,
    /// Number of tokens to predict
    pub num_predict: Option<u32>,
    /// Stop sequences
    pub stop: Option<Vec<String>>,
    /// Context window size
    pub num_ctx: Option<u32>,
}

impl Default for OllamaOptions {
    fn default() -> Self {
        Self {
            temperature: Some(0.7),
            top_p: Some(1.0),
            top_k: Some(40),
            num_predict: Some(1000),
            stop: None,
            num_ctx: Some(4096),
        }
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.2".to_string(),
            timeout: Duration::from_secs(60),
            max_retries: 2,
            rate_limit: 120,
            keep_alive: Duration::from_secs(600),
            cache_responses: true,
            options: OllamaOptions::default(),
        }
    }
}

/// Ollama API client
pub struct OllamaClient {
    config: OllamaConfig,
    client: Client,
    rate_limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
    cache: Cache<String, String>,
}

impl OllamaClient {
    /// Create a new Ollama client
    pub fn new(config: OllamaConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        let rate_limit = NonZeroU32::new(config.rate_limit)
            .ok_or_else(|| Error::Configuration("Rate limit must be greater than 0".to_string()))?;
        let quota = Quota::per_minute(rate_limit);
        let rate_limiter = Arc::new(RateLimiter::direct(quota));

        let cache = Cache::builder()
            .time_to_live(Duration::from_secs(3600))
            .max_capacity(1000)
            .build();

        Ok(Self {
            config,
            client,
            rate_limiter,
            cache,
        })
    }

    /// Configuration in use
    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    /// List available models
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.config.base_url);

        #[derive(Deserialize)]
        struct TagsResponse {
            models: Vec<ModelInfo>,
        }

        #[derive(Deserialize)]
        struct ModelInfo {
            name: String,
        }

        let response = self.client.get(&url).send().await.map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(Error::unavailable(format!(
                "Failed to list models: HTTP {}",
                response.status()
            )));
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| Error::unavailable(format!("Failed to parse models response: {}", e)))?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Whether the configured model is installed; `llama3.2` matches `llama3.2:latest`
    pub async fn model_available(&self) -> Result<bool> {
        let models = self.list_models().await?;
        Ok(models.iter().any(|name| model_matches(name, &self.config.model)))
    }

    /// Make a request to the Ollama API, retrying up to `attempts` times
    async fn request<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        body: serde_json::Value,
        attempts: u32,
    ) -> Result<T> {
        let url = format!("{}/api/{}", self.config.base_url, endpoint);
        let attempts = attempts.max(1);

        for attempt in 0..attempts {
            self.rate_limiter.until_ready().await;

            let response = self
                .client
                .post(&url)
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await
                .map_err(transport_error)?;

            match response.status() {
                StatusCode::OK => {
                    return response.json::<T>().await.map_err(|e| {
                        Error::unavailable(format!("Failed to parse response: {}", e))
                    });
                }
                StatusCode::TOO_MANY_REQUESTS => {
                    warn!("Rate limited (attempt {}/{})", attempt + 1, attempts);
                    if attempt + 1 < attempts {
                        tokio::time::sleep(Duration::from_secs(2u64.pow(attempt))).await;
                    }
                }
                StatusCode::INTERNAL_SERVER_ERROR
                | StatusCode::BAD_GATEWAY
                | StatusCode::SERVICE_UNAVAILABLE => {
                    warn!("Server error (attempt {}/{})", attempt + 1, attempts);
                    if attempt + 1 < attempts {
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
                StatusCode::NOT_FOUND => {
                    let error_text = response.text().await.unwrap_or_default();
                    return Err(Error::unavailable(format!(
                        "Model {} not found: {}",
                        self.config.model, error_text
                    )));
                }
                status => {
                    let error_text = response.text().await.unwrap_or_default();
                    return Err(Error::unavailable(format!(
                        "API error {}: {}",
                        status, error_text
                    )));
                }
            }
        }

        Err(Error::unavailable("Max retries exceeded"))
    }

    fn chat_request(&self, messages: &[Message], params: &CompletionParams) -> OllamaChatRequest {
        let mut options = self.config.options.clone();
        if let Some(temp) = params.temperature {
            options.temperature = Some(temp);
        }
        if let Some(top_p) = params.top_p {
            options.top_p = Some(top_p);
        }
        if let Some(max_tokens) = params.max_tokens {
            options.num_predict = Some(max_tokens);
        }
        if let Some(stop) = &params.stop {
            options.stop = Some(stop.clone());
        }

        OllamaChatRequest {
            model: self.config.model.clone(),
            messages: messages
                .iter()
                .map(|m| OllamaMessage {
                    role: m.role.as_str().to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            options: Some(options),
            keep_alive: Some(format!("{}s", self.config.keep_alive.as_secs())),
            format: params.json_mode.then(|| "json".to_string()),
            stream: false,
        }
    }
}

fn transport_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(format!("Ollama request timed out: {}", e))
    } else {
        Error::unavailable(format!("Ollama request failed: {}", e))
    }
}

fn model_matches(installed: &str, wanted: &str) -> bool {
    installed == wanted
        || (!wanted.contains(':') && installed.split(':').next() == Some(wanted))
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    keep_alive: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<String>,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    message: Option<OllamaMessage>,
}

#[async_trait]
impl LLMClient for OllamaClient {
    #[instrument(skip(self, messages, params), fields(model = %self.config.model))]
    async fn complete(&self, messages: &[Message], params: &CompletionParams) -> Result<String> {
        let request = serde_json::to_value(self.chat_request(messages, params))?;

        let cache_key = request.to_string();
        if self.config.cache_responses {
            if let Some(cached) = self.cache.get(&cache_key).await {
                debug!("Cache hit for completion");
                return Ok(cached);
            }
        }

        let attempts = if params.single_attempt {
            1
        } else {
            self.config.max_retries
        };
        let response: OllamaResponse = self.request("chat", request, attempts).await?;
        let content = match response.message {
            Some(message) => message.content,
            None => response.response,
        };

        if content.trim().is_empty() {
            return Err(Error::unavailable("Ollama returned an empty completion"));
        }

        if self.config.cache_responses {
            self.cache.insert(cache_key, content.clone()).await;
        }
        Ok(content)
    }

    async fn health_check(&self) -> bool {
        match self.model_available().await {
            Ok(true) => true,
            Ok(false) => {
                warn!("Ollama is running but model {} is not installed", self.config.model);
                false
            }
            Err(e) => {
                warn!("Ollama not available: {}", e);
                false
            }
        }
    }

    fn provider_name(&self) -> &str {
        "ollama"
    }
}
