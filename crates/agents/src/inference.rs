//! Inference clients for embeddings (TEI or Ollama) and text generation
//! (TGI or Ollama).

use crate::config::{env_flag, env_or_default, env_positive_u64};
use crate::{AgentError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_EMBED_URL: &str = "http://localhost:8081";
const DEFAULT_EMBED_PROVIDER: &str = "tei";
const DEFAULT_OLLAMA_EMBED_MODEL: &str = "nomic-embed-text:latest";
const DEFAULT_LLM_URL: &str = "http://localhost:8082";
const DEFAULT_LLM_PROVIDER: &str = "tgi";
const DEFAULT_OLLAMA_MODEL: &str = "phi4-mini:latest";
const DEFAULT_EMBED_MAX_BATCH: usize = 32;
const DEFAULT_LLM_TIMEOUT_SECS: u64 = 120;
const DEFAULT_MAX_NEW_TOKENS: u32 = 1024;
const DEFAULT_OLLAMA_JSON_FORMAT: bool = true;

/// Near-zero temperature: answers should be reproducible citations of the
/// guideline, not creative text.
pub const GENERATION_TEMPERATURE: f32 = 0.1;

/// Turns text into vectors. Implemented by [`EmbeddingClient`]; tests use
/// deterministic fakes.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a search query
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed document passages, one vector per input, in order
    async fn embed_passages(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Maps a prompt to the model's raw text response. No structure is promised.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EmbedProvider {
    Tei,
    Ollama,
}

#[derive(Clone)]
pub struct EmbeddingClient {
    client: Client,
    base_url: String,
    provider: EmbedProvider,
    model: String,
}

impl EmbeddingClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            provider: EmbedProvider::Tei,
            model: DEFAULT_OLLAMA_EMBED_MODEL.to_string(),
        }
    }

    pub fn ollama(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            provider: EmbedProvider::Ollama,
            model: model.into(),
        }
    }

    pub fn default_local() -> Self {
        let provider = env_or_default("EMBED_PROVIDER", DEFAULT_EMBED_PROVIDER);
        if provider.eq_ignore_ascii_case("ollama") {
            let url = env_or_default("EMBED_URL", "http://localhost:11434");
            let model = env_or_default("EMBED_MODEL", DEFAULT_OLLAMA_EMBED_MODEL);
            Self::ollama(url, model)
        } else {
            Self::new(env_or_default("EMBED_URL", DEFAULT_EMBED_URL))
        }
    }

    pub async fn embed(&self, text: &str, is_query: bool) -> Result<Vec<f32>> {
        if matches!(self.provider, EmbedProvider::Ollama) {
            return self.ollama_embed(text).await;
        }

        let url = format!("{}/embed", self.base_url);
        let prompt_name = prompt_name(is_query);
        let request = TeiEmbedRequest {
            inputs: text,
            truncate: true,
            prompt_name: prompt_name.as_deref(),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await?;

        let embedding = parse_embedding_response(response)?;
        validate_embedding(&embedding)?;
        Ok(embedding)
    }

    pub async fn embed_batch(&self, texts: &[String], is_query: bool) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        if matches!(self.provider, EmbedProvider::Ollama) {
            let mut results = Vec::with_capacity(texts.len());
            for text in texts {
                results.push(self.ollama_embed(text).await?);
            }
            return Ok(results);
        }

        let prompt_name = prompt_name(is_query);
        let max_batch = std::env::var("EMBED_MAX_BATCH")
            .ok()
            .and_then(|value| value.parse::<usize>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_EMBED_MAX_BATCH);

        let url = format!("{}/embed", self.base_url);
        let mut results = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(max_batch) {
            let request = TeiEmbedBatchRequest {
                inputs: chunk,
                truncate: true,
                prompt_name: prompt_name.as_deref(),
            };

            let response = self
                .client
                .post(&url)
                .json(&request)
                .send()
                .await?
                .error_for_status()?
                .json::<Value>()
                .await?;

            let embeddings = parse_embeddings_response(response)?;
            if embeddings.len() != chunk.len() {
                return Err(AgentError::Processing(format!(
                    "Embedding service returned {} vectors for {} inputs",
                    embeddings.len(),
                    chunk.len()
                )));
            }
            for embedding in &embeddings {
                validate_embedding(embedding)?;
            }
            results.extend(embeddings);
        }

        Ok(results)
    }

    pub async fn health(&self) -> Result<bool> {
        let url = match self.provider {
            EmbedProvider::Tei => format!("{}/health", self.base_url),
            EmbedProvider::Ollama => format!("{}/api/tags", self.base_url),
        };
        let response = self.client.get(&url).send().await?;
        Ok(response.status().is_success())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn ollama_embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);
        let request = OllamaEmbedRequest {
            model: self.model.clone(),
            prompt: text.to_string(),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json::<OllamaEmbedResponse>()
            .await?;

        validate_embedding(&response.embedding)?;
        Ok(response.embedding)
    }
}

#[async_trait]
impl Embedder for EmbeddingClient {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(text, true).await
    }

    async fn embed_passages(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.embed_batch(texts, false).await
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LlmProvider {
    Tgi,
    Ollama,
}

#[derive(Clone)]
pub struct GenerationClient {
    client: Client,
    base_url: String,
    provider: LlmProvider,
    model: String,
    temperature: f32,
    timeout: Duration,
}

impl GenerationClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            provider: LlmProvider::Tgi,
            model: DEFAULT_OLLAMA_MODEL.to_string(),
            temperature: GENERATION_TEMPERATURE,
            timeout: Duration::from_secs(DEFAULT_LLM_TIMEOUT_SECS),
        }
    }

    pub fn ollama(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: LlmProvider::Ollama,
            model: model.into(),
            ..Self::new(base_url)
        }
    }

    pub fn default_local() -> Self {
        let provider = env_or_default("LLM_PROVIDER", DEFAULT_LLM_PROVIDER);
        let client = if provider.eq_ignore_ascii_case("ollama") {
            let url = env_or_default("LLM_URL", "http://localhost:11434");
            let model = env_or_default("LLM_MODEL", DEFAULT_OLLAMA_MODEL);
            Self::ollama(url, model)
        } else {
            Self::new(env_or_default("LLM_URL", DEFAULT_LLM_URL))
        };
        let secs = env_positive_u64("LLM_TIMEOUT_SECS", DEFAULT_LLM_TIMEOUT_SECS);
        client.with_timeout(Duration::from_secs(secs))
    }

    /// Builder pattern: set HTTP timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub async fn health(&self) -> Result<bool> {
        let url = match self.provider {
            LlmProvider::Tgi => format!("{}/health", self.base_url),
            LlmProvider::Ollama => format!("{}/api/tags", self.base_url),
        };
        let response = self.client.get(&url).send().await?;
        Ok(response.status().is_success())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn tgi_generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/generate", self.base_url);
        let request = TgiGenerateRequest {
            inputs: prompt.to_string(),
            parameters: TgiParameters {
                max_new_tokens: Some(DEFAULT_MAX_NEW_TOKENS),
                temperature: Some(self.temperature),
                return_full_text: Some(false),
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await?;

        extract_generated_text(response)
    }

    async fn ollama_generate(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);
        // Ollama can constrain output to JSON; the normalizer still copes
        // when it is turned off.
        let format = env_flag("LLM_OLLAMA_JSON", DEFAULT_OLLAMA_JSON_FORMAT)
            .then(|| "json".to_string());
        let request = OllamaGenerateRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
            format,
            options: Some(json!({ "temperature": self.temperature })),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?
            .json::<OllamaGenerateResponse>()
            .await?;

        if let Some(total_ms) = response.total_duration.map(|ns| ns as f64 / 1_000_000.0) {
            debug!("Ollama generate total_duration_ms={:.2}", total_ms);
        }

        Ok(response.response)
    }
}

#[async_trait]
impl Generator for GenerationClient {
    #[instrument(skip(self, prompt), fields(prompt_chars = prompt.len()))]
    async fn generate(&self, prompt: &str) -> Result<String> {
        let result = match self.provider {
            LlmProvider::Tgi => self.tgi_generate(prompt).await,
            LlmProvider::Ollama => self.ollama_generate(prompt).await,
        };
        result.map_err(|e| match e {
            AgentError::Http(err) => AgentError::upstream("generation", err),
            other => other,
        })
    }
}

fn prompt_name(is_query: bool) -> Option<String> {
    if is_query {
        std::env::var("EMBED_PROMPT_NAME_QUERY").ok()
    } else {
        std::env::var("EMBED_PROMPT_NAME_PASSAGE").ok()
    }
}

fn validate_embedding(embedding: &[f32]) -> Result<()> {
    if embedding.is_empty() {
        return Err(AgentError::Processing(
            "Embedding service returned an empty vector".to_string(),
        ));
    }
    if embedding.iter().any(|v| !v.is_finite()) {
        return Err(AgentError::Processing(
            "Embedding contains non-finite values".to_string(),
        ));
    }
    Ok(())
}

#[derive(Serialize)]
struct TeiEmbedRequest<'a> {
    inputs: &'a str,
    truncate: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    prompt_name: Option<&'a str>,
}

#[derive(Serialize)]
struct TeiEmbedBatchRequest<'a> {
    inputs: &'a [String],
    truncate: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    prompt_name: Option<&'a str>,
}

#[derive(Serialize)]
struct TgiGenerateRequest {
    inputs: String,
    parameters: TgiParameters,
}

#[derive(Serialize)]
struct TgiParameters {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_new_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    return_full_text: Option<bool>,
}

#[derive(Serialize)]
struct OllamaGenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<Value>,
}

#[derive(Serialize)]
struct OllamaEmbedRequest {
    model: String,
    prompt: String,
}

#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
    #[serde(default)]
    total_duration: Option<u64>,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embedding: Vec<f32>,
}

fn parse_embedding_response(value: Value) -> Result<Vec<f32>> {
    match value {
        Value::Array(items) => {
            if items.is_empty() {
                return Ok(Vec::new());
            }
            if items.first().map(|v| v.is_number()).unwrap_or(false) {
                serde_json::from_value(Value::Array(items)).map_err(|e| {
                    AgentError::Processing(format!("Invalid embedding array: {}", e))
                })
            } else {
                let first = items
                    .into_iter()
                    .next()
                    .ok_or_else(|| AgentError::Processing("Missing embeddings".to_string()))?;
                serde_json::from_value(first).map_err(|e| {
                    AgentError::Processing(format!("Invalid embedding array: {}", e))
                })
            }
        }
        other => Err(AgentError::Processing(format!(
            "Unexpected embedding response format: {}",
            other
        ))),
    }
}

fn parse_embeddings_response(value: Value) -> Result<Vec<Vec<f32>>> {
    match value {
        Value::Array(items) => {
            if items.is_empty() {
                return Ok(Vec::new());
            }
            if items.first().map(|v| v.is_array()).unwrap_or(false) {
                serde_json::from_value(Value::Array(items)).map_err(|e| {
                    AgentError::Processing(format!("Invalid embeddings response: {}", e))
                })
            } else {
                let single: Vec<f32> = serde_json::from_value(Value::Array(items)).map_err(|e| {
                    AgentError::Processing(format!("Invalid embedding array: {}", e))
                })?;
                Ok(vec![single])
            }
        }
        other => Err(AgentError::Processing(format!(
            "Unexpected embedding response format: {}",
            other
        ))),
    }
}

fn extract_generated_text(value: Value) -> Result<String> {
    match value {
        Value::Array(mut items) => {
            let first = items
                .pop()
                .ok_or_else(|| AgentError::Processing("Empty TGI response array".to_string()))?;
            extract_generated_text(first)
        }
        Value::Object(mut obj) => {
            if let Some(Value::String(text)) = obj.remove("generated_text") {
                Ok(text)
            } else if let Some(Value::String(text)) = obj.remove("response") {
                Ok(text)
            } else {
                Err(AgentError::Processing(
                    "TGI response missing generated text field".to_string(),
                ))
            }
        }
        other => Err(AgentError::Processing(format!(
            "Unexpected TGI response format: {}",
            other
        ))),
    }
}
