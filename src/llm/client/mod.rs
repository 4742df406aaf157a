//! HTTP client for Ollama and OpenAI-compatible model servers.

mod config;

use std::path::Path;
use std::time::Duration;

use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

pub use config::{LlmConfig, LlmProvider};

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Failed to connect to LLM service
    #[error("Connection error: {0}")]
    Connection(String),
    /// API returned an error
    #[error("API error: {0}")]
    Api(String),
    /// Failed to parse response
    #[error("Parse error: {0}")]
    Parse(String),
    /// Failed to read an image attachment
    #[error("Image error: {0}")]
    Image(String),
    /// LLM is disabled
    #[error("LLM is disabled")]
    Disabled,
}

/// A base64-encoded image ready to attach to a prompt.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub data: String,
    pub mime_type: &'static str,
}

impl EncodedImage {
    fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// Read an image file and encode it as base64.
pub fn encode_image_base64(image_path: &Path) -> Result<EncodedImage, LlmError> {
    let bytes = std::fs::read(image_path)
        .map_err(|e| LlmError::Image(format!("{}: {}", image_path.display(), e)))?;
    let data = base64::engine::general_purpose::STANDARD.encode(&bytes);

    let ext = image_path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());
    let mime_type = match ext.as_deref() {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("tif") | Some("tiff") => "image/tiff",
        Some("bmp") => "image/bmp",
        _ => "image/jpeg",
    };

    Ok(EncodedImage { data, mime_type })
}

/// LLM client shared by the reasoning model and the vision OCR backend.
#[derive(Clone)]
pub struct LlmClient {
    config: LlmConfig,
    client: Client,
}

/// Ollama generate request format.
#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<&'a str>,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

/// Ollama request that only changes model residency.
#[derive(Debug, Serialize)]
struct OllamaKeepAlive<'a> {
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    keep_alive: Option<i64>,
}

/// Ollama generate response format.
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

#[derive(Debug, Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// OpenAI chat completion request format.
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: Vec<ChatContent>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ChatContent {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ChatImageUrl },
}

#[derive(Debug, Serialize)]
struct ChatImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl LlmClient {
    /// Create a new LLM client with the given configuration.
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Connection(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Get the config.
    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.endpoint.trim_end_matches('/'), path)
    }

    fn ensure_enabled(&self) -> Result<(), LlmError> {
        if self.config.enabled {
            Ok(())
        } else {
            Err(LlmError::Disabled)
        }
    }

    /// Check if the LLM service is reachable.
    pub async fn is_available(&self) -> bool {
        if !self.config.enabled {
            return false;
        }
        let url = match self.config.provider {
            LlmProvider::Ollama => self.url("/api/tags"),
            LlmProvider::OpenAI => self.url("/v1/models"),
        };
        let mut req = self.client.get(&url);
        if let Some(ref key) = self.config.api_key {
            req = req.bearer_auth(key);
        }
        match req.send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    /// List models the server knows about.
    pub async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        self.ensure_enabled()?;

        #[derive(Deserialize)]
        struct TagsResponse {
            models: Vec<TagInfo>,
        }
        #[derive(Deserialize)]
        struct TagInfo {
            name: String,
        }
        #[derive(Deserialize)]
        struct ModelsResponse {
            data: Vec<ModelInfo>,
        }
        #[derive(Deserialize)]
        struct ModelInfo {
            id: String,
        }

        match self.config.provider {
            LlmProvider::Ollama => {
                let resp = self.get_json(&self.url("/api/tags")).await?;
                let tags: TagsResponse =
                    serde_json::from_value(resp).map_err(|e| LlmError::Parse(e.to_string()))?;
                Ok(tags.models.into_iter().map(|m| m.name).collect())
            }
            LlmProvider::OpenAI => {
                let resp = self.get_json(&self.url("/v1/models")).await?;
                let models: ModelsResponse =
                    serde_json::from_value(resp).map_err(|e| LlmError::Parse(e.to_string()))?;
                Ok(models.data.into_iter().map(|m| m.id).collect())
            }
        }
    }

    /// Run a prompt against `model`, optionally with images attached.
    pub async fn generate(
        &self,
        model: &str,
        prompt: &str,
        images: &[EncodedImage],
    ) -> Result<String, LlmError> {
        self.ensure_enabled()?;
        debug!(
            "Generating with {} ({} chars, {} images)",
            model,
            prompt.len(),
            images.len()
        );
        match self.config.provider {
            LlmProvider::Ollama => self.call_ollama(model, prompt, images).await,
            LlmProvider::OpenAI => self.call_openai(model, prompt, images).await,
        }
    }

    /// Compute an embedding vector for `text`.
    pub async fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>, LlmError> {
        self.ensure_enabled()?;
        match self.config.provider {
            LlmProvider::Ollama => {
                let request = OllamaEmbedRequest { model, input: text };
                let value = self.post_json(&self.url("/api/embed"), &request).await?;
                let resp: OllamaEmbedResponse =
                    serde_json::from_value(value).map_err(|e| LlmError::Parse(e.to_string()))?;
                resp.embeddings
                    .into_iter()
                    .next()
                    .ok_or_else(|| LlmError::Parse("Empty embedding response".to_string()))
            }
            LlmProvider::OpenAI => {
                let request = EmbeddingsRequest { model, input: text };
                let value = self.post_json(&self.url("/v1/embeddings"), &request).await?;
                let resp: EmbeddingsResponse =
                    serde_json::from_value(value).map_err(|e| LlmError::Parse(e.to_string()))?;
                resp.data
                    .into_iter()
                    .next()
                    .map(|d| d.embedding)
                    .ok_or_else(|| LlmError::Parse("Empty embedding response".to_string()))
            }
        }
    }

    /// Ask the server to bring `model` into memory.
    ///
    /// Only Ollama exposes residency control; OpenAI-compatible servers keep
    /// whatever they were started with.
    pub async fn load_model(&self, model: &str) -> Result<(), LlmError> {
        self.ensure_enabled()?;
        if self.config.provider != LlmProvider::Ollama {
            return Ok(());
        }
        info!("Loading {} on model server", model);
        let request = OllamaKeepAlive {
            model,
            keep_alive: None,
        };
        self.post_json(&self.url("/api/generate"), &request).await?;
        Ok(())
    }

    /// Ask the server to evict `model` from memory.
    pub async fn unload_model(&self, model: &str) -> Result<(), LlmError> {
        self.ensure_enabled()?;
        if self.config.provider != LlmProvider::Ollama {
            return Ok(());
        }
        info!("Unloading {} from model server", model);
        let request = OllamaKeepAlive {
            model,
            keep_alive: Some(0),
        };
        self.post_json(&self.url("/api/generate"), &request).await?;
        Ok(())
    }

    async fn call_ollama(
        &self,
        model: &str,
        prompt: &str,
        images: &[EncodedImage],
    ) -> Result<String, LlmError> {
        let request = OllamaRequest {
            model,
            prompt,
            stream: false,
            images: images.iter().map(|i| i.data.as_str()).collect(),
            options: OllamaOptions {
                temperature: self.config.temperature,
                num_predict: self.config.max_tokens,
            },
        };

        let value = self.post_json(&self.url("/api/generate"), &request).await?;
        let resp: OllamaResponse =
            serde_json::from_value(value).map_err(|e| LlmError::Parse(e.to_string()))?;
        Ok(resp.response)
    }

    async fn call_openai(
        &self,
        model: &str,
        prompt: &str,
        images: &[EncodedImage],
    ) -> Result<String, LlmError> {
        let mut content = vec![ChatContent::Text {
            text: prompt.to_string(),
        }];
        for image in images {
            content.push(ChatContent::ImageUrl {
                image_url: ChatImageUrl {
                    url: image.data_url(),
                },
            });
        }

        let request = ChatRequest {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content,
            }],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let value = self
            .post_json(&self.url("/v1/chat/completions"), &request)
            .await?;
        let resp: ChatResponse =
            serde_json::from_value(value).map_err(|e| LlmError::Parse(e.to_string()))?;
        resp.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::Parse("No choices in completion response".to_string()))
    }

    async fn get_json(&self, url: &str) -> Result<serde_json::Value, LlmError> {
        let mut req = self.client.get(url);
        if let Some(ref key) = self.config.api_key {
            req = req.bearer_auth(key);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| LlmError::Connection(e.to_string()))?;
        Self::read_json(resp).await
    }

    async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
    ) -> Result<serde_json::Value, LlmError> {
        let mut req = self.client.post(url).json(body);
        if let Some(ref key) = self.config.api_key {
            req = req.bearer_auth(key);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| LlmError::Connection(e.to_string()))?;
        Self::read_json(resp).await
    }

    async fn read_json(resp: reqwest::Response) -> Result<serde_json::Value, LlmError> {
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("HTTP {}: {}", status, body)));
        }
        resp.json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))
    }
}
