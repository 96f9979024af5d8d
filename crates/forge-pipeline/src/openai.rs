//! OpenAI-compatible provider clients.
//!
//! [`OpenAiContentGenerator`] calls `/chat/completions`;
//! [`OpenAiAssetGenerator`] calls `/images/generations` and decodes the
//! base64 payload. Neither retries. Timeouts are applied by the callers.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{AssetConfig, Config, GenerationConfig};
use crate::error::{AssetGenerationError, ForgeError, GenerationError, GenerationErrorKind, Result};
use crate::generator::{AssetGenerator, CandidateDocument, ContentGenerator, GeneratedAsset};
use crate::session::ConversationMessage;

/// Longest provider error body kept in an error message.
const MAX_ERROR_BODY: usize = 512;

fn build_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("lessonforge/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(ForgeError::http_client)
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}/{path}", base.trim_end_matches('/'))
}

/// Sends a JSON POST and returns the raw body of a 2xx response.
async fn post_json<T: Serialize + Sync>(
    client: &reqwest::Client,
    url: &str,
    api_key: &str,
    body: &T,
) -> std::result::Result<String, (GenerationErrorKind, String)> {
    let response = client
        .post(url)
        .bearer_auth(api_key)
        .json(body)
        .send()
        .await
        .map_err(|e| {
            let kind = if e.is_timeout() {
                GenerationErrorKind::Timeout
            } else {
                GenerationErrorKind::Transport
            };
            (kind, e.to_string())
        })?;

    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| (GenerationErrorKind::Transport, e.to_string()))?;

    if !status.is_success() {
        let mut detail: String = text.chars().take(MAX_ERROR_BODY).collect();
        if detail.trim().is_empty() {
            detail = status.to_string();
        }
        return Err((GenerationErrorKind::Status(status.as_u16()), detail));
    }
    Ok(text)
}

// ============================================================================
// Content generation
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ConversationMessage],
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: Option<String>,
}

/// Extracts the first choice's text from a chat-completions body.
pub fn parse_chat_completion(body: &str) -> std::result::Result<CandidateDocument, GenerationError> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| GenerationError::new(GenerationErrorKind::Decode, e.to_string()))?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| GenerationError::new(GenerationErrorKind::Empty, "response contained no content"))
}

/// Content generator backed by an OpenAI-compatible chat endpoint.
#[derive(Clone)]
pub struct OpenAiContentGenerator {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl OpenAiContentGenerator {
    /// Creates a generator for the given settings and key.
    pub fn new(config: &GenerationConfig, api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            url: join_url(&config.endpoint, "chat/completions"),
            api_key: api_key.into(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    /// Creates a generator, reading the key from the configured variable.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.generation, config.api_key()?)
    }
}

impl std::fmt::Debug for OpenAiContentGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiContentGenerator")
            .field("url", &self.url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish_non_exhaustive()
    }
}

impl ContentGenerator for OpenAiContentGenerator {
    async fn generate(
        &self,
        transcript: &[ConversationMessage],
    ) -> std::result::Result<CandidateDocument, GenerationError> {
        let request = ChatRequest {
            model: &self.model,
            messages: transcript,
            temperature: self.temperature,
        };
        debug!(model = %self.model, messages = transcript.len(), "Requesting chat completion");

        let body = post_json(&self.client, &self.url, &self.api_key, &request)
            .await
            .map_err(|(kind, message)| GenerationError::new(kind, message))?;
        parse_chat_completion(&body)
    }
}

// ============================================================================
// Asset generation
// ============================================================================

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u8,
    size: &'a str,
    response_format: &'static str,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    #[serde(default)]
    b64_json: Option<String>,
}

/// Decodes the first image of an images-generation body.
pub fn parse_image_response(body: &str) -> std::result::Result<GeneratedAsset, AssetGenerationError> {
    let response: ImageResponse = serde_json::from_str(body)
        .map_err(|e| AssetGenerationError::new(GenerationErrorKind::Decode, e.to_string()))?;
    let encoded = response
        .data
        .into_iter()
        .next()
        .and_then(|image| image.b64_json)
        .ok_or_else(|| {
            AssetGenerationError::new(GenerationErrorKind::Empty, "response contained no image data")
        })?;
    let data = BASE64
        .decode(encoded.trim())
        .map_err(|e| AssetGenerationError::new(GenerationErrorKind::Decode, e.to_string()))?;
    if data.is_empty() {
        return Err(AssetGenerationError::new(
            GenerationErrorKind::Empty,
            "image payload was empty",
        ));
    }
    let media_type = sniff_media_type(&data).to_string();
    Ok(GeneratedAsset { data, media_type })
}

/// Identifies common image formats by their leading bytes.
///
/// Falls back to `image/png`, the format requested from the provider.
#[must_use]
pub fn sniff_media_type(data: &[u8]) -> &'static str {
    if data.starts_with(b"\x89PNG\r\n\x1a\n") {
        return "image/png";
    }
    if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return "image/jpeg";
    }
    if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
        return "image/webp";
    }
    let head = String::from_utf8_lossy(&data[..data.len().min(256)]);
    let head = head.trim_start();
    if head.starts_with("<svg") || (head.starts_with("<?xml") && head.contains("<svg")) {
        return "image/svg+xml";
    }
    "image/png"
}

/// Asset generator backed by an OpenAI-compatible images endpoint.
#[derive(Clone)]
pub struct OpenAiAssetGenerator {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
}

impl OpenAiAssetGenerator {
    /// Creates a generator for the given settings and key.
    pub fn new(config: &AssetConfig, api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            url: join_url(&config.endpoint, "images/generations"),
            api_key: api_key.into(),
            model: config.model.clone(),
        })
    }

    /// Creates a generator, reading the key from the configured variable.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.assets, config.api_key()?)
    }
}

impl std::fmt::Debug for OpenAiAssetGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiAssetGenerator")
            .field("url", &self.url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl AssetGenerator for OpenAiAssetGenerator {
    async fn generate_asset(
        &self,
        prompt_text: &str,
        size_hint: &str,
    ) -> std::result::Result<GeneratedAsset, AssetGenerationError> {
        let request = ImageRequest {
            model: &self.model,
            prompt: prompt_text,
            n: 1,
            size: size_hint,
            response_format: "b64_json",
        };
        debug!(model = %self.model, size = size_hint, "Requesting image generation");

        let body = post_json(&self.client, &self.url, &self.api_key, &request)
            .await
            .map_err(|(kind, message)| AssetGenerationError::new(kind, message))?;
        parse_image_response(&body)
    }
}
