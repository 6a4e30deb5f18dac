use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use super::{GeneratedImage, GenerationError, ImageGenerator, TextGenerator};
use crate::config::GenerationConfig;
use crate::http::RestClient;

/// OpenAI-compatible chat completions + images client.
pub struct OpenAiClient {
    client: RestClient,
    text_model: String,
    image_model: String,
}

#[derive(Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u8,
    size: &'a str,
}

#[derive(Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Deserialize)]
struct ImageData {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    b64_json: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiClient {
    pub fn new(config: &GenerationConfig, api_key: &str) -> Self {
        Self {
            client: RestClient::json_api(config.api_base.clone(), api_key),
            text_model: config.text_model.clone(),
            image_model: config.image_model.clone(),
        }
    }
}

#[async_trait]
impl TextGenerator for OpenAiClient {
    async fn complete(
        &self,
        system: &str,
        user: &str,
        max_tokens: u32,
    ) -> Result<String, GenerationError> {
        let request = json!({
            "model": self.text_model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user}
            ],
            "max_tokens": max_tokens,
            "response_format": {"type": "json_object"}
        });

        debug!(model = %self.text_model, max_tokens, "calling chat completions");
        let response: ChatResponse = self
            .client
            .post("/chat/completions", &request)
            .await
            .map_err(GenerationError::Text)?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(GenerationError::EmptyText)
    }
}

#[async_trait]
impl ImageGenerator for OpenAiClient {
    async fn generate(&self, prompt: &str, size: &str) -> Result<GeneratedImage, GenerationError> {
        let request = ImageRequest {
            model: &self.image_model,
            prompt,
            n: 1,
            size,
        };

        debug!(model = %self.image_model, size, "calling image generation");
        let response: ImageResponse = self
            .client
            .post("/images/generations", &request)
            .await
            .map_err(GenerationError::Image)?;

        let first = response
            .data
            .into_iter()
            .next()
            .ok_or(GenerationError::EmptyImage)?;

        // A hosted URL wins over base64 when both are present.
        match (first.url, first.b64_json) {
            (Some(url), _) if !url.is_empty() => Ok(GeneratedImage::Url(url)),
            (_, Some(data)) if !data.is_empty() => Ok(GeneratedImage::Base64(data)),
            _ => Err(GenerationError::EmptyImage),
        }
    }
}
