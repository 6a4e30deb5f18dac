pub mod openai;
pub mod prompt;

pub use prompt::GenerationResult;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::github::PullRequestSummary;
use crate::http::ApiError;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Text generation failed: {0}")]
    Text(#[source] ApiError),

    #[error("Image generation failed: {0}")]
    Image(#[source] ApiError),

    #[error("Text generation returned no content")]
    EmptyText,

    #[error("Image generation returned neither a URL nor base64 data")]
    EmptyImage,

    #[error("Generation reply is not the expected JSON: {0}")]
    Parse(#[source] serde_json::Error),
}

/// Image produced by the image generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratedImage {
    /// Hosted by the provider, usable as-is
    Url(String),
    /// Raw base64 payload that still needs hosting
    Base64(String),
}

/// A chat-style text model.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn complete(
        &self,
        system: &str,
        user: &str,
        max_tokens: u32,
    ) -> Result<String, GenerationError>;
}

/// An image model. `size` is a square resolution such as "1024x1024".
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, size: &str) -> Result<GeneratedImage, GenerationError>;
}

/// Ask the text model for an image prompt and caption describing the PR.
/// Malformed replies are recovered; only upstream failures are errors.
#[instrument(skip(text, pr), fields(pr = pr.number))]
pub async fn synthesize(
    text: &dyn TextGenerator,
    pr: &PullRequestSummary,
    max_tokens: u32,
) -> Result<GenerationResult, GenerationError> {
    let user = prompt::build_user_prompt(pr);
    debug!(user_chars = user.chars().count(), "requesting prompt and caption");

    let raw = text.complete(prompt::SYSTEM_PROMPT, &user, max_tokens).await?;
    let result = prompt::parse_generation(&raw);
    info!(
        prompt_chars = result.image_prompt.chars().count(),
        caption = %result.caption,
        "synthesized image prompt"
    );
    Ok(result)
}

/// Generate the image for a synthesized prompt. One attempt, no retry.
#[instrument(skip(images, image_prompt))]
pub async fn acquire(
    images: &dyn ImageGenerator,
    image_prompt: &str,
    size: &str,
) -> Result<GeneratedImage, GenerationError> {
    let image = images.generate(image_prompt, size).await?;
    match &image {
        GeneratedImage::Url(url) => info!(%url, "image generated with hosted URL"),
        GeneratedImage::Base64(data) => info!(b64_chars = data.len(), "image generated as base64"),
    }
    Ok(image)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Text generator returning a canned reply and recording what it was asked.
    #[derive(Default)]
    pub struct FakeText {
        pub reply: String,
        pub calls: Arc<AtomicUsize>,
        pub last_user: Mutex<Option<String>>,
    }

    impl FakeText {
        pub fn replying(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl TextGenerator for FakeText {
        async fn complete(
            &self,
            _system: &str,
            user: &str,
            _max_tokens: u32,
        ) -> Result<String, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_user.lock().unwrap() = Some(user.to_string());
            Ok(self.reply.clone())
        }
    }

    /// Image generator returning a fixed image and counting calls.
    pub struct FakeImages {
        pub image: GeneratedImage,
        pub calls: Arc<AtomicUsize>,
        pub last_prompt: Mutex<Option<String>>,
    }

    impl FakeImages {
        pub fn returning(image: GeneratedImage) -> Self {
            Self {
                image,
                calls: Arc::new(AtomicUsize::new(0)),
                last_prompt: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl ImageGenerator for FakeImages {
        async fn generate(
            &self,
            prompt: &str,
            _size: &str,
        ) -> Result<GeneratedImage, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_prompt.lock().unwrap() = Some(prompt.to_string());
            Ok(self.image.clone())
        }
    }

    pub fn test_pull_request() -> PullRequestSummary {
        PullRequestSummary {
            number: 42,
            title: "Add OAuth2 login flow".to_string(),
            body: None,
            author: "alice".to_string(),
            base_ref: "main".to_string(),
            head_ref: "feature/login".to_string(),
            head_repo: Some("octo/demo".to_string()),
            base_repo: "octo/demo".to_string(),
            changed_files: vec![],
        }
    }

    #[tokio::test]
    async fn test_synthesize_parses_reply() {
        let text = FakeText::replying(r#"{"imagePrompt":"a cat coding","caption":"meow-ge requests"}"#);
        let result = synthesize(&text, &test_pull_request(), 400).await.unwrap();
        assert_eq!(result.image_prompt, "a cat coding");
        assert_eq!(result.caption, "meow-ge requests");
        assert_eq!(text.calls.load(Ordering::SeqCst), 1);
        let user = text.last_user.lock().unwrap().clone().unwrap();
        assert!(user.contains("Add OAuth2 login flow"));
    }

    #[tokio::test]
    async fn test_synthesize_recovers_from_prose() {
        let text = FakeText::replying("just some prose");
        let result = synthesize(&text, &test_pull_request(), 400).await.unwrap();
        assert_eq!(result.image_prompt, "just some prose");
        assert_eq!(result.caption, prompt::DEFAULT_CAPTION);
    }

    #[tokio::test]
    async fn test_acquire_passes_prompt_through() {
        let images = FakeImages::returning(GeneratedImage::Url("https://img/1.png".to_string()));
        let image = acquire(&images, "a cat coding", "1024x1024").await.unwrap();
        assert_eq!(image, GeneratedImage::Url("https://img/1.png".to_string()));
        assert_eq!(
            images.last_prompt.lock().unwrap().as_deref(),
            Some("a cat coding")
        );
    }
}
