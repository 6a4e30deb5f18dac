use serde::Deserialize;
use tracing::warn;

use super::GenerationError;
use crate::github::PullRequestSummary;

pub const MAX_BODY_CHARS: usize = 2000;
pub const MAX_PROMPT_CHARS: usize = 800;
pub const MAX_CAPTION_CHARS: usize = 200;

/// Caption used when the model's reply is not the expected JSON.
pub const DEFAULT_CAPTION: &str = "This PR, as seen by an overcaffeinated cartoonist.";

pub const SYSTEM_PROMPT: &str = "You are a witty cartoonist who illustrates software pull requests.
Given a summary of a pull request, invent one funny, single-panel cartoon about it.
Rules:
- Keep it safe for work and kind; poke fun at the code, never at people.
- No logos, trademarks, brand names, or likenesses of real people.
- Prefer a playful cartoon or comic illustration style.
- No text or lettering inside the image.
- The image prompt must be under 120 words.
Respond with a JSON object only, with exactly these keys:
{\"imagePrompt\": \"<prompt for an image model>\", \"caption\": \"<one-line caption, under 200 characters>\"}";

/// Prompt and caption extracted from the model reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResult {
    pub image_prompt: String,
    pub caption: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawGeneration {
    #[serde(default)]
    image_prompt: Option<String>,
    #[serde(default)]
    caption: Option<String>,
}

/// Build the user message describing the PR.
pub fn build_user_prompt(pr: &PullRequestSummary) -> String {
    let body = match pr.body.as_deref() {
        Some(body) => truncate_chars(body.trim(), MAX_BODY_CHARS),
        None => "(no description provided)".to_string(),
    };

    let mut prompt = String::new();
    prompt.push_str(&format!("Title: {}\n", pr.title));
    prompt.push_str(&format!("Author: {}\n", pr.author));
    prompt.push_str(&format!("Branches: {} <- {}\n\n", pr.base_ref, pr.head_ref));
    prompt.push_str("Description:\n");
    prompt.push_str(&body);
    prompt.push_str("\n\nChanged files:\n");
    if pr.changed_files.is_empty() {
        prompt.push_str("(none listed)\n");
    } else {
        for file in &pr.changed_files {
            prompt.push_str(&format!("- {}: {}\n", file.status, file.filename));
        }
    }
    prompt
}

/// Strict parse of the model reply. Errors are expected and recovered by
/// [`parse_generation`].
pub fn parse_structured(raw: &str) -> Result<GenerationResult, GenerationError> {
    let parsed: RawGeneration =
        serde_json::from_str(strip_code_fence(raw)).map_err(GenerationError::Parse)?;

    let image_prompt = parsed
        .image_prompt
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| raw.trim().to_string());
    let caption = parsed
        .caption
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_CAPTION.to_string());

    Ok(GenerationResult {
        image_prompt: truncate_chars(image_prompt.trim(), MAX_PROMPT_CHARS),
        caption: truncate_chars(caption.trim(), MAX_CAPTION_CHARS),
    })
}

/// Parse the model reply, falling back to the raw text as the image prompt
/// and [`DEFAULT_CAPTION`] when it is not the expected JSON object.
pub fn parse_generation(raw: &str) -> GenerationResult {
    parse_structured(raw).unwrap_or_else(|err| {
        warn!(error = %err, "generation reply was not JSON, using raw text as prompt");
        GenerationResult {
            image_prompt: truncate_chars(raw.trim(), MAX_PROMPT_CHARS),
            caption: DEFAULT_CAPTION.to_string(),
        }
    })
}

/// Remove a surrounding ```/```json fence, if any.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Truncate to at most `max` chars without splitting a code point.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
