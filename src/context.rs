use std::fmt;
use std::path::Path;

use thiserror::Error;
use tracing::debug;

pub const TOKEN_VAR: &str = "GITHUB_TOKEN";
pub const GENERATION_KEY_VAR: &str = "OPENAI_API_KEY";
pub const REPOSITORY_VAR: &str = "GITHUB_REPOSITORY";
pub const EVENT_PATH_VAR: &str = "GITHUB_EVENT_PATH";
pub const BRANCH_OVERRIDE_VAR: &str = "PR_CARTOON_BRANCH";

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("Missing required environment variable {0}")]
    MissingSecret(&'static str),

    #[error("No repository given: pass --repo owner/name or set GITHUB_REPOSITORY")]
    MissingRepo,

    #[error("Invalid repository {0:?}: expected owner/name")]
    InvalidRepo(String),

    #[error("Could not determine the PR number: pass --pr <number> (no pull request in the GITHUB_EVENT_PATH payload)")]
    MissingPrNumber,
}

/// Everything one run needs to know about where it is acting.
/// Immutable once resolved.
#[derive(Clone)]
pub struct InvocationContext {
    pub owner: String,
    pub repo: String,
    pub pr_number: u64,
    pub github_token: String,
    pub generation_key: String,
}

impl fmt::Debug for InvocationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvocationContext")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("pr_number", &self.pr_number)
            .field("github_token", &"<redacted>")
            .field("generation_key", &"<redacted>")
            .finish()
    }
}

impl InvocationContext {
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

/// Resolve the context from CLI flags and an environment lookup.
///
/// Secrets are checked first so a misconfigured workflow fails before any
/// network call. Blank variables count as unset.
pub fn resolve<F>(
    repo_flag: Option<&str>,
    pr_flag: Option<u64>,
    env: F,
) -> Result<InvocationContext, ContextError>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &str| env(name).filter(|v| !v.trim().is_empty());

    let github_token = var(TOKEN_VAR).ok_or(ContextError::MissingSecret(TOKEN_VAR))?;
    let generation_key =
        var(GENERATION_KEY_VAR).ok_or(ContextError::MissingSecret(GENERATION_KEY_VAR))?;

    let slug = match repo_flag {
        Some(flag) => flag.to_string(),
        None => var(REPOSITORY_VAR).ok_or(ContextError::MissingRepo)?,
    };
    let (owner, repo) = parse_repo_slug(&slug)?;

    let pr_number = pr_flag
        .or_else(|| var(EVENT_PATH_VAR).and_then(|path| pr_number_from_event(Path::new(&path))))
        .ok_or(ContextError::MissingPrNumber)?;

    Ok(InvocationContext {
        owner,
        repo,
        pr_number,
        github_token,
        generation_key,
    })
}

/// Split `owner/name`; both halves must be non-empty and there must be exactly one slash.
pub fn parse_repo_slug(slug: &str) -> Result<(String, String), ContextError> {
    let trimmed = slug.trim();
    let mut parts = trimmed.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(owner), Some(repo), None) if !owner.is_empty() && !repo.is_empty() => {
            Ok((owner.to_string(), repo.to_string()))
        }
        _ => Err(ContextError::InvalidRepo(slug.to_string())),
    }
}

/// PR number from a webhook payload file. Unreadable or unexpected payloads
/// count as "no number".
pub fn pr_number_from_event(path: &Path) -> Option<u64> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            debug!(path = %path.display(), error = %err, "event payload unreadable");
            return None;
        }
    };
    let payload: serde_json::Value = match serde_json::from_str(&raw) {
        Ok(payload) => payload,
        Err(err) => {
            debug!(path = %path.display(), error = %err, "event payload is not JSON");
            return None;
        }
    };
    payload
        .pointer("/pull_request/number")
        .or_else(|| payload.get("number"))
        .and_then(serde_json::Value::as_u64)
}
