use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::context::BRANCH_OVERRIDE_VAR;

/// Config file looked up in the working directory when --config is not given.
pub const DEFAULT_CONFIG_PATH: &str = ".pr-cartoonist.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Top-level configuration loaded from .pr-cartoonist.toml.
///
/// Every field has a default; the tool works with zero config inside a
/// GitHub Actions runner.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub github: GitHubConfig,
    pub generation: GenerationConfig,
    pub comment: CommentConfig,
    pub publish: PublishConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// REST API root
    pub api_base: String,
    /// Host serving raw file contents, used when a write response has no download URL
    pub raw_base: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com".to_string(),
            raw_base: "https://raw.githubusercontent.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// OpenAI-compatible API root
    pub api_base: String,
    pub text_model: String,
    pub image_model: String,
    /// Square image size, e.g. "1024x1024"
    pub image_size: String,
    /// Output token budget for the prompt/caption call
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            text_model: "gpt-4o-mini".to_string(),
            image_model: "gpt-image-1".to_string(),
            image_size: "1024x1024".to_string(),
            max_output_tokens: 400,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CommentConfig {
    /// Hidden HTML comment used to detect an earlier post
    pub marker: String,
    /// Footer appended to every comment
    pub attribution: String,
}

impl Default for CommentConfig {
    fn default() -> Self {
        Self {
            marker: "<!-- pr-cartoonist -->".to_string(),
            attribution: "<sub>Cartoon generated by pr-cartoonist. Any resemblance to your code is purely coincidental.</sub>".to_string(),
        }
    }
}

/// Where base64-only images get committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PublishTarget {
    /// Dedicated long-lived branch, created from the default branch if absent
    #[default]
    ImagesBranch,
    /// The PR's own head branch; same-repository PRs only
    HeadBranch,
}

/// What to do when no image URL could be obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissingImagePolicy {
    /// Post the comment with an "image unavailable" placeholder
    #[default]
    CommentUnavailable,
    /// Fail the run without commenting
    Abort,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    pub target: PublishTarget,
    /// Dedicated branch name (images-branch target). Overridden by PR_CARTOON_BRANCH.
    pub branch: String,
    /// Directory inside the repository for committed images
    pub directory: String,
    pub on_missing_image: MissingImagePolicy,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            target: PublishTarget::default(),
            branch: "pr-cartoons".to_string(),
            directory: ".github/pr-cartoons".to_string(),
            on_missing_image: MissingImagePolicy::default(),
        }
    }
}

impl Config {
    /// Load configuration and apply environment overrides.
    ///
    /// With an explicit path the file must exist. Without one,
    /// .pr-cartoonist.toml is read if present, otherwise defaults are used.
    pub fn load<F>(path: Option<&Path>, env: F) -> Result<Config, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) => Self::load_from(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_PATH);
                if default_path.exists() {
                    Self::load_from(default_path)?
                } else {
                    Config::default()
                }
            }
        };
        config.apply_env(env);
        Ok(config)
    }

    /// Load from a specific path (useful for testing).
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn apply_env<F>(&mut self, env: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(branch) = env(BRANCH_OVERRIDE_VAR).filter(|b| !b.trim().is_empty()) {
            self.publish.branch = branch.trim().to_string();
        }
    }
}
