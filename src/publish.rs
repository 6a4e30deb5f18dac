use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::config::{PublishConfig, PublishTarget};
use crate::github::{GitHub, PullRequestSummary};
use crate::http::ApiError;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Image payload is not valid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("Failed to prepare branch {branch}: {source}")]
    Branch {
        branch: String,
        #[source]
        source: ApiError,
    },

    #[error("Failed to write {path} on {branch}: {source}")]
    Write {
        path: String,
        branch: String,
        #[source]
        source: ApiError,
    },
}

/// Result of trying to host a base64 image in the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Publication {
    Published {
        url: String,
        branch: String,
        path: String,
    },
    /// Nothing was written; the reason is safe to log.
    Skipped { reason: &'static str },
}

/// Repository path for a PR's image.
pub fn image_path(directory: &str, pr_number: u64) -> String {
    let directory = directory.trim_matches('/');
    if directory.is_empty() {
        format!("pr-{pr_number}.png")
    } else {
        format!("{directory}/pr-{pr_number}.png")
    }
}

/// Raw-content URL for a file on a branch.
pub fn raw_url(raw_base: &str, owner: &str, repo: &str, branch: &str, path: &str) -> String {
    format!(
        "{}/{owner}/{repo}/{branch}/{path}",
        raw_base.trim_end_matches('/')
    )
}

/// Commit a base64 image to the repository and return a fetchable URL.
///
/// Head-branch publication only happens for same-repository PRs. For the
/// images branch the branch is created from the default branch's head
/// commit when a lookup returns 404; any other lookup failure is an error.
#[instrument(skip(github, pr, data, config, raw_base), fields(pr = pr.number, target = ?config.target))]
pub async fn publish_image(
    github: &GitHub,
    pr: &PullRequestSummary,
    data: &str,
    config: &PublishConfig,
    raw_base: &str,
) -> Result<Publication, PublishError> {
    let bytes = STANDARD.decode(data.trim())?;
    debug!(image_bytes = bytes.len(), "decoded image payload");

    let branch = match config.target {
        PublishTarget::HeadBranch => {
            if pr.is_fork() {
                return Ok(Publication::Skipped {
                    reason: "PR comes from a fork; its head branch is not writable",
                });
            }
            if pr.head_ref.trim().is_empty() {
                return Ok(Publication::Skipped {
                    reason: "PR has no head branch name",
                });
            }
            pr.head_ref.clone()
        }
        PublishTarget::ImagesBranch => {
            let created = ensure_branch(github, &config.branch)
                .await
                .map_err(|source| PublishError::Branch {
                    branch: config.branch.clone(),
                    source,
                })?;
            debug!(branch = %config.branch, created, "images branch ready");
            config.branch.clone()
        }
    };

    let path = image_path(&config.directory, pr.number);
    let write_err = |source| PublishError::Write {
        path: path.clone(),
        branch: branch.clone(),
        source,
    };

    let existing_sha = github.file_sha(&path, &branch).await.map_err(write_err)?;
    debug!(%path, %branch, updating = existing_sha.is_some(), "writing image");

    let message = format!("Add cartoon for PR #{}", pr.number);
    let content = STANDARD.encode(&bytes);
    let download_url = github
        .put_file(&path, &branch, &content, &message, existing_sha.as_deref())
        .await
        .map_err(write_err)?;

    let url = download_url
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| raw_url(raw_base, github.owner(), github.repo(), &branch, &path));
    info!(%url, "published image");

    Ok(Publication::Published { url, branch, path })
}

/// Make sure `branch` exists. Returns true when it had to be created.
async fn ensure_branch(github: &GitHub, branch: &str) -> Result<bool, ApiError> {
    if github.branch_exists(branch).await? {
        return Ok(false);
    }

    let default_branch = github.default_branch().await?;
    let sha = github.branch_head(&default_branch).await?;
    github.create_branch(branch, &sha).await?;
    info!(%branch, from = %default_branch, %sha, "created images branch");
    Ok(true)
}
