use tracing::{info, instrument, warn};

use crate::comment;
use crate::config::{Config, MissingImagePolicy};
use crate::error::Error;
use crate::generate::{self, GeneratedImage, ImageGenerator, TextGenerator};
use crate::github::{GitHub, PullRequestSummary};
use crate::publish::{self, Publication};

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A comment with the marker already exists; nothing was generated.
    AlreadyCommented,
    Posted {
        comment_url: Option<String>,
        image_url: Option<String>,
    },
    DryRun { body: String },
}

/// One linear pass: check marker, fetch PR, generate, host image, comment.
///
/// The marker check and the final post are not atomic; two runs started
/// close together can both comment.
#[instrument(skip_all, fields(owner = %github.owner(), repo = %github.repo(), pr = pr_number, dry_run = dry_run))]
pub async fn run(
    pr_number: u64,
    github: &GitHub,
    text: &dyn TextGenerator,
    images: &dyn ImageGenerator,
    config: &Config,
    dry_run: bool,
) -> Result<Outcome, Error> {
    info!("checking for an existing comment");
    let comments = github.list_comments(pr_number).await?;
    if comment::already_commented(&comments, &config.comment.marker) {
        info!(scanned = comments.len(), "PR already has a cartoon, nothing to do");
        return Ok(Outcome::AlreadyCommented);
    }

    info!("fetching pull request");
    let pr = github.pull_request(pr_number).await?;
    info!(title = %pr.title, files = pr.changed_files.len(), "fetched PR metadata");

    let generation =
        generate::synthesize(text, &pr, config.generation.max_output_tokens).await?;
    let image = generate::acquire(
        images,
        &generation.image_prompt,
        &config.generation.image_size,
    )
    .await?;

    let image_url = resolve_image_url(github, &pr, image, config, dry_run).await?;
    let body = comment::compose(
        &config.comment.marker,
        &generation.caption,
        image_url.as_deref(),
        &config.comment.attribution,
    );

    if dry_run {
        comment::print_preview(&body);
        return Ok(Outcome::DryRun { body });
    }

    let posted = github.create_comment(pr_number, &body).await?;
    info!(comment_id = posted.id, has_image = image_url.is_some(), "posted comment");
    Ok(Outcome::Posted {
        comment_url: posted.html_url,
        image_url,
    })
}

/// Turn the generated image into a URL, publishing base64 payloads when
/// needed. Missing images follow `publish.on_missing_image`.
async fn resolve_image_url(
    github: &GitHub,
    pr: &PullRequestSummary,
    image: GeneratedImage,
    config: &Config,
    dry_run: bool,
) -> Result<Option<String>, Error> {
    let data = match image {
        GeneratedImage::Url(url) => return Ok(Some(url)),
        GeneratedImage::Base64(data) => data,
    };

    if dry_run {
        info!("dry run: not committing the base64 image");
        return Ok(None);
    }

    let policy = config.publish.on_missing_image;
    match publish::publish_image(github, pr, &data, &config.publish, &config.github.raw_base).await
    {
        Ok(Publication::Published { url, branch, path }) => {
            info!(%branch, %path, "image committed to repository");
            Ok(Some(url))
        }
        Ok(Publication::Skipped { reason }) => match policy {
            MissingImagePolicy::Abort => Err(Error::ImageUnavailable {
                reason: reason.to_string(),
            }),
            MissingImagePolicy::CommentUnavailable => {
                warn!(reason, "image publication skipped, commenting without an image");
                Ok(None)
            }
        },
        Err(err) => match policy {
            MissingImagePolicy::Abort => Err(err.into()),
            MissingImagePolicy::CommentUnavailable => {
                warn!(error = %err, "image publication failed, commenting without an image");
                Ok(None)
            }
        },
    }
}
