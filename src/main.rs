mod comment;
mod config;
mod context;
mod error;
mod generate;
mod github;
mod http;
mod pipeline;
mod publish;

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info, info_span, Instrument};
use tracing_subscriber::EnvFilter;

use crate::error::Error;
use crate::pipeline::Outcome;

/// PR Cartoonist: reads a GitHub Pull Request, has a language model dream up
/// a cartoon about it, generates the image and posts it as a PR comment.
/// Posts at most once per PR.
#[derive(Parser, Debug)]
#[command(name = "pr-cartoonist", version, about)]
struct Cli {
    /// Repository as owner/name. Defaults to $GITHUB_REPOSITORY.
    #[arg(long)]
    repo: Option<String>,

    /// Pull request number. Defaults to the PR in $GITHUB_EVENT_PATH.
    #[arg(long = "pr", alias = "pr-number")]
    pr: Option<u64>,

    /// Config file (TOML). Defaults to .pr-cartoonist.toml when present.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Generate everything but print the comment instead of posting it
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(Outcome::AlreadyCommented) => {
            info!("already commented, exiting");
            ExitCode::SUCCESS
        }
        Ok(Outcome::Posted {
            comment_url,
            image_url,
        }) => {
            info!(
                comment_url = comment_url.as_deref().unwrap_or("-"),
                image_url = image_url.as_deref().unwrap_or("-"),
                "done"
            );
            ExitCode::SUCCESS
        }
        Ok(Outcome::DryRun { body }) => {
            info!(body_chars = body.chars().count(), "dry run complete");
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(kind = %err.kind(), error = %err, "pr-cartoonist failed");
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<Outcome, Error> {
    let env = |name: &str| std::env::var(name).ok();

    info!("loading configuration");
    let config = config::Config::load(cli.config.as_deref(), env)?;

    let ctx = context::resolve(cli.repo.as_deref(), cli.pr, env)?;
    debug!(?ctx, "resolved invocation context");

    let span = info_span!("pr_cartoon", repo = %ctx.slug(), pr = ctx.pr_number);
    async {
        let github = github::GitHub::new(
            http::RestClient::github(config.github.api_base.clone(), ctx.github_token.clone()),
            ctx.owner.clone(),
            ctx.repo.clone(),
        );
        let openai = generate::openai::OpenAiClient::new(&config.generation, &ctx.generation_key);

        pipeline::run(
            ctx.pr_number,
            &github,
            &openai,
            &openai,
            &config,
            cli.dry_run,
        )
        .await
    }
    .instrument(span)
    .await
}
