use thiserror::Error;

use crate::config::ConfigError;
use crate::context::ContextError;
use crate::generate::GenerationError;
use crate::http::ApiError;
use crate::publish::PublishError;

/// Coarse cause of a failed run, for branching without string matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    UpstreamApi,
    GenerationParse,
    Publication,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Configuration => write!(f, "configuration"),
            ErrorKind::UpstreamApi => write!(f, "upstream-api"),
            ErrorKind::GenerationParse => write!(f, "generation-parse"),
            ErrorKind::Publication => write!(f, "publication"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error("No image URL available for the comment: {reason}")]
    ImageUnavailable { reason: String },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_) | Error::Context(_) => ErrorKind::Configuration,
            Error::Api(_) => ErrorKind::UpstreamApi,
            Error::Generation(GenerationError::Parse(_)) => ErrorKind::GenerationParse,
            Error::Generation(_) => ErrorKind::UpstreamApi,
            Error::Publish(_) | Error::ImageUnavailable { .. } => ErrorKind::Publication,
        }
    }
}
