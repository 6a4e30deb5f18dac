use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

const AGENT: &str = concat!("pr-cartoonist/", env!("CARGO_PKG_VERSION"));
const GITHUB_ACCEPT: &str = "application/vnd.github+json";
const GITHUB_API_VERSION: &str = "2022-11-28";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{method} {url} failed: {source}")]
    Transport {
        method: Method,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error(
        "{method} {url} failed: {code} {reason}: {body}",
        code = .status.as_u16(),
        reason = .status.canonical_reason().unwrap_or("Unknown")
    )]
    Status {
        method: Method,
        url: String,
        status: StatusCode,
        body: String,
    },

    #[error("{method} {url} returned an unexpected body: {source}")]
    Decode {
        method: Method,
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    /// HTTP status of a non-2xx response, if the request got that far.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True only for a genuine 404. Transport failures, permission errors and
    /// everything else are real errors, never "absent".
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }
}

/// Thin JSON REST client: bearer auth, pinned accept header, one shot per call.
#[derive(Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    accept: &'static str,
    api_version: Option<&'static str>,
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("base_url", &self.base_url)
            .field("accept", &self.accept)
            .field("api_version", &self.api_version)
            .finish_non_exhaustive()
    }
}

impl RestClient {
    /// Client for the GitHub REST API, pinned to API version 2022-11-28.
    pub fn github(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            token: token.into(),
            accept: GITHUB_ACCEPT,
            api_version: Some(GITHUB_API_VERSION),
        }
    }

    /// Client for a plain JSON API such as the generation service.
    pub fn json_api(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            token: token.into(),
            accept: "application/json",
            api_version: None,
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send::<(), T>(Method::GET, path, &[], None).await
    }

    pub async fn get_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        self.send::<(), T>(Method::GET, path, query, None).await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(Method::POST, path, &[], Some(body)).await
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(Method::PUT, path, &[], Some(body)).await
    }

    async fn send<B, T>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url.trim_end_matches('/'), path);

        let mut request = self
            .http
            .request(method.clone(), &url)
            .bearer_auth(&self.token)
            .header(ACCEPT, self.accept)
            .header(USER_AGENT, AGENT);
        if let Some(version) = self.api_version {
            request = request.header("X-GitHub-Api-Version", version);
        }
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            // Sets Content-Type: application/json.
            request = request.json(body);
        }

        debug!(%method, %url, "sending request");
        let response = request.send().await.map_err(|source| ApiError::Transport {
            method: method.clone(),
            url: url.clone(),
            source,
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|source| ApiError::Transport {
            method: method.clone(),
            url: url.clone(),
            source,
        })?;
        debug!(%method, %url, status = status.as_u16(), body_bytes = text.len(), "received response");

        if !status.is_success() {
            return Err(ApiError::Status {
                method,
                url,
                status,
                body: text,
            });
        }

        serde_json::from_str(&text).map_err(|source| ApiError::Decode {
            method,
            url,
            source,
        })
    }
}
