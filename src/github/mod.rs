pub mod types;

pub use types::{ChangedFile, IssueComment, PullRequestSummary};

use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, instrument};

use crate::http::{ApiError, RestClient};

/// Changed files included in the prompt.
pub const MAX_CHANGED_FILES: usize = 30;
/// Comments scanned for the hidden marker (one page).
pub const COMMENTS_PAGE_SIZE: usize = 100;

/// Repository-scoped view of the GitHub REST API.
#[derive(Debug, Clone)]
pub struct GitHub {
    client: RestClient,
    owner: String,
    repo: String,
}

#[derive(Deserialize)]
struct User {
    login: String,
}

#[derive(Deserialize)]
struct Repo {
    full_name: String,
}

#[derive(Deserialize)]
struct PullRef {
    #[serde(rename = "ref")]
    ref_name: String,
    repo: Option<Repo>,
}

#[derive(Deserialize)]
struct PullResponse {
    number: u64,
    title: String,
    body: Option<String>,
    user: User,
    base: PullRef,
    head: PullRef,
}

#[derive(Deserialize)]
struct PullFile {
    filename: String,
    status: String,
}

#[derive(Deserialize)]
struct RepositoryResponse {
    default_branch: String,
}

#[derive(Deserialize)]
struct Commit {
    sha: String,
}

#[derive(Deserialize)]
struct BranchResponse {
    commit: Commit,
}

#[derive(Deserialize)]
struct ContentResponse {
    sha: String,
}

#[derive(Deserialize)]
struct WrittenContent {
    download_url: Option<String>,
}

#[derive(Deserialize)]
struct WriteResponse {
    content: Option<WrittenContent>,
}

#[derive(Serialize)]
struct WriteRequest<'a> {
    message: &'a str,
    content: &'a str,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

impl GitHub {
    pub fn new(client: RestClient, owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            client,
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    fn repo_path(&self, suffix: &str) -> String {
        format!("/repos/{}/{}{}", self.owner, self.repo, suffix)
    }

    /// Fetch PR metadata and its first page of changed files.
    #[instrument(skip(self), fields(owner = %self.owner, repo = %self.repo))]
    pub async fn pull_request(&self, number: u64) -> Result<PullRequestSummary, ApiError> {
        debug!("fetching PR metadata");
        let pull: PullResponse = self.client.get(&self.repo_path(&format!("/pulls/{number}"))).await?;

        debug!("fetching PR files");
        let per_page = MAX_CHANGED_FILES.to_string();
        let files: Vec<PullFile> = self
            .client
            .get_with_query(
                &self.repo_path(&format!("/pulls/{number}/files")),
                &[("per_page", per_page.as_str())],
            )
            .await?;
        debug!(title = %pull.title, files = files.len(), "received PR metadata");

        let changed_files = files
            .into_iter()
            .take(MAX_CHANGED_FILES)
            .map(|f| ChangedFile {
                status: f.status,
                filename: f.filename,
            })
            .collect();

        Ok(PullRequestSummary {
            number: pull.number,
            title: pull.title,
            body: pull.body.filter(|b| !b.trim().is_empty()),
            author: pull.user.login,
            base_ref: pull.base.ref_name,
            head_ref: pull.head.ref_name,
            head_repo: pull.head.repo.map(|r| r.full_name),
            base_repo: pull
                .base
                .repo
                .map(|r| r.full_name)
                .unwrap_or_else(|| format!("{}/{}", self.owner, self.repo)),
            changed_files,
        })
    }

    #[instrument(skip(self), fields(owner = %self.owner, repo = %self.repo))]
    pub async fn list_comments(&self, number: u64) -> Result<Vec<IssueComment>, ApiError> {
        let per_page = COMMENTS_PAGE_SIZE.to_string();
        self.client
            .get_with_query(
                &self.repo_path(&format!("/issues/{number}/comments")),
                &[("per_page", per_page.as_str())],
            )
            .await
    }

    #[instrument(skip(self, body), fields(owner = %self.owner, repo = %self.repo, body_chars = body.chars().count()))]
    pub async fn create_comment(&self, number: u64, body: &str) -> Result<IssueComment, ApiError> {
        self.client
            .post(
                &self.repo_path(&format!("/issues/{number}/comments")),
                &json!({ "body": body }),
            )
            .await
    }

    pub async fn default_branch(&self) -> Result<String, ApiError> {
        let repo: RepositoryResponse = self.client.get(&self.repo_path("")).await?;
        Ok(repo.default_branch)
    }

    /// Head commit SHA of a branch.
    pub async fn branch_head(&self, branch: &str) -> Result<String, ApiError> {
        let branch: BranchResponse = self
            .client
            .get(&self.repo_path(&format!("/branches/{branch}")))
            .await?;
        Ok(branch.commit.sha)
    }

    /// Ok(false) only on a 404; any other failure is returned as-is.
    pub async fn branch_exists(&self, branch: &str) -> Result<bool, ApiError> {
        match self.branch_head(branch).await {
            Ok(_) => Ok(true),
            Err(err) if err.is_not_found() => Ok(false),
            Err(err) => Err(err),
        }
    }

    pub async fn create_branch(&self, branch: &str, sha: &str) -> Result<(), ApiError> {
        let _: IgnoredAny = self
            .client
            .post(
                &self.repo_path("/git/refs"),
                &json!({ "ref": format!("refs/heads/{branch}"), "sha": sha }),
            )
            .await?;
        Ok(())
    }

    /// Blob SHA of the file at `path` on `branch`, or None on a 404.
    pub async fn file_sha(&self, path: &str, branch: &str) -> Result<Option<String>, ApiError> {
        let result: Result<ContentResponse, ApiError> = self
            .client
            .get_with_query(
                &self.repo_path(&format!("/contents/{path}")),
                &[("ref", branch)],
            )
            .await;
        match result {
            Ok(content) => Ok(Some(content.sha)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Create or update a file. `content` must already be base64-encoded.
    /// Returns the download URL GitHub reports for the written file, if any.
    #[instrument(skip(self, content), fields(owner = %self.owner, repo = %self.repo, updating = sha.is_some()))]
    pub async fn put_file(
        &self,
        path: &str,
        branch: &str,
        content: &str,
        message: &str,
        sha: Option<&str>,
    ) -> Result<Option<String>, ApiError> {
        let response: WriteResponse = self
            .client
            .put(
                &self.repo_path(&format!("/contents/{path}")),
                &WriteRequest {
                    message,
                    content,
                    branch,
                    sha,
                },
            )
            .await?;
        Ok(response.content.and_then(|c| c.download_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn client(server: &MockServer) -> GitHub {
        GitHub::new(RestClient::github(server.base_url(), "token"), "octo", "demo")
    }

    #[tokio::test]
    async fn test_pull_request_builds_summary() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/repos/octo/demo/pulls/42");
            then.status(200).json_body(json!({
                "number": 42,
                "title": "Add OAuth2 login flow",
                "body": "   ",
                "user": {"login": "alice"},
                "base": {"ref": "main", "repo": {"full_name": "octo/demo"}},
                "head": {"ref": "feature/login", "repo": {"full_name": "octo/demo"}}
            }));
        });
        let files = server.mock(|when, then| {
            when.method(GET)
                .path("/repos/octo/demo/pulls/42/files")
                .query_param("per_page", "30");
            then.status(200).json_body(json!([
                {"filename": "src/auth.rs", "status": "added"},
                {"filename": "src/main.rs", "status": "modified"}
            ]));
        });

        let pr = client(&server).pull_request(42).await.unwrap();

        files.assert();
        assert_eq!(pr.title, "Add OAuth2 login flow");
        assert!(pr.body.is_none());
        assert_eq!(pr.author, "alice");
        assert_eq!(pr.head_ref, "feature/login");
        assert!(!pr.is_fork());
        assert_eq!(
            pr.changed_files[0],
            ChangedFile {
                status: "added".to_string(),
                filename: "src/auth.rs".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_pull_request_truncates_files() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/repos/octo/demo/pulls/1");
            then.status(200).json_body(json!({
                "number": 1,
                "title": "Big",
                "body": null,
                "user": {"login": "bob"},
                "base": {"ref": "main", "repo": {"full_name": "octo/demo"}},
                "head": {"ref": "big", "repo": null}
            }));
        });
        let many: Vec<_> = (0..40)
            .map(|i| json!({"filename": format!("f{i}.rs"), "status": "modified"}))
            .collect();
        server.mock(|when, then| {
            when.method(GET).path("/repos/octo/demo/pulls/1/files");
            then.status(200).json_body(serde_json::Value::Array(many));
        });

        let pr = client(&server).pull_request(1).await.unwrap();
        assert_eq!(pr.changed_files.len(), MAX_CHANGED_FILES);
        assert!(pr.head_repo.is_none());
        assert!(pr.is_fork());
    }

    #[tokio::test]
    async fn test_list_comments_requests_full_page() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/repos/octo/demo/issues/3/comments")
                .query_param("per_page", "100");
            then.status(200)
                .json_body(json!([{"id": 1, "body": "hello"}, {"id": 2, "body": null}]));
        });

        let comments = client(&server).list_comments(3).await.unwrap();
        mock.assert();
        assert_eq!(comments.len(), 2);
    }

    #[tokio::test]
    async fn test_branch_exists_distinguishes_not_found() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/repos/octo/demo/branches/present");
            then.status(200).json_body(json!({"commit": {"sha": "abc"}}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/repos/octo/demo/branches/absent");
            then.status(404).json_body(json!({"message": "Branch not found"}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/repos/octo/demo/branches/forbidden");
            then.status(403).json_body(json!({"message": "Resource not accessible"}));
        });

        let gh = client(&server);
        assert!(gh.branch_exists("present").await.unwrap());
        assert!(!gh.branch_exists("absent").await.unwrap());
        let err = gh.branch_exists("forbidden").await.unwrap_err();
        assert_eq!(err.status().map(|s| s.as_u16()), Some(403));
    }

    #[tokio::test]
    async fn test_file_sha_absent_and_present() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET)
                .path("/repos/octo/demo/contents/img/pr-1.png")
                .query_param("ref", "pr-cartoons");
            then.status(200).json_body(json!({"sha": "blob123"}));
        });
        server.mock(|when, then| {
            when.method(GET).path("/repos/octo/demo/contents/img/pr-2.png");
            then.status(404).json_body(json!({"message": "Not Found"}));
        });

        let gh = client(&server);
        assert_eq!(
            gh.file_sha("img/pr-1.png", "pr-cartoons").await.unwrap().as_deref(),
            Some("blob123")
        );
        assert!(gh.file_sha("img/pr-2.png", "pr-cartoons").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_sha_surfaces_server_errors() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/repos/octo/demo/contents/img/pr-1.png");
            then.status(500).body("boom");
        });

        let err = client(&server)
            .file_sha("img/pr-1.png", "main")
            .await
            .unwrap_err();
        assert!(!err.is_not_found());
    }

    #[tokio::test]
    async fn test_put_file_sends_sha_when_updating() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(PUT)
                .path("/repos/octo/demo/contents/img/pr-1.png")
                .json_body_includes(
                    json!({"branch": "pr-cartoons", "sha": "old", "content": "aGk="}).to_string(),
                );
            then.status(200).json_body(json!({
                "content": {"download_url": "https://raw.example/img/pr-1.png"}
            }));
        });

        let url = client(&server)
            .put_file("img/pr-1.png", "pr-cartoons", "aGk=", "msg", Some("old"))
            .await
            .unwrap();
        mock.assert();
        assert_eq!(url.as_deref(), Some("https://raw.example/img/pr-1.png"));
    }

    #[tokio::test]
    async fn test_create_branch_posts_ref() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/repos/octo/demo/git/refs")
                .json_body_includes(
                    json!({"ref": "refs/heads/pr-cartoons", "sha": "abc"}).to_string(),
                );
            then.status(201).json_body(json!({"ref": "refs/heads/pr-cartoons"}));
        });

        client(&server).create_branch("pr-cartoons", "abc").await.unwrap();
        mock.assert();
    }
}
