use serde::Deserialize;

/// Read-only view of a pull request, used to build the generation prompt.
/// Not Deserialize: assembled from the pull request and files endpoints.
#[derive(Debug, Clone)]
pub struct PullRequestSummary {
    /// PR number (e.g., 42)
    pub number: u64,
    pub title: String,
    /// PR description; None when the author left it empty
    pub body: Option<String>,
    /// Author's GitHub login
    pub author: String,
    /// Branch the PR targets
    pub base_ref: String,
    /// Branch the PR comes from
    pub head_ref: String,
    /// `owner/name` of the head repository; None when the fork was deleted
    pub head_repo: Option<String>,
    /// `owner/name` of the base repository
    pub base_repo: String,
    /// Changed files in API order, at most 30
    pub changed_files: Vec<ChangedFile>,
}

impl PullRequestSummary {
    /// True when the PR comes from a fork (or from a deleted repository).
    pub fn is_fork(&self) -> bool {
        self.head_repo.as_deref() != Some(self.base_repo.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedFile {
    /// added, modified, removed, renamed, ...
    pub status: String,
    pub filename: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueComment {
    pub id: u64,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
}
