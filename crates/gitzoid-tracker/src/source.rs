use async_trait::async_trait;
use gitzoid_core::{ChangedFile, PullRequest, Result};

/// Read access to pull requests on the hosting service.
///
/// The tracker only ever reads through this trait. Implementations report
/// non-success responses as errors; the tracker decides whether an error
/// aborts the repository (listing) or just drops one PR (diff fetches).
#[async_trait]
pub trait PullRequestSource: Send + Sync {
    /// List the currently open pull requests of `repo` (`owner/name`).
    async fn list_open_prs(&self, repo: &str) -> Result<Vec<PullRequest>>;

    /// Fetch every changed file of pull request `number`.
    async fn fetch_full_diff(&self, repo: &str, number: u64) -> Result<Vec<ChangedFile>>;

    /// Fetch the files changed between two commits.
    async fn fetch_compare_diff(
        &self,
        repo: &str,
        base_sha: &str,
        head_sha: &str,
    ) -> Result<Vec<ChangedFile>>;
}
