use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gitzoid_core::{
    lenient_timestamp, AccountKind, Author, ChangedFile, GitHubConfig, GitzoidError, PullRequest,
};
use gitzoid_tracker::PullRequestSource;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

/// Posts rendered review comments back to the hosting service.
#[async_trait]
pub trait CommentPublisher: Send + Sync {
    /// Post `body` as a comment on PR `number` of `repo`.
    async fn post_comment(&self, repo: &str, number: u64, body: &str) -> Result<(), GitzoidError>;
}

/// GitHub REST client for listing PRs, fetching diffs and posting comments.
pub struct GitHubClient {
    octocrab: octocrab::Octocrab,
    http: reqwest::Client,
    token: String,
    api_url: String,
}

impl GitHubClient {
    /// Create a client from the `[github]` configuration.
    ///
    /// # Errors
    ///
    /// Returns [`GitzoidError::Config`] if no token is configured, or
    /// [`GitzoidError::GitHub`] if the client cannot be built.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use gitzoid_core::GitHubConfig;
    /// use gitzoid_review::github::GitHubClient;
    ///
    /// let config = GitHubConfig {
    ///     token: Some("ghp_xxxx".into()),
    ///     ..GitHubConfig::default()
    /// };
    /// let client = GitHubClient::new(&config).unwrap();
    /// ```
    pub fn new(config: &GitHubConfig) -> Result<Self, GitzoidError> {
        let token = config.token.clone().ok_or_else(|| {
            GitzoidError::Config(
                "no GitHub token. Set [github].token in .gitzoid.toml or the GITHUB_TOKEN env var"
                    .into(),
            )
        })?;
        let api_url = config.api_url.trim_end_matches('/').to_string();

        let octocrab = octocrab::Octocrab::builder()
            .base_uri(api_url.clone())
            .map_err(|e| GitzoidError::Config(format!("invalid GitHub API url: {e}")))?
            .personal_token(token.clone())
            .build()
            .map_err(|e| GitzoidError::GitHub(format!("failed to create GitHub client: {e}")))?;

        let http = reqwest::Client::builder()
            .user_agent(concat!("gitzoid/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GitzoidError::GitHub(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            octocrab,
            http,
            token,
            api_url,
        })
    }

    async fn get(&self, url: &str) -> Result<Page, GitzoidError> {
        debug!(%url, "GitHub GET");
        let response = self
            .http
            .get(url)
            .header("Accept", "application/vnd.github+json")
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| GitzoidError::GitHub(format!("request to {url} failed: {e}")))?;

        let status = response.status().as_u16();
        let next = response
            .headers()
            .get(reqwest::header::LINK)
            .and_then(|v| v.to_str().ok())
            .and_then(next_page_url);
        let body = response
            .text()
            .await
            .map_err(|e| GitzoidError::GitHub(format!("failed to read body from {url}: {e}")))?;
        Ok(Page { status, body, next })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, GitzoidError> {
        let page = self.get(&format!("{}{path}", self.api_url)).await?;
        decode_response(page.status, path, &page.body)
    }

    /// Fetch a list endpoint, following `Link: rel="next"` until the last page.
    async fn get_all_pages<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Vec<T>, GitzoidError> {
        let mut items = Vec::new();
        let mut url = format!("{}{path}", self.api_url);
        loop {
            let page = self.get(&url).await?;
            let batch: Vec<T> = decode_response(page.status, path, &page.body)?;
            items.extend(batch);
            match page.next {
                Some(next) if next != url => url = next,
                _ => return Ok(items),
            }
        }
    }
}

struct Page {
    status: u16,
    body: String,
    next: Option<String>,
}

/// Turn a raw GitHub response into `T`, mapping failures onto [`GitzoidError`].
fn decode_response<T: DeserializeOwned>(
    status: u16,
    path: &str,
    body: &str,
) -> Result<T, GitzoidError> {
    if !(200..300).contains(&status) {
        return Err(GitzoidError::from_status(status, path));
    }
    serde_json::from_str(body)
        .map_err(|e| GitzoidError::GitHub(format!("invalid response from {path}: {e}")))
}

/// Extract the `rel="next"` target from a `Link` header.
fn next_page_url(link: &str) -> Option<String> {
    link.split(',').find_map(|part| {
        let (target, params) = part.split_once(';')?;
        let is_next = params
            .split(';')
            .any(|p| p.trim().trim_start_matches("rel=").trim_matches('"') == "next");
        is_next.then(|| target.trim().trim_start_matches('<').trim_end_matches('>').to_string())
    })
}

#[async_trait]
impl PullRequestSource for GitHubClient {
    async fn list_open_prs(&self, repo: &str) -> Result<Vec<PullRequest>, GitzoidError> {
        let path =
            format!("/repos/{repo}/pulls?state=open&sort=created&direction=desc&per_page=100");
        let items: Vec<serde_json::Value> = self.get_all_pages(&path).await?;
        Ok(parse_pull_requests(repo, items))
    }

    async fn fetch_full_diff(
        &self,
        repo: &str,
        number: u64,
    ) -> Result<Vec<ChangedFile>, GitzoidError> {
        self.get_all_pages(&format!("/repos/{repo}/pulls/{number}/files?per_page=100"))
            .await
    }

    async fn fetch_compare_diff(
        &self,
        repo: &str,
        base_sha: &str,
        head_sha: &str,
    ) -> Result<Vec<ChangedFile>, GitzoidError> {
        let compare: WireCompare = self
            .get_json(&format!("/repos/{repo}/compare/{base_sha}...{head_sha}"))
            .await?;
        Ok(compare.files)
    }
}

#[async_trait]
impl CommentPublisher for GitHubClient {
    async fn post_comment(&self, repo: &str, number: u64, body: &str) -> Result<(), GitzoidError> {
        let route = format!("/repos/{repo}/issues/{number}/comments");
        let payload = serde_json::json!({ "body": body });

        let _response: serde_json::Value = self
            .octocrab
            .post(route, Some(&payload))
            .await
            .map_err(|e| {
                GitzoidError::GitHub(format!("failed to post comment on {repo}#{number}: {e}"))
            })?;
        Ok(())
    }
}

#[derive(Deserialize)]
struct WirePull {
    number: Option<u64>,
    title: Option<String>,
    body: Option<String>,
    user: Option<WireUser>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    created_at: Option<DateTime<Utc>>,
    head: Option<WireRef>,
    base: Option<WireRef>,
}

#[derive(Deserialize)]
struct WireUser {
    login: Option<String>,
    #[serde(rename = "type")]
    kind: Option<AccountKind>,
}

#[derive(Deserialize)]
struct WireRef {
    sha: Option<String>,
    #[serde(rename = "ref")]
    name: Option<String>,
}

#[derive(Deserialize)]
struct WireCompare {
    #[serde(default)]
    files: Vec<ChangedFile>,
}

/// Convert a raw PR listing, dropping items that are not usable PRs.
fn parse_pull_requests(repo: &str, items: Vec<serde_json::Value>) -> Vec<PullRequest> {
    items
        .into_iter()
        .filter_map(|item| {
            let wire: WirePull = match serde_json::from_value(item) {
                Ok(w) => w,
                Err(e) => {
                    warn!(repo, error = %e, "skipping malformed pull request in listing");
                    return None;
                }
            };
            let Some(number) = wire.number else {
                warn!(repo, "skipping pull request without a number");
                return None;
            };
            Some(PullRequest {
                repo: repo.to_string(),
                number,
                title: wire.title,
                body: wire.body,
                author: wire.user.map(|u| Author {
                    login: u.login,
                    kind: u.kind,
                }),
                created_at: wire.created_at,
                head_sha: wire.head.and_then(|h| h.sha),
                target_branch: wire.base.and_then(|b| b.name),
            })
        })
        .collect()
}
