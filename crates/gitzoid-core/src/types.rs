use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Kind of account that opened a pull request.
///
/// # Examples
///
/// ```
/// use gitzoid_core::AccountKind;
///
/// let kind: AccountKind = serde_json::from_str("\"Bot\"").unwrap();
/// assert_eq!(kind, AccountKind::Bot);
///
/// let kind: AccountKind = serde_json::from_str("\"Mannequin\"").unwrap();
/// assert_eq!(kind, AccountKind::Other);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountKind {
    /// A regular user account.
    User,
    /// An automation account (GitHub Apps, dependabot, ...).
    Bot,
    /// An organization account.
    Organization,
    /// Anything the hosting API reports that we do not distinguish.
    #[serde(other)]
    Other,
}

/// Author of a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    /// Account login, e.g. `octocat` or `dependabot[bot]`.
    pub login: Option<String>,
    /// Account kind as reported by the hosting API.
    pub kind: Option<AccountKind>,
}

/// An open pull request as seen in the live listing.
///
/// Every field other than the identifier is optional: the listing is
/// external data and a PR with a missing field is handled per PR rather
/// than failing the whole listing.
///
/// # Examples
///
/// ```
/// use gitzoid_core::PullRequest;
///
/// let pr = PullRequest::new("octo/repo", 42);
/// assert_eq!(pr.tracker_key(), "octo/repo#42");
/// assert!(pr.head_sha.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequest {
    /// Repository path, `owner/name`.
    pub repo: String,
    /// PR number within the repository.
    pub number: u64,
    pub title: Option<String>,
    pub body: Option<String>,
    pub author: Option<Author>,
    /// Creation time; `None` when missing or unparsable.
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    /// Current head commit.
    pub head_sha: Option<String>,
    /// Branch the PR merges into.
    pub target_branch: Option<String>,
}

impl PullRequest {
    /// Create a pull request with only its identifier set.
    pub fn new(repo: impl Into<String>, number: u64) -> Self {
        Self {
            repo: repo.into(),
            number,
            title: None,
            body: None,
            author: None,
            created_at: None,
            head_sha: None,
            target_branch: None,
        }
    }

    /// The composite key used to address this PR in the tracker.
    pub fn tracker_key(&self) -> String {
        format!("{}#{}", self.repo, self.number)
    }
}

/// How a file changed in a pull request or commit range.
///
/// Unknown kinds reported by the host (`copied`, `changed`, ...) are kept
/// verbatim in [`FileStatus::Other`].
///
/// # Examples
///
/// ```
/// use gitzoid_core::FileStatus;
///
/// let s: FileStatus = serde_json::from_str("\"renamed\"").unwrap();
/// assert_eq!(s, FileStatus::Renamed);
/// assert_eq!(FileStatus::from("copied".to_string()).to_string(), "copied");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FileStatus {
    Added,
    Removed,
    #[default]
    Modified,
    Renamed,
    Other(String),
}

impl From<String> for FileStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "added" => FileStatus::Added,
            "removed" => FileStatus::Removed,
            "modified" => FileStatus::Modified,
            "renamed" => FileStatus::Renamed,
            _ => FileStatus::Other(s),
        }
    }
}

impl From<FileStatus> for String {
    fn from(s: FileStatus) -> Self {
        s.to_string()
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileStatus::Added => write!(f, "added"),
            FileStatus::Removed => write!(f, "removed"),
            FileStatus::Modified => write!(f, "modified"),
            FileStatus::Renamed => write!(f, "renamed"),
            FileStatus::Other(s) => write!(f, "{s}"),
        }
    }
}

/// A single file-change record from a PR diff or a compare range.
///
/// # Examples
///
/// ```
/// use gitzoid_core::{ChangedFile, FileStatus};
///
/// let json = r#"{"filename": "logo.png", "status": "added", "additions": 0, "deletions": 0}"#;
/// let file: ChangedFile = serde_json::from_str(json).unwrap();
/// assert_eq!(file.status, FileStatus::Added);
/// assert!(file.patch.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedFile {
    pub filename: String,
    /// Unified diff text; absent for binary or oversized files.
    #[serde(default)]
    pub patch: Option<String>,
    #[serde(default)]
    pub status: FileStatus,
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
}

/// Kind of review a pull request needs.
///
/// # Examples
///
/// ```
/// use gitzoid_core::ReviewType;
///
/// assert_eq!(serde_json::to_string(&ReviewType::Incremental).unwrap(), "\"incremental\"");
/// assert_eq!("full".parse::<ReviewType>().unwrap(), ReviewType::Full);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewType {
    /// Review of the entire diff from base to head.
    Full,
    /// Review of the delta since the last reviewed commit.
    Incremental,
}

impl fmt::Display for ReviewType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewType::Full => write!(f, "full"),
            ReviewType::Incremental => write!(f, "incremental"),
        }
    }
}

impl FromStr for ReviewType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "full" => Ok(ReviewType::Full),
            "incremental" => Ok(ReviewType::Incremental),
            other => Err(format!("unknown review type: {other}")),
        }
    }
}

/// Output format for CLI subcommands.
///
/// Implements [`FromStr`] so it can be used directly with `clap` argument parsing.
///
/// # Examples
///
/// ```
/// use gitzoid_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable tables and summaries.
    #[default]
    Text,
    /// Machine-readable JSON.
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

/// Deserialize an optional RFC 3339 timestamp, yielding `None` for missing,
/// null, or unparsable values instead of failing.
///
/// Stored tracker entries and hosting API payloads are both external data;
/// a bad timestamp must never make a whole document unreadable.
///
/// # Examples
///
/// ```
/// use chrono::{DateTime, Utc};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Stamp {
///     #[serde(default, deserialize_with = "gitzoid_core::lenient_timestamp")]
///     at: Option<DateTime<Utc>>,
/// }
///
/// let ok: Stamp = serde_json::from_str(r#"{"at": "2024-01-15T10:00:00Z"}"#).unwrap();
/// assert!(ok.at.is_some());
///
/// let bad: Stamp = serde_json::from_str(r#"{"at": "invalid-date"}"#).unwrap();
/// assert!(bad.at.is_none());
/// ```
pub fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc)))
}
