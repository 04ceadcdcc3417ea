use chrono::{DateTime, Utc};
use gitzoid_core::{ChangedFile, PullRequest, ReviewType};
use serde::Serialize;

/// What the incremental reviewer needs to know about the previous review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviousReview {
    /// Commit the previous review covered.
    #[serde(rename = "previous_sha")]
    pub sha: String,
    /// Rendered body of the previous review comment.
    #[serde(rename = "previous_review_text")]
    pub review_text: String,
}

/// Review type together with the data only an incremental review carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewKind {
    Full,
    Incremental(PreviousReview),
}

impl ReviewKind {
    pub fn review_type(&self) -> ReviewType {
        match self {
            ReviewKind::Full => ReviewType::Full,
            ReviewKind::Incremental(_) => ReviewType::Incremental,
        }
    }
}

/// Normalized record handed to the review generator.
///
/// `previous_sha` and `previous_review_text` are serialized only for
/// incremental reviews; for full reviews the keys are absent, not null.
///
/// # Examples
///
/// ```
/// use gitzoid_core::PullRequest;
/// use gitzoid_tracker::{build_payload, ReviewKind};
///
/// let pr = PullRequest::new("octo/repo", 9);
/// let payload = build_payload(&pr, vec![], ReviewKind::Full, "abc123");
/// let json = serde_json::to_value(&payload).unwrap();
/// assert_eq!(json["review_type"], "full");
/// assert!(json.get("previous_sha").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewPayload {
    pub repo: String,
    pub pr_number: u64,
    pub title: Option<String>,
    pub body: Option<String>,
    pub target_branch: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    /// Files relevant to the review: the whole PR, or the compare range.
    pub files: Vec<ChangedFile>,
    pub review_type: ReviewType,
    pub current_sha: String,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub previous: Option<PreviousReview>,
}

impl ReviewPayload {
    /// Key of the tracker entry this payload feeds back into.
    pub fn tracker_key(&self) -> String {
        format!("{}#{}", self.repo, self.pr_number)
    }
}

/// Assemble the payload for one actionable pull request.
pub fn build_payload(
    pr: &PullRequest,
    files: Vec<ChangedFile>,
    kind: ReviewKind,
    current_sha: impl Into<String>,
) -> ReviewPayload {
    let review_type = kind.review_type();
    let previous = match kind {
        ReviewKind::Full => None,
        ReviewKind::Incremental(prev) => Some(prev),
    };

    ReviewPayload {
        repo: pr.repo.clone(),
        pr_number: pr.number,
        title: pr.title.clone(),
        body: pr.body.clone(),
        target_branch: pr.target_branch.clone(),
        created_at: pr.created_at,
        files,
        review_type,
        current_sha: current_sha.into(),
        previous,
    }
}
