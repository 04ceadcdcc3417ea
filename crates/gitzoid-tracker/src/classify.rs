//! Stateless predicates that decide which open PRs reach the tracker.

use chrono::{DateTime, TimeDelta, Utc};
use gitzoid_core::{AccountKind, PullRequest};

/// Returns `true` if the PR was opened by an automation account.
///
/// Either the account kind says so, or the login ends with `[bot]`
/// (case-insensitive). A PR without author data is treated as human.
///
/// # Examples
///
/// ```
/// use gitzoid_core::{Author, PullRequest};
/// use gitzoid_tracker::classify::is_bot;
///
/// let mut pr = PullRequest::new("octo/repo", 1);
/// assert!(!is_bot(&pr));
///
/// pr.author = Some(Author { login: Some("Renovate[BOT]".into()), kind: None });
/// assert!(is_bot(&pr));
/// ```
pub fn is_bot(pr: &PullRequest) -> bool {
    let Some(author) = &pr.author else {
        return false;
    };
    if author.kind == Some(AccountKind::Bot) {
        return true;
    }
    author
        .login
        .as_deref()
        .is_some_and(|login| login.to_lowercase().ends_with("[bot]"))
}

/// Returns `true` if the PR was created more than `days` days before `now`.
///
/// A PR with no usable creation time is never stale.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, Utc};
/// use gitzoid_core::PullRequest;
/// use gitzoid_tracker::classify::is_stale;
///
/// let now = Utc::now();
/// let mut pr = PullRequest::new("octo/repo", 1);
/// assert!(!is_stale(&pr, 60, now));
///
/// pr.created_at = Some(now - Duration::days(70));
/// assert!(is_stale(&pr, 60, now));
/// ```
pub fn is_stale(pr: &PullRequest, days: i64, now: DateTime<Utc>) -> bool {
    older_than(pr.created_at, days, now)
}

/// Returns `true` if `timestamp` lies more than `days` days before `now`.
///
/// Missing timestamps and windows too large to represent are never "older".
pub fn older_than(timestamp: Option<DateTime<Utc>>, days: i64, now: DateTime<Utc>) -> bool {
    let (Some(ts), Some(window)) = (timestamp, TimeDelta::try_days(days)) else {
        return false;
    };
    now.signed_duration_since(ts) > window
}

/// Returns `true` if the PR merges into `branch`, or if no branch is pinned.
///
/// # Examples
///
/// ```
/// use gitzoid_core::PullRequest;
/// use gitzoid_tracker::classify::targets_branch;
///
/// let mut pr = PullRequest::new("octo/repo", 1);
/// pr.target_branch = Some("develop".into());
/// assert!(targets_branch(&pr, None));
/// assert!(targets_branch(&pr, Some("develop")));
/// assert!(!targets_branch(&pr, Some("main")));
/// ```
pub fn targets_branch(pr: &PullRequest, branch: Option<&str>) -> bool {
    match branch.filter(|b| !b.is_empty()) {
        None => true,
        Some(wanted) => pr.target_branch.as_deref() == Some(wanted),
    }
}
