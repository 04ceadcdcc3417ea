use std::fmt;

use chrono::{DateTime, Utc};
use gitzoid_core::{RepositoryConfig, ReviewType};
use gitzoid_tracker::{PullRequestSource, ReviewPayload, ReviewTracker, TrackerStore};
use serde::Serialize;
use tracing::{info, warn};

use crate::github::CommentPublisher;
use crate::llm::ReviewGenerator;

/// The collaborators that turn payloads into posted comments.
///
/// A pass run without a reviewer is a dry run: payloads are built and
/// reported but nothing is generated, posted or marked as reviewed.
#[derive(Clone, Copy)]
pub struct Reviewer<'a> {
    pub generator: &'a dyn ReviewGenerator,
    pub publisher: &'a dyn CommentPublisher,
}

/// Outcome for a single pull request within a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrOutcome {
    pub repo: String,
    pub number: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review_type: Option<ReviewType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl PrOutcome {
    fn from_payload(payload: &ReviewPayload, detail: Option<String>) -> Self {
        Self {
            repo: payload.repo.clone(),
            number: payload.pr_number,
            review_type: Some(payload.review_type),
            detail,
        }
    }
}

/// A repository whose open PRs could not be listed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryFailure {
    pub repo: String,
    pub error: String,
}

/// Result of one pass over all configured repositories.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    /// Reviews generated, posted and recorded.
    pub reviewed: Vec<PrOutcome>,
    /// Payloads whose generation or posting failed; retried next pass.
    pub failed: Vec<PrOutcome>,
    /// PRs that needed a review but had no usable diff.
    pub dropped: Vec<PrOutcome>,
    /// Payloads built during a dry run.
    pub pending: Vec<PrOutcome>,
    /// Repositories skipped because listing failed.
    pub failed_repositories: Vec<RepositoryFailure>,
    /// Whether the tracker needs to be persisted.
    pub tracker_changed: bool,
}

/// Run one pass over `repositories`.
///
/// Repositories and PRs are processed sequentially. A failure for one PR
/// never stops the pass; the PR is reported and left untracked so the next
/// pass retries it.
pub async fn run_pass<S: TrackerStore>(
    tracker: &mut ReviewTracker<S>,
    repositories: &[RepositoryConfig],
    source: &dyn PullRequestSource,
    reviewer: Option<Reviewer<'_>>,
    default_context: Option<&str>,
    now: DateTime<Utc>,
) -> PassSummary {
    let mut summary = PassSummary::default();

    for repo in repositories {
        let pass = tracker.process_repository(repo, source, now).await;
        summary.tracker_changed |= pass.changed;

        if let Some(error) = pass.listing_error {
            summary.failed_repositories.push(RepositoryFailure {
                repo: repo.id.clone(),
                error,
            });
            continue;
        }

        summary.dropped.extend(pass.dropped.into_iter().map(|d| PrOutcome {
            repo: repo.id.clone(),
            number: d.number,
            review_type: None,
            detail: Some(d.reason.to_string()),
        }));

        let context = repo.additional_context.as_deref().or(default_context);
        for payload in pass.payloads {
            let Some(reviewer) = reviewer else {
                let detail = format!("{} changed file(s)", payload.files.len());
                summary.pending.push(PrOutcome::from_payload(&payload, Some(detail)));
                continue;
            };

            match review_one(reviewer, &payload, context).await {
                Ok(comment) => {
                    summary.tracker_changed |= tracker.mark_reviewed(
                        &payload.repo,
                        payload.pr_number,
                        &payload.current_sha,
                        Some(comment),
                        now,
                    );
                    info!(
                        key = %payload.tracker_key(),
                        review_type = %payload.review_type,
                        "posted review"
                    );
                    summary.reviewed.push(PrOutcome::from_payload(&payload, None));
                }
                Err(e) => {
                    warn!(key = %payload.tracker_key(), error = %e, "review failed");
                    summary
                        .failed
                        .push(PrOutcome::from_payload(&payload, Some(e.to_string())));
                }
            }
        }
    }

    summary
}

async fn review_one(
    reviewer: Reviewer<'_>,
    payload: &ReviewPayload,
    context: Option<&str>,
) -> gitzoid_core::Result<String> {
    let result = reviewer.generator.generate(payload, context).await?;
    let comment = result.render(payload);
    reviewer
        .publisher
        .post_comment(&payload.repo, payload.pr_number, &comment)
        .await?;
    Ok(comment)
}

impl fmt::Display for PassSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Review Pass")?;
        writeln!(f, "===========")?;
        writeln!(
            f,
            "Reviewed: {} | Failed: {} | Dropped: {} | Pending: {}\n",
            self.reviewed.len(),
            self.failed.len(),
            self.dropped.len(),
            self.pending.len(),
        )?;

        for (label, outcomes) in [
            ("REVIEWED", &self.reviewed),
            ("PENDING", &self.pending),
            ("FAILED", &self.failed),
            ("DROPPED", &self.dropped),
        ] {
            for o in outcomes {
                write!(f, "[{label}] {}#{}", o.repo, o.number)?;
                if let Some(t) = o.review_type {
                    write!(f, " ({t})")?;
                }
                if let Some(d) = &o.detail {
                    write!(f, ": {d}")?;
                }
                writeln!(f)?;
            }
        }
        for r in &self.failed_repositories {
            writeln!(f, "[UNREACHABLE] {}: {}", r.repo, r.error)?;
        }

        if self.reviewed.is_empty() && self.pending.is_empty() && self.failed.is_empty() {
            writeln!(f, "Nothing to review.")?;
        }
        Ok(())
    }
}
