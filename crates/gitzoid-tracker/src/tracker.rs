use std::collections::HashSet;

use chrono::{DateTime, Utc};
use gitzoid_core::{PullRequest, RepositoryConfig, ReviewConfig};
use tracing::{debug, info, warn};

use crate::classify::{is_bot, is_stale, older_than, targets_branch};
use crate::payload::{build_payload, PreviousReview, ReviewKind, ReviewPayload};
use crate::source::PullRequestSource;
use crate::store::{TrackerEntry, TrackerStore};

/// Knobs of the review lifecycle.
///
/// # Examples
///
/// ```
/// use gitzoid_tracker::TrackerSettings;
///
/// let settings = TrackerSettings::default();
/// assert_eq!(settings.first_run_limit, 2);
/// assert_eq!(settings.retention_days, 90);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerSettings {
    /// PRs reviewed the first time a repository is processed.
    pub first_run_limit: usize,
    /// PRs older than this many days are filtered out before any decision.
    pub stale_pr_days: i64,
    /// Entries whose last transition is older than this are dropped.
    pub retention_days: i64,
    /// Filter out PRs opened by bots.
    pub skip_bots: bool,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self::from(&ReviewConfig::default())
    }
}

impl From<&ReviewConfig> for TrackerSettings {
    fn from(config: &ReviewConfig) -> Self {
        Self {
            first_run_limit: config.first_run_limit,
            stale_pr_days: config.stale_pr_days,
            retention_days: config.retention_days,
            skip_bots: config.skip_bots,
        }
    }
}

/// What to do with one surviving pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewAction {
    /// Review the complete PR diff.
    Full,
    /// Review only the commits after `previous.sha`.
    Incremental(PreviousReview),
    /// Beyond the first-run cutoff: record as skipped, never fetch.
    Skip,
    /// Already handled; nothing to do.
    NoAction,
}

/// Why an actionable PR produced no payload in this pass.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SkipReason {
    #[error("pull request has no head commit")]
    MissingHeadSha,
    #[error("failed to fetch changed files: {0}")]
    FetchFailed(String),
    #[error("no changed files")]
    NoChangedFiles,
}

/// A PR that needed a review but was dropped from this pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedPr {
    pub number: u64,
    pub reason: SkipReason,
}

/// Outcome of one repository pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepositoryPass {
    /// Actionable payloads, most recently created PR first.
    pub payloads: Vec<ReviewPayload>,
    /// PRs that needed a review but could not be prepared.
    pub dropped: Vec<DroppedPr>,
    /// Whether any tracker entry was created, mutated, or deleted.
    pub changed: bool,
    /// Set when the open-PR listing failed and the pass was abandoned.
    pub listing_error: Option<String>,
}

/// Per-repository review state machine over an injected [`TrackerStore`].
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use gitzoid_tracker::{ReviewTracker, TrackerMap, TrackerSettings};
///
/// let mut tracker = ReviewTracker::new(TrackerMap::default(), TrackerSettings::default());
/// assert!(tracker.is_first_run("octo/repo"));
///
/// tracker.mark_skipped("octo/repo", 4, Utc::now());
/// assert!(!tracker.is_first_run("octo/repo"));
/// ```
pub struct ReviewTracker<S> {
    store: S,
    settings: TrackerSettings,
}

impl<S: TrackerStore> ReviewTracker<S> {
    pub fn new(store: S, settings: TrackerSettings) -> Self {
        Self { store, settings }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns `true` if no entry exists for any PR of `repo`.
    pub fn is_first_run(&self, repo: &str) -> bool {
        self.store.keys_with_prefix(&key_prefix(repo)).is_empty()
    }

    /// Apply the classifier to the live listing and order the survivors by
    /// creation time, newest first. PRs without a creation time sort last;
    /// ties keep the listing order.
    pub fn select_candidates(
        &self,
        open: &[PullRequest],
        target_branch: Option<&str>,
        now: DateTime<Utc>,
    ) -> Vec<PullRequest> {
        let mut candidates: Vec<PullRequest> = open
            .iter()
            .filter(|pr| {
                if self.settings.skip_bots && is_bot(pr) {
                    debug!(repo = %pr.repo, pr = pr.number, "ignoring bot pull request");
                    return false;
                }
                if is_stale(pr, self.settings.stale_pr_days, now) {
                    debug!(repo = %pr.repo, pr = pr.number, "ignoring stale pull request");
                    return false;
                }
                targets_branch(pr, target_branch)
            })
            .cloned()
            .collect();
        candidates.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        candidates
    }

    /// Decide the action for each candidate. Pure: reads the store only.
    pub fn decide<'a>(
        &self,
        repo: &str,
        candidates: &'a [PullRequest],
    ) -> Vec<(&'a PullRequest, ReviewAction)> {
        if self.is_first_run(repo) {
            let limit = self.settings.first_run_limit;
            return candidates
                .iter()
                .enumerate()
                .map(|(i, pr)| {
                    let action = if i < limit {
                        ReviewAction::Full
                    } else {
                        ReviewAction::Skip
                    };
                    (pr, action)
                })
                .collect();
        }

        candidates
            .iter()
            .map(|pr| (pr, self.action_for(pr)))
            .collect()
    }

    fn action_for(&self, pr: &PullRequest) -> ReviewAction {
        match self.store.get(&pr.tracker_key()) {
            None => ReviewAction::Full,
            Some(TrackerEntry::Skipped { .. }) => ReviewAction::NoAction,
            Some(TrackerEntry::Reviewed {
                last_reviewed_sha,
                last_review_text,
                ..
            }) => {
                // An entry without a reviewed commit cannot anchor a delta.
                let Some(previous_sha) = last_reviewed_sha else {
                    return ReviewAction::NoAction;
                };
                if pr.head_sha.as_deref() == Some(previous_sha.as_str()) {
                    return ReviewAction::NoAction;
                }
                match last_review_text.filter(|t| !t.trim().is_empty()) {
                    Some(review_text) => ReviewAction::Incremental(PreviousReview {
                        sha: previous_sha,
                        review_text,
                    }),
                    None => ReviewAction::NoAction,
                }
            }
        }
    }

    /// Run one pass for `repo`: list, classify, decide, fetch, clean up.
    ///
    /// A listing failure abandons the pass before anything is written.
    /// Failures for a single PR drop only that PR.
    pub async fn process_repository(
        &mut self,
        repo: &RepositoryConfig,
        source: &dyn PullRequestSource,
        now: DateTime<Utc>,
    ) -> RepositoryPass {
        let open = match source.list_open_prs(&repo.id).await {
            Ok(prs) => prs,
            Err(e) => {
                warn!(repo = %repo.id, error = %e, "failed to list open pull requests");
                return RepositoryPass {
                    listing_error: Some(e.to_string()),
                    ..RepositoryPass::default()
                };
            }
        };

        let first_run = self.is_first_run(&repo.id);
        let candidates = self.select_candidates(&open, repo.target_branch.as_deref(), now);
        info!(
            repo = %repo.id,
            open = open.len(),
            candidates = candidates.len(),
            first_run,
            "processing repository"
        );

        let plan: Vec<(PullRequest, ReviewAction)> = self
            .decide(&repo.id, &candidates)
            .into_iter()
            .map(|(pr, action)| (pr.clone(), action))
            .collect();

        let mut changed = false;
        let mut results = Vec::new();
        for (pr, action) in plan {
            let kind = match action {
                ReviewAction::NoAction => continue,
                ReviewAction::Skip => {
                    debug!(repo = %repo.id, pr = pr.number, "beyond first-run limit, skipping");
                    changed |= self.mark_skipped(&repo.id, pr.number, now);
                    continue;
                }
                ReviewAction::Full => ReviewKind::Full,
                ReviewAction::Incremental(previous) => ReviewKind::Incremental(previous),
            };
            let result = prepare_payload(&pr, kind, source).await;
            results.push((pr.number, result));
        }

        changed |= self.cleanup(&repo.id, &open, now);

        let mut pass = RepositoryPass {
            changed,
            ..RepositoryPass::default()
        };
        for (number, result) in results {
            match result {
                Ok(payload) => pass.payloads.push(payload),
                Err(reason) => {
                    warn!(repo = %repo.id, pr = number, %reason, "dropping pull request");
                    pass.dropped.push(DroppedPr { number, reason });
                }
            }
        }
        pass.payloads.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        pass
    }

    /// Delete entries of `repo` whose PR is no longer open or whose last
    /// transition is older than the retention window.
    ///
    /// Returns `true` if anything was deleted.
    pub fn cleanup(&mut self, repo: &str, open: &[PullRequest], now: DateTime<Utc>) -> bool {
        let prefix = key_prefix(repo);
        let open_numbers: HashSet<u64> = open.iter().map(|pr| pr.number).collect();

        let mut removed = 0usize;
        for key in self.store.keys_with_prefix(&prefix) {
            let number = key[prefix.len()..].parse::<u64>().ok();
            let closed = number.map_or(true, |n| !open_numbers.contains(&n));
            let expired = self.store.get(&key).is_some_and(|entry| {
                older_than(entry.last_transition(), self.settings.retention_days, now)
            });

            if closed || expired {
                debug!(key = %key, closed, expired, "removing tracker entry");
                self.store.remove(&key);
                removed += 1;
            }
        }

        if removed > 0 {
            info!(repo, removed, "cleaned up tracker entries");
        }
        removed > 0
    }

    /// Record that the review of `sha` was posted. Always changes the store.
    pub fn mark_reviewed(
        &mut self,
        repo: &str,
        number: u64,
        sha: &str,
        review_text: Option<String>,
        now: DateTime<Utc>,
    ) -> bool {
        self.store.put(
            tracker_key(repo, number),
            TrackerEntry::reviewed(sha, review_text, now),
        );
        true
    }

    /// Record that the PR will never be reviewed. Always changes the store.
    pub fn mark_skipped(&mut self, repo: &str, number: u64, now: DateTime<Utc>) -> bool {
        self.store.put(tracker_key(repo, number), TrackerEntry::skipped(now));
        true
    }
}

async fn prepare_payload(
    pr: &PullRequest,
    kind: ReviewKind,
    source: &dyn PullRequestSource,
) -> Result<ReviewPayload, SkipReason> {
    let head = pr
        .head_sha
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or(SkipReason::MissingHeadSha)?;

    let fetched = match &kind {
        ReviewKind::Full => source.fetch_full_diff(&pr.repo, pr.number).await,
        ReviewKind::Incremental(previous) => {
            source
                .fetch_compare_diff(&pr.repo, &previous.sha, head)
                .await
        }
    };
    let files = fetched.map_err(|e| SkipReason::FetchFailed(e.to_string()))?;
    if files.is_empty() {
        return Err(SkipReason::NoChangedFiles);
    }

    Ok(build_payload(pr, files, kind, head))
}

fn key_prefix(repo: &str) -> String {
    format!("{repo}#")
}

fn tracker_key(repo: &str, number: u64) -> String {
    format!("{repo}#{number}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use gitzoid_core::{AccountKind, Author, ChangedFile, FileStatus, GitzoidError, ReviewType};

    use crate::store::TrackerMap;

    const REPO: &str = "owner/repo";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn pr(number: u64, sha: &str) -> PullRequest {
        let mut pr = PullRequest::new(REPO, number);
        pr.title = Some(format!("Test PR {number}"));
        pr.body = Some("Description".into());
        pr.author = Some(Author {
            login: Some("testuser".into()),
            kind: Some(AccountKind::User),
        });
        pr.created_at = Some(now() - Duration::hours(1));
        pr.head_sha = Some(sha.into());
        pr
    }

    fn file(name: &str) -> ChangedFile {
        ChangedFile {
            filename: name.into(),
            patch: Some("diff".into()),
            status: FileStatus::Modified,
            additions: 1,
            deletions: 0,
        }
    }

    #[derive(Default)]
    struct FakeSource {
        /// `None` simulates a failed listing.
        listing: Option<Vec<PullRequest>>,
        files: HashMap<u64, Vec<ChangedFile>>,
        compare: HashMap<(String, String), Vec<ChangedFile>>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeSource {
        fn listing(prs: Vec<PullRequest>) -> Self {
            Self {
                listing: Some(prs),
                ..Self::default()
            }
        }

        fn with_files(mut self, number: u64, files: Vec<ChangedFile>) -> Self {
            self.files.insert(number, files);
            self
        }

        fn with_compare(mut self, base: &str, head: &str, files: Vec<ChangedFile>) -> Self {
            self.compare.insert((base.into(), head.into()), files);
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PullRequestSource for FakeSource {
        async fn list_open_prs(&self, _repo: &str) -> gitzoid_core::Result<Vec<PullRequest>> {
            self.listing
                .clone()
                .ok_or_else(|| GitzoidError::from_status(500, REPO))
        }

        async fn fetch_full_diff(
            &self,
            _repo: &str,
            number: u64,
        ) -> gitzoid_core::Result<Vec<ChangedFile>> {
            self.calls.lock().unwrap().push(format!("files:{number}"));
            self.files
                .get(&number)
                .cloned()
                .ok_or_else(|| GitzoidError::from_status(404, "files"))
        }

        async fn fetch_compare_diff(
            &self,
            _repo: &str,
            base_sha: &str,
            head_sha: &str,
        ) -> gitzoid_core::Result<Vec<ChangedFile>> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("compare:{base_sha}...{head_sha}"));
            Ok(self
                .compare
                .get(&(base_sha.to_string(), head_sha.to_string()))
                .cloned()
                .unwrap_or_default())
        }
    }

    fn tracker(entries: Vec<(&str, TrackerEntry)>) -> ReviewTracker<TrackerMap> {
        let map = entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        ReviewTracker::new(map, TrackerSettings::default())
    }

    fn repo() -> RepositoryConfig {
        RepositoryConfig::new(REPO)
    }

    #[tokio::test]
    async fn first_run_reviews_limit_and_skips_the_rest() {
        let prs: Vec<_> = (1..=5).map(|n| pr(n, &format!("sha{n}"))).collect();
        let mut source = FakeSource::listing(prs);
        for n in 1..=5 {
            source = source.with_files(n, vec![file("test.py")]);
        }
        let mut tracker = tracker(vec![]);

        let pass = tracker.process_repository(&repo(), &source, now()).await;

        assert_eq!(pass.payloads.len(), 2);
        assert!(pass.payloads.iter().all(|p| p.review_type == ReviewType::Full));
        assert_eq!(pass.payloads[0].pr_number, 1);
        assert_eq!(pass.payloads[1].pr_number, 2);
        assert!(pass.changed);

        let store = tracker.store();
        assert_eq!(store.len(), 3);
        for n in 3..=5 {
            assert!(store.get(&format!("owner/repo#{n}")).unwrap().is_skipped());
        }
        assert_eq!(source.calls(), vec!["files:1", "files:2"]);
    }

    #[tokio::test]
    async fn first_run_prefers_most_recent_prs() {
        let mut old = pr(1, "sha1");
        old.created_at = Some(now() - Duration::days(3));
        let mut newest = pr(2, "sha2");
        newest.created_at = Some(now() - Duration::minutes(5));
        let mut middle = pr(3, "sha3");
        middle.created_at = Some(now() - Duration::days(1));

        let source = FakeSource::listing(vec![old, newest, middle])
            .with_files(1, vec![file("a")])
            .with_files(2, vec![file("b")])
            .with_files(3, vec![file("c")]);
        let mut tracker = tracker(vec![]);

        let pass = tracker.process_repository(&repo(), &source, now()).await;

        let numbers: Vec<u64> = pass.payloads.iter().map(|p| p.pr_number).collect();
        assert_eq!(numbers, vec![2, 3]);
        assert!(tracker.store().get("owner/repo#1").unwrap().is_skipped());
    }

    #[tokio::test]
    async fn entries_for_other_repos_do_not_end_first_run() {
        let source = FakeSource::listing(vec![pr(1, "a"), pr(2, "b"), pr(3, "c")])
            .with_files(1, vec![file("x")])
            .with_files(2, vec![file("x")]);
        let mut tracker = tracker(vec![(
            "other/repo#123",
            TrackerEntry::reviewed("zzz", None, now()),
        )]);

        let pass = tracker.process_repository(&repo(), &source, now()).await;

        assert_eq!(pass.payloads.len(), 2);
        assert!(tracker.store().get("owner/repo#3").unwrap().is_skipped());
        assert!(tracker.store().get("other/repo#123").is_some());
    }

    #[tokio::test]
    async fn new_pr_on_subsequent_run_gets_full_review() {
        let source = FakeSource::listing(vec![pr(4, "sha4")]).with_files(4, vec![file("test.py")]);
        let mut tracker = tracker(vec![(
            "owner/repo#1",
            TrackerEntry::reviewed("abc123", None, now()),
        )]);

        let pass = tracker.process_repository(&repo(), &source, now()).await;

        assert_eq!(pass.payloads.len(), 1);
        assert_eq!(pass.payloads[0].pr_number, 4);
        assert_eq!(pass.payloads[0].review_type, ReviewType::Full);
        // PR #1 is no longer open, so its entry is cleaned up.
        assert!(pass.changed);
        assert!(tracker.store().get("owner/repo#1").is_none());
    }

    #[tokio::test]
    async fn new_commits_produce_incremental_review() {
        let source = FakeSource::listing(vec![pr(123, "new456")]).with_compare(
            "old123",
            "new456",
            vec![file("test.py")],
        );
        let mut tracker = tracker(vec![(
            "owner/repo#123",
            TrackerEntry::reviewed("old123", Some("Previous review".into()), now()),
        )]);

        let pass = tracker.process_repository(&repo(), &source, now()).await;

        assert_eq!(pass.payloads.len(), 1);
        let payload = &pass.payloads[0];
        assert_eq!(payload.pr_number, 123);
        assert_eq!(payload.review_type, ReviewType::Incremental);
        assert_eq!(payload.current_sha, "new456");
        let previous = payload.previous.as_ref().unwrap();
        assert_eq!(previous.sha, "old123");
        assert_eq!(previous.review_text, "Previous review");
        assert_eq!(source.calls(), vec!["compare:old123...new456"]);
        assert!(!pass.changed);
    }

    #[tokio::test]
    async fn unchanged_head_needs_no_action() {
        let source = FakeSource::listing(vec![pr(123, "same")]);
        let mut tracker = tracker(vec![(
            "owner/repo#123",
            TrackerEntry::reviewed("same", Some("Previous review".into()), now()),
        )]);

        let pass = tracker.process_repository(&repo(), &source, now()).await;

        assert!(pass.payloads.is_empty());
        assert!(pass.dropped.is_empty());
        assert!(!pass.changed);
        assert!(source.calls().is_empty());
    }

    #[tokio::test]
    async fn new_commits_without_review_text_need_no_action() {
        let source = FakeSource::listing(vec![pr(123, "new456")]);
        let mut tracker = tracker(vec![(
            "owner/repo#123",
            TrackerEntry::reviewed("old123", Some("   ".into()), now()),
        )]);

        let pass = tracker.process_repository(&repo(), &source, now()).await;

        assert!(pass.payloads.is_empty());
        assert!(source.calls().is_empty());
    }

    #[tokio::test]
    async fn reviewed_entry_without_sha_falls_through_to_no_action() {
        let source = FakeSource::listing(vec![pr(123, "new456")]);
        let mut tracker = tracker(vec![(
            "owner/repo#123",
            TrackerEntry::Reviewed {
                last_reviewed_sha: None,
                last_review_text: Some("Previous review".into()),
                reviewed_at: Some(now()),
            },
        )]);

        let pass = tracker.process_repository(&repo(), &source, now()).await;

        assert!(pass.payloads.is_empty());
        assert!(source.calls().is_empty());
    }

    #[tokio::test]
    async fn skipped_pr_is_never_reprocessed() {
        let source = FakeSource::listing(vec![pr(123, "abc")]).with_files(123, vec![file("x")]);
        let mut tracker = tracker(vec![("owner/repo#123", TrackerEntry::skipped(now()))]);

        for _ in 0..3 {
            let pass = tracker.process_repository(&repo(), &source, now()).await;
            assert!(pass.payloads.is_empty());
            assert!(!pass.changed);
        }
        assert!(source.calls().is_empty());
        assert!(tracker.store().get("owner/repo#123").unwrap().is_skipped());
    }

    #[tokio::test]
    async fn closed_pr_entry_is_removed() {
        let source = FakeSource::listing(vec![]);
        let mut tracker = tracker(vec![(
            "owner/repo#123",
            TrackerEntry::reviewed("abc123", None, now()),
        )]);

        let pass = tracker.process_repository(&repo(), &source, now()).await;

        assert!(tracker.store().get("owner/repo#123").is_none());
        assert!(pass.changed);
    }

    #[tokio::test]
    async fn expired_entry_is_removed_even_if_still_open() {
        let source = FakeSource::listing(vec![pr(7, "abc")]);
        let old = now() - Duration::days(91);
        let mut tracker = tracker(vec![
            ("owner/repo#7", TrackerEntry::skipped(old)),
            ("owner/repo#8", TrackerEntry::skipped(now())),
        ]);

        let removed = tracker.cleanup(REPO, &source.listing.clone().unwrap(), now());

        assert!(removed);
        assert!(tracker.store().get("owner/repo#7").is_none());
        // #8 is closed, so it goes too.
        assert!(tracker.store().get("owner/repo#8").is_none());
    }

    #[test]
    fn cleanup_keeps_fresh_open_entries_and_other_repos() {
        let open = vec![pr(7, "abc")];
        let mut tracker = tracker(vec![
            ("owner/repo#7", TrackerEntry::skipped(now() - Duration::days(89))),
            ("other/repo#1", TrackerEntry::skipped(now() - Duration::days(400))),
        ]);

        assert!(!tracker.cleanup(REPO, &open, now()));
        assert_eq!(tracker.store().len(), 2);
    }

    #[test]
    fn entry_without_timestamp_is_never_expired() {
        let open = vec![pr(7, "abc")];
        let mut tracker = tracker(vec![(
            "owner/repo#7",
            TrackerEntry::Skipped { skipped_at: None },
        )]);

        assert!(!tracker.cleanup(REPO, &open, now()));
    }

    #[tokio::test]
    async fn listing_failure_leaves_tracker_untouched() {
        let source = FakeSource::default();
        let entries = vec![
            (
                "owner/repo#123",
                TrackerEntry::reviewed("abc123", Some("text".into()), now() - Duration::days(200)),
            ),
            ("owner/repo#124", TrackerEntry::skipped(now())),
        ];
        let mut tracker = tracker(entries);
        let before = serde_json::to_string(tracker.store()).unwrap();

        let pass = tracker.process_repository(&repo(), &source, now()).await;

        assert!(pass.payloads.is_empty());
        assert!(!pass.changed);
        assert!(pass.listing_error.unwrap().contains("500"));
        assert_eq!(serde_json::to_string(tracker.store()).unwrap(), before);
    }

    #[tokio::test]
    async fn bot_and_stale_prs_are_filtered() {
        let mut bot = pr(124, "bot123");
        bot.author = Some(Author {
            login: Some("dependabot[bot]".into()),
            kind: Some(AccountKind::Bot),
        });
        let mut stale = pr(125, "old123");
        stale.created_at = Some(now() - Duration::days(70));
        let human = pr(126, "sha126");

        let source = FakeSource::listing(vec![bot, stale, human]).with_files(126, vec![file("x")]);
        let mut tracker = tracker(vec![]);

        let pass = tracker.process_repository(&repo(), &source, now()).await;

        assert_eq!(pass.payloads.len(), 1);
        assert_eq!(pass.payloads[0].pr_number, 126);
        // Filtered PRs are neither reviewed nor recorded as skipped.
        assert!(tracker.store().is_empty());
    }

    #[tokio::test]
    async fn target_branch_filter_applies() {
        let mut on_main = pr(1, "a");
        on_main.target_branch = Some("main".into());
        let mut on_feature = pr(2, "b");
        on_feature.target_branch = Some("feature/x".into());

        let source = FakeSource::listing(vec![on_main, on_feature]).with_files(1, vec![file("x")]);
        let mut tracker = tracker(vec![]);
        let mut repo = repo();
        repo.target_branch = Some("main".into());

        let pass = tracker.process_repository(&repo, &source, now()).await;

        assert_eq!(pass.payloads.len(), 1);
        assert_eq!(pass.payloads[0].pr_number, 1);
    }

    #[tokio::test]
    async fn per_pr_failures_do_not_abort_the_pass() {
        let mut headless = pr(2, "");
        headless.head_sha = None;
        let source = FakeSource::listing(vec![pr(1, "a"), headless, pr(3, "c"), pr(4, "d")])
            .with_files(1, vec![file("ok.rs")])
            .with_files(4, vec![]);
        let mut tracker = ReviewTracker::new(
            [("owner/repo#99".to_string(), TrackerEntry::skipped(now()))]
                .into_iter()
                .collect::<TrackerMap>(),
            TrackerSettings::default(),
        );

        let pass = tracker.process_repository(&repo(), &source, now()).await;

        assert_eq!(pass.payloads.len(), 1);
        assert_eq!(pass.payloads[0].pr_number, 1);
        let reasons: HashMap<u64, SkipReason> = pass
            .dropped
            .into_iter()
            .map(|d| (d.number, d.reason))
            .collect();
        assert_eq!(reasons[&2], SkipReason::MissingHeadSha);
        assert!(matches!(reasons[&3], SkipReason::FetchFailed(_)));
        assert_eq!(reasons[&4], SkipReason::NoChangedFiles);
        // Dropped PRs get no entry and can be retried next pass.
        assert!(tracker.store().get("owner/repo#3").is_none());
    }

    #[tokio::test]
    async fn payloads_are_sorted_newest_first() {
        let mut a = pr(1, "a");
        a.created_at = Some(now() - Duration::days(2));
        let mut b = pr(2, "b");
        b.created_at = Some(now() - Duration::hours(2));
        let source = FakeSource::listing(vec![a, b])
            .with_files(1, vec![file("x")])
            .with_files(2, vec![file("y")]);
        let mut tracker = tracker(vec![(
            "owner/repo#50",
            TrackerEntry::reviewed("zzz", None, now()),
        )]);

        let pass = tracker.process_repository(&repo(), &source, now()).await;

        let numbers: Vec<u64> = pass.payloads.iter().map(|p| p.pr_number).collect();
        assert_eq!(numbers, vec![2, 1]);
    }

    #[test]
    fn mark_reviewed_replaces_skip_state_and_sets_timestamp() {
        let mut tracker = tracker(vec![]);
        assert!(tracker.mark_reviewed(REPO, 123, "abc123", Some("Review text".into()), now()));

        match tracker.store().get("owner/repo#123").unwrap() {
            TrackerEntry::Reviewed {
                last_reviewed_sha,
                last_review_text,
                reviewed_at,
            } => {
                assert_eq!(last_reviewed_sha.as_deref(), Some("abc123"));
                assert_eq!(last_review_text.as_deref(), Some("Review text"));
                assert_eq!(reviewed_at, Some(now()));
            }
            other => panic!("unexpected entry {other:?}"),
        }

        assert!(tracker.mark_reviewed(REPO, 123, "new456", Some("New review".into()), now()));
        assert_eq!(tracker.store().len(), 1);
    }
}
