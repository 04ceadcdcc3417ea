use gitzoid_core::GitzoidError;
use gitzoid_tracker::ReviewPayload;
use serde::de::DeserializeOwned;

use crate::budget::format_changed_files;
use crate::render::{short_sha, FullReview, IncrementalReview};

const FULL_SYSTEM_PROMPT: &str = "\
You are Gitzoid, an experienced senior software engineer reviewing a GitHub \
pull request. Write a structured, clear, concise and friendly review.

Rules:
- Explain what the PR does and the nature of the changes
- Point out bugs, breaking changes, missing edge cases and risky patterns
- Suggest improvements to performance, readability or simplicity
- Do not repeat raw code back to the author
- Keep every point to one or two sentences

Respond with a JSON object:
{
  \"summary\": [\"...\"],
  \"potential_issues\": [\"...\"],
  \"potential_optimizations\": [\"...\"],
  \"suggestions\": [\"...\"]
}

Use an empty list for any section with nothing to say.";

const INCREMENTAL_SYSTEM_PROMPT: &str = "\
You are Gitzoid, an experienced senior software engineer doing a follow-up \
review of a GitHub pull request you have reviewed before. Only the commits \
pushed since your last review are shown.

Rules:
- Summarize what the new commits change
- Say which points from your previous review are now addressed
- Report new problems introduced by the new commits only
- Do not repeat points from the previous review that still stand

Respond with a JSON object:
{
  \"changes_summary\": [\"...\"],
  \"addressed_issues\": [\"...\"],
  \"new_observations\": [\"...\"]
}

Use an empty list for any section with nothing to say.";

/// System prompt for a full review.
///
/// # Examples
///
/// ```
/// use gitzoid_review::prompt::full_system_prompt;
///
/// assert!(full_system_prompt().contains("potential_issues"));
/// ```
pub fn full_system_prompt() -> &'static str {
    FULL_SYSTEM_PROMPT
}

/// System prompt for an incremental review.
pub fn incremental_system_prompt() -> &'static str {
    INCREMENTAL_SYSTEM_PROMPT
}

fn push_metadata(prompt: &mut String, payload: &ReviewPayload) {
    prompt.push_str("### PR Metadata\n");
    prompt.push_str(&format!("- PR Number: {}\n", payload.pr_number));
    prompt.push_str(&format!("- Title: {}\n", or_none(payload.title.as_deref())));
    prompt.push_str(&format!(
        "- Description: {}\n",
        or_none(payload.body.as_deref())
    ));
    prompt.push_str(&format!(
        "- Target Branch: {}\n",
        or_none(payload.target_branch.as_deref())
    ));
}

fn push_context(prompt: &mut String, additional_context: Option<&str>) {
    let Some(ctx) = additional_context.map(str::trim).filter(|c| !c.is_empty()) else {
        return;
    };
    prompt.push_str("\n##CONTEXT START##\n");
    prompt.push_str("Additional context from the repository maintainers:\n");
    prompt.push_str(ctx);
    prompt.push_str("\n##CONTEXT END##\n");
}

fn or_none(value: Option<&str>) -> &str {
    value.filter(|v| !v.trim().is_empty()).unwrap_or("(none)")
}

/// Build the user prompt for a full review of `payload`.
///
/// # Examples
///
/// ```
/// use gitzoid_core::PullRequest;
/// use gitzoid_review::prompt::build_full_review_prompt;
/// use gitzoid_tracker::{build_payload, ReviewKind};
///
/// let mut pr = PullRequest::new("octo/repo", 12);
/// pr.title = Some("Add retries".into());
/// let payload = build_payload(&pr, vec![], ReviewKind::Full, "abc1234");
///
/// let prompt = build_full_review_prompt(&payload, 25_000, None);
/// assert!(prompt.contains("PR Number: 12"));
/// assert!(prompt.contains("Title: Add retries"));
/// ```
pub fn build_full_review_prompt(
    payload: &ReviewPayload,
    max_chars: usize,
    additional_context: Option<&str>,
) -> String {
    let mut prompt = String::from("Review the following pull request.\n\n");
    push_metadata(&mut prompt, payload);
    push_context(&mut prompt, additional_context);
    prompt.push_str("\n### Changed Files and Diffs\n");
    prompt.push_str(&format_changed_files(&payload.files, Some(max_chars)));
    prompt.push('\n');
    prompt
}

/// Build the user prompt for an incremental review of `payload`.
///
/// Only the compare range is included. The previous review is quoted when
/// the payload carries one.
pub fn build_incremental_review_prompt(
    payload: &ReviewPayload,
    max_chars: usize,
    additional_context: Option<&str>,
) -> String {
    let previous_sha = payload
        .previous
        .as_ref()
        .map(|p| short_sha(&p.sha))
        .unwrap_or_else(|| "unknown".into());

    let mut prompt = String::from(
        "This is a FOLLOW-UP review. The author pushed NEW COMMITS since your last review.\n\
         Focus ONLY on the new changes shown below.\n\n",
    );
    push_metadata(&mut prompt, payload);
    prompt.push_str(&format!("- Previous SHA: {previous_sha}\n"));
    prompt.push_str(&format!(
        "- Current SHA: {}\n",
        short_sha(&payload.current_sha)
    ));
    push_context(&mut prompt, additional_context);

    if let Some(text) = payload
        .previous
        .as_ref()
        .map(|p| p.review_text.trim())
        .filter(|t| !t.is_empty())
    {
        prompt.push_str("\n### Previous Gitzoid Review\n");
        prompt.push_str(text);
        prompt.push('\n');
    }

    prompt.push_str("\n### New Changes Since Last Review\n");
    prompt.push_str(&format_changed_files(&payload.files, Some(max_chars)));
    prompt.push('\n');
    prompt
}

/// Parse a full review response from the model.
///
/// # Errors
///
/// Returns [`GitzoidError::Llm`] if the response is not the expected JSON.
///
/// # Examples
///
/// ```
/// use gitzoid_review::prompt::parse_full_review;
///
/// let review = parse_full_review("```json\n{\"summary\": [\"ok\"]}\n```").unwrap();
/// assert_eq!(review.summary, vec!["ok"]);
/// ```
pub fn parse_full_review(response: &str) -> Result<FullReview, GitzoidError> {
    parse_structured(response)
}

/// Parse an incremental review response from the model.
///
/// # Errors
///
/// Returns [`GitzoidError::Llm`] if the response is not the expected JSON.
pub fn parse_incremental_review(response: &str) -> Result<IncrementalReview, GitzoidError> {
    parse_structured(response)
}

fn parse_structured<T: DeserializeOwned>(response: &str) -> Result<T, GitzoidError> {
    let cleaned = strip_code_fences(response);
    serde_json::from_str(cleaned)
        .map_err(|e| GitzoidError::Llm(format!("failed to parse review response: {e}")))
}

fn strip_code_fences(s: &str) -> &str {
    let trimmed = s.trim();
    for fence in ["```json", "```"] {
        if let Some(inner) = trimmed
            .strip_prefix(fence)
            .and_then(|rest| rest.strip_suffix("```"))
        {
            return inner.trim();
        }
    }
    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitzoid_core::{ChangedFile, FileStatus, PullRequest};
    use gitzoid_tracker::{build_payload, PreviousReview, ReviewKind};

    fn pr() -> PullRequest {
        let mut pr = PullRequest::new("owner/repo", 123);
        pr.title = Some("Test PR".into());
        pr.body = Some("Fixes the flaky login test".into());
        pr.target_branch = Some("main".into());
        pr
    }

    fn files() -> Vec<ChangedFile> {
        vec![
            ChangedFile {
                filename: "test.py".into(),
                patch: Some("-old\n+new".into()),
                status: FileStatus::Modified,
                additions: 1,
                deletions: 1,
            },
            ChangedFile {
                filename: "new_file.py".into(),
                patch: Some("+print('hi')".into()),
                status: FileStatus::Added,
                additions: 1,
                deletions: 0,
            },
        ]
    }

    fn incremental(review_text: &str) -> ReviewPayload {
        let kind = ReviewKind::Incremental(PreviousReview {
            sha: "abc123def456".into(),
            review_text: review_text.into(),
        });
        build_payload(&pr(), files(), kind, "def456ghi789")
    }

    #[test]
    fn full_prompt_includes_metadata_and_files() {
        let payload = build_payload(&pr(), files(), ReviewKind::Full, "abc");
        let prompt = build_full_review_prompt(&payload, 25_000, None);

        assert!(prompt.contains("PR Number: 123"));
        assert!(prompt.contains("Title: Test PR"));
        assert!(prompt.contains("Description: Fixes the flaky login test"));
        assert!(prompt.contains("Target Branch: main"));
        assert!(prompt.contains("test.py"));
        assert!(prompt.contains("new_file.py"));
        assert!(!prompt.contains("##CONTEXT START##"));
    }

    #[test]
    fn full_prompt_with_missing_fields() {
        let payload = build_payload(
            &PullRequest::new("owner/repo", 123),
            vec![],
            ReviewKind::Full,
            "abc",
        );
        let prompt = build_full_review_prompt(&payload, 25_000, None);

        assert!(prompt.contains("PR Number: 123"));
        assert!(prompt.contains("Title: (none)"));
        assert!(prompt.contains("No files changed."));
    }

    #[test]
    fn context_block_only_when_present() {
        let payload = build_payload(&pr(), files(), ReviewKind::Full, "abc");

        let with = build_full_review_prompt(&payload, 25_000, Some("Custom review guidelines"));
        assert!(with.contains("##CONTEXT START##"));
        assert!(with.contains("Additional context"));
        assert!(with.contains("Custom review guidelines"));

        let blank = build_full_review_prompt(&payload, 25_000, Some("   "));
        assert!(!blank.contains("##CONTEXT START##"));
    }

    #[test]
    fn incremental_prompt_quotes_previous_review() {
        let payload = incremental("Previous review text here");
        let prompt = build_incremental_review_prompt(&payload, 25_000, None);

        assert!(prompt.contains("Previous Gitzoid Review"));
        assert!(prompt.contains("Previous review text here"));
    }

    #[test]
    fn incremental_prompt_skips_blank_previous_review() {
        let prompt = build_incremental_review_prompt(&incremental(" "), 25_000, None);
        assert!(!prompt.contains("Previous Gitzoid Review"));
    }

    #[test]
    fn incremental_prompt_shows_short_shas() {
        let prompt =
            build_incremental_review_prompt(&incremental("x"), 25_000, Some("Custom context"));

        assert!(prompt.contains("Previous SHA: abc123d"));
        assert!(prompt.contains("Current SHA: def456g"));
        assert!(!prompt.contains("abc123def456"));
        assert!(prompt.contains("Custom context"));
    }

    #[test]
    fn incremental_prompt_focuses_on_new_changes() {
        let prompt = build_incremental_review_prompt(&incremental("x"), 25_000, None);

        assert!(prompt.contains("NEW COMMITS"));
        assert!(prompt.contains("FOLLOW-UP"));
        assert!(prompt.contains("Focus ONLY on the new changes"));
    }

    #[test]
    fn incremental_prompt_for_payload_without_history() {
        let payload = build_payload(&pr(), files(), ReviewKind::Full, "def456ghi789");
        let prompt = build_incremental_review_prompt(&payload, 25_000, None);

        assert!(prompt.contains("Previous SHA: unknown"));
        assert!(!prompt.contains("Previous Gitzoid Review"));
    }

    #[test]
    fn diff_budget_is_applied() {
        let mut payload = build_payload(&pr(), files(), ReviewKind::Full, "abc");
        payload.files[0].patch = Some("x".repeat(10_000));
        let prompt = build_full_review_prompt(&payload, 500, None);

        assert!(prompt.contains("(truncated)"));
        assert!(prompt.len() < 2_000);
    }

    #[test]
    fn parse_full_review_defaults_missing_sections() {
        let review = parse_full_review(r#"{"summary": ["a"], "suggestions": ["b"]}"#).unwrap();
        assert_eq!(review.summary, vec!["a"]);
        assert_eq!(review.suggestions, vec!["b"]);
        assert!(review.potential_issues.is_empty());
    }

    #[test]
    fn parse_incremental_review_with_plain_fences() {
        let raw = "```\n{\"changes_summary\": [\"c\"], \"new_observations\": []}\n```";
        let review = parse_incremental_review(raw).unwrap();
        assert_eq!(review.changes_summary, vec!["c"]);
        assert!(review.addressed_issues.is_empty());
    }

    #[test]
    fn parse_malformed_is_llm_error() {
        let err = parse_full_review("this is not json at all").unwrap_err();
        assert!(matches!(err, GitzoidError::Llm(_)));
    }

    #[test]
    fn system_prompts_name_their_sections() {
        assert!(full_system_prompt().contains("potential_optimizations"));
        assert!(incremental_system_prompt().contains("addressed_issues"));
    }
}
