use serde::{Deserialize, Serialize};

const INTRO: &str = "\u{1f916} *This is an automated AI-generated review by Gitzoid. \
Please double-check the suggestions before acting on them.*";

const FOOTER: &str = "---\n<sub>Reviewed by **Gitzoid**, automated pull request reviews. \
Reply on the PR if something looks off.</sub>";

/// Structured result of a full review.
///
/// Missing sections deserialize as empty lists.
///
/// # Examples
///
/// ```
/// use gitzoid_review::render::FullReview;
///
/// let review: FullReview = serde_json::from_str(r#"{"summary": ["Adds caching"]}"#).unwrap();
/// assert_eq!(review.summary, vec!["Adds caching"]);
/// assert!(review.potential_issues.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FullReview {
    pub summary: Vec<String>,
    pub potential_issues: Vec<String>,
    pub potential_optimizations: Vec<String>,
    pub suggestions: Vec<String>,
}

/// Structured result of an incremental review.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IncrementalReview {
    pub changes_summary: Vec<String>,
    pub addressed_issues: Vec<String>,
    pub new_observations: Vec<String>,
}

/// Render items as markdown bullets, one per line.
///
/// # Examples
///
/// ```
/// use gitzoid_review::render::format_array_to_markdown;
///
/// let items = vec!["First".to_string(), "Second".to_string()];
/// assert_eq!(format_array_to_markdown(&items), "- First\n- Second");
/// assert_eq!(format_array_to_markdown(&[]), "");
/// ```
pub fn format_array_to_markdown(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("- {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn push_section(out: &mut String, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    out.push_str(&format!("### {title}\n{}\n\n", format_array_to_markdown(items)));
}

/// Render a full review as a PR comment.
///
/// # Examples
///
/// ```
/// use gitzoid_review::render::{generate_full_comment, FullReview};
///
/// let comment = generate_full_comment(&FullReview::default());
/// assert!(comment.contains("Gitzoid"));
/// assert!(!comment.contains("###"));
/// ```
pub fn generate_full_comment(review: &FullReview) -> String {
    let mut out = format!("{INTRO}\n\n");
    push_section(&mut out, "\u{1f4dd} Summary", &review.summary);
    push_section(&mut out, "\u{26a0}\u{fe0f} Potential Issues", &review.potential_issues);
    push_section(
        &mut out,
        "\u{1f680} Potential Optimizations",
        &review.potential_optimizations,
    );
    push_section(&mut out, "\u{1f4a1} Suggestions", &review.suggestions);
    out.push_str(FOOTER);
    out
}

/// Render an incremental review as a PR comment.
///
/// The commit transition is shown only when both SHAs are known, and only
/// as their 7-character short form.
///
/// # Examples
///
/// ```
/// use gitzoid_review::render::{generate_incremental_comment, IncrementalReview};
///
/// let review = IncrementalReview {
///     changes_summary: vec!["Renames the config loader".into()],
///     ..IncrementalReview::default()
/// };
/// let comment = generate_incremental_comment(&review, Some("abc123def456"), Some("def456abc789"));
/// assert!(comment.contains("`abc123d` \u{2192} `def456a`"));
/// assert!(!comment.contains("abc123def456"));
/// ```
pub fn generate_incremental_comment(
    review: &IncrementalReview,
    previous_sha: Option<&str>,
    current_sha: Option<&str>,
) -> String {
    let mut out = format!("{INTRO}\n\n");
    match (previous_sha, current_sha) {
        (Some(prev), Some(cur)) => out.push_str(&format!(
            "\u{1f504} **New commits detected** (`{}` \u{2192} `{}`)\n\n",
            short_sha(prev),
            short_sha(cur)
        )),
        _ => out.push_str("\u{1f504} **New commits detected**\n\n"),
    }
    push_section(&mut out, "\u{1f4dd} Changes Summary", &review.changes_summary);
    push_section(&mut out, "\u{2705} Addressed Issues", &review.addressed_issues);
    push_section(&mut out, "\u{1f50d} New Observations", &review.new_observations);
    out.push_str(FOOTER);
    out
}

/// First seven characters of a commit id.
pub fn short_sha(sha: &str) -> String {
    sha.chars().take(7).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full() -> FullReview {
        FullReview {
            summary: vec!["Adds retry logic".into(), "Updates docs".into()],
            potential_issues: vec!["Unbounded retries".into()],
            potential_optimizations: vec!["Reuse the client".into()],
            suggestions: vec!["Add a test".into()],
        }
    }

    fn incremental() -> IncrementalReview {
        IncrementalReview {
            changes_summary: vec!["Caps retries at 3".into()],
            addressed_issues: vec!["Unbounded retries".into()],
            new_observations: vec!["Backoff is linear".into()],
        }
    }

    #[test]
    fn markdown_bullets_keep_special_characters() {
        let items = vec!["*asterisk*".to_string(), "`code`".to_string()];
        let md = format_array_to_markdown(&items);
        assert_eq!(md, "- *asterisk*\n- `code`");
    }

    #[test]
    fn single_item_has_no_trailing_newline() {
        assert_eq!(format_array_to_markdown(&["Single item".into()]), "- Single item");
    }

    #[test]
    fn full_comment_renders_all_sections() {
        let comment = generate_full_comment(&full());

        assert!(comment.contains("Summary"));
        assert!(comment.contains("Potential Issues"));
        assert!(comment.contains("Potential Optimizations"));
        assert!(comment.contains("Suggestions"));
        assert!(comment.contains("- Adds retry logic\n- Updates docs"));
        assert!(comment.contains("automated AI-generated review"));
        assert!(comment.ends_with(FOOTER));
    }

    #[test]
    fn full_comment_omits_empty_sections() {
        let review = FullReview {
            summary: vec!["Only summary".into()],
            ..FullReview::default()
        };
        let comment = generate_full_comment(&review);

        assert!(comment.contains("Only summary"));
        assert!(!comment.contains("Potential Issues"));
        assert!(!comment.contains("Potential Optimizations"));
        assert!(!comment.contains("Suggestions"));
    }

    #[test]
    fn empty_full_review_is_intro_and_footer() {
        let comment = generate_full_comment(&FullReview::default());
        assert_eq!(comment, format!("{INTRO}\n\n{FOOTER}"));
    }

    #[test]
    fn incremental_comment_renders_all_sections() {
        let comment = generate_incremental_comment(
            &incremental(),
            Some("abc123def456"),
            Some("def456ghi789"),
        );

        assert!(comment.contains("New commits detected"));
        assert!(comment.contains("`abc123d` \u{2192} `def456g`"));
        assert!(comment.contains("Changes Summary"));
        assert!(comment.contains("Addressed Issues"));
        assert!(comment.contains("New Observations"));
        assert!(!comment.contains("abc123def456"));
        assert!(comment.contains("Gitzoid"));
    }

    #[test]
    fn incremental_comment_without_shas() {
        let comment = generate_incremental_comment(&incremental(), None, Some("def456ghi789"));
        assert!(comment.contains("New commits detected"));
        assert!(!comment.contains('\u{2192}'));
    }

    #[test]
    fn empty_incremental_review_has_no_sections() {
        let comment = generate_incremental_comment(&IncrementalReview::default(), None, None);
        assert!(comment.starts_with(INTRO));
        assert!(comment.ends_with(FOOTER));
        assert!(!comment.contains("###"));
    }

    #[test]
    fn short_sha_handles_short_input() {
        assert_eq!(short_sha("abc"), "abc");
        assert_eq!(short_sha("0123456789"), "0123456");
    }
}
