//! Packing of changed-file records into a bounded block of prompt text.

use gitzoid_core::{ChangedFile, FileStatus, DEFAULT_MAX_DIFF_CHARS};

/// Returned instead of an empty string when there is nothing to pack.
pub const NO_FILES_CHANGED: &str = "No files changed.";

const NO_DIFF_NOTICE: &str = "_No diff available_";
const OPEN_FENCE: &str = "```diff\n";
const TRUNCATED_TAIL: &str = "\n... (truncated)\n```";

/// One rendered file, kept with its parts so an overflowing block can be cut.
struct Block<'a> {
    header: String,
    patch: Option<&'a str>,
    text: String,
    len: usize,
}

impl<'a> Block<'a> {
    fn render(index: usize, file: &'a ChangedFile) -> Self {
        let header = file_header(index, file);
        let patch = file.patch.as_deref().filter(|p| !p.is_empty());
        let text = match patch {
            Some(p) => format!("{header}{OPEN_FENCE}{p}\n```"),
            None => format!("{header}{NO_DIFF_NOTICE}"),
        };
        let len = text.chars().count();
        Self {
            header,
            patch,
            text,
            len,
        }
    }

    /// Characters a truncated rendering spends on everything but the patch.
    fn frame_len(&self) -> usize {
        self.header.chars().count() + OPEN_FENCE.chars().count() + TRUNCATED_TAIL.chars().count()
    }

    /// Cut the block down to at most `chars` characters.
    ///
    /// Yields `None` for blocks without a fenced patch, and for blocks whose
    /// frame alone would not leave room for a single patch character.
    fn truncate(&self, chars: usize) -> Option<String> {
        let patch = self.patch?;
        let keep = chars.checked_sub(self.frame_len()).filter(|&k| k > 0)?;
        let content: String = patch.chars().take(keep).collect();
        Some(format!("{}{OPEN_FENCE}{content}{TRUNCATED_TAIL}", self.header))
    }
}

fn file_header(index: usize, file: &ChangedFile) -> String {
    let mut header = format!("{index}. Filename: `{}`", file.filename);
    if file.status != FileStatus::Modified {
        header.push_str(&format!(" [{}]", file.status));
    }
    if file.additions > 0 || file.deletions > 0 {
        header.push_str(&format!(" (+{}/-{})", file.additions, file.deletions));
    }
    header.push('\n');
    header
}

/// Pack `files` into one text blob of roughly `max_chars` characters.
///
/// Smaller files are kept whole first so that as many files as possible
/// survive intact. Files that no longer fit share what is left of the
/// budget plus a 10% allowance and are cut down, each ending in a
/// `... (truncated)` marker. When the shares get too small to hold even a
/// file's header, the trailing overflow files are replaced by a single
/// `... N more file(s) omitted` line. `None` falls back to
/// [`DEFAULT_MAX_DIFF_CHARS`].
///
/// # Examples
///
/// ```
/// use gitzoid_core::{ChangedFile, FileStatus};
/// use gitzoid_review::budget::format_changed_files;
///
/// let files = vec![ChangedFile {
///     filename: "src/lib.rs".into(),
///     patch: Some("+fn added() {}".into()),
///     status: FileStatus::Added,
///     additions: 1,
///     deletions: 0,
/// }];
/// let text = format_changed_files(&files, Some(1_000));
/// assert!(text.starts_with("1. Filename: `src/lib.rs` [added] (+1/-0)"));
/// assert!(text.contains("+fn added() {}"));
///
/// assert_eq!(format_changed_files(&[], None), "No files changed.");
/// ```
pub fn format_changed_files(files: &[ChangedFile], max_chars: Option<usize>) -> String {
    if files.is_empty() {
        return NO_FILES_CHANGED.to_string();
    }
    let budget = max_chars.unwrap_or(DEFAULT_MAX_DIFF_CHARS);

    let mut blocks: Vec<Block<'_>> = files
        .iter()
        .enumerate()
        .map(|(i, f)| Block::render(i + 1, f))
        .collect();
    blocks.sort_by_key(|b| b.len);

    let mut consumed = 0usize;
    let mut included = Vec::with_capacity(blocks.len());
    let mut overflow = Vec::new();
    for block in &blocks {
        if consumed + block.len <= budget {
            consumed += block.len;
            included.push(block.text.clone());
        } else {
            overflow.push(block);
        }
    }

    let cuttable: Vec<&Block<'_>> = overflow.into_iter().filter(|b| b.patch.is_some()).collect();
    if !cuttable.is_empty() {
        let pool = (budget - consumed) + budget / 10;
        let shown = truncated_share(&cuttable, pool);
        if shown > 0 {
            let per_block = pool / shown;
            included.extend(cuttable[..shown].iter().filter_map(|b| b.truncate(per_block)));
        }
        let omitted = cuttable.len() - shown;
        if omitted > 0 {
            included.push(format!("... {omitted} more file(s) omitted"));
        }
    }

    included.join("\n\n")
}

/// Number of leading overflow blocks that can split `pool` evenly while
/// each share still covers its block's frame plus one patch character.
fn truncated_share(blocks: &[&Block<'_>], pool: usize) -> usize {
    (1..=blocks.len())
        .rev()
        .find(|&count| {
            let per_block = pool / count;
            blocks[..count].iter().all(|b| b.frame_len() < per_block)
        })
        .unwrap_or(0)
}
