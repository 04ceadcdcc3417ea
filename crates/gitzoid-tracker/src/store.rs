use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use gitzoid_core::{lenient_timestamp, GitzoidError};
use serde::{Deserialize, Serialize};

/// Last known review outcome for one pull request.
///
/// The `status` tag selects the variant, so a reviewed entry always carries
/// `reviewed_at` and a skipped entry always carries `skipped_at`. Fields are
/// optional only so that hand-edited or older files still load; entries built
/// through [`TrackerEntry::reviewed`] and [`TrackerEntry::skipped`] fill them.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use gitzoid_tracker::TrackerEntry;
///
/// let entry = TrackerEntry::reviewed("abc1234", Some("LGTM".into()), Utc::now());
/// let json = serde_json::to_value(&entry).unwrap();
/// assert_eq!(json["status"], "reviewed");
/// assert_eq!(json["last_reviewed_sha"], "abc1234");
/// assert!(json.get("skipped_at").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TrackerEntry {
    /// A review was posted for `last_reviewed_sha`.
    Reviewed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        last_reviewed_sha: Option<String>,
        /// Rendered comment body, kept as context for the next incremental review.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        last_review_text: Option<String>,
        #[serde(
            default,
            deserialize_with = "lenient_timestamp",
            skip_serializing_if = "Option::is_none"
        )]
        reviewed_at: Option<DateTime<Utc>>,
    },
    /// The PR was deliberately left alone and will never be reviewed.
    Skipped {
        #[serde(
            default,
            deserialize_with = "lenient_timestamp",
            skip_serializing_if = "Option::is_none"
        )]
        skipped_at: Option<DateTime<Utc>>,
    },
}

impl TrackerEntry {
    /// Entry for a PR whose review of `sha` was just posted.
    pub fn reviewed(
        sha: impl Into<String>,
        review_text: Option<String>,
        at: DateTime<Utc>,
    ) -> Self {
        TrackerEntry::Reviewed {
            last_reviewed_sha: Some(sha.into()),
            last_review_text: review_text,
            reviewed_at: Some(at),
        }
    }

    /// Entry for a PR that will never be reviewed.
    pub fn skipped(at: DateTime<Utc>) -> Self {
        TrackerEntry::Skipped {
            skipped_at: Some(at),
        }
    }

    /// Time of the last transition, if known.
    pub fn last_transition(&self) -> Option<DateTime<Utc>> {
        match self {
            TrackerEntry::Reviewed { reviewed_at, .. } => *reviewed_at,
            TrackerEntry::Skipped { skipped_at } => *skipped_at,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, TrackerEntry::Skipped { .. })
    }

    /// Status label as persisted.
    pub fn status(&self) -> &'static str {
        match self {
            TrackerEntry::Reviewed { .. } => "reviewed",
            TrackerEntry::Skipped { .. } => "skipped",
        }
    }
}

/// Keyed storage for tracker entries.
///
/// Keys have the form `"{repo_path}#{pr_number}"`. The tracker is the only
/// writer; implementations only need to store and enumerate.
pub trait TrackerStore {
    /// Fetch the entry stored under `key`.
    fn get(&self, key: &str) -> Option<TrackerEntry>;

    /// Insert or replace the entry under `key`.
    fn put(&mut self, key: String, entry: TrackerEntry);

    /// Delete the entry under `key`, returning it if it existed.
    fn remove(&mut self, key: &str) -> Option<TrackerEntry>;

    /// All keys starting with `prefix`.
    fn keys_with_prefix(&self, prefix: &str) -> Vec<String>;
}

/// In-memory tracker store persisted as a single JSON object.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use gitzoid_tracker::{TrackerEntry, TrackerMap, TrackerStore};
///
/// let mut map = TrackerMap::default();
/// map.put("octo/repo#1".into(), TrackerEntry::skipped(Utc::now()));
/// assert_eq!(map.keys_with_prefix("octo/repo#"), vec!["octo/repo#1"]);
/// assert!(map.keys_with_prefix("octo/other#").is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackerMap {
    entries: BTreeMap<String, TrackerEntry>,
}

impl TrackerMap {
    /// Load the tracker from `path`.
    ///
    /// Returns an empty map if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`GitzoidError::Tracker`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, GitzoidError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            GitzoidError::Tracker(format!("failed to read {}: {e}", path.display()))
        })?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(&content).map_err(|e| {
            GitzoidError::Tracker(format!("failed to parse {}: {e}", path.display()))
        })
    }

    /// Write the tracker to `path`, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns [`GitzoidError::Tracker`] if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), GitzoidError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                GitzoidError::Tracker(format!("failed to create {}: {e}", parent.display()))
            })?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| GitzoidError::Tracker(format!("failed to serialize tracker: {e}")))?;
        std::fs::write(path, content).map_err(|e| {
            GitzoidError::Tracker(format!("failed to write {}: {e}", path.display()))
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over all entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &TrackerEntry)> {
        self.entries.iter()
    }
}

impl TrackerStore for TrackerMap {
    fn get(&self, key: &str) -> Option<TrackerEntry> {
        self.entries.get(key).cloned()
    }

    fn put(&mut self, key: String, entry: TrackerEntry) {
        self.entries.insert(key, entry);
    }

    fn remove(&mut self, key: &str) -> Option<TrackerEntry> {
        self.entries.remove(key)
    }

    fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect()
    }
}

impl FromIterator<(String, TrackerEntry)> for TrackerMap {
    fn from_iter<I: IntoIterator<Item = (String, TrackerEntry)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
