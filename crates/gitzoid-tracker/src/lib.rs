//! Review lifecycle tracking for pull requests.
//!
//! Decides, per open pull request, whether it needs a full review, an
//! incremental review of new commits, or nothing at all, and keeps the
//! per-PR state that makes that decision possible across passes.

pub mod classify;
pub mod payload;
pub mod source;
pub mod store;
pub mod tracker;

pub use payload::{build_payload, PreviousReview, ReviewKind, ReviewPayload};
pub use source::PullRequestSource;
pub use store::{TrackerEntry, TrackerMap, TrackerStore};
pub use tracker::{
    DroppedPr, RepositoryPass, ReviewAction, ReviewTracker, SkipReason, TrackerSettings,
};
