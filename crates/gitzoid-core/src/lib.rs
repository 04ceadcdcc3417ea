//! Core types, configuration, and error handling for Gitzoid.
//!
//! This crate provides the shared foundation used by the other Gitzoid crates:
//! - [`GitzoidError`]: unified error type using `thiserror`
//! - [`GitzoidConfig`]: configuration loaded from `.gitzoid.toml`
//! - Shared types: [`PullRequest`], [`Author`], [`ChangedFile`], [`FileStatus`],
//!   [`ReviewType`], [`OutputFormat`]

mod config;
mod error;
mod types;

pub use config::{
    parse_char_budget, GitHubConfig, GitzoidConfig, LlmConfig, RepositoryConfig, ReviewConfig,
    TrackerConfig, DEFAULT_MAX_DIFF_CHARS,
};
pub use error::GitzoidError;
pub use types::{
    lenient_timestamp, AccountKind, Author, ChangedFile, FileStatus, OutputFormat, PullRequest,
    ReviewType,
};

/// A convenience `Result` type for Gitzoid operations.
pub type Result<T> = std::result::Result<T, GitzoidError>;
