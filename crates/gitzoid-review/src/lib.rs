//! Review generation and delivery for Gitzoid.
//!
//! Packs diffs into a bounded prompt, asks an OpenAI-compatible model for a
//! structured review, renders it as markdown and posts it on the pull
//! request. [`pipeline::run_pass`] drives one pass over all repositories.

pub mod budget;
pub mod github;
pub mod llm;
pub mod pipeline;
pub mod prompt;
pub mod render;
