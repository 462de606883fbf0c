//! KeepUp Ingest - a content ingestion pipeline for media URLs
//!
//! This library resolves a user-supplied URL (video, podcast episode, article
//! or local file) to its source platform, fetches transcript and metadata
//! through a platform-specific strategy, and fans out multilingual derived
//! artifacts (summary, polished subtitle, segmented detail) through LLM calls.

pub mod cli;
pub mod config;
pub mod fetcher;
pub mod llm;
pub mod matcher;
pub mod pipeline;
pub mod resolver;
pub mod retry;
pub mod steplog;
pub mod store;
pub mod timecode;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use pipeline::{CompletionRecord, LanguageTaskResult, Orchestrator, RequestStatus};
pub use resolver::{ContentResolver, Platform, Resolution};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Error types specific to the ingestion pipeline
#[derive(thiserror::Error, Debug)]
pub enum IngestError {
    #[error("No platform detector matched URL: {0}")]
    ResolutionFailed(String),

    #[error("Mandatory content fetch failed: {0}")]
    FetchFailed(String),

    #[error("LLM output below minimum length: {0}")]
    OutputTooShort(String),
}
