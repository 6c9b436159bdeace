//! dweb-crawler: an indexing crawler for content-addressed filesystems
//!
//! This crate discovers files and directories reachable from seed identifiers,
//! extracts their metadata, commits the results to a search index and re-queues
//! every newly discovered child for further crawling.

pub mod config;
pub mod crawler;
pub mod extractor;
pub mod index;
pub mod protocol;
pub mod queue;
pub mod service;
pub mod types;
pub mod worker;

use thiserror::Error;

/// Main error type for crawl operations
#[derive(Debug, Error)]
pub enum CrawlError {
    /// Content that cannot or should not be indexed. The message is recorded
    /// verbatim in the invalids index.
    #[error("{0}")]
    InvalidResource(String),

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("crawl cancelled")]
    Cancelled,

    #[error("Index error: {0}")]
    Index(#[from] index::IndexError),

    #[error("Queue error: {0}")]
    Queue(#[from] queue::QueueError),

    #[error("Protocol error: {0}")]
    Protocol(protocol::ProtocolError),

    #[error("Extractor error: {0}")]
    Extractor(#[from] extractor::ExtractorError),

    /// Contract violation by the caller. Never converted into data; workers
    /// stop the whole pool when they see one.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl CrawlError {
    /// Message used for directories exceeding the configured maximum size.
    pub const DIRECTORY_TOO_LARGE: &'static str = "directory too large";

    /// Message used for resources of a type the crawler does not handle.
    pub const UNSUPPORTED_TYPE: &'static str = "unsupported type";

    pub fn directory_too_large() -> Self {
        Self::InvalidResource(Self::DIRECTORY_TOO_LARGE.to_string())
    }

    pub fn unsupported_type() -> Self {
        Self::InvalidResource(Self::UNSUPPORTED_TYPE.to_string())
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}

impl From<protocol::ProtocolError> for CrawlError {
    fn from(err: protocol::ProtocolError) -> Self {
        match err {
            protocol::ProtocolError::InvalidResource(msg) => Self::InvalidResource(msg),
            other => Self::Protocol(other),
        }
    }
}

impl From<tokio::time::error::Elapsed> for CrawlError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Self::DeadlineExceeded
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for crawl operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::Crawler;
pub use types::{AnnotatedResource, Protocol, Reference, Resource, ResourceType, Source, Stat};
