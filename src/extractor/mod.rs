//! Metadata extraction for file documents
//!
//! Extractors run in a fixed order against the same document, so later
//! extractors can rely on fields filled in by earlier ones.

mod nsfw;
mod tika;

pub use nsfw::NsfwExtractor;
pub use tika::TikaExtractor;

use crate::index::File;
use crate::types::AnnotatedResource;
use async_trait::async_trait;
use thiserror::Error;

/// Errors returned by extractors
#[derive(Debug, Error)]
pub enum ExtractorError {
    /// The file exceeds the size an extractor is willing to process
    #[error("file too large: {0}")]
    FileTooLarge(u64),

    #[error("request failed: {0}")]
    Request(String),

    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

/// Result type for extractor operations
pub type ExtractorResult<T> = Result<T, ExtractorError>;

/// Fills in parts of a file document
#[async_trait]
pub trait Extractor: Send + Sync {
    fn name(&self) -> &str;

    async fn extract(&self, resource: &AnnotatedResource, file: &mut File)
        -> ExtractorResult<()>;
}

/// Returns `FileTooLarge` for resources above `max_size` bytes
pub fn validate_max_size(resource: &AnnotatedResource, max_size: u64) -> ExtractorResult<()> {
    if resource.size() > max_size {
        return Err(ExtractorError::FileTooLarge(resource.size()));
    }
    Ok(())
}
