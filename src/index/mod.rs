//! Index module for storing crawl results
//!
//! This module defines the contract the crawler requires from an index
//! backend, the document model written to it, and:
//! - a concurrent existence lookup across several indexes
//! - a SQLite-backed index implementation

mod document;
mod multiget;
mod schema;
mod sqlite;

pub use document::{
    now, Common, Directory, Document, File, IndexedReference, Invalid, Language, Link, LinkType,
    Nsfw, NsfwClassification, Partial, References, Update,
};
pub use multiget::multi_get;
pub use sqlite::{SqliteDatabase, SqliteIndex};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Errors that can occur during index operations
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for index operations
pub type IndexResult<T> = Result<T, IndexError>;

/// A named collection of documents keyed by resource id
///
/// Every operation is individually atomic and safe for concurrent callers.
#[async_trait]
pub trait Index: Send + Sync {
    /// Name of the index, for diagnostics
    fn name(&self) -> &str;

    /// Writes a document, replacing any existing one with the same id
    async fn index(&self, id: &str, doc: &Document) -> IndexResult<()>;

    /// Merges the present fields of `update` into an existing document
    async fn update(&self, id: &str, update: &Update) -> IndexResult<()>;

    /// Removes a document
    async fn delete(&self, id: &str) -> IndexResult<()>;

    /// Returns the requested `fields` of a document as a JSON object, or
    /// `None` when no document with `id` exists. Missing fields are omitted.
    async fn get(&self, id: &str, fields: &[&str]) -> IndexResult<Option<Value>>;
}
