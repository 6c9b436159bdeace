//! Access to the content-addressed filesystem
//!
//! A protocol resolves the type and size of a resource (`stat`), streams the
//! children of a directory (`ls`), and formats gateway URLs extractors can
//! fetch content from.

mod ipfs;

pub use ipfs::Ipfs;

use crate::types::AnnotatedResource;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors returned by protocol operations
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The resource is corrupt or otherwise not something we can index
    #[error("{0}")]
    InvalidResource(String),

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error: {0}")]
    Api(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Listing receiver dropped")]
    ListingClosed,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Result type for protocol operations
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Filesystem operations the crawler depends on
#[async_trait]
pub trait Protocol: Send + Sync {
    /// Resolves type and size, writing them into `resource.stat`
    async fn stat(&self, resource: &mut AnnotatedResource) -> ProtocolResult<()>;

    /// Streams the children of a directory into `out`. The listing is complete
    /// once this returns and `out` is dropped.
    async fn ls(
        &self,
        resource: &AnnotatedResource,
        out: mpsc::Sender<AnnotatedResource>,
    ) -> ProtocolResult<()>;

    /// URL a resource can be fetched from, preferring `<parent>/<name>` when
    /// the resource was found in a directory.
    fn gateway_url(&self, resource: &AnnotatedResource) -> String;
}

/// Builds the HTTP client shared by the protocol and extractors
///
/// Without `timeout`, only connecting is bounded; long listings stream for
/// as long as the daemon keeps sending.
pub fn build_http_client(timeout: Option<Duration>) -> Result<Client, reqwest::Error> {
    let user_agent = format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    let mut builder = Client::builder()
        .user_agent(user_agent)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true);

    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }

    builder.build()
}
