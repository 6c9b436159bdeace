//! The crawl decision engine
//!
//! Given one resource, the crawler decides whether it is new or already
//! known, resolves its type when needed, builds and commits its index
//! document and queues the children of directories.
//!
//! - `existing`: dedup against the indexes and minimal updates
//! - `dispatch`: document building per resource type
//! - `directory`: bounded listing of directory entries
//! - `router`: queue selection and priority for discovered children

mod directory;
mod dispatch;
mod existing;
mod router;

#[cfg(test)]
pub(crate) mod testing;

pub use existing::merge_reference;
pub use router::{Router, ROUTED_PRIORITIES};

use crate::config::CrawlerConfig;
use crate::extractor::Extractor;
use crate::index::{Document, Index, Invalid};
use crate::protocol::{Protocol, ProtocolError};
use crate::queue::Publisher;
use crate::types::{self, AnnotatedResource, ResourceType};
use crate::{CrawlError, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;

/// Tuning of the crawl decision engine
#[derive(Debug, Clone)]
pub struct CrawlerSettings {
    /// Capacity of the channel between a listing and its consumer
    pub dir_entry_buffer_size: usize,
    /// Age after which last-seen of an existing document is refreshed
    pub min_update_age: Duration,
    /// Bound on resolving the type of a resource
    pub stat_timeout: Duration,
    /// Bound on receiving and routing one directory entry
    pub dir_entry_timeout: Duration,
    /// Number of links kept before a directory is considered too large
    pub max_dir_size: usize,
}

impl Default for CrawlerSettings {
    fn default() -> Self {
        Self::from(&CrawlerConfig::default())
    }
}

impl From<&CrawlerConfig> for CrawlerSettings {
    fn from(config: &CrawlerConfig) -> Self {
        Self {
            dir_entry_buffer_size: config.dir_entry_buffer_size,
            min_update_age: Duration::from_secs(config.min_update_age),
            stat_timeout: Duration::from_secs(config.stat_timeout),
            dir_entry_timeout: Duration::from_secs(config.dir_entry_timeout),
            max_dir_size: config.max_dir_size,
        }
    }
}

/// The four indexes a resource can end up in
#[derive(Clone)]
pub struct Indexes {
    pub files: Arc<dyn Index>,
    pub directories: Arc<dyn Index>,
    pub invalids: Arc<dyn Index>,
    pub partials: Arc<dyn Index>,
}

/// Queues newly discovered resources are published to
#[derive(Clone)]
pub struct Queues {
    pub files: Arc<dyn Publisher>,
    pub directories: Arc<dyn Publisher>,
    /// Resources of unknown type
    pub hashes: Arc<dyn Publisher>,
}

/// Creates the random source for one directory listing
pub type RngFactory = Arc<dyn Fn() -> StdRng + Send + Sync>;

/// Crawls single resources. Shared by all workers.
pub struct Crawler {
    settings: CrawlerSettings,
    indexes: Indexes,
    queues: Queues,
    protocol: Arc<dyn Protocol>,
    extractors: Vec<Arc<dyn Extractor>>,
    rng_factory: RngFactory,
}

impl Crawler {
    pub fn new(
        settings: CrawlerSettings,
        indexes: Indexes,
        queues: Queues,
        protocol: Arc<dyn Protocol>,
        extractors: Vec<Arc<dyn Extractor>>,
    ) -> Self {
        Self {
            settings,
            indexes,
            queues,
            protocol,
            extractors,
            rng_factory: Arc::new(StdRng::from_entropy),
        }
    }

    /// Replaces the source of child priorities
    pub fn with_rng_factory(mut self, rng_factory: RngFactory) -> Self {
        self.rng_factory = rng_factory;
        self
    }

    /// Updates an existing resource or crawls a new one
    ///
    /// Resources found to be unindexable are recorded in the invalids index
    /// and count as success. Any other failure is returned unchanged so the
    /// caller can retry it.
    pub async fn crawl(&self, resource: &mut AnnotatedResource) -> Result<()> {
        if resource.protocol() == types::Protocol::Invalid {
            return Err(CrawlError::Fatal(format!(
                "invalid protocol for {}",
                resource
            )));
        }

        if !resource.resource_type().is_crawlable() {
            return Err(CrawlError::Fatal(format!(
                "cannot crawl {} of type {}",
                resource,
                resource.resource_type()
            )));
        }

        if self.classify(resource).await?.is_existing() {
            tracing::debug!(cid = resource.id(), "Not crawling existing resource");
            return Ok(());
        }

        if resource.resource_type() == ResourceType::Undefined {
            let stat = tokio::time::timeout(
                self.settings.stat_timeout,
                self.protocol.stat(resource),
            )
            .await?;

            match stat {
                Ok(()) => {}
                Err(ProtocolError::InvalidResource(message)) => {
                    return self.index_invalid(resource, &message).await;
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::info!(cid = resource.id(), resource_type = %resource.resource_type(), "Indexing new item");

        match self.dispatch(resource).await {
            Ok((document, index)) => {
                index.index(resource.id(), &document).await?;
                Ok(())
            }
            Err(CrawlError::InvalidResource(message)) => {
                self.index_invalid(resource, &message).await
            }
            Err(e) => Err(e),
        }
    }

    /// Records a terminal verdict for a resource that cannot be indexed
    async fn index_invalid(&self, resource: &AnnotatedResource, message: &str) -> Result<()> {
        tracing::info!(cid = resource.id(), error = message, "Indexing invalid resource");

        let document = Document::Invalid(Invalid {
            error: message.to_string(),
        });
        self.indexes.invalids.index(resource.id(), &document).await?;
        Ok(())
    }
}
