//! Directory listing: one task streams entries from the protocol, another
//! records links and routes every entry to its queue.

use crate::crawler::{Crawler, Router};
use crate::index::{Directory, Link, LinkType};
use crate::types::AnnotatedResource;
use crate::{CrawlError, Result};
use tokio::sync::mpsc;

/// Entries between two progress reports for large listings
const CHECKPOINT_INTERVAL: usize = 1024;

/// Running state of one listing
struct Listing<'a> {
    router: Router<'a>,
    count: usize,
    too_large: bool,
}

fn link_for(entry: &AnnotatedResource) -> Result<Link> {
    let link_type = LinkType::from_resource_type(entry.resource_type()).ok_or_else(|| {
        CrawlError::Fatal(format!(
            "unexpected type {} in directory listing for {}",
            entry.resource_type(),
            entry
        ))
    })?;

    Ok(Link {
        hash: entry.id().to_string(),
        name: entry.reference.name.clone(),
        size: entry.size(),
        link_type,
    })
}

impl Crawler {
    /// Lists `resource`, adding its entries to `directory` and queueing them
    ///
    /// Past `max_dir_size` entries the link list stops growing but entries
    /// are still queued; the listing then ends with a "directory too large"
    /// invalid resource error.
    pub(super) async fn list_directory(
        &self,
        resource: &AnnotatedResource,
        directory: &mut Directory,
    ) -> Result<()> {
        let (tx, rx) = mpsc::channel(self.settings.dir_entry_buffer_size);

        // The listing is closed once `ls` returns and drops the sender.
        let producer = async { self.protocol.ls(resource, tx).await.map_err(CrawlError::from) };
        let consumer = self.consume_entries(resource, rx, directory);

        let ((), too_large) = tokio::try_join!(producer, consumer)?;

        if too_large {
            return Err(CrawlError::directory_too_large());
        }
        Ok(())
    }

    /// Processes entries until the listing closes; returns whether the
    /// directory exceeded its maximum size
    async fn consume_entries(
        &self,
        resource: &AnnotatedResource,
        mut entries: mpsc::Receiver<AnnotatedResource>,
        directory: &mut Directory,
    ) -> Result<bool> {
        let mut listing = Listing {
            router: Router::new(
                &self.queues,
                self.indexes.invalids.as_ref(),
                (self.rng_factory)(),
            ),
            count: 0,
            too_large: false,
        };

        loop {
            // Every entry gets the full timeout, for receiving and routing alike
            let step = async {
                match entries.recv().await {
                    Some(entry) => {
                        self.process_entry(resource, &entry, &mut listing, directory)
                            .await?;
                        Ok::<bool, CrawlError>(true)
                    }
                    None => Ok(false),
                }
            };

            let more = tokio::time::timeout(self.settings.dir_entry_timeout, step).await??;
            if !more {
                break;
            }
        }

        tracing::debug!(cid = resource.id(), entries = listing.count, "Listed directory");
        Ok(listing.too_large)
    }

    async fn process_entry(
        &self,
        resource: &AnnotatedResource,
        entry: &AnnotatedResource,
        listing: &mut Listing<'_>,
        directory: &mut Directory,
    ) -> Result<()> {
        if listing.count == self.settings.max_dir_size {
            tracing::info!(
                cid = resource.id(),
                max_dir_size = self.settings.max_dir_size,
                "Directory is large, queueing entries but not the directory itself"
            );
            listing.too_large = true;
        }

        if !listing.too_large {
            directory.links.push(link_for(entry)?);
        }

        listing.router.route(entry).await?;
        listing.count += 1;

        if listing.count % CHECKPOINT_INTERVAL == 0 {
            tracing::info!(
                cid = resource.id(),
                entries = listing.count,
                latest = %entry,
                "Processing directory entries"
            );
        }

        Ok(())
    }
}
