//! Routing of discovered children to their queues

use crate::crawler::Queues;
use crate::index::{Document, Index, Invalid};
use crate::queue::Publisher;
use crate::types::{AnnotatedResource, ResourceType};
use crate::{CrawlError, Result};
use rand::rngs::StdRng;
use rand::Rng;
use std::ops::RangeInclusive;

/// Priorities children are spread over; the top band is kept for seeds
pub const ROUTED_PRIORITIES: RangeInclusive<u8> = 1..=7;

/// Routes the entries of one directory listing
///
/// Siblings tend to share availability, so each entry gets an independent
/// random priority to keep one slow directory from filling a single band.
pub struct Router<'a> {
    queues: &'a Queues,
    invalids: &'a dyn Index,
    rng: StdRng,
}

impl<'a> Router<'a> {
    pub fn new(queues: &'a Queues, invalids: &'a dyn Index, rng: StdRng) -> Self {
        Self {
            queues,
            invalids,
            rng,
        }
    }

    /// Publishes `resource` to the queue for its type. Unsupported resources
    /// go straight to the invalids index.
    pub async fn route(&mut self, resource: &AnnotatedResource) -> Result<()> {
        let priority = self.rng.gen_range(ROUTED_PRIORITIES);

        let queue: &dyn Publisher = match resource.resource_type() {
            ResourceType::Undefined => self.queues.hashes.as_ref(),
            ResourceType::File => self.queues.files.as_ref(),
            ResourceType::Directory => self.queues.directories.as_ref(),
            ResourceType::Unsupported => {
                let document = Document::Invalid(Invalid {
                    error: CrawlError::UNSUPPORTED_TYPE.to_string(),
                });
                self.invalids.index(resource.id(), &document).await?;
                return Ok(());
            }
            other => {
                return Err(CrawlError::Fatal(format!(
                    "cannot route {} of type {}",
                    resource, other
                )));
            }
        };

        tracing::trace!(cid = resource.id(), priority, "Queueing directory entry");
        queue.publish(resource, priority).await?;
        Ok(())
    }
}
