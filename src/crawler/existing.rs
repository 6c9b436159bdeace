//! Deduplication against the indexes and minimal updates of known resources

use crate::crawler::Crawler;
use crate::index::{multi_get, now, Index, IndexedReference, References, Update};
use crate::types::{AnnotatedResource, Reference};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;

/// Fields needed to decide on an update
const LOOKUP_FIELDS: &[&str] = &["references", "last-seen"];

/// Outcome of looking a resource up in the indexes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Existence {
    /// Known and fully handled; nothing left to crawl
    Existing,
    /// Has to be crawled
    New,
}

impl Existence {
    pub(super) fn is_existing(self) -> bool {
        self == Self::Existing
    }
}

/// Index holding a resource. Lookup order doubles as tie-break order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Holder {
    Files,
    Directories,
    Invalids,
    Partials,
}

const LOOKUP_ORDER: [Holder; 4] = [
    Holder::Files,
    Holder::Directories,
    Holder::Invalids,
    Holder::Partials,
];

#[derive(Debug, Default, Deserialize)]
struct ExistingFields {
    #[serde(default)]
    references: References,
    #[serde(default, rename = "last-seen")]
    last_seen: Option<DateTime<Utc>>,
}

/// Adds `reference` to `references` unless an entry with the same parent id
/// and name is already present. Returns the resulting set and whether it changed.
pub fn merge_reference(references: &[IndexedReference], reference: &Reference) -> (References, bool) {
    let Some(parent) = &reference.parent else {
        return (references.to_vec(), false);
    };

    let known = references
        .iter()
        .any(|r| r.parent_hash == parent.id && r.name == reference.name);
    if known {
        return (references.to_vec(), false);
    }

    let mut merged = references.to_vec();
    merged.push(IndexedReference {
        parent_hash: parent.id.clone(),
        name: reference.name.clone(),
    });
    (merged, true)
}

impl Crawler {
    fn holder_index(&self, holder: Holder) -> &Arc<dyn Index> {
        match holder {
            Holder::Files => &self.indexes.files,
            Holder::Directories => &self.indexes.directories,
            Holder::Invalids => &self.indexes.invalids,
            Holder::Partials => &self.indexes.partials,
        }
    }

    /// Decides whether `resource` is already known, updating it if so
    pub(super) async fn classify(&self, resource: &AnnotatedResource) -> Result<Existence> {
        let indexes: Vec<Arc<dyn Index>> = LOOKUP_ORDER
            .iter()
            .map(|h| self.holder_index(*h).clone())
            .collect();

        let Some((pos, fields)) = multi_get(&indexes, resource.id(), LOOKUP_FIELDS).await? else {
            return Ok(Existence::New);
        };

        let holder = LOOKUP_ORDER[pos];
        tracing::debug!(cid = resource.id(), index = indexes[pos].name(), "Found existing");

        match holder {
            Holder::Invalids => Ok(Existence::Existing),
            Holder::Partials if !resource.reference.is_empty() => {
                // A reference proves this is more than a chunk: crawl it for real
                tracing::info!(cid = resource.id(), "Promoting referenced partial");
                self.indexes.partials.delete(resource.id()).await?;
                Ok(Existence::New)
            }
            // Partials carry no timestamps or references to maintain
            Holder::Partials => Ok(Existence::Existing),
            _ => {
                let fields: ExistingFields = serde_json::from_value(fields)
                    .map_err(crate::index::IndexError::from)?;
                self.update_existing(&indexes[pos], resource, fields).await?;
                Ok(Existence::Existing)
            }
        }
    }

    /// Writes new references and a refreshed last-seen, skipping the write
    /// when neither changed
    async fn update_existing(
        &self,
        index: &Arc<dyn Index>,
        resource: &AnnotatedResource,
        existing: ExistingFields,
    ) -> Result<()> {
        let (references, changed) = merge_reference(&existing.references, &resource.reference);

        let now = now();
        let stale = match existing.last_seen {
            // Missing last-seen is treated as infinitely old
            None => true,
            Some(last_seen) => (now - last_seen)
                .to_std()
                .map_or(false, |age| age > self.settings.min_update_age),
        };

        let update = Update {
            last_seen: stale.then_some(now),
            references: changed.then_some(references),
        };

        if update.is_empty() {
            tracing::debug!(cid = resource.id(), "Existing resource up to date");
            return Ok(());
        }

        tracing::debug!(
            cid = resource.id(),
            index = index.name(),
            stale,
            reference_added = changed,
            "Updating existing resource"
        );
        index.update(resource.id(), &update).await?;
        Ok(())
    }
}
