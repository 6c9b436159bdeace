//! Concurrent existence lookup across several indexes

use crate::index::{Index, IndexResult};
use futures::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;
use std::sync::Arc;

/// Looks up `id` in all `indexes` concurrently and returns the position of the
/// index holding it together with the requested `fields`.
///
/// At most one index is expected to hold a given id. When more than one does,
/// the earliest position in `indexes` wins: a hit cancels every lookup behind
/// it but still waits for those ahead of it. The first error aborts the lookup
/// and cancels everything still in flight.
pub async fn multi_get(
    indexes: &[Arc<dyn Index>],
    id: &str,
    fields: &[&str],
) -> IndexResult<Option<(usize, Value)>> {
    let mut lookups: FuturesUnordered<_> = indexes
        .iter()
        .enumerate()
        .map(|(pos, index)| async move { (pos, index.get(id, fields).await) })
        .collect();

    let mut in_flight = vec![true; indexes.len()];
    let mut found: Option<(usize, Value)> = None;

    while let Some((pos, result)) = lookups.next().await {
        in_flight[pos] = false;

        if let Some(fields) = result? {
            tracing::trace!(cid = id, index = indexes[pos].name(), "Found");

            let better = found.as_ref().map_or(true, |(best, _)| pos < *best);
            if better {
                found = Some((pos, fields));
            }
        }

        if let Some((best, _)) = &found {
            if !in_flight[..*best].contains(&true) {
                // Nothing ahead of the hit is still running; dropping the
                // remaining lookups cancels them.
                break;
            }
        }
    }

    Ok(found)
}
