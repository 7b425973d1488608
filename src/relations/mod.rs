use crate::api::{ApiError, CandidateSeries, MetadataLookup, SeriesId};
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("Relation cycle detected at series {id}")]
    RelationCycle { id: SeriesId },

    #[error("Lookup of series {id} failed: {source}")]
    Lookup {
        id: SeriesId,
        #[source]
        source: ApiError,
    },
}

/// Installments of one show ordered oldest to newest.
///
/// Only the last entry may have an unknown episode count. When an earlier
/// entry has none the chain keeps the index of the first such entry as its
/// incomplete boundary; episodes past that point cannot be placed.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesChain {
    entries: Vec<CandidateSeries>,
    incomplete_boundary: Option<usize>,
}

impl SeriesChain {
    /// Build a chain from entries already in release order
    pub fn new(entries: Vec<CandidateSeries>) -> Self {
        let last = entries.len().saturating_sub(1);
        let incomplete_boundary = entries
            .iter()
            .take(last)
            .position(|e| e.episode_count.is_none());
        Self {
            entries,
            incomplete_boundary,
        }
    }

    pub fn entries(&self) -> &[CandidateSeries] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Oldest installment; names the show in target filenames
    pub fn head(&self) -> Option<&CandidateSeries> {
        self.entries.first()
    }

    pub fn ids(&self) -> impl Iterator<Item = SeriesId> + '_ {
        self.entries.iter().map(|e| e.id)
    }

    /// Episode counts per season; `None` for unknown
    pub fn episode_counts(&self) -> Vec<Option<u32>> {
        self.entries.iter().map(|e| e.episode_count).collect()
    }

    /// The newest installment has no known episode count yet
    pub fn has_open_tail(&self) -> bool {
        self.entries
            .last()
            .map(|e| e.episode_count.is_none())
            .unwrap_or(false)
    }

    /// Index of the first non-tail entry with an unknown episode count
    pub fn incomplete_boundary(&self) -> Option<usize> {
        self.incomplete_boundary
    }
}

/// Walk preceding links backward and following links forward from `start`,
/// then order the collected installments by release order.
///
/// Every id is fetched at most once; reaching an id twice is a cycle.
pub fn resolve_chain<L: MetadataLookup>(
    lookup: &L,
    start: &CandidateSeries,
) -> Result<SeriesChain, ChainError> {
    let mut visited: HashSet<SeriesId> = HashSet::new();
    visited.insert(start.id);

    let fetch = |id: SeriesId| {
        lookup
            .fetch_series(id)
            .map_err(|source| ChainError::Lookup { id, source })
    };

    let mut preceding = Vec::new();
    let mut current = start.preceding_id;
    while let Some(id) = current {
        if !visited.insert(id) {
            warn!(id, start = start.id, "Relation cycle while walking prequels");
            return Err(ChainError::RelationCycle { id });
        }
        let series = fetch(id)?;
        debug!(id, title = %series.primary_title(), "Found prequel");
        current = series.preceding_id;
        preceding.push(series);
    }

    let mut following = Vec::new();
    let mut current = start.following_id;
    while let Some(id) = current {
        if !visited.insert(id) {
            warn!(id, start = start.id, "Relation cycle while walking sequels");
            return Err(ChainError::RelationCycle { id });
        }
        let series = fetch(id)?;
        debug!(id, title = %series.primary_title(), "Found sequel");
        current = series.following_id;
        following.push(series);
    }

    preceding.reverse();
    let mut entries = preceding;
    entries.push(start.clone());
    entries.extend(following);

    for pair in entries.windows(2) {
        if pair[0].release_order > pair[1].release_order {
            warn!(
                earlier = pair[0].id,
                later = pair[1].id,
                "Relation order disagrees with release order, using release order"
            );
        }
    }
    entries.sort_by(|a, b| a.release_order.cmp(&b.release_order));

    let chain = SeriesChain::new(entries);
    if let Some(index) = chain.incomplete_boundary() {
        warn!(
            id = chain.entries()[index].id,
            season = index + 1,
            "Episode count unknown before the newest season; later episodes cannot be mapped"
        );
    }

    debug!(start = start.id, seasons = chain.len(), "Resolved series chain");
    Ok(chain)
}
