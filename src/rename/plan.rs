use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use tracing::warn;

use crate::parser::FileKind;

use super::name_builder::TargetName;
use super::types::{Collision, RenamePlanEntry};

/// Highest `_vN` suffix tried before giving up on a target
const MAX_VERSION: u32 = 999;

/// A file and the name it should get before collisions are settled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProposedRename {
    pub source: PathBuf,
    pub target: TargetName,
    pub kind: FileKind,
}

/// Settle target collisions and produce the ordered plan.
///
/// Files already at their target claim first; the rest follow in source
/// path order. A target is taken when an earlier entry claimed it, or when a
/// file other than the source exists there (`occupied` lists the files
/// currently on disk, batch sources included). Taken targets get the first
/// free `_v2`, `_v3`, ... suffix. Entries come back ordered by source path.
pub fn resolve_collisions(
    mut proposals: Vec<ProposedRename>,
    occupied: &HashSet<PathBuf>,
) -> (Vec<RenamePlanEntry>, Vec<Collision>) {
    proposals.sort_by(|a, b| a.source.cmp(&b.source));
    proposals.dedup_by(|a, b| a.source == b.source);

    let (identity, others): (Vec<_>, Vec<_>) = proposals
        .into_iter()
        .partition(|p| p.target.path() == p.source);

    let mut claimed: HashSet<PathBuf> = HashSet::new();
    let mut contested: BTreeMap<PathBuf, Vec<(PathBuf, PathBuf)>> = BTreeMap::new();
    let mut entries = Vec::new();

    let is_taken = |claimed: &HashSet<PathBuf>, path: &PathBuf, source: &PathBuf| {
        claimed.contains(path) || (path != source && occupied.contains(path))
    };

    for proposal in identity.into_iter().chain(others) {
        let wanted = proposal.target.path();
        let mut target = wanted.clone();

        if is_taken(&claimed, &target, &proposal.source) {
            let free = (2..=MAX_VERSION)
                .map(|v| proposal.target.with_version(v))
                .find(|candidate| !is_taken(&claimed, candidate, &proposal.source));
            match free {
                Some(free) => target = free,
                None => {
                    // Keep the file where it is rather than overwrite anything
                    warn!(
                        source = %proposal.source.display(),
                        "No free name for target {}",
                        wanted.display()
                    );
                    target = proposal.source.clone();
                }
            }
        }

        claimed.insert(target.clone());
        contested
            .entry(wanted)
            .or_default()
            .push((proposal.source.clone(), target.clone()));
        entries.push(RenamePlanEntry::new(proposal.source, target, proposal.kind));
    }

    let collisions: Vec<Collision> = contested
        .into_iter()
        .filter(|(wanted, claims)| claims.iter().any(|(_, resolved)| resolved != wanted))
        .map(|(target, claims)| {
            let (sources, resolved): (Vec<_>, Vec<_>) = claims.into_iter().unzip();
            Collision {
                target,
                sources,
                resolved,
            }
        })
        .collect();

    for collision in &collisions {
        warn!(
            target = %collision.target.display(),
            files = collision.sources.len(),
            "Rename collision resolved with suffix"
        );
    }

    entries.sort_by(|a, b| a.source.cmp(&b.source));
    (entries, collisions)
}
