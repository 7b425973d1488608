//! Per-directory planning and applying.
//!
//! The planner ties the matcher, relation resolver, episode mapper and plan
//! builder together. Matches and chains are memoized for the lifetime of
//! the planner, so a run touches the catalog once per title and once per
//! series however many directories share them.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::api::{CandidateSeries, MetadataLookup, SeriesId, TitleLanguage};
use crate::apply::{Applier, ApplyError};
use crate::mapper::{map_episode, EpisodeAssignment, MapError, SpecialsPolicy};
use crate::matcher::{match_title, normalize, Choice, MatchConfig, MatchError, MatchOutcome, PendingChoice};
use crate::parser::{parse_file, ParsedFile, RegexExtractor, TokenExtractor};
use crate::relations::{resolve_chain, ChainError, SeriesChain};
use crate::rename::{
    build_target_name, resolve_collisions, DirectoryPlan, NameBuilderConfig, ProposedRename,
    RenamePlanEntry, SkipReason, SkippedFile,
};
use crate::scanlog::{DirectoryId, ProcessedDirectories, ScanLogError};
use crate::scanner::{list_files, MediaDirectory, ScannerError};

/// Failures that abandon a whole directory
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Scan log error: {0}")]
    ScanLog(#[from] ScanLogError),

    #[error("Failed to list target directory: {0}")]
    Scanner(#[from] ScannerError),
}

#[derive(Debug, Clone)]
pub struct PlannerOptions {
    pub title_language: TitleLanguage,
    pub naming: NameBuilderConfig,
    pub matching: MatchConfig,
    pub specials: SpecialsPolicy,
    /// Skip directories the scan log lists as processed
    pub incremental: bool,
    /// Ignore the scan log for this run without changing it
    pub force_refresh: bool,
}

impl Default for PlannerOptions {
    fn default() -> Self {
        Self {
            title_language: TitleLanguage::default(),
            naming: NameBuilderConfig::default(),
            matching: MatchConfig::default(),
            specials: SpecialsPolicy::default(),
            incremental: true,
            force_refresh: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DirectoryOutcome {
    AlreadyProcessed(DirectoryId),
    /// Planning stopped at an ambiguous title; resolve it and plan again
    NeedsDecision(PendingChoice),
    Planned(DirectoryPlan),
}

#[derive(Debug, Clone)]
enum TokenResolution {
    Series(SeriesId),
    Unresolved(SkipReason),
}

pub struct Planner<L, E = RegexExtractor> {
    lookup: L,
    extractor: E,
    options: PlannerOptions,
    /// Keyed by normalized title token
    resolutions: HashMap<String, TokenResolution>,
    series: HashMap<SeriesId, CandidateSeries>,
    /// Keyed by every member of the chain
    chains: HashMap<SeriesId, Result<Rc<SeriesChain>, SkipReason>>,
}

impl<L: MetadataLookup> Planner<L, RegexExtractor> {
    pub fn new(lookup: L, options: PlannerOptions) -> Self {
        Self::with_extractor(lookup, RegexExtractor, options)
    }
}

impl<L: MetadataLookup, E: TokenExtractor> Planner<L, E> {
    pub fn with_extractor(lookup: L, extractor: E, options: PlannerOptions) -> Self {
        Self {
            lookup,
            extractor,
            options,
            resolutions: HashMap::new(),
            series: HashMap::new(),
            chains: HashMap::new(),
        }
    }

    /// Plan renames for one directory without touching it.
    ///
    /// Returns `NeedsDecision` at the first title that matches several
    /// series equally well. Pass the decision to [`Planner::resolve`] and
    /// call this again; earlier matches and chains are reused.
    pub fn plan_directory(
        &mut self,
        directory: &MediaDirectory,
        scan_log: &dyn ProcessedDirectories,
    ) -> Result<DirectoryOutcome, PipelineError> {
        let id = DirectoryId::from_path(&directory.path);
        if self.options.incremental && !self.options.force_refresh && scan_log.is_processed(&id)? {
            info!(directory = %id, "Already processed, skipping");
            return Ok(DirectoryOutcome::AlreadyProcessed(id));
        }

        let mut plan = DirectoryPlan::new(directory.path.clone());
        let mut parsed = Vec::new();
        for path in &directory.media_files {
            match parse_file(&self.extractor, path) {
                Ok(file) => parsed.push(file),
                Err(e) => {
                    debug!(file = %path.display(), error = %e, "Skipping unparseable file");
                    plan.skipped.push(SkippedFile {
                        path: path.clone(),
                        reason: SkipReason::MalformedInput(e.to_string()),
                    });
                }
            }
        }

        // Surface any pending decision before mapping anything
        for file in &parsed {
            if let Some(pending) = self.resolve_token(&file.title_token) {
                return Ok(DirectoryOutcome::NeedsDecision(pending));
            }
        }

        let mut proposals = Vec::new();
        for file in parsed {
            match self.assign(&file) {
                Ok(assignment) => {
                    let built = build_target_name(&file, &assignment, &self.options.naming);
                    if built.truncated {
                        warn!(
                            file = %file.source_path.display(),
                            "Name truncated to {}",
                            built.target.stem
                        );
                    }
                    proposals.push(ProposedRename {
                        source: file.source_path,
                        target: built.target,
                        kind: file.kind,
                    });
                }
                Err(reason) => {
                    debug!(file = %file.source_path.display(), %reason, "Skipping file");
                    plan.skipped.push(SkippedFile {
                        path: file.source_path,
                        reason,
                    });
                }
            }
        }

        let occupied = occupied_paths(directory, &proposals)?;
        let (entries, collisions) = resolve_collisions(proposals, &occupied);
        plan.entries = entries;
        plan.collisions = collisions;
        plan.skipped.sort_by(|a, b| a.path.cmp(&b.path));

        debug!(
            directory = %directory.path.display(),
            entries = plan.entries.len(),
            skipped = plan.skipped.len(),
            "Planned directory"
        );
        Ok(DirectoryOutcome::Planned(plan))
    }

    /// Record the outside decision for an ambiguous title
    pub fn resolve(&mut self, pending: &PendingChoice, choice: Choice) -> Result<(), MatchError> {
        let key = normalize(&pending.token);
        match pending.resolve(choice)? {
            Some(winner) => {
                info!(
                    token = %pending.token,
                    id = winner.series.id,
                    "Chose {}",
                    winner.series.primary_title()
                );
                self.remember(key, winner.series.clone());
            }
            None => {
                info!(token = %pending.token, "Ambiguous title skipped");
                self.resolutions.insert(
                    key,
                    TokenResolution::Unresolved(SkipReason::AmbiguousMatch {
                        token: pending.token.clone(),
                        candidates: pending.candidates.len(),
                    }),
                );
            }
        }
        Ok(())
    }

    fn remember(&mut self, key: String, series: CandidateSeries) {
        self.resolutions
            .insert(key, TokenResolution::Series(series.id));
        self.series.insert(series.id, series);
    }

    /// Match a title unless already known; `Some` when a decision is needed
    fn resolve_token(&mut self, token: &str) -> Option<PendingChoice> {
        let key = normalize(token);
        if self.resolutions.contains_key(&key) {
            return None;
        }

        let candidates = match self.lookup.search(token) {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(token, error = %e, "Lookup unavailable, treating as no match");
                self.resolutions.insert(
                    key,
                    TokenResolution::Unresolved(SkipReason::NoMatch {
                        token: token.to_string(),
                        best_score: 0.0,
                    }),
                );
                return None;
            }
        };

        match match_title(token, &candidates, &self.options.matching) {
            MatchOutcome::Matched(winner) => {
                info!(
                    token,
                    id = winner.series.id,
                    score = winner.score,
                    "Matched {}",
                    winner.series.primary_title()
                );
                self.remember(key, winner.series);
                None
            }
            MatchOutcome::Ambiguous(pending) => Some(pending),
            MatchOutcome::NoMatch { token, best_score } => {
                info!(token = %token, best_score, "No matching series");
                self.resolutions.insert(
                    key,
                    TokenResolution::Unresolved(SkipReason::NoMatch { token, best_score }),
                );
                None
            }
        }
    }

    fn assign(&mut self, file: &ParsedFile) -> Result<EpisodeAssignment, SkipReason> {
        let id = match self.resolutions.get(&normalize(&file.title_token)) {
            Some(TokenResolution::Series(id)) => *id,
            Some(TokenResolution::Unresolved(reason)) => return Err(reason.clone()),
            None => {
                return Err(SkipReason::NoMatch {
                    token: file.title_token.clone(),
                    best_score: 0.0,
                })
            }
        };

        let chain = self.chain_for(id)?;
        map_episode(file, &chain, self.options.specials, self.options.title_language)
            .map_err(skip_reason)
    }

    fn chain_for(&mut self, id: SeriesId) -> Result<Rc<SeriesChain>, SkipReason> {
        if let Some(known) = self.chains.get(&id) {
            return known.clone();
        }

        let start = match self.series.get(&id) {
            Some(series) => series.clone(),
            None => self.lookup.fetch_series(id).map_err(|e| SkipReason::LookupFailed {
                series: id,
                message: e.to_string(),
            })?,
        };

        let result = match resolve_chain(&self.lookup, &start) {
            Ok(chain) => {
                let chain = Rc::new(chain);
                for member in chain.ids() {
                    self.chains.insert(member, Ok(Rc::clone(&chain)));
                }
                Ok(chain)
            }
            Err(ChainError::RelationCycle { id: at }) => {
                Err(SkipReason::RelationCycle { series: at })
            }
            Err(ChainError::Lookup { id: at, source }) => {
                warn!(series = at, error = %source, "Could not walk series relations");
                Err(SkipReason::LookupFailed {
                    series: at,
                    message: source.to_string(),
                })
            }
        };

        self.chains.insert(id, result.clone());
        result
    }
}

fn skip_reason(err: MapError) -> SkipReason {
    match err {
        MapError::EpisodeOutOfRange { episode, total } => {
            SkipReason::EpisodeOutOfRange { episode, total }
        }
        MapError::IncompleteChainMetadata { season } => {
            SkipReason::IncompleteChainMetadata { season }
        }
        MapError::SpecialSkipped => SkipReason::SpecialSkipped,
        MapError::EmptyChain => SkipReason::MalformedInput(err.to_string()),
    }
}

/// Files currently on disk wherever a proposal could land
fn occupied_paths(
    directory: &MediaDirectory,
    proposals: &[ProposedRename],
) -> Result<HashSet<PathBuf>, ScannerError> {
    let mut occupied: HashSet<PathBuf> = directory.files.iter().cloned().collect();

    let extra_dirs: BTreeSet<&PathBuf> = proposals
        .iter()
        .map(|p| &p.target.dir)
        .filter(|dir| **dir != directory.path)
        .collect();
    for dir in extra_dirs {
        occupied.extend(list_files(dir)?);
    }
    Ok(occupied)
}

/// What happened while applying one directory plan
#[derive(Debug, Default)]
pub struct ApplyReport {
    pub applied: Vec<RenamePlanEntry>,
    /// The entry that stopped the directory, if any
    pub failure: Option<(RenamePlanEntry, ApplyError)>,
    pub interrupted: bool,
    /// Recorded in the scan log
    pub marked: bool,
}

impl ApplyReport {
    pub fn is_success(&self) -> bool {
        self.failure.is_none() && !self.interrupted
    }
}

/// Apply a plan and mark the directory once every file is in place.
///
/// Stops at the first failed rename. `interrupt` is checked before each
/// entry; an interrupted or partially applied directory stays unmarked so
/// the next run plans it again in full.
pub fn apply_directory(
    plan: &DirectoryPlan,
    applier: &mut dyn Applier,
    scan_log: &mut dyn ProcessedDirectories,
    interrupt: &AtomicBool,
) -> Result<ApplyReport, PipelineError> {
    let mut report = ApplyReport::default();

    for entry in plan.pending() {
        if interrupt.load(Ordering::SeqCst) {
            warn!(directory = %plan.directory.display(), "Interrupted, directory left unmarked");
            report.interrupted = true;
            return Ok(report);
        }

        match applier.apply(entry) {
            Ok(()) => report.applied.push(entry.clone()),
            Err(e) => {
                warn!(
                    source = %entry.source.display(),
                    error = %e,
                    "Rename failed, abandoning directory"
                );
                report.failure = Some((entry.clone(), e));
                return Ok(report);
            }
        }
    }

    if plan.is_complete() {
        scan_log.mark_processed(&DirectoryId::from_path(&plan.directory))?;
        report.marked = true;
    } else {
        debug!(
            directory = %plan.directory.display(),
            skipped = plan.skipped.len(),
            "Directory has skipped files, not marking"
        );
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{MemoryCatalog, ReleaseOrder, SeriesTitles};
    use crate::apply::LocalApplier;
    use crate::scanlog::MemoryScanLog;
    use crate::scanner::scan_media;
    use std::fs;
    use tempfile::tempdir;

    fn season(
        id: SeriesId,
        romaji: &str,
        episodes: Option<u32>,
        preceding_id: Option<SeriesId>,
        following_id: Option<SeriesId>,
    ) -> CandidateSeries {
        CandidateSeries {
            id,
            titles: SeriesTitles {
                romaji: Some(romaji.to_string()),
                ..SeriesTitles::default()
            },
            synonyms: vec![],
            episode_count: episodes,
            preceding_id,
            following_id,
            release_order: ReleaseOrder::new(None, id),
            format: Some("TV".to_string()),
        }
    }

    fn two_season_catalog() -> MemoryCatalog {
        MemoryCatalog::with_series([
            season(1, "Tougen Anki", Some(12), None, Some(2)),
            season(2, "Tougen Anki 2nd Season", Some(13), Some(1), None),
        ])
    }

    fn media_dir(names: &[&str]) -> (tempfile::TempDir, MediaDirectory) {
        let dir = tempdir().unwrap();
        for name in names {
            fs::write(dir.path().join(name), "").unwrap();
        }
        let found = scan_media(dir.path(), false).unwrap();
        let media = found.into_iter().next().unwrap();
        (dir, media)
    }

    fn planned(outcome: DirectoryOutcome) -> DirectoryPlan {
        match outcome {
            DirectoryOutcome::Planned(plan) => plan,
            other => panic!("Expected a plan, got {:?}", other),
        }
    }

    #[test]
    fn test_plans_absolute_numbering() {
        let catalog = two_season_catalog();
        let (dir, media) = media_dir(&["[Group] Tougen Anki - 13 [1080p].mkv"]);
        let mut planner = Planner::new(&catalog, PlannerOptions::default());

        let plan = planned(planner.plan_directory(&media, &MemoryScanLog::new()).unwrap());

        assert_eq!(plan.entries.len(), 1);
        assert_eq!(
            plan.entries[0].target,
            dir.path().join("Tougen Anki - S02E01.mkv")
        );
    }

    #[test]
    fn test_titles_and_chains_are_memoized() {
        let catalog = two_season_catalog();
        let (_dir, media) = media_dir(&["Tougen Anki - 01.mkv", "Tougen Anki - 02.mkv"]);
        let mut planner = Planner::new(&catalog, PlannerOptions::default());

        planner.plan_directory(&media, &MemoryScanLog::new()).unwrap();
        planner.plan_directory(&media, &MemoryScanLog::new()).unwrap();

        assert_eq!(catalog.search_count(), 1);
        assert_eq!(catalog.fetch_count(), 1);
    }

    #[test]
    fn test_skipped_files_are_reported() {
        let catalog = two_season_catalog();
        let (_dir, media) = media_dir(&["Tougen Anki - 30.mkv", "Some Movie.mkv"]);
        let mut planner = Planner::new(&catalog, PlannerOptions::default());

        let plan = planned(planner.plan_directory(&media, &MemoryScanLog::new()).unwrap());

        assert!(plan.entries.is_empty());
        assert_eq!(plan.skipped.len(), 2);
        assert!(plan
            .skipped
            .iter()
            .any(|s| matches!(s.reason, SkipReason::MalformedInput(_))));
        assert!(plan
            .skipped
            .iter()
            .any(|s| matches!(s.reason, SkipReason::EpisodeOutOfRange { episode: 30, total: 25 })));
    }

    #[test]
    fn test_unavailable_lookup_is_no_match() {
        let mut catalog = two_season_catalog();
        catalog.set_unavailable(true);
        let (_dir, media) = media_dir(&["Tougen Anki - 01.mkv"]);
        let mut planner = Planner::new(&catalog, PlannerOptions::default());

        let plan = planned(planner.plan_directory(&media, &MemoryScanLog::new()).unwrap());

        assert!(matches!(plan.skipped[0].reason, SkipReason::NoMatch { .. }));
    }

    #[test]
    fn test_relation_cycle_skips_file() {
        let catalog = MemoryCatalog::with_series([
            season(1, "Loop", Some(12), None, Some(2)),
            season(2, "Loop Again", Some(12), None, Some(1)),
        ]);
        let (_dir, media) = media_dir(&["Loop - 01.mkv"]);
        let mut planner = Planner::new(&catalog, PlannerOptions::default());

        let plan = planned(planner.plan_directory(&media, &MemoryScanLog::new()).unwrap());

        assert_eq!(
            plan.skipped[0].reason,
            SkipReason::RelationCycle { series: 1 }
        );
    }

    #[test]
    fn test_ambiguity_suspends_and_resumes() {
        let catalog = MemoryCatalog::with_series([
            season(1, "Kanon", Some(13), None, None),
            season(2, "Kanon", Some(24), None, None),
        ]);
        let (dir, media) = media_dir(&["Kanon - 14.mkv"]);
        let mut planner = Planner::new(&catalog, PlannerOptions::default());
        let log = MemoryScanLog::new();

        let pending = match planner.plan_directory(&media, &log).unwrap() {
            DirectoryOutcome::NeedsDecision(pending) => pending,
            other => panic!("Expected a decision, got {:?}", other),
        };
        assert_eq!(pending.candidates.len(), 2);

        planner.resolve(&pending, Choice::Pick(1)).unwrap();
        let plan = planned(planner.plan_directory(&media, &log).unwrap());

        assert_eq!(plan.entries[0].target, dir.path().join("Kanon - S01E14.mkv"));
        assert_eq!(catalog.search_count(), 1);
    }

    #[test]
    fn test_skipped_ambiguity() {
        let catalog = MemoryCatalog::with_series([
            season(1, "Kanon", Some(13), None, None),
            season(2, "Kanon", Some(24), None, None),
        ]);
        let (_dir, media) = media_dir(&["Kanon - 01.mkv"]);
        let mut planner = Planner::new(&catalog, PlannerOptions::default());
        let log = MemoryScanLog::new();

        if let DirectoryOutcome::NeedsDecision(pending) = planner.plan_directory(&media, &log).unwrap() {
            planner.resolve(&pending, Choice::Skip).unwrap();
        }
        let plan = planned(planner.plan_directory(&media, &log).unwrap());

        assert!(matches!(
            plan.skipped[0].reason,
            SkipReason::AmbiguousMatch { candidates: 2, .. }
        ));
    }

    #[test]
    fn test_apply_marks_complete_directory() {
        let catalog = two_season_catalog();
        let (dir, media) = media_dir(&["Tougen Anki - 01.mkv", "Tougen Anki - 13.mkv"]);
        let mut planner = Planner::new(&catalog, PlannerOptions::default());
        let mut log = MemoryScanLog::new();

        let plan = planned(planner.plan_directory(&media, &log).unwrap());
        let report =
            apply_directory(&plan, &mut LocalApplier, &mut log, &AtomicBool::new(false)).unwrap();

        assert!(report.is_success());
        assert!(report.marked);
        assert_eq!(report.applied.len(), 2);
        assert!(dir.path().join("Tougen Anki - S01E01.mkv").exists());
        assert!(dir.path().join("Tougen Anki - S02E01.mkv").exists());

        let rescanned = scan_media(dir.path(), false).unwrap().remove(0);
        assert!(matches!(
            planner.plan_directory(&rescanned, &log).unwrap(),
            DirectoryOutcome::AlreadyProcessed(_)
        ));
    }

    #[test]
    fn test_interrupted_directory_is_not_marked() {
        let catalog = two_season_catalog();
        let (dir, media) = media_dir(&["Tougen Anki - 01.mkv"]);
        let mut planner = Planner::new(&catalog, PlannerOptions::default());
        let mut log = MemoryScanLog::new();

        let plan = planned(planner.plan_directory(&media, &log).unwrap());
        let report =
            apply_directory(&plan, &mut LocalApplier, &mut log, &AtomicBool::new(true)).unwrap();

        assert!(report.interrupted);
        assert!(!report.marked);
        assert!(log.is_empty());
        assert!(dir.path().join("Tougen Anki - 01.mkv").exists());
    }

    #[test]
    fn test_directory_with_skips_is_not_marked() {
        let catalog = two_season_catalog();
        let (_dir, media) = media_dir(&["Tougen Anki - 01.mkv", "Tougen Anki - 99.mkv"]);
        let mut planner = Planner::new(&catalog, PlannerOptions::default());
        let mut log = MemoryScanLog::new();

        let plan = planned(planner.plan_directory(&media, &log).unwrap());
        let report =
            apply_directory(&plan, &mut LocalApplier, &mut log, &AtomicBool::new(false)).unwrap();

        assert_eq!(report.applied.len(), 1);
        assert!(!report.marked);
        assert!(log.is_empty());
    }
}
