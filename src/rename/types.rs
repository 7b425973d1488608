use crate::api::SeriesId;
use crate::parser::FileKind;
use std::fmt;
use std::path::{Path, PathBuf};

/// A single planned rename
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenamePlanEntry {
    pub source: PathBuf,
    pub target: PathBuf,
    pub kind: FileKind,
}

impl RenamePlanEntry {
    pub fn new(source: PathBuf, target: PathBuf, kind: FileKind) -> Self {
        Self {
            source,
            target,
            kind,
        }
    }

    /// The file already has its target name
    pub fn is_noop(&self) -> bool {
        self.source == self.target
    }

    pub fn source_name(&self) -> String {
        file_name(&self.source)
    }

    pub fn target_name(&self) -> String {
        file_name(&self.target)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Several files wanted the same target; all but the first got a suffix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collision {
    /// The contested target path
    pub target: PathBuf,
    /// Files that wanted `target`, in resolution order
    pub sources: Vec<PathBuf>,
    /// Where each of `sources` ends up
    pub resolved: Vec<PathBuf>,
}

/// Why a file gets no plan entry
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    NoMatch { token: String, best_score: f64 },
    AmbiguousMatch { token: String, candidates: usize },
    RelationCycle { series: SeriesId },
    LookupFailed { series: SeriesId, message: String },
    IncompleteChainMetadata { season: u32 },
    EpisodeOutOfRange { episode: u32, total: u32 },
    MalformedInput(String),
    SpecialSkipped,
}

impl SkipReason {
    /// Short category name for summaries
    pub fn kind(&self) -> &'static str {
        match self {
            SkipReason::NoMatch { .. } => "no match",
            SkipReason::AmbiguousMatch { .. } => "ambiguous match",
            SkipReason::RelationCycle { .. } => "relation cycle",
            SkipReason::LookupFailed { .. } => "lookup failed",
            SkipReason::IncompleteChainMetadata { .. } => "incomplete chain metadata",
            SkipReason::EpisodeOutOfRange { .. } => "episode out of range",
            SkipReason::MalformedInput(_) => "malformed input",
            SkipReason::SpecialSkipped => "special skipped",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoMatch { token, best_score } => {
                write!(f, "no series matches '{}' (best score {:.1})", token, best_score)
            }
            SkipReason::AmbiguousMatch { token, candidates } => {
                write!(f, "'{}' matches {} series equally well", token, candidates)
            }
            SkipReason::RelationCycle { series } => {
                write!(f, "relation cycle at AniList {}", series)
            }
            SkipReason::LookupFailed { series, message } => {
                write!(f, "could not fetch related series of AniList {}: {}", series, message)
            }
            SkipReason::IncompleteChainMetadata { season } => {
                write!(f, "episode count of season {} is unknown", season)
            }
            SkipReason::EpisodeOutOfRange { episode, total } => {
                write!(f, "episode {} is past the last known episode ({})", episode, total)
            }
            SkipReason::MalformedInput(message) => write!(f, "{}", message),
            SkipReason::SpecialSkipped => f.write_str("special episode skipped"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: SkipReason,
}

/// Rename plan for one directory
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DirectoryPlan {
    pub directory: PathBuf,
    /// Ordered by source path
    pub entries: Vec<RenamePlanEntry>,
    pub skipped: Vec<SkippedFile>,
    pub collisions: Vec<Collision>,
}

impl DirectoryPlan {
    pub fn new(directory: PathBuf) -> Self {
        Self {
            directory,
            ..Self::default()
        }
    }

    /// Entries that actually move a file
    pub fn pending(&self) -> impl Iterator<Item = &RenamePlanEntry> {
        self.entries.iter().filter(|e| !e.is_noop())
    }

    pub fn pending_count(&self) -> usize {
        self.pending().count()
    }

    pub fn noop_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_noop()).count()
    }

    /// Every file in the directory got an entry
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}
