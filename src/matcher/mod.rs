use crate::api::{CandidateSeries, SeriesId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;
use tracing::{debug, trace};

pub const DEFAULT_FUZZY_THRESHOLD: u8 = 85;
pub const DEFAULT_AMBIGUITY_MARGIN: f64 = 2.0;

/// Thresholds for title matching
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Minimum similarity (0-100) for a candidate to be considered at all
    pub fuzzy_threshold: u8,
    /// Top candidates closer than this many points are a tie
    pub ambiguity_margin: f64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
            ambiguity_margin: DEFAULT_AMBIGUITY_MARGIN,
        }
    }
}

/// A candidate together with its best similarity to the token
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub series: CandidateSeries,
    pub score: f64,
}

/// Result of matching one title token
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    Matched(ScoredCandidate),
    /// Several candidates tie; an outside decision is required
    Ambiguous(PendingChoice),
    NoMatch { token: String, best_score: f64 },
}

/// External decision for an ambiguous match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    /// Zero-based index into `PendingChoice::candidates`
    Pick(usize),
    Skip,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatchError {
    #[error("Choice {index} is out of range, {available} candidates available")]
    InvalidChoice { index: usize, available: usize },
}

/// Tied candidates for one title token, best first
#[derive(Debug, Clone, PartialEq)]
pub struct PendingChoice {
    pub token: String,
    pub candidates: Vec<ScoredCandidate>,
}

impl PendingChoice {
    /// Apply the decision; `Ok(None)` means the token was skipped
    pub fn resolve(&self, choice: Choice) -> Result<Option<&ScoredCandidate>, MatchError> {
        match choice {
            Choice::Skip => Ok(None),
            Choice::Pick(index) => {
                self.candidates
                    .get(index)
                    .map(Some)
                    .ok_or(MatchError::InvalidChoice {
                        index,
                        available: self.candidates.len(),
                    })
            }
        }
    }
}

impl fmt::Display for PendingChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' matches {} series", self.token, self.candidates.len())
    }
}

/// Lowercase, punctuation to spaces, whitespace collapsed
pub fn normalize(title: &str) -> String {
    let replaced: String = title
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_lowercase().next().unwrap_or(c)
            } else {
                ' '
            }
        })
        .collect();
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Similarity of two titles in [0, 100]
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = normalize(a);
    let b = normalize(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    strsim::normalized_levenshtein(&a, &b) * 100.0
}

/// Best similarity between the token and any title of the candidate
pub fn score_candidate(token: &str, candidate: &CandidateSeries) -> f64 {
    candidate
        .title_variants()
        .map(|title| similarity(token, title))
        .fold(0.0, f64::max)
}

/// Score candidates and pick a winner, or report a tie or no match.
///
/// The winner must clear `fuzzy_threshold` and beat the runner-up by more
/// than `ambiguity_margin`; ties are never broken here.
pub fn match_title(token: &str, candidates: &[CandidateSeries], config: &MatchConfig) -> MatchOutcome {
    let threshold = f64::from(config.fuzzy_threshold);
    let mut seen: HashSet<SeriesId> = HashSet::new();
    let mut best_score: f64 = 0.0;
    let mut survivors: Vec<ScoredCandidate> = Vec::new();

    for candidate in candidates {
        if !seen.insert(candidate.id) {
            continue;
        }
        let score = score_candidate(token, candidate);
        trace!(token, id = candidate.id, score, "Scored candidate");
        best_score = best_score.max(score);
        if score >= threshold {
            survivors.push(ScoredCandidate {
                series: candidate.clone(),
                score,
            });
        }
    }

    // Stable sort keeps search relevance order among equal scores
    survivors.sort_by(|a, b| b.score.total_cmp(&a.score));

    let Some(top) = survivors.first() else {
        debug!(token, best_score, "No candidate above threshold");
        return MatchOutcome::NoMatch {
            token: token.to_string(),
            best_score,
        };
    };

    let tied: Vec<ScoredCandidate> = survivors
        .iter()
        .take_while(|c| top.score - c.score < config.ambiguity_margin)
        .cloned()
        .collect();

    if tied.len() > 1 {
        debug!(token, count = tied.len(), "Ambiguous match");
        return MatchOutcome::Ambiguous(PendingChoice {
            token: token.to_string(),
            candidates: tied,
        });
    }

    debug!(token, id = top.series.id, score = top.score, "Matched series");
    MatchOutcome::Matched(top.clone())
}
