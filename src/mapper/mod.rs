use crate::api::TitleLanguage;
use crate::parser::{EpisodeNumber, ParsedFile};
use crate::relations::SeriesChain;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::trace;

/// Where specials (OVA, SP, fractional episodes) end up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecialsPolicy {
    /// Season 0 with the number as written
    Bundle,
    /// Season 1 with the number as written
    #[default]
    Verbatim,
    /// Leave the file alone
    Skip,
}

impl fmt::Display for SpecialsPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SpecialsPolicy::Bundle => "bundle",
            SpecialsPolicy::Verbatim => "verbatim",
            SpecialsPolicy::Skip => "skip",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MapError {
    #[error("Episode {episode} is past the last known episode ({total})")]
    EpisodeOutOfRange { episode: u32, total: u32 },

    #[error("Episode count of season {season} is unknown, cannot place later episodes")]
    IncompleteChainMetadata { season: u32 },

    #[error("Special episode skipped")]
    SpecialSkipped,

    #[error("Series chain is empty")]
    EmptyChain,
}

/// Season and in-season episode for one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeAssignment {
    /// 1-based; 0 holds specials
    pub season: u32,
    pub episode: EpisodeNumber,
    pub series_title: String,
}

/// Place an absolute episode number in a chain of per-season counts.
///
/// Returns `(season, episode)` with a 1-based season. An unknown count on
/// the last season absorbs everything past the known seasons; an unknown
/// count anywhere else stops mapping at that season.
pub fn locate(absolute: u32, counts: &[Option<u32>]) -> Result<(u32, u32), MapError> {
    if counts.is_empty() {
        return Err(MapError::EmptyChain);
    }
    if absolute == 0 {
        return Ok((1, 0));
    }

    let last = counts.len() - 1;
    let mut before: u32 = 0;
    for (index, count) in counts.iter().enumerate() {
        let season = index as u32 + 1;
        match count {
            Some(count) => {
                // Overflowing counts are malformed metadata
                let through = before
                    .checked_add(*count)
                    .ok_or(MapError::IncompleteChainMetadata { season })?;
                if absolute <= through {
                    return Ok((season, absolute - before));
                }
                before = through;
            }
            None if index == last => return Ok((season, absolute - before)),
            None => return Err(MapError::IncompleteChainMetadata { season }),
        }
    }

    Err(MapError::EpisodeOutOfRange {
        episode: absolute,
        total: before,
    })
}

/// Assign a season and episode to a parsed file
pub fn map_episode(
    file: &ParsedFile,
    chain: &SeriesChain,
    specials: SpecialsPolicy,
    language: TitleLanguage,
) -> Result<EpisodeAssignment, MapError> {
    let head = chain.head().ok_or(MapError::EmptyChain)?;
    let series_title = head.title_for(language);
    let episode = file.absolute_episode;

    let (season, episode) = if let Some(season) = file.explicit_season {
        (season, episode)
    } else if file.is_special {
        match specials {
            SpecialsPolicy::Bundle => (0, episode),
            SpecialsPolicy::Verbatim => (1, episode),
            SpecialsPolicy::Skip => return Err(MapError::SpecialSkipped),
        }
    } else {
        let (season, in_season) = locate(episode.whole, &chain.episode_counts())?;
        (season, episode.with_whole(in_season))
    };

    trace!(
        file = %file.source_path.display(),
        absolute = %file.absolute_episode,
        season,
        episode = %episode,
        "Mapped episode"
    );

    Ok(EpisodeAssignment {
        season,
        episode,
        series_title,
    })
}
