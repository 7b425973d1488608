use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

pub const VIDEO_EXTENSIONS: [&str; 4] = ["mkv", "mp4", "avi", "mov"];
pub const SUBTITLE_EXTENSIONS: [&str; 3] = ["srt", "ass", "sub"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Video,
    Subtitle,
}

impl FileKind {
    /// Classify by extension, case-insensitively
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(FileKind::Video)
        } else if SUBTITLE_EXTENSIONS.contains(&ext.as_str()) {
            Some(FileKind::Subtitle)
        } else {
            None
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileKind::Video => f.write_str("video"),
            FileKind::Subtitle => f.write_str("subtitle"),
        }
    }
}

/// Most fractional digits an episode number may carry
const MAX_FRACTION_DIGITS: usize = 9;

/// Fractional digits of an episode number, kept as written.
///
/// `05` and `5` are different fractions; leading zeros survive rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fraction {
    value: u32,
    digits: u8,
}

impl Fraction {
    /// Digits as written, e.g. `"05"` for `12.05`
    pub fn digits(&self) -> String {
        format!("{:0width$}", self.value, width = self.digits as usize)
    }

    fn scaled(&self) -> u64 {
        u64::from(self.value) * 10u64.pow((MAX_FRACTION_DIGITS - self.digits as usize) as u32)
    }
}

impl Ord for Fraction {
    fn cmp(&self, other: &Self) -> Ordering {
        self.scaled()
            .cmp(&other.scaled())
            .then(self.digits.cmp(&other.digits))
    }
}

impl PartialOrd for Fraction {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Episode number as written in a filename.
///
/// Recap and special releases use fractional numbers such as `12.5`; the
/// fractional digits are kept verbatim so they can be rendered back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EpisodeNumber {
    pub whole: u32,
    pub fraction: Option<Fraction>,
}

impl EpisodeNumber {
    pub fn new(whole: u32) -> Self {
        Self {
            whole,
            fraction: None,
        }
    }

    pub fn is_fractional(&self) -> bool {
        self.fraction.is_some()
    }

    /// Same fractional part on a different whole number
    pub fn with_whole(self, whole: u32) -> Self {
        Self { whole, ..self }
    }

    /// Render with the whole part zero-padded to `width`
    pub fn pad(&self, width: usize) -> String {
        match &self.fraction {
            Some(fraction) => format!(
                "{:0width$}.{}",
                self.whole,
                fraction.digits(),
                width = width
            ),
            None => format!("{:0width$}", self.whole, width = width),
        }
    }
}

impl fmt::Display for EpisodeNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.pad(0))
    }
}

impl FromStr for EpisodeNumber {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || ParseError::InvalidEpisode(s.to_string());

        let (whole, fraction) = match s.split_once('.') {
            Some((whole, fraction)) => (whole, Some(fraction)),
            None => (s, None),
        };

        let whole: u32 = whole.parse().map_err(|_| invalid())?;
        let fraction = match fraction {
            Some(f)
                if !f.is_empty()
                    && f.len() <= MAX_FRACTION_DIGITS
                    && f.chars().all(|c| c.is_ascii_digit()) =>
            {
                let value: u32 = f.parse().map_err(|_| invalid())?;
                // "12.0" is a whole episode
                (value != 0).then_some(Fraction {
                    value,
                    digits: f.len() as u8,
                })
            }
            Some(_) => return Err(invalid()),
            None => None,
        };

        Ok(Self { whole, fraction })
    }
}

/// Untyped tokens as produced by a filename extractor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTokens {
    pub title: Option<String>,
    pub episode: Option<String>,
    pub season: Option<String>,
    pub is_special: bool,
    pub language_tag: Option<String>,
}

/// A media file with validated filename tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFile {
    pub source_path: PathBuf,
    pub title_token: String,
    pub absolute_episode: EpisodeNumber,
    /// Season already present in the filename (`S02E05`); the episode is
    /// then in-season rather than absolute
    pub explicit_season: Option<u32>,
    pub is_special: bool,
    pub kind: FileKind,
    pub language_tag: Option<String>,
    /// Extension including the leading dot, original case
    pub extension: String,
}

impl ParsedFile {
    /// Validate extractor output at the boundary
    pub fn from_tokens(source_path: &Path, tokens: RawTokens) -> Result<Self, ParseError> {
        let path_str = || source_path.display().to_string();

        let kind = FileKind::from_path(source_path)
            .ok_or_else(|| ParseError::UnsupportedExtension(path_str()))?;

        let title_token = tokens
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ParseError::MissingField {
                path: path_str(),
                field: "title",
            })?;

        let episode = tokens
            .episode
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| ParseError::MissingField {
                path: path_str(),
                field: "episode",
            })?;
        let absolute_episode: EpisodeNumber = episode.parse()?;

        let explicit_season = match tokens.season {
            Some(season) => Some(
                season
                    .trim()
                    .parse::<u32>()
                    .map_err(|_| ParseError::InvalidSeason(season.clone()))?,
            ),
            None => None,
        };

        let extension = source_path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        Ok(Self {
            source_path: source_path.to_path_buf(),
            title_token,
            is_special: tokens.is_special || absolute_episode.is_fractional(),
            absolute_episode,
            explicit_season,
            kind,
            language_tag: tokens.language_tag,
            extension,
        })
    }

    pub fn file_name(&self) -> String {
        self.source_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    pub fn directory(&self) -> &Path {
        self.source_path.parent().unwrap_or_else(|| Path::new(""))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Malformed input for {path}: missing {field}")]
    MissingField { path: String, field: &'static str },

    #[error("Malformed input: invalid episode number '{0}'")]
    InvalidEpisode(String),

    #[error("Malformed input: invalid season number '{0}'")]
    InvalidSeason(String),

    #[error("Not a video or subtitle file: {0}")]
    UnsupportedExtension(String),
}
