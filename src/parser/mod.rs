mod types;

pub use types::*;

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

/// Turns a filename into untyped tokens.
///
/// Extractors are best-effort; `ParsedFile::from_tokens` performs the only
/// validation the planner relies on.
pub trait TokenExtractor {
    fn extract(&self, file_name: &str) -> RawTokens;
}

/// Parse a file path with the given extractor
pub fn parse_file(extractor: &dyn TokenExtractor, path: &Path) -> Result<ParsedFile, ParseError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    ParsedFile::from_tokens(path, extractor.extract(&file_name))
}

// "S01-E13" confuses the episode patterns below
static SEASON_DASH_EPISODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(s\d{1,2})-(e\d{1,4})\b").unwrap());

static LEADING_GROUPS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(?:\[[^\]]*\]\s*)+").unwrap());

static TRAILING_GROUPS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:\s*(?:\[[^\]]*\]|\([^)]*\)))+\s*$").unwrap());

static LANGUAGE_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\[(eng|jpn|spa|fre|fra|ger|deu|ita|por|rus|chi|zho|kor|ara|en|ja|es|fr|de|it|pt|ru|zh|ko|ar)\]\s*$",
    )
    .unwrap()
});

// Collision suffix appended by the plan builder ("_v2"), or a release
// revision ("v2") glued to the episode number
static VERSION_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(?:_v\d+)$").unwrap());

static SEASON_EPISODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?P<title>.+?)[\s._-]+s(?P<season>\d{1,2})[\s._-]*e(?P<episode>\d{1,4}(?:\.\d)?)(?:v\d)?\b")
        .unwrap()
});

static SPECIAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?P<title>.+?)[\s._-]+(?:ova|oad|sp|specials?)[\s._-]*(?P<episode>\d{1,3})?(?:v\d)?$")
        .unwrap()
});

static DASH_EPISODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<title>.+?)\s+-\s+(?P<episode>\d{1,4}(?:\.\d)?)(?:v\d)?(?:\s+.*)?$").unwrap()
});

static MARKED_EPISODE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?P<title>.+?)[\s._-]+(?:ep?|episode)[\s._]*(?P<episode>\d{1,4}(?:\.\d)?)(?:v\d)?\b")
        .unwrap()
});

static TRAILING_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<title>.+?)[\s._]+(?P<episode>\d{1,4}(?:\.\d)?)(?:v\d)?$").unwrap()
});

static TITLE_TRIM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s._-]+$").unwrap());

/// Normalize filename quirks that trip up token extraction
pub fn clean_filename(file_name: &str) -> String {
    SEASON_DASH_EPISODE
        .replace_all(file_name, "${1}${2}")
        .into_owned()
}

/// Language tag such as `eng` from `Show - 01 [eng].ass`
pub fn language_tag(stem: &str) -> Option<String> {
    LANGUAGE_TAG
        .captures(stem)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_ascii_lowercase())
}

/// Regex-based extractor for common fansub and media-server naming
#[derive(Debug, Default, Clone, Copy)]
pub struct RegexExtractor;

impl RegexExtractor {
    fn clean_title(raw: &str) -> String {
        let title = TITLE_TRIM.replace(raw.trim(), "");
        let title = if title.contains(' ') {
            title.into_owned()
        } else {
            title.replace(['.', '_'], " ")
        };
        title.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

impl TokenExtractor for RegexExtractor {
    fn extract(&self, file_name: &str) -> RawTokens {
        let cleaned = clean_filename(file_name);
        let stem = match cleaned.rsplit_once('.') {
            Some((stem, ext)) if FileKind::from_extension(ext).is_some() => stem.to_string(),
            _ => cleaned.clone(),
        };

        let language_tag = language_tag(&stem);
        let stem = LANGUAGE_TAG.replace(&stem, "");
        let stem = LEADING_GROUPS.replace(&stem, "");
        let stem = TRAILING_GROUPS.replace(&stem, "");
        let stem = VERSION_SUFFIX.replace(stem.trim(), "");
        let stem = stem.trim();

        let mut tokens = RawTokens {
            language_tag,
            ..RawTokens::default()
        };

        if let Some(caps) = SEASON_EPISODE.captures(stem) {
            tokens.title = Some(Self::clean_title(&caps["title"]));
            tokens.season = Some(caps["season"].to_string());
            tokens.episode = Some(caps["episode"].to_string());
            return tokens;
        }

        if let Some(caps) = SPECIAL.captures(stem) {
            tokens.title = Some(Self::clean_title(&caps["title"]));
            tokens.episode = Some(
                caps.name("episode")
                    .map_or_else(|| "1".to_string(), |m| m.as_str().to_string()),
            );
            tokens.is_special = true;
            return tokens;
        }

        for pattern in [&*DASH_EPISODE, &*MARKED_EPISODE, &*TRAILING_NUMBER] {
            if let Some(caps) = pattern.captures(stem) {
                tokens.title = Some(Self::clean_title(&caps["title"]));
                tokens.episode = Some(caps["episode"].to_string());
                return tokens;
            }
        }

        // Title only; validation reports the missing episode
        let title = Self::clean_title(stem);
        tokens.title = (!title.is_empty()).then_some(title);
        tokens
    }
}
