use crate::mapper::EpisodeAssignment;
use crate::parser::{EpisodeNumber, ParsedFile};
use std::ffi::OsStr;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_TEMPLATE: &str = "{title} - S{season:02}E{episode:02}";

/// Characters removed from substituted titles
const INVALID_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Unknown placeholder '{{{0}}}' in rename template")]
    UnknownPlaceholder(String),

    #[error("Invalid width '{0}' in rename template")]
    InvalidWidth(String),

    #[error("Unclosed placeholder in rename template: {0}")]
    Unclosed(String),

    #[error("Rename template must contain {{episode}}")]
    MissingEpisode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Season,
    Episode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field { field: Field, width: usize },
}

/// A parsed rename template such as `{title} - S{season:02}E{episode:02}`.
///
/// `/` in literal text separates subfolders below the source directory.
/// A file already inside those subfolders stays where it is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl NameTemplate {
    pub fn parse(template: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            literal.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let close = after
                .find('}')
                .ok_or_else(|| TemplateError::Unclosed(rest[open..].to_string()))?;
            let placeholder = &after[..close];

            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(parse_placeholder(placeholder)?);
            rest = &after[close + 1..];
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        let has_episode = segments.iter().any(|s| {
            matches!(
                s,
                Segment::Field {
                    field: Field::Episode,
                    ..
                }
            )
        });
        if !has_episode {
            return Err(TemplateError::MissingEpisode);
        }

        Ok(Self {
            source: template.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Substitute values; the title is sanitized, literals are kept as is
    pub fn render(&self, title: &str, season: u32, episode: EpisodeNumber) -> String {
        let title = sanitize_filename(title);
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field { field, width } => match field {
                    Field::Title => out.push_str(&title),
                    Field::Season => out.push_str(&format!("{:0width$}", season, width = *width)),
                    Field::Episode => out.push_str(&episode.pad(*width)),
                },
            }
        }
        out
    }
}

impl Default for NameTemplate {
    fn default() -> Self {
        Self {
            source: DEFAULT_TEMPLATE.to_string(),
            segments: vec![
                Segment::Field {
                    field: Field::Title,
                    width: 0,
                },
                Segment::Literal(" - S".to_string()),
                Segment::Field {
                    field: Field::Season,
                    width: 2,
                },
                Segment::Literal("E".to_string()),
                Segment::Field {
                    field: Field::Episode,
                    width: 2,
                },
            ],
        }
    }
}

impl FromStr for NameTemplate {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for NameTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn parse_placeholder(placeholder: &str) -> Result<Segment, TemplateError> {
    let (name, spec) = match placeholder.split_once(':') {
        Some((name, spec)) => (name.trim(), Some(spec.trim())),
        None => (placeholder.trim(), None),
    };

    let field = match name {
        "title" => Field::Title,
        "season" => Field::Season,
        "episode" => Field::Episode,
        _ => return Err(TemplateError::UnknownPlaceholder(placeholder.to_string())),
    };

    let width = match spec {
        None => 0,
        Some(spec) => {
            let digits = spec.strip_suffix('d').unwrap_or(spec);
            if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
                return Err(TemplateError::InvalidWidth(spec.to_string()));
            }
            digits
                .parse::<usize>()
                .map_err(|_| TemplateError::InvalidWidth(spec.to_string()))?
        }
    };

    Ok(Segment::Field { field, width })
}

/// Remove characters that are invalid in filenames on common platforms
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name.chars().filter(|c| !INVALID_CHARS.contains(c)).collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Configuration for name building
#[derive(Debug, Clone)]
pub struct NameBuilderConfig {
    pub template: NameTemplate,
    /// Longest allowed filename in bytes
    pub max_length: usize,
}

impl Default for NameBuilderConfig {
    fn default() -> Self {
        Self {
            template: NameTemplate::default(),
            max_length: 255,
        }
    }
}

/// Target location split so a collision suffix can go before the tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetName {
    /// Source directory plus any subfolders from the template
    pub dir: PathBuf,
    pub stem: String,
    /// Language tag and extension, e.g. ` [eng].ass`
    pub tail: String,
}

impl TargetName {
    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("{}{}", self.stem, self.tail))
    }

    /// `Show - S01E01_v2 [eng].ass`
    pub fn with_version(&self, version: u32) -> PathBuf {
        self.dir
            .join(format!("{}_v{}{}", self.stem, version, self.tail))
    }
}

/// Result of building a name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameBuildResult {
    pub target: TargetName,
    pub truncated: bool,
}

/// Build the target name of a file from its episode assignment
pub fn build_target_name(
    file: &ParsedFile,
    assignment: &EpisodeAssignment,
    config: &NameBuilderConfig,
) -> NameBuildResult {
    let tail = match &file.language_tag {
        Some(tag) => format!(" [{}]{}", tag, file.extension),
        None => file.extension.clone(),
    };

    let render = |title: &str| {
        split_rendered(
            file.directory(),
            &config
                .template
                .render(title, assignment.season, assignment.episode),
        )
    };

    let (dir, stem) = render(&assignment.series_title);
    if stem.len() + tail.len() <= config.max_length {
        return NameBuildResult {
            target: TargetName { dir, stem, tail },
            truncated: false,
        };
    }

    // Shorten the title until the filename fits
    let mut title: Vec<char> = sanitize_filename(&assignment.series_title).chars().collect();
    loop {
        title.pop();
        let shortened = format!("{}...", title.iter().collect::<String>().trim_end());
        let (dir, stem) = render(&shortened);
        if title.is_empty() || stem.len() + tail.len() <= config.max_length {
            return NameBuildResult {
                target: TargetName { dir, stem, tail },
                truncated: true,
            };
        }
    }
}

/// Split a rendered template into the target directory and file stem
fn split_rendered(base: &Path, rendered: &str) -> (PathBuf, String) {
    let mut parts: Vec<&str> = rendered
        .split('/')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .filter(|p| {
            !matches!(
                Path::new(p).components().next(),
                Some(Component::CurDir | Component::ParentDir)
            )
        })
        .collect();

    let stem = parts.pop().unwrap_or_default().to_string();
    let dir = parts
        .iter()
        .fold(placement_root(base, &parts), |dir, part| dir.join(part));
    (dir, stem)
}

/// Directory the template's subfolders hang from.
///
/// A file that already sits in some leading run of those subfolders is
/// placed relative to the directory above them, so a rerun keeps it in place.
fn placement_root(base: &Path, folders: &[&str]) -> PathBuf {
    let components: Vec<Component> = base.components().collect();
    for depth in (1..=folders.len()).rev() {
        let Some(split) = components.len().checked_sub(depth).filter(|s| *s > 0) else {
            continue;
        };
        let already_placed = components[split..]
            .iter()
            .zip(&folders[..depth])
            .all(|(component, folder)| component.as_os_str() == OsStr::new(folder));
        if already_placed {
            return components[..split].iter().collect();
        }
    }
    base.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::FileKind;

    fn assignment(title: &str, season: u32, episode: &str) -> EpisodeAssignment {
        EpisodeAssignment {
            season,
            episode: episode.parse().unwrap(),
            series_title: title.to_string(),
        }
    }

    fn parsed(path: &str, language_tag: Option<&str>) -> ParsedFile {
        let path = PathBuf::from(path);
        ParsedFile {
            extension: format!(".{}", path.extension().unwrap().to_string_lossy()),
            kind: FileKind::from_path(&path).unwrap(),
            source_path: path,
            title_token: "Show".to_string(),
            absolute_episode: EpisodeNumber::new(1),
            explicit_season: None,
            is_special: false,
            language_tag: language_tag.map(str::to_string),
        }
    }

    #[test]
    fn test_default_template_matches_parsed() {
        assert_eq!(NameTemplate::parse(DEFAULT_TEMPLATE).unwrap(), NameTemplate::default());
    }

    #[test]
    fn test_render_default_template() {
        let template = NameTemplate::default();

        assert_eq!(
            template.render("Shingeki no Kyojin", 2, EpisodeNumber::new(5)),
            "Shingeki no Kyojin - S02E05"
        );
        assert_eq!(
            template.render("Show", 1, "12.5".parse().unwrap()),
            "Show - S01E12.5"
        );
        assert_eq!(
            template.render("Show", 1, EpisodeNumber::new(100)),
            "Show - S01E100"
        );
    }

    #[test]
    fn test_python_style_width_accepted() {
        let template = NameTemplate::parse("{title} - S{season:02d}E{episode:03d}").unwrap();
        assert_eq!(template.render("Show", 1, EpisodeNumber::new(7)), "Show - S01E007");

        let template = NameTemplate::parse("{title} {episode}").unwrap();
        assert_eq!(template.render("Show", 1, EpisodeNumber::new(7)), "Show 7");
    }

    #[test]
    fn test_template_errors() {
        assert_eq!(
            NameTemplate::parse("{title} - {year}"),
            Err(TemplateError::UnknownPlaceholder("year".to_string()))
        );
        assert_eq!(
            NameTemplate::parse("{title} - S{season:02}"),
            Err(TemplateError::MissingEpisode)
        );
        assert_eq!(
            NameTemplate::parse("{title} - {episode:xx}"),
            Err(TemplateError::InvalidWidth("xx".to_string()))
        );
        assert!(matches!(
            NameTemplate::parse("{title} - {episode"),
            Err(TemplateError::Unclosed(_))
        ));
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("A<B>C:D\"E/F\\G|H?I*J"), "ABCDEFGHIJ");
        assert_eq!(sanitize_filename("Re:Zero"), "ReZero");
        assert_eq!(sanitize_filename("Fate/Zero"), "FateZero");
        assert_eq!(sanitize_filename("Title : Sub"), "Title Sub");
    }

    #[test]
    fn test_title_is_sanitized_in_render() {
        let template = NameTemplate::default();
        assert_eq!(
            template.render("Fate/Zero", 1, EpisodeNumber::new(1)),
            "FateZero - S01E01"
        );
    }

    #[test]
    fn test_build_target_with_language_tag() {
        let file = parsed("/anime/[Group] My Anime - 01 [eng].ass", Some("eng"));
        let result = build_target_name(
            &file,
            &assignment("My Anime", 1, "1"),
            &NameBuilderConfig::default(),
        );

        assert!(!result.truncated);
        assert_eq!(
            result.target.path(),
            PathBuf::from("/anime/My Anime - S01E01 [eng].ass")
        );
        assert_eq!(
            result.target.with_version(2),
            PathBuf::from("/anime/My Anime - S01E01_v2 [eng].ass")
        );
    }

    #[test]
    fn test_template_subfolders() {
        let config = NameBuilderConfig {
            template: NameTemplate::parse("{title}/Season {season:02}/{title} - {episode:02}")
                .unwrap(),
            ..NameBuilderConfig::default()
        };
        let file = parsed("/anime/Show 13.mkv", None);

        let result = build_target_name(&file, &assignment("Show", 2, "1"), &config);
        assert_eq!(
            result.target.path(),
            PathBuf::from("/anime/Show/Season 02/Show - 01.mkv")
        );
    }

    #[test]
    fn test_placed_files_stay_in_their_subfolders() {
        let config = NameBuilderConfig {
            template: NameTemplate::parse("{title}/Season {season:02}/{title} - {episode:02}")
                .unwrap(),
            ..NameBuilderConfig::default()
        };

        let placed = parsed("/anime/Show/Season 02/Show - 01.mkv", None);
        let result = build_target_name(&placed, &assignment("Show", 2, "1"), &config);
        assert_eq!(
            result.target.path(),
            PathBuf::from("/anime/Show/Season 02/Show - 01.mkv")
        );

        let half_placed = parsed("/anime/Show/Show 13.mkv", None);
        let result = build_target_name(&half_placed, &assignment("Show", 2, "1"), &config);
        assert_eq!(
            result.target.path(),
            PathBuf::from("/anime/Show/Season 02/Show - 01.mkv")
        );

        let elsewhere = parsed("/anime/Season 02/Show 13.mkv", None);
        let result = build_target_name(&elsewhere, &assignment("Show", 2, "1"), &config);
        assert_eq!(
            result.target.path(),
            PathBuf::from("/anime/Season 02/Show/Season 02/Show - 01.mkv")
        );
    }

    #[test]
    fn test_parent_components_are_dropped() {
        let config = NameBuilderConfig {
            template: NameTemplate::parse("../{title} - {episode}").unwrap(),
            ..NameBuilderConfig::default()
        };
        let file = parsed("/anime/Show 1.mkv", None);

        let result = build_target_name(&file, &assignment("Show", 1, "1"), &config);
        assert_eq!(result.target.path(), PathBuf::from("/anime/Show - 1.mkv"));
    }

    #[test]
    fn test_long_title_is_truncated() {
        let config = NameBuilderConfig {
            max_length: 40,
            ..NameBuilderConfig::default()
        };
        let file = parsed("/anime/x.mkv", None);
        let long_title = "A".repeat(100);

        let result = build_target_name(&file, &assignment(&long_title, 1, "1"), &config);

        assert!(result.truncated);
        let name = result.target.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.len() <= 40);
        assert!(name.ends_with("... - S01E01.mkv"));
    }
}
