//! User configuration loaded from `config.toml`.

use crate::api::{ApiConfig, TitleLanguage};
use crate::cache::DEFAULT_EXPIRY_HOURS;
use crate::mapper::SpecialsPolicy;
use crate::matcher::{MatchConfig, DEFAULT_AMBIGUITY_MARGIN, DEFAULT_FUZZY_THRESHOLD};
use crate::rename::{NameBuilderConfig, NameTemplate, TemplateError, DEFAULT_TEMPLATE};
use crate::scanlog::{ScanLog, SCAN_LOG_FILE_NAME};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("fuzzy_threshold must be between 0 and 100, got {0}")]
    ThresholdOutOfRange(u8),

    #[error("ambiguity_margin must be a non-negative number, got {0}")]
    InvalidMargin(f64),

    #[error("Invalid rename_template: {0}")]
    Template(#[from] TemplateError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupCacheSettings {
    pub enabled: bool,
    pub duration_hours: u32,
}

impl Default for LookupCacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            duration_hours: DEFAULT_EXPIRY_HOURS,
        }
    }
}

/// Contents of `config.toml`; every key is optional
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub title_language: TitleLanguage,
    pub rename_template: String,
    pub fuzzy_threshold: u8,
    pub ambiguity_margin: f64,
    pub specials: SpecialsPolicy,
    pub lookup_cache: LookupCacheSettings,
    /// Lookup cache directory; the user cache directory when unset
    pub cache_dir: Option<PathBuf>,
    /// Scan log file; the user data directory when unset
    pub scan_log: Option<PathBuf>,
    pub api: ApiConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            title_language: TitleLanguage::default(),
            rename_template: DEFAULT_TEMPLATE.to_string(),
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
            ambiguity_margin: DEFAULT_AMBIGUITY_MARGIN,
            specials: SpecialsPolicy::default(),
            lookup_cache: LookupCacheSettings::default(),
            cache_dir: None,
            scan_log: None,
            api: ApiConfig::default(),
        }
    }
}

impl Settings {
    /// `<config dir>/anirename/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("anirename").join(CONFIG_FILE_NAME))
    }

    /// Load settings from `path`, or from the default location when `None`.
    ///
    /// A missing default file yields defaults; a missing explicit file is an
    /// error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, explicit) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => match Self::default_path() {
                Some(path) => (path, false),
                None => return Ok(Self::default()),
            },
        };

        if !explicit && !path.exists() {
            debug!("No config file at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let settings = Self::from_toml(&content).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse { path: path.clone(), source },
            other => other,
        })?;
        debug!("Loaded config from {:?}", path);
        Ok(settings)
    }

    /// Parse and validate TOML content
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fuzzy_threshold > 100 {
            return Err(ConfigError::ThresholdOutOfRange(self.fuzzy_threshold));
        }
        if !self.ambiguity_margin.is_finite() || self.ambiguity_margin < 0.0 {
            return Err(ConfigError::InvalidMargin(self.ambiguity_margin));
        }
        NameTemplate::parse(&self.rename_template)?;
        Ok(())
    }

    pub fn match_config(&self) -> MatchConfig {
        MatchConfig {
            fuzzy_threshold: self.fuzzy_threshold,
            ambiguity_margin: self.ambiguity_margin,
        }
    }

    pub fn name_builder_config(&self) -> Result<NameBuilderConfig, ConfigError> {
        Ok(NameBuilderConfig {
            template: NameTemplate::parse(&self.rename_template)?,
            ..NameBuilderConfig::default()
        })
    }

    /// Where the scan log lives, if anywhere
    pub fn scan_log_path(&self) -> Option<PathBuf> {
        match &self.scan_log {
            Some(path) if path.is_dir() => Some(path.join(SCAN_LOG_FILE_NAME)),
            Some(path) => Some(path.clone()),
            None => ScanLog::default_path(),
        }
    }
}
