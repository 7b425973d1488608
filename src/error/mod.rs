mod codes;

pub use codes::ExitCode;

use crate::api::ApiError;
use crate::apply::ApplyError;
use crate::cache::CacheError;
use crate::config::ConfigError;
use crate::pipeline::PipelineError;
use crate::scanlog::ScanLogError;
use crate::scanner::ScannerError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Target directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    #[error("Path is not a directory: {path}")]
    NotADirectory { path: PathBuf },

    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("Configuration error: {message}")]
    ConfigError {
        path: Option<PathBuf>,
        message: String,
    },

    #[error("API error: {message}")]
    ApiError { message: String },

    #[error("Scan log error: {message}")]
    ScanLogError {
        path: Option<PathBuf>,
        message: String,
    },

    #[error("Rename failed: {from} -> {to}")]
    RenameError {
        from: String,
        to: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{failed} of {total} directories failed")]
    PartialFailure { failed: usize, total: usize },

    #[error("Cache error: {message}")]
    CacheError { message: String },

    #[error("{0}")]
    Other(String),
}

impl AppError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            AppError::DirectoryNotFound { .. } => ExitCode::DirectoryNotFound,
            AppError::NotADirectory { .. } => ExitCode::DirectoryNotFound,
            AppError::PermissionDenied { .. } => ExitCode::PermissionError,
            AppError::ConfigError { .. } => ExitCode::ConfigError,
            AppError::ApiError { .. } => ExitCode::ApiError,
            AppError::ScanLogError { .. } => ExitCode::ScanLogError,
            AppError::RenameError { .. } => ExitCode::RenameError,
            AppError::PartialFailure { .. } => ExitCode::PartialFailure,
            AppError::CacheError { .. } => ExitCode::CacheError,
            AppError::Other(_) => ExitCode::GeneralError,
        }
    }

    pub fn detailed_message(&self) -> String {
        match self {
            AppError::DirectoryNotFound { path } => {
                format!(
                    "The specified directory does not exist:\n  {}\n\n\
                     Please verify the path and try again.",
                    path.display()
                )
            }

            AppError::NotADirectory { path } => {
                format!(
                    "The specified path is not a directory:\n  {}\n\n\
                     Please provide a valid directory path.",
                    path.display()
                )
            }

            AppError::PermissionDenied { path } => {
                format!(
                    "Permission denied when accessing:\n  {}\n\n\
                     Please check file permissions or run with appropriate privileges.",
                    path.display()
                )
            }

            AppError::ConfigError { path, message } => {
                let path_info = path
                    .as_ref()
                    .map(|p| format!("File: {}\n", p.display()))
                    .unwrap_or_default();

                format!(
                    "Invalid configuration:\n  {}\n{}\n\
                     Fix the setting or remove it to use the default.",
                    message, path_info
                )
            }

            AppError::ApiError { message } => {
                format!(
                    "Failed to query AniList:\n  {}\n\n\
                     This could be due to:\n\
                     - Network connectivity issues\n\
                     - AniList API rate limiting\n\n\
                     Try again later or check your internet connection.",
                    message
                )
            }

            AppError::ScanLogError { path, message } => {
                let path_info = path
                    .as_ref()
                    .map(|p| format!("File: {}\n", p.display()))
                    .unwrap_or_default();

                format!(
                    "Scan log error:\n  {}\n{}\n\
                     Run with --reset-scan-log to start over.",
                    message, path_info
                )
            }

            AppError::RenameError { from, to, source } => {
                format!(
                    "Failed to rename file:\n\
                     From: {}\n\
                     To:   {}\n\
                     Error: {}\n\n\
                     Check file permissions and ensure no files are open.",
                    from, to, source
                )
            }

            AppError::PartialFailure { failed, total } => {
                format!(
                    "{} of {} directories could not be fully renamed.\n\n\
                     They were left unmarked and will be planned again on the next run.",
                    failed, total
                )
            }

            AppError::CacheError { message } => {
                format!(
                    "Cache error: {}\n\n\
                     The cache file may be corrupted. \
                     Delete the cache file to rebuild it.",
                    message
                )
            }

            AppError::Other(message) => message.clone(),
        }
    }
}

impl From<ScannerError> for AppError {
    fn from(err: ScannerError) -> Self {
        match err {
            ScannerError::PathNotFound(path) => AppError::DirectoryNotFound { path },
            ScannerError::NotADirectory(path) => AppError::NotADirectory { path },
            ScannerError::PermissionDenied(path) => AppError::PermissionDenied { path },
            ScannerError::IoError(e) => AppError::Other(format!("I/O error: {}", e)),
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        let path = match &err {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => Some(path.clone()),
            _ => None,
        };
        AppError::ConfigError {
            path,
            message: err.to_string(),
        }
    }
}

impl From<ApiError> for AppError {
    fn from(err: ApiError) -> Self {
        AppError::ApiError {
            message: err.to_string(),
        }
    }
}

impl From<ScanLogError> for AppError {
    fn from(err: ScanLogError) -> Self {
        let path = match &err {
            ScanLogError::Corrupted(path) => Some(path.clone()),
            _ => None,
        };
        AppError::ScanLogError {
            path,
            message: err.to_string(),
        }
    }
}

impl From<ApplyError> for AppError {
    fn from(err: ApplyError) -> Self {
        match err {
            ApplyError::DestinationExists(path) => AppError::Other(format!(
                "Destination already exists: {}",
                path.display()
            )),
            ApplyError::FilesystemError { from, to, source } => AppError::RenameError {
                from: from.display().to_string(),
                to: to.display().to_string(),
                source,
            },
        }
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::ScanLog(e) => e.into(),
            PipelineError::Scanner(e) => e.into(),
        }
    }
}

impl From<CacheError> for AppError {
    fn from(err: CacheError) -> Self {
        AppError::CacheError {
            message: err.to_string(),
        }
    }
}
