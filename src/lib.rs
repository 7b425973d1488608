pub mod api;
pub mod apply;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod mapper;
pub mod matcher;
pub mod output;
pub mod parser;
pub mod pipeline;
pub mod progress;
pub mod relations;
pub mod rename;
pub mod scanlog;
pub mod scanner;
pub mod ui;

pub use error::{AppError, ExitCode};
pub use pipeline::{apply_directory, DirectoryOutcome, Planner, PlannerOptions};
pub use scanlog::{MemoryScanLog, ProcessedDirectories, ScanLog};
