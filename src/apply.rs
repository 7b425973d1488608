use crate::rename::RenamePlanEntry;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ApplyError {
    #[error("Destination already exists: {0}")]
    DestinationExists(PathBuf),

    #[error("Failed to rename '{from}' to '{to}': {source}")]
    FilesystemError {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Carries out a single plan entry
pub trait Applier {
    fn apply(&mut self, entry: &RenamePlanEntry) -> Result<(), ApplyError>;
}

/// Renames files on the local filesystem, never overwriting
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalApplier;

impl Applier for LocalApplier {
    fn apply(&mut self, entry: &RenamePlanEntry) -> Result<(), ApplyError> {
        if entry.target.exists() {
            return Err(ApplyError::DestinationExists(entry.target.clone()));
        }

        let fs_error = |source| ApplyError::FilesystemError {
            from: entry.source.clone(),
            to: entry.target.clone(),
            source,
        };

        if let Some(parent) = entry.target.parent() {
            fs::create_dir_all(parent).map_err(fs_error)?;
        }

        info!("Renaming: {} -> {}", entry.source_name(), entry.target_name());
        fs::rename(&entry.source, &entry.target).map_err(fs_error)
    }
}
