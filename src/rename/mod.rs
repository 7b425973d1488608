mod name_builder;
mod plan;
mod types;

pub use name_builder::{
    build_target_name, sanitize_filename, NameBuildResult, NameBuilderConfig, NameTemplate,
    TargetName, TemplateError, DEFAULT_TEMPLATE,
};
pub use plan::{resolve_collisions, ProposedRename};
pub use types::{Collision, DirectoryPlan, RenamePlanEntry, SkipReason, SkippedFile};
