pub mod builtin;
pub mod loader;
pub mod schema;

pub use builtin::default_patch_set;
pub use loader::{
    common_target, load_dir, load_from_path, load_from_str, load_patch_sets, ConfigError,
};
pub use schema::{
    Metadata, Operation, PatchConfig, Query, StepDefinition, ValidationError, ValidationIssue,
};
