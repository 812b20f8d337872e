pub mod config;
pub mod diff;
pub mod editor;
pub mod error;
pub mod migrate;
pub mod operations;
pub mod selector;
pub mod state;
pub mod surgical;
pub mod workspace;


pub use config::MigrationSpec;
pub use diff::{generate_unified_diff, print_diff, DiffStats};
pub use editor::ShellEditor;
pub use error::MigrateError;
pub use migrate::{Migration, MigrateOptions, OutputFormat, RunReport};
pub use operations::*;
pub use selector::{ExclusionSet, Selector};
pub use workspace::{FsTree, SourceTree};
