use std::path::PathBuf;
use thiserror::Error;

/// Every way a single file (or the whole run) can fail.
///
/// Only [`MigrateError::Walk`] and [`MigrateError::Config`] abort a run; the
/// rest are recorded against the file that produced them and the run moves on.
#[derive(Debug, Error)]
pub enum MigrateError {
    /// A candidate could not be read while deciding whether it is selected.
    #[error("could not read {} during discovery: {source}", path.display())]
    Discovery {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The root directory itself could not be walked.
    #[error("could not walk {}: {source}", root.display())]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("could not read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The bare-return branch placed an opening wrapper tag but found no
    /// `);` line followed by a column-0 `}` after it.
    #[error("found `return (` at line {line} but no closing `);` before the end of the function")]
    UnclosedWrapper { line: usize },

    /// Neither a guard wrapper nor a `return (` block exists to wrap.
    #[error("no guard wrapper and no `return (` block to wrap with <{wrapper}>")]
    NoRenderBlock { wrapper: String },

    #[error("<{wrapper}> is unbalanced after rewrite: {opened} opening tag(s) added, {closed} closing tag(s) added")]
    UnbalancedWrapper {
        wrapper: String,
        opened: usize,
        closed: usize,
    },

    #[error("overlapping edits at byte {first} and byte {second}")]
    OverlappingEdits { first: usize, second: usize },

    #[error("invalid pattern built from migration spec: {0}")]
    Pattern(#[from] regex::Error),

    #[error("invalid migration spec: {0}")]
    Config(String),
}

impl MigrateError {
    /// Structural failures mean the heuristics misjudged the file's shape and
    /// a person has to migrate it by hand.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            MigrateError::UnclosedWrapper { .. }
                | MigrateError::NoRenderBlock { .. }
                | MigrateError::UnbalancedWrapper { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, MigrateError>;
