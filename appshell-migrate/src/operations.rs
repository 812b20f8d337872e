use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::MigrationSpec;
use crate::error::Result;

/// `(identifierName, moduleSpecifier)` of a default import, e.g.
/// `import NavBar from "@/components/NavBar"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSignature {
    pub identifier: String,
    pub module: String,
}

impl ImportSignature {
    pub fn new(identifier: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            module: module.into(),
        }
    }

    pub fn retiring(spec: &MigrationSpec) -> Self {
        Self::new(&spec.old_component, &spec.old_module)
    }

    pub fn replacement(spec: &MigrationSpec) -> Self {
        Self::new(&spec.new_component, &spec.new_module)
    }

    // Quote style is not required to match on both sides.
    fn core_pattern(&self) -> String {
        format!(
            r#"import\s+{}\s+from\s+["']{}["']"#,
            regex::escape(&self.identifier),
            regex::escape(&self.module)
        )
    }

    /// Matches the import anywhere; used for selection and presence checks.
    pub fn regex(&self) -> Result<Regex> {
        Ok(Regex::new(&self.core_pattern())?)
    }

    /// Matches the whole statement including an optional terminator on the
    /// same line.
    pub fn statement_regex(&self) -> Result<Regex> {
        Ok(Regex::new(&format!(r"{}[ \t]*;?", self.core_pattern()))?)
    }
}

/// Where the new wrapper goes. Exactly one shape applies to a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "tag")]
pub enum WrapperShape {
    /// Content sits inside a route guard such as `<ProtectedRoute>`
    Guarded(String),
    /// No guard; the wrapper goes inside the first `return (` block
    BareReturn,
}

impl fmt::Display for WrapperShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WrapperShape::Guarded(tag) => write!(f, "guarded by <{}>", tag),
            WrapperShape::BareReturn => write!(f, "bare return"),
        }
    }
}

/// Result of running the rewriter over one file's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    pub text: String,
    /// Verbatim comparison with the input; whitespace-only edits count
    pub changed: bool,
    /// `None` when the retiring import was absent and nothing was attempted
    pub shape: Option<WrapperShape>,
    pub imports_replaced: usize,
    pub tags_removed: usize,
}

impl Rewrite {
    pub fn unchanged(text: &str) -> Self {
        Self {
            text: text.to_string(),
            changed: false,
            shape: None,
            imports_replaced: 0,
            tags_removed: 0,
        }
    }
}

/// Per-file result of the mutation phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Rewritten (or, in a dry run, would be)
    Migrated,
    /// Selected but the rewrite produced identical text
    Skipped,
    Errored(String),
}
