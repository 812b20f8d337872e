use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{MigrateError, Result};

/// Describes one component swap: which import to retire, which wrapper
/// replaces it, and which guard tags the wrapper nests inside.
///
/// Defaults reproduce the NavBar -> AppShell migration. Any subset of fields
/// can be overridden from a YAML or JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationSpec {
    /// Local name bound by the retiring import (and used as its tag name)
    pub old_component: String,
    /// Module specifier the retiring component is imported from
    pub old_module: String,
    /// Wrapper component that replaces it
    pub new_component: String,
    pub new_module: String,
    /// Guard tags checked in order; the first one present as both an
    /// opening and a closing tag gets the wrapper
    pub guards: Vec<String>,
    /// File extensions (without the dot) considered during discovery
    pub extensions: Vec<String>,
    /// Paths (relative to the root, or absolute) or glob patterns to skip
    pub exclude: Vec<String>,
}

impl Default for MigrationSpec {
    fn default() -> Self {
        Self {
            old_component: "NavBar".to_string(),
            old_module: "@/components/NavBar".to_string(),
            new_component: "AppShell".to_string(),
            new_module: "@/components/AppShell".to_string(),
            guards: vec!["ProtectedRoute".to_string(), "AdminRoute".to_string()],
            extensions: vec!["tsx".to_string(), "ts".to_string()],
            exclude: Vec::new(),
        }
    }
}

impl MigrationSpec {
    /// Load a spec file. `.yaml`/`.yml` is parsed as YAML; anything else is
    /// tried as JSON first and then as YAML.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MigrateError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;

        let is_yaml = matches!(
            path.extension().and_then(|s| s.to_str()),
            Some("yaml") | Some("yml")
        );

        let spec: MigrationSpec = if is_yaml {
            serde_yaml::from_str(&content)
                .map_err(|e| MigrateError::Config(format!("failed to parse YAML: {}", e)))?
        } else {
            serde_json::from_str(&content)
                .or_else(|_| serde_yaml::from_str(&content))
                .map_err(|e| {
                    MigrateError::Config(format!(
                        "failed to parse spec (tried both JSON and YAML): {}",
                        e
                    ))
                })?
        };

        spec.validate()?;
        Ok(spec)
    }

    pub fn validate(&self) -> Result<()> {
        let names = [
            ("old_component", &self.old_component),
            ("new_component", &self.new_component),
        ];
        for (field, name) in names {
            let valid = !name.is_empty()
                && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
            if !valid {
                return Err(MigrateError::Config(format!(
                    "{} must be a JSX identifier, got {:?}",
                    field, name
                )));
            }
        }
        if self.old_component == self.new_component {
            return Err(MigrateError::Config(
                "old_component and new_component must differ".to_string(),
            ));
        }
        if self.old_module.is_empty() || self.new_module.is_empty() {
            return Err(MigrateError::Config("module specifiers cannot be empty".to_string()));
        }
        Ok(())
    }

    /// Canonical import statement for the new wrapper.
    pub fn new_import(&self) -> String {
        format!("import {} from \"{}\";", self.new_component, self.new_module)
    }

    /// Exclusion entries merged with extra ones from the command line.
    pub fn exclusions_with(&self, extra: &[String]) -> Vec<String> {
        self.exclude.iter().chain(extra.iter()).cloned().collect()
    }
}

/// Joins a relative exclusion entry onto `root`.
pub fn resolve_against(root: &Path, entry: &str) -> PathBuf {
    let entry = Path::new(entry);
    if entry.is_absolute() {
        entry.to_path_buf()
    } else {
        root.join(entry)
    }
}
