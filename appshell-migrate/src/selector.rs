use regex::Regex;
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use crate::config::{resolve_against, MigrationSpec};
use crate::error::{MigrateError, Result};
use crate::operations::ImportSignature;

/// Lexically normalise a path: drop `.` components, fold `..` into its
/// parent, and rebuild with the platform separator. Does not touch the
/// filesystem, so it works for paths that do not exist.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(out.components().next_back(), Some(Component::Normal(_)))
                    && out.pop();
                if !popped && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Anchor `path` to the current directory when it is relative, then
/// normalise it, so `src/app/page.tsx` and `<cwd>/src/app/page.tsx` compare
/// equal.
pub fn canonical_form(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    normalize_path(&absolute)
}

fn literal_brackets(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        match c {
            '[' => out.push_str("[[]"),
            ']' => out.push_str("[]]"),
            other => out.push(other),
        }
    }
    out
}

/// Paths that are never selected, fixed for the whole run.
///
/// Every entry is kept as a literal path, compared after normalisation.
/// Entries containing `*` or `?` are also matched as glob patterns. Brackets
/// are always literal so dynamic routes such as `app/jobs/[id]/page.tsx`
/// exclude exactly themselves, alone or inside a pattern.
#[derive(Debug, Clone, Default)]
pub struct ExclusionSet {
    paths: HashSet<PathBuf>,
    patterns: Vec<glob::Pattern>,
}

impl ExclusionSet {
    pub fn new(root: &Path, entries: &[String]) -> Result<Self> {
        let mut set = Self::default();
        for entry in entries {
            let resolved = canonical_form(&resolve_against(root, entry));
            if entry.contains('*') || entry.contains('?') {
                let escaped = literal_brackets(&resolved.to_string_lossy());
                let pattern = glob::Pattern::new(&escaped).map_err(|e| {
                    MigrateError::Config(format!("invalid exclude pattern {:?}: {}", entry, e))
                })?;
                set.patterns.push(pattern);
            }
            set.paths.insert(resolved);
        }
        Ok(set)
    }

    pub fn contains(&self, path: &Path) -> bool {
        let normalized = canonical_form(path);
        self.paths.contains(&normalized)
            || self
                .patterns
                .iter()
                .any(|p| p.matches_path(&normalized))
    }

    /// Number of configured entries.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Picks the files that still import the retiring component.
pub struct Selector {
    signature: Regex,
    exclusions: ExclusionSet,
}

impl Selector {
    pub fn new(spec: &MigrationSpec, exclusions: ExclusionSet) -> Result<Self> {
        Ok(Self {
            signature: ImportSignature::retiring(spec).regex()?,
            exclusions,
        })
    }

    pub fn is_excluded(&self, path: &Path) -> bool {
        self.exclusions.contains(path)
    }

    pub fn matches(&self, text: &str) -> bool {
        self.signature.is_match(text)
    }

    /// Paths whose text carries the retiring import, in encounter order.
    /// Excluded paths are dropped before their text is looked at.
    pub fn select<'a, I>(&self, files: I) -> Vec<PathBuf>
    where
        I: IntoIterator<Item = (&'a Path, &'a str)>,
    {
        files
            .into_iter()
            .filter(|(path, _)| {
                let excluded = self.is_excluded(path);
                if excluded {
                    debug!(path = %path.display(), "excluded");
                }
                !excluded
            })
            .filter(|(_, text)| self.matches(text))
            .map(|(path, _)| path.to_path_buf())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selector(root: &Path, exclude: &[&str]) -> Selector {
        let entries: Vec<String> = exclude.iter().map(|s| s.to_string()).collect();
        let exclusions = ExclusionSet::new(root, &entries).unwrap();
        Selector::new(&MigrationSpec::default(), exclusions).unwrap()
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path(Path::new("/repo/src/./app/../app/page.tsx")),
            PathBuf::from("/repo/src/app/page.tsx")
        );
        assert_eq!(normalize_path(Path::new("a/b/../../c")), PathBuf::from("c"));
        assert_eq!(normalize_path(Path::new("../x")), PathBuf::from("../x"));
        assert_eq!(normalize_path(Path::new("/../x")), PathBuf::from("/x"));
    }

    #[test]
    fn test_select_keeps_encounter_order() {
        let sel = selector(Path::new("/repo"), &[]);
        let files = [
            (Path::new("/repo/b.tsx"), "import NavBar from '@/components/NavBar'"),
            (Path::new("/repo/c.tsx"), "import Footer from '@/components/Footer';"),
            (Path::new("/repo/a.tsx"), "import NavBar from \"@/components/NavBar\";"),
        ];

        let selected = sel.select(files.iter().map(|(p, t)| (*p, *t)));
        assert_eq!(
            selected,
            vec![PathBuf::from("/repo/b.tsx"), PathBuf::from("/repo/a.tsx")]
        );
    }

    #[test]
    fn test_excluded_path_never_selected() {
        let sel = selector(Path::new("/repo/src"), &["app/org/plans/page.tsx"]);
        let text = "import NavBar from \"@/components/NavBar\";";

        let files = [
            (Path::new("/repo/src/app/org/plans/page.tsx"), text),
            (Path::new("/repo/src/app/org/../org/plans/./page.tsx"), text),
            (Path::new("/repo/src/app/org/page.tsx"), text),
        ];

        let selected = sel.select(files.iter().map(|(p, t)| (*p, *t)));
        assert_eq!(selected, vec![PathBuf::from("/repo/src/app/org/page.tsx")]);
    }

    #[test]
    fn test_exclusion_glob() {
        let sel = selector(Path::new("/repo/src"), &["app/admin/**/*.tsx"]);

        assert!(sel.is_excluded(Path::new("/repo/src/app/admin/users/page.tsx")));
        assert!(!sel.is_excluded(Path::new("/repo/src/app/users/page.tsx")));
    }

    #[test]
    fn test_bracketed_route_excluded_literally() {
        let sel = selector(Path::new("/repo/src"), &["app/jobs/[id]/page.tsx"]);

        assert!(sel.is_excluded(Path::new("/repo/src/app/jobs/[id]/page.tsx")));
        assert!(!sel.is_excluded(Path::new("/repo/src/app/jobs/i/page.tsx")));
        assert!(!sel.is_excluded(Path::new("/repo/src/app/jobs/[slug]/page.tsx")));

        let glob = selector(Path::new("/repo/src"), &["app/jobs/[id]/*.tsx"]);
        assert!(glob.is_excluded(Path::new("/repo/src/app/jobs/[id]/page.tsx")));
        assert!(!glob.is_excluded(Path::new("/repo/src/app/jobs/i/page.tsx")));
    }

    #[test]
    fn test_absolute_entry_matches_relative_root() -> anyhow::Result<()> {
        let cwd = std::env::current_dir()?;
        let absolute = cwd.join("src/app/page.tsx");
        let sel = selector(Path::new("src"), &[absolute.to_str().unwrap()]);

        assert!(sel.is_excluded(Path::new("src/app/page.tsx")));
        assert!(sel.is_excluded(Path::new("./src/app/../app/page.tsx")));
        assert!(!sel.is_excluded(Path::new("src/app/other.tsx")));

        let relative = selector(Path::new("src"), &["app/page.tsx"]);
        assert!(relative.is_excluded(&absolute));
        Ok(())
    }

    #[test]
    fn test_already_migrated_file_not_selected() {
        let sel = selector(Path::new("/repo"), &[]);
        let migrated = "import AppShell from \"@/components/AppShell\";\n";

        assert!(!sel.matches(migrated));
    }
}
