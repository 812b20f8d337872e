use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{MigrateError, Result};

/// File access the migration needs. The driver only ever talks to the tree
/// through this trait.
pub trait SourceTree {
    /// Every file under `root` that is a candidate for selection, sorted.
    fn list_candidate_files(&self, root: &Path) -> Result<Vec<PathBuf>>;

    fn read_text(&self, path: &Path) -> io::Result<String>;

    fn write_text(&self, path: &Path, text: &str) -> io::Result<()>;
}

/// The real filesystem, filtered by file extension.
pub struct FsTree {
    extensions: Vec<String>,
}

impl FsTree {
    pub fn new(extensions: &[String]) -> Self {
        Self {
            extensions: extensions.to_vec(),
        }
    }

    fn has_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|s| s.to_str())
            .map(|ext| self.extensions.iter().any(|e| e == ext))
            .unwrap_or(false)
    }
}

impl SourceTree for FsTree {
    fn list_candidate_files(&self, root: &Path) -> Result<Vec<PathBuf>> {
        if root.is_file() {
            return Ok(if self.has_extension(root) {
                vec![root.to_path_buf()]
            } else {
                Vec::new()
            });
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                // The root itself must be walkable; anything below it is skipped
                Err(e) if e.depth() == 0 => {
                    return Err(MigrateError::Walk {
                        root: root.to_path_buf(),
                        source: e,
                    })
                }
                Err(e) => {
                    tracing::warn!("skipping unreadable entry: {}", e);
                    continue;
                }
            };

            if entry.file_type().is_file() && self.has_extension(entry.path()) {
                files.push(entry.into_path());
            }
        }

        Ok(files)
    }

    fn read_text(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn write_text(&self, path: &Path, text: &str) -> io::Result<()> {
        std::fs::write(path, text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lists_only_matching_extensions_sorted() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();
        std::fs::create_dir_all(root.join("app/jobs"))?;
        std::fs::write(root.join("app/jobs/page.tsx"), "")?;
        std::fs::write(root.join("app/page.tsx"), "")?;
        std::fs::write(root.join("app/util.ts"), "")?;
        std::fs::write(root.join("app/globals.css"), "")?;

        let tree = FsTree::new(&["tsx".to_string(), "ts".to_string()]);
        let files = tree.list_candidate_files(root)?;

        assert_eq!(
            files,
            vec![
                root.join("app/jobs/page.tsx"),
                root.join("app/page.tsx"),
                root.join("app/util.ts"),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_single_file_root() -> anyhow::Result<()> {
        let temp_dir = TempDir::new()?;
        let file = temp_dir.path().join("page.tsx");
        std::fs::write(&file, "")?;

        let tree = FsTree::new(&["tsx".to_string()]);
        assert_eq!(tree.list_candidate_files(&file)?, vec![file]);
        Ok(())
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let tree = FsTree::new(&["tsx".to_string()]);
        let result = tree.list_candidate_files(Path::new("/definitely/not/here"));

        assert!(matches!(result, Err(MigrateError::Walk { .. })));
    }
}
