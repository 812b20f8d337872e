use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Utc};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Generates a short unique run ID (7 characters, like git)
pub fn generate_run_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let hash = blake3::hash(&timestamp.to_le_bytes());
    let hex = hash.to_hex();
    hex.as_str()[..7].to_string()
}

/// Get the state directory path
///
/// Priority order:
/// 1. Environment variable APPSHELL_MIGRATE_STATE_DIR (highest priority)
/// 2. --local-state flag (uses ./.appshell-migrate)
/// 3. Global default (uses system data directory)
pub fn get_state_dir(local: bool) -> Result<PathBuf> {
    if let Ok(custom_dir) = std::env::var("APPSHELL_MIGRATE_STATE_DIR") {
        return Ok(PathBuf::from(custom_dir));
    }

    if local {
        let current_dir = std::env::current_dir()?;
        Ok(current_dir.join(".appshell-migrate"))
    } else {
        let proj_dirs = ProjectDirs::from("com", "appshell-migrate", "appshell-migrate")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }
}

pub fn hash_text(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}

/// Compute blake3 hash of a file
pub fn hash_file(path: &Path) -> Result<String> {
    let content = fs::read(path)
        .with_context(|| format!("Failed to read file for hashing: {}", path.display()))?;
    Ok(blake3::hash(&content).to_hex().to_string())
}

/// One file written by a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileModification {
    pub path: PathBuf,
    pub hash_before: String,
    pub hash_after: String,
    /// Backup of the original text, relative to the run's directory
    pub backup: PathBuf,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Applied,
    Reverted,
}

/// Metadata about a single run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    pub command: String,
    pub root: PathBuf,
    pub files_modified: Vec<FileModification>,
    pub status: RunStatus,
    pub can_revert: bool,
}

/// Index of all runs
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RunsIndex {
    pub runs: HashMap<String, RunMetadata>,
}

impl RunsIndex {
    pub fn load(state_dir: &Path) -> Result<Self> {
        let index_path = state_dir.join("runs.json");
        if !index_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&index_path).context("Failed to read runs index")?;

        let index: RunsIndex = serde_json::from_str(&content).map_err(|e| {
            if e.to_string().contains("missing field") {
                eprintln!("⚠️  Incompatible state format detected from a previous version.");
                eprintln!("   The state directory will be reset.");
                eprintln!("   Location: {}", state_dir.display());
            }
            anyhow::anyhow!("Failed to parse runs index: {}", e)
        })?;
        Ok(index)
    }

    /// Load index, or reset state if incompatible format detected
    pub fn load_or_reset(state_dir: &Path) -> Result<Self> {
        match Self::load(state_dir) {
            Ok(index) => Ok(index),
            Err(e) if e.to_string().contains("missing field") => {
                eprintln!("🔄 Resetting incompatible state format...");
                if state_dir.exists() {
                    fs::remove_dir_all(state_dir).context("Failed to remove old state directory")?;
                }
                eprintln!("✓ State directory cleared");
                Ok(Self::default())
            }
            Err(e) => Err(e),
        }
    }

    pub fn save(&self, state_dir: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        write_atomic(state_dir, "runs.json", &content)
    }

    pub fn add_run(&mut self, run: RunMetadata) {
        self.runs.insert(run.run_id.clone(), run);
    }

    pub fn get_run(&self, run_id: &str) -> Option<&RunMetadata> {
        self.runs.get(run_id)
    }

    pub fn get_sorted_runs(&self) -> Vec<&RunMetadata> {
        let mut runs: Vec<_> = self.runs.values().collect();
        runs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        runs
    }
}

fn write_atomic(dir: &Path, name: &str, content: &str) -> Result<()> {
    fs::create_dir_all(dir)?;
    let temp_path = dir.join(format!("{}.tmp", name));
    let mut file = fs::File::create(&temp_path)?;
    file.write_all(content.as_bytes())?;
    file.sync_all()?;
    drop(file);

    fs::rename(temp_path, dir.join(name))?;
    Ok(())
}

/// Backup file name: blake3 of the full path, then the file name for
/// readability, e.g. `3f9a0c1d2b4e5f60-page.tsx.orig`. Distinct paths never
/// share a backup.
fn backup_name(file_path: &Path) -> PathBuf {
    let digest = blake3::hash(file_path.as_os_str().as_encoded_bytes()).to_hex();
    let file_name = file_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    PathBuf::from(format!("{}-{}.orig", &digest.as_str()[..16], file_name))
}

/// Save the original text of a file before it is overwritten
pub fn save_backup(
    file_path: &Path,
    original: &str,
    run_id: &str,
    state_dir: &Path,
) -> Result<PathBuf> {
    let backup_dir = state_dir.join(run_id);
    fs::create_dir_all(&backup_dir)?;

    let name = backup_name(file_path);
    fs::write(backup_dir.join(&name), original)
        .with_context(|| format!("Failed to back up {}", file_path.display()))?;
    Ok(name)
}

/// Collects the files a run writes so the run can be reverted later.
pub struct RunJournal {
    run_id: String,
    state_dir: PathBuf,
    command: String,
    root: PathBuf,
    files: Vec<FileModification>,
}

impl RunJournal {
    pub fn new(state_dir: &Path, root: &Path, command: String) -> Self {
        Self {
            run_id: generate_run_id(),
            state_dir: state_dir.to_path_buf(),
            command,
            root: root.to_path_buf(),
            files: Vec::new(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Back up `original` before the file is written. The returned entry
    /// joins the run only once passed to [`RunJournal::commit`].
    pub fn backup(&self, path: &Path, original: &str, modified: &str) -> Result<FileModification> {
        let backup = save_backup(path, original, &self.run_id, &self.state_dir)?;
        Ok(FileModification {
            path: path.to_path_buf(),
            hash_before: hash_text(original),
            hash_after: hash_text(modified),
            backup,
        })
    }

    /// Add an entry whose write succeeded.
    pub fn commit(&mut self, modification: FileModification) {
        self.files.push(modification);
    }

    pub fn record(&mut self, path: &Path, original: &str, modified: &str) -> Result<()> {
        let modification = self.backup(path, original, modified)?;
        self.commit(modification);
        Ok(())
    }

    /// Persist the run. Returns the run ID, or `None` if nothing was written.
    pub fn finish(self) -> Result<Option<String>> {
        if self.files.is_empty() {
            return Ok(None);
        }

        let metadata = RunMetadata {
            run_id: self.run_id.clone(),
            timestamp: Utc::now(),
            command: self.command,
            root: self.root,
            files_modified: self.files,
            status: RunStatus::Applied,
            can_revert: true,
        };
        save_run_metadata(&metadata, &self.state_dir)?;
        Ok(Some(self.run_id))
    }
}

/// Save run metadata
pub fn save_run_metadata(run: &RunMetadata, state_dir: &Path) -> Result<()> {
    let content = serde_json::to_string_pretty(run)?;
    write_atomic(state_dir, &format!("{}.json", run.run_id), &content)?;

    let mut index = RunsIndex::load(state_dir)?;
    index.add_run(run.clone());
    index.save(state_dir)?;

    Ok(())
}

/// Load run metadata
pub fn load_run_metadata(run_id: &str, state_dir: &Path) -> Result<RunMetadata> {
    let metadata_path = state_dir.join(format!("{}.json", run_id));

    if !metadata_path.exists() {
        bail!("Run {} not found", run_id);
    }

    let content = fs::read_to_string(&metadata_path).context("Failed to read run metadata")?;
    let metadata: RunMetadata =
        serde_json::from_str(&content).context("Failed to parse run metadata")?;
    Ok(metadata)
}

/// Revert a run
pub fn revert_run(run_id: &str, force: bool, state_dir: &Path) -> Result<()> {
    let run = load_run_metadata(run_id, state_dir)?;

    if run.status == RunStatus::Reverted {
        bail!("Run {} has already been reverted", run_id);
    }

    if !run.can_revert {
        bail!("Run {} cannot be reverted", run_id);
    }

    // Verify files haven't changed (unless --force)
    if !force {
        for file in &run.files_modified {
            if !file.path.exists() {
                bail!("File {} no longer exists (use --force to ignore)", file.path.display());
            }

            let current_hash = hash_file(&file.path)?;
            if current_hash != file.hash_after {
                bail!(
                    "File {} has changed since run {} (use --force to ignore)\nExpected hash: {}\nCurrent hash: {}",
                    file.path.display(),
                    run_id,
                    file.hash_after,
                    current_hash
                );
            }
        }
    }

    println!("Reverting {} file(s)...", run.files_modified.len());
    let backup_dir = state_dir.join(run_id);
    for file in &run.files_modified {
        let original = fs::read_to_string(backup_dir.join(&file.backup))
            .with_context(|| format!("Missing backup for {}", file.path.display()))?;
        fs::write(&file.path, original)
            .with_context(|| format!("Failed to write restored file: {}", file.path.display()))?;
        println!("  ✓ Restored: {}", file.path.display());
    }

    let mut run = run;
    run.status = RunStatus::Reverted;
    run.can_revert = false;
    save_run_metadata(&run, state_dir)?;

    println!("✓ Run {} reverted successfully", run_id);
    Ok(())
}

/// Display run history
pub fn show_history(limit: usize, state_dir: &Path) -> Result<()> {
    let index = RunsIndex::load_or_reset(state_dir)?;
    let runs = index.get_sorted_runs();

    if runs.is_empty() {
        println!("No runs found");
        return Ok(());
    }

    println!("Recent runs (showing up to {}):\n", limit);

    for run in runs.iter().take(limit) {
        let status_str = match run.status {
            RunStatus::Applied => {
                if run.can_revert {
                    "[can revert]"
                } else {
                    "[applied]"
                }
            }
            RunStatus::Reverted => "[reverted]",
        };

        let files_str = if run.files_modified.len() == 1 {
            "1 file".to_string()
        } else {
            format!("{} files", run.files_modified.len())
        };

        println!(
            "{}  {}  {:30}  {:10}  {}",
            run.run_id,
            run.timestamp.format("%Y-%m-%d %H:%M"),
            truncate_str(&run.root.display().to_string(), 30),
            files_str,
            status_str
        );
    }

    Ok(())
}

/// Clean old state data
pub fn clean_old_state(keep_days: u32, state_dir: &Path) -> Result<usize> {
    let index = RunsIndex::load_or_reset(state_dir)?;
    let cutoff = Utc::now() - Duration::days(keep_days as i64);

    let mut cleaned = 0;
    let mut new_index = RunsIndex::default();

    for run in index.runs.values() {
        if run.timestamp < cutoff {
            let backup_dir = state_dir.join(&run.run_id);
            if backup_dir.exists() {
                fs::remove_dir_all(&backup_dir)?;
            }

            let metadata_path = state_dir.join(format!("{}.json", run.run_id));
            if metadata_path.exists() {
                fs::remove_file(&metadata_path)?;
            }

            cleaned += 1;
        } else {
            new_index.add_run(run.clone());
        }
    }

    new_index.save(state_dir)?;
    Ok(cleaned)
}

// Keeps the tail, which is the informative end of a path
fn truncate_str(s: &str, max_len: usize) -> String {
    let count = s.chars().count();
    if count <= max_len {
        s.to_string()
    } else {
        let tail: String = s.chars().skip(count - (max_len - 3)).collect();
        format!("...{}", tail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_generate_run_id() {
        let id1 = generate_run_id();
        let id2 = generate_run_id();

        assert_eq!(id1.len(), 7);
        assert_eq!(id2.len(), 7);
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_hash_file_matches_hash_text() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let file_path = temp_dir.path().join("page.tsx");

        fs::write(&file_path, "export default function Page() {}")?;
        assert_eq!(
            hash_file(&file_path)?,
            hash_text("export default function Page() {}")
        );

        fs::write(&file_path, "export {}")?;
        assert_ne!(hash_file(&file_path)?, hash_text("export default function Page() {}"));

        Ok(())
    }

    #[test]
    fn test_backup_name_keeps_file_name() {
        let name = backup_name(Path::new("/repo/src/app/jobs/page.tsx"));
        let name = name.to_string_lossy();

        assert!(name.ends_with("-page.tsx.orig"));
        assert_eq!(name.len(), 16 + "-page.tsx.orig".len());
    }

    #[test]
    fn test_backup_names_do_not_collide() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let state_dir = temp_dir.path().join("state");
        let a = temp_dir.path().join("app/a_b/page.tsx");
        let b = temp_dir.path().join("app/a/b_page.tsx");
        fs::create_dir_all(a.parent().unwrap())?;
        fs::create_dir_all(b.parent().unwrap())?;
        fs::write(&a, "A new")?;
        fs::write(&b, "B new")?;

        let mut journal = RunJournal::new(&state_dir, temp_dir.path(), "migrate --apply".to_string());
        journal.record(&a, "A old", "A new")?;
        journal.record(&b, "B old", "B new")?;
        let run_id = journal.finish()?.expect("run recorded");

        revert_run(&run_id, false, &state_dir)?;
        assert_eq!(fs::read_to_string(&a)?, "A old");
        assert_eq!(fs::read_to_string(&b)?, "B old");
        Ok(())
    }

    #[test]
    fn test_uncommitted_backup_is_not_part_of_run() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let state_dir = temp_dir.path().join("state");
        let written = temp_dir.path().join("written.tsx");
        let failed = temp_dir.path().join("failed.tsx");
        fs::write(&written, "new text")?;

        let mut journal = RunJournal::new(&state_dir, temp_dir.path(), "migrate --apply".to_string());
        let ok = journal.backup(&written, "old text", "new text")?;
        journal.commit(ok);
        let _dropped = journal.backup(&failed, "old text", "new text")?;
        let run_id = journal.finish()?.expect("run recorded");

        let run = load_run_metadata(&run_id, &state_dir)?;
        assert_eq!(run.files_modified.len(), 1);
        assert_eq!(run.files_modified[0].path, written);

        revert_run(&run_id, false, &state_dir)?;
        assert_eq!(fs::read_to_string(&written)?, "old text");
        Ok(())
    }

    #[test]
    fn test_journal_then_revert() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let state_dir = temp_dir.path().join("state");
        let file_path = temp_dir.path().join("page.tsx");

        fs::write(&file_path, "new text")?;

        let mut journal = RunJournal::new(&state_dir, temp_dir.path(), "migrate --apply".to_string());
        journal.record(&file_path, "old text", "new text")?;
        let run_id = journal.finish()?.expect("run recorded");

        let index = RunsIndex::load(&state_dir)?;
        assert_eq!(index.runs.len(), 1);
        assert!(index.get_run(&run_id).is_some());

        revert_run(&run_id, false, &state_dir)?;
        assert_eq!(fs::read_to_string(&file_path)?, "old text");

        let run = load_run_metadata(&run_id, &state_dir)?;
        assert_eq!(run.status, RunStatus::Reverted);
        assert!(revert_run(&run_id, false, &state_dir).is_err());

        Ok(())
    }

    #[test]
    fn test_revert_refuses_edited_file() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let state_dir = temp_dir.path().join("state");
        let file_path = temp_dir.path().join("page.tsx");

        let mut journal = RunJournal::new(&state_dir, temp_dir.path(), "migrate".to_string());
        journal.record(&file_path, "old text", "new text")?;
        let run_id = journal.finish()?.expect("run recorded");

        fs::write(&file_path, "edited by hand")?;
        assert!(revert_run(&run_id, false, &state_dir).is_err());

        revert_run(&run_id, true, &state_dir)?;
        assert_eq!(fs::read_to_string(&file_path)?, "old text");
        Ok(())
    }

    #[test]
    fn test_empty_journal_records_nothing() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let state_dir = temp_dir.path().join("state");

        let journal = RunJournal::new(&state_dir, temp_dir.path(), "migrate".to_string());
        assert!(journal.finish()?.is_none());
        assert!(!state_dir.join("runs.json").exists());
        Ok(())
    }

    #[test]
    fn test_clean_old_state() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let state_dir = temp_dir.path().join("state");

        let old = RunMetadata {
            run_id: "abc1234".to_string(),
            timestamp: Utc::now() - Duration::days(30),
            command: "migrate --apply".to_string(),
            root: PathBuf::from("src"),
            files_modified: vec![],
            status: RunStatus::Applied,
            can_revert: true,
        };
        let recent = RunMetadata {
            run_id: "def5678".to_string(),
            timestamp: Utc::now(),
            ..old.clone()
        };
        save_run_metadata(&old, &state_dir)?;
        save_run_metadata(&recent, &state_dir)?;

        assert_eq!(clean_old_state(7, &state_dir)?, 1);

        let index = RunsIndex::load(&state_dir)?;
        assert!(index.get_run("abc1234").is_none());
        assert!(index.get_run("def5678").is_some());
        Ok(())
    }

    #[test]
    fn test_truncate_str_keeps_tail() {
        assert_eq!(truncate_str("short", 10), "short");
        assert_eq!(truncate_str("/very/long/path/src", 10), "...ath/src");
    }
}
