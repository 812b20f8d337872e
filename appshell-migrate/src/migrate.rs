use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::config::MigrationSpec;
use crate::diff::{print_diff, print_summary_diff, DiffStats};
use crate::editor::ShellEditor;
use crate::error::{MigrateError, Result};
use crate::operations::FileOutcome;
use crate::selector::{ExclusionSet, Selector};
use crate::state::RunJournal;
use crate::workspace::SourceTree;

/// How rewrites are previewed while the run progresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Outcome lines only
    #[default]
    Default,
    /// Unified diff per changed file
    Diff,
    /// Changed lines per file
    Summary,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "default" => Ok(OutputFormat::Default),
            "diff" => Ok(OutputFormat::Diff),
            "summary" => Ok(OutputFormat::Summary),
            _ => Err(format!(
                "Invalid format: {}. Use 'default', 'diff', or 'summary'",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MigrateOptions {
    /// Write changed files; otherwise only report what would change
    pub apply: bool,
    pub format: OutputFormat,
}

/// Output of the discovery phase.
#[derive(Debug, Default)]
pub struct Discovery {
    /// Selected files, sorted
    pub candidates: Vec<PathBuf>,
    /// Files that could not be read while selecting
    pub errors: Vec<(PathBuf, MigrateError)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileResult {
    /// Relative to the run's root where possible
    pub path: PathBuf,
    pub outcome: FileOutcome,
}

/// Everything a run produced, threaded through the per-file loop.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub dry_run: bool,
    pub candidates: usize,
    pub results: Vec<FileResult>,
    pub stats: DiffStats,
    pub run_id: Option<String>,
}

impl RunReport {
    pub fn record(&mut self, path: PathBuf, outcome: FileOutcome) {
        self.results.push(FileResult { path, outcome });
    }

    pub fn migrated(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.outcome == FileOutcome::Migrated)
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.outcome == FileOutcome::Skipped)
            .count()
    }

    pub fn errors(&self) -> Vec<(&Path, &str)> {
        self.results
            .iter()
            .filter_map(|r| match &r.outcome {
                FileOutcome::Errored(msg) => Some((r.path.as_path(), msg.as_str())),
                _ => None,
            })
            .collect()
    }

    pub fn print(&self) {
        print!("{}", self);
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Found {} files to migrate", self.candidates)?;

        for result in &self.results {
            let path = result.path.display();
            match &result.outcome {
                FileOutcome::Migrated => writeln!(f, "  OK  {}", path)?,
                FileOutcome::Skipped => writeln!(f, "  SKIP {} (no changes)", path)?,
                FileOutcome::Errored(msg) => writeln!(f, "  ERR {}: {}", path, msg)?,
            }
        }

        let errors = self.errors();
        let verb = if self.dry_run { "would be migrated" } else { "migrated" };
        writeln!(f, "\nDone: {} files {}, {} errors", self.migrated(), verb, errors.len())?;
        for (path, msg) in &errors {
            writeln!(f, "  {}: {}", path.display(), msg)?;
        }

        if self.dry_run && self.migrated() > 0 {
            writeln!(f, "\n🔍 Dry run complete. Use --apply to make changes.")?;
        }
        if let Some(run_id) = &self.run_id {
            writeln!(
                f,
                "\n📝 Run ID: {} (use 'appshell-migrate revert {}' to undo)",
                run_id, run_id
            )?;
        }
        Ok(())
    }
}

/// One configured migration over one root.
pub struct Migration<'a, T: SourceTree> {
    tree: &'a T,
    root: PathBuf,
    editor: ShellEditor,
    selector: Selector,
}

impl<'a, T: SourceTree> Migration<'a, T> {
    pub fn new(tree: &'a T, spec: &MigrationSpec, root: &Path, extra_excludes: &[String]) -> Result<Self> {
        let exclusions = ExclusionSet::new(root, &spec.exclusions_with(extra_excludes))?;
        debug!(entries = exclusions.len(), "exclusion set ready");

        Ok(Self {
            tree,
            root: root.to_path_buf(),
            editor: ShellEditor::new(spec)?,
            selector: Selector::new(spec, exclusions)?,
        })
    }

    /// Read-only pass: list files, read each one that is not excluded, and
    /// keep the ones that still import the retiring component. Only a root
    /// that cannot be walked is fatal.
    pub fn discover(&self) -> Result<Discovery> {
        let files = self.tree.list_candidate_files(&self.root)?;
        info!(files = files.len(), root = %self.root.display(), "scanning");

        let mut discovery = Discovery::default();
        let mut texts = Vec::with_capacity(files.len());

        for path in files {
            if self.selector.is_excluded(&path) {
                debug!(path = %path.display(), "excluded");
                continue;
            }
            match self.tree.read_text(&path) {
                Ok(text) => texts.push((path, text)),
                Err(source) => {
                    warn!(path = %path.display(), "unreadable during discovery: {}", source);
                    discovery.errors.push((path.clone(), MigrateError::Discovery { path, source }));
                }
            }
        }

        let mut candidates = self
            .selector
            .select(texts.iter().map(|(p, t)| (p.as_path(), t.as_str())));
        candidates.sort();
        discovery.candidates = candidates;

        Ok(discovery)
    }

    /// Discovery, then mutation one file at a time. Per-file failures are
    /// recorded and the run continues.
    pub fn run(&self, options: MigrateOptions, mut journal: Option<&mut RunJournal>) -> Result<RunReport> {
        let discovery = self.discover()?;

        let mut report = RunReport {
            dry_run: !options.apply,
            candidates: discovery.candidates.len(),
            ..RunReport::default()
        };

        for (path, err) in discovery.errors {
            report.record(self.relative(&path), FileOutcome::Errored(err.to_string()));
        }

        for path in &discovery.candidates {
            let outcome = match self.migrate_file(path, options, journal.as_deref_mut(), &mut report.stats) {
                Ok(true) => FileOutcome::Migrated,
                Ok(false) => FileOutcome::Skipped,
                Err(message) => FileOutcome::Errored(message),
            };
            debug!(path = %path.display(), ?outcome, "processed");
            report.record(self.relative(path), outcome);
        }

        Ok(report)
    }

    fn migrate_file(
        &self,
        path: &Path,
        options: MigrateOptions,
        journal: Option<&mut RunJournal>,
        stats: &mut DiffStats,
    ) -> std::result::Result<bool, String> {
        let original = self
            .tree
            .read_text(path)
            .map_err(|source| MigrateError::Read { path: path.to_path_buf(), source }.to_string())?;

        let rewrite = self.editor.rewrite(&original).map_err(|e| {
            if e.is_structural() {
                format!("{} (needs manual migration)", e)
            } else {
                e.to_string()
            }
        })?;

        if !rewrite.changed {
            return Ok(false);
        }

        let shown = self.relative(path);
        match options.format {
            OutputFormat::Diff => stats.add(&print_diff(&shown, &original, &rewrite.text)),
            OutputFormat::Summary => stats.add(&print_summary_diff(&shown, &original, &rewrite.text)),
            OutputFormat::Default => {}
        }

        if options.apply {
            let pending = match &journal {
                Some(journal) => Some(
                    journal
                        .backup(path, &original, &rewrite.text)
                        .map_err(|e| format!("{:#}", e))?,
                ),
                None => None,
            };
            self.tree
                .write_text(path, &rewrite.text)
                .map_err(|source| MigrateError::Write { path: path.to_path_buf(), source }.to_string())?;
            if let (Some(journal), Some(modification)) = (journal, pending) {
                journal.commit(modification);
            }
        }

        Ok(true)
    }

    fn relative(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.root)
            .ok()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| path.to_path_buf())
    }
}
