use similar::{ChangeTag, TextDiff};
use std::path::Path;

/// Represents statistics about a diff
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DiffStats {
    pub files_changed: usize,
    pub lines_added: usize,
    pub lines_removed: usize,
}

impl DiffStats {
    pub fn add(&mut self, other: &DiffStats) {
        self.files_changed += other.files_changed;
        self.lines_added += other.lines_added;
        self.lines_removed += other.lines_removed;
    }

    pub fn print_summary(&self) {
        println!("\nSummary:");
        println!("Files changed: {}", self.files_changed);
        println!("Lines added: {}", self.lines_added);
        println!("Lines removed: {}", self.lines_removed);
    }
}

fn count_changes(original: &str, modified: &str) -> DiffStats {
    let diff = TextDiff::from_lines(original, modified);
    let mut stats = DiffStats::default();

    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Insert => stats.lines_added += 1,
            ChangeTag::Delete => stats.lines_removed += 1,
            ChangeTag::Equal => {}
        }
    }

    if stats.lines_added > 0 || stats.lines_removed > 0 {
        stats.files_changed = 1;
    }
    stats
}

/// Generate a unified diff between original and modified content
///
/// Returns the unified diff string and statistics about the changes.
///
/// # Arguments
/// * `path` - The file path (used in diff headers)
/// * `original` - The original file content
/// * `modified` - The modified file content
/// * `context_lines` - Number of context lines to show
pub fn generate_unified_diff(
    path: &Path,
    original: &str,
    modified: &str,
    context_lines: usize,
) -> (String, DiffStats) {
    let diff = TextDiff::from_lines(original, modified);

    let mut output = String::new();
    let path_str = path.display().to_string();
    output.push_str(&format!("--- {}\n", path_str));
    output.push_str(&format!("+++ {}\n", path_str));

    let unified = diff
        .unified_diff()
        .context_radius(context_lines)
        .to_string();
    output.push_str(&unified);

    (output, count_changes(original, modified))
}

/// Print a unified diff to stdout and return its statistics.
pub fn print_diff(path: &Path, original: &str, modified: &str) -> DiffStats {
    let (diff_output, stats) = generate_unified_diff(path, original, modified, 3);

    if stats.files_changed > 0 {
        print!("{}", diff_output);
    }

    stats
}

/// Changed lines only, prefixed with `+`/`-` and their line number in the
/// side they belong to.
pub fn generate_summary_diff(path: &Path, original: &str, modified: &str) -> (String, DiffStats) {
    let diff = TextDiff::from_lines(original, modified);
    let mut output = format!("{}:\n", path.display());

    for change in diff.iter_all_changes() {
        let (sign, line) = match change.tag() {
            ChangeTag::Insert => ("+", change.new_index()),
            ChangeTag::Delete => ("-", change.old_index()),
            ChangeTag::Equal => continue,
        };
        let line = line.map(|i| i + 1).unwrap_or(0);
        output.push_str(&format!(
            "  {}{:>5}: {}\n",
            sign,
            line,
            change.value().trim_end_matches(['\r', '\n'])
        ));
    }

    (output, count_changes(original, modified))
}

pub fn print_summary_diff(path: &Path, original: &str, modified: &str) -> DiffStats {
    let (output, stats) = generate_summary_diff(path, original, modified);

    if stats.files_changed > 0 {
        print!("{}", output);
    }

    stats
}
