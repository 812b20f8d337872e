/// Surgical edit module for making minimal, targeted changes to source text.
///
/// Every change the rewriter makes is expressed as an [`Edit`] against the
/// text it inspected, so all offsets refer to the same snapshot and nothing
/// outside the edited ranges moves or gets reformatted.

use std::cmp::Ordering;

use crate::error::{MigrateError, Result};

/// Replace `start..end` (byte offsets) with `new_text`. An empty range is an
/// insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub start: usize,
    pub end: usize,
    pub new_text: String,
}

impl Edit {
    pub fn new(start: usize, end: usize, new_text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            new_text: new_text.into(),
        }
    }

    pub fn insert(at: usize, new_text: impl Into<String>) -> Self {
        Self::new(at, at, new_text)
    }

    pub fn delete(start: usize, end: usize) -> Self {
        Self::new(start, end, String::new())
    }
}

impl Ord for Edit {
    fn cmp(&self, other: &Self) -> Ordering {
        self.start
            .cmp(&other.start)
            .then(self.end.cmp(&other.end))
    }
}

impl PartialOrd for Edit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Apply edits to `source`, preserving everything outside them.
///
/// Edits are sorted first. Two insertions at the same offset are kept in
/// the order given; any other overlap is an error.
///
/// # Example
/// ```
/// use appshell_migrate::surgical::{apply_edits, Edit};
///
/// let source = "<Guard>\n  <Page />\n</Guard>\n";
/// let edits = vec![
///     Edit::insert(7, "\n  <Shell>"),
///     Edit::insert(19, "  </Shell>\n"),
/// ];
///
/// let result = apply_edits(source, edits).unwrap();
/// assert_eq!(result, "<Guard>\n  <Shell>\n  <Page />\n  </Shell>\n</Guard>\n");
/// ```
pub fn apply_edits(source: &str, mut edits: Vec<Edit>) -> Result<String> {
    if edits.is_empty() {
        return Ok(source.to_string());
    }

    // Stable sort keeps same-offset insertions in caller order
    edits.sort();

    for pair in edits.windows(2) {
        let (prev, curr) = (&pair[0], &pair[1]);
        if prev.end > curr.start {
            return Err(MigrateError::OverlappingEdits {
                first: prev.start,
                second: curr.start,
            });
        }
    }

    let mut result = String::with_capacity(source.len());
    let mut cursor = 0usize;

    for edit in edits {
        let (Some(_), Some(_)) = (source.get(..edit.start), source.get(edit.end..)) else {
            return Err(MigrateError::OverlappingEdits {
                first: edit.start,
                second: edit.end,
            });
        };
        result.push_str(&source[cursor..edit.start]);
        result.push_str(&edit.new_text);
        cursor = edit.end;
    }

    result.push_str(&source[cursor..]);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_replacement() {
        let source = "import NavBar from 'x';\n";
        let edits = vec![Edit::new(7, 13, "AppShell")];

        let result = apply_edits(source, edits).unwrap();
        assert_eq!(result, "import AppShell from 'x';\n");
    }

    #[test]
    fn test_edits_out_of_order() {
        let source = "let a = 1; let b = 2;";
        let edits = vec![Edit::new(19, 20, "20"), Edit::new(8, 9, "10")];

        let result = apply_edits(source, edits).unwrap();
        assert_eq!(result, "let a = 10; let b = 20;");
    }

    #[test]
    fn test_delete_preserves_surroundings() {
        let source = "a\n  <NavBar />\nb\n";
        let edits = vec![Edit::delete(2, 15)];

        let result = apply_edits(source, edits).unwrap();
        assert_eq!(result, "a\nb\n");
    }

    #[test]
    fn test_no_edits() {
        let source = "export default function Page() {}\n";
        assert_eq!(apply_edits(source, vec![]).unwrap(), source);
    }

    #[test]
    fn test_same_offset_insertions_keep_order() {
        let source = "ab";
        let edits = vec![Edit::insert(1, "1"), Edit::insert(1, "2")];

        assert_eq!(apply_edits(source, edits).unwrap(), "a12b");
    }

    #[test]
    fn test_overlap_is_rejected() {
        let source = "abcdef";
        let edits = vec![Edit::new(0, 4, "x"), Edit::new(2, 5, "y")];

        assert!(matches!(
            apply_edits(source, edits),
            Err(MigrateError::OverlappingEdits { first: 0, second: 2 })
        ));
    }
}
