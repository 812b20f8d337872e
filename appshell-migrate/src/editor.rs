use regex::Regex;
use tracing::debug;

use crate::config::MigrationSpec;
use crate::error::{MigrateError, Result};
use crate::operations::*;
use crate::surgical::{apply_edits, Edit};

const INDENT_STEP: &str = "  ";

/// A guard tag with its compiled opening-tag pattern.
struct Guard {
    name: String,
    opener: Regex,
    closer: String,
}

/// Pattern-based structural editor that swaps the retiring component for
/// the wrapper component in one file's text.
///
/// Patterns are compiled once in [`ShellEditor::new`]; [`ShellEditor::rewrite`]
/// is pure and can be called for any number of files.
pub struct ShellEditor {
    wrapper: String,
    new_import: String,
    retiring: ImportSignature,
    wrapper_import: Regex,
    retiring_statement: Regex,
    usage_line: Regex,
    guards: Vec<Guard>,
    return_open: Regex,
    function_close: Regex,
    wrapper_open: Regex,
    wrapper_close: String,
}

/// Opening tag `<Name>` or `<Name attr="x">`, never `<Name />`.
fn opening_tag_pattern(name: &str) -> String {
    format!(r"<{}(?:\s[^<>]*[^/<>])?\s*>", regex::escape(name))
}

impl ShellEditor {
    pub fn new(spec: &MigrationSpec) -> Result<Self> {
        spec.validate()?;

        let retiring = ImportSignature::retiring(spec);
        let wrapper_import = ImportSignature::replacement(spec).regex()?;

        let usage_line = Regex::new(&format!(
            r"(?m)^[ \t]*<{}\s*/>[ \t]*(?:\r?\n|\z)",
            regex::escape(&spec.old_component)
        ))?;

        let guards = spec
            .guards
            .iter()
            .map(|name| -> Result<Guard> {
                Ok(Guard {
                    name: name.clone(),
                    opener: Regex::new(&opening_tag_pattern(name))?,
                    closer: format!("</{}>", name),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            wrapper: spec.new_component.clone(),
            new_import: spec.new_import(),
            retiring_statement: retiring.statement_regex()?,
            retiring,
            wrapper_import,
            usage_line,
            guards,
            return_open: Regex::new(r"\breturn\s*\(\s*\n")?,
            function_close: Regex::new(r"\n[ \t]*\);[ \t]*\r?\n\}")?,
            wrapper_open: Regex::new(&opening_tag_pattern(&spec.new_component))?,
            wrapper_close: format!("</{}>", spec.new_component),
        })
    }

    /// Run the full migration over `text`.
    ///
    /// Files without the retiring import come back unchanged, which is what
    /// makes a second pass over migrated output a no-op. Structural failures
    /// are returned as errors so the caller never writes a half-wrapped file.
    pub fn rewrite(&self, text: &str) -> Result<Rewrite> {
        let Some((swapped, imports_replaced)) = self.swap_import(text)? else {
            return Ok(Rewrite::unchanged(text));
        };

        let (stripped, tags_removed) = self.remove_usage_tags(&swapped)?;

        let shape = self.detect_shape(&stripped);
        debug!(%shape, imports_replaced, tags_removed, "rewriting");
        let wrapped = self.insert_wrapper(&stripped, &shape)?;

        self.validate_balance(text, &wrapped)?;

        Ok(Rewrite {
            changed: wrapped != text,
            text: wrapped,
            shape: Some(shape),
            imports_replaced,
            tags_removed,
        })
    }

    /// Step 1: swap the retiring import for the wrapper import.
    ///
    /// The first occurrence becomes the canonical wrapper import (terminator
    /// normalised to `;`); further occurrences are dropped. If the wrapper is
    /// already imported, every retiring import is dropped instead. Returns
    /// `None` when the retiring import is absent.
    pub fn swap_import(&self, text: &str) -> Result<Option<(String, usize)>> {
        let matches: Vec<_> = self.retiring_statement.find_iter(text).collect();
        if matches.is_empty() {
            return Ok(None);
        }

        let already_imported = self.wrapper_import.is_match(text);
        if already_imported {
            debug!(wrapper = %self.wrapper, "wrapper already imported, dropping {}", self.retiring.identifier);
        }

        let edits = matches
            .iter()
            .enumerate()
            .map(|(idx, m)| {
                if idx == 0 && !already_imported {
                    Edit::new(m.start(), m.end(), self.new_import.clone())
                } else {
                    let (start, end) = own_line_extent(text, m.start(), m.end())
                        .unwrap_or((m.start(), m.end()));
                    Edit::delete(start, end)
                }
            })
            .collect();

        Ok(Some((apply_edits(text, edits)?, matches.len())))
    }

    /// Step 2: delete every self-closing usage tag that sits alone on its
    /// line, together with its indentation and line break. Inline usages are
    /// left alone.
    pub fn remove_usage_tags(&self, text: &str) -> Result<(String, usize)> {
        let edits: Vec<Edit> = self
            .usage_line
            .find_iter(text)
            .map(|m| Edit::delete(m.start(), m.end()))
            .collect();
        let count = edits.len();

        Ok((apply_edits(text, edits)?, count))
    }

    /// The first configured guard that appears as an opening tag with a
    /// closing tag somewhere after it decides the shape; otherwise the file
    /// is a bare return.
    pub fn detect_shape(&self, text: &str) -> WrapperShape {
        self.guards
            .iter()
            .find(|guard| self.guard_bounds(guard, text).is_some())
            .map(|guard| WrapperShape::Guarded(guard.name.clone()))
            .unwrap_or(WrapperShape::BareReturn)
    }

    /// Step 3: insert the wrapper for exactly one shape.
    pub fn insert_wrapper(&self, text: &str, shape: &WrapperShape) -> Result<String> {
        let edits = match shape {
            WrapperShape::Guarded(name) => {
                let guard = self
                    .guards
                    .iter()
                    .find(|g| &g.name == name)
                    .ok_or_else(|| MigrateError::Config(format!("unknown guard <{}>", name)))?;
                self.guarded_edits(guard, text)?
            }
            WrapperShape::BareReturn => self.bare_return_edits(text)?,
        };

        apply_edits(text, edits)
    }

    /// End of the first opening tag and start of the last closing tag.
    fn guard_bounds(&self, guard: &Guard, text: &str) -> Option<(usize, usize)> {
        let open = guard.opener.find(text)?;
        let close = text[open.end()..].rfind(&guard.closer)? + open.end();
        Some((open.end(), close))
    }

    // First opening tag gets the wrapper opening, last closing tag gets the
    // wrapper closing. Multiple independent guarded regions end up inside a
    // single wrapper.
    fn guarded_edits(&self, guard: &Guard, text: &str) -> Result<Vec<Edit>> {
        let (open_end, close_start) = self.guard_bounds(guard, text).ok_or_else(|| {
            MigrateError::NoRenderBlock {
                wrapper: self.wrapper.clone(),
            }
        })?;
        let eol = line_ending(text);

        let open_indent = line_indent(text, open_end);
        let open = Edit::insert(
            open_end,
            format!("{eol}{open_indent}{INDENT_STEP}<{}>", self.wrapper),
        );

        let close_line = line_start(text, close_start);
        let before_close = &text[close_line..close_start];
        let close = if before_close.chars().all(|c| c == ' ' || c == '\t') {
            Edit::insert(
                close_line,
                format!("{before_close}{INDENT_STEP}{}{eol}", self.wrapper_close),
            )
        } else {
            Edit::insert(close_start, self.wrapper_close.clone())
        };

        Ok(vec![open, close])
    }

    // The closing search only looks past the opening insertion point and
    // takes the first `);` line followed by a column-0 `}`.
    fn bare_return_edits(&self, text: &str) -> Result<Vec<Edit>> {
        let open_at = self
            .return_open
            .find(text)
            .ok_or_else(|| MigrateError::NoRenderBlock {
                wrapper: self.wrapper.clone(),
            })?
            .end();
        let eol = line_ending(text);
        let indent = line_indent(text, open_at);

        let close = self.function_close.find_at(text, open_at).ok_or_else(|| {
            MigrateError::UnclosedWrapper {
                line: text[..open_at].lines().count(),
            }
        })?;
        let mut close_at = close.start();
        if text[..close_at].ends_with('\r') {
            close_at -= 1;
        }

        Ok(vec![
            Edit::insert(open_at, format!("{indent}<{}>{eol}", self.wrapper)),
            Edit::insert(close_at, format!("{eol}{indent}{}", self.wrapper_close)),
        ])
    }

    /// Every wrapper opening tag the rewrite added must be matched by a
    /// closing tag it added.
    fn validate_balance(&self, before: &str, after: &str) -> Result<()> {
        let count = |text: &str| {
            (
                self.wrapper_open.find_iter(text).count(),
                text.matches(&self.wrapper_close).count(),
            )
        };
        let (open_before, close_before) = count(before);
        let (open_after, close_after) = count(after);
        let opened = open_after.saturating_sub(open_before);
        let closed = close_after.saturating_sub(close_before);

        if opened != closed {
            return Err(MigrateError::UnbalancedWrapper {
                wrapper: self.wrapper.clone(),
                opened,
                closed,
            });
        }
        Ok(())
    }
}

fn line_start(text: &str, pos: usize) -> usize {
    text[..pos].rfind('\n').map(|i| i + 1).unwrap_or(0)
}

/// Leading whitespace of the line containing `pos`.
fn line_indent(text: &str, pos: usize) -> &str {
    let start = line_start(text, pos);
    let rest = &text[start..];
    let len = rest
        .find(|c: char| c != ' ' && c != '\t')
        .unwrap_or(rest.len());
    &rest[..len]
}

fn line_ending(text: &str) -> &'static str {
    if text.contains("\r\n") {
        "\r\n"
    } else {
        "\n"
    }
}

/// If `start..end` is the only non-blank content on its line, the range of
/// the whole line including its line break.
fn own_line_extent(text: &str, start: usize, end: usize) -> Option<(usize, usize)> {
    let line = line_start(text, start);
    if !text[line..start].chars().all(|c| c == ' ' || c == '\t') {
        return None;
    }

    let rest = &text[end..];
    let trailing = rest
        .find(|c: char| c != ' ' && c != '\t')
        .unwrap_or(rest.len());
    let after = &rest[trailing..];
    let line_end = if after.starts_with("\r\n") {
        end + trailing + 2
    } else if after.starts_with('\n') {
        end + trailing + 1
    } else if after.is_empty() {
        text.len()
    } else {
        return None;
    };

    Some((line, line_end))
}
