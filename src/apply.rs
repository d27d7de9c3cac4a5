//! Anchor-verified application of parsed changes to a line sequence.
//!
//! Changes are applied in descending line order (last change first) so that
//! earlier changes always see the line numbers they were computed against:
//! a splice only shifts lines below itself, never above.

use crate::change::{Anchor, AnchorSide, Change, ChangeKind};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApplyError {
    /// The live text no longer matches what a change expects at one of its
    /// anchor lines.
    #[error("Original text mismatch at {side} line {line}.\nExpected {side}: {line}. {expected}\nFound    {side}: {line}. {found}\nContext:\n{context}")]
    AnchorMismatch {
        side: AnchorSide,
        /// 1-based line number after clamping into the live text
        line: usize,
        expected: String,
        found: String,
        /// Numbered window of surrounding live lines
        context: String,
    },
}

/// Resolve a change's anchors into clamped 0-based index bounds.
///
/// Line numbers are 1-based in descriptions; `0` behaves like `1`, and a
/// number past the end clamps to the last line. Both bounds resolve
/// independently, so `start > end` is representable (and deliberately
/// inert for `Remove`).
pub fn resolve_range(change: &Change, total_lines: usize) -> (usize, usize) {
    (
        clamp_line(change.from.line, total_lines),
        clamp_line(change.to.line, total_lines),
    )
}

fn clamp_line(line: usize, total_lines: usize) -> usize {
    line.saturating_sub(1).min(total_lines.saturating_sub(1))
}

/// Apply every change to the given line sequence.
///
/// Changes are sorted ascending by `from` line (stable, so changes sharing
/// a line keep their description order) and applied in reverse. Each change
/// re-verifies both of its anchors against the current text immediately
/// before its splice; the first mismatch aborts the whole application and
/// the caller gets only the error, never a partially patched sequence.
pub fn apply_changes(
    mut lines: Vec<String>,
    changes: &[Change],
) -> Result<Vec<String>, ApplyError> {
    let mut ordered: Vec<&Change> = changes.iter().collect();
    ordered.sort_by_key(|change| change.from.line);

    for change in ordered.into_iter().rev() {
        let (start, end) = resolve_range(change, lines.len());
        verify_anchor(&lines, start, AnchorSide::From, &change.from)?;
        verify_anchor(&lines, end, AnchorSide::To, &change.to)?;

        match change.kind {
            ChangeKind::Remove => {
                if start <= end {
                    lines.drain(start..=end);
                }
            }
            ChangeKind::InsertBetween => {
                // verified start is in bounds, so start + 1 <= lines.len()
                lines.splice(start + 1..start + 1, content_lines(change));
            }
            ChangeKind::Replace => {
                if start <= end {
                    lines.splice(start..=end, content_lines(change));
                } else {
                    lines.splice(start..start, content_lines(change));
                }
            }
        }
    }

    Ok(lines)
}

fn content_lines(change: &Change) -> impl Iterator<Item = String> + '_ {
    change
        .content
        .as_deref()
        .unwrap_or("")
        .split('\n')
        .map(String::from)
}

/// Check one anchor against the live text.
///
/// A line that does not exist cannot match: an index past the live text
/// (possible only once every line has been removed) reports as a mismatch
/// with empty found text.
fn verify_anchor(
    lines: &[String],
    index: usize,
    side: AnchorSide,
    anchor: &Anchor,
) -> Result<(), ApplyError> {
    let found = lines.get(index).map(|line| line.trim());
    if found == Some(anchor.text.as_str()) {
        return Ok(());
    }
    Err(ApplyError::AnchorMismatch {
        side,
        line: index + 1,
        expected: anchor.text.clone(),
        found: found.unwrap_or("").to_string(),
        context: context_window(lines, index),
    })
}

/// Up to five numbered lines around the mismatch (two either side, clamped
/// to the text bounds). Line numbers are absolute and 1-based.
fn context_window(lines: &[String], index: usize) -> String {
    let lo = index.saturating_sub(2);
    let hi = (index + 3).min(lines.len());
    lines[lo..hi]
        .iter()
        .enumerate()
        .map(|(offset, line)| format!("{}: {}", lo + offset + 1, line))
        .collect::<Vec<_>>()
        .join("\n")
}
