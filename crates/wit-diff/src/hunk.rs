//! Grouping edit scripts into hunks with surrounding context.

use bstr::BString;

use crate::lcs::{diff_edits, split_lines, EditOp};
use crate::{DiffLine, DiffLineKind};

/// A group of nearby changes with leading/trailing context lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    /// 1-based first old line covered (0 when the old side is empty).
    pub old_start: u32,
    pub old_count: u32,
    /// 1-based first new line covered (0 when the new side is empty).
    pub new_start: u32,
    pub new_count: u32,
    pub lines: Vec<DiffLine>,
}

/// Diff two buffers and group the changes into hunks.
///
/// Change runs separated by fewer than `2 * context_lines` unchanged lines
/// are merged into one hunk, keeping the run between them as inner context.
pub fn diff_hunks(old: &[u8], new: &[u8], context_lines: u32) -> Vec<Hunk> {
    let old_lines = split_lines(old);
    let new_lines = split_lines(new);
    let edits = diff_edits(&old_lines, &new_lines);
    let ctx = context_lines as usize;

    // Indices of non-equal runs within the edit script.
    let mut runs: Vec<(usize, usize)> = Vec::new();
    let mut i = 0;
    while i < edits.len() {
        if edits[i].op == EditOp::Equal {
            i += 1;
            continue;
        }
        let start = i;
        while i < edits.len() && edits[i].op != EditOp::Equal {
            i += 1;
        }
        runs.push((start, i));
    }
    if runs.is_empty() {
        return Vec::new();
    }

    // Merge runs whose equal gap is shorter than 2 * context.
    let mut merged: Vec<(usize, usize)> = Vec::new();
    let mut current = runs[0];
    for &(start, end) in &runs[1..] {
        if start - current.1 < 2 * ctx {
            current.1 = end;
        } else {
            merged.push(current);
            current = (start, end);
        }
    }
    merged.push(current);

    let mut hunks = Vec::with_capacity(merged.len());
    for (start, end) in merged {
        let lead = start.saturating_sub(ctx);
        let trail = (end + ctx).min(edits.len());

        let mut lines = Vec::with_capacity(trail - lead);
        let mut old_count = 0u32;
        let mut new_count = 0u32;
        for edit in &edits[lead..trail] {
            let line = match edit.op {
                EditOp::Equal => {
                    old_count += 1;
                    new_count += 1;
                    DiffLine {
                        kind: DiffLineKind::Context,
                        content: BString::from(old_lines[edit.old_index]),
                        old_line: Some(edit.old_index as u32 + 1),
                        new_line: Some(edit.new_index as u32 + 1),
                    }
                }
                EditOp::Delete => {
                    old_count += 1;
                    DiffLine {
                        kind: DiffLineKind::Remove,
                        content: BString::from(old_lines[edit.old_index]),
                        old_line: Some(edit.old_index as u32 + 1),
                        new_line: None,
                    }
                }
                EditOp::Insert => {
                    new_count += 1;
                    DiffLine {
                        kind: DiffLineKind::Add,
                        content: BString::from(new_lines[edit.new_index]),
                        old_line: None,
                        new_line: Some(edit.new_index as u32 + 1),
                    }
                }
            };
            lines.push(line);
        }

        let old_start = if old_count == 0 {
            0
        } else {
            edits[lead].old_index as u32 + 1
        };
        let new_start = if new_count == 0 {
            0
        } else {
            edits[lead].new_index as u32 + 1
        };

        hunks.push(Hunk {
            old_start,
            old_count,
            new_start,
            new_count,
            lines,
        });
    }
    hunks
}
