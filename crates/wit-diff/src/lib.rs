//! Line-level diffing and merging.
//!
//! The diff is a classic LCS edit script with deterministic tie-breaking
//! (ties consume the old side first, so the earliest old line wins). Line
//! tokens keep their `\n` terminator — a final unterminated line stays
//! unterminated through a diff/apply round trip.

mod apply;
mod hunk;
mod lcs;
mod merge3;

pub use apply::apply_patch;
pub use hunk::{diff_hunks, Hunk};
pub use lcs::{diff_edits, split_lines, Edit, EditOp};
pub use merge3::{merge3, ConflictRegion, FileConflict, MergeLabels, MergeResult};

use bstr::BString;

/// Default number of context lines around a hunk.
pub const DEFAULT_CONTEXT_LINES: u32 = 3;

/// How many leading bytes are sniffed for NUL to call content binary.
const BINARY_SNIFF_LEN: usize = 8000;

/// Errors from patch application.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    #[error("patch does not apply at old line {line}: {reason}")]
    PatchMismatch { line: usize, reason: String },
}

/// The role of one diff output line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffLineKind {
    Context,
    Add,
    Remove,
}

/// One line of diff output.
///
/// `content` includes the line terminator when the source line had one.
/// Line numbers are 1-based; `old_line` is absent for additions and
/// `new_line` for removals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffLine {
    pub kind: DiffLineKind,
    pub content: BString,
    pub old_line: Option<u32>,
    pub new_line: Option<u32>,
}

/// Compute the full-file line diff between two byte slices.
pub fn diff_lines(old: &[u8], new: &[u8]) -> Vec<DiffLine> {
    let old_lines = split_lines(old);
    let new_lines = split_lines(new);
    let edits = diff_edits(&old_lines, &new_lines);

    let mut out = Vec::with_capacity(edits.len());
    for edit in edits {
        let line = match edit.op {
            EditOp::Equal => DiffLine {
                kind: DiffLineKind::Context,
                content: BString::from(old_lines[edit.old_index]),
                old_line: Some(edit.old_index as u32 + 1),
                new_line: Some(edit.new_index as u32 + 1),
            },
            EditOp::Delete => DiffLine {
                kind: DiffLineKind::Remove,
                content: BString::from(old_lines[edit.old_index]),
                old_line: Some(edit.old_index as u32 + 1),
                new_line: None,
            },
            EditOp::Insert => DiffLine {
                kind: DiffLineKind::Add,
                content: BString::from(new_lines[edit.new_index]),
                old_line: None,
                new_line: Some(edit.new_index as u32 + 1),
            },
        };
        out.push(line);
    }
    out
}

/// Whether content should be treated as binary (NUL in the leading bytes).
pub fn is_binary(data: &[u8]) -> bool {
    data[..data.len().min(BINARY_SNIFF_LEN)].contains(&0)
}
