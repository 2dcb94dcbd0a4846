//! Three-way content merge with conflict regions and textual markers.

use bstr::BString;

use crate::lcs::{diff_edits, split_lines, Edit, EditOp};
use crate::DEFAULT_CONTEXT_LINES;

/// Labels rendered into conflict markers.
#[derive(Debug, Clone)]
pub struct MergeLabels<'a> {
    pub ours: &'a str,
    pub theirs: &'a str,
}

impl Default for MergeLabels<'_> {
    fn default() -> Self {
        Self {
            ours: "ours",
            theirs: "theirs",
        }
    }
}

/// One overlapping edit during a three-way merge.
///
/// `start_line`/`end_line` are 1-based inclusive base lines of the overlap;
/// for a pure insertion point `end_line` is `start_line - 1`. Region lines
/// are stored without terminators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictRegion {
    pub start_line: u32,
    pub end_line: u32,
    pub ours_lines: Vec<BString>,
    pub theirs_lines: Vec<BString>,
    pub context_before: Vec<BString>,
    pub context_after: Vec<BString>,
}

/// A conflicted path with both full sides and the overlapping regions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileConflict {
    pub path: BString,
    pub ours_content: Vec<u8>,
    pub theirs_content: Vec<u8>,
    pub regions: Vec<ConflictRegion>,
}

/// Outcome of a content merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeResult {
    /// Merged without conflicts.
    Clean(Vec<u8>),
    /// Merged with `<<<<<<<` markers in `content`.
    Conflicted {
        content: Vec<u8>,
        regions: Vec<ConflictRegion>,
    },
}

impl MergeResult {
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Clean(_))
    }

    pub fn content(&self) -> &[u8] {
        match self {
            Self::Clean(c) => c,
            Self::Conflicted { content, .. } => content,
        }
    }
}

/// Merge `ours` and `theirs` against their common `base`.
///
/// The trivial cases short-circuit: an unchanged side yields the other
/// side, and identical sides (including both-added-same) yield either.
/// Otherwise both edit scripts against the base are interleaved; edits
/// touching overlapping base spans conflict unless their replacement text
/// is identical.
pub fn merge3(base: &[u8], ours: &[u8], theirs: &[u8], labels: &MergeLabels<'_>) -> MergeResult {
    if ours == theirs {
        return MergeResult::Clean(ours.to_vec());
    }
    if base == ours {
        return MergeResult::Clean(theirs.to_vec());
    }
    if base == theirs {
        return MergeResult::Clean(ours.to_vec());
    }

    let base_lines = split_lines(base);
    let ours_lines = split_lines(ours);
    let theirs_lines = split_lines(theirs);

    let ours_regions = collect_change_regions(&diff_edits(&base_lines, &ours_lines));
    let theirs_regions = collect_change_regions(&diff_edits(&base_lines, &theirs_lines));

    merge_regions(
        &base_lines,
        &ours_lines,
        &theirs_lines,
        &ours_regions,
        &theirs_regions,
        labels,
    )
}

/// A contiguous edited span relative to the base (0-based lines).
#[derive(Debug, Clone, Copy)]
struct ChangeRegion {
    base_start: usize,
    base_len: usize,
    new_start: usize,
    new_len: usize,
}

fn collect_change_regions(edits: &[Edit]) -> Vec<ChangeRegion> {
    let mut regions = Vec::new();
    let mut i = 0;

    while i < edits.len() {
        if edits[i].op == EditOp::Equal {
            i += 1;
            continue;
        }

        let base_start = edits[i].old_index;
        let new_start = edits[i].new_index;
        let mut base_end = base_start;
        let mut new_end = new_start;

        while i < edits.len() && edits[i].op != EditOp::Equal {
            match edits[i].op {
                EditOp::Delete => base_end = edits[i].old_index + 1,
                EditOp::Insert => new_end = edits[i].new_index + 1,
                EditOp::Equal => unreachable!(),
            }
            i += 1;
        }

        regions.push(ChangeRegion {
            base_start,
            base_len: base_end - base_start,
            new_start,
            new_len: new_end - new_start,
        });
    }

    regions
}

fn merge_regions(
    base_lines: &[&[u8]],
    ours_lines: &[&[u8]],
    theirs_lines: &[&[u8]],
    ours_regions: &[ChangeRegion],
    theirs_regions: &[ChangeRegion],
    labels: &MergeLabels<'_>,
) -> MergeResult {
    let mut output: Vec<u8> = Vec::new();
    let mut conflicts: Vec<ConflictRegion> = Vec::new();

    let mut base_pos = 0;
    let mut oi = 0;
    let mut ti = 0;

    while oi < ours_regions.len() || ti < theirs_regions.len() {
        let o = ours_regions.get(oi);
        let t = theirs_regions.get(ti);

        match (o, t) {
            (Some(o), Some(t)) => {
                let o_end = o.base_start + o.base_len;
                let t_end = t.base_start + t.base_len;
                let ours_first =
                    o_end < t.base_start || (o_end == t.base_start && o.base_start < t.base_start);
                let theirs_first =
                    t_end < o.base_start || (t_end == o.base_start && t.base_start < o.base_start);

                if ours_first {
                    emit_span(&mut output, base_lines, base_pos, o.base_start);
                    emit_span(&mut output, ours_lines, o.new_start, o.new_start + o.new_len);
                    base_pos = o_end;
                    oi += 1;
                } else if theirs_first {
                    emit_span(&mut output, base_lines, base_pos, t.base_start);
                    emit_span(&mut output, theirs_lines, t.new_start, t.new_start + t.new_len);
                    base_pos = t_end;
                    ti += 1;
                } else {
                    // Overlapping edits.
                    let overlap_start = o.base_start.min(t.base_start);
                    let overlap_end = o_end.max(t_end);

                    emit_span(&mut output, base_lines, base_pos, overlap_start);

                    let ours_text = join_span(ours_lines, o.new_start, o.new_start + o.new_len);
                    let theirs_text =
                        join_span(theirs_lines, t.new_start, t.new_start + t.new_len);

                    if ours_text == theirs_text {
                        output.extend_from_slice(&ours_text);
                    } else {
                        conflicts.push(build_region(
                            base_lines,
                            ours_lines,
                            theirs_lines,
                            o,
                            t,
                            overlap_start,
                            overlap_end,
                        ));
                        emit_conflict(&mut output, &ours_text, &theirs_text, labels);
                    }

                    base_pos = overlap_end;
                    oi += 1;
                    ti += 1;
                }
            }
            (Some(o), None) => {
                let o_end = o.base_start + o.base_len;
                emit_span(&mut output, base_lines, base_pos, o.base_start);
                emit_span(&mut output, ours_lines, o.new_start, o.new_start + o.new_len);
                base_pos = o_end;
                oi += 1;
            }
            (None, Some(t)) => {
                let t_end = t.base_start + t.base_len;
                emit_span(&mut output, base_lines, base_pos, t.base_start);
                emit_span(&mut output, theirs_lines, t.new_start, t.new_start + t.new_len);
                base_pos = t_end;
                ti += 1;
            }
            (None, None) => unreachable!(),
        }
    }

    emit_span(&mut output, base_lines, base_pos, base_lines.len());

    if conflicts.is_empty() {
        MergeResult::Clean(output)
    } else {
        MergeResult::Conflicted {
            content: output,
            regions: conflicts,
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn build_region(
    base_lines: &[&[u8]],
    ours_lines: &[&[u8]],
    theirs_lines: &[&[u8]],
    o: &ChangeRegion,
    t: &ChangeRegion,
    overlap_start: usize,
    overlap_end: usize,
) -> ConflictRegion {
    let ctx = DEFAULT_CONTEXT_LINES as usize;
    let before_start = overlap_start.saturating_sub(ctx);
    let after_end = (overlap_end + ctx).min(base_lines.len());

    ConflictRegion {
        start_line: overlap_start as u32 + 1,
        end_line: overlap_end as u32,
        ours_lines: strip_span(ours_lines, o.new_start, o.new_start + o.new_len),
        theirs_lines: strip_span(theirs_lines, t.new_start, t.new_start + t.new_len),
        context_before: strip_span(base_lines, before_start, overlap_start),
        context_after: strip_span(base_lines, overlap_end, after_end),
    }
}

/// Append lines `[from, to)` verbatim (terminators included).
fn emit_span(output: &mut Vec<u8>, lines: &[&[u8]], from: usize, to: usize) {
    for line in lines.iter().take(to).skip(from) {
        output.extend_from_slice(line);
    }
}

/// Collect lines `[from, to)` into one buffer.
fn join_span(lines: &[&[u8]], from: usize, to: usize) -> Vec<u8> {
    let mut buf = Vec::new();
    for line in lines.iter().take(to).skip(from) {
        buf.extend_from_slice(line);
    }
    buf
}

/// Collect lines `[from, to)` with terminators stripped.
fn strip_span(lines: &[&[u8]], from: usize, to: usize) -> Vec<BString> {
    lines
        .iter()
        .take(to)
        .skip(from)
        .map(|line| BString::from(line.strip_suffix(b"\n").unwrap_or(line)))
        .collect()
}

/// Close any unterminated text before a marker line.
fn ensure_newline(output: &mut Vec<u8>) {
    if !output.is_empty() && output.last() != Some(&b'\n') {
        output.push(b'\n');
    }
}

fn emit_conflict(
    output: &mut Vec<u8>,
    ours_text: &[u8],
    theirs_text: &[u8],
    labels: &MergeLabels<'_>,
) {
    ensure_newline(output);
    output.extend_from_slice(b"<<<<<<< ");
    output.extend_from_slice(labels.ours.as_bytes());
    output.push(b'\n');

    output.extend_from_slice(ours_text);
    ensure_newline(output);

    output.extend_from_slice(b"=======\n");

    output.extend_from_slice(theirs_text);
    ensure_newline(output);

    output.extend_from_slice(b">>>>>>> ");
    output.extend_from_slice(labels.theirs.as_bytes());
    output.push(b'\n');
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> MergeLabels<'static> {
        MergeLabels {
            ours: "HEAD",
            theirs: "feature",
        }
    }

    #[test]
    fn unchanged_everywhere() {
        let result = merge3(b"a\nb\n", b"a\nb\n", b"a\nb\n", &labels());
        assert_eq!(result, MergeResult::Clean(b"a\nb\n".to_vec()));
    }

    #[test]
    fn one_side_changed_wins() {
        let base = b"a\nb\n";
        let result = merge3(base, b"a\nB\n", base, &labels());
        assert_eq!(result.content(), b"a\nB\n");

        let result = merge3(base, base, b"a\nC\n", &labels());
        assert_eq!(result.content(), b"a\nC\n");
    }

    #[test]
    fn both_sides_identical_change() {
        let result = merge3(b"a\nb\n", b"a\nX\n", b"a\nX\n", &labels());
        assert!(result.is_clean());
        assert_eq!(result.content(), b"a\nX\n");
    }

    #[test]
    fn non_overlapping_changes_both_land() {
        let base = b"1\n2\n3\n4\n5\n";
        let ours = b"ONE\n2\n3\n4\n5\n";
        let theirs = b"1\n2\n3\n4\nFIVE\n";
        let result = merge3(base, ours, theirs, &labels());
        assert!(result.is_clean());
        assert_eq!(result.content(), b"ONE\n2\n3\n4\nFIVE\n");
    }

    #[test]
    fn overlapping_changes_conflict() {
        let base = b"1\n2\n3\n";
        let ours = b"1\nM\n3\n";
        let theirs = b"1\nF\n3\n";
        let result = merge3(base, ours, theirs, &labels());

        let MergeResult::Conflicted { content, regions } = result else {
            panic!("expected conflict");
        };
        assert_eq!(
            content,
            b"1\n<<<<<<< HEAD\nM\n=======\nF\n>>>>>>> feature\n3\n"
        );
        assert_eq!(regions.len(), 1);
        let region = &regions[0];
        assert_eq!(region.start_line, 2);
        assert_eq!(region.end_line, 2);
        assert_eq!(region.ours_lines, vec![BString::from("M")]);
        assert_eq!(region.theirs_lines, vec![BString::from("F")]);
        assert_eq!(region.context_before, vec![BString::from("1")]);
        assert_eq!(region.context_after, vec![BString::from("3")]);
    }

    #[test]
    fn both_added_different_from_nothing() {
        let result = merge3(b"", b"ours line\n", b"theirs line\n", &labels());
        assert!(!result.is_clean());
        let text = String::from_utf8_lossy(result.content()).to_string();
        assert!(text.contains("<<<<<<< HEAD"));
        assert!(text.contains("ours line"));
        assert!(text.contains("theirs line"));
    }

    #[test]
    fn deletion_against_edit_conflicts() {
        let base = b"keep\ntouchy\nend\n";
        let ours = b"keep\nend\n"; // deleted the line
        let theirs = b"keep\nedited\nend\n"; // edited it
        let result = merge3(base, ours, theirs, &labels());
        assert!(!result.is_clean());
    }

    #[test]
    fn adjacent_but_disjoint_edits_merge() {
        let base = b"1\n2\n3\n4\n5\n6\n7\n8\n";
        let ours = b"1\nTWO\n3\n4\n5\n6\n7\n8\n";
        let theirs = b"1\n2\n3\n4\n5\n6\nSEVEN\n8\n";
        let result = merge3(base, ours, theirs, &labels());
        assert!(result.is_clean());
        assert_eq!(result.content(), b"1\nTWO\n3\n4\n5\n6\nSEVEN\n8\n");
    }

    #[test]
    fn multiple_conflicts_report_multiple_regions() {
        let base = b"a\nx\nb\nc\nd\ne\nf\ny\ng\n";
        let ours = b"a\nX1\nb\nc\nd\ne\nf\nY1\ng\n";
        let theirs = b"a\nX2\nb\nc\nd\ne\nf\nY2\ng\n";
        let MergeResult::Conflicted { regions, .. } = merge3(base, ours, theirs, &labels())
        else {
            panic!("expected conflict");
        };
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].start_line, 2);
        assert_eq!(regions[1].start_line, 8);
    }

    #[test]
    fn unterminated_side_gets_closed_before_marker() {
        let base = b"line\n";
        let ours = b"ours"; // no trailing newline
        let theirs = b"theirs\n";
        let result = merge3(base, ours, theirs, &labels());
        let text = result.content();
        assert!(!result.is_clean());
        // Marker lines stay on their own lines.
        assert!(String::from_utf8_lossy(text).contains("ours\n======="));
    }
}
