//! Longest-common-subsequence edit scripts.

/// An edit operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOp {
    /// Present in both sequences.
    Equal,
    /// Present only in the new sequence.
    Insert,
    /// Present only in the old sequence.
    Delete,
}

/// One step of the edit script, indexing into the line vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edit {
    pub op: EditOp,
    /// Index into old (meaningful for Equal and Delete).
    pub old_index: usize,
    /// Index into new (meaningful for Equal and Insert).
    pub new_index: usize,
}

/// Split into line tokens that keep their `\n`; the final line may be
/// unterminated. Empty input has no lines.
pub fn split_lines(data: &[u8]) -> Vec<&[u8]> {
    let mut lines = Vec::new();
    let mut start = 0;
    for (i, &b) in data.iter().enumerate() {
        if b == b'\n' {
            lines.push(&data[start..=i]);
            start = i + 1;
        }
    }
    if start < data.len() {
        lines.push(&data[start..]);
    }
    lines
}

/// Compute the LCS edit script between two line vectors.
///
/// Deterministic: when a delete and an insert are equally good, the delete
/// comes first, so the earliest old line is preferred.
pub fn diff_edits(old: &[&[u8]], new: &[&[u8]]) -> Vec<Edit> {
    let n = old.len();
    let m = new.len();

    // lcs[i][j] = LCS length of old[i..] and new[j..], flattened row-major.
    let width = m + 1;
    let mut table = vec![0u32; (n + 1) * width];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            table[i * width + j] = if old[i] == new[j] {
                table[(i + 1) * width + j + 1] + 1
            } else {
                table[(i + 1) * width + j].max(table[i * width + j + 1])
            };
        }
    }

    let mut edits = Vec::with_capacity(n.max(m));
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if old[i] == new[j] {
            edits.push(Edit {
                op: EditOp::Equal,
                old_index: i,
                new_index: j,
            });
            i += 1;
            j += 1;
        } else if table[(i + 1) * width + j] >= table[i * width + j + 1] {
            edits.push(Edit {
                op: EditOp::Delete,
                old_index: i,
                new_index: j,
            });
            i += 1;
        } else {
            edits.push(Edit {
                op: EditOp::Insert,
                old_index: i,
                new_index: j,
            });
            j += 1;
        }
    }
    while i < n {
        edits.push(Edit {
            op: EditOp::Delete,
            old_index: i,
            new_index: j,
        });
        i += 1;
    }
    while j < m {
        edits.push(Edit {
            op: EditOp::Insert,
            old_index: i,
            new_index: j,
        });
        j += 1;
    }
    edits
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script(old: &[u8], new: &[u8]) -> Vec<(EditOp, usize, usize)> {
        let old_lines = split_lines(old);
        let new_lines = split_lines(new);
        diff_edits(&old_lines, &new_lines)
            .into_iter()
            .map(|e| (e.op, e.old_index, e.new_index))
            .collect()
    }

    #[test]
    fn split_terminated_and_unterminated() {
        assert_eq!(split_lines(b"a\nb\n"), vec![&b"a\n"[..], b"b\n"]);
        assert_eq!(split_lines(b"a\nb"), vec![&b"a\n"[..], b"b"]);
        assert!(split_lines(b"").is_empty());
        assert_eq!(split_lines(b"\n"), vec![&b"\n"[..]]);
    }

    #[test]
    fn equal_sequences() {
        let s = script(b"a\nb\n", b"a\nb\n");
        assert_eq!(
            s,
            vec![(EditOp::Equal, 0, 0), (EditOp::Equal, 1, 1)]
        );
    }

    #[test]
    fn pure_insert_and_delete() {
        assert_eq!(
            script(b"", b"a\n"),
            vec![(EditOp::Insert, 0, 0)]
        );
        assert_eq!(
            script(b"a\n", b""),
            vec![(EditOp::Delete, 0, 0)]
        );
    }

    #[test]
    fn replacement_deletes_before_inserting() {
        let s = script(b"x\n", b"y\n");
        assert_eq!(
            s,
            vec![(EditOp::Delete, 0, 0), (EditOp::Insert, 1, 0)]
        );
    }

    #[test]
    fn common_middle_is_kept() {
        let s = script(b"a\nkeep\nb\n", b"c\nkeep\nd\n");
        let equals: Vec<_> = s
            .iter()
            .filter(|(op, _, _)| *op == EditOp::Equal)
            .collect();
        assert_eq!(equals.len(), 1);
        assert_eq!(equals[0].1, 1);
    }

    #[test]
    fn ambiguous_lcs_prefers_earliest_old_line() {
        // old: a b a; new: a — both the first and last "a" could match;
        // the earliest must win, so the script is Equal(0), Delete, Delete.
        let s = script(b"a\nb\na\n", b"a\n");
        assert_eq!(
            s,
            vec![
                (EditOp::Equal, 0, 0),
                (EditOp::Delete, 1, 1),
                (EditOp::Delete, 2, 1)
            ]
        );
    }

    #[test]
    fn determinism() {
        let old = b"one\ntwo\nthree\nfour\n";
        let new = b"zero\ntwo\nthree\nfive\n";
        assert_eq!(script(old, new), script(old, new));
    }
}
