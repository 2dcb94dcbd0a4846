//! Re-applying a full-file edit script as a patch.

use crate::lcs::split_lines;
use crate::{DiffError, DiffLine, DiffLineKind};

/// Apply a full-file diff (as produced by [`crate::diff_lines`]) to `old`,
/// reconstructing the new content.
///
/// Context and removed lines are verified against `old`; any mismatch
/// refuses the patch rather than guessing.
pub fn apply_patch(old: &[u8], lines: &[DiffLine]) -> Result<Vec<u8>, DiffError> {
    let old_lines = split_lines(old);
    let mut out = Vec::with_capacity(old.len());
    let mut old_pos = 0usize;

    for line in lines {
        match line.kind {
            DiffLineKind::Context => {
                let actual = old_lines.get(old_pos).ok_or_else(|| {
                    DiffError::PatchMismatch {
                        line: old_pos + 1,
                        reason: "context line past end of input".into(),
                    }
                })?;
                if *actual != line.content.as_slice() {
                    return Err(DiffError::PatchMismatch {
                        line: old_pos + 1,
                        reason: "context line does not match".into(),
                    });
                }
                out.extend_from_slice(actual);
                old_pos += 1;
            }
            DiffLineKind::Remove => {
                let actual = old_lines.get(old_pos).ok_or_else(|| {
                    DiffError::PatchMismatch {
                        line: old_pos + 1,
                        reason: "removed line past end of input".into(),
                    }
                })?;
                if *actual != line.content.as_slice() {
                    return Err(DiffError::PatchMismatch {
                        line: old_pos + 1,
                        reason: "removed line does not match".into(),
                    });
                }
                old_pos += 1;
            }
            DiffLineKind::Add => {
                out.extend_from_slice(&line.content);
            }
        }
    }

    if old_pos != old_lines.len() {
        return Err(DiffError::PatchMismatch {
            line: old_pos + 1,
            reason: "input has lines the patch does not cover".into(),
        });
    }

    Ok(out)
}
