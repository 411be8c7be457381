// Edit-script construction.
//
// Greedy left-to-right pass over one new-sequence window: at each
// position ask the matcher for the longest old match; take it if one
// exists, otherwise the byte joins the pending literal run.  The
// resulting ops cover the window exactly, with no gaps or overlaps.

use crate::error::Result;
use crate::matcher::Matcher;
use crate::source::OldData;

/// One instruction of an edit script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOp {
    /// Copy `len` bytes from absolute old offset `old_pos`.
    Copy { old_pos: u64, len: usize },
    /// Emit the next `len` bytes of the literal pool.
    Insert { len: usize },
}

impl EditOp {
    /// Bytes of output this op produces.
    pub fn out_len(&self) -> usize {
        match *self {
            EditOp::Copy { len, .. } | EditOp::Insert { len } => len,
        }
    }
}

/// Edit script for one window: ops plus the literal pool the Insert
/// ops consume in order.
#[derive(Debug, Default)]
pub struct EditScript {
    pub ops: Vec<EditOp>,
    pub literals: Vec<u8>,
}

impl EditScript {
    /// Total output length the script produces.
    pub fn out_len(&self) -> usize {
        self.ops.iter().map(EditOp::out_len).sum()
    }

    /// Total bytes copied from old.
    pub fn copied_len(&self) -> usize {
        self.ops
            .iter()
            .map(|op| match *op {
                EditOp::Copy { len, .. } => len,
                EditOp::Insert { .. } => 0,
            })
            .sum()
    }
}

/// Greedy script builder.  One instance spans all windows of a diff so
/// the locality reference (end of the last copy) carries across window
/// boundaries.
#[derive(Debug)]
pub struct ScriptBuilder {
    prev_copy_end: u64,
}

impl ScriptBuilder {
    pub fn new() -> Self {
        Self { prev_copy_end: 0 }
    }

    /// Offset just past the last emitted copy's source range.
    pub fn prev_copy_end(&self) -> u64 {
        self.prev_copy_end
    }

    /// Build the edit script for one window of new data.
    pub fn build<O: OldData>(
        &mut self,
        matcher: &mut Matcher,
        old: &mut O,
        window: &[u8],
    ) -> Result<EditScript> {
        let mut script = EditScript::default();
        let mut pos = 0usize;
        let mut lit_start = 0usize;

        while pos < window.len() {
            match matcher.find(old, window, pos, self.prev_copy_end)? {
                Some(m) => {
                    if lit_start < pos {
                        script.literals.extend_from_slice(&window[lit_start..pos]);
                        script.ops.push(EditOp::Insert {
                            len: pos - lit_start,
                        });
                    }
                    push_copy(&mut script.ops, m.old_pos, m.len);
                    self.prev_copy_end = m.old_pos + m.len as u64;
                    pos += m.len;
                    lit_start = pos;
                }
                None => pos += 1,
            }
        }

        if lit_start < window.len() {
            script.literals.extend_from_slice(&window[lit_start..]);
            script.ops.push(EditOp::Insert {
                len: window.len() - lit_start,
            });
        }

        debug_assert_eq!(script.out_len(), window.len());
        Ok(script)
    }
}

impl Default for ScriptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Append a copy, merging with a directly preceding contiguous copy.
fn push_copy(ops: &mut Vec<EditOp>, old_pos: u64, len: usize) {
    if let Some(EditOp::Copy {
        old_pos: prev_pos,
        len: prev_len,
    }) = ops.last_mut()
    {
        if *prev_pos + *prev_len as u64 == old_pos {
            *prev_len += len;
            return;
        }
    }
    ops.push(EditOp::Copy { old_pos, len });
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
