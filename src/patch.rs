use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Half-open range `[start, end)` of byte offsets into a source string.
///
/// Serialized as a two-element array `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[usize; 2]", into = "[usize; 2]")]
pub struct Span {
    /// Starting offset (inclusive)
    pub start: usize,
    /// Ending offset (exclusive)
    pub end: usize,
}

impl Span {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Zero-width span at `offset`, used for pure insertions.
    pub const fn empty(offset: usize) -> Self {
        Self {
            start: offset,
            end: offset,
        }
    }

    /// Number of offsets covered. Zero for inverted spans.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

impl From<[usize; 2]> for Span {
    fn from([start, end]: [usize; 2]) -> Self {
        Self { start, end }
    }
}

impl From<Span> for [usize; 2] {
    fn from(span: Span) -> Self {
        [span.start, span.end]
    }
}

/// Operation tag. `replace` is the only kind of patch operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    #[default]
    Replace,
}

/// A single edit: replace `from` in the source with `to`.
///
/// An empty `to` deletes the span; an empty span inserts `to` at its start.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReplaceOp {
    #[serde(default)]
    pub op: OpKind,
    pub from: Span,
    pub to: String,
}

impl ReplaceOp {
    pub fn new(from: Span, to: impl Into<String>) -> Self {
        Self {
            op: OpKind::Replace,
            from,
            to: to.into(),
        }
    }

    /// Change in document length caused by this op.
    fn length_delta(&self) -> isize {
        self.to.len() as isize - self.from.len() as isize
    }
}

/// Ordered, non-overlapping sequence of [`ReplaceOp`]s.
///
/// All spans refer to the same source string, the one the patch is
/// applied to. An empty patch means "no change".
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[must_use = "a Patch does nothing until it is applied"]
pub struct Patch {
    ops: Vec<ReplaceOp>,
}

impl Patch {
    pub fn new(ops: Vec<ReplaceOp>) -> Self {
        Self { ops }
    }

    /// Patch consisting of one replacement.
    pub fn single(from: Span, to: impl Into<String>) -> Self {
        Self {
            ops: vec![ReplaceOp::new(from, to)],
        }
    }

    pub fn ops(&self) -> &[ReplaceOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<ReplaceOp> {
        self.ops
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ReplaceOp> {
        self.ops.iter()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Apply strictly. See [`apply_patch`].
    pub fn apply(&self, source: &str) -> Result<String, PatchError> {
        apply_patch(source, self)
    }

    /// Patch that undoes `self` once applied to `original`. See [`invert_patch`].
    pub fn invert(&self, original: &str) -> Result<Patch, PatchError> {
        invert_patch(original, self)
    }
}

impl From<Vec<ReplaceOp>> for Patch {
    fn from(ops: Vec<ReplaceOp>) -> Self {
        Self { ops }
    }
}

impl FromIterator<ReplaceOp> for Patch {
    fn from_iter<I: IntoIterator<Item = ReplaceOp>>(iter: I) -> Self {
        Self {
            ops: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Patch {
    type Item = ReplaceOp;
    type IntoIter = std::vec::IntoIter<ReplaceOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.into_iter()
    }
}

impl<'a> IntoIterator for &'a Patch {
    type Item = &'a ReplaceOp;
    type IntoIter = std::slice::Iter<'a, ReplaceOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.iter()
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatchError {
    #[error("Overlapping patch ops: op {index} starts at {start} before previous op ends at {last_end}")]
    Overlapping {
        index: usize,
        start: usize,
        last_end: usize,
    },

    #[error("Invalid range in op {index}: [{start}, {end})")]
    InvalidRange {
        index: usize,
        start: usize,
        end: usize,
    },

    #[error("Range of op {index} ends at {end}, past end of text of length {len}")]
    OutOfBounds { index: usize, end: usize, len: usize },

    #[error("Offset {offset} does not fall on a character boundary")]
    NotCharBoundary { offset: usize },

    #[error("Offset {offset} is past end of text of length {len}")]
    Offset { offset: usize, len: usize },
}

/// Check every op of `ops` against `source` before anything is built.
fn validate(source: &str, ops: &[ReplaceOp]) -> Result<(), PatchError> {
    let mut last_end = 0;

    for (index, op) in ops.iter().enumerate() {
        let Span { start, end } = op.from;

        if start < last_end {
            return Err(PatchError::Overlapping {
                index,
                start,
                last_end,
            });
        }
        if start > end {
            return Err(PatchError::InvalidRange { index, start, end });
        }
        if end > source.len() {
            return Err(PatchError::OutOfBounds {
                index,
                end,
                len: source.len(),
            });
        }
        for offset in [start, end] {
            if !source.is_char_boundary(offset) {
                return Err(PatchError::NotCharBoundary { offset });
            }
        }

        last_end = end;
    }

    Ok(())
}

fn apply_ops(source: &str, ops: &[ReplaceOp]) -> Result<String, PatchError> {
    validate(source, ops)?;

    if ops.is_empty() {
        return Ok(source.to_string());
    }

    let capacity = ops
        .iter()
        .fold(source.len() as isize, |len, op| len + op.length_delta());
    let mut result = String::with_capacity(capacity.max(0) as usize);
    let mut cursor = 0;

    for op in ops {
        result.push_str(&source[cursor..op.from.start]);
        result.push_str(&op.to);
        cursor = op.from.end;
    }
    result.push_str(&source[cursor..]);

    Ok(result)
}

/// Apply an ordered patch to `source`.
///
/// Ops must already be in ascending order; they are not sorted. The whole
/// patch is validated first, so either every op is applied or an error is
/// returned and nothing is produced.
pub fn apply_patch(source: &str, patch: &Patch) -> Result<String, PatchError> {
    let result = apply_ops(source, patch.ops())?;
    tracing::debug!(
        ops = patch.len(),
        before = source.len(),
        after = result.len(),
        "applied patch"
    );
    Ok(result)
}

/// Build the patch that turns `apply_patch(original, patch)` back into
/// `original`.
///
/// Each inverse op removes the forward replacement and restores the text
/// it replaced. Spans are shifted by the length change of every earlier op
/// so multi-op patches invert correctly.
pub fn invert_patch(original: &str, patch: &Patch) -> Result<Patch, PatchError> {
    validate(original, patch.ops())?;

    let mut shift: isize = 0;
    let ops = patch
        .iter()
        .map(|op| {
            let start = (op.from.start as isize + shift) as usize;
            shift += op.length_delta();
            ReplaceOp::new(
                Span::new(start, start + op.to.len()),
                &original[op.from.start..op.from.end],
            )
        })
        .collect();

    Ok(Patch::new(ops))
}

/// Apply `patch`, degrading to best-effort application instead of failing.
///
/// When the patch no longer validates against `source` (typically because
/// the document drifted since the patch was computed), each op is applied
/// on its own, in order, to the result of the previous one. Ops that
/// cannot be applied even alone are skipped.
pub fn safe_apply(source: &str, patch: &Patch) -> String {
    match apply_patch(source, patch) {
        Ok(result) => result,
        Err(err) => {
            tracing::warn!(error = %err, "patch does not apply cleanly, applying ops one at a time");

            let mut result = source.to_string();
            for (index, op) in patch.iter().enumerate() {
                match apply_ops(&result, std::slice::from_ref(op)) {
                    Ok(next) => result = next,
                    Err(err) => {
                        tracing::warn!(index, error = %err, "skipping op that cannot be applied");
                    }
                }
            }
            result
        }
    }
}
