//! Single-hunk diff between two snapshots of a document.
//!
//! The result describes the change as one contiguous replacement: the
//! longest common prefix and suffix are kept and everything between them is
//! replaced. LLM rewrites typically differ from their input in one region,
//! so this is enough to display and undo them.

use crate::patch::{Patch, Span};

/// Byte length of the longest common prefix, in whole characters.
fn common_prefix(a: &str, b: &str) -> usize {
    a.chars()
        .zip(b.chars())
        .take_while(|(x, y)| x == y)
        .map(|(c, _)| c.len_utf8())
        .sum()
}

/// Byte length of the longest common suffix, in whole characters.
fn common_suffix(a: &str, b: &str) -> usize {
    a.chars()
        .rev()
        .zip(b.chars().rev())
        .take_while(|(x, y)| x == y)
        .map(|(c, _)| c.len_utf8())
        .sum()
}

/// Compute the patch that turns `before` into `after`.
///
/// Returns an empty patch when the strings are equal, otherwise a patch
/// with exactly one op. The suffix is searched only past the common prefix
/// so the two never overlap.
///
/// ```
/// use text_patcher::{compute_patch, Span};
///
/// let patch = compute_patch("hello world", "hello brave world");
/// assert_eq!(patch.ops()[0].from, Span::new(6, 6));
/// assert_eq!(patch.ops()[0].to, "brave ");
/// ```
pub fn compute_patch(before: &str, after: &str) -> Patch {
    if before == after {
        return Patch::default();
    }

    let prefix = common_prefix(before, after);
    let suffix = common_suffix(&before[prefix..], &after[prefix..]);

    let from = Span::new(prefix, before.len() - suffix);
    let to = &after[prefix..after.len() - suffix];

    tracing::debug!(
        start = from.start,
        end = from.end,
        inserted = to.len(),
        "computed patch"
    );

    Patch::single(from, to)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::{apply_patch, invert_patch, ReplaceOp};

    #[test]
    fn test_identical_strings_give_empty_patch() {
        assert!(compute_patch("same", "same").is_empty());
        assert!(compute_patch("", "").is_empty());
    }

    #[test]
    fn test_insertion_is_zero_width() {
        let patch = compute_patch("hello world", "hello brave world");
        assert_eq!(patch.ops(), &[ReplaceOp::new(Span::new(6, 6), "brave ")]);
    }

    #[test]
    fn test_full_replacement() {
        let patch = compute_patch("old", "new value");
        assert_eq!(patch.len(), 1);
        assert_eq!(patch.ops()[0].from, Span::new(0, 3));
        assert_eq!(patch.ops()[0].to, "new value");
    }

    #[test]
    fn test_empty_before() {
        let patch = compute_patch("", "abc");
        assert_eq!(patch.ops(), &[ReplaceOp::new(Span::new(0, 0), "abc")]);
        assert_eq!(apply_patch("", &patch).unwrap(), "abc");
    }

    #[test]
    fn test_empty_after() {
        let patch = compute_patch("abc", "");
        assert_eq!(patch.ops(), &[ReplaceOp::new(Span::new(0, 3), "")]);
        assert_eq!(apply_patch("abc", &patch).unwrap(), "");
    }

    #[test]
    fn test_deletion_in_middle() {
        let patch = compute_patch("keep this not that", "keep that");
        assert_eq!(patch.ops()[0].from, Span::new(7, 16));
        assert_eq!(patch.ops()[0].to, "");
    }

    #[test]
    fn test_prefix_and_suffix_do_not_overlap() {
        // Without the bound the suffix "aa" would reuse prefix characters.
        let patch = compute_patch("aa", "aaa");
        assert_eq!(patch.ops(), &[ReplaceOp::new(Span::empty(2), "a")]);
        assert_eq!(apply_patch("aa", &patch).unwrap(), "aaa");
    }

    #[test]
    fn test_unicode_and_crlf_preserved() {
        let before = "Hello\r\n🌍 world";
        let after = "Hello\r\n🌍 brave world";
        let patch = compute_patch(before, after);

        assert_eq!(patch.ops()[0].to, "brave ");
        assert_eq!(apply_patch(before, &patch).unwrap(), after);
    }

    #[test]
    fn test_glyphs_sharing_leading_bytes_are_not_split() {
        // U+1F30D and U+1F30E share their first three UTF-8 bytes.
        let patch = compute_patch("a🌍b", "a🌎b");
        assert_eq!(patch.ops(), &[ReplaceOp::new(Span::new(1, 5), "🌎")]);
    }

    #[test]
    fn test_combining_marks() {
        let before = "cafe\u{301} noir";
        let after = "cafe\u{300} noir";
        let patch = compute_patch(before, after);
        assert_eq!(apply_patch(before, &patch).unwrap(), after);
    }

    #[test]
    fn test_inverse_restores_before() {
        let before = "The quick brown fox";
        let after = "The slow brown fox";
        let patch = compute_patch(before, after);
        let inverse = invert_patch(before, &patch).unwrap();

        let patched = apply_patch(before, &patch).unwrap();
        assert_eq!(apply_patch(&patched, &inverse).unwrap(), before);
    }
}
