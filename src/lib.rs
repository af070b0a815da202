//! Text Patcher: minimal text patches for reviewing and undoing rewrites
//!
//! A patch engine built on whole-document replacement ranges. It describes
//! how one snapshot of a document became another (typically the text before
//! an LLM rewrite and the rewrite's output), applies that description, and
//! inverts it for undo.
//!
//! # Architecture
//!
//! Every patch is an ordered list of [`ReplaceOp`]s, each a half-open byte
//! [`Span`] of the source plus replacement text. Four operations work on it:
//!
//! - [`compute_patch`] finds the single contiguous region that changed.
//! - [`apply_patch`] applies ordered, non-overlapping ops, all or nothing.
//! - [`invert_patch`] builds the patch that undoes a forward patch.
//! - [`safe_apply`] never fails, degrading to op-by-op application when the
//!   document has drifted.
//!
//! Around the engine sit offset re-encoding for UTF-16 editors
//! ([`offsets`]), an on-disk patch document format ([`config`]), verified
//! atomic file application ([`edit`]) and a snapshot history ([`history`]).
//!
//! # Example
//!
//! ```
//! use text_patcher::{apply_patch, compute_patch, invert_patch};
//!
//! let before = "hello world";
//! let after = "hello brave world";
//!
//! let patch = compute_patch(before, after);
//! let patched = apply_patch(before, &patch)?;
//! assert_eq!(patched, after);
//!
//! let undo = invert_patch(before, &patch)?;
//! assert_eq!(apply_patch(&patched, &undo)?, before);
//! # Ok::<(), text_patcher::PatchError>(())
//! ```

pub mod config;
pub mod diff;
pub mod edit;
pub mod history;
pub mod offsets;
pub mod patch;

// Re-exports
pub use config::{
    load_from_path, load_from_str, ConfigError, DocumentFormat, PatchDocument, ValidationError,
    Verify,
};
pub use diff::compute_patch;
pub use edit::{ApplyMode, EditError, EditResult, EditVerification, FileEdit};
pub use history::History;
pub use offsets::Encoding;
pub use patch::{
    apply_patch, invert_patch, safe_apply, OpKind, Patch, PatchError, ReplaceOp, Span,
};
