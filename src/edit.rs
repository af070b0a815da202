use crate::diff::compute_patch;
use crate::patch::{apply_patch, safe_apply, Patch, PatchError};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

/// Applies a [`Patch`] to a file on disk, after checking the file still
/// holds the text the patch was computed against.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "FileEdit does nothing until apply() is called"]
pub struct FileEdit {
    /// Path to the file to patch
    pub file: PathBuf,
    /// Byte-offset patch against the expected base text
    pub patch: Patch,
    /// What the file must contain before the patch applies cleanly
    pub expected_before: Option<EditVerification>,
}

/// Verification strategy for the base text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditVerification {
    /// Exact text match required
    ExactMatch(String),
    /// xxh3 hash of expected text (faster for large documents)
    Hash(u64),
}

impl EditVerification {
    /// Check if the provided text matches the verification criteria.
    pub fn matches(&self, text: &str) -> bool {
        match self {
            EditVerification::ExactMatch(expected) => text == expected,
            EditVerification::Hash(expected_hash) => xxh3_64(text.as_bytes()) == *expected_hash,
        }
    }

    /// Create verification from text, using hash for text over 1KB.
    pub fn from_text(text: &str) -> Self {
        if text.len() > 1024 {
            EditVerification::Hash(xxh3_64(text.as_bytes()))
        } else {
            EditVerification::ExactMatch(text.to_string())
        }
    }

    /// Fail with [`EditError::BeforeTextMismatch`] unless `content` matches.
    pub fn ensure_matches(&self, file: &Path, content: &str) -> Result<(), EditError> {
        if self.matches(content) {
            return Ok(());
        }
        Err(EditError::BeforeTextMismatch {
            file: file.to_path_buf(),
            expected: self.hash(),
            found: xxh3_64(content.as_bytes()),
        })
    }

    /// Get hash value regardless of variant.
    pub fn hash(&self) -> u64 {
        match self {
            EditVerification::Hash(h) => *h,
            EditVerification::ExactMatch(text) => xxh3_64(text.as_bytes()),
        }
    }
}

/// How to react when the patch does not fit the current file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ApplyMode {
    /// Fail on verification mismatch or invalid ranges
    #[default]
    Strict,
    /// Log drift and apply best effort via [`safe_apply`]
    Safe,
}

#[derive(Error, Debug)]
pub enum EditError {
    #[error("Base text verification failed for {file} (expected hash {expected:#018x}, found {found:#018x})")]
    BeforeTextMismatch {
        file: PathBuf,
        expected: u64,
        found: u64,
    },

    #[error("Patch does not apply to {file}: {source}")]
    Patch {
        file: PathBuf,
        #[source]
        source: PatchError,
    },

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of applying a patch to a file.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "EditResult should be checked for applied/unchanged"]
pub enum EditResult {
    /// File contents were replaced
    Applied { file: PathBuf, bytes_changed: usize },
    /// The patch produced the text already in the file
    Unchanged { file: PathBuf },
}

impl FileEdit {
    /// Create an edit that verifies the file against `expected_before`.
    pub fn new(file: impl Into<PathBuf>, patch: Patch, expected_before: &str) -> Self {
        Self {
            file: file.into(),
            patch,
            expected_before: Some(EditVerification::from_text(expected_before)),
        }
    }

    /// Create an edit with explicit (or no) verification.
    pub fn with_verification(
        file: impl Into<PathBuf>,
        patch: Patch,
        verification: Option<EditVerification>,
    ) -> Self {
        Self {
            file: file.into(),
            patch,
            expected_before: verification,
        }
    }

    /// Check the file contents against the expected base text.
    fn verify(&self, content: &str, mode: ApplyMode) -> Result<(), EditError> {
        let Some(expected) = &self.expected_before else {
            return Ok(());
        };

        match (expected.ensure_matches(&self.file, content), mode) {
            (Ok(()), _) => Ok(()),
            (Err(err), ApplyMode::Strict) => Err(err),
            (Err(_), ApplyMode::Safe) => {
                tracing::warn!(
                    file = %self.file.display(),
                    expected = %format!("{:#018x}", expected.hash()),
                    found = %format!("{:#018x}", xxh3_64(content.as_bytes())),
                    "base text drifted, applying patch best effort"
                );
                Ok(())
            }
        }
    }

    /// Patched text for `content`, without touching the file.
    pub fn patched_text(&self, content: &str, mode: ApplyMode) -> Result<String, EditError> {
        self.verify(content, mode)?;
        match mode {
            ApplyMode::Strict => {
                apply_patch(content, &self.patch).map_err(|source| EditError::Patch {
                    file: self.file.clone(),
                    source,
                })
            }
            ApplyMode::Safe => Ok(safe_apply(content, &self.patch)),
        }
    }

    /// Read the file and return the patched text without writing it.
    pub fn preview(&self, mode: ApplyMode) -> Result<String, EditError> {
        let content = fs::read_to_string(&self.file)?;
        self.patched_text(&content, mode)
    }

    /// Apply this patch to the file system atomically.
    ///
    /// Uses tempfile + fsync + rename for crash safety.
    pub fn apply(&self, mode: ApplyMode) -> Result<EditResult, EditError> {
        let original = fs::read_to_string(&self.file)?;
        let patched = self.patched_text(&original, mode)?;

        if patched == original {
            return Ok(EditResult::Unchanged {
                file: self.file.clone(),
            });
        }

        atomic_write(&self.file, patched.as_bytes())?;

        let bytes_changed: usize = compute_patch(&original, &patched)
            .iter()
            .map(|op| op.to.len().max(op.from.len()))
            .sum();
        tracing::debug!(file = %self.file.display(), bytes_changed, "patched file");

        Ok(EditResult::Applied {
            file: self.file.clone(),
            bytes_changed,
        })
    }
}

/// Write `content` to `path` through a synced temp file in the same directory.
///
/// Readers see the old contents or the new ones, never a partial write.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<(), EditError> {
    // rename only stays atomic within one filesystem
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        Some(_) => Path::new("."),
        None => {
            return Err(EditError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Path has no parent directory",
            )))
        }
    };

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;

    Ok(())
}
