use crate::edit::EditVerification;
use crate::offsets::{text_len, to_byte_offset, Encoding};
use crate::patch::{apply_patch, Patch, PatchError, ReplaceOp};
use serde::{Deserialize, Serialize};
use std::fmt;
use toml_edit::{value, Array, ArrayOfTables, DocumentMut, Item, Table};
use xxhash_rust::xxh3::xxh3_64;

/// A patch stored on disk together with how to verify its base text.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct PatchDocument {
    #[serde(default)]
    pub meta: Metadata,
    #[serde(default)]
    pub ops: Vec<ReplaceOp>,
}

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Unit the op spans are counted in
    #[serde(default)]
    pub encoding: Encoding,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify: Option<Verify>,
    /// What the text looks like once the patch is applied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify_result: Option<Verify>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Verify {
    ExactMatch {
        expected_text: String,
    },
    Hash {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        algorithm: Option<HashAlgorithm>,
        expected: String,
    },
}

impl Verify {
    /// Hash verification of `text`.
    pub fn hash_of(text: &str) -> Self {
        Verify::Hash {
            algorithm: Some(HashAlgorithm::Xxh3),
            expected: format_hash(xxh3_64(text.as_bytes())),
        }
    }

    /// Convert to the verification used when applying edits.
    pub fn to_verification(&self) -> Result<EditVerification, String> {
        match self {
            Verify::ExactMatch { expected_text } => {
                Ok(EditVerification::ExactMatch(expected_text.clone()))
            }
            Verify::Hash { expected, .. } => parse_hash(expected).map(EditVerification::Hash),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum HashAlgorithm {
    Xxh3,
}

pub fn format_hash(hash: u64) -> String {
    format!("0x{hash:016x}")
}

pub fn parse_hash(expected: &str) -> Result<u64, String> {
    u64::from_str_radix(expected.trim_start_matches("0x"), 16)
        .map_err(|_| format!("invalid hash value: {expected}"))
}

impl PatchDocument {
    /// Build a document for `patch`, which applies to `source`.
    ///
    /// Spans are re-encoded into `encoding`. The document records hashes of
    /// `source` and of the patched text, so drift and an earlier application
    /// can both be told apart later.
    pub fn from_patch(
        name: impl Into<String>,
        source: &str,
        patch: &Patch,
        encoding: Encoding,
    ) -> Result<Self, PatchError> {
        let patched = apply_patch(source, patch)?;
        Ok(Self {
            meta: Metadata {
                name: name.into(),
                description: None,
                encoding,
                verify: Some(Verify::hash_of(source)),
                verify_result: Some(Verify::hash_of(&patched)),
            },
            ops: patch.encode(source, encoding)?.into_ops(),
        })
    }

    /// Ops as written in the document, still in `meta.encoding` units.
    pub fn raw_patch(&self) -> Patch {
        Patch::new(self.ops.clone())
    }

    /// Decode the ops into a byte-offset [`Patch`] against `source`.
    pub fn patch_for(&self, source: &str) -> Result<Patch, PatchError> {
        self.raw_patch().decode(source, self.meta.encoding)
    }

    /// Like [`patch_for`](Self::patch_for), but drops ops whose offsets no
    /// longer map onto `source` instead of failing.
    ///
    /// Ops in byte units are kept as-is; [`safe_apply`](crate::safe_apply)
    /// skips the ones that do not fit.
    pub fn patch_for_lossy(&self, source: &str) -> Patch {
        if self.meta.encoding == Encoding::Utf8 {
            return self.raw_patch();
        }

        self.ops
            .iter()
            .enumerate()
            .filter_map(|(index, op)| {
                let single = Patch::new(vec![op.clone()]);
                match single.decode(source, self.meta.encoding) {
                    Ok(decoded) => decoded.into_ops().pop(),
                    Err(err) => {
                        tracing::warn!(index, error = %err, "dropping op with unmappable offsets");
                        None
                    }
                }
            })
            .collect()
    }

    /// Whether `text` is already the result of this patch.
    ///
    /// Checked against `meta.verify_result` when the document has one.
    /// Otherwise every replacement must sit where the patch would have put
    /// it, and a patch that only deletes is never taken as applied.
    pub fn is_applied_to(&self, text: &str) -> bool {
        if self.ops.is_empty() {
            return false;
        }
        if let Some(result) = &self.meta.verify_result {
            return result
                .to_verification()
                .is_ok_and(|verification| verification.matches(text));
        }
        if self.ops.iter().all(|op| op.to.is_empty()) {
            return false;
        }

        let encoding = self.meta.encoding;
        let mut shift: isize = 0;
        for op in &self.ops {
            let start = op.from.start as isize + shift;
            let to_len = text_len(&op.to, encoding);
            shift += to_len as isize - op.from.len() as isize;
            if start < 0 {
                return false;
            }

            let start = start as usize;
            let located = to_byte_offset(text, start, encoding)
                .and_then(|s| Ok((s, to_byte_offset(text, start + to_len, encoding)?)));
            match located {
                Ok((s, e)) if text[s..e] == op.to => {}
                _ => return false,
            }
        }
        true
    }

    /// Verification of the base text, if the document carries one.
    pub fn verification(&self) -> Option<EditVerification> {
        self.meta
            .verify
            .as_ref()
            .and_then(|verify| verify.to_verification().ok())
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut issues = Vec::new();

        if self.meta.name.trim().is_empty() {
            issues.push(ValidationIssue::MissingField { field: "meta.name" });
        }

        for verify in [&self.meta.verify, &self.meta.verify_result] {
            if let Some(Verify::Hash { expected, .. }) = verify {
                if let Err(message) = parse_hash(expected) {
                    issues.push(ValidationIssue::InvalidVerify { message });
                }
            }
        }

        let mut last_end = 0;
        for (index, op) in self.ops.iter().enumerate() {
            if op.from.start > op.from.end {
                issues.push(ValidationIssue::InvalidRange {
                    index,
                    start: op.from.start,
                    end: op.from.end,
                });
            } else if op.from.start < last_end {
                issues.push(ValidationIssue::Overlapping {
                    index,
                    start: op.from.start,
                    last_end,
                });
            }
            last_end = last_end.max(op.from.end);
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues })
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_toml(&self) -> String {
        let mut doc = DocumentMut::new();

        let mut meta = Table::new();
        meta.insert("name", value(self.meta.name.as_str()));
        if let Some(description) = &self.meta.description {
            meta.insert("description", value(description.as_str()));
        }
        meta.insert("encoding", value(self.meta.encoding.as_str()));
        if let Some(verify) = &self.meta.verify {
            meta.insert("verify", Item::Table(verify_table(verify)));
        }
        if let Some(result) = &self.meta.verify_result {
            meta.insert("verify_result", Item::Table(verify_table(result)));
        }
        doc.insert("meta", Item::Table(meta));

        let mut ops = ArrayOfTables::new();
        for op in &self.ops {
            let mut table = Table::new();
            table.insert("op", value("replace"));
            let mut from = Array::new();
            from.push(op.from.start as i64);
            from.push(op.from.end as i64);
            table.insert("from", value(from));
            table.insert("to", value(op.to.as_str()));
            ops.push(table);
        }
        doc.insert("ops", Item::ArrayOfTables(ops));

        doc.to_string()
    }
}

fn verify_table(verify: &Verify) -> Table {
    let mut table = Table::new();
    match verify {
        Verify::ExactMatch { expected_text } => {
            table.insert("method", value("exact_match"));
            table.insert("expected_text", value(expected_text.as_str()));
        }
        Verify::Hash {
            algorithm,
            expected,
        } => {
            table.insert("method", value("hash"));
            if algorithm.is_some() {
                table.insert("algorithm", value("xxh3"));
            }
            table.insert("expected", value(expected.as_str()));
        }
    }
    table
}

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, issue) in self.issues.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{issue}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    MissingField {
        field: &'static str,
    },
    InvalidRange {
        index: usize,
        start: usize,
        end: usize,
    },
    Overlapping {
        index: usize,
        start: usize,
        last_end: usize,
    },
    InvalidVerify {
        message: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::MissingField { field } => {
                write!(f, "patch document missing required field '{field}'")
            }
            ValidationIssue::InvalidRange { index, start, end } => {
                write!(f, "op {index} has invalid range [{start}, {end})")
            }
            ValidationIssue::Overlapping {
                index,
                start,
                last_end,
            } => write!(
                f,
                "op {index} starts at {start}, overlapping previous op ending at {last_end}"
            ),
            ValidationIssue::InvalidVerify { message } => {
                write!(f, "invalid verification: {message}")
            }
        }
    }
}
