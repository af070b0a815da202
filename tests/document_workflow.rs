//! End-to-end workflow test
//!
//! Tests the complete library workflow:
//! 1. Compute a patch between two snapshots
//! 2. Store it as a patch document
//! 3. Apply it to a file with verification
//! 4. Undo it through the inverse patch

use std::fs;
use tempfile::TempDir;
use text_patcher::{
    compute_patch, invert_patch, load_from_path, ApplyMode, EditError, EditResult, Encoding,
    FileEdit, History, PatchDocument,
};

const BEFORE: &str = "# Notes\r\n\r\nThe café opens at 9 🌅.\r\n";
const AFTER: &str = "# Notes\r\n\r\nThe café opens at 8 sharp 🌅.\r\n";

#[test]
fn test_document_apply_and_undo() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("notes.md");
    fs::write(&file, BEFORE).unwrap();

    let patch = compute_patch(BEFORE, AFTER);
    let document = PatchDocument::from_patch("notes", BEFORE, &patch, Encoding::Utf16).unwrap();
    let document_path = dir.path().join("notes.patch.toml");
    fs::write(&document_path, document.to_toml()).unwrap();

    let loaded = load_from_path(&document_path).unwrap();
    assert_eq!(loaded, document);

    let content = fs::read_to_string(&file).unwrap();
    let edit = FileEdit::with_verification(
        &file,
        loaded.patch_for(&content).unwrap(),
        loaded.verification(),
    );
    let result = edit.apply(ApplyMode::Strict).unwrap();
    assert!(matches!(result, EditResult::Applied { .. }));
    assert_eq!(fs::read_to_string(&file).unwrap(), AFTER);
    assert!(loaded.is_applied_to(AFTER));

    // Applying again against the patched file is drift in strict mode.
    assert!(matches!(
        edit.apply(ApplyMode::Strict),
        Err(EditError::BeforeTextMismatch { .. })
    ));

    let inverse = invert_patch(BEFORE, &patch).unwrap();
    let undo = FileEdit::new(&file, inverse, AFTER);
    let _ = undo.apply(ApplyMode::Strict).unwrap();
    assert_eq!(fs::read_to_string(&file).unwrap(), BEFORE);
}

#[test]
fn test_json_document_from_editor() {
    let dir = TempDir::new().unwrap();
    let document_path = dir.path().join("edit.json");

    // Offsets as a browser editor counts them: "🌅" is two UTF-16 units.
    fs::write(
        &document_path,
        r#"{
  "meta": { "name": "editor-edit", "encoding": "utf16" },
  "ops": [{ "op": "replace", "from": [31, 33], "to": "☀️" }]
}"#,
    )
    .unwrap();

    let document = load_from_path(&document_path).unwrap();
    let patch = document.patch_for(BEFORE).unwrap();
    assert_eq!(
        patch.apply(BEFORE).unwrap(),
        "# Notes\r\n\r\nThe café opens at 9 ☀️.\r\n"
    );
}

#[test]
fn test_history_describes_rewrites() {
    let mut history = History::new(BEFORE, 16);
    history.push(AFTER);

    let change = history.last_change().unwrap();
    assert_eq!(change.ops()[0].to, "8 sharp");

    let undo = history.undo_patch().unwrap();
    assert_eq!(undo.apply(history.present()).unwrap(), BEFORE);
    assert_eq!(history.undo(), Some(BEFORE));
}
