pub mod loader;
pub mod schema;

pub use loader::{load_from_path, load_from_str, ConfigError, DocumentFormat};
pub use schema::{
    format_hash, parse_hash, HashAlgorithm, Metadata, PatchDocument, ValidationError,
    ValidationIssue, Verify,
};
