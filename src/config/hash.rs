//! Document fingerprints.
//!
//! A fingerprint is the SHA-256 of the canonical JSON rendering of a parsed
//! document, so key order and YAML formatting do not change it.

use sha2::{Digest, Sha256};

use super::document::DesiredDocument;
use crate::planner::canonical_value;

/// Hasher for desired-state documents.
#[derive(Debug, Default)]
pub struct DocumentHasher;

impl DocumentHasher {
    /// Creates a new document hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes the fingerprint of a document.
    #[must_use]
    pub fn hash_document(&self, document: &DesiredDocument) -> String {
        let value = serde_json::to_value(document).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(document.kind().to_string().as_bytes());
        hasher.update(canonical_value(&value).as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Computes a short hash (first 8 characters) for display purposes.
    #[must_use]
    pub fn short_hash(&self, hash: &str) -> String {
        hash.chars().take(8).collect()
    }
}
