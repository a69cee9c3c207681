//! PII normalization and hashing.

use sha2::{Digest, Sha256};

/// Trims, lowercases and SHA-256 hashes `raw`, returning the lowercase hex digest.
pub fn normalize_and_hash(raw: &str) -> String {
    let normalized = raw.trim().to_lowercase();
    hex::encode(Sha256::digest(normalized.as_bytes()))
}

/// Hashes `raw` when `hash_required`, otherwise passes it through untouched.
///
/// Pre-hashed input is never normalized, so a value is hashed at most once.
pub fn prepare(raw: &str, hash_required: bool) -> String {
    if hash_required {
        normalize_and_hash(raw)
    } else {
        raw.to_string()
    }
}
