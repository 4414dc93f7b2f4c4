//! API key helpers shared by the key-management views.

use sha2::{Digest, Sha256};

/// Characters of a key kept visible by [`redact_api_key`].
pub const VISIBLE_PREFIX_LEN: usize = 8;

/// Lowercase hex SHA-256 of an API key.
///
/// This is the form the console stores and compares; the plaintext key is
/// only shown once, at creation.
pub fn hash_api_key(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

/// Display form of an API key: its first [`VISIBLE_PREFIX_LEN`] characters
/// followed by `…`. Keys too short to keep a prefix are fully masked.
pub fn redact_api_key(key: &str) -> String {
    let key = key.trim();
    if key.chars().count() <= VISIBLE_PREFIX_LEN {
        return "…".to_string();
    }

    let prefix: String = key.chars().take(VISIBLE_PREFIX_LEN).collect();
    format!("{}…", prefix)
}

/// Whether `key` hashes to `expected_hash` (hex, any case).
pub fn matches_hash(key: &str, expected_hash: &str) -> bool {
    hash_api_key(key).eq_ignore_ascii_case(expected_hash.trim())
}
