// Content hashing primitive (SPEC_FULL.md §6.2, §4.7): SHA-256 covers both the
// manifest's `userData.db` hash and media dedup in the Media Merger.

use sha2::{Digest, Sha256};

use crate::constants::HASH_CHUNK_SIZE;

/// Lowercase hex SHA-256 digest of `bytes`, read in fixed-size chunks so a
/// large media blob never needs to be hashed in one `update` call.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    for chunk in bytes.chunks(HASH_CHUNK_SIZE) {
        hasher.update(chunk);
    }
    hex::encode(hasher.finalize())
}
