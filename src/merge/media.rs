// Media Merger (SPEC_FULL.md §4.7): deduplicates archive entries other than
// the manifest and database by content hash.

use std::collections::HashSet;

use crate::hash::sha256_hex;

/// Merge media entries from every source, in source order. An entry whose
/// content hash has already been seen is dropped; a different entry that
/// collides on name with one already kept is also dropped (first wins).
pub fn merge_media(per_source: &[Vec<(String, Vec<u8>)>]) -> Vec<(String, Vec<u8>)> {
    let mut seen_hashes: HashSet<String> = HashSet::new();
    let mut seen_names: HashSet<String> = HashSet::new();
    let mut out = Vec::new();

    for source in per_source {
        for (name, bytes) in source {
            let hash = sha256_hex(bytes);
            if seen_hashes.contains(&hash) {
                continue;
            }
            if seen_names.contains(name) {
                log::warn!("media name collision on {name}, keeping the first occurrence");
                continue;
            }
            seen_hashes.insert(hash);
            seen_names.insert(name.clone());
            out.push((name.clone(), bytes.clone()));
        }
    }

    out
}
