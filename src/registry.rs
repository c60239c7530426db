// ID Mapping Registry (SPEC_FULL.md §4.4, §3.4): shared mutable state
// consulted by every merger to rewrite foreign keys after a row's primary
// key changes.
//
// Keyed by `(table, source_index, original_id)` rather than just
// `(table, original_id)`: every source database autoincrements its own
// primary keys independently, so the same `original_id` routinely recurs
// across sources naming *different* rows (see SPEC_FULL.md §3.4's
// `(table, source, original_id) -> new_id` lifecycle entry). Dropping the
// source component would let a later source's mapping silently overwrite an
// earlier source's for the same numeric id.

use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct IdRegistry {
    map: HashMap<(String, usize, i64), i64>,
}

impl IdRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, table: &str, source_index: usize, orig: i64, new: i64) {
        self.map.insert((table.to_string(), source_index, orig), new);
    }

    pub fn lookup(&self, table: &str, source_index: usize, orig: i64) -> Option<i64> {
        self.map.get(&(table.to_string(), source_index, orig)).copied()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    /// Number of recorded mappings for one table (used by the Integrity Validator).
    pub fn count_for(&self, table: &str) -> usize {
        self.map.keys().filter(|(t, _, _)| t == table).count()
    }
}
