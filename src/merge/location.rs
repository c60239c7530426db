// Location Merger (SPEC_FULL.md §4.5): the Location table has two
// alternative unique constraints, chosen per row by its own content, and is
// resolved by a global scan-then-insert pass across every source before any
// other table is merged.

use std::collections::{HashMap, HashSet};

use rusqlite::types::Value;

use crate::constants::MAX_PK_ALLOCATION_ATTEMPTS;
use crate::db::Session;
use crate::error::{MergeError, Result};
use crate::registry::IdRegistry;
use crate::schema;
use crate::trace::{MergeEvent, MergeTrace};

use super::{insert_row, max_pk, pk_exists, read_all_rows_ordered, Row};

const TABLE: &str = "Location";
const PK: &str = "LocationId";

const BIBLE_COLS: &[&str] = &["BookNumber", "ChapterNumber", "KeySymbol", "MepsLanguage", "Type"];
const PUBLICATION_COLS: &[&str] = &[
    "KeySymbol",
    "IssueTagNumber",
    "MepsLanguage",
    "DocumentId",
    "Track",
    "Type",
];

fn is_bible_chapter(row: &Row) -> bool {
    let is_type_zero = row.get_i64("Type") == Some(0);
    let book_nonzero = row.get_i64("BookNumber").map(|v| v != 0).unwrap_or(false);
    let chapter_nonzero = row
        .get_i64("ChapterNumber")
        .map(|v| v != 0)
        .unwrap_or(false);
    is_type_zero && book_nonzero && chapter_nonzero
}

fn identity_signature(row: &Row) -> String {
    let cols = if is_bible_chapter(row) {
        BIBLE_COLS
    } else {
        PUBLICATION_COLS
    };
    let owned: Vec<Option<String>> = cols.iter().map(|c| row.as_text(c)).collect();
    let borrowed: Vec<Option<&str>> = owned.iter().map(|v| v.as_deref()).collect();
    schema::signature(cols, &borrowed)
}

struct Tagged {
    source_index: usize,
    original_id: i64,
    row: Row,
    signature: String,
    is_first: bool,
}

/// Run the full two-phase Location merge against an already-created, empty
/// target `Location` table. Returns nothing; mappings and trace events are
/// recorded as a side effect.
pub fn merge_location(
    target: &Session,
    sources: &[Session],
    registry: &mut IdRegistry,
    trace: &mut MergeTrace,
) -> Result<()> {
    // Phase 1: global scan, in (source order, row order), marking first occurrences.
    let mut tagged = Vec::new();
    let mut seen_signatures: HashSet<String> = HashSet::new();

    for (source_index, source) in sources.iter().enumerate() {
        let rows = read_all_rows_ordered(source, TABLE, Some(PK))?;
        for row in rows {
            let original_id = row.get_i64(PK).unwrap_or(0);
            let signature = identity_signature(&row);
            let is_first = seen_signatures.insert(signature.clone());
            tagged.push(Tagged {
                source_index,
                original_id,
                row,
                signature,
                is_first,
            });
        }
    }

    // Phase 2: insert first occurrences, remap duplicates.
    let mut used: HashSet<i64> = max_pk(target, TABLE, PK)?.into_iter().collect();
    let mut final_ids: HashMap<String, i64> = HashMap::new();

    for item in tagged {
        if !item.is_first {
            let final_id = *final_ids
                .get(&item.signature)
                .expect("first occurrence is always scanned before its duplicates");
            registry.record(TABLE, item.source_index, item.original_id, final_id);
            trace.push(MergeEvent::Duplicate {
                table: TABLE.to_string(),
                source_index: item.source_index,
                original_id: item.original_id,
                existing_id: final_id,
            });
            continue;
        }

        let final_id = allocate_final_id(item.original_id, &used)?;

        let mut row = item.row;
        row.set(PK, Value::Integer(final_id));
        insert_row(target, TABLE, &row)?;

        if !pk_exists(target, TABLE, PK, final_id)? {
            return Err(MergeError::MergeConflict(format!(
                "Location insert of original id {} (source {}) could not be verified",
                item.original_id, item.source_index
            )));
        }

        used.insert(final_id);
        final_ids.insert(item.signature.clone(), final_id);

        trace.push(MergeEvent::Inserted {
            table: TABLE.to_string(),
            source_index: item.source_index,
            original_id: item.original_id,
            final_id,
        });

        if final_id != item.original_id {
            registry.record(TABLE, item.source_index, item.original_id, final_id);
            trace.push(MergeEvent::Remapped {
                table: TABLE.to_string(),
                column: PK.to_string(),
                from: item.original_id,
                to: final_id,
            });
        }
    }

    Ok(())
}

fn allocate_final_id(original_id: i64, used: &HashSet<i64>) -> Result<i64> {
    if !used.contains(&original_id) {
        return Ok(original_id);
    }
    let mut candidate = original_id + 1;
    for _ in 0..MAX_PK_ALLOCATION_ATTEMPTS {
        if !used.contains(&candidate) {
            return Ok(candidate);
        }
        candidate += 1;
    }
    Err(MergeError::MergeConflict(
        "exhausted primary-key allocation attempts for Location".to_string(),
    ))
}
