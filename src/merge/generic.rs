// Generic Row Merger (SPEC_FULL.md §4.6): the table-by-table driver that
// applies a table's identity rule(s), resolves primary-key collisions, and
// rewrites foreign keys, run once per table in dependency order after
// Location has already been merged.

use rusqlite::types::{ToSql, Value};

use crate::constants::MAX_PK_ALLOCATION_ATTEMPTS;
use crate::db::Session;
use crate::error::{MergeError, Result};
use crate::registry::IdRegistry;
use crate::schema::{self, ForeignKey, PkStrategy, TableSpec};
use crate::trace::{MergeEvent, MergeTrace};

use super::{insert_row, max_pk, pk_exists, read_all_rows_ordered, Row};

/// Merge every source's rows for one table into `target`, per spec's
/// three-step duplicate-check / pk-resolution / fk-rewrite / insert pipeline.
pub fn merge_table(
    target: &Session,
    sources: &[Session],
    spec: &TableSpec,
    registry: &mut IdRegistry,
    trace: &mut MergeTrace,
) -> Result<()> {
    let mut offset: i64 = 0;
    let mut next_available: i64 = match spec.pk_strategy {
        PkStrategy::NextAvailable => {
            let pk_col = spec.primary_key.expect("NextAvailable strategy requires a primary key");
            max_pk(target, spec.name, pk_col)?.unwrap_or(0) + 1
        }
        _ => 0,
    };

    for (source_index, source) in sources.iter().enumerate() {
        let rows = read_all_rows_ordered(source, spec.name, spec.primary_key)?;
        let mut source_max_id: i64 = 0;

        for mut row in rows {
            let original_id = spec.primary_key.and_then(|c| row.get_i64(c)).unwrap_or(0);
            source_max_id = source_max_id.max(original_id);

            // Foreign keys are rewritten before the duplicate check runs, not
            // after: several tables' identity rules reference FK columns
            // directly (Bookmark's LocationId/PublicationLocationId, TagMap's
            // TagId/LocationId/NoteId, BlockRange's MarkId, ...), so
            // find_duplicate's WHERE clause must compare against already
            // target-space values, not the row's raw source-space ones.
            for fk in spec.foreign_keys {
                rewrite_fk(
                    target,
                    spec.name,
                    &mut row,
                    fk,
                    registry,
                    trace,
                    source_index,
                    original_id,
                )?;
            }

            if let Some(existing_id) = find_duplicate(target, spec, &row)? {
                if spec.primary_key.is_some() {
                    registry.record(spec.name, source_index, original_id, existing_id);
                }
                trace.push(MergeEvent::Duplicate {
                    table: spec.name.to_string(),
                    source_index,
                    original_id,
                    existing_id,
                });
                continue;
            }

            let final_id = match spec.pk_strategy {
                PkStrategy::None => None,
                PkStrategy::Offset => Some(original_id + offset),
                PkStrategy::NextAvailable => Some(allocate_next_available(
                    target,
                    spec,
                    original_id,
                    &mut next_available,
                )?),
            };

            if let (Some(pk_col), Some(fid)) = (spec.primary_key, final_id) {
                row.set(pk_col, Value::Integer(fid));
            }

            insert_row(target, spec.name, &row)?;

            let verified = match (spec.primary_key, final_id) {
                (Some(pk_col), Some(fid)) => pk_exists(target, spec.name, pk_col, fid)?,
                _ => true,
            };

            if !verified {
                log::warn!(
                    "insert of {} original_id={} (source {}) could not be verified, skipping",
                    spec.name,
                    original_id,
                    source_index
                );
                continue;
            }

            if let Some(fid) = final_id {
                trace.push(MergeEvent::Inserted {
                    table: spec.name.to_string(),
                    source_index,
                    original_id,
                    final_id: fid,
                });
                if fid != original_id {
                    registry.record(spec.name, source_index, original_id, fid);
                }
            }
        }

        if spec.pk_strategy == PkStrategy::Offset {
            offset += source_max_id;
        }
    }

    Ok(())
}

fn select_col_sql(pk: Option<&str>) -> String {
    match pk {
        Some(c) => format!("\"{c}\""),
        None => "1".to_string(),
    }
}

fn find_duplicate(target: &Session, spec: &TableSpec, row: &Row) -> Result<Option<i64>> {
    for rule in spec.identity_rules {
        let mut clauses = Vec::new();
        let mut params: Vec<Value> = Vec::new();
        for col in *rule {
            match row.get(col) {
                None | Some(Value::Null) => clauses.push(format!("\"{col}\" IS NULL")),
                Some(v) => {
                    clauses.push(format!("\"{col}\" = ?"));
                    params.push(v.clone());
                }
            }
        }
        if clauses.is_empty() {
            continue;
        }
        let sql = format!(
            "SELECT {} FROM \"{}\" WHERE {} LIMIT 1",
            select_col_sql(spec.primary_key),
            spec.name,
            clauses.join(" AND ")
        );
        let param_refs: Vec<&dyn ToSql> = params.iter().map(|v| v as &dyn ToSql).collect();
        let found = target.query(&sql, &param_refs, |r| r.get::<_, Option<i64>>(0))?;
        if let Some(first) = found.into_iter().next() {
            return Ok(Some(first.unwrap_or(0)));
        }
    }
    Ok(None)
}

fn allocate_next_available(
    target: &Session,
    spec: &TableSpec,
    original_id: i64,
    counter: &mut i64,
) -> Result<i64> {
    let pk_col = spec.primary_key.expect("NextAvailable strategy requires a primary key");
    if !pk_exists(target, spec.name, pk_col, original_id)? {
        if *counter <= original_id {
            *counter = original_id + 1;
        }
        return Ok(original_id);
    }
    for _ in 0..MAX_PK_ALLOCATION_ATTEMPTS {
        let candidate = *counter;
        *counter += 1;
        if !pk_exists(target, spec.name, pk_col, candidate)? {
            return Ok(candidate);
        }
    }
    Err(MergeError::MergeConflict(format!(
        "exhausted primary-key allocation attempts for {}",
        spec.name
    )))
}

/// Rewrite one row's foreign key in place through the registry, tracing the
/// result. `source_index` is this row's own source (the registry is keyed
/// per source). `host_pk` is this row's own primary key as declared in its
/// source, used to identify the row that owns the dangling reference in an
/// `Orphan` event.
fn rewrite_fk(
    target: &Session,
    table: &str,
    row: &mut Row,
    fk: &ForeignKey,
    registry: &mut IdRegistry,
    trace: &mut MergeTrace,
    source_index: usize,
    host_pk: i64,
) -> Result<()> {
    let Some(v) = row.get_i64(fk.column) else {
        return Ok(());
    };

    if let Some(new_v) = registry.lookup(fk.referenced_table, source_index, v) {
        if new_v != v {
            row.set(fk.column, Value::Integer(new_v));
            trace.push(MergeEvent::Remapped {
                table: table.to_string(),
                column: fk.column.to_string(),
                from: v,
                to: new_v,
            });
        }
        return Ok(());
    }

    let ref_pk = schema::lookup(fk.referenced_table).and_then(|t| t.primary_key);
    let Some(ref_pk) = ref_pk else { return Ok(()) };

    if pk_exists(target, fk.referenced_table, ref_pk, v)? {
        return Ok(());
    }

    trace.push(MergeEvent::Orphan {
        table: table.to_string(),
        column: fk.column.to_string(),
        row_id: host_pk,
        missing_value: v,
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DEPENDENCY_ORDER;

    fn spec_for(name: &str) -> &'static TableSpec {
        DEPENDENCY_ORDER.iter().find(|t| t.name == name).unwrap()
    }

    fn make_tag_source(rows: &[(i64, &str, &str)]) -> Session {
        let session = Session::empty().unwrap();
        session
            .create_table("CREATE TABLE Tag (TagId INTEGER PRIMARY KEY, Type TEXT, Name TEXT)")
            .unwrap();
        for (id, ty, name) in rows {
            let params: [&dyn ToSql; 3] = [id, ty, name];
            session
                .exec(
                    "INSERT INTO Tag (TagId, Type, Name) VALUES (?1, ?2, ?3)",
                    &params,
                )
                .unwrap();
        }
        session
    }

    #[test]
    fn duplicate_tags_collapse_and_remap() {
        let source_a = make_tag_source(&[(1, "1", "Favorites")]);
        let source_b = make_tag_source(&[(1, "1", "Favorites"), (2, "1", "ToRead")]);

        let target = Session::empty().unwrap();
        target
            .create_table("CREATE TABLE Tag (TagId INTEGER PRIMARY KEY, Type TEXT, Name TEXT)")
            .unwrap();

        let mut registry = IdRegistry::new();
        let mut trace = MergeTrace::new();
        let spec = spec_for("Tag");

        merge_table(&target, &[source_a, source_b], spec, &mut registry, &mut trace).unwrap();

        let names: Vec<String> = target
            .query("SELECT Name FROM Tag ORDER BY TagId", &[], |r| r.get(0))
            .unwrap();
        assert_eq!(names, vec!["Favorites".to_string(), "ToRead".to_string()]);
        assert_eq!(registry.lookup("Tag", 1, 1), Some(1));
    }

    #[test]
    fn conflicting_pk_with_distinct_identity_gets_a_fresh_id() {
        let source_a = make_tag_source(&[(1, "1", "Favorites")]);
        let source_b = make_tag_source(&[(1, "1", "Different")]);

        let target = Session::empty().unwrap();
        target
            .create_table("CREATE TABLE Tag (TagId INTEGER PRIMARY KEY, Type TEXT, Name TEXT)")
            .unwrap();

        let mut registry = IdRegistry::new();
        let mut trace = MergeTrace::new();
        let spec = spec_for("Tag");

        merge_table(&target, &[source_a, source_b], spec, &mut registry, &mut trace).unwrap();

        let ids: Vec<i64> = target
            .query("SELECT TagId FROM Tag ORDER BY TagId", &[], |r| r.get(0))
            .unwrap();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(registry.lookup("Tag", 1, 1), Some(2));
    }

    #[test]
    fn mark_foreign_key_orphan_is_traced_when_location_missing() {
        let session = Session::empty().unwrap();
        session
            .create_table("CREATE TABLE Mark (MarkId INTEGER PRIMARY KEY, MarkGuid TEXT, LocationId INTEGER)")
            .unwrap();
        session
            .exec(
                "INSERT INTO Mark (MarkId, MarkGuid, LocationId) VALUES (1, 'guid-1', 999)",
                &[],
            )
            .unwrap();

        let target = Session::empty().unwrap();
        target
            .create_table("CREATE TABLE Mark (MarkId INTEGER PRIMARY KEY, MarkGuid TEXT, LocationId INTEGER)")
            .unwrap();
        target
            .create_table("CREATE TABLE Location (LocationId INTEGER PRIMARY KEY)")
            .unwrap();

        let mut registry = IdRegistry::new();
        let mut trace = MergeTrace::new();
        let spec = spec_for("Mark");

        merge_table(&target, &[session], spec, &mut registry, &mut trace).unwrap();

        assert_eq!(trace.orphans().count(), 1);
        let orphan = trace.orphans().next().unwrap();
        match orphan {
            MergeEvent::Orphan {
                row_id,
                missing_value,
                ..
            } => {
                assert_eq!(*row_id, 1, "row_id must identify the Mark row, not the FK value");
                assert_eq!(*missing_value, 999);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn bookmark_foreign_keys_are_rewritten_and_traced() {
        let source_a = Session::empty().unwrap();
        source_a
            .create_table("CREATE TABLE Bookmark (BookmarkId INTEGER PRIMARY KEY, LocationId INTEGER, PublicationLocationId INTEGER)")
            .unwrap();
        source_a
            .exec(
                "INSERT INTO Bookmark (BookmarkId, LocationId, PublicationLocationId) VALUES (1, 10, 20)",
                &[],
            )
            .unwrap();

        let target = Session::empty().unwrap();
        target
            .create_table("CREATE TABLE Bookmark (BookmarkId INTEGER PRIMARY KEY, LocationId INTEGER, PublicationLocationId INTEGER)")
            .unwrap();
        target
            .create_table("CREATE TABLE Location (LocationId INTEGER PRIMARY KEY)")
            .unwrap();
        target
            .exec("INSERT INTO Location (LocationId) VALUES (100)", &[])
            .unwrap();

        let mut registry = IdRegistry::new();
        registry.record("Location", 0, 10, 100);
        let mut trace = MergeTrace::new();
        let spec = spec_for("Bookmark");

        merge_table(&target, &[source_a], spec, &mut registry, &mut trace).unwrap();

        let location_id: i64 = target
            .query("SELECT LocationId FROM Bookmark WHERE BookmarkId = 1", &[], |r| r.get(0))
            .unwrap()[0];
        assert_eq!(location_id, 100);
        // PublicationLocationId=20 has no mapping and no matching row: orphan.
        assert_eq!(trace.orphans().count(), 1);
    }
}
