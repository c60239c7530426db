// Integrity Validator (SPEC_FULL.md §4.9): read-only post-merge checks. Never
// mutates the target database.

use serde::Serialize;

use crate::constants::MAX_ORPHAN_SAMPLES;
use crate::db::Session;
use crate::error::Result;
use crate::registry::IdRegistry;
use crate::schema::DEPENDENCY_ORDER;

#[derive(Debug, Clone, Serialize)]
pub struct OrphanSample {
    pub pk: i64,
    pub missing_fk: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Report {
    pub orphaned_marks: usize,
    pub orphaned_notes: usize,
    pub duplicate_locations: usize,
    pub row_counts: Vec<(String, i64)>,
    pub registry_sizes: Vec<(String, usize)>,
    pub orphan_samples: Vec<OrphanSample>,
}

pub fn validate(target: &Session, registry: &IdRegistry) -> Result<Report> {
    let mut report = Report::default();

    report.orphaned_marks = orphan_count(
        target,
        "SELECT MarkId, LocationId FROM Mark WHERE LocationId NOT IN (SELECT LocationId FROM Location)",
        &mut report.orphan_samples,
    )?;

    report.orphaned_notes = orphan_count(
        target,
        "SELECT NoteId, LocationId FROM Note WHERE LocationId IS NOT NULL AND LocationId NOT IN (SELECT LocationId FROM Location)",
        &mut report.orphan_samples,
    )?;

    let bible_chapter_duplicates = target
        .query(
            "SELECT COUNT(*) FROM (
                 SELECT BookNumber, ChapterNumber, KeySymbol, COALESCE(MepsLanguage, 0), Type, COUNT(*) c
                 FROM Location
                 WHERE Type = 0 AND BookNumber IS NOT NULL AND BookNumber != 0
                       AND ChapterNumber IS NOT NULL AND ChapterNumber != 0
                 GROUP BY BookNumber, ChapterNumber, KeySymbol, COALESCE(MepsLanguage, 0), Type
                 HAVING c > 1
             )",
            &[],
            |row| row.get::<_, i64>(0),
        )?
        .into_iter()
        .next()
        .unwrap_or(0);

    // The publication/document-reference identity rule (every Location row
    // that doesn't match the Bible-chapter rule above).
    let publication_duplicates = target
        .query(
            "SELECT COUNT(*) FROM (
                 SELECT KeySymbol, COALESCE(IssueTagNumber, 0), COALESCE(MepsLanguage, 0),
                        COALESCE(DocumentId, 0), COALESCE(Track, 0), Type, COUNT(*) c
                 FROM Location
                 WHERE NOT (Type = 0 AND BookNumber IS NOT NULL AND BookNumber != 0
                            AND ChapterNumber IS NOT NULL AND ChapterNumber != 0)
                 GROUP BY KeySymbol, COALESCE(IssueTagNumber, 0), COALESCE(MepsLanguage, 0),
                          COALESCE(DocumentId, 0), COALESCE(Track, 0), Type
                 HAVING c > 1
             )",
            &[],
            |row| row.get::<_, i64>(0),
        )?
        .into_iter()
        .next()
        .unwrap_or(0);

    report.duplicate_locations = (bible_chapter_duplicates + publication_duplicates) as usize;

    for table in DEPENDENCY_ORDER {
        if let Ok(tables) = target.tables() {
            if !tables.iter().any(|t| t == table.name) {
                continue;
            }
        }
        let count = target
            .query(&format!("SELECT COUNT(*) FROM \"{}\"", table.name), &[], |row| {
                row.get::<_, i64>(0)
            })?
            .into_iter()
            .next()
            .unwrap_or(0);
        report.row_counts.push((table.name.to_string(), count));
        report
            .registry_sizes
            .push((table.name.to_string(), registry.count_for(table.name)));
    }

    Ok(report)
}

fn orphan_count(target: &Session, sql: &str, samples: &mut Vec<OrphanSample>) -> Result<usize> {
    let rows = target.query(sql, &[], |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
    })?;
    for (pk, missing_fk) in rows.iter().take(MAX_ORPHAN_SAMPLES) {
        samples.push(OrphanSample {
            pk: *pk,
            missing_fk: *missing_fk,
        });
    }
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_target() -> Session {
        let session = Session::empty().unwrap();
        session
            .create_table("CREATE TABLE Location (LocationId INTEGER PRIMARY KEY, BookNumber INTEGER, ChapterNumber INTEGER, KeySymbol TEXT, MepsLanguage INTEGER, Type INTEGER)")
            .unwrap();
        session
            .create_table("CREATE TABLE Mark (MarkId INTEGER PRIMARY KEY, MarkGuid TEXT, LocationId INTEGER)")
            .unwrap();
        session
            .create_table("CREATE TABLE Note (NoteId INTEGER PRIMARY KEY, Guid TEXT, LocationId INTEGER)")
            .unwrap();
        session
    }

    #[test]
    fn reports_zero_orphans_on_a_clean_target() {
        let target = setup_target();
        target
            .exec(
                "INSERT INTO Location (LocationId, BookNumber, ChapterNumber, KeySymbol, MepsLanguage, Type) VALUES (1, 1, 1, 'nwt', 0, 0)",
                &[],
            )
            .unwrap();
        target
            .exec("INSERT INTO Mark (MarkId, MarkGuid, LocationId) VALUES (1, 'g', 1)", &[])
            .unwrap();

        let registry = IdRegistry::new();
        let report = validate(&target, &registry).unwrap();
        assert_eq!(report.orphaned_marks, 0);
        assert_eq!(report.orphaned_notes, 0);
        assert_eq!(report.duplicate_locations, 0);
    }

    #[test]
    fn detects_an_orphaned_mark() {
        let target = setup_target();
        target
            .exec("INSERT INTO Mark (MarkId, MarkGuid, LocationId) VALUES (1, 'g', 999)", &[])
            .unwrap();

        let registry = IdRegistry::new();
        let report = validate(&target, &registry).unwrap();
        assert_eq!(report.orphaned_marks, 1);
        assert_eq!(report.orphan_samples[0].missing_fk, 999);
    }

    #[test]
    fn detects_duplicate_publication_locations() {
        let target = Session::empty().unwrap();
        target
            .create_table("CREATE TABLE Location (LocationId INTEGER PRIMARY KEY, BookNumber INTEGER, ChapterNumber INTEGER, DocumentId INTEGER, Track INTEGER, IssueTagNumber INTEGER, KeySymbol TEXT, MepsLanguage INTEGER, Type INTEGER)")
            .unwrap();
        target
            .create_table("CREATE TABLE Mark (MarkId INTEGER PRIMARY KEY, MarkGuid TEXT, LocationId INTEGER)")
            .unwrap();
        target
            .create_table("CREATE TABLE Note (NoteId INTEGER PRIMARY KEY, Guid TEXT, LocationId INTEGER)")
            .unwrap();
        // Two rows sharing the same publication-rule signature (Type != 0,
        // so the Bible-chapter rule doesn't apply to either).
        target
            .exec(
                "INSERT INTO Location (LocationId, DocumentId, Track, KeySymbol, MepsLanguage, Type) VALUES (1, 1001, 1, 'sjj', 0, 1)",
                &[],
            )
            .unwrap();
        target
            .exec(
                "INSERT INTO Location (LocationId, DocumentId, Track, KeySymbol, MepsLanguage, Type) VALUES (2, 1001, 1, 'sjj', 0, 1)",
                &[],
            )
            .unwrap();

        let registry = IdRegistry::new();
        let report = validate(&target, &registry).unwrap();
        assert_eq!(report.duplicate_locations, 1);
    }
}
