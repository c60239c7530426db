// Orchestrator (SPEC_FULL.md §4.8): wires the whole pipeline together from
// raw archive bytes to a merged archive plus validation report.

use std::collections::HashSet;

use chrono::Local;

use crate::archive::{self, ArchiveContents};
use crate::config::Config;
use crate::constants::{ARCHIVE_EXTENSION, OUTPUT_FILENAME_PREFIX};
use crate::db::Session;
use crate::error::{MergeError, Result};
use crate::hash::sha256_hex;
use crate::manifest::Manifest;
use crate::merge::media::merge_media;
use crate::merge::{generic, location};
use crate::progress::ProgressReporter;
use crate::registry::IdRegistry;
use crate::schema::{self, DEPENDENCY_ORDER};
use crate::trace::MergeTrace;
use crate::validate::{self, Report};

pub struct MergeOutput {
    pub archive: Vec<u8>,
    pub filename: String,
    pub validation: Report,
}

pub fn merge(sources: &[Vec<u8>], mut config: Config) -> Result<MergeOutput> {
    let run_id = uuid::Uuid::new_v4();
    log::info!("starting merge run {run_id} with {} sources", sources.len());

    if sources.len() < 2 {
        return Err(MergeError::InputInvalid(format!(
            "at least two sources are required, got {}",
            sources.len()
        )));
    }

    let total_bytes: u64 = sources.iter().map(|s| s.len() as u64).sum();
    if total_bytes > config.size_limit_bytes {
        return Err(MergeError::InputTooLarge(format!(
            "combined input is {total_bytes} bytes, limit is {}",
            config.size_limit_bytes
        )));
    }

    let mut progress = ProgressReporter::new(config.progress.take());
    let cancel = config.cancel.clone();

    progress.report("opening sources", 0);
    let mut contents = Vec::with_capacity(sources.len());
    let mut db_sessions = Vec::with_capacity(sources.len());
    let mut schema_version_hint: Option<i64> = None;

    for (i, bytes) in sources.iter().enumerate() {
        let archive_contents: ArchiveContents = archive::read_archive(bytes)?;
        let manifest = Manifest::parse(&archive_contents.manifest)?;
        if i == 0 {
            schema_version_hint = Some(manifest.user_data_backup.schema_version);
        }
        let session = Session::open(&archive_contents.database)?;
        db_sessions.push(session);
        contents.push(archive_contents);
    }

    if let Some(token) = &cancel {
        token.check()?;
    }

    progress.report("preparing target schema", 10);
    let target = Session::empty()?;
    copy_schema(&db_sessions[0], &target)?;

    let mut registry = IdRegistry::new();
    registry.clear();
    let mut trace = MergeTrace::new();

    // Location is always merged (infrastructural, §6.4).
    progress.report("merging Location", 20);
    location::merge_location(&target, &db_sessions, &mut registry, &mut trace)?;

    let merge_steps = DEPENDENCY_ORDER
        .iter()
        .filter(|t| t.name != "Location")
        .count()
        .max(1);
    let mut step = 0usize;

    for spec in DEPENDENCY_ORDER.iter() {
        if spec.name == "Location" {
            continue;
        }
        if let Some(token) = &cancel {
            token.check()?;
        }
        if !config.include.allows(spec.name) {
            continue;
        }
        step += 1;
        let percent = 20 + ((step * 60) / merge_steps) as u8;
        progress.report(&format!("merging {}", spec.name), percent.min(80));
        generic::merge_table(&target, &db_sessions, spec, &mut registry, &mut trace)?;
    }

    if let Some(token) = &cancel {
        token.check()?;
    }

    // Tables present in the source schema but absent from DEPENDENCY_ORDER
    // are merged last, under generic row-identity rules (§3.3).
    let known: HashSet<&str> = DEPENDENCY_ORDER.iter().map(|t| t.name).collect();
    let mut fallback_tables = Vec::new();
    for name in target.tables()? {
        if known.contains(name.as_str()) {
            continue;
        }
        fallback_tables.push(name);
    }

    for name in fallback_tables {
        if let Some(token) = &cancel {
            token.check()?;
        }
        let columns = target.columns(&name)?;
        let primary_key = columns
            .iter()
            .find(|c| c.is_primary_key)
            .map(|c| c.name.clone());
        let column_names: Vec<String> = columns.into_iter().map(|c| c.name).collect();
        progress.report(&format!("merging {name}"), 82);
        let spec = schema::fallback_spec(name, column_names, primary_key);
        generic::merge_table(&target, &db_sessions, &spec, &mut registry, &mut trace)?;
    }

    progress.report("merging media", 85);
    let media_per_source: Vec<Vec<(String, Vec<u8>)>> =
        contents.iter().map(|c| c.media.clone()).collect();
    let merged_media = merge_media(&media_per_source);

    progress.report("exporting database", 90);
    let db_bytes = target.export()?;
    let db_hash = sha256_hex(&db_bytes);
    let manifest = Manifest::build_merged("Merged Library", &db_hash, schema_version_hint);
    let manifest_bytes = manifest.to_bytes()?;

    let archive_bytes = archive::write_archive(&manifest_bytes, &db_bytes, &merged_media)?;

    progress.report("validating integrity", 97);
    let report = validate::validate(&target, &registry)?;

    progress.report("done", 100);

    let filename = format!(
        "{OUTPUT_FILENAME_PREFIX}-{}.{ARCHIVE_EXTENSION}",
        Local::now().format("%Y-%m-%d")
    );

    log::info!(
        "merge run {run_id} complete: {} orphaned marks, {} orphaned notes, {} duplicate locations",
        report.orphaned_marks,
        report.orphaned_notes,
        report.duplicate_locations
    );

    Ok(MergeOutput {
        archive: archive_bytes,
        filename,
        validation: report,
    })
}

/// Copy every `CREATE TABLE` statement from source 0 verbatim into the target.
fn copy_schema(source: &Session, target: &Session) -> Result<()> {
    let ddls = source.query(
        "SELECT sql FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' AND sql IS NOT NULL",
        &[],
        |row| row.get::<_, String>(0),
    )?;
    if ddls.is_empty() {
        return Err(MergeError::BadDatabase(
            "source database declares no tables".to_string(),
        ));
    }
    for ddl in ddls {
        target.create_table(&ddl)?;
    }
    Ok(())
}
