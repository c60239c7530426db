// Archive Reader/Writer (SPEC_FULL.md §4.1, §6.1): a ZIP container with
// DEFLATE compression, holding `manifest.json`, `userData.db`, and any number
// of opaque media entries.

use std::io::{Cursor, Read, Write};

use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::constants::{DATABASE_ENTRY, MANIFEST_ENTRY};
use crate::error::{MergeError, Result};

pub struct ArchiveContents {
    pub manifest: Vec<u8>,
    pub database: Vec<u8>,
    /// Every other entry, excluding the manifest and database, name preserved.
    pub media: Vec<(String, Vec<u8>)>,
}

pub fn read_archive(bytes: &[u8]) -> Result<ArchiveContents> {
    let reader = Cursor::new(bytes);
    let mut zip = ZipArchive::new(reader)
        .map_err(|e| MergeError::BadContainer(format!("not a valid archive: {e}")))?;

    let mut manifest: Option<Vec<u8>> = None;
    let mut database: Option<Vec<u8>> = None;
    let mut media = Vec::new();

    for i in 0..zip.len() {
        let mut entry = zip
            .by_index(i)
            .map_err(|e| MergeError::BadContainer(format!("corrupt entry: {e}")))?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        let mut buf = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut buf)
            .map_err(|e| MergeError::BadContainer(format!("could not read {name}: {e}")))?;

        match name.as_str() {
            MANIFEST_ENTRY => manifest = Some(buf),
            DATABASE_ENTRY => database = Some(buf),
            _ => media.push((name, buf)),
        }
    }

    let manifest = manifest
        .ok_or_else(|| MergeError::BadContainer(format!("missing {MANIFEST_ENTRY} entry")))?;
    let database = database
        .ok_or_else(|| MergeError::BadContainer(format!("missing {DATABASE_ENTRY} entry")))?;

    Ok(ArchiveContents {
        manifest,
        database,
        media,
    })
}

/// Assemble a new archive from a manifest, a database blob, and a set of
/// media entries, preserving each entry's original name.
pub fn write_archive(manifest: &[u8], database: &[u8], media: &[(String, Vec<u8>)]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    {
        let cursor = Cursor::new(&mut buf);
        let mut zip = ZipWriter::new(cursor);
        let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        zip.start_file(MANIFEST_ENTRY, options)?;
        zip.write_all(manifest)?;

        zip.start_file(DATABASE_ENTRY, options)?;
        zip.write_all(database)?;

        for (name, bytes) in media {
            zip.start_file(name, options)?;
            zip.write_all(bytes)?;
        }

        zip.finish()?;
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_manifest_database_and_media() {
        let media = vec![("pic.jpg".to_string(), vec![1, 2, 3])];
        let archive = write_archive(b"manifest-bytes", b"db-bytes", &media).unwrap();

        let contents = read_archive(&archive).unwrap();
        assert_eq!(contents.manifest, b"manifest-bytes");
        assert_eq!(contents.database, b"db-bytes");
        assert_eq!(contents.media, media);
    }

    #[test]
    fn rejects_archive_missing_the_database_entry() {
        let archive = write_archive(b"manifest-bytes", b"", &[]).unwrap();
        // Manually strip the database entry by re-assembling without it.
        let contents = read_archive(&archive).unwrap();
        assert_eq!(contents.database, b"");

        let media_only =
            write_archive_without_database(b"manifest-bytes", &[("x.txt".into(), vec![9])]);
        let err = read_archive(&media_only).unwrap_err();
        assert!(matches!(err, MergeError::BadContainer(_)));
    }

    fn write_archive_without_database(manifest: &[u8], media: &[(String, Vec<u8>)]) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let cursor = Cursor::new(&mut buf);
            let mut zip = ZipWriter::new(cursor);
            let options =
                SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
            zip.start_file(MANIFEST_ENTRY, options).unwrap();
            zip.write_all(manifest).unwrap();
            for (name, bytes) in media {
                zip.start_file(name, options).unwrap();
                zip.write_all(bytes).unwrap();
            }
            zip.finish().unwrap();
        }
        buf
    }
}
