// Merge engine constants.
// These values are part of the on-disk/wire contract. Do not change without
// updating SPEC_FULL.md.

/// Default schema version recorded in the output manifest when no source carries one.
pub const DEFAULT_SCHEMA_VERSION: i64 = 14;

/// Fixed entry names inside every archive.
pub const MANIFEST_ENTRY: &str = "manifest.json";
pub const DATABASE_ENTRY: &str = "userData.db";

/// Manifest field constants.
pub const MANIFEST_VERSION: i64 = 1;
pub const MANIFEST_TYPE: i64 = 0;
pub const DEFAULT_DEVICE_NAME: &str = "Merged Library";

/// Hashing. Streamed reads use this chunk size for large blobs.
pub const HASH_CHUNK_SIZE: usize = 1_048_576; // 1MB

/// Resource caps.
pub const DEFAULT_SIZE_LIMIT_BYTES: u64 = 200 * 1024 * 1024; // 200 MiB

/// Bound on primary-key allocation retries before giving up (§4.6 step 2).
pub const MAX_PK_ALLOCATION_ATTEMPTS: u32 = 1_000;

/// Up to this many orphan samples are attached to the validation report per category.
pub const MAX_ORPHAN_SAMPLES: usize = 10;

/// Output filename pattern: `merged-library-<YYYY-MM-DD>.<ext>`.
pub const OUTPUT_FILENAME_PREFIX: &str = "merged-library";
pub const ARCHIVE_EXTENSION: &str = "jwlibrary";
