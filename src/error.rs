// Merge engine error taxonomy (SPEC_FULL.md §7).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MergeError {
    #[error("at least two sources are required, got {0}")]
    InputInvalid(String),

    #[error("bad container: {0}")]
    BadContainer(String),

    #[error("bad manifest: {0}")]
    BadManifest(String),

    #[error("bad database: {0}")]
    BadDatabase(String),

    #[error("input too large: {0}")]
    InputTooLarge(String),

    #[error("merge conflict: {0}")]
    MergeConflict(String),

    #[error("merge cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

pub type Result<T> = std::result::Result<T, MergeError>;
