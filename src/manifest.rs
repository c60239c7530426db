// Manifest: the `manifest.json` entry of every archive (SPEC_FULL.md §6.2).

use chrono::{DateTime, FixedOffset, Local};
use serde::{Deserialize, Serialize};

use crate::constants::{
    DATABASE_ENTRY, DEFAULT_DEVICE_NAME, DEFAULT_SCHEMA_VERSION, MANIFEST_TYPE, MANIFEST_VERSION,
};
use crate::error::{MergeError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDataBackup {
    #[serde(rename = "lastModifiedDate")]
    pub last_modified_date: String,
    #[serde(rename = "databaseName")]
    pub database_name: String,
    #[serde(rename = "deviceName")]
    pub device_name: String,
    pub hash: String,
    #[serde(rename = "schemaVersion")]
    pub schema_version: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,
    #[serde(rename = "creationDate")]
    pub creation_date: String,
    pub version: i64,
    #[serde(rename = "type")]
    pub manifest_type: i64,
    #[serde(rename = "userDataBackup")]
    pub user_data_backup: UserDataBackup,
}

impl Manifest {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| MergeError::BadManifest(format!("invalid manifest JSON: {e}")))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Build the output manifest for a merge, sourcing `schemaVersion` from the
    /// first input if present, defaulting to 14 otherwise.
    pub fn build_merged(name: &str, db_hash: &str, schema_version_hint: Option<i64>) -> Self {
        let now = format_timestamp(Local::now().fixed_offset());
        Manifest {
            name: name.to_string(),
            creation_date: now.clone(),
            version: MANIFEST_VERSION,
            manifest_type: MANIFEST_TYPE,
            user_data_backup: UserDataBackup {
                last_modified_date: now,
                database_name: DATABASE_ENTRY.to_string(),
                device_name: DEFAULT_DEVICE_NAME.to_string(),
                hash: db_hash.to_string(),
                schema_version: schema_version_hint.unwrap_or(DEFAULT_SCHEMA_VERSION),
            },
        }
    }
}

/// ISO-8601 local datetime with a numeric offset and no colon, e.g.
/// `2024-06-03T12:34:56+0200`, matching the reference format.
fn format_timestamp(dt: DateTime<FixedOffset>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%z").to_string()
}
