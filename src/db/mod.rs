// Database Session: a thin contract over the embedded SQL engine (SPEC_FULL.md §4.2).
//
// Sessions own a private, non-shared `rusqlite::Connection` and are never
// passed between threads. Loading from bytes and exporting to bytes both go
// through a scratch file on disk rather than rusqlite's serialize/deserialize
// API, keeping this module entirely on the stable, well-trodden part of the
// rusqlite surface.

use rusqlite::Connection;
use rusqlite::types::ToSql;
use tempfile::NamedTempFile;

use crate::error::{MergeError, Result};

/// One column as reported by `PRAGMA table_info`.
#[derive(Debug, Clone)]
pub struct ColumnInfo {
    pub name: String,
    pub declared_type: String,
    pub nullable: bool,
    pub is_primary_key: bool,
}

pub struct Session {
    conn: Connection,
}

impl Session {
    /// Load a database from its on-disk bytes (the `userData.db` entry of an archive).
    pub fn open(bytes: &[u8]) -> Result<Self> {
        let scratch = NamedTempFile::new().map_err(MergeError::Io)?;
        std::fs::write(scratch.path(), bytes).map_err(MergeError::Io)?;
        let conn = Connection::open(scratch.path())
            .map_err(|e| MergeError::BadDatabase(e.to_string()))?;
        conn.execute_batch("PRAGMA foreign_keys = OFF;")?; // merge inserts rows out of referential order within a table batch
        Ok(Self { conn })
    }

    /// Create a fresh, empty in-memory-backed database (the merge target before
    /// its schema is copied in).
    pub fn empty() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = OFF;")?;
        Ok(Self { conn })
    }

    /// Export the current database contents as on-disk bytes.
    pub fn export(&self) -> Result<Vec<u8>> {
        let scratch = NamedTempFile::new().map_err(MergeError::Io)?;
        // VACUUM INTO requires the target file to not already exist.
        std::fs::remove_file(scratch.path()).ok();
        let path_str = scratch
            .path()
            .to_str()
            .ok_or_else(|| MergeError::Internal("scratch path is not valid UTF-8".into()))?;
        self.conn
            .execute("VACUUM INTO ?1", rusqlite::params![path_str])?;
        let bytes = std::fs::read(scratch.path()).map_err(MergeError::Io)?;
        Ok(bytes)
    }

    /// All table names, in the order SQLite created them (`sqlite_master` insertion order).
    pub fn tables(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY rowid",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(names)
    }

    /// Column metadata for a table, in declaration order.
    pub fn columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        let mut stmt = self.conn.prepare(&format!("PRAGMA table_info(\"{table}\")"))?;
        let cols = stmt
            .query_map([], |row| {
                let name: String = row.get(1)?;
                let declared_type: String = row.get(2)?;
                let notnull: i64 = row.get(3)?;
                let pk: i64 = row.get(5)?;
                Ok(ColumnInfo {
                    name,
                    declared_type,
                    nullable: notnull == 0,
                    is_primary_key: pk != 0,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(cols)
    }

    /// Execute verbatim DDL copied from a source (`CREATE TABLE ...`).
    pub fn create_table(&self, ddl: &str) -> Result<()> {
        self.conn.execute_batch(ddl)?;
        Ok(())
    }

    /// Run a read query with bound parameters, mapping each row through `f`.
    pub fn query<T>(
        &self,
        sql: &str,
        params: &[&dyn ToSql],
        mut f: impl FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<Vec<T>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, |row| f(row))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Run a statement with bound parameters, returning the number of affected rows.
    pub fn exec(&self, sql: &str, params: &[&dyn ToSql]) -> Result<usize> {
        Ok(self.conn.execute(sql, params)?)
    }

    pub fn last_insert_rowid(&self) -> i64 {
        self.conn.last_insert_rowid()
    }

    /// Direct access to the underlying connection, for mergers that need
    /// prepared-statement reuse across many rows.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}
