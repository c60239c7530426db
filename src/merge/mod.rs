// Merge drivers (SPEC_FULL.md §4.5-§4.7): the Location Merger, the Generic
// Row Merger, and the Media Merger, plus the row representation and small
// SQL helpers they share.

pub mod generic;
pub mod location;
pub mod media;

use rusqlite::types::{ToSql, Value};

use crate::db::Session;
use crate::error::Result;

/// One row read out of a source or target table, columns in declared order.
#[derive(Debug, Clone)]
pub struct Row {
    pub columns: Vec<String>,
    pub values: Vec<Value>,
}

impl Row {
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| &self.values[i])
    }

    pub fn get_i64(&self, column: &str) -> Option<i64> {
        match self.get(column) {
            Some(Value::Integer(i)) => Some(*i),
            _ => None,
        }
    }

    /// Textual form of a column value for identity-rule comparison: `None`
    /// for SQL NULL, otherwise the value rendered as text.
    pub fn as_text(&self, column: &str) -> Option<String> {
        match self.get(column) {
            None | Some(Value::Null) => None,
            Some(Value::Integer(i)) => Some(i.to_string()),
            Some(Value::Real(r)) => Some(r.to_string()),
            Some(Value::Text(s)) => Some(s.clone()),
            Some(Value::Blob(b)) => Some(hex::encode(b)),
        }
    }

    pub fn set(&mut self, column: &str, value: Value) {
        if let Some(i) = self.columns.iter().position(|c| c == column) {
            self.values[i] = value;
        }
    }
}

/// Read every row of `table`, ordered by `pk` when one exists (falling back
/// to `rowid`), so merges are deterministic given identical input order.
pub fn read_all_rows_ordered(session: &Session, table: &str, pk: Option<&str>) -> Result<Vec<Row>> {
    let cols = session.columns(table)?;
    let names: Vec<String> = cols.iter().map(|c| c.name.clone()).collect();
    let order_col = pk.unwrap_or("rowid");
    let sql = format!("SELECT * FROM \"{table}\" ORDER BY \"{order_col}\"");
    let names_for_closure = names.clone();
    session.query(&sql, &[], move |row| {
        let mut values = Vec::with_capacity(names_for_closure.len());
        for i in 0..names_for_closure.len() {
            values.push(row.get::<_, Value>(i)?);
        }
        Ok(Row {
            columns: names_for_closure.clone(),
            values,
        })
    })
}

/// Insert a row verbatim (column list taken from the row itself), tolerating
/// duplicate-key failures as a defensive backstop behind the identity check.
pub fn insert_row(target: &Session, table: &str, row: &Row) -> Result<()> {
    let col_list = row
        .columns
        .iter()
        .map(|c| format!("\"{c}\""))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=row.columns.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!("INSERT OR IGNORE INTO \"{table}\" ({col_list}) VALUES ({placeholders})");
    let params: Vec<&dyn ToSql> = row.values.iter().map(|v| v as &dyn ToSql).collect();
    target.exec(&sql, &params)?;
    Ok(())
}

/// Whether a row with the given primary key already exists in `table`.
pub fn pk_exists(session: &Session, table: &str, pk_col: &str, id: i64) -> Result<bool> {
    let sql = format!("SELECT 1 FROM \"{table}\" WHERE \"{pk_col}\" = ?1 LIMIT 1");
    let found = session.query(&sql, &[&id], |row| row.get::<_, i64>(0))?;
    Ok(!found.is_empty())
}

/// The largest primary-key value currently present in `table`, if any rows exist.
pub fn max_pk(session: &Session, table: &str, pk_col: &str) -> Result<Option<i64>> {
    let sql = format!("SELECT MAX(\"{pk_col}\") FROM \"{table}\"");
    let rows = session.query(&sql, &[], |row| row.get::<_, Option<i64>>(0))?;
    Ok(rows.into_iter().next().flatten())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Session {
        let session = Session::empty().unwrap();
        session
            .create_table("CREATE TABLE Widget (WidgetId INTEGER PRIMARY KEY, Name TEXT, Note TEXT)")
            .unwrap();
        session
    }

    #[test]
    fn read_all_rows_preserves_column_order_and_values() {
        let session = setup();
        session
            .exec(
                "INSERT INTO Widget (WidgetId, Name, Note) VALUES (?1, ?2, ?3)",
                &[&1i64, &"gizmo", &rusqlite::types::Null],
            )
            .unwrap();
        let rows = read_all_rows_ordered(&session, "Widget", Some("WidgetId")).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_i64("WidgetId"), Some(1));
        assert_eq!(rows[0].as_text("Name"), Some("gizmo".to_string()));
        assert_eq!(rows[0].as_text("Note"), None);
    }

    #[test]
    fn insert_row_round_trips_through_pk_exists_and_max_pk() {
        let session = setup();
        let row = Row {
            columns: vec!["WidgetId".into(), "Name".into(), "Note".into()],
            values: vec![Value::Integer(7), Value::Text("a".into()), Value::Null],
        };
        insert_row(&session, "Widget", &row).unwrap();
        assert!(pk_exists(&session, "Widget", "WidgetId", 7).unwrap());
        assert!(!pk_exists(&session, "Widget", "WidgetId", 8).unwrap());
        assert_eq!(max_pk(&session, "Widget", "WidgetId").unwrap(), Some(7));
    }
}
