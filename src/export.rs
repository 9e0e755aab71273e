//! SQLite export of a consolidated table.
//!
//! The whole table lands in a single `DATA` table. The database is built in a
//! temporary file next to the destination and renamed over it only after the
//! insert transaction commits, so a failed export leaves nothing behind.

use std::{
    io,
    path::{Path, PathBuf},
};

use log::{debug, info};
use rusqlite::{
    Connection, params_from_iter,
    types::{ToSql, ToSqlOutput, Value, ValueRef},
};
use thiserror::Error;

use crate::{data::Cell, engine::ConsolidatedTable};

pub const TABLE_NAME: &str = "DATA";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("I/O error while writing {path:?}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("Failed to move database into place at {path:?}: {source}")]
    Persist { path: PathBuf, source: io::Error },
}

impl ToSql for Cell {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let value = match self {
            Cell::Missing => Value::Null,
            Cell::Text(text) => return Ok(ToSqlOutput::Borrowed(ValueRef::Text(text.as_bytes()))),
            Cell::Integer(value) => Value::Integer(*value),
            Cell::Number(value) => Value::Real(*value),
            Cell::Bool(flag) => Value::Integer(i64::from(*flag)),
            Cell::Date(_) | Cell::DateTime(_) => Value::Text(self.as_display()),
        };
        Ok(ToSqlOutput::Owned(value))
    }
}

pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn create_table_sql(table: &ConsolidatedTable) -> String {
    let columns = table
        .column_names()
        .iter()
        .zip(table.column_types())
        .map(|(name, column_type)| format!("{} {}", quote_identifier(name), column_type.sql_type()))
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE {TABLE_NAME} ({columns})")
}

fn insert_sql(table: &ConsolidatedTable) -> String {
    let names = table
        .column_names()
        .iter()
        .map(|name| quote_identifier(name))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = (1..=table.column_names().len())
        .map(|idx| format!("?{idx}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("INSERT INTO {TABLE_NAME} ({names}) VALUES ({placeholders})")
}

fn write_rows(conn: &mut Connection, table: &ConsolidatedTable) -> rusqlite::Result<usize> {
    conn.execute(&create_table_sql(table), [])?;
    let tx = conn.transaction()?;
    let mut count = 0usize;
    {
        let mut stmt = tx.prepare(&insert_sql(table))?;
        for row in table.rows() {
            stmt.execute(params_from_iter(row))?;
            count += 1;
        }
    }
    tx.commit()?;
    Ok(count)
}

/// Writes `table` to a new SQLite database at `path`, replacing any existing file.
///
/// Returns the number of rows written.
pub fn export_sqlite(table: &ConsolidatedTable, path: &Path) -> Result<usize, ExportError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let staging = tempfile::Builder::new()
        .prefix(".consolidated-")
        .suffix(".db.part")
        .tempfile_in(dir)
        .map_err(|source| ExportError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    debug!("Staging SQLite export in {:?}", staging.path());

    let mut conn = Connection::open(staging.path())?;
    let count = write_rows(&mut conn, table)?;
    conn.close().map_err(|(_, err)| err)?;

    staging.persist(path).map_err(|err| ExportError::Persist {
        path: path.to_path_buf(),
        source: err.error,
    })?;
    info!("Wrote {count} row(s) to table {TABLE_NAME} in {path:?}");
    Ok(count)
}

/// Contents of the `DATA` table read back from an exported database.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredTable {
    pub columns: Vec<String>,
    pub declared_types: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

pub fn load_table(path: &Path) -> Result<StoredTable, ExportError> {
    let conn = Connection::open(path)?;
    let mut info = conn.prepare(&format!("PRAGMA table_info({TABLE_NAME})"))?;
    let declared_types = info
        .query_map([], |row| row.get::<_, String>(2))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut stmt = conn.prepare(&format!("SELECT * FROM {TABLE_NAME} ORDER BY rowid"))?;
    let columns = stmt
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    let width = columns.len();
    let rows = stmt
        .query_map([], |row| {
            (0..width)
                .map(|idx| row.get_ref(idx).map(stored_cell))
                .collect::<rusqlite::Result<Vec<_>>>()
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(StoredTable {
        columns,
        declared_types,
        rows,
    })
}

fn stored_cell(value: ValueRef<'_>) -> Cell {
    match value {
        ValueRef::Null => Cell::Missing,
        ValueRef::Integer(value) => Cell::Integer(value),
        ValueRef::Real(value) => Cell::Number(value),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Cell::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}
