//! Connections to a relational store, tagged by where they came from.

use crate::data::table::TableData;
use crate::error::{Error, Result};
use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags};
use std::fmt;
use std::path::Path;
use tracing::debug;

/// Where a handle's data lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// The fixed database file, opened read-only.
    ReadOnlyFixed,

    /// A private in-memory store built from an upload.
    EphemeralInMemory,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadOnlyFixed => f.write_str("read-only-fixed"),
            Self::EphemeralInMemory => f.write_str("ephemeral-in-memory"),
        }
    }
}

/// An open connection plus its provenance.
#[derive(Debug)]
pub struct DataHandle {
    conn: Connection,
    provenance: Provenance,
    label: String,
}

/// Rows returned by a statement.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    /// Result column names.
    pub columns: Vec<String>,
    /// Result rows, at most the requested limit.
    pub rows: Vec<Vec<Value>>,
    /// True when more rows were available than returned.
    pub truncated: bool,
    /// Rows changed, for statements that return no columns.
    pub changed: usize,
}

impl DataHandle {
    /// Open `path` read-only.
    ///
    /// The connection is probed once so a missing or non-database file fails here.
    ///
    /// # Errors
    ///
    /// Returns `Error::Connection` if the file cannot be opened or read.
    pub fn open_fixed(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| Error::Connection(format!("{}: {e}", path.display())))?;

        conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| {
            row.get::<_, i64>(0)
        })
        .map_err(|e| Error::Connection(format!("{}: {e}", path.display())))?;

        debug!(path = %path.display(), "opened fixed database");
        Ok(Self {
            conn,
            provenance: Provenance::ReadOnlyFixed,
            label: path.display().to_string(),
        })
    }

    /// Build a fresh in-memory store holding `data` as table `table`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Load` if the table cannot be created or loaded.
    pub fn from_table(table: &str, data: &TableData, label: &str) -> Result<Self> {
        let mut conn = Connection::open_in_memory()
            .map_err(|e| Error::Load(format!("Failed to create in-memory store: {e}")))?;
        load_table(&mut conn, table, data)
            .map_err(|e| Error::Load(format!("Failed to load {label}: {e}")))?;

        debug!(table, label, rows = data.rows().len(), "built in-memory store");
        Ok(Self {
            conn,
            provenance: Provenance::EphemeralInMemory,
            label: label.to_string(),
        })
    }

    /// Where this handle's data lives.
    #[must_use]
    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    /// Human-readable source name (file path or upload name).
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The underlying connection.
    #[must_use]
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Names of user tables, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be read.
    pub fn table_names(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(names)
    }

    /// The `CREATE TABLE` statement for `table`, if it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be read.
    pub fn table_ddl(&self, table: &str) -> Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1")?;
        let mut rows = stmt.query([table])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    /// Run one statement, keeping at most `limit` rows.
    ///
    /// # Errors
    ///
    /// Returns `Error::Query` if the statement fails, including writes
    /// against a read-only handle.
    pub fn run_query(&self, sql: &str, limit: usize) -> Result<QueryResult> {
        let mut stmt = self.conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().iter().map(ToString::to_string).collect();

        if columns.is_empty() {
            let changed = stmt.execute([])?;
            return Ok(QueryResult {
                columns,
                rows: Vec::new(),
                truncated: false,
                changed,
            });
        }

        let width = columns.len();
        let mut rows = Vec::new();
        let mut truncated = false;
        let mut cursor = stmt.query([])?;
        while let Some(row) = cursor.next()? {
            if rows.len() == limit {
                truncated = true;
                break;
            }
            let values = (0..width)
                .map(|i| row.get::<_, Value>(i))
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.push(values);
        }

        Ok(QueryResult {
            columns,
            rows,
            truncated,
            changed: 0,
        })
    }
}

impl QueryResult {
    /// Render rows as a tuple list, e.g. `[(1, 'apple'), (2, 'pear')]`.
    #[must_use]
    pub fn to_tuple_list(&self) -> String {
        if self.columns.is_empty() {
            return format!("{} row(s) affected", self.changed);
        }
        let rows: Vec<String> = self
            .rows
            .iter()
            .map(|row| {
                let cells: Vec<String> = row.iter().map(format_value).collect();
                if cells.len() == 1 {
                    format!("({},)", cells[0])
                } else {
                    format!("({})", cells.join(", "))
                }
            })
            .collect();
        let mut out = format!("[{}]", rows.join(", "));
        if self.truncated {
            out.push_str(&format!("\n(only the first {} rows shown)", self.rows.len()));
        }
        out
    }

    /// Render as a tab-separated table with a header line.
    #[must_use]
    pub fn to_table(&self) -> String {
        let mut lines = vec![self.columns.join("\t")];
        for row in &self.rows {
            let cells: Vec<String> = row.iter().map(format_cell).collect();
            lines.push(cells.join("\t"));
        }
        lines.join("\n")
    }
}

/// Render a value the way it would appear as a literal.
fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => f.to_string(),
        Value::Text(s) => format!("'{}'", s.replace('\'', "\\'")),
        Value::Blob(b) => format!("<{} bytes>", b.len()),
    }
}

/// Render a value for tabular display.
fn format_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Text(s) => s.clone(),
        other => format_value(other),
    }
}

/// Quote an identifier for use in SQL.
#[must_use]
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Replace `table` with the contents of `data` in one transaction.
///
/// # Errors
///
/// Returns an error if any statement fails; nothing is committed in that case.
pub fn load_table(conn: &mut Connection, table: &str, data: &TableData) -> Result<()> {
    let schema = data.infer_schema();
    let table_ident = quote_ident(table);

    let column_defs: Vec<String> = schema
        .iter()
        .map(|col| format!("{} {}", quote_ident(&col.name), col.kind.sql_type()))
        .collect();
    let placeholders: Vec<String> = (1..=schema.len()).map(|i| format!("?{i}")).collect();

    let tx = conn.transaction()?;
    tx.execute_batch(&format!(
        "DROP TABLE IF EXISTS {table_ident}; CREATE TABLE {table_ident} ({});",
        column_defs.join(", ")
    ))?;
    {
        let mut insert = tx.prepare(&format!(
            "INSERT INTO {table_ident} VALUES ({})",
            placeholders.join(", ")
        ))?;
        for row in data.rows() {
            let values = schema
                .iter()
                .zip(row)
                .map(|(col, cell)| col.kind.to_value(cell));
            insert.execute(rusqlite::params_from_iter(values))?;
        }
    }
    tx.commit()?;

    Ok(())
}
