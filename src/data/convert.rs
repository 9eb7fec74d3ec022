//! Offline conversion of a delimited file into a database table.

use crate::config::Encoding;
use crate::data::handle::load_table;
use crate::data::table::TableData;
use crate::error::{Error, Result};
use rusqlite::Connection;
use std::fs;
use std::path::Path;
use tracing::info;

/// Notice printed after a successful conversion.
pub const DONE_NOTICE: &str = "CSV file has been converted to SQLite database.";

/// Load `csv_path` into `table` of the database at `db_path`.
///
/// The database file is created if needed; an existing table of the same
/// name is replaced. Returns the number of rows written.
///
/// # Errors
///
/// Returns an error if the source cannot be read or parsed, or the database
/// cannot be written.
pub fn convert(csv_path: &Path, db_path: &Path, table: &str, encoding: Encoding) -> Result<usize> {
    let bytes = fs::read(csv_path)?;
    let data = TableData::parse(&bytes, encoding)?;

    let mut conn = Connection::open(db_path)
        .map_err(|e| Error::Connection(format!("{}: {e}", db_path.display())))?;
    load_table(&mut conn, table, &data)?;

    info!(
        source = %csv_path.display(),
        target = %db_path.display(),
        table,
        rows = data.rows().len(),
        "converted delimited file"
    );
    Ok(data.rows().len())
}
