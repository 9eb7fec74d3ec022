//! `talkcsv convert` command implementation.

use crate::config::load_config;
use crate::data::convert::{DONE_NOTICE, convert};
use crate::error::Result;
use std::path::Path;

/// Run the convert command.
///
/// Flags override the `[convert]` section of the config. A `--db` flag is
/// taken as given; the configured target sits next to the executable, where
/// `chat` looks for the fixed database.
///
/// # Errors
///
/// Returns an error if the source cannot be read or parsed, or the database
/// cannot be written.
pub fn run(csv: Option<&Path>, db: Option<&Path>, table: Option<&str>) -> Result<()> {
    let config = load_config()?.convert;

    let csv = csv.unwrap_or(config.csv.as_path());
    let db = db.map_or_else(|| config.db_path(), Path::to_path_buf);
    let table = table.unwrap_or(config.table.as_str());

    convert(csv, &db, table, config.encoding)?;
    println!("{DONE_NOTICE}");

    Ok(())
}
