//! Delimited text parsing and column-type inference.
//!
//! Inference runs per column over its non-empty cells and picks the first
//! type every cell satisfies, in this order:
//! Integer, Real, Boolean, Timestamp, Text.

use crate::config::Encoding;
use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::ReaderBuilder;
use rusqlite::types::Value;
use std::collections::HashSet;

/// Timestamp layouts accepted during inference, besides RFC 3339.
const TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Date-only layout accepted during inference.
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Column type chosen by inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// 64-bit signed integers.
    Integer,
    /// Floating point numbers.
    Real,
    /// `true` / `false`, stored as 1 / 0.
    Boolean,
    /// Dates and date-times, stored as the text the cell holds.
    Timestamp,
    /// Anything else.
    Text,
}

impl ColumnType {
    /// Declared SQL type for a column of this type.
    #[must_use]
    pub fn sql_type(self) -> &'static str {
        match self {
            Self::Integer | Self::Boolean => "INTEGER",
            Self::Real => "REAL",
            Self::Timestamp => "TIMESTAMP",
            Self::Text => "TEXT",
        }
    }

    /// Whether `cell` (already trimmed and non-empty) fits this type.
    fn accepts(self, cell: &str) -> bool {
        match self {
            Self::Integer => cell.parse::<i64>().is_ok(),
            Self::Real => cell.parse::<f64>().is_ok_and(f64::is_finite),
            Self::Boolean => parse_bool(cell).is_some(),
            Self::Timestamp => is_timestamp(cell),
            Self::Text => true,
        }
    }

    /// Convert a cell to a SQL value. Empty cells become NULL.
    #[must_use]
    pub fn to_value(self, cell: &str) -> Value {
        let cell = cell.trim();
        if cell.is_empty() {
            return Value::Null;
        }
        let converted = match self {
            Self::Integer => cell.parse().ok().map(Value::Integer),
            Self::Real => cell
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(Value::Real),
            Self::Boolean => parse_bool(cell).map(|b| Value::Integer(i64::from(b))),
            Self::Timestamp | Self::Text => None,
        };
        converted.unwrap_or_else(|| Value::Text(cell.to_string()))
    }
}

/// Inference order. Text always matches, so it goes last.
const INFERENCE_ORDER: [ColumnType; 5] = [
    ColumnType::Integer,
    ColumnType::Real,
    ColumnType::Boolean,
    ColumnType::Timestamp,
    ColumnType::Text,
];

fn parse_bool(cell: &str) -> Option<bool> {
    if cell.eq_ignore_ascii_case("true") {
        Some(true)
    } else if cell.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

fn is_timestamp(cell: &str) -> bool {
    DateTime::parse_from_rfc3339(cell).is_ok()
        || TIMESTAMP_FORMATS
            .iter()
            .any(|format| NaiveDateTime::parse_from_str(cell, format).is_ok())
        || NaiveDate::parse_from_str(cell, DATE_FORMAT).is_ok()
}

/// A named, typed column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column name, unique within the table.
    pub name: String,
    /// Inferred type.
    pub kind: ColumnType,
}

/// Parsed tabular data: a header row and string cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableData {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl TableData {
    /// Parse comma-delimited bytes with a header row.
    ///
    /// Every record must have as many fields as the header.
    ///
    /// # Errors
    ///
    /// Returns `Error::Load` for empty input, ragged rows, or bytes that are
    /// not valid in `encoding`.
    pub fn parse(bytes: &[u8], encoding: Encoding) -> Result<Self> {
        let text = decode(bytes, encoding)?;

        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(false)
            .from_reader(text.as_bytes());

        let raw_headers = rdr
            .headers()
            .map_err(|e| Error::Load(format!("Failed to read header row: {e}")))?
            .clone();
        if raw_headers.is_empty() {
            return Err(Error::Load("Input has no header row".to_string()));
        }
        let headers = normalize_headers(raw_headers.iter());

        let mut rows = Vec::new();
        for (line, record) in rdr.records().enumerate() {
            let record =
                record.map_err(|e| Error::Load(format!("Malformed row {}: {e}", line + 1)))?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self { headers, rows })
    }

    /// Column names after normalization.
    #[must_use]
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Data rows.
    #[must_use]
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Infer one type per column.
    #[must_use]
    pub fn infer_schema(&self) -> Vec<Column> {
        self.headers
            .iter()
            .enumerate()
            .map(|(idx, name)| Column {
                name: name.clone(),
                kind: self.infer_column(idx),
            })
            .collect()
    }

    fn infer_column(&self, idx: usize) -> ColumnType {
        let cells: Vec<&str> = self
            .rows
            .iter()
            .filter_map(|row| row.get(idx))
            .map(|cell| cell.trim())
            .filter(|cell| !cell.is_empty())
            .collect();

        if cells.is_empty() {
            return ColumnType::Text;
        }

        INFERENCE_ORDER
            .into_iter()
            .find(|kind| cells.iter().all(|cell| kind.accepts(cell)))
            .unwrap_or(ColumnType::Text)
    }
}

fn decode(bytes: &[u8], encoding: Encoding) -> Result<String> {
    match encoding {
        Encoding::Utf8 => String::from_utf8(bytes.to_vec())
            .map_err(|e| Error::Load(format!("Input is not valid UTF-8: {e}"))),
        Encoding::Latin1 => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
    }
}

/// Trim header names, name blank ones `Unnamed: <i>`, and suffix duplicates.
fn normalize_headers<'a>(raw: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut headers = Vec::new();

    for (idx, header) in raw.enumerate() {
        let base = match header.trim() {
            "" => format!("Unnamed: {idx}"),
            name => name.to_string(),
        };

        let mut name = base.clone();
        let mut suffix = 1;
        while !seen.insert(name.to_lowercase()) {
            name = format!("{base}.{suffix}");
            suffix += 1;
        }
        headers.push(name);
    }

    headers
}
