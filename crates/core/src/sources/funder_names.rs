//! Crossref funder registry names.

use rusqlite::types::Value;

use super::csv_source::positional_row;
use crate::db_schema::{TableMeta, columns};

/// Where Crossref publishes the funder list
pub const DEFAULT_SOURCE: &str = "https://doi.crossref.org/funderNames?mode=list";

/// The funder names table.
pub fn tables() -> Vec<TableMeta> {
    vec![TableMeta::new(
        "funder_names",
        columns(&["id", "url", "name", "replaced"]),
    )]
}

/// Positional mapping with an empty `replaced` field stored as NULL.
pub fn map_row(index: i64, record: &csv::StringRecord, width: usize) -> Vec<Value> {
    let mut row = positional_row(index, record, width);
    if let Some(replaced) = row.get_mut(3)
        && matches!(replaced, Value::Text(text) if text.is_empty())
    {
        *replaced = Value::Null;
    }
    row
}
