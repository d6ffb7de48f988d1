//! Scopus subject codes of journal ISSNs.
//!
//! There is no published dump; the CSV file is created by the
//! `download` command, which looks up ISSNs through the Scopus Serial
//! Title API.

use crate::db_schema::{ColumnMeta, TableMeta};

/// ISSNs looked up when no query is given
pub const DEFAULT_ISSN_QUERY: &str =
    "SELECT DISTINCT COALESCE(issn_print, issn_electronic) AS issn FROM works \
     WHERE COALESCE(issn_print, issn_electronic) IS NOT NULL";

/// The ISSN subject codes table.
pub fn tables() -> Vec<TableMeta> {
    vec![TableMeta::new(
        "issn_subject_codes",
        vec![
            ColumnMeta::rowid("id"),
            ColumnMeta::new("issn"),
            ColumnMeta::new("subject_code").with_type("INTEGER"),
        ],
    )]
}
