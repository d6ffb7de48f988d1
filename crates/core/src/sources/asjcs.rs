//! Scopus subject areas and All Science Journal Classification (ASJC)
//! codes.
//!
//! The `;`-delimited import table is normalized after population into
//! general fields, subject areas, and the codes themselves.

use crate::db_schema::{TableMeta, columns};

/// The imported ASJC list.
pub fn tables() -> Vec<TableMeta> {
    vec![
        TableMeta::new(
            "asjc_import",
            columns(&["id", "code", "field", "subject_area"]),
        )
        .with_delimiter(b';')
        .with_post_population_script("normalize-asjc.sql"),
    ]
}

/// Tables the post-population script derives from the import.
pub fn derived_tables() -> Vec<TableMeta> {
    vec![
        TableMeta::new("asjc_general_fields", columns(&["id", "name"])),
        TableMeta::new("asjc_subject_areas", columns(&["id", "name"])),
        TableMeta::new(
            "asjcs",
            columns(&["id", "field", "subject_area_id", "general_field_id"]),
        ),
    ]
}
