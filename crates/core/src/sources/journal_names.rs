//! Crossref journal title list.

use crate::db_schema::{ColumnMeta, TableMeta, columns};

/// Where Crossref publishes its title list
pub const DEFAULT_SOURCE: &str = "http://ftp.crossref.org/titlelist/titleFile.csv";

/// The imported title list.
pub fn tables() -> Vec<TableMeta> {
    vec![
        TableMeta::new(
            "journal_names",
            columns(&[
                "id",
                "title",
                "crossref_id",
                "publisher",
                "issn_print",
                "issn_eprint",
                "issns_additional",
                "doi",
                "volume_info",
            ]),
        )
        .with_post_population_script("normalize-journal-names-issns.sql"),
    ]
}

/// Tables the post-population script derives from the title list.
pub fn derived_tables() -> Vec<TableMeta> {
    vec![TableMeta::new(
        "journals_issns",
        vec![
            ColumnMeta::new("journal_id"),
            ColumnMeta::new("issn"),
            ColumnMeta::new("issn_type").with_description("A: Additional, E: Electronic, P: Print"),
        ],
    )]
}
