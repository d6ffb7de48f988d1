//! Directory of Open Access Journals (DOAJ) metadata.

use crate::db_schema::{ColumnMeta, TableMeta};

/// Where the journal list is published
pub const DEFAULT_SOURCE: &str = "https://doaj.org/csv";

const COLUMNS: [(&str, &str); 54] = [
    ("name", "Journal title"),
    ("url", "Journal URL"),
    ("doaj_url", "URL in DOAJ"),
    ("oaj_start", "When did the journal start to publish all content using an open license?"),
    ("alternative_name", "Alternative title"),
    ("issn_print", "Journal ISSN (print version)"),
    ("issn_eprint", "Journal EISSN (online version)"),
    ("keywords", "Keywords"),
    ("languages", "Languages in which the journal accepts manuscripts"),
    ("publisher", "Publisher"),
    ("pubisher_country", "Country of publisher"),
    ("society", "Society or institution"),
    ("society_country", "Country of society or institution"),
    ("license", "Journal license"),
    ("license_attributes", "License attributes"),
    ("license_terms_url", "URL for license terms"),
    (
        "license_embedded",
        "Machine-readable CC licensing information embedded or displayed in articles",
    ),
    (
        "example_license_embedded_url",
        "URL to an example page with embedded licensing information",
    ),
    ("author_copyright", "Author holds copyright without restrictions"),
    ("copyright_info_url", "Copyright information URL"),
    ("review_process", "Review process"),
    ("review_process_url", "Review process information URL"),
    ("plagiarism_screening", "Journal plagiarism screening policy"),
    ("plagiarism_info_url", "Plagiarism information URL"),
    ("aims_scope_url", "URL for journal's aims & scope"),
    ("board_url", "URL for the Editorial Board page"),
    ("author_instructions_url", "URL for journal's instructions for authors"),
    ("sub_pub_weeks", "Average number of weeks between article submission and publication"),
    ("apc", "APC"),
    ("apc_info_url", "APC information URL"),
    ("apc_amount", "APC amount"),
    ("apc_waiver", "Journal waiver policy (for developing country authors etc)"),
    ("apc_waiver_info_url", "Waiver policy information URL"),
    ("other_fees", "Has other fees"),
    ("other_fees_info_url", "Other fees information URL"),
    ("preservation_services", "Preservation Services"),
    ("preservation_national_library", "Preservation Service: national library"),
    ("preservation_info_url", "Preservation information URL"),
    ("deposit_policy_directory", "Deposit policy directory"),
    ("deposit_policy_directory_url", "URL for deposit policy"),
    ("persistent_article_identifiers", "Persistent article identifiers"),
    ("orcid_in_metadata", "Article metadata includes ORCIDs"),
    ("i4oc_compliance", "Journal complies with I4OC standards for open citations"),
    ("doaj_oa_compliance", "Does the journal comply to DOAJ's definition of open access?"),
    ("oa_statement_url", "URL for journal's Open Access statement"),
    ("continues", "Continues"),
    ("continued_by", "Continued By"),
    ("lcc_codes", "LCC Codes"),
    ("subjects", "Subjects"),
    ("doaj_Seal", "DOAJ Seal"),
    ("added_on", "Added on Date"),
    ("last_updated", "Last updated Date"),
    ("article_records_number", "Number of Article Records"),
    ("most_recent_addition", "Most Recent Article Added"),
];

/// The DOAJ table.
pub fn tables() -> Vec<TableMeta> {
    let mut columns = vec![ColumnMeta::new("id")];
    columns.extend(
        COLUMNS
            .iter()
            .map(|(name, description)| ColumnMeta::new(*name).with_description(*description)),
    );
    vec![
        TableMeta::new("open_access_journals", columns)
            .with_post_population_script("normalize-doaj.sql"),
    ]
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::sources::csv_source::{CsvSource, positional_row, tests::load};
    use crate::streaming::Sampler;

    #[test]
    fn test_columns() {
        let table = &tables()[0];
        assert_eq!(table.columns.len(), 55);
        assert_eq!(table.column_index("issn_print"), Some(6));
        assert_eq!(
            table.column("apc").and_then(|c| c.description.as_deref()),
            Some("APC")
        );
    }

    #[test]
    fn test_read_export() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("doaj.csv");
        std::fs::write(
            &path,
            "Journal title,Journal URL,URL in DOAJ,Start,Alt,ISSN,EISSN\n\
             \"Journal, of Tests\",https://j.example,https://doaj.org/toc/1,2001,,1234-5678,8765-4321\n",
        )
        .unwrap();
        let mut source = CsvSource::new(&path, tables(), positional_row, Sampler::all());
        let conn = load(&mut source);
        let (name, issn, eissn, keywords): (String, String, String, Option<String>) = conn
            .query_row(
                "SELECT name, issn_print, issn_eprint, keywords FROM open_access_journals",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
            )
            .unwrap();
        assert_eq!(name, "Journal, of Tests");
        assert_eq!((issn.as_str(), eissn.as_str()), ("1234-5678", "8765-4321"));
        assert_eq!(keywords, None);
    }
}
