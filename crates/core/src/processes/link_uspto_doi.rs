//! Extract DOIs from the free text of USPTO non-patent literature citations.

use std::path::Path;
use std::sync::LazyLock;

use a3k_common::Timer;
use regex::Regex;
use rusqlite::{Connection, params};

use crate::db_schema::{TableMeta, columns};
use crate::error::{Error, Result};
use crate::sql::{ensure_table_exists, execute, log_sql, set_fast_writing};

#[allow(clippy::expect_used)]
static DOI_MATCHER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)((doi: *)|(doi\.org/))([^,; )>]+)").expect("valid DOI pattern")
});

/// DOI prefixes are "10." followed by a registrant code
#[allow(clippy::expect_used)]
static VALID_DOI: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^10\.\d{4,9}/..").expect("valid DOI prefix pattern"));

/// Tables the linking creates.
pub fn tables() -> Vec<TableMeta> {
    vec![TableMeta::new(
        "usp_nplcit_dois",
        columns(&["patent_id", "nplcit_num", "doi"]),
    )]
}

/// Return the DOI cited in `text`, if a well-formed one appears after
/// `doi:` or `doi.org/`.
pub fn extract_doi(text: &str) -> Option<String> {
    let mut doi = DOI_MATCHER.captures(text)?.get(4)?.as_str();
    // A "doi:" may be followed by a DOI URL
    if let Some(inner) = DOI_MATCHER.captures(doi).and_then(|c| c.get(4)) {
        doi = inner.as_str();
    }
    // A trailing full stop ends the citation sentence
    let doi = doi.strip_suffix('.').unwrap_or(doi).to_lowercase();
    VALID_DOI.is_match(&doi).then_some(doi)
}

/// Create `usp_nplcit_dois` from `usp_citations`.
pub fn process(database_path: &Path) -> Result<()> {
    const SELECT: &str = "SELECT patent_id, nplcit_num, nplcit_othercit FROM usp_citations \
                          WHERE nplcit_othercit LIKE '%DOI:%' OR nplcit_othercit LIKE '%doi.org/%'";
    const INSERT: &str = "INSERT INTO usp_nplcit_dois VALUES(?, ?, ?)";

    let timer = Timer::start("link_uspto_doi");
    let conn = Connection::open(database_path)?;
    ensure_table_exists(&conn, "usp_citations")?;
    execute(&conn, "DROP TABLE IF EXISTS usp_nplcit_dois")?;
    execute(&conn, &tables()[0].table_schema("", None))?;
    set_fast_writing(&conn, "main")?;

    let tx = conn.unchecked_transaction()?;
    let mut added = 0;
    {
        let mut select = tx
            .prepare(log_sql(SELECT))
            .map_err(|e| Error::sql(SELECT, e))?;
        let mut insert = tx.prepare(INSERT).map_err(|e| Error::sql(INSERT, e))?;
        let mut rows = select.query([]).map_err(|e| Error::sql(SELECT, e))?;
        while let Some(row) = rows.next().map_err(|e| Error::sql(SELECT, e))? {
            let Some(text) = row.get::<_, Option<String>>(2)? else {
                continue;
            };
            let Some(doi) = extract_doi(&text) else {
                continue;
            };
            let patent_id: rusqlite::types::Value = row.get(0)?;
            let nplcit_num: rusqlite::types::Value = row.get(1)?;
            insert
                .execute(params![patent_id, nplcit_num, doi])
                .map_err(|e| Error::sql(INSERT, e))?;
            added += 1;
        }
    }
    tx.commit()?;
    timer.lap(&format!("added {added} DOIs"));
    timer.finish();
    Ok(())
}
