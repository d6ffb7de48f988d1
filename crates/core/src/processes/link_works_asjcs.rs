//! Link Crossref works with ASJC subject codes through their subject names.

use std::path::Path;

use rusqlite::Connection;

use crate::db_schema::{TableMeta, columns};
use crate::error::Result;
use crate::resources::sql_script;
use crate::sql::{ensure_table_exists, execute};

/// Tables the linking creates.
pub fn tables() -> Vec<TableMeta> {
    vec![TableMeta::new("works_asjcs", columns(&["work_id", "asjc_id"]))]
}

/// Create `works_asjcs` from `work_subjects` and `asjcs`.
pub fn process(database_path: &Path) -> Result<()> {
    let conn = Connection::open(database_path)?;
    ensure_table_exists(&conn, "work_subjects")?;
    ensure_table_exists(&conn, "asjcs")?;
    execute(&conn, &sql_script("link-works-asjcs.sql")?)
}
