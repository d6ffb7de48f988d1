//! Logged SQL execution helpers.

use a3k_common::debug;
use rusqlite::Connection;

use crate::error::{Error, Result};

/// Log a statement on the `a3k::sql` target and return it.
pub fn log_sql(statement: &str) -> &str {
    tracing::debug!(target: debug::SQL, "{statement}");
    statement
}

/// Execute a statement that returns no rows.
pub fn execute(conn: &Connection, statement: &str) -> Result<()> {
    conn.execute_batch(log_sql(statement))
        .map_err(|e| Error::sql(statement, e))
}

/// Return true if `table` can be read through `conn`.
pub fn table_exists(conn: &Connection, table: &str) -> bool {
    conn.prepare(&format!("SELECT 1 FROM {table}")).is_ok()
}

/// Fail unless `table` exists.
pub fn ensure_table_exists(conn: &Connection, table: &str) -> Result<()> {
    if table_exists(conn, table) {
        Ok(())
    } else {
        Err(Error::message(format!(
            "The required table '{table}' is not populated."
        )))
    }
}

/// Trade durability for insert speed on the named database. A crash
/// leaves it unusable, so it must be populated again from scratch.
pub fn set_fast_writing(conn: &Connection, name: &str) -> Result<()> {
    for pragma in ["synchronous = OFF", "journal_mode = OFF", "locking_mode = EXCLUSIVE"] {
        let statement = format!("PRAGMA {name}.{pragma}");
        // journal_mode returns a row, so execute_batch is used
        execute(conn, &statement)?;
    }
    Ok(())
}

/// Return the single integer produced by `query`.
pub fn query_i64(conn: &Connection, query: &str) -> Result<i64> {
    conn.query_row(log_sql(query), [], |row| row.get(0))
        .map_err(|e| Error::sql(query, e))
}

/// Quote a string as an SQL literal.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
