//! Link author affiliations to research organizations.
//!
//! Uniquely occurring organization names, aliases, and acronyms are
//! compiled into an Aho-Corasick automaton. Entries found inside other
//! entries are dropped, and each affiliation is linked to the organization
//! whose entry is the longest match in its text.

use std::collections::HashMap;
use std::path::Path;

use a3k_common::{Timer, debug};
use aho_corasick::{AhoCorasick, AhoCorasickBuilder, MatchKind};
use rayon::prelude::*;
use rusqlite::{Connection, params};

use crate::db_schema::{TableMeta, columns};
use crate::error::{Error, Result};
use crate::resources::sql_script;
use crate::sql::{self, ensure_table_exists, execute, log_sql, set_fast_writing};

/// Affiliations matched per batch
const BATCH_SIZE: i64 = 100_000;

/// Tables the linking creates.
pub fn tables() -> Vec<TableMeta> {
    vec![TableMeta::new(
        "work_authors_rors",
        columns(&["ror_id", "work_author_id"]),
    )]
}

/// Select the id and name of entries whose name occurs once in `table`.
pub fn unique_entries(table: &str, id_field: &str, name_field: &str, condition: &str) -> String {
    format!(
        "WITH same_count AS (\n\
         \x20 SELECT {id_field} AS id, {name_field} AS name,\n\
         \x20   Count() OVER (PARTITION BY {name_field}) AS number\n\
         \x20 FROM {table}\n\
         \x20 {condition}\n\
         )\n\
         SELECT id, name FROM same_count WHERE number == 1 AND name IS NOT NULL"
    )
}

/// Organization names with the ROR row id each identifies
#[derive(Debug, Default)]
pub struct NameMatcher {
    names: Vec<String>,
    ids: Vec<i64>,
    index: HashMap<String, usize>,
    automaton: Option<AhoCorasick>,
}

impl NameMatcher {
    /// Add a name; a name added again takes the later id.
    pub fn add(&mut self, ror_id: i64, name: String) {
        if let Some(&i) = self.index.get(&name) {
            self.ids[i] = ror_id;
            return;
        }
        self.index.insert(name.clone(), self.names.len());
        self.names.push(name);
        self.ids.push(ror_id);
    }

    /// Number of names.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Return true if there are no names.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    fn build(names: &[String]) -> Result<AhoCorasick> {
        AhoCorasickBuilder::new()
            .match_kind(MatchKind::Standard)
            .build(names)
            .map_err(|e| Error::Internal(format!("Unable to build name automaton: {e}")))
    }

    /// Drop names occurring inside other names and compile the automaton.
    /// For example, "ai" goes when "Ministry of Foreign Affairs" is present.
    pub fn keep_unique_entries(&mut self) -> Result<()> {
        let automaton = Self::build(&self.names)?;
        let contained: Vec<usize> = self
            .names
            .par_iter()
            .enumerate()
            .flat_map_iter(|(i, name)| {
                automaton
                    .find_overlapping_iter(name.as_str())
                    .map(|m| m.pattern().as_usize())
                    .filter(move |&j| j != i)
                    .collect::<Vec<_>>()
            })
            .collect();

        let mut keep = vec![true; self.names.len()];
        for j in contained {
            keep[j] = false;
        }
        let (names, ids): (Vec<String>, Vec<i64>) = self
            .names
            .drain(..)
            .zip(self.ids.drain(..))
            .zip(keep)
            .filter_map(|(entry, keep)| keep.then_some(entry))
            .unzip();
        self.index = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        self.automaton = Some(Self::build(&names)?);
        self.names = names;
        self.ids = ids;
        Ok(())
    }

    /// The ROR id of the longest name found in `text`; the earliest
    /// ending one wins ties.
    pub fn best_match(&self, text: &str) -> Option<i64> {
        let automaton = self.automaton.as_ref()?;
        let mut best: Option<(usize, i64)> = None;
        for m in automaton.find_overlapping_iter(text) {
            let length = m.len();
            if best.is_none_or(|(best_length, _)| length > best_length) {
                best = Some((length, self.ids[m.pattern().as_usize()]));
            }
        }
        best.map(|(_, id)| id)
    }
}

fn add_unique_entries(conn: &Connection, matcher: &mut NameMatcher, query: &str) -> Result<()> {
    let mut stmt = conn
        .prepare(log_sql(query))
        .map_err(|e| Error::sql(query, e))?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))
        .map_err(|e| Error::sql(query, e))?;
    for row in rows {
        let (id, name) = row.map_err(|e| Error::sql(query, e))?;
        matcher.add(id, name);
    }
    Ok(())
}

/// Create `work_authors_rors`, linking each work author with an
/// identifiable affiliation to an organization. With `link_to_top` the
/// links are then moved to each organization's topmost parent.
pub fn link_author_affiliations(database_path: &Path, link_to_top: bool) -> Result<()> {
    let timer = Timer::start("link author affiliations");
    let conn = Connection::open(database_path)?;
    ensure_table_exists(&conn, "research_organizations")?;
    ensure_table_exists(&conn, "author_affiliations")?;
    execute(&conn, "DROP TABLE IF EXISTS work_authors_rors")?;
    execute(&conn, &tables()[0].table_schema("", None))?;
    set_fast_writing(&conn, "main")?;

    let mut matcher = NameMatcher::default();
    // Skip ambiguous names, such as the many "Ministry of Health" entries
    add_unique_entries(
        &conn,
        &mut matcher,
        &unique_entries("research_organizations", "id", "name", "WHERE status != 'withdrawn'"),
    )?;
    timer.lap("Automaton add names");
    for (table, field) in [("ror_aliases", "alias"), ("ror_acronyms", "acronym")] {
        if sql::table_exists(&conn, table) {
            add_unique_entries(&conn, &mut matcher, &unique_entries(table, "ror_id", field, ""))?;
        }
    }
    timer.lap(&format!("Automaton add aliases and acronyms len={}", matcher.len()));
    matcher.keep_unique_entries()?;
    timer.lap(&format!("Automaton keep unique entries len={}", matcher.len()));

    let affiliations = link_affiliations(&conn, &matcher)?;
    timer.lap(&format!("Link {affiliations} affiliations"));

    if link_to_top {
        ensure_table_exists(&conn, "ror_relationships")?;
        let script = sql_script("work-authors-top-rors.sql")?;
        execute(&conn, &script)?;
        timer.lap("Link top-level affiliations");
    }
    timer.finish();
    Ok(())
}

/// Match affiliations in batches, returning how many were read.
fn link_affiliations(conn: &Connection, matcher: &NameMatcher) -> Result<u64> {
    const SELECT: &str = "SELECT rowid, author_id, name FROM author_affiliations \
                          WHERE rowid > ? ORDER BY rowid LIMIT ?";
    const INSERT: &str = "INSERT INTO work_authors_rors VALUES(?, ?)";

    let mut examined = 0;
    let mut last_rowid = i64::MIN;
    loop {
        let batch: Vec<(i64, i64, Option<String>)> = {
            let mut stmt = conn
                .prepare_cached(log_sql(SELECT))
                .map_err(|e| Error::sql(SELECT, e))?;
            stmt.query_map(params![last_rowid, BATCH_SIZE], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })
            .map_err(|e| Error::sql(SELECT, e))?
            .collect::<rusqlite::Result<_>>()
            .map_err(|e| Error::sql(SELECT, e))?
        };
        let Some(&(rowid, _, _)) = batch.last() else {
            break;
        };
        last_rowid = rowid;

        let links: Vec<(i64, i64)> = batch
            .par_iter()
            .filter_map(|(_, author_id, name)| {
                let name = name.as_deref().filter(|name| !name.is_empty())?;
                let ror_id = matcher.best_match(name)?;
                tracing::debug!(target: debug::LINK, "Identified {name} as {ror_id}");
                Some((ror_id, *author_id))
            })
            .collect();
        examined += batch.len() as u64;

        let tx = conn.unchecked_transaction()?;
        {
            let mut insert = tx.prepare_cached(INSERT).map_err(|e| Error::sql(INSERT, e))?;
            for (ror_id, author_id) in links {
                insert
                    .execute(params![ror_id, author_id])
                    .map_err(|e| Error::sql(INSERT, e))?;
            }
        }
        tx.commit()?;
    }
    Ok(examined)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn matcher(entries: &[(i64, &str)]) -> NameMatcher {
        let mut matcher = NameMatcher::default();
        for (id, name) in entries {
            matcher.add(*id, (*name).to_string());
        }
        matcher.keep_unique_entries().unwrap();
        matcher
    }

    #[test]
    fn test_contained_entries_are_removed() {
        let m = matcher(&[(1, "Ministry of Foreign Affairs"), (2, "ai"), (3, "MIT")]);
        assert_eq!(m.len(), 2);
        assert_eq!(m.best_match("Dept. of Aid, Ministry of Foreign Affairs"), Some(1));
        assert_eq!(m.best_match("Fairfield"), None);
    }

    #[test]
    fn test_longest_match_wins() {
        let m = matcher(&[(1, "Harvard"), (2, "Boston Medical Center")]);
        assert_eq!(m.best_match("Harvard, Boston Medical Center"), Some(2));
        assert_eq!(m.best_match("Harvard Law School"), Some(1));
    }

    #[test]
    fn test_later_duplicate_wins() {
        let m = matcher(&[(1, "CERN"), (2, "CERN")]);
        assert_eq!(m.len(), 1);
        assert_eq!(m.best_match("at CERN"), Some(2));
    }

    fn fixture(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("db.sqlite");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE research_organizations(id INTEGER PRIMARY KEY, ror_path, name, status);
             INSERT INTO research_organizations VALUES
               (0, '00a', 'University of Nowhere', 'active'),
               (1, '00b', 'Nowhere Hospital', 'active'),
               (2, '00c', 'Ministry of Health', 'active'),
               (3, '00d', 'Ministry of Health', 'active'),
               (4, '00e', 'Old Institute', 'withdrawn');
             CREATE TABLE ror_aliases(id, ror_id, alias);
             INSERT INTO ror_aliases VALUES (0, 0, 'UoN');
             CREATE TABLE ror_relationships(id, ror_id, type, ror_path);
             INSERT INTO ror_relationships VALUES (0, 1, 'Parent', '00a'), (1, 0, 'Child', '00b');
             CREATE TABLE author_affiliations(author_id, container_id, name);
             INSERT INTO author_affiliations VALUES
               (10, 0, 'Dept. of Surgery, Nowhere Hospital'),
               (11, 0, 'UoN, Faraway'),
               (12, 0, 'Ministry of Health'),
               (13, 0, 'Old Institute'),
               (14, 0, NULL);",
        )
        .unwrap();
        path
    }

    fn links(path: &Path) -> Vec<(i64, i64)> {
        let conn = Connection::open(path).unwrap();
        conn.prepare("SELECT ror_id, work_author_id FROM work_authors_rors ORDER BY work_author_id")
            .unwrap()
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap()
    }

    #[test]
    fn test_link_base() {
        let temp_dir = TempDir::new().unwrap();
        let path = fixture(temp_dir.path());
        link_author_affiliations(&path, false).unwrap();
        assert_eq!(links(&path), vec![(1, 10), (0, 11)]);
    }

    #[test]
    fn test_link_top() {
        let temp_dir = TempDir::new().unwrap();
        let path = fixture(temp_dir.path());
        link_author_affiliations(&path, true).unwrap();
        assert_eq!(links(&path), vec![(0, 10), (0, 11)]);
    }

    #[test]
    fn test_requires_tables() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("empty.db");
        let err = link_author_affiliations(&path, false).unwrap_err();
        assert_eq!(
            err.to_string(),
            "The required table 'research_organizations' is not populated."
        );
    }
}
