//! Streaming of source containers into working tables.
//!
//! A [`StreamingSource`] hands its containers one at a time to a visitor.
//! Each [`Container`] emits its rows into a [`RowSink`], which projects them
//! onto the columns the engine asked for and stores them in the matching
//! [`StreamingTable`] of the working database.

use std::collections::HashMap;
use std::fmt;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rusqlite::types::Value;
use rusqlite::{Connection, params_from_iter};

use crate::db_schema::TableMeta;
use crate::error::{Error, Result};

/// Identifier of a container within its source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerId {
    /// Sequentially numbered container of a partitioned source
    Numbered(u64),
    /// The only container of a single-partition source
    SinglePartition,
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numbered(id) => write!(f, "{id}"),
            Self::SinglePartition => f.write_str("SINGLE_PARTITION"),
        }
    }
}

/// Identity of a container handed to a visitor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    /// Container id
    pub id: ContainerId,
    /// File or entry name, for progress reports
    pub name: String,
}

/// A unit of source data that can emit its rows
pub trait Container {
    /// Emit the container's rows into the sink.
    fn extract(&self, sink: &mut RowSink<'_>) -> Result<()>;
}

/// Visitor called once per sampled container
pub type ContainerVisitor<'a> = dyn FnMut(&ContainerInfo, &dyn Container) -> Result<()> + 'a;

/// A data source that can be streamed container by container
pub trait StreamingSource: Send {
    /// Tables of the source; the root table comes first.
    fn tables(&self) -> &[TableMeta];

    /// Call `visitor` for each sampled container.
    fn stream(&mut self, visitor: &mut ContainerVisitor<'_>) -> Result<()>;
}

/// One table's working copy: the selected columns and their insert statement
#[derive(Debug, Clone)]
pub struct StreamingTable {
    meta: TableMeta,
    selected: Vec<usize>,
    insert: String,
}

impl StreamingTable {
    /// Prepare a working table for the named columns of `meta`.
    pub fn new(meta: &TableMeta, columns: &[String]) -> Result<Self> {
        let mut selected = Vec::with_capacity(columns.len());
        for name in columns {
            let index = meta.column_index(name).ok_or_else(|| {
                Error::message(format!("Unknown column name: '{}.{name}'.", meta.name))
            })?;
            if !selected.contains(&index) {
                selected.push(index);
            }
        }
        selected.sort_unstable();

        let names: Vec<&str> = selected
            .iter()
            .map(|&i| meta.columns[i].name.as_str())
            .collect();
        let mut insert_columns = vec!["rowid"];
        insert_columns.extend(&names);
        let placeholders = vec!["?"; insert_columns.len()].join(", ");
        let insert = format!(
            "INSERT INTO {}({}) VALUES ({placeholders})",
            meta.name,
            insert_columns.join(", ")
        );
        Ok(Self {
            meta: meta.clone(),
            selected,
            insert,
        })
    }

    /// Names of the selected columns, in table order.
    pub fn column_names(&self) -> Vec<&str> {
        self.selected
            .iter()
            .map(|&i| self.meta.columns[i].name.as_str())
            .collect()
    }

    /// Untyped `CREATE TABLE` for the working copy.
    pub fn create_statement(&self) -> String {
        let names = self.column_names();
        if names.is_empty() {
            // SQLite tables need at least one column
            return format!("CREATE TABLE {}(_unused)", self.meta.name);
        }
        format!("CREATE TABLE {}({})", self.meta.name, names.join(", "))
    }

    /// Create the working copy in `conn`.
    pub fn create(&self, conn: &Connection) -> Result<()> {
        let statement = self.create_statement();
        crate::sql::execute(conn, &statement)
    }

    /// Drop the working copy from `conn`.
    pub fn drop_table(&self, conn: &Connection) -> Result<()> {
        crate::sql::execute(conn, &format!("DROP TABLE IF EXISTS {}", self.meta.name))
    }

    fn insert(&self, conn: &Connection, rowid: i64, row: &[Value]) -> Result<()> {
        if row.len() != self.meta.columns.len() {
            return Err(Error::Internal(format!(
                "Row for {} has {} values; expected {}",
                self.meta.name,
                row.len(),
                self.meta.columns.len()
            )));
        }
        let mut stmt = conn
            .prepare_cached(&self.insert)
            .map_err(|e| Error::sql(self.insert.clone(), e))?;
        let values = std::iter::once(Value::Integer(rowid))
            .chain(self.selected.iter().map(|&i| row[i].clone()));
        stmt.execute(params_from_iter(values))
            .map_err(|e| Error::sql(self.insert.clone(), e))?;
        Ok(())
    }
}

/// Receiver of the rows a container emits
pub struct RowSink<'a> {
    conn: &'a Connection,
    tables: &'a HashMap<String, StreamingTable>,
    rows: u64,
}

impl fmt::Debug for RowSink<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowSink")
            .field("tables", &self.tables.keys().collect::<Vec<_>>())
            .field("rows", &self.rows)
            .finish()
    }
}

impl<'a> RowSink<'a> {
    /// A sink writing into the given working tables of `conn`.
    pub fn new(conn: &'a Connection, tables: &'a HashMap<String, StreamingTable>) -> Self {
        Self {
            conn,
            tables,
            rows: 0,
        }
    }

    /// Return true if rows of `table` are needed.
    pub fn wants(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    /// Store a row given with all of the table's columns, in table order.
    /// Rows of unwanted tables are ignored.
    pub fn insert(&mut self, table: &str, rowid: i64, row: &[Value]) -> Result<()> {
        let Some(streaming_table) = self.tables.get(table) else {
            return Ok(());
        };
        streaming_table.insert(self.conn, rowid, row)?;
        self.rows += 1;
        Ok(())
    }

    /// Number of rows stored so far.
    pub fn rows(&self) -> u64 {
        self.rows
    }
}

/// Iterator over nested elements, assigning each a row id derived from
/// its parent's: `(parent_rowid << shift) | index`.
#[derive(Debug, Clone)]
pub struct ElementsCursor<I> {
    parent_rowid: i64,
    shift: u32,
    index: i64,
    elements: I,
}

impl<I: Iterator> ElementsCursor<I> {
    /// Enumerate `elements` under the given parent row id.
    pub fn new<T>(parent_rowid: i64, shift: u32, elements: T) -> Self
    where
        T: IntoIterator<IntoIter = I>,
    {
        Self {
            parent_rowid,
            shift,
            index: 0,
            elements: elements.into_iter(),
        }
    }
}

impl<I: Iterator> Iterator for ElementsCursor<I> {
    type Item = (i64, I::Item);

    fn next(&mut self) -> Option<Self::Item> {
        let element = self.elements.next()?;
        let rowid = element_rowid(self.parent_rowid, self.shift, self.index);
        self.index += 1;
        Some((rowid, element))
    }
}

/// Row id of the `index`th element below `parent_rowid`.
pub fn element_rowid(parent_rowid: i64, shift: u32, index: i64) -> i64 {
    (parent_rowid << shift) | index
}

/// Probability sampling of containers or records with a seeded RNG
pub struct Sampler {
    probability: f64,
    rng: StdRng,
}

impl fmt::Debug for Sampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sampler")
            .field("probability", &self.probability)
            .finish()
    }
}

impl Default for Sampler {
    fn default() -> Self {
        Self::all()
    }
}

impl Sampler {
    /// Sample with the given probability; a seed makes runs repeatable.
    pub fn new(probability: f64, seed: Option<u64>) -> Result<Self> {
        if !(0.0..=1.0).contains(&probability) {
            return Err(Error::message(format!(
                "Invalid sampling probability {probability}; expected a value in [0, 1]"
            )));
        }
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self { probability, rng })
    }

    /// Accept everything.
    pub fn all() -> Self {
        Self {
            probability: 1.0,
            rng: StdRng::seed_from_u64(0),
        }
    }

    /// Decide whether the next item is included.
    pub fn sample(&mut self) -> bool {
        if self.probability >= 1.0 {
            return true;
        }
        if self.probability <= 0.0 {
            return false;
        }
        self.rng.gen_bool(self.probability)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::db_schema::columns;

    #[test]
    fn test_elements_cursor_rowids() {
        let ids: Vec<(i64, &str)> = ElementsCursor::new(3, 14, ["a", "b", "c"]).collect();
        assert_eq!(ids, vec![(3 << 14, "a"), ((3 << 14) | 1, "b"), ((3 << 14) | 2, "c")]);
        assert_eq!(element_rowid(element_rowid(2, 16, 5), 7, 1), (((2 << 16) | 5) << 7) | 1);
    }

    #[test]
    fn test_sampler_bounds() {
        assert!(Sampler::new(1.5, None).is_err());
        let mut none = Sampler::new(0.0, Some(1)).unwrap();
        assert!((0..100).all(|_| !none.sample()));
        let mut all = Sampler::all();
        assert!((0..100).all(|_| all.sample()));
    }

    #[test]
    fn test_sampler_seeded_is_repeatable() {
        let draw = || {
            let mut sampler = Sampler::new(0.5, Some(42)).unwrap();
            (0..64).map(|_| sampler.sample()).collect::<Vec<_>>()
        };
        let first = draw();
        assert_eq!(first, draw());
        assert!(first.iter().any(|&b| b) && first.iter().any(|&b| !b));
    }

    #[test]
    fn test_row_sink_projects_columns() {
        let meta = TableMeta::new("items", columns(&["id", "container_id", "name", "size"]));
        let table =
            StreamingTable::new(&meta, &["size".to_string(), "id".to_string()]).unwrap();
        assert_eq!(table.column_names(), vec!["id", "size"]);

        let conn = Connection::open_in_memory().unwrap();
        table.create(&conn).unwrap();
        let tables = HashMap::from([("items".to_string(), table)]);
        let mut sink = RowSink::new(&conn, &tables);
        assert!(sink.wants("items"));
        assert!(!sink.wants("other"));
        sink.insert(
            "items",
            7,
            &[
                Value::Integer(1),
                Value::Integer(0),
                Value::Text("x".into()),
                Value::Integer(10),
            ],
        )
        .unwrap();
        sink.insert("other", 1, &[]).unwrap();
        assert_eq!(sink.rows(), 1);

        let (rowid, id, size): (i64, i64, i64) = conn
            .query_row("SELECT rowid, id, size FROM items", [], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })
            .unwrap();
        assert_eq!((rowid, id, size), (7, 1, 10));
    }

    #[test]
    fn test_unknown_column() {
        let meta = TableMeta::new("items", columns(&["id"]));
        let err = StreamingTable::new(&meta, &["nope".to_string()]).unwrap_err();
        assert!(err.to_string().contains("items.nope"));
    }
}
