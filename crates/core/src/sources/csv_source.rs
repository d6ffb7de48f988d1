//! Single-file CSV data sources.
//!
//! The header row is skipped; `id` is the record's 0-based index and the
//! remaining columns map positionally onto the record's fields. The whole
//! file is one container; records are sampled individually.

use std::io::BufReader;
use std::path::{Path, PathBuf};

use rusqlite::types::Value;

use super::open_file;
use crate::db_schema::TableMeta;
use crate::error::{Error, Result};
use crate::streaming::{
    Container, ContainerId, ContainerInfo, ContainerVisitor, RowSink, Sampler, StreamingSource,
};

/// Build a table row from a record's index, its fields, and the table's
/// column count.
pub type RowMapper = fn(i64, &csv::StringRecord, usize) -> Vec<Value>;

/// `id` followed by the record's fields; missing fields are NULL.
pub fn positional_row(index: i64, record: &csv::StringRecord, width: usize) -> Vec<Value> {
    let mut row = Vec::with_capacity(width);
    row.push(Value::Integer(index));
    row.extend(
        (0..width.saturating_sub(1))
            .map(|i| record.get(i).map_or(Value::Null, |field| Value::Text(field.to_string()))),
    );
    row
}

/// A CSV file exposed as a single table
#[derive(Debug)]
pub struct CsvSource {
    tables: Vec<TableMeta>,
    path: PathBuf,
    mapper: RowMapper,
    sampler: Sampler,
}

impl CsvSource {
    /// Read the file at `path` into the first of `tables`.
    pub fn new(path: &Path, tables: Vec<TableMeta>, mapper: RowMapper, sampler: Sampler) -> Self {
        Self {
            tables,
            path: path.to_path_buf(),
            mapper,
            sampler,
        }
    }

    fn table(&self) -> Result<&TableMeta> {
        self.tables
            .first()
            .ok_or_else(|| Error::Internal("CSV source without a table".to_string()))
    }
}

impl StreamingSource for CsvSource {
    fn tables(&self) -> &[TableMeta] {
        &self.tables
    }

    fn stream(&mut self, visitor: &mut ContainerVisitor<'_>) -> Result<()> {
        let table = self.table()?.clone();
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(table.delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(BufReader::new(open_file(&self.path)?));

        let mut records = Vec::new();
        for (index, record) in reader.records().enumerate() {
            let record = record.map_err(|e| Error::Csv {
                context: self.path.display().to_string(),
                source: e,
            })?;
            if self.sampler.sample() {
                records.push((index as i64, record));
            }
        }
        tracing::debug!("Read {} records from {}", records.len(), self.path.display());

        let info = ContainerInfo {
            id: ContainerId::SinglePartition,
            name: self.path.display().to_string(),
        };
        visitor(
            &info,
            &CsvRecords {
                table: &table,
                mapper: self.mapper,
                records,
            },
        )
    }
}

/// The sampled records of a CSV file
#[derive(Debug)]
struct CsvRecords<'a> {
    table: &'a TableMeta,
    mapper: RowMapper,
    records: Vec<(i64, csv::StringRecord)>,
}

impl Container for CsvRecords<'_> {
    fn extract(&self, sink: &mut RowSink<'_>) -> Result<()> {
        let width = self.table.columns.len();
        for (index, record) in &self.records {
            let row = (self.mapper)(*index, record, width);
            sink.insert(&self.table.name, *index, &row)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
pub(crate) mod tests {
    use super::*;
    use crate::streaming::StreamingTable;
    use rusqlite::Connection;
    use std::collections::HashMap;

    /// Stream a CSV source into an in-memory database holding all columns
    /// of its first table.
    pub(crate) fn load(source: &mut CsvSource) -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        let meta = source.tables()[0].clone();
        let all: Vec<String> = meta.column_names().iter().map(|c| (*c).to_string()).collect();
        let table = StreamingTable::new(&meta, &all).unwrap();
        table.create(&conn).unwrap();
        let streaming = HashMap::from([(meta.name.clone(), table)]);
        source
            .stream(&mut |info, container| {
                assert_eq!(info.id, ContainerId::SinglePartition);
                let mut sink = RowSink::new(&conn, &streaming);
                container.extract(&mut sink)
            })
            .unwrap();
        conn
    }

    #[test]
    fn test_positional_row() {
        let record = csv::StringRecord::from(vec!["a", "b"]);
        assert_eq!(
            positional_row(4, &record, 4),
            vec![
                Value::Integer(4),
                Value::Text("a".into()),
                Value::Text("b".into()),
                Value::Null
            ]
        );
    }

    #[test]
    fn test_delimiter_and_sampling() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("data.csv");
        std::fs::write(&path, "x;y\n1;one\n2;two\n3;three\n").unwrap();
        let table = TableMeta::new("pairs", crate::db_schema::columns(&["id", "x", "y"]))
            .with_delimiter(b';');

        let mut source = CsvSource::new(&path, vec![table.clone()], positional_row, Sampler::all());
        let conn = load(&mut source);
        let rows: Vec<(i64, String, String)> = conn
            .prepare("SELECT id, x, y FROM pairs ORDER BY id")
            .unwrap()
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap();
        assert_eq!(rows[0], (0, "1".to_string(), "one".to_string()));
        assert_eq!(rows.len(), 3);

        let mut none = CsvSource::new(
            &path,
            vec![table],
            positional_row,
            Sampler::new(0.0, None).unwrap(),
        );
        let conn = load(&mut none);
        let count: i64 = conn
            .query_row("SELECT count(*) FROM pairs", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
