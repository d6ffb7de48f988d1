//! CSV rendering of query results.

use std::io::Write;

use a3k_core::data_source::QueryOutput;
use a3k_core::{Error, Result};
use clap::ValueEnum;
use rusqlite::types::Value;

/// Byte order mark written for `utf-8-sig`
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Character encoding of query output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputEncoding {
    /// Plain UTF-8
    #[default]
    #[value(name = "utf-8")]
    Utf8,
    /// UTF-8 preceded by a byte order mark, as some spreadsheets expect
    #[value(name = "utf-8-sig")]
    Utf8Sig,
}

/// Writes query results as CSV records
pub struct CsvOutput<W: Write> {
    writer: csv::Writer<W>,
    header: bool,
    rows: u64,
}

impl<W: Write> std::fmt::Debug for CsvOutput<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsvOutput")
            .field("header", &self.header)
            .field("rows", &self.rows)
            .finish()
    }
}

fn csv_error(source: csv::Error) -> Error {
    Error::Csv {
        context: "query output".to_string(),
        source,
    }
}

impl<W: Write> CsvOutput<W> {
    /// Wrap `inner`, writing the byte order mark right away when the
    /// encoding asks for one.
    pub fn new(mut inner: W, delimiter: u8, header: bool, encoding: OutputEncoding) -> Result<Self> {
        if encoding == OutputEncoding::Utf8Sig {
            inner
                .write_all(UTF8_BOM)
                .map_err(|e| Error::io("query output", e))?;
        }
        let writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_writer(inner);
        Ok(Self {
            writer,
            header,
            rows: 0,
        })
    }

    /// Number of rows written.
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Flush and return the underlying writer.
    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| Error::io("query output", e.into_error()))
    }
}

fn field(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Integer(i) => i.to_string(),
        Value::Real(r) => format!("{r:?}"),
        Value::Text(s) => s.clone(),
        Value::Blob(b) => String::from_utf8_lossy(b).into_owned(),
    }
}

impl<W: Write> QueryOutput for CsvOutput<W> {
    fn columns(&mut self, names: &[String]) -> Result<()> {
        if self.header {
            self.writer.write_record(names).map_err(csv_error)?;
        }
        Ok(())
    }

    fn row(&mut self, values: &[Value]) -> Result<()> {
        self.writer
            .write_record(values.iter().map(field))
            .map_err(csv_error)?;
        self.rows += 1;
        Ok(())
    }
}
