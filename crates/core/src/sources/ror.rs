//! Research Organization Registry (ROR) data.
//!
//! The registry ships as a zip archive holding a single JSON array of
//! organization records. The whole registry forms one container; records
//! are sampled individually and keep their position in the array as id.

use std::io::BufReader;
use std::path::{Path, PathBuf};

use rusqlite::types::Value;
use serde_json::Value as Json;

use super::open_file;
use crate::db_schema::{ColumnMeta, TableMeta, columns};
use crate::error::{Error, Result};
use crate::streaming::{
    Container, ContainerId, ContainerInfo, ContainerVisitor, ElementsCursor, RowSink, Sampler,
    StreamingSource,
};
use crate::values::{element, elements, json_value, member, text};

/// Up to 16k details of each kind per organization
const DETAIL_SHIFT: u32 = 14;

/// Length of the `https://ror.org/` prefix of ROR ids
const ROR_PREFIX_LENGTH: usize = 16;

/// Single-valued detail tables and where their values come from
const DETAILS: [(&str, DetailValues); 7] = [
    ("ror_types", DetailValues::Member("types")),
    ("ror_links", DetailValues::Member("links")),
    ("ror_aliases", DetailValues::Member("aliases")),
    ("ror_acronyms", DetailValues::Member("acronyms")),
    ("ror_funder_ids", DetailValues::ExternalIds("FundRef")),
    ("ror_wikidata_ids", DetailValues::ExternalIds("Wikidata")),
    ("ror_isnis", DetailValues::ExternalIds("ISNI")),
];

#[derive(Debug, Clone, Copy)]
enum DetailValues {
    /// Elements of a top-level array
    Member(&'static str),
    /// The `all` identifiers of an `external_ids` entry
    ExternalIds(&'static str),
}

impl DetailValues {
    fn of(self, record: &Json) -> Vec<&Json> {
        match self {
            Self::Member(key) => elements(record.get(key)).iter().collect(),
            Self::ExternalIds(kind) => {
                match member(member(record.get("external_ids"), kind), "all") {
                    Some(Json::Array(ids)) => ids.iter().collect(),
                    Some(id @ Json::String(_)) => vec![id],
                    _ => Vec::new(),
                }
            }
        }
    }
}

fn details_table(name: &str, value_columns: &[&str]) -> TableMeta {
    let mut table_columns = columns(&["id", "ror_id"]);
    table_columns.extend(value_columns.iter().map(|c| ColumnMeta::new(*c)));
    TableMeta::new(name, table_columns).with_parent("research_organizations", "id", "ror_id")
}

/// The ROR tables, root first.
pub fn tables() -> Vec<TableMeta> {
    vec![
        TableMeta::new(
            "research_organizations",
            vec![
                ColumnMeta::rowid("id"),
                ColumnMeta::new("ror_path"),
                ColumnMeta::new("name"),
                ColumnMeta::new("status"),
                ColumnMeta::new("established"),
                ColumnMeta::new("grid"),
                ColumnMeta::new("address_city"),
                ColumnMeta::new("address_state"),
                ColumnMeta::new("address_postcode"),
                ColumnMeta::new("address_country_code"),
                ColumnMeta::new("address_lat"),
                ColumnMeta::new("address_lng"),
            ],
        ),
        details_table("ror_types", &["type"]),
        details_table("ror_links", &["link"]),
        details_table("ror_aliases", &["alias"]),
        details_table("ror_acronyms", &["acronym"]),
        details_table("ror_relationships", &["type", "ror_path"]),
        details_table("ror_funder_ids", &["funder_id"]),
        details_table("ror_wikidata_ids", &["wikidata_id"]),
        details_table("ror_isnis", &["isni"]),
    ]
}

/// A ROR data dump
#[derive(Debug)]
pub struct RorSource {
    tables: Vec<TableMeta>,
    path: PathBuf,
    sampler: Sampler,
}

impl RorSource {
    /// Read the registry from the zip file at `path`.
    pub fn new(path: &Path, sampler: Sampler) -> Self {
        Self {
            tables: tables(),
            path: path.to_path_buf(),
            sampler,
        }
    }

    fn read_records(&self) -> Result<(String, Vec<Json>)> {
        let zip_error = |source| Error::Zip {
            path: self.path.display().to_string(),
            source,
        };
        let mut archive =
            zip::ZipArchive::new(BufReader::new(open_file(&self.path)?)).map_err(zip_error)?;
        if archive.len() != 1 {
            return Err(Error::message(format!(
                "Expected a single file in {}; found {}",
                self.path.display(),
                archive.len()
            )));
        }
        let file = archive.by_index(0).map_err(zip_error)?;
        let name = file.name().to_string();
        let document: Json = serde_json::from_reader(BufReader::new(file)).map_err(|e| Error::Json {
            context: name.clone(),
            source: e,
        })?;
        match document {
            Json::Array(records) => Ok((name, records)),
            _ => Err(Error::message(format!("{name} does not hold a JSON array"))),
        }
    }
}

impl StreamingSource for RorSource {
    fn tables(&self) -> &[TableMeta] {
        &self.tables
    }

    fn stream(&mut self, visitor: &mut ContainerVisitor<'_>) -> Result<()> {
        let (name, records) = self.read_records()?;
        let records: Vec<(i64, Json)> = records
            .into_iter()
            .enumerate()
            .filter(|_| self.sampler.sample())
            .map(|(index, record)| (index as i64, record))
            .collect();
        tracing::debug!("Read {} ROR records from {name}", records.len());
        let info = ContainerInfo {
            id: ContainerId::SinglePartition,
            name,
        };
        visitor(&info, &Organizations { records })
    }
}

/// The sampled organization records
#[derive(Debug)]
pub struct Organizations {
    records: Vec<(i64, Json)>,
}

/// Strip the `https://ror.org/` prefix.
fn ror_path(id: Option<&Json>) -> Value {
    text(id.and_then(Json::as_str).and_then(|id| id.get(ROR_PREFIX_LENGTH..)))
}

fn organization_row(id: i64, record: &Json) -> Vec<Value> {
    let r = Some(record);
    let address = element(member(r, "addresses"), 0);
    vec![
        Value::Integer(id),
        ror_path(member(r, "id")),
        json_value(member(r, "name")),
        json_value(member(r, "status")),
        json_value(member(r, "established")),
        json_value(member(member(member(r, "external_ids"), "GRID"), "all")),
        json_value(member(address, "city")),
        json_value(member(address, "state")),
        json_value(member(address, "postcode")),
        json_value(member(member(r, "country"), "country_code")),
        json_value(member(address, "lat")),
        json_value(member(address, "lng")),
    ]
}

impl Container for Organizations {
    fn extract(&self, sink: &mut RowSink<'_>) -> Result<()> {
        for (id, record) in &self.records {
            let id = *id;
            sink.insert("research_organizations", id, &organization_row(id, record))?;

            for (table, values) in DETAILS {
                if !sink.wants(table) {
                    continue;
                }
                for (rowid, value) in ElementsCursor::new(id, DETAIL_SHIFT, values.of(record)) {
                    let row = [Value::Integer(rowid), Value::Integer(id), json_value(Some(value))];
                    sink.insert(table, rowid, &row)?;
                }
            }

            if sink.wants("ror_relationships") {
                let relationships = elements(record.get("relationships"));
                for (rowid, relationship) in ElementsCursor::new(id, DETAIL_SHIFT, relationships) {
                    let rel = Some(relationship);
                    let row = [
                        Value::Integer(rowid),
                        Value::Integer(id),
                        json_value(member(rel, "type")),
                        ror_path(member(rel, "id")),
                    ];
                    sink.insert("ror_relationships", rowid, &row)?;
                }
            }
        }
        Ok(())
    }
}
