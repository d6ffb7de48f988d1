//! DataCite DOI metadata.
//!
//! The DataCite public data file is a `tar.gz` archive of JSON-lines files
//! stored as `./<DOI prefix>/<part>.jsonl`, one DataCite record per line.
//! Every file is a container. Field names follow the DataCite metadata
//! schema at <https://schema.datacite.org/meta/kernel-4.0/>.

use std::io::{BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use rusqlite::types::Value;
use serde_json::Value as Json;

use super::open_file;
use crate::db_schema::{ColumnMeta, TableMeta, columns};
use crate::error::{Error, Result};
use crate::streaming::{
    Container, ContainerId, ContainerInfo, ContainerVisitor, ElementsCursor, RowSink, Sampler,
    StreamingSource,
};
use crate::values::{json_value, member, text};

/// Up to 1M records per file
const WORK_SHIFT: u32 = 20;

const WORKS: &str = "dc_works";

/// Column name and the record key holding its value
type Getters = &'static [(&'static str, &'static str)];

/// A table of the elements of a work's array member
#[derive(Debug)]
struct WorkDetail {
    table: &'static str,
    key: &'static str,
    shift: u32,
    getters: Getters,
}

const WORK_DETAILS: [WorkDetail; 7] = [
    WorkDetail {
        table: "dc_work_titles",
        key: "titles",
        shift: 7,
        getters: &[("title", "title"), ("title_type", "titleType")],
    },
    WorkDetail {
        table: "dc_work_subjects",
        key: "subjects",
        shift: 20,
        getters: &[
            ("subject", "subject"),
            ("subject_scheme", "subjectScheme"),
            ("scheme_uri", "schemeUri"),
            ("value_uri", "valueUri"),
        ],
    },
    WorkDetail {
        table: "dc_work_dates",
        key: "dates",
        shift: 7,
        getters: &[("date", "date"), ("date_type", "dateType")],
    },
    WorkDetail {
        table: "dc_work_related_identifiers",
        key: "relatedIdentifiers",
        shift: 7,
        getters: &[
            ("related_identifier", "relatedIdentifier"),
            ("related_identifier_type", "relatedIdentifierType"),
            ("relation_type", "relationType"),
            ("related_metadata_scheme", "relatedMetadataSchema"),
            ("scheme_uri", "schemeUri"),
            ("scheme_type", "schemeType"),
        ],
    },
    WorkDetail {
        table: "dc_work_rights",
        key: "rightsList",
        shift: 10,
        getters: &[
            ("rights", "rights"),
            ("lang", "lang"),
            ("rights_uri", "rightsUri"),
            ("rights_identifier", "rightsIdentifier"),
            ("rights_identifier_scheme", "rightsIdentifierScheme"),
            ("scheme_uri", "schemeUri"),
        ],
    },
    WorkDetail {
        table: "dc_work_descriptions",
        key: "descriptions",
        shift: 7,
        getters: &[("description", "description"), ("description_type", "descriptionType")],
    },
    WorkDetail {
        table: "dc_work_funding_references",
        key: "fundingReferences",
        shift: 10,
        getters: &[
            ("funder_name", "funderName"),
            ("funder_identifier", "funderIdentifier"),
            ("funder_identifier_type", "funderIdentifierType"),
            ("award_number", "awardNumber"),
            ("award_uri", "awardUri"),
            ("award_title", "awardTitle"),
        ],
    },
];

const GEO_LOCATIONS: &str = "dc_work_geo_locations";
const GEO_SHIFT: u32 = 7;

/// Creators or contributors, with their name identifiers and affiliations
#[derive(Debug)]
struct PersonTable {
    table: &'static str,
    key: &'static str,
    foreign_key: &'static str,
    name_identifiers: &'static str,
    affiliations: &'static str,
    getters: Getters,
}

/// Up to 16k creators or contributors per work
const PERSON_SHIFT: u32 = 14;
/// Up to 128 name identifiers or affiliations per person
const PERSON_DETAIL_SHIFT: u32 = 7;

const NAME_IDENTIFIER: Getters = &[
    ("name_identifier", "nameIdentifier"),
    ("name_identifier_scheme", "nameIdentifierScheme"),
    ("scheme_uri", "schemeUri"),
];

const PERSONS: [PersonTable; 2] = [
    PersonTable {
        table: "dc_work_creators",
        key: "creators",
        foreign_key: "creator_id",
        name_identifiers: "dc_creator_name_identifiers",
        affiliations: "dc_creator_affiliations",
        getters: &[
            ("name", "name"),
            ("name_type", "nameType"),
            ("given_name", "givenName"),
            ("family_name", "familyName"),
        ],
    },
    PersonTable {
        table: "dc_work_contributors",
        key: "contributors",
        foreign_key: "contributor_id",
        name_identifiers: "dc_contributor_name_identifiers",
        affiliations: "dc_contributor_affiliations",
        getters: &[
            ("contributor_type", "contributorType"),
            ("name", "name"),
            ("family_name", "familyName"),
            ("given_name", "givenName"),
        ],
    },
];

fn getter_columns(leading: &[&str], getters: Getters) -> Vec<ColumnMeta> {
    let mut names = leading.to_vec();
    names.extend(getters.iter().map(|(column, _)| *column));
    columns(&names)
}

/// The DataCite tables, root first.
pub fn tables() -> Vec<TableMeta> {
    let mut tables = vec![TableMeta::new(
        WORKS,
        columns(&[
            "id",
            "container_id",
            "identifier",
            "identifier_type",
            "doi",
            "publisher",
            "publication_year",
            "resource_type",
            "resource_type_general",
            "language",
            "sizes",
            "formats",
            "schema_version",
            "metadata_version",
            "url",
            "created",
            "registered",
            "published",
            "updated",
        ]),
    )];
    for person in &PERSONS {
        tables.push(
            TableMeta::new(
                person.table,
                getter_columns(&["id", "container_id", "work_id"], person.getters),
            )
            .with_parent(WORKS, "id", "work_id"),
        );
        tables.push(
            TableMeta::new(
                person.name_identifiers,
                getter_columns(&[person.foreign_key, "container_id"], NAME_IDENTIFIER),
            )
            .with_parent(person.table, "id", person.foreign_key),
        );
        tables.push(
            TableMeta::new(
                person.affiliations,
                columns(&[person.foreign_key, "container_id", "name"]),
            )
            .with_parent(person.table, "id", person.foreign_key),
        );
    }
    for detail in &WORK_DETAILS {
        tables.push(
            TableMeta::new(
                detail.table,
                getter_columns(&["work_id", "container_id"], detail.getters),
            )
            .with_parent(WORKS, "id", "work_id"),
        );
    }
    tables.push(
        TableMeta::new(
            GEO_LOCATIONS,
            columns(&[
                "work_id",
                "container_id",
                "geo_location_place",
                "geo_location_point",
                "geo_location_box",
            ]),
        )
        .with_parent(WORKS, "id", "work_id"),
    );
    tables
}

/// A DataCite `tar.gz` archive
#[derive(Debug)]
pub struct DataciteSource {
    tables: Vec<TableMeta>,
    path: PathBuf,
    sampler: Sampler,
}

impl DataciteSource {
    /// Open the archive at `path`.
    pub fn new(path: &Path, sampler: Sampler) -> Self {
        Self {
            tables: tables(),
            path: path.to_path_buf(),
            sampler,
        }
    }
}

impl StreamingSource for DataciteSource {
    fn tables(&self) -> &[TableMeta] {
        &self.tables
    }

    fn stream(&mut self, visitor: &mut ContainerVisitor<'_>) -> Result<()> {
        let reader = BufReader::new(open_file(&self.path)?);
        let mut archive = tar::Archive::new(GzDecoder::new(reader));
        let entries = archive.entries().map_err(|e| Error::io(&self.path, e))?;

        let mut file_id: u64 = 0;
        for entry in entries {
            let mut entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                    tracing::warn!("Truncated archive {}; stopping", self.path.display());
                    break;
                }
                Err(e) => return Err(Error::io(&self.path, e)),
            };
            if !entry.header().entry_type().is_file() {
                continue;
            }
            let id = file_id;
            file_id += 1;
            if !self.sampler.sample() {
                continue;
            }

            // DOI prefix and part name
            let entry_path = entry.path().map_err(|e| Error::io(&self.path, e))?;
            let components: Vec<String> = entry_path
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .filter(|c| c != ".")
                .collect();
            let name = components[components.len().saturating_sub(2)..].join("/");

            let mut lines = String::new();
            entry
                .read_to_string(&mut lines)
                .map_err(|e| Error::io(&self.path, e))?;
            let file = RecordsFile {
                id: id as i64,
                name: name.clone(),
                lines,
            };
            let info = ContainerInfo {
                id: ContainerId::Numbered(id),
                name,
            };
            visitor(&info, &file)?;
        }
        Ok(())
    }
}

/// The JSON lines of one archive member
#[derive(Debug)]
pub struct RecordsFile {
    id: i64,
    name: String,
    lines: String,
}

impl RecordsFile {
    /// Wrap the text of a JSON-lines file.
    pub fn new(id: i64, name: impl Into<String>, lines: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            lines: lines.into(),
        }
    }

    fn records(&self) -> Result<Vec<Json>> {
        self.lines
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line).map_err(|e| Error::Json {
                    context: self.name.clone(),
                    source: e,
                })
            })
            .collect()
    }
}

/// Elements of an array member; some records hold a lone object instead.
fn list<'a>(value: Option<&'a Json>, key: &str) -> Vec<&'a Json> {
    match member(value, key) {
        Some(Json::Array(items)) => items.iter().collect(),
        Some(object @ Json::Object(_)) => vec![object],
        _ => Vec::new(),
    }
}

fn getter_values(item: &Json, getters: Getters) -> impl Iterator<Item = Value> + '_ {
    getters
        .iter()
        .map(move |(_, key)| json_value(member(Some(item), key)))
}

fn float(value: Option<&Json>) -> Option<f64> {
    match value? {
        Json::Number(n) => n.as_f64(),
        Json::String(s) if !s.is_empty() => s.trim().parse().ok(),
        _ => None,
    }
}

/// JSON array text of the named coordinates of a geo-location member.
fn coordinates(location: &Json, key: &str, names: &[&str]) -> Value {
    let point = member(Some(location), key);
    let values: Vec<Option<f64>> = names.iter().map(|name| float(member(point, name))).collect();
    text(serde_json::to_string(&values).ok())
}

fn work_row(work_id: i64, container: &Value, work: &Json) -> Vec<Value> {
    let w = Some(work);
    vec![
        Value::Integer(work_id),
        container.clone(),
        json_value(member(member(w, "container"), "identifier")),
        json_value(member(member(w, "container"), "identifierType")),
        json_value(member(w, "doi")),
        json_value(member(w, "publisher")),
        json_value(member(w, "publicationYear")),
        json_value(member(member(w, "types"), "resourceType")),
        json_value(member(member(w, "types"), "resourceTypeGeneral")),
        json_value(member(w, "language")),
        json_value(member(w, "sizes")),
        json_value(member(w, "formats")),
        json_value(member(w, "schemaVersion")),
        json_value(member(w, "metadataVersion")),
        json_value(member(w, "url")),
        json_value(member(w, "created")),
        json_value(member(w, "registered")),
        json_value(member(w, "published")),
        json_value(member(w, "updated")),
    ]
}

fn extract_persons(sink: &mut RowSink<'_>, work_id: i64, container: &Value, work: &Json) -> Result<()> {
    for person in &PERSONS {
        let wanted = sink.wants(person.table);
        let identifiers = sink.wants(person.name_identifiers);
        let affiliations = sink.wants(person.affiliations);
        if !(wanted || identifiers || affiliations) {
            continue;
        }
        for (person_id, item) in ElementsCursor::new(work_id, PERSON_SHIFT, list(Some(work), person.key)) {
            if wanted {
                let mut row = vec![Value::Integer(person_id), container.clone(), Value::Integer(work_id)];
                row.extend(getter_values(item, person.getters));
                sink.insert(person.table, person_id, &row)?;
            }
            if identifiers {
                let elements = list(Some(item), "nameIdentifiers");
                for (rowid, identifier) in ElementsCursor::new(person_id, PERSON_DETAIL_SHIFT, elements) {
                    let mut row = vec![Value::Integer(person_id), container.clone()];
                    row.extend(getter_values(identifier, NAME_IDENTIFIER));
                    sink.insert(person.name_identifiers, rowid, &row)?;
                }
            }
            if affiliations {
                let elements = list(Some(item), "affiliation");
                for (rowid, affiliation) in ElementsCursor::new(person_id, PERSON_DETAIL_SHIFT, elements) {
                    let name = match affiliation {
                        Json::String(name) => Value::Text(name.clone()),
                        other => json_value(member(Some(other), "name")),
                    };
                    let row = [Value::Integer(person_id), container.clone(), name];
                    sink.insert(person.affiliations, rowid, &row)?;
                }
            }
        }
    }
    Ok(())
}

fn extract_details(sink: &mut RowSink<'_>, work_id: i64, container: &Value, work: &Json) -> Result<()> {
    for detail in &WORK_DETAILS {
        if !sink.wants(detail.table) {
            continue;
        }
        for (rowid, item) in ElementsCursor::new(work_id, detail.shift, list(Some(work), detail.key)) {
            let mut row = vec![Value::Integer(work_id), container.clone()];
            row.extend(getter_values(item, detail.getters));
            sink.insert(detail.table, rowid, &row)?;
        }
    }

    if sink.wants(GEO_LOCATIONS) {
        for (rowid, location) in ElementsCursor::new(work_id, GEO_SHIFT, list(Some(work), "geoLocations")) {
            let row = [
                Value::Integer(work_id),
                container.clone(),
                json_value(member(Some(location), "geoLocationPlace")),
                coordinates(location, "geoLocationPoint", &["pointLongitude", "pointLatitude"]),
                coordinates(
                    location,
                    "geoLocationBox",
                    &[
                        "westBoundLongitude",
                        "eastBoundLongitude",
                        "southBoundLatitude",
                        "northBoundLatitude",
                    ],
                ),
            ];
            sink.insert(GEO_LOCATIONS, rowid, &row)?;
        }
    }
    Ok(())
}

impl Container for RecordsFile {
    fn extract(&self, sink: &mut RowSink<'_>) -> Result<()> {
        let records = self.records()?;
        let container = Value::Integer(self.id);
        for (work_id, work) in ElementsCursor::new(self.id, WORK_SHIFT, &records) {
            if sink.wants(WORKS) {
                sink.insert(WORKS, work_id, &work_row(work_id, &container, work))?;
            }
            extract_persons(sink, work_id, &container, work)?;
            extract_details(sink, work_id, &container, work)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::streaming::StreamingTable;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use rusqlite::Connection;
    use serde_json::json;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn records() -> String {
        let first = json!({
            "doi": "10.5281/zenodo.1",
            "publisher": "Zenodo",
            "publicationYear": 2021,
            "types": {"resourceType": "Dataset", "resourceTypeGeneral": "Dataset"},
            "sizes": ["12 MB"],
            "creators": [
                {
                    "name": "Doe, Jane",
                    "nameType": "Personal",
                    "givenName": "Jane",
                    "familyName": "Doe",
                    "affiliation": {"name": "CERN"},
                    "nameIdentifiers": {"nameIdentifier": "https://orcid.org/0000-0002-1825-0097", "nameIdentifierScheme": "ORCID"}
                },
                {"name": "Lab", "affiliation": ["Plain text affiliation"], "nameIdentifiers": []}
            ],
            "contributors": [],
            "titles": [{"title": "Measurements"}],
            "subjects": [{"subject": "Physics"}, {"subject": "FOS: Physical sciences", "subjectScheme": "Fields of Science"}],
            "geoLocations": [{"geoLocationPlace": "Geneva", "geoLocationPoint": {"pointLongitude": "6.14", "pointLatitude": 46.2}}]
        });
        let second = json!({"doi": "10.5281/zenodo.2", "creators": [], "contributors": []});
        format!("{first}\n{second}\n")
    }

    fn archive(path: &Path) {
        let encoder = GzEncoder::new(std::fs::File::create(path).unwrap(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        for (name, contents) in [
            ("./10.5281/part_00001.jsonl", records()),
            ("./10.5282/part_00001.jsonl", String::new()),
        ] {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, name, contents.as_bytes())
                .unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    fn load(source: &mut DataciteSource) -> (Connection, Vec<String>) {
        let conn = Connection::open_in_memory().unwrap();
        let mut streaming = HashMap::new();
        for meta in &tables() {
            let all: Vec<String> = meta.column_names().iter().map(|c| (*c).to_string()).collect();
            let table = StreamingTable::new(meta, &all).unwrap();
            table.create(&conn).unwrap();
            streaming.insert(meta.name.clone(), table);
        }
        let mut names = Vec::new();
        source
            .stream(&mut |info, container| {
                names.push(info.name.clone());
                let mut sink = RowSink::new(&conn, &streaming);
                container.extract(&mut sink)
            })
            .unwrap();
        (conn, names)
    }

    #[test]
    fn test_tables() {
        let tables = tables();
        assert_eq!(tables.len(), 15);
        assert_eq!(tables[0].name, "dc_works");
        let identifiers = tables
            .iter()
            .find(|t| t.name == "dc_contributor_name_identifiers")
            .unwrap();
        assert_eq!(identifiers.parent_name.as_deref(), Some("dc_work_contributors"));
        assert_eq!(identifiers.foreign_key.as_deref(), Some("contributor_id"));
    }

    #[test]
    fn test_stream_archive() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("datacite.tar.gz");
        archive(&path);

        let mut source = DataciteSource::new(&path, Sampler::all());
        let (conn, names) = load(&mut source);
        assert_eq!(names, vec!["10.5281/part_00001.jsonl", "10.5282/part_00001.jsonl"]);

        let (doi, year, kind, sizes): (String, i64, String, String) = conn
            .query_row(
                "SELECT doi, publication_year, resource_type, sizes FROM dc_works WHERE id = 0",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
            )
            .unwrap();
        assert_eq!(doi, "10.5281/zenodo.1");
        assert_eq!(year, 2021);
        assert_eq!(kind, "Dataset");
        assert_eq!(sizes, r#"["12 MB"]"#);

        let works: i64 = conn
            .query_row("SELECT Count(*) FROM dc_works", [], |r| r.get(0))
            .unwrap();
        assert_eq!(works, 2);

        let affiliations: Vec<(i64, String)> = conn
            .prepare("SELECT creator_id, name FROM dc_creator_affiliations ORDER BY rowid")
            .unwrap()
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap();
        assert_eq!(
            affiliations,
            vec![(0, "CERN".to_string()), (1, "Plain text affiliation".to_string())]
        );

        let (creator, scheme): (i64, String) = conn
            .query_row(
                "SELECT creator_id, name_identifier_scheme FROM dc_creator_name_identifiers",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!((creator, scheme.as_str()), (0, "ORCID"));

        let subject_rowid: i64 = conn
            .query_row(
                "SELECT rowid FROM dc_work_subjects WHERE subject_scheme = 'Fields of Science'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(subject_rowid, 1);

        let (place, point, bounds): (String, String, String) = conn
            .query_row(
                "SELECT geo_location_place, geo_location_point, geo_location_box FROM dc_work_geo_locations",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .unwrap();
        assert_eq!(place, "Geneva");
        assert_eq!(point, "[6.14,46.2]");
        assert_eq!(bounds, "[null,null,null,null]");
    }

    #[test]
    fn test_sampling_keeps_file_numbers() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("datacite.tar.gz");
        archive(&path);
        let mut source = DataciteSource::new(&path, Sampler::new(0.0, Some(1)).unwrap());
        let (_conn, names) = load(&mut source);
        assert!(names.is_empty());
    }

    #[test]
    fn test_malformed_line() {
        let conn = Connection::open_in_memory().unwrap();
        let streaming = HashMap::new();
        let mut sink = RowSink::new(&conn, &streaming);
        let err = RecordsFile::new(0, "broken.jsonl", "{\"doi\": ")
            .extract(&mut sink)
            .unwrap_err();
        assert!(matches!(err, Error::Json { .. }));
    }
}
