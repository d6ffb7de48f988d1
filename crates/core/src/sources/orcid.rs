//! ORCID public data summaries.
//!
//! The summaries file is a `tar.gz` archive with one XML record per
//! researcher, stored as `root/checksum/ORCID.xml`. Every regular entry is
//! a container holding one `persons` row and its details.

use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use roxmltree::{Document, Node};
use rusqlite::types::Value;

use super::open_file;
use crate::db_schema::{ColumnMeta, TableMeta, columns};
use crate::error::{Error, Result};
use crate::streaming::{
    Container, ContainerId, ContainerInfo, ContainerVisitor, ElementsCursor, RowSink, Sampler,
    StreamingSource,
};
use crate::values::text;
use crate::xml::Namespaces;

/// ORCID XML namespaces share this base
const ORCID: Namespaces = Namespaces::with_base("http://www.orcid.org/ns/");

/// Up to 16k details of each kind per person
const DETAIL_SHIFT: u32 = 14;

/// Column name and the path of its value below a detail element
type Getters = &'static [(&'static str, &'static str)];

const START_END_DATE: Getters = &[
    ("start_year", "common:start-date/common:year"),
    ("start_month", "common:start-date/common:month"),
    ("start_day", "common:start-date/common:day"),
    ("end_year", "common:end-date/common:year"),
    ("end_month", "common:end-date/common:month"),
    ("end_day", "common:end-date/common:day"),
];

const ORGANIZATION: Getters = &[
    ("organization_name", "common:organization/common:name"),
    ("organization_city", "common:organization/common:address/common:city"),
    ("organization_region", "common:organization/common:address/common:region"),
    ("organization_country", "common:organization/common:address/common:country"),
    (
        "organization_identifier",
        "common:organization/common:disambiguated-organization/common:disambiguated-organization-identifier",
    ),
];

const DEPARTMENT_NAME_ROLE: Getters = &[
    ("department_name", "common:department-name"),
    ("role_title", "common:role-title"),
];

const FUNDING: Getters = &[
    ("title", "funding:funding-title"),
    ("type", "funding:funding-type"),
    ("short_description", "common:short-description"),
    ("amount", "common:amount"),
    ("url", "common:url"),
];

const PEER_REVIEW: Getters = &[
    ("reviewer_role", "peer-review:reviewer-role"),
    ("review_type", "peer-review:review-type"),
    ("subject_type", "peer-review:subject-type"),
    ("subject_name", "peer-review:subject-name"),
    ("subject_url", "peer-review:subject-url"),
    ("group_id", "peer-review:review-group-id"),
    ("completion_year", "peer-review:completion-date/common:year"),
    ("completion_month", "peer-review:completion-date/common:month"),
    ("completion_day", "peer-review:completion-date/common:day"),
    ("organization_name", "peer-review:convening-organization/common:name"),
    (
        "organization_city",
        "peer-review:convening-organization/common:address/common:city",
    ),
    (
        "organization_region",
        "peer-review:convening-organization/common:address/common:region",
    ),
    (
        "organization_country",
        "peer-review:convening-organization/common:address/common:country",
    ),
];

const RESEARCH_RESOURCE: Getters = &[
    ("title", "research-resource:proposal/research-resource:title/common:title"),
    ("start_year", "research-resource:proposal/common:start-date/common:year"),
    ("start_month", "research-resource:proposal/common:start-date/common:month"),
    ("start_day", "research-resource:proposal/common:start-date/common:day"),
    ("end_year", "research-resource:proposal/common:end-date/common:year"),
    ("end_month", "research-resource:proposal/common:end-date/common:month"),
    ("end_day", "research-resource:proposal/common:end-date/common:day"),
];

/// Affiliation kinds: table suffix, grouping element, summary element
const AFFILIATIONS: [(&str, &str, &str); 7] = [
    ("distinctions", "distinctions", "distinction:distinction-summary"),
    ("educations", "educations", "education:education-summary"),
    ("employments", "employments", "employment:employment-summary"),
    ("invited_positions", "invited-positions", "invited-position:invited-position-summary"),
    ("memberships", "memberships", "membership:membership-summary"),
    ("qualifications", "qualifications", "qualification:qualification-summary"),
    ("services", "services", "service:service-summary"),
];

const WORKS_PATH: &str = "activities:activities-summary/activities:works/activities:group/common:external-ids";

/// A table of person details: the elements it is read from and its
/// value columns
#[derive(Debug, Clone)]
struct DetailTable {
    name: String,
    elements: String,
    getters: Vec<(&'static str, &'static str)>,
}

impl DetailTable {
    fn new(name: impl Into<String>, elements: impl Into<String>, getters: &[Getters]) -> Self {
        Self {
            name: name.into(),
            elements: elements.into(),
            getters: getters.concat(),
        }
    }

    fn meta(&self) -> TableMeta {
        let mut table_columns = columns(&["id", "container_id", "person_id"]);
        table_columns.extend(self.getters.iter().map(|(name, _)| ColumnMeta::new(*name)));
        TableMeta::new(self.name.clone(), table_columns).with_parent("persons", "id", "person_id")
    }
}

fn detail_tables() -> Vec<DetailTable> {
    let mut details = vec![
        DetailTable::new(
            "person_researcher_urls",
            "person:person/researcher-url:researcher-urls/researcher-url:researcher-url",
            &[&[("name", "researcher-url:url-name"), ("url", "researcher-url:url")]],
        ),
        DetailTable::new(
            "person_countries",
            "person:person/address:addresses/address:address",
            &[&[("country", "address:country")]],
        ),
        DetailTable::new(
            "person_keywords",
            "person:person/keyword:keywords/keyword:keyword",
            &[&[("keyword", "keyword:content")]],
        ),
        DetailTable::new(
            "person_external_identifiers",
            "person:person/external-identifier:external-identifiers/external-identifier:external-identifier",
            &[&[
                ("type", "common:external-id-type"),
                ("value", "common:external-id-value"),
                ("url", "common:external-id-url"),
            ]],
        ),
    ];
    details.extend(AFFILIATIONS.iter().map(|(suffix, group, summary)| {
        DetailTable::new(
            format!("person_{suffix}"),
            format!("activities:activities-summary/activities:{group}/activities:affiliation-group/{summary}"),
            &[ORGANIZATION, DEPARTMENT_NAME_ROLE, START_END_DATE],
        )
    }));
    details.push(DetailTable::new(
        "person_fundings",
        "activities:activities-summary/activities:fundings/activities:group/funding:funding-summary",
        &[FUNDING, START_END_DATE, ORGANIZATION],
    ));
    details.push(DetailTable::new(
        "person_peer_reviews",
        "activities:activities-summary/activities:peer-reviews/activities:group/activities:peer-review-group/peer-review:peer-review-summary",
        &[PEER_REVIEW],
    ));
    details.push(DetailTable::new(
        "person_research_resources",
        "activities:activities-summary/activities:research-resources/activities:group/research-resource:research-resource-summary",
        &[RESEARCH_RESOURCE],
    ));
    details
}

/// The ORCID tables, root first.
pub fn tables() -> Vec<TableMeta> {
    let mut tables = vec![TableMeta::new(
        "persons",
        vec![
            ColumnMeta::rowid("id"),
            ColumnMeta::new("container_id"),
            ColumnMeta::new("orcid"),
            ColumnMeta::new("given_names"),
            ColumnMeta::new("family_name"),
            ColumnMeta::new("biography"),
        ],
    )];
    tables.extend(detail_tables().iter().map(DetailTable::meta));
    tables.push(
        TableMeta::new("person_works", columns(&["id", "container_id", "person_id", "doi"]))
            .with_parent("persons", "id", "person_id"),
    );
    tables
}

/// An ORCID summaries archive
#[derive(Debug)]
pub struct OrcidSource {
    tables: Vec<TableMeta>,
    details: Vec<DetailTable>,
    path: PathBuf,
    sampler: Sampler,
}

impl OrcidSource {
    /// Stream the records of the `tar.gz` file at `path`.
    pub fn new(path: &Path, sampler: Sampler) -> Self {
        Self {
            tables: tables(),
            details: detail_tables(),
            path: path.to_path_buf(),
            sampler,
        }
    }
}

impl StreamingSource for OrcidSource {
    fn tables(&self) -> &[TableMeta] {
        &self.tables
    }

    fn stream(&mut self, visitor: &mut ContainerVisitor<'_>) -> Result<()> {
        let reader = BufReader::new(open_file(&self.path)?);
        let mut archive = tar::Archive::new(GzDecoder::new(reader));
        let entries = archive.entries().map_err(|e| Error::io(&self.path, e))?;

        let mut file_id: u64 = 0;
        for entry in entries {
            let mut entry = entry.map_err(|e| Error::io(&self.path, e))?;
            if !entry.header().entry_type().is_file() {
                continue;
            }
            let id = file_id;
            file_id += 1;

            // The ORCID comes from the entry name, so skipped records are never parsed
            let entry_path = entry.path().map_err(|e| Error::io(&self.path, e))?;
            let file_name = entry_path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            let orcid = file_name
                .strip_suffix(".xml")
                .unwrap_or(&file_name)
                .to_string();
            if !self.sampler.sample() {
                continue;
            }

            let mut xml = String::new();
            entry
                .read_to_string(&mut xml)
                .map_err(|e| Error::io(&self.path, e))?;
            let record = PersonRecord {
                id: id as i64,
                orcid,
                xml,
                details: &self.details,
            };
            let info = ContainerInfo {
                id: ContainerId::Numbered(id),
                name: file_name,
            };
            visitor(&info, &record)?;
        }
        Ok(())
    }
}

/// One researcher's XML record
#[derive(Debug)]
struct PersonRecord<'a> {
    id: i64,
    orcid: String,
    xml: String,
    details: &'a [DetailTable],
}

impl PersonRecord<'_> {
    fn person_row(&self, root: Option<Node<'_, '_>>) -> Vec<Value> {
        let field = |path: &str| text(root.and_then(|root| ORCID.text(root, path)));
        vec![
            Value::Integer(self.id),
            Value::Integer(self.id),
            Value::Text(self.orcid.clone()),
            field("person:person/person:name/personal-details:given-names"),
            field("person:person/person:name/personal-details:family-name"),
            field("person:person/person:biography/personal-details:content"),
        ]
    }
}

impl Container for PersonRecord<'_> {
    fn extract(&self, sink: &mut RowSink<'_>) -> Result<()> {
        let document = Document::parse(&self.xml).map_err(|e| Error::Xml {
            context: format!("{}.xml", self.orcid),
            message: e.to_string(),
        })?;
        let root = document.root_element();

        let Some(orcid) = ORCID.text(root, "common:orcid-identifier/common:path") else {
            tracing::warn!("Error parsing {}", self.orcid);
            return sink.insert("persons", self.id, &self.person_row(None));
        };
        if orcid != self.orcid {
            tracing::warn!(
                "Record {} carries ORCID {orcid}; using the entry name",
                self.orcid
            );
        }
        sink.insert("persons", self.id, &self.person_row(Some(root)))?;

        for detail in self.details {
            if !sink.wants(&detail.name) {
                continue;
            }
            let elements = ORCID.find_all(root, &detail.elements);
            for (rowid, element) in ElementsCursor::new(self.id, DETAIL_SHIFT, elements) {
                let mut row = self.detail_prefix(rowid);
                row.extend(
                    detail
                        .getters
                        .iter()
                        .map(|(_, path)| text(ORCID.text(element, path))),
                );
                sink.insert(&detail.name, rowid, &row)?;
            }
        }

        if sink.wants("person_works") {
            let works = ORCID.find_all(root, WORKS_PATH);
            for (rowid, external_ids) in ElementsCursor::new(self.id, DETAIL_SHIFT, works) {
                // Only the first external id is considered
                let Some(doi) = work_doi(external_ids) else {
                    continue;
                };
                let mut row = self.detail_prefix(rowid);
                row.push(Value::Text(doi));
                sink.insert("person_works", rowid, &row)?;
            }
        }
        Ok(())
    }
}

impl PersonRecord<'_> {
    fn detail_prefix(&self, rowid: i64) -> Vec<Value> {
        vec![
            Value::Integer(rowid),
            Value::Integer(self.id),
            Value::Integer(self.id),
        ]
    }
}

/// The lowercased DOI of a work whose first external id is a DOI.
fn work_doi(external_ids: Node<'_, '_>) -> Option<String> {
    let external_id = ORCID.find(external_ids, "common:external-id")?;
    let id_type = ORCID.text(external_id, "common:external-id-type")?;
    if id_type != "doi" {
        return None;
    }
    ORCID
        .text(external_id, "common:external-id-value")
        .map(|value| value.to_lowercase())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::streaming::StreamingTable;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use rusqlite::Connection;
    use std::collections::HashMap;
    use tempfile::TempDir;

    const NAMESPACES: &str = r#"xmlns:record="http://www.orcid.org/ns/record"
        xmlns:common="http://www.orcid.org/ns/common"
        xmlns:person="http://www.orcid.org/ns/person"
        xmlns:personal-details="http://www.orcid.org/ns/personal-details"
        xmlns:keyword="http://www.orcid.org/ns/keyword"
        xmlns:activities="http://www.orcid.org/ns/activities"
        xmlns:employment="http://www.orcid.org/ns/employment""#;

    fn record(orcid: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<record:record {NAMESPACES}>
  <common:orcid-identifier><common:path>{orcid}</common:path></common:orcid-identifier>
  <person:person>
    <person:name>
      <personal-details:given-names>Ada</personal-details:given-names>
      <personal-details:family-name>Lovelace</personal-details:family-name>
    </person:name>
    <keyword:keywords>
      <keyword:keyword><keyword:content>engines</keyword:content></keyword:keyword>
      <keyword:keyword><keyword:content>poetry</keyword:content></keyword:keyword>
    </keyword:keywords>
  </person:person>
  <activities:activities-summary>
    <activities:employments>
      <activities:affiliation-group>
        <employment:employment-summary>
          <common:role-title>Analyst</common:role-title>
          <common:start-date><common:year>1842</common:year></common:start-date>
          <common:organization>
            <common:name>Analytical Society</common:name>
            <common:address><common:city>London</common:city></common:address>
          </common:organization>
        </employment:employment-summary>
      </activities:affiliation-group>
    </activities:employments>
    <activities:works>
      <activities:group>
        <common:external-ids><common:external-id>
          <common:external-id-type>doi</common:external-id-type>
          <common:external-id-value>10.1000/ABC</common:external-id-value>
        </common:external-id></common:external-ids>
      </activities:group>
      <activities:group>
        <common:external-ids><common:external-id>
          <common:external-id-type>isbn</common:external-id-type>
          <common:external-id-value>123</common:external-id-value>
        </common:external-id></common:external-ids>
      </activities:group>
    </activities:works>
  </activities:activities-summary>
</record:record>"#
        )
    }

    fn write_archive(dir: &Path) -> PathBuf {
        let path = dir.join("summaries.tar.gz");
        let encoder = GzEncoder::new(std::fs::File::create(&path).unwrap(), Compression::default());
        let mut builder = tar::Builder::new(encoder);
        let mut add = |name: &str, data: &[u8], entry_type: tar::EntryType| {
            let mut header = tar::Header::new_gnu();
            header.set_entry_type(entry_type);
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, data).unwrap();
        };
        add("summaries/000/", b"", tar::EntryType::Directory);
        let first = record("0000-0001-0000-0000");
        add("summaries/000/0000-0001-0000-0000.xml", first.as_bytes(), tar::EntryType::Regular);
        let broken = format!(r#"<record:record {NAMESPACES}><person:person/></record:record>"#);
        add("summaries/001/0000-0002-0000-0000.xml", broken.as_bytes(), tar::EntryType::Regular);
        builder.into_inner().unwrap().finish().unwrap();
        path
    }

    fn populate(source: &mut OrcidSource, wanted: &[(&str, &[&str])]) -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        let mut streaming = HashMap::new();
        for (name, cols) in wanted {
            let meta = source.tables().iter().find(|t| t.name == *name).unwrap();
            let cols: Vec<String> = cols.iter().map(|c| (*c).to_string()).collect();
            let table = StreamingTable::new(meta, &cols).unwrap();
            table.create(&conn).unwrap();
            streaming.insert((*name).to_string(), table);
        }
        source
            .stream(&mut |_, container| {
                let mut sink = RowSink::new(&conn, &streaming);
                container.extract(&mut sink)
            })
            .unwrap();
        conn
    }

    #[test]
    fn test_table_layout() {
        let tables = tables();
        assert_eq!(tables.len(), 16);
        let employments = tables.iter().find(|t| t.name == "person_employments").unwrap();
        assert_eq!(
            &employments.column_names()[..5],
            &["id", "container_id", "person_id", "organization_name", "organization_city"]
        );
        assert!(employments.column("end_day").is_some());
        assert!(tables.iter().all(|t| t.name == "persons" || t.foreign_key.as_deref() == Some("person_id")));
    }

    #[test]
    fn test_stream_archive() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_archive(temp_dir.path());
        let mut source = OrcidSource::new(&path, Sampler::all());
        let conn = populate(
            &mut source,
            &[
                ("persons", &["id", "orcid", "given_names", "family_name"]),
                ("person_keywords", &["person_id", "keyword"]),
                ("person_employments", &["role_title", "start_year", "organization_city"]),
                ("person_works", &["person_id", "doi"]),
            ],
        );

        let persons: Vec<(i64, String, Option<String>)> = conn
            .prepare("SELECT id, orcid, given_names FROM persons ORDER BY id")
            .unwrap()
            .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap();
        assert_eq!(
            persons,
            vec![
                (0, "0000-0001-0000-0000".to_string(), Some("Ada".to_string())),
                (1, "0000-0002-0000-0000".to_string(), None),
            ]
        );

        let keywords: i64 = conn
            .query_row("SELECT count(*) FROM person_keywords WHERE person_id = 0", [], |r| r.get(0))
            .unwrap();
        assert_eq!(keywords, 2);

        let (role, year, city): (String, String, String) = conn
            .query_row(
                "SELECT role_title, start_year, organization_city FROM person_employments",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .unwrap();
        assert_eq!((role.as_str(), year.as_str(), city.as_str()), ("Analyst", "1842", "London"));

        let works: Vec<String> = conn
            .prepare("SELECT doi FROM person_works")
            .unwrap()
            .query_map([], |r| r.get(0))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap();
        assert_eq!(works, vec!["10.1000/abc"]);
    }

    #[test]
    fn test_sampling_keeps_ids() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_archive(temp_dir.path());
        let mut source = OrcidSource::new(&path, Sampler::new(0.0, Some(1)).unwrap());
        let mut visited = 0;
        source
            .stream(&mut |_, _| {
                visited += 1;
                Ok(())
            })
            .unwrap();
        assert_eq!(visited, 0);
    }
}
