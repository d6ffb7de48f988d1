//! Crossref works metadata.
//!
//! The Crossref public data file is a directory of gzip-compressed JSON
//! files, each holding an `items` array of works. Every file is a
//! container; works, their authors, references, and other details become
//! rows of the tables below.

use std::io::BufReader;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use rusqlite::types::Value;
use serde_json::Value as Json;

use super::{data_files, open_file};
use crate::db_schema::{TableMeta, columns};
use crate::error::{Error, Result};
use crate::streaming::{
    Container, ContainerId, ContainerInfo, ContainerVisitor, ElementsCursor, RowSink, Sampler,
    StreamingSource,
};
use crate::values::{
    boolean_value, element, elements, json_value, len_value, lower_value, member, normalized_doi,
    path, tab_values, text,
};

/// Works per file
const WORK_SHIFT: u32 = 16;
/// Up to 16k authors per work
const AUTHOR_SHIFT: u32 = 14;
/// Up to 128 affiliations per author
const AFFILIATION_SHIFT: u32 = 7;
/// Up to 1k funders per work and awards per funder
const FUNDER_SHIFT: u32 = 10;
/// Up to 1M references, updates, subjects, licenses or links per work
const DETAIL_SHIFT: u32 = 20;

/// The Crossref tables, root first.
pub fn tables() -> Vec<TableMeta> {
    vec![
        TableMeta::new(
            "works",
            columns(&[
                "id",
                "container_id",
                "doi",
                "title",
                "published_year",
                "published_month",
                "published_day",
                "short_container_title",
                "container_title",
                "publisher",
                "abstract",
                "type",
                "subtype",
                "page",
                "volume",
                "article_number",
                "journal_issue",
                "issn_print",
                "issn_electronic",
                "update_count",
                "references_count",
                "is_referenced_by_count",
            ]),
        ),
        TableMeta::new(
            "work_authors",
            columns(&[
                "id",
                "container_id",
                "work_id",
                "orcid",
                "suffix",
                "given",
                "family",
                "name",
                "authenticated_orcid",
                "prefix",
                "sequence",
            ]),
        )
        .with_parent("works", "id", "work_id"),
        TableMeta::new("author_affiliations", columns(&["author_id", "container_id", "name"]))
            .with_parent("work_authors", "id", "author_id"),
        TableMeta::new(
            "work_references",
            columns(&[
                "work_id",
                "container_id",
                "issn",
                "standards_body",
                "issue",
                "key",
                "series_title",
                "isbn_type",
                "doi_asserted_by",
                "first_page",
                "isbn",
                "doi",
                "component",
                "article_title",
                "volume_title",
                "volume",
                "author",
                "standard_designator",
                "year",
                "unstructured",
                "edition",
                "journal_title",
                "issn_type",
            ]),
        )
        .with_parent("works", "id", "work_id"),
        TableMeta::new(
            "work_updates",
            columns(&["work_id", "container_id", "label", "doi", "timestamp"]),
        )
        .with_parent("works", "id", "work_id"),
        TableMeta::new("work_subjects", columns(&["work_id", "container_id", "name"]))
            .with_parent("works", "id", "work_id"),
        TableMeta::new(
            "work_licenses",
            columns(&["work_id", "container_id", "url", "start_timestamp", "delay_in_days"]),
        )
        .with_parent("works", "id", "work_id"),
        TableMeta::new(
            "work_links",
            columns(&["work_id", "container_id", "url", "content_type"]),
        )
        .with_parent("works", "id", "work_id"),
        TableMeta::new(
            "work_funders",
            columns(&["id", "container_id", "work_id", "doi", "name"]),
        )
        .with_parent("works", "id", "work_id"),
        TableMeta::new("funder_awards", columns(&["funder_id", "container_id", "name"]))
            .with_parent("work_funders", "id", "funder_id"),
    ]
}

/// A directory of Crossref `.gz` files
#[derive(Debug)]
pub struct CrossrefSource {
    tables: Vec<TableMeta>,
    files: Vec<PathBuf>,
    sampler: Sampler,
}

impl CrossrefSource {
    /// Open the data files under `directory`.
    pub fn new(directory: &Path, sampler: Sampler) -> Result<Self> {
        Ok(Self {
            tables: tables(),
            files: data_files(directory, ".gz")?,
            sampler,
        })
    }
}

impl StreamingSource for CrossrefSource {
    fn tables(&self) -> &[TableMeta] {
        &self.tables
    }

    fn stream(&mut self, visitor: &mut ContainerVisitor<'_>) -> Result<()> {
        for (index, path) in self.files.iter().enumerate() {
            if !self.sampler.sample() {
                continue;
            }
            let file = WorksFile::read(index as u64, path)?;
            let info = ContainerInfo {
                id: ContainerId::Numbered(index as u64),
                name: path.display().to_string(),
            };
            visitor(&info, &file)?;
        }
        Ok(())
    }
}

/// The decoded works of one file
#[derive(Debug)]
pub struct WorksFile {
    id: i64,
    items: Vec<Json>,
}

impl WorksFile {
    /// Decompress and parse a Crossref file.
    pub fn read(id: u64, path: &Path) -> Result<Self> {
        let reader = BufReader::new(GzDecoder::new(open_file(path)?));
        let mut document: Json = serde_json::from_reader(reader).map_err(|e| Error::Json {
            context: path.display().to_string(),
            source: e,
        })?;
        let items = match document.get_mut("items").map(Json::take) {
            Some(Json::Array(items)) => items,
            _ => Vec::new(),
        };
        Ok(Self {
            id: id as i64,
            items,
        })
    }

    /// Wrap already parsed works.
    pub fn from_items(id: u64, items: Vec<Json>) -> Self {
        Self {
            id: id as i64,
            items,
        }
    }
}

impl Container for WorksFile {
    fn extract(&self, sink: &mut RowSink<'_>) -> Result<()> {
        let container = Value::Integer(self.id);
        for (work_id, work) in ElementsCursor::new(self.id, WORK_SHIFT, &self.items) {
            if sink.wants("works") {
                sink.insert("works", work_id, &work_row(work_id, &container, work))?;
            }
            extract_authors(sink, work_id, &container, work)?;
            extract_funders(sink, work_id, &container, work)?;
            extract_details(sink, work_id, &container, work)?;
        }
        Ok(())
    }
}

fn work_row(work_id: i64, container: &Value, work: &Json) -> Vec<Value> {
    let work = Some(work);
    let date_parts = element(path_of(work, &["published", "date-parts"]), 0);
    vec![
        Value::Integer(work_id),
        container.clone(),
        lower_value(member(work, "DOI")),
        tab_values(member(work, "title")),
        json_value(element(date_parts, 0)),
        json_value(element(date_parts, 1)),
        json_value(element(date_parts, 2)),
        tab_values(member(work, "short-container-title")),
        tab_values(member(work, "container-title")),
        json_value(member(work, "publisher")),
        json_value(member(work, "abstract")),
        json_value(member(work, "type")),
        json_value(member(work, "subtype")),
        json_value(member(work, "page")),
        json_value(member(work, "volume")),
        json_value(member(work, "article-number")),
        json_value(member(member(work, "journal-issue"), "issue")),
        issn_value(work, "print"),
        issn_value(work, "electronic"),
        len_value(member(work, "update-to")),
        json_value(member(work, "references-count")),
        json_value(member(work, "is-referenced-by-count")),
    ]
}

fn path_of<'a>(value: Option<&'a Json>, keys: &[&str]) -> Option<&'a Json> {
    path(value?, keys)
}

/// The ISSN of the given type, without its dash.
fn issn_value(work: Option<&Json>, issn_type: &str) -> Value {
    let issn = elements(member(work, "issn-type"))
        .iter()
        .find(|entry| entry.get("type").and_then(Json::as_str) == Some(issn_type))
        .and_then(|entry| entry.get("value"))
        .and_then(Json::as_str);
    text(issn.map(|issn| issn.replace('-', "")))
}

/// Drop the `http://orcid.org/` prefix of an author's ORCID URL.
fn author_orcid(author: Option<&Json>) -> Value {
    match member(author, "ORCID").and_then(Json::as_str) {
        Some(url) if !url.is_empty() => text(Some(url.get(17..).unwrap_or_default())),
        _ => Value::Null,
    }
}

fn extract_authors(sink: &mut RowSink<'_>, work_id: i64, container: &Value, work: &Json) -> Result<()> {
    let authors = elements(work.get("author"));
    for (author_id, author) in ElementsCursor::new(work_id, AUTHOR_SHIFT, authors) {
        let a = Some(author);
        if sink.wants("work_authors") {
            let row = [
                Value::Integer(author_id),
                container.clone(),
                Value::Integer(work_id),
                author_orcid(a),
                json_value(member(a, "suffix")),
                json_value(member(a, "given")),
                json_value(member(a, "family")),
                json_value(member(a, "name")),
                boolean_value(member(a, "authenticated-orcid")),
                json_value(member(a, "prefix")),
                json_value(member(a, "sequence")),
            ];
            sink.insert("work_authors", author_id, &row)?;
        }
        if !sink.wants("author_affiliations") {
            continue;
        }
        let affiliations = elements(member(a, "affiliation"));
        for (rowid, affiliation) in ElementsCursor::new(author_id, AFFILIATION_SHIFT, affiliations) {
            let row = [
                Value::Integer(author_id),
                container.clone(),
                json_value(member(Some(affiliation), "name")),
            ];
            sink.insert("author_affiliations", rowid, &row)?;
        }
    }
    Ok(())
}

fn extract_funders(sink: &mut RowSink<'_>, work_id: i64, container: &Value, work: &Json) -> Result<()> {
    let funders = elements(work.get("funder"));
    for (funder_id, funder) in ElementsCursor::new(work_id, FUNDER_SHIFT, funders) {
        let f = Some(funder);
        if sink.wants("work_funders") {
            let row = [
                Value::Integer(funder_id),
                container.clone(),
                Value::Integer(work_id),
                lower_value(member(f, "DOI")),
                json_value(member(f, "name")),
            ];
            sink.insert("work_funders", funder_id, &row)?;
        }
        if !sink.wants("funder_awards") {
            continue;
        }
        let awards = elements(member(f, "award"));
        for (rowid, award) in ElementsCursor::new(funder_id, FUNDER_SHIFT, awards) {
            let row = [Value::Integer(funder_id), container.clone(), json_value(Some(award))];
            sink.insert("funder_awards", rowid, &row)?;
        }
    }
    Ok(())
}

/// Work details keyed only by `work_id`.
fn extract_details(sink: &mut RowSink<'_>, work_id: i64, container: &Value, work: &Json) -> Result<()> {
    type RowBuilder = fn(&Json) -> Vec<Value>;
    let details: [(&str, &str, RowBuilder); 5] = [
        ("work_references", "reference", reference_values),
        ("work_updates", "update-to", |u| {
            let u = Some(u);
            vec![
                json_value(member(u, "label")),
                lower_value(member(u, "DOI")),
                json_value(member(member(u, "updated"), "timestamp")),
            ]
        }),
        ("work_subjects", "subject", |s| vec![json_value(Some(s))]),
        ("work_licenses", "license", |l| {
            let l = Some(l);
            vec![
                json_value(member(l, "URL")),
                json_value(member(member(l, "start"), "timestamp")),
                json_value(member(l, "delay-in-days")),
            ]
        }),
        ("work_links", "link", |l| {
            let l = Some(l);
            vec![json_value(member(l, "URL")), json_value(member(l, "content-type"))]
        }),
    ];

    for (table, key, build) in details {
        if !sink.wants(table) {
            continue;
        }
        for (rowid, detail) in ElementsCursor::new(work_id, DETAIL_SHIFT, elements(work.get(key))) {
            let mut row = vec![Value::Integer(work_id), container.clone()];
            row.extend(build(detail));
            sink.insert(table, rowid, &row)?;
        }
    }
    Ok(())
}

fn reference_values(reference: &Json) -> Vec<Value> {
    let r = Some(reference);
    let field = |key: &str| json_value(member(r, key));
    let doi = member(r, "DOI")
        .and_then(Json::as_str)
        .and_then(normalized_doi);
    vec![
        field("issn"),
        field("standards-body"),
        field("issue"),
        field("key"),
        field("series-title"),
        field("isbn-type"),
        field("doi-asserted-by"),
        field("first-page"),
        field("isbn"),
        text(doi),
        field("component"),
        field("article-title"),
        field("volume-title"),
        field("volume"),
        field("author"),
        field("standard-designator"),
        field("year"),
        field("unstructured"),
        field("edition"),
        field("journal-title"),
        field("issn-type"),
    ]
}
