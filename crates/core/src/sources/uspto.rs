//! USPTO patent grant bibliographic data.
//!
//! The weekly grant files are zip archives holding one XML file of
//! concatenated patent documents. Each document is a container; its
//! classifications and citations become detail rows.

use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use roxmltree::{Document, Node, ParsingOptions};
use rusqlite::types::Value;

use super::{data_files, open_file};
use crate::db_schema::{ColumnMeta, TableMeta, columns};
use crate::error::{Error, Result};
use crate::streaming::{
    Container, ContainerId, ContainerInfo, ContainerVisitor, ElementsCursor, RowSink, Sampler,
    StreamingSource,
};
use crate::values::text;
use crate::xml::Namespaces;

/// Documents are concatenated, each starting with this declaration
pub const XML_DELIMITER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// Up to 16k classifications or citations per patent
const DETAIL_SHIFT: u32 = 14;

const BIBLIOGRAPHY: &str = "us-bibliographic-data-grant";

/// How a column's value is read from a patent document
#[derive(Debug, Clone, Copy)]
enum Field {
    /// Attribute of the root element
    RootAttribute(&'static str),
    /// Text below the bibliographic data
    Text(&'static str),
    /// Attribute of an element below the bibliographic data
    Attribute(&'static str, &'static str),
}

const PATENT_FIELDS: [(&str, Field, Option<&str>); 31] = [
    ("language", Field::RootAttribute("lang"), Some("Fixed EN for publishing.")),
    ("status", Field::RootAttribute("status"), Some("Not used for publishing.")),
    ("country", Field::RootAttribute("country"), Some("Fixed US.")),
    ("filename", Field::RootAttribute("file"), Some("Filename for the specific date.")),
    ("date_produced", Field::RootAttribute("date-produced"), None),
    ("date_published", Field::RootAttribute("date-publ"), None),
    ("type", Field::Attribute("application-reference", "appl-type"), None),
    ("series_code", Field::Text("us-application-series-code"), None),
    ("invention_title", Field::Text("invention-title"), None),
    ("botanic_name", Field::Text("us-botanic/latin-name"), None),
    ("botanic_variety", Field::Text("us-botanic/variety"), None),
    ("claims_number", Field::Text("number-of-claims"), None),
    (
        "figures_number",
        Field::Text("figures/number-of-figures"),
        Some("Excluded element figures-to-publish."),
    ),
    ("drawings_number", Field::Text("figures/number-of-drawing-sheets"), None),
    (
        "microform_number",
        Field::Text("us-microform-quantity"),
        Some("Optical microform appendix."),
    ),
    ("primary_examiner_firstname", Field::Text("examiners/primary-examiner/first-name"), None),
    ("primary_examiner_lastname", Field::Text("examiners/primary-examiner/last-name"), None),
    ("assistant_examiner_firstname", Field::Text("examiners/assistant-examiner/first-name"), None),
    ("assistant_examiner_lastname", Field::Text("examiners/assistant-examiner/last-name"), None),
    ("authorized_officer_firstname", Field::Text("authorized-officer/first-name"), None),
    ("authorized_officer_lastname", Field::Text("authorized-officer/last-name"), None),
    (
        "hague_filing_date",
        Field::Text("hague-agreement-data/international-filing-date/date"),
        None,
    ),
    (
        "hague_reg_pub_date",
        Field::Text("hague-agreement-data/international-registration-publication-date/date"),
        None,
    ),
    (
        "hague_reg_date",
        Field::Text("hague-agreement-data/international-registration-date/date"),
        None,
    ),
    (
        "hague_reg_num",
        Field::Text("hague-agreement-data/international-registration-number"),
        None,
    ),
    (
        "sir_flag",
        Field::Attribute("us-sir-flag", "sir-text"),
        Some("Statutory invention registration flag."),
    ),
    (
        "cpa_flag",
        Field::Attribute("us-issued-on-continued-prosecution-application", "text"),
        Some("Continued prosecution application flag."),
    ),
    (
        "rule47_flag",
        Field::Text("rule-47-flag"),
        Some("Refused to execute the application."),
    ),
    ("publication_doc_number", Field::Text("publication-reference/document-id/doc-number"), None),
    ("publication_kind", Field::Text("publication-reference/document-id/kind"), None),
    ("application_doc_number", Field::Text("application-reference/document-id/doc-number"), None),
];

const CLASSIFICATION_FIELDS: [(&str, &str); 6] = [
    ("section", "section"),
    ("class", "class"),
    ("subclass", "subclass"),
    ("main_group", "main-group"),
    ("subgroup", "subgroup"),
    ("class_level", "classification-level"),
];

/// The USPTO tables, root first.
pub fn tables() -> Vec<TableMeta> {
    let mut patent_columns = columns(&["id", "container_id"]);
    patent_columns.extend(PATENT_FIELDS.iter().map(|(name, _, description)| {
        let column = ColumnMeta::new(*name);
        match description {
            Some(description) => column.with_description(*description),
            None => column,
        }
    }));

    let mut classification_columns = columns(&["id", "container_id", "patent_id"]);
    classification_columns.extend(
        CLASSIFICATION_FIELDS
            .iter()
            .map(|(name, _)| ColumnMeta::new(*name)),
    );

    vec![
        TableMeta::new("us_patents", patent_columns),
        TableMeta::new("usp_icpr_classifications", classification_columns)
            .with_parent("us_patents", "id", "patent_id"),
        TableMeta::new(
            "usp_citations",
            columns(&[
                "id",
                "container_id",
                "patent_id",
                "patcit_num",
                "patcit_country",
                "patcit_doc_number",
                "patcit_kind",
                "nplcit_num",
                "nplcit_othercit",
                "category",
            ]),
        )
        .with_parent("us_patents", "id", "patent_id"),
    ]
}

/// Split a concatenated XML file into its documents.
pub fn split_documents(contents: &str) -> impl Iterator<Item = &str> {
    contents
        .split(XML_DELIMITER)
        .skip(1)
        .map(str::trim)
        .filter(|document| !document.is_empty())
}

/// A directory of weekly USPTO grant zip files
#[derive(Debug)]
pub struct UsptoSource {
    tables: Vec<TableMeta>,
    files: Vec<PathBuf>,
    sampler: Sampler,
}

impl UsptoSource {
    /// Open the zip files under `directory`.
    pub fn new(directory: &Path, sampler: Sampler) -> Result<Self> {
        Ok(Self {
            tables: tables(),
            files: data_files(directory, ".zip")?,
            sampler,
        })
    }
}

/// Return the name and contents of the single XML file in a zip archive.
fn read_zip_xml(path: &Path) -> Result<(String, String)> {
    let zip_error = |source| Error::Zip {
        path: path.display().to_string(),
        source,
    };
    let mut archive = zip::ZipArchive::new(BufReader::new(open_file(path)?)).map_err(zip_error)?;
    let xml_names: Vec<String> = archive
        .file_names()
        .filter(|name| name.to_lowercase().ends_with(".xml"))
        .map(str::to_string)
        .collect();
    let [name] = xml_names.as_slice() else {
        return Err(Error::message(format!(
            "Expected a single XML file in {}; found {}",
            path.display(),
            xml_names.len()
        )));
    };
    let mut contents = String::new();
    archive
        .by_name(name)
        .map_err(zip_error)?
        .read_to_string(&mut contents)
        .map_err(|e| Error::io(path, e))?;
    Ok((name.clone(), contents))
}

impl StreamingSource for UsptoSource {
    fn tables(&self) -> &[TableMeta] {
        &self.tables
    }

    fn stream(&mut self, visitor: &mut ContainerVisitor<'_>) -> Result<()> {
        let mut container_id: u64 = 0;
        for path in &self.files {
            let (name, contents) = read_zip_xml(path)?;
            for (index, xml) in split_documents(&contents).enumerate() {
                let id = container_id;
                container_id += 1;
                if !self.sampler.sample() {
                    continue;
                }
                let info = ContainerInfo {
                    id: ContainerId::Numbered(id),
                    name: format!("{name}[{index}]"),
                };
                visitor(&info, &PatentDocument { id: id as i64, xml })?;
            }
        }
        Ok(())
    }
}

/// One patent grant document
#[derive(Debug)]
pub struct PatentDocument<'a> {
    id: i64,
    xml: &'a str,
}

impl<'a> PatentDocument<'a> {
    /// Wrap the XML text of a single document.
    pub fn new(id: i64, xml: &'a str) -> Self {
        Self { id, xml }
    }
}

fn field_value(root: Node<'_, '_>, bibliography: Option<Node<'_, '_>>, field: Field) -> Value {
    let ns = Namespaces::NONE;
    match field {
        Field::RootAttribute(attribute) => text(root.attribute(attribute)),
        Field::Text(path) => text(bibliography.and_then(|b| ns.all_text(b, path))),
        Field::Attribute(path, attribute) => {
            text(bibliography.and_then(|b| ns.attribute(b, attribute, Some(path))))
        }
    }
}

impl Container for PatentDocument<'_> {
    fn extract(&self, sink: &mut RowSink<'_>) -> Result<()> {
        let options = ParsingOptions {
            allow_dtd: true,
            ..ParsingOptions::default()
        };
        let document = match Document::parse_with_options(self.xml, options) {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!("Skipping unparsable patent document {}: {e}", self.id);
                return Ok(());
            }
        };
        let ns = Namespaces::NONE;
        let root = document.root_element();
        let bibliography = ns.find(root, BIBLIOGRAPHY);
        let container = Value::Integer(self.id);

        if sink.wants("us_patents") {
            let mut row = vec![Value::Integer(self.id), container.clone()];
            row.extend(
                PATENT_FIELDS
                    .iter()
                    .map(|(_, field, _)| field_value(root, bibliography, *field)),
            );
            sink.insert("us_patents", self.id, &row)?;
        }
        let Some(bibliography) = bibliography else {
            return Ok(());
        };

        if sink.wants("usp_icpr_classifications") {
            let classifications = ns.find_all(bibliography, "classifications-ipcr/classification-ipcr");
            for (rowid, classification) in ElementsCursor::new(self.id, DETAIL_SHIFT, classifications) {
                let mut row = vec![Value::Integer(rowid), container.clone(), Value::Integer(self.id)];
                row.extend(
                    CLASSIFICATION_FIELDS
                        .iter()
                        .map(|(_, path)| text(ns.text(classification, path))),
                );
                sink.insert("usp_icpr_classifications", rowid, &row)?;
            }
        }

        if sink.wants("usp_citations") {
            let citations = ns.find_all(bibliography, "us-references-cited/us-citation");
            for (rowid, citation) in ElementsCursor::new(self.id, DETAIL_SHIFT, citations) {
                let row = [
                    Value::Integer(rowid),
                    container.clone(),
                    Value::Integer(self.id),
                    text(ns.attribute(citation, "num", Some("patcit"))),
                    text(ns.text(citation, "patcit/document-id/country")),
                    text(ns.text(citation, "patcit/document-id/doc-number")),
                    text(ns.text(citation, "patcit/document-id/kind")),
                    text(ns.attribute(citation, "num", Some("nplcit"))),
                    text(ns.all_text(citation, "nplcit/othercit")),
                    text(ns.text(citation, "category")),
                ];
                sink.insert("usp_citations", rowid, &row)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::streaming::StreamingTable;
    use rusqlite::Connection;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::TempDir;

    const GRANT: &str = r#"<!DOCTYPE us-patent-grant SYSTEM "us-patent-grant-v45-2014-04-03.dtd" [ ]>
<us-patent-grant lang="EN" file="US09000001-20150407.XML" status="PRODUCTION" country="US" date-produced="20150324" date-publ="20150407">
<us-bibliographic-data-grant>
<publication-reference><document-id><country>US</country><doc-number>09000001</doc-number><kind>B2</kind></document-id></publication-reference>
<application-reference appl-type="utility"><document-id><country>US</country><doc-number>13012345</doc-number></document-id></application-reference>
<us-application-series-code>13</us-application-series-code>
<classifications-ipcr>
<classification-ipcr><classification-level>A</classification-level><section>G</section><class>06</class><subclass>F</subclass><main-group>3</main-group><subgroup>048</subgroup></classification-ipcr>
</classifications-ipcr>
<invention-title id="d2e53">Pump for <i>H2O</i></invention-title>
<us-references-cited>
<us-citation><patcit num="00001"><document-id><country>US</country><doc-number>5000000</doc-number><kind>A</kind></document-id></patcit><category>cited by examiner</category></us-citation>
<us-citation><nplcit num="00002"><othercit>Smith, Pumps, doi: 10.1000/XYZ.</othercit></nplcit><category>cited by applicant</category></us-citation>
</us-references-cited>
<number-of-claims>20</number-of-claims>
<figures><number-of-drawing-sheets>5</number-of-drawing-sheets><number-of-figures>7</number-of-figures></figures>
<examiners><primary-examiner><last-name>Doe</last-name><first-name>Jane</first-name></primary-examiner></examiners>
</us-bibliographic-data-grant>
</us-patent-grant>"#;

    fn weekly_file() -> String {
        format!("{XML_DELIMITER}\n{GRANT}\n{XML_DELIMITER}\n{}\n", GRANT.replace("09000001", "09000002"))
    }

    #[test]
    fn test_split_documents() {
        let contents = weekly_file();
        let documents: Vec<&str> = split_documents(&contents).collect();
        assert_eq!(documents.len(), 2);
        assert!(documents[1].contains("09000002"));
    }

    #[test]
    fn test_stream_zip_files() {
        let temp_dir = TempDir::new().unwrap();
        let mut writer =
            zip::ZipWriter::new(std::fs::File::create(temp_dir.path().join("ipg150407.zip")).unwrap());
        writer
            .start_file("ipg150407.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(weekly_file().as_bytes()).unwrap();
        writer.finish().unwrap();

        let mut source = UsptoSource::new(temp_dir.path(), Sampler::all()).unwrap();
        let conn = Connection::open_in_memory().unwrap();
        let metas = tables();
        let mut streaming = HashMap::new();
        for meta in &metas {
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
        assert_eq!(names, vec!["ipg150407.xml[0]", "ipg150407.xml[1]"]);

        let (id, language, kind, title, claims, examiner): (i64, String, String, String, String, String) = conn
            .query_row(
                "SELECT id, language, type, invention_title, claims_number, \
                 primary_examiner_lastname FROM us_patents WHERE id = 1",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?, r.get(5)?)),
            )
            .unwrap();
        assert_eq!(id, 1);
        assert_eq!(language, "EN");
        assert_eq!(kind, "utility");
        assert_eq!(title, "Pump for H2O");
        assert_eq!(claims, "20");
        assert_eq!(examiner, "Doe");

        let (section, main_group, level): (String, String, String) = conn
            .query_row(
                "SELECT section, main_group, class_level FROM usp_icpr_classifications WHERE patent_id = 0",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .unwrap();
        assert_eq!((section.as_str(), main_group.as_str(), level.as_str()), ("G", "3", "A"));

        let (patcit, nplcit, other): (Option<String>, String, String) = conn
            .query_row(
                "SELECT patcit_num, nplcit_num, nplcit_othercit FROM usp_citations \
                 WHERE patent_id = 0 AND nplcit_num IS NOT NULL",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .unwrap();
        assert_eq!(patcit, None);
        assert_eq!(nplcit, "00002");
        assert_eq!(other, "Smith, Pumps, doi: 10.1000/XYZ.");
        let citation_rowid: i64 = conn
            .query_row("SELECT max(rowid) FROM usp_citations WHERE patent_id = 1", [], |r| r.get(0))
            .unwrap();
        assert_eq!(citation_rowid, (1 << DETAIL_SHIFT) | 1);
    }

    #[test]
    fn test_malformed_document_is_skipped() {
        let conn = Connection::open_in_memory().unwrap();
        let streaming = HashMap::new();
        let mut sink = RowSink::new(&conn, &streaming);
        PatentDocument::new(0, "<us-patent-grant>").extract(&mut sink).unwrap();
        assert_eq!(sink.rows(), 0);
    }
}
