//! PubMed article metadata.
//!
//! The PubMed baseline and update files are gzip-compressed XML files
//! named `pubmed*.xml.gz`, each holding a `PubmedArticleSet` of articles.
//! Every file is a container. Element names follow the MEDLINE element
//! descriptions at <https://www.nlm.nih.gov/bsd/mms/medlineelements.html>.

use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
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

/// Up to 256k articles per file
const ARTICLE_SHIFT: u32 = 18;

const ARTICLES: &str = "pubmed_articles";

const ARTICLE_IDS: &str = "PubmedData/ArticleIdList/ArticleId";

/// How a column's value is read from its element
#[derive(Debug, Clone, Copy)]
enum Field {
    /// Text of the element at the path; `""` is the element itself
    Text(&'static str),
    /// Attribute of the element at the path; `""` is the element itself
    Attribute(&'static str, &'static str),
    /// Article identifier of the given `IdType`
    ArticleId(&'static str),
    /// The article's DOI, lowercased
    Doi,
    /// Author identifier with any `https://orcid.org/` prefix removed
    Orcid(&'static str),
}

/// A column and the way to obtain its value
#[derive(Debug, Clone, Copy)]
struct Column {
    name: &'static str,
    field: Field,
    data_type: Option<&'static str>,
}

const fn col(name: &'static str, field: Field) -> Column {
    Column {
        name,
        field,
        data_type: None,
    }
}

const fn int(name: &'static str, field: Field) -> Column {
    Column {
        name,
        field,
        data_type: Some("INTEGER"),
    }
}

const fn text_at(path: &'static str) -> Field {
    Field::Text(path)
}

const fn attr(attribute: &'static str, path: &'static str) -> Field {
    Field::Attribute(attribute, path)
}

static ARTICLE_COLUMNS: [Column; 48] = [
    col("pubmed_id", text_at("MedlineCitation/PMID")),
    col("doi", Field::Doi),
    col("publisher_item_identifier_article_id", Field::ArticleId("pii")),
    col("pmc_article_id", Field::ArticleId("pmc")),
    col("journal_title", text_at("MedlineCitation/Article/Journal/Title")),
    col("journal_issn", text_at("MedlineCitation/Article/Journal/ISSN")),
    col("journal_issn_type", attr("IssnType", "MedlineCitation/Article/Journal/ISSN")),
    col(
        "journal_cited_medium",
        attr("CitedMedium", "MedlineCitation/Article/Journal/JournalIssue"),
    ),
    int("journal_volume", text_at("MedlineCitation/Article/Journal/JournalIssue/Volume")),
    int("journal_issue", text_at("MedlineCitation/Article/Journal/JournalIssue/Issue")),
    int("journal_year", text_at("MedlineCitation/Article/Journal/JournalIssue/PubDate/Year")),
    int("journal_month", text_at("MedlineCitation/Article/Journal/JournalIssue/PubDate/Month")),
    int("journal_day", text_at("MedlineCitation/Article/Journal/JournalIssue/PubDate/Day")),
    col(
        "journal_medline_date",
        text_at("MedlineCitation/Article/Journal/JournalIssue/PubDate/MedlineDate"),
    ),
    col("journal_ISO_abbreviation", text_at("MedlineCitation/Article/Journal/ISOAbbreviation")),
    int("article_date_year", text_at("MedlineCitation/Article/ArticleDate/Year")),
    int("article_date_month", text_at("MedlineCitation/Article/ArticleDate/Month")),
    int("article_date_day", text_at("MedlineCitation/Article/ArticleDate/Day")),
    col("article_date_type", attr("DateType", "MedlineCitation/Article/ArticleDate")),
    col("pagination", text_at("MedlineCitation/Article/Pagination/MedlinePgn")),
    col("elocation_id", text_at("MedlineCitation/Article/ELocationID")),
    col("elocation_id_type", attr("EIdType", "MedlineCitation/Article/ELocationID")),
    col("elocation_id_valid", attr("ValidYN", "MedlineCitation/Article/ELocationID")),
    col("language", text_at("MedlineCitation/Article/Language")),
    col("title", text_at("MedlineCitation/Article/ArticleTitle")),
    col("vernacular_title", text_at("MedlineCitation/Article/VernacularTitle")),
    col("journal_country", text_at("MedlineCitation/MedlineJournalInfo/Country")),
    col("medline_ta", text_at("MedlineCitation/MedlineJournalInfo/MedlineTA")),
    col("nlm_unique_id", text_at("MedlineCitation/MedlineJournalInfo/NlmUniqueID")),
    col("issn_linking", text_at("MedlineCitation/MedlineJournalInfo/ISSNLinking")),
    col("article_pubmodel", attr("PubModel", "MedlineCitation/Article")),
    col("citation_subset", text_at("MedlineCitation/CitationSubset")),
    int("completed_year", text_at("MedlineCitation/DateCompleted/Year")),
    int("completed_month", text_at("MedlineCitation/DateCompleted/Month")),
    int("completed_day", text_at("MedlineCitation/DateCompleted/Day")),
    int("revised_year", text_at("MedlineCitation/DateRevised/Year")),
    int("revised_month", text_at("MedlineCitation/DateRevised/Month")),
    int("revised_day", text_at("MedlineCitation/DateRevised/Day")),
    col("coi_statement", text_at("MedlineCitation/CoiStatement")),
    col("medline_citation_status", attr("Status", "MedlineCitation")),
    col("medline_citation_owner", attr("Owner", "MedlineCitation")),
    col("medline_citation_version", attr("VersionID", "MedlineCitation")),
    col("medline_citation_indexing_method", attr("IndexingMethod", "MedlineCitation")),
    col("medline_citation_version_date", attr("VersionDate", "MedlineCitation")),
    col("keyword_list_owner", attr("Owner", "MedlineCitation/KeywordList")),
    col("publication_status", text_at("PubmedData/PublicationStatus")),
    col(
        "abstract_copyright_information",
        text_at("MedlineCitation/Article/Abstract/CopyrightInformation"),
    ),
    col(
        "other_abstract_copyright_information",
        text_at("MedlineCitation/OtherAbstract/CopyrightInformation"),
    ),
];

/// A table of repeated elements below an article or below another
/// detail table's elements
#[derive(Debug)]
struct Detail {
    table: &'static str,
    foreign_key: &'static str,
    /// Path of the repeated elements below the parent element
    path: &'static str,
    shift: u32,
    columns: &'static [Column],
    nested: Option<&'static Detail>,
}

const PERSON_NAME: [Column; 5] = [
    col("given", text_at("ForeName")),
    col("family", text_at("LastName")),
    col("suffix", text_at("Suffix")),
    col("initials", text_at("Initials")),
    col("valid", attr("ValidYN", "")),
];

static AUTHOR_AFFILIATIONS: Detail = Detail {
    table: "pubmed_author_affiliations",
    foreign_key: "author_id",
    path: "AffiliationInfo",
    shift: 4,
    columns: &[
        col("affiliation", text_at("Affiliation")),
        col("identifier", text_at("Identifier")),
    ],
    nested: None,
};

static INVESTIGATOR_AFFILIATIONS: Detail = Detail {
    table: "pubmed_investigator_affiliations",
    foreign_key: "investigator_id",
    path: "AffiliationInfo",
    shift: 4,
    columns: &[
        col("affiliation", text_at("Affiliation")),
        col("identifier", text_at("Identifier")),
    ],
    nested: None,
};

static OTHER_ABSTRACT_TEXTS: Detail = Detail {
    table: "pubmed_other_abstract_texts",
    foreign_key: "abstract_id",
    path: "AbstractText",
    shift: 5,
    columns: &[
        col("text", text_at("")),
        col("label", attr("Label", "")),
        col("nlm_category", attr("NlmCategory", "")),
        col("copyright_information", text_at("CopyrightInformation")),
    ],
    nested: None,
};

static DATA_BANK_ACCESSIONS: Detail = Detail {
    table: "pubmed_data_bank_accessions",
    foreign_key: "data_bank_id",
    path: "AccessionNumberList",
    shift: 5,
    columns: &[col("accession_number", text_at("AccessionNumber"))],
    nested: None,
};

static REFERENCE_ARTICLES: Detail = Detail {
    table: "pubmed_reference_articles",
    foreign_key: "reference_id",
    path: "ArticleIdList",
    shift: 5,
    columns: &[
        col("article_id", text_at("ArticleId")),
        col("id_type", attr("IdType", "ArticleId")),
    ],
    nested: None,
};

/// Detail tables whose parent is the article
static ARTICLE_DETAILS: [Detail; 14] = [
    Detail {
        table: "pubmed_authors",
        foreign_key: "article_id",
        path: "MedlineCitation/Article/AuthorList/Author",
        shift: 14,
        columns: &[
            PERSON_NAME[0],
            PERSON_NAME[1],
            PERSON_NAME[2],
            PERSON_NAME[3],
            PERSON_NAME[4],
            col("identifier", Field::Orcid("Identifier")),
            col("identifier_source", attr("Source", "Identifier")),
            col("collective_name", text_at("CollectiveName")),
        ],
        nested: Some(&AUTHOR_AFFILIATIONS),
    },
    Detail {
        table: "pubmed_investigators",
        foreign_key: "article_id",
        path: "MedlineCitation/InvestigatorList/Investigator",
        shift: 10,
        columns: &[
            PERSON_NAME[0],
            PERSON_NAME[1],
            PERSON_NAME[2],
            PERSON_NAME[3],
            PERSON_NAME[4],
            col("identifier", text_at("Identifier")),
            col("identifier_source", attr("Source", "Identifier")),
        ],
        nested: Some(&INVESTIGATOR_AFFILIATIONS),
    },
    Detail {
        table: "pubmed_abstracts",
        foreign_key: "article_id",
        path: "MedlineCitation/Article/Abstract/AbstractText",
        shift: 14,
        columns: &[
            col("label", attr("Label", "")),
            col("text", text_at("")),
            col("nlm_category", attr("NlmCategory", "")),
            col("copyright_information", text_at("CopyrightInformation")),
        ],
        nested: None,
    },
    Detail {
        table: "pubmed_other_abstracts",
        foreign_key: "article_id",
        path: "MedlineCitation/OtherAbstract",
        shift: 14,
        columns: &[
            col("abstract_type", attr("Type", "")),
            col("language", attr("Language", "")),
        ],
        nested: Some(&OTHER_ABSTRACT_TEXTS),
    },
    Detail {
        table: "pubmed_history",
        foreign_key: "article_id",
        path: "PubmedData/History/PubMedPubDate",
        shift: 14,
        columns: &[
            col("publication_status", attr("PubStatus", "")),
            int("year", text_at("Year")),
            int("month", text_at("Month")),
            int("day", text_at("Day")),
            int("hour", text_at("Hour")),
            int("minute", text_at("Minute")),
        ],
        nested: None,
    },
    Detail {
        table: "pubmed_chemicals",
        foreign_key: "article_id",
        path: "MedlineCitation/ChemicalList/Chemical",
        shift: 14,
        columns: &[
            col("registry_number", text_at("RegistryNumber")),
            col("name_of_substance", text_at("NameOfSubstance")),
            col("unique_identifier", attr("UI", "NameOfSubstance")),
        ],
        nested: None,
    },
    Detail {
        table: "pubmed_meshs",
        foreign_key: "article_id",
        path: "MedlineCitation/MeshHeadingList/MeshHeading",
        shift: 14,
        columns: &[
            col("descriptor_name", text_at("DescriptorName")),
            col("descriptor_unique_identifier", attr("UI", "DescriptorName")),
            col("descriptor_major_topic", attr("MajorTopicYN", "DescriptorName")),
            col("descriptor_type", attr("Type", "DescriptorName")),
            col("qualifier_name", text_at("QualifierName")),
            col("qualifier_major_topic", attr("MajorTopicYN", "QualifierName")),
            col("qualifier_unique_identifier", attr("UI", "QualifierName")),
        ],
        nested: None,
    },
    Detail {
        table: "pubmed_supplement_meshs",
        foreign_key: "article_id",
        path: "MedlineCitation/SupplMeshList/SupplMeshName",
        shift: 4,
        columns: &[
            col("supplement_mesh_name", text_at("")),
            col("unique_identifier", attr("UI", "")),
            col("mesh_type", attr("Type", "")),
        ],
        nested: None,
    },
    Detail {
        table: "pubmed_comments_corrections",
        foreign_key: "article_id",
        path: "MedlineCitation/CommentsCorrectionsList/CommentsCorrections",
        shift: 14,
        columns: &[
            col("ref_type", attr("RefType", "")),
            col("ref_source", text_at("RefSource")),
            col("pmid", text_at("PMID")),
            col("pmid_version", attr("Version", "PMID")),
            col("note", text_at("Note")),
        ],
        nested: None,
    },
    Detail {
        table: "pubmed_keywords",
        foreign_key: "article_id",
        path: "MedlineCitation/KeywordList/Keyword",
        shift: 14,
        columns: &[
            col("keyword", text_at("")),
            col("major_topic", attr("MajorTopicYN", "")),
        ],
        nested: None,
    },
    Detail {
        table: "pubmed_grants",
        foreign_key: "article_id",
        path: "MedlineCitation/Article/GrantList/Grant",
        shift: 14,
        columns: &[
            col("grant_id", text_at("GrantID")),
            col("acronym", text_at("Acronym")),
            col("agency", text_at("Agency")),
            col("country", text_at("Country")),
        ],
        nested: None,
    },
    Detail {
        table: "pubmed_data_banks",
        foreign_key: "article_id",
        path: "MedlineCitation/Article/DataBankList/DataBank",
        shift: 10,
        columns: &[col("data_bank_name", text_at("DataBankName"))],
        nested: Some(&DATA_BANK_ACCESSIONS),
    },
    Detail {
        table: "pubmed_references",
        foreign_key: "article_id",
        path: "PubmedData/ReferenceList/Reference",
        shift: 20,
        columns: &[col("citation", text_at("Citation"))],
        nested: Some(&REFERENCE_ARTICLES),
    },
    Detail {
        table: "pubmed_publication_types",
        foreign_key: "article_id",
        path: "MedlineCitation/Article/PublicationTypeList/PublicationType",
        shift: 20,
        columns: &[
            col("publication_type", text_at("")),
            col("unique_identifier", attr("UI", "")),
        ],
        nested: None,
    },
];

fn column_metas(leading: &[&str], fields: &[Column]) -> Vec<ColumnMeta> {
    let mut metas = columns(leading);
    metas.extend(fields.iter().map(|column| {
        let meta = ColumnMeta::new(column.name);
        match column.data_type {
            Some(data_type) => meta.with_type(data_type),
            None => meta,
        }
    }));
    metas
}

/// The PubMed tables, root first.
pub fn tables() -> Vec<TableMeta> {
    let mut tables = vec![TableMeta::new(
        ARTICLES,
        column_metas(&["id", "container_id"], &ARTICLE_COLUMNS),
    )];
    for detail in &ARTICLE_DETAILS {
        tables.push(detail_table(detail, ARTICLES));
        if let Some(nested) = detail.nested {
            tables.push(detail_table(nested, detail.table));
        }
    }
    tables
}

fn detail_table(detail: &Detail, parent: &str) -> TableMeta {
    TableMeta::new(
        detail.table,
        column_metas(&["id", "container_id", detail.foreign_key], detail.columns),
    )
    .with_parent(parent, "id", detail.foreign_key)
}

/// A directory of PubMed `pubmed*.xml.gz` files
#[derive(Debug)]
pub struct PubmedSource {
    tables: Vec<TableMeta>,
    files: Vec<PathBuf>,
    sampler: Sampler,
}

impl PubmedSource {
    /// Open the data files under `directory`.
    pub fn new(directory: &Path, sampler: Sampler) -> Result<Self> {
        let files = data_files(directory, ".xml.gz")?
            .into_iter()
            .filter(|path| {
                path.file_name()
                    .is_some_and(|name| name.to_string_lossy().starts_with("pubmed"))
            })
            .collect();
        Ok(Self {
            tables: tables(),
            files,
            sampler,
        })
    }
}

impl StreamingSource for PubmedSource {
    fn tables(&self) -> &[TableMeta] {
        &self.tables
    }

    fn stream(&mut self, visitor: &mut ContainerVisitor<'_>) -> Result<()> {
        for (index, path) in self.files.iter().enumerate() {
            if !self.sampler.sample() {
                continue;
            }
            let mut xml = String::new();
            GzDecoder::new(BufReader::new(open_file(path)?))
                .read_to_string(&mut xml)
                .map_err(|e| Error::io(path, e))?;
            let file = ArticlesFile {
                id: index as i64,
                name: path.display().to_string(),
                xml,
            };
            let info = ContainerInfo {
                id: ContainerId::Numbered(index as u64),
                name: file.name.clone(),
            };
            visitor(&info, &file)?;
        }
        Ok(())
    }
}

/// The XML text of one PubMed file
#[derive(Debug)]
pub struct ArticlesFile {
    id: i64,
    name: String,
    xml: String,
}

impl ArticlesFile {
    /// Wrap the decompressed XML of a file.
    pub fn new(id: i64, name: impl Into<String>, xml: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            xml: xml.into(),
        }
    }
}

fn field_value(article: Node<'_, '_>, node: Node<'_, '_>, field: Field) -> Value {
    let ns = Namespaces::NONE;
    match field {
        Field::Text(path) => text(ns.all_text(node, path)),
        Field::Attribute(attribute, "") => text(ns.attribute(node, attribute, None)),
        Field::Attribute(attribute, path) => text(ns.attribute(node, attribute, Some(path))),
        Field::ArticleId(id_type) => text(article_id(article, id_type)),
        Field::Doi => text(article_id(article, "doi").map(|doi| doi.to_lowercase())),
        Field::Orcid(path) => text(ns.all_text(node, path).map(|identifier| {
            identifier
                .strip_prefix("https://orcid.org/")
                .unwrap_or(&identifier)
                .to_string()
        })),
    }
}

fn article_id(article: Node<'_, '_>, id_type: &str) -> Option<String> {
    Namespaces::NONE
        .find_all(article, ARTICLE_IDS)
        .into_iter()
        .find(|id| id.attribute("IdType") == Some(id_type))
        .and_then(|id| id.text().map(str::to_string))
}

fn row(
    rowid: i64,
    container: &Value,
    parent: Option<i64>,
    article: Node<'_, '_>,
    node: Node<'_, '_>,
    fields: &[Column],
) -> Vec<Value> {
    let mut row = vec![Value::Integer(rowid), container.clone()];
    row.extend(parent.map(Value::Integer));
    row.extend(fields.iter().map(|c| field_value(article, node, c.field)));
    row
}

fn extract_detail(
    sink: &mut RowSink<'_>,
    detail: &Detail,
    container: &Value,
    article: Node<'_, '_>,
    parent_rowid: i64,
    parent: Node<'_, '_>,
) -> Result<()> {
    let wanted = sink.wants(detail.table);
    let nested = detail.nested.filter(|nested| sink.wants(nested.table));
    if !wanted && nested.is_none() {
        return Ok(());
    }
    let elements = Namespaces::NONE.find_all(parent, detail.path);
    for (rowid, element) in ElementsCursor::new(parent_rowid, detail.shift, elements) {
        if wanted {
            let values = row(rowid, container, Some(parent_rowid), article, element, detail.columns);
            sink.insert(detail.table, rowid, &values)?;
        }
        if let Some(nested) = nested {
            extract_detail(sink, nested, container, article, rowid, element)?;
        }
    }
    Ok(())
}

impl Container for ArticlesFile {
    fn extract(&self, sink: &mut RowSink<'_>) -> Result<()> {
        let options = ParsingOptions {
            allow_dtd: true,
            ..ParsingOptions::default()
        };
        let document = Document::parse_with_options(&self.xml, options).map_err(|e| Error::Xml {
            context: self.name.clone(),
            message: e.to_string(),
        })?;
        let articles = document
            .root_element()
            .children()
            .filter(|node| node.has_tag_name("PubmedArticle"));
        let container = Value::Integer(self.id);

        for (article_id, article) in ElementsCursor::new(self.id, ARTICLE_SHIFT, articles) {
            if sink.wants(ARTICLES) {
                let values = row(article_id, &container, None, article, article, &ARTICLE_COLUMNS);
                sink.insert(ARTICLES, article_id, &values)?;
            }
            for detail in &ARTICLE_DETAILS {
                extract_detail(sink, detail, &container, article, article_id, article)?;
            }
        }
        Ok(())
    }
}
