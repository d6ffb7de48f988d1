//! The data sources a3k can stream, and their registry.

pub mod asjcs;
pub mod crossref;
pub mod csv_source;
pub mod datacite;
pub mod doaj;
pub mod funder_names;
pub mod issn_subject_codes;
pub mod journal_names;
pub mod orcid;
pub mod pubmed;
pub mod ror;
pub mod uspto;

use std::fmt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use a3k_common::debug;

use crate::db_schema::TableMeta;
use crate::error::{Error, Result};
use crate::streaming::{Sampler, StreamingSource};

/// The available data sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// Crossref works metadata
    Crossref,
    /// ORCID person summaries
    Orcid,
    /// PubMed article metadata
    Pubmed,
    /// DataCite DOI metadata
    Datacite,
    /// Research Organization Registry
    Ror,
    /// USPTO patent grants
    Uspto,
    /// Directory of Open Access Journals
    Doaj,
    /// Crossref journal title list
    JournalNames,
    /// Crossref funder registry names
    FunderNames,
    /// Scopus All Science Journal Classification codes
    Asjcs,
    /// Scopus subject codes of ISSNs
    IssnSubjectCodes,
}

impl SourceKind {
    /// All sources, in listing order.
    pub const ALL: [Self; 11] = [
        Self::Asjcs,
        Self::Crossref,
        Self::Datacite,
        Self::Doaj,
        Self::FunderNames,
        Self::IssnSubjectCodes,
        Self::JournalNames,
        Self::Orcid,
        Self::Pubmed,
        Self::Ror,
        Self::Uspto,
    ];

    /// Name used on the command line.
    pub fn name(self) -> &'static str {
        match self {
            Self::Crossref => "crossref",
            Self::Orcid => "orcid",
            Self::Pubmed => "pubmed",
            Self::Datacite => "datacite",
            Self::Ror => "ror",
            Self::Uspto => "uspto",
            Self::Doaj => "doaj",
            Self::JournalNames => "journal-names",
            Self::FunderNames => "funder-names",
            Self::Asjcs => "asjcs",
            Self::IssnSubjectCodes => "issn-subject-codes",
        }
    }

    /// One-line description.
    pub fn description(self) -> &'static str {
        match self {
            Self::Crossref => "Crossref publication data",
            Self::Orcid => "Open Researcher and Contributor ID (ORCID) data",
            Self::Pubmed => "PubMed publication data",
            Self::Datacite => "DataCite publication data",
            Self::Ror => "Research Organization Registry (ROR) data",
            Self::Uspto => "US Patent and Trademark Office patent grants",
            Self::Doaj => "Directory of Open Access Journals (DOAJ) metadata",
            Self::JournalNames => "Crossref journal names and ISSNs",
            Self::FunderNames => "Crossref funder names",
            Self::Asjcs => "Scopus All Science Journal Classification Codes (ASJC)",
            Self::IssnSubjectCodes => "Scopus subject codes of journal ISSNs",
        }
    }

    /// Location used when none is given.
    pub fn default_source(self) -> Option<&'static str> {
        match self {
            Self::Doaj => Some(doaj::DEFAULT_SOURCE),
            Self::JournalNames => Some(journal_names::DEFAULT_SOURCE),
            Self::FunderNames => Some(funder_names::DEFAULT_SOURCE),
            _ => None,
        }
    }

    /// Tables of the source, root first.
    pub fn tables(self) -> Vec<TableMeta> {
        match self {
            Self::Crossref => crossref::tables(),
            Self::Orcid => orcid::tables(),
            Self::Pubmed => pubmed::tables(),
            Self::Datacite => datacite::tables(),
            Self::Ror => ror::tables(),
            Self::Uspto => uspto::tables(),
            Self::Doaj => doaj::tables(),
            Self::JournalNames => journal_names::tables(),
            Self::FunderNames => funder_names::tables(),
            Self::Asjcs => asjcs::tables(),
            Self::IssnSubjectCodes => issn_subject_codes::tables(),
        }
    }

    /// Tables listed in the source's schema: the streamed ones followed
    /// by those its post-population scripts derive.
    pub fn schema_tables(self) -> Vec<TableMeta> {
        let mut tables = self.tables();
        match self {
            Self::JournalNames => tables.extend(journal_names::derived_tables()),
            Self::Asjcs => tables.extend(asjcs::derived_tables()),
            _ => {}
        }
        tables
    }

    /// Open the source at a local path.
    pub fn open(self, location: &Path, sampler: Sampler) -> Result<Box<dyn StreamingSource>> {
        Ok(match self {
            Self::Crossref => Box::new(crossref::CrossrefSource::new(location, sampler)?),
            Self::Orcid => Box::new(orcid::OrcidSource::new(location, sampler)),
            Self::Pubmed => Box::new(pubmed::PubmedSource::new(location, sampler)?),
            Self::Datacite => Box::new(datacite::DataciteSource::new(location, sampler)),
            Self::Ror => Box::new(ror::RorSource::new(location, sampler)),
            Self::Uspto => Box::new(uspto::UsptoSource::new(location, sampler)?),
            Self::Doaj
            | Self::JournalNames
            | Self::FunderNames
            | Self::Asjcs
            | Self::IssnSubjectCodes => Box::new(csv_source::CsvSource::new(
                location,
                self.tables(),
                csv_row_mapper(self),
                sampler,
            )),
        })
    }
}

fn csv_row_mapper(kind: SourceKind) -> csv_source::RowMapper {
    match kind {
        SourceKind::FunderNames => funder_names::map_row,
        _ => csv_source::positional_row,
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SourceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| Error::message(format!("Unknown data source: '{s}'.")))
    }
}

/// Regular files directly in `directory` whose names end in `suffix`,
/// sorted by name.
pub fn data_files(directory: &Path, suffix: &str) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(directory).map_err(|e| Error::io(directory, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::io(directory, e))?;
        let path = entry.path();
        let is_file = entry.file_type().map_err(|e| Error::io(&path, e))?.is_file();
        if is_file && path.to_string_lossy().ends_with(suffix) {
            files.push(path);
        }
    }
    files.sort();
    tracing::debug!("Found {} {suffix} files in {}", files.len(), directory.display());
    Ok(files)
}

/// Open a source file for reading.
pub fn open_file(path: &Path) -> Result<File> {
    tracing::debug!(target: debug::FILES_READ, "{}", path.display());
    File::open(path).map_err(|e| Error::io(path, e))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_names_round_trip() {
        for kind in SourceKind::ALL {
            assert_eq!(kind.name().parse::<SourceKind>().unwrap(), kind);
            assert!(!kind.tables().is_empty());
        }
        let err = "medline".parse::<SourceKind>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown data source: 'medline'.");
    }

    #[test]
    fn test_defaults() {
        assert_eq!(SourceKind::Doaj.default_source(), Some("https://doaj.org/csv"));
        assert_eq!(SourceKind::Crossref.default_source(), None);
        assert_eq!(SourceKind::Asjcs.default_source(), None);
    }

    #[test]
    fn test_root_tables_have_ids() {
        for kind in SourceKind::ALL {
            let tables = kind.tables();
            assert!(tables[0].parent_name.is_none(), "{kind}");
            assert!(tables[0].column("id").is_some(), "{kind}");
            for table in &tables[1..] {
                let parent = table.parent_name.as_deref().unwrap();
                assert!(tables.iter().any(|t| t.name == parent), "{}", table.name);
            }
        }
    }

    #[test]
    fn test_schema_tables_include_derived() {
        let names: Vec<String> = SourceKind::Asjcs
            .schema_tables()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(
            names,
            vec!["asjc_import", "asjc_general_fields", "asjc_subject_areas", "asjcs"]
        );
        assert_eq!(SourceKind::Asjcs.tables()[0].delimiter, b';');
    }

    #[test]
    fn test_data_files_sorted() {
        let temp_dir = TempDir::new().unwrap();
        for name in ["b.gz", "a.gz", "c.txt"] {
            fs::write(temp_dir.path().join(name), b"").unwrap();
        }
        fs::create_dir(temp_dir.path().join("d.gz")).unwrap();
        let files = data_files(temp_dir.path(), ".gz").unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.gz", "b.gz"]);
    }
}
