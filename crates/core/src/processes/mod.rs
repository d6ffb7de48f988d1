//! Processes that link and enrich populated databases.

pub mod link_aa_ror;
pub mod link_uspto_doi;
pub mod link_works_asjcs;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::db_schema::TableMeta;
use crate::error::{Error, Result};

/// The available processes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Process {
    /// Link author affiliations to the lowest-level matching organization
    LinkAaBaseRor,
    /// Link author affiliations to the top-level parent organization
    LinkAaTopRor,
    /// Link works to ASJC subject codes
    LinkWorksAsjcs,
    /// Extract DOIs from USPTO non-patent literature citations
    LinkUsptoDoi,
}

impl Process {
    /// All processes, in listing order.
    pub const ALL: [Self; 4] = [
        Self::LinkAaBaseRor,
        Self::LinkAaTopRor,
        Self::LinkUsptoDoi,
        Self::LinkWorksAsjcs,
    ];

    /// Name used on the command line.
    pub fn name(self) -> &'static str {
        match self {
            Self::LinkAaBaseRor => "link-aa-base-ror",
            Self::LinkAaTopRor => "link-aa-top-ror",
            Self::LinkWorksAsjcs => "link-works-asjcs",
            Self::LinkUsptoDoi => "link-uspto-doi",
        }
    }

    /// One-line description.
    pub fn description(self) -> &'static str {
        match self {
            Self::LinkAaBaseRor => "Link author affiliation with lowest-level research organization",
            Self::LinkAaTopRor => "Link author affiliation with top-level research organization",
            Self::LinkWorksAsjcs => "Link works with their ASJC subject codes",
            Self::LinkUsptoDoi => "Link USPTO non-patent literature citations with their DOI",
        }
    }

    /// Tables the process creates.
    pub fn tables(self) -> Vec<TableMeta> {
        match self {
            Self::LinkAaBaseRor | Self::LinkAaTopRor => link_aa_ror::tables(),
            Self::LinkWorksAsjcs => link_works_asjcs::tables(),
            Self::LinkUsptoDoi => link_uspto_doi::tables(),
        }
    }

    /// Run the process on the database at `database_path`.
    pub fn run(self, database_path: &Path) -> Result<()> {
        tracing::info!("Running {} on {}", self.name(), database_path.display());
        match self {
            Self::LinkAaBaseRor => link_aa_ror::link_author_affiliations(database_path, false),
            Self::LinkAaTopRor => link_aa_ror::link_author_affiliations(database_path, true),
            Self::LinkWorksAsjcs => link_works_asjcs::process(database_path),
            Self::LinkUsptoDoi => link_uspto_doi::process(database_path),
        }
    }
}

impl fmt::Display for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Process {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|process| process.name() == s)
            .ok_or_else(|| Error::message(format!("Unknown process: '{s}'.")))
    }
}
