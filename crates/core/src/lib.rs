//! Relational access to large bibliographic datasets.
//!
//! A data source (Crossref, ORCID, ROR, USPTO, and several CSV sources)
//! exposes a hierarchy of tables. The [`DataSource`] engine streams the
//! source container by container, running SQL queries over its tables or
//! populating an SQLite database with selected rows and columns. Processes
//! then link and enrich populated databases.

pub mod data_source;
pub mod db_schema;
pub mod download;
pub mod error;
pub mod processes;
pub mod resources;
pub mod sources;
pub mod sql;
pub mod streaming;
pub mod tsort;
pub mod values;
pub mod xml;

pub use data_source::{DataSource, QueryOutput};
pub use db_schema::{ColumnMeta, TableMeta};
pub use error::{Error, Result};
pub use processes::Process;
pub use sources::SourceKind;
pub use streaming::{
    Container, ContainerId, ContainerInfo, ElementsCursor, RowSink, Sampler, StreamingSource,
    StreamingTable,
};
