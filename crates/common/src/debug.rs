//! Debug flags and the tracing targets they enable.
//!
//! Each flag given with `--debug` turns on `debug` level output for the
//! tracing target `a3k::<flag>`. Code emits such output with e.g.
//! `tracing::debug!(target: debug::SQL, "{statement}")`.

use std::fmt;
use std::str::FromStr;

/// SQL statements executed by the engine
pub const SQL: &str = "a3k::sql";
/// Timing of major steps
pub const PERF: &str = "a3k::perf";
/// Container-level progress
pub const PROGRESS: &str = "a3k::progress";
/// Contents of the matched root rows during population
pub const DUMP_MATCHED: &str = "a3k::dump-matched";
/// Topologically sorted table order
pub const SORTED_TABLES: &str = "a3k::sorted-tables";
/// Record linking decisions
pub const LINK: &str = "a3k::link";
/// Files opened by data sources
pub const FILES_READ: &str = "a3k::files-read";

/// A debug flag accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DebugFlag {
    /// Log executed SQL
    Sql,
    /// Log step timings
    Perf,
    /// Log container progress
    Progress,
    /// Dump the root rows matched by a row selection
    DumpMatched,
    /// Log the table evaluation order
    SortedTables,
    /// Log record linking
    Link,
    /// Log the files read
    FilesRead,
}

impl DebugFlag {
    /// All flags, in documentation order.
    pub const ALL: [Self; 7] = [
        Self::Sql,
        Self::Perf,
        Self::Progress,
        Self::DumpMatched,
        Self::SortedTables,
        Self::Link,
        Self::FilesRead,
    ];

    /// Flag name as given on the command line.
    pub fn name(self) -> &'static str {
        match self {
            Self::Sql => "sql",
            Self::Perf => "perf",
            Self::Progress => "progress",
            Self::DumpMatched => "dump-matched",
            Self::SortedTables => "sorted-tables",
            Self::Link => "link",
            Self::FilesRead => "files-read",
        }
    }

    /// Tracing target enabled by the flag.
    pub fn target(self) -> &'static str {
        match self {
            Self::Sql => SQL,
            Self::Perf => PERF,
            Self::Progress => PROGRESS,
            Self::DumpMatched => DUMP_MATCHED,
            Self::SortedTables => SORTED_TABLES,
            Self::Link => LINK,
            Self::FilesRead => FILES_READ,
        }
    }

    /// `EnvFilter` directive enabling the flag's output.
    pub fn directive(self) -> String {
        format!("{}=debug", self.target())
    }

    /// Parse a comma-separated flag list such as `sql,perf`.
    pub fn parse_list(list: &str) -> Result<Vec<Self>, String> {
        list.split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::parse)
            .collect()
    }
}

impl fmt::Display for DebugFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DebugFlag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|flag| flag.name() == s)
            .ok_or_else(|| {
                let names: Vec<&str> = Self::ALL.iter().map(|flag| flag.name()).collect();
                format!(
                    "Unknown debug flag '{s}'; valid flags are: {}",
                    names.join(", ")
                )
            })
    }
}
