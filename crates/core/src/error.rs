//! Error type shared by the engine, the data sources and the processes.

use thiserror::Error;

/// Errors raised while reading data sources or populating databases
#[derive(Debug, Error)]
pub enum Error {
    /// A user-facing failure, such as an unknown table or a bad argument
    #[error("{0}")]
    Message(String),

    /// An SQL statement failed
    #[error("SQL statement '{statement}' failed: {source}")]
    Sql {
        /// The failing statement
        statement: String,
        /// The SQLite error
        #[source]
        source: rusqlite::Error,
    },

    /// An SQLite error not tied to a specific statement
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// File system access failed
    #[error("I/O error on {path}: {source}")]
    Io {
        /// The file or directory involved
        path: String,
        /// The underlying error
        #[source]
        source: std::io::Error,
    },

    /// Malformed JSON input
    #[error("Invalid JSON in {context}: {source}")]
    Json {
        /// Where the JSON came from
        context: String,
        /// The parse error
        #[source]
        source: serde_json::Error,
    },

    /// Malformed XML input
    #[error("Invalid XML in {context}: {message}")]
    Xml {
        /// Where the XML came from
        context: String,
        /// The parser's message
        message: String,
    },

    /// Malformed CSV input
    #[error("Invalid CSV in {context}: {source}")]
    Csv {
        /// Where the CSV came from
        context: String,
        /// The parse error
        #[source]
        source: csv::Error,
    },

    /// Unreadable zip archive
    #[error("Invalid zip archive {path}: {source}")]
    Zip {
        /// The archive
        path: String,
        /// The archive error
        #[source]
        source: zip::result::ZipError,
    },

    /// An HTTP download failed
    #[error("HTTP request to {url} failed: {message}")]
    Http {
        /// The requested URL
        url: String,
        /// What went wrong
        message: String,
    },

    /// An invariant of the engine was violated
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Build a user-facing error from a message.
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    /// Build an I/O error for the given path.
    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    /// Build an SQL error for the given statement.
    pub fn sql(statement: impl Into<String>, source: rusqlite::Error) -> Self {
        Self::Sql {
            statement: statement.into(),
            source,
        }
    }
}

impl From<Error> for String {
    fn from(err: Error) -> Self {
        err.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            Error::message("Unknown table name: 'x'.").to_string(),
            "Unknown table name: 'x'."
        );
        let err = Error::sql(
            "SELECT nope",
            rusqlite::Error::InvalidQuery,
        );
        assert!(err.to_string().starts_with("SQL statement 'SELECT nope' failed:"));
    }
}
