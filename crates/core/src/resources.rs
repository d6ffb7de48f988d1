//! SQL scripts compiled into the binary.

use rust_embed::RustEmbed;

use crate::error::{Error, Result};

#[derive(RustEmbed)]
#[folder = "sql/"]
struct SqlScripts;

/// Return the contents of the named embedded SQL script.
pub fn sql_script(name: &str) -> Result<String> {
    let file = SqlScripts::get(name)
        .ok_or_else(|| Error::Internal(format!("Missing embedded script '{name}'")))?;
    String::from_utf8(file.data.into_owned())
        .map_err(|e| Error::Internal(format!("Embedded script '{name}' is not UTF-8: {e}")))
}

/// Names of all embedded scripts.
pub fn script_names() -> Vec<String> {
    let mut names: Vec<String> = SqlScripts::iter().map(|name| name.into_owned()).collect();
    names.sort();
    names
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_scripts_are_embedded() {
        let names = script_names();
        for expected in [
            "normalize-doaj.sql",
            "normalize-journal-names-issns.sql",
            "normalize-asjc.sql",
            "work-authors-top-rors.sql",
            "link-works-asjcs.sql",
        ] {
            assert!(names.iter().any(|n| n == expected), "missing {expected}");
            assert!(!sql_script(expected).unwrap().trim().is_empty());
        }
        assert!(sql_script("nope.sql").is_err());
    }
}
