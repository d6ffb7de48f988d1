//! Helpers for SQL scripts and locations given as text.

use regex::Regex;
use std::sync::LazyLock;

static BLOCK_COMMENT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").ok());
static LINE_COMMENT: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"--[^\n]*\n?").ok());
static URL: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"^\w+://").ok());

/// Remove SQL comments (`--` and C-style) from a script and trim it.
///
/// Comment characters embedded in string literals are not recognized.
pub fn remove_sqlite_comments(script: &str) -> String {
    let mut script = script.to_string();
    if let Some(re) = BLOCK_COMMENT.as_ref() {
        script = re.replace_all(&script, "").into_owned();
    }
    if let Some(re) = LINE_COMMENT.as_ref() {
        script = re.replace_all(&script, "").into_owned();
    }
    script.trim().to_string()
}

/// Split a comment-free script into statements terminated by `;` at line end.
pub fn split_sql_statements(script: &str) -> Vec<String> {
    remove_sqlite_comments(script)
        .split(";\n")
        .map(|statement| statement.trim().trim_end_matches(';').trim())
        .filter(|statement| !statement.is_empty())
        .map(str::to_string)
        .collect()
}

/// Return true if the location looks like a URL (`scheme://...`).
pub fn is_url(location: &str) -> bool {
    URL.as_ref().is_some_and(|re| re.is_match(location))
}

/// Join string fragments with tabs, the way multi-valued titles are stored.
pub fn tab_join<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    parts
        .into_iter()
        .map(|part| part.as_ref().to_string())
        .collect::<Vec<_>>()
        .join("\t")
}
