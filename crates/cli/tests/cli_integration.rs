#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::fs;
use std::path::Path;

use rusqlite::Connection;
use tempfile::TempDir;

fn a3k(args: &[&str]) -> i32 {
    let mut argv = vec!["a3k".to_string()];
    argv.extend(args.iter().map(|arg| (*arg).to_string()));
    a3k_cli::run_cli(argv)
}

fn funder_csv(dir: &Path) -> String {
    let path = dir.join("funders.csv");
    fs::write(
        &path,
        "uri,primary name,replaced by\n\
         http://dx.doi.org/10.13039/1,National Science Foundation,\n\
         http://dx.doi.org/10.13039/2,Old Agency,10.13039/1\n",
    )
    .unwrap();
    path.to_string_lossy().into_owned()
}

#[test]
fn test_list_commands_succeed() {
    assert_eq!(a3k(&["list-sources"]), 0);
    assert_eq!(a3k(&["list-processes"]), 0);
    assert_eq!(a3k(&["list-source-schema", "crossref"]), 0);
    assert_eq!(a3k(&["list-process-schema"]), 0);
}

#[test]
fn test_unknown_names_fail() {
    assert_eq!(a3k(&["list-source-schema", "medline"]), 1);
    assert_ne!(a3k(&["process", "db.sqlite", "link-aa-llm"]), 0);
    assert_ne!(a3k(&["populate", "db.sqlite", "nonesuch", "x"]), 0);
}

#[test]
fn test_populate_and_query_csv_source() {
    let temp_dir = TempDir::new().unwrap();
    let csv = funder_csv(temp_dir.path());
    let database = temp_dir.path().join("db.sqlite");
    let database_arg = database.to_string_lossy().into_owned();

    assert_eq!(a3k(&["populate", &database_arg, "funder-names", &csv]), 0);
    let conn = Connection::open(&database).unwrap();
    let (count, nulls): (i64, i64) = conn
        .query_row(
            "SELECT Count(*), Sum(replaced IS NULL) FROM funder_names",
            [],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .unwrap();
    assert_eq!((count, nulls), (2, 1));
    drop(conn);

    let output = temp_dir.path().join("out.csv");
    let output_arg = output.to_string_lossy().into_owned();
    assert_eq!(
        a3k(&[
            "query",
            "funder-names",
            &csv,
            "-q",
            "SELECT id, name FROM funder_names ORDER BY id",
            "-H",
            "-F",
            ";",
            "-o",
            &output_arg,
        ]),
        0
    );
    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        "id;name\n0;National Science Foundation\n1;Old Agency\n"
    );
}

#[test]
fn test_populate_with_row_selection_file() {
    let temp_dir = TempDir::new().unwrap();
    let csv = funder_csv(temp_dir.path());
    let selection = temp_dir.path().join("selection.sql");
    fs::write(&selection, "funder_names.replaced IS NOT NULL").unwrap();
    let database = temp_dir.path().join("db.sqlite");

    assert_eq!(
        a3k(&[
            "populate",
            &database.to_string_lossy(),
            "funder-names",
            &csv,
            "-c",
            "funder_names.name",
            "-R",
            &selection.to_string_lossy(),
        ]),
        0
    );
    let conn = Connection::open(&database).unwrap();
    let name: String = conn
        .query_row("SELECT name FROM funder_names", [], |r| r.get(0))
        .unwrap();
    assert_eq!(name, "Old Agency");
}

#[test]
fn test_process_requires_database() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("missing.db");
    assert_eq!(
        a3k(&["process", &missing.to_string_lossy(), "link-uspto-doi"]),
        1
    );
}
