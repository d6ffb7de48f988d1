#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use a3k_core::streaming::Sampler;
use a3k_core::{DataSource, Process, SourceKind};
use flate2::Compression;
use flate2::write::GzEncoder;
use rusqlite::Connection;
use serde_json::json;
use tempfile::TempDir;

fn crossref_dir(root: &Path) -> PathBuf {
    let dir = root.join("crossref");
    fs::create_dir(&dir).unwrap();
    let works = json!({"items": [
        {
            "DOI": "10.1000/ONE",
            "author": [
                {"given": "Ann", "family": "Lee",
                 "affiliation": [{"name": "Dept. of Physics, Child Institute, Bogota"}]},
                {"given": "Bo", "family": "Ng",
                 "affiliation": [{"name": "Independent researcher"}]}
            ],
            "subject": ["Oncology"]
        },
        {"DOI": "10.1000/two"}
    ]});
    let mut encoder = GzEncoder::new(
        File::create(dir.join("0.json.gz")).unwrap(),
        Compression::default(),
    );
    encoder.write_all(works.to_string().as_bytes()).unwrap();
    encoder.finish().unwrap();
    dir
}

fn ror_zip(root: &Path) -> PathBuf {
    let registry = json!([
        {
            "id": "https://ror.org/02mhbdp94",
            "name": "Universidad de los Andes",
            "status": "active",
            "acronyms": ["UNIANDES"],
            "relationships": [{"type": "Child", "id": "https://ror.org/0abcdef12"}]
        },
        {
            "id": "https://ror.org/0abcdef12",
            "name": "Child Institute",
            "status": "active",
            "relationships": [{"type": "Parent", "id": "https://ror.org/02mhbdp94"}]
        }
    ]);
    let path = root.join("ror.zip");
    let mut writer = zip::ZipWriter::new(File::create(&path).unwrap());
    writer
        .start_file("v1.0-ror-data.json", zip::write::SimpleFileOptions::default())
        .unwrap();
    writer.write_all(registry.to_string().as_bytes()).unwrap();
    writer.finish().unwrap();
    path
}

fn populate(kind: SourceKind, location: &Path, database: &Path) {
    let source = kind.open(location, Sampler::all()).unwrap();
    DataSource::new(source, &[])
        .unwrap()
        .populate(database, &[], None)
        .unwrap();
}

fn author_links(database: &Path) -> Vec<(i64, String)> {
    let conn = Connection::open(database).unwrap();
    conn.prepare(
        "SELECT work_authors_rors.ror_id, work_authors.family FROM work_authors_rors
         INNER JOIN work_authors ON work_authors.id = work_authors_rors.work_author_id",
    )
    .unwrap()
    .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))
    .unwrap()
    .collect::<rusqlite::Result<_>>()
    .unwrap()
}

#[test]
fn test_link_author_affiliations() {
    let temp_dir = TempDir::new().unwrap();
    let database = temp_dir.path().join("db.sqlite");
    populate(SourceKind::Crossref, &crossref_dir(temp_dir.path()), &database);
    populate(SourceKind::Ror, &ror_zip(temp_dir.path()), &database);

    Process::LinkAaBaseRor.run(&database).unwrap();
    assert_eq!(author_links(&database), vec![(1, "Lee".to_string())]);

    Process::LinkAaTopRor.run(&database).unwrap();
    assert_eq!(author_links(&database), vec![(0, "Lee".to_string())]);
}

#[test]
fn test_populate_selected_works() {
    let temp_dir = TempDir::new().unwrap();
    let database = temp_dir.path().join("db.sqlite");
    let source = SourceKind::Crossref
        .open(&crossref_dir(temp_dir.path()), Sampler::all())
        .unwrap();
    DataSource::new(source, &[])
        .unwrap()
        .populate(
            &database,
            &["works.doi".to_string(), "work_authors.*".to_string()],
            Some("works.doi = '10.1000/one'"),
        )
        .unwrap();

    let conn = Connection::open(&database).unwrap();
    let works: i64 = conn
        .query_row("SELECT Count(*) FROM works", [], |r| r.get(0))
        .unwrap();
    let authors: i64 = conn
        .query_row("SELECT Count(*) FROM work_authors", [], |r| r.get(0))
        .unwrap();
    assert_eq!((works, authors), (1, 2));
    assert!(
        conn.prepare("SELECT * FROM work_subjects").is_err(),
        "unselected tables are not created"
    );
}

#[test]
fn test_process_reports_missing_tables() {
    let temp_dir = TempDir::new().unwrap();
    let database = temp_dir.path().join("db.sqlite");
    populate(SourceKind::Ror, &ror_zip(temp_dir.path()), &database);
    let err = Process::LinkWorksAsjcs.run(&database).unwrap_err();
    assert_eq!(
        err.to_string(),
        "The required table 'work_subjects' is not populated."
    );
}
