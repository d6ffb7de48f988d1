use clap::Args;

use a3k_core::{Process, SourceKind};

use crate::common::parse_source;
use crate::commands::process::parse_process;

#[derive(Args, Debug, Clone)]
pub struct SchemaArgs {
    #[arg(value_name = "NAME", help = "Name to list; all when omitted")]
    pub name: Option<String>,
}

pub fn list_sources() -> i32 {
    for kind in SourceKind::ALL {
        println!("{}: {}", kind.name(), kind.description());
    }
    0
}

pub fn list_processes() -> i32 {
    for process in Process::ALL {
        println!("{}: {}", process.name(), process.description());
    }
    0
}

fn print_schemas(tables: &[a3k_core::TableMeta]) {
    for table in tables {
        println!("{}", table.table_schema("", None));
    }
}

/// Schema statements of the named sources.
fn source_schemas(name: Option<&str>) -> Result<Vec<a3k_core::TableMeta>, String> {
    let kinds = match name {
        Some(name) => vec![parse_source(name)?],
        None => SourceKind::ALL.to_vec(),
    };
    Ok(kinds.into_iter().flat_map(SourceKind::schema_tables).collect())
}

fn process_schemas(name: Option<&str>) -> Result<Vec<a3k_core::TableMeta>, String> {
    let processes = match name {
        Some(name) => vec![parse_process(name)?],
        None => Process::ALL.to_vec(),
    };
    let mut tables: Vec<a3k_core::TableMeta> =
        processes.into_iter().flat_map(Process::tables).collect();
    // The ROR linking processes share their table
    tables.dedup_by(|a, b| a.name == b.name);
    Ok(tables)
}

fn report(result: Result<Vec<a3k_core::TableMeta>, String>) -> i32 {
    match result {
        Ok(tables) => {
            print_schemas(&tables);
            0
        }
        Err(err) => {
            eprintln!("{err}");
            1
        }
    }
}

pub fn source_schema(args: SchemaArgs) -> i32 {
    report(source_schemas(args.name.as_deref()))
}

pub fn process_schema(args: SchemaArgs) -> i32 {
    report(process_schemas(args.name.as_deref()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_source_schemas() {
        let tables = source_schemas(Some("asjcs")).unwrap();
        let names: Vec<&str> = tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            ["asjc_import", "asjc_general_fields", "asjc_subject_areas", "asjcs"]
        );
        let all = source_schemas(None).unwrap();
        assert!(all.iter().any(|t| t.name == "us_patents"));
        assert_eq!(
            source_schemas(Some("medline")).unwrap_err(),
            "Unknown data source: 'medline'."
        );
    }

    #[test]
    fn test_process_schemas() {
        let all = process_schemas(None).unwrap();
        let names: Vec<&str> = all.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["work_authors_rors", "usp_nplcit_dois", "works_asjcs"]);
        let one = process_schemas(Some("link-uspto-doi")).unwrap();
        assert_eq!(
            one[0].table_schema("", None),
            "CREATE TABLE usp_nplcit_dois(\n  patent_id,\n  nplcit_num,\n  doi\n);\n"
        );
    }
}
