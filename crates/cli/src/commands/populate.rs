use clap::Args;
use std::fs;
use std::path::PathBuf;

use crate::common::{SourceArgs, run_blocking, with_spinner};
use crate::run_cli_async;

#[derive(Args, Debug, Clone)]
pub struct PopulateArgs {
    #[arg(value_name = "DATABASE", help = "SQLite database to populate")]
    pub database: PathBuf,
    #[command(flatten)]
    pub source: SourceArgs,
    #[arg(
        short = 'c',
        long = "columns",
        value_name = "TABLE.COLUMN",
        num_args = 1..,
        help = "Columns to populate, as table.column or table.*; all by default"
    )]
    pub columns: Vec<String>,
    #[arg(
        short = 'r',
        long = "row-selection",
        value_name = "EXPR",
        conflicts_with = "row_selection_file",
        help = "SQL expression selecting the records to populate"
    )]
    pub row_selection: Option<String>,
    #[arg(
        short = 'R',
        long = "row-selection-file",
        value_name = "FILE",
        help = "File containing the SQL expression selecting the records to populate"
    )]
    pub row_selection_file: Option<PathBuf>,
}

pub async fn run(args: PopulateArgs) -> i32 {
    run_cli_async(|| run_inner(args)).await
}

async fn run_inner(args: PopulateArgs) -> Result<(), String> {
    let condition = match (&args.row_selection, &args.row_selection_file) {
        (Some(expression), _) => Some(expression.clone()),
        (None, Some(path)) => Some(fs::read_to_string(path).map_err(|err| {
            format!("Failed to read row selection file {}: {err}", path.display())
        })?),
        (None, None) => None,
    };

    let local = args.source.local_source().await?;
    let mut data_source = args.source.open(&local)?;
    let database = args.database.clone();
    let columns = args.columns.clone();
    let description = format!(
        "Populating {} from {}",
        database.display(),
        args.source.data_name
    );
    with_spinner(
        &description,
        &format!("Populated {}", args.database.display()),
        run_blocking(move || {
            data_source.populate(&database, &columns, condition.as_deref())
        }),
    )
    .await?;
    drop(local);
    Ok(())
}
