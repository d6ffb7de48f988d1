use clap::Args;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use crate::common::{SourceArgs, run_blocking};
use crate::output::{CsvOutput, OutputEncoding};
use crate::run_cli_async;

#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    #[arg(
        short = 'q',
        long = "query",
        value_name = "SQL",
        required_unless_present = "query_file",
        conflicts_with = "query_file",
        help = "SQL query to run over the data source"
    )]
    pub query: Option<String>,
    #[arg(
        short = 'Q',
        long = "query-file",
        value_name = "FILE",
        help = "File containing the SQL query to run"
    )]
    pub query_file: Option<PathBuf>,
    #[arg(
        short = 'o',
        long = "output",
        value_name = "FILE",
        help = "File to write the results to; standard output by default"
    )]
    pub output: Option<PathBuf>,
    #[arg(short = 'H', long = "header", help = "Include a header row with the column names")]
    pub header: bool,
    #[arg(
        short = 'F',
        long = "field-separator",
        value_name = "C",
        default_value_t = ',',
        help = "Character separating output fields"
    )]
    pub field_separator: char,
    #[arg(
        short = 'E',
        long = "output-encoding",
        value_enum,
        default_value_t = OutputEncoding::Utf8,
        help = "Character encoding of the output"
    )]
    pub output_encoding: OutputEncoding,
    #[arg(
        short = 'P',
        long = "partition",
        help = "Run the query separately on each container, concatenating the results"
    )]
    pub partition: bool,
}

pub async fn run(args: QueryArgs) -> i32 {
    run_cli_async(|| run_inner(args)).await
}

async fn run_inner(args: QueryArgs) -> Result<(), String> {
    let query = match (&args.query, &args.query_file) {
        (Some(query), _) => query.clone(),
        (None, Some(path)) => fs::read_to_string(path)
            .map_err(|err| format!("Failed to read query file {}: {err}", path.display()))?,
        (None, None) => return Err("A query or a query file is required.".to_string()),
    };
    let delimiter = u8::try_from(args.field_separator)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| format!("Invalid field separator '{}'", args.field_separator))?;

    let writer: Box<dyn Write + Send> = match &args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path).map_err(|err| {
            format!("Failed to create output file {}: {err}", path.display())
        })?)),
        None => Box::new(BufWriter::new(io::stdout())),
    };
    let mut output = CsvOutput::new(writer, delimiter, args.header, args.output_encoding)?;

    let local = args.source.local_source().await?;
    let mut data_source = args.source.open(&local)?;
    let partition = args.partition;
    let rows = run_blocking(move || {
        data_source.query(&query, partition, &mut output)?;
        let rows = output.rows();
        output
            .into_inner()?
            .flush()
            .map_err(|e| a3k_core::Error::io("query output", e))?;
        Ok(rows)
    })
    .await?;
    tracing::debug!("Query returned {rows} rows");
    drop(local);
    Ok(())
}
