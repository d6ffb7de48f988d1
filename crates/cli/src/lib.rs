//! Command line interface of a3k.
//!
//! Every subcommand lives in its own module under [`commands`] with an
//! `Args` struct and an async `run` entry point returning the exit code.

use a3k_common::DebugFlag;
use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

pub mod commands;
mod common;
mod output;

pub use output::{CsvOutput, OutputEncoding};

/// Crates whose level a plain `A3K_LOG` level sets
const LOG_ROOT: &str = "a3k";

#[derive(Parser)]
#[command(
    name = "a3k",
    version,
    about = "a3k: relational queries and SQLite population over large bibliographic datasets"
)]
struct Cli {
    #[arg(
        short = 'd',
        long = "debug",
        value_name = "FLAG",
        value_delimiter = ',',
        value_parser = parse_debug_flag,
        global = true,
        help = "Output debugging information as specified by the comma-separated flags: \
                sql, perf, progress, dump-matched, sorted-tables, link, files-read"
    )]
    debug: Vec<DebugFlag>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Populate an SQLite database with data from a source
    Populate(commands::populate::PopulateArgs),
    /// Run an SQL query over a data source
    Query(commands::query::QueryArgs),
    /// Download the data of a source
    Download(commands::download::DownloadArgs),
    /// Run a process on a populated database
    Process(commands::process::ProcessArgs),
    /// List the available data sources
    ListSources,
    /// List the available processes
    ListProcesses,
    /// List the schema of a data source
    ListSourceSchema(commands::list::SchemaArgs),
    /// List the schema of the tables a process creates
    ListProcessSchema(commands::list::SchemaArgs),
}

fn parse_debug_flag(flag: &str) -> Result<DebugFlag, String> {
    flag.parse()
}

/// Run the command line given in `args`, returning the exit code.
pub fn run_cli(args: Vec<String>) -> i32 {
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("Failed to create tokio runtime: {err}");
            return 1;
        }
    };

    runtime.block_on(dispatch(args))
}

async fn dispatch(args: Vec<String>) -> i32 {
    match Cli::try_parse_from(args) {
        Ok(cli) => {
            init_tracing(&cli.debug);
            match cli.command {
                Some(Commands::Populate(args)) => commands::populate::run(args).await,
                Some(Commands::Query(args)) => commands::query::run(args).await,
                Some(Commands::Download(args)) => commands::download::run(args).await,
                Some(Commands::Process(args)) => commands::process::run(args).await,
                Some(Commands::ListSources) => commands::list::list_sources(),
                Some(Commands::ListProcesses) => commands::list::list_processes(),
                Some(Commands::ListSourceSchema(args)) => commands::list::source_schema(args),
                Some(Commands::ListProcessSchema(args)) => commands::list::process_schema(args),
                None => {
                    let mut cmd = Cli::command();
                    let _ = cmd.print_help();
                    println!();
                    0
                }
            }
        }
        Err(e) => {
            let code = e.exit_code();
            let _ = e.print();
            code
        }
    }
}

/// Map a command's result to an exit code, reporting errors on stderr.
pub async fn run_cli_async<F, Fut>(f: F) -> i32
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<(), String>>,
{
    match f().await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("{err}");
            1
        }
    }
}

/// Build the filter spec from `A3K_LOG` and the enabled debug flags.
fn filter_spec(env_value: Option<&str>, flags: &[DebugFlag]) -> String {
    // A3K_LOG controls log level: "trace", "debug", "info", "warn", "error"
    // or a full tracing filter spec like "a3k=debug,reqwest=warn"
    let mut filter = match env_value {
        Some(level) if is_plain_level(level) => format!("{LOG_ROOT}={level}"),
        Some(spec) => spec.to_string(),
        None => format!("{LOG_ROOT}=info"),
    };
    for flag in flags {
        filter.push(',');
        filter.push_str(&flag.directive());
    }
    filter
}

/// Install the stderr subscriber.
pub fn init_tracing(flags: &[DebugFlag]) {
    let env_value = std::env::var("A3K_LOG").ok();
    let filter = filter_spec(env_value.as_deref(), flags);

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_filter(EnvFilter::new(filter));

    if tracing_subscriber::registry()
        .with(fmt_layer)
        .try_init()
        .is_err()
    {
        eprintln!("Warning: tracing subscriber already initialized");
    }
}

fn is_plain_level(s: &str) -> bool {
    matches!(
        s.to_ascii_lowercase().as_str(),
        "trace" | "debug" | "info" | "warn" | "error"
    )
}
