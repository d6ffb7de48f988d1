use clap::Args;
use std::path::PathBuf;

use a3k_core::Process;

use crate::common::{run_blocking, with_spinner};
use crate::run_cli_async;

#[derive(Args, Debug, Clone)]
pub struct ProcessArgs {
    #[arg(value_name = "DATABASE", help = "Populated SQLite database to process")]
    pub database: PathBuf,
    #[arg(value_name = "PROCESS", value_parser = parse_process, help = "Name of the process to run")]
    pub process: Process,
}

pub fn parse_process(name: &str) -> Result<Process, String> {
    name.parse().map_err(String::from)
}

pub async fn run(args: ProcessArgs) -> i32 {
    run_cli_async(|| run_inner(args)).await
}

async fn run_inner(args: ProcessArgs) -> Result<(), String> {
    if !args.database.exists() {
        return Err(format!("Database {} does not exist.", args.database.display()));
    }
    let process = args.process;
    let database = args.database.clone();
    with_spinner(
        &format!("Running {process} on {}", args.database.display()),
        &format!("Completed {process}"),
        run_blocking(move || process.run(&database)),
    )
    .await
}
