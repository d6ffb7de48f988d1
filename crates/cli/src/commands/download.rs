use clap::Args;
use std::path::PathBuf;

use a3k_common::Config;
use a3k_core::SourceKind;
use a3k_core::download::{
    IssnQuery, ScopusClient, download_default_source, download_issn_subject_codes,
};

use crate::common::{parse_source, run_blocking, with_spinner};
use crate::run_cli_async;

#[derive(Args, Debug, Clone)]
pub struct DownloadArgs {
    #[arg(value_name = "DATA_NAME", value_parser = parse_source, help = "Name of the data source")]
    pub data_name: SourceKind,
    #[arg(value_name = "OUTPUT", help = "File to save the data into")]
    pub output: PathBuf,
    #[arg(
        long = "database",
        value_name = "DB",
        help = "Populated database supplying the ISSNs of an issn-subject-codes download"
    )]
    pub database: Option<PathBuf>,
    #[arg(
        long = "sql-query",
        value_name = "SQL",
        requires = "database",
        help = "Query returning the ISSNs to look up; the distinct ISSNs of works by default"
    )]
    pub sql_query: Option<String>,
    #[arg(
        short = 's',
        long = "sample",
        value_name = "P",
        default_value_t = 1.0,
        help = "Probability with which each ISSN is looked up"
    )]
    pub sample: f64,
    #[arg(long = "seed", help = "Random seed making sampling repeatable")]
    pub seed: Option<u64>,
}

pub async fn run(args: DownloadArgs) -> i32 {
    run_cli_async(|| run_inner(args)).await
}

async fn run_inner(args: DownloadArgs) -> Result<(), String> {
    let config = Config::load()?;
    if args.data_name != SourceKind::IssnSubjectCodes {
        return with_spinner(
            &format!("Downloading {}", args.data_name),
            &format!("Saved {} into {}", args.data_name, args.output.display()),
            async {
                download_default_source(args.data_name, &args.output, &config)
                    .await
                    .map_err(String::from)
            },
        )
        .await;
    }

    let Some(database) = args.database.clone() else {
        return Err("The issn-subject-codes download requires a --database.".to_string());
    };
    let query = IssnQuery {
        database,
        sql_query: args.sql_query.clone(),
        sampler: a3k_core::streaming::Sampler::new(args.sample, args.seed)?,
    };
    let scopus = ScopusClient::new(&config)?;
    let issns = run_blocking(move || query.issns()).await?;
    with_spinner(
        &format!("Looking up the subject codes of {} ISSNs", issns.len()),
        &format!("Saved subject codes into {}", args.output.display()),
        async {
            download_issn_subject_codes(&scopus, &issns, &args.output)
                .await
                .map(|_| ())
                .map_err(String::from)
        },
    )
    .await
}
