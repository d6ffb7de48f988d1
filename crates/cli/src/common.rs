use std::path::PathBuf;
use std::time::{Duration, Instant};

use a3k_common::Config;
use a3k_common::text::is_url;
use a3k_core::download::{download_url, http_client};
use a3k_core::streaming::Sampler;
use a3k_core::{DataSource, SourceKind};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use tempfile::NamedTempFile;
use tracing::debug;

/// Arguments selecting and sampling a data source
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    #[arg(value_name = "DATA_NAME", value_parser = parse_source, help = "Name of the data source")]
    pub data_name: SourceKind,
    #[arg(
        value_name = "DATA_LOCATION",
        help = "File, directory, or URL of the source data; defaults to the source's download location"
    )]
    pub data_location: Option<String>,
    #[arg(
        short = 'a',
        long = "attach-databases",
        value_name = "NAME:PATH",
        num_args = 1..,
        help = "Databases to attach, making them available to queries and row selections"
    )]
    pub attach_databases: Vec<String>,
    #[arg(
        short = 's',
        long = "sample",
        value_name = "P",
        default_value_t = 1.0,
        help = "Probability with which each container or record is processed"
    )]
    pub sample: f64,
    #[arg(long = "seed", help = "Random seed making sampling repeatable")]
    pub seed: Option<u64>,
}

pub fn parse_source(name: &str) -> Result<SourceKind, String> {
    name.parse().map_err(String::from)
}

/// A data location on the local file system. Sources given as URLs are
/// downloaded into a temporary file removed on drop.
#[derive(Debug)]
pub struct LocalSource {
    pub path: PathBuf,
    _download: Option<NamedTempFile>,
}

impl SourceArgs {
    pub fn sampler(&self) -> Result<Sampler, String> {
        Ok(Sampler::new(self.sample, self.seed)?)
    }

    /// Resolve the data location, downloading URLs.
    pub async fn local_source(&self) -> Result<LocalSource, String> {
        let location = match (&self.data_location, self.data_name.default_source()) {
            (Some(location), _) => location.as_str(),
            (None, Some(url)) => url,
            (None, None) => {
                return Err(format!(
                    "The {} data source requires a data location.",
                    self.data_name
                ));
            }
        };
        if !is_url(location) {
            return Ok(LocalSource {
                path: PathBuf::from(location),
                _download: None,
            });
        }

        let config = Config::load()?;
        let client = http_client(&config)?;
        let file = NamedTempFile::new()
            .map_err(|err| format!("Failed to create temporary file: {err}"))?;
        let spinner = spinner(&format!("Downloading {location}"));
        let result = download_url(&client, location, file.path()).await;
        spinner.finish_and_clear();
        let size = result?;
        debug!("Downloaded {size} bytes from {location}");
        Ok(LocalSource {
            path: file.path().to_path_buf(),
            _download: Some(file),
        })
    }

    /// Open the data source over a local copy of its data.
    pub fn open(&self, local: &LocalSource) -> Result<DataSource, String> {
        let source = self.data_name.open(&local.path, self.sampler()?)?;
        Ok(DataSource::new(source, &self.attach_databases)?)
    }
}

/// Run blocking engine work off the async runtime.
pub async fn run_blocking<T, F>(f: F) -> Result<T, String>
where
    F: FnOnce() -> a3k_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|err| format!("Task failed: {err}"))?
        .map_err(String::from)
}

pub fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner.set_message(message.to_string());
    spinner
}

pub fn format_elapsed_ms(start: Instant) -> String {
    let elapsed = start.elapsed();
    if elapsed.as_secs() == 0 {
        return format!("{}ms", elapsed.as_millis());
    }
    let seconds = elapsed.as_secs();
    let remaining_ms = elapsed.subsec_millis();
    format!("{seconds}s {remaining_ms}ms")
}

/// Run `f` behind a spinner, reporting the elapsed time on success.
pub async fn with_spinner<T, Fut>(description: &str, success_message: &str, f: Fut) -> Result<T, String>
where
    Fut: std::future::Future<Output = Result<T, String>>,
{
    let spinner = spinner(description);
    let start = Instant::now();
    let result = f.await;
    spinner.finish_and_clear();
    if result.is_ok() {
        println!("{} ({})", success_message, format_elapsed_ms(start));
    }
    result
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn source_args(data_name: SourceKind, data_location: Option<&str>) -> SourceArgs {
        SourceArgs {
            data_name,
            data_location: data_location.map(str::to_string),
            attach_databases: Vec::new(),
            sample: 1.0,
            seed: None,
        }
    }

    #[tokio::test]
    async fn test_local_paths_are_kept() {
        let args = source_args(SourceKind::Crossref, Some("/data/crossref"));
        let local = args.local_source().await.unwrap();
        assert_eq!(local.path, PathBuf::from("/data/crossref"));
    }

    #[tokio::test]
    async fn test_location_required_without_default() {
        let args = source_args(SourceKind::Ror, None);
        let err = args.local_source().await.unwrap_err();
        assert_eq!(err, "The ror data source requires a data location.");
    }

    #[test]
    fn test_invalid_sample() {
        let mut args = source_args(SourceKind::Doaj, None);
        args.sample = 2.0;
        assert!(args.sampler().is_err());
    }

    #[test]
    fn test_format_elapsed() {
        assert!(format_elapsed_ms(Instant::now()).ends_with("ms"));
    }
}
