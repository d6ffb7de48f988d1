//! Downloads of data source files.
//!
//! Sources with a default location are fetched over HTTP into a local
//! file. The ISSN subject codes are instead assembled by looking up every
//! ISSN of a populated database through the Scopus Serial Title API.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use a3k_common::{Config, Timer, debug};
use rusqlite::Connection;
use serde_json::Value as Json;
use tokio::io::AsyncWriteExt;
use tracing::warn;

use crate::error::{Error, Result};
use crate::sources::SourceKind;
use crate::sources::issn_subject_codes::DEFAULT_ISSN_QUERY;
use crate::sql::{ensure_table_exists, log_sql};
use crate::streaming::Sampler;

/// Retry configuration for HTTP requests
const MAX_RETRIES: u32 = 5;
const INITIAL_DELAY_MS: u64 = 125;

/// Execute an async operation with exponential backoff retry.
///
/// Retries up to 5 times with delays: 125ms, 250ms, 500ms, 1000ms, 2000ms (~4 seconds total).
async fn fetch_with_retry<T, F, Fut>(
    operation: F,
    operation_name: &str,
) -> std::result::Result<T, String>
where
    F: Fn() -> Fut,
    Fut: Future<Output = std::result::Result<T, String>>,
{
    let mut last_error = String::new();
    for attempt in 0..MAX_RETRIES {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                last_error = e;
                if attempt < MAX_RETRIES - 1 {
                    let delay = INITIAL_DELAY_MS * (1 << attempt);
                    warn!(
                        attempt = attempt + 1,
                        max_retries = MAX_RETRIES,
                        delay_ms = delay,
                        operation = operation_name,
                        error = %last_error,
                        "HTTP request failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
            }
        }
    }
    Err(format!(
        "{operation_name}: {last_error} (after {MAX_RETRIES} retries)"
    ))
}

/// Build the HTTP client used for downloads.
pub fn http_client(config: &Config) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(config.user_agent())
        .build()
        .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {e}")))
}

/// Save the resource at `url` into `output`, returning its size in bytes.
pub async fn download_url(client: &reqwest::Client, url: &str, output: &Path) -> Result<u64> {
    tracing::debug!(target: debug::FILES_READ, "Downloading {url} into {}", output.display());
    fetch_with_retry(
        || async {
            let mut response = client
                .get(url)
                .send()
                .await
                .map_err(|e| format!("Failed to fetch: {e}"))?
                .error_for_status()
                .map_err(|e| format!("Server returned error: {e}"))?;
            // Each attempt starts the file afresh
            let mut file = tokio::fs::File::create(output)
                .await
                .map_err(|e| format!("Failed to create {}: {e}", output.display()))?;
            let mut size = 0;
            while let Some(chunk) = response
                .chunk()
                .await
                .map_err(|e| format!("Failed to read response: {e}"))?
            {
                file.write_all(&chunk)
                    .await
                    .map_err(|e| format!("Failed to write {}: {e}", output.display()))?;
                size += chunk.len() as u64;
            }
            file.flush()
                .await
                .map_err(|e| format!("Failed to write {}: {e}", output.display()))?;
            Ok(size)
        },
        "download",
    )
    .await
    .map_err(|message| Error::Http {
        url: url.to_string(),
        message,
    })
}

/// Where the ISSNs of a subject code download come from
#[derive(Debug)]
pub struct IssnQuery {
    /// Database holding a populated `works` table
    pub database: PathBuf,
    /// Query returning one ISSN per row; the distinct work ISSNs by default
    pub sql_query: Option<String>,
    /// Sampling applied to the returned ISSNs
    pub sampler: Sampler,
}

impl IssnQuery {
    /// Run the query, returning the sampled ISSNs.
    pub fn issns(mut self) -> Result<Vec<String>> {
        let conn = Connection::open(&self.database)?;
        ensure_table_exists(&conn, "works")?;
        let query = self.sql_query.as_deref().unwrap_or(DEFAULT_ISSN_QUERY);
        let mut stmt = conn
            .prepare(log_sql(query))
            .map_err(|e| Error::sql(query, e))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, Option<String>>(0))
            .map_err(|e| Error::sql(query, e))?;
        let mut issns = Vec::new();
        for row in rows {
            let issn = row.map_err(|e| Error::sql(query, e))?;
            if let Some(issn) = issn
                && self.sampler.sample()
            {
                issns.push(issn);
            }
        }
        Ok(issns)
    }
}

/// Scopus Serial Title API client
#[derive(Debug)]
pub struct ScopusClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    interval: Duration,
}

impl ScopusClient {
    /// Configure a client; fails when no API key is set.
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config.scopus.api_key.clone().ok_or_else(|| {
            Error::message(format!(
                "A Scopus API key is required; set {} or [scopus] api_key in the configuration file",
                a3k_common::config::SCOPUS_API_KEY_ENV
            ))
        })?;
        let rate = config.scopus.requests_per_second.max(1);
        Ok(Self {
            client: http_client(config)?,
            base_url: config.scopus.base_url.trim_end_matches('/').to_string(),
            api_key,
            interval: (Duration::from_secs(1) / rate).max(Duration::from_millis(1)),
        })
    }

    /// The ASJC subject codes of the serial with the given ISSN; `None`
    /// when Scopus does not know it.
    pub async fn subject_codes(&self, issn: &str) -> Result<Option<Vec<String>>> {
        let url = format!(
            "{}/content/serial/title/issn/{issn}?view=STANDARD",
            self.base_url
        );
        let result = fetch_with_retry(
            || async {
                let response = self
                    .client
                    .get(&url)
                    .header("X-ELS-APIKey", &self.api_key)
                    .header("Accept", "application/json")
                    .send()
                    .await
                    .map_err(|e| format!("Failed to fetch: {e}"))?;
                if response.status() == reqwest::StatusCode::NOT_FOUND {
                    return Ok(None);
                }
                response
                    .error_for_status()
                    .map_err(|e| format!("Server returned error: {e}"))?
                    .json::<Json>()
                    .await
                    .map(Some)
                    .map_err(|e| format!("Invalid serial title JSON: {e}"))
            },
            "serial title lookup",
        )
        .await;
        let body = result.map_err(|message| Error::Http { url, message })?;
        Ok(body.as_ref().and_then(parse_subject_codes))
    }
}

/// Extract the subject area codes of all entries of a serial title
/// response.
fn parse_subject_codes(body: &Json) -> Option<Vec<String>> {
    let entries = body.get("serial-metadata-response")?.get("entry")?.as_array()?;
    let mut codes = Vec::new();
    for entry in entries {
        let areas = match entry.get("subject-area") {
            Some(Json::Array(areas)) => areas.iter().collect(),
            Some(area @ Json::Object(_)) => vec![area],
            _ => Vec::new(),
        };
        for area in areas {
            match area.get("@code") {
                Some(Json::String(code)) => codes.push(code.clone()),
                Some(Json::Number(code)) => codes.push(code.to_string()),
                _ => {}
            }
        }
    }
    (!codes.is_empty()).then_some(codes)
}

/// Look up the subject codes of `issns` and write them to `output` as
/// `issn,subject_code` CSV. Returns the number of rows written.
pub async fn download_issn_subject_codes(
    scopus: &ScopusClient,
    issns: &[String],
    output: &Path,
) -> Result<usize> {
    let timer = Timer::start("issn subject codes download");
    let mut writer = csv::Writer::from_path(output).map_err(|source| Error::Csv {
        context: output.display().to_string(),
        source,
    })?;
    let csv_error = |source| Error::Csv {
        context: output.display().to_string(),
        source,
    };
    writer
        .write_record(["issn", "subject_code"])
        .map_err(csv_error)?;

    let mut ticker = tokio::time::interval(scopus.interval);
    let mut rows = 0;
    for (index, issn) in issns.iter().enumerate() {
        ticker.tick().await;
        tracing::debug!(target: debug::PROGRESS, "ISSN {}/{}: {issn}", index + 1, issns.len());
        match scopus.subject_codes(issn).await {
            Ok(Some(codes)) => {
                for code in codes {
                    writer.write_record([issn.as_str(), code.as_str()]).map_err(csv_error)?;
                    rows += 1;
                }
            }
            Ok(None) => warn!("Error processing ISSN {issn}"),
            Err(e) => warn!("Error processing ISSN {issn}: {e}"),
        }
    }
    writer
        .flush()
        .map_err(|e| Error::io(output, e))?;
    timer.lap(&format!("wrote {rows} subject codes"));
    timer.finish();
    Ok(rows)
}

/// Download the default data of `kind` into `output`.
pub async fn download_default_source(kind: SourceKind, output: &Path, config: &Config) -> Result<()> {
    let Some(url) = kind.default_source() else {
        return Err(Error::message(format!(
            "The {kind} data source has no default download location."
        )));
    };
    let client = http_client(config)?;
    let size = download_url(&client, url, output).await?;
    tracing::info!("Downloaded {size} bytes from {url} into {}", output.display());
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn scopus_config(base_url: &str) -> Config {
        let mut config = Config::default();
        config.scopus.api_key = Some("secret".to_string());
        config.scopus.base_url = base_url.to_string();
        config.scopus.requests_per_second = 1000;
        config
    }

    #[test]
    fn test_parse_subject_codes() {
        let body = json!({"serial-metadata-response": {"entry": [
            {"subject-area": [{"@code": "2730", "$": "Oncology"}, {"@code": "1306"}]},
            {"subject-area": {"@code": 2700}}
        ]}});
        assert_eq!(
            parse_subject_codes(&body).unwrap(),
            vec!["2730", "1306", "2700"]
        );
        assert!(parse_subject_codes(&json!({"error": "x"})).is_none());
    }

    #[test]
    fn test_missing_api_key() {
        let err = ScopusClient::new(&Config::default()).unwrap_err();
        assert!(err.to_string().contains("SCOPUS_API_KEY"));
    }

    #[test]
    fn test_issn_query() {
        let temp_dir = TempDir::new().unwrap();
        let database = temp_dir.path().join("db.sqlite");
        Connection::open(&database)
            .unwrap()
            .execute_batch(
                "CREATE TABLE works(id, issn_print, issn_electronic);
                 INSERT INTO works VALUES
                   (1, '12345678', NULL), (2, NULL, '8765432X'),
                   (3, '12345678', '11111111'), (4, NULL, NULL);",
            )
            .unwrap();
        let mut issns = IssnQuery {
            database: database.clone(),
            sql_query: None,
            sampler: Sampler::all(),
        }
        .issns()
        .unwrap();
        issns.sort();
        assert_eq!(issns, vec!["12345678", "8765432X"]);

        let custom = IssnQuery {
            database,
            sql_query: Some("SELECT '00000000'".to_string()),
            sampler: Sampler::all(),
        }
        .issns()
        .unwrap();
        assert_eq!(custom, vec!["00000000"]);
    }

    #[test]
    fn test_issn_query_requires_works() {
        let temp_dir = TempDir::new().unwrap();
        let err = IssnQuery {
            database: temp_dir.path().join("empty.db"),
            sql_query: None,
            sampler: Sampler::all(),
        }
        .issns()
        .unwrap_err();
        assert_eq!(err.to_string(), "The required table 'works' is not populated.");
    }

    #[tokio::test]
    async fn test_download_issn_subject_codes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/content/serial/title/issn/12345678"))
            .and(query_param("view", "STANDARD"))
            .and(header("X-ELS-APIKey", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "serial-metadata-response": {"entry": [
                    {"subject-area": [{"@code": "2730"}, {"@code": "1306"}]}
                ]}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/content/serial/title/issn/00000000"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("codes.csv");
        let scopus = ScopusClient::new(&scopus_config(&server.uri())).unwrap();
        let issns = vec!["12345678".to_string(), "00000000".to_string()];
        let rows = download_issn_subject_codes(&scopus, &issns, &output)
            .await
            .unwrap();

        assert_eq!(rows, 2);
        assert_eq!(
            std::fs::read_to_string(&output).unwrap(),
            "issn,subject_code\n12345678,2730\n12345678,1306\n"
        );
    }

    #[tokio::test]
    async fn test_download_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/csv"))
            .respond_with(ResponseTemplate::new(200).set_body_string("a,b\n1,2\n"))
            .mount(&server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("out.csv");
        let client = http_client(&Config::default()).unwrap();
        let size = download_url(&client, &format!("{}/csv", server.uri()), &output)
            .await
            .unwrap();
        assert_eq!(size, 8);
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "a,b\n1,2\n");
    }

    #[tokio::test]
    async fn test_download_retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("out");
        let client = http_client(&Config::default()).unwrap();
        download_url(&client, &format!("{}/flaky", server.uri()), &output)
            .await
            .unwrap();
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_no_default_source() {
        let temp_dir = TempDir::new().unwrap();
        let err = download_default_source(
            SourceKind::Crossref,
            &temp_dir.path().join("out"),
            &Config::default(),
        )
        .await
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "The crossref data source has no default download location."
        );
    }
}
