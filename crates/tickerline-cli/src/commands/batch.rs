use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;
use tickerline_core::{CascadeRequest, CascadeResult, CascadeRouter, Endpoint, Pacer, Symbol};
use tracing::{info, warn};

use crate::cli::BatchArgs;
use crate::error::CliError;
use crate::output;

/// Outcome of one batch run, printed when the run ends.
#[derive(Debug, Serialize)]
pub struct BatchSummary {
    pub batch: usize,
    pub symbols: usize,
    pub written: Vec<PathBuf>,
    pub failed: Vec<BatchFailure>,
}

#[derive(Debug, Serialize)]
pub struct BatchFailure {
    pub symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<Endpoint>,
    pub error: String,
}

/// Runs every requested endpoint for each symbol in the selected batch.
///
/// Cascade runs are spaced by `interval_ms`. A failed run is logged and
/// recorded; only an unreadable symbols file or output directory aborts.
pub async fn run(args: &BatchArgs, router: &CascadeRouter) -> Result<BatchSummary, CliError> {
    let endpoints = parse_endpoints(&args.endpoints)?;
    let contents = fs::read_to_string(&args.symbols)?;
    let symbols = select_batch(&contents, args.batch, args.size);

    let mut summary = BatchSummary {
        batch: args.batch,
        symbols: symbols.len(),
        written: Vec::new(),
        failed: Vec::new(),
    };
    if symbols.is_empty() {
        info!(batch = args.batch, "batch has no symbols");
        return Ok(summary);
    }

    fs::create_dir_all(&args.out)?;
    info!(batch = args.batch, symbols = symbols.len(), "starting batch");

    let pacer = Pacer::new(Duration::from_millis(args.interval_ms));
    for raw in symbols {
        let symbol = match Symbol::parse(raw) {
            Ok(symbol) => symbol,
            Err(error) => {
                warn!(symbol = raw, %error, "skipping invalid symbol");
                summary.failed.push(BatchFailure {
                    symbol: raw.to_owned(),
                    endpoint: None,
                    error: error.to_string(),
                });
                continue;
            }
        };

        for &endpoint in &endpoints {
            pacer.until_ready().await;

            let request = CascadeRequest::new(symbol.clone(), endpoint);
            let outcome = match router.fetch(&request).await {
                Ok(result) => {
                    let path = args.out.join(dump_file_name(&symbol, endpoint));
                    write_dump(&path, &result).map(|()| (path, result.source))
                }
                Err(error) => Err(CliError::from(error)),
            };

            match outcome {
                Ok((path, source)) => {
                    info!(file = %path.display(), source = source.as_str(), "wrote dump");
                    summary.written.push(path);
                }
                Err(error) => {
                    warn!(symbol = %symbol, %endpoint, %error, "skipping");
                    summary.failed.push(BatchFailure {
                        symbol: symbol.to_string(),
                        endpoint: Some(endpoint),
                        error: error.to_string(),
                    });
                }
            }
        }
    }

    info!(
        written = summary.written.len(),
        failed = summary.failed.len(),
        "batch complete"
    );
    Ok(summary)
}

/// Slice `batch` (zero-based) of the non-blank lines in `contents`.
fn select_batch(contents: &str, batch: usize, size: usize) -> Vec<&str> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .skip(batch.saturating_mul(size))
        .take(size)
        .collect()
}

fn parse_endpoints(raw: &[String]) -> Result<Vec<Endpoint>, CliError> {
    if raw.is_empty() {
        return Ok(Endpoint::ALL.to_vec());
    }
    let mut endpoints = Vec::with_capacity(raw.len());
    for value in raw {
        let endpoint = Endpoint::from_str(value)?;
        if !endpoints.contains(&endpoint) {
            endpoints.push(endpoint);
        }
    }
    Ok(endpoints)
}

fn dump_file_name(symbol: &Symbol, endpoint: Endpoint) -> String {
    format!("{}-{}.json", symbol.to_file_stem(), endpoint)
}

fn write_dump(path: &Path, result: &CascadeResult) -> Result<(), CliError> {
    let mut writer = BufWriter::new(File::create(path)?);
    output::write_json(&mut writer, result, true)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tickerline_core::{CascadeRouterBuilder, ProviderId, ScriptedHttpClient};

    use super::*;

    const RELIANCE_QUOTE: &str = r#"{"chart": {"result": [{
        "meta": {
            "currency": "INR", "symbol": "RELIANCE.NS", "regularMarketPrice": 2600.0,
            "regularMarketTime": 1704189600, "regularMarketDayHigh": 2610.0,
            "regularMarketDayLow": 2570.5, "regularMarketVolume": 5123456,
            "chartPreviousClose": 2500.0
        },
        "timestamp": [1704166500],
        "indicators": {"quote": [{"open": [2580.0], "high": [2610.0], "low": [2570.5], "close": [2600.0], "volume": [5123456]}]}
    }], "error": null}}"#;

    fn args(dir: &Path, symbols: &Path, batch: usize, size: usize, endpoints: &[&str]) -> BatchArgs {
        BatchArgs {
            symbols: symbols.to_path_buf(),
            batch,
            size,
            out: dir.join("data"),
            interval_ms: 1,
            endpoints: endpoints.iter().map(|value| value.to_string()).collect(),
        }
    }

    #[test]
    fn batches_are_zero_based_slices_of_non_blank_lines() {
        let contents = "AAPL\r\n\nMSFT\n  \nGOOG\nTSLA\n";
        assert_eq!(select_batch(contents, 0, 2), vec!["AAPL", "MSFT"]);
        assert_eq!(select_batch(contents, 1, 2), vec!["GOOG", "TSLA"]);
        assert!(select_batch(contents, 2, 2).is_empty());
    }

    #[test]
    fn endpoints_default_to_all_and_reject_unknown_names() {
        assert_eq!(parse_endpoints(&[]).expect("default"), Endpoint::ALL.to_vec());
        assert_eq!(
            parse_endpoints(&[String::from("quote"), String::from("QUOTE")]).expect("dedup"),
            vec![Endpoint::Quote]
        );
        assert!(parse_endpoints(&[String::from("news")]).is_err());
    }

    #[test]
    fn dump_names_use_lowercase_symbols() {
        let symbol = Symbol::parse("brk.b").expect("symbol");
        assert_eq!(
            dump_file_name(&symbol, Endpoint::IncomeStatement),
            "brk.b-income_statement.json"
        );
    }

    #[tokio::test]
    async fn writes_successes_and_records_failures() {
        let dir = tempfile::tempdir().expect("tempdir");
        let symbols = dir.path().join("stocks.txt");
        fs::write(&symbols, "reliance.ns\ninfy.ns\n\nTCS.BO\n").expect("symbols file");

        let client = ScriptedHttpClient::new().respond("RELIANCE.NS?interval=1d&range=1d", 200, RELIANCE_QUOTE);
        let router = CascadeRouterBuilder::new()
            .with_http_client(Arc::new(client))
            .without_cache()
            .build();

        let summary = run(&args(dir.path(), &symbols, 0, 2, &["quote", "earnings"]), &router)
            .await
            .expect("batch runs");

        assert_eq!(summary.symbols, 2);
        let expected = dir.path().join("data").join("reliance.ns-quote.json");
        assert_eq!(summary.written, vec![expected.clone()]);
        assert_eq!(summary.failed.len(), 3);
        assert!(summary
            .failed
            .iter()
            .any(|failure| failure.symbol == "INFY.NS" && failure.endpoint == Some(Endpoint::Quote)));

        let dump: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(expected).expect("dump file")).expect("json");
        assert_eq!(dump["source"], ProviderId::Yahoo.display_name());
        assert!(dump.get("lastUpdated").is_some());
    }

    #[tokio::test]
    async fn empty_batch_writes_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let symbols = dir.path().join("stocks.txt");
        fs::write(&symbols, "AAPL\n").expect("symbols file");

        let router = CascadeRouterBuilder::new()
            .with_http_client(Arc::new(ScriptedHttpClient::new()))
            .build();
        let summary = run(&args(dir.path(), &symbols, 3, 50, &[]), &router)
            .await
            .expect("batch runs");

        assert_eq!(summary.symbols, 0);
        assert!(summary.written.is_empty());
        assert!(!dir.path().join("data").exists());
    }
}
