//! CLI argument definitions for Tickerline.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `fetch` | Run the provider cascade for one symbol and endpoint |
//! | `sources` | Show the provider plan for a symbol |
//! | `batch` | Dump every endpoint for one slice of a symbols file |
//! | `growth` | Compound annual growth of price, revenue or net income |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--timeout-ms` | `10000` | Per-provider timeout in ms |
//! | `--providers` | env or built-in | Global cascade order |
//!
//! # Examples
//!
//! ```bash
//! # Latest quote, falling through providers as needed
//! tickerline fetch AAPL
//!
//! # Daily series for an Indian listing (Yahoo only)
//! tickerline fetch RELIANCE.NS --endpoint time_series --pretty
//!
//! # Five-year revenue CAGR
//! tickerline growth AAPL --metric revenue --years 5
//!
//! # Second batch of 50 symbols into ./data
//! tickerline batch --symbols stocks.txt --batch 1
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tickerline_core::{GrowthMetric, ProviderId};

/// Tickerline - provider cascade for financial data
///
/// Requests go to TwelveData, FMP, Finnhub and Alpha Vantage in order until
/// one answers. Indian listings (.NS, .BO) go to Yahoo Finance only.
/// Provider keys come from TWELVEDATA_API_KEY, FMP_API_KEY, FINNHUB_API_KEY
/// and ALPHA_VANTAGE_API_KEY.
#[derive(Debug, Parser)]
#[command(
    name = "tickerline",
    author,
    version,
    about = "Provider cascade for financial market data"
)]
pub struct Cli {
    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Per-provider timeout in milliseconds. Overrides TICKERLINE_TIMEOUT_MS.
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// Global provider order, comma separated (e.g. fmp,twelvedata).
    #[arg(long, global = true, value_delimiter = ',')]
    pub providers: Vec<ProviderId>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the cascade for one symbol and print the result.
    ///
    /// Success prints the canonical JSON with `source` and `lastUpdated`.
    /// Failure prints `{error, symbol, endpoint}` and exits 2 for bad input
    /// or 3 when every provider failed.
    ///
    /// # Examples
    ///
    ///   tickerline fetch AAPL
    ///   tickerline fetch MSFT --endpoint earnings --pretty
    Fetch(FetchArgs),

    /// Show the ordered provider plan and its credential state.
    ///
    /// Makes no network calls. Without a symbol, shows the global order
    /// and the locale rules.
    Sources(SourcesArgs),

    /// Fetch every endpoint for one batch of a symbols file.
    ///
    /// Requests are spaced by a fixed interval. Each success is written to
    /// `<out>/<symbol>-<endpoint>.json`; failures are logged and skipped.
    Batch(BatchArgs),

    /// Compound annual growth over a window of whole years.
    ///
    /// `price` reads the daily series, `revenue` and `net_income` read the
    /// income statements. Prints `cagr: null` when the data does not reach
    /// back far enough.
    ///
    /// # Examples
    ///
    ///   tickerline growth AAPL
    ///   tickerline growth MSFT --metric net_income --years 3
    Growth(GrowthArgs),
}

/// Arguments for the `fetch` command.
#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Market symbol (e.g. AAPL, BRK.B, TCS.NS).
    pub symbol: String,

    /// Endpoint: quote, time_series, dividends, earnings, cash_flow or
    /// income_statement.
    #[arg(long, short, default_value = "quote")]
    pub endpoint: String,
}

/// Arguments for the `sources` command.
#[derive(Debug, Args)]
pub struct SourcesArgs {
    /// Symbol to plan for.
    pub symbol: Option<String>,
}

/// Arguments for the `growth` command.
#[derive(Debug, Args)]
pub struct GrowthArgs {
    /// Market symbol.
    pub symbol: String,

    /// Metric: price, revenue or net_income.
    #[arg(long, short, default_value = "price")]
    pub metric: GrowthMetric,

    /// Window length in years.
    #[arg(long, short, default_value_t = 5, value_parser = clap::value_parser!(u32).range(1..=30))]
    pub years: u32,
}

/// Arguments for the `batch` command.
#[derive(Debug, Args)]
pub struct BatchArgs {
    /// File with one symbol per line.
    #[arg(long, default_value = "stocks.txt")]
    pub symbols: PathBuf,

    /// Zero-based batch number.
    #[arg(long, default_value_t = 0)]
    pub batch: usize,

    /// Symbols per batch.
    #[arg(long, default_value_t = 50)]
    pub size: usize,

    /// Output directory.
    #[arg(long, default_value = "data")]
    pub out: PathBuf,

    /// Milliseconds between cascade runs.
    #[arg(long, default_value_t = 1_200)]
    pub interval_ms: u64,

    /// Endpoints to fetch, comma separated. Defaults to all of them.
    #[arg(long, value_delimiter = ',')]
    pub endpoints: Vec<String>,
}
