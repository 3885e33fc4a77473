//! CLI entry point for the ACT public transport patronage tool.
//!
//! Fetches patronage datasets from the ACT open-data portal (or a local CSV),
//! aggregates them by day, week, or month, and prints composition tables,
//! time series, and moving averages.

use act_patronage::aggregator::composition::{composition, select};
use act_patronage::aggregator::{AggregatedView, Period, TimeSeriesAggregator};
use act_patronage::config::Settings;
use act_patronage::fetch::{FetchCache, HttpClient};
use act_patronage::output::{
    export_csv, save_raw, write_composition, write_json, write_series, write_table,
};
use act_patronage::parser::parse_csv;
use act_patronage::sources::{Location, SourceCatalog, file_name_from_url};
use anyhow::{Context, Result};
use bytes::Bytes;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::ffi::OsStr;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "act_patronage")]
#[command(about = "Aggregate ACT public transport patronage data", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the known datasets
    Sources {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show metric composition and the aggregated series for a dataset
    Summary {
        #[command(flatten)]
        query: QueryArgs,

        /// Metrics to include (repeatable); all metrics when omitted
        #[arg(short, long = "metric", value_name = "METRIC")]
        metrics: Vec<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// Also write the aggregated view to this CSV file
        #[arg(long, value_name = "FILE")]
        export: Option<PathBuf>,

        /// Also save the raw downloaded export to this file
        #[arg(long, value_name = "FILE")]
        save_raw: Option<PathBuf>,
    },
    /// Trailing moving average of one metric
    MovingAverage {
        #[command(flatten)]
        query: QueryArgs,

        /// Metric to average
        #[arg(short, long)]
        metric: String,

        /// Window size in periods
        #[arg(short, long, default_value_t = 6)]
        window: usize,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Save a dataset's raw CSV export
    Download {
        /// Dataset id, URL, or local file
        #[arg(value_name = "SOURCE")]
        source: String,

        /// Output file; defaults to the export's file name
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Gzip-compress the saved file
        #[arg(long, default_value_t = false)]
        gzip: bool,
    },
}

#[derive(Args)]
struct QueryArgs {
    /// Dataset id, URL, or local CSV file
    #[arg(value_name = "SOURCE")]
    source: String,

    /// Bucket size: daily, weekly, or monthly
    #[arg(short, long, default_value = "monthly")]
    period: Period,

    /// Only include this calendar year
    #[arg(short, long, conflicts_with_all = ["start", "end"])]
    year: Option<i32>,

    /// First day to include (YYYY-MM-DD); requires --end
    #[arg(long, requires = "end")]
    start: Option<NaiveDate>,

    /// Last day to include (YYYY-MM-DD); requires --start
    #[arg(long, requires = "start")]
    end: Option<NaiveDate>,
}

#[derive(Serialize)]
struct SummaryReport<'a> {
    shares: Vec<act_patronage::aggregator::MetricShare>,
    view: &'a AggregatedView,
}

#[derive(Serialize)]
struct MovingAverageReport<'a> {
    metric: &'a str,
    window: usize,
    period: Period,
    values: Vec<(NaiveDate, Option<f64>)>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/act_patronage.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("act_patronage.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    let settings = Settings::from_env()?;
    let catalog = settings.catalog()?;
    let client = settings.http_client()?;
    let mut cache = FetchCache::default();
    let mut stdout = std::io::stdout().lock();

    match cli.command {
        Commands::Sources { json } => {
            let sources: Vec<_> = catalog.iter().collect();
            if json {
                write_json(&mut stdout, &sources)?;
            } else {
                for source in sources {
                    writeln!(stdout, "{:<18} {}", source.id, source.title)?;
                }
            }
        }
        Commands::Summary {
            query,
            metrics,
            json,
            export,
            save_raw: raw_path,
        } => {
            let view = query_view(&query, &catalog, &*client, &mut cache).await?;
            let view = select(&view, &metrics)?;
            let shares = composition(&view, &[])?;

            if json {
                write_json(&mut stdout, &SummaryReport { shares, view: &view })?;
            } else {
                write_composition(&mut stdout, &shares)?;
                writeln!(stdout)?;
                write_table(&mut stdout, &view)?;
            }

            if let Some(path) = export {
                export_csv(&path, &view)?;
            }
            if let Some(path) = raw_path {
                let location = catalog.resolve(&query.source);
                let bytes = fetcher(&location, &*client, &mut cache).await?;
                save_raw(&path, &bytes, false)?;
                info!(path = %path.display(), "Raw export saved");
            }
        }
        Commands::MovingAverage {
            query,
            metric,
            window,
            json,
        } => {
            let view = query_view(&query, &catalog, &*client, &mut cache).await?;
            let values = TimeSeriesAggregator::moving_average(&view, &metric, window)?;

            if json {
                let report = MovingAverageReport {
                    metric: &metric,
                    window,
                    period: view.period(),
                    values,
                };
                write_json(&mut stdout, &report)?;
            } else {
                write_series(&mut stdout, &metric, &values)?;
            }
        }
        Commands::Download {
            source,
            output,
            gzip,
        } => {
            let location = catalog.resolve(&source);
            let bytes = fetcher(&location, &*client, &mut cache).await?;

            let path = output.unwrap_or_else(|| {
                let mut name = match &location {
                    Location::Catalog(entry) => entry.file_name(),
                    Location::Url(url) => file_name_from_url(url),
                    Location::File(path) => file_name_from_url(path),
                };
                if gzip {
                    name.push_str(".gz");
                }
                PathBuf::from(name)
            });

            save_raw(&path, &bytes, gzip)?;
            info!(path = %path.display(), bytes = bytes.len(), gzip, "Download complete");
        }
    }

    Ok(())
}

/// Loads the queried dataset and returns it restricted and bucketed as asked.
///
/// Year and date-range restrictions apply to the daily rows before
/// bucketing, so weekly and monthly sums only count days inside the range.
async fn query_view(
    query: &QueryArgs,
    catalog: &SourceCatalog,
    client: &dyn HttpClient,
    cache: &mut FetchCache,
) -> Result<AggregatedView> {
    let location = catalog.resolve(&query.source);
    let bytes = fetcher(&location, client, cache).await?;

    let raw = parse_csv(&bytes).context("failed to read CSV export")?;
    let dataset = TimeSeriesAggregator::load(&raw)?;
    if let Location::Catalog(entry) = &location {
        dataset
            .validate_schema(&entry.metrics)
            .with_context(|| format!("dataset '{}' does not match its schema", entry.id))?;
    }

    info!(
        source = %query.source,
        records = dataset.len(),
        first = ?dataset.first_date(),
        last = ?dataset.last_date(),
        "Dataset ready"
    );

    let mut daily = TimeSeriesAggregator::aggregate(&dataset, Period::Daily);
    if let (Some(start), Some(end)) = (query.start, query.end) {
        daily = TimeSeriesAggregator::filter_by_range(&daily, start, end)?;
    } else if let Some(year) = query.year {
        daily = TimeSeriesAggregator::filter_by_year(&daily, year);
    }

    let view = TimeSeriesAggregator::aggregate(&daily.into_data(), query.period);
    debug!(period = %view.period(), buckets = view.len(), "View aggregated");
    Ok(view)
}

/// Loads export bytes from the catalog, a URL, or a local file.
#[tracing::instrument(skip(client, cache))]
async fn fetcher(
    location: &Location<'_>,
    client: &dyn HttpClient,
    cache: &mut FetchCache,
) -> Result<Bytes> {
    let bytes = match location {
        Location::Catalog(entry) => cache.get_or_fetch(client, &entry.url).await?,
        Location::Url(url) => cache.get_or_fetch(client, url).await?,
        Location::File(path) => Bytes::from(
            std::fs::read(path).with_context(|| format!("failed to read {path}"))?,
        ),
    };
    Ok(bytes)
}
