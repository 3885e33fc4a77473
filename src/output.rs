//! Rendering and persistence of aggregated views.
//!
//! Supports plain-text tables, JSON, CSV export, and saving the raw
//! downloaded export (optionally gzip-compressed).

use chrono::NaiveDate;
use csv::WriterBuilder;
use flate2::Compression;
use flate2::write::GzEncoder;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

use crate::aggregator::{AggregatedView, MetricShare};
use crate::error::Result;

/// Writes the view as an aligned text table, one row per bucket.
pub fn write_table<W: Write>(out: &mut W, view: &AggregatedView) -> Result<()> {
    let widths: Vec<usize> = view.metrics().iter().map(|m| m.len().max(12)).collect();

    write!(out, "{:<10}", "date")?;
    for (metric, width) in view.metrics().iter().zip(widths.iter().copied()) {
        write!(out, "  {metric:>width$}")?;
    }
    writeln!(out)?;

    for record in view.records() {
        write!(out, "{}", record.date.format("%Y-%m-%d"))?;
        for (value, width) in record.values.iter().zip(widths.iter().copied()) {
            write!(out, "  {value:>width$.0}")?;
        }
        writeln!(out)?;
    }

    Ok(())
}

/// Writes metric totals and their percentage of the grand total.
pub fn write_composition<W: Write>(out: &mut W, shares: &[MetricShare]) -> Result<()> {
    let width = shares.iter().map(|s| s.metric.len()).max().unwrap_or(6).max(6);

    writeln!(out, "{:<width$}  {:>14}  {:>7}", "metric", "total", "share")?;
    for share in shares {
        writeln!(
            out,
            "{:<width$}  {:>14.0}  {:>6.1}%",
            share.metric, share.total, share.percent
        )?;
    }

    Ok(())
}

/// Writes a moving-average series; windows without a value print as `-`.
pub fn write_series<W: Write>(
    out: &mut W,
    metric: &str,
    series: &[(NaiveDate, Option<f64>)],
) -> Result<()> {
    writeln!(out, "{:<10}  {:>14}", "date", metric)?;
    for (date, value) in series {
        match value {
            Some(v) => writeln!(out, "{}  {:>14.2}", date.format("%Y-%m-%d"), v)?,
            None => writeln!(out, "{}  {:>14}", date.format("%Y-%m-%d"), "-")?,
        }
    }
    Ok(())
}

/// Writes `value` as pretty-printed JSON followed by a newline.
pub fn write_json<W: Write>(out: &mut W, value: &impl Serialize) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    writeln!(out, "{json}")?;
    Ok(())
}

/// Writes the view to a CSV file at `path`, replacing any existing file.
///
/// The header is `date` followed by the view's metric names.
pub fn export_csv(path: &Path, view: &AggregatedView) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);

    let mut header = vec!["date".to_string()];
    header.extend(view.metrics().iter().cloned());
    writer.write_record(&header)?;

    for record in view.records() {
        let mut row = vec![record.date.format("%Y-%m-%d").to_string()];
        row.extend(record.values.iter().map(|v| v.to_string()));
        writer.write_record(&row)?;
    }
    writer.flush()?;

    info!(path = %path.display(), rows = view.len(), period = %view.period(), "View exported");
    Ok(())
}

/// Saves the downloaded export bytes to `path`, gzip-compressing when asked.
pub fn save_raw(path: &Path, bytes: &[u8], gzip: bool) -> Result<()> {
    let mut file = File::create(path)?;

    if gzip {
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(bytes)?;
        encoder.finish()?;
    } else {
        file.write_all(bytes)?;
        file.flush()?;
    }

    debug!(path = %path.display(), bytes = bytes.len(), gzip, "Raw export saved");
    Ok(())
}
