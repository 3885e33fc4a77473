use crate::aggregator::types::{AggregatedView, Dataset, DuplicatePolicy, Period, Record};
use crate::aggregator::utility::mean;
use crate::error::{PatronageError, Result};
use crate::parser::RawRows;
use chrono::{Datelike, Days, NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;
use tracing::debug;

/// Name of the column every dataset is keyed on.
pub const DATE_COLUMN: &str = "date";

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
];

/// Stateless pipeline from raw rows to query-ready views.
pub struct TimeSeriesAggregator;

impl TimeSeriesAggregator {
    /// Loads raw rows into a [`Dataset`], keeping the last row for a repeated date.
    pub fn load(raw: &RawRows) -> Result<Dataset> {
        Self::load_with_policy(raw, DuplicatePolicy::LastWins)
    }

    /// Loads raw rows into a [`Dataset`] sorted ascending by date.
    ///
    /// Every column other than `date` whose non-empty cells all parse as
    /// numbers becomes a metric; empty cells load as zero. Other columns are
    /// dropped.
    ///
    /// # Errors
    ///
    /// [`PatronageError::Parse`] if the `date` column is missing, a row's cell
    /// count differs from the header's, or a date is unparseable;
    /// [`PatronageError::DuplicateDate`] if `policy` is
    /// [`DuplicatePolicy::Reject`] and two rows share a date.
    pub fn load_with_policy(raw: &RawRows, policy: DuplicatePolicy) -> Result<Dataset> {
        let date_idx = raw
            .column_index(DATE_COLUMN)
            .ok_or_else(|| PatronageError::Parse(format!("missing '{DATE_COLUMN}' column")))?;

        if let Some((n, row)) = raw
            .rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != raw.headers.len())
        {
            return Err(PatronageError::Parse(format!(
                "row {} has {} cells, expected {}",
                n + 1,
                row.len(),
                raw.headers.len()
            )));
        }

        let metric_cols: Vec<usize> = (0..raw.headers.len())
            .filter(|&i| i != date_idx)
            .filter(|&i| {
                raw.rows
                    .iter()
                    .all(|row| row[i].is_empty() || parse_number(&row[i]).is_some())
            })
            .collect();

        let metrics: Vec<String> = metric_cols.iter().map(|&i| raw.headers[i].clone()).collect();

        let mut records = Vec::with_capacity(raw.rows.len());
        for row in &raw.rows {
            let date = parse_date(&row[date_idx])?;
            let values = metric_cols
                .iter()
                .map(|&i| parse_number(&row[i]).unwrap_or(0.0))
                .collect();
            records.push(Record { date, values });
        }

        // Stable sort keeps input order among equal dates
        records.sort_by_key(|r| r.date);

        let mut unique: Vec<Record> = Vec::with_capacity(records.len());
        let mut duplicates = 0usize;
        for record in records {
            if unique.last().map(|prev| prev.date) != Some(record.date) {
                unique.push(record);
                continue;
            }
            match policy {
                DuplicatePolicy::LastWins => {
                    duplicates += 1;
                    let last = unique.len() - 1;
                    unique[last] = record;
                }
                DuplicatePolicy::Reject => {
                    return Err(PatronageError::DuplicateDate(record.date));
                }
            }
        }

        debug!(
            rows = raw.rows.len(),
            records = unique.len(),
            metrics = metrics.len(),
            duplicates,
            "Dataset loaded"
        );

        Ok(Dataset::from_sorted(metrics, unique))
    }

    /// Buckets `dataset` by `period`, summing each metric within a bucket.
    ///
    /// Daily is the identity. Weekly and monthly views contain every bucket
    /// from the first row's bucket to the last row's, zero-filled where no
    /// rows fall.
    pub fn aggregate(dataset: &Dataset, period: Period) -> AggregatedView {
        let (Some(first), Some(last)) = (dataset.first_date(), dataset.last_date()) else {
            let empty = Dataset::from_sorted(dataset.metrics().to_vec(), Vec::new());
            return AggregatedView::new(period, empty, None);
        };
        let coverage = Some((first, last));

        if period == Period::Daily {
            return AggregatedView::new(period, dataset.clone(), coverage);
        }

        let width = dataset.metrics().len();
        let mut buckets: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();

        let last_bucket = bucket_end(period, last);
        let mut bucket = bucket_end(period, first);
        loop {
            buckets.insert(bucket, vec![0.0; width]);
            if bucket >= last_bucket {
                break;
            }
            match bucket.succ_opt() {
                Some(next) => bucket = bucket_end(period, next),
                None => break,
            }
        }

        for record in dataset.records() {
            if let Some(sums) = buckets.get_mut(&bucket_end(period, record.date)) {
                for (sum, value) in sums.iter_mut().zip(&record.values) {
                    *sum += value;
                }
            }
        }

        let records = buckets
            .into_iter()
            .map(|(date, values)| Record { date, values })
            .collect();

        AggregatedView::new(
            period,
            Dataset::from_sorted(dataset.metrics().to_vec(), records),
            coverage,
        )
    }

    /// Buckets overlapping `start..=end`. For a daily view that is the rows
    /// dated inside the range; a weekly or monthly bucket is kept when any of
    /// its days falls inside it.
    ///
    /// # Errors
    ///
    /// [`PatronageError::InvalidRange`] if `start > end`, the view is empty,
    /// or either bound lies outside the view's [coverage](AggregatedView::coverage).
    pub fn filter_by_range(
        view: &AggregatedView,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<AggregatedView> {
        if start > end {
            return Err(PatronageError::InvalidRange(format!(
                "start {start} is after end {end}"
            )));
        }

        let Some((min, max)) = view.coverage() else {
            return Err(PatronageError::InvalidRange("no data available".to_string()));
        };

        if start < min || end > max {
            return Err(PatronageError::InvalidRange(format!(
                "{start} to {end} is outside the available range {min} to {max}"
            )));
        }

        let period = view.period();
        Ok(Self::retain(
            view,
            |label| bucket_start(period, label) <= end && label >= start,
            Some((start, end)),
        ))
    }

    /// Buckets labelled in calendar `year`. Empty when none match.
    pub fn filter_by_year(view: &AggregatedView, year: i32) -> AggregatedView {
        let in_year = |label: NaiveDate| label.year() == year;
        let coverage = view
            .coverage()
            .filter(|_| view.records().iter().any(|r| in_year(r.date)))
            .and_then(|(min, max)| {
                let first = NaiveDate::from_ymd_opt(year, 1, 1)?.max(min);
                let last = NaiveDate::from_ymd_opt(year, 12, 31)?.min(max);
                (first <= last).then_some((first, last))
            });
        Self::retain(view, in_year, coverage)
    }

    /// Trailing simple moving average of `metric` over `window` periods.
    ///
    /// The first `window - 1` entries have no value.
    pub fn moving_average(
        view: &AggregatedView,
        metric: &str,
        window: usize,
    ) -> Result<Vec<(NaiveDate, Option<f64>)>> {
        if window == 0 {
            return Err(PatronageError::InvalidWindow(window));
        }

        let series = view.series(metric)?;
        let values: Vec<f64> = series.iter().map(|(_, v)| *v).collect();

        Ok(series
            .iter()
            .enumerate()
            .map(|(i, (date, _))| {
                let avg = (i + 1 >= window).then(|| mean(&values[i + 1 - window..=i]));
                (*date, avg)
            })
            .collect())
    }

    fn retain(
        view: &AggregatedView,
        keep: impl Fn(NaiveDate) -> bool,
        coverage: Option<(NaiveDate, NaiveDate)>,
    ) -> AggregatedView {
        let records = view
            .records()
            .iter()
            .filter(|r| keep(r.date))
            .cloned()
            .collect();

        AggregatedView::new(
            view.period(),
            Dataset::from_sorted(view.metrics().to_vec(), records),
            coverage,
        )
    }
}

/// Parses a calendar date, dropping any time-of-day component.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    let s = s.trim();

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(date);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt.date());
        }
    }

    Err(PatronageError::Parse(format!("unparseable date '{s}'")))
}

/// Parses a numeric cell, tolerating thousands separators.
fn parse_number(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    s.replace(',', "").parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Label of the bucket containing `date`: the Sunday ending its week, or
/// the last day of its month.
fn bucket_end(period: Period, date: NaiveDate) -> NaiveDate {
    match period {
        Period::Daily => date,
        Period::Weekly => {
            let to_sunday = 6 - u64::from(date.weekday().num_days_from_monday());
            date.checked_add_days(Days::new(to_sunday))
                .unwrap_or(NaiveDate::MAX)
        }
        Period::Monthly => {
            let (year, month) = if date.month() == 12 {
                (date.year() + 1, 1)
            } else {
                (date.year(), date.month() + 1)
            };
            NaiveDate::from_ymd_opt(year, month, 1)
                .and_then(|d| d.pred_opt())
                .unwrap_or(NaiveDate::MAX)
        }
    }
}

/// First day of the bucket labelled `label`.
fn bucket_start(period: Period, label: NaiveDate) -> NaiveDate {
    match period {
        Period::Daily => label,
        Period::Weekly => label.checked_sub_days(Days::new(6)).unwrap_or(NaiveDate::MIN),
        Period::Monthly => label.with_day(1).unwrap_or(label),
    }
}
