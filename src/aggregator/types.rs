//! Data types used by the aggregation pipeline.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::{PatronageError, Result};

/// Bucket size for an [`AggregatedView`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    /// One bucket per source row
    Daily,
    /// Weeks ending Sunday, labelled by the Sunday
    Weekly,
    /// Calendar months, labelled by the last day of the month
    Monthly,
}

impl Period {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "daily" | "day" | "d" => Ok(Self::Daily),
            "weekly" | "week" | "w" => Ok(Self::Weekly),
            "monthly" | "month" | "m" => Ok(Self::Monthly),
            other => Err(format!("unknown period '{other}' (expected daily, weekly or monthly)")),
        }
    }
}

/// How `load` treats two rows carrying the same date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// The later row in input order replaces the earlier one
    #[default]
    LastWins,
    /// Fail with [`PatronageError::DuplicateDate`]
    Reject,
}

/// One row: a calendar day and one value per metric column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub date: NaiveDate,
    /// Aligned with [`Dataset::metrics`]
    pub values: Vec<f64>,
}

/// Date-ordered records, unique per date, with named metric columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Dataset {
    metrics: Vec<String>,
    records: Vec<Record>,
}

impl Dataset {
    /// Builds a dataset from records already sorted and unique by date.
    pub(crate) fn from_sorted(metrics: Vec<String>, records: Vec<Record>) -> Self {
        debug_assert!(records.windows(2).all(|w| w[0].date < w[1].date));
        Self { metrics, records }
    }

    pub fn metrics(&self) -> &[String] {
        &self.metrics
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.records.first().map(|r| r.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.records.last().map(|r| r.date)
    }

    pub fn metric_index(&self, metric: &str) -> Option<usize> {
        self.metrics.iter().position(|m| m == metric)
    }

    /// Looks up the record for `date`.
    pub fn get(&self, date: NaiveDate) -> Option<&Record> {
        self.records
            .binary_search_by_key(&date, |r| r.date)
            .ok()
            .map(|i| &self.records[i])
    }

    /// Value of `metric` on `date`, if both exist.
    pub fn value(&self, date: NaiveDate, metric: &str) -> Option<f64> {
        let idx = self.metric_index(metric)?;
        self.get(date).map(|r| r.values[idx])
    }

    /// The `(date, value)` series of one metric column.
    pub fn series(&self, metric: &str) -> Result<Vec<(NaiveDate, f64)>> {
        let idx = self
            .metric_index(metric)
            .ok_or_else(|| PatronageError::UnknownMetric(metric.to_string()))?;
        Ok(self.records.iter().map(|r| (r.date, r.values[idx])).collect())
    }

    /// Checks that every metric in `expected` was discovered at load time.
    pub fn validate_schema(&self, expected: &[String]) -> Result<()> {
        let missing: Vec<String> = expected
            .iter()
            .filter(|m| self.metric_index(m).is_none())
            .cloned()
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(PatronageError::MissingColumns(missing))
        }
    }
}

/// A [`Dataset`] bucketed by [`Period`].
///
/// For weekly and monthly views every bucket between the first and last is
/// present, zero-filled when no source rows fell into it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedView {
    period: Period,
    data: Dataset,
    /// First and last daily date the buckets were built from; `None` when empty
    coverage: Option<(NaiveDate, NaiveDate)>,
}

impl AggregatedView {
    pub(crate) fn new(
        period: Period,
        data: Dataset,
        coverage: Option<(NaiveDate, NaiveDate)>,
    ) -> Self {
        Self {
            period,
            data,
            coverage,
        }
    }

    pub fn period(&self) -> Period {
        self.period
    }

    /// The observed daily span behind this view. Bucket labels may lie
    /// outside it: a week is labelled by its Sunday, a month by its last day.
    pub fn coverage(&self) -> Option<(NaiveDate, NaiveDate)> {
        self.coverage
    }

    /// The bucketed rows, labelled by bucket end date.
    pub fn data(&self) -> &Dataset {
        &self.data
    }

    pub fn into_data(self) -> Dataset {
        self.data
    }

    pub fn metrics(&self) -> &[String] {
        self.data.metrics()
    }

    pub fn records(&self) -> &[Record] {
        self.data.records()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, date: NaiveDate) -> Option<&Record> {
        self.data.get(date)
    }

    pub fn series(&self, metric: &str) -> Result<Vec<(NaiveDate, f64)>> {
        self.data.series(metric)
    }
}

/// One metric's share of the total over a view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricShare {
    pub metric: String,
    pub total: f64,
    /// Percentage of the grand total, 0.0 when the grand total is zero
    pub percent: f64,
}
