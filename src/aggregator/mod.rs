//! Time-series aggregation of daily patronage data.
//!
//! Raw CSV rows are loaded into a date-ordered [`Dataset`], bucketed into
//! daily, weekly, or monthly [`AggregatedView`]s, and queried by year, date
//! range, moving average, and metric composition. Every operation is a pure
//! function of its inputs.

pub mod aggregate;
pub mod composition;
pub mod types;
pub mod utility;

pub use aggregate::TimeSeriesAggregator;
pub use types::{AggregatedView, Dataset, DuplicatePolicy, MetricShare, Period, Record};
