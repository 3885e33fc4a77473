use crate::aggregator::types::{AggregatedView, Dataset, MetricShare, Record};
use crate::aggregator::utility::pct;
use crate::error::{PatronageError, Result};

/// Resolves metric names to column indices; an empty selection means every column.
fn resolve(view: &AggregatedView, metrics: &[String]) -> Result<Vec<usize>> {
    if metrics.is_empty() {
        return Ok((0..view.metrics().len()).collect());
    }

    metrics
        .iter()
        .map(|m| {
            view.data()
                .metric_index(m)
                .ok_or_else(|| PatronageError::UnknownMetric(m.clone()))
        })
        .collect()
}

/// Totals each selected metric over the view and its share of the grand total.
///
/// Shares are listed in selection order (column order when `metrics` is empty).
pub fn composition(view: &AggregatedView, metrics: &[String]) -> Result<Vec<MetricShare>> {
    let indices = resolve(view, metrics)?;

    let totals: Vec<f64> = indices
        .iter()
        .map(|&i| view.records().iter().map(|r| r.values[i]).sum())
        .collect();
    let grand_total: f64 = totals.iter().sum();

    Ok(indices
        .iter()
        .zip(totals)
        .map(|(&i, total)| MetricShare {
            metric: view.metrics()[i].clone(),
            total,
            percent: pct(total, grand_total),
        })
        .collect())
}

/// Projects the view onto the selected metric columns, in selection order.
pub fn select(view: &AggregatedView, metrics: &[String]) -> Result<AggregatedView> {
    let indices = resolve(view, metrics)?;

    let names = indices.iter().map(|&i| view.metrics()[i].clone()).collect();
    let records = view
        .records()
        .iter()
        .map(|r| Record {
            date: r.date,
            values: indices.iter().map(|&i| r.values[i]).collect(),
        })
        .collect();

    Ok(AggregatedView::new(
        view.period(),
        Dataset::from_sorted(names, records),
        view.coverage(),
    ))
}
