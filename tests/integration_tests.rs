use act_patronage::aggregator::composition::composition;
use act_patronage::aggregator::{Period, TimeSeriesAggregator};
use act_patronage::fetch::{BasicClient, fetch_bytes};
use act_patronage::parser::parse_csv;
use act_patronage::sources::SourceCatalog;
use chrono::{Datelike, NaiveDate};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FIXTURE: &[u8] = include_bytes!("fixtures/passenger_groups.csv");

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn test_full_pipeline() {
    let raw = parse_csv(FIXTURE).expect("Failed to parse fixture");
    let dataset = TimeSeriesAggregator::load(&raw).expect("Failed to load dataset");

    // The export is newest-first; the dataset is oldest-first
    assert_eq!(dataset.len(), 40);
    assert_eq!(dataset.first_date(), Some(date(2022, 12, 26)));
    assert_eq!(dataset.last_date(), Some(date(2023, 2, 3)));

    // Free-text column is not a metric
    assert!(dataset.metric_index("notes").is_none());
    let groups = SourceCatalog::builtin();
    let expected = &groups.get("passenger-groups").unwrap().metrics;
    dataset.validate_schema(expected).unwrap();

    let weekly = TimeSeriesAggregator::aggregate(&dataset, Period::Weekly);
    let sundays: Vec<_> = weekly.records().iter().map(|r| r.date).collect();
    assert_eq!(
        sundays,
        vec![
            date(2023, 1, 1),
            date(2023, 1, 8),
            date(2023, 1, 15),
            date(2023, 1, 22),
            date(2023, 1, 29),
            date(2023, 2, 5),
        ]
    );

    let monthly = TimeSeriesAggregator::aggregate(&dataset, Period::Monthly);
    assert_eq!(monthly.len(), 3);
    assert_eq!(
        monthly.data().value(date(2022, 12, 31), "adult"),
        Some(6150.0)
    );

    // Every bucketing preserves the grand total of each metric
    for metric in dataset.metrics() {
        let daily_total: f64 = dataset.series(metric).unwrap().iter().map(|(_, v)| v).sum();
        for view in [&weekly, &monthly] {
            let total: f64 = view.series(metric).unwrap().iter().map(|(_, v)| v).sum();
            assert_eq!(total, daily_total, "{metric} total changed in {}", view.period());
        }
    }
}

#[test]
fn test_monthly_buckets_match_daily_sums_per_month() {
    let dataset = TimeSeriesAggregator::load(&parse_csv(FIXTURE).unwrap()).unwrap();
    let monthly = TimeSeriesAggregator::aggregate(&dataset, Period::Monthly);

    for bucket in monthly.records() {
        let idx = dataset.metric_index("concession").unwrap();
        let expected: f64 = dataset
            .records()
            .iter()
            .filter(|r| r.date.year() == bucket.date.year() && r.date.month() == bucket.date.month())
            .map(|r| r.values[idx])
            .sum();
        assert_eq!(bucket.values[idx], expected);
    }
}

#[test]
fn test_year_and_range_queries() {
    let dataset = TimeSeriesAggregator::load(&parse_csv(FIXTURE).unwrap()).unwrap();
    let daily = TimeSeriesAggregator::aggregate(&dataset, Period::Daily);

    let y2022 = TimeSeriesAggregator::filter_by_year(&daily, 2022);
    assert_eq!(y2022.len(), 6);
    assert!(TimeSeriesAggregator::filter_by_year(&daily, 2021).is_empty());

    let january =
        TimeSeriesAggregator::filter_by_range(&daily, date(2023, 1, 1), date(2023, 1, 31))
            .unwrap();
    assert_eq!(january.len(), 31);

    let monthly = TimeSeriesAggregator::aggregate(&january.into_data(), Period::Monthly);
    assert_eq!(monthly.len(), 1);

    assert!(
        TimeSeriesAggregator::filter_by_range(&daily, date(2022, 1, 1), date(2023, 1, 31))
            .is_err()
    );
}

#[test]
fn test_weekday_school_share() {
    let dataset = TimeSeriesAggregator::load(&parse_csv(FIXTURE).unwrap()).unwrap();
    let daily = TimeSeriesAggregator::aggregate(&dataset, Period::Daily);

    let shares = composition(&daily, &[]).unwrap();
    assert_eq!(shares.len(), 5);
    let total: f64 = shares.iter().map(|s| s.percent).sum();
    assert!((total - 100.0).abs() < 1e-9);

    let avg = TimeSeriesAggregator::moving_average(&daily, "school_student", 7).unwrap();
    assert_eq!(avg.iter().filter(|(_, v)| v.is_none()).count(), 6);
}

#[tokio::test]
async fn test_fetch_then_aggregate() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/resource/4d78-rcjw.csv"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(FIXTURE))
        .expect(1)
        .mount(&server)
        .await;

    let client = BasicClient::new().unwrap();
    let url = format!("{}/resource/4d78-rcjw.csv", server.uri());
    let bytes = fetch_bytes(&client, &url).await.unwrap();

    let dataset = TimeSeriesAggregator::load(&parse_csv(&bytes).unwrap()).unwrap();
    let weekly = TimeSeriesAggregator::aggregate(&dataset, Period::Weekly);
    assert_eq!(weekly.len(), 6);
}
