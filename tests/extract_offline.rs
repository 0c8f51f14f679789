//! End-to-end assembly over a pre-populated cache. No test here touches
//! the network: every URL the pipeline would fetch is written into the
//! client's cache first, and cache hits bypass throttle and budgets.

mod common;

use common::{cached_client, read_fixture};
use factkit::{EdgarClient, ExtractOptions, SegmentsMode, extract_company_financials};

const TICKERS_URL: &str = "https://www.sec.gov/files/company_tickers.json";
const SUBMISSIONS_URL: &str = "https://data.sec.gov/submissions/CIK0000320193.json";
const FACTS_URL: &str = "https://data.sec.gov/api/xbrl/companyfacts/CIK0000320193.json";
const INDEX_URL: &str =
    "https://www.sec.gov/Archives/edgar/data/320193/000101000001/index.json";
const INSTANCE_URL: &str =
    "https://www.sec.gov/Archives/edgar/data/320193/000101000001/aapl-20240928_htm.xml";
const PRIMARY_DOC_ANNUAL_URL: &str =
    "https://www.sec.gov/Archives/edgar/data/320193/000101000001/aapl-10k.htm";
const PRIMARY_DOC_QUARTERLY_URL: &str =
    "https://www.sec.gov/Archives/edgar/data/320193/000101000003/aapl-10q.htm";

/// Submissions trimmed to the single annual filing.
const ANNUAL_ONLY_SUBMISSIONS: &str = r#"{
  "filings": {
    "recent": {
      "accessionNumber": ["0001-01-000001"],
      "filingDate": ["2024-11-01"],
      "reportDate": ["2024-09-28"],
      "form": ["10-K"],
      "primaryDocument": ["aapl-10k.htm"],
      "fy": [2024],
      "fp": ["FY"]
    }
  }
}"#;

fn seed_common(client: &EdgarClient) {
    let cache = client.cache();
    cache
        .write(TICKERS_URL, read_fixture("catalog/company_tickers.json").as_bytes())
        .unwrap();
    cache
        .write(FACTS_URL, read_fixture("facts/companyfacts.json").as_bytes())
        .unwrap();
}

#[tokio::test]
async fn annual_filing_with_segments_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let client = cached_client(dir.path());
    seed_common(&client);
    client
        .cache()
        .write(SUBMISSIONS_URL, ANNUAL_ONLY_SUBMISSIONS.as_bytes())
        .unwrap();
    client
        .cache()
        .write(
            PRIMARY_DOC_ANNUAL_URL,
            b"<html><body><p>This report describes historical results.</p></body></html>",
        )
        .unwrap();

    let options = ExtractOptions::new().with_segments_mode(SegmentsMode::None);
    let payload = extract_company_financials(&client, "AAPL", &options)
        .await
        .unwrap();

    assert_eq!(payload.company.cik, "0000320193");
    assert_eq!(payload.company.ticker, "AAPL");
    assert_eq!(payload.periods.len(), 1);

    let period = &payload.periods[0];
    assert_eq!(period.fiscal_year, 2024);
    assert_eq!(period.fiscal_period, "FY");
    assert_eq!(period.period_end, "2024-09-28");
    assert!(period.period_start.is_none());

    assert_eq!(period.revenue.as_ref().unwrap().value, 100.0);
    assert_eq!(period.profit_net_income.as_ref().unwrap().value, 10.0);
    assert_eq!(period.capex.as_ref().unwrap().value, 5.0);
    assert!(period.revenue_by_segment.is_empty());

    let segment_entry = period
        .missing_data
        .iter()
        .find(|m| m.field == "segment_metrics")
        .unwrap();
    assert!(segment_entry.reason.contains("none"));

    // No guidance sentence in the narrative document.
    assert!(period.forecasted_capex.is_empty());
    assert!(period.missing_data.iter().any(|m| m.field == "forecasted_capex"));

    // The whole run came from cache.
    assert_eq!(client.usage().request_count, 0);
    assert_eq!(client.usage().bytes_downloaded, 0);
}

#[tokio::test]
async fn reruns_over_a_warm_cache_are_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let client = cached_client(dir.path());
    seed_common(&client);
    client
        .cache()
        .write(SUBMISSIONS_URL, ANNUAL_ONLY_SUBMISSIONS.as_bytes())
        .unwrap();
    client
        .cache()
        .write(PRIMARY_DOC_ANNUAL_URL, b"<html><body>Nothing forward-looking.</body></html>")
        .unwrap();

    let options = ExtractOptions::new().with_segments_mode(SegmentsMode::None);
    let first = extract_company_financials(&client, "AAPL", &options).await.unwrap();
    let second = extract_company_financials(&client, "AAPL", &options).await.unwrap();

    let mut a = serde_json::to_value(&first).unwrap();
    let mut b = serde_json::to_value(&second).unwrap();
    a.as_object_mut().unwrap().remove("generated_at_utc");
    b.as_object_mut().unwrap().remove("generated_at_utc");
    assert_eq!(a, b);
}

#[tokio::test]
async fn full_mode_segments_reaggregate_to_totals() {
    let dir = tempfile::tempdir().unwrap();
    let client = cached_client(dir.path());
    seed_common(&client);
    client
        .cache()
        .write(SUBMISSIONS_URL, ANNUAL_ONLY_SUBMISSIONS.as_bytes())
        .unwrap();
    client
        .cache()
        .write(INDEX_URL, read_fixture("segments/index.json").as_bytes())
        .unwrap();
    client
        .cache()
        .write(INSTANCE_URL, read_fixture("segments/instance.xml").as_bytes())
        .unwrap();
    client
        .cache()
        .write(
            PRIMARY_DOC_ANNUAL_URL,
            b"<html><body><p>We expect capital expenditures of $1.5 billion to $2.5 billion in fiscal 2025.</p></body></html>",
        )
        .unwrap();

    let options = ExtractOptions::new().with_segments_mode(SegmentsMode::Full);
    let payload = extract_company_financials(&client, "AAPL", &options)
        .await
        .unwrap();

    let period = &payload.periods[0];

    // Segment rows re-aggregate to the structured total.
    let segment_total: f64 = period.revenue_by_segment.iter().map(|s| s.value).sum();
    assert_eq!(segment_total, period.revenue.as_ref().unwrap().value);

    // Partial availability is reported per field.
    assert!(!period.missing_data.iter().any(|m| m.field == "revenue_by_segment"));
    assert!(period.missing_data.iter().any(|m| m.field == "profit_by_segment"));
    assert!(period.missing_data.iter().any(|m| m.field == "capex_by_segment"));

    // The guidance sentence produced a ranged forecast.
    assert_eq!(period.forecasted_capex.len(), 1);
    let forecast = &period.forecasted_capex[0];
    assert_eq!(forecast.value_min, 1_500_000_000.0);
    assert_eq!(forecast.value_max, 2_500_000_000.0);
    assert_eq!(forecast.timeframe, "fiscal 2025");
    assert!(forecast.confidence < period.revenue.as_ref().unwrap().confidence);
}

#[tokio::test]
async fn quarterly_filings_skip_segments_in_annual_mode() {
    let dir = tempfile::tempdir().unwrap();
    let client = cached_client(dir.path());
    seed_common(&client);
    client
        .cache()
        .write(SUBMISSIONS_URL, read_fixture("catalog/submissions.json").as_bytes())
        .unwrap();
    client
        .cache()
        .write(INDEX_URL, read_fixture("segments/index.json").as_bytes())
        .unwrap();
    client
        .cache()
        .write(INSTANCE_URL, read_fixture("segments/instance.xml").as_bytes())
        .unwrap();
    client
        .cache()
        .write(PRIMARY_DOC_ANNUAL_URL, b"<html><body>History only.</body></html>")
        .unwrap();
    client
        .cache()
        .write(PRIMARY_DOC_QUARTERLY_URL, b"<html><body>History only.</body></html>")
        .unwrap();

    let options = ExtractOptions::new().with_segments_mode(SegmentsMode::Annual);
    let payload = extract_company_financials(&client, "AAPL", &options)
        .await
        .unwrap();

    assert_eq!(payload.periods.len(), 2);
    let quarterly = payload.periods.iter().find(|p| p.fiscal_period == "Q3").unwrap();
    let annual = payload.periods.iter().find(|p| p.fiscal_period == "FY").unwrap();

    assert!(quarterly.revenue_by_segment.is_empty());
    assert!(
        quarterly
            .missing_data
            .iter()
            .any(|m| m.field == "segment_metrics" && m.reason.contains("annual"))
    );
    assert_eq!(annual.revenue_by_segment.len(), 2);

    // Periods sort ascending within the year: FY before Q3.
    assert_eq!(payload.periods[0].fiscal_period, "FY");
    assert_eq!(payload.periods[1].fiscal_period, "Q3");
}
