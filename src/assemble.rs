//! Run orchestration: from a company identifier to a complete payload.
//!
//! One run is a fixed sequence: resolve the company, fetch its catalog,
//! scope the filings, fetch the companywide facts feed once, then walk
//! each filing through primary, segment, and forecast extraction per the
//! configured policy. Extraction is sequential by design — the workload
//! is I/O-latency-bound, low-fanout, and bounded by the shared throttle.
//!
//! Transport and budget failures abort the run. Missing data never does:
//! every hole in the output is a missing-data entry on its period, so a
//! completed run always yields a structurally complete payload.

use std::collections::BTreeSet;

use super::EdgarClient;
use super::catalog::{Filing, FormType, collect_filings, limit_scope};
use super::error::Result;
use super::facts::extract_primary;
use super::forecast::ForecastExtractor;
use super::options::{ExtractOptions, SegmentsMode};
use super::payload::{
    CompanyIdentity, FilingRef, FinancialPayload, MissingData, Period,
};
use super::segments::SegmentBreakdown;
use super::traits::{CatalogOperations, FactsOperations};

/// Runs the full extraction pipeline for one company.
///
/// Ambiguous company input proceeds with the deterministic top candidate
/// (logged); interactive callers wanting to offer a choice should call
/// [`CatalogOperations::resolve_company`] themselves first.
///
/// # Errors
///
/// Configuration, resolution, transport, and budget errors abort the run.
/// Absent data never fails; it lands in each period's `missing_data`.
pub async fn extract_company_financials(
    client: &EdgarClient,
    company_input: &str,
    options: &ExtractOptions,
) -> Result<FinancialPayload> {
    let use_cache = options.use_cache;

    let resolution = client.resolve_company(company_input, use_cache).await?;
    if let super::catalog::Resolution::Ambiguous(candidates) = &resolution {
        tracing::warn!(
            "'{}' is ambiguous ({} candidates); proceeding with {}",
            company_input,
            candidates.len(),
            resolution.best().name
        );
    }
    let company = resolution.best().clone();

    let submissions = client.submissions(&company.cik, use_cache).await?;
    let filings = limit_scope(
        collect_filings(&submissions, options.years_back),
        options.max_quarterly,
    );

    // One companywide feed serves every filing's primary extraction.
    let companyfacts = client.company_facts(&company.cik, use_cache).await?;
    let forecaster = ForecastExtractor::new()?;

    let mut periods = Vec::with_capacity(filings.len());
    for filing in &filings {
        let (primary, notes, mut missing) =
            extract_primary(&companyfacts, filing, &options.aliases);

        let (segments, seg_missing) =
            run_segments(client, &company.cik, filing, options, use_cache).await?;
        missing.extend(seg_missing);

        let (forecasts, fc_missing) = if options.fetch_forecasts {
            client
                .extract_forecasts(&forecaster, &company.cik, filing, use_cache)
                .await?
        } else {
            (
                Vec::new(),
                vec![MissingData::new(
                    "forecasted_capex",
                    "Forecast extraction disabled by configuration.",
                )],
            )
        };
        missing.extend(fc_missing);

        let notes: BTreeSet<String> = notes.into_iter().collect();
        periods.push(Period {
            fiscal_year: filing.fiscal_year_or_end(),
            fiscal_period: filing.fiscal_label().to_string(),
            period_start: None,
            period_end: filing.period_end().to_string(),
            filing: FilingRef {
                form: filing.form.as_str().to_string(),
                filing_date: filing.filing_date.clone(),
                accession: filing.accession.clone(),
                primary_doc: filing.primary_doc.clone(),
            },
            revenue: primary.revenue,
            revenue_by_segment: segments.revenue,
            profit_net_income: primary.net_income,
            profit_by_segment: segments.profit,
            capex: primary.capex,
            capex_by_segment: segments.capex,
            forecasted_capex: forecasts,
            forecasted_capex_by_segment: Vec::new(),
            notes: notes.into_iter().collect(),
            missing_data: missing,
        });
    }

    sort_periods(&mut periods);
    log_run_summary(client);

    Ok(FinancialPayload {
        company: CompanyIdentity {
            input: company_input.to_string(),
            cik: company.cik,
            name: company.name,
            ticker: company.ticker,
        },
        generated_at_utc: chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        periods,
    })
}

/// Applies the segments-mode policy for one filing.
async fn run_segments(
    client: &EdgarClient,
    cik: &str,
    filing: &Filing,
    options: &ExtractOptions,
    use_cache: bool,
) -> Result<(SegmentBreakdown, Vec<MissingData>)> {
    let run = match options.segments_mode {
        SegmentsMode::None => false,
        SegmentsMode::Annual => filing.form == FormType::Annual,
        SegmentsMode::Full => true,
    };
    if !run {
        return Ok((
            SegmentBreakdown::default(),
            vec![MissingData::new(
                "segment_metrics",
                format!(
                    "Segment extraction skipped by configuration (segments_mode={}).",
                    options.segments_mode.as_str()
                ),
            )],
        ));
    }
    client
        .extract_segments(cik, filing, &options.aliases, use_cache)
        .await
}

/// Periods sort ascending by (fiscal year, fiscal period label, period
/// end); the label ordering puts "FY" before "Q1".."Q4" before "Q?".
pub(crate) fn sort_periods(periods: &mut [Period]) {
    periods.sort_by(|a, b| {
        (a.fiscal_year, &a.fiscal_period, &a.period_end)
            .cmp(&(b.fiscal_year, &b.fiscal_period, &b.period_end))
    });
}

fn log_run_summary(client: &EdgarClient) {
    let usage = client.usage();
    tracing::info!(
        bytes_downloaded = usage.bytes_downloaded,
        requests = usage.request_count,
        filings_with_artifacts = usage.artifacts_by_filing.len(),
        "extraction run complete"
    );
    for (accession, artifacts) in &usage.artifacts_by_filing {
        tracing::debug!("filing {} pulled: {}", accession, artifacts.join(", "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn period(fy: i32, fp: &str, end: &str) -> Period {
        Period {
            fiscal_year: fy,
            fiscal_period: fp.to_string(),
            period_start: None,
            period_end: end.to_string(),
            filing: FilingRef {
                form: "10-K".to_string(),
                filing_date: end.to_string(),
                accession: format!("{}-{}", fy, fp),
                primary_doc: "a.htm".to_string(),
            },
            revenue: None,
            revenue_by_segment: Vec::new(),
            profit_net_income: None,
            profit_by_segment: Vec::new(),
            capex: None,
            capex_by_segment: Vec::new(),
            forecasted_capex: Vec::new(),
            forecasted_capex_by_segment: Vec::new(),
            notes: Vec::new(),
            missing_data: Vec::new(),
        }
    }

    #[test]
    fn periods_sort_by_year_label_then_end() {
        let mut periods = vec![
            period(2024, "Q1", "2023-12-30"),
            period(2023, "FY", "2023-09-30"),
            period(2024, "FY", "2024-09-28"),
            period(2023, "Q3", "2023-07-01"),
        ];
        sort_periods(&mut periods);

        let keys: Vec<(i32, &str)> = periods
            .iter()
            .map(|p| (p.fiscal_year, p.fiscal_period.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![(2023, "FY"), (2023, "Q3"), (2024, "FY"), (2024, "Q1")]
        );
    }
}
