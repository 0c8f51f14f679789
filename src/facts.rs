//! Structured company facts and primary metric extraction.
//!
//! The data API serves every XBRL fact a company has ever reported, keyed
//! by concept tag and unit. Extraction picks, per filing and metric, the
//! single best-matching fact: candidates are narrowed to the filing by
//! accession (falling back to report date + form, since not every feed
//! entry carries an accession), quarterly filings are narrowed to
//! single-quarter durations, and the shortest remaining duration wins.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;

use super::EdgarClient;
use super::catalog::{Filing, FormType};
use super::error::Result;
use super::payload::{CapexBasis, MetricValue, MissingData, Provenance, SourceKind};
use super::traits::FactsOperations;

/// Upper bound, in days, on a reporting duration still treated as a
/// single quarter. 13 weeks is 91 days; the slack absorbs reporting
/// variance such as 53-week fiscal calendars. Tunable heuristic, not
/// load-bearing precision.
pub const QUARTER_MAX_DAYS: i64 = 105;

const STRUCTURED_CONFIDENCE: f64 = 0.95;

/// Complete set of XBRL facts reported by a company across all filings.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct CompanyFacts {
    pub cik: u64,
    #[serde(rename = "entityName")]
    pub entity_name: String,
    #[serde(default)]
    pub facts: TaxonomyFacts,
}

/// Facts grouped by taxonomy; only US-GAAP is consumed here.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct TaxonomyFacts {
    #[serde(rename = "us-gaap", default)]
    pub us_gaap: HashMap<String, FactSeries>,
}

/// A single concept with its data points grouped by unit of measure.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct FactSeries {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub units: HashMap<String, Vec<RawFact>>,
}

/// One reported data point from the structured facts feed.
///
/// `start` absent means the fact is an instant (balance sheet item)
/// rather than a duration. `val` can be a number or a string upstream,
/// so it stays a JSON value until selection.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct RawFact {
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
    pub val: serde_json::Value,
    #[serde(default)]
    pub accn: Option<String>,
    #[serde(default)]
    pub fy: Option<i32>,
    #[serde(default)]
    pub fp: Option<String>,
    #[serde(default)]
    pub form: Option<String>,
    #[serde(default)]
    pub filed: Option<String>,
}

impl RawFact {
    /// Reported duration in days, or `None` for instants.
    pub fn duration_days(&self) -> Option<i64> {
        let start = NaiveDate::parse_from_str(self.start.as_deref()?, "%Y-%m-%d").ok()?;
        let end = NaiveDate::parse_from_str(self.end.as_deref()?, "%Y-%m-%d").ok()?;
        Some((end - start).num_days())
    }
}

/// Tag-alias configuration for the target metric set.
///
/// Passed into extraction rather than baked in, so alias sets stay
/// overridable and testable. Capex is tiered: each tier carries the
/// definition it measures, recorded in the result so consumers can
/// account for the difference between tiers.
#[derive(Debug, Clone)]
pub struct MetricAliases {
    pub revenue: Vec<String>,
    pub net_income: Vec<String>,
    pub capex_tiers: Vec<(CapexBasis, Vec<String>)>,
}

impl Default for MetricAliases {
    fn default() -> Self {
        Self {
            revenue: vec![
                "RevenueFromContractWithCustomerExcludingAssessedTax".to_string(),
                "Revenues".to_string(),
                "SalesRevenueNet".to_string(),
            ],
            net_income: vec!["NetIncomeLoss".to_string()],
            capex_tiers: vec![
                (
                    CapexBasis::CashPaidForPpe,
                    vec!["PaymentsToAcquirePropertyPlantAndEquipment".to_string()],
                ),
                (
                    CapexBasis::CapitalExpendituresFallback,
                    vec!["CapitalExpenditures".to_string()],
                ),
            ],
        }
    }
}

impl MetricAliases {
    /// Every capex tag across tiers, in tier order.
    pub fn capex_tags(&self) -> Vec<&str> {
        self.capex_tiers
            .iter()
            .flat_map(|(_, tags)| tags.iter().map(String::as_str))
            .collect()
    }
}

/// The three primary metrics chosen for one filing.
#[derive(Debug, Clone, Default)]
pub struct PrimaryMetrics {
    pub revenue: Option<MetricValue>,
    pub net_income: Option<MetricValue>,
    pub capex: Option<MetricValue>,
}

/// Selects the best fact for a filing among a tag's USD data points.
///
/// Candidates must match the filing's accession; when none do, fall back
/// to (end == report date, form) since the feed does not stamp every
/// entry with an accession. Quarterly filings prefer single-quarter
/// durations; when only longer durations remain, all are kept and a
/// year-to-date contamination note is surfaced instead of silently
/// converting (quarter-only conversion would need prior-quarter
/// cumulative values this extractor does not have). Ties on the shortest
/// duration break toward the latest end date, then stable feed order.
pub fn select_fact_for_filing<'a>(
    facts: &'a [RawFact],
    filing: &Filing,
) -> (Option<&'a RawFact>, Vec<String>) {
    let mut notes = Vec::new();

    let mut cands: Vec<&RawFact> = facts
        .iter()
        .filter(|f| f.accn.as_deref() == Some(filing.accession.as_str()))
        .collect();
    if cands.is_empty() {
        if let Some(report_date) = filing.report_date.as_deref() {
            cands = facts
                .iter()
                .filter(|f| {
                    f.end.as_deref() == Some(report_date)
                        && f.form.as_deref() == Some(filing.form.as_str())
                })
                .collect();
        }
    }
    if cands.is_empty() {
        return (None, notes);
    }

    if filing.form == FormType::Quarterly {
        let quarter: Vec<&RawFact> = cands
            .iter()
            .copied()
            .filter(|f| f.duration_days().is_some_and(|d| d <= QUARTER_MAX_DAYS))
            .collect();
        if quarter.is_empty() {
            notes.push("Quarter appears YTD; no safe quarter-only conversion available.".to_string());
        } else {
            cands = quarter;
        }
    }

    let chosen = cands.into_iter().min_by(|a, b| {
        let key = |f: &RawFact| {
            (
                f.duration_days().unwrap_or(9999),
                std::cmp::Reverse(f.end.clone()),
            )
        };
        key(a).cmp(&key(b))
    });
    (chosen, notes)
}

fn metric_from_fact(fact: &RawFact, tag: &str, filing: &Filing, basis: Option<CapexBasis>) -> Option<MetricValue> {
    let value = fact.val.as_f64()?;
    Some(MetricValue {
        value,
        unit: "USD".to_string(),
        xbrl_tag: tag.to_string(),
        source: SourceKind::Xbrl,
        confidence: STRUCTURED_CONFIDENCE,
        capex_definition: basis,
        provenance: Provenance {
            filing_type: filing.form.as_str().to_string(),
            accession: filing.accession.clone(),
            filing_date: filing.filing_date.clone(),
            source_ref: format!("us-gaap:{}", tag),
            unit: "USD".to_string(),
        },
    })
}

/// Extracts the primary metric set for one filing.
///
/// Returns the chosen metrics, the accumulated processing notes, and a
/// missing-data entry (naming every attempted tag) for each metric that
/// matched nothing.
pub fn extract_primary(
    companyfacts: &CompanyFacts,
    filing: &Filing,
    aliases: &MetricAliases,
) -> (PrimaryMetrics, Vec<String>, Vec<MissingData>) {
    let us_gaap = &companyfacts.facts.us_gaap;
    let mut notes = Vec::new();
    let mut missing = Vec::new();

    let revenue_tags: Vec<(&str, Option<CapexBasis>)> =
        aliases.revenue.iter().map(|t| (t.as_str(), None)).collect();
    let income_tags: Vec<(&str, Option<CapexBasis>)> =
        aliases.net_income.iter().map(|t| (t.as_str(), None)).collect();
    let capex_tags: Vec<(&str, Option<CapexBasis>)> = aliases
        .capex_tiers
        .iter()
        .flat_map(|(basis, tags)| tags.iter().map(|t| (t.as_str(), Some(*basis))))
        .collect();

    let metrics = PrimaryMetrics {
        revenue: extract_one(us_gaap, filing, "revenue", &revenue_tags, &mut notes, &mut missing),
        net_income: extract_one(
            us_gaap,
            filing,
            "profit_net_income",
            &income_tags,
            &mut notes,
            &mut missing,
        ),
        capex: extract_one(us_gaap, filing, "capex", &capex_tags, &mut notes, &mut missing),
    };
    (metrics, notes, missing)
}

/// Walks one metric's alias tags in order; the first tag whose selected
/// fact carries a usable value wins. A full miss records every attempted
/// tag.
fn extract_one(
    us_gaap: &HashMap<String, FactSeries>,
    filing: &Filing,
    name: &str,
    tags: &[(&str, Option<CapexBasis>)],
    notes: &mut Vec<String>,
    missing: &mut Vec<MissingData>,
) -> Option<MetricValue> {
    for (tag, basis) in tags {
        let Some(entries) = us_gaap.get(*tag).and_then(|s| s.units.get("USD")) else {
            continue;
        };
        let (fact, ns) = select_fact_for_filing(entries, filing);
        notes.extend(ns);
        if let Some(metric) = fact.and_then(|f| metric_from_fact(f, tag, filing, *basis)) {
            return Some(metric);
        }
    }
    let attempted: Vec<&str> = tags.iter().map(|(t, _)| *t).collect();
    missing.push(MissingData::new(
        name,
        format!("No matching XBRL facts found for tags: {}", attempted.join(", ")),
    ));
    None
}

impl EdgarClient {
    fn company_facts_url(&self, cik: &str) -> String {
        let padded_cik = format!("{:0>10}", cik);
        format!(
            "{}/api/xbrl/companyfacts/CIK{}.json",
            self.edgar_data_url, padded_cik
        )
    }
}

#[async_trait]
impl FactsOperations for EdgarClient {
    /// Retrieves the companywide structured facts feed. Fetched once per
    /// run; every filing's primary extraction reads from the same feed.
    async fn company_facts(&self, cik: &str, use_cache: bool) -> Result<CompanyFacts> {
        let url = self.company_facts_url(cik);
        self.fetch_json(&url, use_cache).await
    }
}
