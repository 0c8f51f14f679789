//! Output contract types.
//!
//! These structs serialize to the canonical JSON payload consumed by the
//! downstream tidy-transform and visualization layer. Field names and
//! declaration order are the contract; renames here are breaking changes
//! for every consumer.

use serde::{Deserialize, Serialize};

/// Where an extracted value came from.
///
/// Structured (`xbrl`) values always carry higher confidence than
/// text-derived (`text`) ones, and the two must stay distinguishable in
/// provenance so consumers can weigh them differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Xbrl,
    Text,
}

/// Which capital-expenditure concept produced a value.
///
/// The two tag tiers measure different things (cash actually paid for
/// property/plant/equipment vs. a broader capex concept); the basis is
/// recorded so consumers can account for the difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapexBasis {
    CashPaidForPpe,
    CapitalExpendituresFallback,
}

/// Provenance record attached to every extracted value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provenance {
    pub filing_type: String,
    pub accession: String,
    pub filing_date: String,
    pub source_ref: String,
    pub unit: String,
}

/// The chosen value for one (filing, metric) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricValue {
    pub value: f64,
    pub unit: String,
    pub xbrl_tag: String,
    pub source: SourceKind,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capex_definition: Option<CapexBasis>,
    pub provenance: Provenance,
}

/// A metric value scoped to one reporting segment, recovered from a
/// dimensional context in the filing's XBRL instance document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentMetric {
    /// Member local name with its namespace prefix stripped.
    pub segment: String,
    pub value: f64,
    pub unit: String,
    pub xbrl_tag: String,
    pub dimension: String,
    pub member: String,
    pub source: SourceKind,
    pub confidence: f64,
    pub provenance: Provenance,
}

/// A forward-looking capital-expenditure guidance extraction.
///
/// `value_min == value_max` for point estimates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastStatement {
    pub value_min: f64,
    pub value_max: f64,
    pub unit: String,
    pub timeframe: String,
    pub source: SourceKind,
    pub snippet: String,
    pub location_hint: String,
    pub confidence: f64,
    pub provenance: Provenance,
}

/// One field that could not be populated, and why.
///
/// Every numeric hole in the payload appears here; nothing is silently
/// omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingData {
    pub field: String,
    pub reason: String,
}

impl MissingData {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Reference back to the filing a period was built from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilingRef {
    pub form: String,
    pub filing_date: String,
    pub accession: String,
    pub primary_doc: String,
}

/// Company identity attached to the payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyIdentity {
    /// The user-supplied identifier the run started from.
    pub input: String,
    pub cik: String,
    pub name: String,
    pub ticker: String,
}

/// The assembled record for one filing.
///
/// Exactly one period per filing; periods never merge data across
/// filings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Period {
    pub fiscal_year: i32,
    /// "FY", "Q1".."Q4", or "Q?" when the quarter could not be determined.
    pub fiscal_period: String,
    /// Always null; the upstream catalog does not carry period starts.
    pub period_start: Option<String>,
    pub period_end: String,
    pub filing: FilingRef,
    pub revenue: Option<MetricValue>,
    pub revenue_by_segment: Vec<SegmentMetric>,
    pub profit_net_income: Option<MetricValue>,
    pub profit_by_segment: Vec<SegmentMetric>,
    pub capex: Option<MetricValue>,
    pub capex_by_segment: Vec<SegmentMetric>,
    pub forecasted_capex: Vec<ForecastStatement>,
    /// Segment-level guidance is not extracted; kept for shape stability.
    pub forecasted_capex_by_segment: Vec<ForecastStatement>,
    /// Deduplicated, sorted processing notes.
    pub notes: Vec<String>,
    pub missing_data: Vec<MissingData>,
}

/// Top-level artifact of a run: the sole cross-boundary contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialPayload {
    pub company: CompanyIdentity,
    pub generated_at_utc: String,
    pub periods: Vec<Period>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_kind_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&SourceKind::Xbrl).unwrap(), "\"xbrl\"");
        assert_eq!(serde_json::to_string(&SourceKind::Text).unwrap(), "\"text\"");
    }

    #[test]
    fn capex_basis_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&CapexBasis::CashPaidForPpe).unwrap(),
            "\"cash_paid_for_ppe\""
        );
    }

    #[test]
    fn capex_definition_is_omitted_when_absent() {
        let metric = MetricValue {
            value: 1.0,
            unit: "USD".to_string(),
            xbrl_tag: "Revenues".to_string(),
            source: SourceKind::Xbrl,
            confidence: 0.95,
            capex_definition: None,
            provenance: Provenance {
                filing_type: "10-K".to_string(),
                accession: "0001-01-000001".to_string(),
                filing_date: "2024-11-01".to_string(),
                source_ref: "us-gaap:Revenues".to_string(),
                unit: "USD".to_string(),
            },
        };
        let json = serde_json::to_string(&metric).unwrap();
        assert!(!json.contains("capex_definition"));
    }
}
