//! Company resolution and the filing catalog.
//!
//! This module covers the path from a user-supplied identifier to a
//! scoped list of periodic filings:
//! - Ticker/name resolution against the SEC's `company_tickers.json` map.
//! - The columnar submissions feed and its conversion into [`Filing`]s.
//! - Lookback filtering and the quarterly-count scope cap that bound the
//!   download surface of a run.
//!
//! Resolution is a pure ranking: exact ticker match wins outright,
//! otherwise a case-insensitive substring match on legal names, sorted
//! alphabetically, top five. Ambiguity is returned to the caller as data
//! rather than resolved interactively here.

use async_trait::async_trait;
use chrono::Datelike;
use serde::Deserialize;
use std::collections::HashMap;

use super::EdgarClient;
use super::error::{FactkitError, Result};
use super::traits::CatalogOperations;

/// One row of the SEC's ticker-to-CIK mapping.
#[derive(Debug, Clone, Deserialize)]
pub struct CompanyTickerRow {
    #[serde(rename = "cik_str")]
    pub cik: u64,
    pub ticker: String,
    #[serde(rename = "title")]
    pub name: String,
}

/// A resolved filer identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyId {
    /// Canonical 10-digit zero-padded CIK.
    pub cik: String,
    pub ticker: String,
    pub name: String,
}

impl From<&CompanyTickerRow> for CompanyId {
    fn from(row: &CompanyTickerRow) -> Self {
        Self {
            cik: format!("{:010}", row.cik),
            ticker: row.ticker.clone(),
            name: row.name.clone(),
        }
    }
}

/// Outcome of resolving a company identifier.
///
/// `Ambiguous` carries the ranked candidate list so an interactive caller
/// can disambiguate; unattended callers take the first entry, which is
/// deterministic.
#[derive(Debug, Clone)]
pub enum Resolution {
    Match(CompanyId),
    Ambiguous(Vec<CompanyId>),
}

impl Resolution {
    /// The deterministic top candidate.
    pub fn best(&self) -> &CompanyId {
        match self {
            Resolution::Match(id) => id,
            // Ambiguous is only ever constructed with a non-empty,
            // ranked candidate list.
            Resolution::Ambiguous(ids) => &ids[0],
        }
    }
}

/// Ranks ticker-map rows against a company identifier.
///
/// # Errors
///
/// `FactkitError::CompanyNotResolved` (naming the input) when nothing
/// matches.
pub fn resolve_from_rows(rows: &[CompanyTickerRow], input: &str) -> Result<Resolution> {
    let needle = input.trim();
    if let Some(row) = rows.iter().find(|r| r.ticker.eq_ignore_ascii_case(needle)) {
        return Ok(Resolution::Match(row.into()));
    }

    let lowered = needle.to_lowercase();
    let mut candidates: Vec<&CompanyTickerRow> = rows
        .iter()
        .filter(|r| r.name.to_lowercase().contains(&lowered))
        .collect();
    candidates.sort_by(|a, b| a.name.cmp(&b.name));
    candidates.truncate(5);

    match candidates.len() {
        0 => Err(FactkitError::CompanyNotResolved(input.to_string())),
        1 => Ok(Resolution::Match(candidates[0].into())),
        _ => Ok(Resolution::Ambiguous(
            candidates.into_iter().map(CompanyId::from).collect(),
        )),
    }
}

/// The two periodic form types this pipeline consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormType {
    /// 10-K
    Annual,
    /// 10-Q
    Quarterly,
}

impl FormType {
    pub fn from_form(form: &str) -> Option<Self> {
        match form.trim() {
            "10-K" => Some(FormType::Annual),
            "10-Q" => Some(FormType::Quarterly),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FormType::Annual => "10-K",
            FormType::Quarterly => "10-Q",
        }
    }
}

/// Fiscal period code as reported by the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FiscalPeriod {
    Q1,
    Q2,
    Q3,
    Q4,
    Fy,
    Unknown,
}

impl FiscalPeriod {
    /// Normalizes the fiscal-period variants seen upstream ("FY2025",
    /// "Y", "Q01", "q3", ...).
    pub fn normalize(raw: &str) -> Self {
        let upper = raw.trim().to_ascii_uppercase();
        if upper == "Y" || upper.starts_with("FY") {
            return FiscalPeriod::Fy;
        }
        if let Some(rest) = upper.strip_prefix('Q') {
            let digits: String = rest.chars().filter(|c| c.is_ascii_digit()).collect();
            return match digits.trim_start_matches('0') {
                "1" => FiscalPeriod::Q1,
                "2" => FiscalPeriod::Q2,
                "3" => FiscalPeriod::Q3,
                "4" => FiscalPeriod::Q4,
                _ => FiscalPeriod::Unknown,
            };
        }
        FiscalPeriod::Unknown
    }

    pub fn label(&self) -> &'static str {
        match self {
            FiscalPeriod::Q1 => "Q1",
            FiscalPeriod::Q2 => "Q2",
            FiscalPeriod::Q3 => "Q3",
            FiscalPeriod::Q4 => "Q4",
            FiscalPeriod::Fy => "FY",
            FiscalPeriod::Unknown => "Q?",
        }
    }
}

/// One regulatory submission, immutable once built from catalog data.
#[derive(Debug, Clone)]
pub struct Filing {
    pub form: FormType,
    pub filing_date: String,
    pub report_date: Option<String>,
    /// Globally unique accession identifier.
    pub accession: String,
    pub primary_doc: String,
    pub fiscal_year: Option<i32>,
    pub fiscal_period: FiscalPeriod,
}

impl Filing {
    /// The period end: the report date, or the filing date when the
    /// catalog carries none.
    pub fn period_end(&self) -> &str {
        self.report_date.as_deref().unwrap_or(&self.filing_date)
    }

    /// Normalized fiscal period label for the payload: annual filings are
    /// always "FY"; quarterlies use the catalog code or "Q?".
    pub fn fiscal_label(&self) -> &'static str {
        match self.form {
            FormType::Annual => "FY",
            FormType::Quarterly => match self.fiscal_period {
                FiscalPeriod::Q1 | FiscalPeriod::Q2 | FiscalPeriod::Q3 | FiscalPeriod::Q4 => {
                    self.fiscal_period.label()
                }
                _ => "Q?",
            },
        }
    }

    /// Fiscal year, falling back to the period-end calendar year.
    pub fn fiscal_year_or_end(&self) -> i32 {
        self.fiscal_year.unwrap_or_else(|| {
            self.period_end()
                .get(..4)
                .and_then(|y| y.parse().ok())
                .unwrap_or(0)
        })
    }
}

/// Submission history for one filer, as served by the data API.
///
/// The feed is columnar: parallel arrays indexed by filing. Only the
/// columns this pipeline consumes are modeled.
#[derive(Debug, Clone, Deserialize)]
pub struct Submissions {
    #[serde(default)]
    pub filings: FilingsData,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilingsData {
    #[serde(default)]
    pub recent: RecentFilings,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecentFilings {
    #[serde(default)]
    pub form: Vec<String>,
    #[serde(rename = "filingDate", default)]
    pub filing_date: Vec<String>,
    #[serde(rename = "reportDate", default)]
    pub report_date: Vec<String>,
    #[serde(rename = "accessionNumber", default)]
    pub accession_number: Vec<String>,
    #[serde(rename = "primaryDocument", default)]
    pub primary_document: Vec<String>,
    #[serde(default)]
    pub fy: Vec<Option<i32>>,
    #[serde(default)]
    pub fp: Vec<Option<String>>,
}

impl RecentFilings {
    /// Builds the filing at one column index, or `None` when the form is
    /// not a periodic type or mandatory columns are missing.
    pub fn filing_at(&self, idx: usize) -> Option<Filing> {
        let form = FormType::from_form(self.form.get(idx)?)?;
        let report_date = self
            .report_date
            .get(idx)
            .filter(|d| !d.is_empty())
            .cloned();
        let fp = self
            .fp
            .get(idx)
            .and_then(|v| v.as_deref())
            .map(FiscalPeriod::normalize)
            .unwrap_or(FiscalPeriod::Unknown);
        Some(Filing {
            form,
            filing_date: self.filing_date.get(idx)?.clone(),
            report_date,
            accession: self.accession_number.get(idx)?.clone(),
            primary_doc: self.primary_document.get(idx)?.clone(),
            fiscal_year: self.fy.get(idx).copied().flatten(),
            fiscal_period: fp,
        })
    }
}

/// Collects the periodic filings inside the lookback window.
///
/// A filing is excluded only when both its filing-date year and its
/// fiscal year (when known) precede the cutoff; either signal of recency
/// keeps it. Output is sorted ascending by (report-or-filing date, form).
pub fn collect_filings(submissions: &Submissions, years_back: u32) -> Vec<Filing> {
    let current_year = chrono::Utc::now().year();
    let min_year = current_year - years_back as i32;
    let recent = &submissions.filings.recent;

    let mut out: Vec<Filing> = (0..recent.form.len())
        .filter_map(|idx| recent.filing_at(idx))
        .filter(|f| {
            let date_year: i32 = f
                .filing_date
                .get(..4)
                .and_then(|y| y.parse().ok())
                .unwrap_or(current_year);
            let stale_by_fy = matches!(f.fiscal_year, Some(fy) if fy < min_year);
            !(date_year < min_year && stale_by_fy)
        })
        .collect();
    out.sort_by(|a, b| {
        (a.period_end(), a.form.as_str()).cmp(&(b.period_end(), b.form.as_str()))
    });
    out
}

/// Bounds the download surface: all annual filings are kept, quarterlies
/// are capped to the `max_quarterly` most recent. Output is re-sorted
/// ascending.
pub fn limit_scope(filings: Vec<Filing>, max_quarterly: usize) -> Vec<Filing> {
    let (mut out, mut quarterly): (Vec<Filing>, Vec<Filing>) = filings
        .into_iter()
        .partition(|f| f.form == FormType::Annual);

    quarterly.sort_by(|a, b| b.period_end().cmp(a.period_end()));
    quarterly.truncate(max_quarterly);
    out.extend(quarterly);

    out.sort_by(|a, b| {
        (a.period_end(), a.form.as_str()).cmp(&(b.period_end(), b.form.as_str()))
    });
    out
}

#[derive(Debug)]
enum CatalogUrl {
    TickerMap,
    Submissions,
}

impl EdgarClient {
    fn build_catalog_url(&self, url_type: CatalogUrl, params: &[&str]) -> String {
        match url_type {
            CatalogUrl::TickerMap => {
                format!("{}/company_tickers.json", self.edgar_files_url)
            }
            CatalogUrl::Submissions => {
                let padded_cik = format!("{:0>10}", params[0]);
                format!("{}/submissions/CIK{}.json", self.edgar_data_url, padded_cik)
            }
        }
    }
}

#[async_trait]
impl CatalogOperations for EdgarClient {
    /// Retrieves the SEC's ticker-to-CIK mapping.
    async fn company_ticker_rows(&self, use_cache: bool) -> Result<Vec<CompanyTickerRow>> {
        let url = self.build_catalog_url(CatalogUrl::TickerMap, &[]);
        let map: HashMap<String, CompanyTickerRow> = self.fetch_json(&url, use_cache).await?;
        let mut rows: Vec<CompanyTickerRow> = map.into_values().collect();
        // The upstream map is keyed by arbitrary indices; order the rows
        // so downstream ranking is deterministic.
        rows.sort_by(|a, b| a.cik.cmp(&b.cik));
        Ok(rows)
    }

    /// Resolves a ticker or company-name fragment to a filer identity.
    async fn resolve_company(&self, input: &str, use_cache: bool) -> Result<Resolution> {
        let rows = self.company_ticker_rows(use_cache).await?;
        resolve_from_rows(&rows, input)
    }

    /// Retrieves the submission history for a filer.
    async fn submissions(&self, cik: &str, use_cache: bool) -> Result<Submissions> {
        let url = self.build_catalog_url(CatalogUrl::Submissions, &[cik]);
        self.fetch_json(&url, use_cache).await
    }
}
