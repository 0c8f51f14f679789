//! # factkit - extract financial metrics from SEC EDGAR filings
//!
//! factkit turns a company identifier into a tidy, JSON-serializable
//! record of its recent reporting periods: revenue, net income, and
//! capital expenditure per filing, per-segment breakdowns recovered from
//! raw XBRL instance documents, and forward-looking capex guidance pulled
//! from filing narratives.
//!
//! ## Features
//!
//! - **Rate-limited fetch client** — complies with SEC.gov fair access
//!   rules, with an on-disk cache and per-artifact / per-run byte budgets
//! - **Filing catalog** — company resolution, lookback scoping, and a
//!   quarterly-count cap that bounds the download surface
//! - **Primary metric extraction** — tag-alias fallback and
//!   duration-based quarter/YTD disambiguation over the structured facts
//!   feed
//! - **Segment extraction** — dimensional breakdowns parsed out of each
//!   filing's XBRL instance XML
//! - **Forecast extraction** — lexical detection of forward-looking
//!   capex guidance sentences
//!
//! Partial data never fails a run: every value that could not be
//! populated is recorded in its period's `missing_data` with a reason.
//!
//! ## Requirements
//!
//! factkit is an async-first library and requires an async runtime. We
//! recommend [tokio](https://tokio.rs).
//!
//! ## Basic Usage
//!
//! ```ignore
//! use factkit::{EdgarClient, ExtractOptions, SegmentsMode, extract_company_financials};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Initialize with a proper user agent (required by SEC.gov)
//!     let client = EdgarClient::new("YourAppName contact@example.com")?;
//!
//!     let options = ExtractOptions::new()
//!         .with_years_back(5)
//!         .with_segments_mode(SegmentsMode::Annual);
//!
//!     let payload = extract_company_financials(&client, "AAPL", &options).await?;
//!
//!     for period in &payload.periods {
//!         println!("{} {}: revenue {:?}", period.fiscal_year, period.fiscal_period,
//!                  period.revenue.as_ref().map(|m| m.value));
//!     }
//!     Ok(())
//! }
//! ```

mod assemble;
mod cache;
mod catalog;
mod config;
mod core;
mod error;
mod facts;
mod forecast;
mod options;
mod payload;
mod segments;
mod traits;

// Core client functionality
pub use cache::FetchCache;
pub use config::{ClientConfig, EdgarUrls};
pub use self::core::{EdgarClient, UsageReport};
pub use error::{FactkitError, Result};

// Catalog and extraction surface
pub use assemble::extract_company_financials;
pub use catalog::{
    CompanyId, CompanyTickerRow, Filing, FilingsData, FiscalPeriod, FormType, RecentFilings,
    Resolution, Submissions, collect_filings, limit_scope, resolve_from_rows,
};
pub use facts::{
    CompanyFacts, FactSeries, MetricAliases, PrimaryMetrics, RawFact, extract_primary,
    select_fact_for_filing,
};
pub use forecast::ForecastExtractor;
pub use options::{ExtractOptions, SegmentsMode};
pub use segments::{
    DimensionMember, FilingIndex, FilingIndexItem, SegmentBreakdown, choose_instance_name,
    parse_instance_segments,
};

// Payload contract
pub use payload::{
    CapexBasis, CompanyIdentity, FilingRef, FinancialPayload, ForecastStatement, MetricValue,
    MissingData, Period, Provenance, SegmentMetric, SourceKind,
};

// Operation traits
pub use traits::{CatalogOperations, FactsOperations};

/// Current crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
