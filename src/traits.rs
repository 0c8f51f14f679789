//! Trait definitions grouping the client's EDGAR operations by domain.
//!
//! The `EdgarClient` implements one trait per feature area: catalog
//! lookups (identity and submissions) and structured facts. The traits
//! keep the API surface discoverable and give tests a seam for
//! alternative implementations; most callers use `EdgarClient` directly.

use async_trait::async_trait;

use super::catalog::{CompanyTickerRow, Resolution, Submissions};
use super::error::Result;
use super::facts::CompanyFacts;

/// Operations for resolving companies and listing their filings.
#[async_trait]
pub trait CatalogOperations {
    /// Retrieves the SEC's ticker-to-CIK mapping.
    async fn company_ticker_rows(&self, use_cache: bool) -> Result<Vec<CompanyTickerRow>>;
    /// Resolves a ticker or name fragment to a filer identity, or a
    /// ranked candidate list when ambiguous.
    async fn resolve_company(&self, input: &str, use_cache: bool) -> Result<Resolution>;
    /// Retrieves the submission history for a CIK.
    async fn submissions(&self, cik: &str, use_cache: bool) -> Result<Submissions>;
}

/// Operations for retrieving structured XBRL facts.
#[async_trait]
pub trait FactsOperations {
    /// Retrieves the companywide facts feed for a CIK.
    async fn company_facts(&self, cik: &str, use_cache: bool) -> Result<CompanyFacts>;
}
