use std::str::FromStr;

use super::error::{FactkitError, Result};
use super::facts::MetricAliases;

/// When to run segment (dimensional) extraction.
///
/// Segment extraction is the most network- and CPU-expensive step of a
/// run: it downloads and parses each filing's raw instance document. The
/// mode bounds that cost to what the use case needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentsMode {
    /// Never; every period gets a standard missing-data entry.
    None,
    /// Annual filings only.
    Annual,
    /// Every scoped filing.
    Full,
}

impl SegmentsMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentsMode::None => "none",
            SegmentsMode::Annual => "annual",
            SegmentsMode::Full => "full",
        }
    }
}

impl FromStr for SegmentsMode {
    type Err = FactkitError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(SegmentsMode::None),
            "annual" => Ok(SegmentsMode::Annual),
            "full" => Ok(SegmentsMode::Full),
            other => Err(FactkitError::ConfigError(format!(
                "Invalid segments mode '{}'; expected none, annual, or full",
                other
            ))),
        }
    }
}

/// Options shaping one extraction run.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Lookback window in years.
    pub years_back: u32,
    /// Segment extraction policy.
    pub segments_mode: SegmentsMode,
    /// Maximum number of quarterly filings retained in scope.
    pub max_quarterly: usize,
    /// Whether to scan narrative documents for capex guidance. Disabling
    /// this skips one document download per filing.
    pub fetch_forecasts: bool,
    /// Whether to consult the on-disk cache before the network.
    pub use_cache: bool,
    /// Tag-alias configuration for the metric set.
    pub aliases: MetricAliases,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            years_back: 5,
            segments_mode: SegmentsMode::Annual,
            max_quarterly: 8,
            fetch_forecasts: true,
            use_cache: true,
            aliases: MetricAliases::default(),
        }
    }
}

impl ExtractOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_years_back(mut self, years: u32) -> Self {
        self.years_back = years;
        self
    }

    pub fn with_segments_mode(mut self, mode: SegmentsMode) -> Self {
        self.segments_mode = mode;
        self
    }

    pub fn with_max_quarterly(mut self, max: usize) -> Self {
        self.max_quarterly = max;
        self
    }

    pub fn with_forecasts(mut self, fetch: bool) -> Self {
        self.fetch_forecasts = fetch;
        self
    }

    pub fn with_use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    pub fn with_aliases(mut self, aliases: MetricAliases) -> Self {
        self.aliases = aliases;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_mode_round_trips() {
        for mode in [SegmentsMode::None, SegmentsMode::Annual, SegmentsMode::Full] {
            assert_eq!(mode.as_str().parse::<SegmentsMode>().unwrap(), mode);
        }
    }

    #[test]
    fn invalid_segments_mode_is_a_config_error() {
        let err = "sometimes".parse::<SegmentsMode>().unwrap_err();
        assert!(matches!(err, FactkitError::ConfigError(_)));
    }
}
