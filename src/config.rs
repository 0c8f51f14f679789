use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the EdgarClient
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// User agent string for HTTP requests. The SEC's fair access policy
    /// requires a descriptive identity; an empty string is rejected at
    /// client construction.
    pub user_agent: String,
    /// Rate limit in requests per second
    pub rate_limit: u32,
    /// HTTP request timeout
    pub timeout: Duration,
    /// Base URLs for different EDGAR services
    pub base_urls: EdgarUrls,
    /// Directory holding the on-disk response cache
    pub cache_dir: PathBuf,
    /// Maximum decoded size of a single downloaded artifact, in bytes
    pub max_artifact_bytes: u64,
    /// Maximum cumulative decoded bytes downloaded in one run
    pub max_total_bytes: u64,
}

/// Base URLs for different EDGAR services
#[derive(Debug, Clone)]
pub struct EdgarUrls {
    /// Base URL for EDGAR archives
    pub archives: String,
    /// Base URL for EDGAR data
    pub data: String,
    /// Base URL for EDGAR files
    pub files: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: String::new(),
            rate_limit: 5,
            timeout: Duration::from_secs(30),
            base_urls: EdgarUrls::default(),
            cache_dir: PathBuf::from(".cache/edgar"),
            max_artifact_bytes: 25 * 1024 * 1024,
            max_total_bytes: 200 * 1024 * 1024,
        }
    }
}

impl ClientConfig {
    /// Creates a ClientConfig with the given identity and defaults for
    /// everything else.
    ///
    /// # Basic usage
    ///
    /// ```rust
    /// use factkit::{ClientConfig, EdgarClient};
    /// let config = ClientConfig::new("YourAppName contact@example.com");
    /// let client = EdgarClient::with_config(config)?;
    /// # Ok::<(), factkit::FactkitError>(())
    /// ```
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            ..Self::default()
        }
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    /// Sets the per-artifact size cap, in megabytes.
    pub fn with_max_artifact_mb(mut self, mb: f64) -> Self {
        self.max_artifact_bytes = (mb * 1024.0 * 1024.0) as u64;
        self
    }

    /// Sets the per-run cumulative download cap, in megabytes.
    pub fn with_max_total_mb(mut self, mb: f64) -> Self {
        self.max_total_bytes = (mb * 1024.0 * 1024.0) as u64;
        self
    }
}

impl Default for EdgarUrls {
    fn default() -> Self {
        Self {
            archives: "https://www.sec.gov/Archives/edgar".to_string(),
            data: "https://data.sec.gov".to_string(),
            files: "https://www.sec.gov/files".to_string(),
        }
    }
}
