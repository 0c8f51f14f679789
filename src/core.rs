use governor::{
    Quota, RateLimiter, clock::DefaultClock, middleware::NoOpMiddleware, state::InMemoryState,
    state::NotKeyed,
};
use reqwest::header::{ACCEPT_ENCODING, CONTENT_ENCODING, HeaderMap, HeaderValue, USER_AGENT};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::io::Read;
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use flate2::read::{DeflateDecoder, GzDecoder, ZlibDecoder};

use super::cache::FetchCache;
use super::config::ClientConfig;
use super::error::{FactkitError, Result};

const MAX_RETRIES: u32 = 5;
const INITIAL_BACKOFF_MS: u64 = 1000; // 1 second

type Governor = RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

/// Running totals for one extraction run.
///
/// `artifacts_by_filing` maps an accession number to the artifact names
/// pulled for it, so a run can report exactly what each filing cost.
#[derive(Debug, Clone, Default)]
pub struct UsageReport {
    /// Decoded bytes fetched over the network (cache hits excluded).
    pub bytes_downloaded: u64,

    /// Number of network requests issued.
    pub request_count: u64,

    /// Artifact names downloaded per filing accession.
    pub artifacts_by_filing: BTreeMap<String, Vec<String>>,
}

/// HTTP client for the SEC EDGAR system with rate limiting, an on-disk
/// response cache, and byte-budget enforcement.
///
/// The client is the single chokepoint for all upstream traffic. Every
/// network request waits on a token bucket sized to the configured
/// requests-per-second with a burst of one, so requests are evenly spaced
/// rather than front-loaded. Responses are decoded from their declared
/// `Content-Encoding` (with gzip magic-byte sniffing as a fallback for
/// header-less payloads) before they are cached, sized against the
/// per-artifact cap, and charged against the per-run download budget.
///
/// Cache hits bypass the throttle, the budgets, and the retry machinery
/// entirely: reruns over a warm cache touch the network zero times.
///
/// The SEC's fair access policy requires a descriptive `User-Agent`;
/// construction fails with [`FactkitError::ConfigError`] when the identity
/// string is empty.
///
/// # Examples
///
/// ```rust
/// # use factkit::EdgarClient;
/// let client = EdgarClient::new("my_app/1.0 (my@email.com)")?;
/// # Ok::<(), factkit::FactkitError>(())
/// ```
#[derive(Debug, Clone)]
pub struct EdgarClient {
    /// HTTP client for making requests
    client: reqwest::Client,

    /// Token bucket rate limiter for SEC compliance
    rate_limiter: Arc<Governor>,

    /// On-disk response cache
    cache: FetchCache,

    /// Shared per-run counters and budgets
    usage: Arc<Mutex<UsageReport>>,

    /// Per-artifact decoded size cap, in bytes
    pub(crate) max_artifact_bytes: u64,

    /// Per-run cumulative download cap, in bytes
    max_total_bytes: u64,

    /// Base URL for EDGAR archives
    pub(crate) edgar_archives_url: String,

    /// Base URL for the EDGAR data API
    pub(crate) edgar_data_url: String,

    /// Base URL for EDGAR files
    pub(crate) edgar_files_url: String,
}

impl EdgarClient {
    /// Creates a client with default settings and the given identity.
    ///
    /// # Errors
    ///
    /// Returns `FactkitError::ConfigError` if the user agent is empty or
    /// malformed.
    pub fn new(user_agent: &str) -> Result<Self> {
        Self::with_config(ClientConfig::new(user_agent))
    }

    /// Creates a client from a full [`ClientConfig`].
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        if config.user_agent.trim().is_empty() {
            return Err(FactkitError::ConfigError(
                "user agent identity is required by the SEC access policy".to_string(),
            ));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|e| FactkitError::ConfigError(format!("Invalid user agent: {}", e)))?,
        );
        // reqwest is built without transparent decompression so the budget
        // sees true decoded sizes; advertise encodings and decode manually.
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip, deflate"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| FactkitError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        let quota = Quota::per_second(NonZeroU32::new(config.rate_limit).ok_or_else(|| {
            FactkitError::ConfigError("Rate limit must be greater than zero".to_string())
        })?)
        .allow_burst(NonZeroU32::MIN);

        Ok(EdgarClient {
            client,
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
            cache: FetchCache::new(config.cache_dir),
            usage: Arc::new(Mutex::new(UsageReport::default())),
            max_artifact_bytes: config.max_artifact_bytes,
            max_total_bytes: config.max_total_bytes,
            edgar_archives_url: config.base_urls.archives,
            edgar_data_url: config.base_urls.data,
            edgar_files_url: config.base_urls.files,
        })
    }

    /// Calculates the wait duration for retry attempts using exponential
    /// backoff with jitter (±20%) to avoid synchronized retries.
    fn calculate_backoff(retry: u32) -> Duration {
        let backoff_ms = INITIAL_BACKOFF_MS * (2_u64.pow(retry));
        let jitter = (backoff_ms as f64 * 0.2 * (fastrand::f64() - 0.5)) as i64;
        Duration::from_millis((backoff_ms as i64 + jitter) as u64)
    }

    /// Decodes a response body according to its declared content encoding.
    ///
    /// When no encoding is declared, the gzip magic bytes are sniffed:
    /// some legacy cached payloads are gzip-on-disk without any header.
    /// Deflate is tried zlib-wrapped first, then raw, matching what the
    /// SEC actually serves.
    fn decode_body(data: Vec<u8>, content_encoding: Option<&str>, context: &str) -> Result<Vec<u8>> {
        let encoding = content_encoding.unwrap_or("").trim().to_ascii_lowercase();
        let fail = || FactkitError::DecompressionFailed {
            context: format!(
                "{}. Content-Encoding={}",
                context,
                if encoding.is_empty() { "none" } else { encoding.as_str() }
            ),
        };

        match encoding.as_str() {
            "gzip" => {
                let mut out = Vec::new();
                GzDecoder::new(&data[..])
                    .read_to_end(&mut out)
                    .map_err(|_| fail())?;
                Ok(out)
            }
            "deflate" => {
                let mut out = Vec::new();
                if ZlibDecoder::new(&data[..]).read_to_end(&mut out).is_ok() {
                    return Ok(out);
                }
                out.clear();
                DeflateDecoder::new(&data[..])
                    .read_to_end(&mut out)
                    .map_err(|_| fail())?;
                Ok(out)
            }
            _ => {
                if data.len() >= 2 && data[0] == 0x1F && data[1] == 0x8B {
                    let mut out = Vec::new();
                    GzDecoder::new(&data[..])
                        .read_to_end(&mut out)
                        .map_err(|_| fail())?;
                    return Ok(out);
                }
                Ok(data)
            }
        }
    }

    /// Charges one decoded artifact against both byte budgets.
    ///
    /// Called on the network path only; cache hits are free.
    fn charge_budgets(&self, url: &str, len: u64) -> Result<()> {
        if len > self.max_artifact_bytes {
            return Err(FactkitError::ArtifactTooLarge {
                url: url.to_string(),
                size: len,
                cap: self.max_artifact_bytes,
            });
        }
        let mut usage = self.usage_lock();
        usage.bytes_downloaded += len;
        usage.request_count += 1;
        if usage.bytes_downloaded > self.max_total_bytes {
            return Err(FactkitError::DownloadBudgetExceeded {
                total: usage.bytes_downloaded,
                cap: self.max_total_bytes,
            });
        }
        Ok(())
    }

    fn usage_lock(&self) -> std::sync::MutexGuard<'_, UsageReport> {
        self.usage.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fetches one URL over the network, decoding and budget-checking the
    /// response. Retries on HTTP 429 (honoring `Retry-After`) and on
    /// transient network failures, with capped exponential backoff.
    async fn http_get(&self, url: &str) -> Result<Vec<u8>> {
        let mut retries = 0;

        loop {
            self.rate_limiter.until_ready().await;

            match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    let headers = response.headers().clone();

                    match status {
                        reqwest::StatusCode::OK => {
                            let content_encoding = headers
                                .get(CONTENT_ENCODING)
                                .and_then(|v| v.to_str().ok())
                                .map(str::to_owned);
                            let body = response
                                .bytes()
                                .await
                                .map_err(FactkitError::RequestError)?
                                .to_vec();
                            let decoded = Self::decode_body(
                                body,
                                content_encoding.as_deref(),
                                &format!("url={}", url),
                            )?;
                            self.charge_budgets(url, decoded.len() as u64)?;
                            return Ok(decoded);
                        }
                        reqwest::StatusCode::NOT_FOUND => {
                            return Err(FactkitError::NotFound);
                        }
                        reqwest::StatusCode::TOO_MANY_REQUESTS => {
                            if retries >= MAX_RETRIES {
                                return Err(FactkitError::RateLimitExceeded);
                            }
                            let retry_after = headers
                                .get("retry-after")
                                .and_then(|h| h.to_str().ok())
                                .and_then(|s| s.parse::<u64>().ok())
                                .map(Duration::from_secs)
                                .unwrap_or_else(|| Self::calculate_backoff(retries));
                            tracing::warn!(
                                "Rate limit hit (429) for {}. Attempt {}/{}. Waiting {:?} before retry.",
                                url,
                                retries + 1,
                                MAX_RETRIES + 1,
                                retry_after
                            );
                            sleep(retry_after).await;
                            retries += 1;
                            continue;
                        }
                        other_status => {
                            let preview = response
                                .text()
                                .await
                                .unwrap_or_else(|_| "Failed to read error body".to_string());
                            return Err(FactkitError::InvalidResponse(format!(
                                "Unexpected status code: {} for URL: {}. Response preview: {}",
                                other_status,
                                url,
                                preview.chars().take(200).collect::<String>()
                            )));
                        }
                    }
                }
                Err(e) => {
                    if retries >= MAX_RETRIES {
                        return Err(FactkitError::RequestError(e));
                    }
                    let backoff = Self::calculate_backoff(retries);
                    tracing::warn!(
                        "Request failed for {}: {:?}. Attempt {}/{}. Retrying in {:?}.",
                        url,
                        e,
                        retries + 1,
                        MAX_RETRIES + 1,
                        backoff
                    );
                    sleep(backoff).await;
                    retries += 1;
                    continue;
                }
            }
        }
    }

    /// Fetches binary data, consulting the on-disk cache first.
    ///
    /// Cache hits bypass the throttle and both byte budgets. Cached bytes
    /// still run through the sniffing decoder so legacy gzip-on-disk
    /// entries decode transparently.
    pub async fn fetch(&self, url: &str, use_cache: bool) -> Result<Vec<u8>> {
        if use_cache {
            if let Some(data) = self.cache.read(url) {
                tracing::debug!("cache hit for {}", url);
                let context = format!("cache={}", self.cache.entry_path(url).display());
                return Self::decode_body(data, None, &context);
            }
        }
        let data = self.http_get(url).await?;
        self.cache.write(url, &data)?;
        Ok(data)
    }

    /// Fetches and deserializes a JSON document.
    pub async fn fetch_json<T: DeserializeOwned>(&self, url: &str, use_cache: bool) -> Result<T> {
        let raw = self.fetch(url, use_cache).await?;
        Ok(serde_json::from_slice(&raw)?)
    }

    /// Fetches a document as UTF-8 text.
    pub async fn fetch_text(&self, url: &str, use_cache: bool) -> Result<String> {
        let raw = self.fetch(url, use_cache).await?;
        Ok(String::from_utf8(raw)?)
    }

    /// Records that an artifact was pulled on behalf of a filing, for the
    /// end-of-run report.
    pub fn record_artifact(&self, accession: &str, artifact: &str) {
        self.usage_lock()
            .artifacts_by_filing
            .entry(accession.to_string())
            .or_default()
            .push(artifact.to_string());
    }

    /// Snapshot of the run's usage counters.
    pub fn usage(&self) -> UsageReport {
        self.usage_lock().clone()
    }

    /// The client's on-disk cache.
    pub fn cache(&self) -> &FetchCache {
        &self.cache
    }

    /// Returns the base URL for EDGAR archives.
    pub fn archives_url(&self) -> &str {
        &self.edgar_archives_url
    }

    /// Returns the base URL for the EDGAR data API.
    pub fn data_url(&self) -> &str {
        &self.edgar_data_url
    }

    /// Returns the base URL for EDGAR files.
    pub fn files_url(&self) -> &str {
        &self.edgar_files_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::{GzEncoder, ZlibEncoder};
    use std::io::Write;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn test_calculate_backoff() {
        let backoff0 = EdgarClient::calculate_backoff(0);
        let backoff1 = EdgarClient::calculate_backoff(1);
        let backoff2 = EdgarClient::calculate_backoff(2);

        assert!(backoff0 < backoff1);
        assert!(backoff1 < backoff2);

        assert!(backoff0.as_millis() >= 800 && backoff0.as_millis() <= 1200);
        assert!(backoff1.as_millis() >= 1600 && backoff1.as_millis() <= 2400);
    }

    #[test]
    fn rejects_empty_user_agent() {
        let result = EdgarClient::new("  ");
        assert!(matches!(result, Err(FactkitError::ConfigError(_))));
    }

    #[test]
    fn decodes_declared_gzip() {
        let decoded = EdgarClient::decode_body(gzip(b"hello"), Some("gzip"), "url=test").unwrap();
        assert_eq!(decoded, b"hello");
    }

    #[test]
    fn decodes_declared_deflate() {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(b"hello").unwrap();
        let body = enc.finish().unwrap();

        let decoded = EdgarClient::decode_body(body, Some("deflate"), "url=test").unwrap();
        assert_eq!(decoded, b"hello");
    }

    #[test]
    fn sniffs_gzip_magic_without_header() {
        let decoded = EdgarClient::decode_body(gzip(b"{\"ok\":true}"), None, "url=test").unwrap();
        assert_eq!(decoded, b"{\"ok\":true}");
    }

    #[test]
    fn passes_plain_bytes_through() {
        let decoded = EdgarClient::decode_body(b"plain".to_vec(), None, "url=test").unwrap();
        assert_eq!(decoded, b"plain");
    }

    #[test]
    fn declared_gzip_with_garbage_is_an_error() {
        let result = EdgarClient::decode_body(b"not gzip".to_vec(), Some("gzip"), "url=x");
        assert!(matches!(result, Err(FactkitError::DecompressionFailed { .. })));
    }

    #[test]
    fn artifact_cap_is_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig::new("test_agent example@example.com")
            .with_cache_dir(dir.path())
            .with_max_artifact_mb(0.000001);
        let client = EdgarClient::with_config(config).unwrap();

        let result = client.charge_budgets("https://example.com/huge", 1024);
        assert!(matches!(result, Err(FactkitError::ArtifactTooLarge { .. })));
    }

    #[test]
    fn cumulative_budget_is_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ClientConfig::new("test_agent example@example.com").with_cache_dir(dir.path());
        config.max_total_bytes = 1000;
        let client = EdgarClient::with_config(config).unwrap();

        client.charge_budgets("https://example.com/a", 600).unwrap();
        let result = client.charge_budgets("https://example.com/b", 600);
        assert!(matches!(
            result,
            Err(FactkitError::DownloadBudgetExceeded { total: 1200, cap: 1000 })
        ));
    }

    #[tokio::test]
    async fn cached_legacy_gzip_entries_decode() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig::new("test_agent example@example.com").with_cache_dir(dir.path());
        let client = EdgarClient::with_config(config).unwrap();

        let url = "https://example.com/cached.json";
        client.cache().write(url, &gzip(b"{\"ok\": true, \"n\": 1}")).unwrap();

        let value: serde_json::Value = client.fetch_json(url, true).await.unwrap();
        assert_eq!(value["ok"], serde_json::json!(true));
        assert_eq!(value["n"], serde_json::json!(1));

        // A cache hit never touches the counters.
        assert_eq!(client.usage().request_count, 0);
        assert_eq!(client.usage().bytes_downloaded, 0);
    }
}
