//! On-disk response cache.
//!
//! Every fetched URL maps to one file whose name is the URL with
//! non-alphanumeric characters replaced, so entries are inspectable and
//! greppable. Entries are partitioned into a per-CIK subdirectory whenever
//! the URL encodes a filer identity, which makes "clear one company" and
//! per-filer sizing possible without touching the rest of the cache.
//! URLs with no filer identity (ticker maps, index listings) land in a
//! `shared` partition.
//!
//! The cache is not safe for concurrent writers against the same root:
//! two processes could race on entry creation. Single-operator usage is
//! the supported pattern; coordinate externally otherwise.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use super::error::Result;

const SHARED_PARTITION: &str = "shared";

#[derive(Debug, Clone)]
pub struct FetchCache {
    root: PathBuf,
}

impl FetchCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of the cache.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the cache entry for a URL.
    ///
    /// The entry lives under the filer's partition when the URL encodes a
    /// CIK, under `shared` otherwise.
    pub fn entry_path(&self, url: &str) -> PathBuf {
        let partition = cik_in_url(url).unwrap_or_else(|| SHARED_PARTITION.to_string());
        self.root.join(partition).join(sanitize_url(url))
    }

    /// Reads a cache entry, returning `None` when absent.
    pub fn read(&self, url: &str) -> Option<Vec<u8>> {
        fs::read(self.entry_path(url)).ok()
    }

    /// Writes a cache entry, creating the partition directory on demand.
    pub fn write(&self, url: &str, data: &[u8]) -> Result<()> {
        let path = self.entry_path(url);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, data)?;
        Ok(())
    }

    /// Removes every cached entry for one filer.
    pub fn clear_company(&self, cik: &str) -> Result<()> {
        let partition = self.root.join(pad_cik(cik));
        if partition.exists() {
            fs::remove_dir_all(partition)?;
        }
        Ok(())
    }

    /// Prunes the cache by age, then by total size.
    ///
    /// Entries older than `max_age` are removed first. If the remaining
    /// total still exceeds `max_total_bytes`, the oldest entries by
    /// modification time are evicted until the cache fits.
    pub fn prune(&self, max_age: Duration, max_total_bytes: u64) -> Result<()> {
        let mut entries = self.collect_entries()?;
        let now = SystemTime::now();

        entries.retain(|(path, mtime, _)| {
            let expired = now
                .duration_since(*mtime)
                .map(|age| age > max_age)
                .unwrap_or(false);
            if expired {
                let _ = fs::remove_file(path);
            }
            !expired
        });

        let mut total: u64 = entries.iter().map(|(_, _, size)| size).sum();
        if total <= max_total_bytes {
            return Ok(());
        }

        entries.sort_by_key(|(_, mtime, _)| *mtime);
        for (path, _, size) in entries {
            if total <= max_total_bytes {
                break;
            }
            fs::remove_file(&path)?;
            total = total.saturating_sub(size);
        }
        Ok(())
    }

    /// All cache files with their modification time and size.
    fn collect_entries(&self) -> Result<Vec<(PathBuf, SystemTime, u64)>> {
        let mut out = Vec::new();
        if !self.root.exists() {
            return Ok(out);
        }
        for partition in fs::read_dir(&self.root)? {
            let partition = partition?.path();
            if !partition.is_dir() {
                continue;
            }
            for entry in fs::read_dir(&partition)? {
                let path = entry?.path();
                let meta = fs::metadata(&path)?;
                if meta.is_file() {
                    let mtime = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
                    out.push((path, mtime, meta.len()));
                }
            }
        }
        Ok(out)
    }
}

/// Replaces every character outside `[A-Za-z0-9._-]` with `_`.
fn sanitize_url(url: &str) -> String {
    url.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Zero-pads a CIK to the canonical 10 digits.
fn pad_cik(cik: &str) -> String {
    format!("{:0>10}", cik.trim_start_matches('0').trim())
}

/// Extracts a filer identity from a URL, if it encodes one.
///
/// Two upstream URL shapes carry a CIK: `.../CIK##########.json` on the
/// data API and `.../data/<cik>/...` on the archives host.
fn cik_in_url(url: &str) -> Option<String> {
    if let Some(pos) = url.find("CIK") {
        let digits: String = url[pos + 3..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        if digits.len() == 10 {
            return Some(digits);
        }
    }
    if let Some(pos) = url.find("/data/") {
        let digits: String = url[pos + 6..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        if !digits.is_empty() && url[pos + 6 + digits.len()..].starts_with('/') {
            return Some(pad_cik(&digits));
        }
    }
    None
}
