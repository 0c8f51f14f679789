use std::string::FromUtf8Error;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FactkitError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Resource not found")]
    NotFound,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Could not resolve company input: {0}")]
    CompanyNotResolved(String),

    #[error("Failed to decompress SEC response for {context}")]
    DecompressionFailed { context: String },

    #[error("Artifact at {url} is {size} bytes, over the {cap} byte per-artifact cap")]
    ArtifactTooLarge { url: String, size: u64, cap: u64 },

    #[error("Cumulative download of {total} bytes exceeds the {cap} byte per-run cap")]
    DownloadBudgetExceeded { total: u64, cap: u64 },

    #[error("File error: {0}")]
    FileError(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("XML parsing error: {0}")]
    XmlError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("UTF-8 conversion error: {0}")]
    Utf8Error(#[from] FromUtf8Error),

    #[error("Regex error: {0}")]
    RegexError(#[from] regex::Error),
}

impl From<quick_xml::Error> for FactkitError {
    fn from(error: quick_xml::Error) -> Self {
        FactkitError::XmlError(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FactkitError>;
