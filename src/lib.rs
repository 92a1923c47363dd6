//! riscos-spider: a self-directed crawler for the RISC OS software ecosystem
//!
//! The spider walks a bounded universe of RISC OS related URLs, classifies what it
//! fetches (pages, feeds, `riscos.xml` manifests, ZIP archives) and keeps the results
//! in a four-store catalog (pending, catalog, rejected, reserved) that is re-scanned
//! incrementally.

pub mod catalog;
pub mod config;
pub mod crawler;
pub mod extract;
pub mod housekeeping;
pub mod robots;
pub mod state;
pub mod storage;
pub mod sync;
pub mod url;

use thiserror::Error;

/// Main error type for spider operations
#[derive(Debug, Error)]
pub enum SpiderError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] extract::ExtractionError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid host rule: {0}")]
    InvalidRule(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

/// Result type alias for spider operations
pub type Result<T> = std::result::Result<T, SpiderError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::Spider;
pub use state::{StoreKind, TaskScheduleState, UrlRecord};
pub use storage::{SqliteStorage, Storage};
pub use url::{classify_url, extract_domain, matching_rule, normalise_url, UrlPolicy};
