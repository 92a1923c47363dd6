//! Content extraction
//!
//! Turns fetched bodies into catalog content:
//! - [`classifier`] decides what kind of resource a response is
//! - [`archive`] scans ZIP archives for RISC OS applications
//! - [`filetype`] recovers the 3-digit filetype of archive members
//! - [`manifest`] reads `riscos.xml` manifests
//! - [`feed`] reads RSS and Atom feeds

pub mod archive;
pub mod classifier;
pub mod feed;
pub mod filetype;
pub mod manifest;

pub use archive::extract_applications;
pub use classifier::{classify, ContentKind};
pub use feed::{parse_feed, FeedDocument};
pub use filetype::{decode_arc0, filetype_of};
pub use manifest::parse_manifest;

use thiserror::Error;

/// Errors that abort an extraction outright
///
/// Problems confined to a single archive member or manifest element are not
/// errors; they are collected in [`ExtractionReport::warnings`].
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Malformed archive: {0}")]
    MalformedArchive(String),

    #[error("Malformed manifest: {0}")]
    MalformedManifest(String),

    #[error("Malformed feed: {0}")]
    MalformedFeed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for extraction operations
pub type ExtractionResult<T> = Result<T, ExtractionError>;

/// Items extracted from one document plus whatever could not be read
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionReport<T> {
    pub items: Vec<T>,
    pub warnings: Vec<String>,
}

impl<T> ExtractionReport<T> {
    pub fn new(items: Vec<T>, warnings: Vec<String>) -> Self {
        Self { items, warnings }
    }
}

impl<T> Default for ExtractionReport<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            warnings: Vec::new(),
        }
    }
}
