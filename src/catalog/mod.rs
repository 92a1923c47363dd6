//! Typed catalog content
//!
//! Every catalog record carries one [`CatalogEntry`] describing what was found at
//! its URL. The entry is stored as a JSON document alongside the record's
//! scheduling columns.

mod application;
mod manifest;

pub use application::{
    AddressingMode, ApplicationRecord, ModuleDependency, PackageDependency, PackageInfo, Price,
    RelocatableModule, Utility,
};
pub use manifest::{
    ComponentRecord, EventRecord, GlossaryEntry, HardwareRecord, Listing, ManifestRecord,
    PublicationRecord, VideoRecord,
};

use serde::{Deserialize, Serialize};

/// An ordinary HTML page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    pub title: Option<String>,
    /// `Last-Modified` header as epoch seconds
    pub last_modified: Option<i64>,
}

/// The feed document itself
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedChannelRecord {
    pub title: Option<String>,
    pub items: usize,
}

/// One `<item>` (or Atom `<entry>`) of a feed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedItemRecord {
    pub rss_feed_item_title: Option<String>,
    pub rss_feed_item_description: Option<String>,
    pub rss_feed_item_link: Option<String>,
    /// When the item was seen
    pub rss_feed_item_date: i64,
    /// `pubDate` / `updated` of the item, when parseable
    pub published: Option<i64>,
}

/// What a catalog record describes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "record", rename_all = "snake_case")]
pub enum CatalogEntry {
    Page(PageRecord),
    Application(ApplicationRecord),
    Pdf,
    ArcFile,
    SparkFile,
    FeedChannel(FeedChannelRecord),
    FeedItem(FeedItemRecord),
    ManifestFile { records: usize },
    Manifest(ManifestRecord),
    /// An archive that could not be opened; kept for audit, not retried
    MalformedArchive { error: String },
}

impl CatalogEntry {
    /// Short name of the entry kind, for logging
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Page(_) => "page",
            Self::Application(_) => "application",
            Self::Pdf => "pdf",
            Self::ArcFile => "arc file",
            Self::SparkFile => "spark file",
            Self::FeedChannel(_) => "feed",
            Self::FeedItem(_) => "feed item",
            Self::ManifestFile { .. } => "manifest",
            Self::Manifest(record) => record.kind_name(),
            Self::MalformedArchive { .. } => "malformed archive",
        }
    }

    /// The application record, for archive entries and manifest apps
    pub fn application(&self) -> Option<&ApplicationRecord> {
        match self {
            Self::Application(app) | Self::Manifest(ManifestRecord::App(app)) => Some(app),
            _ => None,
        }
    }

    pub fn directory(&self) -> Option<&str> {
        self.application().and_then(|app| app.directory.as_deref())
    }

    pub fn application_version(&self) -> Option<&str> {
        self.application().and_then(|app| app.version.as_deref())
    }
}
