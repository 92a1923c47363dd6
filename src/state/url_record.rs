use crate::catalog::CatalogEntry;
use crate::url::{domain_of, is_manifest_url, is_zip_url};

/// A URL together with its scheduling attributes and, in the catalog, what was found there
#[derive(Debug, Clone, PartialEq)]
pub struct UrlRecord {
    /// Row id, assigned by the store on insert
    pub id: Option<i64>,
    pub url: String,
    /// Cached authority of `url`
    pub domain: String,
    /// Epoch of the last fetch; 0 means never fetched and urgent
    pub last_scanned: i64,
    /// Epoch after which a rescan is due
    pub next_scan: i64,
    /// Consecutive fetch failures
    pub strikes: u8,
    pub parent_url: Option<String>,
    /// Seeds survive any number of connection failures
    pub seed: bool,
    pub zip_file: Option<String>,
    pub riscos_xml: Option<String>,
    pub rss_feed: Option<String>,
    /// Kind-specific content; only set on catalog records
    pub entry: Option<CatalogEntry>,
    /// Id of the catalog record that replaces this one
    pub superseded_by: Option<i64>,
}

/// How a URL came to be queued
#[derive(Debug, Clone, Default)]
pub struct QueueHints {
    pub parent_url: Option<String>,
    pub last_scanned: Option<i64>,
    pub next_scan: Option<i64>,
    pub rss_feed: bool,
    pub riscos_xml: bool,
    pub seed: bool,
}

impl QueueHints {
    /// Hints for a link discovered on `parent`
    pub fn from_parent(parent: &str) -> Self {
        Self {
            parent_url: Some(parent.to_string()),
            ..Self::default()
        }
    }

    pub fn seed() -> Self {
        Self {
            seed: true,
            ..Self::default()
        }
    }
}

impl UrlRecord {
    /// A bare record with the domain derived from `url`
    pub fn new(url: &str, now: i64) -> Self {
        Self {
            id: None,
            url: url.to_string(),
            domain: domain_of(url).unwrap_or_default(),
            last_scanned: now,
            next_scan: now,
            strikes: 0,
            parent_url: None,
            seed: false,
            zip_file: None,
            riscos_xml: None,
            rss_feed: None,
            entry: None,
            superseded_by: None,
        }
    }

    /// A record ready for the pending store
    ///
    /// ZIP archives and seeds are marked never-fetched so the frontier takes them
    /// first. A URL carries at most one content tag: zip, then manifest, then feed.
    pub fn for_pending(url: &str, hints: &QueueHints, now: i64) -> Self {
        let mut record = Self::new(url, now);
        record.parent_url = hints.parent_url.clone();
        record.seed = hints.seed;
        record.next_scan = hints.next_scan.unwrap_or(now);

        let zip = is_zip_url(url);
        if zip {
            record.zip_file = Some(url.to_string());
        } else if hints.riscos_xml || is_manifest_url(url) {
            record.riscos_xml = Some(url.to_string());
        } else if hints.rss_feed {
            record.rss_feed = Some(url.to_string());
        }

        record.last_scanned = if zip || hints.seed {
            0
        } else {
            hints.last_scanned.unwrap_or(1)
        };
        record
    }

    /// A record for the rejected store
    pub fn for_rejected(url: &str, now: i64) -> Self {
        Self::new(url, now)
    }

    /// Wraps catalog content for `url`
    pub fn for_catalog(url: &str, entry: CatalogEntry, now: i64, next_scan: i64) -> Self {
        let mut record = Self::new(url, now);
        record.next_scan = next_scan;
        record.entry = Some(entry);
        record
    }

    /// True for catalog records expanded from a feed or manifest
    ///
    /// Such records belong to their source document rather than to the link they
    /// carry. A feed item or manifest entry is always a sub-record, even when it
    /// has no link of its own and reuses the source URL.
    pub fn is_sub_record(&self) -> bool {
        if matches!(
            self.entry,
            Some(CatalogEntry::FeedItem(_)) | Some(CatalogEntry::Manifest(_))
        ) {
            return true;
        }
        let foreign = |tag: &Option<String>| tag.as_deref().is_some_and(|t| t != self.url);
        foreign(&self.rss_feed) || foreign(&self.riscos_xml)
    }

    /// Application directory of an archive or manifest app entry
    pub fn directory(&self) -> Option<&str> {
        self.entry.as_ref().and_then(|entry| entry.directory())
    }

    /// Application version of an archive or manifest app entry
    pub fn application_version(&self) -> Option<&str> {
        self.entry.as_ref().and_then(|entry| entry.application_version())
    }
}
