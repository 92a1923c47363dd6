//! URL lifecycle transitions
//!
//! Every move between the pending, catalog, rejected and reserved stores goes
//! through this module. Before anything is inserted, [`locate`] checks all four
//! stores so that a URL string lives in at most one of them.

use crate::catalog::{ApplicationRecord, CatalogEntry};
use crate::config::Config;
use crate::state::{Connectivity, QueueHints, StoreKind, UrlRecord, WEEK};
use crate::storage::{Filter, Storage, StorageResult, TagMatch};
use crate::url::{
    classify_url, matches_rule, normalise_url, valid_hyperlink_filetype, UrlPolicy,
};
use std::fmt;
use url::Url;

/// Why a URL was moved to the rejected store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    /// The server answered with a 4xx status
    HttpStatus(u16),
    /// Connection failures while online, or too many strikes
    ConnectionFailures { strikes: u8 },
    /// Unparseable, relative or unfetchable URL
    InvalidUrl(String),
    /// Redirect loop or overlong redirect chain
    Redirect,
    EmptyBody,
    RobotsDisallowed,
    NoIndex,
    /// No topical marker and no recognised content
    NotRelevant,
    /// A ZIP without any application directory
    NoApplications,
    MalformedManifest,
    MalformedFeed,
    /// Path ends in a non-content extension
    InvalidFiletype,
    /// A probed `riscos.xml` that is not there
    ManifestNotFound,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HttpStatus(status) => write!(f, "HTTP {}", status),
            Self::ConnectionFailures { strikes } => {
                write!(f, "connection failure (strike {})", strikes)
            }
            Self::InvalidUrl(error) => write!(f, "invalid URL: {}", error),
            Self::Redirect => write!(f, "redirect error"),
            Self::EmptyBody => write!(f, "empty body"),
            Self::RobotsDisallowed => write!(f, "disallowed by robots.txt"),
            Self::NoIndex => write!(f, "meta robots noindex"),
            Self::NotRelevant => write!(f, "not relevant"),
            Self::NoApplications => write!(f, "archive holds no applications"),
            Self::MalformedManifest => write!(f, "malformed manifest"),
            Self::MalformedFeed => write!(f, "malformed feed"),
            Self::InvalidFiletype => write!(f, "non-content filetype"),
            Self::ManifestNotFound => write!(f, "no manifest"),
        }
    }
}

/// What happened to a URL offered to [`enqueue`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Enqueued {
    /// Inserted into pending with this id
    Queued(i64),
    /// Already present in a store
    Known(StoreKind),
    Blacklisted,
    Suspended,
    /// Relative, unparseable or a non-content filetype
    Invalid,
}

/// Result of applying a connection failure to a pending record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Seeds are never penalised
    Spared,
    /// The record stays pending with this many strikes
    Struck(u8),
    Rejected,
}

/// The report of one crawl step
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// Nothing pending
    Idle,
    Catalogued {
        url: String,
        kind: &'static str,
        /// Catalog records written
        records: usize,
        /// New URLs queued from the content
        queued: usize,
    },
    Rejected {
        url: String,
        reason: RejectReason,
    },
    /// The domain is suspended; `moved` pending entries went to reserved
    Reserved { url: String, moved: usize },
    /// Blacklisted domain or duplicate entry; `removed` pending entries were dropped
    Dropped { url: String, removed: usize },
    Struck { url: String, strikes: u8 },
    /// Left as it was, to be retried
    Transient { url: String, error: String },
}

/// Which provenance tag links sub-records to their source document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    Feed,
    Manifest,
}

/// Finds the store holding `url`
///
/// Catalog sub-records are ignored: a feed item's link belongs to the feed, not
/// to the catalog.
pub fn locate<S: Storage + ?Sized>(
    storage: &S,
    url: &str,
) -> StorageResult<Option<(StoreKind, UrlRecord)>> {
    for store in StoreKind::all() {
        let found = if store == StoreKind::Catalog {
            owner_records(storage, url)?.into_iter().next()
        } else {
            storage.find_one(store, &Filter::by_url(url))?
        };
        if let Some(record) = found {
            return Ok(Some((store, record)));
        }
    }
    Ok(None)
}

/// Catalog records keyed by `url` that are not sub-records
pub fn owner_records<S: Storage + ?Sized>(storage: &S, url: &str) -> StorageResult<Vec<UrlRecord>> {
    Ok(storage
        .find(StoreKind::Catalog, &Filter::by_url(url))?
        .into_iter()
        .filter(|record| !record.is_sub_record())
        .collect())
}

/// Queues `url` unless it is located in a store, blacklisted or suspended
pub fn enqueue<S: Storage + ?Sized>(
    storage: &mut S,
    config: &Config,
    url: &str,
    hints: &QueueHints,
    now: i64,
) -> StorageResult<Enqueued> {
    let url = normalise_url(url.trim());
    let Ok(parsed) = Url::parse(&url) else {
        return Ok(Enqueued::Invalid);
    };
    if parsed.host_str().is_none() || !valid_hyperlink_filetype(&url) {
        return Ok(Enqueued::Invalid);
    }

    match classify_url(&parsed, config) {
        UrlPolicy::Blacklisted => return Ok(Enqueued::Blacklisted),
        UrlPolicy::Suspended => return Ok(Enqueued::Suspended),
        UrlPolicy::Allowed => {}
    }

    if let Some((store, _)) = locate(storage, &url)? {
        return Ok(Enqueued::Known(store));
    }

    let id = storage.insert(
        StoreKind::Pending,
        &UrlRecord::for_pending(&url, hints, now),
    )?;
    tracing::debug!("Queued {} (#{})", url, id);
    Ok(Enqueued::Queued(id))
}

fn remove_pending<S: Storage + ?Sized>(storage: &mut S, record: &UrlRecord) -> StorageResult<()> {
    if let Some(id) = record.id {
        storage.remove(StoreKind::Pending, &Filter::by_id(id))?;
    }
    Ok(())
}

/// Moves a pending record to the rejected store
pub fn reject<S: Storage + ?Sized>(
    storage: &mut S,
    record: &UrlRecord,
    reason: &RejectReason,
    now: i64,
) -> StorageResult<()> {
    remove_pending(storage, record)?;
    if storage
        .find_one(StoreKind::Rejected, &Filter::by_url(&record.url))?
        .is_none()
    {
        let mut rejected = UrlRecord::for_rejected(&record.url, now);
        rejected.parent_url = record.parent_url.clone();
        storage.insert(StoreKind::Rejected, &rejected)?;
    }
    tracing::info!("Rejected {}: {}", record.url, reason);
    Ok(())
}

/// Moves a pending record to the reserved store
pub fn reserve<S: Storage + ?Sized>(storage: &mut S, record: &UrlRecord) -> StorageResult<()> {
    remove_pending(storage, record)?;
    if storage
        .find_one(StoreKind::Reserved, &Filter::by_url(&record.url))?
        .is_none()
    {
        let mut reserved = record.clone();
        reserved.id = None;
        storage.insert(StoreKind::Reserved, &reserved)?;
    }
    tracing::info!("Reserved {}: domain suspended", record.url);
    Ok(())
}

/// Pending entries on `domain` that `rule` covers
///
/// A host-only rule covers the whole domain; a rule with a path prefix only
/// covers entries under that path.
fn covered_by_rule<S: Storage + ?Sized>(
    storage: &S,
    domain: &str,
    rule: &str,
) -> StorageResult<Vec<UrlRecord>> {
    let pending = storage.find(StoreKind::Pending, &Filter::by_domain(domain))?;
    if !rule.contains('/') {
        return Ok(pending);
    }
    Ok(pending
        .into_iter()
        .filter(|record| {
            Url::parse(&record.url)
                .is_ok_and(|url| matches_rule(rule, &record.domain, url.path()))
        })
        .collect())
}

/// Drops the pending entries on `domain` covered by a blacklist rule
pub fn blacklist_domain<S: Storage + ?Sized>(
    storage: &mut S,
    domain: &str,
    rule: &str,
) -> StorageResult<usize> {
    let covered = covered_by_rule(storage, domain, rule)?;
    for record in &covered {
        remove_pending(storage, record)?;
    }
    tracing::info!(
        "Blacklisted {} ({}): removed {} pending entries",
        domain,
        rule,
        covered.len()
    );
    Ok(covered.len())
}

/// Moves the pending entries on `domain` covered by a suspension rule to reserved
pub fn suspend_domain<S: Storage + ?Sized>(
    storage: &mut S,
    domain: &str,
    rule: &str,
) -> StorageResult<usize> {
    let covered = covered_by_rule(storage, domain, rule)?;
    for record in &covered {
        reserve(storage, record)?;
    }
    Ok(covered.len())
}

/// Applies a connection-level failure (refused, TLS, 5xx) to a pending record
///
/// A failure while the connectivity watermark is healthy, or the third failure,
/// rejects the URL. Otherwise the record takes a strike and is deferred a week.
pub fn apply_connection_failure<S: Storage + ?Sized>(
    storage: &mut S,
    record: &UrlRecord,
    connectivity: &Connectivity,
    now: i64,
) -> StorageResult<FailureOutcome> {
    if record.seed {
        tracing::warn!("Connection failure on seed {}; not penalised", record.url);
        return Ok(FailureOutcome::Spared);
    }

    let strikes = record.strikes.saturating_add(1);
    if connectivity.is_healthy(now) || record.strikes >= 2 {
        reject(
            storage,
            record,
            &RejectReason::ConnectionFailures { strikes },
            now,
        )?;
        return Ok(FailureOutcome::Rejected);
    }

    let mut struck = record.clone();
    struck.strikes = strikes;
    struck.last_scanned = now;
    struck.next_scan = now + WEEK;
    storage.update(StoreKind::Pending, &struck)?;
    tracing::warn!("Strike {} for {}; retrying in a week", strikes, record.url);
    Ok(FailureOutcome::Struck(strikes))
}

/// A catalog record carrying the pending record's tags and provenance
fn catalog_record(record: &UrlRecord, entry: CatalogEntry, now: i64, next_scan: i64) -> UrlRecord {
    let mut catalogued = UrlRecord::for_catalog(&record.url, entry, now, next_scan);
    catalogued.parent_url = record.parent_url.clone();
    catalogued.seed = record.seed;
    catalogued.zip_file = record.zip_file.clone();
    catalogued.riscos_xml = record.riscos_xml.clone();
    catalogued.rss_feed = record.rss_feed.clone();
    catalogued
}

/// Moves a pending record into the catalog with a single entry
///
/// Any catalog records already owned by the URL are overwritten.
pub fn move_to_catalog<S: Storage + ?Sized>(
    storage: &mut S,
    record: &UrlRecord,
    entry: CatalogEntry,
    now: i64,
    next_scan: i64,
) -> StorageResult<i64> {
    let kind = entry.kind_name();
    let mut catalogued = catalog_record(record, entry, now, next_scan);
    let mut existing = owner_records(storage, &record.url)?.into_iter();

    let id = match existing.next() {
        Some(first) => {
            catalogued.id = first.id;
            storage.update(StoreKind::Catalog, &catalogued)?;
            for stale in existing {
                if let Some(id) = stale.id {
                    storage.remove(StoreKind::Catalog, &Filter::by_id(id))?;
                }
            }
            first.id.unwrap_or_default()
        }
        None => storage.insert(StoreKind::Catalog, &catalogued)?,
    };

    remove_pending(storage, record)?;
    tracing::info!("Catalogued {} as {}", record.url, kind);
    Ok(id)
}

/// Writes one catalog record per application found in an archive
///
/// Records are keyed on (archive URL, application directory). Applications that
/// disappeared from the archive lose their records.
pub fn catalog_applications<S: Storage + ?Sized>(
    storage: &mut S,
    record: &UrlRecord,
    applications: Vec<ApplicationRecord>,
    now: i64,
    next_scan: i64,
) -> StorageResult<usize> {
    let mut existing = owner_records(storage, &record.url)?;
    let count = applications.len();

    for application in applications {
        let mut catalogued =
            catalog_record(record, CatalogEntry::Application(application), now, next_scan);
        catalogued.zip_file = Some(record.url.clone());

        let directory = catalogued.directory().map(str::to_string);
        let matching = existing
            .iter()
            .position(|old| old.directory().map(str::to_string) == directory);
        match matching {
            Some(index) => {
                catalogued.id = existing.remove(index).id;
                storage.update(StoreKind::Catalog, &catalogued)?;
            }
            None => {
                storage.insert(StoreKind::Catalog, &catalogued)?;
            }
        }
    }

    for stale in existing {
        if let Some(id) = stale.id {
            storage.remove(StoreKind::Catalog, &Filter::by_id(id))?;
        }
    }

    remove_pending(storage, record)?;
    tracing::info!("Catalogued {} applications from {}", count, record.url);
    Ok(count)
}

/// Catalogs a feed or manifest together with its expanded items
///
/// The previous records carrying this document's provenance are replaced. Each
/// item is keyed by its own link, or by the document URL when it has none.
pub fn catalog_document<S: Storage + ?Sized>(
    storage: &mut S,
    record: &UrlRecord,
    owner: CatalogEntry,
    provenance: Provenance,
    items: Vec<(Option<String>, CatalogEntry)>,
    now: i64,
    next_scan: i64,
) -> StorageResult<usize> {
    let tag = Some(record.url.clone());
    let tagged = match provenance {
        Provenance::Feed => Filter::all().rss_feed(TagMatch::Equals(record.url.clone())),
        Provenance::Manifest => Filter::all().riscos_xml(TagMatch::Equals(record.url.clone())),
    };
    let replaced = storage.remove(StoreKind::Catalog, &tagged)?;
    for stale in owner_records(storage, &record.url)? {
        if let Some(id) = stale.id {
            storage.remove(StoreKind::Catalog, &Filter::by_id(id))?;
        }
    }

    let mut document = catalog_record(record, owner, now, next_scan);
    match provenance {
        Provenance::Feed => document.rss_feed = tag.clone(),
        Provenance::Manifest => document.riscos_xml = tag.clone(),
    }
    storage.insert(StoreKind::Catalog, &document)?;

    let count = items.len();
    for (link, entry) in items {
        let url = link.unwrap_or_else(|| record.url.clone());
        let mut item = UrlRecord::for_catalog(&url, entry, now, next_scan);
        item.parent_url = tag.clone();
        match provenance {
            Provenance::Feed => item.rss_feed = tag.clone(),
            Provenance::Manifest => item.riscos_xml = tag.clone(),
        }
        storage.insert(StoreKind::Catalog, &item)?;
    }

    remove_pending(storage, record)?;
    tracing::info!(
        "Catalogued {} with {} items (replaced {})",
        record.url,
        count,
        replaced
    );
    Ok(count)
}
