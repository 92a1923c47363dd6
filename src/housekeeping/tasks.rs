//! The storage maintenance tasks run by housekeeping

use crate::config::Config;
use crate::crawler::lifecycle::{self, owner_records};
use crate::state::{QueueHints, StoreKind, UrlRecord, YEAR};
use crate::storage::{Cmp, Filter, Storage, StorageResult};
use crate::url::{
    domain_of, is_manifest_url, is_zip_url, parse_living_archive, valid_hyperlink_filetype,
};
use crate::SpiderError;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use url::Url;

const LIVING_ARCHIVE_DOMAIN: &str = "web.archive.org";

/// URL fragments that suggest downloadable software
const SOFTWARE_PHRASES: &[&str] = &[
    ".arc",
    ".spk",
    ".zip",
    "applications",
    "apps",
    "careware",
    "downloads",
    "freeware",
    "package",
    "programs",
    "progs",
    "shareware",
    "software",
    "utilities",
];

/// Domains whose URLs contain software phrases without hosting software
const SOFTWARE_EXCLUDED_DOMAINS: &[&str] = &["web.archive.org", "www.ebay.co.uk", "jigsaw.w3.org"];

fn remove_record<S: Storage + ?Sized>(
    storage: &mut S,
    store: StoreKind,
    record: &UrlRecord,
) -> StorageResult<usize> {
    match record.id {
        Some(id) => storage.remove(store, &Filter::by_id(id)),
        None => Ok(0),
    }
}

/// Queues every URL listed in the batch feed file, then empties the file
pub(crate) fn batch_feed_in<S: Storage + ?Sized>(
    storage: &mut S,
    config: &Config,
    now: i64,
) -> Result<usize, SpiderError> {
    let Some(path) = config.crawler.batch_feed_path.as_deref() else {
        return Ok(0);
    };
    let path = Path::new(path);
    if !path.exists() {
        return Ok(0);
    }

    let contents = std::fs::read_to_string(path)?;
    let hints = QueueHints {
        last_scanned: Some(0),
        next_scan: Some(now),
        ..QueueHints::default()
    };
    let mut queued = 0;
    for line in contents.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let lifecycle::Enqueued::Queued(_) =
            lifecycle::enqueue(storage, config, line, &hints, now)?
        {
            queued += 1;
        }
    }

    std::fs::write(path, "")?;
    tracing::info!("Batch feed-in queued {} URLs", queued);
    Ok(queued)
}

/// Fills missing domains and drops entries that cannot be fetched at all
pub(crate) fn repair_pending<S: Storage + ?Sized>(storage: &mut S) -> StorageResult<usize> {
    let mut changed = 0;
    for mut record in storage.find(StoreKind::Pending, &Filter::all())? {
        let host = Url::parse(&record.url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string));
        if host.is_none() {
            tracing::info!("Removing unfetchable pending entry {:?}", record.url);
            changed += remove_record(storage, StoreKind::Pending, &record)?;
        } else if record.domain.is_empty() {
            record.domain = domain_of(&record.url).unwrap_or_default();
            storage.update(StoreKind::Pending, &record)?;
            changed += 1;
        }
    }
    Ok(changed)
}

/// Fills missing domains and drops URL-less records with no provenance
pub(crate) fn repair_catalog<S: Storage + ?Sized>(storage: &mut S) -> StorageResult<usize> {
    let mut changed = 0;
    for mut record in storage.find(StoreKind::Catalog, &Filter::all())? {
        if record.url.is_empty() {
            if record.rss_feed.is_none() && record.riscos_xml.is_none() {
                tracing::info!("Removing catalog record #{:?} with no URL", record.id);
                changed += remove_record(storage, StoreKind::Catalog, &record)?;
            }
        } else if record.domain.is_empty() {
            if let Some(domain) = domain_of(&record.url) {
                record.domain = domain;
                storage.update(StoreKind::Catalog, &record)?;
                changed += 1;
            }
        }
    }
    Ok(changed)
}

/// Drops pending snapshots whose original is catalogued and parks those whose
/// original is itself pending
pub(crate) fn living_archive_pending<S: Storage + ?Sized>(storage: &mut S) -> StorageResult<usize> {
    let mut changed = 0;
    for record in storage.find(StoreKind::Pending, &Filter::by_domain(LIVING_ARCHIVE_DOMAIN))? {
        let Some((_, original)) = parse_living_archive(&record.url) else {
            continue;
        };
        if !owner_records(storage, original)?.is_empty() {
            tracing::info!("Removing living archive {}", record.url);
            changed += remove_record(storage, StoreKind::Pending, &record)?;
        } else if storage
            .find_one(StoreKind::Pending, &Filter::by_url(original))?
            .is_some()
        {
            lifecycle::reserve(storage, &record)?;
            changed += 1;
        }
    }
    Ok(changed)
}

/// Drops catalogued snapshots whose original is catalogued too
pub(crate) fn living_archive_catalog<S: Storage + ?Sized>(storage: &mut S) -> StorageResult<usize> {
    let mut changed = 0;
    for record in storage.find(StoreKind::Catalog, &Filter::by_domain(LIVING_ARCHIVE_DOMAIN))? {
        let Some((_, original)) = parse_living_archive(&record.url) else {
            continue;
        };
        if !owner_records(storage, original)?.is_empty() {
            tracing::info!("Removing living archive {}", record.url);
            changed += remove_record(storage, StoreKind::Catalog, &record)?;
        }
    }
    Ok(changed)
}

/// Forgets year-old rejects, but only while the catalog outnumbers pending
pub(crate) fn forget_rejects<S: Storage + ?Sized>(storage: &mut S, now: i64) -> StorageResult<usize> {
    let pending = storage.count(StoreKind::Pending, &Filter::all())?;
    let catalog = storage.count(StoreKind::Catalog, &Filter::all())?;
    if pending >= catalog {
        return Ok(0);
    }
    let removed = storage.remove(
        StoreKind::Rejected,
        &Filter::all().last_scanned(Cmp::Lt(now - YEAR)),
    )?;
    tracing::info!("Forgot {} rejects", removed);
    Ok(removed)
}

fn is_software_url(record: &UrlRecord) -> bool {
    if SOFTWARE_EXCLUDED_DOMAINS.contains(&record.domain.as_str()) {
        return false;
    }
    let lower = record.url.to_lowercase();
    SOFTWARE_PHRASES.iter().any(|phrase| lower.contains(phrase))
}

/// Makes software-looking pending URLs urgent and everything else not
///
/// Seeds keep their urgency.
pub(crate) fn software_urgency<S: Storage + ?Sized>(storage: &mut S) -> StorageResult<usize> {
    let mut changed = 0;
    for mut record in storage.find(StoreKind::Pending, &Filter::all())? {
        let last_scanned = if is_software_url(&record) {
            0
        } else if record.last_scanned == 0 && !record.seed {
            1
        } else {
            continue;
        };
        if record.last_scanned != last_scanned {
            record.last_scanned = last_scanned;
            storage.update(StoreKind::Pending, &record)?;
            changed += 1;
        }
    }
    Ok(changed)
}

/// Moves pending entries and catalog owners with non-content extensions to rejected
pub(crate) fn purge_invalid_filetypes<S: Storage + ?Sized>(
    storage: &mut S,
    now: i64,
) -> StorageResult<usize> {
    let mut changed = 0;
    for store in [StoreKind::Pending, StoreKind::Catalog] {
        for record in storage.find(store, &Filter::all())? {
            if record.url.is_empty()
                || record.is_sub_record()
                || valid_hyperlink_filetype(&record.url)
            {
                continue;
            }
            changed += remove_record(storage, store, &record)?;
            if storage
                .find_one(StoreKind::Rejected, &Filter::by_url(&record.url))?
                .is_none()
            {
                storage.insert(StoreKind::Rejected, &UrlRecord::for_rejected(&record.url, now))?;
            }
            tracing::info!("Rejected {}: non-content filetype", record.url);
        }
    }
    Ok(changed)
}

/// Keeps the oldest catalog owner per (url, directory)
pub(crate) fn dedup_catalog<S: Storage + ?Sized>(storage: &mut S) -> StorageResult<usize> {
    let mut seen: HashSet<(String, Option<String>)> = HashSet::new();
    let mut removed = 0;
    for record in storage.find(StoreKind::Catalog, &Filter::all())? {
        if record.is_sub_record() {
            continue;
        }
        let key = (record.url.clone(), record.directory().map(str::to_string));
        if !seen.insert(key) {
            tracing::info!("Removing duplicate catalog record {}", record.url);
            removed += remove_record(storage, StoreKind::Catalog, &record)?;
        }
    }
    Ok(removed)
}

/// Removes repeated pending URLs and pending URLs already held by another store
pub(crate) fn dedup_pending<S: Storage + ?Sized>(storage: &mut S) -> StorageResult<usize> {
    let mut seen = HashSet::new();
    let mut removed = 0;
    for record in storage.find(StoreKind::Pending, &Filter::all())? {
        let elsewhere = !owner_records(storage, &record.url)?.is_empty()
            || [StoreKind::Rejected, StoreKind::Reserved]
                .into_iter()
                .map(|store| storage.count(store, &Filter::by_url(&record.url)))
                .sum::<StorageResult<u64>>()?
                > 0;

        if elsewhere || !seen.insert(record.url.clone()) {
            tracing::info!("Removing duplicate pending entry {}", record.url);
            removed += remove_record(storage, StoreKind::Pending, &record)?;
        }
    }
    Ok(removed)
}

/// Keeps only the newest pending snapshot of each archived URL
pub(crate) fn prune_snapshots<S: Storage + ?Sized>(storage: &mut S) -> StorageResult<usize> {
    let snapshots = storage.find(StoreKind::Pending, &Filter::by_domain(LIVING_ARCHIVE_DOMAIN))?;

    let mut newest: HashMap<String, u64> = HashMap::new();
    for record in &snapshots {
        if let Some((stamp, original)) = parse_living_archive(&record.url) {
            let entry = newest.entry(original.to_string()).or_insert(stamp);
            *entry = (*entry).max(stamp);
        }
    }

    let mut removed = 0;
    for record in &snapshots {
        if let Some((stamp, original)) = parse_living_archive(&record.url) {
            if newest.get(original).is_some_and(|latest| *latest > stamp) {
                tracing::info!("Removing older snapshot {}", record.url);
                removed += remove_record(storage, StoreKind::Pending, record)?;
            }
        }
    }
    Ok(removed)
}

/// Tags pending ZIP and manifest URLs that were queued without their tag
pub(crate) fn tag_pending<S: Storage + ?Sized>(storage: &mut S) -> StorageResult<usize> {
    let mut changed = 0;
    for mut record in storage.find(StoreKind::Pending, &Filter::all())? {
        if is_manifest_url(&record.url) && record.riscos_xml.is_none() {
            record.riscos_xml = Some(record.url.clone());
        } else if is_zip_url(&record.url) && record.zip_file.is_none() {
            record.zip_file = Some(record.url.clone());
        } else {
            continue;
        }
        storage.update(StoreKind::Pending, &record)?;
        changed += 1;
    }
    Ok(changed)
}
