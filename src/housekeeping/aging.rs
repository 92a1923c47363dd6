//! The aging sweep: stale catalog entries go back to pending

use crate::crawler::lifecycle::{locate, owner_records};
use crate::state::{QueueHints, StoreKind, UrlRecord, YEAR};
use crate::storage::{Cmp, Filter, Storage, StorageResult};
use crate::url::normalise_url;
use std::collections::HashSet;
use url::Url;

/// Demotes up to `limit` stale catalog URLs to pending
///
/// An entry is stale when its `next_scan` has passed or it was last scanned
/// more than a year ago. Every catalog owner at the URL is removed and the
/// re-normalised URL is queued, carrying over its parent and feed/manifest
/// role. Sub-records wait for their source document instead, and a URL already
/// held by another store is just dropped from the catalog.
///
/// Returns the number of URLs demoted.
pub fn age_catalog<S: Storage + ?Sized>(
    storage: &mut S,
    now: i64,
    limit: usize,
) -> StorageResult<usize> {
    let mut candidates = storage.find(StoreKind::Catalog, &Filter::all().next_scan(Cmp::Le(now)))?;
    candidates.extend(storage.find(
        StoreKind::Catalog,
        &Filter::all().last_scanned(Cmp::Lt(now - YEAR)),
    )?);

    let mut handled = HashSet::new();
    let mut demoted = 0;

    for record in candidates {
        if demoted >= limit {
            break;
        }
        if record.is_sub_record() || Url::parse(&record.url).is_err() {
            continue;
        }
        if !handled.insert(record.url.clone()) {
            continue;
        }

        for owner in owner_records(storage, &record.url)? {
            if let Some(id) = owner.id {
                storage.remove(StoreKind::Catalog, &Filter::by_id(id))?;
            }
        }
        demoted += 1;

        let url = normalise_url(&record.url);
        if let Some((store, _)) = locate(storage, &url)? {
            tracing::info!("Aged out {}; already in {}", record.url, store);
            continue;
        }

        let hints = QueueHints {
            parent_url: record.parent_url.clone(),
            last_scanned: Some(record.last_scanned),
            next_scan: Some(now),
            rss_feed: record.rss_feed.as_deref() == Some(record.url.as_str()),
            riscos_xml: record.riscos_xml.as_deref() == Some(record.url.as_str()),
            seed: false,
        };
        let mut pending = UrlRecord::for_pending(&url, &hints, now);
        pending.seed = record.seed;
        storage.insert(StoreKind::Pending, &pending)?;
        tracing::info!("Aged {} back to pending", url);
    }

    Ok(demoted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ApplicationRecord, CatalogEntry, FeedItemRecord, PageRecord};
    use crate::state::DAY;
    use crate::storage::SqliteStorage;

    const NOW: i64 = 1_300_000_000;

    fn page(url: &str, last_scanned: i64, next_scan: i64) -> UrlRecord {
        let entry = CatalogEntry::Page(PageRecord::default());
        UrlRecord::for_catalog(url, entry, last_scanned, next_scan)
    }

    fn snapshot(storage: &SqliteStorage) -> Vec<(StoreKind, Vec<String>)> {
        StoreKind::all()
            .into_iter()
            .map(|store| {
                let urls = storage
                    .find(store, &Filter::all())
                    .unwrap()
                    .into_iter()
                    .map(|r| r.url)
                    .collect();
                (store, urls)
            })
            .collect()
    }

    #[test]
    fn test_due_and_old_entries_are_demoted() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let mut due = page("http://a.org/due.html", NOW - DAY, NOW - 1);
        due.parent_url = Some("http://a.org/".to_string());
        storage.insert(StoreKind::Catalog, &due).unwrap();
        storage
            .insert(StoreKind::Catalog, &page("http://a.org/old.html", NOW - 2 * YEAR, NOW + DAY))
            .unwrap();
        storage
            .insert(StoreKind::Catalog, &page("http://a.org/fresh.html", NOW - DAY, NOW + DAY))
            .unwrap();

        assert_eq!(age_catalog(&mut storage, NOW, 32).unwrap(), 2);
        assert_eq!(storage.count(StoreKind::Catalog, &Filter::all()).unwrap(), 1);

        let moved = storage
            .find_one(StoreKind::Pending, &Filter::by_url("http://a.org/due.html"))
            .unwrap()
            .unwrap();
        assert_eq!(moved.parent_url.as_deref(), Some("http://a.org/"));
        assert_eq!(moved.last_scanned, NOW - DAY);
        assert_eq!(moved.next_scan, NOW);
    }

    #[test]
    fn test_archive_demotes_once_and_is_urgent() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let url = "http://a.org/apps.zip";
        for directory in ["!Edit", "!Draw"] {
            let entry = CatalogEntry::Application(ApplicationRecord::for_directory(directory));
            let mut record = UrlRecord::for_catalog(url, entry, NOW - DAY, NOW - 1);
            record.zip_file = Some(url.to_string());
            storage.insert(StoreKind::Catalog, &record).unwrap();
        }

        assert_eq!(age_catalog(&mut storage, NOW, 32).unwrap(), 1);
        let pending = storage.find(StoreKind::Pending, &Filter::all()).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].zip_file.as_deref(), Some(url));
        assert_eq!(pending[0].last_scanned, 0);
        assert_eq!(storage.count(StoreKind::Catalog, &Filter::all()).unwrap(), 0);
    }

    #[test]
    fn test_sub_records_and_relative_urls_stay() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let entry = CatalogEntry::FeedItem(FeedItemRecord::default());
        let mut item = UrlRecord::for_catalog("http://x/y", entry, NOW - DAY, NOW - 1);
        item.rss_feed = Some("http://a.org/news.rss".to_string());
        storage.insert(StoreKind::Catalog, &item).unwrap();
        storage
            .insert(StoreKind::Catalog, &page("/local/page.html", NOW - DAY, NOW - 1))
            .unwrap();

        assert_eq!(age_catalog(&mut storage, NOW, 32).unwrap(), 0);
        assert_eq!(storage.count(StoreKind::Catalog, &Filter::all()).unwrap(), 2);
    }

    #[test]
    fn test_already_pending_url_is_only_dropped() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        storage
            .insert(StoreKind::Catalog, &page("http://a.org/x/../b.html", NOW - DAY, NOW - 1))
            .unwrap();
        let queued = UrlRecord::for_pending("http://a.org/b.html", &QueueHints::default(), NOW);
        storage.insert(StoreKind::Pending, &queued).unwrap();

        assert_eq!(age_catalog(&mut storage, NOW, 32).unwrap(), 1);
        assert_eq!(storage.count(StoreKind::Catalog, &Filter::all()).unwrap(), 0);
        assert_eq!(storage.count(StoreKind::Pending, &Filter::all()).unwrap(), 1);
    }

    #[test]
    fn test_batch_limit() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        for i in 0..40 {
            storage
                .insert(
                    StoreKind::Catalog,
                    &page(&format!("http://a.org/{}.html", i), NOW - DAY, NOW - 1),
                )
                .unwrap();
        }

        assert_eq!(age_catalog(&mut storage, NOW, 32).unwrap(), 32);
        assert_eq!(storage.count(StoreKind::Catalog, &Filter::all()).unwrap(), 8);
        assert_eq!(age_catalog(&mut storage, NOW, 32).unwrap(), 8);
    }

    #[test]
    fn test_aging_is_idempotent() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        storage
            .insert(StoreKind::Catalog, &page("http://a.org/due.html", NOW - DAY, NOW - 1))
            .unwrap();
        storage
            .insert(StoreKind::Catalog, &page("http://a.org/fresh.html", NOW - DAY, NOW + DAY))
            .unwrap();

        age_catalog(&mut storage, NOW, 32).unwrap();
        let once = snapshot(&storage);
        assert_eq!(age_catalog(&mut storage, NOW, 32).unwrap(), 0);
        assert_eq!(snapshot(&storage), once);

        // Every URL is still in exactly one store
        for url in ["http://a.org/due.html", "http://a.org/fresh.html"] {
            let holders = once
                .iter()
                .filter(|(_, urls)| urls.iter().any(|u| u == url))
                .count();
            assert_eq!(holders, 1);
        }
    }
}
