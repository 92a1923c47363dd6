use crate::state::{StoreKind, UrlRecord};
use crate::storage::{Filter, Storage, StorageResult, TagMatch};
use std::collections::BTreeMap;

fn numeric_version(record: &UrlRecord) -> Option<f64> {
    record.application_version()?.trim().parse::<f64>().ok()
}

/// Links older versions of each application directory to the newest one
///
/// Catalog records sharing a directory are compared by numeric version. The
/// highest (lowest id on a tie) is the current release and every other
/// parseable version gets `superseded_by` pointing at it. Versions that do not
/// parse as numbers are left alone. Returns the number of records changed.
pub fn identify_superseded<S: Storage + ?Sized>(storage: &mut S) -> StorageResult<usize> {
    let filter = Filter::all()
        .directory(TagMatch::Present)
        .application_version(TagMatch::Present);

    let mut groups: BTreeMap<String, Vec<(f64, UrlRecord)>> = BTreeMap::new();
    for record in storage.find(StoreKind::Catalog, &filter)? {
        let (Some(directory), Some(version)) = (record.directory(), numeric_version(&record)) else {
            continue;
        };
        groups
            .entry(directory.to_string())
            .or_default()
            .push((version, record));
    }

    let mut changed = 0;
    for (directory, mut versions) in groups {
        if versions.len() < 2 {
            continue;
        }
        // Highest version first; ids ascend within equal versions
        versions.sort_by(|(a, ra), (b, rb)| b.total_cmp(a).then(ra.id.cmp(&rb.id)));

        let Some(newest) = versions[0].1.id else {
            continue;
        };
        for (index, (_, mut record)) in versions.into_iter().enumerate() {
            let target = if index == 0 { None } else { Some(newest) };
            if record.superseded_by != target {
                record.superseded_by = target;
                storage.update(StoreKind::Catalog, &record)?;
                changed += 1;
            }
        }
        tracing::debug!("{} current release is record {}", directory, newest);
    }

    if changed > 0 {
        tracing::info!("Updated supersession links on {} records", changed);
    }
    Ok(changed)
}

/// Clears `superseded_by` links whose target record is gone
pub fn unlink_superseded<S: Storage + ?Sized>(storage: &mut S) -> StorageResult<usize> {
    let mut unlinked = 0;
    for mut record in storage.find(StoreKind::Catalog, &Filter::all().superseded(true))? {
        let Some(target) = record.superseded_by else {
            continue;
        };
        if storage.count(StoreKind::Catalog, &Filter::by_id(target))? == 0 {
            record.superseded_by = None;
            storage.update(StoreKind::Catalog, &record)?;
            unlinked += 1;
        }
    }
    Ok(unlinked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ApplicationRecord, CatalogEntry};
    use crate::storage::SqliteStorage;

    const NOW: i64 = 1_300_000_000;

    fn release(storage: &mut SqliteStorage, url: &str, directory: &str, version: &str) -> i64 {
        let mut app = ApplicationRecord::for_directory(directory);
        app.version = Some(version.to_string());
        let record = UrlRecord::for_catalog(url, CatalogEntry::Application(app), NOW, NOW);
        storage.insert(StoreKind::Catalog, &record).unwrap()
    }

    fn superseded_by(storage: &SqliteStorage, id: i64) -> Option<i64> {
        storage
            .find_one(StoreKind::Catalog, &Filter::by_id(id))
            .unwrap()
            .unwrap()
            .superseded_by
    }

    #[test]
    fn test_older_versions_point_at_newest() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let old = release(&mut storage, "http://a.org/edit100.zip", "!Edit", "1.00");
        let newest = release(&mut storage, "http://a.org/edit120.zip", "!Edit", "1.20");
        let middle = release(&mut storage, "http://b.org/edit.zip", "!Edit", "1.10");
        let other = release(&mut storage, "http://a.org/draw.zip", "!Draw", "0.50");

        assert_eq!(identify_superseded(&mut storage).unwrap(), 2);
        assert_eq!(superseded_by(&storage, old), Some(newest));
        assert_eq!(superseded_by(&storage, middle), Some(newest));
        assert_eq!(superseded_by(&storage, newest), None);
        assert_eq!(superseded_by(&storage, other), None);

        assert_eq!(identify_superseded(&mut storage).unwrap(), 0);
    }

    #[test]
    fn test_tie_keeps_lowest_id() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let first = release(&mut storage, "http://a.org/edit.zip", "!Edit", "1.20");
        let mirror = release(&mut storage, "http://mirror.org/edit.zip", "!Edit", "1.2");

        assert_eq!(identify_superseded(&mut storage).unwrap(), 1);
        assert_eq!(superseded_by(&storage, mirror), Some(first));
        assert_eq!(superseded_by(&storage, first), None);
    }

    #[test]
    fn test_unparseable_versions_are_ignored() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let beta = release(&mut storage, "http://a.org/beta.zip", "!Edit", "2.00 beta");
        release(&mut storage, "http://a.org/edit.zip", "!Edit", "1.20");

        assert_eq!(identify_superseded(&mut storage).unwrap(), 0);
        assert_eq!(superseded_by(&storage, beta), None);
    }

    #[test]
    fn test_dangling_links_are_cleared() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let old = release(&mut storage, "http://a.org/edit100.zip", "!Edit", "1.00");
        let newest = release(&mut storage, "http://a.org/edit120.zip", "!Edit", "1.20");
        identify_superseded(&mut storage).unwrap();

        assert_eq!(unlink_superseded(&mut storage).unwrap(), 0);
        storage
            .remove(StoreKind::Catalog, &Filter::by_id(newest))
            .unwrap();
        assert_eq!(unlink_superseded(&mut storage).unwrap(), 1);
        assert_eq!(superseded_by(&storage, old), None);
    }
}
