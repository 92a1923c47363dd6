//! Frontier selection over the pending store
//!
//! The next URL is drawn from the first non-empty tier, uniformly at random
//! among that tier's members:
//!
//! 1. ZIP archives never fetched
//! 2. Anything never fetched
//! 3. Manifests
//! 4. Feeds
//! 5. URLs ending `.rss` or `.xml`
//! 6. FTP URLs
//! 7. Entries whose rescan time has passed
//! 8. The least-populated domain below the spread limit
//! 9. Anything pending

use crate::state::{StoreKind, UrlRecord};
use crate::storage::{Cmp, Field, Filter, Storage, StorageResult, TagMatch};
use rand::seq::SliceRandom;
use rand::Rng;
use std::fmt;

/// The selection tier that produced a URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Tier {
    NewArchive,
    NeverFetched,
    Manifest,
    Feed,
    FeedSuffix,
    Ftp,
    Due,
    DomainSpread,
    Any,
}

impl Tier {
    /// Tiers in precedence order
    pub const ALL: [Tier; 9] = [
        Tier::NewArchive,
        Tier::NeverFetched,
        Tier::Manifest,
        Tier::Feed,
        Tier::FeedSuffix,
        Tier::Ftp,
        Tier::Due,
        Tier::DomainSpread,
        Tier::Any,
    ];
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NewArchive => "new archive",
            Self::NeverFetched => "never fetched",
            Self::Manifest => "manifest",
            Self::Feed => "feed",
            Self::FeedSuffix => "feed suffix",
            Self::Ftp => "ftp",
            Self::Due => "due",
            Self::DomainSpread => "domain spread",
            Self::Any => "any",
        };
        write!(f, "{}", name)
    }
}

/// A pending record chosen for fetching
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub record: UrlRecord,
    pub tier: Tier,
}

/// Chooses the next pending URL
#[derive(Debug, Clone)]
pub struct Frontier {
    domain_spread_limit: u64,
}

impl Frontier {
    /// Creates a frontier; domains holding `domain_spread_limit` entries or more
    /// are skipped by the domain-spread tier
    pub fn new(domain_spread_limit: u64) -> Self {
        Self {
            domain_spread_limit,
        }
    }

    /// Selects the next URL, or `None` when nothing is pending
    pub fn select_next<S, R>(
        &self,
        storage: &S,
        rng: &mut R,
        now: i64,
    ) -> StorageResult<Option<Selection>>
    where
        S: Storage + ?Sized,
        R: Rng + ?Sized,
    {
        for tier in Tier::ALL {
            let candidates = self.members(storage, rng, tier, now)?;
            if let Some(record) = candidates.choose(rng) {
                tracing::debug!(
                    "Selected {} from {} tier ({} candidates)",
                    record.url,
                    tier,
                    candidates.len()
                );
                return Ok(Some(Selection {
                    record: record.clone(),
                    tier,
                }));
            }
        }
        Ok(None)
    }

    fn members<S, R>(
        &self,
        storage: &S,
        rng: &mut R,
        tier: Tier,
        now: i64,
    ) -> StorageResult<Vec<UrlRecord>>
    where
        S: Storage + ?Sized,
        R: Rng + ?Sized,
    {
        let filter = match tier {
            Tier::NewArchive => Filter::all()
                .zip_file(TagMatch::Present)
                .last_scanned(Cmp::Eq(0)),
            Tier::NeverFetched => Filter::all().last_scanned(Cmp::Eq(0)),
            Tier::Manifest => Filter::all().riscos_xml(TagMatch::Present),
            Tier::Feed => Filter::all().rss_feed(TagMatch::Present),
            Tier::FeedSuffix => Filter::all().url_suffixes(&[".rss", ".xml"]),
            Tier::Ftp => Filter::all().url_prefix("ftp://"),
            Tier::Due => Filter::all().next_scan(Cmp::Le(now)),
            Tier::DomainSpread => match self.sparsest_domain(storage, rng)? {
                Some(domain) => Filter::by_domain(&domain),
                None => return Ok(Vec::new()),
            },
            Tier::Any => Filter::all(),
        };
        storage.find(StoreKind::Pending, &filter)
    }

    /// The domain with the fewest pending entries among those under the limit;
    /// ties are broken at random
    fn sparsest_domain<S, R>(&self, storage: &S, rng: &mut R) -> StorageResult<Option<String>>
    where
        S: Storage + ?Sized,
        R: Rng + ?Sized,
    {
        let mut fewest = u64::MAX;
        let mut sparsest: Vec<String> = Vec::new();
        for domain in storage.distinct(StoreKind::Pending, Field::Domain, &Filter::all())? {
            if domain.is_empty() {
                continue;
            }
            let count = storage.count(StoreKind::Pending, &Filter::by_domain(&domain))?;
            if count >= self.domain_spread_limit || count > fewest {
                continue;
            }
            if count < fewest {
                fewest = count;
                sparsest.clear();
            }
            sparsest.push(domain);
        }
        Ok(sparsest.choose(rng).cloned())
    }
}
