//! Crawler coordinator - main crawl orchestration logic
//!
//! The [`Spider`] owns the storage handle, HTTP client, frontier and robots
//! cache. Each crawl step:
//! - selects a pending URL from the frontier
//! - checks the host rules and robots.txt
//! - fetches and classifies the resource
//! - applies the outcome to the stores and queues discovered links
//!
//! The storage mutex is never held across an `.await`.

use crate::catalog::{CatalogEntry, FeedChannelRecord, PageRecord};
use crate::config::Config;
use crate::crawler::frontier::{Frontier, Selection};
use crate::crawler::lifecycle::{
    self, Enqueued, FailureOutcome, Provenance, RejectReason, StepOutcome,
};
use crate::crawler::parser::{parse_html, ParsedPage};
use crate::crawler::{build_http_client, fetch_url, FetchResult};
use crate::extract::{
    classify, extract_applications, parse_feed, parse_manifest, ContentKind, ExtractionError,
};
use crate::housekeeping::{run_housekeeping, HousekeepingContext, TaskReport};
use crate::robots::RobotsCache;
use crate::state::{self, Connectivity, QueueHints, StoreKind, TaskScheduleState, UrlRecord};
use crate::state::{MONTH, YEAR};
use crate::storage::{open_storage, Filter, SqliteStorage, Storage};
use crate::url::{extract_domain, matching_rule, normalise_url, UrlPolicy};
use crate::SpiderError;
use rand::rngs::StdRng;
use rand::SeedableRng;
use reqwest::Client;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use url::Url;

/// A successful fetch, as handed to content dispatch
struct Fetched {
    final_url: String,
    content_type: Option<String>,
    last_modified: Option<i64>,
    body: Vec<u8>,
}

/// The crawler: storage, frontier and HTTP client
pub struct Spider {
    config: Arc<Config>,
    storage: Arc<Mutex<SqliteStorage>>,
    client: Client,
    frontier: Frontier,
    connectivity: Connectivity,
    robots: RobotsCache,
    schedule: TaskScheduleState,
    rng: StdRng,
}

impl Spider {
    /// Opens the configured database and builds the spider
    pub fn new(config: Config) -> Result<Self, SpiderError> {
        let storage = open_storage(Path::new(&config.output.database_path))?;
        Self::with_storage(config, storage)
    }

    /// Builds a spider over an already opened store
    pub fn with_storage(config: Config, storage: SqliteStorage) -> Result<Self, SpiderError> {
        let client = build_http_client(&config.user_agent, &config.crawler)?;
        let schedule = storage.load_task_schedule()?;

        Ok(Self {
            frontier: Frontier::new(config.crawler.domain_spread_limit),
            connectivity: Connectivity::new(config.crawler.connectivity_window_secs),
            config: Arc::new(config),
            storage: Arc::new(Mutex::new(storage)),
            client,
            robots: RobotsCache::new(),
            schedule,
            rng: StdRng::from_entropy(),
        })
    }

    /// Replaces the random source used for frontier and housekeeping choices
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Shared handle to the stores, for the synchronisation server
    pub fn storage(&self) -> Arc<Mutex<SqliteStorage>> {
        Arc::clone(&self.storage)
    }

    pub fn connectivity(&self) -> Connectivity {
        self.connectivity
    }

    fn lock(&self) -> Result<MutexGuard<'_, SqliteStorage>, SpiderError> {
        self.storage.lock().map_err(|_| SpiderError::LockPoisoned)
    }

    /// Queues the configured seeds plus `extra`; returns how many were new
    pub fn seed(&self, extra: &[String]) -> Result<usize, SpiderError> {
        let now = state::now();
        let mut storage = self.lock()?;
        let mut queued = 0;

        for url in self.config.crawler.seeds.iter().chain(extra) {
            match lifecycle::enqueue(&mut *storage, &self.config, url, &QueueHints::seed(), now)? {
                Enqueued::Queued(_) => queued += 1,
                Enqueued::Known(store) => tracing::debug!("Seed {} already in {}", url, store),
                other => tracing::warn!("Seed {} not queued: {:?}", url, other),
            }
        }

        tracing::info!("Queued {} seeds", queued);
        Ok(queued)
    }

    /// Record counts of every store
    pub fn stats(&self) -> Result<Vec<(StoreKind, u64)>, SpiderError> {
        let storage = self.lock()?;
        StoreKind::all()
            .into_iter()
            .map(|store| Ok((store, storage.count(store, &Filter::all())?)))
            .collect()
    }

    /// Runs one housekeeping pass and persists the task schedule
    pub async fn housekeep(&mut self) -> Result<Option<TaskReport>, SpiderError> {
        let now = state::now();
        let ctx = HousekeepingContext {
            storage: &*self.storage,
            config: &self.config,
            client: &self.client,
        };
        let (schedule, report) = run_housekeeping(self.schedule, ctx, &mut self.rng, now).await?;

        self.lock()?.save_task_schedule(&schedule)?;
        self.schedule = schedule;
        Ok(report)
    }

    /// Runs up to `steps` crawl steps, stopping early when nothing is pending
    pub async fn run_steps(&mut self, steps: usize) -> Result<Vec<StepOutcome>, SpiderError> {
        let mut outcomes = Vec::with_capacity(steps);
        for _ in 0..steps {
            let outcome = self.crawl_step().await?;
            let idle = outcome == StepOutcome::Idle;
            outcomes.push(outcome);
            if idle {
                break;
            }
        }
        Ok(outcomes)
    }

    /// Alternates housekeeping and crawl steps until the process is stopped
    pub async fn run_continuous(&mut self) -> Result<(), SpiderError> {
        let delay = Duration::from_millis(self.config.crawler.step_delay_ms);
        let mut steps: u64 = 0;

        loop {
            if crate::housekeeping::within_hours(&self.config.crawler, local_hour()) {
                match self.housekeep().await {
                    Ok(Some(report)) => tracing::info!(
                        "Housekeeping {} affected {} records",
                        report.task.name(),
                        report.affected
                    ),
                    Ok(None) => {}
                    Err(SpiderError::LockPoisoned) => return Err(SpiderError::LockPoisoned),
                    Err(e) => tracing::error!("Housekeeping failed: {}", e),
                }
            }

            match self.crawl_step().await {
                Ok(StepOutcome::Idle) => {
                    tracing::debug!("Nothing pending");
                    tokio::time::sleep(delay * 10).await;
                    continue;
                }
                Ok(outcome) => tracing::debug!("{:?}", outcome),
                Err(SpiderError::LockPoisoned) => return Err(SpiderError::LockPoisoned),
                Err(e) => tracing::error!("Crawl step failed: {}", e),
            }

            steps += 1;
            if steps % 100 == 0 {
                let counts = self.stats()?;
                tracing::info!("Progress: {} steps, stores {:?}", steps, counts);
            }
            tokio::time::sleep(delay).await;
        }
    }

    /// Selects, fetches and processes one pending URL
    pub async fn crawl_step(&mut self) -> Result<StepOutcome, SpiderError> {
        let now = state::now();

        let selection = {
            let storage = self.storage.lock().map_err(|_| SpiderError::LockPoisoned)?;
            self.frontier.select_next(&*storage, &mut self.rng, now)?
        };
        let Some(Selection { mut record, tier }) = selection else {
            return Ok(StepOutcome::Idle);
        };
        tracing::debug!("Processing {} ({} tier)", record.url, tier);

        // Entries queued before normalisation rules changed
        let normalised = normalise_url(&record.url);
        if normalised != record.url {
            let mut storage = self.lock()?;
            if lifecycle::locate(&*storage, &normalised)?.is_some() {
                if let Some(id) = record.id {
                    storage.remove(StoreKind::Pending, &Filter::by_id(id))?;
                }
                tracing::info!("Dropped {}: {} is already known", record.url, normalised);
                return Ok(StepOutcome::Dropped {
                    url: record.url,
                    removed: 1,
                });
            }
            record.url = normalised;
            record.domain = crate::url::domain_of(&record.url).unwrap_or_default();
            storage.update(StoreKind::Pending, &record)?;
        }

        let url = match Url::parse(&record.url) {
            Ok(url) if url.host_str().is_some() => url,
            Ok(_) => return self.invalid_url(&record, "missing host".to_string(), now),
            Err(e) => return self.invalid_url(&record, e.to_string(), now),
        };

        match matching_rule(&url, &self.config) {
            Some((UrlPolicy::Blacklisted, rule)) => {
                let domain = extract_domain(&url).unwrap_or_default();
                let removed = lifecycle::blacklist_domain(&mut *self.lock()?, &domain, rule)?;
                return Ok(StepOutcome::Dropped {
                    url: record.url,
                    removed,
                });
            }
            Some((UrlPolicy::Suspended, rule)) => {
                let domain = extract_domain(&url).unwrap_or_default();
                let moved = lifecycle::suspend_domain(&mut *self.lock()?, &domain, rule)?;
                return Ok(StepOutcome::Reserved {
                    url: record.url,
                    moved,
                });
            }
            _ => {}
        }

        let agent = self.config.user_agent.crawler_name.clone();
        if !self.robots.is_allowed(&self.client, &url, &agent, now).await {
            return self.reject(&record, RejectReason::RobotsDisallowed, now);
        }

        match fetch_url(&self.client, url.as_str()).await {
            FetchResult::Success {
                final_url,
                content_type,
                last_modified,
                body,
                ..
            } => {
                self.connectivity.record_success(now);
                let fetched = Fetched {
                    final_url,
                    content_type,
                    last_modified,
                    body,
                };
                self.dispatch(&record, fetched, now).await
            }
            FetchResult::Timeout { error } => {
                tracing::warn!("Timed out fetching {}: {}", record.url, error);
                Ok(StepOutcome::Transient {
                    url: record.url,
                    error,
                })
            }
            FetchResult::ConnectionFailure { error } => {
                tracing::warn!("Connection failure for {}: {}", record.url, error);
                let outcome = lifecycle::apply_connection_failure(
                    &mut *self.lock()?,
                    &record,
                    &self.connectivity,
                    now,
                )?;
                Ok(match outcome {
                    FailureOutcome::Spared => StepOutcome::Transient {
                        url: record.url,
                        error,
                    },
                    FailureOutcome::Struck(strikes) => StepOutcome::Struck {
                        url: record.url,
                        strikes,
                    },
                    FailureOutcome::Rejected => StepOutcome::Rejected {
                        url: record.url,
                        reason: RejectReason::ConnectionFailures {
                            strikes: record.strikes.saturating_add(1),
                        },
                    },
                })
            }
            FetchResult::ClientError { status } => {
                self.reject(&record, RejectReason::HttpStatus(status), now)
            }
            FetchResult::RedirectError { error } => {
                tracing::debug!("Redirect error for {}: {}", record.url, error);
                self.reject(&record, RejectReason::Redirect, now)
            }
            FetchResult::InvalidUrl { error } => self.invalid_url(&record, error, now),
        }
    }

    fn reject(
        &self,
        record: &UrlRecord,
        reason: RejectReason,
        now: i64,
    ) -> Result<StepOutcome, SpiderError> {
        lifecycle::reject(&mut *self.lock()?, record, &reason, now)?;
        Ok(StepOutcome::Rejected {
            url: record.url.clone(),
            reason,
        })
    }

    /// Unfetchable URLs are only rejected while the connection is known good
    fn invalid_url(
        &self,
        record: &UrlRecord,
        error: String,
        now: i64,
    ) -> Result<StepOutcome, SpiderError> {
        if record.seed || !self.connectivity.is_healthy(now) {
            tracing::warn!("Cannot fetch {}: {}", record.url, error);
            return Ok(StepOutcome::Transient {
                url: record.url.clone(),
                error,
            });
        }
        self.reject(record, RejectReason::InvalidUrl(error), now)
    }

    async fn dispatch(
        &mut self,
        record: &UrlRecord,
        fetched: Fetched,
        now: i64,
    ) -> Result<StepOutcome, SpiderError> {
        if fetched.body.is_empty() {
            return self.reject(record, RejectReason::EmptyBody, now);
        }

        let base = Url::parse(&fetched.final_url).or_else(|_| Url::parse(&record.url))?;
        let page = std::str::from_utf8(&fetched.body)
            .ok()
            .map(|text| parse_html(text, &base));
        if page.as_ref().is_some_and(|page| page.noindex) {
            return self.reject(record, RejectReason::NoIndex, now);
        }

        let kind = classify(
            &fetched.final_url,
            fetched.content_type.as_deref(),
            &fetched.body,
            &self.config.topical.markers,
        );
        tracing::debug!("{} classified as {}", record.url, kind.as_str());

        match kind {
            ContentKind::Archive => self.catalog_archive(record, &fetched.body, now),
            ContentKind::SparkArchive { legacy } => {
                let entry = if legacy {
                    CatalogEntry::ArcFile
                } else {
                    CatalogEntry::SparkFile
                };
                self.catalog_single(record, entry, now, now + YEAR)
            }
            ContentKind::Pdf => self.catalog_single(record, CatalogEntry::Pdf, now, now + YEAR),
            ContentKind::Manifest => {
                let text = String::from_utf8_lossy(&fetched.body);
                match parse_manifest(&text) {
                    Ok(report) => {
                        let records = report.items.len();
                        let queued = self.catalog_manifest(record, report.items, now)?;
                        Ok(StepOutcome::Catalogued {
                            url: record.url.clone(),
                            kind: "manifest",
                            records,
                            queued,
                        })
                    }
                    Err(e) => {
                        tracing::debug!("{}: {}", record.url, e);
                        self.reject(record, RejectReason::MalformedManifest, now)
                    }
                }
            }
            ContentKind::Feed => self.catalog_feed(record, &fetched.body, now),
            ContentKind::Page => {
                let page = page.unwrap_or_else(|| {
                    parse_html(&String::from_utf8_lossy(&fetched.body), &base)
                });
                self.catalog_page(record, page, fetched.last_modified, &base, now)
                    .await
            }
            ContentKind::Unclassified => self.reject(record, RejectReason::NotRelevant, now),
        }
    }

    fn catalog_single(
        &self,
        record: &UrlRecord,
        entry: CatalogEntry,
        now: i64,
        next_scan: i64,
    ) -> Result<StepOutcome, SpiderError> {
        let kind = entry.kind_name();
        lifecycle::move_to_catalog(&mut *self.lock()?, record, entry, now, next_scan)?;
        Ok(StepOutcome::Catalogued {
            url: record.url.clone(),
            kind,
            records: 1,
            queued: 0,
        })
    }

    fn catalog_archive(
        &self,
        record: &UrlRecord,
        body: &[u8],
        now: i64,
    ) -> Result<StepOutcome, SpiderError> {
        let report = match extract_applications(body) {
            Ok(report) => report,
            Err(ExtractionError::MalformedArchive(error)) => {
                tracing::warn!("Malformed archive {}: {}", record.url, error);
                return self.catalog_single(
                    record,
                    CatalogEntry::MalformedArchive { error },
                    now,
                    now + YEAR,
                );
            }
            Err(e) => return Err(e.into()),
        };

        for warning in &report.warnings {
            tracing::debug!("{}: {}", record.url, warning);
        }
        if report.items.is_empty() {
            return self.reject(record, RejectReason::NoApplications, now);
        }

        let records = lifecycle::catalog_applications(
            &mut *self.lock()?,
            record,
            report.items,
            now,
            now + YEAR,
        )?;
        Ok(StepOutcome::Catalogued {
            url: record.url.clone(),
            kind: "archive",
            records,
            queued: 0,
        })
    }

    /// Catalogs manifest records and queues the URLs they name
    fn catalog_manifest(
        &self,
        record: &UrlRecord,
        items: Vec<crate::catalog::ManifestRecord>,
        now: i64,
    ) -> Result<usize, SpiderError> {
        let links: Vec<String> = items
            .iter()
            .filter_map(|item| item.url())
            .map(normalise_url)
            .collect();
        let entries = items
            .into_iter()
            .map(|item| {
                (
                    item.url().map(normalise_url),
                    CatalogEntry::Manifest(item),
                )
            })
            .collect::<Vec<_>>();
        let owner = CatalogEntry::ManifestFile {
            records: entries.len(),
        };

        let mut storage = self.lock()?;
        lifecycle::catalog_document(
            &mut *storage,
            record,
            owner,
            Provenance::Manifest,
            entries,
            now,
            now + MONTH,
        )?;
        self.queue_links(&mut *storage, &links, &record.url, now)
    }

    fn catalog_feed(
        &self,
        record: &UrlRecord,
        body: &[u8],
        now: i64,
    ) -> Result<StepOutcome, SpiderError> {
        let document = match parse_feed(&String::from_utf8_lossy(body), now) {
            Ok(document) => document,
            Err(e) => {
                tracing::debug!("{}: {}", record.url, e);
                return self.reject(record, RejectReason::MalformedFeed, now);
            }
        };

        let mut links = Vec::new();
        let items = document
            .items
            .into_iter()
            .map(|item| {
                let link = item.rss_feed_item_link.as_deref().map(normalise_url);
                links.extend(link.clone());
                (link, CatalogEntry::FeedItem(item))
            })
            .collect::<Vec<_>>();
        let owner = CatalogEntry::FeedChannel(FeedChannelRecord {
            title: document.title,
            items: items.len(),
        });

        let mut storage = self.lock()?;
        let records = lifecycle::catalog_document(
            &mut *storage,
            record,
            owner,
            Provenance::Feed,
            items,
            now,
            now + MONTH,
        )?;
        let queued = self.queue_links(&mut *storage, &links, &record.url, now)?;
        Ok(StepOutcome::Catalogued {
            url: record.url.clone(),
            kind: "feed",
            records,
            queued,
        })
    }

    async fn catalog_page(
        &mut self,
        record: &UrlRecord,
        page: ParsedPage,
        last_modified: Option<i64>,
        base: &Url,
        now: i64,
    ) -> Result<StepOutcome, SpiderError> {
        let entry = CatalogEntry::Page(PageRecord {
            title: page.title.clone(),
            last_modified,
        });

        let queued = {
            let mut storage = self.lock()?;
            lifecycle::move_to_catalog(&mut *storage, record, entry, now, now + YEAR)?;
            if page.nofollow {
                tracing::debug!("{} asks not to follow its href links", record.url);
            }
            self.queue_links(&mut *storage, page.followable_links(), &record.url, now)?
        };

        let probed = self.probe_manifests(base, &record.url, now).await?;
        if probed > 0 {
            tracing::info!("Found {} manifests near {}", probed, record.url);
        }

        Ok(StepOutcome::Catalogued {
            url: record.url.clone(),
            kind: "page",
            records: 1,
            queued,
        })
    }

    /// Queues links found on `parent`
    fn queue_links<S: Storage + ?Sized>(
        &self,
        storage: &mut S,
        links: &[String],
        parent: &str,
        now: i64,
    ) -> Result<usize, SpiderError> {
        let hints = QueueHints::from_parent(parent);
        let mut queued = 0;

        for link in links {
            if let Enqueued::Queued(_) =
                lifecycle::enqueue(storage, &self.config, link, &hints, now)?
            {
                queued += 1;
            }
        }
        Ok(queued)
    }

    /// Looks for `riscos.xml` at the site root and beside the page
    ///
    /// Probed URLs never enter the pending store: a manifest that is found is
    /// catalogued directly, anything else is rejected so it is not probed again.
    async fn probe_manifests(
        &mut self,
        base: &Url,
        parent: &str,
        now: i64,
    ) -> Result<usize, SpiderError> {
        let mut candidates: Vec<String> = Vec::new();
        for path in ["/riscos.xml", "riscos.xml"] {
            if let Ok(candidate) = base.join(path) {
                let candidate = candidate.to_string();
                if !candidates.contains(&candidate) {
                    candidates.push(candidate);
                }
            }
        }

        let agent = self.config.user_agent.crawler_name.clone();
        let mut found = 0;
        for candidate in candidates {
            if lifecycle::locate(&*self.lock()?, &candidate)?.is_some() {
                continue;
            }
            let Ok(url) = Url::parse(&candidate) else {
                continue;
            };
            if !self.robots.is_allowed(&self.client, &url, &agent, now).await {
                continue;
            }

            let probe = UrlRecord::for_pending(&candidate, &QueueHints::from_parent(parent), now);
            let items = match fetch_url(&self.client, &candidate).await {
                FetchResult::Success { body, .. } => {
                    parse_manifest(&String::from_utf8_lossy(&body)).ok()
                }
                _ => None,
            };

            match items {
                Some(report) => {
                    self.catalog_manifest(&probe, report.items, now)?;
                    found += 1;
                }
                None => {
                    lifecycle::reject(
                        &mut *self.lock()?,
                        &probe,
                        &RejectReason::ManifestNotFound,
                        now,
                    )?;
                }
            }
        }
        Ok(found)
    }
}

fn local_hour() -> u32 {
    use chrono::Timelike;
    chrono::Local::now().hour()
}
