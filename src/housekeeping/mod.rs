//! Housekeeping: periodic maintenance of the four stores
//!
//! Sixteen fixed tasks repair, deduplicate and rebalance the stores. Each pass
//! picks one slot at random and runs it only if it has not run within the last
//! day; the [`TaskScheduleState`] recording that is passed in and returned.

mod aging;
mod supersession;
mod tasks;

pub use aging::age_catalog;
pub use supersession::{identify_superseded, unlink_superseded};

use crate::config::{Config, CrawlerConfig};
use crate::state::{TaskScheduleState, TASK_COUNT};
use crate::storage::Storage;
use crate::SpiderError;
use rand::Rng;
use reqwest::Client;
use std::fmt;
use std::sync::Mutex;

/// The housekeeping tasks, by slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    BatchFeedIn,
    RepairPending,
    RepairCatalog,
    LivingArchivePending,
    LivingArchiveCatalog,
    ForgetRejects,
    AgeCatalog,
    SoftwareUrgency,
    PurgeInvalidFiletypes,
    DedupCatalog,
    DedupPending,
    PruneSnapshots,
    IdentifySuperseded,
    UnlinkSuperseded,
    SynchroniseMirrors,
    TagPending,
}

impl Task {
    const ALL: [Task; TASK_COUNT] = [
        Task::BatchFeedIn,
        Task::RepairPending,
        Task::RepairCatalog,
        Task::LivingArchivePending,
        Task::LivingArchiveCatalog,
        Task::ForgetRejects,
        Task::AgeCatalog,
        Task::SoftwareUrgency,
        Task::PurgeInvalidFiletypes,
        Task::DedupCatalog,
        Task::DedupPending,
        Task::PruneSnapshots,
        Task::IdentifySuperseded,
        Task::UnlinkSuperseded,
        Task::SynchroniseMirrors,
        Task::TagPending,
    ];

    pub fn from_slot(slot: usize) -> Option<Self> {
        Self::ALL.get(slot).copied()
    }

    pub fn slot(&self) -> usize {
        *self as usize
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::BatchFeedIn => "batch feed-in",
            Self::RepairPending => "repair pending",
            Self::RepairCatalog => "repair catalog",
            Self::LivingArchivePending => "living archive cleanup (pending)",
            Self::LivingArchiveCatalog => "living archive cleanup (catalog)",
            Self::ForgetRejects => "forget old rejects",
            Self::AgeCatalog => "aging sweep",
            Self::SoftwareUrgency => "software urgency",
            Self::PurgeInvalidFiletypes => "purge invalid filetypes",
            Self::DedupCatalog => "dedup catalog",
            Self::DedupPending => "dedup pending",
            Self::PruneSnapshots => "prune archive snapshots",
            Self::IdentifySuperseded => "identify superseded applications",
            Self::UnlinkSuperseded => "unlink superseded applications",
            Self::SynchroniseMirrors => "synchronise mirrors",
            Self::TagPending => "tag pending archives and manifests",
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.slot(), self.name())
    }
}

/// What a housekeeping pass did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskReport {
    pub task: Task,
    /// Records changed, or mirrors that answered
    pub affected: usize,
}

/// Everything a housekeeping pass may touch
pub struct HousekeepingContext<'a, S> {
    pub storage: &'a Mutex<S>,
    pub config: &'a Config,
    pub client: &'a Client,
}

/// True when `hour` (local time) is inside the housekeeping window
pub fn within_hours(crawler: &CrawlerConfig, hour: u32) -> bool {
    crawler.housekeeping_start_hour <= hour && hour < crawler.housekeeping_end_hour
}

/// Draws a random slot and returns its task if it is due
pub fn pick_due_task<R: Rng + ?Sized>(
    state: &TaskScheduleState,
    rng: &mut R,
    now: i64,
) -> Option<Task> {
    let slot = rng.gen_range(0..TASK_COUNT);
    if state.is_due(slot, now) {
        Task::from_slot(slot)
    } else {
        None
    }
}

/// Runs one storage-only task and returns how many records it changed
///
/// [`Task::SynchroniseMirrors`] needs the network and is run by
/// [`run_housekeeping`]; here it does nothing.
pub fn run_task<S: Storage + ?Sized>(
    task: Task,
    storage: &mut S,
    config: &Config,
    now: i64,
) -> Result<usize, SpiderError> {
    let affected = match task {
        Task::BatchFeedIn => tasks::batch_feed_in(storage, config, now)?,
        Task::RepairPending => tasks::repair_pending(storage)?,
        Task::RepairCatalog => tasks::repair_catalog(storage)?,
        Task::LivingArchivePending => tasks::living_archive_pending(storage)?,
        Task::LivingArchiveCatalog => tasks::living_archive_catalog(storage)?,
        Task::ForgetRejects => tasks::forget_rejects(storage, now)?,
        Task::AgeCatalog => age_catalog(storage, now, config.crawler.aging_batch_limit)?,
        Task::SoftwareUrgency => tasks::software_urgency(storage)?,
        Task::PurgeInvalidFiletypes => tasks::purge_invalid_filetypes(storage, now)?,
        Task::DedupCatalog => tasks::dedup_catalog(storage)?,
        Task::DedupPending => tasks::dedup_pending(storage)?,
        Task::PruneSnapshots => tasks::prune_snapshots(storage)?,
        Task::IdentifySuperseded => identify_superseded(storage)?,
        Task::UnlinkSuperseded => unlink_superseded(storage)?,
        Task::SynchroniseMirrors => 0,
        Task::TagPending => tasks::tag_pending(storage)?,
    };
    Ok(affected)
}

/// Runs at most one due task and stamps it in the returned schedule
///
/// The storage lock is taken only around storage work, never across the
/// mirror requests.
pub async fn run_housekeeping<S, R>(
    state: TaskScheduleState,
    ctx: HousekeepingContext<'_, S>,
    rng: &mut R,
    now: i64,
) -> Result<(TaskScheduleState, Option<TaskReport>), SpiderError>
where
    S: Storage,
    R: Rng + ?Sized,
{
    let Some(task) = pick_due_task(&state, rng, now) else {
        return Ok((state, None));
    };
    tracing::info!("Housekeeping task {}", task);

    let affected = match task {
        Task::SynchroniseMirrors => {
            let counts = crate::sync::poll_mirrors(ctx.client, &ctx.config.sync.mirrors).await;
            counts.iter().filter(|mirror| mirror.count.is_some()).count()
        }
        _ => {
            let mut storage = ctx.storage.lock().map_err(|_| SpiderError::LockPoisoned)?;
            run_task(task, &mut *storage, ctx.config, now)?
        }
    };

    tracing::info!("Housekeeping task {} affected {}", task, affected);
    Ok((
        state.mark_ran(task.slot(), now),
        Some(TaskReport { task, affected }),
    ))
}
