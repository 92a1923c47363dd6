//! State module for the URL lifecycle
//!
//! # Components
//!
//! - `StoreKind`: the four lifecycle stores (pending, catalog, rejected, reserved)
//! - `UrlRecord`: a URL with its scheduling attributes
//! - `Connectivity`: watermark of the last successful fetch
//! - `TaskScheduleState`: when each housekeeping task last ran

mod connectivity;
mod store_kind;
mod task_schedule;
mod url_record;

// Re-export main types
pub use connectivity::Connectivity;
pub use store_kind::StoreKind;
pub use task_schedule::{TaskScheduleState, TASK_COUNT};
pub use url_record::{QueueHints, UrlRecord};

/// Scheduling periods in seconds
pub const DAY: i64 = 86_400;
pub const WEEK: i64 = 604_800;
pub const MONTH: i64 = 2_419_200;
pub const YEAR: i64 = 31_536_000;

/// Current time as epoch seconds
pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}
