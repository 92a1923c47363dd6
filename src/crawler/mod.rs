//! Crawler module for fetching and processing URLs
//!
//! This module contains the core crawling logic, including:
//! - HTTP and anonymous FTP fetching with outcome classification
//! - HTML parsing and link extraction
//! - Frontier selection over the pending store
//! - Lifecycle moves between the four stores
//! - Overall crawl coordination

mod coordinator;
mod fetcher;
mod ftp;
pub mod frontier;
pub mod lifecycle;
mod parser;

pub use coordinator::Spider;
pub use fetcher::{build_http_client, fetch_url, user_agent_string, FetchResult};
pub use frontier::{Frontier, Selection, Tier};
pub use lifecycle::{Enqueued, FailureOutcome, RejectReason, StepOutcome};
pub use parser::{extract_links, parse_html, ParsedPage};
