use serde::Deserialize;

/// Main configuration structure for the spider
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub topical: TopicalConfig,
    #[serde(default)]
    pub blacklist: Vec<RuleEntry>,
    #[serde(default)]
    pub suspend: Vec<RuleEntry>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// URLs that are queued on start and never penalised for failures
    #[serde(default)]
    pub seeds: Vec<String>,

    /// Whole-request timeout for every fetch (seconds)
    #[serde(rename = "fetch-timeout-secs", default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    /// TCP connect timeout (seconds)
    #[serde(rename = "connect-timeout-secs", default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// How recent the last successful fetch must be for connectivity to count as healthy
    #[serde(
        rename = "connectivity-window-secs",
        default = "default_connectivity_window"
    )]
    pub connectivity_window_secs: i64,

    /// First local hour in which housekeeping may run
    #[serde(
        rename = "housekeeping-start-hour",
        default = "default_housekeeping_start"
    )]
    pub housekeeping_start_hour: u32,

    /// Local hour at which housekeeping stops
    #[serde(rename = "housekeeping-end-hour", default = "default_housekeeping_end")]
    pub housekeeping_end_hour: u32,

    /// Maximum catalog entries handled per aging sweep
    #[serde(rename = "aging-batch-limit", default = "default_aging_limit")]
    pub aging_batch_limit: usize,

    /// Domains with this many pending entries or more are skipped by the domain-spread tier
    #[serde(rename = "domain-spread-limit", default = "default_spread_limit")]
    pub domain_spread_limit: u64,

    /// Pause between crawl steps in continuous mode (milliseconds)
    #[serde(rename = "step-delay-ms", default = "default_step_delay")]
    pub step_delay_ms: u64,

    /// Optional text file of URLs (one per line) fed into the frontier by housekeeping
    #[serde(rename = "batch-feed-path", default)]
    pub batch_feed_path: Option<String>,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler, also the robots.txt product token
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    #[serde(rename = "contact-url")]
    pub contact_url: String,

    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// Mirror synchronisation settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncConfig {
    /// Address the synchronisation endpoint binds to, e.g. "0.0.0.0:8081"
    #[serde(default)]
    pub listen: Option<String>,

    /// Peer addresses allowed to query the endpoint
    #[serde(default)]
    pub allow: Vec<String>,

    /// Base URLs of mirrors polled by the synchronise housekeeping task
    #[serde(default)]
    pub mirrors: Vec<String>,
}

/// Substrings that mark a page as relevant
#[derive(Debug, Clone, Deserialize)]
pub struct TopicalConfig {
    #[serde(default = "default_markers")]
    pub markers: Vec<String>,
}

impl Default for TopicalConfig {
    fn default() -> Self {
        Self {
            markers: default_markers(),
        }
    }
}

/// A blacklist or suspension rule: a host pattern with an optional path prefix
///
/// `"example.com"`, `"*.example.com"` and `"example.com/viewer/"` are all valid.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleEntry {
    pub rule: String,
}

fn default_fetch_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_connectivity_window() -> i64 {
    60
}

fn default_housekeeping_start() -> u32 {
    6
}

fn default_housekeeping_end() -> u32 {
    22
}

fn default_aging_limit() -> usize {
    32
}

fn default_spread_limit() -> u64 {
    32
}

fn default_step_delay() -> u64 {
    1000
}

pub(crate) fn default_markers() -> Vec<String> {
    [
        "RISC OS",
        "RISC&nbsp;OS",
        "RISC-OS",
        "RISCOS",
        "RiscOS",
        "risc os",
        "risc-os",
        "riscos",
        "Archimedes",
        "RiscPC",
        "Qercus",
        "Iyonix",
        "Risc PC",
        "Acorn Computer",
        "riscpkg",
    ]
    .iter()
    .map(|m| m.to_string())
    .collect()
}
