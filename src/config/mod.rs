//! Configuration module for the spider
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use riscos_spider::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("spider.toml")).unwrap();
//! println!("Fetch timeout: {}s", config.crawler.fetch_timeout_secs);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, OutputConfig, RuleEntry, SyncConfig, TopicalConfig, UserAgentConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};

/// Minimal valid configuration shared by unit tests
#[cfg(test)]
pub(crate) fn test_config() -> Config {
    parse_config(
        r#"
[crawler]
seeds = ["http://www.riscosopen.org/"]

[user-agent]
crawler-name = "TestSpider"
crawler-version = "1.0"
contact-url = "http://www.example.org/spider"
contact-email = "spider@example.org"

[output]
database-path = "./test.db"

[[blacklist]]
rule = "edit.yahoo.com"

[[suspend]]
rule = "*.pgpartner.com"
"#,
    )
    .expect("test config is valid")
}
