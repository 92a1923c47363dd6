use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration from TOML text
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged at startup so a change of configuration between runs is visible.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    const MINIMAL: &str = r#"
[crawler]
seeds = ["http://www.riscosopen.org/"]

[user-agent]
crawler-name = "RiscOsSpider"
crawler-version = "1.0"
contact-url = "http://www.example.org/spider"
contact-email = "spider@example.org"

[output]
database-path = "./riscos.db"
"#;

    #[test]
    fn test_load_minimal_config_applies_defaults() {
        let file = create_temp_config(MINIMAL);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.crawler.seeds, vec!["http://www.riscosopen.org/"]);
        assert_eq!(config.crawler.fetch_timeout_secs, 30);
        assert_eq!(config.crawler.connectivity_window_secs, 60);
        assert_eq!(config.crawler.housekeeping_start_hour, 6);
        assert_eq!(config.crawler.housekeeping_end_hour, 22);
        assert_eq!(config.crawler.aging_batch_limit, 32);
        assert_eq!(config.crawler.domain_spread_limit, 32);
        assert!(config.crawler.batch_feed_path.is_none());
        assert!(config.topical.markers.iter().any(|m| m == "RISC OS"));
        assert!(config.sync.listen.is_none());
        assert!(config.blacklist.is_empty());
    }

    #[test]
    fn test_load_full_config() {
        let content = format!(
            "{}{}",
            MINIMAL,
            r#"
[sync]
listen = "127.0.0.1:8081"
allow = ["127.0.0.1"]
mirrors = ["http://mirror.example.org"]

[topical]
markers = ["Acorn"]

[[blacklist]]
rule = "edit.yahoo.com"

[[suspend]]
rule = "www.riscosopen.org/viewer/view/"
"#
        );
        let config = parse_config(&content).unwrap();

        assert_eq!(config.sync.allow, vec!["127.0.0.1"]);
        assert_eq!(config.topical.markers, vec!["Acorn"]);
        assert_eq!(config.blacklist[0].rule, "edit.yahoo.com");
        assert_eq!(config.suspend[0].rule, "www.riscosopen.org/viewer/view/");
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/spider.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        assert!(matches!(
            load_config(file.path()).unwrap_err(),
            ConfigError::Parse(_)
        ));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let content = MINIMAL.replace(
            "[user-agent]",
            "housekeeping-start-hour = 23\nhousekeeping-end-hour = 2\n\n[user-agent]",
        );
        let result = parse_config(&content);
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }

    #[test]
    fn test_compute_config_hash() {
        let file = create_temp_config("test content");

        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_different_content_different_hash() {
        let file1 = create_temp_config("content 1");
        let file2 = create_temp_config("content 2");

        assert_ne!(
            compute_config_hash(file1.path()).unwrap(),
            compute_config_hash(file2.path()).unwrap()
        );
    }
}
