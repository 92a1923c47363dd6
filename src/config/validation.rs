use crate::config::types::{Config, CrawlerConfig, RuleEntry, SyncConfig, UserAgentConfig};
use crate::ConfigError;
use std::net::IpAddr;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_sync_config(&config.sync)?;
    validate_rules("blacklist", &config.blacklist)?;
    validate_rules("suspend", &config.suspend)?;

    if config.topical.markers.iter().all(|m| m.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "topical markers cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.fetch_timeout_secs == 0 || config.connect_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "fetch and connect timeouts must be at least one second".to_string(),
        ));
    }

    if config.connectivity_window_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "connectivity_window_secs must be >= 1, got {}",
            config.connectivity_window_secs
        )));
    }

    if config.housekeeping_end_hour > 24
        || config.housekeeping_start_hour >= config.housekeeping_end_hour
    {
        return Err(ConfigError::Validation(format!(
            "housekeeping hours must satisfy start < end <= 24, got {}..{}",
            config.housekeeping_start_hour, config.housekeeping_end_hour
        )));
    }

    if config.aging_batch_limit < 1 || config.domain_spread_limit < 1 {
        return Err(ConfigError::Validation(
            "aging_batch_limit and domain_spread_limit must be >= 1".to_string(),
        ));
    }

    for seed in &config.seeds {
        let url = Url::parse(seed)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "Seed URL '{}' must use HTTP or HTTPS",
                seed
            )));
        }
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    // Used verbatim as the robots.txt product token
    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

fn validate_output_config(config: &crate::config::types::OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_sync_config(config: &SyncConfig) -> Result<(), ConfigError> {
    for peer in &config.allow {
        peer.parse::<IpAddr>().map_err(|_| {
            ConfigError::Validation(format!("sync allow entry '{}' is not an IP address", peer))
        })?;
    }

    for mirror in &config.mirrors {
        Url::parse(mirror)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid mirror '{}': {}", mirror, e)))?;
    }

    Ok(())
}

/// Validates blacklist or suspension rules
fn validate_rules(section: &str, rules: &[RuleEntry]) -> Result<(), ConfigError> {
    for entry in rules {
        let host = entry.rule.split('/').next().unwrap_or_default();
        validate_host_pattern(host)
            .map_err(|e| ConfigError::InvalidRule(format!("[{}] '{}': {}", section, entry.rule, e)))?;
    }
    Ok(())
}

/// Validates a host pattern (supports a leading `*.` wildcard)
fn validate_host_pattern(pattern: &str) -> Result<(), String> {
    let host = pattern.strip_prefix("*.").unwrap_or(pattern);

    if host.is_empty() {
        return Err("host cannot be empty".to_string());
    }

    if !host
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':')
    {
        return Err(format!("host '{}' contains invalid characters", host));
    }

    if host.starts_with('.') || host.ends_with('.') || host.starts_with('-') || host.ends_with('-')
    {
        return Err(format!("host '{}' cannot start or end with '.' or '-'", host));
    }

    if host.contains("..") {
        return Err(format!("host '{}' cannot contain consecutive dots", host));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    let invalid = || ConfigError::Validation(format!("Invalid email format: '{}'", email));

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') || !domain.contains('.') {
        return Err(invalid());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_host_pattern() {
        assert!(validate_host_pattern("edit.yahoo.com").is_ok());
        assert!(validate_host_pattern("*.yahoo.com").is_ok());
        assert!(validate_host_pattern("localhost:8080").is_ok());

        assert!(validate_host_pattern("").is_err());
        assert!(validate_host_pattern("*.").is_err());
        assert!(validate_host_pattern(".yahoo.com").is_err());
        assert!(validate_host_pattern("yahoo..com").is_err());
        assert!(validate_host_pattern("ya hoo.com").is_err());
    }

    #[test]
    fn test_validate_rules_with_path_prefix() {
        let rules = vec![RuleEntry {
            rule: "www.riscosopen.org/viewer/view/".to_string(),
        }];
        assert!(validate_rules("suspend", &rules).is_ok());

        let bad = vec![RuleEntry {
            rule: "/viewer/".to_string(),
        }];
        assert!(matches!(
            validate_rules("suspend", &bad),
            Err(ConfigError::InvalidRule(_))
        ));
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("spider@example.org").is_ok());
        assert!(validate_email("admin@sub.example.org").is_ok());

        assert!(validate_email("").is_err());
        assert!(validate_email("invalid").is_err());
        assert!(validate_email("@example.org").is_err());
        assert!(validate_email("user@").is_err());
        assert!(validate_email("user@domain").is_err());
        assert!(validate_email("a@b@c.org").is_err());
    }

    #[test]
    fn test_validate_sync_allow_list() {
        let config = SyncConfig {
            listen: None,
            allow: vec!["127.0.0.1".to_string(), "::1".to_string()],
            mirrors: vec![],
        };
        assert!(validate_sync_config(&config).is_ok());

        let config = SyncConfig {
            listen: None,
            allow: vec!["mirror.example.org".to_string()],
            mirrors: vec![],
        };
        assert!(validate_sync_config(&config).is_err());
    }
}
