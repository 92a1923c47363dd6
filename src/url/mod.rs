//! URL handling module
//!
//! This module provides URL normalisation, domain extraction, host rule matching
//! and the blacklist/suspension policy check.

mod domain;
mod matcher;
mod normalize;

use crate::config::Config;
use ::url::Url;

// Re-export main functions
pub use domain::{domain_of, extract_domain};
pub use matcher::{matches_rule, matches_wildcard};
pub use normalize::{
    has_feed_suffix, is_manifest_url, is_zip_url, normalise_url, parse_living_archive,
    strip_query_and_fragment, valid_hyperlink_filetype,
};

/// What the configured host rules say about a URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UrlPolicy {
    /// No rule applies
    Allowed,
    /// The domain is never crawled; queued entries are dropped
    Blacklisted,
    /// The domain is parked in the reserved store until the rule is lifted
    Suspended,
}

impl UrlPolicy {
    /// Returns true if the URL may be queued and fetched
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Classifies a URL against the blacklist and suspension rules
///
/// The blacklist takes priority over suspension. URLs without a host are
/// allowed here; they are rejected later as incomplete.
pub fn classify_url(url: &Url, config: &Config) -> UrlPolicy {
    matching_rule(url, config).map_or(UrlPolicy::Allowed, |(policy, _)| policy)
}

/// The first blacklist or suspension rule covering `url`, with its policy
pub fn matching_rule<'a>(url: &Url, config: &'a Config) -> Option<(UrlPolicy, &'a str)> {
    let domain = extract_domain(url)?;
    let path = url.path();

    let blacklisted = config
        .blacklist
        .iter()
        .find(|entry| matches_rule(&entry.rule, &domain, path));
    if let Some(entry) = blacklisted {
        return Some((UrlPolicy::Blacklisted, entry.rule.as_str()));
    }

    config
        .suspend
        .iter()
        .find(|entry| matches_rule(&entry.rule, &domain, path))
        .map(|entry| (UrlPolicy::Suspended, entry.rule.as_str()))
}

/// String form of [`classify_url`]; unparseable URLs are allowed
pub fn classify_url_str(url: &str, config: &Config) -> UrlPolicy {
    match Url::parse(url) {
        Ok(parsed) => classify_url(&parsed, config),
        Err(_) => UrlPolicy::Allowed,
    }
}
