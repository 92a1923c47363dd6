/// Checks if a domain matches a wildcard pattern
///
/// `"example.com"` matches only itself; `"*.example.com"` matches the bare
/// domain and any subdomain of it.
///
/// # Examples
///
/// ```
/// use riscos_spider::url::matches_wildcard;
///
/// assert!(matches_wildcard("example.com", "example.com"));
/// assert!(matches_wildcard("*.example.com", "shop.example.com"));
/// assert!(!matches_wildcard("*.example.com", "example.org"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    if let Some(base) = pattern.strip_prefix("*.") {
        candidate == base || candidate.ends_with(&format!(".{}", base))
    } else {
        candidate == pattern
    }
}

/// Checks a blacklist/suspension rule against a URL's domain and path
///
/// A rule is a host pattern optionally followed by a path prefix, for example
/// `"www.riscosopen.org/viewer/view/"`. Without a path the whole domain matches.
pub fn matches_rule(rule: &str, domain: &str, path: &str) -> bool {
    let (host, prefix) = match rule.find('/') {
        Some(idx) => (&rule[..idx], Some(&rule[idx..])),
        None => (rule, None),
    };

    if !matches_wildcard(&host.to_lowercase(), domain) {
        return false;
    }

    match prefix {
        Some(prefix) => path.starts_with(prefix),
        None => true,
    }
}
