use url::Url;

/// Extracts the authority used to group URLs by site
///
/// The host is lowercased; a non-default port is kept so that two services on one
/// host are treated as different sites.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use riscos_spider::url::extract_domain;
///
/// let url = Url::parse("http://WWW.RISCOSOPEN.ORG/forum").unwrap();
/// assert_eq!(extract_domain(&url), Some("www.riscosopen.org".to_string()));
///
/// let url = Url::parse("http://127.0.0.1:8080/").unwrap();
/// assert_eq!(extract_domain(&url), Some("127.0.0.1:8080".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    match url.port() {
        Some(port) => Some(format!("{}:{}", host, port)),
        None => Some(host),
    }
}

/// Parses `url` and extracts its domain, returning `None` for unparseable input
pub fn domain_of(url: &str) -> Option<String> {
    Url::parse(url).ok().as_ref().and_then(extract_domain)
}
