use regex::Regex;
use std::sync::LazyLock;

/// A single `/segment/..` pair; the segment may not contain a dot
static PARENT_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/[^/.]+/\.\.").expect("valid parent segment regex"));

static LIVING_ARCHIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://web\.archive\.org/web/(\d+)[a-z_]*/(.+)$")
        .expect("valid living archive regex")
});

/// Path suffixes that never lead to catalogable content
const NON_CONTENT_EXTENSIONS: &[&str] = &[
    ".css", ".gif", ".dll", ".dtd", ".js", ".jpeg", ".jpg", ".ico", ".png", ".src",
];

/// Normalises a stored URL by collapsing `/segment/..` pairs
///
/// Only the traversal segments are touched; scheme, host, query and trailing
/// slashes are left exactly as found so that the string still matches what other
/// stores hold.
///
/// # Examples
///
/// ```
/// use riscos_spider::url::normalise_url;
///
/// assert_eq!(
///     normalise_url("http://example.org/a/b/../../c.html"),
///     "http://example.org/c.html"
/// );
/// ```
pub fn normalise_url(url: &str) -> String {
    let mut current = url.to_string();
    while current.contains("/..") {
        let Some(found) = PARENT_SEGMENT.find(&current) else {
            break;
        };
        current.replace_range(found.range(), "");
    }
    current
}

/// Drops any query string and fragment
pub fn strip_query_and_fragment(url: &str) -> &str {
    match url.find(['?', '#']) {
        Some(idx) => &url[..idx],
        None => url,
    }
}

/// Returns false for `mailto:` links and paths ending in a non-content extension
pub fn valid_hyperlink_filetype(url: &str) -> bool {
    let lower = url.to_lowercase();
    if lower.starts_with("mailto:") {
        return false;
    }

    let path = strip_query_and_fragment(&lower);
    let path = match path.find("://") {
        Some(idx) => path[idx + 3..].find('/').map_or("", |p| &path[idx + 3 + p..]),
        None => path,
    };

    !NON_CONTENT_EXTENSIONS
        .iter()
        .any(|extension| path.ends_with(extension))
}

/// True when the URL points at a ZIP archive
pub fn is_zip_url(url: &str) -> bool {
    let lower = url.to_lowercase();
    lower.ends_with(".zip") || lower.contains(".zip?")
}

/// True when the URL names a `riscos.xml` manifest
pub fn is_manifest_url(url: &str) -> bool {
    url.to_lowercase().ends_with("/riscos.xml")
}

/// True when the URL carries an RSS or XML suffix
pub fn has_feed_suffix(url: &str) -> bool {
    let lower = url.to_lowercase();
    lower.ends_with(".rss") || lower.ends_with(".xml")
}

/// Splits a `web.archive.org` snapshot URL into its timestamp and original URL
///
/// # Examples
///
/// ```
/// use riscos_spider::url::parse_living_archive;
///
/// let (stamp, original) =
///     parse_living_archive("http://web.archive.org/web/20040101000000/http://www.acorn.com/").unwrap();
/// assert_eq!(stamp, 20040101000000);
/// assert_eq!(original, "http://www.acorn.com/");
/// ```
pub fn parse_living_archive(url: &str) -> Option<(u64, &str)> {
    let captures = LIVING_ARCHIVE.captures(url)?;
    let stamp = captures.get(1)?.as_str().parse().ok()?;
    let original = captures.get(2)?.as_str();
    Some((stamp, original))
}
