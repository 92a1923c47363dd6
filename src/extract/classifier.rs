//! Content classification
//!
//! Decides from the URL, the `Content-Type` header and the body what kind of
//! resource a successful fetch returned. URL suffixes win over the header, the
//! header wins over body sniffing.

use crate::url::{has_feed_suffix, is_manifest_url, is_zip_url, strip_query_and_fragment};
use regex::Regex;
use std::sync::LazyLock;

static RSS_ENVELOPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<rss[\s>].*</rss>").expect("valid rss envelope regex"));

static ATOM_ENVELOPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<feed[\s>].*</feed>").expect("valid atom envelope regex"));

/// Kind of a fetched resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    /// ZIP archive
    Archive,
    /// Spark archive; `legacy` for the older `.arc` format
    SparkArchive { legacy: bool },
    Pdf,
    /// `riscos.xml`
    Manifest,
    /// RSS or Atom
    Feed,
    /// HTML page carrying a topical marker
    Page,
    /// Nothing of interest
    Unclassified,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Archive => "archive",
            Self::SparkArchive { legacy: true } => "arc archive",
            Self::SparkArchive { legacy: false } => "spark archive",
            Self::Pdf => "pdf",
            Self::Manifest => "manifest",
            Self::Feed => "feed",
            Self::Page => "page",
            Self::Unclassified => "unclassified",
        }
    }
}

/// Classifies a fetched resource
///
/// # Arguments
///
/// * `url` - The final URL of the fetch
/// * `content_type` - The `Content-Type` header, if any
/// * `body` - The raw response body
/// * `markers` - Substrings that make a page relevant
pub fn classify(
    url: &str,
    content_type: Option<&str>,
    body: &[u8],
    markers: &[String],
) -> ContentKind {
    let lower = url.to_lowercase();
    let path = strip_query_and_fragment(&lower);

    if path.ends_with(".arc") {
        return ContentKind::SparkArchive { legacy: true };
    }
    if path.ends_with(".spk") {
        return ContentKind::SparkArchive { legacy: false };
    }
    if path.ends_with(".pdf") {
        return ContentKind::Pdf;
    }
    if is_manifest_url(path) {
        return ContentKind::Manifest;
    }
    if has_feed_suffix(path) || path.ends_with(".atom") {
        return ContentKind::Feed;
    }
    let text = String::from_utf8_lossy(body);
    if RSS_ENVELOPE.is_match(&text) || ATOM_ENVELOPE.is_match(&text) {
        return ContentKind::Feed;
    }
    if is_zip_url(&lower) {
        return ContentKind::Archive;
    }

    let mime = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_lowercase())
        .unwrap_or_default();
    match mime.as_str() {
        "application/zip" | "application/x-zip-compressed" => return ContentKind::Archive,
        "application/pdf" => return ContentKind::Pdf,
        "application/rss+xml" | "application/atom+xml" => return ContentKind::Feed,
        _ => {}
    }

    if markers.iter().any(|marker| text.contains(marker.as_str())) {
        return ContentKind::Page;
    }
    ContentKind::Unclassified
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TopicalConfig;

    fn markers() -> Vec<String> {
        TopicalConfig::default().markers
    }

    fn kind(url: &str, body: &str) -> ContentKind {
        classify(url, None, body.as_bytes(), &markers())
    }

    #[test]
    fn test_suffix_order() {
        assert_eq!(kind("http://a.org/x.arc", ""), ContentKind::SparkArchive { legacy: true });
        assert_eq!(kind("http://a.org/x.SPK", ""), ContentKind::SparkArchive { legacy: false });
        assert_eq!(kind("http://a.org/manual.pdf", "RISC OS"), ContentKind::Pdf);
        assert_eq!(kind("http://a.org/riscos.xml", "<rss></rss>"), ContentKind::Manifest);
        assert_eq!(kind("http://a.org/news.rss", ""), ContentKind::Feed);
        assert_eq!(kind("http://a.org/sitemap.xml", ""), ContentKind::Feed);
        assert_eq!(kind("http://a.org/game.zip", ""), ContentKind::Archive);
        assert_eq!(kind("http://a.org/get?f=game.zip?x", ""), ContentKind::Archive);
    }

    #[test]
    fn test_rss_envelope_in_body() {
        let body = "<?xml version=\"1.0\"?>\n<rss version=\"2.0\"><channel></channel></rss>";
        assert_eq!(kind("http://a.org/news", body), ContentKind::Feed);
    }

    #[test]
    fn test_feed_body_wins_over_zip_suffix() {
        let body = "<rss version=\"2.0\"><channel></channel></rss>";
        assert_eq!(kind("http://a.org/news.zip", body), ContentKind::Feed);
        assert_eq!(kind("http://a.org/news.zip", "PK\u{3}\u{4}"), ContentKind::Archive);
    }

    #[test]
    fn test_atom_body() {
        let body = "<feed xmlns=\"http://www.w3.org/2005/Atom\"><title>x</title></feed>";
        assert_eq!(kind("http://a.org/updates", body), ContentKind::Feed);
    }

    #[test]
    fn test_content_type_hint() {
        assert_eq!(
            classify("http://a.org/download?id=7", Some("application/zip"), b"PK", &markers()),
            ContentKind::Archive
        );
        assert_eq!(
            classify("http://a.org/doc", Some("application/pdf; qs=1"), b"", &markers()),
            ContentKind::Pdf
        );
    }

    #[test]
    fn test_topical_markers() {
        assert_eq!(
            kind("http://a.org/", "<html><body>News for RISC OS users</body></html>"),
            ContentKind::Page
        );
        assert_eq!(
            kind("http://a.org/", "<p>An Iyonix for sale</p>"),
            ContentKind::Page
        );
        assert_eq!(
            kind("http://a.org/", "<html><body>Cat pictures</body></html>"),
            ContentKind::Unclassified
        );
    }

    #[test]
    fn test_markers_are_case_sensitive_variants() {
        // Only the listed spellings count
        assert_eq!(kind("http://a.org/", "RISC os"), ContentKind::Unclassified);
        assert_eq!(kind("http://a.org/", "risc os"), ContentKind::Page);
    }
}
