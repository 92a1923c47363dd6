//! HTML parser for extracting links and metadata
//!
//! This module handles parsing HTML content to extract:
//! - Links to follow, both absolute URLs in the raw text and `href` attributes
//! - Page title
//! - `<base href>` and `<meta name="robots">` directives

use crate::url::{normalise_url, strip_query_and_fragment, valid_hyperlink_filetype};
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;
use url::Url;

/// Absolute URLs anywhere in the text, including scripts and comments
static ABSOLUTE_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(?:https?|ftp|feed)://[^\s"'<>()\[\]{}\\]+"#)
        .expect("valid absolute link regex")
});

/// Extracted information from an HTML page
#[derive(Debug, Clone)]
pub struct ParsedPage {
    /// The page title (from <title> tag)
    pub title: Option<String>,

    /// Every link found on the page, absolute and normalised
    pub links: Vec<String>,

    /// How many leading entries of `links` appeared as absolute URLs in the
    /// raw text; the rest came only from `href` attributes
    pub inline_links: usize,

    /// `<meta name="robots" content="noindex">`
    pub noindex: bool,

    /// `<meta name="robots" content="nofollow">`
    pub nofollow: bool,
}

/// Parses HTML content and extracts links and metadata
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `http://`, `https://`, `ftp://` and `feed://` URLs anywhere in the text,
///   with query and fragment removed (`feed://` is read as `http://`)
/// - `href` attributes of `<a>`, `<area>` and `<link rel="alternate">`,
///   resolved against `<base href>` or the page URL
///
/// **Exclude:**
/// - `javascript:`, `mailto:`, `tel:` links
/// - Data URIs and fragment-only links
/// - Paths ending in a non-content extension (css gif dll dtd js jpeg jpg ico png src)
///
/// # Example
///
/// ```
/// use riscos_spider::crawler::parse_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let base_url = Url::parse("http://example.org/").unwrap();
/// let parsed = parse_html(html, &base_url);
/// assert_eq!(parsed.title, Some("Test".to_string()));
/// assert_eq!(parsed.links, vec!["http://example.org/page".to_string()]);
/// ```
pub fn parse_html(html: &str, page_url: &Url) -> ParsedPage {
    let document = Html::parse_document(html);
    let (noindex, nofollow) = meta_robots(&document);

    let (links, inline_links) = extract_links_from(&document, html, page_url);

    ParsedPage {
        title: extract_title(&document),
        links,
        inline_links,
        noindex,
        nofollow,
    }
}

impl ParsedPage {
    /// Links the crawler may queue
    ///
    /// `nofollow` withholds the `href` links; absolute URLs quoted in the
    /// text are still followed.
    pub fn followable_links(&self) -> &[String] {
        if self.nofollow {
            &self.links[..self.inline_links]
        } else {
            &self.links
        }
    }
}

/// Convenience function for extracting just the links from HTML
pub fn extract_links(html: &str, page_url: &Url) -> Vec<String> {
    let document = Html::parse_document(html);
    extract_links_from(&document, html, page_url).0
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| {
            element
                .text()
                .collect::<String>()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|s| !s.is_empty())
}

/// Reads the robots meta directives as `(noindex, nofollow)`
fn meta_robots(document: &Html) -> (bool, bool) {
    let Ok(selector) = Selector::parse("meta[name][content]") else {
        return (false, false);
    };

    let mut noindex = false;
    let mut nofollow = false;
    for element in document.select(&selector) {
        let name = element.value().attr("name").unwrap_or_default();
        if !name.eq_ignore_ascii_case("robots") {
            continue;
        }
        let content = element
            .value()
            .attr("content")
            .unwrap_or_default()
            .to_lowercase();
        for directive in content.split(',').map(str::trim) {
            match directive {
                "noindex" => noindex = true,
                "nofollow" => nofollow = true,
                "none" => {
                    noindex = true;
                    nofollow = true;
                }
                _ => {}
            }
        }
    }
    (noindex, nofollow)
}

/// The `<base href>` of the document resolved against the page, or the page itself
fn base_url(document: &Html, page_url: &Url) -> Url {
    Selector::parse("base[href]")
        .ok()
        .and_then(|selector| {
            document
                .select(&selector)
                .next()
                .and_then(|element| element.value().attr("href"))
                .and_then(|href| page_url.join(href.trim()).ok())
        })
        .unwrap_or_else(|| page_url.clone())
}

/// All links, and how many of them were found in the raw text
///
/// Raw-text links come first, so those are the leading entries.
fn extract_links_from(document: &Html, raw: &str, page_url: &Url) -> (Vec<String>, usize) {
    let base = base_url(document, page_url);

    let inline = ABSOLUTE_LINK.find_iter(raw).map(|found| {
        let link = strip_query_and_fragment(found.as_str()).trim_end_matches(['.', ',', ';']);
        match link.get(..7) {
            Some(scheme) if scheme.eq_ignore_ascii_case("feed://") => {
                format!("http://{}", &link[7..])
            }
            _ => link.to_string(),
        }
    });

    let mut hrefs = Vec::new();
    if let Ok(selector) = Selector::parse("a[href], area[href], link[rel='alternate'][href]") {
        hrefs.extend(
            document
                .select(&selector)
                .filter_map(|element| element.value().attr("href"))
                .filter_map(|href| resolve_link(href, &base)),
        );
    }

    let mut seen = HashSet::new();
    let mut links = Vec::new();
    let mut inline_count = 0;
    let candidates = inline
        .map(|link| (link, true))
        .chain(hrefs.into_iter().map(|link| (link, false)));
    for (link, from_text) in candidates {
        let link = normalise_url(&link);
        if valid_hyperlink_filetype(&link) && seen.insert(link.clone()) {
            links.push(link);
            if from_text {
                inline_count += 1;
            }
        }
    }

    (links, inline_count)
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Fragment-only links
/// - Invalid URLs
/// - Schemes other than http, https and ftp after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let mut absolute_url = base_url.join(href).ok()?;
    absolute_url.set_fragment(None);
    match absolute_url.scheme() {
        "http" | "https" | "ftp" => Some(absolute_url.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_url() -> Url {
        Url::parse("http://www.riscos.org/news/page.html").unwrap()
    }

    fn parse(html: &str) -> ParsedPage {
        parse_html(html, &base_url())
    }

    #[test]
    fn test_extract_title_with_whitespace() {
        let parsed = parse("<html><head><title>  RISC OS\n  News  </title></head></html>");
        assert_eq!(parsed.title, Some("RISC OS News".to_string()));
        assert_eq!(parse("<html><head></head></html>").title, None);
    }

    #[test]
    fn test_extract_relative_link() {
        let parsed = parse(r#"<html><body><a href="other.html">Link</a></body></html>"#);
        assert_eq!(parsed.links, vec!["http://www.riscos.org/news/other.html"]);
    }

    #[test]
    fn test_base_href_is_used_for_relative_links() {
        let html = r#"<html><head><base href="http://mirror.riscos.org/files/"></head>
            <body><a href="app.zip">Download</a></body></html>"#;
        let links = parse(html).links;
        assert!(links.contains(&"http://mirror.riscos.org/files/app.zip".to_string()));
        assert!(!links.contains(&"http://www.riscos.org/news/app.zip".to_string()));
    }

    #[test]
    fn test_absolute_links_in_text_lose_query() {
        let html = "<p>See http://www.drobe.co.uk/article.php?id=1 and ftp://ftp.riscos.org/pub/.</p>";
        let parsed = parse(html);
        assert_eq!(
            parsed.links,
            vec![
                "http://www.drobe.co.uk/article.php",
                "ftp://ftp.riscos.org/pub/"
            ]
        );
    }

    #[test]
    fn test_feed_scheme_becomes_http() {
        let parsed = parse("<p>Subscribe: feed://www.riscos.org/news.rss</p>");
        assert_eq!(parsed.links, vec!["http://www.riscos.org/news.rss"]);
    }

    #[test]
    fn test_links_are_normalised_and_deduplicated() {
        let html = r#"<a href="http://www.riscos.org/a/../b.html">1</a>
            <a href="/b.html">2</a>"#;
        assert_eq!(parse(html).links, vec!["http://www.riscos.org/b.html"]);
    }

    #[test]
    fn test_skip_special_schemes_and_fragments() {
        let html = r##"<a href="javascript:void(0)">x</a><a href="mailto:a@b.org">x</a>
            <a href="tel:+441234">x</a><a href="#top">x</a>"##;
        assert!(parse(html).links.is_empty());
    }

    #[test]
    fn test_skip_non_content_extensions() {
        let html = r#"<a href="logo.png">x</a><a href="style.css">x</a><a href="app.zip">x</a>"#;
        assert_eq!(parse(html).links, vec!["http://www.riscos.org/news/app.zip"]);
    }

    #[test]
    fn test_alternate_feed_link() {
        let html = r#"<head><link rel="alternate" type="application/rss+xml" href="/news.rss"></head>"#;
        assert_eq!(parse(html).links, vec!["http://www.riscos.org/news.rss"]);
    }

    #[test]
    fn test_meta_robots() {
        let parsed = parse(r#"<head><meta name="ROBOTS" content="NOINDEX, follow"></head>"#);
        assert!(parsed.noindex);
        assert!(!parsed.nofollow);

        let parsed = parse(r#"<head><meta name="robots" content="none"></head>"#);
        assert!(parsed.noindex && parsed.nofollow);

        let parsed = parse(r#"<head><meta name="description" content="noindex"></head>"#);
        assert!(!parsed.noindex);
    }

    #[test]
    fn test_nofollow_keeps_links_quoted_in_text() {
        let html = r#"<head><meta name="robots" content="nofollow"></head>
            <body><p>Mirror at http://www.riscos.org/mirror/ and http://other.org/</p>
            <a href="/apps.html">Apps</a></body>"#;
        let parsed = parse(html);
        assert_eq!(parsed.links.len(), 3);
        assert_eq!(
            parsed.followable_links(),
            ["http://www.riscos.org/mirror/", "http://other.org/"]
        );

        let followed = parse(r#"<p>http://other.org/</p><a href="/apps.html">Apps</a>"#);
        assert_eq!(followed.followable_links(), followed.links.as_slice());
    }
}
