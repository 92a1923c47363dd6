//! RSS and Atom feed parsing
//!
//! Feeds in the wild are frequently not well-formed XML, so items are located by
//! pattern rather than with an XML parser.

use crate::catalog::FeedItemRecord;
use crate::extract::{ExtractionError, ExtractionResult};
use chrono::DateTime;
use regex::Regex;
use std::sync::LazyLock;

static CHANNEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<channel(?:\s[^>]*)?>(.*?)</channel>").expect("valid channel regex")
});
static ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<item(?:\s[^>]*)?>(.*?)</item>").expect("valid item regex")
});
static ATOM_FEED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<feed(?:\s[^>]*)?>(.*?)</feed>").expect("valid atom feed regex")
});
static ATOM_ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<entry(?:\s[^>]*)?>(.*?)</entry>").expect("valid atom entry regex")
});
static TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<title(?:\s[^>]*)?>(.*?)</title>").expect("valid title regex")
});
static LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<link>(.*?)</link>").expect("valid link regex"));
static ATOM_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<link\s[^>]*href="([^"]+)""#).expect("valid atom link regex")
});
static DESCRIPTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<description(?:\s[^>]*)?>(.*?)</description>")
        .expect("valid description regex")
});
static SUMMARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<(summary|content)(?:\s[^>]*)?>(.*?)</(?:summary|content)>")
        .expect("valid summary regex")
});
static PUB_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<pubDate>(.*?)</pubDate>").expect("valid pubDate regex"));
static ATOM_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<(?:updated|published)>(.*?)</(?:updated|published)>")
        .expect("valid atom date regex")
});
static CDATA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!\[CDATA\[(.*?)\]\]>").expect("valid cdata regex"));

/// A parsed feed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedDocument {
    /// Title of the (first) channel
    pub title: Option<String>,
    pub items: Vec<FeedItemRecord>,
}

/// Parses an RSS or Atom document
///
/// Every item is stamped with `now` as its `rss_feed_item_date`.
pub fn parse_feed(body: &str, now: i64) -> ExtractionResult<FeedDocument> {
    let flat: String = body.chars().filter(|c| *c != '\r' && *c != '\n').collect();

    let channels: Vec<&str> = CHANNEL
        .captures_iter(&flat)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();
    if !channels.is_empty() {
        return Ok(parse_rss_channels(&channels, now));
    }

    if let Some(feed) = ATOM_FEED.captures(&flat).and_then(|c| c.get(1)) {
        return Ok(parse_atom(feed.as_str(), now));
    }

    Err(ExtractionError::MalformedFeed(
        "no <channel> or <feed> element".to_string(),
    ))
}

fn parse_rss_channels(channels: &[&str], now: i64) -> FeedDocument {
    let mut document = FeedDocument::default();

    for channel in channels {
        if document.title.is_none() {
            // The channel's own title precedes its first item
            let head = ITEM.find(channel).map_or(*channel, |m| &channel[..m.start()]);
            document.title = first_capture(&TITLE, head);
        }

        for item in ITEM.captures_iter(channel).filter_map(|c| c.get(1)) {
            let item = item.as_str();
            document.items.push(FeedItemRecord {
                rss_feed_item_title: first_capture(&TITLE, item),
                rss_feed_item_description: first_capture(&DESCRIPTION, item),
                rss_feed_item_link: first_capture(&LINK, item),
                rss_feed_item_date: now,
                published: first_capture(&PUB_DATE, item).and_then(|date| {
                    DateTime::parse_from_rfc2822(&date)
                        .ok()
                        .map(|d| d.timestamp())
                }),
            });
        }
    }

    document
}

fn parse_atom(feed: &str, now: i64) -> FeedDocument {
    let head = ATOM_ENTRY.find(feed).map_or(feed, |m| &feed[..m.start()]);

    let items = ATOM_ENTRY
        .captures_iter(feed)
        .filter_map(|c| c.get(1))
        .map(|entry| {
            let entry = entry.as_str();
            FeedItemRecord {
                rss_feed_item_title: first_capture(&TITLE, entry),
                rss_feed_item_description: SUMMARY
                    .captures(entry)
                    .and_then(|c| c.get(2))
                    .and_then(|m| clean(m.as_str())),
                rss_feed_item_link: ATOM_LINK
                    .captures(entry)
                    .and_then(|c| c.get(1))
                    .and_then(|m| clean(m.as_str())),
                rss_feed_item_date: now,
                published: first_capture(&ATOM_DATE, entry).and_then(|date| {
                    DateTime::parse_from_rfc3339(&date)
                        .ok()
                        .map(|d| d.timestamp())
                }),
            }
        })
        .collect();

    FeedDocument {
        title: first_capture(&TITLE, head),
        items,
    }
}

fn first_capture(pattern: &Regex, text: &str) -> Option<String> {
    pattern
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| clean(m.as_str()))
}

/// Unwraps CDATA, unescapes markup entities and trims
fn clean(raw: &str) -> Option<String> {
    let unwrapped = CDATA.replace_all(raw, "$1");
    let text = unwrapped
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&amp;", "&");
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_300_000_000;

    #[test]
    fn test_minimal_rss_item() {
        let doc = parse_feed(
            "<rss><channel><item><title>T</title><link>http://x/y</link></item></channel></rss>",
            NOW,
        )
        .unwrap();

        assert_eq!(doc.items.len(), 1);
        let item = &doc.items[0];
        assert_eq!(item.rss_feed_item_title.as_deref(), Some("T"));
        assert_eq!(item.rss_feed_item_link.as_deref(), Some("http://x/y"));
        assert_eq!(item.rss_feed_item_date, NOW);
        assert_eq!(item.rss_feed_item_description, None);
    }

    #[test]
    fn test_channel_title_and_item_fields() {
        let body = "<?xml version=\"1.0\"?>\r\n<rss version=\"2.0\">\r\n<channel>\n\
            <title>Drobe</title>\n<link>http://www.drobe.co.uk/</link>\n\
            <item>\n<title>RISC OS 5 &amp; you</title>\n\
            <link>http://www.drobe.co.uk/article.php?id=1</link>\n\
            <description>&lt;b&gt;News&lt;/b&gt;</description>\n\
            <pubDate>Tue, 01 Mar 2011 12:00:00 GMT</pubDate>\n</item>\n\
            <item><title><![CDATA[Second]]></title><link>http://www.drobe.co.uk/2</link></item>\n\
            </channel></rss>";
        let doc = parse_feed(body, NOW).unwrap();

        assert_eq!(doc.title.as_deref(), Some("Drobe"));
        assert_eq!(doc.items.len(), 2);
        assert_eq!(doc.items[0].rss_feed_item_title.as_deref(), Some("RISC OS 5 & you"));
        assert_eq!(
            doc.items[0].rss_feed_item_description.as_deref(),
            Some("<b>News</b>")
        );
        assert_eq!(doc.items[0].published, Some(1_298_980_800));
        assert_eq!(doc.items[1].rss_feed_item_title.as_deref(), Some("Second"));
    }

    #[test]
    fn test_atom_entries() {
        let body = r#"<feed xmlns="http://www.w3.org/2005/Atom">
            <title>ROOL</title>
            <entry>
              <title>Release</title>
              <link rel="alternate" href="https://www.riscosopen.org/news/1"/>
              <updated>2011-03-01T12:00:00Z</updated>
              <summary>New build</summary>
            </entry>
        </feed>"#;
        let doc = parse_feed(body, NOW).unwrap();

        assert_eq!(doc.title.as_deref(), Some("ROOL"));
        assert_eq!(doc.items.len(), 1);
        assert_eq!(
            doc.items[0].rss_feed_item_link.as_deref(),
            Some("https://www.riscosopen.org/news/1")
        );
        assert_eq!(doc.items[0].rss_feed_item_description.as_deref(), Some("New build"));
        assert_eq!(doc.items[0].published, Some(1_298_980_800));
    }

    #[test]
    fn test_not_a_feed() {
        let result = parse_feed("<html><body>hello</body></html>", NOW);
        assert!(matches!(result, Err(ExtractionError::MalformedFeed(_))));
    }

    #[test]
    fn test_empty_channel() {
        let doc = parse_feed("<rss><channel><title>Quiet</title></channel></rss>", NOW).unwrap();
        assert!(doc.items.is_empty());
        assert_eq!(doc.title.as_deref(), Some("Quiet"));
    }
}
