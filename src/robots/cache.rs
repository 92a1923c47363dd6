//! Per-domain robots.txt cache
//!
//! Each domain's robots.txt is fetched at most once a day.

use crate::robots::ParsedRobots;
use crate::state::DAY;
use crate::url::extract_domain;
use reqwest::{Client, StatusCode};
use std::collections::HashMap;
use url::Url;

/// A robots.txt together with the epoch it was fetched
#[derive(Debug, Clone)]
pub struct CachedRobots {
    pub content: ParsedRobots,
    pub fetched_at: i64,
}

impl CachedRobots {
    pub fn new(content: ParsedRobots, fetched_at: i64) -> Self {
        Self {
            content,
            fetched_at,
        }
    }

    /// True once the entry is more than a day old
    pub fn is_stale(&self, now: i64) -> bool {
        now - self.fetched_at > DAY
    }
}

/// robots.txt rules keyed by domain
#[derive(Debug, Default)]
pub struct RobotsCache {
    entries: HashMap<String, CachedRobots>,
}

impl RobotsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Caches `robots` for `domain`
    pub fn insert(&mut self, domain: &str, robots: ParsedRobots, now: i64) {
        self.entries
            .insert(domain.to_string(), CachedRobots::new(robots, now));
    }

    /// Fresh rules for `domain`, if cached
    pub fn get(&self, domain: &str, now: i64) -> Option<&ParsedRobots> {
        self.entries
            .get(domain)
            .filter(|cached| !cached.is_stale(now))
            .map(|cached| &cached.content)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Checks `url` against its site's robots.txt, fetching it when needed
    ///
    /// Sites without a host (e.g. malformed URLs) and non-HTTP schemes are
    /// allowed; they fail later in the fetch.
    pub async fn is_allowed(
        &mut self,
        client: &Client,
        url: &Url,
        agent_token: &str,
        now: i64,
    ) -> bool {
        if !matches!(url.scheme(), "http" | "https") {
            return true;
        }
        let Some(domain) = extract_domain(url) else {
            return true;
        };

        if let Some(robots) = self.get(&domain, now) {
            return robots.is_allowed(url.as_str(), agent_token);
        }

        let robots_url = format!("{}://{}/robots.txt", url.scheme(), domain);
        let robots = fetch_robots(client, &robots_url).await;
        let allowed = robots.is_allowed(url.as_str(), agent_token);
        self.insert(&domain, robots, now);
        allowed
    }
}

/// Fetches and parses a robots.txt
///
/// Anything but a 200 answer allows everything.
pub async fn fetch_robots(client: &Client, robots_url: &str) -> ParsedRobots {
    tracing::debug!("Fetching {}", robots_url);
    let response = match client.get(robots_url).send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::debug!("No robots.txt at {}: {}", robots_url, e);
            return ParsedRobots::allow_all();
        }
    };

    if response.status() != StatusCode::OK {
        return ParsedRobots::allow_all();
    }

    match response.text().await {
        Ok(body) => ParsedRobots::from_content(&body),
        Err(_) => ParsedRobots::allow_all(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const NOW: i64 = 1_300_000_000;

    #[test]
    fn test_staleness() {
        let cached = CachedRobots::new(ParsedRobots::allow_all(), NOW);
        assert!(!cached.is_stale(NOW + DAY - 1));
        assert!(cached.is_stale(NOW + DAY + 1));
    }

    #[test]
    fn test_stale_entries_are_not_returned() {
        let mut cache = RobotsCache::new();
        cache.insert("a.org", ParsedRobots::allow_all(), NOW);
        assert!(cache.get("a.org", NOW + 60).is_some());
        assert!(cache.get("a.org", NOW + 2 * DAY).is_none());
        assert!(cache.get("b.org", NOW).is_none());
    }

    #[tokio::test]
    async fn test_fetches_once_per_domain() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private/"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = Client::new();
        let mut cache = RobotsCache::new();
        let open = Url::parse(&format!("{}/apps/", server.uri())).unwrap();
        let closed = Url::parse(&format!("{}/private/x.html", server.uri())).unwrap();

        assert!(cache.is_allowed(&client, &open, "TestSpider", NOW).await);
        assert!(!cache.is_allowed(&client, &closed, "TestSpider", NOW).await);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_robots_allows_everything() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/anything", server.uri())).unwrap();
        let mut cache = RobotsCache::new();
        assert!(cache.is_allowed(&Client::new(), &url, "TestSpider", NOW).await);
    }

    #[tokio::test]
    async fn test_ftp_is_not_checked() {
        let url = Url::parse("ftp://ftp.a.org/pub/").unwrap();
        let mut cache = RobotsCache::new();
        assert!(cache.is_allowed(&Client::new(), &url, "TestSpider", NOW).await);
        assert!(cache.is_empty());
    }
}
