//! robots.txt rules, matched with the robotstxt crate

use robotstxt::DefaultMatcher;

/// The robots.txt of one site
///
/// A site without a usable robots.txt allows everything.
#[derive(Debug, Clone, Default)]
pub struct ParsedRobots {
    /// Raw robots.txt body; `None` allows every URL
    content: Option<String>,
}

impl ParsedRobots {
    pub fn from_content(content: &str) -> Self {
        Self {
            content: Some(content.to_string()),
        }
    }

    /// Used when robots.txt is missing or cannot be fetched
    pub fn allow_all() -> Self {
        Self { content: None }
    }

    /// Checks whether `agent_token` may fetch `url`
    ///
    /// `url` may be absolute or a bare path.
    pub fn is_allowed(&self, url: &str, agent_token: &str) -> bool {
        match self.content.as_deref() {
            None | Some("") => true,
            Some(content) => {
                let mut matcher = DefaultMatcher::default();
                matcher.one_agent_allowed_by_robots(content, agent_token, url)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_all() {
        let robots = ParsedRobots::allow_all();
        assert!(robots.is_allowed("/any/path", "RiscOsSpider"));
        assert!(robots.is_allowed("http://a.org/admin", "RiscOsSpider"));
    }

    #[test]
    fn test_disallow_everything() {
        let robots = ParsedRobots::from_content("User-agent: *\nDisallow: /");
        assert!(!robots.is_allowed("http://a.org/", "RiscOsSpider"));
        assert!(!robots.is_allowed("http://a.org/apps/Edit.zip", "RiscOsSpider"));
    }

    #[test]
    fn test_disallow_prefix() {
        let robots = ParsedRobots::from_content("User-agent: *\nDisallow: /cgi-bin");
        assert!(robots.is_allowed("http://a.org/index.html", "RiscOsSpider"));
        assert!(!robots.is_allowed("http://a.org/cgi-bin/search", "RiscOsSpider"));
    }

    #[test]
    fn test_allow_overrides_longer_match() {
        let robots = ParsedRobots::from_content(
            "User-agent: *\nDisallow: /private\nAllow: /private/downloads",
        );
        assert!(!robots.is_allowed("/private", "RiscOsSpider"));
        assert!(robots.is_allowed("/private/downloads", "RiscOsSpider"));
    }

    #[test]
    fn test_agent_specific_group() {
        let robots =
            ParsedRobots::from_content("User-agent: RiscOsSpider\nDisallow: /\n\nUser-agent: *\nAllow: /");
        assert!(!robots.is_allowed("/page", "RiscOsSpider"));
        assert!(robots.is_allowed("/page", "OtherBot"));
    }

    #[test]
    fn test_garbage_and_empty_allow() {
        assert!(ParsedRobots::from_content("not a robots file {{{").is_allowed("/x", "Bot"));
        assert!(ParsedRobots::from_content("").is_allowed("/x", "Bot"));
    }
}
