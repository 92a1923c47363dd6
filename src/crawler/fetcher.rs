//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with proper user agent strings
//! - GET requests returning the raw body bytes
//! - Handing `ftp://` URLs to the anonymous FTP client
//! - Classifying failures into the outcomes the lifecycle acts on

use crate::config::{CrawlerConfig, UserAgentConfig};
use crate::crawler::ftp::fetch_ftp;
use reqwest::{header, redirect::Policy, Client};
use std::time::{Duration, UNIX_EPOCH};
use url::Url;

/// Most redirect hops followed before a fetch is abandoned
const MAX_REDIRECTS: usize = 10;

/// Whole-transfer limit for anonymous FTP
const FTP_TIMEOUT: Duration = Duration::from_secs(120);

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchResult {
    /// The server answered 2xx
    Success {
        /// Final URL after redirects
        final_url: String,
        /// HTTP status code
        status: u16,
        /// Content-Type header value
        content_type: Option<String>,
        /// `Last-Modified` header as epoch seconds
        last_modified: Option<i64>,
        /// Raw response body
        body: Vec<u8>,
    },

    /// The request or the body read ran out of time
    Timeout { error: String },

    /// Connection refused, DNS, TLS or a 5xx answer
    ConnectionFailure { error: String },

    /// The server answered 4xx (or another non-success, non-5xx status)
    ClientError { status: u16 },

    /// Redirect loop or too many redirects
    RedirectError { error: String },

    /// The URL cannot be fetched at all
    InvalidUrl { error: String },
}

impl FetchResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Formats the user agent header: `Name/Version (+ContactURL; ContactEmail)`
pub fn user_agent_string(config: &UserAgentConfig) -> String {
    format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    )
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `user_agent` - The user agent configuration
/// * `crawler` - Supplies the fetch and connect timeouts
///
/// # Example
///
/// ```no_run
/// use riscos_spider::config::load_config;
/// use riscos_spider::crawler::build_http_client;
/// use std::path::Path;
///
/// let config = load_config(Path::new("spider.toml")).unwrap();
/// let client = build_http_client(&config.user_agent, &config.crawler).unwrap();
/// ```
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    crawler: &CrawlerConfig,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent_string(user_agent))
        .timeout(Duration::from_secs(crawler.fetch_timeout_secs))
        .connect_timeout(Duration::from_secs(crawler.connect_timeout_secs))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a URL and classifies the outcome
///
/// # Outcome mapping
///
/// | Condition | Result |
/// |-----------|--------|
/// | 2xx | `Success` |
/// | HTTP 5xx | `ConnectionFailure` |
/// | Other HTTP status | `ClientError` |
/// | Timeout (request or body) | `Timeout` |
/// | Connection refused, DNS, TLS | `ConnectionFailure` |
/// | Redirect loop or chain > 10 | `RedirectError` |
/// | Unparseable URL or scheme other than http, https, ftp | `InvalidUrl` |
///
/// `ftp://` URLs go to [`fetch_ftp`]; its 5xx replies are `ClientError`.
pub async fn fetch_url(client: &Client, url: &str) -> FetchResult {
    match Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
        Ok(parsed) if parsed.scheme() == "ftp" => return fetch_ftp(&parsed, FTP_TIMEOUT).await,
        Ok(parsed) => {
            return FetchResult::InvalidUrl {
                error: format!("unsupported scheme {}", parsed.scheme()),
            }
        }
        Err(e) => {
            return FetchResult::InvalidUrl {
                error: e.to_string(),
            }
        }
    }

    let response = match client.get(url).send().await {
        Ok(response) => response,
        Err(e) => return classify_error(e),
    };

    let status = response.status();
    if status.is_server_error() {
        return FetchResult::ConnectionFailure {
            error: format!("HTTP {}", status.as_u16()),
        };
    }
    if !status.is_success() {
        return FetchResult::ClientError {
            status: status.as_u16(),
        };
    }

    let final_url = response.url().to_string();
    let content_type = header_value(&response, header::CONTENT_TYPE);
    let last_modified = header_value(&response, header::LAST_MODIFIED)
        .and_then(|value| httpdate::parse_http_date(&value).ok())
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .map(|age| age.as_secs() as i64);

    match response.bytes().await {
        Ok(body) => FetchResult::Success {
            final_url,
            status: status.as_u16(),
            content_type,
            last_modified,
            body: body.to_vec(),
        },
        Err(e) => classify_error(e),
    }
}

fn header_value(response: &reqwest::Response, name: header::HeaderName) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

fn classify_error(e: reqwest::Error) -> FetchResult {
    if e.is_timeout() {
        FetchResult::Timeout {
            error: e.to_string(),
        }
    } else if e.is_redirect() {
        FetchResult::RedirectError {
            error: e.to_string(),
        }
    } else if e.is_builder() {
        FetchResult::InvalidUrl {
            error: e.to_string(),
        }
    } else {
        FetchResult::ConnectionFailure {
            error: e.to_string(),
        }
    }
}
