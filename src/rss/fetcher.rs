//! RSS feed fetcher.
//!
//! Downloads one feed document over HTTP with bounded time and size, and
//! parses it as RSS 2.0.

use std::time::Duration;

use reqwest::Client;

use crate::rss::types::{RssChannel, RssFeed, RssItem, MAX_FEED_SIZE};
use crate::{GatorError, Result};

/// Connect timeout in seconds.
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Total timeout in seconds.
const TOTAL_TIMEOUT_SECS: u64 = 30;

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 5;

/// User agent sent with every request.
pub const USER_AGENT: &str = "gator";

/// Longest entity name (between `&` and `;`) that is decoded.
const MAX_ENTITY_LEN: usize = 32;

/// HTTP client for feed documents.
///
/// Build one and reuse it; the underlying connection pool is shared.
#[derive(Clone)]
pub struct FeedFetcher {
    client: Client,
}

impl FeedFetcher {
    /// Create a fetcher with the default timeouts.
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(TOTAL_TIMEOUT_SECS))
    }

    /// Create a fetcher with a custom total timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS).min(timeout))
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| GatorError::Fetch(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Fetch and parse the feed at `url`.
    pub async fn fetch(&self, url: &str) -> Result<RssFeed> {
        validate_url(url)?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| GatorError::Fetch(format!("failed to fetch feed: {}", e)))?;

        if !response.status().is_success() {
            return Err(GatorError::Fetch(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        if let Some(content_length) = response.content_length() {
            if content_length > MAX_FEED_SIZE {
                return Err(GatorError::Fetch(format!(
                    "feed too large: {} bytes (max {} bytes)",
                    content_length, MAX_FEED_SIZE
                )));
            }
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| GatorError::Fetch(format!("failed to read response: {}", e)))?;

        // Content-Length may be absent or wrong
        if bytes.len() as u64 > MAX_FEED_SIZE {
            return Err(GatorError::Fetch(format!(
                "feed too large: {} bytes (max {} bytes)",
                bytes.len(),
                MAX_FEED_SIZE
            )));
        }

        parse_feed(&bytes)
    }
}

impl std::fmt::Debug for FeedFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedFetcher").finish()
    }
}

/// Check that a feed URL is fetchable: http or https with a host.
pub fn validate_url(url: &str) -> Result<()> {
    let parsed =
        url::Url::parse(url).map_err(|e| GatorError::Parse(format!("invalid URL {url:?}: {e}")))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(GatorError::Parse(format!(
                "unsupported URL scheme: {}",
                scheme
            )));
        }
    }

    if parsed.host().is_none() {
        return Err(GatorError::Parse(format!("URL has no host: {url}")));
    }

    Ok(())
}

/// Parse an RSS 2.0 document.
///
/// Entities left in titles and descriptions after XML decoding (for
/// example a double-escaped `&amp;#39;`) are decoded as well.
pub fn parse_feed(bytes: &[u8]) -> Result<RssFeed> {
    let channel = ::rss::Channel::read_from(bytes)
        .map_err(|e| GatorError::Parse(format!("failed to parse feed: {}", e)))?;

    let items = channel
        .items()
        .iter()
        .map(|item| RssItem {
            title: unescape_entities(item.title().unwrap_or_default()),
            link: item.link().unwrap_or_default().trim().to_string(),
            description: unescape_entities(item.description().unwrap_or_default()),
            pub_date: item.pub_date().unwrap_or_default().trim().to_string(),
        })
        .collect();

    Ok(RssFeed {
        channel: RssChannel {
            title: unescape_entities(channel.title()),
            link: channel.link().trim().to_string(),
            description: unescape_entities(channel.description()),
        },
        items,
    })
}

/// Decode HTML character references.
///
/// Named references use the HTML5 entity table. Decimal and hex numeric
/// references are decoded too; code points that are not valid characters
/// (NUL, surrogates, out of range) become U+FFFD. Anything else is left
/// untouched.
pub fn unescape_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut result = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(pos) = rest.find('&') {
        result.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(end) = after.find(';').filter(|&end| end <= MAX_ENTITY_LEN) {
            if let Some(decoded) = decode_entity(&after[..end]) {
                result.push_str(&decoded);
                rest = &after[end + 1..];
                continue;
            }
        }

        result.push('&');
        rest = after;
    }
    result.push_str(rest);

    result
}

/// Decode one entity name (without `&` and `;`).
fn decode_entity(entity: &str) -> Option<String> {
    if entity.starts_with('#') {
        let code = parse_numeric_entity(entity)?;
        let c = match code {
            0 => char::REPLACEMENT_CHARACTER,
            _ => char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER),
        };
        return Some(c.to_string());
    }

    if entity.is_empty() || !entity.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }

    let reference = format!("&{entity};");
    let decoded = html_escape::decode_html_entities(&reference);
    (decoded != reference.as_str()).then(|| decoded.into_owned())
}

/// Parse a numeric HTML entity (e.g., "#123" or "#x7B").
///
/// Values too large for `u32` saturate so they decode as invalid.
fn parse_numeric_entity(entity: &str) -> Option<u32> {
    let (digits, radix) = if let Some(hex) = entity
        .strip_prefix("#x")
        .or_else(|| entity.strip_prefix("#X"))
    {
        (hex, 16)
    } else {
        (entity.strip_prefix('#')?, 10)
    };

    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    Some(u32::from_str_radix(digits, radix).unwrap_or(u32::MAX))
}
