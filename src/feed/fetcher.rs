//! HTTP retrieval of one source feed.
//!
//! Fetches the document, parses it, runs every item through date
//! normalization, and returns the survivors sorted ascending by sort
//! date. There are no retries and no per-request timeout: the build is
//! all-or-nothing and a failed feed aborts the whole run, so the error
//! always names the URL it belongs to.

use crate::config::FeedConfig;
use crate::datetime::{effective_sort_date, parse_pub_date, DateRules};
use crate::feed::parser::{parse_channel, Enclosure, Guid, ParseError};
use chrono::{DateTime, FixedOffset};
use futures::StreamExt;
use thiserror::Error;

/// Response bodies above this size are rejected outright.
const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// What went wrong while fetching or parsing a single feed.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Document could not be parsed as an RSS channel
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
}

/// A fetch/parse failure attributed to the feed it came from.
#[derive(Debug, Error)]
#[error("Failed to process feed {url}: {source}")]
pub struct FeedError {
    pub url: String,
    #[source]
    pub source: FetchError,
}

/// One upstream item that survived date normalization.
///
/// `sort_date` is derived once from `original_date` plus the feed's date
/// rules and never changes afterwards.
#[derive(Debug, Clone)]
pub struct FeedItemSource {
    pub title: String,
    pub link: Option<String>,
    pub guid: Option<Guid>,
    pub description: Option<String>,
    pub summary: Option<String>,
    pub enclosure: Option<Enclosure>,
    pub duration: Option<String>,
    pub image: Option<String>,
    pub explicit: Option<String>,
    pub episode_type: Option<String>,
    /// Publish date exactly as the upstream feed stated it.
    pub original_date: DateTime<FixedOffset>,
    /// Possibly year-shifted date used for merged ordering.
    pub sort_date: DateTime<FixedOffset>,
}

/// One fetched source feed: channel metadata plus normalized items in
/// ascending sort-date order.
#[derive(Debug, Clone)]
pub struct SourceFeed {
    pub title: String,
    pub image: Option<String>,
    pub items: Vec<FeedItemSource>,
}

/// Fetches and parses one source feed, applying its date rules.
///
/// Items are dropped when their `pubDate` is missing or unparseable, or
/// when the date normalizer excludes them (date-sync reference or the
/// future guard). Survivors come back sorted ascending by `sort_date`.
pub async fn fetch_feed(
    client: &reqwest::Client,
    feed: &FeedConfig,
    default_cutoff_year: i32,
    now: DateTime<FixedOffset>,
) -> Result<SourceFeed, FeedError> {
    fetch_inner(client, feed, default_cutoff_year, now)
        .await
        .map_err(|source| FeedError {
            url: feed.url.clone(),
            source,
        })
}

async fn fetch_inner(
    client: &reqwest::Client,
    feed: &FeedConfig,
    default_cutoff_year: i32,
    now: DateTime<FixedOffset>,
) -> Result<SourceFeed, FetchError> {
    tracing::debug!(url = %feed.url, "Fetching source feed");

    let response = client.get(&feed.url).send().await?;
    if !response.status().is_success() {
        return Err(FetchError::HttpStatus(response.status().as_u16()));
    }
    let bytes = read_limited_bytes(response, MAX_FEED_SIZE).await?;

    let channel = parse_channel(&bytes)?;
    let rules = DateRules {
        cutoff_year: feed.cutoff_year,
        default_cutoff_year,
        date_sync: feed.date_sync,
    };

    let total = channel.items.len();
    let mut items: Vec<FeedItemSource> = channel
        .items
        .into_iter()
        .filter_map(|item| {
            let original_date = match item.pub_date.as_deref().and_then(parse_pub_date) {
                Some(date) => date,
                None => {
                    tracing::debug!(
                        url = %feed.url,
                        title = %item.title,
                        "Skipping item without a parseable pubDate"
                    );
                    return None;
                }
            };
            let sort_date = effective_sort_date(original_date, &rules, now)?;
            Some(FeedItemSource {
                title: item.title,
                link: item.link,
                guid: item.guid,
                description: item.description,
                summary: item.summary,
                enclosure: item.enclosure,
                duration: item.duration,
                image: item.image,
                explicit: item.explicit,
                episode_type: item.episode_type,
                original_date,
                sort_date,
            })
        })
        .collect();

    // Stable sort keeps document order for same-instant items.
    items.sort_by_key(|item| item.sort_date);

    tracing::debug!(
        url = %feed.url,
        kept = items.len(),
        dropped = total - items.len(),
        "Normalized source feed"
    );

    Ok(SourceFeed {
        title: channel.title,
        image: channel.image,
        items,
    })
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: trust a Content-Length that already exceeds the cap.
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}
