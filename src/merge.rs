//! Merging N source feeds into one numbered timeline.
//!
//! All configured feeds are fetched concurrently and joined with an
//! all-or-fail barrier: the first failing feed aborts the whole build
//! and no partial result is ever produced. Surviving items get a second
//! cutoff filter (against their *original* publish dates — distinct
//! from the pre-fetch filter on shifted dates), are stable-sorted by
//! sort date, and then numbered in a single walk.

use crate::config::{Config, CutoffDefaults, FeedConfig};
use crate::feed::fetcher::{fetch_feed, FeedError, FeedItemSource};
use chrono::{DateTime, Datelike, FixedOffset, TimeZone, Utc};
use futures::future::try_join_all;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MergeError {
    #[error(transparent)]
    Feed(#[from] FeedError),
    /// The per-feed/default cutoff fields do not form a real calendar date.
    #[error("Invalid cutoff date {year:04}-{month:02}-{day:02} for feed {url}")]
    InvalidCutoff {
        url: String,
        year: i32,
        month: u32,
        day: u32,
    },
}

/// One item of the combined feed, with its assigned numbering and the
/// channel metadata of the feed it came from.
#[derive(Debug, Clone)]
pub struct MergedEpisode {
    pub item: FeedItemSource,
    pub feed_title: String,
    pub feed_image: Option<String>,
    /// Starts at 1, increments on every UTC-month change along the
    /// sorted sequence.
    pub season: u32,
    /// Strict 1..N enumeration in sort order.
    pub episode: u32,
}

/// Fetches every configured feed concurrently and produces the merged,
/// numbered episode sequence in ascending sort-date order.
pub async fn collect_episodes(
    client: &reqwest::Client,
    config: &Config,
    now: DateTime<FixedOffset>,
) -> Result<Vec<MergedEpisode>, MergeError> {
    // Fan-out, one task per feed; try_join_all keeps input order and
    // aborts on the first failure.
    let fetches = config
        .feeds
        .iter()
        .map(|feed| fetch_feed(client, feed, config.defaults.year, now));
    let sources = try_join_all(fetches).await?;

    let mut all: Vec<(FeedItemSource, String, Option<String>)> = Vec::new();
    for (feed, source) in config.feeds.iter().zip(sources) {
        let cutoff = cutoff_date(feed, &config.defaults, *now.offset())?;
        let before = source.items.len();
        let mut kept = 0usize;
        for item in source.items {
            // Cutoff compares the original upstream date, not the
            // shifted sort date.
            if cutoff >= item.original_date {
                continue;
            }
            kept += 1;
            all.push((item, source.title.clone(), source.image.clone()));
        }
        if kept < before {
            tracing::debug!(
                url = %feed.url,
                dropped = before - kept,
                cutoff = %cutoff,
                "Items at or before cutoff excluded"
            );
        }
    }

    // Stable sort: ties keep their configured-feed / document order.
    all.sort_by_key(|(item, _, _)| item.sort_date);

    let mut episodes = Vec::with_capacity(all.len());
    let mut season = 1u32;
    let mut season_month: Option<u32> = None;
    for (index, (item, feed_title, feed_image)) in all.into_iter().enumerate() {
        let month = item.sort_date.with_timezone(&Utc).month();
        match season_month {
            None => season_month = Some(month),
            Some(current) if current != month => {
                season += 1;
                season_month = Some(month);
            }
            Some(_) => {}
        }
        episodes.push(MergedEpisode {
            item,
            feed_title,
            feed_image,
            season,
            episode: index as u32 + 1,
        });
    }

    tracing::info!(episodes = episodes.len(), "Merged source feeds");
    Ok(episodes)
}

/// Builds a feed's cutoff date at local midnight, falling back to the
/// global defaults independently per field.
fn cutoff_date(
    feed: &FeedConfig,
    defaults: &CutoffDefaults,
    offset: FixedOffset,
) -> Result<DateTime<FixedOffset>, MergeError> {
    let year = feed.cutoff_year.unwrap_or(defaults.year);
    let month = feed.cutoff_month.unwrap_or(defaults.month);
    let day = feed.cutoff_day.unwrap_or(defaults.day);
    offset
        .with_ymd_and_hms(year, month, day, 0, 0, 0)
        .single()
        .ok_or(MergeError::InvalidCutoff {
            url: feed.url.clone(),
            year,
            month,
            day,
        })
}
