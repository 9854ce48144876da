//! Configuration resolution for the combined feed.
//!
//! Configuration arrives as a flat bag of string keys: the process
//! environment, optionally merged with a TOML file of top-level keys.
//! [`Config::resolve`] turns that bag into an explicit, read-only
//! structure once per invocation — downstream code never probes ambient
//! lookups itself.
//!
//! Source feeds are declared as `FEED_<index>_URL` with the index
//! zero-padded to `FEED_INDEX_PADDING` digits. Discovery walks indices
//! 1..=99 and stops at the first absent one; anything configured beyond
//! a gap is ignored.

use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Highest feed index ever probed during discovery.
const MAX_FEED_INDEX: u32 = 99;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Missing required configuration key: {0}")]
    MissingKey(&'static str),

    #[error("Configuration key {key} is not a valid number: {value:?}")]
    InvalidNumber { key: String, value: String },
}

/// One configured source feed.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub url: String,
    /// Overrides the default cutoff year; also drives the year shift in
    /// date normalization.
    pub cutoff_year: Option<i32>,
    pub cutoff_month: Option<u32>,
    pub cutoff_day: Option<u32>,
    /// Literal string "true" enables date-sync for this feed.
    pub date_sync: bool,
}

/// Global default cutoff date, applied per-field wherever a feed has no
/// override of its own.
#[derive(Debug, Clone, Copy)]
pub struct CutoffDefaults {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

/// Fully resolved invocation configuration. Built once, read-only after.
#[derive(Debug, Clone)]
pub struct Config {
    pub feeds: Vec<FeedConfig>,
    pub defaults: CutoffDefaults,
    /// Combined feed channel title; a fixed phrase is used when unset.
    pub title: Option<String>,
    /// Channel-level artwork URL.
    pub image_url: Option<String>,
    /// Channel `<link>` target.
    pub site_url: Option<String>,
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Resolves the full configuration from a flat key bag.
    ///
    /// Requires `FEED_INDEX_PADDING` and the three `DEFAULT_CUTOFF_DATE_*`
    /// keys; everything else is optional. A malformed numeric override is
    /// an error rather than a silently ignored rule.
    pub fn resolve(keys: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let padding = require_number::<usize>(keys, "FEED_INDEX_PADDING")?;
        let defaults = CutoffDefaults {
            year: require_number(keys, "DEFAULT_CUTOFF_DATE_YEAR")?,
            month: require_number(keys, "DEFAULT_CUTOFF_DATE_MONTH")?,
            day: require_number(keys, "DEFAULT_CUTOFF_DATE_DAY")?,
        };

        let mut feeds = Vec::new();
        for index in 1..=MAX_FEED_INDEX {
            let padded = format!("{:0width$}", index, width = padding);
            let url_key = format!("FEED_{padded}_URL");
            let Some(url) = keys.get(&url_key) else {
                // First gap terminates discovery; later indices are ignored.
                break;
            };
            tracing::debug!(key = %url_key, url = %url, "Discovered source feed");

            feeds.push(FeedConfig {
                url: url.clone(),
                cutoff_year: optional_number(keys, &format!("FEED_{padded}_CUTOFF_YEAR"))?,
                cutoff_month: optional_number(keys, &format!("FEED_{padded}_CUTOFF_MONTH"))?,
                cutoff_day: optional_number(keys, &format!("FEED_{padded}_CUTOFF_DAY"))?,
                date_sync: keys
                    .get(&format!("FEED_{padded}_DATE_SYNC"))
                    .is_some_and(|v| v == "true"),
            });
        }
        tracing::info!(feeds = feeds.len(), "Resolved feed configuration");

        Ok(Config {
            feeds,
            defaults,
            title: keys.get("FEED_TITLE").cloned(),
            image_url: keys.get("FEED_IMAGE_URL").cloned(),
            site_url: keys.get("SITE_URL").cloned(),
        })
    }
}

/// Collects the configuration key bag: process environment, overlaid with
/// an optional TOML file of top-level keys.
///
/// - Missing file → environment only
/// - File keys take precedence over environment keys
/// - TOML string/integer/boolean values are flattened to strings
pub fn collect_keys(config_file: Option<&Path>) -> Result<HashMap<String, String>, ConfigError> {
    let mut keys: HashMap<String, String> = std::env::vars().collect();

    if let Some(path) = config_file {
        // Check file size before reading to prevent memory exhaustion from
        // a maliciously large or corrupted config file.
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Config::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Config::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using environment only");
                return Ok(keys);
            }
            Err(e) => return Err(e.into()),
            Ok(_) => {}
        }

        let content = std::fs::read_to_string(path)?;
        let table: HashMap<String, toml::Value> = toml::from_str(&content)?;
        for (key, value) in table {
            let value = match value {
                toml::Value::String(s) => s,
                toml::Value::Integer(n) => n.to_string(),
                toml::Value::Boolean(b) => b.to_string(),
                other => other.to_string(),
            };
            keys.insert(key, value);
        }
    }

    Ok(keys)
}

fn require_number<T: std::str::FromStr>(
    keys: &HashMap<String, String>,
    key: &'static str,
) -> Result<T, ConfigError> {
    let value = keys.get(key).ok_or(ConfigError::MissingKey(key))?;
    value.parse().map_err(|_| ConfigError::InvalidNumber {
        key: key.to_string(),
        value: value.clone(),
    })
}

fn optional_number<T: std::str::FromStr>(
    keys: &HashMap<String, String>,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    match keys.get(key) {
        None => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber {
                key: key.to_string(),
                value: value.clone(),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn base_keys() -> HashMap<String, String> {
        let mut keys = HashMap::new();
        keys.insert("FEED_INDEX_PADDING".into(), "2".into());
        keys.insert("DEFAULT_CUTOFF_DATE_YEAR".into(), "2024".into());
        keys.insert("DEFAULT_CUTOFF_DATE_MONTH".into(), "6".into());
        keys.insert("DEFAULT_CUTOFF_DATE_DAY".into(), "1".into());
        keys
    }

    #[test]
    fn resolves_contiguous_feeds_in_order() {
        let mut keys = base_keys();
        keys.insert("FEED_01_URL".into(), "https://a.example/feed.xml".into());
        keys.insert("FEED_02_URL".into(), "https://b.example/feed.xml".into());

        let config = Config::resolve(&keys).unwrap();
        assert_eq!(config.feeds.len(), 2);
        assert_eq!(config.feeds[0].url, "https://a.example/feed.xml");
        assert_eq!(config.feeds[1].url, "https://b.example/feed.xml");
        assert_eq!(config.defaults.year, 2024);
    }

    #[test]
    fn discovery_stops_at_first_gap() {
        let mut keys = base_keys();
        keys.insert("FEED_01_URL".into(), "https://a.example/feed.xml".into());
        keys.insert("FEED_02_URL".into(), "https://b.example/feed.xml".into());
        // FEED_03_URL absent; feed 4 must never be discovered.
        keys.insert("FEED_04_URL".into(), "https://d.example/feed.xml".into());

        let config = Config::resolve(&keys).unwrap();
        assert_eq!(config.feeds.len(), 2);
    }

    #[test]
    fn padding_width_governs_key_names() {
        let mut keys = base_keys();
        keys.insert("FEED_INDEX_PADDING".into(), "3".into());
        keys.insert("FEED_001_URL".into(), "https://a.example/feed.xml".into());
        // Wrong width is invisible to discovery.
        keys.insert("FEED_02_URL".into(), "https://b.example/feed.xml".into());

        let config = Config::resolve(&keys).unwrap();
        assert_eq!(config.feeds.len(), 1);
    }

    #[test]
    fn per_feed_overrides_are_parsed() {
        let mut keys = base_keys();
        keys.insert("FEED_01_URL".into(), "https://a.example/feed.xml".into());
        keys.insert("FEED_01_CUTOFF_YEAR".into(), "2020".into());
        keys.insert("FEED_01_CUTOFF_MONTH".into(), "3".into());
        keys.insert("FEED_01_DATE_SYNC".into(), "true".into());

        let config = Config::resolve(&keys).unwrap();
        let feed = &config.feeds[0];
        assert_eq!(feed.cutoff_year, Some(2020));
        assert_eq!(feed.cutoff_month, Some(3));
        assert_eq!(feed.cutoff_day, None);
        assert!(feed.date_sync);
    }

    #[test]
    fn date_sync_requires_literal_true() {
        let mut keys = base_keys();
        keys.insert("FEED_01_URL".into(), "https://a.example/feed.xml".into());
        keys.insert("FEED_01_DATE_SYNC".into(), "TRUE".into());

        let config = Config::resolve(&keys).unwrap();
        assert!(!config.feeds[0].date_sync);
    }

    #[test]
    fn missing_defaults_are_an_error() {
        let mut keys = base_keys();
        keys.remove("DEFAULT_CUTOFF_DATE_YEAR");
        assert!(matches!(
            Config::resolve(&keys),
            Err(ConfigError::MissingKey("DEFAULT_CUTOFF_DATE_YEAR"))
        ));
    }

    #[test]
    fn malformed_cutoff_override_is_an_error() {
        let mut keys = base_keys();
        keys.insert("FEED_01_URL".into(), "https://a.example/feed.xml".into());
        keys.insert("FEED_01_CUTOFF_YEAR".into(), "twenty-twenty".into());
        assert!(matches!(
            Config::resolve(&keys),
            Err(ConfigError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn global_channel_settings_are_optional() {
        let keys = base_keys();
        let config = Config::resolve(&keys).unwrap();
        assert!(config.feeds.is_empty());
        assert_eq!(config.title, None);
        assert_eq!(config.image_url, None);
        assert_eq!(config.site_url, None);
    }
}
