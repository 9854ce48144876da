//! Source feed retrieval and normalization.
//!
//! This module turns one configured feed URL into a list of canonical,
//! date-normalized items ready for merging:
//!
//! - [`parser`] - RSS/iTunes dialect parsing using `quick-xml`
//! - [`fetcher`] - HTTP retrieval plus per-item date normalization
//!
//! Dialect quirks (attributed guids, competing image conventions) stay
//! inside [`parser`]; the merge engine only ever sees the canonical
//! [`FeedItemSource`] shape.

pub mod fetcher;
pub mod parser;

pub use fetcher::{fetch_feed, FeedError, FeedItemSource, FetchError, SourceFeed};
pub use parser::{Enclosure, Guid, ParsedChannel, RawItem};
