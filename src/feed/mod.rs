pub mod hacker_news;
pub mod types;

use anyhow::Result;
use async_trait::async_trait;
use types::FeedItem;

/// Ordered list of the feed's current top item identifiers.
#[async_trait]
pub trait TopStories: Send + Sync {
    async fn fetch_top_ids(&self, limit: usize) -> Result<Vec<i64>>;
}

/// Full attributes for one item, fetched on demand.
///
/// Malformed bodies surface as a `serde_json::Error` somewhere in the
/// error chain so callers can tell decode failures from transport ones.
#[async_trait]
pub trait ItemSource: Send + Sync {
    async fn fetch_item(&self, id: i64) -> Result<FeedItem>;
}

/// True when `err` came from decoding a response body rather than reaching the API.
pub fn is_decode_error(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| cause.is::<serde_json::Error>())
}
