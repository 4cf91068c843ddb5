pub mod file;
pub mod memory;

use crate::feed::types::FeedItem;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

const NAMESPACE: &str = "TopStory/Root";

/// Store key: fixed namespace plus the item identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StoryKey(pub i64);

impl fmt::Display for StoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/Story:{}", NAMESPACE, self.0)
    }
}

impl StoryKey {
    pub fn parse(raw: &str) -> Option<Self> {
        let rest = raw.strip_prefix(NAMESPACE)?.strip_prefix("/Story:")?;
        rest.parse().ok().map(StoryKey)
    }
}

/// What survives a successful post: enough to edit or delete it later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryRecord {
    pub id: i64,
    pub message_id: i64,
    pub last_save: DateTime<Utc>,
}

impl StoryRecord {
    /// Project a posted item down to its durable record.
    pub fn project(item: &FeedItem, message_id: i64, now: DateTime<Utc>) -> Self {
        Self { id: item.id, message_id, last_save: now }
    }

    pub fn key(&self) -> StoryKey {
        StoryKey(self.id)
    }

    /// Strictly older than `retention` at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>, retention: chrono::Duration) -> bool {
        now - self.last_save > retention
    }
}

/// Per-key result of a bulk read.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Found(StoryRecord),
    Missing,
    Failed(String),
}

/// Keyed record storage. No cross-call locking: concurrent writers for the
/// same id are last-write-wins.
#[async_trait]
pub trait StoryStore: Send + Sync {
    async fn get(&self, id: i64) -> Result<Option<StoryRecord>>;
    /// One result per requested id, in request order.
    async fn get_multi(&self, ids: &[i64]) -> Result<Vec<Lookup>>;
    async fn put(&self, record: &StoryRecord) -> Result<()>;
    async fn delete(&self, id: i64) -> Result<()>;
    async fn scan(&self) -> Result<Vec<StoryRecord>>;
}
