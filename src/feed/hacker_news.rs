use super::types::FeedItem;
use super::{ItemSource, TopStories};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;

pub struct HackerNewsApi {
    client: Client,
    base_url: String,
}

impl HackerNewsApi {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn top_stories_url(&self, limit: usize) -> String {
        format!(
            "{}/topstories.json?orderBy=\"$key\"&limitToFirst={}",
            self.base_url, limit
        )
    }

    pub fn item_url(&self, id: i64) -> String {
        format!("{}/item/{}.json", self.base_url, id)
    }

    async fn get_body(&self, url: &str, what: &str) -> Result<String> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {} failed", what))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("GET {} failed ({}): {}", what, status, body);
        }
        resp.text()
            .await
            .with_context(|| format!("failed to read {} body", what))
    }
}

/// Human-facing discussion page for an item.
pub fn permalink(site_base: &str, id: i64) -> String {
    format!("{}/item?id={}", site_base.trim_end_matches('/'), id)
}

/// Parse the top-stories array, keeping at most `limit` ids in rank order.
pub fn parse_top_ids(body: &str, limit: usize) -> Result<Vec<i64>> {
    let mut ids: Vec<i64> =
        serde_json::from_str(body).context("failed to parse top stories response")?;
    ids.truncate(limit);
    Ok(ids)
}

/// Parse one item body. A `null` body (deleted or unknown item) fails.
pub fn parse_item(body: &str) -> Result<FeedItem> {
    serde_json::from_str(body).context("failed to parse item response")
}

#[async_trait]
impl TopStories for HackerNewsApi {
    async fn fetch_top_ids(&self, limit: usize) -> Result<Vec<i64>> {
        let body = self.get_body(&self.top_stories_url(limit), "top stories").await?;
        parse_top_ids(&body, limit)
    }
}

#[async_trait]
impl ItemSource for HackerNewsApi {
    async fn fetch_item(&self, id: i64) -> Result<FeedItem> {
        let body = self.get_body(&self.item_url(id), "item").await?;
        parse_item(&body).with_context(|| format!("item {}", id))
    }
}
