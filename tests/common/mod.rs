// In-process fakes for the feed, store, channel and queue ports.
#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use hn_relay::config::Config;
use hn_relay::feed::hacker_news::parse_item;
use hn_relay::feed::types::FeedItem;
use hn_relay::feed::{ItemSource, TopStories};
use hn_relay::queue::{Action, TaskId, TaskQueue};
use hn_relay::store::memory::MemoryStore;
use hn_relay::store::{Lookup, StoryRecord, StoryStore};
use hn_relay::telegram::types::*;
use hn_relay::telegram::MessagingChannel;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Mutex;

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

pub fn config() -> Config {
    Config::default()
}

pub fn story(id: i64, score: i64, comments: i64) -> FeedItem {
    FeedItem {
        id,
        kind: "story".to_string(),
        score,
        descendants: comments,
        url: format!("https://example.com/{}", id),
        title: format!("Story {}", id),
    }
}

// ---- feed ----

#[derive(Default)]
pub struct FakeFeed {
    pub top: Mutex<Vec<i64>>,
    pub fail_top: AtomicBool,
    pub items: Mutex<HashMap<i64, FeedItem>>,
    /// Ids whose detail body is `null`.
    pub deleted: Mutex<HashSet<i64>>,
    pub unreachable: AtomicBool,
}

impl FakeFeed {
    pub fn with_items(items: Vec<FeedItem>) -> Self {
        let feed = FakeFeed::default();
        *feed.top.lock().unwrap() = items.iter().map(|i| i.id).collect();
        *feed.items.lock().unwrap() = items.into_iter().map(|i| (i.id, i)).collect();
        feed
    }

    pub fn set_item(&self, item: FeedItem) {
        self.items.lock().unwrap().insert(item.id, item);
    }
}

#[async_trait]
impl TopStories for FakeFeed {
    async fn fetch_top_ids(&self, limit: usize) -> Result<Vec<i64>> {
        if self.fail_top.load(Ordering::SeqCst) {
            anyhow::bail!("GET top stories failed (503 Service Unavailable)");
        }
        let mut ids = self.top.lock().unwrap().clone();
        ids.truncate(limit);
        Ok(ids)
    }
}

#[async_trait]
impl ItemSource for FakeFeed {
    async fn fetch_item(&self, id: i64) -> Result<FeedItem> {
        if self.unreachable.load(Ordering::SeqCst) {
            anyhow::bail!("GET item failed: connection refused");
        }
        if self.deleted.lock().unwrap().contains(&id) {
            return parse_item("null");
        }
        match self.items.lock().unwrap().get(&id) {
            Some(item) => Ok(item.clone()),
            None => anyhow::bail!("GET item failed (404 Not Found)"),
        }
    }
}

// ---- store ----

/// Memory store with per-key and per-call failure injection.
#[derive(Default)]
pub struct ScriptedStore {
    pub inner: MemoryStore,
    pub failing_keys: Mutex<HashSet<i64>>,
    pub fail_get_multi: AtomicBool,
    pub fail_put: AtomicBool,
    pub puts: AtomicI64,
}

impl ScriptedStore {
    pub fn with_records(records: Vec<StoryRecord>) -> Self {
        Self { inner: MemoryStore::with_records(records), ..Default::default() }
    }

    pub async fn record(&self, id: i64) -> Option<StoryRecord> {
        self.inner.get(id).await.unwrap()
    }
}

#[async_trait]
impl StoryStore for ScriptedStore {
    async fn get(&self, id: i64) -> Result<Option<StoryRecord>> {
        self.inner.get(id).await
    }

    async fn get_multi(&self, ids: &[i64]) -> Result<Vec<Lookup>> {
        if self.fail_get_multi.load(Ordering::SeqCst) {
            anyhow::bail!("datastore unavailable");
        }
        let failing = self.failing_keys.lock().unwrap().clone();
        let mut lookups = self.inner.get_multi(ids).await?;
        for (id, lookup) in ids.iter().zip(lookups.iter_mut()) {
            if failing.contains(id) {
                *lookup = Lookup::Failed("entity decode failed".to_string());
            }
        }
        Ok(lookups)
    }

    async fn put(&self, record: &StoryRecord) -> Result<()> {
        if self.fail_put.load(Ordering::SeqCst) {
            anyhow::bail!("datastore write rejected");
        }
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.inner.put(record).await
    }

    async fn delete(&self, id: i64) -> Result<()> {
        self.inner.delete(id).await
    }

    async fn scan(&self) -> Result<Vec<StoryRecord>> {
        self.inner.scan().await
    }
}

// ---- channel ----

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelCall {
    Send(SendMessageRequest),
    Edit(EditMessageTextRequest),
    Delete(DeleteMessageRequest),
}

pub struct FakeChannel {
    pub calls: Mutex<Vec<ChannelCall>>,
    pub next_message_id: AtomicI64,
    pub send_reply: Mutex<Option<ApiResponse<Message>>>,
    pub edit_reply: Mutex<Option<ApiResponse<serde_json::Value>>>,
    pub delete_reply: Mutex<Option<ApiResponse<bool>>>,
    pub transport_down: AtomicBool,
}

impl Default for FakeChannel {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            next_message_id: AtomicI64::new(1000),
            send_reply: Mutex::new(None),
            edit_reply: Mutex::new(None),
            delete_reply: Mutex::new(None),
            transport_down: AtomicBool::new(false),
        }
    }
}

impl FakeChannel {
    pub fn calls(&self) -> Vec<ChannelCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn sends(&self) -> Vec<SendMessageRequest> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ChannelCall::Send(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    pub fn edits(&self) -> Vec<EditMessageTextRequest> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ChannelCall::Edit(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    pub fn deletes(&self) -> Vec<DeleteMessageRequest> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                ChannelCall::Delete(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    fn check_transport(&self) -> Result<()> {
        if self.transport_down.load(Ordering::SeqCst) {
            anyhow::bail!("connection reset by peer");
        }
        Ok(())
    }
}

#[async_trait]
impl MessagingChannel for FakeChannel {
    async fn send_message(&self, req: &SendMessageRequest) -> Result<ApiResponse<Message>> {
        self.check_transport()?;
        self.calls.lock().unwrap().push(ChannelCall::Send(req.clone()));
        if let Some(reply) = self.send_reply.lock().unwrap().clone() {
            return Ok(reply);
        }
        let message_id = self.next_message_id.fetch_add(1, Ordering::SeqCst);
        Ok(ApiResponse::success(Message { message_id }))
    }

    async fn edit_message(
        &self,
        req: &EditMessageTextRequest,
    ) -> Result<ApiResponse<serde_json::Value>> {
        self.check_transport()?;
        self.calls.lock().unwrap().push(ChannelCall::Edit(req.clone()));
        Ok(self
            .edit_reply
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| ApiResponse::success(serde_json::Value::Bool(true))))
    }

    async fn delete_message(&self, req: &DeleteMessageRequest) -> Result<ApiResponse<bool>> {
        self.check_transport()?;
        self.calls.lock().unwrap().push(ChannelCall::Delete(req.clone()));
        Ok(self
            .delete_reply
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| ApiResponse::success(true)))
    }
}

// ---- queue ----

/// Collects submitted actions without running them.
#[derive(Default)]
pub struct RecordingQueue {
    pub submitted: Mutex<Vec<Action>>,
    /// Submissions for these item ids fail.
    pub reject: Mutex<HashSet<i64>>,
}

impl RecordingQueue {
    pub fn actions(&self) -> Vec<Action> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl TaskQueue for RecordingQueue {
    async fn submit(&self, action: Action) -> Result<TaskId> {
        if self.reject.lock().unwrap().contains(&action.item_id()) {
            anyhow::bail!("queue rejected task for {}", action.item_id());
        }
        let mut submitted = self.submitted.lock().unwrap();
        submitted.push(action);
        Ok(TaskId(submitted.len() as u64))
    }
}
