use super::{Lookup, StoryRecord, StoryStore};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<i64, StoryRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = StoryRecord>) -> Self {
        Self {
            records: RwLock::new(records.into_iter().map(|r| (r.id, r)).collect()),
        }
    }
}

#[async_trait]
impl StoryStore for MemoryStore {
    async fn get(&self, id: i64) -> Result<Option<StoryRecord>> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn get_multi(&self, ids: &[i64]) -> Result<Vec<Lookup>> {
        let records = self.records.read().await;
        Ok(ids
            .iter()
            .map(|id| match records.get(id) {
                Some(r) => Lookup::Found(r.clone()),
                None => Lookup::Missing,
            })
            .collect())
    }

    async fn put(&self, record: &StoryRecord) -> Result<()> {
        self.records.write().await.insert(record.id, record.clone());
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        self.records.write().await.remove(&id);
        Ok(())
    }

    async fn scan(&self) -> Result<Vec<StoryRecord>> {
        let mut all: Vec<StoryRecord> = self.records.read().await.values().cloned().collect();
        all.sort_by_key(|r| r.id);
        Ok(all)
    }
}
