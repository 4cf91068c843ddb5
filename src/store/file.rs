use super::{Lookup, StoryKey, StoryRecord, StoryStore};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Records kept in memory and mirrored to one JSON file, keyed by
/// `StoryKey`. Each write replaces the file via temp file + rename.
pub struct JsonFileStore {
    path: PathBuf,
    records: Mutex<HashMap<i64, StoryRecord>>,
}

impl JsonFileStore {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let records = match tokio::fs::read_to_string(&path).await {
            Ok(content) => decode(&content)
                .with_context(|| format!("Failed to parse store file: {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read store file: {}", path.display()))
            }
        };
        tracing::info!(path = %path.display(), records = records.len(), "story store opened");
        Ok(Self { path, records: Mutex::new(records) })
    }

    async fn persist(&self, records: &HashMap<i64, StoryRecord>) -> Result<()> {
        let body = encode(records)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

fn encode(records: &HashMap<i64, StoryRecord>) -> Result<String> {
    let keyed: BTreeMap<String, &StoryRecord> = records
        .values()
        .map(|r| (r.key().to_string(), r))
        .collect();
    serde_json::to_string_pretty(&keyed).context("Failed to encode story records")
}

fn decode(content: &str) -> Result<HashMap<i64, StoryRecord>> {
    let keyed: BTreeMap<String, StoryRecord> = serde_json::from_str(content)?;
    let mut records = HashMap::with_capacity(keyed.len());
    for (raw, record) in keyed {
        match StoryKey::parse(&raw) {
            Some(key) if key.0 == record.id => {
                records.insert(record.id, record);
            }
            _ => anyhow::bail!("record key {} does not match id {}", raw, record.id),
        }
    }
    Ok(records)
}

#[async_trait]
impl StoryStore for JsonFileStore {
    async fn get(&self, id: i64) -> Result<Option<StoryRecord>> {
        Ok(self.records.lock().await.get(&id).cloned())
    }

    async fn get_multi(&self, ids: &[i64]) -> Result<Vec<Lookup>> {
        let records = self.records.lock().await;
        Ok(ids
            .iter()
            .map(|id| match records.get(id) {
                Some(r) => Lookup::Found(r.clone()),
                None => Lookup::Missing,
            })
            .collect())
    }

    async fn put(&self, record: &StoryRecord) -> Result<()> {
        let mut records = self.records.lock().await;
        let previous = records.insert(record.id, record.clone());
        if let Err(e) = self.persist(&records).await {
            // Keep memory and disk in step.
            match previous {
                Some(p) => records.insert(p.id, p),
                None => records.remove(&record.id),
            };
            return Err(e);
        }
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let mut records = self.records.lock().await;
        let Some(previous) = records.remove(&id) else {
            return Ok(());
        };
        if let Err(e) = self.persist(&records).await {
            records.insert(id, previous);
            return Err(e);
        }
        Ok(())
    }

    async fn scan(&self) -> Result<Vec<StoryRecord>> {
        let mut all: Vec<StoryRecord> = self.records.lock().await.values().cloned().collect();
        all.sort_by_key(|r| r.id);
        Ok(all)
    }
}
