use super::id_set::IdSet;
use crate::deadline::Deadline;
use crate::feed::TopStories;
use crate::queue::{Action, TaskQueue};
use crate::store::{Lookup, StoryStore};
use anyhow::{Context, Result};
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;

/// Result of classifying one feed identifier.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Submit(Action),
    /// Store lookup failed for this key only.
    Skip { item_id: i64, reason: String },
}

/// Pair each id with its lookup: found means Update, missing means Create.
pub fn classify(ids: &[i64], lookups: &[Lookup]) -> Vec<Classification> {
    ids.iter()
        .zip(lookups)
        .map(|(&item_id, lookup)| match lookup {
            Lookup::Found(record) => Classification::Submit(Action::Update {
                item_id,
                message_id: record.message_id,
            }),
            Lookup::Missing => Classification::Submit(Action::Create { item_id }),
            Lookup::Failed(reason) => Classification::Skip { item_id, reason: reason.clone() },
        })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    pub fetched: usize,
    pub duplicates: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub submit_failed: usize,
}

/// One poll cycle: feed ids, bulk store lookup, one task per item.
pub struct Reconciler {
    feed: Arc<dyn TopStories>,
    store: Arc<dyn StoryStore>,
    queue: Arc<dyn TaskQueue>,
    batch_size: usize,
    budget: Duration,
}

impl Reconciler {
    pub fn new(
        feed: Arc<dyn TopStories>,
        store: Arc<dyn StoryStore>,
        queue: Arc<dyn TaskQueue>,
        batch_size: usize,
        budget: Duration,
    ) -> Self {
        Self { feed, store, queue, batch_size, budget }
    }

    /// Fails only when the feed or the bulk lookup fails as a whole;
    /// per-item problems are logged and counted.
    pub async fn run_poll(&self) -> Result<PollReport> {
        let deadline = Deadline::after(self.budget);
        let mut report = PollReport::default();

        let fetched = deadline
            .run(self.feed.fetch_top_ids(self.batch_size))
            .await
            .context("top stories fetch")?
            .context("top stories fetch")?;
        report.fetched = fetched.len();

        let mut seen = IdSet::new();
        let ids: Vec<i64> = fetched.into_iter().filter(|id| seen.add(*id)).collect();
        report.duplicates = report.fetched - ids.len();
        if report.duplicates > 0 {
            tracing::warn!(duplicates = report.duplicates, "feed returned duplicate ids");
        }
        match (seen.min(), seen.max()) {
            (Ok(lowest), Ok(highest)) => {
                tracing::debug!(count = ids.len(), lowest, highest, "top stories fetched")
            }
            _ => {
                tracing::info!("feed returned no stories");
                return Ok(report);
            }
        }

        let lookups = deadline
            .run(self.store.get_multi(&ids))
            .await
            .context("story lookup")?
            .context("story lookup")?;
        if lookups.len() != ids.len() {
            anyhow::bail!("store returned {} results for {} ids", lookups.len(), ids.len());
        }

        let mut actions = Vec::with_capacity(ids.len());
        for class in classify(&ids, &lookups) {
            match class {
                Classification::Submit(action) => actions.push(action),
                Classification::Skip { item_id, reason } => {
                    tracing::warn!(item_id, error = %reason, "story lookup failed, skipping");
                    report.skipped += 1;
                }
            }
        }

        let submissions = actions.iter().map(|action| {
            let action = action.clone();
            async move { deadline.run(self.queue.submit(action)).await }
        });
        for (action, result) in actions.iter().zip(join_all(submissions).await) {
            match result {
                Ok(Ok(_)) => match action {
                    Action::Create { .. } => report.created += 1,
                    _ => report.updated += 1,
                },
                Ok(Err(e)) => {
                    tracing::error!(item_id = action.item_id(), error = %e, "task submit failed");
                    report.submit_failed += 1;
                }
                Err(e) => {
                    tracing::error!(item_id = action.item_id(), error = %e, "task submit failed");
                    report.submit_failed += 1;
                }
            }
        }

        tracing::info!(
            fetched = report.fetched,
            created = report.created,
            updated = report.updated,
            skipped = report.skipped,
            submit_failed = report.submit_failed,
            "poll cycle complete"
        );
        Ok(report)
    }
}
