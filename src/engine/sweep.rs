use crate::clock::Clock;
use crate::deadline::Deadline;
use crate::queue::{Action, TaskQueue};
use crate::store::{StoryRecord, StoryStore};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// Delete actions for records strictly older than `retention`.
pub fn expired_actions(
    records: &[StoryRecord],
    now: DateTime<Utc>,
    retention: chrono::Duration,
) -> Vec<Action> {
    records
        .iter()
        .filter(|r| r.is_expired(now, retention))
        .map(|r| Action::Delete { item_id: r.id, message_id: r.message_id })
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub expired: usize,
    pub submitted: usize,
    pub submit_failed: usize,
}

pub struct RetentionSweeper {
    store: Arc<dyn StoryStore>,
    queue: Arc<dyn TaskQueue>,
    clock: Arc<dyn Clock>,
    retention: chrono::Duration,
    budget: Duration,
}

impl RetentionSweeper {
    pub fn new(
        store: Arc<dyn StoryStore>,
        queue: Arc<dyn TaskQueue>,
        clock: Arc<dyn Clock>,
        retention: chrono::Duration,
        budget: Duration,
    ) -> Self {
        Self { store, queue, clock, retention, budget }
    }

    /// Returns once every expired record has a Delete queued.
    pub async fn run_sweep(&self) -> Result<SweepReport> {
        let deadline = Deadline::after(self.budget);
        let records = deadline
            .run(self.store.scan())
            .await
            .context("story scan")?
            .context("story scan")?;

        let actions = expired_actions(&records, self.clock.now(), self.retention);
        let mut report = SweepReport {
            scanned: records.len(),
            expired: actions.len(),
            ..Default::default()
        };

        for action in actions {
            let item_id = action.item_id();
            match deadline.run(self.queue.submit(action)).await {
                Ok(Ok(_)) => report.submitted += 1,
                Ok(Err(e)) => {
                    tracing::error!(item_id, error = %e, "delete submit failed");
                    report.submit_failed += 1;
                }
                Err(e) => {
                    tracing::error!(item_id, error = %e, "delete submit failed");
                    report.submit_failed += 1;
                }
            }
        }

        tracing::info!(
            scanned = report.scanned,
            expired = report.expired,
            submitted = report.submitted,
            submit_failed = report.submit_failed,
            "sweep complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_only_strictly_older_records_expire() {
        let now = Utc.with_ymd_and_hms(2024, 3, 2, 12, 0, 0).unwrap();
        let day = chrono::Duration::hours(24);
        let records = vec![
            StoryRecord { id: 1, message_id: 11, last_save: now - day - chrono::Duration::seconds(1) },
            StoryRecord { id: 2, message_id: 22, last_save: now - day },
            StoryRecord { id: 3, message_id: 33, last_save: now },
        ];
        assert_eq!(
            expired_actions(&records, now, day),
            vec![Action::Delete { item_id: 1, message_id: 11 }]
        );
    }
}
