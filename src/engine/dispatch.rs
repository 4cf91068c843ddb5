use super::filter::should_ignore;
use super::format::MessageFormat;
use crate::clock::Clock;
use crate::config::FilterConfig;
use crate::deadline::Deadline;
use crate::feed::types::FeedItem;
use crate::feed::{is_decode_error, ItemSource};
use crate::queue::{Action, ActionHandler, Task, TaskError};
use crate::store::{StoryRecord, StoryStore};
use crate::telegram::{is_ignorable_delete, is_not_modified, MessagingChannel};
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Terminal results that are not failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Posted { message_id: i64 },
    Edited,
    Deleted,
    /// Record dropped after an ignorable delete failure; the message itself was not deleted by us.
    Purged,
    Ignored,
    AlreadyPosted,
}

impl fmt::Display for DispatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchOutcome::Posted { message_id } => write!(f, "posted as {}", message_id),
            DispatchOutcome::Edited => f.write_str("edited"),
            DispatchOutcome::Deleted => f.write_str("deleted"),
            DispatchOutcome::Purged => f.write_str("purged"),
            DispatchOutcome::Ignored => f.write_str("ignored"),
            DispatchOutcome::AlreadyPosted => f.write_str("already posted"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("item {item_id}: detail fetch failed: {reason}")]
    DetailFetch { item_id: i64, reason: String },
    #[error("item {item_id}: malformed item: {reason}")]
    Decode { item_id: i64, reason: String },
    #[error("item {item_id}: store failed: {reason}")]
    Storage { item_id: i64, reason: String },
    #[error("item {item_id}: {method} rejected: {reason}")]
    Channel { item_id: i64, method: &'static str, reason: String },
    #[error("item {item_id}: {method} transport failed: {reason}")]
    ChannelTransport { item_id: i64, method: &'static str, reason: String },
    #[error("item {item_id}: deadline exceeded")]
    DeadlineExceeded { item_id: i64 },
    #[error("item {item_id}: posted as message {message_id} but record write failed: {reason}")]
    Unrecorded { item_id: i64, message_id: i64, reason: String },
}

impl DispatchError {
    /// Whether re-running the same action can succeed. A malformed item stays
    /// malformed; an unrecorded post would be posted twice.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, DispatchError::Decode { .. } | DispatchError::Unrecorded { .. })
    }
}

impl From<DispatchError> for TaskError {
    fn from(e: DispatchError) -> Self {
        TaskError { retryable: e.is_retryable(), message: e.to_string() }
    }
}

/// Executes one Create, Update or Delete for one item.
pub struct ItemDispatcher {
    items: Arc<dyn ItemSource>,
    store: Arc<dyn StoryStore>,
    channel: Arc<dyn MessagingChannel>,
    clock: Arc<dyn Clock>,
    format: MessageFormat,
    filter: FilterConfig,
    budget: Duration,
}

impl ItemDispatcher {
    pub fn new(
        items: Arc<dyn ItemSource>,
        store: Arc<dyn StoryStore>,
        channel: Arc<dyn MessagingChannel>,
        clock: Arc<dyn Clock>,
        format: MessageFormat,
        filter: FilterConfig,
        budget: Duration,
    ) -> Self {
        Self { items, store, channel, clock, format, filter, budget }
    }

    pub async fn dispatch(&self, action: &Action) -> Result<DispatchOutcome, DispatchError> {
        let deadline = Deadline::after(self.budget);
        match *action {
            Action::Create { item_id } => self.create(item_id, &deadline).await,
            Action::Update { item_id, message_id } => {
                self.update(item_id, message_id, &deadline).await
            }
            Action::Delete { item_id, message_id } => {
                self.delete(item_id, message_id, &deadline).await
            }
        }
    }

    async fn create(&self, item_id: i64, deadline: &Deadline) -> Result<DispatchOutcome, DispatchError> {
        let Some(item) = self.enrich(item_id, deadline).await? else {
            return Ok(DispatchOutcome::Ignored);
        };

        let existing = bounded(item_id, deadline, self.store.get(item_id))
            .await?
            .map_err(|e| DispatchError::Storage { item_id, reason: format!("{:#}", e) })?;
        if let Some(record) = existing {
            tracing::warn!(item_id, message_id = record.message_id, "story already posted, skipping");
            return Ok(DispatchOutcome::AlreadyPosted);
        }

        let method = "sendMessage";
        let resp = bounded(item_id, deadline, self.channel.send_message(&self.format.send_request(&item)))
            .await?
            .map_err(|e| DispatchError::ChannelTransport { item_id, method, reason: format!("{:#}", e) })?;
        if !resp.ok {
            return Err(DispatchError::Channel { item_id, method, reason: resp.error_summary() });
        }
        let Some(message) = resp.result else {
            return Err(DispatchError::Channel { item_id, method, reason: "response has no message".to_string() });
        };

        let record = StoryRecord::project(&item, message.message_id, self.clock.now());
        let unrecorded = |reason: String| DispatchError::Unrecorded {
            item_id,
            message_id: message.message_id,
            reason,
        };
        match deadline.run(self.store.put(&record)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(unrecorded(format!("{:#}", e))),
            Err(expired) => return Err(unrecorded(expired.to_string())),
        }

        tracing::info!(item_id, message_id = message.message_id, score = item.score, "story posted");
        Ok(DispatchOutcome::Posted { message_id: message.message_id })
    }

    async fn update(
        &self,
        item_id: i64,
        message_id: i64,
        deadline: &Deadline,
    ) -> Result<DispatchOutcome, DispatchError> {
        let Some(item) = self.enrich(item_id, deadline).await? else {
            return Ok(DispatchOutcome::Ignored);
        };

        let method = "editMessageText";
        let resp = bounded(item_id, deadline, self.channel.edit_message(&self.format.edit_request(&item, message_id)))
            .await?
            .map_err(|e| DispatchError::ChannelTransport { item_id, method, reason: format!("{:#}", e) })?;
        if !resp.ok && !is_not_modified(&resp) {
            return Err(DispatchError::Channel { item_id, method, reason: resp.error_summary() });
        }

        let record = StoryRecord::project(&item, message_id, self.clock.now());
        bounded(item_id, deadline, self.store.put(&record))
            .await?
            .map_err(|e| DispatchError::Storage { item_id, reason: format!("{:#}", e) })?;

        tracing::debug!(item_id, message_id, score = item.score, comments = item.descendants, "story edited");
        Ok(DispatchOutcome::Edited)
    }

    async fn delete(
        &self,
        item_id: i64,
        message_id: i64,
        deadline: &Deadline,
    ) -> Result<DispatchOutcome, DispatchError> {
        let method = "deleteMessage";
        let resp = bounded(item_id, deadline, self.channel.delete_message(&self.format.delete_request(message_id)))
            .await?
            .map_err(|e| DispatchError::ChannelTransport { item_id, method, reason: format!("{:#}", e) })?;

        let outcome = if resp.ok {
            DispatchOutcome::Deleted
        } else if is_ignorable_delete(&resp) {
            tracing::warn!(item_id, message_id, reason = %resp.error_summary(), "message not deletable, dropping record");
            DispatchOutcome::Purged
        } else {
            return Err(DispatchError::Channel { item_id, method, reason: resp.error_summary() });
        };

        bounded(item_id, deadline, self.store.delete(item_id))
            .await?
            .map_err(|e| DispatchError::Storage { item_id, reason: format!("{:#}", e) })?;

        tracing::info!(item_id, message_id, outcome = %outcome, "story removed");
        Ok(outcome)
    }

    /// Fetch the item and apply the filter. `None` means ignored.
    async fn enrich(&self, item_id: i64, deadline: &Deadline) -> Result<Option<FeedItem>, DispatchError> {
        let item = bounded(item_id, deadline, self.items.fetch_item(item_id))
            .await?
            .map_err(|e| {
                let reason = format!("{:#}", e);
                if is_decode_error(&e) {
                    DispatchError::Decode { item_id, reason }
                } else {
                    DispatchError::DetailFetch { item_id, reason }
                }
            })?;

        if should_ignore(&item, &self.filter) {
            tracing::debug!(
                item_id,
                kind = %item.kind,
                score = item.score,
                comments = item.descendants,
                "story ignored"
            );
            return Ok(None);
        }
        Ok(Some(item))
    }
}

async fn bounded<F: Future>(item_id: i64, deadline: &Deadline, fut: F) -> Result<F::Output, DispatchError> {
    deadline
        .run(fut)
        .await
        .map_err(|_| DispatchError::DeadlineExceeded { item_id })
}

#[async_trait]
impl ActionHandler for ItemDispatcher {
    async fn handle(&self, task: &Task) -> Result<String, TaskError> {
        match self.dispatch(&task.action).await {
            Ok(outcome) => Ok(outcome.to_string()),
            Err(e) => Err(e.into()),
        }
    }
}
