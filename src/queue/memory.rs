use super::{Action, RetryPolicy, Task, TaskId, TaskQueue};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::{BinaryHeap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskState {
    Queued,
    Running,
    RetryScheduled,
}

struct TaskRecord {
    action: Action,
    attempts: u32,
    state: TaskState,
}

/// Backoff entry; reversed so the heap pops the earliest first.
#[derive(Debug, PartialEq, Eq)]
struct ScheduledTask {
    run_at: Instant,
    id: TaskId,
}

impl PartialOrd for ScheduledTask {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledTask {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .run_at
            .cmp(&self.run_at)
            .then_with(|| other.id.cmp(&self.id))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueCounts {
    pub queued: usize,
    pub running: usize,
    pub retry_scheduled: usize,
    pub succeeded: usize,
    pub dead: usize,
}

impl QueueCounts {
    pub fn pending(&self) -> usize {
        self.queued + self.running + self.retry_scheduled
    }
}

/// What happened to a failed task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailDisposition {
    Retry(Duration),
    Dead,
}

/// Only unfinished tasks keep a record; finished ones are tallied.
struct State {
    records: HashMap<TaskId, TaskRecord>,
    ready: VecDeque<TaskId>,
    scheduled: BinaryHeap<ScheduledTask>,
    next_id: u64,
    succeeded: usize,
    dead: usize,
}

impl State {
    fn promote_due(&mut self, now: Instant) {
        while let Some(entry) = self.scheduled.peek() {
            if entry.run_at > now {
                break;
            }
            let Some(entry) = self.scheduled.pop() else { break };
            if let Some(record) = self.records.get_mut(&entry.id) {
                if record.state == TaskState::RetryScheduled {
                    record.state = TaskState::Queued;
                    self.ready.push_back(entry.id);
                }
            }
        }
    }

    fn counts(&self) -> QueueCounts {
        let mut counts = QueueCounts {
            succeeded: self.succeeded,
            dead: self.dead,
            ..Default::default()
        };
        for record in self.records.values() {
            match record.state {
                TaskState::Queued => counts.queued += 1,
                TaskState::Running => counts.running += 1,
                TaskState::RetryScheduled => counts.retry_scheduled += 1,
            }
        }
        counts
    }
}

struct Inner {
    state: Mutex<State>,
    notify: Notify,
    retry: RetryPolicy,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        // no invariant spans a panic point
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Process-local at-least-once queue: a ready deque plus a backoff heap.
#[derive(Clone)]
pub struct InMemoryTaskQueue {
    inner: Arc<Inner>,
}

impl InMemoryTaskQueue {
    pub fn new(retry: RetryPolicy) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    records: HashMap::new(),
                    ready: VecDeque::new(),
                    scheduled: BinaryHeap::new(),
                    next_id: 1,
                    succeeded: 0,
                    dead: 0,
                }),
                notify: Notify::new(),
                retry,
            }),
        }
    }

    /// Wait for the next runnable task.
    pub async fn lease(&self) -> Lease {
        loop {
            let wake_at = {
                let mut state = self.inner.lock();
                state.promote_due(Instant::now());
                if let Some(id) = state.ready.pop_front() {
                    if let Some(record) = state.records.get_mut(&id) {
                        record.state = TaskState::Running;
                        record.attempts += 1;
                        let task = Task {
                            id,
                            action: record.action.clone(),
                            attempt: record.attempts,
                        };
                        return Lease { task, inner: Arc::clone(&self.inner), resolved: false };
                    }
                    continue;
                }
                state.scheduled.peek().map(|s| s.run_at)
            };

            match wake_at {
                Some(at) => {
                    tokio::select! {
                        _ = self.inner.notify.notified() => {}
                        _ = tokio::time::sleep_until(at) => {}
                    }
                }
                None => self.inner.notify.notified().await,
            }
        }
    }

    pub fn counts(&self) -> QueueCounts {
        self.inner.lock().counts()
    }

    /// Nothing queued, running, or waiting on backoff.
    pub fn is_idle(&self) -> bool {
        self.counts().pending() == 0
    }

    pub async fn wait_idle(&self, poll: Duration) {
        while !self.is_idle() {
            tokio::time::sleep(poll).await;
        }
    }
}

#[async_trait]
impl TaskQueue for InMemoryTaskQueue {
    async fn submit(&self, action: Action) -> Result<TaskId> {
        let id = {
            let mut state = self.inner.lock();
            let id = TaskId(state.next_id);
            state.next_id += 1;
            state.records.insert(
                id,
                TaskRecord { action, attempts: 0, state: TaskState::Queued },
            );
            state.ready.push_back(id);
            id
        };
        self.inner.notify.notify_one();
        Ok(id)
    }
}

/// A task handed to one worker. Resolve with `ack` or `fail`; a lease
/// dropped unresolved (the handler panicked) counts as a retryable failure.
pub struct Lease {
    task: Task,
    inner: Arc<Inner>,
    resolved: bool,
}

impl Lease {
    pub fn task(&self) -> &Task {
        &self.task
    }

    pub fn ack(mut self) {
        self.resolved = true;
        let mut state = self.inner.lock();
        if state.records.remove(&self.task.id).is_some() {
            state.succeeded += 1;
        }
    }

    /// Schedule a retry, or drop the task as dead when not retryable or out of attempts.
    pub fn fail(mut self, retryable: bool) -> FailDisposition {
        self.resolved = true;
        self.settle_failure(retryable)
    }

    fn settle_failure(&self, retryable: bool) -> FailDisposition {
        let disposition = {
            let mut guard = self.inner.lock();
            let state = &mut *guard;
            let Some(record) = state.records.get_mut(&self.task.id) else {
                return FailDisposition::Dead;
            };
            if !retryable || self.inner.retry.exhausted(record.attempts) {
                state.records.remove(&self.task.id);
                state.dead += 1;
                FailDisposition::Dead
            } else {
                let delay = self.inner.retry.next_delay(record.attempts);
                record.state = TaskState::RetryScheduled;
                state.scheduled.push(ScheduledTask {
                    run_at: Instant::now() + delay,
                    id: self.task.id,
                });
                FailDisposition::Retry(delay)
            }
        };
        if matches!(disposition, FailDisposition::Retry(_)) {
            // Wake a sleeping lease so it can re-arm on the new earliest deadline.
            self.inner.notify.notify_one();
        }
        disposition
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if !self.resolved {
            let disposition = self.settle_failure(true);
            tracing::warn!(task_id = %self.task.id, ?disposition, "lease dropped without ack");
        }
    }
}
