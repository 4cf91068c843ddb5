use super::memory::FailDisposition;
use super::{HandlerRegistry, InMemoryTaskQueue};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Pool of workers draining one queue. Shutdown stops new leases; a handler
/// already running is left to finish.
pub struct WorkerGroup {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl WorkerGroup {
    pub fn spawn(n: usize, queue: InMemoryTaskQueue, registry: Arc<HandlerRegistry>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let joins = (0..n.max(1))
            .map(|worker_id| {
                let queue = queue.clone();
                let registry = Arc::clone(&registry);
                let rx = shutdown_rx.clone();
                tokio::spawn(worker_loop(worker_id, queue, registry, rx))
            })
            .collect();
        Self { shutdown_tx, joins }
    }

    pub fn request_shutdown(&self) {
        // receivers may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for join in self.joins {
            if let Err(e) = join.await {
                tracing::error!(error = %e, "worker task panicked");
            }
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    queue: InMemoryTaskQueue,
    registry: Arc<HandlerRegistry>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    tracing::debug!(worker_id, "worker started");
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let lease = tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            lease = queue.lease() => lease,
        };

        let task = lease.task().clone();
        let kind = task.action.kind();
        let Some(handler) = registry.get(kind) else {
            tracing::error!(worker_id, task_id = %task.id, kind = %kind, "no handler registered");
            lease.fail(false);
            continue;
        };

        match handler.handle(&task).await {
            Ok(outcome) => {
                tracing::debug!(
                    worker_id,
                    task_id = %task.id,
                    kind = %kind,
                    item_id = task.action.item_id(),
                    outcome = %outcome,
                    "task done"
                );
                lease.ack();
            }
            Err(e) => match lease.fail(e.retryable) {
                FailDisposition::Retry(delay) => tracing::warn!(
                    worker_id,
                    task_id = %task.id,
                    kind = %kind,
                    item_id = task.action.item_id(),
                    attempt = task.attempt,
                    retry_in_ms = delay.as_millis() as u64,
                    error = %e,
                    "task failed, retrying"
                ),
                FailDisposition::Dead => tracing::error!(
                    worker_id,
                    task_id = %task.id,
                    kind = %kind,
                    item_id = task.action.item_id(),
                    attempt = task.attempt,
                    error = %e,
                    "task failed permanently"
                ),
            },
        }
    }
    tracing::debug!(worker_id, "worker stopped");
}
