use super::{ActionKind, Task, TaskError};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Executes one leased task. `Ok` carries a short outcome label for logs.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn handle(&self, task: &Task) -> Result<String, TaskError>;
}

#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<ActionKind, Arc<dyn ActionHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: ActionKind, handler: Arc<dyn ActionHandler>) -> Result<()> {
        if self.handlers.contains_key(&kind) {
            anyhow::bail!("handler already registered for {}", kind);
        }
        self.handlers.insert(kind, handler);
        Ok(())
    }

    pub fn get(&self, kind: ActionKind) -> Option<Arc<dyn ActionHandler>> {
        self.handlers.get(&kind).cloned()
    }

    /// Errors listing every action kind that has no handler.
    pub fn ensure_complete(&self) -> Result<()> {
        let missing: Vec<&str> = ActionKind::ALL
            .iter()
            .filter(|k| !self.handlers.contains_key(k))
            .map(|k| k.name())
            .collect();
        if !missing.is_empty() {
            anyhow::bail!("no handler registered for: {}", missing.join(", "));
        }
        Ok(())
    }
}
