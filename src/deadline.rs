use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// Elapsed budget for a poll cycle, sweep cycle, or dispatched task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expired;

impl std::fmt::Display for Expired {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "deadline exceeded")
    }
}

impl std::error::Error for Expired {}

/// Absolute wall-clock limit shared by every network call made under it.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self { at: Instant::now() + budget }
    }

    pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, Expired> {
        tokio::time::timeout_at(self.at, fut).await.map_err(|_| Expired)
    }
}
