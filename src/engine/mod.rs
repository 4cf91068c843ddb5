pub mod dispatch;
pub mod filter;
pub mod format;
pub mod id_set;
pub mod reconcile;
pub mod sweep;

pub use dispatch::{DispatchError, DispatchOutcome, ItemDispatcher};
pub use reconcile::{PollReport, Reconciler};
pub use sweep::{RetentionSweeper, SweepReport};
