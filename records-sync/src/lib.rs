//! Reconciliation of the local patient cache with the remote patient list.

mod plan;
mod reconciler;

pub use plan::{plan_merge, MergePlan, SyncStats};
pub use reconciler::{Reconciler, SyncError, SyncReport};
