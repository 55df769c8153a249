//! Reconciliation of externally sourced documents
//!
//! Remote polls, cross-tab broadcasts and storage events all pass through a
//! [`ReconcilePolicy`] before replacing the local document.

use menuboard_common::RestaurantCollection;

/// Merge an incoming document with the local one
pub trait ReconcilePolicy: Send + Sync {
    fn reconcile(
        &self,
        local: &RestaurantCollection,
        incoming: RestaurantCollection,
    ) -> RestaurantCollection;

    fn name(&self) -> &'static str;
}

/// The last document observed replaces the local one wholesale
///
/// Concurrent edits from two writers are not merged; the later arrival wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct LastWriteWins;

impl ReconcilePolicy for LastWriteWins {
    fn reconcile(
        &self,
        _local: &RestaurantCollection,
        incoming: RestaurantCollection,
    ) -> RestaurantCollection {
        incoming
    }

    fn name(&self) -> &'static str {
        "last-write-wins"
    }
}
