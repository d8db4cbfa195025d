use std::collections::BTreeSet;

use foundation::{ResourceHandle, ResourceKind};

/// Live-handle table for one session's device objects.
///
/// Every acquisition is tracked here and every release goes through
/// [`ResourceLedger::release`], which reports whether the handle was live.
/// Callers only hand a handle to the backend when it was.
#[derive(Debug, Default)]
pub struct ResourceLedger {
    live: BTreeSet<ResourceHandle>,
    tracked_total: u64,
    released_total: u64,
}

impl ResourceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the handle is already tracked.
    pub fn track(&mut self, handle: ResourceHandle) -> bool {
        let inserted = self.live.insert(handle);
        if inserted {
            self.tracked_total += 1;
        }
        inserted
    }

    /// Returns `false` for a double release or an unknown handle.
    pub fn release(&mut self, handle: ResourceHandle) -> bool {
        let removed = self.live.remove(&handle);
        if removed {
            self.released_total += 1;
        } else {
            tracing::debug!(%handle, "ignoring release of a handle that is not live");
        }
        removed
    }

    pub fn is_live(&self, handle: ResourceHandle) -> bool {
        self.live.contains(&handle)
    }

    pub fn live_count(&self, kind: ResourceKind) -> usize {
        self.live.iter().filter(|h| h.kind == kind).count()
    }

    pub fn total_live(&self) -> usize {
        self.live.len()
    }

    pub fn live_handles(&self) -> Vec<ResourceHandle> {
        self.live.iter().copied().collect()
    }

    pub fn tracked_total(&self) -> u64 {
        self.tracked_total
    }

    pub fn released_total(&self) -> u64 {
        self.released_total
    }
}
