use tokio::sync::Mutex;

use crate::node_info::NodeInfo;

/// Process-wide single-slot record of the last join that needs retrying.
///
/// By design only one pending retry is tracked; a later failed join
/// silently overwrites an earlier one.
#[derive(Debug, Default)]
pub struct JoinRetrySlot {
    pending: Mutex<Option<(NodeInfo, NodeInfo)>>,
}

impl JoinRetrySlot {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(None),
        }
    }

    /// Record `(self, mediator)` as needing a retried `join`.
    pub async fn latch(&self, pending_self: NodeInfo, pending_mediator: NodeInfo) {
        *self.pending.lock().await = Some((pending_self, pending_mediator));
    }

    /// Clear the slot — called on a join that didn't need a retry.
    pub async fn clear(&self) {
        *self.pending.lock().await = None;
    }

    /// Take the pending retry, if any, leaving the slot empty.
    pub async fn take(&self) -> Option<(NodeInfo, NodeInfo)> {
        self.pending.lock().await.take()
    }
}
