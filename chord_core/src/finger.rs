use crate::error::ChordError;
use crate::node::Node;
use crate::ring::add_pow2;
use crate::traits::{DataStore, PeerResolver, Router};

impl<R: Router, D: DataStore, P: PeerResolver> Node<R, D, P> {
    /// Refreshes `finger_table[idx]`. Callers cycle `idx` over `0..M` across
    /// ticks; this refreshes one slot per call.
    pub async fn stabilize_finger_table(&self, idx: usize) {
        let target = add_pow2(self.id, idx as u32);

        match self.router.find_successor(target).await {
            Ok(found) => {
                self.state.write().await.finger_table[idx] = Some(found);
            }
            Err(ChordError::AppropriateNodeNotFound(_)) => {
                self.state.write().await.finger_table[idx] = None;
            }
            Err(e) => {
                log::debug!("node {}: finger[{idx}] refresh failed: {e}", self.id);
                self.state.write().await.finger_table[idx] = None;
            }
        }
    }
}
