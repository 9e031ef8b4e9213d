use crate::node::Node;
use crate::traits::{DataStore, Peer, PeerResolver, Router};

impl<R: Router, D: DataStore, P: PeerResolver> Node<R, D, P> {
    /// Periodically re-asserts that every live node in `successor_list`
    /// holds a replica of this node's primary range.
    /// `stabilize_successor_inner`'s handoff already pushes a fresh replica
    /// at the moment a successor is adopted; this sweep covers the case
    /// where a push at that moment failed transiently, or the topology
    /// has been stable long enough that a periodic nudge is needed rather
    /// than relying solely on an event-triggered push. `replace_all=true`
    /// keeps the push idempotent.
    pub async fn maintain_replication(&self) {
        let successors = self.state.read().await.successor_list.clone();
        if successors.is_empty() {
            return;
        }
        let primary_items = self.data_store.pass_tantou_data_for_replication().await;

        for node_info in successors {
            if node_info.id == self.id {
                continue;
            }
            match self.resolver.resolve(&node_info.address).await {
                Ok(peer) => {
                    if let Err(e) = peer
                        .receive_replica(self.info(), primary_items.clone(), true)
                        .await
                    {
                        log::debug!(
                            "node {}: periodic replica refresh to {} failed: {e}",
                            self.id,
                            node_info.id
                        );
                    }
                }
                Err(_) => continue,
            }
        }
    }
}
