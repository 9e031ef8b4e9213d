use crate::error::{ChordError, ChordResult};
use crate::node::Node;
use crate::node_info::NodeInfo;
use crate::ring::dist_left;
use crate::traits::{DataStore, Peer, PeerResolver, Router};

impl<R: Router, D: DataStore, P: PeerResolver> Node<R, D, P> {
    /// Repairs one hop of the successor chain and returns the `NodeInfo`
    /// that now occupies `successor_list[0]`.
    ///
    /// Also exposed over the wire as `Peer::run_stabilize_successor_inner`,
    /// since `stabilize_successor`'s multi-hop walk runs this same method
    /// on each successive node in the chain, not only on `self`.
    pub async fn stabilize_successor_inner(&self) -> ChordResult<NodeInfo> {
        let candidates = self.state.read().await.successor_list.clone();

        let mut live: Option<(NodeInfo, std::sync::Arc<dyn Peer>)> = None;
        for candidate in &candidates {
            match self.resolver.resolve(&candidate.address).await {
                Ok(peer) => {
                    live = Some((candidate.clone(), peer));
                    break;
                }
                Err(ChordError::TargetNodeDoesNotExist(_)) => {
                    // Walked back around the ring onto a node still mid-join.
                    return Ok(self.state.read().await.successor0());
                }
                Err(_) => continue,
            }
        }

        let (successor_info, successor_peer) = match live {
            Some(found) => found,
            None => {
                return Err(ChordError::Fatal(format!(
                    "node {}: every entry in successor_list is down — K is too small for the observed failure rate",
                    self.id
                )))
            }
        };

        {
            let mut state = self.state.write().await;
            state.successor_list[0] = successor_info.clone();
        }

        let pred_of_successor = match successor_peer.get_predecessor().await {
            Ok(Some(p)) => p,
            Ok(None) => return Ok(successor_info),
            Err(ChordError::TargetNodeDoesNotExist(_)) => {
                return Ok(self.state.read().await.successor0())
            }
            Err(_) => return Ok(successor_info),
        };

        if pred_of_successor.id == self.id {
            // Pattern 1: already locally consistent.
            return Ok(successor_info);
        }

        // Patterns 2/3. The double check_predecessor probe below (once here,
        // once again on the adopted new successor) is intentional: it
        // repairs the successor's predecessor pointer even when self
        // doesn't end up adopting a new successor.
        if let Err(e) = successor_peer
            .check_predecessor(self.id, self.info())
            .await
        {
            if matches!(e, ChordError::TargetNodeDoesNotExist(_)) {
                return Ok(self.state.read().await.successor0());
            }
        }

        let dist_to_unknown = dist_left(successor_info.id, pred_of_successor.id);
        let dist_to_me = dist_left(successor_info.id, self.id);

        if dist_to_unknown < dist_to_me {
            match self.resolver.resolve(&pred_of_successor.address).await {
                Ok(new_successor_peer) => {
                    {
                        let mut state = self.state.write().await;
                        state.successor_list.insert(0, pred_of_successor.clone());
                    }

                    let primary_items = self
                        .data_store
                        .get_all_replica_by_master_node(self.id)
                        .await;
                    if let Err(e) = new_successor_peer
                        .receive_replica(self.info(), primary_items, true)
                        .await
                    {
                        log::warn!(
                            "node {}: replica handoff to new successor {} failed: {e}",
                            self.id,
                            pred_of_successor.id
                        );
                    }

                    self.check_replication_redunduncy().await;

                    if let Err(e) = new_successor_peer
                        .check_predecessor(self.id, self.info())
                        .await
                    {
                        if matches!(e, ChordError::TargetNodeDoesNotExist(_)) {
                            return Ok(self.state.read().await.successor0());
                        }
                    }
                }
                Err(_) => {
                    // New successor candidate is dead: abandon the swap,
                    // but still make sure the current successor[0] points
                    // its predecessor back at us.
                    let _ = successor_peer.check_predecessor(self.id, self.info()).await;
                }
            }
        }

        Ok(self.state.read().await.successor0())
    }

    /// Walks up to `K` hops starting from `self`, repairing each one via
    /// `stabilize_successor_inner`, and rebuilds `successor_list` from the
    /// result.
    pub async fn stabilize_successor(&self) -> ChordResult<()> {
        let k = self.successor_list_normal_len;
        let mut updated: Vec<NodeInfo> = Vec::new();
        let mut cur = self.info();
        let mut first_hop = true;

        while updated.len() < k {
            let next_info = if first_hop {
                first_hop = false;
                self.stabilize_successor_inner().await?
            } else {
                let peer = self.resolver.resolve(&cur.address).await?;
                peer.run_stabilize_successor_inner().await?
            };

            if next_info.id == self.id {
                // Ring smaller than K: walked all the way back to self.
                if updated.is_empty() {
                    // First-node-alone: don't erase a transiently-missing
                    // successor[0] (second node not joined yet).
                    return Ok(());
                }
                break;
            }

            updated.push(next_info.clone());
            cur = next_info;
        }

        self.state.write().await.successor_list = updated;
        Ok(())
    }

    /// Trims `successor_list` back down to `K`, revoking replicas from the
    /// overflow entries that are still live.
    pub async fn check_replication_redunduncy(&self) {
        let k = self.successor_list_normal_len;
        let overflow: Vec<NodeInfo> = {
            let state = self.state.read().await;
            if state.successor_list.len() > k {
                state.successor_list[k..].to_vec()
            } else {
                Vec::new()
            }
        };

        for node_info in overflow {
            if self.resolver.is_alive(&node_info.address).await {
                if let Ok(peer) = self.resolver.resolve(&node_info.address).await {
                    if let Err(e) = peer.delete_replica(self.info()).await {
                        log::warn!(
                            "node {}: replica revoke on overflow successor {} failed: {e}",
                            self.id,
                            node_info.id
                        );
                    }
                }
            }

            let mut state = self.state.write().await;
            if let Some(pos) = state
                .successor_list
                .iter()
                .position(|n| n.id == node_info.id && n.address == node_info.address)
            {
                state.successor_list.remove(pos);
            }
        }
    }

    /// `check_predecessor(candidate_id, candidate_info)`. Exposed remotely
    /// via `Peer::check_predecessor`; this is the logic a node runs against
    /// its own state when it receives that call.
    pub async fn check_predecessor(&self, candidate_id: u64, candidate: NodeInfo) -> ChordResult<()> {
        let current = self.state.read().await.predecessor.clone();

        let adopt = match &current {
            Some(pred) => {
                if self.resolver.is_alive(&pred.address).await {
                    dist_left(self.id, candidate_id) < dist_left(self.id, pred.id)
                } else {
                    true
                }
            }
            None => true,
        };

        if adopt {
            self.state.write().await.predecessor = Some(candidate);
        }

        Ok(())
    }
}
