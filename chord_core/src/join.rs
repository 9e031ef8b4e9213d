use crate::error::{ChordError, ChordResult};
use crate::node::Node;
use crate::traits::{DataStore, Peer, PeerResolver, Router};

impl<R: Router, D: DataStore, P: PeerResolver> Node<R, D, P> {
    /// Bootstrap against `mediator_address`, assumed live by the caller.
    ///
    /// Every remote failure in steps 7-9 is swallowed — convergence is the
    /// stabilizer's job.
    pub async fn join(&self, mediator_address: &str) -> ChordResult<()> {
        let mediator = self.resolver.resolve(mediator_address).await?;
        let mediator_info = mediator.info();

        // Step 1.
        let successor_info = match mediator.find_successor(self.id).await {
            Ok(info) => {
                self.retry_slot.clear().await;
                info
            }
            Err(ChordError::AppropriateNodeNotFound(_)) => {
                log::warn!(
                    "node {}: join via {} found no appropriate successor, latching retry",
                    self.id,
                    mediator_address
                );
                self.retry_slot.latch(self.info(), mediator_info).await;
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        // Step 2.
        {
            let mut state = self.state.write().await;
            state.successor_list = vec![successor_info.clone()];
        }

        // Step 3: pull primary data delegated from the new successor.
        let successor = self.resolver.resolve(&successor_info.address).await?;
        let delegated = successor
            .delegate_my_tantou_data(self.id, false)
            .await
            .unwrap_or_default();
        for item in &delegated {
            self.data_store
                .store_new_data(item.id, item.value.clone(), None)
                .await;
        }

        // Step 4.
        {
            let mut state = self.state.write().await;
            state.finger_table[0] = Some(state.successor_list[0].clone());
        }

        if successor_info.id == mediator_info.id {
            // Step 5: two-node special case — mediator was alone on the ring.
            {
                let mut state = self.state.write().await;
                state.predecessor = Some(mediator_info.clone());
            }
            if let Err(e) = mediator.check_predecessor(self.id, self.info()).await {
                log::warn!("node {}: mediator adopt-as-predecessor failed: {e}", self.id);
            }
            if let Err(e) = mediator.force_adopt_successor(self.info()).await {
                log::warn!("node {}: forcing two-node wiring on mediator failed: {e}", self.id);
            }
        } else {
            // Step 6: general case.
            let old_predecessor = match successor.get_predecessor().await {
                Ok(Some(p)) => p,
                Ok(None) => {
                    log::warn!(
                        "node {}: successor {} unexpectedly had no predecessor during join",
                        self.id,
                        successor_info.id
                    );
                    self.stabilize_successor().await?;
                    return self.finish_join(delegated).await;
                }
                Err(e) => return Err(e),
            };

            {
                let mut state = self.state.write().await;
                state.predecessor = Some(old_predecessor.clone());
            }

            // Overwrite successor.predecessor <- self. `self` is always the
            // closer candidate here, so an unconditional overwrite and
            // `check_predecessor`'s distance-gated adoption agree.
            if let Err(e) = successor.check_predecessor(self.id, self.info()).await {
                log::warn!("node {}: re-pointing successor's predecessor failed: {e}", self.id);
            }

            match self.resolver.resolve(&old_predecessor.address).await {
                Ok(old_pred_peer) => {
                    if let Err(e) = old_pred_peer.force_adopt_successor(self.info()).await {
                        log::warn!("node {}: inserting self into old predecessor's successor list failed: {e}", self.id);
                    }
                    self.stabilize_successor().await?;
                }
                Err(_) => {
                    log::warn!(
                        "node {}: old predecessor {} unreachable, deferring repair to stabilization",
                        self.id,
                        old_predecessor.id
                    );
                }
            }
        }

        self.finish_join(delegated).await
    }

    /// Steps 7-9: replica fan-out, predecessor replica pull, and shadowing
    /// the successor's replica set. Split out so the early-return path
    /// above (missing predecessor) still performs it.
    async fn finish_join(&self, delegated: Vec<crate::node_info::KeyValue>) -> ChordResult<()> {
        // Step 7: fan the newly delegated primary data out as replicas to
        // whatever is currently in our successor_list — possibly more than
        // K entries if stabilize_successor() above grew it; trimming that
        // is deferred to the next `check_replication_redunduncy` tick.
        let successors = self.state.read().await.successor_list.clone();
        for node_info in successors {
            match self.resolver.resolve(&node_info.address).await {
                Ok(peer) => {
                    if let Err(e) = peer
                        .receive_replica(self.info(), delegated.clone(), false)
                        .await
                    {
                        log::warn!("node {}: replica push to {} failed: {e}", self.id, node_info.id);
                    }
                }
                Err(_) => continue,
            }
        }

        // Step 8.
        let predecessor = self.state.read().await.predecessor.clone();
        if let Some(pred_info) = predecessor {
            if self.resolver.is_alive(&pred_info.address).await {
                if let Ok(pred_peer) = self.resolver.resolve(&pred_info.address).await {
                    if let Ok(pred_items) = pred_peer.pass_tantou_data_for_replication().await {
                        for item in pred_items {
                            self.data_store
                                .store_new_data(item.id, item.value, Some(pred_info.clone()))
                                .await;
                        }
                    }
                    if let Err(e) = pred_peer.trigger_replication_check().await {
                        log::warn!(
                            "node {}: predecessor replication-redundancy trigger failed: {e}",
                            self.id
                        );
                    }
                }
            }
        }

        // Step 9: shadow everything the successor shadows.
        let successor_info = self.state.read().await.successor0();
        if let Ok(successor) = self.resolver.resolve(&successor_info.address).await {
            if let Ok(groups) = successor.pass_all_replica().await {
                self.data_store.store_replica_of_several_masters(groups).await;
            }
        }

        Ok(())
    }
}
