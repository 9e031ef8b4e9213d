use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::ChordResult;
use crate::node_info::{KeyValue, NodeInfo};
use crate::ring::RingId;

/// A remote node as seen through whatever transport the caller's process
/// uses (gRPC in `chord_node`, an in-process mailbox in tests). Every
/// method here is a remotely-callable operation a node exposes to peers.
#[async_trait]
pub trait Peer: Send + Sync {
    fn info(&self) -> NodeInfo;

    /// `None` if the peer has no predecessor yet.
    async fn get_predecessor(&self) -> ChordResult<Option<NodeInfo>>;

    /// `check_predecessor(candidate_id, candidate_info)`. May raise
    /// `TargetNodeDoesNotExist` if the peer can no longer resolve `candidate`
    /// during its own liveness probe.
    async fn check_predecessor(&self, candidate_id: RingId, candidate: NodeInfo) -> ChordResult<()>;

    /// `router.find_successor(id)`, routed through this peer. May raise
    /// `AppropriateNodeNotFound`.
    async fn find_successor(&self, id: RingId) -> ChordResult<NodeInfo>;

    async fn receive_replica(
        &self,
        master: NodeInfo,
        items: Vec<KeyValue>,
        replace_all: bool,
    ) -> ChordResult<()>;

    async fn delete_replica(&self, master: NodeInfo) -> ChordResult<()>;

    async fn delegate_my_tantou_data(
        &self,
        new_owner_id: RingId,
        force: bool,
    ) -> ChordResult<Vec<KeyValue>>;

    async fn pass_tantou_data_for_replication(&self) -> ChordResult<Vec<KeyValue>>;

    async fn pass_all_replica(&self) -> ChordResult<HashMap<NodeInfo, Vec<KeyValue>>>;

    /// Forces this peer's `successor_list[0]` and `finger_table[0]` to
    /// `candidate`, bypassing the usual distance check.
    ///
    /// Needed for the two-node bootstrap wiring and the "insert self at
    /// position 0" step of a general-case join: wiring another node's
    /// topology directly has no wire-level equivalent, so this is the
    /// minimal RPC that realizes those join steps across a real network
    /// boundary.
    async fn force_adopt_successor(&self, candidate: NodeInfo) -> ChordResult<()>;

    /// Remote trigger for this peer's own `stabilize_successor_inner`.
    ///
    /// The multi-hop successor-list walk runs `stabilize_successor_inner`
    /// on each successive node in the successor chain, not only on `self`,
    /// so it needs a wire form here too.
    async fn run_stabilize_successor_inner(&self) -> ChordResult<NodeInfo>;

    /// Remote trigger for this peer's own `check_replication_redunduncy`.
    ///
    /// A join calls this directly on the node's own predecessor so its
    /// successor list gets trimmed immediately rather than waiting for the
    /// predecessor's own next tick.
    async fn trigger_replication_check(&self) -> ChordResult<()>;
}

/// Resolves an address to a live `Peer`, or reports it down / not-yet-joined.
#[async_trait]
pub trait PeerResolver: Send + Sync {
    async fn resolve(&self, address: &str) -> ChordResult<std::sync::Arc<dyn Peer>>;
    async fn is_alive(&self, address: &str) -> bool;
}

/// Self's local routing capability — `self.router.find_successor(id)`.
/// Distinct from `Peer::find_successor`, which invokes a *remote* node's
/// router; this is the one a node runs against its own finger table.
#[async_trait]
pub trait Router: Send + Sync {
    async fn find_successor(&self, id: RingId) -> ChordResult<NodeInfo>;
}

/// Self's local key-value store, consumed directly (never through `Peer`).
/// Every remote peer's `Peer` methods above are, on the other side, backed
/// by that peer's own `DataStore` impl — the two traits describe the same
/// operations from the two sides of the wire.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Transfers primary ownership of items now belonging to `new_owner_id`
    /// to the caller, returning them. `force` bypasses any soft retention.
    async fn delegate_my_tantou_data(&self, new_owner_id: RingId, force: bool) -> Vec<KeyValue>;

    async fn store_new_data(&self, id: RingId, value: String, master: Option<NodeInfo>);

    async fn receive_replica(&self, master: NodeInfo, items: Vec<KeyValue>, replace_all: bool);

    async fn delete_replica(&self, master: NodeInfo);

    async fn pass_tantou_data_for_replication(&self) -> Vec<KeyValue>;

    async fn pass_all_replica(&self) -> HashMap<NodeInfo, Vec<KeyValue>>;

    async fn store_replica_of_several_masters(&self, groups: HashMap<NodeInfo, Vec<KeyValue>>);

    async fn get_all_replica_by_master_node(&self, master_id: RingId) -> Vec<KeyValue>;
}
