use std::sync::Arc;

use tokio::sync::RwLock;

use crate::node_info::NodeInfo;
use crate::retry::JoinRetrySlot;
use crate::ring::RingId;
use crate::state::NodeState;
use crate::traits::{DataStore, PeerResolver, Router};

/// The stabilization core's owning handle: one `NodeInfo`'s worth of
/// identity, its mutable topology (`NodeState`), and references to its
/// local collaborators.
///
/// Generic over the three collaborator traits so tests can plug in an
/// in-memory mock ring while `chord_node` plugs in gRPC-backed
/// implementations — the stabilization logic itself never changes.
pub struct Node<R: Router, D: DataStore, P: PeerResolver> {
    pub id: RingId,
    pub address: String,
    pub state: Arc<RwLock<NodeState>>,
    pub router: Arc<R>,
    pub data_store: Arc<D>,
    pub resolver: Arc<P>,
    /// `K`, the target successor-list length.
    pub successor_list_normal_len: usize,
    pub retry_slot: Arc<JoinRetrySlot>,
}

impl<R: Router, D: DataStore, P: PeerResolver> Node<R, D, P> {
    pub fn new(
        id: RingId,
        address: impl Into<String>,
        finger_table_size: usize,
        successor_list_normal_len: usize,
        router: Arc<R>,
        data_store: Arc<D>,
        resolver: Arc<P>,
        retry_slot: Arc<JoinRetrySlot>,
    ) -> Self {
        let address = address.into();
        let info = NodeInfo::new(id, address.clone());
        let state = Arc::new(RwLock::new(NodeState::new(info, finger_table_size)));
        Self::with_state(
            id,
            address,
            state,
            successor_list_normal_len,
            router,
            data_store,
            resolver,
            retry_slot,
        )
    }

    /// As `new`, but takes an already-constructed `state` — needed when a
    /// collaborator (e.g. a router that inspects the finger table) must be
    /// built from the same `NodeState` handle the `Node` will own.
    #[allow(clippy::too_many_arguments)]
    pub fn with_state(
        id: RingId,
        address: impl Into<String>,
        state: Arc<RwLock<NodeState>>,
        successor_list_normal_len: usize,
        router: Arc<R>,
        data_store: Arc<D>,
        resolver: Arc<P>,
        retry_slot: Arc<JoinRetrySlot>,
    ) -> Self {
        Self {
            id,
            address: address.into(),
            state,
            router,
            data_store,
            resolver,
            successor_list_normal_len,
            retry_slot,
        }
    }

    pub fn info(&self) -> NodeInfo {
        NodeInfo::new(self.id, self.address.clone())
    }
}

impl<R: Router, D: DataStore, P: PeerResolver> Clone for Node<R, D, P> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            address: self.address.clone(),
            state: self.state.clone(),
            router: self.router.clone(),
            data_store: self.data_store.clone(),
            resolver: self.resolver.clone(),
            successor_list_normal_len: self.successor_list_normal_len,
            retry_slot: self.retry_slot.clone(),
        }
    }
}
