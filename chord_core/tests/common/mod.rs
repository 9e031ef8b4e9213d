//! In-process stand-in for `chord_node`'s gRPC transport: every `TestNode`
//! lives in a shared `Registry` and reaches its peers through direct method
//! calls instead of a wire. Lets the stabilization scenarios below exercise
//! real multi-node ring behavior without `chord_core` depending on any
//! transport crate.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use chord_core::{
    in_range_inclusive, ChordError, ChordResult, DataStore, JoinRetrySlot, KeyValue, Node,
    NodeInfo, NodeState, Peer, PeerResolver, RingId, Router,
};

pub const FINGER_TABLE_SIZE: usize = 16;
pub const SUCCESSOR_LIST_LEN: usize = 3;

pub type TestNode = Node<MockRouter, MockStore, MockResolver>;

#[derive(Default)]
struct RegistryInner {
    nodes: HashMap<String, Arc<TestNode>>,
    down: std::collections::HashSet<String>,
}

/// The shared "network": nodes register their address here on creation;
/// `kill`/`revive` simulate a node going down and coming back without
/// actually dropping its state, matching how the scenarios below need to
/// resurrect a node and have it rejoin.
#[derive(Clone, Default)]
pub struct Registry(Arc<RwLock<RegistryInner>>);

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn spawn(&self, address: &str) -> Arc<TestNode> {
        self.spawn_with_id(address, addr_id(address)).await
    }

    /// As `spawn`, but with an explicit id instead of one derived from the
    /// address — lets a scenario lay out a ring in a chosen order (e.g.
    /// "join strictly between these two") without fighting a hash.
    pub async fn spawn_with_id(&self, address: &str, id: RingId) -> Arc<TestNode> {
        let resolver = Arc::new(MockResolver {
            registry: self.clone(),
        });
        let state = Arc::new(RwLock::new(NodeState::new(
            NodeInfo::new(id, address.to_string()),
            FINGER_TABLE_SIZE,
        )));
        let router = Arc::new(MockRouter {
            id,
            state: state.clone(),
            resolver: resolver.clone(),
        });
        let data_store = Arc::new(MockStore::new(NodeInfo::new(id, address.to_string())));

        let node = Arc::new(Node::with_state(
            id,
            address.to_string(),
            state,
            SUCCESSOR_LIST_LEN,
            router,
            data_store,
            resolver,
            Arc::new(JoinRetrySlot::new()),
        ));

        self.0.write().await.nodes.insert(address.to_string(), node.clone());
        node
    }

    pub async fn kill(&self, address: &str) {
        self.0.write().await.down.insert(address.to_string());
    }

    pub async fn revive(&self, address: &str) {
        self.0.write().await.down.remove(address);
    }

    pub async fn get(&self, address: &str) -> Arc<TestNode> {
        self.0
            .read()
            .await
            .nodes
            .get(address)
            .cloned()
            .unwrap_or_else(|| panic!("no such test node: {address}"))
    }
}

/// Stable per-address id, spread over the full `u64` ring without needing a
/// real hash function in a test-only dependency.
pub fn addr_id(address: &str) -> RingId {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    address.hash(&mut hasher);
    hasher.finish()
}

pub struct MockResolver {
    registry: Registry,
}

#[async_trait]
impl PeerResolver for MockResolver {
    async fn resolve(&self, address: &str) -> ChordResult<Arc<dyn Peer>> {
        let inner = self.registry.0.read().await;
        if inner.down.contains(address) {
            return Err(ChordError::NodeIsDowned(address.to_string()));
        }
        match inner.nodes.get(address) {
            Some(node) => Ok(Arc::new(MockPeer { node: node.clone() }) as Arc<dyn Peer>),
            None => Err(ChordError::NodeIsDowned(address.to_string())),
        }
    }

    async fn is_alive(&self, address: &str) -> bool {
        self.resolve(address).await.is_ok()
    }
}

/// A "remote" node reached by direct method calls on its `TestNode` handle.
/// Stands in for `chord_node`'s `GrpcPeer`; every method here mirrors what
/// that gRPC service handler does, minus the wire encoding and the
/// has-this-node-finished-joining gate (no transport, so no mid-join window
/// to guard against).
pub struct MockPeer {
    node: Arc<TestNode>,
}

#[async_trait]
impl Peer for MockPeer {
    fn info(&self) -> NodeInfo {
        self.node.info()
    }

    async fn get_predecessor(&self) -> ChordResult<Option<NodeInfo>> {
        Ok(self.node.state.read().await.predecessor.clone())
    }

    async fn check_predecessor(&self, candidate_id: RingId, candidate: NodeInfo) -> ChordResult<()> {
        self.node.check_predecessor(candidate_id, candidate).await
    }

    async fn find_successor(&self, id: RingId) -> ChordResult<NodeInfo> {
        self.node.router.find_successor(id).await
    }

    async fn receive_replica(
        &self,
        master: NodeInfo,
        items: Vec<KeyValue>,
        replace_all: bool,
    ) -> ChordResult<()> {
        self.node.data_store.receive_replica(master, items, replace_all).await;
        Ok(())
    }

    async fn delete_replica(&self, master: NodeInfo) -> ChordResult<()> {
        self.node.data_store.delete_replica(master).await;
        Ok(())
    }

    async fn delegate_my_tantou_data(
        &self,
        new_owner_id: RingId,
        force: bool,
    ) -> ChordResult<Vec<KeyValue>> {
        Ok(self
            .node
            .data_store
            .delegate_my_tantou_data(new_owner_id, force)
            .await)
    }

    async fn pass_tantou_data_for_replication(&self) -> ChordResult<Vec<KeyValue>> {
        Ok(self.node.data_store.pass_tantou_data_for_replication().await)
    }

    async fn pass_all_replica(&self) -> ChordResult<HashMap<NodeInfo, Vec<KeyValue>>> {
        Ok(self.node.data_store.pass_all_replica().await)
    }

    async fn force_adopt_successor(&self, candidate: NodeInfo) -> ChordResult<()> {
        let mut state = self.node.state.write().await;
        state.successor_list.insert(0, candidate);
        if state.successor_list.len() > 1 && state.successor_list[1].id == self.node.id {
            state.successor_list.remove(1);
        }
        state.finger_table[0] = Some(state.successor_list[0].clone());
        Ok(())
    }

    async fn run_stabilize_successor_inner(&self) -> ChordResult<NodeInfo> {
        self.node.stabilize_successor_inner().await
    }

    async fn trigger_replication_check(&self) -> ChordResult<()> {
        self.node.check_replication_redunduncy().await;
        Ok(())
    }
}

/// This node's own routing, mirroring `chord_node::registry::LocalRouter`
/// against the in-process registry instead of gRPC.
pub struct MockRouter {
    id: RingId,
    state: Arc<RwLock<NodeState>>,
    resolver: Arc<MockResolver>,
}

#[async_trait]
impl Router for MockRouter {
    async fn find_successor(&self, id: RingId) -> ChordResult<NodeInfo> {
        let successor0 = self.state.read().await.successor0();
        if chord_core::in_range_inclusive(id, self.id, successor0.id) {
            return Ok(successor0);
        }

        let fingers: Vec<NodeInfo> = {
            let state = self.state.read().await;
            state
                .finger_table
                .iter()
                .rev()
                .filter_map(|slot| slot.clone())
                .filter(|f| f.id != self.id && chord_core::in_range(f.id, self.id, id))
                .collect()
        };
        for finger in fingers {
            if let Ok(peer) = self.resolver.resolve(&finger.address).await {
                if let Ok(found) = peer.find_successor(id).await {
                    return Ok(found);
                }
            }
        }

        let successors = self.state.read().await.successor_list.clone();
        for succ in successors {
            if succ.id == self.id {
                continue;
            }
            if let Ok(peer) = self.resolver.resolve(&succ.address).await {
                if let Ok(found) = peer.find_successor(id).await {
                    return Ok(found);
                }
            }
        }

        Err(ChordError::AppropriateNodeNotFound(id))
    }
}

/// Same unified primary/replica design as `chord_node::store::ReplicatedStore`.
pub struct MockStore {
    self_info: NodeInfo,
    groups: RwLock<HashMap<NodeInfo, HashMap<RingId, String>>>,
}

impl MockStore {
    pub fn new(self_info: NodeInfo) -> Self {
        let mut groups = HashMap::new();
        groups.insert(self_info.clone(), HashMap::new());
        Self {
            self_info,
            groups: RwLock::new(groups),
        }
    }

    pub async fn put_local(&self, id: RingId, value: impl Into<String>) {
        self.groups
            .write()
            .await
            .entry(self.self_info.clone())
            .or_default()
            .insert(id, value.into());
    }

    pub async fn get_local(&self, id: RingId) -> Option<String> {
        self.groups
            .read()
            .await
            .get(&self.self_info)
            .and_then(|m| m.get(&id).cloned())
    }

    pub async fn primary_ids(&self) -> Vec<RingId> {
        self.groups
            .read()
            .await
            .get(&self.self_info)
            .map(|m| m.keys().copied().collect())
            .unwrap_or_default()
    }
}

fn to_items(m: &HashMap<RingId, String>) -> Vec<KeyValue> {
    m.iter().map(|(&id, value)| KeyValue::new(id, value.clone())).collect()
}

#[async_trait]
impl DataStore for MockStore {
    async fn delegate_my_tantou_data(&self, new_owner_id: RingId, force: bool) -> Vec<KeyValue> {
        let mut groups = self.groups.write().await;
        let primary = groups.entry(self.self_info.clone()).or_default();

        let ids_to_move: Vec<RingId> = primary
            .keys()
            .copied()
            .filter(|&id| force || !in_range_inclusive(id, new_owner_id, self.self_info.id))
            .collect();

        ids_to_move
            .into_iter()
            .filter_map(|id| primary.remove(&id).map(|value| KeyValue::new(id, value)))
            .collect()
    }

    async fn store_new_data(&self, id: RingId, value: String, master: Option<NodeInfo>) {
        let key = master.unwrap_or_else(|| self.self_info.clone());
        self.groups.write().await.entry(key).or_default().insert(id, value);
    }

    async fn receive_replica(&self, master: NodeInfo, items: Vec<KeyValue>, replace_all: bool) {
        let mut groups = self.groups.write().await;
        let bucket = groups.entry(master).or_default();
        if replace_all {
            bucket.clear();
        }
        for item in items {
            bucket.insert(item.id, item.value);
        }
    }

    async fn delete_replica(&self, master: NodeInfo) {
        self.groups.write().await.remove(&master);
    }

    async fn pass_tantou_data_for_replication(&self) -> Vec<KeyValue> {
        self.groups.read().await.get(&self.self_info).map(to_items).unwrap_or_default()
    }

    async fn pass_all_replica(&self) -> HashMap<NodeInfo, Vec<KeyValue>> {
        self.groups
            .read()
            .await
            .iter()
            .filter(|(master, _)| **master != self.self_info)
            .map(|(master, items)| (master.clone(), to_items(items)))
            .collect()
    }

    async fn store_replica_of_several_masters(&self, incoming: HashMap<NodeInfo, Vec<KeyValue>>) {
        let mut groups = self.groups.write().await;
        for (master, items) in incoming {
            let bucket = groups.entry(master).or_default();
            for item in items {
                bucket.insert(item.id, item.value);
            }
        }
    }

    async fn get_all_replica_by_master_node(&self, master_id: RingId) -> Vec<KeyValue> {
        let groups = self.groups.read().await;
        if master_id == self.self_info.id {
            return groups.get(&self.self_info).map(to_items).unwrap_or_default();
        }
        groups
            .iter()
            .find(|(master, _)| master.id == master_id)
            .map(|(_, items)| to_items(items))
            .unwrap_or_default()
    }
}

/// Runs one `stabilize_successor` + `check_replication_redunduncy` pass on
/// every node currently in the registry, in address order. Most scenarios
/// need several of these before the ring fully converges.
pub async fn converge(registry: &Registry, addresses: &[&str], rounds: usize) {
    for _ in 0..rounds {
        for addr in addresses {
            let node = registry.get(addr).await;
            let _ = node.stabilize_successor().await;
            node.check_replication_redunduncy().await;
        }
    }
}
