//! Wire-level implementations of `chord_core`'s collaborator traits:
//! `GrpcResolver`/`GrpcPeer` resolve an address to a live gRPC-backed
//! `Peer`, and `LocalRouter` is this node's own `find_successor` routing,
//! kept deliberately outside the stabilization core and built around async
//! peer resolution over `Option` finger slots.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tonic::transport::{Channel, Endpoint};
use tonic::Request;

use chord_core::{
    in_range, in_range_inclusive, ChordError, ChordResult, KeyValue, NodeInfo, NodeState, Peer,
    PeerResolver, RingId, Router,
};

use chord_proto::chord::chord_client::ChordClient;
use chord_proto::chord::{
    CheckPredecessorRequest, DelegateTantouDataRequest, DeleteReplicaRequest, Empty,
    FindSuccessorRequest, ForceAdoptSuccessorRequest, ReceiveReplicaRequest,
};

const CONNECT_TIMEOUT: Duration = Duration::from_millis(800);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

pub(crate) fn to_proto_info(info: &NodeInfo) -> chord_proto::chord::NodeInfo {
    chord_proto::chord::NodeInfo {
        id: info.id,
        address: info.address.clone(),
    }
}

pub(crate) fn from_proto_info(info: chord_proto::chord::NodeInfo) -> NodeInfo {
    NodeInfo::new(info.id, info.address)
}

pub(crate) fn to_proto_kv(kv: &KeyValue) -> chord_proto::chord::KeyValue {
    chord_proto::chord::KeyValue {
        id: kv.id,
        value: kv.value.clone(),
    }
}

pub(crate) fn from_proto_kv(kv: chord_proto::chord::KeyValue) -> KeyValue {
    KeyValue::new(kv.id, kv.value)
}

/// Maps a transport/RPC failure onto the core's error taxonomy.
/// `NotFound` is reserved by `chord_node`'s services for "peer reachable
/// but hasn't finished joining" (`TargetNodeDoesNotExist`); anything else
/// unreachable-looking collapses to `NodeIsDowned`, the conservative
/// default every swallow-point already expects.
fn status_to_chord_error(address: &str, status: tonic::Status) -> ChordError {
    match status.code() {
        tonic::Code::NotFound => ChordError::TargetNodeDoesNotExist(address.to_string()),
        _ => ChordError::NodeIsDowned(address.to_string()),
    }
}

/// A remote node reached over gRPC. Holds a connected client; `tonic`
/// clients are cheap to clone (the underlying `Channel` is reference
/// counted), so every call below clones before using it mutably.
pub struct GrpcPeer {
    info: NodeInfo,
    client: ChordClient<Channel>,
}

#[async_trait]
impl Peer for GrpcPeer {
    fn info(&self) -> NodeInfo {
        self.info.clone()
    }

    async fn get_predecessor(&self) -> ChordResult<Option<NodeInfo>> {
        let mut client = self.client.clone();
        let resp = client
            .get_predecessor(Request::new(Empty {}))
            .await
            .map_err(|e| status_to_chord_error(&self.info.address, e))?;
        Ok(resp.into_inner().predecessor.map(from_proto_info))
    }

    async fn check_predecessor(&self, candidate_id: RingId, candidate: NodeInfo) -> ChordResult<()> {
        let mut client = self.client.clone();
        client
            .check_predecessor(Request::new(CheckPredecessorRequest {
                candidate_id,
                candidate: Some(to_proto_info(&candidate)),
            }))
            .await
            .map_err(|e| status_to_chord_error(&self.info.address, e))?;
        Ok(())
    }

    async fn find_successor(&self, id: RingId) -> ChordResult<NodeInfo> {
        let mut client = self.client.clone();
        let resp = client
            .find_successor(Request::new(FindSuccessorRequest { id }))
            .await
            .map_err(|e| match e.code() {
                tonic::Code::FailedPrecondition => ChordError::AppropriateNodeNotFound(id),
                _ => status_to_chord_error(&self.info.address, e),
            })?;
        Ok(from_proto_info(resp.into_inner()))
    }

    async fn receive_replica(
        &self,
        master: NodeInfo,
        items: Vec<KeyValue>,
        replace_all: bool,
    ) -> ChordResult<()> {
        let mut client = self.client.clone();
        client
            .receive_replica(Request::new(ReceiveReplicaRequest {
                master: Some(to_proto_info(&master)),
                items: items.iter().map(to_proto_kv).collect(),
                replace_all,
            }))
            .await
            .map_err(|e| status_to_chord_error(&self.info.address, e))?;
        Ok(())
    }

    async fn delete_replica(&self, master: NodeInfo) -> ChordResult<()> {
        let mut client = self.client.clone();
        client
            .delete_replica(Request::new(DeleteReplicaRequest {
                master: Some(to_proto_info(&master)),
            }))
            .await
            .map_err(|e| status_to_chord_error(&self.info.address, e))?;
        Ok(())
    }

    async fn delegate_my_tantou_data(
        &self,
        new_owner_id: RingId,
        force: bool,
    ) -> ChordResult<Vec<KeyValue>> {
        let mut client = self.client.clone();
        let resp = client
            .delegate_tantou_data(Request::new(DelegateTantouDataRequest {
                new_owner_id,
                force,
            }))
            .await
            .map_err(|e| status_to_chord_error(&self.info.address, e))?;
        Ok(resp.into_inner().items.into_iter().map(from_proto_kv).collect())
    }

    async fn pass_tantou_data_for_replication(&self) -> ChordResult<Vec<KeyValue>> {
        let mut client = self.client.clone();
        let resp = client
            .pass_tantou_data(Request::new(Empty {}))
            .await
            .map_err(|e| status_to_chord_error(&self.info.address, e))?;
        Ok(resp.into_inner().items.into_iter().map(from_proto_kv).collect())
    }

    async fn pass_all_replica(&self) -> ChordResult<HashMap<NodeInfo, Vec<KeyValue>>> {
        let mut client = self.client.clone();
        let resp = client
            .pass_all_replica(Request::new(Empty {}))
            .await
            .map_err(|e| status_to_chord_error(&self.info.address, e))?;
        Ok(resp
            .into_inner()
            .groups
            .into_iter()
            .filter_map(|g| {
                let master = g.master?;
                Some((
                    from_proto_info(master),
                    g.items.into_iter().map(from_proto_kv).collect(),
                ))
            })
            .collect())
    }

    async fn force_adopt_successor(&self, candidate: NodeInfo) -> ChordResult<()> {
        let mut client = self.client.clone();
        client
            .force_adopt_successor(Request::new(ForceAdoptSuccessorRequest {
                candidate: Some(to_proto_info(&candidate)),
            }))
            .await
            .map_err(|e| status_to_chord_error(&self.info.address, e))?;
        Ok(())
    }

    async fn run_stabilize_successor_inner(&self) -> ChordResult<NodeInfo> {
        let mut client = self.client.clone();
        let resp = client
            .run_stabilize_successor_inner(Request::new(Empty {}))
            .await
            .map_err(|e| status_to_chord_error(&self.info.address, e))?;
        Ok(from_proto_info(resp.into_inner()))
    }

    async fn trigger_replication_check(&self) -> ChordResult<()> {
        let mut client = self.client.clone();
        client
            .trigger_replication_check(Request::new(Empty {}))
            .await
            .map_err(|e| status_to_chord_error(&self.info.address, e))?;
        Ok(())
    }
}

/// Resolves an address by connecting and pinging it. The peer's id is
/// never carried over the wire — every node's id is `chord_proto::hash_addr`
/// of its own address, so the resolver derives it locally instead of
/// asking.
#[derive(Clone, Default)]
pub struct GrpcResolver;

#[async_trait]
impl PeerResolver for GrpcResolver {
    async fn resolve(&self, address: &str) -> ChordResult<Arc<dyn Peer>> {
        let endpoint = Endpoint::from_shared(format!("http://{address}"))
            .map_err(|_| ChordError::NodeIsDowned(address.to_string()))?
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT);

        let channel = endpoint
            .connect()
            .await
            .map_err(|_| ChordError::NodeIsDowned(address.to_string()))?;
        let mut client = ChordClient::new(channel.clone());

        client
            .ping(Request::new(Empty {}))
            .await
            .map_err(|e| status_to_chord_error(address, e))?;

        Ok(Arc::new(GrpcPeer {
            info: NodeInfo::new(chord_proto::hash_addr(address), address.to_string()),
            client,
        }))
    }

    async fn is_alive(&self, address: &str) -> bool {
        self.resolve(address).await.is_ok()
    }
}

/// This node's own `find_successor` routing: check whether `id` falls in
/// `(self, successor]`, else forward to the closest finger that doesn't
/// overshoot, falling back to a walk of the successor list if every
/// finger candidate is unreachable. Deliberately kept out of
/// `chord_core` — the stabilization core cares about topology repair, not
/// routing algorithms — but `chord_core::Router` still needs a concrete
/// implementation for the workspace to route at all.
pub struct LocalRouter<P: PeerResolver> {
    id: RingId,
    state: Arc<RwLock<NodeState>>,
    resolver: Arc<P>,
}

impl<P: PeerResolver> LocalRouter<P> {
    pub fn new(id: RingId, state: Arc<RwLock<NodeState>>, resolver: Arc<P>) -> Self {
        Self { id, state, resolver }
    }

    async fn closest_finger_candidates(&self, target: RingId) -> Vec<NodeInfo> {
        let state = self.state.read().await;
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        for finger in state.finger_table.iter().rev() {
            if let Some(f) = finger {
                if f.id != self.id && in_range(f.id, self.id, target) && seen.insert(f.id) {
                    candidates.push(f.clone());
                }
            }
        }
        candidates
    }
}

#[async_trait]
impl<P: PeerResolver> Router for LocalRouter<P> {
    async fn find_successor(&self, id: RingId) -> ChordResult<NodeInfo> {
        let successor0 = self.state.read().await.successor0();
        if in_range_inclusive(id, self.id, successor0.id) {
            return Ok(successor0);
        }

        for candidate in self.closest_finger_candidates(id).await {
            if let Ok(peer) = self.resolver.resolve(&candidate.address).await {
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
