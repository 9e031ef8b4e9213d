//! `NodeHandle`: the runnable node. Wraps a `chord_core::Node` wired to the
//! gRPC collaborators in `registry.rs` and the replicated store in
//! `store.rs`, adds the "has this node finished joining yet" flag that
//! backs `TargetNodeDoesNotExist`, and implements the `tonic::async_trait
//! impl Chord` service that bridges every wire call onto `chord_core`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use tonic::{Request, Response, Status};

use chord_core::{
    ChordError, DataStore, JoinRetrySlot, KeyValue, NodeInfo, NodeState, RingId, Router,
};

use chord_proto::chord::chord_server::Chord;
use chord_proto::chord::{
    CheckPredecessorRequest, DelegateTantouDataRequest, DeleteReplicaRequest, Empty,
    FindSuccessorRequest, ForceAdoptSuccessorRequest, GetPredecessorResponse, GetRequest,
    GetResponse, KeyValueList, NodeState as ProtoNodeState, PassAllReplicaResponse, PutRequest,
    PutResponse, ReceiveReplicaRequest, ReplicaGroup,
};

use crate::constants::FINGER_TABLE_SIZE;
use crate::registry::{from_proto_info, from_proto_kv, to_proto_info, to_proto_kv, GrpcResolver, LocalRouter};
use crate::store::ReplicatedStore;

type CoreNode = chord_core::Node<LocalRouter<GrpcResolver>, ReplicatedStore, GrpcResolver>;

fn chord_error_to_status(e: ChordError) -> Status {
    match e {
        ChordError::AppropriateNodeNotFound(_) => Status::failed_precondition(e.to_string()),
        ChordError::TargetNodeDoesNotExist(_) => Status::not_found(e.to_string()),
        ChordError::NodeIsDowned(_) => Status::unavailable(e.to_string()),
        ChordError::Fatal(_) => Status::internal(e.to_string()),
    }
}

#[derive(Clone)]
pub struct NodeHandle {
    core: Arc<CoreNode>,
    joined: Arc<AtomicBool>,
}

impl NodeHandle {
    pub fn new(id: RingId, address: impl Into<String>, successor_list_normal_len: usize) -> Self {
        let address = address.into();
        let info = NodeInfo::new(id, address.clone());
        let state = Arc::new(RwLock::new(NodeState::new(info.clone(), FINGER_TABLE_SIZE)));
        let resolver = Arc::new(GrpcResolver);
        let router = Arc::new(LocalRouter::new(id, state.clone(), resolver.clone()));
        let data_store = Arc::new(ReplicatedStore::new(info));
        let retry_slot = Arc::new(JoinRetrySlot::new());

        let core = chord_core::Node::with_state(
            id,
            address,
            state,
            successor_list_normal_len,
            router,
            data_store,
            resolver,
            retry_slot,
        );

        Self {
            core: Arc::new(core),
            joined: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn id(&self) -> RingId {
        self.core.id
    }

    pub fn address(&self) -> &str {
        &self.core.address
    }

    /// A node started without `--join` is alone on the ring from the start
    /// — trivially "joined".
    pub fn mark_joined(&self) {
        self.joined.store(true, Ordering::SeqCst);
    }

    pub async fn join(&self, mediator_address: &str) -> Result<(), ChordError> {
        self.core.join(mediator_address).await?;
        self.joined.store(true, Ordering::SeqCst);
        Ok(())
    }

    pub async fn stabilize(&self) {
        match self.core.stabilize_successor().await {
            Ok(()) => {}
            Err(ChordError::Fatal(msg)) => {
                log::error!("node {}: {msg} — exiting", self.core.id);
                std::process::exit(1);
            }
            Err(e) => {
                log::debug!("node {}: stabilize_successor tick failed: {e}", self.core.id);
            }
        }
    }

    pub async fn fix_fingers(&self, idx: usize) {
        self.core.stabilize_finger_table(idx).await;
    }

    pub async fn maintain_replication(&self) {
        self.core.maintain_replication().await;
    }

    /// Whether this node currently masters `key` locally, bypassing the
    /// ring routing `get`/`put` do. Does not forward if another node owns it.
    pub async fn has_local_key(&self, key: &str) -> bool {
        let id = chord_proto::hash_addr(key);
        self.core.data_store.get_local(id).await.is_some()
    }

    pub async fn drain_retry_slot(&self) -> Option<(NodeInfo, NodeInfo)> {
        self.core.retry_slot.take().await
    }

    fn ensure_joined(&self) -> Result<(), Status> {
        if self.joined.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Status::not_found("node has not finished joining"))
        }
    }

    pub async fn report_to_monitor(&self, monitor_addr: &str) {
        use chord_proto::chord::chord_monitor_client::ChordMonitorClient;

        let (predecessor, successors, finger_table) = {
            let state = self.core.state.read().await;
            (
                state.predecessor.clone().map(|p| to_proto_info(&p)),
                state.successor_list.iter().map(to_proto_info).collect(),
                state
                    .finger_table
                    .iter()
                    .map(|slot| match slot {
                        Some(n) => to_proto_info(n),
                        None => chord_proto::chord::NodeInfo {
                            id: 0,
                            address: String::new(),
                        },
                    })
                    .collect(),
            )
        };

        let node_state = ProtoNodeState {
            id: self.core.id,
            address: self.core.address.clone(),
            predecessor,
            successors,
            finger_table,
            stored_keys: self.core.data_store.primary_key_ids().await,
        };

        let endpoint = format!("http://{monitor_addr}");
        if let Ok(mut client) = ChordMonitorClient::connect(endpoint).await {
            let _ = client.report_state(Request::new(node_state)).await;
        }
    }

    /// The client-facing `leave`: hands this node's primary data to its
    /// successor before exiting. There is no explicit leave in the
    /// stabilization core itself — departures are detected as failures —
    /// this is a convenience built on top of the core's own primitives,
    /// not a new stabilization behavior. Pure data-transfer logic; the
    /// `Leave` RPC wraps this with the process-exit a standalone node
    /// binary needs to actually vacate its port.
    pub async fn leave_network(&self) {
        let successor0 = self.core.state.read().await.successor0();
        if successor0.id == self.core.id {
            return;
        }
        let items = self.core.data_store.pass_tantou_data_for_replication().await;
        if items.is_empty() {
            return;
        }
        let endpoint = format!("http://{}", successor0.address);
        if let Ok(mut client) =
            chord_proto::chord::chord_client::ChordClient::connect(endpoint).await
        {
            let request = Request::new(KeyValueList {
                items: items.iter().map(to_proto_kv).collect(),
            });
            let _ = client.receive_primary_data(request).await;
        }
    }
}

#[tonic::async_trait]
impl Chord for NodeHandle {
    async fn find_successor(
        &self,
        request: Request<FindSuccessorRequest>,
    ) -> Result<Response<chord_proto::chord::NodeInfo>, Status> {
        self.ensure_joined()?;
        let id = request.into_inner().id;
        let found = self
            .core
            .router
            .find_successor(id)
            .await
            .map_err(chord_error_to_status)?;
        Ok(Response::new(to_proto_info(&found)))
    }

    async fn get_predecessor(
        &self,
        _request: Request<Empty>,
    ) -> Result<Response<GetPredecessorResponse>, Status> {
        self.ensure_joined()?;
        let predecessor = self.core.state.read().await.predecessor.clone();
        Ok(Response::new(GetPredecessorResponse {
            predecessor: predecessor.map(|p| to_proto_info(&p)),
        }))
    }

    async fn check_predecessor(
        &self,
        request: Request<CheckPredecessorRequest>,
    ) -> Result<Response<Empty>, Status> {
        self.ensure_joined()?;
        let req = request.into_inner();
        let candidate = req
            .candidate
            .ok_or_else(|| Status::invalid_argument("missing candidate"))?;
        self.core
            .check_predecessor(req.candidate_id, from_proto_info(candidate))
            .await
            .map_err(chord_error_to_status)?;
        Ok(Response::new(Empty {}))
    }

    async fn receive_replica(
        &self,
        request: Request<ReceiveReplicaRequest>,
    ) -> Result<Response<Empty>, Status> {
        self.ensure_joined()?;
        let req = request.into_inner();
        let master = req
            .master
            .ok_or_else(|| Status::invalid_argument("missing master"))?;
        let items: Vec<KeyValue> = req.items.into_iter().map(from_proto_kv).collect();
        self.core
            .data_store
            .receive_replica(from_proto_info(master), items, req.replace_all)
            .await;
        Ok(Response::new(Empty {}))
    }

    async fn delete_replica(
        &self,
        request: Request<DeleteReplicaRequest>,
    ) -> Result<Response<Empty>, Status> {
        self.ensure_joined()?;
        let master = request
            .into_inner()
            .master
            .ok_or_else(|| Status::invalid_argument("missing master"))?;
        self.core.data_store.delete_replica(from_proto_info(master)).await;
        Ok(Response::new(Empty {}))
    }

    async fn delegate_tantou_data(
        &self,
        request: Request<DelegateTantouDataRequest>,
    ) -> Result<Response<KeyValueList>, Status> {
        self.ensure_joined()?;
        let req = request.into_inner();
        let items = self
            .core
            .data_store
            .delegate_my_tantou_data(req.new_owner_id, req.force)
            .await;
        Ok(Response::new(KeyValueList {
            items: items.iter().map(to_proto_kv).collect(),
        }))
    }

    async fn pass_tantou_data(
        &self,
        _request: Request<Empty>,
    ) -> Result<Response<KeyValueList>, Status> {
        self.ensure_joined()?;
        let items = self.core.data_store.pass_tantou_data_for_replication().await;
        Ok(Response::new(KeyValueList {
            items: items.iter().map(to_proto_kv).collect(),
        }))
    }

    async fn pass_all_replica(
        &self,
        _request: Request<Empty>,
    ) -> Result<Response<PassAllReplicaResponse>, Status> {
        self.ensure_joined()?;
        let groups = self.core.data_store.pass_all_replica().await;
        Ok(Response::new(PassAllReplicaResponse {
            groups: groups
                .into_iter()
                .map(|(master, items)| ReplicaGroup {
                    master: Some(to_proto_info(&master)),
                    items: items.iter().map(to_proto_kv).collect(),
                })
                .collect(),
        }))
    }

    async fn force_adopt_successor(
        &self,
        request: Request<ForceAdoptSuccessorRequest>,
    ) -> Result<Response<Empty>, Status> {
        self.ensure_joined()?;
        let candidate = request
            .into_inner()
            .candidate
            .ok_or_else(|| Status::invalid_argument("missing candidate"))?;
        let candidate = from_proto_info(candidate);

        let mut state = self.core.state.write().await;
        state.successor_list.insert(0, candidate);
        // Drop a now-redundant self-referential sentinel (the placeholder
        // `NodeState::new` installs before a node has any real successor).
        if state.successor_list.len() > 1 && state.successor_list[1].id == self.core.id {
            state.successor_list.remove(1);
        }
        state.finger_table[0] = Some(state.successor_list[0].clone());
        Ok(Response::new(Empty {}))
    }

    async fn run_stabilize_successor_inner(
        &self,
        _request: Request<Empty>,
    ) -> Result<Response<chord_proto::chord::NodeInfo>, Status> {
        self.ensure_joined()?;
        match self.core.stabilize_successor_inner().await {
            Ok(info) => Ok(Response::new(to_proto_info(&info))),
            Err(ChordError::Fatal(msg)) => {
                log::error!("node {}: {msg} — exiting", self.core.id);
                std::process::exit(1);
            }
            Err(e) => Err(chord_error_to_status(e)),
        }
    }

    async fn trigger_replication_check(
        &self,
        _request: Request<Empty>,
    ) -> Result<Response<Empty>, Status> {
        self.ensure_joined()?;
        self.core.check_replication_redunduncy().await;
        Ok(Response::new(Empty {}))
    }

    async fn ping(&self, _request: Request<Empty>) -> Result<Response<Empty>, Status> {
        self.ensure_joined()?;
        Ok(Response::new(Empty {}))
    }

    async fn put(&self, request: Request<PutRequest>) -> Result<Response<PutResponse>, Status> {
        self.ensure_joined()?;
        let req = request.into_inner();
        let key_id = chord_proto::hash_addr(&req.key);
        let successor = self
            .core
            .router
            .find_successor(key_id)
            .await
            .map_err(chord_error_to_status)?;

        if successor.id == self.core.id {
            self.core.data_store.put_local(key_id, req.value).await;
            Ok(Response::new(PutResponse { success: true }))
        } else {
            let endpoint = format!("http://{}", successor.address);
            let mut client = chord_proto::chord::chord_client::ChordClient::connect(endpoint)
                .await
                .map_err(|e| Status::unavailable(e.to_string()))?;
            let resp = client.put(Request::new(req)).await?;
            Ok(Response::new(resp.into_inner()))
        }
    }

    async fn get(&self, request: Request<GetRequest>) -> Result<Response<GetResponse>, Status> {
        self.ensure_joined()?;
        let req = request.into_inner();
        let key_id = chord_proto::hash_addr(&req.key);
        let successor = self
            .core
            .router
            .find_successor(key_id)
            .await
            .map_err(chord_error_to_status)?;

        if successor.id == self.core.id {
            match self.core.data_store.get_local(key_id).await {
                Some(value) => Ok(Response::new(GetResponse { value, found: true })),
                None => Ok(Response::new(GetResponse {
                    value: String::new(),
                    found: false,
                })),
            }
        } else {
            let endpoint = format!("http://{}", successor.address);
            let mut client = chord_proto::chord::chord_client::ChordClient::connect(endpoint)
                .await
                .map_err(|e| Status::unavailable(e.to_string()))?;
            let resp = client.get(Request::new(req)).await?;
            Ok(Response::new(resp.into_inner()))
        }
    }

    async fn leave(&self, _request: Request<Empty>) -> Result<Response<Empty>, Status> {
        self.ensure_joined()?;
        self.leave_network().await;
        tokio::spawn(async {
            tokio::time::sleep(tokio::time::Duration::from_millis(
                crate::constants::LEAVE_EXIT_DELAY_MS,
            ))
            .await;
            std::process::exit(0);
        });
        Ok(Response::new(Empty {}))
    }

    async fn receive_primary_data(
        &self,
        request: Request<KeyValueList>,
    ) -> Result<Response<Empty>, Status> {
        self.ensure_joined()?;
        for item in request.into_inner().items {
            self.core
                .data_store
                .store_new_data(item.id, item.value, None)
                .await;
        }
        Ok(Response::new(Empty {}))
    }
}
