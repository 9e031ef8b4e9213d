use crate::node_info::NodeInfo;

/// The owning, mutable per-node topology. Exclusively owned by one node's
/// local runtime; all writes happen inside the stabilization operations in
/// this crate, under whatever lock the caller wraps this in (`chord_node`
/// uses `tokio::sync::RwLock`).
#[derive(Debug, Clone)]
pub struct NodeState {
    pub info: NodeInfo,
    pub predecessor: Option<NodeInfo>,
    /// Bounded to `K` entries in steady state; may transiently exceed it
    /// between a successor swap and the next `check_replication_redunduncy`.
    pub successor_list: Vec<NodeInfo>,
    /// Length `M`; `None` until `stabilize_finger_table` has populated it,
    /// or after `AppropriateNodeNotFound` nulls a stale slot.
    pub finger_table: Vec<Option<NodeInfo>>,
}

impl NodeState {
    /// A freshly created, unjoined node: its own successor, no predecessor,
    /// an empty finger table.
    pub fn new(info: NodeInfo, finger_table_size: usize) -> Self {
        let self_as_successor = info.clone();
        Self {
            info,
            predecessor: None,
            successor_list: vec![self_as_successor],
            finger_table: vec![None; finger_table_size],
        }
    }

    /// `successor_list[0]`. Panics if empty — callers must never let the
    /// list go empty without raising the fatal condition first.
    pub fn successor0(&self) -> NodeInfo {
        self.successor_list
            .first()
            .cloned()
            .expect("successor_list must never be empty")
    }
}
