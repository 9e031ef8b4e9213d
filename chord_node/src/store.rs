//! Concrete in-memory `DataStore`: primary ("tantou") data and replicas of
//! other nodes' primary data live in the same map, keyed by the `NodeInfo`
//! that masters each group — the group keyed by this node's own `NodeInfo`
//! *is* its primary data.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use chord_core::{in_range_inclusive, DataStore, KeyValue, NodeInfo, RingId};

#[derive(Debug)]
pub struct ReplicatedStore {
    self_info: NodeInfo,
    groups: RwLock<HashMap<NodeInfo, HashMap<RingId, String>>>,
}

impl ReplicatedStore {
    pub fn new(self_info: NodeInfo) -> Self {
        let mut groups = HashMap::new();
        groups.insert(self_info.clone(), HashMap::new());
        Self {
            self_info,
            groups: RwLock::new(groups),
        }
    }

    /// Inserts a client-facing `put` directly into this node's primary group.
    pub async fn put_local(&self, id: RingId, value: String) {
        self.groups
            .write()
            .await
            .entry(self.self_info.clone())
            .or_default()
            .insert(id, value);
    }

    /// Reads a value this node masters, for a client-facing `get`.
    pub async fn get_local(&self, id: RingId) -> Option<String> {
        self.groups
            .read()
            .await
            .get(&self.self_info)
            .and_then(|m| m.get(&id).cloned())
    }

    /// Decimal-string ids of everything this node currently masters, for
    /// monitor reporting. The hashed id is reported rather than the
    /// original client key, which this store — like `KeyValue` itself —
    /// never retains past hashing.
    pub async fn primary_key_ids(&self) -> Vec<String> {
        self.groups
            .read()
            .await
            .get(&self.self_info)
            .map(|m| m.keys().map(|id| id.to_string()).collect())
            .unwrap_or_default()
    }
}

fn to_items(m: &HashMap<RingId, String>) -> Vec<KeyValue> {
    m.iter()
        .map(|(&id, value)| KeyValue::new(id, value.clone()))
        .collect()
}

#[async_trait]
impl DataStore for ReplicatedStore {
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
        self.groups
            .read()
            .await
            .get(&self.self_info)
            .map(to_items)
            .unwrap_or_default()
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
