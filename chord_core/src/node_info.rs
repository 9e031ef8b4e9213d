use serde::{Deserialize, Serialize};

use crate::ring::RingId;

/// A cheap, flat snapshot of a neighbor: just enough to resolve it again
/// later. Never carries a neighbor's own topology — that would make it a
/// recursive, aliasing structure instead of a plain value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeInfo {
    pub id: RingId,
    pub address: String,
}

impl NodeInfo {
    pub fn new(id: RingId, address: impl Into<String>) -> Self {
        Self {
            id,
            address: address.into(),
        }
    }
}

/// A single stored item: the id it hashes to and its value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub id: RingId,
    pub value: String,
}

impl KeyValue {
    pub fn new(id: RingId, value: impl Into<String>) -> Self {
        Self {
            id,
            value: value.into(),
        }
    }
}
