//! The stabilization core of a Chord DHT node: successor-list repair,
//! predecessor probing, finger-table refresh, and the join bootstrap that
//! seeds all three — plus the replication side-effects those topology
//! changes imply.
//!
//! This crate has no transport of its own. It operates against the
//! [`Router`], [`DataStore`], and [`PeerResolver`] collaborator traits;
//! `chord_node` supplies gRPC-backed implementations of all three.

mod error;
mod finger;
mod join;
mod node;
mod node_info;
mod replication;
mod retry;
mod ring;
mod stabilize;
mod state;
mod traits;

pub use error::{ChordError, ChordResult};
pub use node::Node;
pub use node_info::{KeyValue, NodeInfo};
pub use retry::JoinRetrySlot;
pub use ring::{add_pow2, dist_left, dist_right, in_range, in_range_inclusive, RingId};
pub use state::NodeState;
pub use traits::{DataStore, Peer, PeerResolver, Router};
