use crate::ring::RingId;

/// Mid-algorithm control-flow signals, reified as a tagged variant rather
/// than exceptions (Design Notes, "Exception-for-control-flow").
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChordError {
    /// A targeted peer failed a liveness check or an RPC timed out. Always
    /// swallowed at its designated catch points; never bubbles out of a
    /// tick.
    #[error("node at {0} is down")]
    NodeIsDowned(String),

    /// Routing could not locate a successor for an id — typically every
    /// candidate along the route was down.
    #[error("no appropriate node found for id {0}")]
    AppropriateNodeNotFound(RingId),

    /// The address resolves syntactically but names a node that hasn't
    /// finished joining yet (stabilization walked back around the ring to
    /// a joining node mid-join).
    #[error("target node at {0} has not completed joining")]
    TargetNodeDoesNotExist(String),

    /// `successor_list` has no live entries. Not recoverable locally — it
    /// indicates `K` is too small for the observed failure rate.
    #[error("fatal: {0}")]
    Fatal(String),
}

pub type ChordResult<T> = Result<T, ChordError>;
