use thiserror::Error;

/// Errors surfaced by the power flow engine.
///
/// Structural problems (invalid bus-role combinations, more than one slack
/// bus, a network without branch elements) abort solver construction.
/// Failure to converge is *not* an error, it is reported through
/// [`crate::powerflow::PowerFlowReport`]; only a failed sparse factorization
/// turns a running solve into an error.
#[derive(Debug, Error)]
pub enum GridError {
    #[error("node {node}: combination of connected components is invalid")]
    InvalidBusRoles { node: String },

    #[error("network has {count} slack buses, at most one is supported")]
    MultipleSlackBuses { count: usize },

    #[error("network has no line or transformer elements")]
    NoBranchElements,

    #[error("no node named {name} in the network")]
    UnknownNode { name: String },

    #[error("no external grid or generator attached at node {node}")]
    NoSlackCandidate { node: String },

    #[error("Jacobian factorization failed at iteration {iteration}: {reason}")]
    SingularJacobian {
        iteration: usize,
        reason: &'static str,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}
